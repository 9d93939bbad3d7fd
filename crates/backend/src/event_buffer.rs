//! Append-only event buffer
//!
//! Stores variable-length event records back to back. Each record carries its
//! own size, so the buffer needs no index. Not thread-safe by itself; see
//! [`crate::DoubleBuffer`] for the synchronized wrapper.

use bytes::BytesMut;
use protocol::{EventRef, Result};

/// Initial capacity reserved for a fresh buffer
const INITIAL_CAPACITY: usize = 4 * 1024;

/// Resettable buffer of binary event records
#[derive(Debug)]
pub struct EventBuffer {
    data: BytesMut,
    count: usize,
}

impl Default for EventBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBuffer {
    pub fn new() -> Self {
        Self::with_capacity(INITIAL_CAPACITY)
    }

    pub fn with_capacity(bytes: usize) -> Self {
        Self {
            data: BytesMut::with_capacity(bytes),
            count: 0,
        }
    }

    /// Append an already validated record
    pub fn append(&mut self, event: EventRef<'_>) {
        self.data.extend_from_slice(event.as_bytes());
        self.count += 1;
    }

    /// Validate and append a raw record
    pub fn append_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        let event = EventRef::parse(bytes)?;
        self.append(event);
        Ok(())
    }

    /// Iterate records in append order
    pub fn iter(&self) -> Events<'_> {
        Events { rest: &self.data }
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Bytes currently used by records
    pub fn size_bytes(&self) -> usize {
        self.data.len()
    }

    pub fn capacity(&self) -> usize {
        self.data.capacity()
    }

    /// Logically clear the buffer, keeping its allocation
    pub fn reset(&mut self) {
        self.data.clear();
        self.count = 0;
    }

    /// Clear the buffer and give its allocation back
    pub fn release(&mut self) {
        self.data = BytesMut::new();
        self.count = 0;
    }
}

impl<'a> IntoIterator for &'a EventBuffer {
    type Item = EventRef<'a>;
    type IntoIter = Events<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over the records of an [`EventBuffer`]
pub struct Events<'a> {
    rest: &'a [u8],
}

impl<'a> Iterator for Events<'a> {
    type Item = EventRef<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.rest.is_empty() {
            return None;
        }
        match EventRef::read_prefix(self.rest) {
            Ok((event, rest)) => {
                self.rest = rest;
                Some(event)
            }
            // Only validated records are ever appended
            Err(_) => {
                self.rest = &[];
                None
            }
        }
    }
}
