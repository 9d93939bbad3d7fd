//! Double-buffered event queue
//!
//! Producers append to the *active* buffer through an [`EventWriter`]. The
//! owning thread keeps the *draining* buffer to itself. A flush swaps the two
//! under the active buffer's lock (an O(1) exchange of the underlying
//! allocations), then walks the sealed batch with the lock released, so
//! producers are never blocked for longer than a single append or swap and
//! never write into a batch that is being drained.

use crate::event_buffer::EventBuffer;
use protocol::EventRef;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::trace;

#[derive(Debug, Default)]
struct ActiveState {
    buffer: EventBuffer,
    closed: bool,
}

#[derive(Debug, Default)]
struct ActiveBuffer {
    state: Mutex<ActiveState>,
}

impl ActiveBuffer {
    fn lock(&self) -> MutexGuard<'_, ActiveState> {
        // A panic while holding the lock cannot leave a half-written record:
        // records are appended with a single extend.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Producer side of the double buffer
#[derive(Debug, Clone)]
pub struct EventWriter {
    active: Arc<ActiveBuffer>,
}

impl EventWriter {
    /// Append a record to the active buffer
    ///
    /// Returns `false` without appending once the buffer has been closed.
    pub fn append(&self, event: EventRef<'_>) -> bool {
        let mut state = self.active.lock();
        if state.closed {
            return false;
        }
        state.buffer.append(event);
        true
    }

    pub fn is_closed(&self) -> bool {
        self.active.lock().closed
    }
}

/// Owning-thread side of the double buffer
#[derive(Debug)]
pub struct DoubleBuffer {
    active: Arc<ActiveBuffer>,
    draining: EventBuffer,
}

impl Default for DoubleBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl DoubleBuffer {
    pub fn new() -> Self {
        Self {
            active: Arc::new(ActiveBuffer::default()),
            draining: EventBuffer::new(),
        }
    }

    /// Create a producer handle
    pub fn writer(&self) -> EventWriter {
        EventWriter {
            active: self.active.clone(),
        }
    }

    /// Number of records waiting in the active buffer
    pub fn pending(&self) -> usize {
        self.active.lock().buffer.len()
    }

    /// Swap the active buffer out for draining
    ///
    /// Records appended after this land in the next batch. Does nothing while
    /// a previously sealed batch has not been drained yet. Returns the size of
    /// the sealed batch.
    pub fn seal(&mut self) -> usize {
        if self.draining.is_empty() {
            let mut state = self.active.lock();
            std::mem::swap(&mut state.buffer, &mut self.draining);
        }
        self.draining.len()
    }

    /// Hand every record of the sealed batch to `sink`, then clear it
    ///
    /// Records are visited in append order. Returns the number visited.
    pub fn drain<F>(&mut self, mut sink: F) -> usize
    where
        F: FnMut(EventRef<'_>),
    {
        let count = self.draining.len();
        if count > 0 {
            trace!(
                "Flushing {} events ({} bytes)",
                count,
                self.draining.size_bytes()
            );
        }

        for event in self.draining.iter() {
            sink(event);
        }
        self.draining.reset();
        count
    }

    /// Seal and drain in one go
    ///
    /// Anything appended while `sink` runs lands in the next flush.
    pub fn flush<F>(&mut self, sink: F) -> usize
    where
        F: FnMut(EventRef<'_>),
    {
        self.seal();
        self.drain(sink)
    }

    /// Stop accepting records and drop anything still pending
    pub fn close(&mut self) {
        let mut state = self.active.lock();
        state.closed = true;
        state.buffer.reset();
    }

    /// Close and give both allocations back
    pub fn release(&mut self) {
        {
            let mut state = self.active.lock();
            state.closed = true;
            state.buffer.release();
        }
        self.draining.release();
    }

    pub fn is_closed(&self) -> bool {
        self.active.lock().closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol::{DeviceHandle, RemoveEvent};

    fn remove_event(id: u32) -> RemoveEvent {
        RemoveEvent::new(DeviceHandle(id))
    }

    fn append(writer: &EventWriter, id: u32) -> bool {
        let event = remove_event(id);
        writer.append(EventRef::parse(event.as_bytes()).unwrap())
    }

    #[test]
    fn test_flush_visits_in_order_then_clears() {
        let mut buffers = DoubleBuffer::new();
        let writer = buffers.writer();
        for id in 0..5 {
            assert!(append(&writer, id));
        }
        assert_eq!(buffers.pending(), 5);

        let mut seen = Vec::new();
        let count = buffers.flush(|event| seen.push(event.device().0));
        assert_eq!(count, 5);
        assert_eq!(seen, vec![0, 1, 2, 3, 4]);

        assert_eq!(buffers.pending(), 0);
        assert_eq!(buffers.flush(|_| panic!("buffer should be empty")), 0);
    }

    #[test]
    fn test_appends_during_flush_land_in_next_batch() {
        let mut buffers = DoubleBuffer::new();
        let writer = buffers.writer();
        append(&writer, 1);

        let mut first = Vec::new();
        buffers.flush(|event| {
            first.push(event.device().0);
            // Does not deadlock: the lock is not held while draining
            append(&writer, 100 + event.device().0);
        });
        assert_eq!(first, vec![1]);

        let mut second = Vec::new();
        buffers.flush(|event| second.push(event.device().0));
        assert_eq!(second, vec![101]);
    }

    #[test]
    fn test_seal_then_append_goes_to_next_batch() {
        let mut buffers = DoubleBuffer::new();
        let writer = buffers.writer();
        append(&writer, 1);

        assert_eq!(buffers.seal(), 1);
        append(&writer, 2);
        // A second seal must not swap the sealed batch back in
        assert_eq!(buffers.seal(), 1);

        let mut seen = Vec::new();
        buffers.drain(|event| seen.push(event.device().0));
        assert_eq!(seen, vec![1]);
        assert_eq!(buffers.pending(), 1);
    }

    #[test]
    fn test_closed_writer_rejects() {
        let mut buffers = DoubleBuffer::new();
        let writer = buffers.writer();
        append(&writer, 1);

        buffers.close();
        assert!(writer.is_closed());
        assert!(!append(&writer, 2));
        assert_eq!(buffers.flush(|_| {}), 0);
    }

    #[test]
    fn test_release_closes() {
        let mut buffers = DoubleBuffer::new();
        let writer = buffers.writer();
        buffers.release();
        assert!(buffers.is_closed());
        assert!(!append(&writer, 1));
    }
}
