//! Event records
//!
//! Every record starts with a fixed [`EventHeader`]. State events append a
//! format tag and an opaque state payload; removal events carry nothing
//! beyond the header.

use crate::error::{ProtocolError, Result};
use crate::types::{DeviceHandle, FourCC};
use bytes::{Buf, BufMut};

/// Size of the fixed event header in bytes
pub const HEADER_SIZE: usize = 12;

/// Largest state payload a single state event may carry
pub const MAX_STATE_SIZE: usize = 512;

/// Header plus the format tag that precedes a state payload
pub const STATE_EVENT_OVERHEAD: usize = HEADER_SIZE + 4;

/// Largest possible state event record
pub const MAX_STATE_EVENT_SIZE: usize = STATE_EVENT_OVERHEAD + MAX_STATE_SIZE;

/// Event kind of device state snapshots
pub const STATE_EVENT: FourCC = FourCC::new(b"STAT");

/// Event kind of device removal requests
pub const REMOVE_EVENT: FourCC = FourCC::new(b"DREM");

/// Fixed header at the start of every record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventHeader {
    pub kind: FourCC,
    /// Total record size, header included
    pub size: u32,
    pub device: DeviceHandle,
}

impl EventHeader {
    pub fn new(kind: FourCC, size: usize, device: DeviceHandle) -> Result<Self> {
        let size = u32::try_from(size).map_err(|_| ProtocolError::RecordTooLarge { size })?;
        Ok(Self { kind, size, device })
    }

    pub fn write<B: BufMut>(&self, buf: &mut B) {
        buf.put_slice(&self.kind.to_bytes());
        buf.put_u32_le(self.size);
        buf.put_u32_le(self.device.0);
    }

    pub fn read(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(ProtocolError::BufferTooSmall {
                needed: HEADER_SIZE,
                available: bytes.len(),
            });
        }

        let mut cursor = &bytes[..HEADER_SIZE];
        let mut kind = [0u8; 4];
        cursor.copy_to_slice(&mut kind);
        let size = cursor.get_u32_le();
        let device = DeviceHandle(cursor.get_u32_le());

        Ok(Self {
            kind: FourCC(kind),
            size,
            device,
        })
    }
}

/// Validated view of a single record
#[derive(Debug, Clone, Copy)]
pub struct EventRef<'a> {
    header: EventHeader,
    bytes: &'a [u8],
}

impl<'a> EventRef<'a> {
    /// Parse a slice holding exactly one record
    pub fn parse(bytes: &'a [u8]) -> Result<Self> {
        let header = EventHeader::read(bytes)?;
        let declared = header.size as usize;
        if declared != bytes.len() || declared < HEADER_SIZE {
            return Err(ProtocolError::SizeMismatch {
                declared,
                actual: bytes.len(),
            });
        }
        Ok(Self { header, bytes })
    }

    /// Parse the leading record of a slice, returning it and the remainder
    pub fn read_prefix(bytes: &'a [u8]) -> Result<(Self, &'a [u8])> {
        let header = EventHeader::read(bytes)?;
        let declared = header.size as usize;
        if declared > bytes.len() || declared < HEADER_SIZE {
            return Err(ProtocolError::SizeMismatch {
                declared,
                actual: bytes.len(),
            });
        }
        let (record, rest) = bytes.split_at(declared);
        Ok((
            Self {
                header,
                bytes: record,
            },
            rest,
        ))
    }

    pub fn header(&self) -> EventHeader {
        self.header
    }

    pub fn kind(&self) -> FourCC {
        self.header.kind
    }

    pub fn device(&self) -> DeviceHandle {
        self.header.device
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    /// Everything after the header
    pub fn payload(&self) -> &'a [u8] {
        &self.bytes[HEADER_SIZE..]
    }

    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// Format tag and state bytes, if this is a well-formed state event
    pub fn state_payload(&self) -> Option<(FourCC, &'a [u8])> {
        if self.kind() != STATE_EVENT {
            return None;
        }
        let payload = self.payload();
        if payload.len() < 4 {
            return None;
        }
        let (format, state) = payload.split_at(4);
        Some((FourCC([format[0], format[1], format[2], format[3]]), state))
    }
}

/// A state struct that knows its own format tag
///
/// Implemented by fixed-layout device state reports so they can be queued
/// without passing the format separately.
pub trait StateFormat {
    const FORMAT: FourCC;

    fn state_bytes(&self) -> &[u8];
}

/// Fixed-capacity state event, built without heap allocation
///
/// The payload length is checked against [`MAX_STATE_SIZE`] before anything
/// is copied, so the record can never outgrow its backing array.
#[derive(Debug, Clone)]
pub struct StateEventBuf {
    bytes: [u8; MAX_STATE_EVENT_SIZE],
    len: usize,
}

impl StateEventBuf {
    /// Returns `None` for an empty payload or one larger than [`MAX_STATE_SIZE`]
    pub fn new(device: DeviceHandle, format: FourCC, state: &[u8]) -> Option<Self> {
        if state.is_empty() || state.len() > MAX_STATE_SIZE {
            return None;
        }

        let len = STATE_EVENT_OVERHEAD + state.len();
        let mut bytes = [0u8; MAX_STATE_EVENT_SIZE];
        {
            let mut out = &mut bytes[..len];
            EventHeader {
                kind: STATE_EVENT,
                size: len as u32,
                device,
            }
            .write(&mut out);
            out.put_slice(&format.to_bytes());
            out.put_slice(state);
        }

        Some(Self { bytes, len })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Header-only request asking the host to remove a device
#[derive(Debug, Clone, Copy)]
pub struct RemoveEvent {
    bytes: [u8; HEADER_SIZE],
}

impl RemoveEvent {
    pub fn new(device: DeviceHandle) -> Self {
        let mut bytes = [0u8; HEADER_SIZE];
        EventHeader {
            kind: REMOVE_EVENT,
            size: HEADER_SIZE as u32,
            device,
        }
        .write(&mut &mut bytes[..]);
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}
