//! Device command buffers
//!
//! The host addresses commands to a single device as an opaque buffer:
//!
//! ```text
//! [kind: FourCC][size: u32 (whole buffer)][payload ...]
//! ```
//!
//! A command handler answers with an optional `i64`. `None` means "not mine,
//! let another handler respond".

use crate::error::{ProtocolError, Result};
use crate::types::FourCC;
use bytes::{Buf, BufMut};

/// Size of the command header in bytes
pub const COMMAND_HEADER_SIZE: usize = 8;

/// Result reported for null or malformed command buffers
pub const GENERIC_FAILURE: i64 = -1;

/// Borrowed view of a parsed command buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceCommand<'a> {
    pub kind: FourCC,
    pub payload: &'a [u8],
}

impl<'a> DeviceCommand<'a> {
    pub fn parse(bytes: &'a [u8]) -> Result<Self> {
        if bytes.len() < COMMAND_HEADER_SIZE {
            return Err(ProtocolError::BufferTooSmall {
                needed: COMMAND_HEADER_SIZE,
                available: bytes.len(),
            });
        }

        let mut cursor = &bytes[..COMMAND_HEADER_SIZE];
        let mut kind = [0u8; 4];
        cursor.copy_to_slice(&mut kind);
        let declared = cursor.get_u32_le() as usize;
        if declared != bytes.len() {
            return Err(ProtocolError::SizeMismatch {
                declared,
                actual: bytes.len(),
            });
        }

        Ok(Self {
            kind: FourCC(kind),
            payload: &bytes[COMMAND_HEADER_SIZE..],
        })
    }

    /// Encode a command buffer
    pub fn encode(kind: FourCC, payload: &[u8]) -> Result<Vec<u8>> {
        let size = COMMAND_HEADER_SIZE + payload.len();
        let size_field = u32::try_from(size).map_err(|_| ProtocolError::RecordTooLarge { size })?;

        let mut buf = Vec::with_capacity(size);
        buf.put_slice(&kind.to_bytes());
        buf.put_u32_le(size_field);
        buf.put_slice(payload);
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_parse() {
        let bytes = DeviceCommand::encode(FourCC::new(b"RUMB"), &[0x40, 0x80]).unwrap();
        assert_eq!(bytes.len(), COMMAND_HEADER_SIZE + 2);

        let cmd = DeviceCommand::parse(&bytes).unwrap();
        assert_eq!(cmd.kind, FourCC::new(b"RUMB"));
        assert_eq!(cmd.payload, &[0x40, 0x80]);
    }

    #[test]
    fn test_command_rejects_truncated() {
        let bytes = DeviceCommand::encode(FourCC::new(b"RUMB"), &[1, 2, 3]).unwrap();
        assert!(DeviceCommand::parse(&bytes[..COMMAND_HEADER_SIZE + 1]).is_err());
        assert!(DeviceCommand::parse(&bytes[..4]).is_err());
    }
}
