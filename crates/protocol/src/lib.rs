//! Event wire format for input-bridge
//!
//! This crate defines the binary records exchanged between device producers
//! and the host input pipeline: event headers, device state events, device
//! removal events, device command buffers, and the device descriptions handed
//! to the host when asking it to create a device.
//!
//! # Example
//!
//! ```
//! use protocol::{DeviceHandle, EventRef, FourCC, StateEventBuf, STATE_EVENT};
//!
//! let format = FourCC::new(b"HID ");
//! let event = StateEventBuf::new(DeviceHandle(7), format, &[1, 2, 3]).unwrap();
//!
//! let record = EventRef::parse(event.as_bytes()).unwrap();
//! assert_eq!(record.kind(), STATE_EVENT);
//! assert_eq!(record.device(), DeviceHandle(7));
//! assert_eq!(record.state_payload(), Some((format, &[1u8, 2, 3][..])));
//! ```
//!
//! # Record Layout
//!
//! All integers are little-endian.
//!
//! ```text
//! [kind: FourCC][size: u32][device: u32][payload ...]
//! ```
//!
//! `size` counts the whole record, header included, so a buffer of records
//! can be walked without any external framing.

pub mod command;
pub mod error;
pub mod events;
pub mod types;

pub use command::{COMMAND_HEADER_SIZE, DeviceCommand, GENERIC_FAILURE};
pub use error::{ProtocolError, Result};
pub use events::{
    EventHeader, EventRef, HEADER_SIZE, MAX_STATE_SIZE, MAX_STATE_EVENT_SIZE, REMOVE_EVENT,
    RemoveEvent, STATE_EVENT, STATE_EVENT_OVERHEAD, StateEventBuf, StateFormat,
};
pub use types::{DeviceDescription, DeviceHandle, FourCC};
