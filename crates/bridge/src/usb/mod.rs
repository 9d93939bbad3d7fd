//! USB transport
//!
//! Enumerates USB devices through libusb and classifies them for the
//! hotplug watcher:
//! - [`UsbTransport`] lists `(bus, address)` identifiers and reads descriptors
//! - [`FilterProber`] recognizes devices matching VID:PID filters
//! - [`UsbDeviceResource`] requests host removal when its device leaves

pub mod device;
pub mod prober;
pub mod transport;

pub use device::{USB_INTERFACE, UsbAttachment, UsbDeviceInfo, UsbDeviceResource};
pub use prober::{FilterProber, UsbProber, matches_filters};
pub use transport::{UsbId, UsbTransport, list_usb_devices};
