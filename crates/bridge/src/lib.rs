//! input-bridge: hotplug discovery feeding the backend core
//!
//! A [`HotplugWatcher`] polls a [`Transport`] on its own thread and queues
//! recognized devices into a [`backend::BackendCore`] through its handle.
//! The USB transport is built on libusb; the logging host stands in for a
//! real input pipeline.

pub mod config;
pub mod host;
pub mod transport;
pub mod usb;
pub mod usb_backend;
pub mod watcher;

pub use config::BridgeConfig;
pub use host::LoggingHost;
pub use transport::{ProbeOutcome, Transport, TransportError};
pub use usb_backend::{UsbBridgeBackend, UsbBridgeDevice};
pub use watcher::{DEFAULT_POLL_INTERVAL, HotplugWatcher, PollSummary, WatchState};
