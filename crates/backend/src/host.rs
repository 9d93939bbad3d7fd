//! Host collaborator interface
//!
//! The host is the input-processing runtime devices and events are fed into.
//! All of these calls happen on the owning thread.

use protocol::{DeviceDescription, DeviceHandle, EventRef};
use thiserror::Error;

/// Why the host refused to create a device
#[derive(Debug, Error)]
pub enum CreateDeviceError {
    /// No schema matches the description; expected for most probed devices
    #[error("No schema matches device '{description}'")]
    NoMatchingSchema { description: String },

    /// Any other failure
    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

/// Device lifecycle notifications delivered by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceChange {
    Added,
    Removed,
    Reconnected,
    ConfigurationChanged,
}

/// The host input pipeline
pub trait Host {
    /// Create a device matching `description`
    fn create_device(
        &mut self,
        description: &DeviceDescription,
    ) -> Result<DeviceHandle, CreateDeviceError>;

    /// Remove a device previously returned by [`Host::create_device`]
    fn remove_device(&mut self, handle: DeviceHandle);

    /// Deliver one event record; failures affect this record only
    fn send_event(&mut self, event: EventRef<'_>) -> anyhow::Result<()>;

    /// Stop invoking the core's lifecycle hooks
    ///
    /// Called first during shutdown, before any device is torn down.
    fn detach(&mut self) {}
}
