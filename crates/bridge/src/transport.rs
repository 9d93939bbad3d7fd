//! Transport abstraction polled by the hotplug watcher
//!
//! A transport knows how to list the identifiers of the devices currently
//! present on it, and how to probe one identifier into an owned resource.
//! It never touches host state: recognized devices reach the host only as
//! [`PendingAddition`]s queued through the backend handle.

use backend::PendingAddition;
use std::fmt::Debug;
use std::hash::Hash;
use thiserror::Error;

/// Transport-level failure
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("USB error: {0}")]
    Usb(#[from] rusb::Error),

    #[error("Device {0} is no longer present")]
    Gone(String),

    #[error("Probe failed: {0}")]
    Probe(String),
}

/// Result of probing one device identifier
#[derive(Debug)]
pub enum ProbeOutcome<R, C> {
    /// The device is interesting
    ///
    /// `resource` is kept by the watcher for as long as the device stays
    /// present. `addition` is queued for host creation; devices that need no
    /// host-level device carry `None`.
    Recognized {
        resource: R,
        addition: Option<PendingAddition<C>>,
    },
    /// The device is of no interest and will not be probed again
    Unrecognized,
}

/// A hardware access layer the watcher polls for device presence
pub trait Transport: Send + 'static {
    /// Identifier stable for as long as a device stays attached
    type Id: Eq + Hash + Copy + Debug + Send;
    /// Per-device resource owned by the watcher
    type Resource: Send;
    /// Context handed to the backend along with a device addition
    type Context: Send + 'static;

    /// Identifiers of every device currently present
    fn list_devices(&mut self) -> Result<Vec<Self::Id>, TransportError>;

    /// Classify one device
    fn probe(
        &mut self,
        id: Self::Id,
    ) -> Result<ProbeOutcome<Self::Resource, Self::Context>, TransportError>;
}
