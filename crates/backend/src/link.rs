//! Producer-side link to a host device
//!
//! A device discovered on a background thread does not know its host handle
//! when it is queued; the handle only exists after the owning thread created
//! the device. A [`DeviceLink`] is shared between the producer-side resource
//! and the addition context, bound by the backend's `on_device_added` hook,
//! and released by the producer when the hardware goes away so it can
//! request removal.
//!
//! Release is final. A link released before the owning thread got to bind it
//! refuses the bind, so the backend can reject a device whose hardware is
//! already gone instead of leaving it in the host.

use protocol::DeviceHandle;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum LinkState {
    #[default]
    Unbound,
    Bound(DeviceHandle),
    Released,
}

/// The producer released the link before the host device was bound
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("device link released before {0} was bound")]
pub struct LinkReleased(pub DeviceHandle);

#[derive(Debug, Clone, Default)]
pub struct DeviceLink {
    state: Arc<Mutex<LinkState>>,
}

impl DeviceLink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the host handle the device was created as
    pub fn bind(&self, handle: DeviceHandle) -> Result<(), LinkReleased> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state == LinkState::Released {
            return Err(LinkReleased(handle));
        }
        *state = LinkState::Bound(handle);
        Ok(())
    }

    /// Forget the host handle after the host removed the device
    ///
    /// A released link stays released.
    pub fn unbind(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if let LinkState::Bound(_) = *state {
            *state = LinkState::Unbound;
        }
    }

    /// Mark the producer side gone, returning the handle if one was bound
    pub fn release(&self) -> Option<DeviceHandle> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match std::mem::replace(&mut *state, LinkState::Released) {
            LinkState::Bound(handle) => Some(handle),
            LinkState::Unbound | LinkState::Released => None,
        }
    }

    pub fn handle(&self) -> Option<DeviceHandle> {
        match *self.state.lock().unwrap_or_else(PoisonError::into_inner) {
            LinkState::Bound(handle) => Some(handle),
            LinkState::Unbound | LinkState::Released => None,
        }
    }

    pub fn is_released(&self) -> bool {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) == LinkState::Released
    }
}
