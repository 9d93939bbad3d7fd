//! Device registry
//!
//! Maps host device handles to backend device state. Only the owning thread
//! touches it, always in lockstep with the host's own device set.

use protocol::DeviceHandle;
use std::collections::HashMap;

/// Registry of devices the host has accepted
#[derive(Debug)]
pub struct DeviceRegistry<D> {
    devices: HashMap<DeviceHandle, D>,
}

impl<D> Default for DeviceRegistry<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D> DeviceRegistry<D> {
    pub fn new() -> Self {
        Self {
            devices: HashMap::new(),
        }
    }

    /// Register a device, returning any state previously held for the handle
    pub fn insert(&mut self, handle: DeviceHandle, device: D) -> Option<D> {
        self.devices.insert(handle, device)
    }

    pub fn remove(&mut self, handle: DeviceHandle) -> Option<D> {
        self.devices.remove(&handle)
    }

    pub fn get(&self, handle: DeviceHandle) -> Option<&D> {
        self.devices.get(&handle)
    }

    pub fn get_mut(&mut self, handle: DeviceHandle) -> Option<&mut D> {
        self.devices.get_mut(&handle)
    }

    pub fn contains(&self, handle: DeviceHandle) -> bool {
        self.devices.contains_key(&handle)
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Handles of every registered device, in ascending order
    pub fn handles(&self) -> Vec<DeviceHandle> {
        let mut handles: Vec<_> = self.devices.keys().copied().collect();
        handles.sort_unstable();
        handles
    }

    /// Remove and yield every registered device
    pub fn drain(&mut self) -> impl Iterator<Item = (DeviceHandle, D)> + '_ {
        self.devices.drain()
    }
}
