//! Logging host
//!
//! Stand-in for a real input pipeline: accepts descriptions whose interface
//! it has a schema for, assigns sequential handles, and logs every event it
//! receives. A removal event removes the device and queues a removal
//! notification for the core, the way a host reports device changes back.

use backend::{CreateDeviceError, Host};
use protocol::{DeviceDescription, DeviceHandle, EventRef, REMOVE_EVENT};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info, trace};

#[derive(Debug)]
pub struct LoggingHost {
    schemas: HashSet<String>,
    devices: BTreeMap<DeviceHandle, DeviceDescription>,
    removed: Vec<DeviceHandle>,
    next_handle: u32,
    events_received: u64,
    detached: bool,
}

impl LoggingHost {
    /// Create a host that knows the given interface names
    pub fn new<I, S>(schemas: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            schemas: schemas.into_iter().map(Into::into).collect(),
            devices: BTreeMap::new(),
            removed: Vec::new(),
            next_handle: 1,
            events_received: 0,
            detached: false,
        }
    }

    /// Devices currently alive in the host
    pub fn devices(&self) -> impl Iterator<Item = (DeviceHandle, &DeviceDescription)> {
        self.devices.iter().map(|(handle, desc)| (*handle, desc))
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    pub fn events_received(&self) -> u64 {
        self.events_received
    }

    pub fn is_detached(&self) -> bool {
        self.detached
    }

    /// Devices removed by removal events since the last call
    ///
    /// The caller reports each one to the core as a device change.
    pub fn take_removed(&mut self) -> Vec<DeviceHandle> {
        std::mem::take(&mut self.removed)
    }
}

impl Host for LoggingHost {
    fn create_device(
        &mut self,
        description: &DeviceDescription,
    ) -> Result<DeviceHandle, CreateDeviceError> {
        if !self.schemas.contains(&description.interface) {
            return Err(CreateDeviceError::NoMatchingSchema {
                description: description.to_string(),
            });
        }

        let handle = DeviceHandle(self.next_handle);
        self.next_handle += 1;
        self.devices.insert(handle, description.clone());
        info!("Host created device {}: {}", handle, description);
        Ok(handle)
    }

    fn remove_device(&mut self, handle: DeviceHandle) {
        if self.devices.remove(&handle).is_some() {
            info!("Host removed device {}", handle);
        }
    }

    fn send_event(&mut self, event: EventRef<'_>) -> anyhow::Result<()> {
        self.events_received += 1;
        let device = event.device();
        if !self.devices.contains_key(&device) {
            anyhow::bail!("no device {} in host", device);
        }

        if event.kind() == REMOVE_EVENT {
            self.devices.remove(&device);
            self.removed.push(device);
            info!("Host removed device {} on request", device);
        } else if let Some((format, state)) = event.state_payload() {
            trace!("{} state for {} ({} bytes)", format, device, state.len());
        } else {
            trace!("{} event for {} ({} bytes)", event.kind(), device, event.size());
        }
        Ok(())
    }

    fn detach(&mut self) {
        self.detached = true;
        debug!("Host hooks detached");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol::{FourCC, RemoveEvent, StateEventBuf};

    #[test]
    fn test_schema_matching() {
        let mut host = LoggingHost::new(["USB"]);
        assert!(matches!(
            host.create_device(&DeviceDescription::new("HID")),
            Err(CreateDeviceError::NoMatchingSchema { .. })
        ));
        assert_eq!(
            host.create_device(&DeviceDescription::new("USB")).unwrap(),
            DeviceHandle(1)
        );
        assert_eq!(host.device_count(), 1);
    }

    #[test]
    fn test_remove_event_reports_back() {
        let mut host = LoggingHost::new(["USB"]);
        let handle = host.create_device(&DeviceDescription::new("USB")).unwrap();

        let state = StateEventBuf::new(handle, FourCC::new(b"PAD "), &[1, 2, 3]).unwrap();
        host.send_event(EventRef::parse(state.as_bytes()).unwrap())
            .unwrap();
        assert!(host.take_removed().is_empty());

        let remove = RemoveEvent::new(handle);
        host.send_event(EventRef::parse(remove.as_bytes()).unwrap())
            .unwrap();
        assert_eq!(host.take_removed(), vec![handle]);
        assert_eq!(host.device_count(), 0);
        assert_eq!(host.events_received(), 2);
    }

    #[test]
    fn test_event_for_unknown_device_fails() {
        let mut host = LoggingHost::new(["USB"]);
        let remove = RemoveEvent::new(DeviceHandle(9));
        assert!(
            host.send_event(EventRef::parse(remove.as_bytes()).unwrap())
                .is_err()
        );
    }
}
