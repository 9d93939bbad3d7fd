//! Test doubles for the host and backend traits
//!
//! [`MockHost`] records every call the core makes and accepts descriptions
//! whose interface it has a schema for. [`RecordingBackend`] records every
//! hook invocation and can be told to fail.
//!
//! # Example
//!
//! ```
//! use backend::BackendCore;
//! use backend::test_utils::{MockContext, MockHost, RecordingBackend};
//! use common::test_utils::create_mock_description;
//!
//! let mut core = BackendCore::new(RecordingBackend::new(), MockHost::new());
//! core.handle().queue_device_add(create_mock_description(1), MockContext::new(1));
//! core.tick();
//! assert_eq!(core.device_count(), 1);
//! core.shutdown();
//! ```

use crate::backend_core::BackendCore;
use crate::hooks::Backend;
use crate::host::{CreateDeviceError, DeviceChange, Host};
use anyhow::anyhow;
use common::test_utils::{DropCounter, DropToken, MOCK_INTERFACE};
use protocol::{DeviceCommand, DeviceDescription, DeviceHandle, EventRef, FourCC, REMOVE_EVENT};
use std::collections::{BTreeSet, HashSet};

/// Host double that records every call
#[derive(Debug)]
pub struct MockHost {
    /// Interfaces this host has a schema for
    pub schemas: HashSet<String>,
    /// Make every creation fail with a non-schema error
    pub fail_create: bool,
    /// Devices whose events fail to send
    pub fail_events_for: HashSet<DeviceHandle>,
    /// Number of `create_device` calls
    pub create_calls: usize,
    /// Devices created, in order
    pub created: Vec<(DeviceHandle, DeviceDescription)>,
    /// Devices currently alive in the host
    pub live: BTreeSet<DeviceHandle>,
    /// `remove_device` calls, in order
    pub removed: Vec<DeviceHandle>,
    /// Every event accepted, as raw bytes
    pub events: Vec<Vec<u8>>,
    /// Whether `detach` was called
    pub detached: bool,
    next_handle: u32,
}

impl Default for MockHost {
    fn default() -> Self {
        Self::new()
    }
}

impl MockHost {
    /// A host that knows the mock interface
    pub fn new() -> Self {
        Self::with_schemas([MOCK_INTERFACE])
    }

    pub fn with_schemas<I, S>(schemas: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            schemas: schemas.into_iter().map(Into::into).collect(),
            fail_create: false,
            fail_events_for: HashSet::new(),
            create_calls: 0,
            created: Vec::new(),
            live: BTreeSet::new(),
            removed: Vec::new(),
            events: Vec::new(),
            detached: false,
            next_handle: 1,
        }
    }

    /// Parsed view of every accepted event
    pub fn event_refs(&self) -> Vec<EventRef<'_>> {
        self.events
            .iter()
            .filter_map(|bytes| EventRef::parse(bytes).ok())
            .collect()
    }

    /// State payloads sent for `device`, in order
    pub fn state_payloads(&self, device: DeviceHandle) -> Vec<(FourCC, Vec<u8>)> {
        self.event_refs()
            .into_iter()
            .filter(|event| event.device() == device)
            .filter_map(|event| event.state_payload())
            .map(|(format, state)| (format, state.to_vec()))
            .collect()
    }

    /// Act on removal requests the way a real host would
    ///
    /// Every live device that received a removal event is removed from the
    /// host, and the handles are returned so the test can notify the core.
    pub fn take_remove_requests(&mut self) -> Vec<DeviceHandle> {
        let requested: Vec<DeviceHandle> = self
            .event_refs()
            .into_iter()
            .filter(|event| event.kind() == REMOVE_EVENT)
            .map(|event| event.device())
            .collect();

        requested
            .into_iter()
            .filter(|handle| self.live.remove(handle))
            .collect()
    }
}

impl Host for MockHost {
    fn create_device(
        &mut self,
        description: &DeviceDescription,
    ) -> Result<DeviceHandle, CreateDeviceError> {
        self.create_calls += 1;
        if !self.schemas.contains(&description.interface) {
            return Err(CreateDeviceError::NoMatchingSchema {
                description: description.to_string(),
            });
        }
        if self.fail_create {
            return Err(anyhow!("mock host refused device").into());
        }

        let handle = DeviceHandle(self.next_handle);
        self.next_handle += 1;
        self.created.push((handle, description.clone()));
        self.live.insert(handle);
        Ok(handle)
    }

    fn remove_device(&mut self, handle: DeviceHandle) {
        self.live.remove(&handle);
        self.removed.push(handle);
    }

    fn send_event(&mut self, event: EventRef<'_>) -> anyhow::Result<()> {
        if self.fail_events_for.contains(&event.device()) {
            return Err(anyhow!("mock host rejected event for {}", event.device()));
        }
        self.events.push(event.as_bytes().to_vec());
        Ok(())
    }

    fn detach(&mut self) {
        self.detached = true;
    }
}

/// Addition context carrying a tag and an optional drop token
#[derive(Debug)]
pub struct MockContext {
    pub tag: u32,
    _token: Option<DropToken>,
}

impl MockContext {
    pub fn new(tag: u32) -> Self {
        Self { tag, _token: None }
    }

    /// A context whose release is counted by `counter`
    pub fn tracked(tag: u32, counter: &DropCounter) -> Self {
        Self {
            tag,
            _token: Some(counter.token()),
        }
    }
}

/// Backend state created for each device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockDevice {
    pub handle: DeviceHandle,
    pub tag: u32,
}

/// Backend double that records every hook call
#[derive(Default)]
pub struct RecordingBackend {
    /// Make `on_device_added` fail
    pub fail_added: bool,
    /// Result returned by `on_device_command`
    pub command_result: Option<i64>,
    pub added: Vec<MockDevice>,
    pub removed: Vec<MockDevice>,
    pub commands: Vec<(DeviceHandle, FourCC, Vec<u8>)>,
    pub updates: usize,
    pub shutdowns: usize,
    /// Extra work run from `on_update`
    pub update_hook: Option<Box<dyn FnMut()>>,
}

impl std::fmt::Debug for RecordingBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordingBackend")
            .field("added", &self.added.len())
            .field("removed", &self.removed.len())
            .field("updates", &self.updates)
            .finish()
    }
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Backend for RecordingBackend {
    type Device = MockDevice;
    type Context = MockContext;

    fn on_device_added(
        &mut self,
        handle: DeviceHandle,
        context: &mut MockContext,
    ) -> anyhow::Result<MockDevice> {
        if self.fail_added {
            return Err(anyhow!("mock backend failed to add {}", handle));
        }
        let device = MockDevice {
            handle,
            tag: context.tag,
        };
        self.added.push(device.clone());
        Ok(device)
    }

    fn on_device_removed(&mut self, device: MockDevice) {
        self.removed.push(device);
    }

    fn on_update(&mut self) {
        self.updates += 1;
        if let Some(hook) = self.update_hook.as_mut() {
            hook();
        }
    }

    fn on_device_command(
        &mut self,
        device: &mut MockDevice,
        command: &DeviceCommand<'_>,
    ) -> Option<i64> {
        self.commands
            .push((device.handle, command.kind, command.payload.to_vec()));
        self.command_result
    }

    fn on_shutdown(&mut self) {
        self.shutdowns += 1;
    }
}

/// Let the mock host act on removal requests and notify the core
///
/// Returns how many devices were removed.
pub fn process_host_removals<B: Backend>(core: &mut BackendCore<B, MockHost>) -> usize {
    let removed = core.host_mut().take_remove_requests();
    for handle in &removed {
        core.on_device_change(*handle, DeviceChange::Removed);
    }
    removed.len()
}
