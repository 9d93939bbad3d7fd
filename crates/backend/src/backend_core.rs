//! Backend core
//!
//! The single authority that turns cross-thread device and event traffic into
//! host mutations. It lives on the owning thread for its whole life: it is
//! deliberately `!Send`, and every host-facing method takes `&mut self`, so
//! ticks can neither run concurrently nor from another thread.

use crate::additions::{AdditionQueue, PendingAddition};
use crate::double_buffer::DoubleBuffer;
use crate::handle::BackendHandle;
use crate::hooks::Backend;
use crate::host::{CreateDeviceError, DeviceChange, Host};
use crate::registry::DeviceRegistry;
use protocol::{DeviceCommand, DeviceHandle, GENERIC_FAILURE};
use std::marker::PhantomData;
use tracing::{debug, error, info, trace, warn};

/// What a single tick did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    /// Devices created and registered
    pub devices_added: usize,
    /// Queued additions that did not result in a device
    pub additions_discarded: usize,
    /// Events the host accepted
    pub events_sent: usize,
    /// Events the host failed to accept
    pub events_failed: usize,
}

/// Owning-thread side of the backend
pub struct BackendCore<B: Backend, H: Host> {
    backend: B,
    host: H,
    registry: DeviceRegistry<B::Device>,
    additions: AdditionQueue<B::Context>,
    buffers: DoubleBuffer,
    shut_down: bool,
    /// Pins the core to the thread that created it
    _owning_thread: PhantomData<*const ()>,
}

impl<B: Backend, H: Host> BackendCore<B, H> {
    /// Create a core on the current (owning) thread
    pub fn new(backend: B, host: H) -> Self {
        Self {
            backend,
            host,
            registry: DeviceRegistry::new(),
            additions: AdditionQueue::new(),
            buffers: DoubleBuffer::new(),
            shut_down: false,
            _owning_thread: PhantomData,
        }
    }

    /// Create a producer handle
    pub fn handle(&self) -> BackendHandle<B::Context> {
        BackendHandle::new(self.additions.sender(), self.buffers.writer())
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// Number of registered devices
    pub fn device_count(&self) -> usize {
        self.registry.len()
    }

    pub fn contains_device(&self, handle: DeviceHandle) -> bool {
        self.registry.contains(handle)
    }

    pub fn device(&self, handle: DeviceHandle) -> Option<&B::Device> {
        self.registry.get(handle)
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    /// Run one host cycle
    ///
    /// Creates every queued device, seals the event batch, runs the backend
    /// update hook, then delivers the sealed batch. Events the hook queues go
    /// out with the next tick. Does nothing after shutdown.
    pub fn tick(&mut self) -> TickSummary {
        let mut summary = TickSummary::default();
        if self.shut_down {
            return summary;
        }

        self.process_additions(&mut summary);
        self.buffers.seal();
        self.backend.on_update();
        self.flush_events(&mut summary);

        if summary != TickSummary::default() {
            trace!(?summary, "Tick complete");
        }
        summary
    }

    fn process_additions(&mut self, summary: &mut TickSummary) {
        while let Some(pending) = self.additions.try_take() {
            if self.add_device(pending) {
                summary.devices_added += 1;
            } else {
                summary.additions_discarded += 1;
            }
        }
    }

    /// Create and register one device
    ///
    /// The context is released when this returns, on every path.
    fn add_device(&mut self, pending: PendingAddition<B::Context>) -> bool {
        let PendingAddition {
            description,
            mut context,
        } = pending;

        let handle = match self.host.create_device(&description) {
            Ok(handle) => handle,
            Err(CreateDeviceError::NoMatchingSchema { .. }) => return false,
            Err(e) => {
                error!("Failed to add device '{}' to the host: {:#}", description, e);
                return false;
            }
        };

        match self.backend.on_device_added(handle, &mut context) {
            Ok(device) => {
                if let Some(stale) = self.registry.insert(handle, device) {
                    warn!("Host reused live handle {}, dropping stale state", handle);
                    self.backend.on_device_removed(stale);
                }
                info!("Device {} added: {}", handle, description);
                true
            }
            Err(e) => {
                self.host.remove_device(handle);
                error!("Error in device added hook for {}: {:#}", handle, e);
                false
            }
        }
    }

    fn flush_events(&mut self, summary: &mut TickSummary) {
        let host = &mut self.host;
        self.buffers.drain(|event| match host.send_event(event) {
            Ok(()) => summary.events_sent += 1,
            Err(e) => {
                summary.events_failed += 1;
                error!(
                    "Error flushing {} event for device {}: {:#}",
                    event.kind(),
                    event.device(),
                    e
                );
            }
        });
    }

    /// Host notification that a device changed
    ///
    /// Only removal matters here. Unknown handles are ignored: the device was
    /// already removed, or belongs to someone else.
    pub fn on_device_change(&mut self, handle: DeviceHandle, change: DeviceChange) {
        if self.shut_down || change != DeviceChange::Removed {
            return;
        }

        let Some(device) = self.registry.remove(handle) else {
            return;
        };
        self.backend.on_device_removed(device);
        debug!("Device {} removed", handle);
    }

    /// Host command addressed to a device
    ///
    /// `None` means no opinion. A missing or malformed command buffer yields
    /// [`GENERIC_FAILURE`].
    pub fn device_command(
        &mut self,
        device: Option<DeviceHandle>,
        command: Option<&[u8]>,
    ) -> Option<i64> {
        if self.shut_down {
            return None;
        }
        let handle = device?;
        let Some(bytes) = command else {
            return Some(GENERIC_FAILURE);
        };
        let command = match DeviceCommand::parse(bytes) {
            Ok(command) => command,
            Err(e) => {
                debug!("Invalid command buffer for device {}: {}", handle, e);
                return Some(GENERIC_FAILURE);
            }
        };

        let state = self.registry.get_mut(handle)?;
        self.backend.on_device_command(state, &command)
    }

    /// Tear everything down
    ///
    /// Detaches from the host first, then removes every registered device
    /// from both the backend and the host, then releases the queues. Safe to
    /// call more than once; only the first call does anything.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;

        self.host.detach();

        let discarded = self.additions.close();
        if discarded > 0 {
            debug!("Discarded {} pending device additions", discarded);
        }
        self.buffers.close();

        let count = self.registry.len();
        for (handle, device) in self.registry.drain() {
            self.backend.on_device_removed(device);
            self.host.remove_device(handle);
        }

        self.backend.on_shutdown();
        self.buffers.release();

        info!("Backend shut down, removed {} devices", count);
    }
}

impl<B: Backend, H: Host> Drop for BackendCore<B, H> {
    fn drop(&mut self) {
        if !self.shut_down {
            // Host resources cannot be reclaimed from here
            error!(
                "Input backend {} was not shut down; {} devices leaked in the host",
                std::any::type_name::<B>(),
                self.registry.len()
            );
        }
    }
}
