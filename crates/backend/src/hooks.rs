//! Hooks a concrete backend supplies to the core

use protocol::{DeviceCommand, DeviceHandle};

/// A concrete input backend
///
/// All hooks run on the owning thread, from inside
/// [`BackendCore`](crate::BackendCore) calls.
pub trait Backend {
    /// Backend-specific state kept per created device
    type Device;

    /// Disposable context queued along with a device description
    type Context: Send + 'static;

    /// Build backend state for a device the host just created
    ///
    /// The context is dropped once this returns, whatever the outcome. On
    /// error the host device is removed again and nothing is registered.
    fn on_device_added(
        &mut self,
        handle: DeviceHandle,
        context: &mut Self::Context,
    ) -> anyhow::Result<Self::Device>;

    /// Tear down backend state for a device the host removed
    fn on_device_removed(&mut self, device: Self::Device);

    /// Per-tick work, after additions and before the event flush
    ///
    /// The batch this tick delivers is sealed before the hook runs, so events
    /// queued from here go out with the next tick's flush. That is one host
    /// frame of latency for state produced in the hook; producers that need
    /// same-frame delivery must queue before the tick.
    fn on_update(&mut self) {}

    /// Answer a host command addressed to one of this backend's devices
    fn on_device_command(
        &mut self,
        _device: &mut Self::Device,
        _command: &DeviceCommand<'_>,
    ) -> Option<i64> {
        None
    }

    /// Final cleanup, after every device has been removed
    fn on_shutdown(&mut self) {}
}
