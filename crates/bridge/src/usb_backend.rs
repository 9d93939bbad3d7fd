//! Backend hooks for USB devices
//!
//! Keeps the per-device state the core stores for every USB device the host
//! created, and binds the producer-side [`DeviceLink`] so the watcher can
//! later request removal.

use crate::usb::{UsbAttachment, UsbDeviceInfo};
use backend::{Backend, DeviceLink};
use protocol::{DeviceCommand, DeviceHandle};
use anyhow::bail;
use tracing::{debug, info};

/// State kept for each created USB device
#[derive(Debug)]
pub struct UsbBridgeDevice {
    pub handle: DeviceHandle,
    pub info: UsbDeviceInfo,
    link: DeviceLink,
}

/// Backend for devices discovered by the USB watcher
#[derive(Debug, Default)]
pub struct UsbBridgeBackend {
    commands_seen: u64,
}

impl UsbBridgeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Device commands received so far
    pub fn commands_seen(&self) -> u64 {
        self.commands_seen
    }
}

impl Backend for UsbBridgeBackend {
    type Device = UsbBridgeDevice;
    type Context = UsbAttachment;

    fn on_device_added(
        &mut self,
        handle: DeviceHandle,
        context: &mut UsbAttachment,
    ) -> anyhow::Result<UsbBridgeDevice> {
        // Unplugged while queued: failing here rolls the host device back
        if let Err(e) = context.link.bind(handle) {
            bail!("USB device {} is gone: {}", context.info, e);
        }
        Ok(UsbBridgeDevice {
            handle,
            info: context.info.clone(),
            link: context.link.clone(),
        })
    }

    fn on_device_removed(&mut self, device: UsbBridgeDevice) {
        device.link.unbind();
        info!("USB device {} detached from {}", device.info, device.handle);
    }

    fn on_device_command(
        &mut self,
        device: &mut UsbBridgeDevice,
        command: &DeviceCommand<'_>,
    ) -> Option<i64> {
        self.commands_seen += 1;
        debug!(
            "Unhandled {} command ({} bytes) for {}",
            command.kind,
            command.payload.len(),
            device.handle
        );
        None
    }

    fn on_shutdown(&mut self) {
        debug!("USB backend shut down after {} commands", self.commands_seen);
    }
}
