//! libusb-backed transport
//!
//! Devices are identified by `(bus, address)`, which stays stable for as long
//! as a device remains plugged in. The device list from the last enumeration
//! is kept so that probing does not re-enumerate the bus.

use crate::transport::{ProbeOutcome, Transport, TransportError};
use crate::usb::device::UsbDeviceInfo;
use crate::usb::prober::UsbProber;
use rusb::{Context, Device, UsbContext};
use std::collections::HashMap;
use tracing::{debug, trace, warn};

/// Bus number and device address
pub type UsbId = (u8, u8);

/// USB transport polled by the hotplug watcher
pub struct UsbTransport<P: UsbProber> {
    context: Context,
    prober: P,
    listed: HashMap<UsbId, Device<Context>>,
}

impl<P: UsbProber> UsbTransport<P> {
    /// Create the libusb context
    ///
    /// Failure here means USB is unusable and is returned to the caller.
    pub fn new(prober: P) -> Result<Self, TransportError> {
        let context = Context::new()?;
        debug!("USB context initialized");
        Ok(Self {
            context,
            prober,
            listed: HashMap::new(),
        })
    }

    pub fn prober(&self) -> &P {
        &self.prober
    }
}

impl<P: UsbProber> Transport for UsbTransport<P> {
    type Id = UsbId;
    type Resource = P::Resource;
    type Context = P::Context;

    fn list_devices(&mut self) -> Result<Vec<UsbId>, TransportError> {
        let devices = self.context.devices()?;

        self.listed.clear();
        for device in devices.iter() {
            self.listed
                .insert((device.bus_number(), device.address()), device);
        }
        trace!("Enumerated {} USB devices", self.listed.len());

        Ok(self.listed.keys().copied().collect())
    }

    fn probe(
        &mut self,
        id: UsbId,
    ) -> Result<ProbeOutcome<P::Resource, P::Context>, TransportError> {
        let device = self
            .listed
            .get(&id)
            .ok_or_else(|| TransportError::Gone(format!("bus {} addr {}", id.0, id.1)))?;
        let descriptor = device.device_descriptor()?;

        self.prober.probe(device, &descriptor)
    }
}

/// Enumerate the devices currently present, without watching
///
/// Root hubs are left out.
pub fn list_usb_devices() -> Result<Vec<UsbDeviceInfo>, TransportError> {
    let context = Context::new()?;
    let mut infos = Vec::new();

    for device in context.devices()?.iter() {
        let descriptor = match device.device_descriptor() {
            Ok(descriptor) => descriptor,
            Err(e) => {
                warn!(
                    "Failed to read descriptor for bus {} addr {}: {}",
                    device.bus_number(),
                    device.address(),
                    e
                );
                continue;
            }
        };
        let info = UsbDeviceInfo::read(&device, &descriptor);
        if !info.is_root_hub() {
            infos.push(info);
        }
    }

    infos.sort_by_key(|info| (info.bus_number, info.device_address));
    Ok(infos)
}
