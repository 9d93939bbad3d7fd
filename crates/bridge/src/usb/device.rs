//! USB device information and per-device resources
//!
//! [`UsbDeviceInfo`] caches what the descriptors say about a device and turns
//! it into a [`DeviceDescription`] the host can match against its schemas.

use backend::{BackendHandle, DeviceLink};
use protocol::DeviceDescription;
use rusb::{Context, Device, DeviceDescriptor, DeviceHandle};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Interface name used in descriptions of USB devices
pub const USB_INTERFACE: &str = "USB";

/// Root hubs are VID 0x1d6b (Linux Foundation) with device class 9 (Hub)
const ROOT_HUB_VENDOR: u16 = 0x1d6b;
const HUB_CLASS: u8 = 9;

/// Cached descriptor information for one USB device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsbDeviceInfo {
    pub bus_number: u8,
    pub device_address: u8,
    pub vendor_id: u16,
    pub product_id: u16,
    pub class: u8,
    pub subclass: u8,
    pub protocol: u8,
    /// Device release number as "major.minor.sub"
    pub version: String,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
    pub serial_number: Option<String>,
}

/// Capabilities blob attached to USB descriptions
#[derive(Debug, Serialize)]
struct UsbCapabilities {
    vendor_id: u16,
    product_id: u16,
    class: u8,
    subclass: u8,
    protocol: u8,
}

impl UsbDeviceInfo {
    /// Read descriptor information from a device
    ///
    /// String descriptors are read best-effort: a device that cannot be
    /// opened still yields its numeric identifiers.
    pub fn read(device: &Device<Context>, descriptor: &DeviceDescriptor) -> Self {
        let strings = device
            .open()
            .ok()
            .map(|handle| read_string_descriptors(&handle, descriptor));
        let (manufacturer, product, serial_number) = strings.unwrap_or((None, None, None));

        let version = descriptor.device_version();
        Self {
            bus_number: device.bus_number(),
            device_address: device.address(),
            vendor_id: descriptor.vendor_id(),
            product_id: descriptor.product_id(),
            class: descriptor.class_code(),
            subclass: descriptor.sub_class_code(),
            protocol: descriptor.protocol_code(),
            version: format!(
                "{}.{}.{}",
                version.major(),
                version.minor(),
                version.sub_minor()
            ),
            manufacturer,
            product,
            serial_number,
        }
    }

    pub fn is_root_hub(&self) -> bool {
        is_root_hub(self.vendor_id, self.class)
    }

    /// Description the host matches against its schemas
    pub fn description(&self) -> DeviceDescription {
        let capabilities = UsbCapabilities {
            vendor_id: self.vendor_id,
            product_id: self.product_id,
            class: self.class,
            subclass: self.subclass,
            protocol: self.protocol,
        };

        let mut description = DeviceDescription::new(USB_INTERFACE)
            .with_device_class(class_name(self.class))
            .with_version(self.version.clone());
        if let Some(manufacturer) = &self.manufacturer {
            description = description.with_manufacturer(manufacturer.clone());
        }
        if let Some(product) = &self.product {
            description = description.with_product(product.clone());
        }
        if let Some(serial) = &self.serial_number {
            description = description.with_serial(serial.clone());
        }
        match serde_json::to_string(&capabilities) {
            Ok(json) => description.with_capabilities(json),
            Err(_) => description,
        }
    }
}

impl fmt::Display for UsbDeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04x}:{:04x} (bus {:03} addr {:03})",
            self.vendor_id, self.product_id, self.bus_number, self.device_address
        )
    }
}

/// Whether a VID/class pair identifies a root hub
pub fn is_root_hub(vendor_id: u16, class: u8) -> bool {
    vendor_id == ROOT_HUB_VENDOR && class == HUB_CLASS
}

/// Human-readable name of a USB device class code
pub fn class_name(class: u8) -> String {
    match class {
        0x00 => "Interface".to_string(),
        0x01 => "Audio".to_string(),
        0x02 => "CDC".to_string(),
        0x03 => "HID".to_string(),
        0x08 => "Mass Storage".to_string(),
        0x09 => "Hub".to_string(),
        0xE0 => "Wireless".to_string(),
        0xEF => "Miscellaneous".to_string(),
        0xFF => "Vendor Specific".to_string(),
        other => format!("0x{:02x}", other),
    }
}

fn read_string_descriptors(
    handle: &DeviceHandle<Context>,
    descriptor: &DeviceDescriptor,
) -> (Option<String>, Option<String>, Option<String>) {
    let manufacturer = descriptor
        .manufacturer_string_index()
        .and_then(|idx| handle.read_string_descriptor_ascii(idx).ok());

    let product = descriptor
        .product_string_index()
        .and_then(|idx| handle.read_string_descriptor_ascii(idx).ok());

    let serial_number = descriptor
        .serial_number_string_index()
        .and_then(|idx| handle.read_string_descriptor_ascii(idx).ok());

    (manufacturer, product, serial_number)
}

/// Context handed to the backend with a USB device addition
#[derive(Debug)]
pub struct UsbAttachment {
    pub info: UsbDeviceInfo,
    /// Shared with the watcher-side [`UsbDeviceResource`]
    pub link: DeviceLink,
}

/// Watcher-side resource for a recognized USB device
///
/// Dropping it (the device was unplugged, or the watcher shut down) asks the
/// host to remove the device it was created as, if any. A device that was
/// still queued is refused when the owning thread gets to it.
pub struct UsbDeviceResource {
    info: UsbDeviceInfo,
    link: DeviceLink,
    handle: BackendHandle<UsbAttachment>,
}

impl UsbDeviceResource {
    pub fn new(info: UsbDeviceInfo, link: DeviceLink, handle: BackendHandle<UsbAttachment>) -> Self {
        Self { info, link, handle }
    }

    pub fn info(&self) -> &UsbDeviceInfo {
        &self.info
    }

    pub fn link(&self) -> &DeviceLink {
        &self.link
    }
}

impl fmt::Debug for UsbDeviceResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UsbDeviceResource")
            .field("info", &self.info)
            .field("link", &self.link)
            .finish()
    }
}

impl Drop for UsbDeviceResource {
    fn drop(&mut self) {
        match self.link.release() {
            Some(device) => {
                debug!("USB device {} left, removing {}", self.info, device);
                self.handle.queue_device_remove(device);
            }
            None => debug!("USB device {} left before host creation", self.info),
        }
    }
}
