//! USB device classification
//!
//! The transport hands each newly present device to a [`UsbProber`], which
//! decides whether the device is interesting and builds the resource the
//! watcher keeps for it.

use crate::transport::{ProbeOutcome, TransportError};
use crate::usb::device::{UsbAttachment, UsbDeviceInfo, UsbDeviceResource};
use backend::{BackendHandle, DeviceLink, PendingAddition};
use rusb::{Context, Device, DeviceDescriptor};
use tracing::debug;

/// Classifies USB devices for the transport
pub trait UsbProber: Send + 'static {
    type Resource: Send;
    type Context: Send + 'static;

    fn probe(
        &mut self,
        device: &Device<Context>,
        descriptor: &DeviceDescriptor,
    ) -> Result<ProbeOutcome<Self::Resource, Self::Context>, TransportError>;
}

/// Recognizes devices matching a list of VID:PID filters
///
/// An empty filter list recognizes every device except root hubs.
pub struct FilterProber {
    filters: Vec<String>,
    handle: BackendHandle<UsbAttachment>,
}

impl FilterProber {
    pub fn new(filters: Vec<String>, handle: BackendHandle<UsbAttachment>) -> Self {
        Self { filters, handle }
    }

    pub fn filters(&self) -> &[String] {
        &self.filters
    }

    /// Build the outcome for a device whose descriptors were already read
    pub fn classify(
        &self,
        info: UsbDeviceInfo,
    ) -> ProbeOutcome<UsbDeviceResource, UsbAttachment> {
        if info.is_root_hub() {
            debug!("Skipping root hub {}", info);
            return ProbeOutcome::Unrecognized;
        }
        if !matches_filters(info.vendor_id, info.product_id, &self.filters) {
            debug!("Device ignored by filter: {}", info);
            return ProbeOutcome::Unrecognized;
        }

        let link = DeviceLink::new();
        let addition = PendingAddition::new(
            info.description(),
            UsbAttachment {
                info: info.clone(),
                link: link.clone(),
            },
        );
        let resource = UsbDeviceResource::new(info, link, self.handle.clone());

        ProbeOutcome::Recognized {
            resource,
            addition: Some(addition),
        }
    }
}

impl UsbProber for FilterProber {
    type Resource = UsbDeviceResource;
    type Context = UsbAttachment;

    fn probe(
        &mut self,
        device: &Device<Context>,
        descriptor: &DeviceDescriptor,
    ) -> Result<ProbeOutcome<UsbDeviceResource, UsbAttachment>, TransportError> {
        // Skip opening devices that will be ignored anyway
        if is_excluded(descriptor, &self.filters) {
            return Ok(ProbeOutcome::Unrecognized);
        }
        Ok(self.classify(UsbDeviceInfo::read(device, descriptor)))
    }
}

fn is_excluded(descriptor: &DeviceDescriptor, filters: &[String]) -> bool {
    crate::usb::device::is_root_hub(descriptor.vendor_id(), descriptor.class_code())
        || !matches_filters(descriptor.vendor_id(), descriptor.product_id(), filters)
}

/// Check if a VID/PID pair is allowed by the filters
///
/// Filter format: `0xVID:0xPID`, either side may be `*`. Filters are
/// validated by the config loader; malformed ones never match.
pub fn matches_filters(vid: u16, pid: u16, filters: &[String]) -> bool {
    if filters.is_empty() {
        return true;
    }

    filters.iter().any(|filter| {
        let Some((filter_vid, filter_pid)) = filter.split_once(':') else {
            return false;
        };
        id_matches(filter_vid, vid) && id_matches(filter_pid, pid)
    })
}

fn id_matches(pattern: &str, id: u16) -> bool {
    if pattern == "*" {
        return true;
    }
    let hex = pattern
        .strip_prefix("0x")
        .or_else(|| pattern.strip_prefix("0X"))
        .unwrap_or(pattern);
    u16::from_str_radix(hex, 16)
        .map(|value| value == id)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_logic() {
        let filters = vec![
            "0x1234:0x5678".to_string(), // Exact match
            "0xABCD:*".to_string(),      // Wildcard PID
        ];

        assert!(matches_filters(0x1234, 0x5678, &filters));

        assert!(matches_filters(0xABCD, 0x1111, &filters));
        assert!(matches_filters(0xABCD, 0x9999, &filters));

        assert!(!matches_filters(0x1234, 0x9999, &filters)); // Wrong PID
        assert!(!matches_filters(0x9999, 0x5678, &filters)); // Wrong VID
        assert!(!matches_filters(0x0000, 0x0000, &filters));

        // Empty filters = allow all
        assert!(matches_filters(0x1234, 0x5678, &[]));
    }

    #[test]
    fn test_wildcard_vendor_and_malformed() {
        let filters = vec!["*:0x0719".to_string(), "garbage".to_string()];
        assert!(matches_filters(0x045e, 0x0719, &filters));
        assert!(!matches_filters(0x045e, 0x028e, &filters));
    }
}
