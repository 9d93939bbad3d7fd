//! USB device flow tests
//!
//! Follows a USB device from classification through host creation to
//! removal, without touching real hardware: descriptor information is built
//! by hand and handed to the prober's classification step.
//!
//! Run with: `cargo test -p bridge --test usb_flow_tests`

use backend::{BackendCore, DeviceChange, TickSummary};
use bridge::usb::{FilterProber, USB_INTERFACE, UsbDeviceInfo, UsbDeviceResource};
use bridge::{LoggingHost, ProbeOutcome, UsbBridgeBackend};
use protocol::FourCC;

type Core = BackendCore<UsbBridgeBackend, LoggingHost>;

fn pad_info(address: u8) -> UsbDeviceInfo {
    UsbDeviceInfo {
        bus_number: 1,
        device_address: address,
        vendor_id: 0x045e,
        product_id: 0x0719,
        class: 0xFF,
        subclass: 0x5D,
        protocol: 0x81,
        version: "1.0.0".to_string(),
        manufacturer: Some("Microsoft".to_string()),
        product: Some("Wireless Receiver".to_string()),
        serial_number: Some(format!("RX{:04}", address)),
    }
}

fn root_hub_info() -> UsbDeviceInfo {
    UsbDeviceInfo {
        vendor_id: 0x1d6b,
        product_id: 0x0002,
        class: 9,
        ..pad_info(1)
    }
}

fn new_core(schemas: &[&str]) -> Core {
    BackendCore::new(
        UsbBridgeBackend::new(),
        LoggingHost::new(schemas.iter().copied()),
    )
}

/// Classify `info` and queue the addition, returning the watcher-side resource
fn attach(core: &Core, prober: &FilterProber, info: UsbDeviceInfo) -> Option<UsbDeviceResource> {
    match prober.classify(info) {
        ProbeOutcome::Recognized { resource, addition } => {
            if let Some(addition) = addition {
                core.handle()
                    .queue_device_add(addition.description, addition.context);
            }
            Some(resource)
        }
        ProbeOutcome::Unrecognized => None,
    }
}

/// One host cycle, with removals reported back the way the binary does
fn tick(core: &mut Core) -> TickSummary {
    let summary = core.tick();
    for handle in core.host_mut().take_removed() {
        core.on_device_change(handle, DeviceChange::Removed);
    }
    summary
}

#[test]
fn test_filtered_device_becomes_host_device() {
    let mut core = new_core(&[USB_INTERFACE]);
    let prober = FilterProber::new(vec!["0x045e:*".to_string()], core.handle());

    let resource = attach(&core, &prober, pad_info(4)).expect("device should be recognized");
    tick(&mut core);

    assert_eq!(core.device_count(), 1);
    let handle = resource.link().handle().expect("link bound by the backend");
    let device = core.device(handle).unwrap();
    assert_eq!(device.info, pad_info(4));

    let (_, description) = core.host().devices().next().unwrap();
    assert_eq!(description.interface, USB_INTERFACE);
    assert_eq!(description.product.as_deref(), Some("Wireless Receiver"));

    drop(resource);
    core.shutdown();
}

#[test]
fn test_root_hub_and_filtered_out_devices_ignored() {
    let mut core = new_core(&[USB_INTERFACE]);
    let prober = FilterProber::new(vec!["0x046d:0xc21d".to_string()], core.handle());

    assert!(attach(&core, &prober, root_hub_info()).is_none());
    assert!(attach(&core, &prober, pad_info(4)).is_none());

    let open = FilterProber::new(Vec::new(), core.handle());
    assert!(attach(&core, &open, root_hub_info()).is_none());
    assert!(attach(&core, &open, pad_info(4)).is_some());

    core.shutdown();
}

#[test]
fn test_unplug_removes_host_device() {
    let mut core = new_core(&[USB_INTERFACE]);
    let prober = FilterProber::new(Vec::new(), core.handle());

    let first = attach(&core, &prober, pad_info(4)).unwrap();
    let second = attach(&core, &prober, pad_info(5)).unwrap();
    tick(&mut core);
    assert_eq!(core.device_count(), 2);

    let handle = first.link().handle().unwrap();
    let state = [0u8; 20];
    core.handle()
        .queue_state_event(handle, FourCC::new(b"XINP"), &state);

    // Unplugging drops the watcher-side resource
    drop(first);
    tick(&mut core);

    assert_eq!(core.device_count(), 1);
    assert!(!core.contains_device(handle));
    assert_eq!(core.host().device_count(), 1);
    // The state event was delivered before the removal
    assert_eq!(core.host().events_received(), 2);

    drop(second);
    tick(&mut core);
    assert_eq!(core.device_count(), 0);
    core.shutdown();
}

#[test]
fn test_unplug_before_creation_leaves_nothing_in_host() {
    let mut core = new_core(&[USB_INTERFACE]);
    let prober = FilterProber::new(Vec::new(), core.handle());

    let resource = attach(&core, &prober, pad_info(4)).unwrap();
    let link = resource.link().clone();
    // Gone before the owning thread created it
    drop(resource);

    let summary = tick(&mut core);
    assert_eq!(summary.devices_added, 0);
    assert_eq!(summary.additions_discarded, 1);
    assert_eq!(core.device_count(), 0);
    assert_eq!(core.host().device_count(), 0);
    assert!(link.is_released());
    assert!(link.handle().is_none());

    tick(&mut core);
    assert_eq!(core.host().device_count(), 0);
    core.shutdown();
}

#[test]
fn test_unplug_racing_creation_from_watcher_thread() {
    let mut core = new_core(&[USB_INTERFACE]);
    let prober = FilterProber::new(Vec::new(), core.handle());
    let resource = attach(&core, &prober, pad_info(4)).unwrap();

    let unplug = std::thread::spawn(move || drop(resource));
    tick(&mut core);
    unplug.join().unwrap();
    // Either the bind was refused or the release queued a removal
    tick(&mut core);

    assert_eq!(core.device_count(), 0);
    assert_eq!(core.host().device_count(), 0);
    core.shutdown();
}

#[test]
fn test_no_schema_leaves_link_unbound() {
    let mut core = new_core(&["HID"]);
    let prober = FilterProber::new(Vec::new(), core.handle());

    let resource = attach(&core, &prober, pad_info(4)).unwrap();
    tick(&mut core);

    assert_eq!(core.device_count(), 0);
    assert!(resource.link().handle().is_none());

    // Nothing to remove
    drop(resource);
    tick(&mut core);
    assert_eq!(core.host().events_received(), 0);
    core.shutdown();
}

#[test]
fn test_shutdown_unbinds_and_detaches() {
    let mut core = new_core(&[USB_INTERFACE]);
    let prober = FilterProber::new(Vec::new(), core.handle());
    let resource = attach(&core, &prober, pad_info(4)).unwrap();
    tick(&mut core);

    core.shutdown();
    assert!(core.host().is_detached());
    assert_eq!(core.host().device_count(), 0);
    assert!(resource.link().handle().is_none());

    // Releasing after shutdown queues nothing
    drop(resource);
    assert_eq!(core.tick().events_sent, 0);
}
