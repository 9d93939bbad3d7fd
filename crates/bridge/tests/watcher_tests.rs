//! Hotplug watcher tests
//!
//! Drives the watch cycle against a scripted transport whose device list and
//! probe results the test controls.
//!
//! Run with: `cargo test -p bridge --test watcher_tests`

use backend::test_utils::{MockContext, MockHost, RecordingBackend};
use backend::{BackendCore, PendingAddition};
use bridge::{HotplugWatcher, ProbeOutcome, Transport, TransportError, WatchState};
use common::test_utils::{
    DEFAULT_TEST_TIMEOUT, DropCounter, DropToken, create_mock_description, wait_until,
};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// How the scripted transport answers a probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Behavior {
    /// Recognized and queued for host creation
    Device,
    /// Recognized but kept by the watcher only
    Resident,
    Unrecognized,
    Error,
    Panic,
}

#[derive(Debug)]
struct ScriptedResource {
    _id: u32,
    _token: DropToken,
}

/// Script shared between the test and the transport
#[derive(Debug, Default)]
struct Script {
    present: Vec<(u32, Option<Behavior>)>,
    fail_listing: bool,
    probes: Vec<u32>,
}

struct ScriptedTransport {
    script: Arc<Mutex<Script>>,
    resources: DropCounter,
    _transport_token: DropToken,
}

impl ScriptedTransport {
    fn new(script: Arc<Mutex<Script>>, resources: DropCounter, transport: &DropCounter) -> Self {
        Self {
            script,
            resources,
            _transport_token: transport.token(),
        }
    }
}

impl Transport for ScriptedTransport {
    type Id = u32;
    type Resource = ScriptedResource;
    type Context = MockContext;

    fn list_devices(&mut self) -> Result<Vec<u32>, TransportError> {
        let script = self.script.lock().unwrap();
        if script.fail_listing {
            return Err(TransportError::Probe("bus unavailable".to_string()));
        }
        Ok(script.present.iter().map(|(id, _)| *id).collect())
    }

    fn probe(
        &mut self,
        id: u32,
    ) -> Result<ProbeOutcome<ScriptedResource, MockContext>, TransportError> {
        let behavior = {
            let mut script = self.script.lock().unwrap();
            script.probes.push(id);
            script
                .present
                .iter()
                .find(|(present, _)| *present == id)
                .and_then(|(_, behavior)| *behavior)
        };

        let resource = || ScriptedResource {
            _id: id,
            _token: self.resources.token(),
        };
        match behavior {
            Some(Behavior::Device) => Ok(ProbeOutcome::Recognized {
                resource: resource(),
                addition: Some(PendingAddition::new(
                    create_mock_description(id),
                    MockContext::new(id),
                )),
            }),
            Some(Behavior::Resident) => Ok(ProbeOutcome::Recognized {
                resource: resource(),
                addition: None,
            }),
            Some(Behavior::Unrecognized) | None => Ok(ProbeOutcome::Unrecognized),
            Some(Behavior::Error) => Err(TransportError::Probe(format!("device {} stalled", id))),
            Some(Behavior::Panic) => panic!("probe of device {} exploded", id),
        }
    }
}

struct Fixture {
    script: Arc<Mutex<Script>>,
    resources: DropCounter,
    transports: DropCounter,
    core: BackendCore<RecordingBackend, MockHost>,
}

impl Fixture {
    fn new() -> Self {
        Self {
            script: Arc::new(Mutex::new(Script::default())),
            resources: DropCounter::new(),
            transports: DropCounter::new(),
            core: BackendCore::new(RecordingBackend::new(), MockHost::new()),
        }
    }

    fn transport(&self) -> ScriptedTransport {
        ScriptedTransport::new(self.script.clone(), self.resources.clone(), &self.transports)
    }

    fn set_present(&self, devices: &[(u32, Behavior)]) {
        self.script.lock().unwrap().present = devices
            .iter()
            .map(|(id, behavior)| (*id, Some(*behavior)))
            .collect();
    }

    fn probes(&self) -> Vec<u32> {
        self.script.lock().unwrap().probes.clone()
    }
}

impl Drop for Fixture {
    fn drop(&mut self) {
        self.core.shutdown();
    }
}

#[test]
fn test_recognized_device_is_queued_once() {
    let mut fx = Fixture::new();
    let mut transport = fx.transport();
    let handle = fx.core.handle();
    let mut state = WatchState::new();

    fx.set_present(&[(1, Behavior::Device)]);
    let summary = state.poll_once(&mut transport, &handle);
    assert_eq!(summary.probed, 1);
    assert_eq!(summary.recognized, 1);
    assert!(state.is_known(&1));

    // Known devices are not probed again
    let summary = state.poll_once(&mut transport, &handle);
    assert_eq!(summary.probed, 0);
    assert_eq!(fx.probes(), vec![1]);

    fx.core.tick();
    assert_eq!(fx.core.device_count(), 1);
}

#[test]
fn test_unrecognized_never_reprobed() {
    let fx = Fixture::new();
    let mut transport = fx.transport();
    let handle = fx.core.handle();
    let mut state = WatchState::new();

    fx.set_present(&[(7, Behavior::Unrecognized), (8, Behavior::Error)]);
    for _ in 0..5 {
        state.poll_once(&mut transport, &handle);
    }

    let probes = fx.probes();
    assert_eq!(probes.iter().filter(|id| **id == 7).count(), 1);
    assert_eq!(probes.iter().filter(|id| **id == 8).count(), 1);
    assert!(state.is_ignored(&7));
    assert!(state.is_ignored(&8));
    assert_eq!(state.known_count(), 0);
}

#[test]
fn test_reused_id_probed_after_unsupported_device_left() {
    let mut fx = Fixture::new();
    let mut transport = fx.transport();
    let handle = fx.core.handle();
    let mut state = WatchState::new();

    fx.set_present(&[(5, Behavior::Unrecognized)]);
    state.poll_once(&mut transport, &handle);
    assert!(state.is_ignored(&5));

    fx.set_present(&[]);
    state.poll_once(&mut transport, &handle);
    assert!(!state.is_ignored(&5));

    // Same address, different device
    fx.set_present(&[(5, Behavior::Device)]);
    let summary = state.poll_once(&mut transport, &handle);
    assert_eq!(summary.probed, 1);
    assert_eq!(summary.recognized, 1);
    assert!(state.is_known(&5));
    assert_eq!(fx.probes(), vec![5, 5]);

    fx.core.tick();
    assert_eq!(fx.core.device_count(), 1);
}

#[test]
fn test_survives_consecutive_probe_failures() {
    let fx = Fixture::new();
    let mut transport = fx.transport();
    let handle = fx.core.handle();
    let mut state = WatchState::new();

    // A fresh failing device every cycle, half of them panicking
    for cycle in 0..20u32 {
        let behavior = if cycle % 2 == 0 {
            Behavior::Error
        } else {
            Behavior::Panic
        };
        fx.set_present(&[(100 + cycle, behavior)]);
        let summary = state.poll_once(&mut transport, &handle);
        assert_eq!(summary.failed, 1, "cycle {}", cycle);
    }
    // Each failed id left the listing the cycle after, so only the last
    // one is still ignored
    assert_eq!(state.ignored_count(), 1);

    // Still polling and still recognizing afterwards
    fx.set_present(&[(1, Behavior::Device)]);
    let summary = state.poll_once(&mut transport, &handle);
    assert_eq!(summary.recognized, 1);
}

#[test]
fn test_listing_failure_skips_cycle() {
    let fx = Fixture::new();
    let mut transport = fx.transport();
    let handle = fx.core.handle();
    let mut state = WatchState::new();

    fx.set_present(&[(1, Behavior::Resident)]);
    state.poll_once(&mut transport, &handle);

    fx.script.lock().unwrap().fail_listing = true;
    let summary = state.poll_once(&mut transport, &handle);
    assert!(summary.skipped);
    // A failed listing is not mistaken for every device leaving
    assert!(state.is_known(&1));
    assert_eq!(fx.resources.count(), 0);
}

#[test]
fn test_absent_devices_released() {
    let fx = Fixture::new();
    let mut transport = fx.transport();
    let handle = fx.core.handle();
    let mut state = WatchState::new();

    fx.set_present(&[
        (1, Behavior::Resident),
        (2, Behavior::Resident),
        (3, Behavior::Resident),
    ]);
    state.poll_once(&mut transport, &handle);
    assert_eq!(state.known_count(), 3);

    fx.set_present(&[(2, Behavior::Resident)]);
    let summary = state.poll_once(&mut transport, &handle);
    assert_eq!(summary.removed, 2);
    assert_eq!(fx.resources.count(), 2);
    assert!(state.is_known(&2));
    assert!(!state.is_known(&1));

    // A device that comes back is probed afresh
    fx.set_present(&[(1, Behavior::Resident), (2, Behavior::Resident)]);
    let summary = state.poll_once(&mut transport, &handle);
    assert_eq!(summary.probed, 1);
}

#[test]
fn test_watcher_thread_polls_and_shuts_down() {
    let mut fx = Fixture::new();
    fx.set_present(&[(1, Behavior::Device), (2, Behavior::Resident)]);

    let mut watcher = HotplugWatcher::spawn(
        "scripted",
        fx.transport(),
        fx.core.handle(),
        Duration::from_millis(10),
    )
    .unwrap();
    assert!(watcher.is_running());

    let script = fx.script.clone();
    assert!(wait_until(DEFAULT_TEST_TIMEOUT, || {
        let probed: HashSet<u32> = script.lock().unwrap().probes.iter().copied().collect();
        probed.contains(&1) && probed.contains(&2)
    }));

    fx.core.tick();
    assert_eq!(fx.core.device_count(), 1);

    watcher.shutdown();
    assert!(!watcher.is_running());
    // Both resources and the transport itself are released after the join
    assert_eq!(fx.resources.count(), 2);
    assert_eq!(fx.transports.count(), 1);

    // Idempotent
    watcher.shutdown();
    drop(watcher);
    assert_eq!(fx.transports.count(), 1);
}

#[test]
fn test_watcher_drop_stops_thread() {
    let fx = Fixture::new();
    fx.set_present(&[(5, Behavior::Resident)]);

    let watcher = HotplugWatcher::spawn(
        "scripted",
        fx.transport(),
        fx.core.handle(),
        Duration::from_millis(10),
    )
    .unwrap();
    let script = fx.script.clone();
    assert!(wait_until(DEFAULT_TEST_TIMEOUT, || {
        !script.lock().unwrap().probes.is_empty()
    }));

    drop(watcher);
    assert_eq!(fx.resources.count(), 1);
    assert_eq!(fx.transports.count(), 1);
}

#[test]
fn test_long_interval_does_not_delay_shutdown() {
    let fx = Fixture::new();
    let mut watcher = HotplugWatcher::spawn(
        "scripted",
        fx.transport(),
        fx.core.handle(),
        Duration::from_secs(3600),
    )
    .unwrap();

    let started = std::time::Instant::now();
    watcher.shutdown();
    assert!(started.elapsed() < DEFAULT_TEST_TIMEOUT);
    assert!(fx.probes().is_empty());
}
