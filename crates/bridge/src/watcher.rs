//! Hotplug watcher
//!
//! Polls one transport on a dedicated thread, probes newly present devices
//! and retires devices that disappeared. Everything the watcher learns
//! reaches the host through the thread-safe [`BackendHandle`]; the watcher
//! never touches host state itself.
//!
//! Each cycle:
//! 1. List the identifiers currently present.
//! 2. Probe every identifier that is neither known nor ignored. Failures and
//!    unrecognized devices go to the ignored set and are not probed again
//!    while they stay listed.
//! 3. Collect known identifiers that are no longer present.
//! 4. Release the resource of each collected identifier and forget it.
//! 5. Forget ignored identifiers that were not listed. Transports may reuse
//!    an identifier for a different device once the old one is gone.

use crate::transport::{ProbeOutcome, Transport};
use backend::BackendHandle;
use common::Error;
use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Default interval between watch cycles
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// What a single watch cycle did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollSummary {
    /// Device listing failed and the cycle was skipped
    pub skipped: bool,
    /// Identifiers probed this cycle
    pub probed: usize,
    /// Probes that produced a resource
    pub recognized: usize,
    /// Probes that failed or panicked
    pub failed: usize,
    /// Known devices that disappeared
    pub removed: usize,
}

/// Watch bookkeeping for one transport
pub struct WatchState<T: Transport> {
    known: HashMap<T::Id, T::Resource>,
    ignored: HashSet<T::Id>,
    // Reused across cycles
    listed: HashSet<T::Id>,
    present: HashSet<T::Id>,
    removals: Vec<T::Id>,
}

impl<T: Transport> Default for WatchState<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Transport> WatchState<T> {
    pub fn new() -> Self {
        Self {
            known: HashMap::new(),
            ignored: HashSet::new(),
            listed: HashSet::new(),
            present: HashSet::new(),
            removals: Vec::new(),
        }
    }

    /// Run one watch cycle
    pub fn poll_once(
        &mut self,
        transport: &mut T,
        sink: &BackendHandle<T::Context>,
    ) -> PollSummary {
        let mut summary = PollSummary::default();
        self.listed.clear();
        self.present.clear();
        self.removals.clear();

        let ids = match transport.list_devices() {
            Ok(ids) => ids,
            Err(e) => {
                warn!("Failed to list devices: {}", e);
                summary.skipped = true;
                return summary;
            }
        };

        for id in ids {
            self.listed.insert(id);
            if self.ignored.contains(&id) {
                continue;
            }
            if !self.known.contains_key(&id) {
                self.probe(transport, sink, id, &mut summary);
            }
            self.present.insert(id);
        }

        // Second pass: the known map is not touched while it is iterated
        self.removals.extend(
            self.known
                .keys()
                .filter(|id| !self.present.contains(*id))
                .copied(),
        );
        for id in self.removals.drain(..) {
            if let Some(resource) = self.known.remove(&id) {
                drop(resource);
                summary.removed += 1;
                debug!("Device {:?} removed", id);
            }
        }

        let listed = &self.listed;
        self.ignored.retain(|id| listed.contains(id));

        summary
    }

    fn probe(
        &mut self,
        transport: &mut T,
        sink: &BackendHandle<T::Context>,
        id: T::Id,
        summary: &mut PollSummary,
    ) {
        summary.probed += 1;

        let outcome = catch_unwind(AssertUnwindSafe(|| transport.probe(id)));
        match outcome {
            Ok(Ok(ProbeOutcome::Recognized { resource, addition })) => {
                summary.recognized += 1;
                if let Some(addition) = addition {
                    info!("Found device {:?}: {}", id, addition.description);
                    sink.queue_device_add(addition.description, addition.context);
                } else {
                    debug!("Found device {:?}", id);
                }
                self.known.insert(id, resource);
            }
            Ok(Ok(ProbeOutcome::Unrecognized)) => {
                self.ignored.insert(id);
            }
            Ok(Err(e)) => {
                summary.failed += 1;
                warn!("Failed to probe device {:?}: {}", id, e);
                self.ignored.insert(id);
            }
            Err(panic) => {
                summary.failed += 1;
                error!(
                    "Panic while probing device {:?}: {}",
                    id,
                    panic_message(panic.as_ref())
                );
                self.ignored.insert(id);
            }
        }
    }

    pub fn is_known(&self, id: &T::Id) -> bool {
        self.known.contains_key(id)
    }

    pub fn is_ignored(&self, id: &T::Id) -> bool {
        self.ignored.contains(id)
    }

    pub fn known_count(&self) -> usize {
        self.known.len()
    }

    pub fn ignored_count(&self) -> usize {
        self.ignored.len()
    }

    /// Release every owned resource
    pub fn release_all(&mut self) -> usize {
        let count = self.known.len();
        self.known.clear();
        count
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        *message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic"
    }
}

/// Background watcher for one transport
///
/// The stop signal is a channel: dropping the sender disconnects it, which
/// wakes the thread from its interval wait.
pub struct HotplugWatcher<T: Transport> {
    name: String,
    stop_tx: Option<mpsc::Sender<()>>,
    thread: Option<JoinHandle<(T, WatchState<T>)>>,
}

impl<T: Transport> HotplugWatcher<T> {
    /// Start watching `transport` on a named background thread
    pub fn spawn(
        name: &str,
        transport: T,
        sink: BackendHandle<T::Context>,
        interval: Duration,
    ) -> Result<Self, Error> {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let thread = thread::Builder::new()
            .name(format!("{}-watcher", name))
            .spawn(move || run(transport, sink, interval, stop_rx))
            .map_err(|e| Error::Thread(format!("Failed to spawn watcher thread: {}", e)))?;

        info!("{} watcher started (interval {:?})", name, interval);
        Ok(Self {
            name: name.to_string(),
            stop_tx: Some(stop_tx),
            thread: Some(thread),
        })
    }

    pub fn is_running(&self) -> bool {
        self.thread.is_some()
    }

    /// Stop the thread, wait for it, then release the owned resources and
    /// the transport, in that order
    pub fn shutdown(&mut self) {
        drop(self.stop_tx.take());
        let Some(thread) = self.thread.take() else {
            return;
        };

        match thread.join() {
            Ok((transport, mut state)) => {
                let released = state.release_all();
                drop(transport);
                info!(
                    "{} watcher stopped, released {} devices",
                    self.name, released
                );
            }
            Err(_) => error!("{} watcher thread panicked", self.name),
        }
    }
}

impl<T: Transport> Drop for HotplugWatcher<T> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run<T: Transport>(
    mut transport: T,
    sink: BackendHandle<T::Context>,
    interval: Duration,
    stop_rx: mpsc::Receiver<()>,
) -> (T, WatchState<T>) {
    let mut state = WatchState::new();

    loop {
        match stop_rx.recv_timeout(interval) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {}
        }

        let summary = state.poll_once(&mut transport, &sink);
        if summary.probed > 0 || summary.removed > 0 {
            debug!(?summary, "Watch cycle complete");
        }
    }

    (transport, state)
}
