//! Test utilities for input-bridge
//!
//! Provides small helpers shared by the test suites of every crate.
//!
//! # Example
//!
//! ```
//! use common::test_utils::{DropCounter, create_mock_description};
//!
//! let counter = DropCounter::new();
//! drop(counter.token());
//! assert_eq!(counter.count(), 1);
//!
//! let desc = create_mock_description(1);
//! assert_eq!(desc.interface, "Mock");
//! ```

use protocol::DeviceDescription;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Default test timeout (5 seconds)
pub const DEFAULT_TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Interface name used by mock descriptions
pub const MOCK_INTERFACE: &str = "Mock";

/// Counts how many of its tokens have been dropped
///
/// Used to check that disposable contexts and resources are released exactly
/// once.
#[derive(Debug, Clone, Default)]
pub struct DropCounter {
    drops: Arc<AtomicUsize>,
}

impl DropCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a token that bumps this counter when dropped
    pub fn token(&self) -> DropToken {
        DropToken {
            drops: self.drops.clone(),
        }
    }

    pub fn count(&self) -> usize {
        self.drops.load(Ordering::SeqCst)
    }
}

/// Token handed out by [`DropCounter::token`]
#[derive(Debug)]
pub struct DropToken {
    drops: Arc<AtomicUsize>,
}

impl Drop for DropToken {
    fn drop(&mut self) {
        self.drops.fetch_add(1, Ordering::SeqCst);
    }
}

/// Create a mock device description with the mock interface
///
/// # Example
/// ```
/// use common::test_utils::create_mock_description;
///
/// let desc = create_mock_description(3);
/// assert_eq!(desc.product.as_deref(), Some("Mock Pad 3"));
/// ```
pub fn create_mock_description(id: u32) -> DeviceDescription {
    DeviceDescription::new(MOCK_INTERFACE)
        .with_manufacturer("Test Manufacturer")
        .with_product(format!("Mock Pad {}", id))
        .with_serial(format!("SN{:06}", id))
}

/// Create a description no mock host has a schema for
pub fn create_unknown_description(id: u32) -> DeviceDescription {
    DeviceDescription::new("Unknown").with_product(format!("Unknown Device {}", id))
}

/// Create a deterministic state payload of the given length
pub fn create_mock_state(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i & 0xFF) as u8).collect()
}

/// Poll `condition` until it holds or `timeout` elapses
///
/// Returns whether the condition was observed to hold.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
}
