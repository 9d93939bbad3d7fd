//! Backend core for input-bridge
//!
//! Bridges device lifecycle transitions and input events produced on any
//! thread into a host input pipeline that may only be touched from a single
//! owning thread.
//!
//! Producers hold a cloneable [`BackendHandle`] and never block beyond a short
//! critical section. The owning thread holds the [`BackendCore`] and calls
//! [`BackendCore::tick`] once per host cycle, which creates queued devices,
//! runs the backend's update hook, and flushes the event double buffer into
//! the host.
//!
//! ```text
//! producer threads                     owning thread
//! ────────────────                     ─────────────
//! queue_device_add ──► AdditionQueue ──► tick: create devices ─► DeviceRegistry
//! queue_event      ──► EventWriter   ──► tick: swap + flush   ─► Host::send_event
//! ```

pub mod additions;
pub mod backend_core;
pub mod double_buffer;
pub mod event_buffer;
pub mod handle;
pub mod hooks;
pub mod host;
pub mod link;
pub mod registry;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use additions::{AdditionQueue, AdditionSender, PendingAddition};
pub use backend_core::{BackendCore, TickSummary};
pub use double_buffer::{DoubleBuffer, EventWriter};
pub use event_buffer::EventBuffer;
pub use handle::BackendHandle;
pub use hooks::Backend;
pub use host::{CreateDeviceError, DeviceChange, Host};
pub use link::{DeviceLink, LinkReleased};
pub use registry::DeviceRegistry;
