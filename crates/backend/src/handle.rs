//! Thread-safe producer surface of the core
//!
//! Every entry point is fire-and-forget: callers never see a failure and never
//! block beyond one short critical section. Once the core has shut down, all
//! entry points are no-ops.

use crate::additions::{AdditionSender, PendingAddition};
use crate::double_buffer::EventWriter;
use protocol::{
    DeviceDescription, DeviceHandle, EventRef, FourCC, ProtocolError, RemoveEvent, StateEventBuf,
    StateFormat,
};
use tracing::{trace, warn};

/// Cloneable handle producers use to feed the core
#[derive(Debug)]
pub struct BackendHandle<C> {
    additions: AdditionSender<C>,
    events: EventWriter,
}

impl<C> Clone for BackendHandle<C> {
    fn clone(&self) -> Self {
        Self {
            additions: self.additions.clone(),
            events: self.events.clone(),
        }
    }
}

impl<C> BackendHandle<C> {
    pub(crate) fn new(additions: AdditionSender<C>, events: EventWriter) -> Self {
        Self { additions, events }
    }

    /// Queue a device for creation on the next tick
    ///
    /// The host may still reject it; in every case the context is dropped
    /// exactly once.
    pub fn queue_device_add(&self, description: DeviceDescription, context: C) {
        if !self
            .additions
            .push(PendingAddition::new(description, context))
        {
            trace!("Device addition ignored, backend is shut down");
        }
    }

    /// Ask the host to remove a device, in normal event order
    ///
    /// The host decides when the device actually goes away and reports it back
    /// through [`BackendCore::on_device_change`](crate::BackendCore::on_device_change).
    pub fn queue_device_remove(&self, device: DeviceHandle) {
        let event = RemoveEvent::new(device);
        match EventRef::parse(event.as_bytes()) {
            Ok(record) => self.queue_event_ref(record),
            Err(e) => warn!("Failed to build removal event for {}: {}", device, e),
        }
    }

    /// Queue a raw event record
    ///
    /// Malformed records are logged and dropped.
    pub fn queue_event(&self, bytes: &[u8]) {
        match EventRef::parse(bytes) {
            Ok(record) => self.queue_event_ref(record),
            Err(e) => warn!("Dropping malformed event ({} bytes): {}", bytes.len(), e),
        }
    }

    /// Queue an already validated event record
    pub fn queue_event_ref(&self, event: EventRef<'_>) {
        if !self.events.append(event) {
            trace!("Event ignored, backend is shut down");
        }
    }

    /// Queue a device state snapshot
    ///
    /// Empty payloads and payloads over
    /// [`MAX_STATE_SIZE`](protocol::MAX_STATE_SIZE) bytes are dropped
    /// silently.
    pub fn queue_state_event(&self, device: DeviceHandle, format: FourCC, state: &[u8]) {
        let Some(event) = StateEventBuf::new(device, format, state) else {
            return;
        };
        if let Ok(record) = EventRef::parse(event.as_bytes()) {
            self.queue_event_ref(record);
        }
    }

    /// Queue a state snapshot taken from a sub-range of `buffer`
    ///
    /// A range outside `buffer` is a caller bug and is reported; the payload
    /// size limits still drop silently.
    pub fn queue_state_event_range(
        &self,
        device: DeviceHandle,
        format: FourCC,
        buffer: &[u8],
        offset: usize,
        length: usize,
    ) -> protocol::Result<()> {
        if offset > buffer.len() || buffer.len() - offset < length {
            return Err(ProtocolError::OutOfRange {
                offset,
                length,
                available: buffer.len(),
            });
        }

        self.queue_state_event(device, format, &buffer[offset..offset + length]);
        Ok(())
    }

    /// Queue a typed state snapshot
    pub fn queue_typed_state<S: StateFormat>(&self, device: DeviceHandle, state: &S) {
        self.queue_state_event(device, S::FORMAT, state.state_bytes());
    }

    /// Whether the core has shut down
    pub fn is_closed(&self) -> bool {
        self.additions.is_closed() || self.events.is_closed()
    }
}
