//! Pending device additions
//!
//! Devices may be discovered on any thread but must be created on the owning
//! thread. Producers push (description, context) pairs into an unbounded
//! multi-producer queue; the owning thread drains it once per tick.

use async_channel::{Receiver, Sender, TryRecvError, TrySendError, unbounded};
use protocol::DeviceDescription;

/// A device waiting to be created on the owning thread
///
/// The context is owned by whoever holds the addition; the owning thread
/// releases it (drops it) exactly once after the creation attempt, whatever
/// the outcome.
#[derive(Debug)]
pub struct PendingAddition<C> {
    pub description: DeviceDescription,
    pub context: C,
}

impl<C> PendingAddition<C> {
    pub fn new(description: DeviceDescription, context: C) -> Self {
        Self {
            description,
            context,
        }
    }
}

/// Producer handle for the addition queue
#[derive(Debug)]
pub struct AdditionSender<C> {
    tx: Sender<PendingAddition<C>>,
}

impl<C> Clone for AdditionSender<C> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<C> AdditionSender<C> {
    /// Queue an addition without blocking
    ///
    /// Returns `false` if the queue is closed; the addition (and its context)
    /// is dropped in that case.
    pub fn push(&self, addition: PendingAddition<C>) -> bool {
        match self.tx.try_send(addition) {
            Ok(()) => true,
            Err(TrySendError::Closed(_)) => false,
            // Unbounded channels are never full
            Err(TrySendError::Full(_)) => false,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consumer side of the addition queue
#[derive(Debug)]
pub struct AdditionQueue<C> {
    tx: Sender<PendingAddition<C>>,
    rx: Receiver<PendingAddition<C>>,
}

impl<C> Default for AdditionQueue<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> AdditionQueue<C> {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx }
    }

    pub fn sender(&self) -> AdditionSender<C> {
        AdditionSender {
            tx: self.tx.clone(),
        }
    }

    /// Take the next pending addition, if any
    pub fn try_take(&self) -> Option<PendingAddition<C>> {
        match self.rx.try_recv() {
            Ok(addition) => Some(addition),
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => None,
        }
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Refuse further additions and drop every one still queued
    ///
    /// Returns how many were discarded.
    pub fn close(&self) -> usize {
        self.rx.close();
        let mut discarded = 0;
        while self.try_take().is_some() {
            discarded += 1;
        }
        discarded
    }
}
