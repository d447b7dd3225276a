//! Command/reply correlation
//!
//! A slot is registered under a command id before the command is sent; the
//! read loop hands the matching reply to it.

use std::collections::HashMap;

use parking_lot::Mutex;
use tokio::sync::oneshot;

use kalshi_core::Message;

/// Outstanding command ids and their single-use reply slots
#[derive(Default)]
pub struct PendingResponses {
    slots: Mutex<HashMap<u64, oneshot::Sender<Message>>>,
}

impl PendingResponses {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a slot for `id`. A previous slot under the same id is dropped.
    pub fn register(&self, id: u64) -> oneshot::Receiver<Message> {
        let (tx, rx) = oneshot::channel();
        self.slots.lock().insert(id, tx);
        rx
    }

    /// Deliver `message` to the slot waiting on its id
    ///
    /// Returns the message back when no slot is registered for it, so the
    /// caller can route it as channel data instead.
    pub fn complete(&self, message: Message) -> Result<(), Message> {
        if message.id == 0 {
            return Err(message);
        }
        let Some(tx) = self.slots.lock().remove(&message.id) else {
            return Err(message);
        };
        // The waiter may have given up already; the reply is still consumed.
        let _ = tx.send(message);
        Ok(())
    }

    /// Tear down the slot for `id` (caller stopped waiting)
    pub fn cancel(&self, id: u64) {
        self.slots.lock().remove(&id);
    }

    /// Tear down every slot; waiters observe a closed channel
    pub fn clear(&self) {
        self.slots.lock().clear();
    }

    pub fn is_pending(&self, id: u64) -> bool {
        self.slots.lock().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
