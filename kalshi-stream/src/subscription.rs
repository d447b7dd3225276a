//! Subscription manager for the streaming session
//!
//! Tracks which channels the session is subscribed to and builds the
//! subscribe/unsubscribe commands for them. Nothing here touches the
//! socket; the client sends what this hands back.

use std::collections::HashMap;

use parking_lot::Mutex;
use tracing::debug;

use kalshi_core::{Channel, Command, KalshiError, KalshiResult, Params, AUTH_COMMAND_ID};

/// First id handed out to subscription commands
pub const FIRST_SUBSCRIPTION_ID: u64 = AUTH_COMMAND_ID + 1;

/// A channel the session believes is active, with its filter parameters
#[derive(Debug, Clone, PartialEq)]
pub struct Subscription {
    pub channel: Channel,
    pub params: Params,
    /// Id of the command that created this entry
    pub command_id: u64,
}

struct State {
    next_id: u64,
    entries: HashMap<Channel, Subscription>,
}

impl State {
    fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

/// Source of truth for what the session is subscribed to
pub struct SubscriptionManager {
    state: Mutex<State>,
}

impl SubscriptionManager {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                next_id: FIRST_SUBSCRIPTION_ID,
                entries: HashMap::new(),
            }),
        }
    }

    /// Track `channel` and build its subscribe command
    ///
    /// Subscribing to a tracked channel replaces the entry.
    pub fn subscribe(&self, channel: Channel, params: Params) -> Command {
        let mut state = self.state.lock();
        let id = state.allocate_id();
        let cmd = Command::subscribe(id, channel, &params);
        state.entries.insert(
            channel,
            Subscription {
                channel,
                params,
                command_id: id,
            },
        );
        debug!("[Kalshi WS] Tracking {} (id: {})", channel, id);
        cmd
    }

    /// Untrack `channel` and build its unsubscribe command
    pub fn unsubscribe(&self, channel: Channel) -> KalshiResult<Command> {
        let mut state = self.state.lock();
        let Some(sub) = state.entries.remove(&channel) else {
            return Err(KalshiError::not_subscribed(channel.as_str()));
        };
        let id = state.allocate_id();
        debug!("[Kalshi WS] Untracking {} (id: {})", channel, id);
        Ok(Command::unsubscribe(id, channel, &sub.params))
    }

    /// Drop the entry for `channel` only if it was created by `command_id`
    ///
    /// Used when the server rejects a subscribe; a newer subscribe for the
    /// same channel is left alone.
    pub fn discard(&self, channel: Channel, command_id: u64) -> bool {
        let mut state = self.state.lock();
        match state.entries.get(&channel) {
            Some(sub) if sub.command_id == command_id => {
                state.entries.remove(&channel);
                true
            }
            _ => false,
        }
    }

    /// Copy of every tracked subscription, in catalog order
    pub fn snapshot(&self) -> Vec<Subscription> {
        let state = self.state.lock();
        let mut subs: Vec<Subscription> = state.entries.values().cloned().collect();
        subs.sort_by_key(|s| s.channel);
        subs
    }

    /// Re-track a prior snapshot under fresh ids, returning one subscribe
    /// command per entry
    pub fn restore(&self, subs: Vec<Subscription>) -> Vec<Command> {
        let mut state = self.state.lock();
        subs.into_iter()
            .map(|sub| {
                let id = state.allocate_id();
                let cmd = Command::subscribe(id, sub.channel, &sub.params);
                state.entries.insert(
                    sub.channel,
                    Subscription {
                        command_id: id,
                        ..sub
                    },
                );
                cmd
            })
            .collect()
    }

    /// Forget every tracked subscription
    pub fn clear(&self) {
        self.state.lock().entries.clear();
    }

    pub fn is_subscribed(&self, channel: Channel) -> bool {
        self.state.lock().entries.contains_key(&channel)
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SubscriptionManager {
    fn default() -> Self {
        Self::new()
    }
}
