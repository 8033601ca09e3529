use async_trait::async_trait;
use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Mutex, MutexGuard,
};
use tracing::*;

use super::{Channel, ChannelId, ChannelPublisher, ListenerId, MessageCallback};
use crate::error::{ChannelError, ChannelResult};

/// In process channel.
///
/// Messages are handed to every registered callback synchronously on the
/// caller's thread, in registration order.
pub struct LocalChannel {
    id: ChannelId,
    next_listener: AtomicU64,
    listeners: Mutex<Vec<(ListenerId, MessageCallback)>>,
    closed: AtomicBool,
}

impl Default for LocalChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalChannel {
    pub fn new() -> Self {
        Self {
            id: ChannelId::next(),
            next_listener: AtomicU64::new(0),
            listeners: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        }
    }

    fn listeners(&self) -> MutexGuard<'_, Vec<(ListenerId, MessageCallback)>> {
        self.listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Hand a message to all listeners
    pub fn deliver(&self, payload: &[u8], topic: Option<&str>) {
        // callbacks may unsubscribe themselves, don't hold the lock while calling them
        let callbacks = self.callbacks();
        trace!(
            "Delivering {} bytes on {:?} to {} listeners",
            payload.len(),
            topic,
            callbacks.len()
        );
        for callback in callbacks {
            callback(payload, topic);
        }
    }

    /// Snapshot of the currently registered callbacks
    pub fn callbacks(&self) -> Vec<MessageCallback> {
        self.listeners()
            .iter()
            .map(|(_, callback)| callback.clone())
            .collect()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners().len()
    }

    /// Drop all listeners and refuse new ones
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.listeners().clear();
    }
}

impl Channel for LocalChannel {
    fn id(&self) -> ChannelId {
        self.id
    }

    fn subscribe(&self, callback: MessageCallback) -> ChannelResult<ListenerId> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ChannelError::Closed);
        }
        let listener = ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed));
        self.listeners().push((listener, callback));
        debug!("Registered listener {:?} on local channel", listener);
        Ok(listener)
    }

    fn unsubscribe(&self, listener: ListenerId) -> ChannelResult<()> {
        self.listeners().retain(|(id, _)| *id != listener);
        debug!("Removed listener {:?} from local channel", listener);
        Ok(())
    }
}

#[async_trait]
impl ChannelPublisher for LocalChannel {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> ChannelResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ChannelError::Closed);
        }
        self.deliver(&payload, Some(topic));
        Ok(())
    }
}
