mod local;
mod zenoh_channel;

pub use local::LocalChannel;
pub use zenoh_channel::ZenohChannel;

use async_trait::async_trait;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use crate::error::ChannelResult;

/// Invoked once per inbound message with the raw payload and its topic
pub type MessageCallback = Arc<dyn Fn(&[u8], Option<&str>) + Send + Sync>;

/// Process unique identity of a channel instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelId(u64);

impl ChannelId {
    pub fn next() -> Self {
        static NEXT_CHANNEL_ID: AtomicU64 = AtomicU64::new(1);
        ChannelId(NEXT_CHANNEL_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Handle for a registered callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub(crate) u64);

/// Real-time source of topic labeled byte payloads
pub trait Channel: Send + Sync {
    fn id(&self) -> ChannelId;

    fn subscribe(&self, callback: MessageCallback) -> ChannelResult<ListenerId>;

    /// Removing a listener that is not registered is not an error
    fn unsubscribe(&self, listener: ListenerId) -> ChannelResult<()>;
}

#[async_trait]
pub trait ChannelPublisher: Send + Sync {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> ChannelResult<()>;
}
