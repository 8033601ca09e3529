use async_trait::async_trait;
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, MutexGuard,
    },
};
use tokio::task::JoinHandle;
use tracing::*;
use zenoh::prelude::r#async::*;
use zenoh::Session;

use super::{Channel, ChannelId, ChannelPublisher, ListenerId, MessageCallback};
use crate::error::{ChannelError, ChannelResult, WakeWordError};

/// Channel backed by a zenoh session.
///
/// Every key below `topic_prefix` is delivered to listeners, the topic being
/// the part of the key after the prefix.
pub struct ZenohChannel {
    id: ChannelId,
    session: Arc<Session>,
    topic_prefix: String,
    next_listener: AtomicU64,
    listener_tasks: Mutex<HashMap<ListenerId, JoinHandle<()>>>,
}

impl ZenohChannel {
    pub fn new(session: Arc<Session>, topic_prefix: &str) -> Self {
        Self {
            id: ChannelId::next(),
            session,
            topic_prefix: normalize_prefix(topic_prefix),
            next_listener: AtomicU64::new(0),
            listener_tasks: Mutex::new(HashMap::new()),
        }
    }

    pub fn topic_prefix(&self) -> &str {
        &self.topic_prefix
    }

    fn listener_tasks(&self) -> MutexGuard<'_, HashMap<ListenerId, JoinHandle<()>>> {
        self.listener_tasks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Channel for ZenohChannel {
    fn id(&self) -> ChannelId {
        self.id
    }

    fn subscribe(&self, callback: MessageCallback) -> ChannelResult<ListenerId> {
        let runtime =
            tokio::runtime::Handle::try_current().map_err(|_| ChannelError::NoRuntime)?;
        let listener = ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed));

        let session = self.session.clone();
        let key_expr = key_for_topic(&self.topic_prefix, "**");
        let topic_prefix = self.topic_prefix.clone();
        let task = runtime.spawn(async move {
            if let Err(err) = listener_loop(session, key_expr, topic_prefix, callback).await {
                error!("Zenoh listener failed {:?}", err);
            }
        });

        self.listener_tasks().insert(listener, task);
        debug!(
            "Registered listener {:?} on zenoh prefix {}",
            listener, self.topic_prefix
        );
        Ok(listener)
    }

    fn unsubscribe(&self, listener: ListenerId) -> ChannelResult<()> {
        // aborting drops the subscriber which undeclares it
        if let Some(task) = self.listener_tasks().remove(&listener) {
            task.abort();
            debug!("Removed listener {:?} from zenoh channel", listener);
        }
        Ok(())
    }
}

#[async_trait]
impl ChannelPublisher for ZenohChannel {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> ChannelResult<()> {
        let key_expr = key_for_topic(&self.topic_prefix, topic);
        trace!("Publishing {} bytes to {}", payload.len(), key_expr);
        self.session
            .put(key_expr, payload)
            .res()
            .await
            .map_err(ChannelError::ZenohError)?;
        Ok(())
    }
}

impl Drop for ZenohChannel {
    fn drop(&mut self) {
        for (_, task) in self.listener_tasks().drain() {
            task.abort();
        }
    }
}

async fn listener_loop(
    session: Arc<Session>,
    key_expr: String,
    topic_prefix: String,
    callback: MessageCallback,
) -> anyhow::Result<()> {
    let subscriber = session
        .declare_subscriber(key_expr)
        .res()
        .await
        .map_err(WakeWordError::ZenohError)?;

    while let Ok(sample) = subscriber.recv_async().await {
        let topic = topic_for_key(&topic_prefix, sample.key_expr.as_str());
        let payload = sample.value.payload.contiguous();
        callback(payload.as_ref(), topic);
    }
    info!("Zenoh subscriber closed");
    Ok(())
}

fn normalize_prefix(topic_prefix: &str) -> String {
    topic_prefix.trim_end_matches('/').to_owned()
}

fn key_for_topic(topic_prefix: &str, topic: &str) -> String {
    format!("{}/{}", topic_prefix, topic)
}

/// Part of `key` after `<topic_prefix>/`, `None` for keys outside the prefix
fn topic_for_key<'a>(topic_prefix: &str, key: &'a str) -> Option<&'a str> {
    key.strip_prefix(topic_prefix)?
        .strip_prefix('/')
        .filter(|topic| !topic.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_is_key_suffix() {
        assert_eq!(
            topic_for_key("caal", "caal/wakeword_state"),
            Some("wakeword_state")
        );
        assert_eq!(topic_for_key("caal", "caal/a/b"), Some("a/b"));
    }

    #[test]
    fn keys_outside_prefix_have_no_topic() {
        assert_eq!(topic_for_key("caal", "other/x"), None);
        assert_eq!(topic_for_key("caal", "caalx/wakeword_state"), None);
        assert_eq!(topic_for_key("caal", "caal"), None);
        assert_eq!(topic_for_key("caal", "caal/"), None);
    }

    #[test]
    fn trailing_slash_prefix_is_trimmed() {
        let prefix = normalize_prefix("caal/");
        assert_eq!(prefix, "caal");
        assert_eq!(key_for_topic(&prefix, "wakeword_state"), "caal/wakeword_state");
        assert_eq!(
            topic_for_key(&prefix, &key_for_topic(&prefix, "wakeword_state")),
            Some("wakeword_state")
        );
    }

    #[test]
    fn subscription_key_covers_prefix() {
        assert_eq!(key_for_topic(&normalize_prefix("robot/caal"), "**"), "robot/caal/**");
    }
}
