use std::sync::{Arc, Mutex as StdMutex, Weak};
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::*;

use crate::channel::ChannelPublisher;
use crate::error::{EncodeError, WakeWordResult};
use crate::events::encode_phase;
use crate::phase::WakeWordPhase;
use crate::topics::WAKEWORD_STATE_TOPIC;

/// How often the silence monitor looks at the last activity
pub const SILENCE_CHECK_INTERVAL: Duration = Duration::from_millis(500);

/// Detector side of the protocol.
///
/// Publishes a wake word state message whenever the phase changes. Publishing
/// errors are returned to the caller, only the silence monitor logs and
/// carries on.
pub struct PhasePublisher {
    channel: Arc<dyn ChannelPublisher>,
    last_published: Mutex<WakeWordPhase>,
    last_activity: StdMutex<Instant>,
}

impl PhasePublisher {
    pub fn new(channel: Arc<dyn ChannelPublisher>) -> Self {
        Self {
            channel,
            last_published: Mutex::new(WakeWordPhase::Unknown),
            last_activity: StdMutex::new(Instant::now()),
        }
    }

    /// Returns `true` if a message was sent
    pub async fn set_phase(&self, phase: WakeWordPhase) -> WakeWordResult<bool> {
        if !phase.is_known() {
            return Err(EncodeError::UnknownPhase.into());
        }

        let mut last_published = self.last_published.lock().await;
        if phase == WakeWordPhase::Active {
            self.record_activity();
        }
        if *last_published == phase {
            trace!("Wake word state already {}", phase);
            return Ok(false);
        }

        self.publish(&mut last_published, phase).await?;
        Ok(true)
    }

    pub async fn last_published(&self) -> WakeWordPhase {
        *self.last_published.lock().await
    }

    /// Keep an active conversation from timing out
    pub fn record_activity(&self) {
        *self
            .last_activity
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Instant::now();
    }

    /// Drop back to `Listening` if `Active` has been silent for `silence_timeout`.
    /// Returns `true` if a message was sent
    pub async fn expire_if_silent(&self, silence_timeout: Duration) -> WakeWordResult<bool> {
        let mut last_published = self.last_published.lock().await;
        if *last_published != WakeWordPhase::Active {
            return Ok(false);
        }
        let silent_for = self
            .last_activity
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .elapsed();
        if silent_for < silence_timeout {
            return Ok(false);
        }

        debug!(
            "Silence timeout ({:?}), returning to wake word listening",
            silence_timeout
        );
        self.publish(&mut last_published, WakeWordPhase::Listening)
            .await?;
        Ok(true)
    }

    /// Periodically expire silent conversations.
    ///
    /// The task ends once the publisher is dropped.
    pub fn start_silence_monitor(self: &Arc<Self>, silence_timeout: Duration) -> JoinHandle<()> {
        let publisher = Arc::downgrade(self);
        tokio::spawn(async move { silence_monitor_loop(publisher, silence_timeout).await })
    }

    async fn publish(
        &self,
        last_published: &mut MutexGuard<'_, WakeWordPhase>,
        phase: WakeWordPhase,
    ) -> WakeWordResult<()> {
        let payload = encode_phase(phase)?;
        self.channel.publish(WAKEWORD_STATE_TOPIC, payload).await?;
        **last_published = phase;
        debug!("Published wake word state {}", phase);
        Ok(())
    }
}

async fn silence_monitor_loop(publisher: Weak<PhasePublisher>, silence_timeout: Duration) {
    let mut interval = tokio::time::interval(SILENCE_CHECK_INTERVAL);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        let Some(publisher) = publisher.upgrade() else {
            break;
        };
        if let Err(err) = publisher.expire_if_silent(silence_timeout).await {
            warn!("Failed to publish wake word silence timeout: {}", err);
        }
    }
    trace!("Silence monitor stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{Channel, LocalChannel};
    use crate::error::WakeWordError;
    use crate::tracker::WakeWordStateTracker;

    #[tokio::test]
    async fn publishes_only_changes() {
        let channel = Arc::new(LocalChannel::new());
        let published = Arc::new(std::sync::Mutex::new(0_usize));
        let published_clone = published.clone();
        channel
            .subscribe(Arc::new(move |_payload: &[u8], _topic: Option<&str>| {
                *published_clone.lock().unwrap() += 1;
            }))
            .unwrap();

        let publisher = PhasePublisher::new(channel.clone());
        assert!(publisher.set_phase(WakeWordPhase::Listening).await.unwrap());
        assert!(!publisher.set_phase(WakeWordPhase::Listening).await.unwrap());
        assert!(publisher.set_phase(WakeWordPhase::Active).await.unwrap());
        assert_eq!(*published.lock().unwrap(), 2);
        assert_eq!(publisher.last_published().await, WakeWordPhase::Active);
    }

    #[tokio::test]
    async fn rejects_unknown_phase() {
        let publisher = PhasePublisher::new(Arc::new(LocalChannel::new()));
        let result = publisher.set_phase(WakeWordPhase::Unknown).await;
        assert!(matches!(result, Err(WakeWordError::EncodeError(_))));
    }

    #[tokio::test]
    async fn failed_publish_is_retried_next_time() {
        let channel = Arc::new(LocalChannel::new());
        channel.close();
        let publisher = PhasePublisher::new(channel);
        assert!(publisher.set_phase(WakeWordPhase::Active).await.is_err());
        assert_eq!(publisher.last_published().await, WakeWordPhase::Unknown);
    }

    #[tokio::test(start_paused = true)]
    async fn silence_returns_to_listening() {
        let channel = Arc::new(LocalChannel::new());
        let publisher = Arc::new(PhasePublisher::new(channel.clone()));
        let monitor = publisher.start_silence_monitor(Duration::from_secs(3));

        publisher.set_phase(WakeWordPhase::Active).await.unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(publisher.last_published().await, WakeWordPhase::Active);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(publisher.last_published().await, WakeWordPhase::Listening);
        monitor.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn activity_postpones_silence_timeout() {
        let channel = Arc::new(LocalChannel::new());
        let publisher = Arc::new(PhasePublisher::new(channel.clone()));
        let monitor = publisher.start_silence_monitor(Duration::from_secs(3));

        publisher.set_phase(WakeWordPhase::Active).await.unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;
        publisher.record_activity();
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(publisher.last_published().await, WakeWordPhase::Active);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(publisher.last_published().await, WakeWordPhase::Listening);
        monitor.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn listening_is_never_expired() {
        let publisher = PhasePublisher::new(Arc::new(LocalChannel::new()));
        publisher.set_phase(WakeWordPhase::Listening).await.unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(!publisher
            .expire_if_silent(Duration::from_secs(3))
            .await
            .unwrap());
        assert_eq!(publisher.last_published().await, WakeWordPhase::Listening);
    }

    #[tokio::test(start_paused = true)]
    async fn monitor_survives_publish_failures() {
        let channel = Arc::new(LocalChannel::new());
        let publisher = Arc::new(PhasePublisher::new(channel.clone()));
        publisher.set_phase(WakeWordPhase::Active).await.unwrap();
        channel.close();

        let monitor = publisher.start_silence_monitor(Duration::from_secs(1));
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(!monitor.is_finished());
        assert_eq!(publisher.last_published().await, WakeWordPhase::Active);
        monitor.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn monitor_stops_with_publisher() {
        let publisher = Arc::new(PhasePublisher::new(Arc::new(LocalChannel::new())));
        let monitor = publisher.start_silence_monitor(Duration::from_secs(1));
        drop(publisher);
        tokio::time::timeout(Duration::from_secs(5), monitor)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn tracker_follows_publisher() {
        let channel = Arc::new(LocalChannel::new());
        let mut tracker = WakeWordStateTracker::new();
        tracker.attach(Some(channel.clone())).unwrap();

        let publisher = PhasePublisher::new(channel.clone());
        publisher.set_phase(WakeWordPhase::Listening).await.unwrap();
        assert_eq!(tracker.current_state(), WakeWordPhase::Listening);
        publisher.set_phase(WakeWordPhase::Active).await.unwrap();
        assert_eq!(tracker.current_state(), WakeWordPhase::Active);
        publisher
            .expire_if_silent(Duration::from_secs(0))
            .await
            .unwrap();
        assert_eq!(tracker.current_state(), WakeWordPhase::Listening);
    }
}
