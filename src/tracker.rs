use chrono::Utc;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tokio::sync::watch;
use tracing::*;

use crate::channel::{Channel, ChannelId, ListenerId, MessageCallback};
use crate::diagnostics::{DiagnosticSink, TracingDiagnostics};
use crate::error::WakeWordResult;
use crate::events::decode_phase;
use crate::phase::{PhaseSnapshot, WakeWordPhase};
use crate::topics::WAKEWORD_STATE_TOPIC;

struct TrackedState {
    snapshot: PhaseSnapshot,
    /// Bumped on every attach and detach. Listeners carry the generation
    /// they were registered with and may only mutate state while it is current.
    generation: u64,
}

struct TrackerShared {
    state: Mutex<TrackedState>,
    phase_sender: watch::Sender<WakeWordPhase>,
    diagnostics: Arc<dyn DiagnosticSink>,
}

impl TrackerShared {
    fn state(&self) -> MutexGuard<'_, TrackedState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn set_phase(&self, state: &mut TrackedState, snapshot: PhaseSnapshot) {
        state.snapshot = snapshot;
        self.phase_sender.send_replace(snapshot.phase);
    }

    /// Runs with the state lock held so deliveries never interleave
    fn handle_message(&self, generation: u64, payload: &[u8], topic: Option<&str>) {
        if topic != Some(WAKEWORD_STATE_TOPIC) {
            return;
        }

        let mut state = self.state();
        if state.generation != generation {
            trace!("Dropping wake word message for stale listener");
            return;
        }

        match decode_phase(payload) {
            Ok(Some(phase)) => {
                debug!("Wake word state changed to {}", phase);
                self.set_phase(
                    &mut state,
                    PhaseSnapshot {
                        phase,
                        updated_at: Some(Utc::now()),
                    },
                );
            }
            Ok(None) => trace!("Wake word message without state"),
            Err(err) => self.diagnostics.report(&err, state.snapshot.phase),
        }
    }
}

struct Attachment {
    channel: Arc<dyn Channel>,
    listener: ListenerId,
    generation: u64,
}

/// Keeps the latest wake word phase published on an attached channel
pub struct WakeWordStateTracker {
    shared: Arc<TrackerShared>,
    attachment: Option<Attachment>,
}

impl Default for WakeWordStateTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl WakeWordStateTracker {
    pub fn new() -> Self {
        Self::with_diagnostics(Arc::new(TracingDiagnostics))
    }

    pub fn with_diagnostics(diagnostics: Arc<dyn DiagnosticSink>) -> Self {
        let (phase_sender, _) = watch::channel(WakeWordPhase::Unknown);
        Self {
            shared: Arc::new(TrackerShared {
                state: Mutex::new(TrackedState {
                    snapshot: PhaseSnapshot::default(),
                    generation: 0,
                }),
                phase_sender,
                diagnostics,
            }),
            attachment: None,
        }
    }

    /// Listen on `channel`.
    ///
    /// Attaching to the channel that is already attached does nothing.
    /// Any other channel, or `None`, detaches first and resets the phase to
    /// `Unknown`.
    pub fn attach(&mut self, channel: Option<Arc<dyn Channel>>) -> WakeWordResult<()> {
        let channel = match channel {
            Some(channel) => channel,
            None => {
                self.detach();
                self.reset();
                return Ok(());
            }
        };

        if self.attached_channel() == Some(channel.id()) {
            trace!("Already attached to channel {:?}", channel.id());
            return Ok(());
        }

        self.detach();
        let generation = self.reset();

        let callback = listener_callback(Arc::downgrade(&self.shared), generation);
        let listener = channel.subscribe(callback)?;
        info!("Attached wake word tracker to channel {:?}", channel.id());
        self.attachment = Some(Attachment {
            channel,
            listener,
            generation,
        });
        Ok(())
    }

    /// Stop listening. Calling this while detached is a no-op.
    ///
    /// Once this returns no message, including ones already in flight, can
    /// change the tracked phase.
    pub fn detach(&mut self) {
        if let Some(attachment) = self.attachment.take() {
            self.shared.state().generation += 1;
            if let Err(err) = attachment.channel.unsubscribe(attachment.listener) {
                warn!(
                    "Failed to unsubscribe from channel {:?}: {}",
                    attachment.channel.id(),
                    err
                );
            }
            info!(
                "Detached wake word tracker from channel {:?}",
                attachment.channel.id()
            );
        }
    }

    /// Process one inbound message as the attached listener would.
    /// Ignored while detached.
    pub fn on_message(&self, payload: &[u8], topic: Option<&str>) {
        match &self.attachment {
            Some(attachment) => self
                .shared
                .handle_message(attachment.generation, payload, topic),
            None => trace!("Ignoring message on detached tracker"),
        }
    }

    pub fn current_state(&self) -> WakeWordPhase {
        self.shared.state().snapshot.phase
    }

    pub fn snapshot(&self) -> PhaseSnapshot {
        self.shared.state().snapshot
    }

    /// Receiver that observes every phase change, resets included
    pub fn watch(&self) -> watch::Receiver<WakeWordPhase> {
        self.shared.phase_sender.subscribe()
    }

    pub fn is_attached(&self) -> bool {
        self.attachment.is_some()
    }

    pub fn attached_channel(&self) -> Option<ChannelId> {
        self.attachment
            .as_ref()
            .map(|attachment| attachment.channel.id())
    }

    /// Invalidate existing listeners and go back to `Unknown`
    fn reset(&self) -> u64 {
        let mut state = self.shared.state();
        state.generation += 1;
        self.shared.set_phase(&mut state, PhaseSnapshot::default());
        state.generation
    }
}

impl Drop for WakeWordStateTracker {
    fn drop(&mut self) {
        self.detach();
    }
}

fn listener_callback(shared: Weak<TrackerShared>, generation: u64) -> MessageCallback {
    Arc::new(move |payload: &[u8], topic: Option<&str>| {
        if let Some(shared) = shared.upgrade() {
            shared.handle_message(generation, payload, topic);
        }
    })
}
