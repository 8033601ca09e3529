use tracing::*;

use crate::error::DecodeError;
use crate::phase::WakeWordPhase;

/// Receives payloads that were addressed to the wake word topic but could
/// not be decoded. Reporting is fire and forget.
///
/// Reports are made while the tracker holds its state lock so they stay in
/// delivery order with updates. `current` is the phase the message failed to
/// replace. Sinks must not call back into the tracker.
pub trait DiagnosticSink: Send + Sync {
    fn report(&self, error: &DecodeError, current: WakeWordPhase);
}

/// Logs decode failures through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDiagnostics;

impl DiagnosticSink for TracingDiagnostics {
    fn report(&self, error: &DecodeError, current: WakeWordPhase) {
        warn!(
            "Failed to parse wake word state, keeping {}: {}",
            current, error
        );
    }
}
