pub mod channel;
pub mod configuration;
pub mod diagnostics;
pub mod error;
pub mod events;
pub mod logging;
pub mod phase;
pub mod publisher;
pub mod topics;
pub mod tracker;

pub use channel::{Channel, ChannelPublisher, LocalChannel, ZenohChannel};
pub use error::{WakeWordError, WakeWordResult};
pub use phase::{PhaseSnapshot, WakeWordPhase};
pub use publisher::PhasePublisher;
pub use tracker::WakeWordStateTracker;
