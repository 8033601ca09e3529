// wake word
pub const WAKEWORD_STATE_TOPIC: &str = "wakeword_state";
pub const WAKEWORD_STATE_MESSAGE_TYPE: &str = "wakeword_state";

// zenoh
pub const DEFAULT_TOPIC_PREFIX: &str = "caal";

// detector
pub const DEFAULT_SILENCE_TIMEOUT_SECS: f32 = 3.0;
