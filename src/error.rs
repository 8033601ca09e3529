use std::result::Result;
use thiserror::Error;

pub type WakeWordResult<T> = Result<T, WakeWordError>;
pub type ChannelResult<T> = Result<T, ChannelError>;

#[derive(Error, Debug)]
pub enum WakeWordError {
    #[error("Channel error")]
    ChannelError(#[from] ChannelError),
    #[error("Failed to encode wake word state")]
    EncodeError(#[from] EncodeError),
    #[error("Zenoh error {0:?}")]
    ZenohError(zenoh::Error),
}

/// Reasons a payload on the wake word topic was rejected.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Payload is not valid UTF-8")]
    InvalidUtf8(#[from] std::str::Utf8Error),
    #[error("Payload is not a valid wake word record")]
    Json(#[from] serde_json::Error),
    #[error("Payload has no message type")]
    MissingDiscriminator,
    #[error("Unexpected message type {0:?}")]
    UnexpectedType(String),
    #[error("Unknown wake word state {0:?}")]
    UnknownState(String),
}

#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("Unknown phase has no wire representation")]
    UnknownPhase,
    #[error("Json serde error")]
    JsonError(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("Channel is closed")]
    Closed,
    #[error("Subscribing requires a running tokio runtime")]
    NoRuntime,
    #[error("Zenoh error {0:?}")]
    ZenohError(zenoh::Error),
}
