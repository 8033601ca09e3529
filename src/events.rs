use serde::{Deserialize, Serialize};

use crate::error::{DecodeError, EncodeError};
use crate::phase::WakeWordPhase;
use crate::topics::WAKEWORD_STATE_MESSAGE_TYPE;

/// Wake word state record as published by the detector.
///
/// Both fields are optional here so that missing values can be told apart
/// from malformed JSON during validation.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct WakeWordStateMessage {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub message_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

impl WakeWordStateMessage {
    pub fn new(phase: WakeWordPhase) -> Result<Self, EncodeError> {
        let state = phase.wire_label().ok_or(EncodeError::UnknownPhase)?;
        Ok(Self {
            message_type: Some(WAKEWORD_STATE_MESSAGE_TYPE.to_owned()),
            state: Some(state.to_owned()),
        })
    }

    /// Validate the record.
    ///
    /// `Ok(None)` means a well formed wake word message that carries no state,
    /// which leaves the tracked phase untouched.
    pub fn phase(&self) -> Result<Option<WakeWordPhase>, DecodeError> {
        match self.message_type.as_deref() {
            None => return Err(DecodeError::MissingDiscriminator),
            Some(WAKEWORD_STATE_MESSAGE_TYPE) => (),
            Some(other) => return Err(DecodeError::UnexpectedType(other.to_owned())),
        }
        match self.state.as_deref() {
            None => Ok(None),
            Some(label) => WakeWordPhase::from_wire_label(label)
                .map(Some)
                .ok_or_else(|| DecodeError::UnknownState(label.to_owned())),
        }
    }
}

pub fn decode_phase(payload: &[u8]) -> Result<Option<WakeWordPhase>, DecodeError> {
    let text = std::str::from_utf8(payload)?;
    // derived Deserialize would also accept the positional array form
    let record: serde_json::Map<String, serde_json::Value> = serde_json::from_str(text)?;
    let message: WakeWordStateMessage =
        serde_json::from_value(serde_json::Value::Object(record))?;
    message.phase()
}

pub fn encode_phase(phase: WakeWordPhase) -> Result<Vec<u8>, EncodeError> {
    let message = WakeWordStateMessage::new(phase)?;
    Ok(serde_json::to_vec(&message)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_listening() {
        let phase = decode_phase(br#"{"type":"wakeword_state","state":"listening"}"#).unwrap();
        assert_eq!(phase, Some(WakeWordPhase::Listening));
    }

    #[test]
    fn decodes_active_with_extra_fields() {
        let payload = br#"{"type":"wakeword_state","state":"active","model_name":"hey_cal","score":0.93}"#;
        assert_eq!(decode_phase(payload).unwrap(), Some(WakeWordPhase::Active));
    }

    #[test]
    fn missing_state_is_not_an_error() {
        assert_eq!(decode_phase(br#"{"type":"wakeword_state"}"#).unwrap(), None);
        assert_eq!(
            decode_phase(br#"{"type":"wakeword_state","state":null}"#).unwrap(),
            None
        );
    }

    #[test]
    fn rejects_other_message_type() {
        let err = decode_phase(br#"{"type":"other","state":"active"}"#).unwrap_err();
        assert!(matches!(err, DecodeError::UnexpectedType(ref kind) if kind == "other"));
    }

    #[test]
    fn rejects_missing_type() {
        let err = decode_phase(br#"{"state":"active"}"#).unwrap_err();
        assert!(matches!(err, DecodeError::MissingDiscriminator));
    }

    #[test]
    fn rejects_unknown_state() {
        let err = decode_phase(br#"{"type":"wakeword_state","state":"paused"}"#).unwrap_err();
        assert!(matches!(err, DecodeError::UnknownState(ref state) if state == "paused"));
    }

    #[test]
    fn rejects_non_json() {
        let err = decode_phase(b"not json").unwrap_err();
        assert!(matches!(err, DecodeError::Json(_)));
    }

    #[test]
    fn rejects_non_object_json() {
        assert!(matches!(
            decode_phase(br#"["wakeword_state","active"]"#).unwrap_err(),
            DecodeError::Json(_)
        ));
        assert!(matches!(
            decode_phase(br#"{"type":"wakeword_state","state":1}"#).unwrap_err(),
            DecodeError::Json(_)
        ));
    }

    #[test]
    fn rejects_invalid_utf8() {
        let err = decode_phase(&[0xff, 0xfe, 0x7b]).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidUtf8(_)));
    }

    #[test]
    fn encodes_wire_format() {
        let payload = encode_phase(WakeWordPhase::Active).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&payload).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"type": "wakeword_state", "state": "active"})
        );
    }

    #[test]
    fn unknown_phase_is_not_encodable() {
        assert!(matches!(
            encode_phase(WakeWordPhase::Unknown),
            Err(EncodeError::UnknownPhase)
        ));
    }
}
