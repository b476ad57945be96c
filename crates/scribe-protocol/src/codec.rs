//! Codec for encoding and decoding Scribe messages.
//!
//! Messages travel as JSON text frames. Binary frames are accepted on the
//! inbound side as long as they carry UTF-8 encoded JSON.

use serde_json::Value;
use thiserror::Error;

use crate::messages::{ClientMessage, ServerMessage};

/// Maximum encoded message size (16 MiB).
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Protocol errors that can occur during encoding/decoding.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Message exceeds maximum size.
    #[error("Message size {0} exceeds maximum {MAX_MESSAGE_SIZE}")]
    MessageTooLarge(usize),

    /// JSON encoding or decoding error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Binary frame was not valid UTF-8.
    #[error("Invalid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    /// Payload was valid JSON but not an object.
    #[error("Expected a JSON object")]
    NotAnObject,
}

/// Encode a server message to JSON text.
///
/// # Errors
///
/// Returns an error if the message is too large or encoding fails.
pub fn encode(message: &ServerMessage) -> Result<String, ProtocolError> {
    let text = serde_json::to_string(message)?;

    if text.len() > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge(text.len()));
    }

    Ok(text)
}

/// Decode a client message from JSON text.
///
/// The payload must be a JSON object. An object whose `type` is missing,
/// not a string, or not recognized decodes to [`ClientMessage::Unknown`].
///
/// # Errors
///
/// Returns an error if the text is too large, is not a JSON object, or a
/// known message carries a wrongly typed field.
pub fn decode(text: &str) -> Result<ClientMessage, ProtocolError> {
    if text.len() > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge(text.len()));
    }

    let object = match serde_json::from_str::<Value>(text)? {
        Value::Object(object) => object,
        _ => return Err(ProtocolError::NotAnObject),
    };

    if !object.get("type").is_some_and(Value::is_string) {
        return Ok(ClientMessage::Unknown);
    }

    Ok(serde_json::from_value(Value::Object(object))?)
}

/// Decode a client message from a binary frame.
///
/// # Errors
///
/// Returns an error if the bytes are not UTF-8 or not a valid message.
pub fn decode_bytes(data: &[u8]) -> Result<ClientMessage, ProtocolError> {
    if data.len() > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge(data.len()));
    }

    decode(std::str::from_utf8(data)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_users() {
        let text = encode(&ServerMessage::users(vec!["Orange Fox".into(), "Brown Bear".into()]))
            .unwrap();
        assert_eq!(text, r#"{"type":"users","users":["Orange Fox","Brown Bear"]}"#);
    }

    #[test]
    fn test_decode_edit() {
        let msg = decode(r#"{"type":"edit","text":"hello"}"#).unwrap();
        assert_eq!(msg, ClientMessage::edit("hello"));
    }

    #[test]
    fn test_decode_malformed() {
        assert!(matches!(decode("not json"), Err(ProtocolError::Json(_))));
        assert!(matches!(decode("{not json"), Err(ProtocolError::Json(_))));
        assert!(matches!(decode("[1, 2, 3]"), Err(ProtocolError::NotAnObject)));
        assert!(matches!(decode("\"edit\""), Err(ProtocolError::NotAnObject)));
        assert!(matches!(
            decode(r#"{"type":"edit","text":42}"#),
            Err(ProtocolError::Json(_))
        ));
    }

    #[test]
    fn test_decode_without_string_type_is_unknown() {
        for text in [
            "{}",
            r#"{"type":null}"#,
            r#"{"type":5}"#,
            r#"{"type":["edit"]}"#,
            r#"{"text":"no type"}"#,
        ] {
            assert_eq!(decode(text).unwrap(), ClientMessage::Unknown, "{text}");
        }
    }

    #[test]
    fn test_decode_bytes() {
        let msg = decode_bytes(br#"{"type":"typing"}"#).unwrap();
        assert_eq!(msg, ClientMessage::Typing);

        match decode_bytes(&[0xff, 0xfe, 0x00]) {
            Err(ProtocolError::Utf8(_)) => {}
            other => panic!("Expected Utf8 error, got {:?}", other),
        }
    }

    #[test]
    fn test_message_too_large() {
        let large = "a".repeat(MAX_MESSAGE_SIZE + 1);
        match encode(&ServerMessage::edit(large.clone(), "Silver Wolf")) {
            Err(ProtocolError::MessageTooLarge(_)) => {}
            other => panic!("Expected MessageTooLarge error, got {:?}", other),
        }
        match decode(&large) {
            Err(ProtocolError::MessageTooLarge(_)) => {}
            other => panic!("Expected MessageTooLarge error, got {:?}", other),
        }
    }
}
