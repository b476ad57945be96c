//! Message types for the Scribe protocol.
//!
//! Every message is a JSON object discriminated by its `type` field.
//! Server messages flow to editors, client messages flow to the relay.

use serde::{Deserialize, Serialize};

/// A message sent by the relay to a connected editor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// Initial sync sent once to a freshly joined connection.
    #[serde(rename = "init")]
    Init {
        /// Current buffer content.
        code: String,
        /// Display names of every member, the receiver included.
        users: Vec<String>,
        /// Display name assigned to the receiver.
        #[serde(rename = "yourName")]
        your_name: String,
    },

    /// Updated member roster.
    #[serde(rename = "users")]
    Users {
        /// Display names of every member.
        users: Vec<String>,
    },

    /// The buffer was replaced by another member.
    #[serde(rename = "edit")]
    Edit {
        /// New buffer content.
        code: String,
        /// Display name of the editing member.
        from: String,
    },

    /// Another member is typing.
    #[serde(rename = "typing")]
    Typing {
        /// Display name of the typing member.
        from: String,
    },
}

impl ServerMessage {
    /// Create an Init message.
    #[must_use]
    pub fn init(code: impl Into<String>, users: Vec<String>, your_name: impl Into<String>) -> Self {
        ServerMessage::Init {
            code: code.into(),
            users,
            your_name: your_name.into(),
        }
    }

    /// Create a Users message.
    #[must_use]
    pub fn users(users: Vec<String>) -> Self {
        ServerMessage::Users { users }
    }

    /// Create an Edit message.
    #[must_use]
    pub fn edit(code: impl Into<String>, from: impl Into<String>) -> Self {
        ServerMessage::Edit {
            code: code.into(),
            from: from.into(),
        }
    }

    /// Create a Typing message.
    #[must_use]
    pub fn typing(from: impl Into<String>) -> Self {
        ServerMessage::Typing { from: from.into() }
    }

    /// The wire discriminator of this message.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::Init { .. } => "init",
            ServerMessage::Users { .. } => "users",
            ServerMessage::Edit { .. } => "edit",
            ServerMessage::Typing { .. } => "typing",
        }
    }
}

/// A message sent by an editor to the relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Replace the whole buffer.
    #[serde(rename = "edit")]
    Edit {
        /// New buffer content. Absent or null means empty.
        #[serde(default)]
        text: Option<String>,
    },

    /// Typing indicator.
    #[serde(rename = "typing")]
    Typing,

    /// Any discriminator this relay does not understand.
    #[serde(other, rename = "unknown")]
    Unknown,
}

impl ClientMessage {
    /// Create an Edit message.
    #[must_use]
    pub fn edit(text: impl Into<String>) -> Self {
        ClientMessage::Edit {
            text: Some(text.into()),
        }
    }

    /// The wire discriminator of this message.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            ClientMessage::Edit { .. } => "edit",
            ClientMessage::Typing => "typing",
            ClientMessage::Unknown => "unknown",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_init_wire_shape() {
        let msg = ServerMessage::init("fn main() {}", vec!["Red Panda".into()], "Red Panda");
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "init",
                "code": "fn main() {}",
                "users": ["Red Panda"],
                "yourName": "Red Panda"
            })
        );
    }

    #[test]
    fn test_edit_and_typing_wire_shape() {
        let edit = serde_json::to_value(ServerMessage::edit("hello", "Blue Whale")).unwrap();
        assert_eq!(edit, json!({"type": "edit", "code": "hello", "from": "Blue Whale"}));

        let typing = serde_json::to_value(ServerMessage::typing("Blue Whale")).unwrap();
        assert_eq!(typing, json!({"type": "typing", "from": "Blue Whale"}));
    }

    #[test]
    fn test_client_edit_text_optional() {
        let msg: ClientMessage = serde_json::from_str(r#"{"type":"edit"}"#).unwrap();
        assert_eq!(msg, ClientMessage::Edit { text: None });

        let msg: ClientMessage = serde_json::from_str(r#"{"type":"edit","text":null}"#).unwrap();
        assert_eq!(msg, ClientMessage::Edit { text: None });
    }

    #[test]
    fn test_client_unknown_type() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"cursor","line":3,"column":7}"#).unwrap();
        assert_eq!(msg, ClientMessage::Unknown);
        assert_eq!(msg.kind(), "unknown");
    }

    #[test]
    fn test_typing_ignores_extra_fields() {
        let msg: ClientMessage = serde_json::from_str(r#"{"type":"typing","at":12}"#).unwrap();
        assert_eq!(msg, ClientMessage::Typing);
    }
}
