//! Frames the server sends to clients.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A relayed chat message.
///
/// `source` and `destination` are copied verbatim from the sender's payload
/// and may hold any JSON value; they are omitted from the wire when absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Message body, already trimmed.
    pub text: String,
    /// Authenticated name of the session that sent the message.
    pub sender: String,
    /// Declared source, as sent by the client.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<Value>,
    /// Declared destination, as sent by the client.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<Value>,
}

impl ChatMessage {
    /// The destination as a name, when it is a string.
    pub fn destination_name(&self) -> Option<&str> {
        self.destination.as_ref().and_then(Value::as_str)
    }
}

/// Every frame the server can emit, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Outbound {
    /// Reply to a login request.
    Login {
        /// Whether the session is now authenticated.
        success: bool,
        /// Why the login was refused.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    /// Announcement that a name has just authenticated.
    NewUser {
        /// The newly authenticated name.
        username: String,
    },
    /// A relayed (or replayed) chat message.
    Message(ChatMessage),
    /// Announcement that an authenticated session has gone away.
    UserDisconnected {
        /// The departed name.
        username: String,
    },
}

impl Outbound {
    /// Successful login reply.
    pub fn login_ok() -> Self {
        Self::Login {
            success: true,
            reason: None,
        }
    }

    /// Refused login reply.
    pub fn login_rejected(reason: impl Into<String>) -> Self {
        Self::Login {
            success: false,
            reason: Some(reason.into()),
        }
    }

    /// `newuser` announcement.
    pub fn new_user(username: impl Into<String>) -> Self {
        Self::NewUser {
            username: username.into(),
        }
    }

    /// `userdisconnected` announcement.
    pub fn user_disconnected(username: impl Into<String>) -> Self {
        Self::UserDisconnected {
            username: username.into(),
        }
    }

    /// The wire `type` of this frame, for logs and metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Login { .. } => "login",
            Self::NewUser { .. } => "newuser",
            Self::Message(_) => "message",
            Self::UserDisconnected { .. } => "userdisconnected",
        }
    }
}

impl From<ChatMessage> for Outbound {
    fn from(message: ChatMessage) -> Self {
        Self::Message(message)
    }
}
