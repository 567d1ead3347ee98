//! Request and response payloads.
//!
//! Every payload is a JSON object tagged by its `"type"` field.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::message::{Message, ProjectedMessage};

/// Client to server request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Request {
    /// Register a username and its public key
    Join {
        /// Requested username
        username: String,

        /// base64 SPKI DER public key
        #[serde(rename = "publicKey")]
        public_key: String,
    },

    /// Append a message to the log
    Message(Message),

    /// Fetch messages newer than a cursor and refresh presence
    Poll {
        /// Only messages with a strictly greater timestamp are returned
        since: u64,

        /// Reader whose bundles are projected
        username: String,
    },
}

impl Request {
    /// Short name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Join { .. } => "join",
            Self::Message(_) => "message",
            Self::Poll { .. } => "poll",
        }
    }
}

/// Server to client response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Response {
    /// Join accepted
    Joined {
        /// All active usernames, joiner included
        users: Vec<String>,

        /// Public keys of every other active user
        #[serde(rename = "publicKeys")]
        public_keys: BTreeMap<String, String>,

        /// Log high-water mark; poll from here to see only new messages
        cursor: u64,
    },

    /// Message appended
    Sent {
        /// Id of the appended message
        id: String,

        /// Timestamp assigned by the log
        timestamp: u64,
    },

    /// Poll result
    Messages {
        /// Messages newer than the cursor, projected for the reader
        messages: Vec<ProjectedMessage>,

        /// All active usernames
        users: Vec<String>,

        /// Public keys of every active user except the reader
        #[serde(rename = "publicKeys")]
        public_keys: BTreeMap<String, String>,

        /// More messages are waiting past the last one returned
        #[serde(rename = "hasMore", default, skip_serializing_if = "std::ops::Not::not")]
        has_more: bool,
    },

    /// Request rejected
    Error {
        /// Human-readable reason
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::message::Content;

    #[test]
    fn join_wire_shape() {
        let request =
            Request::Join { username: "alice".to_string(), public_key: "TUlJQg==".to_string() };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"type": "join", "username": "alice", "publicKey": "TUlJQg=="})
        );
    }

    #[test]
    fn message_request_is_flattened() {
        let value = json!({
            "type": "message", "id": "1", "sender": "alice",
            "content": "hello", "encrypted": false, "timestamp": "1700000000000"
        });

        let Request::Message(message) = serde_json::from_value(value).unwrap() else {
            panic!("expected message request");
        };
        assert_eq!(message.content, Content::Plaintext("hello".to_string()));
        assert_eq!(message.timestamp, 1_700_000_000_000);
    }

    #[test]
    fn poll_roundtrip() {
        let request = Request::Poll { since: 17, username: "bob".to_string() };
        let json = serde_json::to_string(&request).unwrap();
        assert_eq!(serde_json::from_str::<Request>(&json).unwrap(), request);
        assert_eq!(request.kind(), "poll");
    }

    #[test]
    fn unknown_type_is_rejected() {
        let value = json!({"type": "leave", "username": "bob"});
        assert!(serde_json::from_value::<Request>(value).is_err());
    }

    #[test]
    fn has_more_is_omitted_unless_set() {
        let response = Response::Messages {
            messages: Vec::new(),
            users: vec!["bob".to_string()],
            public_keys: BTreeMap::new(),
            has_more: false,
        };
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({"type": "messages", "messages": [], "users": ["bob"], "publicKeys": {}})
        );

        let value = json!({
            "type": "messages", "messages": [], "users": [], "publicKeys": {}, "hasMore": true
        });
        let Response::Messages { has_more, .. } = serde_json::from_value(value).unwrap() else {
            panic!("expected messages response");
        };
        assert!(has_more);
    }

    #[test]
    fn error_response_shape() {
        let response = Response::Error { message: "invalid request".to_string() };
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({"type": "error", "message": "invalid request"})
        );
    }
}
