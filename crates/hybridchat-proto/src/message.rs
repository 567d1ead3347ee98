//! Chat messages, as stored by the server and as projected to a reader.
//!
//! On the wire a message carries an untyped `content` field and a separate
//! `encrypted` flag, and its timestamp is a decimal string. Both are resolved
//! into typed variants here, at the decoding boundary, so the rest of the
//! system never inspects content shape at runtime.
//!
//! | wire `content`     | `encrypted` | [`Content`]              |
//! |--------------------|-------------|--------------------------|
//! | string             | false       | `Plaintext`              |
//! | `{user: bundle}`   | true        | `Encrypted`              |
//! | string             | true        | `LegacyEncrypted`        |
//! | `{user: bundle}`   | false       | rejected                 |

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    bundle::{BundleWire, HybridBundle},
    errors::ProtocolError,
};

/// Message content, resolved from the wire's `content` and `encrypted` fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    /// Unencrypted text (sent when no recipients were known)
    Plaintext(String),

    /// One bundle per recipient, keyed by username
    Encrypted(BTreeMap<String, BundleWire>),

    /// Single opaque ciphertext from a pre-fan-out sender
    LegacyEncrypted(String),
}

impl Content {
    /// Whether the content is ciphertext of any form.
    pub fn is_encrypted(&self) -> bool {
        !matches!(self, Self::Plaintext(_))
    }
}

/// A chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "MessageWire", into = "MessageWire")]
pub struct Message {
    /// Sender-chosen unique id
    pub id: String,

    /// Sender username
    pub sender: String,

    /// Message body
    pub content: Content,

    /// Milliseconds since the Unix epoch. Set by the sender, then replaced by
    /// the log's monotonic timestamp on append.
    pub timestamp: u64,
}

impl Message {
    /// Whether the content is ciphertext of any form.
    pub fn is_encrypted(&self) -> bool {
        self.content.is_encrypted()
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum ContentWire {
    Text(String),
    PerRecipient(BTreeMap<String, BundleWire>),
}

#[derive(Serialize, Deserialize)]
struct MessageWire {
    id: String,
    sender: String,
    content: ContentWire,
    #[serde(default)]
    encrypted: bool,
    timestamp: String,
}

fn parse_timestamp(raw: &str) -> Result<u64, ProtocolError> {
    raw.trim().parse().map_err(|_| ProtocolError::InvalidTimestamp(raw.to_string()))
}

impl TryFrom<MessageWire> for Message {
    type Error = ProtocolError;

    fn try_from(wire: MessageWire) -> Result<Self, Self::Error> {
        let content = match (wire.content, wire.encrypted) {
            (ContentWire::Text(text), false) => Content::Plaintext(text),
            (ContentWire::Text(ciphertext), true) => Content::LegacyEncrypted(ciphertext),
            (ContentWire::PerRecipient(bundles), true) => {
                if bundles.is_empty() {
                    return Err(ProtocolError::ContentMismatch(
                        "encrypted content has no recipients",
                    ));
                }
                Content::Encrypted(bundles)
            },
            (ContentWire::PerRecipient(_), false) => {
                return Err(ProtocolError::ContentMismatch(
                    "per-recipient content must be marked encrypted",
                ));
            },
        };

        Ok(Self {
            id: wire.id,
            sender: wire.sender,
            content,
            timestamp: parse_timestamp(&wire.timestamp)?,
        })
    }
}

impl From<Message> for MessageWire {
    fn from(message: Message) -> Self {
        let encrypted = message.is_encrypted();
        let content = match message.content {
            Content::Plaintext(text) | Content::LegacyEncrypted(text) => ContentWire::Text(text),
            Content::Encrypted(bundles) => ContentWire::PerRecipient(bundles),
        };

        Self {
            id: message.id,
            sender: message.sender,
            content,
            encrypted,
            timestamp: message.timestamp.to_string(),
        }
    }
}

/// Content of a message as seen by one reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectedContent {
    /// Unencrypted text
    Plaintext(String),

    /// The reader's own bundle, or a legacy ciphertext
    Encrypted(BundleWire),

    /// Encrypted message with no bundle for this reader. Carries no
    /// ciphertext at all.
    Placeholder,
}

/// A message projected for a single reader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ProjectedWire", into = "ProjectedWire")]
pub struct ProjectedMessage {
    /// Message id
    pub id: String,

    /// Sender username
    pub sender: String,

    /// Reader-specific content
    pub content: ProjectedContent,

    /// Log-assigned timestamp
    pub timestamp: u64,
}

impl ProjectedMessage {
    /// Project `message` for `reader`.
    ///
    /// Encrypted content yields the reader's own bundle or a placeholder,
    /// never another recipient's bundle.
    pub fn for_reader(message: &Message, reader: &str) -> Self {
        let content = match &message.content {
            Content::Plaintext(text) => ProjectedContent::Plaintext(text.clone()),
            Content::LegacyEncrypted(ciphertext) => {
                ProjectedContent::Encrypted(BundleWire::Legacy(ciphertext.clone()))
            },
            Content::Encrypted(bundles) => bundles
                .get(reader)
                .map_or(ProjectedContent::Placeholder, |own| {
                    ProjectedContent::Encrypted(own.clone())
                }),
        };

        Self {
            id: message.id.clone(),
            sender: message.sender.clone(),
            content,
            timestamp: message.timestamp,
        }
    }

    /// Whether the content is ciphertext or a placeholder for one.
    pub fn is_encrypted(&self) -> bool {
        !matches!(self.content, ProjectedContent::Plaintext(_))
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum ProjectedContentWire {
    Text(String),
    Bundle(HybridBundle),
}

#[derive(Serialize, Deserialize)]
struct ProjectedWire {
    id: String,
    sender: String,
    content: Option<ProjectedContentWire>,
    #[serde(default)]
    encrypted: bool,
    timestamp: String,
}

impl TryFrom<ProjectedWire> for ProjectedMessage {
    type Error = ProtocolError;

    fn try_from(wire: ProjectedWire) -> Result<Self, Self::Error> {
        let content = match (wire.content, wire.encrypted) {
            (Some(ProjectedContentWire::Text(text)), false) => ProjectedContent::Plaintext(text),
            (Some(ProjectedContentWire::Text(text)), true) => {
                ProjectedContent::Encrypted(BundleWire::Legacy(text))
            },
            (Some(ProjectedContentWire::Bundle(bundle)), true) => {
                ProjectedContent::Encrypted(BundleWire::Hybrid(bundle))
            },
            (None, true) => ProjectedContent::Placeholder,
            (Some(ProjectedContentWire::Bundle(_)), false) => {
                return Err(ProtocolError::ContentMismatch("bundle must be marked encrypted"));
            },
            (None, false) => {
                return Err(ProtocolError::ContentMismatch("only encrypted content may be null"));
            },
        };

        Ok(Self {
            id: wire.id,
            sender: wire.sender,
            content,
            timestamp: parse_timestamp(&wire.timestamp)?,
        })
    }
}

impl From<ProjectedMessage> for ProjectedWire {
    fn from(message: ProjectedMessage) -> Self {
        let encrypted = message.is_encrypted();
        let content = match message.content {
            ProjectedContent::Plaintext(text)
            | ProjectedContent::Encrypted(BundleWire::Legacy(text)) => {
                Some(ProjectedContentWire::Text(text))
            },
            ProjectedContent::Encrypted(BundleWire::Hybrid(bundle)) => {
                Some(ProjectedContentWire::Bundle(bundle))
            },
            ProjectedContent::Placeholder => None,
        };

        Self {
            id: message.id,
            sender: message.sender,
            content,
            encrypted,
            timestamp: message.timestamp.to_string(),
        }
    }
}
