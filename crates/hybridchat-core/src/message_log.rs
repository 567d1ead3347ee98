//! Capacity-bounded, append-only message log.
//!
//! The log assigns every message a timestamp strictly greater than the one
//! before it. Clients poll with the last timestamp they saw, so a strictly
//! increasing sequence means a cursor never skips or repeats a message, even
//! when sender clocks disagree.
//!
//! # Invariants
//!
//! - `len() <= capacity` after every call returns
//! - Timestamps are strictly increasing in append order. Once `u64::MAX` has
//!   been assigned, further appends are rejected
//! - Message ids are unique among retained messages

use std::collections::{HashMap, VecDeque};

use hybridchat_proto::{Message, ProjectedMessage, codec};

use crate::error::ServiceError;

/// Default number of retained messages.
pub const DEFAULT_CAPACITY: usize = 200;

/// Result of appending a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// Message was appended.
    Appended {
        /// Timestamp assigned by the log
        timestamp: u64,
        /// Number of old messages dropped to stay within capacity
        dropped: usize,
    },
    /// A message with the same id is already retained; nothing was appended.
    Duplicate {
        /// Timestamp assigned when the original was appended
        timestamp: u64,
    },
}

impl AppendOutcome {
    /// Timestamp of the message in the log.
    pub fn timestamp(&self) -> u64 {
        match self {
            Self::Appended { timestamp, .. } | Self::Duplicate { timestamp } => *timestamp,
        }
    }
}

/// A size-bounded run of projected messages returned by [`MessageLog::page`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// Projected messages, oldest first
    pub messages: Vec<ProjectedMessage>,
    /// Newer messages were left out to respect the byte budget
    pub has_more: bool,
}

/// Ordered, capacity-bounded sequence of messages.
#[derive(Debug, Clone)]
pub struct MessageLog {
    entries: VecDeque<Message>,
    /// Message id → assigned timestamp, for retained messages only
    ids: HashMap<String, u64>,
    capacity: usize,
    /// High-water mark; survives truncation
    last_timestamp: u64,
}

impl Default for MessageLog {
    fn default() -> Self {
        Self {
            entries: VecDeque::with_capacity(DEFAULT_CAPACITY),
            ids: HashMap::with_capacity(DEFAULT_CAPACITY),
            capacity: DEFAULT_CAPACITY,
            last_timestamp: 0,
        }
    }
}

impl MessageLog {
    /// Create an empty log retaining at most `capacity` messages.
    ///
    /// # Errors
    ///
    /// - `InvalidConfig` if `capacity` is zero
    pub fn with_capacity(capacity: usize) -> Result<Self, ServiceError> {
        if capacity == 0 {
            return Err(ServiceError::InvalidConfig { reason: "log capacity must be at least 1" });
        }

        Ok(Self {
            entries: VecDeque::with_capacity(capacity),
            ids: HashMap::with_capacity(capacity),
            capacity,
            last_timestamp: 0,
        })
    }

    /// Append a message, dropping the oldest entries beyond capacity.
    ///
    /// The stored timestamp is `max(message.timestamp, last + 1)`. A message
    /// whose id is already retained is not appended again.
    ///
    /// # Errors
    ///
    /// - `TimestampsExhausted` if `u64::MAX` has already been assigned
    pub fn append(&mut self, mut message: Message) -> Result<AppendOutcome, ServiceError> {
        if let Some(&timestamp) = self.ids.get(&message.id) {
            return Ok(AppendOutcome::Duplicate { timestamp });
        }

        let next = self.last_timestamp.checked_add(1).ok_or(ServiceError::TimestampsExhausted)?;
        let timestamp = message.timestamp.max(next);
        message.timestamp = timestamp;
        self.last_timestamp = timestamp;

        self.ids.insert(message.id.clone(), timestamp);
        self.entries.push_back(message);

        let mut dropped = 0;
        while self.entries.len() > self.capacity {
            if let Some(old) = self.entries.pop_front() {
                self.ids.remove(&old.id);
                dropped += 1;
            }
        }

        debug_assert!(self.entries.len() <= self.capacity);
        debug_assert_eq!(self.entries.len(), self.ids.len());

        Ok(AppendOutcome::Appended { timestamp, dropped })
    }

    /// Messages with a timestamp strictly greater than `since`, in order,
    /// projected for `reader`.
    ///
    /// Encrypted messages carry only the reader's own bundle, or a
    /// placeholder when none was addressed to the reader.
    pub fn since(&self, since: u64, reader: &str) -> Vec<ProjectedMessage> {
        let start = self.entries.partition_point(|message| message.timestamp <= since);
        self.entries
            .range(start..)
            .map(|message| ProjectedMessage::for_reader(message, reader))
            .collect()
    }

    /// Like [`since`](Self::since), but stops before the encoded messages
    /// exceed `max_bytes`. The first message is always included so a reader
    /// can make progress; the caller keeps single messages below the budget.
    pub fn page(&self, since: u64, reader: &str, max_bytes: usize) -> Page {
        let start = self.entries.partition_point(|message| message.timestamp <= since);
        let mut messages = Vec::new();
        let mut used = 0usize;

        for message in self.entries.range(start..) {
            let projected = ProjectedMessage::for_reader(message, reader);
            // One extra byte for the separating comma
            let size = codec::encoded_len(&projected).map_or(usize::MAX, |len| len + 1);

            if !messages.is_empty() && used.saturating_add(size) > max_bytes {
                return Page { messages, has_more: true };
            }

            used = used.saturating_add(size);
            messages.push(projected);
        }

        Page { messages, has_more: false }
    }

    /// Timestamp of the newest message ever appended, 0 if none.
    pub fn latest_timestamp(&self) -> u64 {
        self.last_timestamp
    }

    /// Retained messages, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.entries.iter()
    }

    /// Number of retained messages.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no message is retained.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of retained messages.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use hybridchat_proto::{BundleWire, Content, ProjectedContent};

    use super::*;

    fn text(id: &str, timestamp: u64) -> Message {
        Message {
            id: id.to_string(),
            sender: "alice".to_string(),
            content: Content::Plaintext(format!("msg {id}")),
            timestamp,
        }
    }

    #[test]
    fn zero_capacity_is_rejected() {
        assert!(matches!(MessageLog::with_capacity(0), Err(ServiceError::InvalidConfig { .. })));
    }

    #[test]
    fn keeps_newest_when_over_capacity() {
        let mut log = MessageLog::with_capacity(3).unwrap();
        for i in 1..=4 {
            log.append(text(&i.to_string(), i)).unwrap();
        }

        let ids: Vec<_> = log.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["2", "3", "4"]);
    }

    #[test]
    fn append_reports_dropped_count() {
        let mut log = MessageLog::with_capacity(1).unwrap();
        let first = log.append(text("a", 1)).unwrap();
        let second = log.append(text("b", 2)).unwrap();
        assert_eq!(first, AppendOutcome::Appended { timestamp: 1, dropped: 0 });
        assert_eq!(second, AppendOutcome::Appended { timestamp: 2, dropped: 1 });
    }

    #[test]
    fn timestamps_strictly_increase_despite_skewed_senders() {
        let mut log = MessageLog::default();
        log.append(text("a", 1000)).unwrap();
        let late = log.append(text("b", 500)).unwrap();
        let equal = log.append(text("c", 1001)).unwrap();

        assert_eq!(late.timestamp(), 1001);
        assert_eq!(equal.timestamp(), 1002);
        assert_eq!(log.latest_timestamp(), 1002);
    }

    #[test]
    fn duplicate_id_is_not_appended() {
        let mut log = MessageLog::default();
        log.append(text("a", 10)).unwrap();

        let retry = log.append(text("a", 20)).unwrap();
        assert_eq!(retry, AppendOutcome::Duplicate { timestamp: 10 });
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn since_is_strictly_greater() {
        let mut log = MessageLog::default();
        for i in 1..=5 {
            log.append(text(&i.to_string(), i * 10)).unwrap();
        }

        let ids: Vec<_> = log.since(30, "bob").into_iter().map(|m| m.id).collect();
        assert_eq!(ids, ["4", "5"]);
        assert!(log.since(50, "bob").is_empty());
        assert_eq!(log.since(0, "bob").len(), 5);
    }

    #[test]
    fn since_projects_per_reader() {
        let mut log = MessageLog::default();
        let bundle = BundleWire::Legacy("Ym9i".to_string());
        log.append(Message {
            id: "e".to_string(),
            sender: "alice".to_string(),
            content: Content::Encrypted(BTreeMap::from([("bob".to_string(), bundle.clone())])),
            timestamp: 1,
        })
        .unwrap();

        assert_eq!(log.since(0, "bob")[0].content, ProjectedContent::Encrypted(bundle));
        assert_eq!(log.since(0, "carol")[0].content, ProjectedContent::Placeholder);
    }

    #[test]
    fn latest_timestamp_survives_truncation() {
        let mut log = MessageLog::with_capacity(1).unwrap();
        log.append(text("a", 5)).unwrap();
        log.append(text("b", 9)).unwrap();
        assert_eq!(log.latest_timestamp(), 9);
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn empty_log_high_water_mark_is_zero() {
        let log = MessageLog::default();
        assert_eq!(log.latest_timestamp(), 0);
        assert!(log.since(0, "bob").is_empty());
    }

    #[test]
    fn append_after_max_timestamp_is_rejected() {
        let mut log = MessageLog::default();
        assert_eq!(log.append(text("a", u64::MAX)).unwrap().timestamp(), u64::MAX);

        assert_eq!(log.append(text("b", 1)), Err(ServiceError::TimestampsExhausted));
        assert_eq!(log.len(), 1);
        assert_eq!(log.latest_timestamp(), u64::MAX);
    }

    #[test]
    fn page_stops_at_byte_budget() {
        let mut log = MessageLog::default();
        for i in 1..=10 {
            log.append(text(&i.to_string(), i)).unwrap();
        }
        let one = codec::encoded_len(&log.since(0, "bob")[0]).unwrap() + 1;

        let page = log.page(0, "bob", one * 3);
        let ids: Vec<_> = page.messages.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["1", "2", "3"]);
        assert!(page.has_more);

        let rest = log.page(3, "bob", usize::MAX);
        assert_eq!(rest.messages.len(), 7);
        assert!(!rest.has_more);
    }

    #[test]
    fn page_always_returns_one_message() {
        let mut log = MessageLog::default();
        log.append(text("a", 1)).unwrap();
        log.append(text("b", 2)).unwrap();

        let page = log.page(0, "bob", 0);
        assert_eq!(page.messages.len(), 1);
        assert!(page.has_more);
    }
}
