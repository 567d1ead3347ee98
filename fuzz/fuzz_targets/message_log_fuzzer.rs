//! Fuzz target for the message log
//!
//! # Strategy
//!
//! - Arbitrary sender timestamps, including 0 and `u64::MAX`
//! - Repeated ids to hit duplicate detection
//! - Small capacities so truncation happens constantly
//!
//! # Invariants
//!
//! - Length never exceeds capacity
//! - Assigned timestamps strictly increase
//! - A duplicate reports the timestamp first assigned to that id
//! - Appends are refused only after `u64::MAX` has been assigned
//! - `since(latest)` is always empty

#![no_main]

use std::collections::HashMap;

use arbitrary::Arbitrary;
use hybridchat_core::{AppendOutcome, MessageLog};
use hybridchat_proto::{Content, Message};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct Input {
    capacity: u8,
    ops: Vec<Op>,
}

#[derive(Debug, Arbitrary)]
enum Op {
    Append { id: u8, timestamp: u64 },
    Since { cursor: u64 },
}

fuzz_target!(|input: Input| {
    let capacity = usize::from(input.capacity % 16) + 1;
    let Ok(mut log) = MessageLog::with_capacity(capacity) else {
        return;
    };

    let mut assigned: HashMap<String, u64> = HashMap::new();
    let mut last = 0u64;

    for op in input.ops {
        match op {
            Op::Append { id, timestamp } => {
                let id = format!("m{id}");
                let message = Message {
                    id: id.clone(),
                    sender: "fuzz".to_string(),
                    content: Content::Plaintext(String::new()),
                    timestamp,
                };
                let retained = log.iter().any(|m| m.id == id);

                match log.append(message) {
                    Ok(AppendOutcome::Appended { timestamp: ts, .. }) => {
                        assert!(!retained, "retained id appended twice");
                        assert!(ts > last, "timestamp went backwards");
                        last = ts;
                        assigned.insert(id, ts);
                    },
                    Ok(AppendOutcome::Duplicate { timestamp: ts }) => {
                        assert!(retained, "duplicate reported for evicted id");
                        assert_eq!(assigned.get(&id), Some(&ts));
                    },
                    Err(_) => {
                        assert_eq!(last, u64::MAX, "append refused before timestamps ran out");
                        assert!(!retained, "refused a retained id instead of reporting it");
                    },
                }
                assert!(log.len() <= capacity);
            },
            Op::Since { cursor } => {
                let messages = log.since(cursor, "reader");
                assert!(messages.iter().all(|m| m.timestamp > cursor));
                assert!(messages.windows(2).all(|w| w[0].timestamp < w[1].timestamp));

                let page = log.page(cursor, "reader", 256);
                assert!(messages.starts_with(&page.messages));
                assert_eq!(page.has_more, page.messages.len() < messages.len());
            },
        }

        assert!(log.since(log.latest_timestamp(), "reader").is_empty());
    }
});
