//! Property-based tests for the message log
//!
//! 1. **Retention**: after any sequence of appends the log holds exactly the
//!    newest `min(n, capacity)` messages, in append order
//! 2. **Monotonicity**: assigned timestamps strictly increase regardless of
//!    sender clocks
//! 3. **Cursor completeness**: polling with the last seen timestamp returns
//!    every retained message exactly once

use hybridchat_core::MessageLog;
use hybridchat_proto::{Content, Message};
use proptest::prelude::*;

fn message(index: usize, timestamp: u64) -> Message {
    Message {
        id: format!("m{index}"),
        sender: "alice".to_string(),
        content: Content::Plaintext(format!("message {index}")),
        timestamp,
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_retains_newest_in_order(
        capacity in 1usize..50,
        timestamps in prop::collection::vec(any::<u32>(), 0..150),
    ) {
        let mut log = MessageLog::with_capacity(capacity).unwrap();
        for (i, &ts) in timestamps.iter().enumerate() {
            log.append(message(i, u64::from(ts))).unwrap();
            prop_assert!(log.len() <= capacity);
        }

        let expected: Vec<String> = (0..timestamps.len())
            .skip(timestamps.len().saturating_sub(capacity))
            .map(|i| format!("m{i}"))
            .collect();
        let retained: Vec<String> = log.iter().map(|m| m.id.clone()).collect();
        prop_assert_eq!(retained, expected);
    }

    #[test]
    fn prop_timestamps_strictly_increase(
        timestamps in prop::collection::vec(any::<u32>(), 1..100),
    ) {
        let mut log = MessageLog::with_capacity(1000).unwrap();
        let mut previous = 0u64;
        for (i, &ts) in timestamps.iter().enumerate() {
            let assigned = log.append(message(i, u64::from(ts))).unwrap().timestamp();
            prop_assert!(assigned > previous);
            prop_assert!(assigned >= u64::from(ts));
            previous = assigned;
        }
    }

    #[test]
    fn prop_cursor_sees_every_message_once(
        batches in prop::collection::vec(prop::collection::vec(any::<u16>(), 0..10), 1..20),
    ) {
        let mut log = MessageLog::with_capacity(10_000).unwrap();
        let mut cursor = 0u64;
        let mut seen = Vec::new();
        let mut sent = Vec::new();

        for batch in batches {
            for ts in batch {
                let index = sent.len();
                sent.push(format!("m{index}"));
                log.append(message(index, u64::from(ts))).unwrap();
            }

            let fresh = log.since(cursor, "bob");
            if let Some(last) = fresh.last() {
                cursor = last.timestamp;
            }
            seen.extend(fresh.into_iter().map(|m| m.id));
        }

        prop_assert_eq!(seen, sent);
    }
}
