//! Append-only log of observed conversation messages.

use crate::script::contains_rtl_script;
use dave_core::conversation::{HistoryMessage, IncomingMessage, MessageTags};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Time-ordered buffer of the bound conversation's messages.
///
/// Entries are never mutated or removed; `snapshot` copies them out for the
/// periodic drain.
#[derive(Clone)]
pub struct HistoryLog {
    source_channel: String,
    entries: Arc<RwLock<Vec<HistoryMessage>>>,
}

impl HistoryLog {
    /// Creates an empty log whose entries are tagged with `source_channel`.
    pub fn new(source_channel: impl Into<String>) -> Self {
        Self {
            source_channel: source_channel.into(),
            entries: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Appends `message` if its trimmed text is non-empty.
    ///
    /// # Returns
    ///
    /// The appended entry, or `None` when the message was dropped.
    pub async fn record(&self, message: &IncomingMessage) -> Option<HistoryMessage> {
        let text = message.text.trim();
        if text.is_empty() {
            return None;
        }

        let entry = HistoryMessage {
            sender_display_name: message.sender.display_name(),
            sender_id: message.sender.id,
            timestamp: message.timestamp.timestamp(),
            text: text.to_string(),
            tags: MessageTags {
                contains_rtl_script: contains_rtl_script(text),
                source_channel: self.source_channel.clone(),
            },
        };

        self.entries.write().await.push(entry.clone());
        Some(entry)
    }

    /// Up to the last `n` entries, oldest first.
    pub async fn last_messages(&self, n: usize) -> Vec<HistoryMessage> {
        let entries = self.entries.read().await;
        let start = entries.len().saturating_sub(n);
        entries[start..].to_vec()
    }

    /// The newest entry.
    pub async fn last_message(&self) -> Option<HistoryMessage> {
        self.last_messages(1).await.into_iter().next()
    }

    /// A copy of the whole history, oldest first. Does not clear the log.
    pub async fn snapshot(&self) -> Vec<HistoryMessage> {
        self.entries.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use dave_core::conversation::Sender;

    fn message(id: i64, text: &str) -> IncomingMessage {
        IncomingMessage {
            id,
            chat_id: 1,
            sender: Sender {
                id: 42,
                first_name: "Ada".to_string(),
                last_name: Some("Lovelace".to_string()),
                username: Some("ada".to_string()),
            },
            timestamp: Utc.timestamp_opt(1_700_000_000 + id, 0).unwrap(),
            text: text.to_string(),
            reply_to: None,
        }
    }

    #[tokio::test]
    async fn test_record_trims_text() {
        let log = HistoryLog::new("telegram");
        for input in ["hello", "  padded  ", "\tline\n", "مرحبا "] {
            log.record(&message(1, input)).await;
            let last = log.last_messages(1).await;
            assert_eq!(last.len(), 1);
            assert_eq!(last[0].text, input.trim());
        }
    }

    #[tokio::test]
    async fn test_whitespace_only_is_dropped() {
        let log = HistoryLog::new("telegram");
        log.record(&message(1, "kept")).await;

        for input in ["", " ", "\n\t  ", "\u{3000}"] {
            assert!(log.record(&message(2, input)).await.is_none());
        }
        assert_eq!(log.len().await, 1);
    }

    #[tokio::test]
    async fn test_entry_fields_and_tags() {
        let log = HistoryLog::new("telegram");
        let entry = log.record(&message(5, "سلام friend")).await.unwrap();

        assert_eq!(entry.sender_display_name, "Ada Lovelace");
        assert_eq!(entry.sender_id, 42);
        assert_eq!(entry.timestamp, 1_700_000_005);
        assert!(entry.tags.contains_rtl_script);
        assert_eq!(entry.tags.source_channel, "telegram");

        let plain = log.record(&message(6, "plain ascii")).await.unwrap();
        assert!(!plain.tags.contains_rtl_script);
    }

    #[tokio::test]
    async fn test_last_messages_short_and_empty() {
        let log = HistoryLog::new("telegram");
        assert!(log.last_messages(5).await.is_empty());
        assert!(log.last_message().await.is_none());

        log.record(&message(1, "one")).await;
        log.record(&message(2, "two")).await;

        let texts: Vec<String> = log
            .last_messages(5)
            .await
            .into_iter()
            .map(|m| m.text)
            .collect();
        assert_eq!(texts, vec!["one", "two"]);
        assert_eq!(log.last_message().await.unwrap().text, "two");
    }

    #[tokio::test]
    async fn test_last_messages_window() {
        let log = HistoryLog::new("telegram");
        for i in 0..8 {
            log.record(&message(i, &format!("m{i}"))).await;
        }

        let texts: Vec<String> = log
            .last_messages(3)
            .await
            .into_iter()
            .map(|m| m.text)
            .collect();
        assert_eq!(texts, vec!["m5", "m6", "m7"]);
        assert!(log.last_messages(0).await.is_empty());
    }

    #[tokio::test]
    async fn test_snapshot_does_not_clear() {
        let log = HistoryLog::new("telegram");
        log.record(&message(1, "one")).await;

        let snapshot = log.snapshot().await;
        assert_eq!(snapshot.len(), 1);
        assert_eq!(log.len().await, 1);

        let value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(value[0]["text"], "one");
        assert_eq!(value[0]["tags"]["source_channel"], "telegram");
    }
}
