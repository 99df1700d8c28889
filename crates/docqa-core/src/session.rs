//! Per-document chat history.
//!
//! Logs are append-only and live exactly as long as their document: the
//! engine opens one at registration and removes it on deletion. Appending to
//! a document without a log fails, so a query that races a deletion cannot
//! recreate its history.

use std::collections::HashMap;

use chrono::Utc;
use parking_lot::RwLock;

use crate::error::{Error, Result};
use crate::models::{ChatMessage, Citation};

#[derive(Default)]
pub struct SessionStore {
    logs: RwLock<HashMap<String, Vec<ChatMessage>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty log. Existing history is kept.
    pub fn open(&self, document_id: &str) {
        self.logs
            .write()
            .entry(document_id.to_string())
            .or_default();
    }

    /// Record one exchange, assigning its id and timestamp.
    pub fn append(
        &self,
        document_id: &str,
        question: impl Into<String>,
        answer: impl Into<String>,
        citations: Vec<Citation>,
    ) -> Result<ChatMessage> {
        let mut logs = self.logs.write();
        let log = logs
            .get_mut(document_id)
            .ok_or_else(|| Error::not_found(document_id))?;
        let message = ChatMessage {
            id: uuid::Uuid::new_v4().to_string(),
            document_id: document_id.to_string(),
            question: question.into(),
            answer: answer.into(),
            citations,
            created_at: Utc::now(),
        };
        log.push(message.clone());
        Ok(message)
    }

    /// Messages in creation order.
    pub fn history(&self, document_id: &str) -> Result<Vec<ChatMessage>> {
        self.logs
            .read()
            .get(document_id)
            .cloned()
            .ok_or_else(|| Error::not_found(document_id))
    }

    /// Empty a log but keep it open.
    pub fn clear(&self, document_id: &str) -> Result<()> {
        self.logs
            .write()
            .get_mut(document_id)
            .map(Vec::clear)
            .ok_or_else(|| Error::not_found(document_id))
    }

    /// Drop a log entirely. Returns whether one existed.
    pub fn remove(&self, document_id: &str) -> bool {
        self.logs.write().remove(document_id).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_in_creation_order() {
        let store = SessionStore::new();
        store.open("doc");
        let first = store.append("doc", "q1", "a1", Vec::new()).unwrap();
        let second = store.append("doc", "q2", "a2", Vec::new()).unwrap();
        assert_ne!(first.id, second.id);

        let history = store.history("doc").unwrap();
        let questions: Vec<&str> = history.iter().map(|m| m.question.as_str()).collect();
        assert_eq!(questions, vec!["q1", "q2"]);
        assert!(history[0].created_at <= history[1].created_at);
    }

    #[test]
    fn test_append_without_log_fails() {
        let store = SessionStore::new();
        let err = store.append("ghost", "q", "a", Vec::new()).unwrap_err();
        assert!(matches!(err, Error::DocumentNotFound(_)));
        assert!(store.history("ghost").is_err());
    }

    #[test]
    fn test_open_keeps_existing_history() {
        let store = SessionStore::new();
        store.open("doc");
        store.append("doc", "q", "a", Vec::new()).unwrap();
        store.open("doc");
        assert_eq!(store.history("doc").unwrap().len(), 1);
    }

    #[test]
    fn test_clear_and_remove() {
        let store = SessionStore::new();
        store.open("doc");
        store
            .append(
                "doc",
                "q",
                "a",
                vec![Citation {
                    page: 2,
                    chunk_ids: vec!["c".into()],
                }],
            )
            .unwrap();
        store.clear("doc").unwrap();
        assert!(store.history("doc").unwrap().is_empty());

        assert!(store.remove("doc"));
        assert!(!store.remove("doc"));
        assert!(store.clear("doc").is_err());
        assert!(store.append("doc", "q", "a", Vec::new()).is_err());
    }
}
