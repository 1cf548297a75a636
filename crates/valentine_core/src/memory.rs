//! crates/valentine_core/src/memory.rs
//!
//! An in-process implementation of the `ValentineStore` port. It follows the same
//! rules as the database adapter: codes are unique and the first reply wins.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::domain::{Code, NewValentine, Reply, ValentineRecord};
use crate::ports::{PortError, PortResult, ValentineStore};

#[derive(Default)]
pub struct InMemoryStore {
    records: Mutex<HashMap<Code, ValentineRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored valentines. A poisoned lock still holds intact records,
    /// so they are counted.
    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> PortResult<MutexGuard<'_, HashMap<Code, ValentineRecord>>> {
        self.records
            .lock()
            .map_err(|e| PortError::Unexpected(format!("store lock poisoned: {}", e)))
    }
}

#[async_trait]
impl ValentineStore for InMemoryStore {
    async fn find_by_code(&self, code: &Code) -> PortResult<Option<ValentineRecord>> {
        Ok(self.lock()?.get(code).cloned())
    }

    async fn insert(&self, valentine: NewValentine) -> PortResult<ValentineRecord> {
        let mut records = self.lock()?;
        if records.contains_key(&valentine.code) {
            return Err(PortError::Conflict(format!(
                "Code {} is already in use",
                valentine.code
            )));
        }
        let record = ValentineRecord {
            id: Uuid::new_v4(),
            code: valentine.code.clone(),
            sender_name: valentine.sender_name,
            recipient_name: valentine.recipient_name,
            reply: None,
            created_at: Utc::now(),
            replied_at: None,
        };
        records.insert(valentine.code, record.clone());
        Ok(record)
    }

    async fn record_reply(&self, code: &Code, reply: Reply) -> PortResult<ValentineRecord> {
        let mut records = self.lock()?;
        let record = records
            .get_mut(code)
            .ok_or_else(|| PortError::NotFound(format!("Valentine {} not found", code)))?;
        if record.is_answered() {
            return Err(PortError::AlreadyAnswered(format!(
                "Valentine {} already has a reply",
                code
            )));
        }
        record.reply = Some(reply);
        record.replied_at = Some(Utc::now());
        Ok(record.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SenderName;

    fn new_valentine(code: &str, sender: &str) -> NewValentine {
        NewValentine {
            code: Code::parse(code).unwrap(),
            sender_name: SenderName::parse(sender).unwrap(),
            recipient_name: None,
        }
    }

    #[tokio::test]
    async fn inserted_record_is_found_unanswered() {
        let store = InMemoryStore::new();
        store.insert(new_valentine("abc123", "Alex")).await.unwrap();

        let found = store
            .find_by_code(&Code::parse("abc123").unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.sender_name.as_str(), "Alex");
        assert_eq!(found.reply, None);
        assert_eq!(found.replied_at, None);
    }

    #[tokio::test]
    async fn unknown_code_is_none_not_error() {
        let store = InMemoryStore::new();
        let found = store.find_by_code(&Code::parse("nope").unwrap()).await;
        assert!(matches!(found, Ok(None)));
    }

    #[tokio::test]
    async fn duplicate_code_conflicts() {
        let store = InMemoryStore::new();
        store.insert(new_valentine("dup", "Alex")).await.unwrap();
        let err = store.insert(new_valentine("dup", "Sam")).await.unwrap_err();
        assert!(matches!(err, PortError::Conflict(_)));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn first_reply_wins() {
        let store = InMemoryStore::new();
        store.insert(new_valentine("once", "Alex")).await.unwrap();
        let code = Code::parse("once").unwrap();

        let first = store.record_reply(&code, Reply::No).await.unwrap();
        assert_eq!(first.reply, Some(Reply::No));
        assert!(first.replied_at.is_some());

        let err = store.record_reply(&code, Reply::Yes).await.unwrap_err();
        assert!(matches!(err, PortError::AlreadyAnswered(_)));

        let stored = store.find_by_code(&code).await.unwrap().unwrap();
        assert_eq!(stored.reply, Some(Reply::No));
        assert_eq!(stored.replied_at, first.replied_at);
    }

    #[tokio::test]
    async fn reply_to_unknown_code_is_not_found() {
        let store = InMemoryStore::new();
        let err = store
            .record_reply(&Code::parse("ghost").unwrap(), Reply::Yes)
            .await
            .unwrap_err();
        assert!(matches!(err, PortError::NotFound(_)));
    }

    #[tokio::test]
    async fn poisoned_lock_still_counts_records_but_fails_port_calls() {
        let store = std::sync::Arc::new(InMemoryStore::new());
        store.insert(new_valentine("abc123", "Alex")).await.unwrap();

        let holder = store.clone();
        let crashed = std::thread::spawn(move || {
            let _records = holder.records.lock().unwrap();
            panic!("crash while holding the store lock");
        })
        .join();
        assert!(crashed.is_err());

        assert_eq!(store.len(), 1);
        assert!(!store.is_empty());
        let found = store.find_by_code(&Code::parse("abc123").unwrap()).await;
        assert!(matches!(found, Err(PortError::Unexpected(_))));
    }
}
