//! Durable conversation history
//!
//! History lives in a single keyed slot of a small key/value store, written
//! as a whole JSON array on every change and read once at startup.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, error, warn};

use crate::error::StoreError;
use crate::state::Message;

/// Slot holding the serialized message list
pub const HISTORY_KEY: &str = "geoChatHistory";

/// A per-user key/value slot store
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&mut self, key: &str) -> Result<(), StoreError>;
}

/// SQLite-backed store, one row per key
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS kv (key TEXT PRIMARY KEY, value TEXT NOT NULL)",
            [],
        )?;
        Ok(Self { conn })
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let value = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO kv (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        self.conn.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }
}

/// Non-durable store
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    slots: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.slots.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.slots.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        self.slots.remove(key);
        Ok(())
    }
}

/// Ordered message history, kept in sync with its store slot
pub struct Conversation<S: KeyValueStore> {
    messages: Vec<Message>,
    store: S,
}

impl<S: KeyValueStore> Conversation<S> {
    /// Rehydrate from the store. Unreadable history is logged and treated as
    /// an empty conversation.
    pub fn load(store: S) -> Self {
        let messages = match store.get(HISTORY_KEY) {
            Ok(Some(raw)) => match serde_json::from_str::<Vec<Message>>(&raw) {
                Ok(messages) => {
                    debug!(count = messages.len(), "restored conversation history");
                    messages
                }
                Err(e) => {
                    warn!("Could not parse chat history from storage: {}", e);
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!("Could not read chat history from storage: {}", e);
                Vec::new()
            }
        };

        Self { messages, store }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Append and write the whole list back
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
        self.persist();
    }

    /// Millisecond timestamp id, strictly greater than the last numeric id
    pub fn next_id(&self) -> String {
        let now = chrono::Utc::now().timestamp_millis();
        let last = self
            .messages
            .iter()
            .rev()
            .find_map(|m| m.id.parse::<i64>().ok());
        let id = match last {
            Some(last) if now <= last => last + 1,
            _ => now,
        };
        id.to_string()
    }

    /// Drop all messages and the stored slot
    pub fn clear(&mut self) -> Result<(), StoreError> {
        self.messages.clear();
        self.store.remove(HISTORY_KEY)
    }

    fn persist(&mut self) {
        if self.messages.is_empty() {
            return;
        }
        let result = serde_json::to_string(&self.messages)
            .map_err(StoreError::from)
            .and_then(|json| self.store.set(HISTORY_KEY, &json));
        if let Err(e) = result {
            error!("Could not save chat history: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{GroundingChunk, MapsSource, WebSource};
    use tempfile::tempdir;

    fn sample_messages() -> Vec<Message> {
        vec![
            Message::welcome(),
            Message::user("1700000000000", "best coffee nearby"),
            Message::model(
                "1700000000001",
                "Try **Blue Bottle**.",
                vec![
                    GroundingChunk::Web(WebSource {
                        uri: Some("https://bluebottlecoffee.com".to_string()),
                        title: Some("Blue Bottle".to_string()),
                    }),
                    GroundingChunk::Maps(MapsSource {
                        uri: Some("https://maps.google.com/?cid=42".to_string()),
                        title: Some("Blue Bottle Mint Plaza".to_string()),
                        place_answer_sources: None,
                    }),
                ],
            ),
        ]
    }

    #[test]
    fn test_history_round_trips_through_sqlite() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("storage.db");

        let mut conversation = Conversation::load(SqliteStore::open(&path).unwrap());
        assert!(conversation.is_empty());
        for message in sample_messages() {
            conversation.push(message);
        }
        drop(conversation);

        let restored = Conversation::load(SqliteStore::open(&path).unwrap());
        assert_eq!(restored.messages(), sample_messages().as_slice());
    }

    #[test]
    fn test_corrupt_history_loads_empty() {
        let mut store = MemoryStore::new();
        store.set(HISTORY_KEY, "{not valid json").unwrap();

        let conversation = Conversation::load(store);
        assert!(conversation.is_empty());
    }

    #[test]
    fn test_every_push_is_persisted() {
        let mut conversation = Conversation::load(MemoryStore::new());
        conversation.push(Message::welcome());
        let raw = conversation.store().get(HISTORY_KEY).unwrap().unwrap();
        let stored: Vec<Message> = serde_json::from_str(&raw).unwrap();
        assert_eq!(stored.len(), 1);

        conversation.push(Message::user(conversation.next_id(), "hello"));
        let raw = conversation.store().get(HISTORY_KEY).unwrap().unwrap();
        let stored: Vec<Message> = serde_json::from_str(&raw).unwrap();
        assert_eq!(stored.as_slice(), conversation.messages());
    }

    #[test]
    fn test_ids_are_unique_and_increasing() {
        let mut conversation = Conversation::load(MemoryStore::new());
        // An id from the future forces the counter to bump instead of using the clock
        conversation.push(Message::user("99999999999999", "first"));
        let next = conversation.next_id();
        assert_eq!(next, "100000000000000");

        conversation.push(Message::user(next.clone(), "second"));
        let after = conversation.next_id();
        assert!(after.parse::<i64>().unwrap() > next.parse::<i64>().unwrap());
    }

    #[test]
    fn test_clear_removes_slot() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store.set("other", "kept").unwrap();
        let mut conversation = Conversation::load(store);
        conversation.push(Message::welcome());

        conversation.clear().unwrap();
        assert!(conversation.is_empty());
        assert_eq!(conversation.store().get(HISTORY_KEY).unwrap(), None);
        assert_eq!(conversation.store().get("other").unwrap().as_deref(), Some("kept"));
    }
}
