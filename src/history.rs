use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};

use crate::chat::ChatMessage;

/// Storage port for the conversation snapshot.
///
/// The store persists the full message list under one fixed slot: it is
/// read once at startup and rewritten whole after each mutation.
pub trait HistoryStore {
    /// Returns the persisted messages. An absent snapshot is an empty list;
    /// unreadable content is an error the caller treats as "no snapshot".
    fn load(&self) -> Result<Vec<ChatMessage>>;
    fn save(&self, messages: &[ChatMessage]) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

/// Snapshot file under the user config directory (`pagume/history.json`).
pub struct FileHistory {
    path: PathBuf,
}

impl FileHistory {
    pub fn new() -> Result<Self> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(Self {
            path: config_dir.join("pagume").join("history.json"),
        })
    }

    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }
}

impl HistoryStore for FileHistory {
    fn load(&self) -> Result<Vec<ChatMessage>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&self.path)?;
        let messages: Vec<ChatMessage> = serde_json::from_str(&content)?;
        Ok(messages)
    }

    fn save(&self, messages: &[ChatMessage]) -> Result<()> {
        // Create the snapshot directory if it doesn't exist
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(messages)?;
        fs::write(&self.path, content)?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}

/// In-memory store used when no config directory is available.
///
/// Clones share the same slot, which also makes it convenient for tests
/// that want to inspect what the conversation persisted.
#[derive(Default, Clone)]
pub struct MemoryHistory {
    messages: Arc<Mutex<Vec<ChatMessage>>>,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Vec<ChatMessage> {
        match self.messages.lock() {
            Ok(guard) => guard.clone(),
            Err(_) => Vec::new(),
        }
    }
}

impl HistoryStore for MemoryHistory {
    fn load(&self) -> Result<Vec<ChatMessage>> {
        Ok(self.snapshot())
    }

    fn save(&self, messages: &[ChatMessage]) -> Result<()> {
        if let Ok(mut guard) = self.messages.lock() {
            *guard = messages.to_vec();
        }
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        if let Ok(mut guard) = self.messages.lock() {
            guard.clear();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::ChatRole;

    fn message(role: ChatRole, text: &str) -> ChatMessage {
        ChatMessage {
            id: 0,
            role,
            text: text.to_string(),
        }
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileHistory::with_path(dir.path().join("history.json"));

        let messages = store.load().unwrap();
        assert!(messages.is_empty());
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileHistory::with_path(dir.path().join("history.json"));

        let messages = vec![
            message(ChatRole::User, "Hello"),
            message(ChatRole::Assistant, "Hi there"),
        ];
        store.save(&messages).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].role, ChatRole::User);
        assert_eq!(loaded[0].text, "Hello");
        assert_eq!(loaded[1].role, ChatRole::Assistant);
        assert_eq!(loaded[1].text, "Hi there");
    }

    #[test]
    fn test_load_malformed_snapshot_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        std::fs::write(&path, "not json {").unwrap();

        let store = FileHistory::with_path(path);
        assert!(store.load().is_err());
    }

    #[test]
    fn test_clear_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        let store = FileHistory::with_path(path.clone());

        store.save(&[message(ChatRole::User, "Hello")]).unwrap();
        assert!(path.exists());

        store.clear().unwrap();
        assert!(!path.exists());
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_clear_without_file_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileHistory::with_path(dir.path().join("history.json"));
        assert!(store.clear().is_ok());
    }
}
