//! In-memory token storage.

use std::{collections::HashMap, sync::RwLock};

use chat_widget_core::{StorageError, TokenStore};

/// In-memory storage implementation.
///
/// Useful for tests and hosts without local persistence.
/// Tokens are lost on restart.
pub struct MemoryTokenStore {
    tokens: RwLock<HashMap<String, String>>,
}

impl MemoryTokenStore {
    /// Create an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tokens: RwLock::new(HashMap::new()),
        }
    }

    /// Create a store pre-seeded with one token.
    #[must_use]
    pub fn with_token(key: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            tokens: RwLock::new(HashMap::from([(key.into(), token.into())])),
        }
    }
}

impl Default for MemoryTokenStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self
            .tokens
            .read()
            .map_err(|e| StorageError::Internal(e.to_string()))?
            .get(key)
            .cloned())
    }

    fn save(&self, key: &str, token: &str) -> Result<(), StorageError> {
        self.tokens
            .write()
            .map_err(|e| StorageError::Internal(e.to_string()))?
            .insert(key.to_string(), token.to_string());
        Ok(())
    }

    fn clear(&self, key: &str) -> Result<(), StorageError> {
        self.tokens
            .write()
            .map_err(|e| StorageError::Internal(e.to_string()))?
            .remove(key);
        Ok(())
    }
}
