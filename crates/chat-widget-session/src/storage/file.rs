//! File-backed token storage (feature-gated).

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use chat_widget_core::{StorageError, TokenStore};

/// Token storage in a single JSON document (`{"key": "token"}`).
///
/// Stands in for a browser's local storage on native hosts.
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    /// Store tokens at an explicit path.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store tokens under the platform data directory.
    ///
    /// # Errors
    /// Returns error if the platform has no data directory.
    pub fn in_data_dir() -> Result<Self, StorageError> {
        let dir = dirs::data_dir()
            .ok_or_else(|| StorageError::Internal("No data directory available".to_string()))?;
        Ok(Self::new(dir.join("chat-widget").join("session.json")))
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<HashMap<String, String>, StorageError> {
        match fs::read_to_string(&self.path) {
            Ok(content) if content.trim().is_empty() => Ok(HashMap::new()),
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_all(&self, tokens: &HashMap<String, String>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        // Atomic replace.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(tokens)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.read_all()?.remove(key))
    }

    fn save(&self, key: &str, token: &str) -> Result<(), StorageError> {
        let mut tokens = self.read_all()?;
        tokens.insert(key.to_string(), token.to_string());
        self.write_all(&tokens)
    }

    fn clear(&self, key: &str) -> Result<(), StorageError> {
        let mut tokens = self.read_all()?;
        if tokens.remove(key).is_some() {
            self.write_all(&tokens)?;
        }
        Ok(())
    }
}
