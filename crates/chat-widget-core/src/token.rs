//! Set-once session token.

/// Opaque session identifier issued by the dialogue service.
///
/// Starts unset and can be assigned exactly once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionToken {
    value: Option<String>,
}

impl SessionToken {
    /// Create an unset token.
    #[must_use]
    pub const fn new() -> Self {
        Self { value: None }
    }

    /// Current value, `None` meaning "new session".
    #[must_use]
    pub fn get(&self) -> Option<&str> {
        self.value.as_deref()
    }

    /// Whether a token has been adopted.
    #[must_use]
    pub const fn is_set(&self) -> bool {
        self.value.is_some()
    }

    /// Adopt a token if none is held yet.
    ///
    /// Returns `true` if the token was stored. Empty tokens are ignored.
    pub fn adopt(&mut self, token: impl Into<String>) -> bool {
        if self.value.is_some() {
            return false;
        }
        let token = token.into();
        if token.is_empty() {
            return false;
        }
        self.value = Some(token);
        true
    }
}
