//! Common types for text-generation requests

/// Default cap on generated tokens, matching what the backends are tuned for
pub const DEFAULT_MAX_NEW_TOKENS: u32 = 200;

/// A single completion-style generation request
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub system: String,
    pub user: String,
    pub temperature: f32,
    pub max_new_tokens: u32,
}

impl GenerationRequest {
    pub fn new(system: impl Into<String>, user: impl Into<String>, temperature: f32) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            temperature,
            max_new_tokens: DEFAULT_MAX_NEW_TOKENS,
        }
    }

    /// Completion backends take one prompt: system instruction, blank line, user payload.
    pub fn prompt(&self) -> String {
        format!("{}\n\n{}", self.system, self.user)
    }
}
