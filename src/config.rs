//! Configuration for llmping.
//!
//! Everything comes from the process environment, resolved once at startup
//! into an immutable `Config` value that is passed into the client. There is
//! no config file and no validation beyond presence checks; a malformed URL
//! is allowed to fail naturally at request time.

/// Default completions endpoint for a locally running server.
pub const DEFAULT_URL: &str = "http://localhost:4141/v1/completions";

/// Default model identifier sent when `OPENAI_MODEL` is unset.
pub const DEFAULT_MODEL: &str = "text-davinci-003";

/// Resolved, immutable configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Completions endpoint URL.
    pub url: String,
    /// Bearer token. `None` means no Authorization header is sent; an empty
    /// value in the environment counts as absent.
    pub api_key: Option<String>,
    /// Model identifier.
    pub model: String,
}

impl Config {
    /// Resolve configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            url: get("LOCAL_OPENAI_URL").unwrap_or_else(|| DEFAULT_URL.to_string()),
            api_key: get("OPENAI_API_KEY").filter(|key| !key.is_empty()),
            model: get("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        }
    }
}
