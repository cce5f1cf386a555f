use std::time::Duration;

use reqwest::Client;
use thiserror::Error;
use url::Url;

/// Default API root for the Generative Language service.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/";

/// Default user agent for Gemini requests.
pub const DEFAULT_USER_AGENT: &str = "cafe-finder/0.1";

/// Default embedding model.
pub const DEFAULT_EMBEDDING_MODEL: &str = "gemini-embedding-001";

/// Default model for intent classification.
pub const DEFAULT_INTENT_MODEL: &str = "gemini-2.5-flash";

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 10;

pub(super) const API_KEY_HEADER: &str = "x-goog-api-key";

/// Error type for Gemini client construction failures.
#[derive(Debug, Error)]
pub enum GeminiBuildError {
    /// No API key was supplied.
    #[error("a Gemini API key is required")]
    MissingApiKey,
    /// The base URL could not be parsed or joined.
    #[error("invalid Gemini endpoint {url}: {source}")]
    InvalidUrl {
        /// Offending URL text.
        url: String,
        /// Parser error.
        #[source]
        source: url::ParseError,
    },
    /// Failed to build the HTTP client.
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
}

/// Configuration shared by [`GeminiEmbedder`](super::GeminiEmbedder) and
/// [`GeminiIntentClassifier`](super::GeminiIntentClassifier).
#[derive(Clone)]
pub struct GeminiConfig {
    /// API root, e.g. `"https://generativelanguage.googleapis.com/v1beta/"`.
    pub base_url: String,
    /// API key sent in the `x-goog-api-key` header.
    pub api_key: String,
    /// Model used for `embedContent`.
    pub embedding_model: String,
    /// Model used for `generateContent`.
    pub intent_model: String,
    /// Request timeout duration.
    pub timeout: Duration,
    /// User agent string for requests.
    pub user_agent: String,
}

impl std::fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("embedding_model", &self.embedding_model)
            .field("intent_model", &self.intent_model)
            .field("timeout", &self.timeout)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            api_key: String::new(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_owned(),
            intent_model: DEFAULT_INTENT_MODEL.to_owned(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
        }
    }
}

impl GeminiConfig {
    /// Create a configuration for the public endpoint with `api_key`.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Self::default()
        }
    }

    /// Point requests at a different API root.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the embedding model.
    #[must_use]
    pub fn with_embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = model.into();
        self
    }

    /// Set the intent model.
    #[must_use]
    pub fn with_intent_model(mut self, model: impl Into<String>) -> Self {
        self.intent_model = model.into();
        self
    }

    /// Set the request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the user agent string.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub(super) fn build_client(&self) -> Result<Client, GeminiBuildError> {
        if self.api_key.trim().is_empty() {
            return Err(GeminiBuildError::MissingApiKey);
        }
        Client::builder()
            .user_agent(&self.user_agent)
            .connect_timeout(self.timeout)
            .timeout(self.timeout)
            .build()
            .map_err(GeminiBuildError::HttpClient)
    }

    /// `{base_url}models/{model}:{method}`.
    pub(super) fn endpoint(&self, model: &str, method: &str) -> Result<Url, GeminiBuildError> {
        let invalid = |source| GeminiBuildError::InvalidUrl {
            url: self.base_url.clone(),
            source,
        };
        let mut root = self.base_url.clone();
        if !root.ends_with('/') {
            root.push('/');
        }
        Url::parse(&root)
            .and_then(|base| base.join(&format!("models/{model}:{method}")))
            .map_err(invalid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("https://example.test/v1beta/")]
    #[case("https://example.test/v1beta")]
    fn endpoint_appends_model_and_method(#[case] base: &str) {
        let config = GeminiConfig::new("key").with_base_url(base);
        let url = config
            .endpoint("gemini-embedding-001", "embedContent")
            .expect("valid endpoint");
        assert_eq!(
            url.as_str(),
            "https://example.test/v1beta/models/gemini-embedding-001:embedContent"
        );
    }

    #[rstest]
    fn missing_key_is_rejected() {
        assert!(matches!(
            GeminiConfig::default().build_client(),
            Err(GeminiBuildError::MissingApiKey)
        ));
    }

    #[rstest]
    fn debug_output_redacts_the_key() {
        let rendered = format!("{:?}", GeminiConfig::new("secret-key"));
        assert!(!rendered.contains("secret-key"));
    }

    #[rstest]
    fn builder_overrides_defaults() {
        let config = GeminiConfig::new("k")
            .with_timeout(Duration::from_secs(3))
            .with_intent_model("m")
            .with_user_agent("ua/1");
        assert_eq!(config.timeout, Duration::from_secs(3));
        assert_eq!(config.intent_model, "m");
        assert_eq!(config.user_agent, "ua/1");
        assert_eq!(config.embedding_model, DEFAULT_EMBEDDING_MODEL);
    }
}
