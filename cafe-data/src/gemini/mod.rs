//! Gemini-backed language services.
//!
//! [`GeminiEmbedder`] implements [`cafe_core::Embedder`] over the
//! `embedContent` method and [`GeminiIntentClassifier`] implements
//! [`cafe_core::IntentClassifier`] over `generateContent` in JSON mode.
//! Both share a [`GeminiConfig`] and authenticate with the
//! `x-goog-api-key` header.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use cafe_data::gemini::{GeminiConfig, GeminiEmbedder, GeminiIntentClassifier};
//!
//! let config = GeminiConfig::new("api-key").with_timeout(Duration::from_secs(5));
//! let embedder = GeminiEmbedder::new(config.clone())?;
//! let classifier = GeminiIntentClassifier::new(config)?;
//! # Ok::<(), cafe_data::gemini::GeminiBuildError>(())
//! ```

mod classifier;
mod config;
mod embedder;
mod wire;

pub use classifier::GeminiIntentClassifier;
pub use config::{
    DEFAULT_BASE_URL, DEFAULT_EMBEDDING_MODEL, DEFAULT_INTENT_MODEL, DEFAULT_USER_AGENT,
    GeminiBuildError, GeminiConfig,
};
pub use embedder::GeminiEmbedder;
