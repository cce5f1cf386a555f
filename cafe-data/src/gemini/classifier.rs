use async_trait::async_trait;
use cafe_core::{Intent, IntentClassifier, IntentError, TimeFilter};
use chrono::{DateTime, FixedOffset, NaiveDateTime};
use log::{debug, warn};
use reqwest::Client;
use serde::Deserialize;
use url::Url;

use super::config::{API_KEY_HEADER, GeminiBuildError, GeminiConfig};
use super::wire::{Content, GenerateContentRequest, GenerateContentResponse, GenerationConfig};

const TARGET_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// [`IntentClassifier`] backed by Gemini `generateContent` in JSON mode.
#[derive(Debug, Clone)]
pub struct GeminiIntentClassifier {
    client: Client,
    config: GeminiConfig,
    endpoint: Url,
    tag_vocabulary: Vec<String>,
}

impl GeminiIntentClassifier {
    /// Create a classifier from `config`.
    ///
    /// # Errors
    /// Returns [`GeminiBuildError`] when the key is missing, the endpoint
    /// is invalid, or the HTTP client fails to build.
    pub fn new(config: GeminiConfig) -> Result<Self, GeminiBuildError> {
        let client = config.build_client()?;
        let endpoint = config.endpoint(&config.intent_model, "generateContent")?;
        Ok(Self {
            client,
            config,
            endpoint,
            tag_vocabulary: Vec::new(),
        })
    }

    /// Canonical tags the model may choose from.
    #[must_use]
    pub fn with_tag_vocabulary<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.tag_vocabulary = tags.into_iter().map(Into::into).collect();
        self
    }

    fn prompt(&self, text: &str, now: DateTime<FixedOffset>) -> String {
        let tags = if self.tag_vocabulary.is_empty() {
            "always return an empty list".to_owned()
        } else {
            format!("choose only from: {}", self.tag_vocabulary.join(", "))
        };
        format!(
            "You analyse requests for cafés in Taipei.\n\
             The current local time is {now} ({weekday}).\n\
             Reply with JSON only, shaped as:\n\
             {{\"time_filter\": {{\"filter_open_now\": boolean, \"target_iso_datetime\": string or null}},\n\
             \"extracted_keywords\": [string], \"tags\": [string]}}\n\
             Rules:\n\
             1. Resolve relative days such as \"tomorrow\" or \"Friday\" against the current time.\n\
             2. \"evening\" means 19:00, \"afternoon\" 14:00, and \"morning\" 09:00.\n\
             3. Set target_iso_datetime only when the user names a time; otherwise null.\n\
             4. tags: {tags}.\n\n\
             User request: {text}",
            now = now.format("%Y-%m-%d %H:%M"),
            weekday = now.format("%A"),
        )
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawTimeFilter {
    filter_open_now: Option<bool>,
    target_iso_datetime: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawIntent {
    #[serde(default)]
    time_filter: Option<RawTimeFilter>,
    #[serde(default)]
    extracted_keywords: Vec<String>,
    #[serde(default)]
    tags: Vec<String>,
}

fn strip_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let without_open = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    without_open
        .trim()
        .strip_suffix("```")
        .unwrap_or(without_open)
        .trim()
}

fn parse_target(raw: &str) -> Option<NaiveDateTime> {
    let value = raw.trim();
    if value.is_empty() || value.eq_ignore_ascii_case("null") {
        return None;
    }
    if let Ok(with_offset) = DateTime::parse_from_rfc3339(value) {
        return Some(with_offset.naive_local());
    }
    let parsed = TARGET_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok());
    if parsed.is_none() {
        warn!("ignoring unparseable target datetime {value:?}");
    }
    parsed
}

fn clean(values: Vec<String>) -> Vec<String> {
    values
        .into_iter()
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
        .collect()
}

/// Interpret model output, tolerating Markdown code fences.
pub(crate) fn parse_intent(text: &str) -> Result<Intent, IntentError> {
    let raw: RawIntent =
        serde_json::from_str(strip_fences(text)).map_err(|err| IntentError::Parse {
            message: err.to_string(),
        })?;
    let filter = raw.time_filter.unwrap_or_default();
    Ok(Intent {
        time_filter: TimeFilter {
            filter_open_now: filter.filter_open_now.unwrap_or(true),
            target: filter.target_iso_datetime.as_deref().and_then(parse_target),
        },
        extracted_keywords: clean(raw.extracted_keywords),
        tags: clean(raw.tags),
    })
}

#[async_trait]
impl IntentClassifier for GeminiIntentClassifier {
    async fn classify(&self, text: &str, now: DateTime<FixedOffset>) -> Result<Intent, IntentError> {
        let prompt = self.prompt(text, now);
        let request = GenerateContentRequest {
            contents: vec![Content::text(Some("user"), &prompt)],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
                temperature: 0.0,
            },
        };
        let request_error = |err: reqwest::Error| IntentError::Request {
            message: err.to_string(),
        };
        let response = self
            .client
            .post(self.endpoint.clone())
            .header(API_KEY_HEADER, &self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(request_error)?
            .error_for_status()
            .map_err(request_error)?;
        let body: GenerateContentResponse =
            response.json().await.map_err(|err| IntentError::Parse {
                message: err.to_string(),
            })?;
        let output = body.first_text().ok_or_else(|| IntentError::Parse {
            message: "response contained no text".to_owned(),
        })?;
        let intent = parse_intent(&output)?;
        debug!("classified intent: {intent:?}");
        Ok(intent)
    }
}
