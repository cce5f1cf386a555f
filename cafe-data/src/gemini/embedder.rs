use async_trait::async_trait;
use cafe_core::{EMBEDDING_DIMENSIONS, EmbeddingError, EmbeddingTask, Embedder};
use log::debug;
use reqwest::Client;
use url::Url;

use super::config::{API_KEY_HEADER, GeminiBuildError, GeminiConfig};
use super::wire::{Content, EmbedContentRequest, EmbedContentResponse};

/// [`Embedder`] backed by the Gemini `embedContent` method.
///
/// Requests `outputDimensionality` equal to
/// [`EMBEDDING_DIMENSIONS`] and rejects vectors of any other length.
#[derive(Debug, Clone)]
pub struct GeminiEmbedder {
    client: Client,
    config: GeminiConfig,
    endpoint: Url,
}

const fn task_type(task: EmbeddingTask) -> &'static str {
    match task {
        EmbeddingTask::Query => "RETRIEVAL_QUERY",
        EmbeddingTask::Document => "RETRIEVAL_DOCUMENT",
    }
}

/// Map a transport failure onto [`EmbeddingError`].
pub(super) fn convert_reqwest_error(error: &reqwest::Error, url: &Url) -> EmbeddingError {
    if let Some(status) = error.status() {
        return EmbeddingError::Rejected {
            status: status.as_u16(),
            message: error.to_string(),
        };
    }
    let message = if error.is_timeout() {
        format!("timed out: {error}")
    } else {
        error.to_string()
    };
    EmbeddingError::Transport {
        url: url.to_string(),
        message,
    }
}

fn check_dimensions(values: Vec<f32>) -> Result<Vec<f32>, EmbeddingError> {
    if values.len() == EMBEDDING_DIMENSIONS {
        Ok(values)
    } else {
        Err(EmbeddingError::Dimensions {
            expected: EMBEDDING_DIMENSIONS,
            found: values.len(),
        })
    }
}

impl GeminiEmbedder {
    /// Create an embedder from `config`.
    ///
    /// # Errors
    /// Returns [`GeminiBuildError`] when the key is missing, the endpoint
    /// is invalid, or the HTTP client fails to build.
    pub fn new(config: GeminiConfig) -> Result<Self, GeminiBuildError> {
        let client = config.build_client()?;
        let endpoint = config.endpoint(&config.embedding_model, "embedContent")?;
        Ok(Self {
            client,
            config,
            endpoint,
        })
    }
}

#[async_trait]
impl Embedder for GeminiEmbedder {
    async fn embed(&self, text: &str, task: EmbeddingTask) -> Result<Vec<f32>, EmbeddingError> {
        let request = EmbedContentRequest {
            model: format!("models/{}", self.config.embedding_model),
            content: Content::text(None, text),
            task_type: task_type(task),
            output_dimensionality: EMBEDDING_DIMENSIONS,
        };
        debug!("embedding {} chars via {}", text.chars().count(), self.endpoint);
        let response = self
            .client
            .post(self.endpoint.clone())
            .header(API_KEY_HEADER, &self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|err| convert_reqwest_error(&err, &self.endpoint))?
            .error_for_status()
            .map_err(|err| convert_reqwest_error(&err, &self.endpoint))?;
        let body: EmbedContentResponse =
            response
                .json()
                .await
                .map_err(|err| EmbeddingError::Parse {
                    message: err.to_string(),
                })?;
        let values = body
            .embedding
            .map(|embedding| embedding.values)
            .ok_or_else(|| EmbeddingError::Parse {
                message: "response missing embedding".to_owned(),
            })?;
        check_dimensions(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(EmbeddingTask::Query, "RETRIEVAL_QUERY")]
    #[case(EmbeddingTask::Document, "RETRIEVAL_DOCUMENT")]
    fn maps_tasks_to_gemini_task_types(#[case] task: EmbeddingTask, #[case] expected: &str) {
        assert_eq!(task_type(task), expected);
    }

    #[rstest]
    fn rejects_wrong_dimensions() {
        assert_eq!(
            check_dimensions(vec![0.0; 768]),
            Err(EmbeddingError::Dimensions {
                expected: EMBEDDING_DIMENSIONS,
                found: 768
            })
        );
        assert!(check_dimensions(vec![0.0; EMBEDDING_DIMENSIONS]).is_ok());
    }

    #[rstest]
    fn builds_against_configured_endpoint() {
        let embedder = GeminiEmbedder::new(
            GeminiConfig::new("key").with_base_url("http://127.0.0.1:9/v1beta"),
        )
        .expect("embedder should build");
        assert_eq!(
            embedder.endpoint.as_str(),
            "http://127.0.0.1:9/v1beta/models/gemini-embedding-001:embedContent"
        );
    }

    #[rstest]
    #[tokio::test]
    async fn unreachable_service_is_a_transient_transport_error() {
        let embedder = GeminiEmbedder::new(
            GeminiConfig::new("key").with_base_url("http://127.0.0.1:9/v1beta"),
        )
        .expect("embedder should build");
        let err = embedder
            .embed("quiet", EmbeddingTask::Query)
            .await
            .expect_err("nothing listens on the discard port");
        assert!(err.is_transient(), "unexpected error {err:?}");
    }
}
