//! Request and response bodies for the Generative Language REST API.
//!
//! See: <https://ai.google.dev/api/embeddings> and
//! <https://ai.google.dev/api/generate-content>.

use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub(super) struct Part<'a> {
    pub text: &'a str,
}

#[derive(Debug, Serialize)]
pub(super) struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<&'static str>,
    pub parts: Vec<Part<'a>>,
}

impl<'a> Content<'a> {
    pub(super) fn text(role: Option<&'static str>, text: &'a str) -> Self {
        Self {
            role,
            parts: vec![Part { text }],
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct EmbedContentRequest<'a> {
    pub model: String,
    pub content: Content<'a>,
    pub task_type: &'static str,
    pub output_dimensionality: usize,
}

#[derive(Debug, Deserialize)]
pub(super) struct EmbedContentResponse {
    pub embedding: Option<ContentEmbedding>,
}

#[derive(Debug, Deserialize)]
pub(super) struct ContentEmbedding {
    #[serde(default)]
    pub values: Vec<f32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct GenerationConfig {
    pub response_mime_type: &'static str,
    pub temperature: f32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct GenerateContentRequest<'a> {
    pub contents: Vec<Content<'a>>,
    pub generation_config: GenerationConfig,
}

#[derive(Debug, Deserialize)]
pub(super) struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
pub(super) struct Candidate {
    pub content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
pub(super) struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
pub(super) struct CandidatePart {
    pub text: Option<String>,
}

impl GenerateContentResponse {
    /// Concatenated text of the first candidate.
    pub(super) fn first_text(&self) -> Option<String> {
        let parts = &self.candidates.first()?.content.as_ref()?.parts;
        let text: String = parts.iter().filter_map(|part| part.text.as_deref()).collect();
        if text.trim().is_empty() { None } else { Some(text) }
    }
}
