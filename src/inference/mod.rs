//! The model collaborator: prompt text in, generated text out.

pub mod client;

pub use client::InferenceClient;

use crate::types::Generation;
use async_trait::async_trait;
use thiserror::Error;

/// Failure of a single model call. The agent loop records it and moves on to
/// the next iteration.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("inference request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("inference failed ({status}): {body}")]
    Status { status: u16, body: String },

    #[error("inference returned no content")]
    EmptyResponse,

    #[error("{0}")]
    Other(String),
}

/// A text-generation backend.
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    /// Generate a completion for `prompt`.
    async fn generate(&self, prompt: &str) -> Result<Generation, ModelError>;

    /// Generate while speaking as `persona`, optionally at another
    /// temperature. Backends without a system channel put the persona in
    /// front of the prompt and keep their own temperature.
    async fn generate_as(
        &self,
        persona: &str,
        prompt: &str,
        temperature: Option<f64>,
    ) -> Result<Generation, ModelError> {
        let _ = temperature;
        self.generate(&format!("{}\n\n{}", persona, prompt)).await
    }
}
