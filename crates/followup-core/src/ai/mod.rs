pub mod claude;
pub mod ollama;
pub mod openai;

pub use claude::ClaudeClient;
pub use ollama::OllamaClient;
pub use openai::OpenAIClient;

use anyhow::Result;
use async_trait::async_trait;

/// Capability to turn a prompt into generated text.
///
/// The starter resolver only sees this trait, so tests can swap in a fake and
/// front ends can pick any provider.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Human-readable provider name used in logs.
    fn name(&self) -> &'static str;

    async fn generate(&self, prompt: &str) -> Result<String>;
}
