//! Language-model access: one system message and one user message in,
//! free-form text out.

pub mod client;
pub mod error;
pub mod types;

pub use client::{ChatCompletions, RetryPolicy};
pub use error::ProviderError;
pub use types::*;

#[async_trait::async_trait]
pub trait ChatGateway: Send + Sync {
    async fn chat(&self, req: ChatRequest) -> Result<ChatResponse, ProviderError>;
}
