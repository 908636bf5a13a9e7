use futures::future::BoxFuture;

use weft_core::error::Result;
use weft_core::traits::CompletionBackend;
use weft_core::types::{CompletionRequest, CompletionResponse};

/// Completion backend that returns the prompt unchanged. Useful for dry runs
/// of workflows that contain `llm` nodes.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoCompletion;

impl CompletionBackend for EchoCompletion {
    fn complete(&self, request: CompletionRequest) -> BoxFuture<'_, Result<CompletionResponse>> {
        Box::pin(async move {
            Ok(CompletionResponse {
                completion: request.prompt,
            })
        })
    }
}
