pub mod echo;
pub mod openai;
pub mod retry;
pub mod shell;

use std::sync::Arc;

use weft_core::config::ModelConfig;
use weft_core::traits::CompletionBackend;

pub use echo::EchoCompletion;
pub use openai::OpenAiCompletion;
pub use retry::RetryingCompletion;
pub use shell::ShellToolBackend;

/// Create a completion backend for the configured provider.
///
/// `echo` answers with the prompt itself; every other provider goes through
/// the OpenAI-compatible client, wrapped in retries when `[model.retry]` is
/// set.
pub fn create_completion(config: &ModelConfig) -> Arc<dyn CompletionBackend> {
    match config.provider.as_str() {
        "echo" => Arc::new(EchoCompletion),
        // Everything else uses the OpenAI-compatible client
        _ => {
            let client = OpenAiCompletion::new(config.clone());
            match &config.retry {
                Some(retry) => Arc::new(RetryingCompletion::new(Box::new(client), retry.clone())),
                None => Arc::new(client),
            }
        }
    }
}
