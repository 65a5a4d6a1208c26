//! [`ContentRecognizer`] backed by a vision LLM through `edgequake-llm`.
//!
//! ## Message layout
//!
//! 1. **System message**: the page instructions (format prompt, region
//!    names, outline titles)
//! 2. **User message**: the page PNG as a base64 attachment, empty text
//!
//! ## Retry strategy
//!
//! HTTP 429 / 503 errors are transient under concurrent load. Each call gets
//! `max_retries` extra attempts with exponential backoff
//! (`retry_backoff_ms * 2^(attempt-1)`), and every attempt is bounded by
//! `api_timeout_secs`. Only when all attempts fail is an error reported, and
//! the scheduler then fails the whole chunk.

use crate::config::ConversionConfig;
use crate::error::RecognitionError;
use crate::pipeline::encode::page_attachment;
use crate::pipeline::recognize::ContentRecognizer;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, warn};

/// A vision model used as the content recognizer.
pub struct VlmRecognizer {
    provider: Arc<dyn LLMProvider>,
    options: CompletionOptions,
    max_retries: u32,
    retry_backoff_ms: u64,
    api_timeout_secs: u64,
}

impl VlmRecognizer {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &ConversionConfig) -> Self {
        Self {
            provider,
            options: build_options(config),
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
            api_timeout_secs: config.api_timeout_secs,
        }
    }
}

/// Delay before retry `attempt` (1-based): `base_ms * 2^(attempt-1)`.
fn backoff_delay(base_ms: u64, attempt: u32) -> Duration {
    let exp = attempt.saturating_sub(1).min(16);
    Duration::from_millis(base_ms.saturating_mul(1u64 << exp))
}

#[async_trait]
impl ContentRecognizer for VlmRecognizer {
    async fn recognize(
        &self,
        page: usize,
        image_png: &[u8],
        instructions: &str,
    ) -> Result<String, RecognitionError> {
        if image_png.is_empty() {
            return Err(RecognitionError::InvalidImage {
                page,
                detail: "empty raster".into(),
            });
        }
        let start = Instant::now();
        let messages = vec![
            ChatMessage::system(instructions),
            ChatMessage::user_with_images("", vec![page_attachment(image_png)]),
        ];

        let mut last_err = RecognitionError::Failed {
            page,
            retries: 0,
            detail: "no attempt made".into(),
        };

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = backoff_delay(self.retry_backoff_ms, attempt);
                warn!(
                    "Page {}: retry {}/{} after {:?}",
                    page, attempt, self.max_retries, backoff
                );
                sleep(backoff).await;
            }

            let call = self.provider.chat(&messages, Some(&self.options));
            match timeout(Duration::from_secs(self.api_timeout_secs), call).await {
                Ok(Ok(response)) => {
                    debug!(
                        "Page {}: {} input tokens, {} output tokens, {:?}",
                        page,
                        response.prompt_tokens,
                        response.completion_tokens,
                        start.elapsed()
                    );
                    return Ok(response.content);
                }
                Ok(Err(e)) => {
                    warn!("Page {}: attempt {} failed: {}", page, attempt + 1, e);
                    last_err = RecognitionError::Failed {
                        page,
                        retries: attempt,
                        detail: e.to_string(),
                    };
                }
                Err(_) => {
                    warn!(
                        "Page {}: attempt {} timed out after {}s",
                        page,
                        attempt + 1,
                        self.api_timeout_secs
                    );
                    last_err = RecognitionError::Timeout {
                        page,
                        secs: self.api_timeout_secs,
                    };
                }
            }
        }

        Err(last_err)
    }
}

/// Build `CompletionOptions` from the conversion config.
fn build_options(config: &ConversionConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_options_defaults() {
        let config = ConversionConfig::default();
        let opts = build_options(&config);
        assert_eq!(opts.temperature, Some(0.3));
        assert_eq!(opts.max_tokens, Some(4096));
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        assert_eq!(backoff_delay(100, 1), Duration::from_millis(100));
        assert_eq!(backoff_delay(100, 2), Duration::from_millis(200));
        assert_eq!(backoff_delay(100, 3), Duration::from_millis(400));
    }

    #[test]
    fn backoff_saturates() {
        assert!(backoff_delay(u64::MAX, 40) >= Duration::from_millis(u64::MAX / 2));
    }
}
