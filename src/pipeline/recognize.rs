//! The content recognition seam.
//!
//! The scheduler only knows [`ContentRecognizer`]: give it a page PNG and the
//! instructions, get back an annotated string. The payload is whatever sits
//! between the format's start and end markers; a response without them counts
//! as a failed page.

use crate::config::OutputFormat;
use crate::error::RecognitionError;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

/// Converts a page image into annotated markup text.
///
/// Implementations must be `Send + Sync`: one instance is shared by every
/// concurrently running chunk.
#[async_trait]
pub trait ContentRecognizer: Send + Sync {
    /// Recognize one page. `page` is used for error reporting only.
    async fn recognize(
        &self,
        page: usize,
        image_png: &[u8],
        instructions: &str,
    ) -> Result<String, RecognitionError>;
}

static MARKDOWN_PAYLOAD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<markdown>(.*?)</markdown>").unwrap());

static LATEX_PAYLOAD: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<latex>(.*?)</latex>").unwrap());

/// The first delimited payload in `response`, trimmed, or `None` if the
/// markers are missing.
pub fn extract_payload(format: OutputFormat, response: &str) -> Option<String> {
    let re = match format {
        OutputFormat::Markdown => &*MARKDOWN_PAYLOAD,
        OutputFormat::Latex => &*LATEX_PAYLOAD,
    };
    re.captures(response)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
}
