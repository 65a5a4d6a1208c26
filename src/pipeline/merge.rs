//! Content merging: settled pages to one document.

use crate::config::OutputFormat;
use crate::page::{Page, Settled};

/// Join non-empty page contents in ascending page order.
///
/// Failed and genuinely empty pages are skipped. Content is not otherwise
/// touched.
pub fn merge_pages(pages: &[Page<Settled>], separator: &str) -> String {
    let mut ordered: Vec<&Page<Settled>> = pages.iter().collect();
    ordered.sort_by_key(|p| p.number);
    ordered
        .iter()
        .map(|p| p.content())
        .filter(|c| !c.is_empty())
        .collect::<Vec<_>>()
        .join(separator)
}

/// Merge and wrap into a complete document of `format`.
pub fn assemble(pages: &[Page<Settled>], format: OutputFormat, separator: &str) -> String {
    format.finish(&merge_pages(pages, separator))
}
