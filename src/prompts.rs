//! Recognition prompts and per-page instruction building.
//!
//! Callers can override the format prompt via
//! [`crate::config::ConversionConfig::system_prompt`]; the constants here are
//! used only when no override is provided. Whatever the prompt, the page's
//! image region names and outline titles are appended so the recognizer can
//! reference figures by name and pick consistent heading levels.

use crate::config::{ConversionConfig, OutputFormat};
use crate::page::{ImageRegion, Page, TocEntry};
use std::fmt::Write as _;

/// Default prompt for Markdown output.
pub const MARKDOWN_PROMPT: &str = r#"Convert this PDF page image to Markdown.

Follow these rules precisely:

1. TEXT PRESERVATION
   - Preserve ALL text content, in the original reading order
   - Never complete a sentence or paragraph that is cut off at the start or end of the page
   - If the page starts with text before its first heading, keep that text

2. STRUCTURE
   - Convert headings by visual hierarchy: main titles → #, subtitles → ##, sub-subtitles → ###
   - Preserve ordered and unordered lists with their nesting
   - Bold → **text**, italic → *text*, underline → <u>text</u>
   - Keep paragraph spacing and line breaks

3. TABLES
   - Use Markdown pipe table syntax

4. FORMULAS
   - Write all mathematics as LaTeX: $inline$ and $$display$$
   - Pay extra attention to superscripts, subscripts and their positions

5. FIGURES
   - Put the figure description on the same line as the figure, in bold
   - Reference a figure only by one of the image names listed below

6. OUTPUT FORMAT
   - Do NOT add commentary or "Page X of Y" markers
   - Wrap the converted page in an XML tag:
<markdown>
...
</markdown>"#;

/// Default prompt for LaTeX output.
pub const LATEX_PROMPT: &str = r#"Convert this PDF page image to LaTeX body content.

Follow these rules precisely:

1. TEXT PRESERVATION
   - Preserve ALL text content, in the original reading order
   - Never complete a sentence or paragraph that is cut off at the start or end of the page
   - If the page starts with text before its first heading, keep that text

2. STRUCTURE
   - Convert headings by visual hierarchy: \section, \subsection, \subsubsection
   - Use itemize and enumerate for lists, preserving nesting
   - Bold → \textbf{}, italic → \textit{}, underline → \underline{}
   - Escape LaTeX special characters in running text

3. TABLES
   - Use tabular environments

4. FORMULAS
   - Use $...$ for inline and \[ ... \] or equation environments for display math
   - Pay extra attention to superscripts, subscripts and their positions

5. FIGURES
   - Use \includegraphics with one of the image names listed below, inside a figure environment with a \caption

6. OUTPUT FORMAT
   - Emit body content only: no \documentclass, no preamble, no \begin{document}
   - Do NOT add commentary
   - Wrap the converted page in an XML tag:
<latex>
...
</latex>"#;

/// The built-in prompt for `format`.
pub fn format_prompt(format: OutputFormat) -> &'static str {
    match format {
        OutputFormat::Markdown => MARKDOWN_PROMPT,
        OutputFormat::Latex => LATEX_PROMPT,
    }
}

/// Full instructions for one page.
pub fn page_instructions(config: &ConversionConfig, page: &Page) -> String {
    let prompt = config
        .system_prompt
        .as_deref()
        .unwrap_or_else(|| format_prompt(config.format));
    build_instructions(prompt, config.format, &page.regions, &page.toc)
}

/// Append region names and outline titles to `prompt`.
pub fn build_instructions(
    prompt: &str,
    format: OutputFormat,
    regions: &[ImageRegion],
    toc: &[TocEntry],
) -> String {
    let mut out = String::from(prompt);

    if !regions.is_empty() {
        out.push_str("\n\nImages available on this page (use these exact names):\n");
        for region in regions {
            let (w, h) = region.size();
            let _ = writeln!(out, "- {} ({}x{} px)", region.name(), w, h);
        }
    }

    if !toc.is_empty() {
        out.push_str("\n\nThe document outline lists these headings on this page:\n");
        for entry in toc {
            let _ = writeln!(out, "- {} {}", heading_hint(format, entry.level), entry.title);
        }
    }

    out
}

fn heading_hint(format: OutputFormat, level: usize) -> String {
    match format {
        OutputFormat::Markdown => "#".repeat((level + 1).min(6)),
        OutputFormat::Latex => match level {
            0 => "\\section".into(),
            1 => "\\subsection".into(),
            2 => "\\subsubsection".into(),
            _ => "\\paragraph".into(),
        },
    }
}
