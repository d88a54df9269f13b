//! HTML-to-text extraction for prompt context and chunking.
//!
//! Strips page chrome (nav, header, footer, scripts, styles), collapses
//! whitespace, and extracts a title. The result is the plain-text view of a
//! page that feeds both the analysis prompt and the vector-index chunker.

use scraper::{ElementRef, Html, Selector};
use tracing::debug;

/// Elements whose subtrees never contribute to page text.
const STRIPPED_TAGS: &[&str] = &[
    "script", "style", "nav", "header", "footer", "aside", "noscript", "iframe", "svg",
    "template",
];

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Result of extracting text from an HTML page.
#[derive(Debug, Clone)]
pub struct ExtractResult {
    /// Whitespace-collapsed page text.
    pub text: String,
    /// Title from `<title>`, falling back to the first `<h1>`.
    pub title: Option<String>,
    /// Approximate word count of the extracted text.
    pub word_count: usize,
}

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

/// Extract clean text and a title from raw HTML.
pub fn extract(html: &str) -> ExtractResult {
    let doc = Html::parse_document(html);

    let title = extract_title(&doc);

    let mut raw = String::new();
    let body_sel = Selector::parse("body").expect("valid selector");
    let root = doc
        .select(&body_sel)
        .next()
        .unwrap_or_else(|| doc.root_element());
    visit(root, &mut raw);

    let text = collapse_whitespace(&raw);
    let word_count = text.split_whitespace().count();

    debug!(title = ?title, word_count, "extracted page text");

    ExtractResult {
        text,
        title,
        word_count,
    }
}

/// Recursively collect text nodes, skipping stripped subtrees.
fn visit(el: ElementRef<'_>, out: &mut String) {
    if STRIPPED_TAGS.contains(&el.value().name()) {
        return;
    }

    for child in el.children() {
        if let Some(child_el) = ElementRef::wrap(child) {
            visit(child_el, out);
        } else if let Some(text) = child.value().as_text() {
            out.push_str(text);
            out.push(' ');
        }
    }
}

/// Title from the `<title>` element, else the first `<h1>`.
fn extract_title(doc: &Html) -> Option<String> {
    let title_sel = Selector::parse("title").expect("valid selector");
    let h1_sel = Selector::parse("h1").expect("valid selector");

    let from_el = |el: ElementRef<'_>| {
        let text = el.text().collect::<String>().trim().to_string();
        (!text.is_empty()).then_some(text)
    };

    doc.select(&title_sel)
        .next()
        .and_then(from_el)
        .or_else(|| doc.select(&h1_sel).next().and_then(from_el))
}

/// Collapse all runs of whitespace to single spaces.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Cap text at `max_chars` characters (char-boundary safe), marking the cut.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let truncated: String = text.chars().take(max_chars).collect();
    format!("{truncated} [... content truncated ...]")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
