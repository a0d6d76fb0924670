//! HTML to text extraction, whitespace normalization and truncation

use scraper::{ElementRef, Html, Selector};

/// Binary content type prefixes
const BINARY_PREFIXES: &[&str] = &[
    "image/",
    "audio/",
    "video/",
    "application/octet-stream",
    "application/pdf",
    "application/zip",
    "application/gzip",
    "application/x-tar",
    "application/x-rar",
    "application/x-7z",
    "application/vnd.ms-",
    "application/vnd.openxmlformats",
    "font/",
];

/// Elements whose content is never text
const SKIP_TAGS: &[&str] = &[
    "head", "title", "script", "style", "noscript", "template", "svg", "iframe",
];

/// Elements that break the text flow
const BLOCK_TAGS: &[&str] = &[
    "p", "div", "br", "hr", "h1", "h2", "h3", "h4", "h5", "h6", "li", "ul", "ol", "dl", "dt",
    "dd", "tr", "td", "th", "table", "section", "article", "main", "header", "footer", "nav",
    "aside", "blockquote", "pre", "form", "figure", "figcaption",
];

/// How many leading bytes to scan when sniffing for binary data
const SNIFF_LEN: usize = 1024;

/// Check if content type indicates binary content
pub fn is_binary_content_type(content_type: &str) -> bool {
    let ct_lower = content_type.trim().to_lowercase();
    BINARY_PREFIXES
        .iter()
        .any(|prefix| ct_lower.starts_with(prefix))
}

/// Check if a body looks like binary data regardless of its declared type
pub fn looks_binary(body: &[u8]) -> bool {
    body.iter().take(SNIFF_LEN).any(|&b| b == 0)
}

/// Check if content is HTML based on content type and body
pub fn is_html(content_type: Option<&str>, body: &str) -> bool {
    if let Some(ct) = content_type {
        let ct_lower = ct.to_lowercase();
        if ct_lower.contains("text/html") || ct_lower.contains("application/xhtml") {
            return true;
        }
    }

    let head: String = body.trim_start().chars().take(16).collect();
    let head = head.to_lowercase();
    head.starts_with("<!doctype html") || head.starts_with("<html") || head.starts_with("<body")
}

/// Extract the human-readable text of an HTML document
///
/// The document is parsed with `scraper`, so script and style bodies are raw
/// text that can never open or close tags. Only the content of `<body>` is
/// kept; non-text elements (scripts, styles, templates, ...) are dropped and
/// block-level elements are separated by a newline. Whitespace is left as
/// found so that [`normalize_whitespace`] sees the original runs.
pub fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let body_selector = Selector::parse("body").ok();
    let root = body_selector
        .as_ref()
        .and_then(|selector| document.select(selector).next())
        .unwrap_or_else(|| document.root_element());

    let mut output = String::new();
    collect_text(root, &mut output);
    output
}

fn collect_text(element: ElementRef<'_>, output: &mut String) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            output.push_str(text);
        } else if let Some(el) = child.value().as_element() {
            let tag = el.name();
            if SKIP_TAGS.contains(&tag) {
                continue;
            }
            let is_block = BLOCK_TAGS.contains(&tag);
            if is_block {
                output.push('\n');
            }
            if let Some(child_element) = ElementRef::wrap(child) {
                collect_text(child_element, output);
            }
            if is_block {
                output.push('\n');
            }
        }
    }
}

/// Collapse every run of two or more whitespace characters into one newline
///
/// A lone whitespace character is kept unchanged. The result is trimmed.
pub fn normalize_whitespace(text: &str) -> String {
    let mut output = String::with_capacity(text.len());
    let mut run_start: Option<char> = None;
    let mut run_len = 0usize;

    for c in text.chars() {
        if c.is_whitespace() {
            if run_len == 0 {
                run_start = Some(c);
            }
            run_len += 1;
            continue;
        }

        match (run_len, run_start) {
            (0, _) => {}
            (1, Some(ws)) => output.push(ws),
            _ => output.push('\n'),
        }
        run_len = 0;
        run_start = None;
        output.push(c);
    }

    output.trim().to_string()
}

/// Cut text to at most `max_chars` characters
///
/// Returns the text and whether anything was removed.
pub fn truncate_chars(mut text: String, max_chars: usize) -> (String, bool) {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => {
            text.truncate(byte_idx);
            (text, true)
        }
        None => (text, false),
    }
}
