//! Error detection in a rendered preview document.
//!
//! Patterns are tried in priority order and the first hit wins:
//!
//! 1. missing module (`Cannot find module 'x'`, `Module not found ... 'x'`)
//! 2. undefined reference (`x is not defined`)
//! 3. the text of the first non-empty element whose class mentions `error`

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static MISSING_MODULE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?:Cannot find module|Could not find module|Module not found)[^\n]*?['"`]([@A-Za-z0-9_./-]+)['"`]"#,
    )
    .expect("missing-module pattern is valid")
});

static UNDEFINED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b([A-Za-z_$][A-Za-z0-9_$]*) is not defined\b")
        .expect("undefined-reference pattern is valid")
});

static ERROR_ELEMENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<([a-z][a-z0-9-]*)\b[^>]*\bclass\s*=\s*["'][^"']*error[^"']*["'][^>]*>"#)
        .expect("error-element pattern is valid")
});

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<(/?)([a-z][a-z0-9-]*)\b[^>]*?(/?)>").expect("tag pattern is valid")
});

static INVISIBLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<script\b.*?</script\s*>|<style\b.*?</style\s*>|<!--.*?-->")
        .expect("invisible-content pattern is valid")
});

static ANY_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("markup pattern is valid"));

/// Classification of a detected error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ErrorKind {
    /// An import that the sandbox could not resolve
    MissingModule { module: String },
    /// An identifier used without being defined
    UndefinedReference { identifier: String },
    /// Any other error the sandbox reported
    Reported,
}

/// An error found in the running preview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectedError {
    pub kind: ErrorKind,
    /// Normalized message; two detections are the same error iff equal
    pub message: String,
}

impl DetectedError {
    pub fn missing_module(module: impl Into<String>) -> Self {
        let module = module.into();
        Self {
            message: format!("Cannot find module '{}'", module),
            kind: ErrorKind::MissingModule { module },
        }
    }

    pub fn undefined_reference(identifier: impl Into<String>) -> Self {
        let identifier = identifier.into();
        Self {
            message: format!("{} is not defined", identifier),
            kind: ErrorKind::UndefinedReference { identifier },
        }
    }

    pub fn reported(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Reported,
            message: message.into(),
        }
    }

    /// Classify free-form error text the same way the document scan does.
    pub fn classify(text: &str) -> Option<Self> {
        let text = collapse_whitespace(text);
        if text.is_empty() {
            return None;
        }
        Some(match_known(&text).unwrap_or_else(|| Self::reported(text)))
    }
}

impl fmt::Display for DetectedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

fn match_known(text: &str) -> Option<DetectedError> {
    if let Some(caps) = MISSING_MODULE_RE.captures(text) {
        return Some(DetectedError::missing_module(&caps[1]));
    }
    if let Some(caps) = UNDEFINED_RE.captures(text) {
        return Some(DetectedError::undefined_reference(&caps[1]));
    }
    None
}

/// Pattern matcher over a serialized preview document.
#[derive(Debug, Clone, Copy, Default)]
pub struct DomErrorScanner;

impl DomErrorScanner {
    pub fn new() -> Self {
        Self
    }

    /// Scan `html` and return the highest-priority error, if any.
    pub fn scan(&self, html: &str) -> Option<DetectedError> {
        let markup = INVISIBLE_RE.replace_all(html, " ");

        if let Some(found) = match_known(&visible_text(&markup)) {
            return Some(found);
        }

        ERROR_ELEMENT_RE.captures_iter(&markup).find_map(|caps| {
            let whole = caps.get(0)?;
            let inner = element_inner(&markup, &caps[1], whole.end());
            let text = visible_text(inner);
            if text.is_empty() {
                None
            } else {
                Some(DetectedError::reported(text))
            }
        })
    }
}

/// Slice between the end of an opening tag and its matching close.
/// Falls back to the rest of the document when the element is never closed.
fn element_inner<'a>(markup: &'a str, name: &str, start: usize) -> &'a str {
    let rest = &markup[start..];
    let mut depth = 1usize;

    for caps in TAG_RE.captures_iter(rest) {
        if !caps[2].eq_ignore_ascii_case(name) || !caps[3].is_empty() {
            continue;
        }
        if caps[1].is_empty() {
            depth += 1;
            continue;
        }
        depth -= 1;
        if depth == 0 {
            if let Some(close) = caps.get(0) {
                return &rest[..close.start()];
            }
        }
    }
    rest
}

fn visible_text(markup: &str) -> String {
    let stripped = ANY_TAG_RE.replace_all(markup, " ");
    collapse_whitespace(&decode_entities(&stripped))
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
