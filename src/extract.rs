//! Structured block extraction from model replies

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::error::{Result, UplanError};
use crate::prompt::type_name;

static FENCE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```[A-Za-z0-9_+.-]*[ \t]*\r?\n?(.*?)```").expect("fence pattern should compile")
});

static ANSI_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\x1b\[[0-9;?]*[ -/]*[@-~]").expect("ansi pattern should compile")
});

/// Body of the first fenced block, if any
pub fn extract_code_block(text: &str) -> Option<&str> {
    FENCE_RE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Extract the first fenced block and decode it as a JSON mapping
pub fn parse_document(text: &str) -> Result<Value> {
    let cleaned = strip_ansi_codes(text);
    let block = extract_code_block(&cleaned).ok_or_else(|| UplanError::Extraction {
        message: format!(
            "no fenced block found in reply: {}",
            truncate_chars(cleaned.trim(), 200)
        ),
    })?;

    let value: Value = serde_json::from_str(block.trim()).map_err(|e| UplanError::Extraction {
        message: format!("fenced block is not valid JSON: {}", e),
    })?;

    if !value.is_object() {
        return Err(UplanError::Extraction {
            message: format!("expected a mapping, got {}", type_name(&value)),
        });
    }

    Ok(value)
}

fn strip_ansi_codes(input: &str) -> String {
    ANSI_RE.replace_all(input, "").to_string()
}

/// Keep at most `max` characters, marking the cut with `...`
pub(crate) fn truncate_chars(input: &str, max: usize) -> String {
    let mut out = String::new();
    for (idx, ch) in input.chars().enumerate() {
        if idx >= max {
            out.push_str("...");
            break;
        }
        out.push(ch);
    }
    out
}
