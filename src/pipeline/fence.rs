//! Fenced-JSON-block extraction from free-form model text.
//!
//! Backends are asked for JSON but reply in prose-wrapped markdown, so the
//! only reliable contract is "zero or more triple-backtick blocks tagged
//! `json`". This module scans for those fences and parses each candidate
//! independently.
//!
//! Two policies sit on top of the same scan:
//!
//! * [`parse_blocks_strict`] — one invalid block fails the whole input.
//!   Used by the syllabus structurer, where a half-parsed vocabulary is
//!   worse than none.
//! * [`parse_blocks_lenient`] — invalid blocks are logged and skipped, the
//!   rest survive. Used by the extraction pipeline's post-run parse so one
//!   garbled page cannot void an entire response log.

use crate::error::PrepscanError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use tracing::warn;

static RE_FENCED_JSON: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```json\n(.*?)\n```").unwrap());

/// Extract the raw text of every ```json fenced block, in order.
pub fn fenced_blocks(text: &str) -> Vec<&str> {
    RE_FENCED_JSON
        .captures_iter(text)
        .map(|caps| caps.get(1).map(|m| m.as_str()).unwrap_or_default())
        .collect()
}

/// Parse every fenced block; any invalid block aborts the whole input.
pub fn parse_blocks_strict<T: DeserializeOwned>(text: &str) -> Result<Vec<T>, PrepscanError> {
    fenced_blocks(text)
        .into_iter()
        .map(|block| {
            serde_json::from_str(block).map_err(|e| PrepscanError::JsonParse {
                detail: e.to_string(),
            })
        })
        .collect()
}

/// Parse every fenced block, skipping invalid ones with a warning.
pub fn parse_blocks_lenient<T: DeserializeOwned>(text: &str) -> Vec<T> {
    fenced_blocks(text)
        .into_iter()
        .enumerate()
        .filter_map(|(i, block)| match serde_json::from_str(block) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!("Skipping unparseable fenced block {}: {}", i + 1, e);
                None
            }
        })
        .collect()
}
