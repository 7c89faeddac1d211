//! Parsing for upstream JSON that may carry the `data.json` bracket defect.
//!
//! The legacy `data.json` endpoint sometimes closes an empty `data` array
//! twice (`"data":[],],"count"`) or drops the outer bracket after a single
//! row (`"data":[[1,2],"count"`). Both are fixed with one targeted text
//! pass; anything else is reported as a parse failure.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::borrow::Cow;

static STRAY_CLOSE_AFTER_EMPTY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""data"\s*:\s*\[\s*\](?:\s*,?\s*\])+\s*,"#).expect("static regex")
});

static UNCLOSED_SINGLE_ROW: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""data"\s*:\s*\[\s*(\[[^\[\]]*\])\s*,\s*"count""#).expect("static regex")
});

#[derive(Debug, thiserror::Error)]
#[error("malformed JSON payload: {after_repair} (before repair: {original})")]
pub struct RepairError {
    pub original: serde_json::Error,
    pub after_repair: serde_json::Error,
}

/// Apply the two known substitutions once.
pub fn repair(raw: &str) -> Cow<'_, str> {
    match STRAY_CLOSE_AFTER_EMPTY.replace_all(raw, r#""data":[],"#) {
        Cow::Borrowed(_) => UNCLOSED_SINGLE_ROW.replace_all(raw, r#""data":[$1],"count""#),
        Cow::Owned(fixed) => Cow::Owned(
            UNCLOSED_SINGLE_ROW
                .replace_all(&fixed, r#""data":[$1],"count""#)
                .into_owned(),
        ),
    }
}

/// Parse `raw`, retrying exactly once on the repaired text.
pub fn parse_with_repair(raw: &str) -> Result<Value, RepairError> {
    let original = match serde_json::from_str(raw) {
        Ok(value) => return Ok(value),
        Err(e) => e,
    };
    tracing::warn!(error = %original, "upstream JSON failed to parse, attempting repair");
    let repaired = repair(raw);
    tracing::debug!(payload = %repaired, "repaired payload");
    serde_json::from_str(&repaired).map_err(|after_repair| {
        tracing::error!(error = %after_repair, "upstream JSON still invalid after repair");
        RepairError {
            original,
            after_repair,
        }
    })
}
