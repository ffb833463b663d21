//! Engine view definition wrapper.
//!
//! Engine views store their definition as a marker comment around a
//! base64-encoded JSON document:
//!
//! ```text
//! /* Presto View: eyJvcmlnaW5hbFNxbCI6ICJTRUxFQ1QgLi4uIn0= */
//! ```
//!
//! The `originalSql` field of the JSON document is the view's SQL text.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use viewgrant_core::{CatalogObjectRef, ResolutionError};

static PRESTO_VIEW: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^/\*\s*Presto\s+View:\s*([A-Za-z0-9+/]*={0,2})\s*\*/$")
        .expect("Invalid Presto view regex")
});

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ViewPayload {
    original_sql: String,
}

/// Extract the original SQL text of a view from its stored definition.
pub fn decode_view_definition(
    object: &CatalogObjectRef,
    stored: &str,
) -> Result<String, ResolutionError> {
    let malformed = |reason: String| ResolutionError::MalformedDefinition {
        object: object.clone(),
        reason,
    };

    let encoded = PRESTO_VIEW
        .captures(stored.trim())
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .ok_or_else(|| malformed("definition is not a Presto view wrapper".to_string()))?;

    let raw = STANDARD
        .decode(encoded)
        .map_err(|e| malformed(format!("invalid base64 payload: {}", e)))?;
    let payload: ViewPayload = serde_json::from_slice(&raw)
        .map_err(|e| malformed(format!("invalid view payload: {}", e)))?;

    Ok(payload.original_sql)
}

/// Wrap SQL text the way the engine stores it.
pub fn encode_view_definition(sql: &str) -> String {
    let payload = serde_json::json!({ "originalSql": sql });
    format!("/* Presto View: {} */", STANDARD.encode(payload.to_string()))
}
