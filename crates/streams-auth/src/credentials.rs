//! Field extraction from the ambient credentials file.
//!
//! The default extractor is a narrow text scan with a documented contract,
//! not a parser: find the field name, the next colon, the next comma, then
//! trim whitespace and one pair of surrounding quotes from the span between
//! them. `JsonExtractor` is a drop-in structured alternative.

use tracing::debug;

use crate::error::AuthError;
use crate::AuthResult;

/// Field holding the service account email.
pub const CLIENT_EMAIL_FIELD: &str = "client_email";

/// Pulls a single string field out of a credentials document.
pub trait FieldExtractor: Send + Sync {
    /// Extract `field` from `contents`.
    fn extract(&self, contents: &str, field: &str) -> AuthResult<String>;
}

/// Documented-contract text scan.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScanExtractor;

impl FieldExtractor for ScanExtractor {
    fn extract(&self, contents: &str, field: &str) -> AuthResult<String> {
        let field_pos = contents
            .find(field)
            .ok_or_else(|| AuthError::FieldNotFound {
                field: field.to_string(),
            })?;

        let colon_pos = contents[field_pos..]
            .find(':')
            .map(|offset| field_pos + offset)
            .ok_or(AuthError::MissingColon {
                position: field_pos,
            })?;

        let comma_pos = contents[colon_pos..]
            .find(',')
            .map(|offset| colon_pos + offset)
            .ok_or(AuthError::MissingComma {
                position: colon_pos,
            })?;

        let value = contents[colon_pos + 1..comma_pos].trim();
        let value = value.strip_prefix('"').unwrap_or(value);
        let value = value.strip_suffix('"').unwrap_or(value);

        debug!(field, "Extracted credentials field");
        Ok(value.to_string())
    }
}

/// Structured extraction backed by `serde_json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonExtractor;

impl FieldExtractor for JsonExtractor {
    fn extract(&self, contents: &str, field: &str) -> AuthResult<String> {
        let document: serde_json::Value = serde_json::from_str(contents)
            .map_err(|e| AuthError::MalformedCredentials(e.to_string()))?;

        document
            .get(field)
            .and_then(serde_json::Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| AuthError::FieldNotFound {
                field: field.to_string(),
            })
    }
}
