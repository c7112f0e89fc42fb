//! Internal helpers for model validation and conversion.
//!
//! These utilities are **not** part of the public API. They centralize
//! parsing of stored values so every entity conversion fails the same way.

use chrono::{DateTime, Utc};
use serde::{Serialize, de::DeserializeOwned};
use unicode_normalization::UnicodeNormalization;
use uuid::Uuid;

use crate::{EngineError, ResultEngine};

/// Parse a UUID from storage and return a labeled error on failure.
pub(crate) fn parse_uuid(value: &str, label: &str) -> ResultEngine<Uuid> {
    Uuid::parse_str(value).map_err(|_| EngineError::InvalidId(format!("invalid {label} id")))
}

pub(crate) fn parse_optional_uuid(value: Option<&str>, label: &str) -> ResultEngine<Option<Uuid>> {
    value.map(|v| parse_uuid(v, label)).transpose()
}

/// Trim and NFC-normalize a required name. Empty names are rejected.
pub(crate) fn normalize_required_name(value: &str, label: &str) -> ResultEngine<String> {
    let normalized: String = value.trim().nfc().collect();
    if normalized.is_empty() {
        return Err(EngineError::InvalidName(format!(
            "{label} name must not be empty"
        )));
    }
    Ok(normalized)
}

pub(crate) fn normalize_optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.nfc().collect())
}

/// Serialize a pre-image or revision state for the audit log.
///
/// A failure here aborts the surrounding mutation.
pub(crate) fn snapshot_json<T: Serialize + ?Sized>(
    value: &T,
    label: &str,
) -> ResultEngine<String> {
    serde_json::to_string(value)
        .map_err(|err| EngineError::AuditCapture(format!("cannot serialize {label}: {err}")))
}

pub(crate) fn restore_json<T: DeserializeOwned>(value: &str, label: &str) -> ResultEngine<T> {
    serde_json::from_str(value)
        .map_err(|err| EngineError::AuditCapture(format!("cannot restore {label}: {err}")))
}

pub(crate) fn now() -> DateTime<Utc> {
    Utc::now()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_name_is_trimmed_and_normalized() {
        // "e" + combining acute accent composes into a single code point.
        let name = normalize_required_name("  Cafe\u{301} ", "budget").unwrap();
        assert_eq!(name, "Caf\u{e9}");
        assert_eq!(
            normalize_required_name("   ", "budget"),
            Err(EngineError::InvalidName("budget name must not be empty".to_string()))
        );
    }

    #[test]
    fn optional_text_drops_blank() {
        assert_eq!(normalize_optional_text(Some("  ")), None);
        assert_eq!(normalize_optional_text(Some(" rent ")), Some("rent".to_string()));
        assert_eq!(normalize_optional_text(None), None);
    }
}
