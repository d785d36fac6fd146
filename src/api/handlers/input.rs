//! Deserialization helpers for request bodies.
//!
//! Blank strings are read as absent so the `required` validators report them
//! the same way as missing fields.

use serde::{Deserialize, Deserializer};

/// Keep the value as sent, but treat an all-whitespace string as `None`.
pub fn non_blank<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|v| !v.trim().is_empty()))
}

/// Trim surrounding whitespace; empty after trimming becomes `None`.
pub fn trimmed<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Probe {
        #[serde(default, deserialize_with = "non_blank")]
        raw: Option<String>,
        #[serde(default, deserialize_with = "trimmed")]
        clean: Option<String>,
    }

    fn probe(json: &str) -> Option<Probe> {
        serde_json::from_str(json).ok()
    }

    #[test]
    fn blank_and_missing_are_none() {
        let parsed = probe(r#"{"raw": "   ", "clean": ""}"#);
        assert!(parsed.is_some_and(|p| p.raw.is_none() && p.clean.is_none()));

        let parsed = probe("{}");
        assert!(parsed.is_some_and(|p| p.raw.is_none() && p.clean.is_none()));

        let parsed = probe(r#"{"raw": null, "clean": null}"#);
        assert!(parsed.is_some_and(|p| p.raw.is_none() && p.clean.is_none()));
    }

    #[test]
    fn values_are_kept_or_trimmed() {
        let parsed = probe(r#"{"raw": " pass word ", "clean": "  Jane Smith "}"#);
        assert!(parsed.is_some_and(|p| {
            p.raw.as_deref() == Some(" pass word ") && p.clean.as_deref() == Some("Jane Smith")
        }));
    }
}
