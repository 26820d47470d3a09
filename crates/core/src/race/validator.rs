//! Result validation.

use serde_json::Value;
use tracing::debug;

use super::config::ValidatorConfig;

/// Pure, side-effect-free classifier deciding whether an extracted
/// payload is usable.
#[derive(Debug, Clone)]
pub struct ResultValidator {
    config: ValidatorConfig,
}

impl ResultValidator {
    pub fn new(config: ValidatorConfig) -> Self {
        Self { config }
    }

    /// Classify a payload.
    ///
    /// Rejections: null, denylisted phrases anywhere in the serialized
    /// payload (regardless of length), plain text below the length
    /// floor, empty structures, and bare lists whose first element is
    /// not a keyed record. Everything else non-empty is accepted.
    pub fn is_usable(&self, payload: &Value) -> bool {
        if payload.is_null() {
            return false;
        }

        if self.contains_denylisted(payload) {
            return false;
        }

        match payload {
            Value::String(text) => {
                let text = text.trim();
                !text.is_empty() && text.len() >= self.config.min_text_len
            }
            Value::Object(map) => {
                if map.is_empty() {
                    return false;
                }
                let record_list = map
                    .values()
                    .filter_map(|v| v.as_array())
                    .find(|a| !a.is_empty());
                if let Some(list) = record_list {
                    if list
                        .iter()
                        .any(|element| self.expected_field_matches(element) >= 2)
                    {
                        debug!("Accepting mapping with recognized record fields");
                    }
                    return true;
                }
                // No list values; a non-empty mapping still counts as content
                true
            }
            Value::Array(items) => matches!(items.first(), Some(Value::Object(_))),
            // Numbers and booleans are non-empty scalars
            _ => true,
        }
    }

    /// Number of expected field names present on a keyed element.
    fn expected_field_matches(&self, element: &Value) -> usize {
        let Value::Object(map) = element else {
            return 0;
        };
        self.config
            .expected_fields
            .iter()
            .filter(|field| map.keys().any(|k| k.to_lowercase().contains(field.as_str())))
            .count()
    }

    fn contains_denylisted(&self, payload: &Value) -> bool {
        let text = match payload {
            Value::String(s) => s.to_lowercase(),
            other => other.to_string().to_lowercase(),
        };
        self.config
            .denylist
            .iter()
            .any(|phrase| text.contains(&phrase.to_lowercase()))
    }
}
