//! Payload extraction from an engine run history.
//!
//! Extraction is an explicit ordered list of pure passes; the first pass
//! yielding non-empty content wins and later passes are not attempted.

use once_cell::sync::Lazy;
use regex_lite::Regex;
use serde_json::Value;

use crate::engine::RunHistory;

/// Prefixes marking extracted content that merely echoes an action
/// instead of carrying result data.
const ACTION_ECHO_PREFIXES: &[&str] = &[
    "\u{1F517}", // link emoji
    "\u{1F50D}", // magnifier emoji
    "Clicked",
    "Typed",
    "Waited",
    "Scrolled",
    "Searched",
    "Navigated",
];

static RESULT_TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<r>\s*(.*?)\s*</r>").unwrap());

static FENCED_JSON_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?:json)?\s*(\{.*?\}|\[.*?\])\s*```").unwrap());

static BARE_JSON_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?s)(\[\s*\{.*\}\s*\])").unwrap(),
        Regex::new(r"(?s)(\{.*\})").unwrap(),
        Regex::new(r"(?s)(\[.*\])").unwrap(),
    ]
});

/// Run the ordered extraction passes, short-circuiting on first success.
pub fn extract_payload(history: &RunHistory) -> Option<String> {
    done_signal(history)
        .or_else(|| structured_output(history))
        .or_else(|| last_meaningful_content(history))
        .or_else(|| final_page_text(history))
}

/// Pass 1: content of the last step that explicitly signalled "done".
fn done_signal(history: &RunHistory) -> Option<String> {
    history
        .steps
        .iter()
        .rev()
        .filter(|step| step.is_done)
        .find_map(|step| non_empty(step.extracted_content.as_deref()))
}

/// Pass 2: `done.text` of the most recent structured model output.
fn structured_output(history: &RunHistory) -> Option<String> {
    history.model_outputs.iter().rev().find_map(|output| {
        non_empty(
            output
                .get("done")
                .and_then(|done| done.get("text"))
                .and_then(Value::as_str),
        )
    })
}

/// Pass 3: the newest extracted content that is not an action echo.
fn last_meaningful_content(history: &RunHistory) -> Option<String> {
    history.steps.iter().rev().find_map(|step| {
        let content = non_empty(step.extracted_content.as_deref())?;
        if ACTION_ECHO_PREFIXES
            .iter()
            .any(|prefix| content.starts_with(prefix))
        {
            None
        } else {
            Some(content)
        }
    })
}

/// Pass 4: last-resort scrape of the final page.
fn final_page_text(history: &RunHistory) -> Option<String> {
    non_empty(history.final_page_text.as_deref())
}

fn non_empty(text: Option<&str>) -> Option<String> {
    text.map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

/// Recover structure from a raw payload string.
///
/// Tries, in order: `<r>` result tags, fenced ```json blocks, parsing
/// the whole string, and bare JSON arrays/objects embedded in prose.
/// Falls back to the raw string when nothing parses.
pub fn clean_payload(raw: &str) -> Value {
    let mut text = raw.trim();

    if let Some(captures) = RESULT_TAG_RE.captures(text) {
        let inner = captures.get(1).map(|m| m.as_str().trim()).unwrap_or("");
        if let Ok(value) = serde_json::from_str(inner) {
            return value;
        }
        text = captures.get(1).map(|m| m.as_str()).unwrap_or(text).trim();
    }

    if let Some(captures) = FENCED_JSON_RE.captures(text) {
        if let Ok(value) = serde_json::from_str(captures.get(1).map(|m| m.as_str()).unwrap_or("")) {
            return value;
        }
    }

    if let Ok(value) = serde_json::from_str(text) {
        return value;
    }

    for pattern in BARE_JSON_PATTERNS.iter() {
        if let Some(captures) = pattern.captures(text) {
            if let Ok(value) =
                serde_json::from_str(captures.get(1).map(|m| m.as_str()).unwrap_or(""))
            {
                return value;
            }
        }
    }

    Value::String(text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::StepRecord;
    use serde_json::json;

    fn step(index: u32, content: Option<&str>, is_done: bool) -> StepRecord {
        StepRecord {
            index,
            action: String::new(),
            extracted_content: content.map(str::to_string),
            is_done,
            screenshot_b64: None,
            page: None,
        }
    }

    #[test]
    fn test_done_signal_wins() {
        let history = RunHistory {
            steps: vec![
                step(1, Some("Clicked #search"), false),
                step(2, Some("final answer content"), true),
            ],
            model_outputs: vec![json!({"done": {"text": "model says"}})],
            final_page_text: Some("page dump".to_string()),
        };
        assert_eq!(extract_payload(&history).unwrap(), "final answer content");
    }

    #[test]
    fn test_structured_output_fallback() {
        let history = RunHistory {
            steps: vec![step(1, None, true)],
            model_outputs: vec![
                json!({"click": {"selector": "#a"}}),
                json!({"done": {"text": "from model output"}}),
            ],
            final_page_text: None,
        };
        assert_eq!(extract_payload(&history).unwrap(), "from model output");
    }

    #[test]
    fn test_action_echoes_are_skipped() {
        let history = RunHistory {
            steps: vec![
                step(1, Some("table rows: a, b, c"), false),
                step(2, Some("Clicked element #next"), false),
                step(3, Some("Scrolled down"), false),
            ],
            model_outputs: vec![],
            final_page_text: None,
        };
        assert_eq!(extract_payload(&history).unwrap(), "table rows: a, b, c");
    }

    #[test]
    fn test_final_page_text_is_last_resort() {
        let history = RunHistory {
            steps: vec![step(1, Some("Waited 2s"), false)],
            model_outputs: vec![],
            final_page_text: Some("scraped body".to_string()),
        };
        assert_eq!(extract_payload(&history).unwrap(), "scraped body");
    }

    #[test]
    fn test_empty_history_extracts_nothing() {
        assert!(extract_payload(&RunHistory::default()).is_none());
    }

    #[test]
    fn test_clean_payload_result_tags() {
        let value = clean_payload("<r> {\"total\": 3} </r>");
        assert_eq!(value, json!({"total": 3}));
    }

    #[test]
    fn test_clean_payload_fenced_block() {
        let raw = "Here you go:\n```json\n[{\"title\": \"A\"}]\n```\nDone.";
        assert_eq!(clean_payload(raw), json!([{"title": "A"}]));
    }

    #[test]
    fn test_clean_payload_whole_string() {
        assert_eq!(clean_payload("{\"k\": 1}"), json!({"k": 1}));
    }

    #[test]
    fn test_clean_payload_embedded_in_prose() {
        let raw = "I extracted the rows [{\"title\": \"A\"}, {\"title\": \"B\"}] as requested.";
        assert_eq!(clean_payload(raw), json!([{"title": "A"}, {"title": "B"}]));
    }

    #[test]
    fn test_clean_payload_falls_back_to_string() {
        let value = clean_payload("forty-two tenders are currently open");
        assert_eq!(value, json!("forty-two tenders are currently open"));
    }

    #[test]
    fn test_clean_payload_unparseable_tags_fall_through() {
        let value = clean_payload("<r> not json at all </r>");
        assert_eq!(value, json!("not json at all"));
    }
}
