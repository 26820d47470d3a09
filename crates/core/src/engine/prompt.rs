//! Task prompt preparation.

use once_cell::sync::Lazy;
use regex_lite::Regex;

static URL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"https?://\S+").unwrap());

static AND_TAIL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"([a-z]{4,}and)$").unwrap());

/// English words that legitimately end in "and" and must not be split
/// when they appear at the end of a URL path segment.
const REAL_AND_WORDS: &[&str] = &[
    "command", "demand", "expand", "understand", "withstand", "contraband", "headband", "armband",
    "remand", "reprimand", "mainland", "farmland", "highland", "lowland", "island", "strand",
    "brand", "grand", "stand", "sand", "hand", "land", "band", "wand", "bland", "gland",
];

/// Strip a trailing "and" glued onto a URL path without a space.
///
/// Callers occasionally write "visit https://host/pathand click X"; the
/// glued conjunction 404s the navigation. A word blocklist avoids false
/// positives on real English words like "command" or "expand".
pub fn repair_url_typos(text: &str) -> String {
    URL_RE
        .replace_all(text, |caps: &regex_lite::Captures| {
            let url = &caps[0];
            match AND_TAIL_RE.captures(url) {
                Some(tail) if !REAL_AND_WORDS.contains(&tail[1].to_lowercase().as_str()) => {
                    format!("{} and", &url[..url.len() - 3])
                }
                _ => url.to_string(),
            }
        })
        .to_string()
}

/// Wrap the user task with operator rules for the automation engine.
///
/// The rules harden the two behaviors that most often lose results in
/// practice: double-submitting modal actions, and extracting rows from a
/// table before every row has rendered.
pub fn prepare_prompt(user_prompt: &str) -> String {
    let user_prompt = repair_url_typos(user_prompt);

    format!(
        r#"You are a browser automation agent. Execute the following task:

{user_prompt}

=== INTERACTION RULES ===
- After clicking a button that triggers a confirmation toast, wait 2
  seconds and look for the toast before deciding the click failed.
- If a click registered via JavaScript fallback, trust it: wait for the
  confirmation before retrying. Never retry the same click more than
  twice in total.
- Once you have closed a modal dialog, do not reopen it; sidebar state
  may lag behind by a UI refresh.
=== END INTERACTION RULES ===

=== DATA EXTRACTION RULES ===
- Before extracting rows from a paginated or scrollable table, scroll
  the table container to the bottom so every row is rendered.
- Extract the href attribute from every anchor in the identifying
  column; resolve relative hrefs against the current origin.
- Only report a link as missing when the cell genuinely has no anchor
  element, never because the row was off-screen.
=== END DATA EXTRACTION RULES ===
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repair_strips_glued_and() {
        let text = "open https://example.com/request_browse_publicand extract the rows";
        let repaired = repair_url_typos(text);
        assert!(repaired.contains("https://example.com/request_browse_public and extract"));
    }

    #[test]
    fn test_repair_keeps_real_words() {
        for word in ["command", "expand", "island", "understand"] {
            let text = format!("open https://example.com/{} now", word);
            assert_eq!(repair_url_typos(&text), text);
        }
    }

    #[test]
    fn test_repair_ignores_non_urls() {
        let text = "this sentence ends in edgeland";
        assert_eq!(repair_url_typos(text), text);
    }

    #[test]
    fn test_repair_handles_multiple_urls() {
        let text = "see https://a.example/pageand then https://b.example/statusand finish";
        let repaired = repair_url_typos(text);
        assert!(repaired.contains("https://a.example/page and"));
        assert!(repaired.contains("https://b.example/status and"));
    }

    #[test]
    fn test_prepare_prompt_embeds_task() {
        let wrapped = prepare_prompt("count the open tenders");
        assert!(wrapped.contains("count the open tenders"));
        assert!(wrapped.contains("DATA EXTRACTION RULES"));
    }
}
