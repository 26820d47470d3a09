//! Pure bot-wall detection over page snapshots.

use once_cell::sync::Lazy;
use regex_lite::Regex;

use super::{Challenge, ChallengeKind};

static SITEKEY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"data-sitekey=["']([^"']+)["']"#).unwrap());

static FRAME_KEY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[?&]k=([^&]+)").unwrap());

/// Whether the page is a Cloudflare JS interstitial.
///
/// These clear on their own; the worker waits them out across steps
/// instead of calling the solving service.
pub fn is_js_wall(html: &str) -> bool {
    html.contains("Just a moment") || html.contains("cf-browser-verification")
}

/// Scan a page snapshot for a solvable challenge.
///
/// Checks frames first (the challenge widget usually lives in an iframe),
/// then falls back to `data-sitekey` attributes in the document itself.
pub fn detect_challenge(url: &str, html: &str, frame_urls: &[String]) -> Option<Challenge> {
    if let Some(challenge) = detect_turnstile(url, html, frame_urls) {
        return Some(challenge);
    }
    if let Some(challenge) = detect_recaptcha(url, html, frame_urls) {
        return Some(challenge);
    }
    detect_hcaptcha(url, html)
}

fn frame_site_key(frame_url: &str) -> Option<String> {
    FRAME_KEY_RE
        .captures(frame_url)
        .map(|c| c[1].to_string())
}

fn html_site_key(html: &str) -> Option<String> {
    SITEKEY_RE.captures(html).map(|c| c[1].to_string())
}

fn detect_turnstile(url: &str, html: &str, frame_urls: &[String]) -> Option<Challenge> {
    let mut site_key = None;

    for frame_url in frame_urls {
        let lower = frame_url.to_lowercase();
        if lower.contains("challenges.cloudflare.com") || lower.contains("turnstile") {
            site_key = frame_site_key(frame_url);
            break;
        }
    }

    if site_key.is_none() && (html.contains("cf-turnstile") || html.to_lowercase().contains("turnstile")) {
        site_key = html_site_key(html);
    }

    site_key.map(|site_key| Challenge {
        kind: ChallengeKind::Turnstile,
        site_key,
        page_url: url.to_string(),
    })
}

fn detect_recaptcha(url: &str, html: &str, frame_urls: &[String]) -> Option<Challenge> {
    let mut site_key = None;

    for frame_url in frame_urls {
        if frame_url.contains("recaptcha") && frame_url.contains("anchor") {
            site_key = frame_site_key(frame_url);
            break;
        }
    }

    if site_key.is_none() && html.contains("recaptcha") {
        site_key = html_site_key(html);
    }

    // reCAPTCHA site keys always carry the "6L" prefix; anything else is
    // a sitekey for some other widget.
    let site_key = site_key.filter(|k| k.contains("6L"))?;

    Some(Challenge {
        kind: ChallengeKind::RecaptchaV2,
        site_key,
        page_url: url.to_string(),
    })
}

fn detect_hcaptcha(url: &str, html: &str) -> Option<Challenge> {
    if !html.to_lowercase().contains("hcaptcha") {
        return None;
    }

    html_site_key(html).map(|site_key| Challenge {
        kind: ChallengeKind::HCaptcha,
        site_key,
        page_url: url.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE_URL: &str = "https://example.com/listing";

    #[test]
    fn test_no_challenge_on_plain_page() {
        let html = "<html><body><table><tr><td>row</td></tr></table></body></html>";
        assert!(detect_challenge(PAGE_URL, html, &[]).is_none());
    }

    #[test]
    fn test_turnstile_from_frame_url() {
        let frames = vec![
            "https://example.com/nav".to_string(),
            "https://challenges.cloudflare.com/cdn-cgi/challenge-platform/turnstile?k=0x4AAAAkey".to_string(),
        ];
        let challenge = detect_challenge(PAGE_URL, "<html></html>", &frames).unwrap();
        assert_eq!(challenge.kind, ChallengeKind::Turnstile);
        assert_eq!(challenge.site_key, "0x4AAAAkey");
        assert_eq!(challenge.page_url, PAGE_URL);
    }

    #[test]
    fn test_turnstile_from_sitekey_attribute() {
        let html = r#"<div class="cf-turnstile" data-sitekey="0x4BBBBkey"></div>"#;
        let challenge = detect_challenge(PAGE_URL, html, &[]).unwrap();
        assert_eq!(challenge.kind, ChallengeKind::Turnstile);
        assert_eq!(challenge.site_key, "0x4BBBBkey");
    }

    #[test]
    fn test_recaptcha_from_anchor_frame() {
        let frames =
            vec!["https://www.google.com/recaptcha/api2/anchor?ar=1&k=6LcABCkey&co=x".to_string()];
        let challenge = detect_challenge(PAGE_URL, "recaptcha", &frames).unwrap();
        assert_eq!(challenge.kind, ChallengeKind::RecaptchaV2);
        assert_eq!(challenge.site_key, "6LcABCkey");
    }

    #[test]
    fn test_recaptcha_requires_6l_prefix() {
        let html = r#"<div class="g-recaptcha" data-sitekey="not-a-recaptcha-key"></div>recaptcha"#;
        assert!(detect_challenge(PAGE_URL, html, &[]).is_none());
    }

    #[test]
    fn test_hcaptcha_from_sitekey() {
        let html = r#"<div class="h-captcha" data-sitekey="10000000-ffff"></div> hCaptcha"#;
        let challenge = detect_challenge(PAGE_URL, html, &[]).unwrap();
        assert_eq!(challenge.kind, ChallengeKind::HCaptcha);
        assert_eq!(challenge.site_key, "10000000-ffff");
    }

    #[test]
    fn test_js_wall_detection() {
        assert!(is_js_wall("<title>Just a moment...</title>"));
        assert!(is_js_wall(r#"<div id="cf-browser-verification"></div>"#));
        assert!(!is_js_wall("<html>content</html>"));
    }
}
