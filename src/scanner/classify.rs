use std::sync::LazyLock;

use regex::Regex;

use crate::common::ScanType;

// Patterns
//------------------------------------------------------------------------------

struct Patterns {
    web_url: Regex,
    email: Regex,
    phone: Regex,
}

// The web url authority never takes a userinfo part, so `user@example.com` is
// not read as `http://user@example.com`.
static PATTERNS: LazyLock<Patterns> = LazyLock::new(|| Patterns {
    web_url: Regex::new(
        r"(?ix)^
        (?:https?://)
        (?:
            (?:[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?\.)+[a-z]{2,63}
          | (?:(?:25[0-5]|2[0-4][0-9]|1[0-9]{2}|[1-9]?[0-9])\.){3}(?:25[0-5]|2[0-4][0-9]|1[0-9]{2}|[1-9]?[0-9])
        )
        (?::[0-9]{1,5})?
        (?:[/?\#]\S*)?
        $",
    )
    .expect("valid web url pattern"),
    email: Regex::new(
        r"^[a-zA-Z0-9+._%\-]{1,256}@[a-zA-Z0-9][a-zA-Z0-9\-]{0,64}(?:\.[a-zA-Z0-9][a-zA-Z0-9\-]{0,25})+$",
    )
    .expect("valid email pattern"),
    phone: Regex::new(r"^(?:\+[0-9]+[\- .]*)?(?:\([0-9]+\)[\- .]*)?[0-9][0-9\- .]+[0-9]$")
        .expect("valid phone pattern"),
});

fn has_web_scheme(s: &str) -> bool {
    let lower = s.get(..8).unwrap_or(s).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// True if `s` is an absolute http(s) web url.
pub fn is_web_url(s: &str) -> bool {
    has_web_scheme(s) && PATTERNS.web_url.is_match(s)
}

// Classifier
//------------------------------------------------------------------------------

/// Navigation target for `raw`, if it reads as a web url.
///
/// A schemeless candidate is tried again with `http://` prepended, and the
/// prepended form is what gets returned.
pub fn url_candidate(raw: &str) -> Option<String> {
    if has_web_scheme(raw) {
        return is_web_url(raw).then(|| raw.to_string());
    }
    let prefixed = format!("http://{raw}");
    PATTERNS.web_url.is_match(&prefixed).then_some(prefixed)
}

/// Maps decoded text to its category. First match wins: url, email, phone, text.
pub fn classify(raw: &str) -> ScanType {
    if url_candidate(raw).is_some() {
        ScanType::Url
    } else if PATTERNS.email.is_match(raw) {
        ScanType::Email
    } else if PATTERNS.phone.is_match(raw) {
        ScanType::Phone
    } else {
        ScanType::Text
    }
}

// Open action
//------------------------------------------------------------------------------

/// What tapping on a scan does.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum OpenAction {
    Browse(String),
    ShowContent(String),
}

pub fn open_action(content: &str, kind: ScanType) -> OpenAction {
    if kind != ScanType::Url {
        return OpenAction::ShowContent(content.to_string());
    }
    let url = if has_web_scheme(content) {
        content.to_string()
    } else {
        format!("http://{content}")
    };
    if is_web_url(&url) {
        OpenAction::Browse(url)
    } else {
        OpenAction::ShowContent(content.to_string())
    }
}
