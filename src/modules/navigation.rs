// Pure location-input logic - no platform imports.
// URL-vs-search heuristics and scheme checks that can be unit tested.

use url::Url;

use crate::settings::SearchEngine;

/// Non-web schemes that another app handles. Navigations to these leave
/// the browser; the App Store one additionally closes the source tab.
pub const EXTERNAL_SCHEMES: [&str; 3] = ["tel", "mailto", "itms-appss"];

const APP_STORE_SCHEME: &str = "itms-appss";

/// Try to read the entered text as a web URL. A bare domain gets
/// `https://` prepended; anything without a dot, or that does not parse
/// to a host, is not a URL.
pub fn valid_url(text: &str) -> Option<Url> {
    let trimmed = text.trim();
    if !trimmed.contains('.') {
        return None;
    }
    let candidate = if trimmed.starts_with("https://") || trimmed.starts_with("http://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };
    Url::parse(&candidate).ok().filter(|u| u.host().is_some())
}

pub fn is_probable_url(text: &str) -> bool {
    valid_url(text).is_some()
}

/// Where the address bar should go for this input: the entered URL, or a
/// search-engine query for everything else.
pub fn location_url(text: &str, engine: SearchEngine) -> Option<Url> {
    if let Some(url) = valid_url(text) {
        return Some(url);
    }
    Url::parse(&engine.query_url(text.trim())).ok()
}

/// Check if the scheme is HTTPS.
pub fn is_secure_url(text: &str) -> bool {
    text.to_lowercase().starts_with("https://")
}

pub fn is_external_scheme(url: &Url) -> bool {
    EXTERNAL_SCHEMES.contains(&url.scheme())
}

pub fn is_app_store_url(url: &Url) -> bool {
    url.scheme() == APP_STORE_SCHEME
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    // --- valid_url tests ---

    #[rstest]
    // Explicit schemes pass through (normalized).
    #[case("https://example.com", Some("https://example.com/"))]
    #[case("http://example.com/path?q=1", Some("http://example.com/path?q=1"))]
    // Bare domains get https:// prepended.
    #[case("example.com", Some("https://example.com/"))]
    #[case("sub.domain.co.uk", Some("https://sub.domain.co.uk/"))]
    #[case("docs.rs/my-crate", Some("https://docs.rs/my-crate"))]
    // Params/fragment preserved.
    #[case("example.com/test?x=1#frag", Some("https://example.com/test?x=1#frag"))]
    // Not URLs.
    #[case("no-dot", None)]
    #[case("rust programming", None)]
    #[case("hello world.example", None)]
    #[case("", None)]
    #[case("   ", None)]
    fn url_detection(#[case] input: &str, #[case] expected: Option<&str>) {
        assert_eq!(valid_url(input).map(|u| u.to_string()), expected.map(String::from));
    }

    #[rstest]
    #[case("hello world", "https://www.google.com/search?q=hello%20world")]
    #[case("c++", "https://www.google.com/search?q=c%2B%2B")]
    #[case("  padded  ", "https://www.google.com/search?q=padded")]
    fn search_fallback(#[case] input: &str, #[case] expected: &str) {
        let url = location_url(input, SearchEngine::Google).unwrap();
        assert_eq!(url.as_str(), expected);
    }

    #[test]
    fn location_url_prefers_the_entered_url() {
        let url = location_url("example.com", SearchEngine::Bing).unwrap();
        assert_eq!(url.as_str(), "https://example.com/");
    }

    #[rstest]
    #[case("https://example.com", true)]
    #[case("HTTPS://EXAMPLE.COM", true)]
    #[case("http://example.com", false)]
    #[case("example.com", false)]
    fn secure_url_check(#[case] input: &str, #[case] expected: bool) {
        assert_eq!(is_secure_url(input), expected);
    }

    #[rstest]
    #[case("tel:+15550100", true)]
    #[case("mailto:someone@example.com", true)]
    #[case("itms-appss://apps.apple.com/app/id1", true)]
    #[case("https://example.com", false)]
    fn external_scheme_check(#[case] input: &str, #[case] expected: bool) {
        assert_eq!(is_external_scheme(&Url::parse(input).unwrap()), expected);
    }

    #[test]
    fn only_the_app_store_scheme_counts_as_app_store() {
        assert!(is_app_store_url(&Url::parse("itms-appss://apps.apple.com/x").unwrap()));
        assert!(!is_app_store_url(&Url::parse("tel:+15550100").unwrap()));
    }
}
