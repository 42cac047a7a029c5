//! Instagram post references
//!
//! A post reference is whatever the user typed: a full post URL, a reel or
//! IGTV link, or a bare shortcode. Parsing reduces it to a validated
//! [`Shortcode`], which is the only thing handed to the media fetcher.

use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

use crate::errors::ValidationError;

/// Longest shortcode accepted. Real shortcodes are 11 characters (up to ~40
/// for private-share codes); the bound keeps callback payloads small.
pub const MAX_SHORTCODE_LEN: usize = 48;

/// Path segments that introduce a post shortcode.
const POST_SEGMENTS: &[&str] = &["p", "reel", "reels", "tv"];

/// Validated Instagram shortcode
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct Shortcode(String);

impl Shortcode {
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        if raw.is_empty()
            || raw.len() > MAX_SHORTCODE_LEN
            || !raw
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(ValidationError::InvalidShortcode(raw.to_string()));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Shortcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Shortcode {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Shortcode> for String {
    fn from(code: Shortcode) -> String {
        code.0
    }
}

/// A post reference as supplied by the user, with its resolved shortcode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostReference {
    raw: String,
    shortcode: Shortcode,
}

impl PostReference {
    /// Parse a post URL. Bare shortcodes are rejected.
    ///
    /// Accepted hosts: `instagram.com` and its subdomains, `instagr.am`.
    /// Accepted paths: `/p/{code}`, `/reel/{code}`, `/reels/{code}`,
    /// `/tv/{code}`, optionally preceded by a username segment.
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::Empty);
        }

        let with_scheme = if trimmed.contains("://") {
            trimmed.to_string()
        } else {
            format!("https://{}", trimmed)
        };

        let url = Url::parse(&with_scheme)
            .map_err(|_| ValidationError::NotInstagram(trimmed.to_string()))?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(ValidationError::NotInstagram(trimmed.to_string()));
        }

        let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
        if !is_instagram_host(&host) {
            return Err(ValidationError::NotInstagram(trimmed.to_string()));
        }

        let segments: Vec<&str> = url
            .path_segments()
            .map(|s| s.filter(|seg| !seg.is_empty()).collect())
            .unwrap_or_default();

        let code = segments
            .windows(2)
            .find(|pair| POST_SEGMENTS.contains(&pair[0]))
            .map(|pair| pair[1])
            .ok_or_else(|| ValidationError::MissingShortcode(trimmed.to_string()))?;

        Ok(Self {
            raw: trimmed.to_string(),
            shortcode: Shortcode::parse(code)?,
        })
    }

    /// Find the Instagram post link in free text.
    ///
    /// The first token that parses as a post URL wins; failing that, the
    /// first link-like token is returned so the caller can report why it
    /// was rejected.
    pub fn find_in_text(text: &str) -> Option<&str> {
        let mut tokens = text.split_whitespace();
        tokens
            .clone()
            .find(|token| Self::parse(token).is_ok())
            .or_else(|| tokens.find(|token| looks_like_link(token)))
    }

    pub fn shortcode(&self) -> &Shortcode {
        &self.shortcode
    }
}

impl From<Shortcode> for PostReference {
    fn from(shortcode: Shortcode) -> Self {
        Self {
            raw: shortcode.as_str().to_string(),
            shortcode,
        }
    }
}

impl fmt::Display for PostReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn looks_like_link(token: &str) -> bool {
    let lower = token.to_ascii_lowercase();
    lower.contains("instagram.com") || lower.contains("instagr.am") || lower.contains("://")
}

fn is_instagram_host(host: &str) -> bool {
    host == "instagram.com"
        || host.ends_with(".instagram.com")
        || host == "instagr.am"
        || host == "www.instagr.am"
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── URLs ─────────────────────────────────────────────────────────────────

    #[test]
    fn test_post_url() {
        let post = PostReference::parse("https://instagram.com/p/ABC123/").unwrap();
        assert_eq!(post.shortcode().as_str(), "ABC123");
        assert_eq!(post.to_string(), "https://instagram.com/p/ABC123/");
    }

    #[test]
    fn test_www_url_with_query() {
        let post =
            PostReference::parse("https://www.instagram.com/p/Cx9_a-Z1/?igsh=abc&utm=1").unwrap();
        assert_eq!(post.shortcode().as_str(), "Cx9_a-Z1");
    }

    #[test]
    fn test_reel_and_tv_urls() {
        for url in [
            "https://www.instagram.com/reel/Reel01/",
            "https://www.instagram.com/reels/Reel01",
            "https://instagram.com/tv/Reel01/",
            "https://m.instagram.com/p/Reel01/",
            "https://instagr.am/p/Reel01/",
        ] {
            let post = PostReference::parse(url).unwrap();
            assert_eq!(post.shortcode().as_str(), "Reel01", "{}", url);
        }
    }

    #[test]
    fn test_url_with_username_prefix() {
        let post = PostReference::parse("https://www.instagram.com/someone/p/XyZ987/").unwrap();
        assert_eq!(post.shortcode().as_str(), "XyZ987");
    }

    #[test]
    fn test_url_without_scheme() {
        let post = PostReference::parse("instagram.com/p/NoScheme1").unwrap();
        assert_eq!(post.shortcode().as_str(), "NoScheme1");
    }

    #[test]
    fn test_profile_url_is_missing_shortcode() {
        let err = PostReference::parse("https://www.instagram.com/someone/").unwrap_err();
        assert!(matches!(err, ValidationError::MissingShortcode(_)));
    }

    #[test]
    fn test_post_segment_without_code() {
        let err = PostReference::parse("https://www.instagram.com/p/").unwrap_err();
        assert!(matches!(err, ValidationError::MissingShortcode(_)));
    }

    #[test]
    fn test_foreign_host_rejected() {
        let err = PostReference::parse("https://example.com/p/ABC123/").unwrap_err();
        assert!(matches!(err, ValidationError::NotInstagram(_)));

        let err = PostReference::parse("https://notinstagram.com.evil.io/p/ABC123/").unwrap_err();
        assert!(matches!(err, ValidationError::NotInstagram(_)));
    }

    #[test]
    fn test_non_http_scheme_rejected() {
        let err = PostReference::parse("ftp://instagram.com/p/ABC123/").unwrap_err();
        assert!(matches!(err, ValidationError::NotInstagram(_)));
    }

    #[test]
    fn test_bare_code_rejected() {
        let err = PostReference::parse("  ABC123 ").unwrap_err();
        assert!(matches!(err, ValidationError::NotInstagram(_)));
    }

    // ── Shortcodes ───────────────────────────────────────────────────────────

    #[test]
    fn test_post_from_shortcode() {
        let post = PostReference::from(Shortcode::parse("ABC123").unwrap());
        assert_eq!(post.shortcode().as_str(), "ABC123");
        assert_eq!(post.to_string(), "ABC123");
    }

    #[test]
    fn test_empty_reference() {
        assert_eq!(PostReference::parse("   ").unwrap_err(), ValidationError::Empty);
    }

    #[test]
    fn test_shortcode_charset() {
        assert!(Shortcode::parse("abc_DEF-123").is_ok());
        assert!(Shortcode::parse("abc def").is_err());
        assert!(Shortcode::parse("abc/def").is_err());
        assert!(Shortcode::parse("").is_err());
    }

    #[test]
    fn test_shortcode_length_bound() {
        let max = "a".repeat(MAX_SHORTCODE_LEN);
        assert!(Shortcode::parse(&max).is_ok());
        let over = "a".repeat(MAX_SHORTCODE_LEN + 1);
        assert!(matches!(
            Shortcode::parse(&over),
            Err(ValidationError::InvalidShortcode(_))
        ));
    }

    #[test]
    fn test_shortcode_serde_validates() {
        let ok: Shortcode = serde_json::from_str("\"ABC123\"").unwrap();
        assert_eq!(ok.as_str(), "ABC123");
        assert!(serde_json::from_str::<Shortcode>("\"bad code\"").is_err());
    }

    // ── Free text ────────────────────────────────────────────────────────────

    #[test]
    fn test_find_in_text() {
        let text = "look at this https://www.instagram.com/p/ABC123/ so cool";
        assert_eq!(
            PostReference::find_in_text(text),
            Some("https://www.instagram.com/p/ABC123/")
        );
        assert_eq!(PostReference::find_in_text("hello there"), None);
    }

    #[test]
    fn test_find_in_text_skips_other_links() {
        let text = "via https://t.co/abc https://www.instagram.com/p/ABC123/";
        assert_eq!(
            PostReference::find_in_text(text),
            Some("https://www.instagram.com/p/ABC123/")
        );
    }

    #[test]
    fn test_find_in_text_falls_back_to_first_link() {
        let text = "see https://example.com/x and instagram.com/someone";
        assert_eq!(
            PostReference::find_in_text(text),
            Some("https://example.com/x")
        );
    }
}
