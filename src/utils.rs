//! Utility functions for URL cleanup and log formatting.

use crate::error::AppError;
use url::Url;

/// Strip query string and fragment from a candidate URL.
///
/// Only absolute `http`/`https` URLs are accepted; anything else is
/// rejected with [`AppError::InvalidInput`]. Raw text is never forwarded
/// as if it were a valid link.
///
/// # Errors
///
/// Returns `InvalidInput` when the text does not parse as an http(s) URL.
///
/// # Examples
///
/// ```
/// use media_fetch_bot::utils::canonicalize_url;
///
/// let url = canonicalize_url("https://x.test/p?a=1#frag").expect("valid url");
/// assert_eq!(url, "https://x.test/p");
/// ```
pub fn canonicalize_url(input: &str) -> Result<String, AppError> {
    let trimmed = input.trim();
    let mut url = Url::parse(trimmed)
        .map_err(|_| AppError::InvalidInput(truncate_str(trimmed, 80)))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(AppError::InvalidInput(truncate_str(trimmed, 80)));
    }

    url.set_query(None);
    url.set_fragment(None);
    Ok(url.to_string())
}

/// Truncate a string to at most `max_chars` characters for log lines.
///
/// Truncated output ends with an ellipsis that counts toward the limit.
#[must_use]
pub fn truncate_str(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(max_chars.saturating_sub(1)).collect();
        out.push('…');
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_query_and_fragment() {
        assert_eq!(
            canonicalize_url("https://x.test/p?a=1#frag").expect("valid url"),
            "https://x.test/p"
        );
    }

    #[test]
    fn trims_surrounding_whitespace() {
        assert_eq!(
            canonicalize_url("  https://x.test/v?ref=1 \n").expect("valid url"),
            "https://x.test/v"
        );
    }

    #[test]
    fn rejects_plain_text() {
        assert!(matches!(
            canonicalize_url("hello there"),
            Err(AppError::InvalidInput(_))
        ));
    }

    #[test]
    fn rejects_non_http_schemes() {
        assert!(matches!(
            canonicalize_url("ftp://x.test/file"),
            Err(AppError::InvalidInput(_))
        ));
        assert!(matches!(
            canonicalize_url("mailto:user@x.test"),
            Err(AppError::InvalidInput(_))
        ));
    }

    #[test]
    fn truncates_on_char_boundary() {
        assert_eq!(truncate_str("привет мир", 6), "приве…");
        assert_eq!(truncate_str("short", 80), "short");
    }

    #[test]
    fn truncated_output_stays_within_limit() {
        let out = truncate_str(&"x".repeat(200), 80);
        assert_eq!(out.chars().count(), 80);
        assert!(out.ends_with('…'));
    }
}
