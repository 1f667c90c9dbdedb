//! Content-addressed hashing and sanitization for contextual prefixes
//! (component C3).

use sha2::{Digest, Sha256};

/// Compute the prefix cache key: `SHA-256(sourceId | "|" | pageIndexOrMinusOne | "|" | chunkText)`,
/// hex-encoded lowercase. The page placeholder for "no page" is the literal `-1`.
pub fn cache_key(source_id: &str, page: Option<i64>, chunk_text: &str) -> String {
    let page_str = page.map(|p| p.to_string()).unwrap_or_else(|| "-1".to_string());
    let mut hasher = Sha256::new();
    hasher.update(source_id.as_bytes());
    hasher.update(b"|");
    hasher.update(page_str.as_bytes());
    hasher.update(b"|");
    hasher.update(chunk_text.as_bytes());
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

const MAX_PREFIX_CHARS: usize = 600;

/// Sanitize a raw prefix string: strip newlines to spaces, trim whitespace,
/// drop a leading literal `answer:` (case-insensitive), trim one trailing
/// `.`, and cap at 600 user-perceived characters.
pub fn sanitize(input: &str) -> String {
    let mut s = input.replace(['\n', '\r'], " ");
    s = s.trim().to_string();

    const ANSWER_PREFIX_LEN: usize = "answer:".len();
    if s.is_char_boundary(ANSWER_PREFIX_LEN) && s[..ANSWER_PREFIX_LEN].eq_ignore_ascii_case("answer:") {
        s = s[ANSWER_PREFIX_LEN..].trim_start().to_string();
    }

    if s.ends_with('.') {
        s.pop();
    }

    if s.chars().count() > MAX_PREFIX_CHARS {
        s = s.chars().take(MAX_PREFIX_CHARS).collect();
    }

    s.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_key_uses_minus_one_placeholder_for_missing_page() {
        let with_none = cache_key("src", None, "text");
        let with_minus_one = cache_key("src", Some(-1), "text");
        assert_eq!(with_none, with_minus_one);
    }

    #[test]
    fn cache_key_is_stable_and_distinct() {
        let a = cache_key("src", Some(0), "hello");
        let b = cache_key("src", Some(0), "hello");
        let c = cache_key("src", Some(1), "hello");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn sanitize_strips_newlines_and_prefix_and_trailing_dot() {
        let out = sanitize(" Answer:\nThis is the section.\n");
        assert_eq!(out, "This is the section");
    }

    #[test]
    fn sanitize_caps_length() {
        let long = "a".repeat(1000);
        let out = sanitize(&long);
        assert_eq!(out.chars().count(), 600);
    }

    #[test]
    fn sanitize_does_not_panic_on_multibyte_prefix() {
        let out = sanitize("日本語able text here");
        assert_eq!(out, "日本語able text here");
    }

    #[test]
    fn sanitize_is_idempotent() {
        let inputs = [
            " Answer: hello world.\n",
            "already clean",
            "",
            "Answer:",
            &"x".repeat(650),
        ];
        for input in inputs {
            let once = sanitize(input);
            let twice = sanitize(&once);
            assert_eq!(once, twice, "not idempotent for {input:?}");
        }
    }
}
