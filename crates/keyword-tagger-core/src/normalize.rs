//! Token normalization.
//!
//! Every string the engine compares, stores, or looks up passes through
//! [`normalize`] first: lower-cased, trimmed, and with internal whitespace
//! runs collapsed to a single ASCII space. Raw input is never compared.
//!
//! ```rust
//! use keyword_tagger_core::normalize::normalize;
//!
//! assert_eq!(normalize(" Foo   BAR "), "foo bar");
//! ```

/// Maximum number of words in a stored token.
pub const MAX_TOKEN_WORDS: usize = 4;

/// Canonicalize a raw token or keyword.
pub fn normalize(raw: &str) -> String {
    let lowered = raw.to_lowercase();
    let mut out = String::with_capacity(lowered.len());
    for word in lowered.split_whitespace() {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(word);
    }
    out
}

/// Number of words in an already-normalized token.
pub fn word_count(token: &str) -> usize {
    if token.is_empty() {
        0
    } else {
        token.split(' ').count()
    }
}

/// Normalize `raw` and check it is a storable token (1 to
/// [`MAX_TOKEN_WORDS`] words). Returns `None` when it is not.
pub fn normalize_token(raw: &str) -> Option<String> {
    let token = normalize(raw);
    match word_count(&token) {
        1..=MAX_TOKEN_WORDS => Some(token),
        _ => None,
    }
}

/// A contiguous word window of a keyword.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NGram {
    /// Joined text of the window (already normalized).
    pub text: String,
    /// Index of the first word.
    pub start: usize,
    /// Number of words.
    pub len: usize,
}

/// Every contiguous window of 1..=`max_len` words.
///
/// Ordered longest first, then by start position, which is the order the
/// tagger tries candidates in.
pub fn ngrams(words: &[&str], max_len: usize) -> Vec<NGram> {
    let max_len = max_len.min(words.len());
    let mut out = Vec::new();
    for len in (1..=max_len).rev() {
        for start in 0..=(words.len() - len) {
            out.push(NGram {
                text: words[start..start + len].join(" "),
                start,
                len,
            });
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_collapses_and_lowercases() {
        assert_eq!(normalize(" Foo   BAR "), "foo bar");
        assert_eq!(normalize("\tAcme\n Pumps "), "acme pumps");
    }

    #[test]
    fn test_normalize_empty_and_whitespace() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("   \t "), "");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let once = normalize("  TFO   Twisting Machine ");
        assert_eq!(normalize(&once), once);
    }

    #[test]
    fn test_normalize_token_word_limits() {
        assert_eq!(normalize_token(" Yarn "), Some("yarn".to_string()));
        assert_eq!(
            normalize_token("two for one twister"),
            Some("two for one twister".to_string())
        );
        assert_eq!(normalize_token("a b c d e"), None);
        assert_eq!(normalize_token("   "), None);
    }

    #[test]
    fn test_ngrams_longest_first() {
        let words = vec!["acme", "pumps", "price"];
        let grams: Vec<String> = ngrams(&words, 4).into_iter().map(|g| g.text).collect();
        assert_eq!(
            grams,
            vec![
                "acme pumps price",
                "acme pumps",
                "pumps price",
                "acme",
                "pumps",
                "price"
            ]
        );
    }

    #[test]
    fn test_ngrams_respects_max_len() {
        let words = vec!["a", "b", "c", "d", "e"];
        let grams = ngrams(&words, 2);
        assert!(grams.iter().all(|g| g.len <= 2));
        assert_eq!(grams.len(), 4 + 5);
    }

    #[test]
    fn test_ngrams_empty() {
        assert!(ngrams(&[], 4).is_empty());
    }
}
