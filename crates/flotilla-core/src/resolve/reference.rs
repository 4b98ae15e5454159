//! Reference token syntax.
//!
//! Values embed references as `${name}` or `${name/key/path}`. A leading
//! backslash escapes the token; escaped tokens survive resolution and lose
//! the backslash in a final unescape pass. The pattern is a wire contract
//! shared with existing descriptor files.

use std::sync::LazyLock;

use regex::Regex;

static REFERENCE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\\)?\$\{([^{}]+)\}").expect("reference pattern is valid"));

const ESCAPED_PREFIX: &str = "\\${";
const PREFIX: &str = "${";

/// One reference occurrence inside a string value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceToken {
    /// First path segment: a dependency name, or a parameter key for short
    /// tokens.
    pub dependency: String,
    /// Remaining path segments under the dependency's property map.
    pub path: Vec<String>,
    /// The exact matched text, escaping backslash included.
    pub literal: String,
    pub escaped: bool,
    /// Byte range of the match within the scanned string.
    pub start: usize,
    pub end: usize,
}

impl ReferenceToken {
    /// Short tokens (`${key}`) name a parameter in scope rather than a
    /// dependency property.
    pub fn is_short(&self) -> bool {
        self.path.is_empty()
    }

    /// The property path joined back into its written form.
    pub fn key(&self) -> String {
        self.path.join("/")
    }

    /// Whether the token is the entire scanned string.
    pub fn spans(&self, text: &str) -> bool {
        self.start == 0 && self.end == text.len()
    }
}

/// All reference tokens in `text`, in match order.
pub fn find_tokens(text: &str) -> Vec<ReferenceToken> {
    REFERENCE_PATTERN
        .captures_iter(text)
        .filter_map(|captures| {
            let matched = captures.get(0)?;
            let escaped = captures.get(1).is_some();
            let body = captures.get(2).map(|m| m.as_str()).unwrap_or_default();
            let mut segments = body.split('/').map(str::to_string);
            Some(ReferenceToken {
                dependency: segments.next().unwrap_or_default(),
                path: segments.collect(),
                literal: matched.as_str().to_string(),
                escaped,
                start: matched.start(),
                end: matched.end(),
            })
        })
        .collect()
}

pub fn contains_reference(text: &str) -> bool {
    REFERENCE_PATTERN.is_match(text)
}

/// Strip the escaping backslash from escaped tokens, leaving the literal
/// `${...}` text.
pub fn unescape(text: &str) -> String {
    text.replace(ESCAPED_PREFIX, PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_token() {
        let tokens = find_tokens("${default-host}");
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].dependency, "default-host");
        assert!(tokens[0].is_short());
        assert!(!tokens[0].escaped);
        assert!(tokens[0].spans("${default-host}"));
    }

    #[test]
    fn test_qualified_token_with_nested_path() {
        let text = "url: ${api/endpoints/0/url}";
        let tokens = find_tokens(text);
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].dependency, "api");
        assert_eq!(tokens[0].path, vec!["endpoints", "0", "url"]);
        assert_eq!(tokens[0].key(), "endpoints/0/url");
        assert_eq!(&text[tokens[0].start..tokens[0].end], tokens[0].literal);
        assert!(!tokens[0].spans(text));
    }

    #[test]
    fn test_escaped_token() {
        let tokens = find_tokens(r"keep \${literal/key} as is");
        assert_eq!(tokens.len(), 1);
        assert!(tokens[0].escaped);
        assert_eq!(tokens[0].literal, r"\${literal/key}");
    }

    #[test]
    fn test_multiple_tokens_in_order() {
        let tokens = find_tokens("${a}-${b/c}");
        let names: Vec<_> = tokens.iter().map(|t| t.dependency.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_plain_text_has_no_tokens() {
        assert!(find_tokens("no references here").is_empty());
        assert!(!contains_reference("$ { not a token }"));
    }

    #[test]
    fn test_unescape_strips_single_backslash() {
        assert_eq!(unescape(r"\${a/b}"), "${a/b}");
        assert_eq!(unescape("${a/b}"), "${a/b}");
    }
}
