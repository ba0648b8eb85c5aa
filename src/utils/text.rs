//! Text normalization for name matching.
//!
//! Both the in-memory index and the scoring algorithms compare names in this
//! normalized form:
//! - Unicode NFKC normalization
//! - Lowercase conversion
//! - Punctuation replaced by whitespace
//! - Whitespace collapsed

use unicode_normalization::UnicodeNormalization;

/// Normalize a name for comparison.
///
/// # Examples
///
/// ```
/// use entity_matcher::utils::text::normalize_name;
///
/// assert_eq!(normalize_name("  DOE, John "), "doe john");
/// assert_eq!(normalize_name("Acme Ltd."), "acme ltd");
/// ```
#[must_use]
pub fn normalize_name(s: &str) -> String {
    let folded: String = s.nfkc().collect();
    let stripped: String = folded
        .chars()
        .flat_map(char::to_lowercase)
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Split a name into normalized tokens
#[must_use]
pub fn name_tokens(s: &str) -> Vec<String> {
    normalize_name(s)
        .split(' ')
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Sort the tokens of a normalized name so that "doe john" and "john doe"
/// compare equal.
#[must_use]
pub fn sorted_tokens(s: &str) -> String {
    let mut tokens = name_tokens(s);
    tokens.sort_unstable();
    tokens.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_unicode() {
        // Full-width characters fold to ASCII under NFKC
        assert_eq!(normalize_name("ＡＣＭＥ"), "acme");
        assert_eq!(normalize_name("Müller-Lüdenscheidt"), "müller lüdenscheidt");
        assert_eq!(normalize_name("..."), "");
    }

    #[test]
    fn test_name_tokens() {
        assert_eq!(name_tokens("John  Q. Public"), vec!["john", "q", "public"]);
        assert!(name_tokens("").is_empty());
    }

    #[test]
    fn test_sorted_tokens() {
        assert_eq!(sorted_tokens("Doe, John"), sorted_tokens("john doe"));
    }
}
