//! SQL utility functions

use std::sync::OnceLock;

/// Maximum identifier length accepted across all supported backends (MySQL caps at 64)
pub const MAX_IDENTIFIER_LEN: usize = 64;

/// Check that a string is a plain, unquoted SQL identifier.
///
/// Table names are interpolated into statements (they cannot be bound), so only
/// ASCII letters, digits and underscores are accepted and the first character
/// must not be a digit.
///
/// # Example
///
/// ```
/// use promsql_bridge::utils::sql::is_plain_identifier;
///
/// assert!(is_plain_identifier("monitoring"));
/// assert!(!is_plain_identifier("monitoring; DROP TABLE x"));
/// ```
pub fn is_plain_identifier(s: &str) -> bool {
    static RE_IDENT: OnceLock<regex::Regex> = OnceLock::new();
    let re = RE_IDENT.get_or_init(|| {
        regex::Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,63}$").expect("Invalid regex")
    });
    re.is_match(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_identifier_accepts_simple_names() {
        assert!(is_plain_identifier("monitoring"));
        assert!(is_plain_identifier("_samples"));
        assert!(is_plain_identifier("Samples_2024"));
    }

    #[test]
    fn test_plain_identifier_rejects_leading_digit() {
        assert!(!is_plain_identifier("2024_samples"));
    }

    #[test]
    fn test_plain_identifier_rejects_punctuation() {
        assert!(!is_plain_identifier("monitoring;"));
        assert!(!is_plain_identifier("a.b"));
        assert!(!is_plain_identifier("a b"));
        assert!(!is_plain_identifier("`monitoring`"));
        assert!(!is_plain_identifier("\"monitoring\""));
    }

    #[test]
    fn test_plain_identifier_length_limit() {
        let max = "a".repeat(MAX_IDENTIFIER_LEN);
        let over = "a".repeat(MAX_IDENTIFIER_LEN + 1);
        assert!(is_plain_identifier(&max));
        assert!(!is_plain_identifier(&over));
    }

    #[test]
    fn test_plain_identifier_empty() {
        assert!(!is_plain_identifier(""));
    }
}
