//! Identity normalization
//!
//! Canonicalizes free-text identity fields into keys that can be compared for
//! equality. Every function here is pure, total and idempotent.

use std::collections::HashSet;

/// Separators accepted inside multi-value email and phone fields
const LIST_DELIMITERS: [char; 3] = [',', ';', '\n'];

/// Trim and lowercase; absent input yields an empty key
pub fn normalize_text(s: &str) -> String {
    s.trim().to_lowercase()
}

/// Normalize a single email address
pub fn normalize_email(s: &str) -> String {
    normalize_text(s)
}

/// Reduce a phone number to its 10-digit national form
///
/// Non-digits are stripped, a leading `1` country code is dropped from an
/// 11-digit number, and anything past 10 digits (an extension) is discarded.
pub fn normalize_phone(s: &str) -> String {
    let mut digits: String = s.chars().filter(|c| c.is_ascii_digit()).collect();

    if digits.len() == 11 && digits.starts_with('1') {
        digits.remove(0);
    }
    if digits.len() > 10 {
        digits.truncate(10);
    }

    digits
}

/// Split a delimited field into trimmed, non-empty entries
pub fn split_list(s: &str) -> Vec<&str> {
    s.split(&LIST_DELIMITERS[..])
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .collect()
}

/// Normalize every entry of a delimited email field, first occurrence wins
pub fn normalize_email_list(s: &str) -> Vec<String> {
    normalize_list(s, normalize_email)
}

/// Normalize every entry of a delimited phone field, first occurrence wins
pub fn normalize_phone_list(s: &str) -> Vec<String> {
    normalize_list(s, normalize_phone)
}

fn normalize_list(s: &str, normalize: fn(&str) -> String) -> Vec<String> {
    let mut seen = HashSet::new();
    split_list(s)
        .into_iter()
        .map(normalize)
        .filter(|key| !key.is_empty() && seen.insert(key.clone()))
        .collect()
}

/// Phone keys shorter than this never participate in matching
pub const MIN_PHONE_DIGITS: usize = 10;

/// True when a normalized phone key is long enough to identify someone
pub fn is_matchable_phone(key: &str) -> bool {
    key.len() >= MIN_PHONE_DIGITS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_text_trims_and_lowercases() {
        assert_eq!(normalize_text("  Acme Corp  "), "acme corp");
        assert_eq!(normalize_text(""), "");
        assert_eq!(normalize_text("   "), "");
    }

    #[test]
    fn test_normalize_text_and_email_idempotent() {
        for input in ["  John DOE ", "J@Acme.COM", "", "\tMixed Case\n"] {
            let once = normalize_text(input);
            assert_eq!(normalize_text(&once), once);

            let once = normalize_email(input);
            assert_eq!(normalize_email(&once), once);
        }
    }

    #[test]
    fn test_normalize_phone_country_code_and_punctuation() {
        assert_eq!(normalize_phone("+1-555-123-4567"), "5551234567");
        assert_eq!(normalize_phone("555.123.4567"), "5551234567");
        assert_eq!(normalize_phone("(555) 123-4567"), "5551234567");
    }

    #[test]
    fn test_normalize_phone_drops_extension() {
        assert_eq!(normalize_phone("555-123-4567 x89"), "5551234567");
    }

    #[test]
    fn test_normalize_phone_short_and_empty() {
        assert_eq!(normalize_phone(""), "");
        assert_eq!(normalize_phone("ext"), "");
        assert_eq!(normalize_phone("123-4567"), "1234567");
        assert!(!is_matchable_phone(&normalize_phone("123-4567")));
    }

    #[test]
    fn test_normalize_phone_eleven_digits_without_country_code() {
        // Only a leading 1 is a country code; otherwise the 11th digit is extension
        assert_eq!(normalize_phone("25551234567"), "2555123456");
    }

    #[test]
    fn test_normalize_phone_idempotent() {
        for input in ["+1 (555) 123-4567", "555-123-4567 x89", "1234", ""] {
            let once = normalize_phone(input);
            assert_eq!(normalize_phone(&once), once);
        }
    }

    #[test]
    fn test_split_list_accepts_all_delimiters() {
        assert_eq!(
            split_list("a@x.com, b@x.com;c@x.com\n ,d@x.com"),
            vec!["a@x.com", "b@x.com", "c@x.com", "d@x.com"]
        );
        assert!(split_list("").is_empty());
    }

    #[test]
    fn test_normalize_lists_dedupe_by_key() {
        assert_eq!(
            normalize_email_list("J@Acme.com; j@acme.com ,Ops@Acme.com"),
            vec!["j@acme.com", "ops@acme.com"]
        );
        assert_eq!(
            normalize_phone_list("555-123-4567, +1 555 123 4567; ()"),
            vec!["5551234567"]
        );
    }
}
