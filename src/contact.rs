/// Contact-channel sanitizers shared by every intake path.
///
/// Phone normalization is the uniqueness key for leads, so the
/// webhook, the web form and the list filter all funnel through the
/// same function here.
use crate::errors::AppError;
use regex::Regex;

/// Normalizes a raw phone string into the canonical `+<digits>` form.
///
/// Steps:
/// 1. Strip every non-digit (handles `+`, spaces, dashes, dots,
///    parentheses)
/// 2. If the digits already start with the country calling code,
///    keep them as-is
/// 3. Otherwise, if there are at least 10 digits (national number
///    with area code), prefix the country code
/// 4. Otherwise keep the bare digits
///
/// The result always starts with `+`. Normalizing an already
/// normalized number returns it unchanged.
///
/// # Arguments
/// * `raw` - Phone as received from the provider or form
/// * `country_code` - Default country calling code, digits only
///
/// # Returns
/// * The normalized phone, or `AppError::BadRequest` when fewer than
///   8 characters remain after normalization
pub fn normalize_phone(raw: &str, country_code: &str) -> Result<String, AppError> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();

    let normalized = if digits.starts_with(country_code) {
        format!("+{digits}")
    } else if digits.len() >= 10 {
        format!("+{country_code}{digits}")
    } else {
        format!("+{digits}")
    };

    if normalized.len() < 8 {
        tracing::warn!("❌ Phone too short after normalization: '{}'", raw);
        return Err(AppError::BadRequest(format!(
            "phone number '{raw}' is too short"
        )));
    }

    Ok(normalized)
}

/// Validate email address
///
/// Checks for:
/// - Basic email format (contains @ and .)
/// - Fake/placeholder patterns (repeated digits like 9999, 1111)
/// - Minimum length requirements
/// - Valid domain structure
pub fn is_valid_email(email: &str) -> bool {
    // Basic checks
    if email.len() < 5 || !email.contains('@') || !email.contains('.') {
        return false;
    }

    // Detect fake patterns (repeated digits)
    let fake_patterns = [
        "999999",    // Common fake: 1199999999333@gmail.com
        "111111",    // Common fake: 1111111111@
        "000000",    // Common fake: 000000@
        "123456789", // Sequential fake
    ];

    for pattern in &fake_patterns {
        if email.contains(pattern) {
            tracing::warn!(
                "❌ Invalid email detected (fake pattern '{}'): {}",
                pattern,
                email
            );
            return false;
        }
    }

    // RFC 5322 simplified email regex
    // Matches: local@domain.tld
    let email_regex = Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$"
    ).unwrap();

    if !email_regex.is_match(email) {
        tracing::warn!("❌ Invalid email format: {}", email);
        return false;
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;

    mod phone {
        use super::*;

        #[test]
        fn national_number_gains_country_code() {
            let normalized = normalize_phone("61999990000", "55").unwrap();
            assert_eq!(normalized, "+5561999990000");
        }

        #[test]
        fn formatting_characters_are_stripped() {
            let normalized = normalize_phone("+55 (61) 99999-0000", "55").unwrap();
            assert_eq!(normalized, "+5561999990000");
        }

        #[test]
        fn already_normalized_is_unchanged() {
            let first = normalize_phone("+5561999990000", "55").unwrap();
            let second = normalize_phone(&first, "55").unwrap();
            assert_eq!(first, second);
            assert_eq!(second, "+5561999990000");
        }

        #[test]
        fn short_international_number_keeps_bare_digits() {
            // 9 digits, no country code match: too short to assume a
            // national number, kept as-is
            let normalized = normalize_phone("123456789", "55").unwrap();
            assert_eq!(normalized, "+123456789");
        }

        #[test]
        fn too_short_is_rejected() {
            assert!(normalize_phone("12345", "55").is_err());
            assert!(normalize_phone("", "55").is_err());
            assert!(normalize_phone("abc", "55").is_err());
        }

        #[test]
        fn country_code_prefixed_digits_are_kept() {
            let normalized = normalize_phone("5511988887777", "55").unwrap();
            assert_eq!(normalized, "+5511988887777");
        }

        #[test]
        fn other_country_code_config() {
            let normalized = normalize_phone("2025550123", "1").unwrap();
            assert_eq!(normalized, "+12025550123");
            let again = normalize_phone(&normalized, "1").unwrap();
            assert_eq!(again, "+12025550123");
        }
    }

    mod email {
        use super::*;

        #[test]
        fn accepts_normal_addresses() {
            assert!(is_valid_email("joao.silva@example.com"));
            assert!(is_valid_email("maria+imovel@broker.com.br"));
        }

        #[test]
        fn rejects_structurally_broken_addresses() {
            assert!(!is_valid_email("a@b"));
            assert!(!is_valid_email("no-at-sign.com"));
            assert!(!is_valid_email("spaces in@example.com"));
            assert!(!is_valid_email(""));
        }

        #[test]
        fn rejects_fake_patterns() {
            assert!(!is_valid_email("1199999999333@gmail.com"));
            assert!(!is_valid_email("111111@test.com"));
            assert!(!is_valid_email("000000@test.com"));
            assert!(!is_valid_email("123456789@test.com"));
        }
    }
}
