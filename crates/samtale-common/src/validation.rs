//! Boundary validation for request payloads.
//!
//! Requests are shape-checked here before any business logic or side effect
//! runs; handlers map failures to 400 responses.

pub const MIN_PASSWORD_LEN: usize = 6;
pub const OTP_LEN: usize = 6;

/// Normalize an email for storage and lookups: trimmed, lowercased.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Syntactic email check: one '@' with a non-empty local part and a domain
/// containing at least one '.' that is neither first nor last.
pub fn is_valid_email(email: &str) -> bool {
    let email = email.trim();
    if email.is_empty() || email.chars().any(|c| c.is_whitespace()) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    match domain.find('.') {
        Some(idx) => idx > 0 && !domain.ends_with('.'),
        None => false,
    }
}

/// Password policy: minimum length only.
pub fn is_valid_password(password: &str) -> bool {
    password.len() >= MIN_PASSWORD_LEN
}

/// OTP shape: exactly six ASCII digits.
pub fn is_valid_otp(code: &str) -> bool {
    code.len() == OTP_LEN && code.chars().all(|c| c.is_ascii_digit())
}

/// Prompt check: non-empty after trimming.
pub fn is_valid_prompt(prompt: &str) -> bool {
    !prompt.trim().is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Anna@Example.COM "), "anna@example.com");
    }

    #[test]
    fn test_valid_emails() {
        assert!(is_valid_email("user@example.com"));
        assert!(is_valid_email("first.last@sub.example.co"));
        assert!(is_valid_email("  padded@example.com  "));
    }

    #[test]
    fn test_invalid_emails() {
        assert!(!is_valid_email(""));
        assert!(!is_valid_email("no-at-sign.com"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("user@nodot"));
        assert!(!is_valid_email("user@.com"));
        assert!(!is_valid_email("user@example."));
        assert!(!is_valid_email("two@signs@example.com"));
        assert!(!is_valid_email("spa ce@example.com"));
    }

    #[test]
    fn test_password_policy() {
        assert!(is_valid_password("123456"));
        assert!(is_valid_password("a-much-longer-password"));
        assert!(!is_valid_password("12345"));
        assert!(!is_valid_password(""));
    }

    #[test]
    fn test_otp_shape() {
        assert!(is_valid_otp("000000"));
        assert!(is_valid_otp("493817"));
        assert!(!is_valid_otp("12345"));
        assert!(!is_valid_otp("1234567"));
        assert!(!is_valid_otp("12345a"));
        assert!(!is_valid_otp(""));
    }

    #[test]
    fn test_prompt_check() {
        assert!(is_valid_prompt("hello"));
        assert!(!is_valid_prompt(""));
        assert!(!is_valid_prompt("   \n\t "));
    }
}
