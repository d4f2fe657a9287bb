use std::borrow::Cow;

use validator::ValidationError;

const INDIAN_MOBILE_PATTERN: &str = r"^(\+91[\-\s]?)?[6-9]\d{9}$";
const GOOGLE_SIGNUP_PHONE_PATTERN: &str = r"^\+?91[ -]?\d{10}$";

fn matches(pattern: &str, value: &str) -> bool {
    regex::Regex::new(pattern)
        .map(|re| re.is_match(value))
        .unwrap_or(false)
}

pub fn is_indian_mobile(phone: &str) -> bool {
    matches(INDIAN_MOBILE_PATTERN, phone.trim())
}

pub fn validate_indian_phone(phone: &str) -> Result<(), ValidationError> {
    if !is_indian_mobile(phone) {
        let mut error = ValidationError::new("invalid_phone");
        error.message = Some(Cow::from(
            "Please enter a valid 10-digit Indian mobile number (optionally with +91)",
        ));
        return Err(error);
    }
    Ok(())
}

pub fn validate_google_signup_phone(phone: &str) -> Result<(), ValidationError> {
    if phone.trim().is_empty() {
        return Ok(());
    }
    if !matches(GOOGLE_SIGNUP_PHONE_PATTERN, phone.trim()) {
        let mut error = ValidationError::new("invalid_phone");
        error.message = Some(Cow::from("Phone number must look like +91XXXXXXXXXX"));
        return Err(error);
    }
    Ok(())
}

/// IVR keypad input: exactly 10 digits, stored with the +91 prefix.
pub fn normalize_ivr_digits(digits: &str) -> Option<String> {
    let digits = digits.trim();
    if digits.len() == 10 && digits.chars().all(|c| c.is_ascii_digit()) {
        Some(format!("+91{}", digits))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indian_mobile_numbers() {
        assert!(is_indian_mobile("9876543210"));
        assert!(is_indian_mobile("+919876543210"));
        assert!(is_indian_mobile("+91-9876543210"));
        assert!(is_indian_mobile("+91 6876543210"));
        assert!(!is_indian_mobile("5876543210"));
        assert!(!is_indian_mobile("98765"));
        assert!(!is_indian_mobile("+1 9876543210"));
        assert!(validate_indian_phone("12345").is_err());
    }

    #[test]
    fn test_google_signup_phone() {
        assert!(validate_google_signup_phone("+919876543210").is_ok());
        assert!(validate_google_signup_phone("91 1234567890").is_ok());
        assert!(validate_google_signup_phone("").is_ok());
        assert!(validate_google_signup_phone("9876543210").is_err());
    }

    #[test]
    fn test_normalize_ivr_digits() {
        assert_eq!(normalize_ivr_digits("9876543210").as_deref(), Some("+919876543210"));
        assert_eq!(normalize_ivr_digits("987654321"), None);
        assert_eq!(normalize_ivr_digits("98765432a0"), None);
    }
}
