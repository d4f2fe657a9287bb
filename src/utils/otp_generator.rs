// utils/otp_generator.rs
use chrono::{DateTime, Duration, Utc};
use rand::distr::Alphanumeric;
use rand::Rng;

pub const OTP_VALIDITY_SECONDS: i64 = 300;

pub fn generate_otp() -> String {
    let mut rng = rand::rng();
    format!("{:06}", rng.random_range(100000..=999999))
}

pub fn otp_expiry_from(now: DateTime<Utc>) -> DateTime<Utc> {
    now + Duration::seconds(OTP_VALIDITY_SECONDS)
}

/// 40 character alphanumeric token for email verification and password reset links.
pub fn generate_secure_token() -> String {
    let mut rng = rand::rng();
    (0..40)
        .map(|_| rng.sample(Alphanumeric) as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_otp_is_six_digits() {
        for _ in 0..50 {
            let otp = generate_otp();
            assert_eq!(otp.len(), 6);
            assert!(otp.chars().all(|c| c.is_ascii_digit()));
            assert!(!otp.starts_with('0'));
        }
    }

    #[test]
    fn test_secure_token_shape() {
        let token = generate_secure_token();
        assert_eq!(token.len(), 40);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(token, generate_secure_token());
    }
}
