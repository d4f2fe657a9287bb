use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::error::{ErrorMessage, HttpError};

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenClaims {
    pub sub: String,
    pub iat: usize,
    pub exp: usize,
}

/// `expires_in_minutes` matches JWT_MAXAGE.
pub fn create_token(
    user_id: &str,
    secret: &[u8],
    expires_in_minutes: i64,
) -> Result<String, jsonwebtoken::errors::Error> {
    if user_id.is_empty() {
        return Err(jsonwebtoken::errors::ErrorKind::InvalidSubject.into());
    }

    let now = Utc::now();
    let iat = now.timestamp() as usize;
    let exp = (now + Duration::minutes(expires_in_minutes)).timestamp() as usize;
    let claims = TokenClaims {
        sub: user_id.to_string(),
        iat,
        exp,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret),
    )
}

pub fn decode_token<T: Into<String>>(token: T, secret: &[u8]) -> Result<String, HttpError> {
    let decoded = decode::<TokenClaims>(
        &token.into(),
        &DecodingKey::from_secret(secret),
        &Validation::new(Algorithm::HS256),
    );

    match decoded {
        Ok(token) => Ok(token.claims.sub),
        Err(_) => Err(HttpError::unauthorized(ErrorMessage::InvalidToken.to_string())),
    }
}

/// Remaining lifetime of a valid token in seconds, used for the logout blacklist TTL.
pub fn remaining_lifetime(token: &str, secret: &[u8]) -> Option<i64> {
    let data = decode::<TokenClaims>(
        token,
        &DecodingKey::from_secret(secret),
        &Validation::new(Algorithm::HS256),
    )
    .ok()?;
    let remaining = data.claims.exp as i64 - Utc::now().timestamp();
    (remaining > 0).then_some(remaining)
}

/// Signs arbitrary claims; the caller's struct must carry its own `exp`.
pub fn sign_claims<T: Serialize>(claims: &T, secret: &[u8]) -> Result<String, jsonwebtoken::errors::Error> {
    encode(&Header::default(), claims, &EncodingKey::from_secret(secret))
}

pub fn verify_claims<T: DeserializeOwned>(token: &str, secret: &[u8]) -> Result<T, HttpError> {
    decode::<T>(
        token,
        &DecodingKey::from_secret(secret),
        &Validation::new(Algorithm::HS256),
    )
    .map(|data| data.claims)
    .map_err(|_| HttpError::unauthorized(ErrorMessage::InvalidToken.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_decode_token() {
        let secret = b"my-secret-key";
        let token = create_token("7c8f0f0e-0000-4000-8000-000000000001", secret, 60).unwrap();
        let sub = decode_token(token.clone(), secret).unwrap();
        assert_eq!(sub, "7c8f0f0e-0000-4000-8000-000000000001");

        let remaining = remaining_lifetime(&token, secret).unwrap();
        assert!(remaining > 3500 && remaining <= 3600);
    }

    #[test]
    fn test_decode_with_wrong_secret_fails() {
        let token = create_token("user", b"secret-a", 60).unwrap();
        let err = decode_token(token, b"secret-b").unwrap_err();
        assert_eq!(err.status, axum::http::StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_expired_token_rejected() {
        let token = create_token("user", b"secret", -10).unwrap();
        assert!(decode_token(token.clone(), b"secret").is_err());
        assert!(remaining_lifetime(&token, b"secret").is_none());
    }

    #[test]
    fn test_empty_subject_rejected() {
        assert!(create_token("", b"secret", 60).is_err());
    }
}
