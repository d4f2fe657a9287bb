use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::{config::Config, utils::token};

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v3/userinfo";
const REGISTRATION_TOKEN_MINUTES: i64 = 15;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GoogleUserInfo {
    pub sub: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub picture: Option<String>,
    #[serde(default)]
    pub email_verified: bool,
}

/// Claims of the short-lived token handed out when a Google account has no local user yet.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct PendingGoogleRegistration {
    pub google_id: String,
    pub email: String,
    pub name: Option<String>,
    pub email_verified: bool,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Error)]
pub enum OAuthError {
    #[error("HTTP request error: {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("Token exchange error: {0}")]
    TokenExchange(String),
    #[error("User info error: {0}")]
    UserInfo(String),
    #[error("Registration token error: {0}")]
    RegistrationToken(#[from] jsonwebtoken::errors::Error),
}

#[derive(Debug, Clone)]
pub struct GoogleAuthService {
    http: reqwest::Client,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
}

impl GoogleAuthService {
    pub fn new(config: &Config, http: reqwest::Client) -> Self {
        Self {
            http,
            client_id: config.google_client_id.clone(),
            client_secret: config.google_client_secret.clone(),
            redirect_uri: config.google_redirect_uri.clone(),
        }
    }

    pub fn get_authorization_url(&self, state: &str) -> String {
        format!(
            "{}?client_id={}&response_type=code&scope=openid%20email%20profile&redirect_uri={}&state={}&access_type=offline&prompt=select_account",
            GOOGLE_AUTH_URL,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.redirect_uri),
            urlencoding::encode(state),
        )
    }

    /// Exchanges the authorization code for an access token.
    pub async fn exchange_code(&self, code: &str) -> Result<String, OAuthError> {
        let params = [
            ("code", code),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
        ];

        let response = self
            .http
            .post(GOOGLE_TOKEN_URL)
            .timeout(Duration::from_secs(15))
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(OAuthError::TokenExchange(format!("HTTP {} - {}", status, error_text)));
        }

        let token_response: Value = response.json().await?;

        token_response["access_token"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| OAuthError::TokenExchange("Access token missing from response".to_string()))
    }

    pub async fn get_user_info(&self, access_token: &str) -> Result<GoogleUserInfo, OAuthError> {
        let response = self
            .http
            .get(GOOGLE_USERINFO_URL)
            .bearer_auth(access_token)
            .timeout(Duration::from_secs(15))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(OAuthError::UserInfo(format!("HTTP {} - {}", status, error_text)));
        }

        let info: GoogleUserInfo = response.json().await?;
        if info.sub.trim().is_empty() || info.email.as_deref().map_or(true, |e| e.trim().is_empty()) {
            return Err(OAuthError::UserInfo("Google profile is missing id or email".to_string()));
        }
        Ok(info)
    }
}

pub fn registration_token(info: &GoogleUserInfo, secret: &[u8]) -> Result<String, OAuthError> {
    let now = Utc::now().timestamp();
    let claims = PendingGoogleRegistration {
        google_id: info.sub.clone(),
        email: info.email.clone().unwrap_or_default(),
        name: info.name.clone(),
        email_verified: info.email_verified,
        iat: now,
        exp: now + REGISTRATION_TOKEN_MINUTES * 60,
    };
    Ok(token::sign_claims(&claims, secret)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> GoogleAuthService {
        GoogleAuthService::new(&Config::test_config(), reqwest::Client::new())
    }

    #[test]
    fn test_authorization_url() {
        let url = service().get_authorization_url("abc123");
        assert!(url.starts_with(GOOGLE_AUTH_URL));
        assert!(url.contains("client_id=client-id"));
        assert!(url.contains("state=abc123"));
        assert!(url.contains("prompt=select_account"));
        assert!(url.contains("redirect_uri=http%3A%2F%2Flocalhost%3A8000%2Fapi%2Foauth%2Fgoogle%2Fcallback"));
    }

    #[test]
    fn test_registration_token_round_trip() {
        let info = GoogleUserInfo {
            sub: "google-123".into(),
            email: Some("asha@example.com".into()),
            name: Some("Asha".into()),
            picture: None,
            email_verified: true,
        };
        let token = registration_token(&info, b"test-secret").unwrap();
        let claims: PendingGoogleRegistration = token::verify_claims(&token, b"test-secret").unwrap();
        assert_eq!(claims.google_id, "google-123");
        assert_eq!(claims.email, "asha@example.com");
        assert!(claims.email_verified);
        assert_eq!(claims.exp - claims.iat, 15 * 60);

        assert!(token::verify_claims::<PendingGoogleRegistration>(&token, b"other").is_err());
    }
}
