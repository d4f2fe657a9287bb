// service/twilio.rs
use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::Config;

const TWILIO_API: &str = "https://api.twilio.com/2010-04-01";
const TWILIO_VIDEO_API: &str = "https://video.twilio.com/v1";
const ACCESS_TOKEN_TTL_SECONDS: i64 = 3600;

#[derive(Error, Debug)]
pub enum TwilioError {
    #[error("Twilio request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Twilio error: {0}")]
    Api(String),

    #[error("Could not sign access token: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct OutgoingGrant {
    pub application_sid: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct IncomingGrant {
    pub allow: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct VoiceGrant {
    pub outgoing: OutgoingGrant,
    pub incoming: IncomingGrant,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Grants {
    pub identity: String,
    pub voice: VoiceGrant,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AccessTokenClaims {
    pub jti: String,
    pub iss: String,
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
    pub grants: Grants,
}

#[derive(Debug, Deserialize)]
struct MessageResource {
    sid: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Room {
    pub sid: String,
    pub unique_name: Option<String>,
    pub status: String,
}

#[derive(Debug, Clone)]
pub struct TwilioClient {
    http: reqwest::Client,
    account_sid: String,
    auth_token: String,
    phone_number: String,
    whatsapp_number: String,
    api_key: String,
    api_secret: String,
    twiml_app_sid: String,
}

impl TwilioClient {
    pub fn new(config: &Config, http: reqwest::Client) -> Self {
        Self {
            http,
            account_sid: config.twilio_account_sid.clone(),
            auth_token: config.twilio_auth_token.clone(),
            phone_number: config.twilio_phone_number.clone(),
            whatsapp_number: config.twilio_whatsapp_number.clone(),
            api_key: config.twilio_api_key.clone(),
            api_secret: config.twilio_api_secret.clone(),
            twiml_app_sid: config.twilio_twiml_app_sid.clone(),
        }
    }

    /// Sends an SMS and returns the message SID; failures are logged and yield None.
    pub async fn send_sms(&self, to: &str, body: &str) -> Option<String> {
        match self.create_message(to, &self.phone_number, body).await {
            Ok(sid) => {
                tracing::info!("SMS sent to {} (sid {})", to, sid);
                Some(sid)
            }
            Err(e) => {
                tracing::error!("SMS sending to {} failed: {}", to, e);
                None
            }
        }
    }

    pub async fn send_whatsapp(&self, to: &str, body: &str) -> Option<String> {
        let to = format!("whatsapp:{}", to);
        let from = format!("whatsapp:{}", self.whatsapp_number);
        match self.create_message(&to, &from, body).await {
            Ok(sid) => Some(sid),
            Err(e) => {
                tracing::error!("WhatsApp message to {} failed: {}", to, e);
                None
            }
        }
    }

    async fn create_message(&self, to: &str, from: &str, body: &str) -> Result<String, TwilioError> {
        let url = format!("{}/Accounts/{}/Messages.json", TWILIO_API, self.account_sid);
        let response = self
            .http
            .post(url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .timeout(Duration::from_secs(15))
            .form(&[("To", to), ("From", from), ("Body", body)])
            .send()
            .await?;

        if !response.status().is_success() {
            let body: serde_json::Value = response.json().await.unwrap_or_default();
            return Err(TwilioError::Api(
                body["message"].as_str().unwrap_or("message was not accepted").to_string(),
            ));
        }

        let message: MessageResource = response.json().await?;
        Ok(message.sid)
    }

    pub fn access_token_claims(&self, identity: &str, now: i64) -> AccessTokenClaims {
        AccessTokenClaims {
            jti: format!("{}-{}", self.api_key, now),
            iss: self.api_key.clone(),
            sub: self.account_sid.clone(),
            iat: now,
            exp: now + ACCESS_TOKEN_TTL_SECONDS,
            grants: Grants {
                identity: identity.to_string(),
                voice: VoiceGrant {
                    outgoing: OutgoingGrant {
                        application_sid: self.twiml_app_sid.clone(),
                    },
                    incoming: IncomingGrant { allow: true },
                },
            },
        }
    }

    /// Voice access token for the browser client.
    pub fn access_token(&self, identity: &str) -> Result<String, TwilioError> {
        let claims = self.access_token_claims(identity, Utc::now().timestamp());

        let mut header = Header::new(Algorithm::HS256);
        header.cty = Some("twilio-fpa;v=1".to_string());

        let token = encode(
            &header,
            &claims,
            &EncodingKey::from_secret(self.api_secret.as_bytes()),
        )?;
        Ok(token)
    }

    pub async fn create_room(&self, room_name: &str) -> Result<Room, TwilioError> {
        let response = self
            .http
            .post(format!("{}/Rooms", TWILIO_VIDEO_API))
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .timeout(Duration::from_secs(15))
            .form(&[
                ("UniqueName", room_name),
                ("Type", "peer-to-peer"),
                ("RecordParticipantsOnConnect", "false"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let body: serde_json::Value = response.json().await.unwrap_or_default();
            return Err(TwilioError::Api(
                body["message"].as_str().unwrap_or("room could not be created").to_string(),
            ));
        }

        Ok(response.json::<Room>().await?)
    }

    /// Room status; any failure reads as `completed`.
    pub async fn room_status(&self, room_sid: &str) -> String {
        let result = async {
            let response = self
                .http
                .get(format!("{}/Rooms/{}", TWILIO_VIDEO_API, urlencoding::encode(room_sid)))
                .basic_auth(&self.account_sid, Some(&self.auth_token))
                .timeout(Duration::from_secs(15))
                .send()
                .await?
                .error_for_status()?;
            response.json::<Room>().await
        }
        .await;

        match result {
            Ok(room) => room.status,
            Err(e) => {
                tracing::warn!("Room status lookup for {} failed: {}", room_sid, e);
                "completed".to_string()
            }
        }
    }

    /// Downloads a call recording as WAV.
    pub async fn download_recording(&self, recording_url: &str) -> Result<Vec<u8>, TwilioError> {
        let response = self
            .http
            .get(format!("{}.wav", recording_url))
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .timeout(Duration::from_secs(15))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(TwilioError::Api(format!(
                "recording download returned {}",
                response.status()
            )));
        }

        Ok(response.bytes().await?.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{decode, decode_header, DecodingKey, Validation};

    fn client() -> TwilioClient {
        TwilioClient::new(&Config::test_config(), reqwest::Client::new())
    }

    #[test]
    fn test_access_token_claims() {
        let claims = client().access_token_claims("user_42", 1_700_000_000);
        assert_eq!(claims.iss, "SK_test");
        assert_eq!(claims.sub, "AC_test");
        assert_eq!(claims.jti, "SK_test-1700000000");
        assert_eq!(claims.exp - claims.iat, 3600);
        assert_eq!(claims.grants.identity, "user_42");
        assert_eq!(claims.grants.voice.outgoing.application_sid, "AP_test");
        assert!(claims.grants.voice.incoming.allow);
    }

    #[test]
    fn test_access_token_is_signed_with_api_secret() {
        let token = client().access_token("user_7").unwrap();

        let header = decode_header(&token).unwrap();
        assert_eq!(header.alg, Algorithm::HS256);
        assert_eq!(header.cty.as_deref(), Some("twilio-fpa;v=1"));

        let decoded = decode::<AccessTokenClaims>(
            &token,
            &DecodingKey::from_secret(b"api_secret_test"),
            &Validation::new(Algorithm::HS256),
        )
        .unwrap();
        assert_eq!(decoded.claims.grants.identity, "user_7");
    }
}
