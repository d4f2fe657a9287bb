// service/razorpay.rs
use std::time::Duration;

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use sqlx::types::BigDecimal;
use subtle::ConstantTimeEq;
use thiserror::Error;
use uuid::Uuid;

use crate::{config::Config, utils::currency::rupees_to_paise};

const RAZORPAY_API: &str = "https://api.razorpay.com/v1";
const MIN_ORDER_PAISE: i64 = 100;

#[derive(Error, Debug)]
pub enum RazorpayError {
    #[error("Amount must be at least ₹1")]
    AmountTooSmall,

    #[error("Razorpay request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Razorpay error: {0}")]
    Api(String),
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OrderNotes {
    pub job_id: Uuid,
    pub employer_id: Uuid,
    pub worker_id: Uuid,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RazorpayOrder {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    pub receipt: Option<String>,
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RazorpayPayment {
    pub id: String,
    pub amount: i64,
    pub status: String,
    pub order_id: Option<String>,
    pub created_at: i64,
    #[serde(default)]
    pub notes: serde_json::Value,
}

impl RazorpayPayment {
    /// Reads a UUID out of the order notes; Razorpay sends `[]` when notes are empty.
    pub fn note_uuid(&self, key: &str) -> Option<Uuid> {
        self.notes
            .get(key)
            .and_then(|v| v.as_str())
            .and_then(|s| Uuid::parse_str(s).ok())
    }

    pub fn belongs_to_order(&self, order_id: &str) -> bool {
        self.order_id.as_deref() == Some(order_id)
    }

    pub fn order_notes(&self) -> Option<OrderNotes> {
        Some(OrderNotes {
            job_id: self.note_uuid("job_id")?,
            employer_id: self.note_uuid("employer_id")?,
            worker_id: self.note_uuid("worker_id")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct RazorpayClient {
    http: reqwest::Client,
    api_base: String,
    key_id: String,
    key_secret: String,
}

impl RazorpayClient {
    pub fn new(config: &Config, http: reqwest::Client) -> Self {
        Self {
            http,
            api_base: RAZORPAY_API.to_string(),
            key_id: config.razorpay_key_id.clone(),
            key_secret: config.razorpay_key_secret.clone(),
        }
    }

    #[cfg(test)]
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    pub async fn create_order(
        &self,
        amount: &BigDecimal,
        notes: &OrderNotes,
    ) -> Result<RazorpayOrder, RazorpayError> {
        let amount_paise = rupees_to_paise(amount);
        if amount_paise < MIN_ORDER_PAISE {
            return Err(RazorpayError::AmountTooSmall);
        }

        let payload = serde_json::json!({
            "amount": amount_paise,
            "currency": "INR",
            "receipt": format!("job_{}_{}", notes.job_id, chrono::Utc::now().timestamp()),
            "payment_capture": 1,
            "notes": notes,
        });

        let response = self
            .http
            .post(format!("{}/orders", self.api_base))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .timeout(Duration::from_secs(15))
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        let body: serde_json::Value = response.json().await?;

        if !status.is_success() {
            return Err(RazorpayError::Api(gateway_error_description(&body)));
        }

        serde_json::from_value(body).map_err(|e| RazorpayError::Api(e.to_string()))
    }

    pub async fn fetch_payment(&self, payment_id: &str) -> Result<RazorpayPayment, RazorpayError> {
        let response = self
            .http
            .get(format!("{}/payments/{}", self.api_base, urlencoding::encode(payment_id)))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .timeout(Duration::from_secs(15))
            .send()
            .await?;

        let status = response.status();
        let body: serde_json::Value = response.json().await?;

        if !status.is_success() {
            return Err(RazorpayError::Api(gateway_error_description(&body)));
        }

        serde_json::from_value(body).map_err(|e| RazorpayError::Api(e.to_string()))
    }

    pub fn verify_signature(&self, order_id: &str, payment_id: &str, signature: &str) -> bool {
        verify_payment_signature(&self.key_secret, order_id, payment_id, signature)
    }
}

fn gateway_error_description(body: &serde_json::Value) -> String {
    body["error"]["description"]
        .as_str()
        .unwrap_or("Payment gateway request failed")
        .to_string()
}

pub fn hmac_sha256_hex(secret: &str, message: &str) -> String {
    type HmacSha256 = Hmac<Sha256>;

    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(message.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Checks `razorpay_signature` against HMAC-SHA256("{order_id}|{payment_id}").
pub fn verify_payment_signature(secret: &str, order_id: &str, payment_id: &str, signature: &str) -> bool {
    let expected = hmac_sha256_hex(secret, &format!("{}|{}", order_id, payment_id));
    if expected.is_empty() || expected.len() != signature.len() {
        return false;
    }
    expected.as_bytes().ct_eq(signature.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hmac_known_vector() {
        assert_eq!(
            hmac_sha256_hex("key", "The quick brown fox jumps over the lazy dog"),
            "f7bc83f430538424b13298e6aa6fb143ef4d59a14946175997479dbc2d1a3cd8"
        );
    }

    #[test]
    fn test_verify_payment_signature() {
        let secret = "rzp_test_secret";
        let signature = hmac_sha256_hex(secret, "order_9A33XWu170gUtm|pay_29QQoUBi66xm2f");

        assert!(verify_payment_signature(secret, "order_9A33XWu170gUtm", "pay_29QQoUBi66xm2f", &signature));
        assert!(!verify_payment_signature(secret, "order_9A33XWu170gUtm", "pay_other", &signature));
        assert!(!verify_payment_signature("wrong", "order_9A33XWu170gUtm", "pay_29QQoUBi66xm2f", &signature));
        assert!(!verify_payment_signature(secret, "order_9A33XWu170gUtm", "pay_29QQoUBi66xm2f", ""));
    }

    #[test]
    fn test_signature_is_case_sensitive_hex() {
        let secret = "s3cret";
        let signature = hmac_sha256_hex(secret, "o|p").to_uppercase();
        assert!(!verify_payment_signature(secret, "o", "p", &signature));
    }

    #[test]
    fn test_order_notes_from_payment() {
        let job_id = Uuid::new_v4();
        let employer_id = Uuid::new_v4();
        let worker_id = Uuid::new_v4();
        let payment = RazorpayPayment {
            id: "pay_1".into(),
            amount: 50000,
            status: "captured".into(),
            order_id: Some("order_1".into()),
            created_at: 1_700_000_000,
            notes: serde_json::json!({
                "job_id": job_id.to_string(),
                "employer_id": employer_id.to_string(),
                "worker_id": worker_id.to_string(),
            }),
        };
        let notes = payment.order_notes().unwrap();
        assert_eq!(notes.job_id, job_id);
        assert_eq!(notes.worker_id, worker_id);

        let empty = RazorpayPayment {
            notes: serde_json::json!([]),
            ..payment
        };
        assert!(empty.order_notes().is_none());
    }

    #[tokio::test]
    async fn test_create_order_rejects_sub_rupee_amounts() {
        let client = RazorpayClient::new(&Config::test_config(), reqwest::Client::new());
        let notes = OrderNotes {
            job_id: Uuid::new_v4(),
            employer_id: Uuid::new_v4(),
            worker_id: Uuid::new_v4(),
        };
        let amount: BigDecimal = "0.50".parse().unwrap();
        let result = client.create_order(&amount, &notes).await;
        assert!(matches!(result, Err(RazorpayError::AmountTooSmall)));
    }
}
