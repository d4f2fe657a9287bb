use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::BigDecimal;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq)]
#[sqlx(type_name = "payment_method", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Razorpay,
    Cash,
    BankTransfer,
}

impl PaymentMethod {
    pub fn to_str(&self) -> &str {
        match self {
            PaymentMethod::Razorpay => "razorpay",
            PaymentMethod::Cash => "cash",
            PaymentMethod::BankTransfer => "bank_transfer",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq)]
#[sqlx(type_name = "payment_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Verified,
    Disputed,
    Rejected,
}

impl PaymentStatus {
    pub fn to_str(&self) -> &str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Verified => "verified",
            PaymentStatus::Disputed => "disputed",
            PaymentStatus::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct Payment {
    pub id: Uuid,
    pub job_id: Uuid,
    pub worker_id: Uuid,
    pub employer_id: Uuid,
    pub amount: BigDecimal,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub transaction_id: Option<String>,
    pub receipt_path: Option<String>,
    pub created_at: DateTime<Utc>,
    pub verified_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct PaymentWithDetails {
    pub id: Uuid,
    pub job_id: Uuid,
    pub worker_id: Uuid,
    pub employer_id: Uuid,
    pub amount: BigDecimal,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub transaction_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub verified_at: Option<DateTime<Utc>>,
    pub job_title: String,
    pub worker_name: Option<String>,
    pub employer_name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct Rating {
    pub id: Uuid,
    pub job_id: Uuid,
    pub worker_id: Uuid,
    pub employer_id: Uuid,
    pub rating: i32,
    pub feedback: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct RatingWithDetails {
    pub id: Uuid,
    pub job_id: Uuid,
    pub rating: i32,
    pub feedback: Option<String>,
    pub created_at: DateTime<Utc>,
    pub employer_name: Option<String>,
    pub job_title: String,
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone, PartialEq)]
pub struct RatingBucket {
    pub rating: i32,
    pub count: i64,
}

/// Worker rating summary; `average` is rounded to one decimal.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RatingSummary {
    pub average: Option<f64>,
    pub count: i64,
}

impl RatingSummary {
    pub fn new(raw_average: Option<f64>, count: i64) -> Self {
        Self {
            average: raw_average.map(|avg| (avg * 10.0).round() / 10.0),
            count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rating_summary_rounds() {
        assert_eq!(RatingSummary::new(Some(4.26), 3).average, Some(4.3));
        assert_eq!(RatingSummary::new(Some(3.0), 1).average, Some(3.0));
        assert_eq!(RatingSummary::new(None, 0).average, None);
    }

    #[test]
    fn test_payment_wire_names() {
        assert_eq!(serde_json::to_string(&PaymentMethod::BankTransfer).unwrap(), "\"bank_transfer\"");
        let method: PaymentMethod = serde_json::from_str("\"cash\"").unwrap();
        assert_eq!(method, PaymentMethod::Cash);
        assert_eq!(PaymentStatus::Disputed.to_str(), "disputed");
    }
}
