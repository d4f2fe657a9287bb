// dtos/verificationdtos.rs
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{
    db::statsdb::PlatformStats,
    models::{
        alertmodel::AlertWithWorker,
        jobmodel::Job,
        paymentmodel::{PaymentWithDetails, RatingBucket},
    },
};

#[derive(Validate, Debug, Clone, Serialize, Deserialize)]
pub struct ReviewDocumentDto {
    #[validate(length(min = 1, message = "Action is required"))]
    pub action: String,

    #[validate(length(max = 500, message = "Rejection reason must be at most 500 characters"))]
    pub rejection_reason: Option<String>,
}

impl ReviewDocumentDto {
    /// `approve` or `reject`; anything else is refused.
    pub fn approves(&self) -> Option<bool> {
        match self.action.trim() {
            "approve" => Some(true),
            "reject" => Some(false),
            _ => None,
        }
    }
}

#[derive(Validate, Debug, Clone, Serialize, Deserialize)]
pub struct CreateCertificationDto {
    #[validate(length(min = 1, max = 100, message = "Name must be between 1-100 characters"))]
    pub name: String,

    #[validate(length(max = 1000, message = "Description must be at most 1000 characters"))]
    pub description: Option<String>,

    #[validate(length(max = 100, message = "Issuing organisation must be at most 100 characters"))]
    pub issuing_org: Option<String>,

    #[validate(range(min = 0, message = "Validity must not be negative"))]
    pub validity_months: Option<i32>,
}

#[derive(Validate, Debug, Clone, Serialize, Deserialize)]
pub struct VerifyCertificationDto {
    pub action: String,
}

#[derive(Debug, Serialize)]
pub struct UserCountsDto {
    pub total: i64,
    pub workers: i64,
    pub employers: i64,
    pub new_today: i64,
}

#[derive(Debug, Serialize)]
pub struct JobCountsDto {
    pub total: i64,
    pub active: i64,
    pub completed: i64,
}

#[derive(Debug, Serialize)]
pub struct PaymentCountsDto {
    pub total_amount: String,
    pub verified: i64,
    pub disputed: i64,
}

#[derive(Debug, Serialize)]
pub struct AdminDashboardDto {
    pub users: UserCountsDto,
    pub jobs: JobCountsDto,
    pub payments: PaymentCountsDto,
    pub recent_alerts: Vec<AlertWithWorker>,
    pub pending_documents: i64,
    pub pending_certifications: i64,
}

impl AdminDashboardDto {
    pub fn new(
        stats: PlatformStats,
        recent_alerts: Vec<AlertWithWorker>,
        pending_documents: i64,
        pending_certifications: i64,
    ) -> Self {
        Self {
            users: UserCountsDto {
                total: stats.total_users,
                workers: stats.total_workers,
                employers: stats.total_employers,
                new_today: stats.new_users_today,
            },
            jobs: JobCountsDto {
                total: stats.total_jobs,
                active: stats.active_jobs,
                completed: stats.completed_jobs,
            },
            payments: PaymentCountsDto {
                total_amount: stats.total_payment_amount.with_scale(2).to_string(),
                verified: stats.verified_payments,
                disputed: stats.disputed_payments,
            },
            recent_alerts,
            pending_documents,
            pending_certifications,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AnalyticsDto {
    pub total_workers: i64,
    pub total_employers: i64,
    pub total_jobs: i64,
    pub total_payments: String,
    pub recent_jobs: Vec<Job>,
    pub recent_payments: Vec<PaymentWithDetails>,
    pub rating_distribution: Vec<RatingBucket>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use bigdecimal::BigDecimal;
    use std::str::FromStr;

    #[test]
    fn test_review_action_parsing() {
        let dto = |action: &str| ReviewDocumentDto { action: action.into(), rejection_reason: None };
        assert_eq!(dto("approve").approves(), Some(true));
        assert_eq!(dto(" reject ").approves(), Some(false));
        assert_eq!(dto("maybe").approves(), None);
    }

    #[test]
    fn test_catalog_entry_validation() {
        let entry = CreateCertificationDto {
            name: "Electrical Safety".into(),
            description: None,
            issuing_org: Some("NSDC".into()),
            validity_months: Some(12),
        };
        assert!(entry.validate().is_ok());

        let negative = CreateCertificationDto { validity_months: Some(-1), ..entry.clone() };
        assert!(negative.validate().is_err());

        let unnamed = CreateCertificationDto { name: String::new(), ..entry };
        assert!(unnamed.validate().is_err());
    }

    #[test]
    fn test_dashboard_groups_counts() {
        let stats = PlatformStats {
            total_users: 10,
            total_workers: 6,
            total_employers: 3,
            new_users_today: 2,
            total_jobs: 4,
            active_jobs: 1,
            completed_jobs: 2,
            total_payment_amount: BigDecimal::from_str("1500.5").unwrap(),
            verified_payments: 3,
            disputed_payments: 1,
        };
        let dashboard = AdminDashboardDto::new(stats, vec![], 5, 0);
        assert_eq!(dashboard.users.workers, 6);
        assert_eq!(dashboard.jobs.completed, 2);
        assert_eq!(dashboard.payments.total_amount, "1500.50");
        assert_eq!(dashboard.pending_documents, 5);
    }
}
