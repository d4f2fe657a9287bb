// db/statsdb.rs
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::types::BigDecimal;
use uuid::Uuid;

use super::db::DBClient;

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct PlatformStats {
    pub total_users: i64,
    pub total_workers: i64,
    pub total_employers: i64,
    pub new_users_today: i64,
    pub total_jobs: i64,
    pub active_jobs: i64,
    pub completed_jobs: i64,
    pub total_payment_amount: BigDecimal,
    pub verified_payments: i64,
    pub disputed_payments: i64,
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct EmployerStats {
    pub total_jobs: i64,
    pub active_jobs: i64,
    pub pending_applications: i64,
    pub total_spent: BigDecimal,
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct JobApplicationCounts {
    pub job_id: Uuid,
    pub pending_apps_count: i64,
    pub total_apps_count: i64,
}

#[async_trait]
pub trait StatsExt {
    async fn get_platform_stats(&self) -> Result<PlatformStats, sqlx::Error>;

    async fn get_employer_stats(&self, employer_id: Uuid) -> Result<EmployerStats, sqlx::Error>;

    async fn get_job_application_counts(&self, employer_id: Uuid) -> Result<Vec<JobApplicationCounts>, sqlx::Error>;

    async fn get_rated_job_ids(&self, employer_id: Uuid) -> Result<Vec<Uuid>, sqlx::Error>;
}

#[async_trait]
impl StatsExt for DBClient {
    async fn get_platform_stats(&self) -> Result<PlatformStats, sqlx::Error> {
        sqlx::query_as::<_, PlatformStats>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM users) AS total_users,
                (SELECT COUNT(*) FROM users WHERE role = 'worker'::user_role) AS total_workers,
                (SELECT COUNT(*) FROM users WHERE role = 'employer'::user_role) AS total_employers,
                (SELECT COUNT(*) FROM users WHERE created_at >= NOW() - INTERVAL '1 day') AS new_users_today,
                (SELECT COUNT(*) FROM jobs) AS total_jobs,
                (SELECT COUNT(*) FROM jobs WHERE status = 'active'::job_status) AS active_jobs,
                (SELECT COUNT(*) FROM jobs WHERE status = 'completed'::job_status) AS completed_jobs,
                (SELECT COALESCE(SUM(amount), 0) FROM payments) AS total_payment_amount,
                (SELECT COUNT(*) FROM payments WHERE status = 'verified'::payment_status) AS verified_payments,
                (SELECT COUNT(*) FROM payments WHERE status = 'disputed'::payment_status) AS disputed_payments
            "#,
        )
        .fetch_one(&self.pool)
        .await
    }

    async fn get_employer_stats(&self, employer_id: Uuid) -> Result<EmployerStats, sqlx::Error> {
        sqlx::query_as::<_, EmployerStats>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM jobs WHERE employer_id = $1) AS total_jobs,
                (SELECT COUNT(*) FROM jobs WHERE employer_id = $1 AND status = 'active'::job_status) AS active_jobs,
                (SELECT COUNT(*) FROM applications a
                    JOIN jobs j ON j.id = a.job_id
                    WHERE j.employer_id = $1
                      AND j.status = 'active'::job_status
                      AND a.status = 'applied'::application_status) AS pending_applications,
                (SELECT COALESCE(SUM(amount), 0) FROM payments
                    WHERE employer_id = $1
                      AND status IN ('completed'::payment_status, 'verified'::payment_status)) AS total_spent
            "#,
        )
        .bind(employer_id)
        .fetch_one(&self.pool)
        .await
    }

    async fn get_job_application_counts(&self, employer_id: Uuid) -> Result<Vec<JobApplicationCounts>, sqlx::Error> {
        sqlx::query_as::<_, JobApplicationCounts>(
            r#"
            SELECT j.id AS job_id,
                   COUNT(a.id) FILTER (WHERE a.status = 'applied'::application_status) AS pending_apps_count,
                   COUNT(a.id) AS total_apps_count
            FROM jobs j
            LEFT JOIN applications a ON a.job_id = j.id
            WHERE j.employer_id = $1
            GROUP BY j.id
            "#,
        )
        .bind(employer_id)
        .fetch_all(&self.pool)
        .await
    }

    async fn get_rated_job_ids(&self, employer_id: Uuid) -> Result<Vec<Uuid>, sqlx::Error> {
        sqlx::query_scalar(r#"SELECT job_id FROM ratings WHERE employer_id = $1"#)
            .bind(employer_id)
            .fetch_all(&self.pool)
            .await
    }
}
