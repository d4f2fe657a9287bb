// db/paymentdb.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::BigDecimal;
use uuid::Uuid;

use super::db::DBClient;
use crate::models::paymentmodel::*;

#[derive(Debug, Clone)]
pub struct NewPayment {
    pub job_id: Uuid,
    pub worker_id: Uuid,
    pub employer_id: Uuid,
    pub amount: BigDecimal,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub transaction_id: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub verified_at: Option<DateTime<Utc>>,
}

const PAYMENT_DETAILS_SELECT: &str = r#"
    SELECT p.id, p.job_id, p.worker_id, p.employer_id, p.amount, p.method, p.status,
           p.transaction_id, p.created_at, p.verified_at,
           j.title AS job_title, w.name AS worker_name, e.name AS employer_name
    FROM payments p
    JOIN jobs j ON j.id = p.job_id
    JOIN users w ON w.id = p.worker_id
    JOIN users e ON e.id = p.employer_id
"#;

#[async_trait]
pub trait PaymentExt {
    async fn get_payment(&self, payment_id: Uuid) -> Result<Option<Payment>, sqlx::Error>;

    async fn get_payment_by_transaction(&self, transaction_id: &str) -> Result<Option<Payment>, sqlx::Error>;

    async fn has_completed_payment(&self, job_id: Uuid, worker_id: Uuid) -> Result<bool, sqlx::Error>;

    async fn create_payment(&self, payment: NewPayment) -> Result<Payment, sqlx::Error>;

    /// Inserts a gateway payment once per transaction id; None when it was already recorded.
    async fn record_gateway_payment(&self, payment: NewPayment) -> Result<Option<Payment>, sqlx::Error>;

    /// Moves a pending payment to `status`; None when it is no longer pending.
    async fn settle_pending_payment(
        &self,
        payment_id: Uuid,
        status: PaymentStatus,
    ) -> Result<Option<Payment>, sqlx::Error>;

    /// Resolves a disputed payment. On rejection the worker's application goes back to `applied`.
    /// Returns None when the payment is not disputed.
    async fn resolve_dispute(&self, payment_id: Uuid, approve: bool) -> Result<Option<Payment>, sqlx::Error>;

    async fn get_worker_payments(
        &self,
        worker_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<PaymentWithDetails>, sqlx::Error>;

    async fn count_worker_payments(&self, worker_id: Uuid) -> Result<i64, sqlx::Error>;

    async fn get_employer_payments(
        &self,
        employer_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<PaymentWithDetails>, sqlx::Error>;

    async fn count_employer_payments(&self, employer_id: Uuid) -> Result<i64, sqlx::Error>;

    async fn get_disputed_payments(&self) -> Result<Vec<PaymentWithDetails>, sqlx::Error>;

    async fn get_recent_payments(&self, limit: i64) -> Result<Vec<PaymentWithDetails>, sqlx::Error>;

    async fn get_latest_job_payment(&self, job_id: Uuid) -> Result<Option<Payment>, sqlx::Error>;

    async fn get_rating_for_job(&self, job_id: Uuid, employer_id: Uuid) -> Result<Option<Rating>, sqlx::Error>;

    async fn upsert_rating(
        &self,
        job_id: Uuid,
        worker_id: Uuid,
        employer_id: Uuid,
        rating: i32,
        feedback: Option<String>,
    ) -> Result<Rating, sqlx::Error>;

    async fn get_worker_rating_summary(&self, worker_id: Uuid) -> Result<RatingSummary, sqlx::Error>;

    async fn get_worker_ratings(&self, worker_id: Uuid, limit: i64) -> Result<Vec<RatingWithDetails>, sqlx::Error>;

    async fn get_rating_distribution(&self) -> Result<Vec<RatingBucket>, sqlx::Error>;
}

#[async_trait]
impl PaymentExt for DBClient {
    async fn get_payment(&self, payment_id: Uuid) -> Result<Option<Payment>, sqlx::Error> {
        sqlx::query_as::<_, Payment>(r#"SELECT * FROM payments WHERE id = $1"#)
            .bind(payment_id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn get_payment_by_transaction(&self, transaction_id: &str) -> Result<Option<Payment>, sqlx::Error> {
        sqlx::query_as::<_, Payment>(r#"SELECT * FROM payments WHERE transaction_id = $1 LIMIT 1"#)
            .bind(transaction_id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn has_completed_payment(&self, job_id: Uuid, worker_id: Uuid) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM payments
                WHERE job_id = $1 AND worker_id = $2 AND status = 'completed'::payment_status
            )
            "#,
        )
        .bind(job_id)
        .bind(worker_id)
        .fetch_one(&self.pool)
        .await
    }

    async fn create_payment(&self, payment: NewPayment) -> Result<Payment, sqlx::Error> {
        sqlx::query_as::<_, Payment>(
            r#"
            INSERT INTO payments (
                id, job_id, worker_id, employer_id, amount, method, status,
                transaction_id, created_at, verified_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, COALESCE($9, NOW()), $10)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(payment.job_id)
        .bind(payment.worker_id)
        .bind(payment.employer_id)
        .bind(payment.amount)
        .bind(payment.method)
        .bind(payment.status)
        .bind(payment.transaction_id)
        .bind(payment.created_at)
        .bind(payment.verified_at)
        .fetch_one(&self.pool)
        .await
    }

    async fn record_gateway_payment(&self, payment: NewPayment) -> Result<Option<Payment>, sqlx::Error> {
        sqlx::query_as::<_, Payment>(
            r#"
            INSERT INTO payments (
                id, job_id, worker_id, employer_id, amount, method, status,
                transaction_id, created_at, verified_at
            )
            VALUES ($1, $2, $3, $4, $5, 'razorpay'::payment_method, $6, $7, COALESCE($8, NOW()), $9)
            ON CONFLICT (transaction_id) WHERE method = 'razorpay' DO NOTHING
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(payment.job_id)
        .bind(payment.worker_id)
        .bind(payment.employer_id)
        .bind(payment.amount)
        .bind(payment.status)
        .bind(payment.transaction_id)
        .bind(payment.created_at)
        .bind(payment.verified_at)
        .fetch_optional(&self.pool)
        .await
    }

    async fn settle_pending_payment(
        &self,
        payment_id: Uuid,
        status: PaymentStatus,
    ) -> Result<Option<Payment>, sqlx::Error> {
        sqlx::query_as::<_, Payment>(
            r#"
            UPDATE payments
            SET status = $2,
                verified_at = CASE WHEN $2 = 'verified'::payment_status THEN NOW() ELSE verified_at END
            WHERE id = $1 AND status = 'pending'::payment_status
            RETURNING *
            "#,
        )
        .bind(payment_id)
        .bind(status)
        .fetch_optional(&self.pool)
        .await
    }

    async fn resolve_dispute(&self, payment_id: Uuid, approve: bool) -> Result<Option<Payment>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let new_status = if approve {
            PaymentStatus::Verified
        } else {
            PaymentStatus::Rejected
        };

        let payment = sqlx::query_as::<_, Payment>(
            r#"
            UPDATE payments
            SET status = $2,
                verified_at = CASE WHEN $2 = 'verified'::payment_status THEN NOW() ELSE verified_at END
            WHERE id = $1 AND status = 'disputed'::payment_status
            RETURNING *
            "#,
        )
        .bind(payment_id)
        .bind(new_status)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(payment) = payment else {
            return Ok(None);
        };

        if !approve {
            sqlx::query(
                r#"
                UPDATE applications SET status = 'applied'::application_status
                WHERE job_id = $1 AND worker_id = $2
                "#,
            )
            .bind(payment.job_id)
            .bind(payment.worker_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(Some(payment))
    }

    async fn get_worker_payments(
        &self,
        worker_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<PaymentWithDetails>, sqlx::Error> {
        let query = format!(
            "{} WHERE p.worker_id = $1 ORDER BY p.created_at DESC LIMIT $2 OFFSET $3",
            PAYMENT_DETAILS_SELECT
        );
        sqlx::query_as::<_, PaymentWithDetails>(&query)
            .bind(worker_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
    }

    async fn count_worker_payments(&self, worker_id: Uuid) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(r#"SELECT COUNT(*) FROM payments WHERE worker_id = $1"#)
            .bind(worker_id)
            .fetch_one(&self.pool)
            .await
    }

    async fn get_employer_payments(
        &self,
        employer_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<PaymentWithDetails>, sqlx::Error> {
        let query = format!(
            "{} WHERE p.employer_id = $1 ORDER BY p.created_at DESC LIMIT $2 OFFSET $3",
            PAYMENT_DETAILS_SELECT
        );
        sqlx::query_as::<_, PaymentWithDetails>(&query)
            .bind(employer_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
    }

    async fn count_employer_payments(&self, employer_id: Uuid) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(r#"SELECT COUNT(*) FROM payments WHERE employer_id = $1"#)
            .bind(employer_id)
            .fetch_one(&self.pool)
            .await
    }

    async fn get_disputed_payments(&self) -> Result<Vec<PaymentWithDetails>, sqlx::Error> {
        let query = format!(
            "{} WHERE p.status = 'disputed'::payment_status ORDER BY p.created_at DESC",
            PAYMENT_DETAILS_SELECT
        );
        sqlx::query_as::<_, PaymentWithDetails>(&query)
            .fetch_all(&self.pool)
            .await
    }

    async fn get_recent_payments(&self, limit: i64) -> Result<Vec<PaymentWithDetails>, sqlx::Error> {
        let query = format!("{} ORDER BY p.created_at DESC LIMIT $1", PAYMENT_DETAILS_SELECT);
        sqlx::query_as::<_, PaymentWithDetails>(&query)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
    }

    async fn get_latest_job_payment(&self, job_id: Uuid) -> Result<Option<Payment>, sqlx::Error> {
        sqlx::query_as::<_, Payment>(
            r#"SELECT * FROM payments WHERE job_id = $1 ORDER BY created_at DESC LIMIT 1"#,
        )
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn get_rating_for_job(&self, job_id: Uuid, employer_id: Uuid) -> Result<Option<Rating>, sqlx::Error> {
        sqlx::query_as::<_, Rating>(r#"SELECT * FROM ratings WHERE job_id = $1 AND employer_id = $2"#)
            .bind(job_id)
            .bind(employer_id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn upsert_rating(
        &self,
        job_id: Uuid,
        worker_id: Uuid,
        employer_id: Uuid,
        rating: i32,
        feedback: Option<String>,
    ) -> Result<Rating, sqlx::Error> {
        sqlx::query_as::<_, Rating>(
            r#"
            INSERT INTO ratings (id, job_id, worker_id, employer_id, rating, feedback)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (job_id, employer_id)
            DO UPDATE SET rating = EXCLUDED.rating, feedback = EXCLUDED.feedback,
                          worker_id = EXCLUDED.worker_id
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(job_id)
        .bind(worker_id)
        .bind(employer_id)
        .bind(rating)
        .bind(feedback)
        .fetch_one(&self.pool)
        .await
    }

    async fn get_worker_rating_summary(&self, worker_id: Uuid) -> Result<RatingSummary, sqlx::Error> {
        let (average, count): (Option<f64>, i64) = sqlx::query_as(
            r#"SELECT AVG(rating)::float8, COUNT(*) FROM ratings WHERE worker_id = $1"#,
        )
        .bind(worker_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(RatingSummary::new(average, count))
    }

    async fn get_worker_ratings(&self, worker_id: Uuid, limit: i64) -> Result<Vec<RatingWithDetails>, sqlx::Error> {
        sqlx::query_as::<_, RatingWithDetails>(
            r#"
            SELECT r.id, r.job_id, r.rating, r.feedback, r.created_at,
                   e.name AS employer_name, j.title AS job_title
            FROM ratings r
            JOIN users e ON e.id = r.employer_id
            JOIN jobs j ON j.id = r.job_id
            WHERE r.worker_id = $1
            ORDER BY r.created_at DESC
            LIMIT $2
            "#,
        )
        .bind(worker_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
    }

    async fn get_rating_distribution(&self) -> Result<Vec<RatingBucket>, sqlx::Error> {
        sqlx::query_as::<_, RatingBucket>(
            r#"SELECT rating, COUNT(*) AS count FROM ratings GROUP BY rating ORDER BY rating"#,
        )
        .fetch_all(&self.pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::{fixtures, jobdb::JobExt},
        models::jobmodel::ApplicationStatus,
    };
    use sqlx::PgPool;

    struct Hired {
        job_id: Uuid,
        worker_id: Uuid,
        employer_id: Uuid,
        application_id: Uuid,
    }

    async fn hired_worker(db: &DBClient) -> Hired {
        let employer = fixtures::employer(db, "site@sharma.in").await;
        let job = fixtures::active_job(db, employer.id, "Wall plastering").await;
        let worker = fixtures::worker(db, "Ramesh", "+919876543210").await;
        let application = db.create_application(job.id, worker.id, None).await.unwrap();
        db.accept_application(application.id, job.id).await.unwrap().unwrap();
        db.complete_job(job.id).await.unwrap();

        Hired {
            job_id: job.id,
            worker_id: worker.id,
            employer_id: employer.id,
            application_id: application.id,
        }
    }

    fn payment(hired: &Hired, method: PaymentMethod, status: PaymentStatus, transaction_id: &str) -> NewPayment {
        NewPayment {
            job_id: hired.job_id,
            worker_id: hired.worker_id,
            employer_id: hired.employer_id,
            amount: BigDecimal::from(800),
            method,
            status,
            transaction_id: Some(transaction_id.to_string()),
            created_at: None,
            verified_at: None,
        }
    }

    #[sqlx::test]
    #[ignore] // Requires DATABASE_URL pointing at Postgres
    async fn test_replayed_gateway_payment_is_recorded_once(pool: PgPool) -> sqlx::Result<()> {
        let db = DBClient::new(pool);
        let hired = hired_worker(&db).await;
        let captured = payment(&hired, PaymentMethod::Razorpay, PaymentStatus::Completed, "pay_29QQoUBi66xm2f");

        let first = db.record_gateway_payment(captured.clone()).await?;
        assert!(first.is_some());
        assert!(db.record_gateway_payment(captured).await?.is_none());

        let stored = db.get_payment_by_transaction("pay_29QQoUBi66xm2f").await?.unwrap();
        assert_eq!(Some(stored.id), first.map(|p| p.id));
        assert_eq!(db.count_employer_payments(hired.employer_id).await?, 1);
        assert!(db.has_completed_payment(hired.job_id, hired.worker_id).await?);
        Ok(())
    }

    #[sqlx::test]
    #[ignore] // Requires DATABASE_URL pointing at Postgres
    async fn test_only_pending_payments_settle(pool: PgPool) -> sqlx::Result<()> {
        let db = DBClient::new(pool);
        let hired = hired_worker(&db).await;

        let cash = db
            .create_payment(payment(&hired, PaymentMethod::Cash, PaymentStatus::Pending, "cash-1"))
            .await?;
        let verified = db.settle_pending_payment(cash.id, PaymentStatus::Verified).await?.unwrap();
        assert_eq!(verified.status, PaymentStatus::Verified);
        assert!(verified.verified_at.is_some());

        // Already settled
        assert!(db.settle_pending_payment(cash.id, PaymentStatus::Disputed).await?.is_none());

        let gateway = db
            .record_gateway_payment(payment(&hired, PaymentMethod::Razorpay, PaymentStatus::Completed, "pay_A"))
            .await?
            .unwrap();
        assert!(db.settle_pending_payment(gateway.id, PaymentStatus::Disputed).await?.is_none());
        Ok(())
    }

    #[sqlx::test]
    #[ignore] // Requires DATABASE_URL pointing at Postgres
    async fn test_dispute_resolution(pool: PgPool) -> sqlx::Result<()> {
        let db = DBClient::new(pool);
        let hired = hired_worker(&db).await;

        let pending = db
            .create_payment(payment(&hired, PaymentMethod::BankTransfer, PaymentStatus::Pending, "UTR001"))
            .await?;

        // Not disputed yet
        assert!(db.resolve_dispute(pending.id, true).await?.is_none());

        db.settle_pending_payment(pending.id, PaymentStatus::Disputed).await?.unwrap();
        let rejected = db.resolve_dispute(pending.id, false).await?.unwrap();
        assert_eq!(rejected.status, PaymentStatus::Rejected);

        let application = db.get_application(hired.application_id).await?.unwrap();
        assert_eq!(application.status, ApplicationStatus::Applied);

        // Resolved disputes stay resolved
        assert!(db.resolve_dispute(pending.id, true).await?.is_none());

        let second = db
            .create_payment(payment(&hired, PaymentMethod::Cash, PaymentStatus::Pending, "cash-2"))
            .await?;
        db.settle_pending_payment(second.id, PaymentStatus::Disputed).await?.unwrap();
        let approved = db.resolve_dispute(second.id, true).await?.unwrap();
        assert_eq!(approved.status, PaymentStatus::Verified);
        assert!(approved.verified_at.is_some());
        Ok(())
    }
}
