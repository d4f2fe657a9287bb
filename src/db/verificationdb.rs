// db/verificationdb.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::db::DBClient;
use crate::models::verificationmodels::*;

#[async_trait]
pub trait VerificationExt {
    // Document methods
    async fn create_document(
        &self,
        user_id: Uuid,
        document_type: DocumentType,
        document_number: Option<String>,
        file_path: &str,
    ) -> Result<DocumentVerification, sqlx::Error>;

    async fn get_document(&self, doc_id: Uuid) -> Result<Option<DocumentVerification>, sqlx::Error>;

    async fn get_pending_document_detail(&self, doc_id: Uuid) -> Result<Option<PendingDocument>, sqlx::Error>;

    async fn get_latest_document_of_type(
        &self,
        user_id: Uuid,
        document_type: DocumentType,
    ) -> Result<Option<DocumentVerification>, sqlx::Error>;

    async fn get_user_documents(&self, user_id: Uuid) -> Result<Vec<DocumentVerification>, sqlx::Error>;

    async fn get_pending_documents(&self, limit: i64, offset: i64) -> Result<Vec<PendingDocument>, sqlx::Error>;

    async fn count_pending_documents(&self) -> Result<i64, sqlx::Error>;

    async fn review_document(
        &self,
        doc_id: Uuid,
        admin_id: Uuid,
        status: ReviewStatus,
        rejection_reason: Option<String>,
    ) -> Result<DocumentVerification, sqlx::Error>;

    async fn get_user_document_statuses(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<(DocumentType, ReviewStatus)>, sqlx::Error>;

    // Certification catalog
    async fn create_certification(
        &self,
        name: &str,
        description: Option<String>,
        issuing_org: Option<String>,
        validity_months: Option<i32>,
    ) -> Result<Certification, sqlx::Error>;

    async fn get_certification(&self, certification_id: Uuid) -> Result<Option<Certification>, sqlx::Error>;

    async fn get_certifications(&self) -> Result<Vec<Certification>, sqlx::Error>;

    // Worker certifications
    async fn add_worker_certification(
        &self,
        worker_id: Uuid,
        certification_id: Uuid,
        expires_at: Option<DateTime<Utc>>,
        document_path: &str,
    ) -> Result<WorkerCertification, sqlx::Error>;

    async fn get_worker_certifications(&self, worker_id: Uuid) -> Result<Vec<WorkerCertificationDetail>, sqlx::Error>;

    async fn get_verified_worker_certifications(
        &self,
        worker_id: Uuid,
    ) -> Result<Vec<WorkerCertificationDetail>, sqlx::Error>;

    async fn get_pending_worker_certifications(&self) -> Result<Vec<WorkerCertificationDetail>, sqlx::Error>;

    async fn count_pending_worker_certifications(&self) -> Result<i64, sqlx::Error>;

    async fn get_worker_certification_statuses(&self, worker_id: Uuid) -> Result<Vec<ReviewStatus>, sqlx::Error>;

    async fn set_worker_certification_status(
        &self,
        cert_id: Uuid,
        status: ReviewStatus,
    ) -> Result<Option<WorkerCertification>, sqlx::Error>;
}

const CERT_DETAIL_SELECT: &str = r#"
    SELECT wc.id, wc.worker_id, wc.certification_id, wc.certified_at, wc.expires_at,
           wc.verification_status, wc.document_path,
           c.name AS certification_name, c.issuing_org,
           u.name AS worker_name, u.phone AS worker_phone
    FROM worker_certifications wc
    JOIN certifications c ON c.id = wc.certification_id
    JOIN users u ON u.id = wc.worker_id
"#;

const PENDING_DOCUMENT_SELECT: &str = r#"
    SELECT d.id, d.user_id, d.document_type, d.document_number, d.file_path, d.status, d.created_at,
           u.name AS user_name, u.phone AS user_phone, u.email AS user_email, u.role AS user_role
    FROM document_verifications d
    JOIN users u ON u.id = d.user_id
"#;

#[async_trait]
impl VerificationExt for DBClient {
    async fn create_document(
        &self,
        user_id: Uuid,
        document_type: DocumentType,
        document_number: Option<String>,
        file_path: &str,
    ) -> Result<DocumentVerification, sqlx::Error> {
        sqlx::query_as::<_, DocumentVerification>(
            r#"
            INSERT INTO document_verifications (id, user_id, document_type, document_number, file_path, status)
            VALUES ($1, $2, $3, $4, $5, 'pending'::review_status)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(document_type)
        .bind(document_number)
        .bind(file_path)
        .fetch_one(&self.pool)
        .await
    }

    async fn get_document(&self, doc_id: Uuid) -> Result<Option<DocumentVerification>, sqlx::Error> {
        sqlx::query_as::<_, DocumentVerification>(r#"SELECT * FROM document_verifications WHERE id = $1"#)
            .bind(doc_id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn get_pending_document_detail(&self, doc_id: Uuid) -> Result<Option<PendingDocument>, sqlx::Error> {
        let query = format!("{} WHERE d.id = $1", PENDING_DOCUMENT_SELECT);
        sqlx::query_as::<_, PendingDocument>(&query)
            .bind(doc_id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn get_latest_document_of_type(
        &self,
        user_id: Uuid,
        document_type: DocumentType,
    ) -> Result<Option<DocumentVerification>, sqlx::Error> {
        sqlx::query_as::<_, DocumentVerification>(
            r#"
            SELECT * FROM document_verifications
            WHERE user_id = $1 AND document_type = $2
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .bind(document_type)
        .fetch_optional(&self.pool)
        .await
    }

    async fn get_user_documents(&self, user_id: Uuid) -> Result<Vec<DocumentVerification>, sqlx::Error> {
        sqlx::query_as::<_, DocumentVerification>(
            r#"SELECT * FROM document_verifications WHERE user_id = $1 ORDER BY created_at DESC"#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
    }

    async fn get_pending_documents(&self, limit: i64, offset: i64) -> Result<Vec<PendingDocument>, sqlx::Error> {
        let query = format!(
            "{} WHERE d.status = 'pending'::review_status ORDER BY d.created_at ASC LIMIT $1 OFFSET $2",
            PENDING_DOCUMENT_SELECT
        );
        sqlx::query_as::<_, PendingDocument>(&query)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
    }

    async fn count_pending_documents(&self) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            r#"SELECT COUNT(*) FROM document_verifications WHERE status = 'pending'::review_status"#,
        )
        .fetch_one(&self.pool)
        .await
    }

    async fn review_document(
        &self,
        doc_id: Uuid,
        admin_id: Uuid,
        status: ReviewStatus,
        rejection_reason: Option<String>,
    ) -> Result<DocumentVerification, sqlx::Error> {
        sqlx::query_as::<_, DocumentVerification>(
            r#"
            UPDATE document_verifications
            SET status = $2,
                verified_by = $3,
                verified_at = NOW(),
                rejection_reason = $4,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(doc_id)
        .bind(status)
        .bind(admin_id)
        .bind(rejection_reason)
        .fetch_one(&self.pool)
        .await
    }

    async fn get_user_document_statuses(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<(DocumentType, ReviewStatus)>, sqlx::Error> {
        sqlx::query_as::<_, (DocumentType, ReviewStatus)>(
            r#"SELECT document_type, status FROM document_verifications WHERE user_id = $1"#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
    }

    async fn create_certification(
        &self,
        name: &str,
        description: Option<String>,
        issuing_org: Option<String>,
        validity_months: Option<i32>,
    ) -> Result<Certification, sqlx::Error> {
        sqlx::query_as::<_, Certification>(
            r#"
            INSERT INTO certifications (id, name, description, issuing_org, validity_months)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(description)
        .bind(issuing_org)
        .bind(validity_months)
        .fetch_one(&self.pool)
        .await
    }

    async fn get_certification(&self, certification_id: Uuid) -> Result<Option<Certification>, sqlx::Error> {
        sqlx::query_as::<_, Certification>(r#"SELECT * FROM certifications WHERE id = $1"#)
            .bind(certification_id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn get_certifications(&self) -> Result<Vec<Certification>, sqlx::Error> {
        sqlx::query_as::<_, Certification>(r#"SELECT * FROM certifications ORDER BY name ASC"#)
            .fetch_all(&self.pool)
            .await
    }

    async fn add_worker_certification(
        &self,
        worker_id: Uuid,
        certification_id: Uuid,
        expires_at: Option<DateTime<Utc>>,
        document_path: &str,
    ) -> Result<WorkerCertification, sqlx::Error> {
        sqlx::query_as::<_, WorkerCertification>(
            r#"
            INSERT INTO worker_certifications (
                id, worker_id, certification_id, expires_at, verification_status, document_path
            )
            VALUES ($1, $2, $3, $4, 'pending'::review_status, $5)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(worker_id)
        .bind(certification_id)
        .bind(expires_at)
        .bind(document_path)
        .fetch_one(&self.pool)
        .await
    }

    async fn get_worker_certifications(&self, worker_id: Uuid) -> Result<Vec<WorkerCertificationDetail>, sqlx::Error> {
        let query = format!(
            "{} WHERE wc.worker_id = $1 ORDER BY wc.certified_at DESC",
            CERT_DETAIL_SELECT
        );
        sqlx::query_as::<_, WorkerCertificationDetail>(&query)
            .bind(worker_id)
            .fetch_all(&self.pool)
            .await
    }

    async fn get_verified_worker_certifications(
        &self,
        worker_id: Uuid,
    ) -> Result<Vec<WorkerCertificationDetail>, sqlx::Error> {
        let query = format!(
            "{} WHERE wc.worker_id = $1 AND wc.verification_status = 'verified'::review_status \
             ORDER BY wc.certified_at DESC",
            CERT_DETAIL_SELECT
        );
        sqlx::query_as::<_, WorkerCertificationDetail>(&query)
            .bind(worker_id)
            .fetch_all(&self.pool)
            .await
    }

    async fn get_pending_worker_certifications(&self) -> Result<Vec<WorkerCertificationDetail>, sqlx::Error> {
        let query = format!(
            "{} WHERE wc.verification_status = 'pending'::review_status ORDER BY wc.certified_at ASC",
            CERT_DETAIL_SELECT
        );
        sqlx::query_as::<_, WorkerCertificationDetail>(&query)
            .fetch_all(&self.pool)
            .await
    }

    async fn count_pending_worker_certifications(&self) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            r#"SELECT COUNT(*) FROM worker_certifications WHERE verification_status = 'pending'::review_status"#,
        )
        .fetch_one(&self.pool)
        .await
    }

    async fn get_worker_certification_statuses(&self, worker_id: Uuid) -> Result<Vec<ReviewStatus>, sqlx::Error> {
        sqlx::query_scalar(r#"SELECT verification_status FROM worker_certifications WHERE worker_id = $1"#)
            .bind(worker_id)
            .fetch_all(&self.pool)
            .await
    }

    async fn set_worker_certification_status(
        &self,
        cert_id: Uuid,
        status: ReviewStatus,
    ) -> Result<Option<WorkerCertification>, sqlx::Error> {
        sqlx::query_as::<_, WorkerCertification>(
            r#"UPDATE worker_certifications SET verification_status = $2 WHERE id = $1 RETURNING *"#,
        )
        .bind(cert_id)
        .bind(status)
        .fetch_optional(&self.pool)
        .await
    }
}
