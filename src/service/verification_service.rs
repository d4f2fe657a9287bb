// service/verification_service.rs
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::{
    db::{db::DBClient, userdb::UserExt, verificationdb::VerificationExt},
    models::{
        usermodel::{OverallVerificationStatus, User, UserRole},
        verificationmodels::{
            derive_overall_status, Certification, DocumentType, DocumentVerification, ReviewStatus,
            WorkerCertification,
        },
    },
    service::error::{is_unique_violation, ServiceError},
    utils::uploads::{
        allowed_extension, certification_filename, document_filename, parse_owned_path,
        remove_user_file, resolve_path, save_user_file, ALLOWED_EXTENSIONS, CERT_DOCS_DIR,
        DOCUMENTS_DIR,
    },
};

pub const MAX_DOCUMENT_NUMBER_LEN: usize = 100;

/// Uploaded file as received from the multipart form.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    fn checked_extension(&self) -> Result<String, ServiceError> {
        if self.bytes.is_empty() || self.filename.trim().is_empty() {
            return Err(ServiceError::validation("No file selected."));
        }
        allowed_extension(&self.filename).ok_or_else(|| {
            ServiceError::validation(format!(
                "File type not allowed. Allowed types: {}",
                ALLOWED_EXTENSIONS.join(", ")
            ))
        })
    }
}

/// Folders served by the download routes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StoredFileKind {
    Document,
    CertificationDocument,
}

impl StoredFileKind {
    fn dir(&self) -> &'static str {
        match self {
            StoredFileKind::Document => DOCUMENTS_DIR,
            StoredFileKind::CertificationDocument => CERT_DOCS_DIR,
        }
    }

    /// Owners and admins may always read; employers may also read certification proofs.
    pub fn can_view(&self, viewer: &User, owner_id: Uuid) -> bool {
        viewer.id == owner_id
            || viewer.role == UserRole::Admin
            || (*self == StoredFileKind::CertificationDocument && viewer.role == UserRole::Employer)
    }
}

/// Expiry for a certification with the given validity; months count as 30 days.
pub fn certification_expiry(validity_months: Option<i32>, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    validity_months
        .filter(|months| *months > 0)
        .map(|months| now + Duration::days(i64::from(months) * 30))
}

#[derive(Debug, Clone)]
pub struct VerificationService {
    db_client: Arc<DBClient>,
    upload_folder: String,
}

impl VerificationService {
    pub fn new(db_client: Arc<DBClient>, upload_folder: String) -> Self {
        Self {
            db_client,
            upload_folder,
        }
    }

    pub async fn upload_document(
        &self,
        user: &User,
        document_type: &str,
        document_number: Option<String>,
        file: UploadedFile,
    ) -> Result<DocumentVerification, ServiceError> {
        let document_type = DocumentType::from_str(document_type).map_err(ServiceError::Validation)?;

        let document_number = document_number
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());
        if document_number
            .as_deref()
            .map_or(false, |n| n.chars().count() > MAX_DOCUMENT_NUMBER_LEN)
        {
            return Err(ServiceError::validation("Document number must be at most 100 characters."));
        }

        if let Some(existing) = self
            .db_client
            .get_latest_document_of_type(user.id, document_type)
            .await?
        {
            if existing.status.blocks_resubmission() {
                return Err(ServiceError::validation(format!(
                    "A {} document is already {}.",
                    document_type.to_str(),
                    existing.status.to_str()
                )));
            }
        }

        let ext = file.checked_extension()?;
        let filename = document_filename(document_type.to_str(), user.id, Utc::now().timestamp(), &ext);
        let relative = save_user_file(&self.upload_folder, DOCUMENTS_DIR, user.id, &filename, &file.bytes).await?;

        let document = match self
            .db_client
            .create_document(user.id, document_type, document_number, &relative)
            .await
        {
            Ok(document) => document,
            Err(e) => {
                remove_user_file(&self.upload_folder, DOCUMENTS_DIR, &relative).await;
                return Err(e.into());
            }
        };

        if user.overall_verification_status == OverallVerificationStatus::NotVerified {
            self.db_client
                .update_overall_status(user.id, OverallVerificationStatus::Pending)
                .await?;
        }

        tracing::info!(
            "User {} uploaded {} document {}",
            user.id,
            document_type.to_str(),
            document.id
        );
        Ok(document)
    }

    pub async fn add_certification(
        &self,
        worker: &User,
        certification_id: Uuid,
        file: UploadedFile,
    ) -> Result<WorkerCertification, ServiceError> {
        let certification = self
            .db_client
            .get_certification(certification_id)
            .await?
            .ok_or_else(|| ServiceError::validation("Selected certification does not exist."))?;

        let ext = file.checked_extension()?;
        let now = Utc::now();
        let filename = certification_filename(&certification.name, worker.id, now.timestamp(), &ext);
        let relative = save_user_file(&self.upload_folder, CERT_DOCS_DIR, worker.id, &filename, &file.bytes).await?;

        let expires_at = certification_expiry(certification.validity_months, now);

        match self
            .db_client
            .add_worker_certification(worker.id, certification.id, expires_at, &relative)
            .await
        {
            Ok(added) => Ok(added),
            Err(e) => {
                remove_user_file(&self.upload_folder, CERT_DOCS_DIR, &relative).await;
                Err(e.into())
            }
        }
    }

    pub async fn create_certification(
        &self,
        name: &str,
        description: Option<String>,
        issuing_org: Option<String>,
        validity_months: Option<i32>,
    ) -> Result<Certification, ServiceError> {
        self.db_client
            .create_certification(name.trim(), description, issuing_org, validity_months)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    ServiceError::validation(format!("Certification '{}' already exists.", name.trim()))
                } else {
                    ServiceError::Database(e)
                }
            })
    }

    /// Approves or rejects a document and refreshes the owner's overall status.
    pub async fn review_document(
        &self,
        admin_id: Uuid,
        doc_id: Uuid,
        approve: bool,
        rejection_reason: Option<String>,
    ) -> Result<DocumentVerification, ServiceError> {
        let document = self
            .db_client
            .get_document(doc_id)
            .await?
            .ok_or(ServiceError::DocumentNotFound(doc_id))?;

        let (status, reason) = if approve {
            (ReviewStatus::Verified, None)
        } else {
            let reason = rejection_reason
                .map(|r| r.trim().to_string())
                .filter(|r| !r.is_empty())
                .ok_or_else(|| ServiceError::validation("A rejection reason is required."))?;
            (ReviewStatus::Rejected, Some(reason))
        };

        let reviewed = self
            .db_client
            .review_document(document.id, admin_id, status, reason)
            .await?;

        self.refresh_overall_status(reviewed.user_id).await?;

        tracing::info!(
            "Admin {} marked document {} as {}",
            admin_id,
            doc_id,
            status.to_str()
        );
        Ok(reviewed)
    }

    async fn refresh_overall_status(&self, user_id: Uuid) -> Result<OverallVerificationStatus, ServiceError> {
        let owner = self
            .db_client
            .get_user(Some(user_id), None, None, None)
            .await?
            .ok_or(ServiceError::UserNotFound(user_id))?;

        let statuses = self.db_client.get_user_document_statuses(user_id).await?;
        let overall = derive_overall_status(owner.role, &statuses);
        self.db_client.update_overall_status(user_id, overall).await?;
        Ok(overall)
    }

    pub async fn verify_worker_cert(&self, cert_id: Uuid, approve: bool) -> Result<WorkerCertification, ServiceError> {
        let status = if approve {
            ReviewStatus::Verified
        } else {
            ReviewStatus::Rejected
        };

        self.db_client
            .set_worker_certification_status(cert_id, status)
            .await?
            .ok_or(ServiceError::DocumentNotFound(cert_id))
    }

    /// Resolves a `{owner}/{file}` download path after the access checks.
    pub async fn authorize_download(
        &self,
        viewer: &User,
        kind: StoredFileKind,
        relative: &str,
    ) -> Result<PathBuf, ServiceError> {
        let (owner_id, _) = parse_owned_path(relative)
            .ok_or_else(|| ServiceError::validation("Invalid file path."))?;

        if !kind.can_view(viewer, owner_id) {
            tracing::warn!("User {} denied access to {}", viewer.id, relative);
            return Err(ServiceError::Forbidden);
        }

        let path = resolve_path(&self.upload_folder, kind.dir(), relative.trim_start_matches('/'));
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Err(ServiceError::FileNotFound);
        }
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::usermodel::sample_user;
    use chrono::TimeZone;

    #[test]
    fn test_certification_expiry() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(
            certification_expiry(Some(12), now),
            Some(Utc.with_ymd_and_hms(2024, 12, 26, 0, 0, 0).unwrap())
        );
        assert_eq!(certification_expiry(Some(0), now), None);
        assert_eq!(certification_expiry(None, now), None);
    }

    #[test]
    fn test_download_permissions() {
        let owner = sample_user(UserRole::Worker);
        let stranger = sample_user(UserRole::Worker);
        let employer = sample_user(UserRole::Employer);
        let admin = sample_user(UserRole::Admin);

        assert!(StoredFileKind::Document.can_view(&owner, owner.id));
        assert!(StoredFileKind::Document.can_view(&admin, owner.id));
        assert!(!StoredFileKind::Document.can_view(&stranger, owner.id));
        assert!(!StoredFileKind::Document.can_view(&employer, owner.id));
        assert!(StoredFileKind::CertificationDocument.can_view(&employer, owner.id));
        assert!(!StoredFileKind::CertificationDocument.can_view(&stranger, owner.id));
    }

    #[test]
    fn test_uploaded_file_checks() {
        let empty = UploadedFile { filename: "scan.pdf".into(), bytes: vec![] };
        assert!(empty.checked_extension().is_err());

        let exe = UploadedFile { filename: "run.exe".into(), bytes: vec![1] };
        assert!(exe.checked_extension().is_err());

        let scan = UploadedFile { filename: "Scan.JPG".into(), bytes: vec![1, 2] };
        assert_eq!(scan.checked_extension().unwrap(), "jpg");
    }

    #[tokio::test]
    async fn test_download_rejects_bad_paths_before_touching_disk() {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://localhost/shrambandhu_test")
            .unwrap();
        let service = VerificationService::new(Arc::new(DBClient::new(pool)), "/tmp/uploads".into());
        let owner = sample_user(UserRole::Worker);
        let stranger = sample_user(UserRole::Worker);

        let err = service
            .authorize_download(&owner, StoredFileKind::Document, "../etc/passwd")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));

        let err = service
            .authorize_download(&stranger, StoredFileKind::Document, &format!("{}/aadhaar.pdf", owner.id))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden));

        let err = service
            .authorize_download(&owner, StoredFileKind::Document, &format!("{}/missing.pdf", owner.id))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::FileNotFound));
    }
}
