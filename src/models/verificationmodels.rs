use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::usermodel::{OverallVerificationStatus, UserRole};

#[derive(Debug, Deserialize, Serialize, Clone, Copy, sqlx::Type, PartialEq, Eq, Hash)]
#[sqlx(type_name = "document_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    Aadhaar,
    Pan,
    Eshram,
    VoterId,
    DrivingLicense,
    PhotoId,
    AddressProof,
    OrgProof,
}

impl DocumentType {
    pub fn to_str(&self) -> &str {
        match self {
            DocumentType::Aadhaar => "aadhaar",
            DocumentType::Pan => "pan",
            DocumentType::Eshram => "eshram",
            DocumentType::VoterId => "voter_id",
            DocumentType::DrivingLicense => "driving_license",
            DocumentType::PhotoId => "photo_id",
            DocumentType::AddressProof => "address_proof",
            DocumentType::OrgProof => "org_proof",
        }
    }
}

impl FromStr for DocumentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "aadhaar" => Ok(DocumentType::Aadhaar),
            "pan" => Ok(DocumentType::Pan),
            "eshram" => Ok(DocumentType::Eshram),
            "voter_id" => Ok(DocumentType::VoterId),
            "driving_license" => Ok(DocumentType::DrivingLicense),
            "photo_id" => Ok(DocumentType::PhotoId),
            "address_proof" => Ok(DocumentType::AddressProof),
            "org_proof" => Ok(DocumentType::OrgProof),
            other => Err(format!("Invalid document type: {}", other)),
        }
    }
}

/// Review state shared by KYC documents and worker certifications.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, sqlx::Type, PartialEq)]
#[sqlx(type_name = "review_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    Pending,
    Verified,
    Rejected,
}

impl ReviewStatus {
    pub fn to_str(&self) -> &str {
        match self {
            ReviewStatus::Pending => "pending",
            ReviewStatus::Verified => "verified",
            ReviewStatus::Rejected => "rejected",
        }
    }

    /// A new upload of the same type is refused while one is pending or verified.
    pub fn blocks_resubmission(&self) -> bool {
        matches!(self, ReviewStatus::Pending | ReviewStatus::Verified)
    }
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct DocumentVerification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub document_type: DocumentType,
    pub document_number: Option<String>,
    pub file_path: String,
    pub status: ReviewStatus,
    pub rejection_reason: Option<String>,
    pub verified_by: Option<Uuid>,
    pub verified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct PendingDocument {
    pub id: Uuid,
    pub user_id: Uuid,
    pub document_type: DocumentType,
    pub document_number: Option<String>,
    pub file_path: String,
    pub status: ReviewStatus,
    pub created_at: DateTime<Utc>,
    pub user_name: Option<String>,
    pub user_phone: Option<String>,
    pub user_email: Option<String>,
    pub user_role: UserRole,
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct Certification {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub issuing_org: Option<String>,
    pub validity_months: Option<i32>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct WorkerCertification {
    pub id: Uuid,
    pub worker_id: Uuid,
    pub certification_id: Uuid,
    pub certified_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub verification_status: ReviewStatus,
    pub document_path: Option<String>,
}

/// Worker certification joined with catalog and worker details.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct WorkerCertificationDetail {
    pub id: Uuid,
    pub worker_id: Uuid,
    pub certification_id: Uuid,
    pub certified_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub verification_status: ReviewStatus,
    pub document_path: Option<String>,
    pub certification_name: String,
    pub issuing_org: Option<String>,
    pub worker_name: Option<String>,
    pub worker_phone: Option<String>,
}

/// Overall status from the user's document reviews.
pub fn derive_overall_status(
    role: UserRole,
    documents: &[(DocumentType, ReviewStatus)],
) -> OverallVerificationStatus {
    let verified: Vec<DocumentType> = documents
        .iter()
        .filter(|(_, s)| *s == ReviewStatus::Verified)
        .map(|(t, _)| *t)
        .collect();

    let fully_verified = role
        .required_documents()
        .iter()
        .all(|required| verified.contains(required));

    if fully_verified && (role == UserRole::Admin || !verified.is_empty()) {
        OverallVerificationStatus::Verified
    } else if !verified.is_empty() {
        OverallVerificationStatus::Partial
    } else if documents.iter().any(|(_, s)| *s == ReviewStatus::Pending) {
        OverallVerificationStatus::Pending
    } else {
        OverallVerificationStatus::NotVerified
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_type_from_str() {
        assert_eq!("aadhaar".parse::<DocumentType>(), Ok(DocumentType::Aadhaar));
        assert_eq!(" Voter_ID ".parse::<DocumentType>(), Ok(DocumentType::VoterId));
        assert!("passport".parse::<DocumentType>().is_err());
    }

    #[test]
    fn test_blocks_resubmission() {
        assert!(ReviewStatus::Pending.blocks_resubmission());
        assert!(ReviewStatus::Verified.blocks_resubmission());
        assert!(!ReviewStatus::Rejected.blocks_resubmission());
    }

    #[test]
    fn test_derive_overall_status() {
        use DocumentType::*;
        use ReviewStatus::*;

        assert_eq!(
            derive_overall_status(UserRole::Worker, &[]),
            OverallVerificationStatus::NotVerified
        );
        assert_eq!(
            derive_overall_status(UserRole::Worker, &[(Aadhaar, Pending)]),
            OverallVerificationStatus::Pending
        );
        assert_eq!(
            derive_overall_status(UserRole::Worker, &[(Aadhaar, Verified), (PhotoId, Pending)]),
            OverallVerificationStatus::Partial
        );
        assert_eq!(
            derive_overall_status(UserRole::Worker, &[(Aadhaar, Verified), (PhotoId, Verified)]),
            OverallVerificationStatus::Verified
        );
        assert_eq!(
            derive_overall_status(UserRole::Employer, &[(Pan, Verified), (OrgProof, Rejected)]),
            OverallVerificationStatus::Partial
        );
        assert_eq!(
            derive_overall_status(UserRole::Employer, &[(Pan, Rejected)]),
            OverallVerificationStatus::NotVerified
        );
    }
}
