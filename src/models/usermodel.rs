//1
use chrono::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::verificationmodels::DocumentType;
use crate::utils::geo::GeoPoint;

#[derive(Debug, Deserialize, Serialize, Clone, Copy, sqlx::Type, PartialEq, Eq, Hash)]
#[sqlx(type_name = "user_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Worker,
    Employer,
    Admin,
}

impl UserRole {
    pub fn to_str(&self) -> &str {
        match self {
            UserRole::Worker => "worker",
            UserRole::Employer => "employer",
            UserRole::Admin => "admin",
        }
    }

    /// Document types that must be verified before the user counts as fully verified.
    pub fn required_documents(&self) -> &'static [DocumentType] {
        match self {
            UserRole::Worker => &[DocumentType::Aadhaar, DocumentType::PhotoId],
            UserRole::Employer => &[DocumentType::Pan, DocumentType::OrgProof],
            UserRole::Admin => &[],
        }
    }
}

/// Roles a user may pick at sign-up; admins are provisioned out of band.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SignupRole {
    #[default]
    Worker,
    Employer,
}

impl From<SignupRole> for UserRole {
    fn from(role: SignupRole) -> Self {
        match role {
            SignupRole::Worker => UserRole::Worker,
            SignupRole::Employer => UserRole::Employer,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, sqlx::Type, PartialEq)]
#[sqlx(type_name = "overall_verification_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OverallVerificationStatus {
    NotVerified,
    Pending,
    Partial,
    Verified,
}

impl OverallVerificationStatus {
    pub fn to_str(&self) -> &str {
        match self {
            OverallVerificationStatus::NotVerified => "not_verified",
            OverallVerificationStatus::Pending => "pending",
            OverallVerificationStatus::Partial => "partial",
            OverallVerificationStatus::Verified => "verified",
        }
    }
}

#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone)]
pub struct User {
    pub id: Uuid,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    #[serde(skip_serializing)]
    pub google_id: Option<String>,
    pub role: UserRole,
    pub language: String,
    pub is_phone_verified: bool,
    pub is_email_verified: bool,
    pub is_active: bool,
    pub location_lat: Option<f64>,
    pub location_lng: Option<f64>,
    pub location_address: Option<String>,
    pub location_updated_at: Option<DateTime<Utc>>,
    pub skills: Option<String>,
    pub experience_years: Option<i32>,
    pub voice_sample_path: Option<String>,
    pub profile_views: i32,
    pub org_name: Option<String>,
    pub org_type: Option<String>,
    pub overall_verification_status: OverallVerificationStatus,
    #[serde(skip_serializing)]
    pub otp: Option<String>,
    #[serde(skip_serializing)]
    pub otp_expiry: Option<DateTime<Utc>>,
    #[serde(skip_serializing)]
    pub email_verification_token: Option<String>,
    #[serde(skip_serializing)]
    pub password_reset_token: Option<String>,
    #[serde(skip_serializing)]
    pub token_expiry: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

pub fn parse_skills(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn join_skills(skills: &[String]) -> String {
    skills
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(",")
}

impl User {
    pub fn skills_list(&self) -> Vec<String> {
        self.skills.as_deref().map(parse_skills).unwrap_or_default()
    }

    pub fn location(&self) -> Option<GeoPoint> {
        GeoPoint::from_options(self.location_lat, self.location_lng)
    }

    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .or_else(|| self.phone.clone())
            .unwrap_or_else(|| "Unknown".to_string())
    }

    /// True when every document the role requires is among `verified_types`.
    pub fn is_fully_verified(&self, verified_types: &[DocumentType]) -> bool {
        self.role
            .required_documents()
            .iter()
            .all(|required| verified_types.contains(required))
    }

    /// Integer percentage of the profile checklist for the user's role.
    pub fn profile_completion(&self, fully_verified: bool, has_certification: bool) -> i32 {
        let has_text = |v: &Option<String>| v.as_deref().map_or(false, |s| !s.trim().is_empty());

        let checks: Vec<bool> = match self.role {
            UserRole::Admin => return 100,
            UserRole::Worker => vec![
                has_text(&self.name),
                has_text(&self.skills),
                self.experience_years.is_some(),
                fully_verified,
                has_certification,
            ],
            UserRole::Employer => vec![
                has_text(&self.name),
                has_text(&self.org_name),
                has_text(&self.org_type),
                fully_verified,
            ],
        };

        let completed = checks.iter().filter(|done| **done).count() as i32;
        completed * 100 / checks.len() as i32
    }
}

#[cfg(test)]
pub(crate) fn sample_user(role: UserRole) -> User {
    let now = Utc::now();
    User {
        id: Uuid::new_v4(),
        name: None,
        email: None,
        phone: None,
        password_hash: None,
        google_id: None,
        role,
        language: "en".to_string(),
        is_phone_verified: false,
        is_email_verified: false,
        is_active: true,
        location_lat: None,
        location_lng: None,
        location_address: None,
        location_updated_at: None,
        skills: None,
        experience_years: None,
        voice_sample_path: None,
        profile_views: 0,
        org_name: None,
        org_type: None,
        overall_verification_status: OverallVerificationStatus::NotVerified,
        otp: None,
        otp_expiry: None,
        email_verification_token: None,
        password_reset_token: None,
        token_expiry: None,
        created_at: now,
        updated_at: now,
        last_login_at: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skills_parsing() {
        assert_eq!(parse_skills(" masonry, plumbing ,,painting "), vec!["masonry", "plumbing", "painting"]);
        assert!(parse_skills("").is_empty());
        assert_eq!(
            join_skills(&["masonry".to_string(), " ".to_string(), " plumbing ".to_string()]),
            "masonry,plumbing"
        );
    }

    #[test]
    fn test_is_fully_verified_by_role() {
        let worker = sample_user(UserRole::Worker);
        assert!(!worker.is_fully_verified(&[DocumentType::Aadhaar]));
        assert!(worker.is_fully_verified(&[DocumentType::PhotoId, DocumentType::Aadhaar, DocumentType::Pan]));

        let employer = sample_user(UserRole::Employer);
        assert!(!employer.is_fully_verified(&[DocumentType::Aadhaar, DocumentType::PhotoId]));
        assert!(employer.is_fully_verified(&[DocumentType::Pan, DocumentType::OrgProof]));

        assert!(sample_user(UserRole::Admin).is_fully_verified(&[]));
    }

    #[test]
    fn test_worker_profile_completion() {
        let mut worker = sample_user(UserRole::Worker);
        assert_eq!(worker.profile_completion(false, false), 0);

        worker.name = Some("Ravi".to_string());
        worker.skills = Some("masonry".to_string());
        assert_eq!(worker.profile_completion(false, false), 40);

        worker.experience_years = Some(0);
        assert_eq!(worker.profile_completion(false, false), 60);
        assert_eq!(worker.profile_completion(true, true), 100);
    }

    #[test]
    fn test_employer_and_admin_completion() {
        let mut employer = sample_user(UserRole::Employer);
        employer.name = Some("Asha".to_string());
        assert_eq!(employer.profile_completion(false, false), 25);
        employer.org_name = Some("Asha Builders".to_string());
        employer.org_type = Some("company".to_string());
        assert_eq!(employer.profile_completion(false, false), 75);

        assert_eq!(sample_user(UserRole::Admin).profile_completion(false, false), 100);
    }

    #[test]
    fn test_display_name_fallbacks() {
        let mut user = sample_user(UserRole::Worker);
        assert_eq!(user.display_name(), "Unknown");
        user.phone = Some("+919876543210".to_string());
        assert_eq!(user.display_name(), "+919876543210");
        user.name = Some("Ravi".to_string());
        assert_eq!(user.display_name(), "Ravi");
    }
}
