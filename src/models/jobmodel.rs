// models/jobmodel.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::BigDecimal;
use uuid::Uuid;

use crate::utils::geo::GeoPoint;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq)]
#[sqlx(type_name = "job_status", rename_all = "snake_case")]
#[serde(rename_all = "kebab-case")]
pub enum JobStatus {
    Active,
    InProgress,
    Completed,
}

impl JobStatus {
    pub fn to_str(&self) -> &str {
        match self {
            JobStatus::Active => "active",
            JobStatus::InProgress => "in-progress",
            JobStatus::Completed => "completed",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq, Default)]
#[sqlx(type_name = "job_type", rename_all = "snake_case")]
#[serde(rename_all = "kebab-case")]
pub enum JobType {
    #[default]
    OneTime,
    Contract,
    Recurring,
}

impl JobType {
    pub fn to_str(&self) -> &str {
        match self {
            JobType::OneTime => "one-time",
            JobType::Contract => "contract",
            JobType::Recurring => "recurring",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq, Default)]
#[sqlx(type_name = "salary_frequency", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SalaryFrequency {
    #[default]
    Daily,
    Weekly,
    Monthly,
    Fixed,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq)]
#[sqlx(type_name = "application_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Applied,
    Shortlisted,
    Accepted,
    Rejected,
    Withdrawn,
}

impl ApplicationStatus {
    pub fn to_str(&self) -> &str {
        match self {
            ApplicationStatus::Applied => "applied",
            ApplicationStatus::Shortlisted => "shortlisted",
            ApplicationStatus::Accepted => "accepted",
            ApplicationStatus::Rejected => "rejected",
            ApplicationStatus::Withdrawn => "withdrawn",
        }
    }

    pub fn can_withdraw(&self) -> bool {
        matches!(self, ApplicationStatus::Applied | ApplicationStatus::Shortlisted)
    }
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct Job {
    pub id: Uuid,
    pub employer_id: Uuid,
    pub title: String,
    pub description: String,
    pub location_lat: Option<f64>,
    pub location_lng: Option<f64>,
    pub address: Option<String>,
    pub salary: BigDecimal,
    pub salary_frequency: SalaryFrequency,
    pub skills_required: Option<String>,
    pub status: JobStatus,
    pub job_type: JobType,
    pub duration_days: Option<i32>,
    pub is_urgent: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn location(&self) -> Option<GeoPoint> {
        GeoPoint::from_options(self.location_lat, self.location_lng)
    }

    /// Every worker skill must appear (case-insensitively) in the job's skill text.
    pub fn matches_all_skills(&self, skills: &[String]) -> bool {
        let required = self.skills_required.as_deref().unwrap_or("").to_lowercase();
        skills
            .iter()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .all(|s| required.contains(&s))
    }
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct Application {
    pub id: Uuid,
    pub job_id: Uuid,
    pub worker_id: Uuid,
    pub status: ApplicationStatus,
    pub message: Option<String>,
    pub applied_at: DateTime<Utc>,
}

/// Application with the job and employer it belongs to, for the worker's list.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct ApplicationWithJob {
    pub id: Uuid,
    pub job_id: Uuid,
    pub status: ApplicationStatus,
    pub message: Option<String>,
    pub applied_at: DateTime<Utc>,
    pub job_title: String,
    pub job_status: JobStatus,
    pub salary: BigDecimal,
    pub salary_frequency: SalaryFrequency,
    pub employer_id: Uuid,
    pub employer_name: Option<String>,
}

/// Application with applicant details, for the employer's view.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct ApplicationWithWorker {
    pub id: Uuid,
    pub job_id: Uuid,
    pub worker_id: Uuid,
    pub status: ApplicationStatus,
    pub message: Option<String>,
    pub applied_at: DateTime<Utc>,
    pub worker_name: Option<String>,
    pub worker_phone: Option<String>,
    pub worker_skills: Option<String>,
    pub worker_experience_years: Option<i32>,
    pub worker_avg_rating: Option<f64>,
}

#[cfg(test)]
pub(crate) fn sample_job(employer_id: Uuid) -> Job {
    let now = Utc::now();
    Job {
        id: Uuid::new_v4(),
        employer_id,
        title: "Wall plastering".to_string(),
        description: "Plaster two rooms".to_string(),
        location_lat: Some(17.4),
        location_lng: Some(78.45),
        address: Some("Banjara Hills".to_string()),
        salary: BigDecimal::from(500),
        salary_frequency: SalaryFrequency::Daily,
        skills_required: Some("Masonry, Plastering".to_string()),
        status: JobStatus::Active,
        job_type: JobType::OneTime,
        duration_days: None,
        is_urgent: false,
        created_at: now,
        updated_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_all_skills() {
        let job = sample_job(Uuid::new_v4());
        assert!(job.matches_all_skills(&[]));
        assert!(job.matches_all_skills(&["masonry".to_string()]));
        assert!(job.matches_all_skills(&["MASONRY".to_string(), "plaster".to_string()]));
        assert!(!job.matches_all_skills(&["masonry".to_string(), "plumbing".to_string()]));
    }

    #[test]
    fn test_status_wire_names() {
        assert_eq!(serde_json::to_string(&JobStatus::InProgress).unwrap(), "\"in-progress\"");
        assert_eq!(serde_json::to_string(&JobType::OneTime).unwrap(), "\"one-time\"");
        assert_eq!(JobStatus::InProgress.to_str(), "in-progress");
    }

    #[test]
    fn test_can_withdraw() {
        assert!(ApplicationStatus::Applied.can_withdraw());
        assert!(ApplicationStatus::Shortlisted.can_withdraw());
        assert!(!ApplicationStatus::Accepted.can_withdraw());
        assert!(!ApplicationStatus::Withdrawn.can_withdraw());
    }
}
