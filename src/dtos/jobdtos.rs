use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::{jobdb::JobInput, statsdb::EmployerStats},
    dtos::userdtos::FilterUserDto,
    models::{
        jobmodel::*,
        notificationmodel::Notification,
        paymentmodel::{PaymentStatus, PaymentWithDetails, Rating, RatingWithDetails},
        usermodel::parse_skills,
    },
    service::{
        error::ServiceError,
        job_service::{JobSearch, JobSort, JobWithDistance},
    },
    utils::{currency::rupees_from_f64, geo::NEARBY_JOBS_RADIUS_KM, time_ago::time_ago},
};

#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct CreateJobDto {
    #[validate(length(min = 1, max = 100, message = "Title must be between 1-100 characters"))]
    pub title: String,

    #[validate(length(min = 1, message = "Description is required"))]
    pub description: String,

    #[validate(range(min = 1.0, message = "Salary must be at least 1"))]
    pub salary: f64,

    #[serde(default)]
    pub salary_frequency: SalaryFrequency,

    #[validate(length(min = 1, max = 255, message = "Address must be between 1-255 characters"))]
    pub address: String,

    pub latitude: Option<f64>,
    pub longitude: Option<f64>,

    #[validate(length(max = 500, message = "Skills must be at most 500 characters"))]
    pub skills: Option<String>,

    #[serde(default)]
    pub job_type: JobType,

    #[validate(range(min = 1, message = "Duration must be at least 1 day"))]
    pub duration_days: Option<i32>,

    #[serde(default)]
    pub is_urgent: bool,
}

impl CreateJobDto {
    pub fn into_job_input(self) -> Result<JobInput, ServiceError> {
        let (Some(lat), Some(lng)) = (self.latitude, self.longitude) else {
            return Err(ServiceError::validation(
                "Please set the job location using the map pin.",
            ));
        };
        let salary = rupees_from_f64(self.salary)
            .ok_or_else(|| ServiceError::validation("Salary is not a valid amount."))?;

        Ok(JobInput {
            title: self.title.trim().to_string(),
            description: self.description.trim().to_string(),
            location_lat: lat,
            location_lng: lng,
            address: self.address.trim().to_string(),
            salary,
            salary_frequency: self.salary_frequency,
            skills_required: self.skills,
            job_type: self.job_type,
            duration_days: self.duration_days,
            is_urgent: self.is_urgent,
        })
    }
}

/// Query string of the worker's job search.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct JobSearchQueryDto {
    pub keywords: Option<String>,
    /// Kilometres; present but empty means no radius.
    pub distance: Option<String>,
    pub skills: Option<String>,
    pub job_type: Option<String>,
    pub min_salary: Option<f64>,
    pub sort_by: Option<String>,
    pub page: Option<i64>,
}

impl JobSearchQueryDto {
    pub fn to_search(&self) -> Result<JobSearch, ServiceError> {
        let max_distance_km = match self.distance.as_deref().map(str::trim) {
            None => Some(NEARBY_JOBS_RADIUS_KM),
            Some("") => None,
            Some(raw) => Some(
                raw.parse::<f64>()
                    .ok()
                    .filter(|km| km.is_finite() && *km > 0.0)
                    .ok_or_else(|| ServiceError::validation("Distance must be a positive number."))?,
            ),
        };

        let job_type = match self.job_type.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(
                serde_json::from_value::<JobType>(serde_json::Value::String(raw.to_string()))
                    .map_err(|_| ServiceError::validation(format!("Unknown job type: {}", raw)))?,
            ),
        };

        let keywords = self
            .keywords
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string);

        Ok(JobSearch {
            keywords,
            max_distance_km,
            skills: self.skills.as_deref().map(parse_skills).unwrap_or_default(),
            job_type,
            min_salary: self.min_salary.filter(|s| *s > 0.0).and_then(rupees_from_f64),
            sort: JobSort::from_str(self.sort_by.as_deref().unwrap_or(""))?,
            page: self.page.unwrap_or(1).max(1),
        })
    }
}

#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct ApplyJobDto {
    #[validate(length(max = 1000, message = "Message must be at most 1000 characters"))]
    pub message: Option<String>,
}

#[derive(Validate, Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationActionDto {
    #[validate(length(min = 1, message = "Action is required"))]
    pub action: String,
}

#[derive(Validate, Debug, Clone, Serialize, Deserialize)]
pub struct RateWorkerDto {
    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
    pub rating: i32,

    #[validate(length(max = 1000, message = "Feedback must be at most 1000 characters"))]
    pub feedback: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ApplicationListItemDto {
    #[serde(flatten)]
    pub application: ApplicationWithJob,
    pub time_ago: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ApplicantDto {
    #[serde(flatten)]
    pub application: ApplicationWithWorker,
    pub worker_skills_list: Vec<String>,
    pub time_ago: String,
}

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct GroupedApplicationsDto {
    pub pending: Vec<ApplicantDto>,
    pub accepted: Vec<ApplicantDto>,
    pub other: Vec<ApplicantDto>,
}

impl ApplicantDto {
    pub fn new(application: ApplicationWithWorker, now: DateTime<Utc>) -> Self {
        Self {
            worker_skills_list: application
                .worker_skills
                .as_deref()
                .map(parse_skills)
                .unwrap_or_default(),
            time_ago: time_ago(Some(application.applied_at), now),
            application,
        }
    }
}

impl GroupedApplicationsDto {
    pub fn group(applicants: Vec<ApplicantDto>) -> Self {
        let mut grouped = GroupedApplicationsDto::default();
        for applicant in applicants {
            match applicant.application.status {
                ApplicationStatus::Applied | ApplicationStatus::Shortlisted => grouped.pending.push(applicant),
                ApplicationStatus::Accepted => grouped.accepted.push(applicant),
                ApplicationStatus::Rejected | ApplicationStatus::Withdrawn => grouped.other.push(applicant),
            }
        }
        grouped
    }
}

#[derive(Debug, Serialize)]
pub struct EmployerJobDetailDto {
    pub job: Job,
    pub applications: GroupedApplicationsDto,
    pub payment_status: Option<PaymentStatus>,
    pub rating: Option<Rating>,
}

#[derive(Debug, Serialize)]
pub struct ActiveJobSummaryDto {
    #[serde(flatten)]
    pub job: Job,
    pub pending_apps_count: i64,
    pub total_apps_count: i64,
}

#[derive(Debug, Serialize)]
pub struct CompletedJobSummaryDto {
    #[serde(flatten)]
    pub job: Job,
    pub has_rated: bool,
}

#[derive(Debug, Serialize)]
pub struct EmployerDashboardDto {
    pub stats: EmployerStats,
    pub active_jobs: Vec<ActiveJobSummaryDto>,
    pub in_progress_jobs: Vec<Job>,
    pub completed_jobs: Vec<CompletedJobSummaryDto>,
    pub jobs_with_pending_apps: Vec<Uuid>,
    pub recent_notifications: Vec<Notification>,
}

#[derive(Debug, Serialize)]
pub struct WorkerStatsDto {
    pub active_applications: i64,
    pub verified_certs: usize,
    pub completed_jobs: i64,
    pub avg_rating: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct VerificationSummaryDto {
    pub pending_docs: usize,
    pub rejected_docs: usize,
    pub pending_certs: usize,
    pub is_fully_verified: bool,
}

#[derive(Debug, Serialize)]
pub struct WorkerDashboardDto {
    pub stats: WorkerStatsDto,
    pub location_set: bool,
    pub nearby_jobs: Vec<JobWithDistance>,
    pub recent_payments: Vec<PaymentWithDetails>,
    pub profile_completion: i32,
    pub verification_summary: VerificationSummaryDto,
    pub profile_views: i32,
}

/// A worker as an employer sees them before or after hiring.
#[derive(Debug, Serialize)]
pub struct WorkerOverviewDto {
    pub worker: FilterUserDto,
    pub jobs_together: Vec<Job>,
    pub ratings: Vec<RatingWithDetails>,
    pub average_rating: Option<f64>,
    pub ratings_count: i64,
    pub completed_jobs: i64,
}

#[derive(Debug, Serialize)]
pub struct AlertStatusDto {
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SosRequestDto {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

impl SosRequestDto {
    pub fn coordinates(&self) -> Result<(f64, f64), ServiceError> {
        match (self.lat, self.lng) {
            (Some(lat), Some(lng)) if lat.is_finite() && lng.is_finite() => Ok((lat, lng)),
            _ => Err(ServiceError::validation("Location coordinates required")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bigdecimal::BigDecimal;

    fn job_dto() -> CreateJobDto {
        CreateJobDto {
            title: "Plaster two rooms".into(),
            description: "Cement plastering".into(),
            salary: 500.0,
            address: "Banjara Hills".into(),
            latitude: Some(17.41),
            longitude: Some(78.44),
            skills: Some("masonry".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_job_dto_validation() {
        assert!(job_dto().validate().is_ok());

        let mut cheap = job_dto();
        cheap.salary = 0.5;
        assert!(cheap.validate().is_err());

        let mut untitled = job_dto();
        untitled.title = String::new();
        assert!(untitled.validate().is_err());
    }

    #[test]
    fn test_job_input_requires_map_pin() {
        let mut dto = job_dto();
        dto.longitude = None;
        assert!(matches!(dto.into_job_input(), Err(ServiceError::Validation(_))));

        let input = job_dto().into_job_input().unwrap();
        assert_eq!(input.salary, BigDecimal::from(500));
        assert_eq!(input.location_lat, 17.41);
    }

    #[test]
    fn test_search_query_defaults() {
        let search = JobSearchQueryDto::default().to_search().unwrap();
        assert_eq!(search.max_distance_km, Some(NEARBY_JOBS_RADIUS_KM));
        assert_eq!(search.sort, JobSort::Distance);
        assert_eq!(search.page, 1);
        assert!(search.min_salary.is_none());
    }

    #[test]
    fn test_search_query_parsing() {
        let query = JobSearchQueryDto {
            keywords: Some("  ".into()),
            distance: Some(String::new()),
            skills: Some("masonry, plumbing".into()),
            job_type: Some("one-time".into()),
            min_salary: Some(0.0),
            sort_by: Some("salary".into()),
            page: Some(-3),
        };
        let search = query.to_search().unwrap();
        assert!(search.keywords.is_none());
        assert!(search.max_distance_km.is_none());
        assert_eq!(search.skills, vec!["masonry", "plumbing"]);
        assert_eq!(search.job_type, Some(JobType::OneTime));
        assert!(search.min_salary.is_none());
        assert_eq!(search.sort, JobSort::Salary);
        assert_eq!(search.page, 1);

        let bad = JobSearchQueryDto { job_type: Some("gig".into()), ..Default::default() };
        assert!(bad.to_search().is_err());
    }

    #[test]
    fn test_applicants_grouped_by_status() {
        let now = Utc::now();
        let applicant = |status: ApplicationStatus| {
            ApplicantDto::new(
                ApplicationWithWorker {
                    id: Uuid::new_v4(),
                    job_id: Uuid::new_v4(),
                    worker_id: Uuid::new_v4(),
                    status,
                    message: None,
                    applied_at: now,
                    worker_name: Some("Suresh".into()),
                    worker_phone: None,
                    worker_skills: Some("plumbing, masonry".into()),
                    worker_experience_years: None,
                    worker_avg_rating: None,
                },
                now,
            )
        };

        let first = applicant(ApplicationStatus::Applied);
        assert_eq!(first.worker_skills_list, vec!["plumbing", "masonry"]);
        assert_eq!(first.time_ago, "just now");

        let grouped = GroupedApplicationsDto::group(vec![
            first,
            applicant(ApplicationStatus::Shortlisted),
            applicant(ApplicationStatus::Accepted),
            applicant(ApplicationStatus::Withdrawn),
        ]);
        assert_eq!(grouped.pending.len(), 2);
        assert_eq!(grouped.accepted.len(), 1);
        assert_eq!(grouped.other.len(), 1);
    }

    #[test]
    fn test_sos_coordinates_required() {
        assert!(SosRequestDto { lat: Some(17.4), lng: None }.coordinates().is_err());
        assert_eq!(SosRequestDto { lat: Some(17.4), lng: Some(78.4) }.coordinates().unwrap(), (17.4, 78.4));
    }
}
