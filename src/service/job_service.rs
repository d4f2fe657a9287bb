// service/job_service.rs
use std::str::FromStr;
use std::sync::Arc;

use serde::Serialize;
use sqlx::types::BigDecimal;
use uuid::Uuid;

use crate::{
    db::{
        db::DBClient,
        jobdb::{JobExt, JobInput, JobSearchFilter},
        paymentdb::PaymentExt,
        userdb::UserExt,
    },
    dtos::responsedtos::Paginated,
    models::{
        jobmodel::{Application, ApplicationStatus, Job, JobStatus, JobType},
        paymentmodel::Rating,
        usermodel::{User, UserRole},
    },
    service::{
        error::ServiceError,
        notification_service::NotificationService,
        profile_service::ProfileService,
    },
    utils::geo::{within_radius, GeoPoint, NEARBY_JOBS_RADIUS_KM},
};

pub const MIN_COMPLETION_TO_APPLY: i32 = 50;
pub const JOBS_PER_PAGE: i64 = 10;

#[derive(Debug, Clone, Serialize)]
pub struct JobWithDistance {
    #[serde(flatten)]
    pub job: Job,
    pub distance_km: f64,
}

impl JobWithDistance {
    fn new(job: Job, distance: f64) -> Self {
        Self {
            job,
            distance_km: (distance * 100.0).round() / 100.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum JobSort {
    #[default]
    Distance,
    Date,
    Salary,
}

impl FromStr for JobSort {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" | "distance" => Ok(JobSort::Distance),
            "date" => Ok(JobSort::Date),
            "salary" => Ok(JobSort::Salary),
            other => Err(ServiceError::validation(format!("Unknown sort order: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct JobSearch {
    pub keywords: Option<String>,
    /// None searches without a radius.
    pub max_distance_km: Option<f64>,
    pub skills: Vec<String>,
    pub job_type: Option<JobType>,
    pub min_salary: Option<BigDecimal>,
    pub sort: JobSort,
    pub page: i64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ApplicationAction {
    Accept,
    Reject,
    Complete,
}

impl FromStr for ApplicationAction {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "accept" => Ok(ApplicationAction::Accept),
            "reject" => Ok(ApplicationAction::Reject),
            "complete" => Ok(ApplicationAction::Complete),
            _ => Err(ServiceError::validation("Invalid action.")),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ApplyOutcome {
    pub application: Application,
    pub reapplied: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RatingOutcome {
    pub rating: Rating,
    pub created: bool,
}

/// Keeps `duration_days` only for contract work.
pub fn normalize_job_input(mut input: JobInput) -> JobInput {
    if input.job_type != JobType::Contract {
        input.duration_days = None;
    }
    input.skills_required = input
        .skills_required
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());
    input
}

/// Radius filter plus the requested ordering.
pub fn rank_jobs(origin: GeoPoint, jobs: Vec<Job>, max_km: Option<f64>, sort: JobSort) -> Vec<JobWithDistance> {
    let mut ranked: Vec<JobWithDistance> = within_radius(origin, jobs, max_km, Job::location)
        .into_iter()
        .map(|(job, d)| JobWithDistance::new(job, d))
        .collect();

    match sort {
        JobSort::Distance => {}
        JobSort::Date => ranked.sort_by(|a, b| b.job.created_at.cmp(&a.job.created_at)),
        JobSort::Salary => ranked.sort_by(|a, b| b.job.salary.cmp(&a.job.salary)),
    }
    ranked
}

#[derive(Debug, Clone)]
pub struct JobService {
    db_client: Arc<DBClient>,
    notifications: Arc<NotificationService>,
    profiles: Arc<ProfileService>,
}

impl JobService {
    pub fn new(
        db_client: Arc<DBClient>,
        notifications: Arc<NotificationService>,
        profiles: Arc<ProfileService>,
    ) -> Self {
        Self {
            db_client,
            notifications,
            profiles,
        }
    }

    pub async fn post_job(&self, employer_id: Uuid, input: JobInput) -> Result<Job, ServiceError> {
        let job = self
            .db_client
            .create_job(employer_id, normalize_job_input(input))
            .await?;

        tracing::info!("Job {} posted by employer {}", job.id, employer_id);
        Ok(job)
    }

    /// The employer's own job; someone else's reads as missing.
    pub async fn get_owned_job(&self, employer_id: Uuid, job_id: Uuid) -> Result<Job, ServiceError> {
        self.db_client
            .get_job(job_id)
            .await?
            .filter(|job| job.employer_id == employer_id)
            .ok_or(ServiceError::JobNotFound(job_id))
    }

    pub async fn edit_job(&self, employer_id: Uuid, job_id: Uuid, input: JobInput) -> Result<Job, ServiceError> {
        let job = self.get_owned_job(employer_id, job_id).await?;
        if job.status != JobStatus::Active {
            return Err(ServiceError::InvalidJobStatus(job.status, JobStatus::Active));
        }

        let updated = self
            .db_client
            .update_job(job_id, normalize_job_input(input))
            .await?;
        Ok(updated)
    }

    pub async fn apply(&self, worker: &User, job_id: Uuid, message: Option<String>) -> Result<ApplyOutcome, ServiceError> {
        let job = self
            .db_client
            .get_job(job_id)
            .await?
            .ok_or(ServiceError::JobNotFound(job_id))?;

        if job.status != JobStatus::Active {
            return Err(ServiceError::validation("This job is no longer accepting applications."));
        }

        let message = message.map(|m| m.trim().to_string()).filter(|m| !m.is_empty());

        let (application, reapplied) = match self.db_client.get_application_for(job_id, worker.id).await? {
            Some(existing) if existing.status != ApplicationStatus::Withdrawn => {
                return Err(ServiceError::validation(format!(
                    "You have already applied for this job (status: {}).",
                    existing.status.to_str()
                )));
            }
            Some(withdrawn) => (
                self.db_client.reactivate_application(withdrawn.id, message).await?,
                true,
            ),
            None => {
                let snapshot = self.profiles.snapshot(worker).await?;
                if snapshot.profile_completion < MIN_COMPLETION_TO_APPLY {
                    return Err(ServiceError::validation(format!(
                        "Complete at least {}% of your profile before applying (currently {}%).",
                        MIN_COMPLETION_TO_APPLY, snapshot.profile_completion
                    )));
                }
                (self.db_client.create_application(job_id, worker.id, message).await?, false)
            }
        };

        self.notifications
            .notify(
                job.employer_id,
                "New Job Application",
                &format!("Application received for '{}' from {}.", job.title, worker.display_name()),
                Some(&format!("/api/employer/jobs/{}/applications", job.id)),
            )
            .await;

        Ok(ApplyOutcome { application, reapplied })
    }

    pub async fn withdraw(&self, worker_id: Uuid, application_id: Uuid) -> Result<Application, ServiceError> {
        let application = self
            .db_client
            .get_application(application_id)
            .await?
            .filter(|a| a.worker_id == worker_id)
            .ok_or(ServiceError::ApplicationNotFound(application_id))?;

        if !application.status.can_withdraw() {
            return Err(ServiceError::InvalidApplicationStatus(application.status));
        }

        let updated = self
            .db_client
            .update_application_status(application_id, ApplicationStatus::Withdrawn)
            .await?;
        Ok(updated)
    }

    pub async fn application_action(
        &self,
        employer_id: Uuid,
        application_id: Uuid,
        action: ApplicationAction,
    ) -> Result<Application, ServiceError> {
        let application = self
            .db_client
            .get_application(application_id)
            .await?
            .ok_or(ServiceError::ApplicationNotFound(application_id))?;

        let job = self
            .db_client
            .get_job(application.job_id)
            .await?
            .ok_or(ServiceError::JobNotFound(application.job_id))?;

        if job.employer_id != employer_id {
            return Err(ServiceError::Forbidden);
        }

        let (updated, title, message) = match action {
            ApplicationAction::Accept => {
                if job.status != JobStatus::Active {
                    return Err(ServiceError::InvalidJobStatus(job.status, JobStatus::Active));
                }
                let accepted = self
                    .db_client
                    .accept_application(application_id, job.id)
                    .await?
                    // Lost a race with another accept on the same job
                    .ok_or(ServiceError::InvalidJobStatus(JobStatus::InProgress, JobStatus::Active))?;
                (
                    accepted,
                    "Application Accepted",
                    format!("Your application for '{}' was accepted!", job.title),
                )
            }
            ApplicationAction::Reject => {
                let rejected = self
                    .db_client
                    .update_application_status(application_id, ApplicationStatus::Rejected)
                    .await?;
                (
                    rejected,
                    "Application Update",
                    format!(
                        "Regarding your application for '{}', the employer has chosen another candidate.",
                        job.title
                    ),
                )
            }
            ApplicationAction::Complete => {
                if application.status != ApplicationStatus::Accepted {
                    return Err(ServiceError::InvalidApplicationStatus(application.status));
                }
                if job.status != JobStatus::InProgress {
                    return Err(ServiceError::InvalidJobStatus(job.status, JobStatus::InProgress));
                }
                self.db_client.complete_job(job.id).await?;
                (
                    application,
                    "Job Completed",
                    format!("Job '{}' has been marked complete by the employer.", job.title),
                )
            }
        };

        tracing::info!(
            "Employer {} applied {:?} to application {}",
            employer_id,
            action,
            application_id
        );

        self.notifications
            .notify(updated.worker_id, title, &message, Some("/api/worker/applications"))
            .await;

        Ok(updated)
    }

    /// Active jobs near the worker that mention every one of their skills.
    pub async fn nearby_jobs(&self, worker: &User, max_km: f64) -> Result<Vec<JobWithDistance>, ServiceError> {
        let Some(origin) = worker.location() else {
            return Ok(Vec::new());
        };

        let skills = worker.skills_list();
        let jobs: Vec<Job> = self
            .db_client
            .get_active_jobs_with_location()
            .await?
            .into_iter()
            .filter(|job| job.matches_all_skills(&skills))
            .collect();

        Ok(rank_jobs(origin, jobs, Some(max_km), JobSort::Distance))
    }

    pub async fn default_nearby_jobs(&self, worker: &User) -> Result<Vec<JobWithDistance>, ServiceError> {
        self.nearby_jobs(worker, NEARBY_JOBS_RADIUS_KM).await
    }

    pub async fn search_jobs(&self, worker: &User, search: JobSearch) -> Result<Paginated<JobWithDistance>, ServiceError> {
        let origin = worker.location().ok_or_else(|| {
            ServiceError::validation("Set your location on your profile to search for jobs.")
        })?;

        let filter = JobSearchFilter {
            keywords: search.keywords,
            job_type: search.job_type,
            min_salary: search.min_salary.filter(|s| *s > BigDecimal::from(0)),
            skills: search
                .skills
                .into_iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        };

        let jobs = self.db_client.search_active_jobs(&filter).await?;
        let ranked = rank_jobs(origin, jobs, search.max_distance_km, search.sort);

        Ok(Paginated::from_vec(ranked, search.page.max(1), JOBS_PER_PAGE))
    }

    pub async fn rate_worker(
        &self,
        employer_id: Uuid,
        job_id: Uuid,
        rating: i32,
        feedback: Option<String>,
    ) -> Result<RatingOutcome, ServiceError> {
        let job = self.get_owned_job(employer_id, job_id).await?;
        if job.status != JobStatus::Completed {
            return Err(ServiceError::InvalidJobStatus(job.status, JobStatus::Completed));
        }

        let accepted = self
            .db_client
            .get_accepted_application(job_id)
            .await?
            .ok_or_else(|| ServiceError::validation("No worker was hired for this job."))?;

        let existing = self.db_client.get_rating_for_job(job_id, employer_id).await?;
        let feedback = feedback.map(|f| f.trim().to_string()).filter(|f| !f.is_empty());

        let rating = self
            .db_client
            .upsert_rating(job_id, accepted.worker_id, employer_id, rating, feedback)
            .await?;

        Ok(RatingOutcome {
            rating,
            created: existing.is_none(),
        })
    }

    /// A worker account as seen by an employer; other roles read as missing.
    pub async fn get_worker(&self, worker_id: Uuid) -> Result<User, ServiceError> {
        self.db_client
            .get_user(Some(worker_id), None, None, None)
            .await?
            .filter(|u| u.role == UserRole::Worker)
            .ok_or(ServiceError::UserNotFound(worker_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::Config,
        db::{fixtures, userdb::ProfileUpdate},
        models::{jobmodel::sample_job, paymentmodel::{PaymentMethod, PaymentStatus}},
        service::payment_service::{PaymentInitiation, WorkerPaymentAction},
        AppState,
    };
    use chrono::Duration;
    use sqlx::PgPool;

    fn job_at(lat: f64, lng: f64, salary: i64, age_hours: i64) -> Job {
        let mut job = sample_job(Uuid::new_v4());
        job.location_lat = Some(lat);
        job.location_lng = Some(lng);
        job.salary = BigDecimal::from(salary);
        job.created_at = job.created_at - Duration::hours(age_hours);
        job
    }

    #[test]
    fn test_rank_by_distance_filters_radius() {
        let origin = GeoPoint::new(17.385, 78.4867);
        let near = job_at(17.39, 78.49, 400, 1);
        let mid = job_at(17.45, 78.50, 600, 2);
        let far = job_at(19.07, 72.87, 900, 3); // Mumbai

        let ranked = rank_jobs(origin, vec![mid.clone(), far, near.clone()], Some(25.0), JobSort::Distance);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].job.id, near.id);
        assert_eq!(ranked[1].job.id, mid.id);
        assert!(ranked[0].distance_km <= ranked[1].distance_km);
    }

    #[test]
    fn test_rank_unlimited_and_sorted_by_salary_and_date() {
        let origin = GeoPoint::new(17.385, 78.4867);
        let cheap_new = job_at(17.39, 78.49, 300, 1);
        let rich_old = job_at(19.07, 72.87, 900, 48);

        let by_salary = rank_jobs(origin, vec![cheap_new.clone(), rich_old.clone()], None, JobSort::Salary);
        assert_eq!(by_salary.len(), 2);
        assert_eq!(by_salary[0].job.id, rich_old.id);

        let by_date = rank_jobs(origin, vec![rich_old, cheap_new.clone()], None, JobSort::Date);
        assert_eq!(by_date[0].job.id, cheap_new.id);
    }

    #[test]
    fn test_job_without_coordinates_never_ranks() {
        let origin = GeoPoint::new(17.385, 78.4867);
        let mut job = sample_job(Uuid::new_v4());
        job.location_lat = None;
        assert!(rank_jobs(origin, vec![job], None, JobSort::Distance).is_empty());
    }

    #[test]
    fn test_duration_kept_only_for_contract() {
        let job = sample_job(Uuid::new_v4());
        let input = JobInput {
            title: job.title,
            description: job.description,
            location_lat: 17.4,
            location_lng: 78.45,
            address: "Banjara Hills".into(),
            salary: job.salary,
            salary_frequency: job.salary_frequency,
            skills_required: Some("  ".into()),
            job_type: JobType::OneTime,
            duration_days: Some(5),
            is_urgent: false,
        };

        let one_time = normalize_job_input(input.clone());
        assert_eq!(one_time.duration_days, None);
        assert_eq!(one_time.skills_required, None);

        let contract = normalize_job_input(JobInput { job_type: JobType::Contract, ..input });
        assert_eq!(contract.duration_days, Some(5));
    }

    #[test]
    fn test_parse_actions_and_sort() {
        assert_eq!("accept".parse::<ApplicationAction>().unwrap(), ApplicationAction::Accept);
        assert!("archive".parse::<ApplicationAction>().is_err());
        assert_eq!("".parse::<JobSort>().unwrap(), JobSort::Distance);
        assert_eq!("salary".parse::<JobSort>().unwrap(), JobSort::Salary);
        assert!("rating".parse::<JobSort>().is_err());
    }

    async fn experienced_worker(db: &DBClient, name: &str, phone: &str) -> User {
        let worker = fixtures::worker(db, name, phone).await;
        db.update_profile(
            worker.id,
            ProfileUpdate {
                experience_years: Some(6),
                ..Default::default()
            },
        )
        .await
        .unwrap()
    }

    #[sqlx::test]
    #[ignore] // Requires DATABASE_URL pointing at Postgres
    async fn test_job_lifecycle_from_posting_to_rating(pool: PgPool) {
        let state = AppState::new(
            Arc::new(DBClient::new(pool)),
            Config::test_config(),
            reqwest::Client::new(),
        );
        let db = state.db_client.clone();
        let jobs = &state.job_service;
        let payments = &state.payment_service;

        let employer = fixtures::employer(&db, "site@sharma.in").await;
        let worker = experienced_worker(&db, "Ramesh", "+919876543210").await;
        let rival = experienced_worker(&db, "Suresh", "+919876543211").await;

        let job = jobs
            .post_job(employer.id, fixtures::job_input("Wall plastering"))
            .await
            .unwrap();
        assert_eq!(job.status, JobStatus::Active);

        let applied = jobs
            .apply(&worker, job.id, Some("Can start tomorrow".into()))
            .await
            .unwrap();
        assert!(!applied.reapplied);
        let rival_application = jobs.apply(&rival, job.id, None).await.unwrap().application;

        let early = jobs.rate_worker(employer.id, job.id, 5, None).await;
        assert!(matches!(early, Err(ServiceError::InvalidJobStatus(JobStatus::Active, JobStatus::Completed))));

        let accepted = jobs
            .application_action(employer.id, applied.application.id, ApplicationAction::Accept)
            .await
            .unwrap();
        assert_eq!(accepted.status, ApplicationStatus::Accepted);

        let rival_application = db.get_application(rival_application.id).await.unwrap().unwrap();
        assert_eq!(rival_application.status, ApplicationStatus::Rejected);
        assert_eq!(db.get_job(job.id).await.unwrap().unwrap().status, JobStatus::InProgress);

        let reaccept = jobs
            .application_action(employer.id, rival_application.id, ApplicationAction::Accept)
            .await;
        assert!(matches!(reaccept, Err(ServiceError::InvalidJobStatus(JobStatus::InProgress, JobStatus::Active))));

        jobs.application_action(employer.id, accepted.id, ApplicationAction::Complete)
            .await
            .unwrap();
        assert_eq!(db.get_job(job.id).await.unwrap().unwrap().status, JobStatus::Completed);

        let initiation = payments
            .initiate_payment(employer.id, accepted.id, PaymentMethod::Cash)
            .await
            .unwrap();
        assert!(matches!(initiation, PaymentInitiation::RecordPayment { job_id, .. } if job_id == job.id));

        let recorded = payments
            .record_manual_payment(employer.id, accepted.id, BigDecimal::from(800), PaymentMethod::Cash, None)
            .await
            .unwrap();
        assert_eq!(recorded.status, PaymentStatus::Pending);
        assert_eq!(recorded.worker_id, worker.id);

        let confirmed = payments
            .worker_verify(&worker, recorded.id, WorkerPaymentAction::Confirm)
            .await
            .unwrap();
        assert_eq!(confirmed.status, PaymentStatus::Verified);

        let late_dispute = payments
            .worker_verify(&worker, recorded.id, WorkerPaymentAction::Dispute)
            .await;
        assert!(matches!(late_dispute, Err(ServiceError::InvalidPaymentStatus(PaymentStatus::Verified))));

        let first = jobs
            .rate_worker(employer.id, job.id, 4, Some("  ".into()))
            .await
            .unwrap();
        assert!(first.created);
        assert_eq!(first.rating.worker_id, worker.id);
        assert_eq!(first.rating.feedback, None);

        let revised = jobs
            .rate_worker(employer.id, job.id, 5, Some("Neat work".into()))
            .await
            .unwrap();
        assert!(!revised.created);
        assert_eq!(revised.rating.id, first.rating.id);

        let summary = db.get_worker_rating_summary(worker.id).await.unwrap();
        assert_eq!(summary.count, 1);
        assert_eq!(summary.average, Some(5.0));
    }
}
