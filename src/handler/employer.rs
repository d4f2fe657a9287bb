use std::str::FromStr;
use std::sync::Arc;

use axum::{
    extract::{Path, Query},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::{
        jobdb::JobExt, notificationdb::NotificationExt, paymentdb::PaymentExt, statsdb::StatsExt,
    },
    dtos::{
        jobdtos::*,
        paymentdtos::{InitiatePaymentDto, RecordPaymentDto},
        responsedtos::{ApiResponse, PageQueryDto, Paginated},
        userdtos::{FilterUserDto, ProfileUpdateResponseDto, UpdateEmployerProfileDto, UserProfileDto},
    },
    error::HttpError,
    handler::documents::upload_document,
    middleware::{role_check, JWTAuthMiddeware},
    models::{jobmodel::JobStatus, usermodel::UserRole},
    service::{error::ServiceError, job_service::ApplicationAction, profile_service::ProfileChanges},
    utils::currency::rupees_from_f64,
    AppState,
};

const PAYMENTS_PER_PAGE: i64 = 10;
const DASHBOARD_NOTIFICATIONS: i64 = 5;
const WORKER_RATINGS_SHOWN: i64 = 10;

pub fn employer_handler() -> Router {
    Router::new()
        .route("/dashboard", get(dashboard))
        .route("/profile", get(get_profile).put(update_profile))
        .route("/documents", post(upload_document))
        .route("/jobs", post(post_job))
        .route("/jobs/:job_id", get(view_job).put(edit_job))
        .route("/jobs/:job_id/applications", get(list_applications))
        .route("/jobs/:job_id/rating", post(rate_worker))
        .route("/applications/:application_id/action", post(application_action))
        .route("/applications/:application_id/payment", post(initiate_payment))
        .route("/applications/:application_id/record-payment", post(record_payment))
        .route("/payments", get(payment_history))
        .route("/workers/:worker_id", get(view_worker))
        .layer(middleware::from_fn(|state, req, next| {
            role_check(state, req, next, vec![UserRole::Employer])
        }))
}

pub async fn dashboard(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    let employer_id = auth.user.id;

    let stats = app_state.db_client.get_employer_stats(employer_id).await?;
    let jobs = app_state.db_client.get_employer_jobs(employer_id).await?;
    let counts = app_state.db_client.get_job_application_counts(employer_id).await?;
    let rated = app_state.db_client.get_rated_job_ids(employer_id).await?;
    let recent_notifications = app_state
        .db_client
        .get_recent_notifications(employer_id, DASHBOARD_NOTIFICATIONS)
        .await?;

    let mut active_jobs = Vec::new();
    let mut in_progress_jobs = Vec::new();
    let mut completed_jobs = Vec::new();

    for job in jobs {
        match job.status {
            JobStatus::Active => {
                let count = counts.iter().find(|c| c.job_id == job.id);
                active_jobs.push(ActiveJobSummaryDto {
                    pending_apps_count: count.map_or(0, |c| c.pending_apps_count),
                    total_apps_count: count.map_or(0, |c| c.total_apps_count),
                    job,
                });
            }
            JobStatus::InProgress => in_progress_jobs.push(job),
            JobStatus::Completed => completed_jobs.push(CompletedJobSummaryDto {
                has_rated: rated.contains(&job.id),
                job,
            }),
        }
    }

    let jobs_with_pending_apps = active_jobs
        .iter()
        .filter(|summary| summary.pending_apps_count > 0)
        .map(|summary| summary.job.id)
        .collect();

    Ok(Json(ApiResponse::success(
        "Employer dashboard",
        EmployerDashboardDto {
            stats,
            active_jobs,
            in_progress_jobs,
            completed_jobs,
            jobs_with_pending_apps,
            recent_notifications,
        },
    )))
}

pub async fn get_profile(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    let snapshot = app_state.profile_service.snapshot(&auth.user).await?;
    Ok(Json(ApiResponse::success(
        "Employer profile",
        UserProfileDto::new(&auth.user, &snapshot),
    )))
}

pub async fn update_profile(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Json(body): Json<UpdateEmployerProfileDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let outcome = app_state
        .profile_service
        .update_profile(
            &auth.user,
            ProfileChanges {
                name: Some(body.name),
                phone: body.phone,
                org_name: body.org_name,
                org_type: body.org_type,
                latitude: body.latitude,
                longitude: body.longitude,
                location_address: body.location_address,
                geocode_address: body.geocode_address,
                ..Default::default()
            },
        )
        .await?;

    Ok(Json(ApiResponse::success(
        "Profile updated successfully.",
        ProfileUpdateResponseDto {
            profile: FilterUserDto::filter_user(&outcome.user),
            phone_changed: outcome.phone_changed,
            otp_sent: outcome.otp_sent,
        },
    )))
}

pub async fn post_job(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Json(body): Json<CreateJobDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let job = app_state
        .job_service
        .post_job(auth.user.id, body.into_job_input()?)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success("Job posted successfully!", job)),
    ))
}

pub async fn view_job(
    Path(job_id): Path<Uuid>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    let job = app_state.job_service.get_owned_job(auth.user.id, job_id).await?;

    let now = Utc::now();
    let applicants = app_state
        .db_client
        .get_job_applications(job.id)
        .await?
        .into_iter()
        .map(|application| ApplicantDto::new(application, now))
        .collect();

    let payment_status = if job.status == JobStatus::Completed {
        app_state
            .db_client
            .get_latest_job_payment(job.id)
            .await?
            .map(|payment| payment.status)
    } else {
        None
    };

    let rating = app_state.db_client.get_rating_for_job(job.id, auth.user.id).await?;

    Ok(Json(ApiResponse::success(
        "Job details",
        EmployerJobDetailDto {
            job,
            applications: GroupedApplicationsDto::group(applicants),
            payment_status,
            rating,
        },
    )))
}

pub async fn edit_job(
    Path(job_id): Path<Uuid>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Json(body): Json<CreateJobDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let job = app_state
        .job_service
        .edit_job(auth.user.id, job_id, body.into_job_input()?)
        .await?;

    Ok(Json(ApiResponse::success("Job updated successfully!", job)))
}

pub async fn list_applications(
    Path(job_id): Path<Uuid>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    let job = app_state.job_service.get_owned_job(auth.user.id, job_id).await?;

    let now = Utc::now();
    let applicants: Vec<ApplicantDto> = app_state
        .db_client
        .get_job_applications(job.id)
        .await?
        .into_iter()
        .map(|application| ApplicantDto::new(application, now))
        .collect();

    Ok(Json(ApiResponse::success(
        format!("Applications for '{}'", job.title),
        applicants,
    )))
}

pub async fn application_action(
    Path(application_id): Path<Uuid>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Json(body): Json<ApplicationActionDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let action = ApplicationAction::from_str(&body.action)?;
    let application = app_state
        .job_service
        .application_action(auth.user.id, application_id, action)
        .await?;

    let message = match action {
        ApplicationAction::Accept => "Application accepted. The job is now in progress.",
        ApplicationAction::Reject => "Application rejected.",
        ApplicationAction::Complete => "Job marked as completed.",
    };

    Ok(Json(ApiResponse::success(message, application)))
}

pub async fn initiate_payment(
    Path(application_id): Path<Uuid>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Json(body): Json<InitiatePaymentDto>,
) -> Result<impl IntoResponse, HttpError> {
    let initiation = app_state
        .payment_service
        .initiate_payment(auth.user.id, application_id, body.payment_method)
        .await?;

    Ok(Json(ApiResponse::success("Payment initiated", initiation)))
}

pub async fn record_payment(
    Path(application_id): Path<Uuid>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Json(body): Json<RecordPaymentDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let amount = rupees_from_f64(body.amount)
        .ok_or_else(|| ServiceError::validation("Amount is not a valid number."))?;

    let payment = app_state
        .payment_service
        .record_manual_payment(auth.user.id, application_id, amount, body.method, body.transaction_id)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(
            "Payment recorded. The worker will be asked to confirm it.",
            payment,
        )),
    ))
}

pub async fn payment_history(
    Query(query): Query<PageQueryDto>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    let employer_id = auth.user.id;
    let payments = app_state
        .db_client
        .get_employer_payments(employer_id, PAYMENTS_PER_PAGE, query.offset(PAYMENTS_PER_PAGE))
        .await?;
    let total = app_state.db_client.count_employer_payments(employer_id).await?;

    Ok(Json(ApiResponse::success(
        "Payment history",
        Paginated::new(payments, query.page(), PAYMENTS_PER_PAGE, total),
    )))
}

pub async fn rate_worker(
    Path(job_id): Path<Uuid>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Json(body): Json<RateWorkerDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let outcome = app_state
        .job_service
        .rate_worker(auth.user.id, job_id, body.rating, body.feedback)
        .await?;

    let (status, message) = if outcome.created {
        (StatusCode::CREATED, "Rating submitted.")
    } else {
        (StatusCode::OK, "Rating updated.")
    };

    Ok((status, Json(ApiResponse::success(message, outcome.rating))))
}

pub async fn view_worker(
    Path(worker_id): Path<Uuid>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    let worker = app_state.job_service.get_worker(worker_id).await?;

    let jobs_together = app_state
        .db_client
        .get_collaborated_jobs(worker.id, auth.user.id)
        .await?;
    let ratings = app_state
        .db_client
        .get_worker_ratings(worker.id, WORKER_RATINGS_SHOWN)
        .await?;
    let summary = app_state.db_client.get_worker_rating_summary(worker.id).await?;
    let completed_jobs = app_state.db_client.count_completed_jobs(worker.id).await?;

    Ok(Json(ApiResponse::success(
        "Worker details",
        WorkerOverviewDto {
            worker: FilterUserDto::filter_user(&worker),
            jobs_together,
            ratings,
            average_rating: summary.average,
            ratings_count: summary.count,
            completed_jobs,
        },
    )))
}
