use std::str::FromStr;
use std::sync::Arc;

use axum::{
    extract::{Multipart, Path, Query},
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
        alertdb::AlertExt, jobdb::JobExt, paymentdb::PaymentExt, verificationdb::VerificationExt,
    },
    dtos::{
        jobdtos::*,
        paymentdtos::PaymentActionDto,
        responsedtos::{ApiResponse, PageQueryDto, Paginated},
        userdtos::*,
    },
    error::HttpError,
    handler::{documents::upload_document, forms::MultipartForm},
    middleware::{role_check, JWTAuthMiddeware},
    models::usermodel::UserRole,
    service::{
        error::ServiceError, payment_service::WorkerPaymentAction, profile_service::ProfileChanges,
    },
    utils::{
        geo::{hospitals_near, HOSPITAL_RADIUS_KM},
        time_ago::time_ago,
    },
    AppState,
};

const APPLICATIONS_PER_PAGE: i64 = 10;
const PAYMENTS_PER_PAGE: i64 = 15;
const DASHBOARD_NEARBY_JOBS: usize = 5;
const DASHBOARD_RECENT_PAYMENTS: i64 = 3;

pub fn worker_handler() -> Router {
    let worker_only = Router::new()
        .route("/dashboard", get(dashboard))
        .route("/profile", get(get_profile).put(update_profile))
        .route("/profile/resend-otp", post(resend_profile_otp))
        .route("/profile/voice", post(voice_profile))
        .route("/jobs/search", get(find_jobs))
        .route("/jobs/:job_id/apply", post(apply_for_job))
        .route("/applications", get(my_applications))
        .route("/applications/:application_id/withdraw", post(withdraw_application))
        .route("/sos", post(trigger_sos))
        .route("/emergency-resources", get(emergency_resources))
        .route("/certifications", get(my_certifications).post(add_certification))
        .route("/certifications/catalog", get(certification_catalog))
        .route("/documents", post(upload_document))
        .route("/payments", get(payment_history))
        .route("/payments/:payment_id/verify", post(verify_payment))
        .layer(middleware::from_fn(|state, req, next| {
            role_check(state, req, next, vec![UserRole::Worker])
        }));

    // Admins read alert status through the same route.
    worker_only.route("/sos/:alert_id", get(sos_status))
}

pub async fn dashboard(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    let worker = &auth.user;

    let snapshot = app_state.profile_service.snapshot(worker).await?;
    let active_applications = app_state.db_client.count_active_applications(worker.id).await?;
    let completed_jobs = app_state.db_client.count_completed_jobs(worker.id).await?;
    let rating = app_state.db_client.get_worker_rating_summary(worker.id).await?;
    let recent_payments = app_state
        .db_client
        .get_worker_payments(worker.id, DASHBOARD_RECENT_PAYMENTS, 0)
        .await?;

    let location_set = worker.location().is_some();
    let mut nearby_jobs = app_state.job_service.default_nearby_jobs(worker).await?;
    nearby_jobs.truncate(DASHBOARD_NEARBY_JOBS);

    let dashboard = WorkerDashboardDto {
        stats: WorkerStatsDto {
            active_applications,
            verified_certs: snapshot.verified_certs,
            completed_jobs,
            avg_rating: rating.average,
        },
        location_set,
        nearby_jobs,
        recent_payments,
        profile_completion: snapshot.profile_completion,
        verification_summary: VerificationSummaryDto {
            pending_docs: snapshot.pending_docs,
            rejected_docs: snapshot.rejected_docs,
            pending_certs: snapshot.pending_certs,
            is_fully_verified: snapshot.is_fully_verified,
        },
        profile_views: worker.profile_views,
    };

    Ok(Json(ApiResponse::success("Worker dashboard", dashboard)))
}

pub async fn get_profile(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    let snapshot = app_state.profile_service.snapshot(&auth.user).await?;
    let documents = app_state.db_client.get_user_documents(auth.user.id).await?;

    Ok(Json(ApiResponse::success(
        "Worker profile",
        WorkerProfileResponseDto {
            profile: UserProfileDto::new(&auth.user, &snapshot),
            documents,
        },
    )))
}

pub async fn update_profile(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Json(body): Json<UpdateWorkerProfileDto>,
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
                skills: body.skills,
                experience_years: body.experience_years,
                latitude: body.latitude,
                longitude: body.longitude,
                location_address: body.location_address,
                geocode_address: body.geocode_address,
                ..Default::default()
            },
        )
        .await?;

    let message = match (outcome.phone_changed, outcome.otp_sent) {
        (true, true) => "Profile updated. An OTP was sent to verify your new phone number.",
        (true, false) if outcome.user.phone.is_some() => {
            "Profile updated, but the OTP could not be sent. Please request a new one."
        }
        _ => "Profile updated successfully.",
    };

    Ok(Json(ApiResponse::success(
        message,
        ProfileUpdateResponseDto {
            profile: FilterUserDto::filter_user(&outcome.user),
            phone_changed: outcome.phone_changed,
            otp_sent: outcome.otp_sent,
        },
    )))
}

pub async fn resend_profile_otp(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    let sent = app_state.profile_service.resend_profile_otp(&auth.user).await?;
    if !sent {
        return Err(HttpError::bad_gateway("Could not send the OTP. Please try again."));
    }

    Ok(Json(ApiResponse::message("A new OTP has been sent to your phone.")))
}

pub async fn voice_profile(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    multipart: Multipart,
) -> Result<impl IntoResponse, HttpError> {
    let mut form = MultipartForm::read(multipart).await?;
    let audio = form.take_file("audio_blob")?;

    let outcome = app_state
        .profile_service
        .voice_profile(&auth.user, &audio.bytes)
        .await?;

    Ok(Json(ApiResponse::success(
        "Profile updated from your voice recording.",
        VoiceProfileResponseDto {
            profile: FilterUserDto::filter_user(&outcome.user),
            transcript: outcome.transcript,
            extracted_name: outcome.extracted_name,
            extracted_skills: outcome.extracted_skills,
        },
    )))
}

pub async fn apply_for_job(
    Path(job_id): Path<Uuid>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    body: Option<Json<ApplyJobDto>>,
) -> Result<impl IntoResponse, HttpError> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let outcome = app_state
        .job_service
        .apply(&auth.user, job_id, body.message)
        .await?;

    let message = if outcome.reapplied {
        "You have re-applied for this job."
    } else {
        "Application submitted successfully."
    };

    Ok(Json(ApiResponse::success(message, outcome.application)))
}

pub async fn my_applications(
    Query(query): Query<PageQueryDto>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    let worker_id = auth.user.id;
    let applications = app_state
        .db_client
        .get_worker_applications(worker_id, APPLICATIONS_PER_PAGE, query.offset(APPLICATIONS_PER_PAGE))
        .await?;
    let total = app_state.db_client.count_worker_applications(worker_id).await?;

    let now = Utc::now();
    let items = applications
        .into_iter()
        .map(|application| ApplicationListItemDto {
            time_ago: time_ago(Some(application.applied_at), now),
            application,
        })
        .collect();

    Ok(Json(ApiResponse::success(
        "Your applications",
        Paginated::new(items, query.page(), APPLICATIONS_PER_PAGE, total),
    )))
}

pub async fn withdraw_application(
    Path(application_id): Path<Uuid>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    let application = app_state
        .job_service
        .withdraw(auth.user.id, application_id)
        .await?;

    Ok(Json(ApiResponse::success("Application withdrawn.", application)))
}

pub async fn find_jobs(
    Query(query): Query<JobSearchQueryDto>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    let search = query.to_search()?;
    let page = app_state.job_service.search_jobs(&auth.user, search).await?;

    Ok(Json(ApiResponse::success("Jobs found", page)))
}

pub async fn trigger_sos(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    body: Option<Json<SosRequestDto>>,
) -> Result<impl IntoResponse, HttpError> {
    let (lat, lng) = body
        .map(|Json(b)| b)
        .ok_or_else(|| ServiceError::validation("Location coordinates required"))?
        .coordinates()?;

    let outcome = app_state.sos_service.trigger(&auth.user, lat, lng).await?;

    Ok(Json(outcome))
}

pub async fn sos_status(
    Path(alert_id): Path<Uuid>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    let alert = app_state
        .db_client
        .get_alert(alert_id)
        .await?
        .ok_or(ServiceError::AlertNotFound(alert_id))?;

    if alert.worker_id != auth.user.id && auth.user.role != UserRole::Admin {
        return Err(ServiceError::Forbidden.into());
    }

    Ok(Json(ApiResponse::success(
        "Alert status",
        AlertStatusDto {
            status: alert.status.to_str().to_string(),
            created_at: alert.created_at,
            resolved_at: alert.resolved_at,
        },
    )))
}

pub async fn emergency_resources(
    Extension(auth): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    let hospitals = hospitals_near(auth.user.location(), HOSPITAL_RADIUS_KM);
    Ok(Json(ApiResponse::success("Nearby hospitals", hospitals)))
}

pub async fn my_certifications(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    let certifications = app_state
        .db_client
        .get_worker_certifications(auth.user.id)
        .await?;

    Ok(Json(ApiResponse::success("Your certifications", certifications)))
}

pub async fn certification_catalog(
    Extension(app_state): Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpError> {
    let catalog = app_state.db_client.get_certifications().await?;
    Ok(Json(ApiResponse::success("Available certifications", catalog)))
}

pub async fn add_certification(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    multipart: Multipart,
) -> Result<impl IntoResponse, HttpError> {
    let mut form = MultipartForm::read(multipart).await?;
    let certification_id = Uuid::parse_str(&form.required_text("certification_id")?)
        .map_err(|_| HttpError::bad_request("Invalid certification selected."))?;
    let document = form.take_file("document")?;

    let added = app_state
        .verification_service
        .add_certification(&auth.user, certification_id, document)
        .await?;

    Ok((
        axum::http::StatusCode::CREATED,
        Json(ApiResponse::success(
            "Certification submitted for verification.",
            added,
        )),
    ))
}

pub async fn payment_history(
    Query(query): Query<PageQueryDto>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    let worker_id = auth.user.id;
    let payments = app_state
        .db_client
        .get_worker_payments(worker_id, PAYMENTS_PER_PAGE, query.offset(PAYMENTS_PER_PAGE))
        .await?;
    let total = app_state.db_client.count_worker_payments(worker_id).await?;

    Ok(Json(ApiResponse::success(
        "Payment history",
        Paginated::new(payments, query.page(), PAYMENTS_PER_PAGE, total),
    )))
}

pub async fn verify_payment(
    Path(payment_id): Path<Uuid>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Json(body): Json<PaymentActionDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let action = WorkerPaymentAction::from_str(&body.action)?;
    let payment = app_state
        .payment_service
        .worker_verify(&auth.user, payment_id, action)
        .await?;

    let message = match action {
        WorkerPaymentAction::Confirm => "Payment confirmed.",
        WorkerPaymentAction::Dispute => "Payment disputed. An admin will review it.",
    };

    Ok(Json(ApiResponse::success(message, payment)))
}
