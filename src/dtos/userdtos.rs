use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::{
    models::{
        paymentmodel::RatingWithDetails,
        usermodel::*,
        verificationmodels::{DocumentVerification, WorkerCertificationDetail},
    },
    service::profile_service::ProfileSnapshot,
    utils::phone::{validate_google_signup_phone, validate_indian_phone},
};

/// Profile forms send an empty phone to clear it.
fn validate_optional_indian_phone(phone: &str) -> Result<(), ValidationError> {
    if phone.trim().is_empty() {
        return Ok(());
    }
    validate_indian_phone(phone)
}

fn validate_otp_code(otp: &str) -> Result<(), ValidationError> {
    if otp.len() != 6 || !otp.chars().all(|c| c.is_ascii_digit()) {
        let mut error = ValidationError::new("invalid_otp");
        error.message = Some(Cow::from("OTP must be exactly 6 digits"));
        return Err(error);
    }
    Ok(())
}

#[derive(Validate, Debug, Clone, Serialize, Deserialize)]
pub struct RegisterUserDto {
    #[validate(length(min = 2, max = 100, message = "Name must be between 2-100 characters"))]
    pub name: String,

    #[validate(
        length(min = 1, message = "Email is required"),
        email(message = "Email is invalid")
    )]
    pub email: String,

    #[validate(custom = "validate_indian_phone")]
    pub phone: String,

    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,

    #[validate(must_match(other = "password", message = "passwords do not match"))]
    pub confirm_password: String,

    #[serde(default)]
    pub role: SignupRole,
}

#[derive(Validate, Debug, Clone, Serialize, Deserialize)]
pub struct LoginUserDto {
    #[validate(
        length(min = 1, message = "Email is required"),
        email(message = "Email is invalid")
    )]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Validate, Debug, Clone, Serialize, Deserialize)]
pub struct OtpRequestDto {
    #[validate(custom = "validate_indian_phone")]
    pub phone: String,
}

#[derive(Validate, Debug, Clone, Serialize, Deserialize)]
pub struct OtpVerifyDto {
    #[validate(custom = "validate_indian_phone")]
    pub phone: String,

    #[validate(custom = "validate_otp_code")]
    pub otp: String,
}

#[derive(Validate, Debug, Clone, Serialize, Deserialize)]
pub struct PhoneRegisterDto {
    #[validate(custom = "validate_indian_phone")]
    pub phone: String,

    #[serde(default)]
    pub role: SignupRole,
}

#[derive(Serialize, Deserialize, Validate)]
pub struct VerifyEmailQueryDto {
    #[validate(length(min = 1, message = "Token is required."))]
    pub token: String,
}

#[derive(Deserialize, Serialize, Validate, Debug, Clone)]
pub struct ForgotPasswordRequestDto {
    #[validate(length(min = 1, message = "Email is required"), email(message = "Email is invalid"))]
    pub email: String,
}

#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
pub struct ResetPasswordRequestDto {
    #[validate(length(min = 1, message = "Token is required."))]
    pub token: String,

    #[validate(length(min = 6, message = "new password must be at least 6 characters"))]
    pub password: String,

    #[validate(must_match(other = "password", message = "new passwords do not match"))]
    pub confirm_password: String,
}

#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
pub struct CompleteGoogleRegistrationDto {
    #[validate(length(min = 1, message = "Registration token is required"))]
    pub registration_token: String,

    #[serde(default)]
    pub role: SignupRole,

    #[validate(custom = "validate_google_signup_phone")]
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GoogleCallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct UpdateWorkerProfileDto {
    #[validate(length(min = 2, max = 100, message = "Name must be between 2-100 characters"))]
    pub name: String,

    #[validate(custom = "validate_optional_indian_phone")]
    pub phone: Option<String>,

    #[validate(length(max = 500, message = "Skills must be at most 500 characters"))]
    pub skills: Option<String>,

    #[validate(range(min = 0, max = 60, message = "Experience must be between 0 and 60 years"))]
    pub experience_years: Option<i32>,

    pub latitude: Option<f64>,

    pub longitude: Option<f64>,

    #[validate(length(max = 255, message = "Address must be at most 255 characters"))]
    pub location_address: Option<String>,

    #[serde(default)]
    pub geocode_address: bool,
}

#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct UpdateEmployerProfileDto {
    #[validate(length(min = 2, max = 100, message = "Name must be between 2-100 characters"))]
    pub name: String,

    #[validate(length(max = 150, message = "Organisation name must be at most 150 characters"))]
    pub org_name: Option<String>,

    #[validate(length(max = 50, message = "Organisation type must be at most 50 characters"))]
    pub org_type: Option<String>,

    #[validate(custom = "validate_optional_indian_phone")]
    pub phone: Option<String>,

    pub latitude: Option<f64>,

    pub longitude: Option<f64>,

    #[validate(length(max = 255, message = "Address must be at most 255 characters"))]
    pub location_address: Option<String>,

    #[serde(default)]
    pub geocode_address: bool,
}

/// The user as clients see it; secrets never leave the server.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct FilterUserDto {
    pub id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub role: String,
    pub language: String,
    pub is_phone_verified: bool,
    pub is_email_verified: bool,
    pub is_active: bool,
    pub location_lat: Option<f64>,
    pub location_lng: Option<f64>,
    pub location_address: Option<String>,
    pub skills: Vec<String>,
    pub experience_years: Option<i32>,
    pub profile_views: i32,
    pub org_name: Option<String>,
    pub org_type: Option<String>,
    pub overall_verification_status: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "lastLoginAt")]
    pub last_login_at: Option<DateTime<Utc>>,
}

impl FilterUserDto {
    pub fn filter_user(user: &User) -> Self {
        FilterUserDto {
            id: user.id.to_string(),
            name: user.name.to_owned(),
            email: user.email.to_owned(),
            phone: user.phone.to_owned(),
            role: user.role.to_str().to_string(),
            language: user.language.to_owned(),
            is_phone_verified: user.is_phone_verified,
            is_email_verified: user.is_email_verified,
            is_active: user.is_active,
            location_lat: user.location_lat,
            location_lng: user.location_lng,
            location_address: user.location_address.to_owned(),
            skills: user.skills_list(),
            experience_years: user.experience_years,
            profile_views: user.profile_views,
            org_name: user.org_name.to_owned(),
            org_type: user.org_type.to_owned(),
            overall_verification_status: user.overall_verification_status.to_str().to_string(),
            created_at: user.created_at,
            last_login_at: user.last_login_at,
        }
    }

    pub fn filter_users(users: &[User]) -> Vec<FilterUserDto> {
        users.iter().map(FilterUserDto::filter_user).collect()
    }
}

/// The user plus the properties derived from documents and certifications.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct UserProfileDto {
    #[serde(flatten)]
    pub user: FilterUserDto,
    pub is_fully_verified: bool,
    pub profile_completion: i32,
}

impl UserProfileDto {
    pub fn new(user: &User, snapshot: &ProfileSnapshot) -> Self {
        Self {
            user: FilterUserDto::filter_user(user),
            is_fully_verified: snapshot.is_fully_verified,
            profile_completion: snapshot.profile_completion,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WorkerProfileResponseDto {
    pub profile: UserProfileDto,
    pub documents: Vec<DocumentVerification>,
}

/// What anyone may see of a worker.
#[derive(Debug, Serialize)]
pub struct PublicWorkerProfileDto {
    pub id: Uuid,
    pub name: Option<String>,
    pub skills: Vec<String>,
    pub experience_years: Option<i32>,
    pub language: String,
    pub location_address: Option<String>,
    pub profile_views: i32,
    pub average_rating: Option<f64>,
    pub ratings_count: i64,
    pub completed_jobs_count: i64,
    pub ratings: Vec<RatingWithDetails>,
    pub certifications: Vec<WorkerCertificationDetail>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserLoginResponseDto {
    pub status: String,
    pub token: String,
    pub user: FilterUserDto,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OtpSentResponseDto {
    pub status: String,
    pub message: String,
    pub user_id: Uuid,
    pub otp_sent: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProfileUpdateResponseDto {
    pub profile: FilterUserDto,
    pub phone_changed: bool,
    pub otp_sent: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VoiceProfileResponseDto {
    pub profile: FilterUserDto,
    pub transcript: String,
    pub extracted_name: String,
    pub extracted_skills: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ToggleUserResponseDto {
    pub user_id: Uuid,
    pub is_active: bool,
}
