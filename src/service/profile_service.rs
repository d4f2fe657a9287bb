// service/profile_service.rs
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::{
    db::{
        db::DBClient,
        userdb::{ProfileUpdate, UserExt},
        verificationdb::VerificationExt,
    },
    middleware::rate_limit::RateLimiter,
    models::{
        usermodel::{join_skills, parse_skills, User, UserRole},
        verificationmodels::{DocumentType, ReviewStatus},
    },
    service::{
        error::{is_unique_violation, ServiceError},
        geocoding::Geocoder,
        notification_service::NotificationService,
        speech::{extract_worker_details, AudioEncoding, SpeechClient},
    },
    utils::{
        geo::GeoPoint,
        otp_generator::{generate_otp, otp_expiry_from},
        uploads::{remove_user_file, save_user_file, voice_sample_filename, VOICE_SAMPLES_DIR},
    },
};

/// Verification and completion figures derived from a user's documents.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ProfileSnapshot {
    pub is_fully_verified: bool,
    pub has_certification: bool,
    pub profile_completion: i32,
    pub pending_docs: usize,
    pub rejected_docs: usize,
    pub verified_certs: usize,
    pub pending_certs: usize,
}

impl ProfileSnapshot {
    pub fn build(
        user: &User,
        documents: &[(DocumentType, ReviewStatus)],
        certifications: &[ReviewStatus],
    ) -> Self {
        let verified_types: Vec<DocumentType> = documents
            .iter()
            .filter(|(_, status)| *status == ReviewStatus::Verified)
            .map(|(doc_type, _)| *doc_type)
            .collect();

        let is_fully_verified = user.is_fully_verified(&verified_types);
        let has_certification = !certifications.is_empty();

        Self {
            is_fully_verified,
            has_certification,
            profile_completion: user.profile_completion(is_fully_verified, has_certification),
            pending_docs: documents.iter().filter(|(_, s)| *s == ReviewStatus::Pending).count(),
            rejected_docs: documents.iter().filter(|(_, s)| *s == ReviewStatus::Rejected).count(),
            verified_certs: certifications.iter().filter(|s| **s == ReviewStatus::Verified).count(),
            pending_certs: certifications.iter().filter(|s| **s == ReviewStatus::Pending).count(),
        }
    }
}

/// Profile edits shared by the worker and employer forms.
/// `phone: Some("")` clears the number; `None` leaves it alone.
#[derive(Debug, Clone, Default)]
pub struct ProfileChanges {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub skills: Option<String>,
    pub experience_years: Option<i32>,
    pub org_name: Option<String>,
    pub org_type: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub location_address: Option<String>,
    pub geocode_address: bool,
}

#[derive(Debug, Clone)]
pub struct ProfileUpdateOutcome {
    pub user: User,
    pub phone_changed: bool,
    pub otp_sent: bool,
}

#[derive(Debug, Clone)]
pub struct VoiceProfileOutcome {
    pub user: User,
    pub transcript: String,
    pub extracted_name: String,
    pub extracted_skills: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ProfileService {
    db_client: Arc<DBClient>,
    notifications: Arc<NotificationService>,
    speech: Arc<SpeechClient>,
    geocoder: Arc<Geocoder>,
    otp_limiter: RateLimiter,
    upload_folder: String,
}

impl ProfileService {
    pub fn new(
        db_client: Arc<DBClient>,
        notifications: Arc<NotificationService>,
        speech: Arc<SpeechClient>,
        geocoder: Arc<Geocoder>,
        otp_limiter: RateLimiter,
        upload_folder: String,
    ) -> Self {
        Self {
            db_client,
            notifications,
            speech,
            geocoder,
            otp_limiter,
            upload_folder,
        }
    }

    pub async fn snapshot(&self, user: &User) -> Result<ProfileSnapshot, ServiceError> {
        let documents = self.db_client.get_user_document_statuses(user.id).await?;
        let certifications = if user.role == UserRole::Worker {
            self.db_client.get_worker_certification_statuses(user.id).await?
        } else {
            Vec::new()
        };

        Ok(ProfileSnapshot::build(user, &documents, &certifications))
    }

    fn check_otp_allowance(&self, phone: &str) -> Result<(), ServiceError> {
        if self.otp_limiter.is_allowed(phone) {
            Ok(())
        } else {
            tracing::warn!("OTP rate limit hit for {}", phone);
            Err(ServiceError::RateLimited)
        }
    }

    async fn deliver_otp(&self, user_id: Uuid, phone: &str) -> Result<bool, ServiceError> {
        let otp = generate_otp();
        self.db_client
            .set_otp(user_id, &otp, otp_expiry_from(Utc::now()))
            .await?;

        let sent = self.notifications.send_otp(phone, &otp).await;
        if !sent {
            tracing::warn!("OTP SMS to {} failed for user {}", phone, user_id);
        }
        Ok(sent)
    }

    /// Stores a fresh OTP for the user and texts it. Returns whether the SMS went out.
    pub async fn issue_otp(&self, user_id: Uuid, phone: &str) -> Result<bool, ServiceError> {
        self.check_otp_allowance(phone)?;
        self.deliver_otp(user_id, phone).await
    }

    /// Checks that can refuse the update (OTP limit, phone ownership) run before the first write.
    pub async fn update_profile(
        &self,
        user: &User,
        changes: ProfileChanges,
    ) -> Result<ProfileUpdateOutcome, ServiceError> {
        // Some(None) clears the phone, Some(Some(p)) sets a new one
        let mut new_phone: Option<Option<&str>> = None;

        if let Some(raw_phone) = changes.phone.as_deref() {
            let requested = raw_phone.trim();

            if requested.is_empty() {
                if user.phone.is_some() {
                    new_phone = Some(None);
                }
            } else if user.phone.as_deref() != Some(requested) {
                self.check_otp_allowance(requested)?;

                if self.db_client.phone_verified_by_other(requested, user.id).await? {
                    return Err(ServiceError::validation(
                        "This phone number is already registered and verified by another account.",
                    ));
                }
                new_phone = Some(Some(requested));
            }
        }

        if let Some(phone) = new_phone {
            self.db_client
                .update_phone(user.id, phone)
                .await
                .map_err(|e| {
                    if is_unique_violation(&e) {
                        ServiceError::validation("This phone number is already in use.")
                    } else {
                        ServiceError::Database(e)
                    }
                })?;
        }
        let phone_changed = new_phone.is_some();

        let address = changes
            .location_address
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty());

        let point = match GeoPoint::from_options(changes.latitude, changes.longitude) {
            Some(point) => Some(point),
            None if changes.geocode_address => match address.as_deref() {
                Some(addr) => self.geocoder.geocode(addr).await,
                None => None,
            },
            None => None,
        };

        let update = ProfileUpdate {
            name: changes.name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
            skills: changes.skills.map(|s| join_skills(&parse_skills(&s))),
            experience_years: changes.experience_years,
            org_name: changes.org_name.map(|o| o.trim().to_string()),
            org_type: changes.org_type.map(|o| o.trim().to_string()),
            location: point.map(|p| (p.lat, p.lng, address)),
        };

        let user = self.db_client.update_profile(user.id, update).await?;

        let otp_sent = match new_phone {
            Some(Some(phone)) => self.deliver_otp(user.id, phone).await?,
            _ => false,
        };

        tracing::info!(
            "Profile updated for user {} (phone changed: {})",
            user.id,
            phone_changed
        );

        Ok(ProfileUpdateOutcome {
            user,
            phone_changed,
            otp_sent,
        })
    }

    pub async fn resend_profile_otp(&self, user: &User) -> Result<bool, ServiceError> {
        let phone = user
            .phone
            .as_deref()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| ServiceError::validation("No phone number on your profile."))?;

        if user.is_phone_verified {
            return Err(ServiceError::validation("Your phone number is already verified."));
        }

        self.issue_otp(user.id, phone).await
    }

    /// Fills name and skills from a Hindi voice recording.
    pub async fn voice_profile(&self, user: &User, audio: &[u8]) -> Result<VoiceProfileOutcome, ServiceError> {
        if audio.is_empty() {
            return Err(ServiceError::validation("No audio received."));
        }

        let transcript = self
            .speech
            .transcribe(audio, "hi-IN", AudioEncoding::OggOpus)
            .await
            .map_err(|e| ServiceError::Gateway(e.to_string()))?;

        let details = extract_worker_details(&transcript);

        let filename = voice_sample_filename(Utc::now().timestamp());
        let relative =
            save_user_file(&self.upload_folder, VOICE_SAMPLES_DIR, user.id, &filename, audio).await?;

        let name = Some(details.name.as_str()).filter(|n| !n.is_empty());
        let skills = (!details.skills.is_empty()).then(|| join_skills(&details.skills));

        let updated = match self
            .db_client
            .update_voice_profile(user.id, name, skills.as_deref(), &relative)
            .await
        {
            Ok(updated) => updated,
            Err(e) => {
                remove_user_file(&self.upload_folder, VOICE_SAMPLES_DIR, &relative).await;
                return Err(e.into());
            }
        };

        Ok(VoiceProfileOutcome {
            user: updated,
            transcript,
            extracted_name: details.name,
            extracted_skills: details.skills,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::Config, models::usermodel::sample_user, service::twilio::TwilioClient};
    use sqlx::{postgres::PgPoolOptions, PgPool};
    use std::time::Duration;

    fn service_with(pool: PgPool, otp_limiter: RateLimiter) -> ProfileService {
        let config = Config::test_config();
        let http = reqwest::Client::new();
        let db_client = Arc::new(DBClient::new(pool));
        let twilio = Arc::new(TwilioClient::new(&config, http.clone()));

        ProfileService::new(
            db_client.clone(),
            Arc::new(NotificationService::new(db_client, twilio)),
            Arc::new(SpeechClient::new(&config, http.clone())),
            Arc::new(Geocoder::new(http)),
            otp_limiter,
            config.upload_folder,
        )
    }

    /// Every query fails against this pool.
    fn unreachable_pool() -> PgPool {
        PgPoolOptions::new()
            .acquire_timeout(Duration::from_millis(200))
            .connect_lazy("postgres://shrambandhu@127.0.0.1:1/shrambandhu")
            .unwrap()
    }

    fn exhausted_limiter(phone: &str) -> RateLimiter {
        let limiter = RateLimiter::new(1, Duration::from_secs(600));
        assert!(limiter.is_allowed(phone));
        limiter
    }

    #[tokio::test]
    async fn test_rate_limited_phone_change_fails_before_any_query() {
        let service = service_with(unreachable_pool(), exhausted_limiter("+919812345678"));
        let mut user = sample_user(UserRole::Worker);
        user.phone = Some("+919876543210".into());

        let changes = ProfileChanges {
            name: Some("Suresh".into()),
            phone: Some(" +919812345678 ".into()),
            ..Default::default()
        };

        let err = service.update_profile(&user, changes).await.unwrap_err();
        assert!(matches!(err, ServiceError::RateLimited));
    }

    #[tokio::test]
    async fn test_allowed_phone_change_reaches_the_database() {
        let service = service_with(unreachable_pool(), RateLimiter::new(1, Duration::from_secs(600)));
        let mut user = sample_user(UserRole::Worker);
        user.phone = Some("+919876543210".into());

        let changes = ProfileChanges {
            phone: Some("+919812345678".into()),
            ..Default::default()
        };

        let err = service.update_profile(&user, changes).await.unwrap_err();
        assert!(matches!(err, ServiceError::Database(_)));
    }

    #[sqlx::test]
    #[ignore] // Requires DATABASE_URL pointing at Postgres
    async fn test_rate_limited_phone_change_leaves_profile_untouched(pool: PgPool) {
        let db = DBClient::new(pool.clone());
        let user = db
            .save_user(
                UserRole::Worker,
                crate::db::userdb::NewUser {
                    name: Some("Ramesh".into()),
                    phone: Some("+919876543210".into()),
                    is_phone_verified: true,
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let service = service_with(pool, exhausted_limiter("+919812345678"));
        let changes = ProfileChanges {
            name: Some("Suresh".into()),
            phone: Some("+919812345678".into()),
            ..Default::default()
        };
        let err = service.update_profile(&user, changes).await.unwrap_err();
        assert!(matches!(err, ServiceError::RateLimited));

        let stored = db.get_user(Some(user.id), None, None, None).await.unwrap().unwrap();
        assert_eq!(stored.phone.as_deref(), Some("+919876543210"));
        assert!(stored.is_phone_verified);
        assert_eq!(stored.name.as_deref(), Some("Ramesh"));
    }

    #[test]
    fn test_snapshot_for_verified_worker() {
        let mut worker = sample_user(UserRole::Worker);
        worker.name = Some("Ramesh".into());
        worker.skills = Some("masonry".into());

        let documents = vec![
            (DocumentType::Aadhaar, ReviewStatus::Verified),
            (DocumentType::PhotoId, ReviewStatus::Verified),
            (DocumentType::Pan, ReviewStatus::Rejected),
        ];
        let certs = vec![ReviewStatus::Pending];

        let snapshot = ProfileSnapshot::build(&worker, &documents, &certs);
        assert!(snapshot.is_fully_verified);
        assert!(snapshot.has_certification);
        assert_eq!(snapshot.rejected_docs, 1);
        assert_eq!(snapshot.pending_certs, 1);
        assert_eq!(snapshot.verified_certs, 0);
        // name, skills, verified, certification; experience missing
        assert_eq!(snapshot.profile_completion, 80);
    }

    #[test]
    fn test_snapshot_for_new_employer() {
        let employer = sample_user(UserRole::Employer);
        let documents = vec![(DocumentType::Pan, ReviewStatus::Pending)];

        let snapshot = ProfileSnapshot::build(&employer, &documents, &[]);
        assert!(!snapshot.is_fully_verified);
        assert!(!snapshot.has_certification);
        assert_eq!(snapshot.pending_docs, 1);
        assert_eq!(snapshot.profile_completion, 0);
    }
}
