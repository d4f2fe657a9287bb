// db/userdb.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::db::DBClient;

use crate::models::usermodel::{OverallVerificationStatus, User, UserRole};

/// New account data shared by the sign-up flows.
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub password_hash: Option<String>,
    pub google_id: Option<String>,
    pub skills: Option<String>,
    pub language: Option<String>,
    pub is_phone_verified: bool,
    pub is_email_verified: bool,
    pub email_verification_token: Option<String>,
    pub token_expiry: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    /// None keeps the current skills; an empty string clears them.
    pub skills: Option<String>,
    pub experience_years: Option<i32>,
    pub org_name: Option<String>,
    pub org_type: Option<String>,
    pub location: Option<(f64, f64, Option<String>)>,
}

#[async_trait]
pub trait UserExt {
    async fn get_user(
        &self,
        user_id: Option<Uuid>,
        email: Option<&str>,
        phone: Option<&str>,
        google_id: Option<&str>,
    ) -> Result<Option<User>, sqlx::Error>;

    async fn get_user_by_verification_token(&self, token: &str) -> Result<Option<User>, sqlx::Error>;

    async fn get_user_by_reset_token(&self, token: &str) -> Result<Option<User>, sqlx::Error>;

    async fn save_user(&self, role: UserRole, new_user: NewUser) -> Result<User, sqlx::Error>;

    async fn set_otp(
        &self,
        user_id: Uuid,
        otp: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), sqlx::Error>;

    /// Consumes a matching unexpired OTP, marks the phone verified and records the login.
    /// Returns None when the OTP no longer matches (already used or expired).
    async fn complete_otp_login(&self, user_id: Uuid, otp: &str) -> Result<Option<User>, sqlx::Error>;

    async fn update_last_login(&self, user_id: Uuid) -> Result<(), sqlx::Error>;

    async fn mark_email_verified(&self, user_id: Uuid) -> Result<User, sqlx::Error>;

    async fn set_password_reset_token(
        &self,
        user_id: Uuid,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), sqlx::Error>;

    async fn reset_password(&self, user_id: Uuid, password_hash: String) -> Result<(), sqlx::Error>;

    async fn link_google_account(
        &self,
        user_id: Uuid,
        google_id: &str,
        email_verified: bool,
    ) -> Result<User, sqlx::Error>;

    async fn update_profile(&self, user_id: Uuid, update: ProfileUpdate) -> Result<User, sqlx::Error>;

    /// Sets a new (unverified) phone or clears it.
    async fn update_phone(&self, user_id: Uuid, phone: Option<&str>) -> Result<User, sqlx::Error>;

    /// Name and skills left as None keep their stored values.
    async fn update_voice_profile(
        &self,
        user_id: Uuid,
        name: Option<&str>,
        skills: Option<&str>,
        voice_sample_path: &str,
    ) -> Result<User, sqlx::Error>;

    async fn phone_verified_by_other(&self, phone: &str, user_id: Uuid) -> Result<bool, sqlx::Error>;

    async fn get_users(&self) -> Result<Vec<User>, sqlx::Error>;

    async fn toggle_user_active(&self, user_id: Uuid) -> Result<Option<User>, sqlx::Error>;

    async fn get_active_admins(&self) -> Result<Vec<User>, sqlx::Error>;

    async fn get_admins_with_location(&self) -> Result<Vec<User>, sqlx::Error>;

    async fn increment_profile_views(&self, user_id: Uuid) -> Result<(), sqlx::Error>;

    async fn update_overall_status(
        &self,
        user_id: Uuid,
        status: OverallVerificationStatus,
    ) -> Result<(), sqlx::Error>;
}

#[async_trait]
impl UserExt for DBClient {
    async fn get_user(
        &self,
        user_id: Option<Uuid>,
        email: Option<&str>,
        phone: Option<&str>,
        google_id: Option<&str>,
    ) -> Result<Option<User>, sqlx::Error> {
        let mut user: Option<User> = None;

        if let Some(user_id) = user_id {
            user = sqlx::query_as::<_, User>(r#"SELECT * FROM users WHERE id = $1"#)
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
        } else if let Some(email) = email {
            user = sqlx::query_as::<_, User>(r#"SELECT * FROM users WHERE LOWER(email) = LOWER($1)"#)
                .bind(email)
                .fetch_optional(&self.pool)
                .await?;
        } else if let Some(phone) = phone {
            user = sqlx::query_as::<_, User>(r#"SELECT * FROM users WHERE phone = $1"#)
                .bind(phone)
                .fetch_optional(&self.pool)
                .await?;
        } else if let Some(google_id) = google_id {
            user = sqlx::query_as::<_, User>(r#"SELECT * FROM users WHERE google_id = $1"#)
                .bind(google_id)
                .fetch_optional(&self.pool)
                .await?;
        }

        Ok(user)
    }

    async fn get_user_by_verification_token(&self, token: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(r#"SELECT * FROM users WHERE email_verification_token = $1"#)
            .bind(token)
            .fetch_optional(&self.pool)
            .await
    }

    async fn get_user_by_reset_token(&self, token: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(r#"SELECT * FROM users WHERE password_reset_token = $1"#)
            .bind(token)
            .fetch_optional(&self.pool)
            .await
    }

    async fn save_user(&self, role: UserRole, new_user: NewUser) -> Result<User, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (
                id, name, email, phone, password_hash, google_id, role, language, skills,
                is_phone_verified, is_email_verified, email_verification_token, token_expiry
            )
            VALUES ($1, $2, LOWER($3), $4, $5, $6, $7, COALESCE($8, 'en'), $9, $10, $11, $12, $13)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(new_user.name)
        .bind(new_user.email)
        .bind(new_user.phone)
        .bind(new_user.password_hash)
        .bind(new_user.google_id)
        .bind(role)
        .bind(new_user.language)
        .bind(new_user.skills)
        .bind(new_user.is_phone_verified)
        .bind(new_user.is_email_verified)
        .bind(new_user.email_verification_token)
        .bind(new_user.token_expiry)
        .fetch_one(&self.pool)
        .await
    }

    async fn set_otp(
        &self,
        user_id: Uuid,
        otp: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(r#"UPDATE users SET otp = $2, otp_expiry = $3, updated_at = NOW() WHERE id = $1"#)
            .bind(user_id)
            .bind(otp)
            .bind(expires_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn complete_otp_login(&self, user_id: Uuid, otp: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET otp = NULL, otp_expiry = NULL, is_phone_verified = TRUE,
                last_login_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND otp = $2 AND otp_expiry > NOW()
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(otp)
        .fetch_optional(&self.pool)
        .await
    }

    async fn update_last_login(&self, user_id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query(r#"UPDATE users SET last_login_at = NOW() WHERE id = $1"#)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn mark_email_verified(&self, user_id: Uuid) -> Result<User, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET is_email_verified = TRUE, email_verification_token = NULL,
                token_expiry = NULL, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
    }

    async fn set_password_reset_token(
        &self,
        user_id: Uuid,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"UPDATE users SET password_reset_token = $2, token_expiry = $3, updated_at = NOW() WHERE id = $1"#,
        )
        .bind(user_id)
        .bind(token)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn reset_password(&self, user_id: Uuid, password_hash: String) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE users
            SET password_hash = $2, password_reset_token = NULL, token_expiry = NULL, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .bind(password_hash)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn link_google_account(
        &self,
        user_id: Uuid,
        google_id: &str,
        email_verified: bool,
    ) -> Result<User, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET google_id = $2, is_email_verified = is_email_verified OR $3,
                last_login_at = NOW(), updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(google_id)
        .bind(email_verified)
        .fetch_one(&self.pool)
        .await
    }

    async fn update_profile(&self, user_id: Uuid, update: ProfileUpdate) -> Result<User, sqlx::Error> {
        let (lat, lng, address) = match update.location {
            Some((lat, lng, address)) => (Some(lat), Some(lng), address),
            None => (None, None, None),
        };

        sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET name = COALESCE($2, name),
                skills = CASE WHEN $3::text IS NULL THEN skills ELSE NULLIF($3, '') END,
                experience_years = COALESCE($4, experience_years),
                org_name = COALESCE($5, org_name),
                org_type = COALESCE($6, org_type),
                location_lat = COALESCE($7, location_lat),
                location_lng = COALESCE($8, location_lng),
                location_address = CASE WHEN $7::float8 IS NULL THEN location_address ELSE COALESCE($9, location_address) END,
                location_updated_at = CASE WHEN $7::float8 IS NULL THEN location_updated_at ELSE NOW() END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(update.name)
        .bind(update.skills)
        .bind(update.experience_years)
        .bind(update.org_name)
        .bind(update.org_type)
        .bind(lat)
        .bind(lng)
        .bind(address)
        .fetch_one(&self.pool)
        .await
    }

    async fn update_phone(&self, user_id: Uuid, phone: Option<&str>) -> Result<User, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET phone = $2, is_phone_verified = FALSE, otp = NULL, otp_expiry = NULL, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(phone)
        .fetch_one(&self.pool)
        .await
    }

    async fn update_voice_profile(
        &self,
        user_id: Uuid,
        name: Option<&str>,
        skills: Option<&str>,
        voice_sample_path: &str,
    ) -> Result<User, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET name = COALESCE($2, name), skills = COALESCE($3, skills),
                voice_sample_path = $4, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(name)
        .bind(skills)
        .bind(voice_sample_path)
        .fetch_one(&self.pool)
        .await
    }

    async fn phone_verified_by_other(&self, phone: &str, user_id: Uuid) -> Result<bool, sqlx::Error> {
        let exists: bool = sqlx::query_scalar(
            r#"SELECT EXISTS(SELECT 1 FROM users WHERE phone = $1 AND id <> $2 AND is_phone_verified)"#,
        )
        .bind(phone)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn get_users(&self) -> Result<Vec<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(r#"SELECT * FROM users ORDER BY created_at DESC"#)
            .fetch_all(&self.pool)
            .await
    }

    async fn toggle_user_active(&self, user_id: Uuid) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"UPDATE users SET is_active = NOT is_active, updated_at = NOW() WHERE id = $1 RETURNING *"#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn get_active_admins(&self) -> Result<Vec<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"SELECT * FROM users WHERE role = 'admin'::user_role AND is_active ORDER BY created_at"#,
        )
        .fetch_all(&self.pool)
        .await
    }

    async fn get_admins_with_location(&self) -> Result<Vec<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT * FROM users
            WHERE role = 'admin'::user_role
              AND location_lat IS NOT NULL AND location_lng IS NOT NULL
            "#,
        )
        .fetch_all(&self.pool)
        .await
    }

    async fn increment_profile_views(&self, user_id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query(r#"UPDATE users SET profile_views = profile_views + 1 WHERE id = $1"#)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn update_overall_status(
        &self,
        user_id: Uuid,
        status: OverallVerificationStatus,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(r#"UPDATE users SET overall_verification_status = $2, updated_at = NOW() WHERE id = $1"#)
            .bind(user_id)
            .bind(status)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
