// db/fixtures.rs
use sqlx::types::BigDecimal;
use uuid::Uuid;

use super::{
    db::DBClient,
    jobdb::{JobExt, JobInput},
    userdb::{NewUser, UserExt},
};
use crate::models::{
    jobmodel::{Job, JobType, SalaryFrequency},
    usermodel::{User, UserRole},
};

pub async fn worker(db: &DBClient, name: &str, phone: &str) -> User {
    db.save_user(
        UserRole::Worker,
        NewUser {
            name: Some(name.to_string()),
            phone: Some(phone.to_string()),
            skills: Some("masonry,plastering".to_string()),
            is_phone_verified: true,
            ..Default::default()
        },
    )
    .await
    .unwrap()
}

pub async fn employer(db: &DBClient, email: &str) -> User {
    db.save_user(
        UserRole::Employer,
        NewUser {
            name: Some("Sharma Builders".to_string()),
            email: Some(email.to_string()),
            password_hash: Some("not-a-real-hash".to_string()),
            is_email_verified: true,
            ..Default::default()
        },
    )
    .await
    .unwrap()
}

pub fn job_input(title: &str) -> JobInput {
    JobInput {
        title: title.to_string(),
        description: "Plaster two rooms of a new flat".to_string(),
        location_lat: 17.385,
        location_lng: 78.4867,
        address: "Banjara Hills, Hyderabad".to_string(),
        salary: BigDecimal::from(800),
        salary_frequency: SalaryFrequency::Daily,
        skills_required: Some("plastering".to_string()),
        job_type: JobType::OneTime,
        duration_days: None,
        is_urgent: false,
    }
}

pub async fn active_job(db: &DBClient, employer_id: Uuid, title: &str) -> Job {
    db.create_job(employer_id, job_input(title)).await.unwrap()
}
