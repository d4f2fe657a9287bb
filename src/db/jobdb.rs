// db/jobdb.rs
use async_trait::async_trait;
use sqlx::types::BigDecimal;
use uuid::Uuid;

use super::db::DBClient;
use crate::models::jobmodel::*;

#[derive(Debug, Clone)]
pub struct JobInput {
    pub title: String,
    pub description: String,
    pub location_lat: f64,
    pub location_lng: f64,
    pub address: String,
    pub salary: BigDecimal,
    pub salary_frequency: SalaryFrequency,
    pub skills_required: Option<String>,
    pub job_type: JobType,
    pub duration_days: Option<i32>,
    pub is_urgent: bool,
}

#[derive(Debug, Clone, Default)]
pub struct JobSearchFilter {
    pub keywords: Option<String>,
    pub job_type: Option<JobType>,
    pub min_salary: Option<BigDecimal>,
    pub skills: Vec<String>,
}

/// `%term%` for ILIKE, with the term's own wildcards taken literally.
fn contains_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

#[async_trait]
pub trait JobExt {
    async fn create_job(&self, employer_id: Uuid, input: JobInput) -> Result<Job, sqlx::Error>;

    async fn update_job(&self, job_id: Uuid, input: JobInput) -> Result<Job, sqlx::Error>;

    async fn get_job(&self, job_id: Uuid) -> Result<Option<Job>, sqlx::Error>;

    async fn get_employer_jobs(&self, employer_id: Uuid) -> Result<Vec<Job>, sqlx::Error>;

    async fn get_all_jobs(&self) -> Result<Vec<Job>, sqlx::Error>;

    async fn get_recent_jobs(&self, limit: i64) -> Result<Vec<Job>, sqlx::Error>;

    /// Active jobs that carry coordinates; distance filtering happens in the caller.
    async fn get_active_jobs_with_location(&self) -> Result<Vec<Job>, sqlx::Error>;

    async fn search_active_jobs(&self, filter: &JobSearchFilter) -> Result<Vec<Job>, sqlx::Error>;

    async fn complete_job(&self, job_id: Uuid) -> Result<Job, sqlx::Error>;

    async fn get_application(&self, application_id: Uuid) -> Result<Option<Application>, sqlx::Error>;

    async fn get_application_for(
        &self,
        job_id: Uuid,
        worker_id: Uuid,
    ) -> Result<Option<Application>, sqlx::Error>;

    async fn create_application(
        &self,
        job_id: Uuid,
        worker_id: Uuid,
        message: Option<String>,
    ) -> Result<Application, sqlx::Error>;

    /// Brings a withdrawn application back to `applied`.
    async fn reactivate_application(
        &self,
        application_id: Uuid,
        message: Option<String>,
    ) -> Result<Application, sqlx::Error>;

    async fn update_application_status(
        &self,
        application_id: Uuid,
        status: ApplicationStatus,
    ) -> Result<Application, sqlx::Error>;

    /// Accepts one application, rejects the rest and moves the job to in-progress.
    /// Returns None when the job is no longer active.
    async fn accept_application(
        &self,
        application_id: Uuid,
        job_id: Uuid,
    ) -> Result<Option<Application>, sqlx::Error>;

    async fn get_worker_applications(
        &self,
        worker_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ApplicationWithJob>, sqlx::Error>;

    async fn count_worker_applications(&self, worker_id: Uuid) -> Result<i64, sqlx::Error>;

    async fn get_job_applications(&self, job_id: Uuid) -> Result<Vec<ApplicationWithWorker>, sqlx::Error>;

    async fn get_accepted_application(&self, job_id: Uuid) -> Result<Option<Application>, sqlx::Error>;

    async fn count_active_applications(&self, worker_id: Uuid) -> Result<i64, sqlx::Error>;

    async fn count_completed_jobs(&self, worker_id: Uuid) -> Result<i64, sqlx::Error>;

    /// Jobs the worker was accepted on for this employer.
    async fn get_collaborated_jobs(&self, worker_id: Uuid, employer_id: Uuid) -> Result<Vec<Job>, sqlx::Error>;
}

#[async_trait]
impl JobExt for DBClient {
    async fn create_job(&self, employer_id: Uuid, input: JobInput) -> Result<Job, sqlx::Error> {
        sqlx::query_as::<_, Job>(
            r#"
            INSERT INTO jobs (
                id, employer_id, title, description, location_lat, location_lng, address,
                salary, salary_frequency, skills_required, status, job_type, duration_days, is_urgent
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, 'active'::job_status, $11, $12, $13)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(employer_id)
        .bind(input.title)
        .bind(input.description)
        .bind(input.location_lat)
        .bind(input.location_lng)
        .bind(input.address)
        .bind(input.salary)
        .bind(input.salary_frequency)
        .bind(input.skills_required)
        .bind(input.job_type)
        .bind(input.duration_days)
        .bind(input.is_urgent)
        .fetch_one(&self.pool)
        .await
    }

    async fn update_job(&self, job_id: Uuid, input: JobInput) -> Result<Job, sqlx::Error> {
        sqlx::query_as::<_, Job>(
            r#"
            UPDATE jobs
            SET title = $2, description = $3, location_lat = $4, location_lng = $5, address = $6,
                salary = $7, salary_frequency = $8, skills_required = $9, job_type = $10,
                duration_days = $11, is_urgent = $12, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(job_id)
        .bind(input.title)
        .bind(input.description)
        .bind(input.location_lat)
        .bind(input.location_lng)
        .bind(input.address)
        .bind(input.salary)
        .bind(input.salary_frequency)
        .bind(input.skills_required)
        .bind(input.job_type)
        .bind(input.duration_days)
        .bind(input.is_urgent)
        .fetch_one(&self.pool)
        .await
    }

    async fn get_job(&self, job_id: Uuid) -> Result<Option<Job>, sqlx::Error> {
        sqlx::query_as::<_, Job>(r#"SELECT * FROM jobs WHERE id = $1"#)
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn get_employer_jobs(&self, employer_id: Uuid) -> Result<Vec<Job>, sqlx::Error> {
        sqlx::query_as::<_, Job>(r#"SELECT * FROM jobs WHERE employer_id = $1 ORDER BY created_at DESC"#)
            .bind(employer_id)
            .fetch_all(&self.pool)
            .await
    }

    async fn get_all_jobs(&self) -> Result<Vec<Job>, sqlx::Error> {
        sqlx::query_as::<_, Job>(r#"SELECT * FROM jobs ORDER BY created_at DESC"#)
            .fetch_all(&self.pool)
            .await
    }

    async fn get_recent_jobs(&self, limit: i64) -> Result<Vec<Job>, sqlx::Error> {
        sqlx::query_as::<_, Job>(r#"SELECT * FROM jobs ORDER BY created_at DESC LIMIT $1"#)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
    }

    async fn get_active_jobs_with_location(&self) -> Result<Vec<Job>, sqlx::Error> {
        sqlx::query_as::<_, Job>(
            r#"
            SELECT * FROM jobs
            WHERE status = 'active'::job_status
              AND location_lat IS NOT NULL AND location_lng IS NOT NULL
            "#,
        )
        .fetch_all(&self.pool)
        .await
    }

    async fn search_active_jobs(&self, filter: &JobSearchFilter) -> Result<Vec<Job>, sqlx::Error> {
        let keywords = filter
            .keywords
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(contains_pattern);
        let skills: Option<Vec<String>> = if filter.skills.is_empty() {
            None
        } else {
            Some(filter.skills.iter().map(|s| contains_pattern(s.trim())).collect())
        };

        sqlx::query_as::<_, Job>(
            r#"
            SELECT * FROM jobs
            WHERE status = 'active'::job_status
              AND location_lat IS NOT NULL AND location_lng IS NOT NULL
              AND ($1::text IS NULL OR title ILIKE $1 ESCAPE '\' OR description ILIKE $1 ESCAPE '\')
              AND ($2::job_type IS NULL OR job_type = $2)
              AND ($3::numeric IS NULL OR salary >= $3)
              AND ($4::text[] IS NULL OR EXISTS (
                    SELECT 1 FROM unnest($4::text[]) AS s(pattern)
                    WHERE skills_required ILIKE s.pattern ESCAPE '\'
                  ))
            "#,
        )
        .bind(keywords)
        .bind(filter.job_type)
        .bind(filter.min_salary.clone())
        .bind(skills)
        .fetch_all(&self.pool)
        .await
    }

    async fn complete_job(&self, job_id: Uuid) -> Result<Job, sqlx::Error> {
        sqlx::query_as::<_, Job>(
            r#"
            UPDATE jobs SET status = 'completed'::job_status, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(job_id)
        .fetch_one(&self.pool)
        .await
    }

    async fn get_application(&self, application_id: Uuid) -> Result<Option<Application>, sqlx::Error> {
        sqlx::query_as::<_, Application>(r#"SELECT * FROM applications WHERE id = $1"#)
            .bind(application_id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn get_application_for(
        &self,
        job_id: Uuid,
        worker_id: Uuid,
    ) -> Result<Option<Application>, sqlx::Error> {
        sqlx::query_as::<_, Application>(
            r#"SELECT * FROM applications WHERE job_id = $1 AND worker_id = $2"#,
        )
        .bind(job_id)
        .bind(worker_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn create_application(
        &self,
        job_id: Uuid,
        worker_id: Uuid,
        message: Option<String>,
    ) -> Result<Application, sqlx::Error> {
        sqlx::query_as::<_, Application>(
            r#"
            INSERT INTO applications (id, job_id, worker_id, status, message, applied_at)
            VALUES ($1, $2, $3, 'applied'::application_status, $4, NOW())
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(job_id)
        .bind(worker_id)
        .bind(message)
        .fetch_one(&self.pool)
        .await
    }

    async fn reactivate_application(
        &self,
        application_id: Uuid,
        message: Option<String>,
    ) -> Result<Application, sqlx::Error> {
        sqlx::query_as::<_, Application>(
            r#"
            UPDATE applications
            SET status = 'applied'::application_status, applied_at = NOW(),
                message = COALESCE($2, message)
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(application_id)
        .bind(message)
        .fetch_one(&self.pool)
        .await
    }

    async fn update_application_status(
        &self,
        application_id: Uuid,
        status: ApplicationStatus,
    ) -> Result<Application, sqlx::Error> {
        sqlx::query_as::<_, Application>(
            r#"UPDATE applications SET status = $2 WHERE id = $1 RETURNING *"#,
        )
        .bind(application_id)
        .bind(status)
        .fetch_one(&self.pool)
        .await
    }

    async fn accept_application(
        &self,
        application_id: Uuid,
        job_id: Uuid,
    ) -> Result<Option<Application>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let job = sqlx::query_as::<_, Job>(
            r#"
            SELECT * FROM jobs
            WHERE id = $1 AND status = 'active'::job_status
            FOR UPDATE
            "#,
        )
        .bind(job_id)
        .fetch_optional(&mut *tx)
        .await?;

        if job.is_none() {
            tracing::debug!("accept_application: job {} is no longer active", job_id);
            return Ok(None);
        }

        sqlx::query(
            r#"
            UPDATE applications SET status = 'rejected'::application_status
            WHERE job_id = $1 AND id <> $2
            "#,
        )
        .bind(job_id)
        .bind(application_id)
        .execute(&mut *tx)
        .await?;

        let accepted = sqlx::query_as::<_, Application>(
            r#"
            UPDATE applications SET status = 'accepted'::application_status
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(application_id)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"UPDATE jobs SET status = 'in_progress'::job_status, updated_at = NOW() WHERE id = $1"#,
        )
        .bind(job_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(accepted))
    }

    async fn get_worker_applications(
        &self,
        worker_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ApplicationWithJob>, sqlx::Error> {
        sqlx::query_as::<_, ApplicationWithJob>(
            r#"
            SELECT a.id, a.job_id, a.status, a.message, a.applied_at,
                   j.title AS job_title, j.status AS job_status, j.salary, j.salary_frequency,
                   j.employer_id, u.name AS employer_name
            FROM applications a
            JOIN jobs j ON j.id = a.job_id
            JOIN users u ON u.id = j.employer_id
            WHERE a.worker_id = $1
            ORDER BY a.applied_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(worker_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
    }

    async fn count_worker_applications(&self, worker_id: Uuid) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(r#"SELECT COUNT(*) FROM applications WHERE worker_id = $1"#)
            .bind(worker_id)
            .fetch_one(&self.pool)
            .await
    }

    async fn get_job_applications(&self, job_id: Uuid) -> Result<Vec<ApplicationWithWorker>, sqlx::Error> {
        sqlx::query_as::<_, ApplicationWithWorker>(
            r#"
            SELECT a.id, a.job_id, a.worker_id, a.status, a.message, a.applied_at,
                   u.name AS worker_name, u.phone AS worker_phone, u.skills AS worker_skills,
                   u.experience_years AS worker_experience_years,
                   (SELECT ROUND(AVG(r.rating)::numeric, 1)::float8 FROM ratings r WHERE r.worker_id = a.worker_id)
                       AS worker_avg_rating
            FROM applications a
            JOIN users u ON u.id = a.worker_id
            WHERE a.job_id = $1
            ORDER BY a.applied_at DESC
            "#,
        )
        .bind(job_id)
        .fetch_all(&self.pool)
        .await
    }

    async fn get_accepted_application(&self, job_id: Uuid) -> Result<Option<Application>, sqlx::Error> {
        sqlx::query_as::<_, Application>(
            r#"
            SELECT * FROM applications
            WHERE job_id = $1 AND status = 'accepted'::application_status
            LIMIT 1
            "#,
        )
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn count_active_applications(&self, worker_id: Uuid) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM applications
            WHERE worker_id = $1 AND status IN ('applied'::application_status, 'shortlisted'::application_status)
            "#,
        )
        .bind(worker_id)
        .fetch_one(&self.pool)
        .await
    }

    async fn count_completed_jobs(&self, worker_id: Uuid) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM applications a
            JOIN jobs j ON j.id = a.job_id
            WHERE a.worker_id = $1
              AND a.status = 'accepted'::application_status
              AND j.status = 'completed'::job_status
            "#,
        )
        .bind(worker_id)
        .fetch_one(&self.pool)
        .await
    }

    async fn get_collaborated_jobs(&self, worker_id: Uuid, employer_id: Uuid) -> Result<Vec<Job>, sqlx::Error> {
        sqlx::query_as::<_, Job>(
            r#"
            SELECT j.* FROM jobs j
            JOIN applications a ON a.job_id = j.id
            WHERE a.worker_id = $1 AND j.employer_id = $2
              AND a.status = 'accepted'::application_status
            ORDER BY j.updated_at DESC
            "#,
        )
        .bind(worker_id)
        .bind(employer_id)
        .fetch_all(&self.pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::fixtures;
    use sqlx::PgPool;

    #[test]
    fn test_contains_pattern_escapes_wildcards() {
        assert_eq!(contains_pattern("mason"), "%mason%");
        assert_eq!(contains_pattern("100%"), "%100\\%%");
        assert_eq!(contains_pattern("tile_work"), "%tile\\_work%");
        assert_eq!(contains_pattern("a\\b"), "%a\\\\b%");
    }

    #[sqlx::test]
    #[ignore] // Requires DATABASE_URL pointing at Postgres
    async fn test_accept_rejects_other_applicants(pool: PgPool) -> sqlx::Result<()> {
        let db = DBClient::new(pool);
        let employer = fixtures::employer(&db, "site@sharma.in").await;
        let job = fixtures::active_job(&db, employer.id, "Wall plastering").await;

        let ramesh = fixtures::worker(&db, "Ramesh", "+919876543210").await;
        let suresh = fixtures::worker(&db, "Suresh", "+919876543211").await;
        let mahesh = fixtures::worker(&db, "Mahesh", "+919876543212").await;

        let chosen = db.create_application(job.id, ramesh.id, None).await?;
        let other = db.create_application(job.id, suresh.id, Some("Available".into())).await?;
        let withdrawn = db.create_application(job.id, mahesh.id, None).await?;
        db.update_application_status(withdrawn.id, ApplicationStatus::Withdrawn).await?;

        let accepted = db.accept_application(chosen.id, job.id).await?.unwrap();
        assert_eq!(accepted.status, ApplicationStatus::Accepted);

        let other = db.get_application(other.id).await?.unwrap();
        assert_eq!(other.status, ApplicationStatus::Rejected);
        let withdrawn = db.get_application(withdrawn.id).await?.unwrap();
        assert_eq!(withdrawn.status, ApplicationStatus::Rejected);

        let job = db.get_job(job.id).await?.unwrap();
        assert_eq!(job.status, JobStatus::InProgress);
        assert_eq!(db.get_accepted_application(job.id).await?.map(|a| a.id), Some(chosen.id));
        Ok(())
    }

    #[sqlx::test]
    #[ignore] // Requires DATABASE_URL pointing at Postgres
    async fn test_second_accept_on_same_job_is_refused(pool: PgPool) -> sqlx::Result<()> {
        let db = DBClient::new(pool);
        let employer = fixtures::employer(&db, "site@sharma.in").await;
        let job = fixtures::active_job(&db, employer.id, "Wall plastering").await;

        let ramesh = fixtures::worker(&db, "Ramesh", "+919876543210").await;
        let suresh = fixtures::worker(&db, "Suresh", "+919876543211").await;
        let first = db.create_application(job.id, ramesh.id, None).await?;
        let second = db.create_application(job.id, suresh.id, None).await?;

        assert!(db.accept_application(first.id, job.id).await?.is_some());
        assert!(db.accept_application(second.id, job.id).await?.is_none());

        let first = db.get_application(first.id).await?.unwrap();
        assert_eq!(first.status, ApplicationStatus::Accepted);
        Ok(())
    }

    #[sqlx::test]
    #[ignore] // Requires DATABASE_URL pointing at Postgres
    async fn test_search_treats_wildcards_literally(pool: PgPool) -> sqlx::Result<()> {
        let db = DBClient::new(pool);
        let employer = fixtures::employer(&db, "site@sharma.in").await;
        let tiling = fixtures::active_job(&db, employer.id, "Floor tile_work").await;
        fixtures::active_job(&db, employer.id, "Floor tiles").await;

        let filter = JobSearchFilter {
            keywords: Some("tile_".into()),
            ..Default::default()
        };
        let found = db.search_active_jobs(&filter).await?;
        assert_eq!(found.iter().map(|j| j.id).collect::<Vec<_>>(), vec![tiling.id]);

        let filter = JobSearchFilter {
            keywords: Some("%".into()),
            ..Default::default()
        };
        assert!(db.search_active_jobs(&filter).await?.is_empty());
        Ok(())
    }
}
