// db/notificationdb.rs
use async_trait::async_trait;
use uuid::Uuid;

use super::db::DBClient;
use crate::models::notificationmodel::Notification;

#[async_trait]
pub trait NotificationExt {
    async fn create_notification(
        &self,
        user_id: Uuid,
        title: &str,
        message: &str,
        link_url: Option<&str>,
    ) -> Result<Notification, sqlx::Error>;

    /// Returns every notification as it was before being marked read.
    async fn list_and_mark_read(&self, user_id: Uuid) -> Result<Vec<Notification>, sqlx::Error>;

    async fn mark_notification_read(
        &self,
        notification_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Notification>, sqlx::Error>;

    async fn mark_all_read(&self, user_id: Uuid) -> Result<u64, sqlx::Error>;

    async fn count_unread(&self, user_id: Uuid) -> Result<i64, sqlx::Error>;

    async fn get_recent_notifications(&self, user_id: Uuid, limit: i64) -> Result<Vec<Notification>, sqlx::Error>;
}

#[async_trait]
impl NotificationExt for DBClient {
    async fn create_notification(
        &self,
        user_id: Uuid,
        title: &str,
        message: &str,
        link_url: Option<&str>,
    ) -> Result<Notification, sqlx::Error> {
        sqlx::query_as::<_, Notification>(
            r#"
            INSERT INTO notifications (id, user_id, title, message, link_url)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(title)
        .bind(message)
        .bind(link_url)
        .fetch_one(&self.pool)
        .await
    }

    async fn list_and_mark_read(&self, user_id: Uuid) -> Result<Vec<Notification>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let notifications = sqlx::query_as::<_, Notification>(
            r#"SELECT * FROM notifications WHERE user_id = $1 ORDER BY created_at DESC"#,
        )
        .bind(user_id)
        .fetch_all(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE notifications SET is_read = TRUE, read_at = NOW()
            WHERE user_id = $1 AND is_read = FALSE
            "#,
        )
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(notifications)
    }

    async fn mark_notification_read(
        &self,
        notification_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Notification>, sqlx::Error> {
        sqlx::query_as::<_, Notification>(
            r#"
            UPDATE notifications
            SET is_read = TRUE, read_at = COALESCE(read_at, NOW())
            WHERE id = $1 AND user_id = $2
            RETURNING *
            "#,
        )
        .bind(notification_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn mark_all_read(&self, user_id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE notifications SET is_read = TRUE, read_at = NOW()
            WHERE user_id = $1 AND is_read = FALSE
            "#,
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn count_unread(&self, user_id: Uuid) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(r#"SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND is_read = FALSE"#)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
    }

    async fn get_recent_notifications(&self, user_id: Uuid, limit: i64) -> Result<Vec<Notification>, sqlx::Error> {
        sqlx::query_as::<_, Notification>(
            r#"SELECT * FROM notifications WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2"#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
    }
}
