use chrono::Utc;
use uuid::Uuid;

use super::models::Subscriber;
use super::Store;

impl Store {
    pub async fn list_subscribers(&self) -> Result<Vec<Subscriber>, sqlx::Error> {
        sqlx::query_as::<_, Subscriber>(
            "SELECT id, email, created_at FROM subscribers ORDER BY created_at DESC, rowid DESC",
        )
        .fetch_all(self.pool())
        .await
    }

    pub async fn subscriber_emails(&self) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar::<_, String>("SELECT email FROM subscribers ORDER BY rowid ASC")
            .fetch_all(self.pool())
            .await
    }

    /// Insert a normalized email. Returns false when it was already subscribed.
    pub async fn add_subscriber(&self, email: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO subscribers (id, email, created_at)
            VALUES (?, ?, ?)
            ON CONFLICT(email) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(Utc::now())
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_subscriber(&self, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM subscribers WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
