use chrono::Utc;
use uuid::Uuid;

use super::models::Admin;
use super::{map_unique, Store, StoreError};
use crate::config::AuthConfig;

impl Store {
    pub async fn count_admins(&self) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM admins")
            .fetch_one(self.pool())
            .await
    }

    /// Case-insensitive lookup; the column is declared `COLLATE NOCASE`.
    pub async fn find_admin_by_email(&self, email: &str) -> Result<Option<Admin>, sqlx::Error> {
        sqlx::query_as::<_, Admin>(
            "SELECT id, email, password_hash, created_at FROM admins WHERE email = ?",
        )
        .bind(email.trim())
        .fetch_optional(self.pool())
        .await
    }

    pub async fn insert_admin(&self, email: &str, password_hash: &str) -> Result<Admin, StoreError> {
        sqlx::query_as::<_, Admin>(
            r#"
            INSERT INTO admins (id, email, password_hash, created_at)
            VALUES (?, ?, ?, ?)
            RETURNING id, email, password_hash, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(email.trim())
        .bind(password_hash)
        .bind(Utc::now())
        .fetch_one(self.pool())
        .await
        .map_err(|e| map_unique(e, "Admin"))
    }

    /// Seed the admin credential from configuration when no admin exists yet.
    pub async fn bootstrap_admin(&self, auth: &AuthConfig) -> Result<(), StoreError> {
        if self.count_admins().await? > 0 {
            return Ok(());
        }

        let hash = match &auth.admin_password_hash {
            Some(hash) => hash.clone(),
            None => {
                let plain = auth.admin_password.clone();
                let cost = auth.bcrypt_cost;
                // bcrypt is CPU-bound; keep it off the async executor.
                tokio::task::spawn_blocking(move || bcrypt::hash(plain, cost))
                    .await
                    .map_err(|e| StoreError::Hash(e.to_string()))?
                    .map_err(|e| StoreError::Hash(e.to_string()))?
            }
        };

        self.insert_admin(&auth.admin_email, &hash).await?;
        tracing::info!(email = %auth.admin_email, "admin account bootstrapped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    #[tokio::test]
    async fn test_bootstrap_admin_runs_once() {
        let store = Store::in_memory().await.unwrap();
        let auth = AppConfig::for_tests().auth;

        store.bootstrap_admin(&auth).await.unwrap();
        store.bootstrap_admin(&auth).await.unwrap();
        assert_eq!(store.count_admins().await.unwrap(), 1);

        let admin = store
            .find_admin_by_email("ADMIN@example.com")
            .await
            .unwrap()
            .unwrap();
        assert!(bcrypt::verify("admin123", &admin.password_hash).unwrap());
    }

    #[tokio::test]
    async fn test_bootstrap_admin_uses_given_hash() {
        let store = Store::in_memory().await.unwrap();
        let mut auth = AppConfig::for_tests().auth;
        auth.admin_password_hash = Some(bcrypt::hash("s3cret-pass", 4).unwrap());

        store.bootstrap_admin(&auth).await.unwrap();
        let admin = store
            .find_admin_by_email(&auth.admin_email)
            .await
            .unwrap()
            .unwrap();
        assert!(bcrypt::verify("s3cret-pass", &admin.password_hash).unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_admin_is_conflict() {
        let store = Store::in_memory().await.unwrap();
        store.insert_admin("a@example.com", "hash").await.unwrap();
        let err = store.insert_admin("A@example.com", "hash").await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)));
    }
}
