//! Post queries, including the cascading delete and the full-site wipe.

use chrono::Utc;
use uuid::Uuid;

use super::models::{NewPost, Post, WipeSummary};
use super::{map_unique, Store, StoreError};

const POST_COLUMNS: &str = "id, title, slug, body, created_at, updated_at";

impl Store {
    /// All posts, newest first.
    pub async fn list_posts(&self) -> Result<Vec<Post>, sqlx::Error> {
        sqlx::query_as::<_, Post>(&format!(
            "SELECT {POST_COLUMNS} FROM posts ORDER BY created_at DESC, rowid DESC"
        ))
        .fetch_all(self.pool())
        .await
    }

    pub async fn recent_posts(&self, limit: i64) -> Result<Vec<Post>, sqlx::Error> {
        sqlx::query_as::<_, Post>(&format!(
            "SELECT {POST_COLUMNS} FROM posts ORDER BY created_at DESC, rowid DESC LIMIT ?"
        ))
        .bind(limit)
        .fetch_all(self.pool())
        .await
    }

    pub async fn find_post_by_slug(&self, slug: &str) -> Result<Option<Post>, sqlx::Error> {
        sqlx::query_as::<_, Post>(&format!("SELECT {POST_COLUMNS} FROM posts WHERE slug = ?"))
            .bind(slug)
            .fetch_optional(self.pool())
            .await
    }

    /// Insert a post. A taken slug is rejected, never disambiguated.
    pub async fn create_post(&self, new: NewPost) -> Result<Post, StoreError> {
        sqlx::query_as::<_, Post>(&format!(
            "INSERT INTO posts (id, title, slug, body, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, NULL) RETURNING {POST_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&new.title)
        .bind(&new.slug)
        .bind(&new.body)
        .bind(Utc::now())
        .fetch_one(self.pool())
        .await
        .map_err(|e| map_unique(e, "Slug"))
    }

    /// Update title and body; the slug never changes after creation.
    pub async fn update_post(
        &self,
        slug: &str,
        title: &str,
        body: &str,
    ) -> Result<Option<Post>, sqlx::Error> {
        sqlx::query_as::<_, Post>(&format!(
            "UPDATE posts SET title = ?, body = ?, updated_at = ? \
             WHERE slug = ? RETURNING {POST_COLUMNS}"
        ))
        .bind(title)
        .bind(body)
        .bind(Utc::now())
        .bind(slug)
        .fetch_optional(self.pool())
        .await
    }

    /// Delete a post and its comments. Returns false when no post had this slug.
    pub async fn delete_post(&self, slug: &str) -> Result<bool, sqlx::Error> {
        let mut tx = self.pool().begin().await?;

        let comments =
            sqlx::query("DELETE FROM comments WHERE post_id IN (SELECT id FROM posts WHERE slug = ?)")
                .bind(slug)
                .execute(&mut *tx)
                .await?;

        let posts = sqlx::query("DELETE FROM posts WHERE slug = ?")
            .bind(slug)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        if posts.rows_affected() > 0 {
            tracing::info!(
                slug = %slug,
                comments = comments.rows_affected(),
                "post deleted"
            );
        }
        Ok(posts.rows_affected() > 0)
    }

    /// Remove every post, comment and subscriber. Admin accounts are kept.
    pub async fn wipe_site(&self) -> Result<WipeSummary, sqlx::Error> {
        let mut tx = self.pool().begin().await?;

        let comments = sqlx::query("DELETE FROM comments").execute(&mut *tx).await?;
        let posts = sqlx::query("DELETE FROM posts").execute(&mut *tx).await?;
        let subscribers = sqlx::query("DELETE FROM subscribers").execute(&mut *tx).await?;

        tx.commit().await?;

        Ok(WipeSummary {
            posts: posts.rows_affected(),
            comments: comments.rows_affected(),
            subscribers: subscribers.rows_affected(),
        })
    }
}
