use chrono::Utc;
use uuid::Uuid;

use super::models::Comment;
use super::Store;

impl Store {
    /// Comments on a post, oldest first.
    pub async fn list_comments(&self, post_id: Uuid) -> Result<Vec<Comment>, sqlx::Error> {
        sqlx::query_as::<_, Comment>(
            r#"
            SELECT id, post_id, author_name, body, created_at
            FROM comments
            WHERE post_id = ?
            ORDER BY created_at ASC, rowid ASC
            "#,
        )
        .bind(post_id)
        .fetch_all(self.pool())
        .await
    }

    /// The caller looks the post up first; the foreign key backs that check.
    pub async fn add_comment(
        &self,
        post_id: Uuid,
        author_name: &str,
        body: &str,
    ) -> Result<Comment, sqlx::Error> {
        sqlx::query_as::<_, Comment>(
            r#"
            INSERT INTO comments (id, post_id, author_name, body, created_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING id, post_id, author_name, body, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(post_id)
        .bind(author_name)
        .bind(body)
        .bind(Utc::now())
        .fetch_one(self.pool())
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::NewPost;

    #[tokio::test]
    async fn test_comments_listed_in_order() {
        let store = Store::in_memory().await.unwrap();
        let post = store
            .create_post(NewPost {
                title: "Post".into(),
                slug: "post".into(),
                body: "text".into(),
            })
            .await
            .unwrap();

        store.add_comment(post.id, "Ann", "first").await.unwrap();
        store.add_comment(post.id, "Bob", "second").await.unwrap();

        let comments = store.list_comments(post.id).await.unwrap();
        let bodies: Vec<_> = comments.iter().map(|c| c.body.as_str()).collect();
        assert_eq!(bodies, ["first", "second"]);
    }

    #[tokio::test]
    async fn test_comment_on_missing_post_is_rejected_by_foreign_key() {
        let store = Store::in_memory().await.unwrap();
        assert!(store.add_comment(Uuid::new_v4(), "Ann", "orphan").await.is_err());
    }
}
