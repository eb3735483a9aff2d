use anyhow::Result;
use chrono::{DateTime, Utc};
use muv_content_core::{BackupCopy, ContentRecord, ContentStatus};
use uuid::Uuid;

/// Posts and their backups, implemented by both SQLite and Postgres backends.
#[async_trait::async_trait]
pub trait ContentStore: Send + Sync {
    async fn insert_post(&self, post: &ContentRecord) -> Result<()>;

    /// All posts ordered by slug.
    async fn list_posts(&self) -> Result<Vec<ContentRecord>>;

    /// Posts with the given status ordered by slug.
    async fn list_posts_with_status(&self, status: ContentStatus) -> Result<Vec<ContentRecord>>;

    async fn get_post(&self, id: Uuid) -> Result<Option<ContentRecord>>;

    async fn get_post_by_slug(&self, slug: &str) -> Result<Option<ContentRecord>>;

    /// Replace a post body. Fails if the post does not exist.
    async fn update_content(&self, id: Uuid, content: &str, updated_at: DateTime<Utc>) -> Result<()>;

    /// Rename a post. Fails if the post does not exist or the slug is taken.
    async fn update_slug(&self, id: Uuid, slug: &str, updated_at: DateTime<Utc>) -> Result<()>;

    /// Insert all backups or none of them.
    async fn insert_backups(&self, backups: &[BackupCopy]) -> Result<()>;

    /// Backups of one post ordered by created_at DESC.
    async fn list_backups(&self, post_id: Uuid) -> Result<Vec<BackupCopy>>;

    async fn get_backup(&self, id: Uuid) -> Result<Option<BackupCopy>>;

    /// Delete backups created before `cutoff`, except the newest backup of
    /// each post. Returns the number of rows removed.
    async fn prune_backups_before(&self, cutoff: DateTime<Utc>) -> Result<usize>;
}
