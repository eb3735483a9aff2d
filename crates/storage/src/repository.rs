use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Duration, Utc};
use muv_content_core::{word_count, BackupCopy, ContentRecord, NewBackupCopy};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::postgres_store::PostgresStore;
use crate::sqlite_store::SqliteStore;
use crate::store::ContentStore;

#[derive(Clone)]
pub struct ContentRepository {
    pub(crate) store: Arc<dyn ContentStore>,
}

/// Backup listing entry: metadata and word count, without the body.
#[derive(Debug, Clone, Serialize)]
pub struct BackupSummary {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub content_hash: String,
    pub words: usize,
}

impl From<BackupCopy> for BackupSummary {
    fn from(backup: BackupCopy) -> Self {
        Self {
            words: word_count(&backup.content),
            id: backup.id,
            created_at: backup.created_at,
            content_hash: backup.content_hash,
        }
    }
}

impl ContentRepository {
    /// SQLite repository under `root/state/content.db`.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let state_dir = root.join("state");
        fs::create_dir_all(&state_dir).context("create state directory")?;
        let store = SqliteStore::new(state_dir.join("content.db"))?;
        Ok(Self::with_store(Arc::new(store)))
    }

    /// Postgres when `database_url` is set, SQLite under `root` otherwise.
    pub async fn init(root: PathBuf, database_url: Option<&str>) -> Result<Self> {
        match database_url {
            Some(url) => {
                info!("using postgres content store");
                let store = PostgresStore::new(url).await?;
                Ok(Self::with_store(Arc::new(store)))
            }
            None => {
                info!(root = %root.display(), "using sqlite content store");
                Self::new(root)
            }
        }
    }

    pub fn with_store(store: Arc<dyn ContentStore>) -> Self {
        Self { store }
    }

    pub async fn add_post(&self, post: &ContentRecord) -> Result<()> {
        self.store.insert_post(post).await
    }

    pub async fn list_posts(&self) -> Result<Vec<ContentRecord>> {
        self.store.list_posts().await
    }

    pub async fn get_post(&self, id: Uuid) -> Result<Option<ContentRecord>> {
        self.store.get_post(id).await
    }

    pub async fn get_post_by_slug(&self, slug: &str) -> Result<Option<ContentRecord>> {
        self.store.get_post_by_slug(slug).await
    }

    pub async fn get_backup(&self, id: Uuid) -> Result<Option<BackupCopy>> {
        self.store.get_backup(id).await
    }

    /// Backups of the post with `slug`, newest first, or `None` when no such post exists.
    pub async fn list_backups_for_slug(&self, slug: &str) -> Result<Option<Vec<BackupSummary>>> {
        let Some(post) = self.store.get_post_by_slug(slug).await? else {
            return Ok(None);
        };
        let backups = self.store.list_backups(post.id).await?;
        Ok(Some(backups.into_iter().map(BackupSummary::from).collect()))
    }

    /// Copies the current body of each post into the backup table as one batch.
    /// Posts with a blank body are skipped. Returns the number of copies written.
    pub async fn snapshot(&self, posts: &[ContentRecord]) -> Result<usize> {
        let now = Utc::now();
        let copies: Vec<BackupCopy> = posts
            .iter()
            .filter_map(|post| NewBackupCopy::snapshot(post, now))
            .map(NewBackupCopy::into_copy)
            .collect();
        if copies.is_empty() {
            return Ok(0);
        }

        self.store
            .insert_backups(&copies)
            .await
            .context("insert snapshot batch")?;
        Ok(copies.len())
    }

    /// Deletes backups older than `days`, keeping each post's newest one.
    pub async fn prune_backups_older_than_days(&self, days: i64) -> Result<usize> {
        if days < 0 {
            bail!("retention days must not be negative, got {days}");
        }
        let cutoff = Duration::try_days(days)
            .and_then(|window| Utc::now().checked_sub_signed(window))
            .with_context(|| format!("retention window of {days} days is out of range"))?;
        self.store.prune_backups_before(cutoff).await
    }
}
