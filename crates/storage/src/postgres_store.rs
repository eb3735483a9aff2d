use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use muv_content_core::{BackupCopy, ContentRecord, ContentStatus};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::store::ContentStore;

/// Postgres-backed content store, for the hosted database the site runs on.
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .context("connect to postgres")?;
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS posts (
                id UUID PRIMARY KEY,
                slug TEXT NOT NULL UNIQUE,
                title TEXT NOT NULL,
                status TEXT NOT NULL,
                content TEXT,
                updated_at TIMESTAMPTZ NOT NULL
            )",
        )
        .execute(&self.pool)
        .await
        .context("create posts table")?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS post_backups (
                id UUID PRIMARY KEY,
                post_id UUID NOT NULL REFERENCES posts(id),
                content TEXT NOT NULL,
                content_hash TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL,
                seq BIGSERIAL
            )",
        )
        .execute(&self.pool)
        .await
        .context("create post_backups table")?;

        // Tables created before `seq` existed.
        sqlx::query("ALTER TABLE post_backups ADD COLUMN IF NOT EXISTS seq BIGSERIAL")
            .execute(&self.pool)
            .await
            .context("add post_backups.seq")?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS post_backups_by_post ON post_backups (post_id, created_at)",
        )
        .execute(&self.pool)
        .await
        .context("create post_backups index")?;

        Ok(())
    }
}

#[async_trait::async_trait]
impl ContentStore for PostgresStore {
    async fn insert_post(&self, post: &ContentRecord) -> Result<()> {
        sqlx::query(
            "INSERT INTO posts (id, slug, title, status, content, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(post.id)
        .bind(&post.slug)
        .bind(&post.title)
        .bind(post.status.as_str())
        .bind(&post.content)
        .bind(post.updated_at)
        .execute(&self.pool)
        .await
        .with_context(|| format!("insert post {}", post.slug))?;
        Ok(())
    }

    async fn list_posts(&self) -> Result<Vec<ContentRecord>> {
        let rows = sqlx::query(
            "SELECT id, slug, title, status, content, updated_at FROM posts ORDER BY slug",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(pg_row_to_post).collect())
    }

    async fn list_posts_with_status(&self, status: ContentStatus) -> Result<Vec<ContentRecord>> {
        let rows = sqlx::query(
            "SELECT id, slug, title, status, content, updated_at FROM posts
             WHERE status = $1 ORDER BY slug",
        )
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(pg_row_to_post).collect())
    }

    async fn get_post(&self, id: Uuid) -> Result<Option<ContentRecord>> {
        let row = sqlx::query(
            "SELECT id, slug, title, status, content, updated_at FROM posts WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(pg_row_to_post))
    }

    async fn get_post_by_slug(&self, slug: &str) -> Result<Option<ContentRecord>> {
        let row = sqlx::query(
            "SELECT id, slug, title, status, content, updated_at FROM posts WHERE slug = $1",
        )
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(pg_row_to_post))
    }

    async fn update_content(&self, id: Uuid, content: &str, updated_at: DateTime<Utc>) -> Result<()> {
        let done = sqlx::query("UPDATE posts SET content = $1, updated_at = $2 WHERE id = $3")
            .bind(content)
            .bind(updated_at)
            .bind(id)
            .execute(&self.pool)
            .await?;
        if done.rows_affected() == 0 {
            bail!("post {id} not found");
        }
        Ok(())
    }

    async fn update_slug(&self, id: Uuid, slug: &str, updated_at: DateTime<Utc>) -> Result<()> {
        let done = sqlx::query("UPDATE posts SET slug = $1, updated_at = $2 WHERE id = $3")
            .bind(slug)
            .bind(updated_at)
            .bind(id)
            .execute(&self.pool)
            .await?;
        if done.rows_affected() == 0 {
            bail!("post {id} not found");
        }
        Ok(())
    }

    async fn insert_backups(&self, backups: &[BackupCopy]) -> Result<()> {
        let mut tx = self.pool.begin().await.context("begin backup batch")?;
        for backup in backups {
            sqlx::query(
                "INSERT INTO post_backups (id, post_id, content, content_hash, created_at)
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(backup.id)
            .bind(backup.post_id)
            .bind(&backup.content)
            .bind(&backup.content_hash)
            .bind(backup.created_at)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("insert backup for post {}", backup.post_id))?;
        }
        tx.commit().await.context("commit backup batch")?;
        Ok(())
    }

    async fn list_backups(&self, post_id: Uuid) -> Result<Vec<BackupCopy>> {
        let rows = sqlx::query(
            "SELECT id, post_id, content, content_hash, created_at FROM post_backups
             WHERE post_id = $1 ORDER BY created_at DESC, seq DESC",
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(pg_row_to_backup).collect())
    }

    async fn get_backup(&self, id: Uuid) -> Result<Option<BackupCopy>> {
        let row = sqlx::query(
            "SELECT id, post_id, content, content_hash, created_at FROM post_backups WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(pg_row_to_backup))
    }

    async fn prune_backups_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let done = sqlx::query(
            "DELETE FROM post_backups b
             WHERE b.created_at < $1
               AND b.created_at < (
                 SELECT MAX(c.created_at) FROM post_backups c WHERE c.post_id = b.post_id
               )",
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?;
        Ok(done.rows_affected() as usize)
    }
}

fn pg_row_to_post(row: &sqlx::postgres::PgRow) -> ContentRecord {
    let status: String = row.get("status");
    ContentRecord {
        id: row.get("id"),
        slug: row.get("slug"),
        title: row.get("title"),
        status: ContentStatus::parse(&status),
        content: row.get("content"),
        updated_at: row.get("updated_at"),
    }
}

fn pg_row_to_backup(row: &sqlx::postgres::PgRow) -> BackupCopy {
    BackupCopy {
        id: row.get("id"),
        post_id: row.get("post_id"),
        content: row.get("content"),
        content_hash: row.get("content_hash"),
        created_at: row.get("created_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use muv_content_core::NewBackupCopy;

    /// Runs only when `MUV_TEST_DATABASE_URL` points at a scratch database.
    async fn store() -> Option<PostgresStore> {
        let url = std::env::var("MUV_TEST_DATABASE_URL").ok()?;
        Some(PostgresStore::new(&url).await.expect("connect"))
    }

    #[tokio::test]
    async fn equal_timestamps_list_last_inserted_first() {
        let Some(store) = store().await else {
            return;
        };
        let post = ContentRecord::new(
            format!("tie-{}", Uuid::new_v4()),
            "Tie",
            ContentStatus::Published,
            None,
        );
        store.insert_post(&post).await.unwrap();

        let at = Utc::now();
        let copies: Vec<BackupCopy> = ["<p>primo</p>", "<p>secondo</p>", "<p>terzo</p>"]
            .into_iter()
            .map(|body| {
                NewBackupCopy {
                    post_id: post.id,
                    content: body.to_owned(),
                    created_at: at,
                }
                .into_copy()
            })
            .collect();
        store.insert_backups(&copies).await.unwrap();

        let listed = store.list_backups(post.id).await.unwrap();
        let bodies: Vec<&str> = listed.iter().map(|b| b.content.as_str()).collect();
        assert_eq!(bodies, ["<p>terzo</p>", "<p>secondo</p>", "<p>primo</p>"]);
    }
}
