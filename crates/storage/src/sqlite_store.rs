use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use muv_content_core::{BackupCopy, ContentRecord, ContentStatus};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::store::ContentStore;

const POST_COLUMNS: &str = "id, slug, title, status, content, updated_at";
const BACKUP_COLUMNS: &str = "id, post_id, content, content_hash, created_at";

/// SQLite-backed content store. Each method opens a fresh connection on the
/// blocking pool.
pub struct SqliteStore {
    db_path: PathBuf,
}

impl SqliteStore {
    pub fn new(db_path: PathBuf) -> Result<Self> {
        let store = Self { db_path };
        store.init_db()?;
        Ok(store)
    }

    fn init_db(&self) -> Result<()> {
        let conn = open(&self.db_path)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS posts (
                id TEXT PRIMARY KEY,
                slug TEXT NOT NULL UNIQUE,
                title TEXT NOT NULL,
                status TEXT NOT NULL,
                content TEXT,
                updated_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS post_backups (
                id TEXT PRIMARY KEY,
                post_id TEXT NOT NULL REFERENCES posts(id),
                content TEXT NOT NULL,
                content_hash TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS post_backups_by_post
                ON post_backups (post_id, created_at);",
        )
        .context("create content tables")?;
        Ok(())
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    {
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = open(&db_path)?;
            f(&mut conn)
        })
        .await?
    }
}

fn open(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path).context("open content db")?;
    conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 5000;")?;
    Ok(conn)
}

#[async_trait::async_trait]
impl ContentStore for SqliteStore {
    async fn insert_post(&self, post: &ContentRecord) -> Result<()> {
        let post = post.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO posts (id, slug, title, status, content, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    post.id.to_string(),
                    post.slug,
                    post.title,
                    post.status.as_str(),
                    post.content,
                    format_ts(post.updated_at),
                ],
            )
            .with_context(|| format!("insert post {}", post.slug))?;
            Ok(())
        })
        .await
    }

    async fn list_posts(&self) -> Result<Vec<ContentRecord>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {POST_COLUMNS} FROM posts ORDER BY slug"))?;
            let rows = stmt.query_map([], row_to_post)?;
            rows.collect::<std::result::Result<Vec<_>, _>>().map_err(Into::into)
        })
        .await
    }

    async fn list_posts_with_status(&self, status: ContentStatus) -> Result<Vec<ContentRecord>> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {POST_COLUMNS} FROM posts WHERE status = ?1 ORDER BY slug"
            ))?;
            let rows = stmt.query_map([status.as_str()], row_to_post)?;
            rows.collect::<std::result::Result<Vec<_>, _>>().map_err(Into::into)
        })
        .await
    }

    async fn get_post(&self, id: Uuid) -> Result<Option<ContentRecord>> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&format!("SELECT {POST_COLUMNS} FROM posts WHERE id = ?1"))?;
            let found = stmt.query_row([id.to_string()], row_to_post).optional()?;
            Ok(found)
        })
        .await
    }

    async fn get_post_by_slug(&self, slug: &str) -> Result<Option<ContentRecord>> {
        let slug = slug.to_owned();
        self.with_conn(move |conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {POST_COLUMNS} FROM posts WHERE slug = ?1"))?;
            let found = stmt.query_row([slug], row_to_post).optional()?;
            Ok(found)
        })
        .await
    }

    async fn update_content(&self, id: Uuid, content: &str, updated_at: DateTime<Utc>) -> Result<()> {
        let content = content.to_owned();
        self.with_conn(move |conn| {
            let changed = conn.execute(
                "UPDATE posts SET content = ?1, updated_at = ?2 WHERE id = ?3",
                params![content, format_ts(updated_at), id.to_string()],
            )?;
            if changed == 0 {
                bail!("post {id} not found");
            }
            Ok(())
        })
        .await
    }

    async fn update_slug(&self, id: Uuid, slug: &str, updated_at: DateTime<Utc>) -> Result<()> {
        let slug = slug.to_owned();
        self.with_conn(move |conn| {
            let changed = conn.execute(
                "UPDATE posts SET slug = ?1, updated_at = ?2 WHERE id = ?3",
                params![slug, format_ts(updated_at), id.to_string()],
            )?;
            if changed == 0 {
                bail!("post {id} not found");
            }
            Ok(())
        })
        .await
    }

    async fn insert_backups(&self, backups: &[BackupCopy]) -> Result<()> {
        let backups = backups.to_vec();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO post_backups (id, post_id, content, content_hash, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                )?;
                for backup in &backups {
                    stmt.execute(params![
                        backup.id.to_string(),
                        backup.post_id.to_string(),
                        backup.content,
                        backup.content_hash,
                        format_ts(backup.created_at),
                    ])
                    .with_context(|| format!("insert backup for post {}", backup.post_id))?;
                }
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn list_backups(&self, post_id: Uuid) -> Result<Vec<BackupCopy>> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {BACKUP_COLUMNS} FROM post_backups
                 WHERE post_id = ?1 ORDER BY created_at DESC, rowid DESC"
            ))?;
            let rows = stmt.query_map([post_id.to_string()], row_to_backup)?;
            rows.collect::<std::result::Result<Vec<_>, _>>().map_err(Into::into)
        })
        .await
    }

    async fn get_backup(&self, id: Uuid) -> Result<Option<BackupCopy>> {
        self.with_conn(move |conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {BACKUP_COLUMNS} FROM post_backups WHERE id = ?1"))?;
            let found = stmt.query_row([id.to_string()], row_to_backup).optional()?;
            Ok(found)
        })
        .await
    }

    async fn prune_backups_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        self.with_conn(move |conn| {
            let removed = conn.execute(
                "DELETE FROM post_backups
                 WHERE created_at < ?1
                   AND created_at < (
                     SELECT MAX(c.created_at) FROM post_backups c
                     WHERE c.post_id = post_backups.post_id
                   )",
                [format_ts(cutoff)],
            )?;
            Ok(removed)
        })
        .await
    }
}

/// Fixed-width UTC timestamps so lexical order matches time order.
fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn row_to_post(row: &rusqlite::Row) -> rusqlite::Result<ContentRecord> {
    let status: String = row.get(3)?;
    Ok(ContentRecord {
        id: parse_uuid(0, row.get(0)?)?,
        slug: row.get(1)?,
        title: row.get(2)?,
        status: ContentStatus::parse(&status),
        content: row.get(4)?,
        updated_at: parse_ts(5, row.get(5)?)?,
    })
}

fn row_to_backup(row: &rusqlite::Row) -> rusqlite::Result<BackupCopy> {
    Ok(BackupCopy {
        id: parse_uuid(0, row.get(0)?)?,
        post_id: parse_uuid(1, row.get(1)?)?,
        content: row.get(2)?,
        content_hash: row.get(3)?,
        created_at: parse_ts(4, row.get(4)?)?,
    })
}

fn parse_uuid(col: usize, raw: String) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(&raw).map_err(|e| to_sql_err(col, Box::new(e)))
}

fn parse_ts(col: usize, raw: String) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| to_sql_err(col, Box::new(e)))
}

fn to_sql_err(col: usize, e: Box<dyn std::error::Error + Send + Sync>) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(col, rusqlite::types::Type::Text, e)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use muv_content_core::NewBackupCopy;

    fn store(dir: &tempfile::TempDir) -> SqliteStore {
        SqliteStore::new(dir.path().join("content.db")).expect("store")
    }

    fn backup_at(post: &ContentRecord, body: &str, created_at: DateTime<Utc>) -> BackupCopy {
        NewBackupCopy {
            post_id: post.id,
            content: body.to_owned(),
            created_at,
        }
        .into_copy()
    }

    #[tokio::test]
    async fn posts_round_trip_and_filter_by_status() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store(&tmp);
        let published = ContentRecord::new("zumba", "Zumba", ContentStatus::Published, Some("<p>z</p>".into()));
        let draft = ContentRecord::new("bozza", "Bozza", ContentStatus::Draft, None);
        store.insert_post(&published).await.unwrap();
        store.insert_post(&draft).await.unwrap();

        let all = store.list_posts().await.unwrap();
        assert_eq!(all.iter().map(|p| p.slug.as_str()).collect::<Vec<_>>(), ["bozza", "zumba"]);

        let live = store.list_posts_with_status(ContentStatus::Published).await.unwrap();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].id, published.id);
        assert_eq!(live[0].content.as_deref(), Some("<p>z</p>"));

        let by_slug = store.get_post_by_slug("bozza").await.unwrap().unwrap();
        assert_eq!(by_slug.status, ContentStatus::Draft);
        assert!(by_slug.content.is_none());
    }

    #[tokio::test]
    async fn duplicate_slug_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store(&tmp);
        store
            .insert_post(&ContentRecord::new("yoga", "Yoga", ContentStatus::Draft, None))
            .await
            .unwrap();
        let err = store
            .insert_post(&ContentRecord::new("yoga", "Yoga 2", ContentStatus::Draft, None))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("yoga"));
    }

    #[tokio::test]
    async fn updating_a_missing_post_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store(&tmp);
        let err = store
            .update_content(Uuid::new_v4(), "<p>x</p>", Utc::now())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[tokio::test]
    async fn backups_list_newest_first() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store(&tmp);
        let post = ContentRecord::new("ems", "EMS", ContentStatus::Published, None);
        store.insert_post(&post).await.unwrap();

        let now = Utc::now();
        let old = backup_at(&post, "<p>vecchio</p>", now - Duration::days(2));
        let new = backup_at(&post, "<p>nuovo</p>", now);
        store.insert_backups(&[old.clone(), new.clone()]).await.unwrap();

        let listed = store.list_backups(post.id).await.unwrap();
        assert_eq!(listed.iter().map(|b| b.id).collect::<Vec<_>>(), [new.id, old.id]);
        let fetched = store.get_backup(old.id).await.unwrap().unwrap();
        assert_eq!(fetched.content, "<p>vecchio</p>");
        assert_eq!(fetched.content_hash, old.content_hash);
    }

    #[tokio::test]
    async fn equal_timestamps_list_last_inserted_first() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store(&tmp);
        let post = ContentRecord::new("hiit", "HIIT", ContentStatus::Published, None);
        store.insert_post(&post).await.unwrap();

        let at = Utc::now();
        let first = backup_at(&post, "<p>primo</p>", at);
        let second = backup_at(&post, "<p>secondo</p>", at);
        store.insert_backups(&[first.clone(), second.clone()]).await.unwrap();

        let listed = store.list_backups(post.id).await.unwrap();
        assert_eq!(listed.iter().map(|b| b.id).collect::<Vec<_>>(), [second.id, first.id]);
    }

    #[tokio::test]
    async fn batch_insert_is_all_or_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store(&tmp);
        let post = ContentRecord::new("ems", "EMS", ContentStatus::Published, None);
        store.insert_post(&post).await.unwrap();
        let orphan = ContentRecord::new("fantasma", "Fantasma", ContentStatus::Published, None);

        let good = backup_at(&post, "<p>ok</p>", Utc::now());
        let bad = backup_at(&orphan, "<p>ko</p>", Utc::now());
        assert!(store.insert_backups(&[good, bad]).await.is_err());
        assert!(store.list_backups(post.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn pruning_keeps_the_newest_backup_per_post() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store(&tmp);
        let a = ContentRecord::new("a", "A", ContentStatus::Published, None);
        let b = ContentRecord::new("b", "B", ContentStatus::Published, None);
        store.insert_post(&a).await.unwrap();
        store.insert_post(&b).await.unwrap();

        let now = Utc::now();
        let a_old = backup_at(&a, "a1", now - Duration::days(200));
        let a_mid = backup_at(&a, "a2", now - Duration::days(120));
        let a_new = backup_at(&a, "a3", now - Duration::days(1));
        let b_only = backup_at(&b, "b1", now - Duration::days(300));
        store
            .insert_backups(&[a_old, a_mid, a_new.clone(), b_only.clone()])
            .await
            .unwrap();

        let removed = store.prune_backups_before(now - Duration::days(90)).await.unwrap();
        assert_eq!(removed, 2);
        assert_eq!(store.list_backups(a.id).await.unwrap()[0].id, a_new.id);
        assert_eq!(store.list_backups(a.id).await.unwrap().len(), 1);
        assert_eq!(store.list_backups(b.id).await.unwrap()[0].id, b_only.id);
    }

    #[test]
    fn timestamps_sort_lexically() {
        let base = DateTime::parse_from_rfc3339("2026-02-13T01:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let later = base + Duration::milliseconds(5);
        assert_eq!(format_ts(base), "2026-02-13T01:00:00.000000Z");
        assert!(format_ts(base) < format_ts(later));
    }
}
