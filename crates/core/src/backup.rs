use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::content::ContentRecord;
use crate::hash::content_hash;

/// Immutable snapshot of a post body. Rows are only ever inserted and read;
/// retention pruning is the sole delete path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupCopy {
    pub id: Uuid,
    pub post_id: Uuid,
    pub content: String,
    pub content_hash: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewBackupCopy {
    pub post_id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl NewBackupCopy {
    /// Snapshot of the record's current body, or `None` when the body is blank.
    pub fn snapshot(record: &ContentRecord, created_at: DateTime<Utc>) -> Option<Self> {
        record.body().map(|body| Self {
            post_id: record.id,
            content: body.to_owned(),
            created_at,
        })
    }

    pub fn into_copy(self) -> BackupCopy {
        BackupCopy {
            id: Uuid::new_v4(),
            post_id: self.post_id,
            content_hash: content_hash(&self.content),
            content: self.content,
            created_at: self.created_at,
        }
    }
}
