pub mod backup;
pub mod cleanup;
pub mod content;
pub mod dedupe;
pub mod hash;
pub mod restore;
pub mod select;
pub mod slug;
pub mod words;

pub use backup::{BackupCopy, NewBackupCopy};
pub use cleanup::collapse_inter_tag_whitespace;
pub use content::{ContentRecord, ContentStatus};
pub use dedupe::{dedupe, DEFAULT_CTA_CLASS};
pub use hash::content_hash;
pub use restore::{
    RecordError, RestoreOptions, RestoreReport, RestoreResult, RestoreStatus, RestoreSummary,
    UnderMin,
};
pub use select::{select_best, Candidate};
pub use slug::{is_normalized, slugify, unique_slug};
pub use words::word_count;
