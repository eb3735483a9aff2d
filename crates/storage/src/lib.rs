pub mod postgres_store;
mod repository;
mod restore;
mod slugs;
pub mod sqlite_store;
pub mod store;

pub use repository::{BackupSummary, ContentRepository};
pub use slugs::{SlugChange, SlugReport};
pub use store::ContentStore;
