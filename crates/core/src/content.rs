use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ContentStatus {
    Draft,
    Published,
}

impl ContentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentStatus::Draft => "draft",
            ContentStatus::Published => "published",
        }
    }

    /// Anything other than `published` is treated as a draft.
    pub fn parse(raw: &str) -> Self {
        if raw.eq_ignore_ascii_case("published") {
            ContentStatus::Published
        } else {
            ContentStatus::Draft
        }
    }
}

/// A blog post as stored in the `posts` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentRecord {
    pub id: Uuid,
    pub slug: String,
    pub title: String,
    pub status: ContentStatus,
    pub content: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl ContentRecord {
    pub fn new(
        slug: impl Into<String>,
        title: impl Into<String>,
        status: ContentStatus,
        content: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            slug: slug.into(),
            title: title.into(),
            status,
            content,
            updated_at: Utc::now(),
        }
    }

    /// Body text, or `None` when missing or blank.
    pub fn body(&self) -> Option<&str> {
        self.content
            .as_deref()
            .filter(|body| !body.trim().is_empty())
    }
}
