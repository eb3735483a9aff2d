use serde::{Deserialize, Serialize};

use crate::dedupe::DEFAULT_CTA_CLASS;

pub const DEFAULT_MIN_WORDS: usize = 2000;
pub const DEFAULT_EXCLUDED_SLUGS: [&str; 3] = ["privacy", "cookie-policy", "termini-condizioni"];

/// Tunables for one restore pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreOptions {
    /// Posts never touched by the pass (legal pages and the like).
    pub exclude_slugs: Vec<String>,
    /// Restored posts below this count are flagged in the report, not withheld.
    pub min_words: usize,
    /// Marker class of call-to-action blocks for deduplication.
    pub cta_class: String,
}

impl Default for RestoreOptions {
    fn default() -> Self {
        Self {
            exclude_slugs: DEFAULT_EXCLUDED_SLUGS.iter().map(|s| s.to_string()).collect(),
            min_words: DEFAULT_MIN_WORDS,
            cta_class: DEFAULT_CTA_CLASS.to_owned(),
        }
    }
}

impl RestoreOptions {
    pub fn is_excluded(&self, slug: &str) -> bool {
        self.exclude_slugs.iter().any(|excluded| excluded == slug)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RestoreStatus {
    Restored,
    NoBackup,
    Error,
}

/// Outcome for a single post in a single pass. Never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RestoreResult {
    pub slug: String,
    pub status: RestoreStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub words: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RestoreResult {
    pub fn restored(slug: impl Into<String>, words: usize) -> Self {
        Self {
            slug: slug.into(),
            status: RestoreStatus::Restored,
            words: Some(words),
            error: None,
        }
    }

    pub fn no_backup(slug: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            status: RestoreStatus::NoBackup,
            words: None,
            error: None,
        }
    }

    pub fn failed(slug: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            status: RestoreStatus::Error,
            words: None,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UnderMin {
    pub slug: String,
    pub words: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecordError {
    pub slug: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RestoreSummary {
    pub total: usize,
    pub restored: usize,
    pub no_backup: usize,
    pub under_min: usize,
    pub errors: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RestoreReport {
    pub summary: RestoreSummary,
    pub results: Vec<RestoreResult>,
    pub under_min: Vec<UnderMin>,
    pub errors: Vec<RecordError>,
}

impl RestoreReport {
    pub fn new(total: usize) -> Self {
        Self {
            summary: RestoreSummary {
                total,
                ..RestoreSummary::default()
            },
            ..Self::default()
        }
    }

    /// Folds one result into the counters and side lists.
    pub fn record(&mut self, result: RestoreResult, min_words: usize) {
        match result.status {
            RestoreStatus::Restored => {
                self.summary.restored += 1;
                let words = result.words.unwrap_or(0);
                if words < min_words {
                    self.summary.under_min += 1;
                    self.under_min.push(UnderMin {
                        slug: result.slug.clone(),
                        words,
                    });
                }
            }
            RestoreStatus::NoBackup => self.summary.no_backup += 1,
            RestoreStatus::Error => {
                self.summary.errors += 1;
                self.errors.push(RecordError {
                    slug: result.slug.clone(),
                    error: result.error.clone().unwrap_or_default(),
                });
            }
        }
        self.results.push(result);
    }
}
