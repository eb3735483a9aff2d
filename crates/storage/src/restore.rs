//! The restore pass: snapshot every candidate post, then for each one pick the
//! most complete backup, repair and deduplicate it, and write it back.
//!
//! Posts are processed one at a time. A failure inside one post becomes an
//! `error` entry and the loop moves on; only the candidate fetch and the
//! snapshot batch can abort the whole pass. Nothing is rolled back.

use anyhow::{Context, Result};
use chrono::Utc;
use muv_content_core::{
    collapse_inter_tag_whitespace, dedupe, select_best, word_count, ContentRecord, ContentStatus,
    RestoreOptions, RestoreReport, RestoreResult,
};
use muv_content_repair::HtmlRepair;
use tracing::{error, info, warn};

use crate::repository::ContentRepository;

impl ContentRepository {
    pub async fn restore(
        &self,
        options: &RestoreOptions,
        repairer: Option<&dyn HtmlRepair>,
    ) -> Result<RestoreReport> {
        let candidates: Vec<ContentRecord> = self
            .store
            .list_posts_with_status(ContentStatus::Published)
            .await
            .context("fetch candidate posts")?
            .into_iter()
            .filter(|post| !options.is_excluded(&post.slug))
            .collect();

        let snapshotted = self.snapshot(&candidates).await?;
        info!(candidates = candidates.len(), snapshotted, "restore pass started");

        let mut report = RestoreReport::new(candidates.len());
        for post in &candidates {
            let result = match self.restore_post(post, options, repairer).await {
                Ok(result) => result,
                Err(e) => {
                    error!(slug = %post.slug, error = %e, "restore failed");
                    RestoreResult::failed(&post.slug, format!("{e:#}"))
                }
            };
            report.record(result, options.min_words);
        }

        info!(
            total = report.summary.total,
            restored = report.summary.restored,
            no_backup = report.summary.no_backup,
            under_min = report.summary.under_min,
            errors = report.summary.errors,
            "restore pass finished"
        );
        Ok(report)
    }

    async fn restore_post(
        &self,
        post: &ContentRecord,
        options: &RestoreOptions,
        repairer: Option<&dyn HtmlRepair>,
    ) -> Result<RestoreResult> {
        let backups = self
            .store
            .list_backups(post.id)
            .await
            .context("list backups")?;
        let Some(best) = select_best(&backups) else {
            info!(slug = %post.slug, "no backup found");
            return Ok(RestoreResult::no_backup(&post.slug));
        };

        let repaired = repair_html(repairer, &post.slug, &best.backup.content).await;
        let cleaned = dedupe(&repaired, &options.cta_class);
        let words = word_count(&cleaned);

        self.store
            .update_content(post.id, &cleaned, Utc::now())
            .await
            .context("write restored content")?;

        if words < options.min_words {
            warn!(slug = %post.slug, words, min_words = options.min_words, "restored post is under the word minimum");
        } else {
            info!(slug = %post.slug, words, backup_id = %best.backup.id, "post restored");
        }
        Ok(RestoreResult::restored(&post.slug, words))
    }
}

/// Remote repair when available; any failure downgrades to the local
/// whitespace cleanup. No retries.
async fn repair_html(repairer: Option<&dyn HtmlRepair>, slug: &str, html: &str) -> String {
    let Some(repairer) = repairer else {
        return collapse_inter_tag_whitespace(html);
    };
    match repairer.repair(html).await {
        Ok(repaired) => repaired,
        Err(e) => {
            warn!(slug, error = %e, "remote html repair failed, using local cleanup");
            collapse_inter_tag_whitespace(html)
        }
    }
}
