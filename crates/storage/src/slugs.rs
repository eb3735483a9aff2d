use std::collections::HashSet;

use anyhow::{Context, Result};
use chrono::Utc;
use muv_content_core::{is_normalized, slugify, unique_slug};
use serde::Serialize;
use tracing::{info, warn};

use crate::repository::ContentRepository;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SlugChange {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SlugReport {
    pub checked: usize,
    pub updated: Vec<SlugChange>,
}

impl ContentRepository {
    /// Rewrites every slug that is not already in normalized form. The new
    /// slug comes from the old one, or from the title when the old slug has
    /// nothing usable; collisions get a numeric suffix.
    pub async fn normalize_slugs(&self) -> Result<SlugReport> {
        let posts = self.store.list_posts().await.context("list posts")?;
        let mut taken: HashSet<String> = posts.iter().map(|post| post.slug.clone()).collect();
        let mut report = SlugReport {
            checked: posts.len(),
            ..SlugReport::default()
        };

        for post in posts {
            if is_normalized(&post.slug) {
                continue;
            }
            let mut base = slugify(&post.slug);
            if base.is_empty() {
                base = slugify(&post.title);
            }
            if base.is_empty() {
                warn!(post_id = %post.id, slug = %post.slug, "no usable slug source, leaving as is");
                continue;
            }

            taken.remove(&post.slug);
            let slug = unique_slug(&base, &taken);
            self.store
                .update_slug(post.id, &slug, Utc::now())
                .await
                .with_context(|| format!("rename {} to {slug}", post.slug))?;
            info!(from = %post.slug, to = %slug, "slug normalized");
            taken.insert(slug.clone());
            report.updated.push(SlugChange {
                from: post.slug,
                to: slug,
            });
        }

        Ok(report)
    }
}
