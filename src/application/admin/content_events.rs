//! Lifecycle notifications from the content store.
//!
//! The content store owns CRUD; it reports what changed so cached sitemaps
//! can be cleared and renamed URLs keep resolving.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::application::redirects::{RedirectError, RedirectMatcher};
use crate::cache::{CacheEvent, CacheTrigger};
use crate::domain::types::{ContentStatus, ContentType, SitemapKind, Taxonomy};

const SOURCE: &str = "application::admin::content_events";

#[derive(Debug, Error)]
pub enum ContentEventError {
    #[error(transparent)]
    Redirect(#[from] RedirectError),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ContentEvent {
    Saved {
        content_type: ContentType,
        #[serde(default)]
        language: Option<String>,
    },
    Deleted {
        content_type: ContentType,
        #[serde(default)]
        language: Option<String>,
    },
    StatusChanged {
        content_type: ContentType,
        #[serde(default)]
        language: Option<String>,
        from: ContentStatus,
        to: ContentStatus,
    },
    Renamed {
        content_type: ContentType,
        #[serde(default)]
        language: Option<String>,
        status: ContentStatus,
        old_path: String,
        new_path: String,
    },
    TermChanged {
        taxonomy: Taxonomy,
    },
    AuthorChanged,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ContentEventOutcome {
    pub invalidated: usize,
    pub redirect_created: bool,
}

#[derive(Clone)]
pub struct ContentEventService {
    trigger: Arc<CacheTrigger>,
    redirects: Arc<RedirectMatcher>,
}

impl ContentEventService {
    pub fn new(trigger: Arc<CacheTrigger>, redirects: Arc<RedirectMatcher>) -> Self {
        Self { trigger, redirects }
    }

    pub async fn handle(&self, event: ContentEvent) -> Result<ContentEventOutcome, ContentEventError> {
        let mut outcome = ContentEventOutcome::default();

        let cache_event = match event {
            ContentEvent::Saved {
                content_type,
                language,
            }
            | ContentEvent::Deleted {
                content_type,
                language,
            } => {
                info!(
                    target = SOURCE,
                    content_type = %content_type,
                    language = ?language,
                    "content changed"
                );
                Some(CacheEvent::Content { content_type })
            }
            ContentEvent::StatusChanged {
                content_type,
                language,
                from,
                to,
            } => {
                info!(
                    target = SOURCE,
                    content_type = %content_type,
                    language = ?language,
                    from = from.as_str(),
                    to = to.as_str(),
                    "content status changed"
                );
                (from != to && (from.is_published() || to.is_published()))
                    .then_some(CacheEvent::Content { content_type })
            }
            ContentEvent::Renamed {
                content_type,
                language,
                status,
                old_path,
                new_path,
            } => {
                if status.is_published() && (content_type.is_post() || content_type.is_page()) {
                    outcome.redirect_created =
                        self.redirects.record_rename(&old_path, &new_path).await?;
                } else {
                    warn!(
                        target = SOURCE,
                        content_type = %content_type,
                        language = ?language,
                        status = status.as_str(),
                        "rename ignored for redirects, item is not a published page or post"
                    );
                }
                status.is_published().then_some(CacheEvent::Content { content_type })
            }
            ContentEvent::TermChanged { taxonomy } => Some(CacheEvent::Listing {
                kind: match taxonomy {
                    Taxonomy::Category => SitemapKind::Category,
                    Taxonomy::Tag => SitemapKind::Tag,
                },
            }),
            ContentEvent::AuthorChanged => Some(CacheEvent::Listing {
                kind: SitemapKind::Author,
            }),
        };

        if let Some(cache_event) = cache_event {
            debug!(target = SOURCE, event = ?cache_event, "invalidating for content change");
            outcome.invalidated = self.trigger.trigger(cache_event).await;
        }
        Ok(outcome)
    }
}
