//! Cache invalidation trigger.
//!
//! Maps mutation events to the set of sitemap keys they affect, clears them,
//! and forwards the scope to registered hooks (e.g. an `llms.txt` generator).

use std::sync::{Arc, RwLock};

use tracing::{debug, info, warn};

use crate::application::language::LanguageResolver;
use crate::domain::languages::LanguageMarker;
use crate::domain::types::{ContentType, SitemapKind};

use super::keys::SitemapCacheKey;
use super::lock::{rw_read, rw_write};
use super::store::{SitemapCache, kind_keys};

const SOURCE: &str = "cache::trigger";

/// Something that changed and may have made cached sitemaps stale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEvent {
    /// Content was saved, deleted, or changed publication status.
    Content { content_type: ContentType },
    /// A term or author changed.
    Listing { kind: SitemapKind },
    /// Settings scoped to one kind (overrides, order, exclusions, defaults).
    KindSettings { kind: SitemapKind },
    /// Settings affecting every document (feature toggle, enabled kinds,
    /// languages).
    GlobalSettings,
    /// Explicit admin request.
    Regenerate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidationScope {
    Keys(Vec<SitemapCacheKey>),
    All,
}

/// Receives every invalidation after the sitemap cache has been cleared.
pub trait InvalidationHook: Send + Sync {
    fn name(&self) -> &'static str;

    fn invalidated(&self, scope: &InvalidationScope);
}

pub struct CacheTrigger {
    cache: Arc<SitemapCache>,
    languages: LanguageResolver,
    hooks: RwLock<Vec<Arc<dyn InvalidationHook>>>,
}

impl CacheTrigger {
    pub fn new(cache: Arc<SitemapCache>, languages: LanguageResolver) -> Self {
        Self {
            cache,
            languages,
            hooks: RwLock::new(Vec::new()),
        }
    }

    pub fn cache(&self) -> &Arc<SitemapCache> {
        &self.cache
    }

    pub fn register_hook(&self, hook: Arc<dyn InvalidationHook>) {
        debug!(target = SOURCE, hook = hook.name(), "invalidation hook registered");
        rw_write(&self.hooks, SOURCE, "register_hook").push(hook);
    }

    /// Clears everything `event` affects and returns the number of entries
    /// removed.
    pub async fn trigger(&self, event: CacheEvent) -> usize {
        let languages = match self.languages.list_enabled().await {
            Ok(languages) => languages,
            Err(err) => {
                warn!(
                    target = SOURCE,
                    error = %err,
                    event = ?event,
                    "language lookup failed, clearing whole sitemap cache"
                );
                return self.apply(InvalidationScope::All);
            }
        };
        self.apply(plan(&event, &languages))
    }

    pub fn apply(&self, scope: InvalidationScope) -> usize {
        let removed = match &scope {
            InvalidationScope::All => self.cache.invalidate_all(),
            InvalidationScope::Keys(keys) => self.cache.invalidate_keys(keys),
        };
        metrics::counter!("waymark_cache_invalidated_keys_total").increment(removed as u64);

        match &scope {
            InvalidationScope::All => {
                info!(target = SOURCE, removed, "sitemap cache cleared");
            }
            InvalidationScope::Keys(keys) => {
                debug!(
                    target = SOURCE,
                    removed,
                    keys = keys.len(),
                    "sitemap cache keys invalidated"
                );
            }
        }

        let hooks = rw_read(&self.hooks, SOURCE, "apply.hooks").clone();
        for hook in hooks {
            hook.invalidated(&scope);
        }
        removed
    }
}

/// Kinds whose per-language listings are computed from post membership.
const POST_DERIVED: [SitemapKind; 3] =
    [SitemapKind::Category, SitemapKind::Tag, SitemapKind::Author];

/// Keys affected by `event` given the currently enabled languages.
///
/// A saved item may have moved between languages, so content events clear
/// every language variant of the affected kinds. Category and tag edits can
/// change which posts belong to a language, so they reach the post listings
/// too.
pub fn plan(event: &CacheEvent, languages: &[LanguageMarker]) -> InvalidationScope {
    match event {
        CacheEvent::Content { content_type } => {
            let mut keys = kind_keys(&SitemapKind::Content(content_type.clone()), languages);
            if content_type.is_post() {
                for derived in &POST_DERIVED {
                    keys.extend(kind_keys(derived, languages));
                }
            }
            push_lang_indexes(&mut keys, languages);
            InvalidationScope::Keys(dedup(keys))
        }
        CacheEvent::Listing {
            kind: SitemapKind::Category | SitemapKind::Tag,
        } => {
            let mut keys = kind_keys(&SitemapKind::post(), languages);
            for derived in &POST_DERIVED {
                keys.extend(kind_keys(derived, languages));
            }
            push_lang_indexes(&mut keys, languages);
            InvalidationScope::Keys(dedup(keys))
        }
        CacheEvent::Listing { kind } | CacheEvent::KindSettings { kind } => {
            let mut keys = kind_keys(kind, languages);
            push_lang_indexes(&mut keys, languages);
            InvalidationScope::Keys(dedup(keys))
        }
        CacheEvent::GlobalSettings | CacheEvent::Regenerate => InvalidationScope::All,
    }
}

fn push_lang_indexes(keys: &mut Vec<SitemapCacheKey>, languages: &[LanguageMarker]) {
    keys.extend(
        languages
            .iter()
            .map(|language| SitemapCacheKey::lang_index(&language.iso2)),
    );
}

fn dedup(mut keys: Vec<SitemapCacheKey>) -> Vec<SitemapCacheKey> {
    keys.sort();
    keys.dedup();
    keys
}

#[cfg(test)]
mod tests {
    use super::*;

    fn languages() -> Vec<LanguageMarker> {
        vec![
            LanguageMarker::new("en", "English").as_default(),
            LanguageMarker::new("fr", "Français"),
        ]
    }

    fn keys(scope: InvalidationScope) -> Vec<String> {
        match scope {
            InvalidationScope::Keys(keys) => keys.iter().map(ToString::to_string).collect(),
            InvalidationScope::All => panic!("expected explicit keys"),
        }
    }

    #[test]
    fn post_save_clears_every_language_and_derived_kinds() {
        let keys = keys(plan(
            &CacheEvent::Content {
                content_type: ContentType::post(),
            },
            &languages(),
        ));

        for expected in [
            "index",
            "page:post",
            "page:post:fr",
            "page:post:en",
            "lang_index:fr",
            "lang_index:en",
            "page:category:fr",
            "page:tag",
            "page:tag:en",
            "page:author:en",
            "page:author:fr",
        ] {
            assert!(keys.contains(&expected.to_string()), "missing {expected}");
        }
        assert!(!keys.iter().any(|key| key.starts_with("page:page")));
    }

    #[test]
    fn term_edits_reach_post_listings() {
        for kind in [SitemapKind::Category, SitemapKind::Tag] {
            let keys = keys(plan(&CacheEvent::Listing { kind }, &languages()));
            for expected in [
                "page:post",
                "page:post:fr",
                "page:post:en",
                "page:category:fr",
                "page:tag:fr",
                "page:author:fr",
                "lang_index:fr",
                "index",
            ] {
                assert!(keys.contains(&expected.to_string()), "missing {expected}");
            }
        }

        let keys = keys(plan(
            &CacheEvent::Listing {
                kind: SitemapKind::Author,
            },
            &languages(),
        ));
        assert!(keys.contains(&"page:author:fr".to_string()));
        assert!(!keys.iter().any(|key| key.starts_with("page:post")));
    }

    #[test]
    fn page_save_leaves_taxonomy_listings_alone() {
        let keys = keys(plan(
            &CacheEvent::Content {
                content_type: ContentType::page(),
            },
            &languages(),
        ));
        assert!(keys.contains(&"lang_index:en".to_string()));
        assert!(keys.contains(&"lang_index:fr".to_string()));
        assert!(!keys.iter().any(|key| key.starts_with("page:category")));
    }

    #[test]
    fn regenerate_clears_everything() {
        assert_eq!(plan(&CacheEvent::Regenerate, &languages()), InvalidationScope::All);
        assert_eq!(
            plan(&CacheEvent::GlobalSettings, &languages()),
            InvalidationScope::All
        );
    }

    struct Recorder(RwLock<Vec<InvalidationScope>>);

    impl InvalidationHook for Recorder {
        fn name(&self) -> &'static str {
            "recorder"
        }

        fn invalidated(&self, scope: &InvalidationScope) {
            rw_write(&self.0, "test", "record").push(scope.clone());
        }
    }

    #[tokio::test]
    async fn hooks_receive_every_scope() {
        use crate::application::settings::SettingsStore;
        use crate::cache::CacheConfig;
        use crate::infra::memory::MemoryRepositories;

        let repos = MemoryRepositories::default();
        let resolver = LanguageResolver::new(
            SettingsStore::new(repos.settings.clone()),
            repos.taxonomy.clone(),
            LanguageMarker::new("en", "English").as_default(),
        );
        let cache = Arc::new(SitemapCache::new(&CacheConfig::default()));
        cache.put(SitemapCacheKey::Index, Arc::from("<sitemapindex/>"));
        let trigger = CacheTrigger::new(cache, resolver);
        let recorder = Arc::new(Recorder(RwLock::new(Vec::new())));
        trigger.register_hook(recorder.clone());

        let removed = trigger
            .trigger(CacheEvent::KindSettings {
                kind: SitemapKind::Tag,
            })
            .await;
        assert_eq!(removed, 1);
        assert_eq!(trigger.trigger(CacheEvent::Regenerate).await, 0);

        let seen = rw_read(&recorder.0, "test", "read");
        assert_eq!(seen.len(), 2);
        assert!(matches!(seen[0], InvalidationScope::Keys(_)));
        assert_eq!(seen[1], InvalidationScope::All);
    }
}
