use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::application::settings::{LanguageList, SettingsStore, SettingsStoreError};
use crate::cache::{CacheEvent, CacheTrigger};
use crate::domain::error::DomainError;
use crate::domain::languages::{LanguageMarker, normalize_languages};

const SOURCE: &str = "application::admin::languages";

#[derive(Debug, Error)]
pub enum AdminLanguageError {
    #[error(transparent)]
    Invalid(#[from] DomainError),
    #[error(transparent)]
    Settings(#[from] SettingsStoreError),
}

#[derive(Clone)]
pub struct AdminLanguageService {
    settings: SettingsStore,
    trigger: Arc<CacheTrigger>,
}

impl AdminLanguageService {
    pub fn new(settings: SettingsStore, trigger: Arc<CacheTrigger>) -> Self {
        Self { settings, trigger }
    }

    /// The stored registry, disabled languages included.
    pub async fn list(&self) -> Result<Vec<LanguageMarker>, AdminLanguageError> {
        Ok(self.settings.languages().await?.languages)
    }

    /// Validates and replaces the whole registry. Every cached document may
    /// change shape, so the cache is cleared.
    pub async fn replace(
        &self,
        languages: Vec<LanguageMarker>,
    ) -> Result<Vec<LanguageMarker>, AdminLanguageError> {
        let languages = normalize_languages(languages)?;
        self.settings
            .save_languages(&LanguageList {
                languages: languages.clone(),
            })
            .await?;

        info!(
            target = SOURCE,
            count = languages.len(),
            enabled = languages.iter().filter(|language| language.enabled).count(),
            "language registry saved"
        );
        self.trigger.trigger(CacheEvent::GlobalSettings).await;
        Ok(languages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::language::LanguageResolver;
    use crate::cache::{CacheConfig, SitemapCache, SitemapCacheKey};
    use crate::infra::memory::{MemorySettingsRepo, MemoryTaxonomyRepo};

    fn service() -> (AdminLanguageService, Arc<SitemapCache>) {
        let settings = SettingsStore::new(Arc::new(MemorySettingsRepo::default()));
        let resolver = LanguageResolver::new(
            settings.clone(),
            Arc::new(MemoryTaxonomyRepo::new(Vec::new())),
            LanguageMarker::new("en", "English").as_default(),
        );
        let cache = Arc::new(SitemapCache::new(&CacheConfig::default()));
        let trigger = Arc::new(CacheTrigger::new(cache.clone(), resolver));
        (AdminLanguageService::new(settings, trigger), cache)
    }

    #[tokio::test]
    async fn replace_normalizes_and_clears_cache() {
        let (service, cache) = service();
        cache.put(SitemapCacheKey::Index, Arc::from("<sitemapindex/>"));

        let saved = service
            .replace(vec![
                LanguageMarker::new("EN", "English").as_default(),
                LanguageMarker {
                    slug: String::new(),
                    ..LanguageMarker::new("fr", "Français")
                },
            ])
            .await
            .expect("replace");

        assert_eq!(saved[0].iso2, "en");
        assert_eq!(saved[1].slug, "francais");
        assert!(cache.is_empty());
        assert_eq!(service.list().await.expect("list"), saved);
    }

    #[tokio::test]
    async fn invalid_registry_is_rejected_and_not_stored() {
        let (service, _) = service();
        let err = service
            .replace(vec![
                LanguageMarker::new("en", "English"),
                LanguageMarker::new("fr", "Français"),
            ])
            .await
            .expect_err("no default");
        assert!(matches!(err, AdminLanguageError::Invalid(_)));
        assert!(service.list().await.expect("list").is_empty());
    }
}
