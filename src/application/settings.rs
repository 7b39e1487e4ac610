//! Typed persisted settings.
//!
//! Every setting has one schema struct here and is (de)serialized nowhere
//! else. Reads never fail on bad data: a missing or corrupt value loads as the
//! schema default.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use thiserror::Error;
use tracing::{debug, warn};

use crate::application::repos::{RepoError, SettingsRepo};
use crate::domain::entities::ItemOverrides;
use crate::domain::languages::LanguageMarker;
use crate::domain::redirects::RedirectRule;
use crate::domain::types::{
    ChangeFreqSetting, PrioritySetting, SitemapKind,
};

const SOURCE: &str = "application::settings";

pub const LANGUAGES_KEY: &str = "languages";
pub const SITEMAP_KEY: &str = "sitemap";
pub const REDIRECTS_KEY: &str = "redirects";

#[derive(Debug, Error)]
pub enum SettingsStoreError {
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error("failed to encode setting `{key}`: {source}")]
    Encode {
        key: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LanguageList {
    pub languages: Vec<LanguageMarker>,
}

/// Per-kind global defaults applied when an item has no override.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KindDefaults {
    pub priority: Option<String>,
    pub changefreq: Option<String>,
}

impl KindDefaults {
    pub fn priority(&self) -> PrioritySetting {
        PrioritySetting::parse_lenient(self.priority.as_deref())
    }

    pub fn changefreq(&self) -> ChangeFreqSetting {
        ChangeFreqSetting::parse_lenient(self.changefreq.as_deref())
    }

    /// Rewrites both fields into their canonical persisted form.
    pub fn normalized(&self) -> Self {
        Self {
            priority: self.priority().to_persisted(),
            changefreq: self.changefreq().to_persisted(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.priority.is_none() && self.changefreq.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SitemapSettings {
    pub enabled: bool,
    /// Enabled kinds in index order.
    pub enabled_kinds: Vec<SitemapKind>,
    pub excluded_ids: BTreeMap<SitemapKind, Vec<i64>>,
    pub custom_order: BTreeMap<SitemapKind, Vec<i64>>,
    pub kind_defaults: BTreeMap<SitemapKind, KindDefaults>,
    pub front_page_id: Option<i64>,
    pub uncategorized_id: Option<i64>,
    pub include_images: bool,
    pub include_hreflang: bool,
}

impl Default for SitemapSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            enabled_kinds: SitemapKind::defaults(),
            excluded_ids: BTreeMap::new(),
            custom_order: BTreeMap::new(),
            kind_defaults: BTreeMap::new(),
            front_page_id: None,
            uncategorized_id: None,
            include_images: true,
            include_hreflang: true,
        }
    }
}

impl SitemapSettings {
    pub fn is_kind_enabled(&self, kind: &SitemapKind) -> bool {
        self.enabled_kinds.contains(kind)
    }

    pub fn excluded_for(&self, kind: &SitemapKind) -> &[i64] {
        self.excluded_ids.get(kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn order_for(&self, kind: &SitemapKind) -> &[i64] {
        self.custom_order.get(kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn defaults_for(&self, kind: &SitemapKind) -> KindDefaults {
        self.kind_defaults.get(kind).cloned().unwrap_or_default()
    }
}

/// Stored as a bare JSON array of `{from, to, type, hits}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RedirectList {
    pub rules: Vec<RedirectRule>,
}

/// Typed facade over [`SettingsRepo`].
#[derive(Clone)]
pub struct SettingsStore {
    repo: Arc<dyn SettingsRepo>,
}

impl SettingsStore {
    pub fn new(repo: Arc<dyn SettingsRepo>) -> Self {
        Self { repo }
    }

    pub async fn languages(&self) -> Result<LanguageList, SettingsStoreError> {
        self.load(LANGUAGES_KEY).await
    }

    pub async fn save_languages(&self, value: &LanguageList) -> Result<(), SettingsStoreError> {
        self.store(LANGUAGES_KEY, value).await
    }

    pub async fn sitemap(&self) -> Result<SitemapSettings, SettingsStoreError> {
        self.load(SITEMAP_KEY).await
    }

    pub async fn save_sitemap(&self, value: &SitemapSettings) -> Result<(), SettingsStoreError> {
        self.store(SITEMAP_KEY, value).await
    }

    pub async fn redirects(&self) -> Result<RedirectList, SettingsStoreError> {
        self.load(REDIRECTS_KEY).await
    }

    pub async fn save_redirects(&self, value: &RedirectList) -> Result<(), SettingsStoreError> {
        self.store(REDIRECTS_KEY, value).await
    }

    async fn load<T>(&self, key: &'static str) -> Result<T, SettingsStoreError>
    where
        T: DeserializeOwned + Default,
    {
        let Some(raw) = self.repo.load_setting(key).await? else {
            debug!(target = SOURCE, key, "Setting missing, using defaults");
            return Ok(T::default());
        };

        match serde_json::from_value(raw) {
            Ok(value) => Ok(value),
            Err(err) => {
                warn!(
                    target = SOURCE,
                    key,
                    error = %err,
                    "Persisted setting is corrupt, using defaults"
                );
                Ok(T::default())
            }
        }
    }

    async fn store<T: Serialize>(&self, key: &'static str, value: &T) -> Result<(), SettingsStoreError> {
        let encoded =
            serde_json::to_value(value).map_err(|source| SettingsStoreError::Encode { key, source })?;
        self.repo.store_setting(key, encoded).await?;
        debug!(target = SOURCE, key, "Setting stored");
        Ok(())
    }
}

/// Applies a partial override edit on top of the stored overrides.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OverridePatch {
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub changefreq: Option<String>,
    #[serde(default)]
    pub excluded: Option<bool>,
}

impl OverridePatch {
    /// `"auto"` or an unparsable value clears the field.
    pub fn apply(&self, overrides: &mut ItemOverrides) {
        if let Some(priority) = self.priority.as_deref() {
            overrides.priority = PrioritySetting::parse_lenient(Some(priority)).to_persisted();
        }
        if let Some(changefreq) = self.changefreq.as_deref() {
            overrides.changefreq = ChangeFreqSetting::parse_lenient(Some(changefreq)).to_persisted();
        }
        if let Some(excluded) = self.excluded {
            overrides.excluded = excluded;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::memory::MemorySettingsRepo;
    use serde_json::json;

    #[tokio::test]
    async fn corrupt_settings_load_as_defaults() {
        let repo = Arc::new(MemorySettingsRepo::default());
        repo.store_setting(SITEMAP_KEY, json!({"enabled": "yes please"}))
            .await
            .expect("store");
        let store = SettingsStore::new(repo);

        let settings = store.sitemap().await.expect("load");
        assert_eq!(settings, SitemapSettings::default());
    }

    #[tokio::test]
    async fn sitemap_settings_round_trip_through_store() {
        let store = SettingsStore::new(Arc::new(MemorySettingsRepo::default()));
        let mut settings = SitemapSettings::default();
        settings.excluded_ids.insert(SitemapKind::post(), vec![4, 5]);
        settings.custom_order.insert(SitemapKind::Category, vec![9, 2]);
        settings.front_page_id = Some(1);

        store.save_sitemap(&settings).await.expect("save");
        assert_eq!(store.sitemap().await.expect("load"), settings);
    }

    #[tokio::test]
    async fn redirects_are_stored_as_a_bare_array() {
        let repo = Arc::new(MemorySettingsRepo::default());
        let store = SettingsStore::new(repo.clone());
        let list = RedirectList {
            rules: vec![RedirectRule::permanent("/a", "/b")],
        };
        store.save_redirects(&list).await.expect("save");

        let raw = repo
            .load_setting(REDIRECTS_KEY)
            .await
            .expect("load")
            .expect("present");
        assert_eq!(raw, json!([{"from": "/a", "to": "/b", "type": 301, "hits": 0}]));
    }

    #[test]
    fn override_patch_normalizes_values() {
        let mut overrides = ItemOverrides {
            priority: Some("0.4".into()),
            ..Default::default()
        };
        OverridePatch {
            priority: Some("auto".into()),
            changefreq: Some("WEEKLY".into()),
            excluded: Some(true),
        }
        .apply(&mut overrides);

        assert_eq!(overrides.priority, None);
        assert_eq!(overrides.changefreq.as_deref(), Some("weekly"));
        assert!(overrides.excluded);
    }

    #[test]
    fn kind_defaults_clamp_on_normalize() {
        let defaults = KindDefaults {
            priority: Some("3".into()),
            changefreq: Some("sometimes".into()),
        }
        .normalized();
        assert_eq!(defaults.priority.as_deref(), Some("1.0"));
        assert_eq!(defaults.changefreq, None);
    }
}
