use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use time::OffsetDateTime;
use tracing::info;

use crate::application::catalog::{CatalogError, CatalogItem, ContentCatalog, MAX_ITEMS, MAX_SITEMAP_URLS};
use crate::application::language::LanguageError;
use crate::application::repos::{AuthorsRepo, ContentRepo, RepoError, TaxonomyRepo};
use crate::application::settings::{KindDefaults, OverridePatch, SettingsStore, SettingsStoreError, SitemapSettings};
use crate::application::sitemap::{INDEX_PATH, language_index_path, page_path};
use crate::cache::{CacheEvent, CacheTrigger};
use crate::domain::cascade::Tier;
use crate::domain::entities::ItemOverrides;
use crate::domain::error::DomainError;
use crate::domain::types::{ChangeFreq, Priority, SitemapKind, Taxonomy};

const SOURCE: &str = "application::admin::sitemap";

#[derive(Debug, Error)]
pub enum AdminSitemapError {
    #[error("unknown sitemap kind `{0}`")]
    UnknownKind(String),
    #[error("{0}")]
    ConstraintViolation(String),
    #[error("{kind} item {id} not found")]
    ItemNotFound { kind: SitemapKind, id: i64 },
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Language(#[from] LanguageError),
    #[error(transparent)]
    Settings(#[from] SettingsStoreError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

impl From<DomainError> for AdminSitemapError {
    fn from(err: DomainError) -> Self {
        Self::ConstraintViolation(err.to_string())
    }
}

/// Partial update of the sitemap settings. Absent fields are left alone;
/// `front_page_id: null` clears the front page.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SitemapSettingsPatch {
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub enabled_kinds: Option<Vec<String>>,
    #[serde(default)]
    pub kind_defaults: Option<BTreeMap<String, KindDefaults>>,
    #[serde(default, deserialize_with = "nullable")]
    pub front_page_id: Option<Option<i64>>,
    #[serde(default, deserialize_with = "nullable")]
    pub uncategorized_id: Option<Option<i64>>,
    #[serde(default)]
    pub include_images: Option<bool>,
    #[serde(default)]
    pub include_hreflang: Option<bool>,
}

fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, Deserialize)]
pub struct OverrideUpdate {
    pub id: i64,
    #[serde(flatten)]
    pub patch: OverridePatch,
}

#[derive(Debug, Clone, Serialize)]
pub struct SitemapTree {
    pub enabled: bool,
    pub index_url: String,
    pub languages: Vec<TreeLanguage>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TreeLanguage {
    /// `None` on single-language sites, where documents are unscoped.
    pub iso2: Option<String>,
    pub native_name: String,
    pub sitemap_url: Option<String>,
    pub kinds: Vec<TreeKind>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TreeKind {
    pub kind: SitemapKind,
    pub count: usize,
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PreviewItem {
    #[serde(flatten)]
    pub item: CatalogItem,
    pub effective_priority: Priority,
    pub priority_source: Tier,
    pub effective_changefreq: ChangeFreq,
    pub changefreq_source: Tier,
}

#[derive(Debug, Clone, Serialize)]
pub struct SitemapStatus {
    pub enabled: bool,
    pub index_url: String,
    pub languages: Vec<String>,
    pub cached_entries: usize,
}

#[derive(Clone)]
pub struct AdminSitemapService {
    catalog: ContentCatalog,
    settings: SettingsStore,
    content: Arc<dyn ContentRepo>,
    taxonomy: Arc<dyn TaxonomyRepo>,
    authors: Arc<dyn AuthorsRepo>,
    trigger: Arc<CacheTrigger>,
}

impl AdminSitemapService {
    pub fn new(
        catalog: ContentCatalog,
        settings: SettingsStore,
        content: Arc<dyn ContentRepo>,
        taxonomy: Arc<dyn TaxonomyRepo>,
        authors: Arc<dyn AuthorsRepo>,
        trigger: Arc<CacheTrigger>,
    ) -> Self {
        Self {
            catalog,
            settings,
            content,
            taxonomy,
            authors,
            trigger,
        }
    }

    pub async fn settings(&self) -> Result<SitemapSettings, AdminSitemapError> {
        self.settings.sitemap().await.map_err(AdminSitemapError::from)
    }

    pub async fn update_settings(
        &self,
        patch: SitemapSettingsPatch,
    ) -> Result<SitemapSettings, AdminSitemapError> {
        let mut settings = self.settings.sitemap().await?;
        let mut global = false;
        let mut touched_kinds = Vec::new();

        if let Some(enabled) = patch.enabled {
            global |= settings.enabled != enabled;
            settings.enabled = enabled;
        }
        if let Some(raw) = patch.enabled_kinds {
            let mut kinds: Vec<SitemapKind> = Vec::with_capacity(raw.len());
            for name in &raw {
                let kind = parse_kind(name)?;
                if !kinds.contains(&kind) {
                    kinds.push(kind);
                }
            }
            global |= settings.enabled_kinds != kinds;
            settings.enabled_kinds = kinds;
        }
        if let Some(defaults) = patch.kind_defaults {
            for (name, value) in defaults {
                let kind = parse_kind(&name)?;
                let value = value.normalized();
                if settings.defaults_for(&kind) == value {
                    continue;
                }
                if value.is_empty() {
                    settings.kind_defaults.remove(&kind);
                } else {
                    settings.kind_defaults.insert(kind.clone(), value);
                }
                touched_kinds.push(kind);
            }
        }
        if let Some(front_page_id) = patch.front_page_id {
            global |= settings.front_page_id != front_page_id;
            settings.front_page_id = front_page_id;
        }
        if let Some(uncategorized_id) = patch.uncategorized_id {
            global |= settings.uncategorized_id != uncategorized_id;
            settings.uncategorized_id = uncategorized_id;
        }
        if let Some(include_images) = patch.include_images {
            global |= settings.include_images != include_images;
            settings.include_images = include_images;
        }
        if let Some(include_hreflang) = patch.include_hreflang {
            global |= settings.include_hreflang != include_hreflang;
            settings.include_hreflang = include_hreflang;
        }

        self.settings.save_sitemap(&settings).await?;
        info!(
            target = SOURCE,
            global,
            kinds = touched_kinds.len(),
            "sitemap settings updated"
        );

        if global {
            self.trigger.trigger(CacheEvent::GlobalSettings).await;
        } else {
            for kind in touched_kinds {
                self.trigger.trigger(CacheEvent::KindSettings { kind }).await;
            }
        }
        Ok(settings)
    }

    /// Counts per language and enabled kind, produced by the same listing
    /// the public sitemaps use.
    pub async fn tree(&self) -> Result<SitemapTree, AdminSitemapError> {
        let settings = self.settings.sitemap().await?;
        let languages = self.catalog.languages().list_enabled().await?;
        let urls = self.catalog.urls();

        let scopes: Vec<(Option<String>, String, Option<String>)> = if languages.len() > 1 {
            languages
                .iter()
                .map(|language| {
                    (
                        Some(language.iso2.clone()),
                        language.native_name.clone(),
                        Some(urls.public(&language_index_path(language))),
                    )
                })
                .collect()
        } else {
            let name = languages
                .first()
                .map(|language| language.native_name.clone())
                .unwrap_or_default();
            vec![(None, name, None)]
        };

        let mut nodes = Vec::with_capacity(scopes.len());
        for (iso2, native_name, sitemap_url) in scopes {
            let mut kinds = Vec::with_capacity(settings.enabled_kinds.len());
            for kind in &settings.enabled_kinds {
                let count = self
                    .catalog
                    .list_with(&settings, kind, iso2.as_deref(), MAX_SITEMAP_URLS)
                    .await?
                    .len();
                kinds.push(TreeKind {
                    kind: kind.clone(),
                    count,
                    url: urls.public(&page_path(kind, iso2.as_deref())),
                });
            }
            nodes.push(TreeLanguage {
                iso2,
                native_name,
                sitemap_url,
                kinds,
            });
        }

        Ok(SitemapTree {
            enabled: settings.enabled,
            index_url: urls.public(INDEX_PATH),
            languages: nodes,
        })
    }

    pub async fn preview(
        &self,
        kind: &str,
        iso2: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Vec<PreviewItem>, AdminSitemapError> {
        let kind = parse_kind(kind)?;
        let settings = self.settings.sitemap().await?;
        let limit = limit.unwrap_or(MAX_ITEMS).clamp(1, MAX_ITEMS);
        let now = OffsetDateTime::now_utc();

        let items = self.catalog.list_with(&settings, &kind, iso2, limit).await?;
        Ok(items
            .into_iter()
            .map(|item| {
                let priority = self.catalog.priority(&item, &settings);
                let changefreq = self.catalog.changefreq(&item, &settings, now);
                PreviewItem {
                    item,
                    effective_priority: priority.value,
                    priority_source: priority.tier,
                    effective_changefreq: changefreq.value,
                    changefreq_source: changefreq.tier,
                }
            })
            .collect())
    }

    /// Applies every update or none: all ids are checked before the first
    /// write.
    pub async fn update_overrides(
        &self,
        kind: &str,
        updates: Vec<OverrideUpdate>,
    ) -> Result<usize, AdminSitemapError> {
        let kind = parse_kind(kind)?;
        if updates.len() > MAX_ITEMS {
            return Err(AdminSitemapError::ConstraintViolation(format!(
                "at most {MAX_ITEMS} items per update"
            )));
        }

        let mut staged = Vec::with_capacity(updates.len());
        for update in &updates {
            let mut overrides = self.current_overrides(&kind, update.id).await?;
            update.patch.apply(&mut overrides);
            staged.push((update.id, overrides));
        }

        for (id, overrides) in &staged {
            match &kind {
                SitemapKind::Content(_) => self.content.save_overrides(*id, overrides).await?,
                SitemapKind::Category | SitemapKind::Tag => {
                    self.taxonomy.save_overrides(*id, overrides).await?
                }
                SitemapKind::Author => self.authors.save_overrides(*id, overrides).await?,
            }
        }

        info!(
            target = SOURCE,
            kind = %kind,
            count = staged.len(),
            "sitemap overrides updated"
        );

        let event = match kind.content_type() {
            Some(content_type) => CacheEvent::Content {
                content_type: content_type.clone(),
            },
            None => CacheEvent::KindSettings { kind },
        };
        self.trigger.trigger(event).await;
        Ok(staged.len())
    }

    pub async fn save_order(&self, kind: &str, ids: Vec<i64>) -> Result<Vec<i64>, AdminSitemapError> {
        let kind = parse_kind(kind)?;
        let ids = dedup_ids(ids)?;
        let mut settings = self.settings.sitemap().await?;
        if ids.is_empty() {
            settings.custom_order.remove(&kind);
        } else {
            settings.custom_order.insert(kind.clone(), ids.clone());
        }
        self.settings.save_sitemap(&settings).await?;
        info!(target = SOURCE, kind = %kind, count = ids.len(), "sitemap order saved");
        self.trigger.trigger(CacheEvent::KindSettings { kind }).await;
        Ok(ids)
    }

    pub async fn save_exclusions(
        &self,
        kind: &str,
        ids: Vec<i64>,
    ) -> Result<Vec<i64>, AdminSitemapError> {
        let kind = parse_kind(kind)?;
        let ids = dedup_ids(ids)?;
        let mut settings = self.settings.sitemap().await?;
        if ids.is_empty() {
            settings.excluded_ids.remove(&kind);
        } else {
            settings.excluded_ids.insert(kind.clone(), ids.clone());
        }
        self.settings.save_sitemap(&settings).await?;
        info!(target = SOURCE, kind = %kind, count = ids.len(), "sitemap exclusions saved");
        self.trigger.trigger(CacheEvent::KindSettings { kind }).await;
        Ok(ids)
    }

    pub async fn regenerate(&self) -> usize {
        let removed = self.trigger.trigger(CacheEvent::Regenerate).await;
        info!(target = SOURCE, removed, "sitemap regeneration requested");
        removed
    }

    pub async fn status(&self) -> Result<SitemapStatus, AdminSitemapError> {
        let settings = self.settings.sitemap().await?;
        let languages = self.catalog.languages().list_enabled().await?;
        Ok(SitemapStatus {
            enabled: settings.enabled,
            index_url: self.catalog.urls().public(INDEX_PATH),
            languages: languages.into_iter().map(|language| language.iso2).collect(),
            cached_entries: self.trigger.cache().len(),
        })
    }

    async fn current_overrides(
        &self,
        kind: &SitemapKind,
        id: i64,
    ) -> Result<ItemOverrides, AdminSitemapError> {
        let not_found = || AdminSitemapError::ItemNotFound {
            kind: kind.clone(),
            id,
        };
        let overrides = match kind {
            SitemapKind::Content(content_type) => self
                .content
                .find_by_id(id)
                .await?
                .filter(|record| &record.content_type == content_type)
                .map(|record| record.overrides),
            SitemapKind::Category | SitemapKind::Tag => {
                let taxonomy = match kind {
                    SitemapKind::Category => Taxonomy::Category,
                    _ => Taxonomy::Tag,
                };
                self.taxonomy
                    .find_term(id)
                    .await?
                    .filter(|term| term.taxonomy == taxonomy)
                    .map(|term| term.overrides)
            }
            SitemapKind::Author => self
                .authors
                .find_author(id)
                .await?
                .map(|author| author.overrides),
        };
        overrides.ok_or_else(not_found)
    }
}

fn parse_kind(name: &str) -> Result<SitemapKind, AdminSitemapError> {
    name.trim()
        .parse()
        .map_err(|_| AdminSitemapError::UnknownKind(name.to_string()))
}

fn dedup_ids(ids: Vec<i64>) -> Result<Vec<i64>, AdminSitemapError> {
    if ids.len() > MAX_SITEMAP_URLS {
        return Err(AdminSitemapError::ConstraintViolation(format!(
            "at most {MAX_SITEMAP_URLS} ids per list"
        )));
    }
    let mut seen = std::collections::HashSet::with_capacity(ids.len());
    Ok(ids.into_iter().filter(|id| seen.insert(*id)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_patch_distinguishes_null_from_absent() {
        let patch: SitemapSettingsPatch =
            serde_json::from_str(r#"{"front_page_id": null}"#).expect("patch");
        assert_eq!(patch.front_page_id, Some(None));
        assert_eq!(patch.uncategorized_id, None);

        let patch: SitemapSettingsPatch =
            serde_json::from_str(r#"{"uncategorized_id": 4}"#).expect("patch");
        assert_eq!(patch.uncategorized_id, Some(Some(4)));
    }

    #[test]
    fn override_updates_flatten_the_patch() {
        let update: OverrideUpdate =
            serde_json::from_str(r#"{"id": 7, "priority": "0.9", "excluded": true}"#)
                .expect("update");
        assert_eq!(update.id, 7);
        assert_eq!(update.patch.priority.as_deref(), Some("0.9"));
        assert_eq!(update.patch.excluded, Some(true));
    }

    #[test]
    fn id_lists_are_deduplicated_in_order() {
        assert_eq!(dedup_ids(vec![3, 1, 3, 2, 1]).expect("ids"), vec![3, 1, 2]);
        assert!(dedup_ids(vec![0; MAX_SITEMAP_URLS + 1]).is_err());
    }

    #[test]
    fn unknown_kinds_are_rejected() {
        assert!(matches!(
            parse_kind("Not A Kind"),
            Err(AdminSitemapError::UnknownKind(_))
        ));
        assert_eq!(parse_kind(" tag ").expect("kind"), SitemapKind::Tag);
    }
}
