//! Language resolution.
//!
//! Posts carry their language through a category and/or tag whose slug or name
//! identifies the language. Every other content type carries a literal
//! language field. Both mechanisms are live and must stay distinct.

use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::application::repos::{LanguageFilter, RepoError, TaxonomyRepo};
use crate::application::settings::{SettingsStore, SettingsStoreError};
use crate::domain::entities::TermRecord;
use crate::domain::languages::LanguageMarker;
use crate::domain::types::{ContentType, Taxonomy};

const SOURCE: &str = "application::language";

#[derive(Debug, Error)]
pub enum LanguageError {
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Settings(#[from] SettingsStoreError),
}

/// Taxonomy markers identifying one language.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LanguageMarkers {
    /// The language category and all of its descendants.
    pub category_ids: Vec<i64>,
    pub tag_id: Option<i64>,
}

impl LanguageMarkers {
    pub fn is_empty(&self) -> bool {
        self.category_ids.is_empty() && self.tag_id.is_none()
    }
}

#[derive(Clone)]
pub struct LanguageResolver {
    settings: SettingsStore,
    taxonomy: Arc<dyn TaxonomyRepo>,
    fallback: LanguageMarker,
}

impl LanguageResolver {
    pub fn new(
        settings: SettingsStore,
        taxonomy: Arc<dyn TaxonomyRepo>,
        fallback: LanguageMarker,
    ) -> Self {
        Self {
            settings,
            taxonomy,
            fallback,
        }
    }

    /// Enabled languages, default first. Falls back to a single synthetic
    /// default language when the registry is empty.
    pub async fn list_enabled(&self) -> Result<Vec<LanguageMarker>, LanguageError> {
        let stored = self.settings.languages().await?;
        let mut enabled: Vec<LanguageMarker> = stored
            .languages
            .into_iter()
            .filter(|language| language.enabled)
            .collect();

        if enabled.is_empty() {
            debug!(
                target = SOURCE,
                iso2 = %self.fallback.iso2,
                "language registry empty, using configured default"
            );
            return Ok(vec![self.fallback.clone()]);
        }

        enabled.sort_by_key(|language| !language.is_default);
        Ok(enabled)
    }

    pub async fn find_enabled(&self, iso2: &str) -> Result<Option<LanguageMarker>, LanguageError> {
        Ok(self
            .list_enabled()
            .await?
            .into_iter()
            .find(|language| language.iso2.eq_ignore_ascii_case(iso2)))
    }

    pub async fn find_by_slug(&self, slug: &str) -> Result<Option<LanguageMarker>, LanguageError> {
        Ok(self
            .list_enabled()
            .await?
            .into_iter()
            .find(|language| language.slug == slug))
    }

    /// Resolves the category subtree and tag that mark `iso2`.
    pub async fn markers_for(&self, iso2: &str) -> Result<LanguageMarkers, LanguageError> {
        let language = self.find_enabled(iso2).await?;
        let candidates = candidate_forms(iso2, language.as_ref().map(|l| l.native_name.as_str()));

        let mut markers = LanguageMarkers::default();
        if let Some(category) = self.find_marker(Taxonomy::Category, &candidates).await? {
            let descendants = self
                .taxonomy
                .descendants_of(Taxonomy::Category, category.id)
                .await?;
            markers.category_ids.push(category.id);
            markers
                .category_ids
                .extend(descendants.into_iter().filter(|id| *id != category.id));
        }
        markers.tag_id = self
            .find_marker(Taxonomy::Tag, &candidates)
            .await?
            .map(|tag| tag.id);

        debug!(
            target = SOURCE,
            iso2,
            categories = markers.category_ids.len(),
            tag = ?markers.tag_id,
            "resolved language markers"
        );
        Ok(markers)
    }

    /// Builds the language restriction for `content_type`. An empty `iso2`
    /// means "all languages".
    pub async fn tax_filter(
        &self,
        iso2: Option<&str>,
        content_type: &ContentType,
    ) -> Result<LanguageFilter, LanguageError> {
        let Some(iso2) = iso2.map(str::trim).filter(|code| !code.is_empty()) else {
            return Ok(LanguageFilter::Any);
        };

        if !content_type.is_post() {
            return Ok(LanguageFilter::Field(iso2.to_ascii_lowercase()));
        }

        let markers = self.markers_for(iso2).await?;
        if markers.is_empty() {
            return Ok(LanguageFilter::Nothing);
        }
        Ok(LanguageFilter::Taxonomy {
            category_ids: markers.category_ids,
            tag_id: markers.tag_id,
        })
    }

    async fn find_marker(
        &self,
        taxonomy: Taxonomy,
        candidates: &[String],
    ) -> Result<Option<TermRecord>, LanguageError> {
        for candidate in candidates {
            if let Some(term) = self.taxonomy.find_by_slug(taxonomy, candidate).await? {
                return Ok(Some(term));
            }
            if let Some(term) = self.taxonomy.find_by_name(taxonomy, candidate).await? {
                return Ok(Some(term));
            }
        }
        Ok(None)
    }
}

/// Lookup candidates in priority order: the code as given, title-cased and
/// upper-cased, then the same three forms of the native name.
fn candidate_forms(iso2: &str, native_name: Option<&str>) -> Vec<String> {
    let mut candidates: Vec<String> = Vec::with_capacity(6);
    let mut push = |value: String| {
        if !value.is_empty() && !candidates.contains(&value) {
            candidates.push(value);
        }
    };

    for base in std::iter::once(iso2).chain(native_name) {
        let base = base.trim();
        push(base.to_string());
        push(title_case(base));
        push(base.to_uppercase());
    }
    candidates
}

fn title_case(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
