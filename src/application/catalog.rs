//! Content catalog: the single filter pipeline behind both the public
//! sitemaps and the admin preview.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use tracing::debug;

use crate::application::language::{LanguageError, LanguageResolver};
use crate::application::repos::{
    AuthorQuery, AuthorsRepo, ContentQuery, ContentRepo, LanguageFilter, RepoError, TaxonomyRepo,
    TermQuery,
};
use crate::application::settings::{SettingsStore, SettingsStoreError, SitemapSettings};
use crate::domain::cascade::{Resolved, resolve};
use crate::domain::entities::{CatalogSource, ContentRecord, ImageRef};
use crate::domain::languages::LanguageMarker;
use crate::domain::types::{
    ChangeFreq, ChangeFreqSetting, ContentType, ItemKind, Priority, PrioritySetting, SitemapKind,
    Taxonomy,
};

const SOURCE: &str = "application::catalog";

/// Upper bound for admin item listings.
pub const MAX_ITEMS: usize = 500;
/// Upper bound for a single sitemap page.
pub const MAX_SITEMAP_URLS: usize = 2000;
pub const MAX_IMAGES: usize = 10;
pub const MAX_ALTERNATES: usize = 50;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Language(#[from] LanguageError),
    #[error(transparent)]
    Settings(#[from] SettingsStoreError),
}

/// Absolute URL builders for the public site and the admin.
#[derive(Debug, Clone)]
pub struct SiteUrls {
    public_base: String,
    admin_base: String,
}

impl SiteUrls {
    pub fn new(public_base: &str, admin_base: &str) -> Self {
        Self {
            public_base: public_base.trim_end_matches('/').to_string(),
            admin_base: admin_base.trim_end_matches('/').to_string(),
        }
    }

    pub fn public(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        if path.starts_with('/') {
            format!("{}{}", self.public_base, path)
        } else {
            format!("{}/{}", self.public_base, path)
        }
    }

    pub fn admin(&self, path: &str) -> String {
        format!("{}/{}", self.admin_base, path.trim_start_matches('/'))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CatalogItem {
    pub id: i64,
    pub kind: ItemKind,
    pub title: String,
    pub url: String,
    pub edit_url: String,
    pub priority: PrioritySetting,
    pub changefreq: ChangeFreqSetting,
    pub excluded: bool,
    #[serde(with = "time::serde::rfc3339::option")]
    pub lastmod: Option<OffsetDateTime>,
    #[serde(skip)]
    pub source: CatalogSource,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Alternate {
    pub hreflang: String,
    pub href: String,
}

#[derive(Clone)]
pub struct ContentCatalog {
    content: Arc<dyn ContentRepo>,
    taxonomy: Arc<dyn TaxonomyRepo>,
    authors: Arc<dyn AuthorsRepo>,
    languages: LanguageResolver,
    settings: SettingsStore,
    urls: SiteUrls,
}

impl ContentCatalog {
    pub fn new(
        content: Arc<dyn ContentRepo>,
        taxonomy: Arc<dyn TaxonomyRepo>,
        authors: Arc<dyn AuthorsRepo>,
        languages: LanguageResolver,
        settings: SettingsStore,
        urls: SiteUrls,
    ) -> Self {
        Self {
            content,
            taxonomy,
            authors,
            languages,
            settings,
            urls,
        }
    }

    pub fn languages(&self) -> &LanguageResolver {
        &self.languages
    }

    pub fn urls(&self) -> &SiteUrls {
        &self.urls
    }

    pub async fn list(
        &self,
        kind: &SitemapKind,
        iso2: Option<&str>,
        limit: usize,
    ) -> Result<Vec<CatalogItem>, CatalogError> {
        let settings = self.settings.sitemap().await?;
        self.list_with(&settings, kind, iso2, limit).await
    }

    /// Published, indexable, non-excluded items of `kind` in `iso2`, custom
    /// order first, truncated to `limit` (never above [`MAX_SITEMAP_URLS`]).
    pub async fn list_with(
        &self,
        settings: &SitemapSettings,
        kind: &SitemapKind,
        iso2: Option<&str>,
        limit: usize,
    ) -> Result<Vec<CatalogItem>, CatalogError> {
        let iso2 = iso2.map(str::trim).filter(|code| !code.is_empty());
        let limit = limit.min(MAX_SITEMAP_URLS);
        let excluded = settings.excluded_for(kind).to_vec();

        let sources = match kind {
            SitemapKind::Content(content_type) => {
                self.content_sources(content_type, iso2, excluded).await?
            }
            SitemapKind::Category => self.category_sources(settings, iso2, excluded).await?,
            SitemapKind::Tag => self.tag_sources(iso2, excluded).await?,
            SitemapKind::Author => self.author_sources(iso2, excluded).await?,
        };

        let mut ordered = apply_custom_order(sources, settings.order_for(kind));
        ordered.truncate(limit);

        debug!(
            target = SOURCE,
            kind = %kind,
            iso2 = iso2.unwrap_or(""),
            count = ordered.len(),
            "catalog listed"
        );

        Ok(ordered
            .into_iter()
            .map(|source| self.to_item(source, settings))
            .collect())
    }

    /// Effective priority: item override, then the kind default, then the
    /// built-in rule.
    pub fn priority(&self, item: &CatalogItem, settings: &SitemapSettings) -> Resolved<Priority> {
        let kind = item.source.sitemap_kind();
        resolve(
            item.priority.fixed(),
            settings.defaults_for(&kind).priority().fixed(),
            || builtin_priority(&item.source, settings.front_page_id),
        )
    }

    pub fn changefreq(
        &self,
        item: &CatalogItem,
        settings: &SitemapSettings,
        now: OffsetDateTime,
    ) -> Resolved<ChangeFreq> {
        let kind = item.source.sitemap_kind();
        resolve(
            item.changefreq.fixed(),
            settings.defaults_for(&kind).changefreq().fixed(),
            || changefreq_for_age(item.lastmod, now),
        )
    }

    pub fn image_entries<'a>(&self, item: &'a CatalogItem) -> Vec<&'a ImageRef> {
        item.source
            .content()
            .map(|record| record.images.iter().take(MAX_IMAGES).collect())
            .unwrap_or_default()
    }

    /// Alternates per item id, one per translation sibling (the item itself
    /// included) whose language resolves to an enabled language. Items
    /// whose group spans fewer than two languages get no entry.
    pub async fn hreflang_entries(
        &self,
        items: &[CatalogItem],
        languages: &[LanguageMarker],
    ) -> Result<HashMap<i64, Vec<Alternate>>, CatalogError> {
        let groups: Vec<String> = items
            .iter()
            .filter_map(|item| item.source.content()?.translation_group.clone())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        if groups.is_empty() || languages.len() < 2 {
            return Ok(HashMap::new());
        }

        let siblings = self.content.list_translations(&groups).await?;
        let mut post_filters: Option<Vec<(String, LanguageFilter)>> = None;
        let mut by_group: HashMap<String, Vec<Alternate>> = HashMap::new();

        for sibling in &siblings {
            let Some(group) = sibling.translation_group.as_ref() else {
                continue;
            };
            let language = match declared_language(sibling, languages) {
                Some(iso2) => Some(iso2),
                None if sibling.content_type.is_post() => {
                    if post_filters.is_none() {
                        post_filters = Some(self.post_filters(languages).await?);
                    }
                    post_filters.as_deref().and_then(|filters| {
                        filters
                            .iter()
                            .find(|(_, filter)| filter.matches(sibling))
                            .map(|(iso2, _)| iso2.clone())
                    })
                }
                None => None,
            };
            let Some(hreflang) = language else {
                continue;
            };

            let alternates = by_group.entry(group.clone()).or_default();
            if alternates.len() < MAX_ALTERNATES
                && !alternates.iter().any(|alt| alt.hreflang == hreflang)
            {
                alternates.push(Alternate {
                    hreflang,
                    href: self.urls.public(&sibling.path),
                });
            }
        }

        let mut entries = HashMap::new();
        for item in items {
            let Some(group) = item
                .source
                .content()
                .and_then(|record| record.translation_group.as_ref())
            else {
                continue;
            };
            if let Some(alternates) = by_group.get(group).filter(|alts| alts.len() > 1) {
                entries.insert(item.id, alternates.clone());
            }
        }
        Ok(entries)
    }

    async fn post_filters(
        &self,
        languages: &[LanguageMarker],
    ) -> Result<Vec<(String, LanguageFilter)>, CatalogError> {
        let post = ContentType::post();
        let mut filters = Vec::with_capacity(languages.len());
        for language in languages {
            let filter = self
                .languages
                .tax_filter(Some(&language.iso2), &post)
                .await?;
            filters.push((language.iso2.clone(), filter));
        }
        Ok(filters)
    }

    async fn content_sources(
        &self,
        content_type: &ContentType,
        iso2: Option<&str>,
        excluded: Vec<i64>,
    ) -> Result<Vec<CatalogSource>, CatalogError> {
        let language = self.languages.tax_filter(iso2, content_type).await?;
        if language.selects_nothing() {
            return Ok(Vec::new());
        }

        let query = ContentQuery {
            content_type: content_type.clone(),
            language,
            exclude_ids: excluded,
            limit: MAX_SITEMAP_URLS,
        };
        let records = self.content.list_published(&query).await?;
        Ok(records.into_iter().map(CatalogSource::from_content).collect())
    }

    async fn category_sources(
        &self,
        settings: &SitemapSettings,
        iso2: Option<&str>,
        excluded: Vec<i64>,
    ) -> Result<Vec<CatalogSource>, CatalogError> {
        let candidates = match iso2 {
            Some(iso2) => self.languages.markers_for(iso2).await?.category_ids,
            None => {
                let posts = ContentQuery::new(ContentType::post(), MAX_SITEMAP_URLS);
                self.content
                    .term_ids_in_use(&posts, Taxonomy::Category)
                    .await?
            }
        };
        let only_ids: Vec<i64> = candidates
            .into_iter()
            .filter(|id| Some(*id) != settings.uncategorized_id)
            .collect();
        if only_ids.is_empty() {
            return Ok(Vec::new());
        }

        let query = TermQuery {
            taxonomy: Taxonomy::Category,
            only_ids: Some(only_ids),
            exclude_ids: excluded,
            limit: MAX_SITEMAP_URLS,
        };
        let terms = self.taxonomy.list_terms(&query).await?;
        Ok(terms.into_iter().map(CatalogSource::Term).collect())
    }

    async fn tag_sources(
        &self,
        iso2: Option<&str>,
        excluded: Vec<i64>,
    ) -> Result<Vec<CatalogSource>, CatalogError> {
        let Some(posts) = self.post_query(iso2).await? else {
            return Ok(Vec::new());
        };
        let only_ids = self.content.term_ids_in_use(&posts, Taxonomy::Tag).await?;
        if only_ids.is_empty() {
            return Ok(Vec::new());
        }

        let query = TermQuery {
            taxonomy: Taxonomy::Tag,
            only_ids: Some(only_ids),
            exclude_ids: excluded,
            limit: MAX_SITEMAP_URLS,
        };
        let terms = self.taxonomy.list_terms(&query).await?;
        Ok(terms.into_iter().map(CatalogSource::Term).collect())
    }

    async fn author_sources(
        &self,
        iso2: Option<&str>,
        excluded: Vec<i64>,
    ) -> Result<Vec<CatalogSource>, CatalogError> {
        let Some(posts) = self.post_query(iso2).await? else {
            return Ok(Vec::new());
        };
        let only_ids = self.content.author_ids_in_use(&posts).await?;
        if only_ids.is_empty() {
            return Ok(Vec::new());
        }

        let query = AuthorQuery {
            only_ids,
            exclude_ids: excluded,
            limit: MAX_SITEMAP_URLS,
        };
        let authors = self.authors.list_authors(&query).await?;
        Ok(authors.into_iter().map(CatalogSource::Author).collect())
    }

    /// Published posts in `iso2`, or `None` when the language cannot match
    /// anything.
    async fn post_query(&self, iso2: Option<&str>) -> Result<Option<ContentQuery>, CatalogError> {
        let post = ContentType::post();
        let language = self.languages.tax_filter(iso2, &post).await?;
        if language.selects_nothing() {
            return Ok(None);
        }
        let mut query = ContentQuery::new(post, MAX_SITEMAP_URLS);
        query.language = language;
        Ok(Some(query))
    }

    fn to_item(&self, source: CatalogSource, settings: &SitemapSettings) -> CatalogItem {
        let overrides = source.overrides();
        let edit_path = match &source {
            CatalogSource::Page(record) | CatalogSource::Post(record) => {
                format!("content/{}/edit", record.id)
            }
            CatalogSource::Term(term) => format!("terms/{}/edit", term.id),
            CatalogSource::Author(author) => format!("authors/{}/edit", author.id),
        };
        let kind = source.sitemap_kind();

        CatalogItem {
            id: source.id(),
            kind: source.item_kind(),
            title: source.title().to_string(),
            url: self.urls.public(source.path()),
            edit_url: self.urls.admin(&edit_path),
            priority: overrides.priority(),
            changefreq: overrides.changefreq(),
            excluded: overrides.excluded || settings.excluded_for(&kind).contains(&source.id()),
            lastmod: source.modified_at(),
            source,
        }
    }
}

/// Items with a saved position come first in saved order; the rest keep
/// their default order.
fn apply_custom_order(sources: Vec<CatalogSource>, order: &[i64]) -> Vec<CatalogSource> {
    if order.is_empty() {
        return sources;
    }

    let position: HashMap<i64, usize> = order
        .iter()
        .enumerate()
        .rev()
        .map(|(index, id)| (*id, index))
        .collect();
    let (mut pinned, rest): (Vec<_>, Vec<_>) = sources
        .into_iter()
        .partition(|source| position.contains_key(&source.id()));
    pinned.sort_by_key(|source| position.get(&source.id()).copied().unwrap_or(usize::MAX));
    pinned.extend(rest);
    pinned
}

fn builtin_priority(source: &CatalogSource, front_page_id: Option<i64>) -> Priority {
    if front_page_id.is_some_and(|id| source.content().is_some_and(|record| record.id == id)) {
        return Priority::from_tenths(10);
    }
    match source {
        CatalogSource::Page(record) if record.is_top_level() => Priority::from_tenths(8),
        CatalogSource::Post(_) => Priority::from_tenths(6),
        _ => Priority::from_tenths(5),
    }
}

fn changefreq_for_age(lastmod: Option<OffsetDateTime>, now: OffsetDateTime) -> ChangeFreq {
    let Some(lastmod) = lastmod else {
        return ChangeFreq::Monthly;
    };
    let age = now - lastmod;
    if age < Duration::days(7) {
        ChangeFreq::Daily
    } else if age < Duration::days(30) {
        ChangeFreq::Weekly
    } else {
        ChangeFreq::Monthly
    }
}

fn declared_language(record: &ContentRecord, languages: &[LanguageMarker]) -> Option<String> {
    let declared = record.language.as_deref()?.trim();
    languages
        .iter()
        .find(|language| language.iso2.eq_ignore_ascii_case(declared))
        .map(|language| language.iso2.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{ItemOverrides, TermRecord};
    use crate::domain::types::ContentStatus;
    use time::macros::datetime;

    fn page(id: i64, parent: Option<i64>) -> CatalogSource {
        CatalogSource::Page(ContentRecord {
            id,
            content_type: ContentType::page(),
            slug: format!("page-{id}"),
            title: format!("Page {id}"),
            path: format!("/page-{id}"),
            parent_id: parent,
            author_id: None,
            status: ContentStatus::Published,
            published_at: None,
            modified_at: None,
            language: None,
            category_ids: Vec::new(),
            tag_ids: Vec::new(),
            translation_group: None,
            images: Vec::new(),
            overrides: ItemOverrides::default(),
        })
    }

    fn term(id: i64) -> CatalogSource {
        CatalogSource::Term(TermRecord {
            id,
            taxonomy: Taxonomy::Category,
            slug: format!("c{id}"),
            name: format!("C{id}"),
            path: format!("/category/c{id}"),
            parent_id: None,
            modified_at: None,
            overrides: ItemOverrides::default(),
        })
    }

    #[test]
    fn custom_order_puts_saved_ids_first() {
        let sources = vec![term(1), term(2), term(3), term(4)];
        let ordered: Vec<i64> = apply_custom_order(sources, &[3, 99, 1])
            .iter()
            .map(CatalogSource::id)
            .collect();
        assert_eq!(ordered, vec![3, 1, 2, 4]);
    }

    #[test]
    fn builtin_priorities_follow_item_shape() {
        assert_eq!(builtin_priority(&page(1, None), Some(1)).to_string(), "1.0");
        assert_eq!(builtin_priority(&page(2, None), Some(1)).to_string(), "0.8");
        assert_eq!(builtin_priority(&page(3, Some(2)), None).to_string(), "0.5");
        assert_eq!(builtin_priority(&term(4), None).to_string(), "0.5");
    }

    #[test]
    fn changefreq_tracks_modification_age() {
        let now = datetime!(2024-06-30 12:00 UTC);
        assert_eq!(
            changefreq_for_age(Some(datetime!(2024-06-28 12:00 UTC)), now),
            ChangeFreq::Daily
        );
        assert_eq!(
            changefreq_for_age(Some(datetime!(2024-06-10 12:00 UTC)), now),
            ChangeFreq::Weekly
        );
        assert_eq!(
            changefreq_for_age(Some(datetime!(2024-01-01 00:00 UTC)), now),
            ChangeFreq::Monthly
        );
        assert_eq!(changefreq_for_age(None, now), ChangeFreq::Monthly);
    }

    #[test]
    fn site_urls_join_paths() {
        let urls = SiteUrls::new("https://example.com/", "https://example.com/admin");
        assert_eq!(urls.public("/about"), "https://example.com/about");
        assert_eq!(urls.public("about"), "https://example.com/about");
        assert_eq!(urls.admin("/content/1/edit"), "https://example.com/admin/content/1/edit");
    }
}
