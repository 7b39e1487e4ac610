//! Repository traits describing persistence adapters.
//!
//! Query structs carry a pure `matches` predicate that defines their meaning;
//! the in-memory adapter evaluates it directly and the Postgres adapter
//! translates the same fields into SQL.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::domain::entities::{AuthorRecord, ContentRecord, ItemOverrides, TermRecord};
use crate::domain::types::{ContentType, Taxonomy};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// How content is restricted to one language.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LanguageFilter {
    /// No language restriction.
    #[default]
    Any,
    /// Item is in any of the categories, or carries the tag.
    Taxonomy {
        category_ids: Vec<i64>,
        tag_id: Option<i64>,
    },
    /// Item's literal language field equals the code.
    Field(String),
    /// A language was requested but could not be resolved.
    Nothing,
}

impl LanguageFilter {
    pub fn matches(&self, record: &ContentRecord) -> bool {
        match self {
            LanguageFilter::Any => true,
            LanguageFilter::Taxonomy {
                category_ids,
                tag_id,
            } => {
                record.in_any_category(category_ids)
                    || tag_id.is_some_and(|tag_id| record.has_tag(tag_id))
            }
            LanguageFilter::Field(iso2) => record
                .language
                .as_deref()
                .is_some_and(|language| language.eq_ignore_ascii_case(iso2)),
            LanguageFilter::Nothing => false,
        }
    }

    pub fn selects_nothing(&self) -> bool {
        match self {
            LanguageFilter::Nothing => true,
            LanguageFilter::Taxonomy {
                category_ids,
                tag_id,
            } => category_ids.is_empty() && tag_id.is_none(),
            _ => false,
        }
    }
}

/// Published items of one content type, newest first.
#[derive(Debug, Clone)]
pub struct ContentQuery {
    pub content_type: ContentType,
    pub language: LanguageFilter,
    pub exclude_ids: Vec<i64>,
    pub limit: usize,
}

impl ContentQuery {
    pub fn new(content_type: ContentType, limit: usize) -> Self {
        Self {
            content_type,
            language: LanguageFilter::Any,
            exclude_ids: Vec::new(),
            limit,
        }
    }

    pub fn matches(&self, record: &ContentRecord) -> bool {
        record.status.is_published()
            && record.content_type == self.content_type
            && !record.overrides.is_noindex()
            && !record.overrides.excluded
            && self.language.matches(record)
            && !self.exclude_ids.contains(&record.id)
    }
}

/// Terms of one taxonomy, ordered by name.
#[derive(Debug, Clone)]
pub struct TermQuery {
    pub taxonomy: Taxonomy,
    /// Restrict to these ids when set.
    pub only_ids: Option<Vec<i64>>,
    pub exclude_ids: Vec<i64>,
    pub limit: usize,
}

impl TermQuery {
    pub fn matches(&self, term: &TermRecord) -> bool {
        term.taxonomy == self.taxonomy
            && !term.overrides.is_noindex()
            && !term.overrides.excluded
            && self
                .only_ids
                .as_ref()
                .is_none_or(|ids| ids.contains(&term.id))
            && !self.exclude_ids.contains(&term.id)
    }
}

/// Authors ordered by display name.
#[derive(Debug, Clone)]
pub struct AuthorQuery {
    pub only_ids: Vec<i64>,
    pub exclude_ids: Vec<i64>,
    pub limit: usize,
}

impl AuthorQuery {
    pub fn matches(&self, author: &AuthorRecord) -> bool {
        !author.overrides.is_noindex()
            && !author.overrides.excluded
            && self.only_ids.contains(&author.id)
            && !self.exclude_ids.contains(&author.id)
    }
}

#[async_trait]
pub trait ContentRepo: Send + Sync {
    async fn list_published(&self, query: &ContentQuery) -> Result<Vec<ContentRecord>, RepoError>;

    /// Distinct term ids attached to items matching `query`, ignoring its limit.
    async fn term_ids_in_use(
        &self,
        query: &ContentQuery,
        taxonomy: Taxonomy,
    ) -> Result<Vec<i64>, RepoError>;

    /// Distinct author ids of items matching `query`, ignoring its limit.
    async fn author_ids_in_use(&self, query: &ContentQuery) -> Result<Vec<i64>, RepoError>;

    /// Published items belonging to any of the translation groups.
    async fn list_translations(&self, groups: &[String]) -> Result<Vec<ContentRecord>, RepoError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<ContentRecord>, RepoError>;

    async fn save_overrides(&self, id: i64, overrides: &ItemOverrides) -> Result<(), RepoError>;
}

#[async_trait]
pub trait TaxonomyRepo: Send + Sync {
    async fn find_by_slug(
        &self,
        taxonomy: Taxonomy,
        slug: &str,
    ) -> Result<Option<TermRecord>, RepoError>;

    async fn find_by_name(
        &self,
        taxonomy: Taxonomy,
        name: &str,
    ) -> Result<Option<TermRecord>, RepoError>;

    /// Every descendant id of `id`, excluding `id` itself.
    async fn descendants_of(&self, taxonomy: Taxonomy, id: i64) -> Result<Vec<i64>, RepoError>;

    async fn list_terms(&self, query: &TermQuery) -> Result<Vec<TermRecord>, RepoError>;

    async fn find_term(&self, id: i64) -> Result<Option<TermRecord>, RepoError>;

    async fn save_overrides(&self, id: i64, overrides: &ItemOverrides) -> Result<(), RepoError>;
}

#[async_trait]
pub trait AuthorsRepo: Send + Sync {
    async fn list_authors(&self, query: &AuthorQuery) -> Result<Vec<AuthorRecord>, RepoError>;

    async fn find_author(&self, id: i64) -> Result<Option<AuthorRecord>, RepoError>;

    async fn save_overrides(&self, id: i64, overrides: &ItemOverrides) -> Result<(), RepoError>;
}

/// Generic key/value persistence for typed settings.
#[async_trait]
pub trait SettingsRepo: Send + Sync {
    async fn load_setting(&self, key: &str) -> Result<Option<Value>, RepoError>;

    async fn store_setting(&self, key: &str, value: Value) -> Result<(), RepoError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::ContentStatus;

    fn post(id: i64, categories: &[i64], tags: &[i64]) -> ContentRecord {
        ContentRecord {
            id,
            content_type: ContentType::post(),
            slug: format!("post-{id}"),
            title: format!("Post {id}"),
            path: format!("/post-{id}"),
            parent_id: None,
            author_id: Some(1),
            status: ContentStatus::Published,
            published_at: None,
            modified_at: None,
            language: None,
            category_ids: categories.to_vec(),
            tag_ids: tags.to_vec(),
            translation_group: None,
            images: Vec::new(),
            overrides: ItemOverrides::default(),
        }
    }

    #[test]
    fn taxonomy_filter_is_an_or_of_categories_and_tag() {
        let filter = LanguageFilter::Taxonomy {
            category_ids: vec![12, 13, 14],
            tag_id: Some(9),
        };
        assert!(filter.matches(&post(1, &[], &[9])));
        assert!(filter.matches(&post(2, &[13], &[])));
        assert!(!filter.matches(&post(3, &[1], &[4])));
    }

    #[test]
    fn nothing_filter_selects_nothing() {
        assert!(!LanguageFilter::Nothing.matches(&post(1, &[1], &[1])));
        assert!(LanguageFilter::Nothing.selects_nothing());
        assert!(!LanguageFilter::Any.selects_nothing());
    }

    #[test]
    fn content_query_skips_drafts_noindex_and_excluded() {
        let mut query = ContentQuery::new(ContentType::post(), 10);
        query.exclude_ids = vec![3];

        let mut draft = post(1, &[], &[]);
        draft.status = ContentStatus::Draft;
        let mut hidden = post(2, &[], &[]);
        hidden.overrides.robots = Some("noindex".into());

        assert!(!query.matches(&draft));
        assert!(!query.matches(&hidden));
        assert!(!query.matches(&post(3, &[], &[])));
        assert!(query.matches(&post(4, &[], &[])));
    }
}
