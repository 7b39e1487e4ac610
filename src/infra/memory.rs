//! In-memory repositories.
//!
//! They evaluate the query predicates from `application::repos` directly, so
//! they double as the reference behaviour for the Postgres adapter. Used by
//! tests and by `serve --memory`.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::path::Path;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::application::repos::{
    AuthorQuery, AuthorsRepo, ContentQuery, ContentRepo, RepoError, SettingsRepo, TaxonomyRepo,
    TermQuery,
};
use crate::cache::{rw_read, rw_write};
use crate::domain::entities::{AuthorRecord, ContentRecord, ItemOverrides, TermRecord};
use crate::domain::types::Taxonomy;
use crate::infra::error::InfraError;

const SOURCE: &str = "infra::memory";

#[derive(Default)]
pub struct MemoryContentRepo {
    records: RwLock<Vec<ContentRecord>>,
}

impl MemoryContentRepo {
    pub fn new(records: Vec<ContentRecord>) -> Self {
        Self {
            records: RwLock::new(records),
        }
    }

    /// Inserts or replaces the record with the same id.
    pub fn upsert(&self, record: ContentRecord) {
        let mut records = rw_write(&self.records, SOURCE, "content.upsert");
        match records.iter_mut().find(|existing| existing.id == record.id) {
            Some(existing) => *existing = record,
            None => records.push(record),
        }
    }

    pub fn remove(&self, id: i64) -> Option<ContentRecord> {
        let mut records = rw_write(&self.records, SOURCE, "content.remove");
        let index = records.iter().position(|record| record.id == id)?;
        Some(records.remove(index))
    }

    fn matching(&self, query: &ContentQuery) -> Vec<ContentRecord> {
        rw_read(&self.records, SOURCE, "content.matching")
            .iter()
            .filter(|record| query.matches(record))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ContentRepo for MemoryContentRepo {
    async fn list_published(&self, query: &ContentQuery) -> Result<Vec<ContentRecord>, RepoError> {
        let mut records = self.matching(query);
        records.sort_by(|a, b| {
            b.published_at
                .cmp(&a.published_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        records.truncate(query.limit);
        Ok(records)
    }

    async fn term_ids_in_use(
        &self,
        query: &ContentQuery,
        taxonomy: Taxonomy,
    ) -> Result<Vec<i64>, RepoError> {
        let mut ids: Vec<i64> = self
            .matching(query)
            .iter()
            .flat_map(|record| match taxonomy {
                Taxonomy::Category => record.category_ids.clone(),
                Taxonomy::Tag => record.tag_ids.clone(),
            })
            .collect();
        ids.sort_unstable();
        ids.dedup();
        Ok(ids)
    }

    async fn author_ids_in_use(&self, query: &ContentQuery) -> Result<Vec<i64>, RepoError> {
        let mut ids: Vec<i64> = self
            .matching(query)
            .iter()
            .filter_map(|record| record.author_id)
            .collect();
        ids.sort_unstable();
        ids.dedup();
        Ok(ids)
    }

    async fn list_translations(&self, groups: &[String]) -> Result<Vec<ContentRecord>, RepoError> {
        let mut records: Vec<ContentRecord> = rw_read(&self.records, SOURCE, "content.translations")
            .iter()
            .filter(|record| {
                record.status.is_published()
                    && !record.overrides.is_noindex()
                    && !record.overrides.excluded
                    && record
                        .translation_group
                        .as_ref()
                        .is_some_and(|group| groups.contains(group))
            })
            .cloned()
            .collect();
        records.sort_by_key(|record| record.id);
        Ok(records)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<ContentRecord>, RepoError> {
        Ok(rw_read(&self.records, SOURCE, "content.find")
            .iter()
            .find(|record| record.id == id)
            .cloned())
    }

    async fn save_overrides(&self, id: i64, overrides: &ItemOverrides) -> Result<(), RepoError> {
        let mut records = rw_write(&self.records, SOURCE, "content.save_overrides");
        let record = records
            .iter_mut()
            .find(|record| record.id == id)
            .ok_or(RepoError::NotFound)?;
        record.overrides = overrides.clone();
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryTaxonomyRepo {
    terms: RwLock<Vec<TermRecord>>,
}

impl MemoryTaxonomyRepo {
    pub fn new(terms: Vec<TermRecord>) -> Self {
        Self {
            terms: RwLock::new(terms),
        }
    }

    /// Inserts or replaces the term with the same id.
    pub fn upsert(&self, term: TermRecord) {
        let mut terms = rw_write(&self.terms, SOURCE, "terms.upsert");
        match terms.iter_mut().find(|existing| existing.id == term.id) {
            Some(existing) => *existing = term,
            None => terms.push(term),
        }
    }

    fn find(&self, predicate: impl Fn(&TermRecord) -> bool) -> Option<TermRecord> {
        rw_read(&self.terms, SOURCE, "terms.find")
            .iter()
            .find(|term| predicate(term))
            .cloned()
    }
}

#[async_trait]
impl TaxonomyRepo for MemoryTaxonomyRepo {
    async fn find_by_slug(
        &self,
        taxonomy: Taxonomy,
        slug: &str,
    ) -> Result<Option<TermRecord>, RepoError> {
        Ok(self.find(|term| term.taxonomy == taxonomy && term.slug == slug))
    }

    async fn find_by_name(
        &self,
        taxonomy: Taxonomy,
        name: &str,
    ) -> Result<Option<TermRecord>, RepoError> {
        Ok(self.find(|term| term.taxonomy == taxonomy && term.name == name))
    }

    async fn descendants_of(&self, taxonomy: Taxonomy, id: i64) -> Result<Vec<i64>, RepoError> {
        let terms = rw_read(&self.terms, SOURCE, "terms.descendants");
        let mut found = Vec::new();
        let mut seen = HashSet::from([id]);
        let mut queue = VecDeque::from([id]);

        while let Some(parent) = queue.pop_front() {
            for term in terms.iter() {
                if term.taxonomy == taxonomy
                    && term.parent_id == Some(parent)
                    && seen.insert(term.id)
                {
                    found.push(term.id);
                    queue.push_back(term.id);
                }
            }
        }
        Ok(found)
    }

    async fn list_terms(&self, query: &TermQuery) -> Result<Vec<TermRecord>, RepoError> {
        let mut terms: Vec<TermRecord> = rw_read(&self.terms, SOURCE, "terms.list")
            .iter()
            .filter(|term| query.matches(term))
            .cloned()
            .collect();
        terms.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        terms.truncate(query.limit);
        Ok(terms)
    }

    async fn find_term(&self, id: i64) -> Result<Option<TermRecord>, RepoError> {
        Ok(self.find(|term| term.id == id))
    }

    async fn save_overrides(&self, id: i64, overrides: &ItemOverrides) -> Result<(), RepoError> {
        let mut terms = rw_write(&self.terms, SOURCE, "terms.save_overrides");
        let term = terms
            .iter_mut()
            .find(|term| term.id == id)
            .ok_or(RepoError::NotFound)?;
        term.overrides = overrides.clone();
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryAuthorsRepo {
    authors: RwLock<Vec<AuthorRecord>>,
}

impl MemoryAuthorsRepo {
    pub fn new(authors: Vec<AuthorRecord>) -> Self {
        Self {
            authors: RwLock::new(authors),
        }
    }
}

#[async_trait]
impl AuthorsRepo for MemoryAuthorsRepo {
    async fn list_authors(&self, query: &AuthorQuery) -> Result<Vec<AuthorRecord>, RepoError> {
        let mut authors: Vec<AuthorRecord> = rw_read(&self.authors, SOURCE, "authors.list")
            .iter()
            .filter(|author| query.matches(author))
            .cloned()
            .collect();
        authors.sort_by(|a, b| {
            a.display_name
                .cmp(&b.display_name)
                .then_with(|| a.id.cmp(&b.id))
        });
        authors.truncate(query.limit);
        Ok(authors)
    }

    async fn find_author(&self, id: i64) -> Result<Option<AuthorRecord>, RepoError> {
        Ok(rw_read(&self.authors, SOURCE, "authors.find")
            .iter()
            .find(|author| author.id == id)
            .cloned())
    }

    async fn save_overrides(&self, id: i64, overrides: &ItemOverrides) -> Result<(), RepoError> {
        let mut authors = rw_write(&self.authors, SOURCE, "authors.save_overrides");
        let author = authors
            .iter_mut()
            .find(|author| author.id == id)
            .ok_or(RepoError::NotFound)?;
        author.overrides = overrides.clone();
        Ok(())
    }
}

#[derive(Default)]
pub struct MemorySettingsRepo {
    values: RwLock<HashMap<String, Value>>,
}

#[async_trait]
impl SettingsRepo for MemorySettingsRepo {
    async fn load_setting(&self, key: &str) -> Result<Option<Value>, RepoError> {
        Ok(rw_read(&self.values, SOURCE, "settings.load").get(key).cloned())
    }

    async fn store_setting(&self, key: &str, value: Value) -> Result<(), RepoError> {
        rw_write(&self.values, SOURCE, "settings.store").insert(key.to_string(), value);
        Ok(())
    }
}

/// Initial data for an in-memory run, usually read from a JSON file.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct MemorySeed {
    pub content: Vec<ContentRecord>,
    pub terms: Vec<TermRecord>,
    pub authors: Vec<AuthorRecord>,
    /// Raw settings values keyed like the persisted settings.
    pub settings: BTreeMap<String, Value>,
}

impl MemorySeed {
    pub async fn load(path: &Path) -> Result<Self, InfraError> {
        let raw = tokio::fs::read(path).await?;
        serde_json::from_slice(&raw).map_err(|err| {
            InfraError::configuration(format!("invalid seed file {}: {err}", path.display()))
        })
    }

    pub fn into_repositories(self) -> MemoryRepositories {
        let settings = MemorySettingsRepo {
            values: RwLock::new(self.settings.into_iter().collect()),
        };
        MemoryRepositories {
            content: Arc::new(MemoryContentRepo::new(self.content)),
            taxonomy: Arc::new(MemoryTaxonomyRepo::new(self.terms)),
            authors: Arc::new(MemoryAuthorsRepo::new(self.authors)),
            settings: Arc::new(settings),
        }
    }
}

#[derive(Clone)]
pub struct MemoryRepositories {
    pub content: Arc<MemoryContentRepo>,
    pub taxonomy: Arc<MemoryTaxonomyRepo>,
    pub authors: Arc<MemoryAuthorsRepo>,
    pub settings: Arc<MemorySettingsRepo>,
}

impl Default for MemoryRepositories {
    fn default() -> Self {
        MemorySeed::default().into_repositories()
    }
}
