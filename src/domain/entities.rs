//! Records mirrored from the content store.
//!
//! The catalog never persists these; it reads them on demand and only writes
//! back the override fields.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

use crate::domain::types::{
    ChangeFreqSetting, ContentStatus, ContentType, ItemKind, PrioritySetting, SitemapKind,
    Taxonomy,
};

/// Per-item overrides persisted next to the underlying content object.
///
/// Values are kept as the raw persisted strings; parsing happens at read time
/// so a corrupt value degrades to `Auto` instead of failing the load. Fields
/// of the wrong JSON type decode as unset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ItemOverrides {
    pub priority: Option<String>,
    pub changefreq: Option<String>,
    pub excluded: bool,
    pub robots: Option<String>,
}

impl<'de> Deserialize<'de> for ItemOverrides {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(Self::from_value(&value))
    }
}

impl ItemOverrides {
    fn from_value(value: &Value) -> Self {
        let text = |field: &str| {
            value
                .get(field)
                .and_then(Value::as_str)
                .map(str::to_string)
        };
        Self {
            priority: text("priority"),
            changefreq: text("changefreq"),
            excluded: value.get("excluded").and_then(Value::as_bool).unwrap_or(false),
            robots: text("robots"),
        }
    }

    pub fn priority(&self) -> PrioritySetting {
        PrioritySetting::parse_lenient(self.priority.as_deref())
    }

    pub fn changefreq(&self) -> ChangeFreqSetting {
        ChangeFreqSetting::parse_lenient(self.changefreq.as_deref())
    }

    /// Only an explicit `noindex` robots directive removes an item.
    pub fn is_noindex(&self) -> bool {
        self.robots.as_deref().is_some_and(|robots| {
            robots
                .split(',')
                .any(|directive| directive.trim().eq_ignore_ascii_case("noindex"))
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentRecord {
    pub id: i64,
    pub content_type: ContentType,
    pub slug: String,
    pub title: String,
    /// Site-relative permalink, e.g. `/about/team`.
    pub path: String,
    #[serde(default)]
    pub parent_id: Option<i64>,
    #[serde(default)]
    pub author_id: Option<i64>,
    pub status: ContentStatus,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub published_at: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub modified_at: Option<OffsetDateTime>,
    /// Literal language field; used by every kind except posts.
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub category_ids: Vec<i64>,
    #[serde(default)]
    pub tag_ids: Vec<i64>,
    #[serde(default)]
    pub translation_group: Option<String>,
    #[serde(default)]
    pub images: Vec<ImageRef>,
    #[serde(default)]
    pub overrides: ItemOverrides,
}

impl ContentRecord {
    pub fn is_top_level(&self) -> bool {
        self.parent_id.is_none()
    }

    pub fn in_any_category(&self, ids: &[i64]) -> bool {
        self.category_ids.iter().any(|id| ids.contains(id))
    }

    pub fn has_tag(&self, tag_id: i64) -> bool {
        self.tag_ids.contains(&tag_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermRecord {
    pub id: i64,
    pub taxonomy: Taxonomy,
    pub slug: String,
    pub name: String,
    pub path: String,
    #[serde(default)]
    pub parent_id: Option<i64>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub modified_at: Option<OffsetDateTime>,
    #[serde(default)]
    pub overrides: ItemOverrides,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorRecord {
    pub id: i64,
    pub slug: String,
    pub display_name: String,
    pub path: String,
    /// Most recent modification among the author's published posts.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub last_post_modified: Option<OffsetDateTime>,
    #[serde(default)]
    pub overrides: ItemOverrides,
}

/// Closed set of things a sitemap can list.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "record", rename_all = "snake_case")]
pub enum CatalogSource {
    Page(ContentRecord),
    /// Posts and custom content types.
    Post(ContentRecord),
    Term(TermRecord),
    Author(AuthorRecord),
}

impl CatalogSource {
    pub fn from_content(record: ContentRecord) -> Self {
        if record.content_type.is_page() {
            CatalogSource::Page(record)
        } else {
            CatalogSource::Post(record)
        }
    }

    pub fn id(&self) -> i64 {
        match self {
            CatalogSource::Page(record) | CatalogSource::Post(record) => record.id,
            CatalogSource::Term(term) => term.id,
            CatalogSource::Author(author) => author.id,
        }
    }

    pub fn item_kind(&self) -> ItemKind {
        match self {
            CatalogSource::Page(_) => ItemKind::Page,
            CatalogSource::Post(_) => ItemKind::Post,
            CatalogSource::Term(_) => ItemKind::Term,
            CatalogSource::Author(_) => ItemKind::Author,
        }
    }

    pub fn sitemap_kind(&self) -> SitemapKind {
        match self {
            CatalogSource::Page(record) | CatalogSource::Post(record) => {
                SitemapKind::Content(record.content_type.clone())
            }
            CatalogSource::Term(term) => match term.taxonomy {
                Taxonomy::Category => SitemapKind::Category,
                Taxonomy::Tag => SitemapKind::Tag,
            },
            CatalogSource::Author(_) => SitemapKind::Author,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            CatalogSource::Page(record) | CatalogSource::Post(record) => &record.title,
            CatalogSource::Term(term) => &term.name,
            CatalogSource::Author(author) => &author.display_name,
        }
    }

    pub fn path(&self) -> &str {
        match self {
            CatalogSource::Page(record) | CatalogSource::Post(record) => &record.path,
            CatalogSource::Term(term) => &term.path,
            CatalogSource::Author(author) => &author.path,
        }
    }

    pub fn modified_at(&self) -> Option<OffsetDateTime> {
        match self {
            CatalogSource::Page(record) | CatalogSource::Post(record) => {
                record.modified_at.or(record.published_at)
            }
            CatalogSource::Term(term) => term.modified_at,
            CatalogSource::Author(author) => author.last_post_modified,
        }
    }

    pub fn overrides(&self) -> &ItemOverrides {
        match self {
            CatalogSource::Page(record) | CatalogSource::Post(record) => &record.overrides,
            CatalogSource::Term(term) => &term.overrides,
            CatalogSource::Author(author) => &author.overrides,
        }
    }

    pub fn content(&self) -> Option<&ContentRecord> {
        match self {
            CatalogSource::Page(record) | CatalogSource::Post(record) => Some(record),
            _ => None,
        }
    }
}
