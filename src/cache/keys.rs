//! Cache key definitions.

use std::fmt;

use crate::domain::types::SitemapKind;

/// Identifies one rendered sitemap document.
///
/// Renders as `index`, `lang_index:{iso2}`, `page:{kind}` or
/// `page:{kind}:{iso2}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SitemapCacheKey {
    Index,
    LangIndex(String),
    Page(SitemapKind),
    PageLang(SitemapKind, String),
}

impl SitemapCacheKey {
    pub fn lang_index(iso2: &str) -> Self {
        Self::LangIndex(iso2.to_ascii_lowercase())
    }

    pub fn page(kind: &SitemapKind, iso2: Option<&str>) -> Self {
        match iso2 {
            Some(iso2) => Self::PageLang(kind.clone(), iso2.to_ascii_lowercase()),
            None => Self::Page(kind.clone()),
        }
    }

    pub fn kind(&self) -> Option<&SitemapKind> {
        match self {
            Self::Page(kind) | Self::PageLang(kind, _) => Some(kind),
            _ => None,
        }
    }
}

impl fmt::Display for SitemapCacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index => f.write_str("index"),
            Self::LangIndex(iso2) => write!(f, "lang_index:{iso2}"),
            Self::Page(kind) => write!(f, "page:{kind}"),
            Self::PageLang(kind, iso2) => write!(f, "page:{kind}:{iso2}"),
        }
    }
}
