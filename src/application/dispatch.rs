//! Request dispatch for the public surface.
//!
//! Order per request: legacy sitemap paths, then sitemap documents and the
//! stylesheet, then redirect rules. Every outcome is terminal.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use crate::application::language::LanguageError;
use crate::application::redirects::RedirectMatcher;
use crate::application::settings::{SettingsStore, SettingsStoreError, SitemapSettings};
use crate::application::sitemap::{
    INDEX_PATH, STYLESHEET_PATH, SitemapDocument, SitemapError, SitemapService,
};
use crate::cache::{SitemapCache, SitemapCacheKey};
use crate::domain::languages::LanguageMarker;
use crate::domain::redirects::normalize_path;
use crate::domain::types::{RedirectType, SitemapKind};

const SOURCE: &str = "application::dispatch";

const LEGACY_PATHS: [&str; 4] = ["/sitemap", "/sitemap.xml", "/wp-sitemap", "/wp-sitemap.xml"];

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Sitemap(#[from] SitemapError),
    #[error(transparent)]
    Settings(#[from] SettingsStoreError),
    #[error(transparent)]
    Language(#[from] LanguageError),
}

/// Sitemap-shaped paths, recognized before any storage lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SitemapRoute {
    Legacy,
    Index,
    Stylesheet,
    /// `/{name}.xml` where `name` may be a language slug, `{kind}` or
    /// `{kind}-{iso2}`.
    Named(String),
}

impl SitemapRoute {
    /// Trailing slashes are ignored so `/sitemap_index.xml/` and
    /// `/sitemap_index.xml` are the same resource.
    pub fn parse(path: &str) -> Option<Self> {
        let path = normalize_path(path);
        if LEGACY_PATHS.contains(&path) {
            return Some(Self::Legacy);
        }
        if path == INDEX_PATH {
            return Some(Self::Index);
        }
        if path == STYLESHEET_PATH {
            return Some(Self::Stylesheet);
        }

        let name = path.strip_prefix('/')?.strip_suffix(".xml")?;
        let valid = !name.is_empty()
            && name
                .bytes()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_' || b == b'-');
        valid.then(|| Self::Named(name.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Sitemap(Arc<str>),
    Stylesheet,
    Redirect {
        location: String,
        kind: RedirectType,
    },
    NotFound,
    /// Not handled here; the host site takes over.
    PassThrough,
}

enum NamedTarget {
    Document(SitemapCacheKey, SitemapDocument),
    NotFound,
    Unrecognized,
}

#[derive(Clone)]
pub struct Dispatcher {
    sitemap: SitemapService,
    cache: Arc<SitemapCache>,
    redirects: Arc<RedirectMatcher>,
    settings: SettingsStore,
}

impl Dispatcher {
    pub fn new(
        sitemap: SitemapService,
        cache: Arc<SitemapCache>,
        redirects: Arc<RedirectMatcher>,
        settings: SettingsStore,
    ) -> Self {
        Self {
            sitemap,
            cache,
            redirects,
            settings,
        }
    }

    pub async fn dispatch(&self, path: &str) -> Result<DispatchOutcome, DispatchError> {
        if let Some(route) = SitemapRoute::parse(path) {
            let settings = self.settings.sitemap().await?;
            match (route, settings.enabled) {
                (SitemapRoute::Legacy, true) => {
                    return Ok(DispatchOutcome::Redirect {
                        location: INDEX_PATH.to_string(),
                        kind: RedirectType::Permanent,
                    });
                }
                (SitemapRoute::Legacy, false) => {}
                (SitemapRoute::Index | SitemapRoute::Stylesheet, false) => {
                    return Ok(DispatchOutcome::NotFound);
                }
                (SitemapRoute::Stylesheet, true) => return Ok(DispatchOutcome::Stylesheet),
                (SitemapRoute::Index, true) => {
                    let body = self
                        .render(SitemapCacheKey::Index, SitemapDocument::Index)
                        .await?;
                    return Ok(DispatchOutcome::Sitemap(body));
                }
                (SitemapRoute::Named(name), enabled) => {
                    match self.resolve_named(&name, &settings).await? {
                        NamedTarget::Document(..) | NamedTarget::NotFound if !enabled => {
                            return Ok(DispatchOutcome::NotFound);
                        }
                        NamedTarget::Document(key, document) => {
                            let body = self.render(key, document).await?;
                            return Ok(DispatchOutcome::Sitemap(body));
                        }
                        NamedTarget::NotFound => return Ok(DispatchOutcome::NotFound),
                        NamedTarget::Unrecognized => {}
                    }
                }
            }
        }

        Ok(self.check_redirects(path).await)
    }

    async fn render(
        &self,
        key: SitemapCacheKey,
        document: SitemapDocument,
    ) -> Result<Arc<str>, SitemapError> {
        self.cache
            .get_or_build(&key, || self.sitemap.render(&document))
            .await
    }

    /// Language slugs win over kind names. Known kinds that are disabled are
    /// a 404; names that are not kinds at all fall through to redirects.
    async fn resolve_named(
        &self,
        name: &str,
        settings: &SitemapSettings,
    ) -> Result<NamedTarget, DispatchError> {
        let languages = self.sitemap.catalog().languages().list_enabled().await?;

        if let Some(language) = languages.iter().find(|language| language.slug == name) {
            return Ok(NamedTarget::Document(
                SitemapCacheKey::lang_index(&language.iso2),
                SitemapDocument::LanguageIndex(language.clone()),
            ));
        }

        if let Some((kind_name, iso2)) = name.rsplit_once('-')
            && let Some(language) = find_language(&languages, iso2)
        {
            return Ok(match kind_name.parse::<SitemapKind>() {
                Ok(kind) if settings.is_kind_enabled(&kind) => NamedTarget::Document(
                    SitemapCacheKey::page(&kind, Some(&language.iso2)),
                    SitemapDocument::Page {
                        kind,
                        language: Some(language.clone()),
                    },
                ),
                _ => NamedTarget::NotFound,
            });
        }

        Ok(match name.parse::<SitemapKind>() {
            Ok(kind) if settings.is_kind_enabled(&kind) => NamedTarget::Document(
                SitemapCacheKey::page(&kind, None),
                SitemapDocument::Page {
                    kind,
                    language: None,
                },
            ),
            Ok(kind) if SitemapKind::defaults().contains(&kind) => NamedTarget::NotFound,
            _ => NamedTarget::Unrecognized,
        })
    }

    async fn check_redirects(&self, path: &str) -> DispatchOutcome {
        let found = match self.redirects.find(path).await {
            Ok(found) => found,
            Err(err) => {
                warn!(
                    target = SOURCE,
                    path,
                    error = %err,
                    "redirect lookup failed, passing request through"
                );
                return DispatchOutcome::PassThrough;
            }
        };
        let Some(found) = found else {
            return DispatchOutcome::PassThrough;
        };

        debug!(
            target = SOURCE,
            path,
            from = %found.from,
            location = %found.location,
            status = found.kind.status_code(),
            "redirect matched"
        );

        if self.redirects.hit_tracking() {
            let redirects = self.redirects.clone();
            let from = found.from.clone();
            tokio::spawn(async move {
                if let Err(err) = redirects.record_hit(&from).await {
                    warn!(target = SOURCE, from = %from, error = %err, "failed to record redirect hit");
                }
            });
        }

        DispatchOutcome::Redirect {
            location: found.location,
            kind: found.kind,
        }
    }
}

fn find_language<'a>(languages: &'a [LanguageMarker], iso2: &str) -> Option<&'a LanguageMarker> {
    languages.iter().find(|language| language.iso2 == iso2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fixed_routes_with_trailing_slashes() {
        assert_eq!(SitemapRoute::parse("/sitemap"), Some(SitemapRoute::Legacy));
        assert_eq!(SitemapRoute::parse("/wp-sitemap.xml/"), Some(SitemapRoute::Legacy));
        assert_eq!(
            SitemapRoute::parse("/sitemap_index.xml/"),
            Some(SitemapRoute::Index)
        );
        assert_eq!(SitemapRoute::parse("/sitemap.xsl"), Some(SitemapRoute::Stylesheet));
    }

    #[test]
    fn parses_named_documents() {
        assert_eq!(
            SitemapRoute::parse("/post-fr.xml"),
            Some(SitemapRoute::Named("post-fr".into()))
        );
        assert_eq!(
            SitemapRoute::parse("/francais.xml"),
            Some(SitemapRoute::Named("francais".into()))
        );
        assert_eq!(SitemapRoute::parse("/nested/post.xml"), None);
        assert_eq!(SitemapRoute::parse("/Post.xml"), None);
        assert_eq!(SitemapRoute::parse("/about"), None);
        assert_eq!(SitemapRoute::parse("/.xml"), None);
    }
}
