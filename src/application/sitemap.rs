//! Sitemap XML rendering.
//!
//! Turns catalog listings into `<sitemapindex>` and `<urlset>` documents.
//! Callers decide which document is wanted and handle caching; everything here
//! is a pure function of the content store and settings at call time.

use std::borrow::Cow;
use std::fmt::Write as _;
use std::time::Instant;

use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::debug;

use crate::application::catalog::{
    Alternate, CatalogError, CatalogItem, ContentCatalog, MAX_SITEMAP_URLS,
};
use crate::application::language::LanguageError;
use crate::application::settings::{SettingsStore, SettingsStoreError, SitemapSettings};
use crate::domain::languages::LanguageMarker;
use crate::domain::types::SitemapKind;

const SOURCE: &str = "application::sitemap";

const SITEMAP_NS: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";
const IMAGE_NS: &str = "http://www.google.com/schemas/sitemap-image/1.1";
const XHTML_NS: &str = "http://www.w3.org/1999/xhtml";

pub const INDEX_PATH: &str = "/sitemap_index.xml";
pub const STYLESHEET_PATH: &str = "/sitemap.xsl";

/// Presentation stylesheet served at [`STYLESHEET_PATH`].
pub const STYLESHEET: &str = include_str!("../../static/sitemap.xsl");

#[derive(Debug, Error)]
pub enum SitemapError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Language(#[from] LanguageError),
    #[error(transparent)]
    Settings(#[from] SettingsStoreError),
}

/// A renderable sitemap document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SitemapDocument {
    /// `/sitemap_index.xml`.
    Index,
    /// `/{language-slug}.xml`.
    LanguageIndex(LanguageMarker),
    /// `/{kind}.xml` or `/{kind}-{iso2}.xml`.
    Page {
        kind: SitemapKind,
        language: Option<LanguageMarker>,
    },
}

/// Sitemap URL for one kind, optionally scoped to a language.
pub fn page_path(kind: &SitemapKind, iso2: Option<&str>) -> String {
    match iso2 {
        Some(iso2) => format!("/{kind}-{iso2}.xml"),
        None => format!("/{kind}.xml"),
    }
}

pub fn language_index_path(language: &LanguageMarker) -> String {
    format!("/{}.xml", language.slug)
}

#[derive(Clone)]
pub struct SitemapService {
    catalog: ContentCatalog,
    settings: SettingsStore,
}

impl SitemapService {
    pub fn new(catalog: ContentCatalog, settings: SettingsStore) -> Self {
        Self { catalog, settings }
    }

    pub fn catalog(&self) -> &ContentCatalog {
        &self.catalog
    }

    pub async fn render(&self, document: &SitemapDocument) -> Result<String, SitemapError> {
        let started = Instant::now();
        let settings = self.settings.sitemap().await?;
        let now = OffsetDateTime::now_utc();

        let body = match document {
            SitemapDocument::Index => self.render_index(&settings).await?,
            SitemapDocument::LanguageIndex(language) => {
                let entries = self.kind_entries(&settings, Some(language)).await?;
                index_xml(&self.stylesheet_url(), &entries)
            }
            SitemapDocument::Page { kind, language } => {
                self.render_page(&settings, kind, language.as_ref(), now)
                    .await?
            }
        };

        let elapsed = started.elapsed();
        metrics::histogram!("waymark_sitemap_render_ms").record(elapsed.as_secs_f64() * 1000.0);
        debug!(
            target = SOURCE,
            document = ?document,
            bytes = body.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "sitemap rendered"
        );
        Ok(body)
    }

    /// One entry per enabled language when more than one is enabled,
    /// otherwise one entry per non-empty kind. Language entries carry the
    /// newest lastmod across their kinds.
    async fn render_index(&self, settings: &SitemapSettings) -> Result<String, SitemapError> {
        let languages = self.catalog.languages().list_enabled().await?;
        let entries = if languages.len() > 1 {
            let mut entries = Vec::with_capacity(languages.len());
            for language in &languages {
                let kinds = self.kind_entries(settings, Some(language)).await?;
                entries.push(IndexEntry {
                    loc: self.catalog.urls().public(&language_index_path(language)),
                    lastmod: kinds.iter().filter_map(|entry| entry.lastmod).max(),
                });
            }
            entries
        } else {
            self.kind_entries(settings, None).await?
        };
        Ok(index_xml(&self.stylesheet_url(), &entries))
    }

    async fn kind_entries(
        &self,
        settings: &SitemapSettings,
        language: Option<&LanguageMarker>,
    ) -> Result<Vec<IndexEntry>, SitemapError> {
        let iso2 = language.map(|language| language.iso2.as_str());
        let mut entries = Vec::new();
        for kind in &settings.enabled_kinds {
            let items = self
                .catalog
                .list_with(settings, kind, iso2, MAX_SITEMAP_URLS)
                .await?;
            if items.is_empty() {
                continue;
            }
            entries.push(IndexEntry {
                loc: self.catalog.urls().public(&page_path(kind, iso2)),
                lastmod: items.iter().filter_map(|item| item.lastmod).max(),
            });
        }
        Ok(entries)
    }

    async fn render_page(
        &self,
        settings: &SitemapSettings,
        kind: &SitemapKind,
        language: Option<&LanguageMarker>,
        now: OffsetDateTime,
    ) -> Result<String, SitemapError> {
        let iso2 = language.map(|language| language.iso2.as_str());
        let items = self
            .catalog
            .list_with(settings, kind, iso2, MAX_SITEMAP_URLS)
            .await?;

        let alternates = if settings.include_hreflang {
            let languages = self.catalog.languages().list_enabled().await?;
            self.catalog.hreflang_entries(&items, &languages).await?
        } else {
            Default::default()
        };

        let mut xml = String::with_capacity(256 + items.len() * 256);
        xml_prolog(&mut xml, &self.stylesheet_url());
        let _ = writeln!(
            xml,
            "<urlset xmlns=\"{SITEMAP_NS}\" xmlns:image=\"{IMAGE_NS}\" xmlns:xhtml=\"{XHTML_NS}\">"
        );
        for item in &items {
            let entry = UrlEntry {
                item,
                priority: self.catalog.priority(item, settings).value.to_string(),
                changefreq: self.catalog.changefreq(item, settings, now).value.as_str(),
                images: if settings.include_images {
                    self.catalog
                        .image_entries(item)
                        .into_iter()
                        .map(|image| {
                            (
                                self.catalog.urls().public(&image.url),
                                image.title.as_deref(),
                                image.caption.as_deref(),
                            )
                        })
                        .collect()
                } else {
                    Vec::new()
                },
                alternates: alternates.get(&item.id).map(Vec::as_slice).unwrap_or(&[]),
            };
            entry.write(&mut xml);
        }
        xml.push_str("</urlset>\n");
        Ok(xml)
    }

    fn stylesheet_url(&self) -> String {
        self.catalog.urls().public(STYLESHEET_PATH)
    }
}

struct IndexEntry {
    loc: String,
    lastmod: Option<OffsetDateTime>,
}

struct UrlEntry<'a> {
    item: &'a CatalogItem,
    priority: String,
    changefreq: &'static str,
    images: Vec<(String, Option<&'a str>, Option<&'a str>)>,
    alternates: &'a [Alternate],
}

impl UrlEntry<'_> {
    fn write(&self, xml: &mut String) {
        xml.push_str("  <url>\n");
        let _ = writeln!(xml, "    <loc>{}</loc>", escape_xml(&self.item.url));
        if let Some(lastmod) = format_lastmod(self.item.lastmod) {
            let _ = writeln!(xml, "    <lastmod>{lastmod}</lastmod>");
        }
        let _ = writeln!(xml, "    <changefreq>{}</changefreq>", self.changefreq);
        let _ = writeln!(xml, "    <priority>{}</priority>", self.priority);
        for (loc, title, caption) in &self.images {
            xml.push_str("    <image:image>\n");
            let _ = writeln!(xml, "      <image:loc>{}</image:loc>", escape_xml(loc));
            if let Some(title) = title {
                let _ = writeln!(xml, "      <image:title>{}</image:title>", escape_xml(title));
            }
            if let Some(caption) = caption {
                let _ = writeln!(
                    xml,
                    "      <image:caption>{}</image:caption>",
                    escape_xml(caption)
                );
            }
            xml.push_str("    </image:image>\n");
        }
        for alternate in self.alternates {
            let _ = writeln!(
                xml,
                "    <xhtml:link rel=\"alternate\" hreflang=\"{}\" href=\"{}\"/>",
                escape_xml(&alternate.hreflang),
                escape_xml(&alternate.href)
            );
        }
        xml.push_str("  </url>\n");
    }
}

fn xml_prolog(xml: &mut String, stylesheet: &str) {
    xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    let _ = writeln!(
        xml,
        "<?xml-stylesheet type=\"text/xsl\" href=\"{}\"?>",
        escape_xml(stylesheet)
    );
}

fn index_xml(stylesheet: &str, entries: &[IndexEntry]) -> String {
    let mut xml = String::with_capacity(256 + entries.len() * 128);
    xml_prolog(&mut xml, stylesheet);
    let _ = writeln!(xml, "<sitemapindex xmlns=\"{SITEMAP_NS}\">");
    for entry in entries {
        xml.push_str("  <sitemap>\n");
        let _ = writeln!(xml, "    <loc>{}</loc>", escape_xml(&entry.loc));
        if let Some(lastmod) = format_lastmod(entry.lastmod) {
            let _ = writeln!(xml, "    <lastmod>{lastmod}</lastmod>");
        }
        xml.push_str("  </sitemap>\n");
    }
    xml.push_str("</sitemapindex>\n");
    xml
}

fn format_lastmod(lastmod: Option<OffsetDateTime>) -> Option<String> {
    lastmod.and_then(|value| value.format(&Rfc3339).ok())
}

/// Escape special XML characters.
pub fn escape_xml(s: &str) -> Cow<'_, str> {
    if !s.contains(['&', '<', '>', '"', '\'']) {
        return Cow::Borrowed(s);
    }

    Cow::Owned(
        s.replace('&', "&amp;")
            .replace('<', "&lt;")
            .replace('>', "&gt;")
            .replace('"', "&quot;")
            .replace('\'', "&apos;"),
    )
}
