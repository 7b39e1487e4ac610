//! Shared domain enumerations and value types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::DomainError;

/// Publication status of a content item as reported by the content store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentStatus {
    Draft,
    Pending,
    Scheduled,
    Published,
    Private,
    Trashed,
}

impl ContentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ContentStatus::Draft => "draft",
            ContentStatus::Pending => "pending",
            ContentStatus::Scheduled => "scheduled",
            ContentStatus::Published => "published",
            ContentStatus::Private => "private",
            ContentStatus::Trashed => "trashed",
        }
    }

    pub fn is_published(self) -> bool {
        matches!(self, ContentStatus::Published)
    }
}

impl TryFrom<&str> for ContentStatus {
    type Error = ();

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "draft" => Ok(ContentStatus::Draft),
            "pending" => Ok(ContentStatus::Pending),
            "scheduled" | "future" => Ok(ContentStatus::Scheduled),
            "published" | "publish" => Ok(ContentStatus::Published),
            "private" => Ok(ContentStatus::Private),
            "trashed" | "trash" => Ok(ContentStatus::Trashed),
            _ => Err(()),
        }
    }
}

/// Name of a content type in the content store (`post`, `page`, or a custom type).
///
/// Type names are lowercase ASCII letters, digits and underscores so that
/// `/{kind}-{iso2}.xml` can always be split unambiguously.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentType(String);

impl ContentType {
    pub const POST: &'static str = "post";
    pub const PAGE: &'static str = "page";

    pub fn new(value: impl Into<String>) -> Result<Self, DomainError> {
        let raw = value.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(DomainError::validation("content_type", "must not be empty"));
        }
        if !trimmed
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_')
        {
            return Err(DomainError::validation(
                "content_type",
                format!("`{trimmed}` may only contain a-z, 0-9 and `_`"),
            ));
        }
        if SpecialKind::parse(trimmed).is_some() {
            return Err(DomainError::validation(
                "content_type",
                format!("`{trimmed}` is reserved for taxonomy and author sitemaps"),
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn post() -> Self {
        Self(Self::POST.to_string())
    }

    pub fn page() -> Self {
        Self(Self::PAGE.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Posts carry their language through category/tag markers.
    pub fn is_post(&self) -> bool {
        self.0 == Self::POST
    }

    /// Pages are hierarchical; their priority depends on having a parent.
    pub fn is_page(&self) -> bool {
        self.0 == Self::PAGE
    }
}

impl TryFrom<String> for ContentType {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ContentType> for String {
    fn from(value: ContentType) -> Self {
        value.0
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Taxonomies that carry language markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Taxonomy {
    Category,
    Tag,
}

impl Taxonomy {
    pub fn as_str(self) -> &'static str {
        match self {
            Taxonomy::Category => "category",
            Taxonomy::Tag => "tag",
        }
    }
}

impl TryFrom<&str> for Taxonomy {
    type Error = ();

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "category" => Ok(Taxonomy::Category),
            "tag" => Ok(Taxonomy::Tag),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum SpecialKind {
    Category,
    Tag,
    Author,
}

impl SpecialKind {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "category" => Some(SpecialKind::Category),
            "tag" => Some(SpecialKind::Tag),
            "author" => Some(SpecialKind::Author),
            _ => None,
        }
    }
}

/// A sitemap partition: one content type, or one of the term/author listings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SitemapKind {
    Content(ContentType),
    Category,
    Tag,
    Author,
}

impl SitemapKind {
    pub fn post() -> Self {
        SitemapKind::Content(ContentType::post())
    }

    pub fn page() -> Self {
        SitemapKind::Content(ContentType::page())
    }

    pub fn as_str(&self) -> &str {
        match self {
            SitemapKind::Content(content_type) => content_type.as_str(),
            SitemapKind::Category => "category",
            SitemapKind::Tag => "tag",
            SitemapKind::Author => "author",
        }
    }

    pub fn content_type(&self) -> Option<&ContentType> {
        match self {
            SitemapKind::Content(content_type) => Some(content_type),
            _ => None,
        }
    }

    /// Kinds whose listings are derived from published posts and therefore
    /// change whenever a post changes.
    pub fn derived_from_posts(&self) -> bool {
        matches!(
            self,
            SitemapKind::Category | SitemapKind::Tag | SitemapKind::Author
        )
    }

    /// The built-in kinds enabled on a fresh install, in index order.
    pub fn defaults() -> Vec<SitemapKind> {
        vec![
            SitemapKind::page(),
            SitemapKind::post(),
            SitemapKind::Category,
            SitemapKind::Tag,
            SitemapKind::Author,
        ]
    }
}

impl FromStr for SitemapKind {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match SpecialKind::parse(value) {
            Some(SpecialKind::Category) => Ok(SitemapKind::Category),
            Some(SpecialKind::Tag) => Ok(SitemapKind::Tag),
            Some(SpecialKind::Author) => Ok(SitemapKind::Author),
            None => ContentType::new(value).map(SitemapKind::Content),
        }
    }
}

impl TryFrom<String> for SitemapKind {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SitemapKind> for String {
    fn from(value: SitemapKind) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for SitemapKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shape of a catalog entry, independent of which sitemap lists it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Page,
    Post,
    Term,
    Author,
}

/// Sitemap priority in tenths (`0.0` through `1.0`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Priority(u8);

impl Priority {
    pub const MAX_TENTHS: u8 = 10;

    pub fn from_tenths(tenths: u8) -> Self {
        Self(tenths.min(Self::MAX_TENTHS))
    }

    pub fn tenths(self) -> u8 {
        self.0
    }

    /// Parse a decimal priority, rounding to the nearest tenth and clamping
    /// into range. Returns `None` for non-numeric input.
    pub fn parse(value: &str) -> Option<Self> {
        let parsed: f64 = value.trim().parse().ok()?;
        if !parsed.is_finite() {
            return None;
        }
        let clamped = parsed.clamp(0.0, 1.0);
        Some(Self((clamped * 10.0).round() as u8))
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.0 / 10, self.0 % 10)
    }
}

/// `<changefreq>` values from the sitemap protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeFreq {
    Always,
    Hourly,
    Daily,
    Weekly,
    Monthly,
    Yearly,
    Never,
}

impl ChangeFreq {
    pub fn as_str(self) -> &'static str {
        match self {
            ChangeFreq::Always => "always",
            ChangeFreq::Hourly => "hourly",
            ChangeFreq::Daily => "daily",
            ChangeFreq::Weekly => "weekly",
            ChangeFreq::Monthly => "monthly",
            ChangeFreq::Yearly => "yearly",
            ChangeFreq::Never => "never",
        }
    }
}

impl FromStr for ChangeFreq {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "always" => Ok(ChangeFreq::Always),
            "hourly" => Ok(ChangeFreq::Hourly),
            "daily" => Ok(ChangeFreq::Daily),
            "weekly" => Ok(ChangeFreq::Weekly),
            "monthly" => Ok(ChangeFreq::Monthly),
            "yearly" => Ok(ChangeFreq::Yearly),
            "never" => Ok(ChangeFreq::Never),
            _ => Err(()),
        }
    }
}

impl fmt::Display for ChangeFreq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A priority that is either derived (`Auto`) or pinned by an admin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PrioritySetting {
    #[default]
    Auto,
    Fixed(Priority),
}

impl PrioritySetting {
    /// Persisted values that fail to parse fall back to `Auto`.
    pub fn parse_lenient(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            None | Some("") | Some("auto") => PrioritySetting::Auto,
            Some(raw) => Priority::parse(raw)
                .map(PrioritySetting::Fixed)
                .unwrap_or(PrioritySetting::Auto),
        }
    }

    pub fn fixed(self) -> Option<Priority> {
        match self {
            PrioritySetting::Auto => None,
            PrioritySetting::Fixed(priority) => Some(priority),
        }
    }

    /// Persisted representation; `None` means "no override".
    pub fn to_persisted(self) -> Option<String> {
        self.fixed().map(|priority| priority.to_string())
    }
}

/// A change frequency that is either derived (`Auto`) or pinned by an admin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChangeFreqSetting {
    #[default]
    Auto,
    Fixed(ChangeFreq),
}

impl ChangeFreqSetting {
    pub fn parse_lenient(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            None | Some("") | Some("auto") => ChangeFreqSetting::Auto,
            Some(raw) => raw
                .parse()
                .map(ChangeFreqSetting::Fixed)
                .unwrap_or(ChangeFreqSetting::Auto),
        }
    }

    pub fn fixed(self) -> Option<ChangeFreq> {
        match self {
            ChangeFreqSetting::Auto => None,
            ChangeFreqSetting::Fixed(freq) => Some(freq),
        }
    }

    pub fn to_persisted(self) -> Option<String> {
        self.fixed().map(|freq| freq.as_str().to_string())
    }
}

impl Serialize for Priority {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl Serialize for PrioritySetting {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            PrioritySetting::Auto => serializer.serialize_str("auto"),
            PrioritySetting::Fixed(priority) => serializer.collect_str(priority),
        }
    }
}

impl Serialize for ChangeFreqSetting {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ChangeFreqSetting::Auto => serializer.serialize_str("auto"),
            ChangeFreqSetting::Fixed(freq) => serializer.serialize_str(freq.as_str()),
        }
    }
}

/// HTTP status used when a redirect rule fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "u16", into = "u16")]
pub enum RedirectType {
    #[default]
    Permanent,
    Found,
}

impl RedirectType {
    pub fn status_code(self) -> u16 {
        match self {
            RedirectType::Permanent => 301,
            RedirectType::Found => 302,
        }
    }
}

/// Anything other than 302 is treated as a permanent redirect.
impl From<u16> for RedirectType {
    fn from(value: u16) -> Self {
        match value {
            302 => RedirectType::Found,
            _ => RedirectType::Permanent,
        }
    }
}

impl From<RedirectType> for u16 {
    fn from(value: RedirectType) -> Self {
        value.status_code()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_rounds_and_clamps() {
        assert_eq!(Priority::parse("0.75").map(Priority::tenths), Some(8));
        assert_eq!(Priority::parse("1.4").map(Priority::tenths), Some(10));
        assert_eq!(Priority::parse("-3").map(Priority::tenths), Some(0));
        assert_eq!(Priority::parse(".5").map(Priority::tenths), Some(5));
        assert!(Priority::parse("high").is_none());
        assert!(Priority::parse("NaN").is_none());
    }

    #[test]
    fn priority_renders_one_decimal() {
        assert_eq!(Priority::from_tenths(10).to_string(), "1.0");
        assert_eq!(Priority::from_tenths(6).to_string(), "0.6");
        assert_eq!(Priority::from_tenths(0).to_string(), "0.0");
    }

    #[test]
    fn malformed_overrides_fall_back_to_auto() {
        assert_eq!(
            PrioritySetting::parse_lenient(Some("very high")),
            PrioritySetting::Auto
        );
        assert_eq!(
            ChangeFreqSetting::parse_lenient(Some("fortnightly")),
            ChangeFreqSetting::Auto
        );
        assert_eq!(
            ChangeFreqSetting::parse_lenient(Some("Weekly")),
            ChangeFreqSetting::Fixed(ChangeFreq::Weekly)
        );
        assert_eq!(
            PrioritySetting::parse_lenient(Some("0.3")),
            PrioritySetting::Fixed(Priority::from_tenths(3))
        );
    }

    #[test]
    fn sitemap_kind_parses_special_and_content_kinds() {
        assert_eq!("category".parse::<SitemapKind>().ok(), Some(SitemapKind::Category));
        assert_eq!("post".parse::<SitemapKind>().ok(), Some(SitemapKind::post()));
        assert_eq!(
            "product".parse::<SitemapKind>().map(|k| k.to_string()).ok(),
            Some("product".to_string())
        );
        assert!("news-feed".parse::<SitemapKind>().is_err());
        assert!("".parse::<SitemapKind>().is_err());
    }

    #[test]
    fn content_type_rejects_reserved_names() {
        assert!(ContentType::new("author").is_err());
        assert!(ContentType::new("Post").is_err());
        assert!(ContentType::new("landing_page").is_ok());
    }

    #[test]
    fn redirect_type_defaults_unknown_codes_to_permanent() {
        assert_eq!(RedirectType::from(302), RedirectType::Found);
        assert_eq!(RedirectType::from(307), RedirectType::Permanent);
        assert_eq!(RedirectType::from(0).status_code(), 301);
    }
}
