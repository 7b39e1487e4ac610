//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

use std::{
    net::SocketAddr,
    num::{NonZeroU32, NonZeroUsize},
    str::FromStr,
    time::Duration,
};

use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

use crate::domain::languages::{LanguageMarker, is_valid_iso2};

pub use cli::{
    CliArgs, Command, DatabaseOverride, RedirectFileArgs, RedirectsArgs, RedirectsCommand,
    ServeArgs, ServeOverrides, TreeArgs,
};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "waymark";
const ENV_PREFIX: &str = "WAYMARK";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_ADMIN_HOST: &str = "127.0.0.1";
const DEFAULT_PUBLIC_PORT: u16 = 3000;
const DEFAULT_ADMIN_PORT: u16 = 3001;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 8;
const DEFAULT_PUBLIC_URL: &str = "http://127.0.0.1:3000/";
const DEFAULT_ADMIN_URL: &str = "http://127.0.0.1:3001/";
const DEFAULT_LANGUAGE_ISO2: &str = "en";
const DEFAULT_LANGUAGE_NAME: &str = "English";
const DEFAULT_SITEMAP_CACHE_TTL_SECS: u64 = 3600;
const DEFAULT_SITEMAP_CACHE_MAX_ENTRIES: usize = 256;
const DEFAULT_STYLESHEET_MAX_AGE_SECS: u64 = 86_400;
const DEFAULT_REDIRECTS_MAX_RULES: usize = 500;

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub database: DatabaseSettings,
    pub site: SiteSettings,
    pub sitemap: SitemapCacheSettings,
    pub redirects: RedirectSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub public_addr: SocketAddr,
    pub admin_addr: SocketAddr,
    pub graceful_shutdown: Duration,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub max_connections: NonZeroU32,
}

#[derive(Debug, Clone)]
pub struct SiteSettings {
    pub public_url: Url,
    pub admin_url: Url,
    /// Used when no language registry has been stored yet.
    pub default_language: LanguageMarker,
}

#[derive(Debug, Clone)]
pub struct SitemapCacheSettings {
    pub cache_ttl: Duration,
    pub cache_max_entries: NonZeroUsize,
    pub stylesheet_max_age: Duration,
}

#[derive(Debug, Clone)]
pub struct RedirectSettings {
    pub max_rules: usize,
    pub hit_tracking: bool,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Redirects(args)) => match &args.command {
            RedirectsCommand::Export(file) | RedirectsCommand::Import(file) => {
                raw.apply_database_override(&file.database)
            }
        },
        Some(Command::Tree(args)) => raw.apply_database_override(&args.database),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    database: RawDatabaseSettings,
    site: RawSiteSettings,
    sitemap: RawSitemapSettings,
    redirects: RawRedirectSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(host) = overrides.server_admin_host.as_ref() {
            self.server.admin_host = Some(host.clone());
        }
        if let Some(port) = overrides.public_port {
            self.server.public_port = Some(port);
        }
        if let Some(port) = overrides.admin_port {
            self.server.admin_port = Some(port);
        }
        if let Some(seconds) = overrides.server_graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
        if let Some(max) = overrides.database_max_connections {
            self.database.max_connections = Some(max);
        }
        if let Some(url) = overrides.site_public_url.as_ref() {
            self.site.public_url = Some(url.clone());
        }
        if let Some(ttl) = overrides.sitemap_cache_ttl_seconds {
            self.sitemap.cache_ttl_seconds = Some(ttl);
        }
        if let Some(max) = overrides.sitemap_cache_max_entries {
            self.sitemap.cache_max_entries = Some(max);
        }
        if let Some(tracking) = overrides.redirects_hit_tracking {
            self.redirects.hit_tracking = Some(tracking);
        }
    }

    fn apply_database_override(&mut self, overrides: &DatabaseOverride) {
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            database,
            site,
            sitemap,
            redirects,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            database: build_database_settings(database)?,
            site: build_site_settings(site)?,
            sitemap: build_sitemap_settings(sitemap)?,
            redirects: build_redirect_settings(redirects)?,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());
    let admin_host = server
        .admin_host
        .unwrap_or_else(|| DEFAULT_ADMIN_HOST.to_string());

    let public_port = server.public_port.unwrap_or(DEFAULT_PUBLIC_PORT);
    if public_port == 0 {
        return Err(LoadError::invalid(
            "server.public_port",
            "port must be greater than zero",
        ));
    }

    let admin_port = server.admin_port.unwrap_or(DEFAULT_ADMIN_PORT);
    if admin_port == 0 {
        return Err(LoadError::invalid(
            "server.admin_port",
            "port must be greater than zero",
        ));
    }

    let public_addr = parse_socket_addr(&host, public_port)
        .map_err(|reason| LoadError::invalid("server.public_addr", reason))?;
    let admin_addr = parse_socket_addr(&admin_host, admin_port)
        .map_err(|reason| LoadError::invalid("server.admin_addr", reason))?;
    if public_addr == admin_addr {
        return Err(LoadError::invalid(
            "server.admin_port",
            "admin listener must not share the public address",
        ));
    }

    let graceful_secs = server
        .graceful_shutdown_seconds
        .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS);
    if graceful_secs == 0 {
        return Err(LoadError::invalid(
            "server.graceful_shutdown_seconds",
            "must be greater than zero",
        ));
    }

    Ok(ServerSettings {
        public_addr,
        admin_addr,
        graceful_shutdown: Duration::from_secs(graceful_secs),
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_database_settings(database: RawDatabaseSettings) -> Result<DatabaseSettings, LoadError> {
    let url = database.url.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    });

    let max_connections = non_zero_u32(
        database
            .max_connections
            .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS)
            .into(),
        "database.max_connections",
    )?;

    Ok(DatabaseSettings {
        url,
        max_connections,
    })
}

fn build_site_settings(site: RawSiteSettings) -> Result<SiteSettings, LoadError> {
    let public_url = parse_base_url(
        site.public_url.as_deref().unwrap_or(DEFAULT_PUBLIC_URL),
        "site.public_url",
    )?;
    let admin_url = parse_base_url(
        site.admin_url.as_deref().unwrap_or(DEFAULT_ADMIN_URL),
        "site.admin_url",
    )?;

    let iso2 = site
        .default_language
        .iso2
        .unwrap_or_else(|| DEFAULT_LANGUAGE_ISO2.to_string());
    if !is_valid_iso2(iso2.trim()) {
        return Err(LoadError::invalid(
            "site.default_language.iso2",
            format!("`{iso2}` is not a two-letter language code"),
        ));
    }
    let native_name = site
        .default_language
        .native_name
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_LANGUAGE_NAME.to_string());

    Ok(SiteSettings {
        public_url,
        admin_url,
        default_language: LanguageMarker::new(iso2.trim(), native_name.trim()).as_default(),
    })
}

fn build_sitemap_settings(sitemap: RawSitemapSettings) -> Result<SitemapCacheSettings, LoadError> {
    let ttl_secs = sitemap
        .cache_ttl_seconds
        .unwrap_or(DEFAULT_SITEMAP_CACHE_TTL_SECS);
    if ttl_secs == 0 {
        return Err(LoadError::invalid(
            "sitemap.cache_ttl_seconds",
            "must be greater than zero",
        ));
    }

    let cache_max_entries = NonZeroUsize::new(
        sitemap
            .cache_max_entries
            .unwrap_or(DEFAULT_SITEMAP_CACHE_MAX_ENTRIES),
    )
    .ok_or_else(|| LoadError::invalid("sitemap.cache_max_entries", "must be greater than zero"))?;

    let stylesheet_max_age = Duration::from_secs(
        sitemap
            .stylesheet_max_age_seconds
            .unwrap_or(DEFAULT_STYLESHEET_MAX_AGE_SECS),
    );

    Ok(SitemapCacheSettings {
        cache_ttl: Duration::from_secs(ttl_secs),
        cache_max_entries,
        stylesheet_max_age,
    })
}

fn build_redirect_settings(redirects: RawRedirectSettings) -> Result<RedirectSettings, LoadError> {
    let max_rules = redirects.max_rules.unwrap_or(DEFAULT_REDIRECTS_MAX_RULES);
    if max_rules == 0 || max_rules > crate::domain::redirects::MAX_REDIRECTS {
        return Err(LoadError::invalid(
            "redirects.max_rules",
            format!(
                "must be between 1 and {}",
                crate::domain::redirects::MAX_REDIRECTS
            ),
        ));
    }

    Ok(RedirectSettings {
        max_rules,
        hit_tracking: redirects.hit_tracking.unwrap_or(true),
    })
}

fn parse_base_url(value: &str, key: &'static str) -> Result<Url, LoadError> {
    let url = Url::parse(value.trim())
        .map_err(|err| LoadError::invalid(key, format!("failed to parse `{value}`: {err}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(LoadError::invalid(key, "scheme must be http or https"));
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err(LoadError::invalid(
            key,
            "base url must not carry a query or fragment",
        ));
    }
    Ok(url)
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = if host.contains(':') && !host.starts_with('[') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    };
    candidate
        .parse::<SocketAddr>()
        .map_err(|err| format!("failed to parse `{candidate}`: {err}"))
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    let value = u32::try_from(value)
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range"))?;
    NonZeroU32::new(value).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    admin_host: Option<String>,
    public_port: Option<u16>,
    admin_port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDatabaseSettings {
    url: Option<String>,
    max_connections: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSiteSettings {
    public_url: Option<String>,
    admin_url: Option<String>,
    default_language: RawLanguageSettings,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLanguageSettings {
    iso2: Option<String>,
    native_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSitemapSettings {
    cache_ttl_seconds: Option<u64>,
    cache_max_entries: Option<usize>,
    stylesheet_max_age_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRedirectSettings {
    max_rules: Option<usize>,
    hit_tracking: Option<bool>,
}

#[cfg(test)]
mod tests;
