use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};

/// Command-line arguments for the Waymark binary.
#[derive(Debug, Parser)]
#[command(name = "waymark", version, about = "Waymark sitemap and redirect server")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "WAYMARK_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the public and admin HTTP listeners.
    Serve(Box<ServeArgs>),
    /// Export or import the redirect rule list as JSON.
    #[command(name = "redirects")]
    Redirects(RedirectsArgs),
    /// Print the admin preview tree (languages x kinds with counts) as JSON.
    #[command(name = "tree")]
    Tree(TreeArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct DatabaseOverride {
    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    /// Serve from the in-memory store instead of Postgres.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub memory: bool,

    /// JSON seed file loaded into the in-memory store.
    #[arg(long, value_name = "FILE", value_hint = ValueHint::FilePath, requires = "memory")]
    pub seed: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    /// Override the public listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the administrative listener host.
    #[arg(long = "server-admin-host", value_name = "HOST")]
    pub server_admin_host: Option<String>,

    /// Override the public listener port.
    #[arg(long = "server-public-port", value_name = "PORT")]
    pub public_port: Option<u16>,

    /// Override the administrative listener port.
    #[arg(long = "server-admin-port", value_name = "PORT")]
    pub admin_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,

    /// Override the database pool size.
    #[arg(long = "database-max-connections", value_name = "COUNT")]
    pub database_max_connections: Option<u32>,

    /// Override the public base URL used in sitemap locations.
    #[arg(long = "site-public-url", value_name = "URL")]
    pub site_public_url: Option<String>,

    /// Override the sitemap cache lifetime.
    #[arg(long = "sitemap-cache-ttl-seconds", value_name = "SECONDS")]
    pub sitemap_cache_ttl_seconds: Option<u64>,

    /// Override the number of cached sitemap documents.
    #[arg(long = "sitemap-cache-max-entries", value_name = "COUNT")]
    pub sitemap_cache_max_entries: Option<usize>,

    /// Toggle redirect hit counting.
    #[arg(
        long = "redirects-hit-tracking",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub redirects_hit_tracking: Option<bool>,
}

#[derive(Debug, Args, Clone)]
pub struct RedirectsArgs {
    #[command(subcommand)]
    pub command: RedirectsCommand,
}

#[derive(Debug, Subcommand, Clone)]
pub enum RedirectsCommand {
    /// Write the stored rule list to FILE.
    #[command(name = "export")]
    Export(RedirectFileArgs),
    /// Replace the stored rule list with the contents of FILE.
    #[command(name = "import")]
    Import(RedirectFileArgs),
}

#[derive(Debug, Args, Clone)]
pub struct RedirectFileArgs {
    #[command(flatten)]
    pub database: DatabaseOverride,

    /// JSON file holding `[{from, to, type, hits}]`.
    #[arg(value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub file: PathBuf,
}

#[derive(Debug, Args, Default, Clone)]
pub struct TreeArgs {
    #[command(flatten)]
    pub database: DatabaseOverride,
}
