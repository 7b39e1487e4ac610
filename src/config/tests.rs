use super::*;
use clap::Parser;

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = RawSettings::default();
    raw.server.public_port = Some(8080);
    raw.database.url = Some("postgres://from-file".to_string());

    let overrides = ServeOverrides {
        public_port: Some(9090),
        database_url: Some("postgres://from-cli".to_string()),
        ..Default::default()
    };
    raw.apply_serve_overrides(&overrides);

    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.server.public_addr.port(), 9090);
    assert_eq!(settings.database.url.as_deref(), Some("postgres://from-cli"));
}

#[test]
fn defaults_match_documented_values() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

    assert_eq!(settings.server.public_addr.port(), 3000);
    assert_eq!(settings.server.admin_addr.port(), 3001);
    assert_eq!(settings.server.graceful_shutdown, Duration::from_secs(30));
    assert!(matches!(settings.logging.format, LogFormat::Compact));
    assert_eq!(settings.logging.level, LevelFilter::INFO);
    assert!(settings.database.url.is_none());
    assert_eq!(settings.database.max_connections.get(), 8);
    assert_eq!(settings.sitemap.cache_ttl, Duration::from_secs(3600));
    assert_eq!(settings.sitemap.cache_max_entries.get(), 256);
    assert_eq!(settings.sitemap.stylesheet_max_age, Duration::from_secs(86_400));
    assert_eq!(settings.redirects.max_rules, 500);
    assert!(settings.redirects.hit_tracking);
    assert_eq!(settings.site.default_language.iso2, "en");
    assert!(settings.site.default_language.is_default);
}

#[test]
fn cli_json_logging_enforces_format() {
    let mut raw = RawSettings::default();
    let overrides = ServeOverrides {
        log_json: Some(true),
        log_level: Some("debug".to_string()),
        ..Default::default()
    };
    raw.apply_serve_overrides(&overrides);

    let settings = Settings::from_raw(raw).expect("valid settings");
    assert!(matches!(settings.logging.format, LogFormat::Json));
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
}

#[test]
fn rejects_unknown_log_level() {
    let mut raw = RawSettings::default();
    raw.logging.level = Some("chatty".to_string());

    let err = Settings::from_raw(raw).expect_err("invalid level");
    assert!(matches!(err, LoadError::Invalid { key: "logging.level", .. }));
}

#[test]
fn rejects_zero_ports_and_shared_addresses() {
    let mut raw = RawSettings::default();
    raw.server.public_port = Some(0);
    let err = Settings::from_raw(raw).expect_err("zero port");
    assert!(matches!(err, LoadError::Invalid { key: "server.public_port", .. }));

    let mut raw = RawSettings::default();
    raw.server.admin_port = Some(DEFAULT_PUBLIC_PORT);
    let err = Settings::from_raw(raw).expect_err("shared address");
    assert!(matches!(err, LoadError::Invalid { key: "server.admin_port", .. }));
}

#[test]
fn ipv6_hosts_are_bracketed() {
    let mut raw = RawSettings::default();
    raw.server.host = Some("::1".to_string());

    let settings = Settings::from_raw(raw).expect("valid settings");
    assert!(settings.server.public_addr.is_ipv6());
}

#[test]
fn site_urls_are_validated() {
    let mut raw = RawSettings::default();
    raw.site.public_url = Some("ftp://example.com/".to_string());
    let err = Settings::from_raw(raw).expect_err("bad scheme");
    assert!(matches!(err, LoadError::Invalid { key: "site.public_url", .. }));

    let mut raw = RawSettings::default();
    raw.site.public_url = Some("not a url".to_string());
    assert!(Settings::from_raw(raw).is_err());

    let mut raw = RawSettings::default();
    raw.site.public_url = Some("https://example.com/blog/".to_string());
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.site.public_url.as_str(), "https://example.com/blog/");
}

#[test]
fn default_language_requires_two_letter_code() {
    let mut raw = RawSettings::default();
    raw.site.default_language.iso2 = Some("eng".to_string());
    let err = Settings::from_raw(raw).expect_err("three letters");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "site.default_language.iso2",
            ..
        }
    ));

    let mut raw = RawSettings::default();
    raw.site.default_language.iso2 = Some("FR".to_string());
    raw.site.default_language.native_name = Some("Français".to_string());
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.site.default_language.iso2, "fr");
    assert_eq!(settings.site.default_language.slug, "francais");
}

#[test]
fn cache_settings_can_be_overridden_via_cli() {
    let mut raw = RawSettings::default();
    let overrides = ServeOverrides {
        sitemap_cache_ttl_seconds: Some(60),
        sitemap_cache_max_entries: Some(16),
        redirects_hit_tracking: Some(false),
        ..Default::default()
    };
    raw.apply_serve_overrides(&overrides);

    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.sitemap.cache_ttl, Duration::from_secs(60));
    assert_eq!(settings.sitemap.cache_max_entries.get(), 16);
    assert!(!settings.redirects.hit_tracking);
}

#[test]
fn cache_settings_reject_zero_values() {
    let mut raw = RawSettings::default();
    raw.sitemap.cache_max_entries = Some(0);
    assert!(Settings::from_raw(raw).is_err());

    let mut raw = RawSettings::default();
    raw.sitemap.cache_ttl_seconds = Some(0);
    assert!(Settings::from_raw(raw).is_err());
}

#[test]
fn redirect_rule_limit_is_bounded() {
    let mut raw = RawSettings::default();
    raw.redirects.max_rules = Some(501);
    let err = Settings::from_raw(raw).expect_err("above limit");
    assert!(matches!(err, LoadError::Invalid { key: "redirects.max_rules", .. }));
}

#[test]
fn default_to_serve_command() {
    let args = CliArgs::parse_from(["waymark"]);
    let command = args
        .command
        .unwrap_or(Command::Serve(Box::<ServeArgs>::default()));
    assert!(matches!(command, Command::Serve(_)));
}

#[test]
fn parse_serve_overrides() {
    let args = CliArgs::parse_from([
        "waymark",
        "serve",
        "--memory",
        "--seed",
        "/tmp/seed.json",
        "--server-host",
        "0.0.0.0",
        "--redirects-hit-tracking",
        "off",
    ]);
    match args.command.expect("serve command") {
        Command::Serve(serve) => {
            assert!(serve.memory);
            assert_eq!(
                serve.seed.as_deref(),
                Some(std::path::Path::new("/tmp/seed.json"))
            );
            assert_eq!(serve.overrides.server_host.as_deref(), Some("0.0.0.0"));
            assert_eq!(serve.overrides.redirects_hit_tracking, Some(false));
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn seed_requires_memory_flag() {
    let result = CliArgs::try_parse_from(["waymark", "serve", "--seed", "/tmp/seed.json"]);
    assert!(result.is_err());
}

#[test]
fn parse_redirect_export_arguments() {
    let args = CliArgs::parse_from([
        "waymark",
        "redirects",
        "export",
        "--database-url",
        "postgres://example",
        "/tmp/redirects.json",
    ]);
    match args.command.expect("redirects command") {
        Command::Redirects(redirects) => match redirects.command {
            RedirectsCommand::Export(export) => {
                assert_eq!(
                    export.database.database_url.as_deref(),
                    Some("postgres://example")
                );
                assert_eq!(export.file, std::path::Path::new("/tmp/redirects.json"));
            }
            RedirectsCommand::Import(_) => panic!("wrong subcommand parsed"),
        },
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn parse_tree_arguments() {
    let args = CliArgs::parse_from(["waymark", "tree", "--database-url", "postgres://example"]);
    match args.command.expect("tree command") {
        Command::Tree(tree) => {
            assert_eq!(
                tree.database.database_url.as_deref(),
                Some("postgres://example")
            );
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn config_file_sits_below_cli_flags() {
    use std::io::Write;

    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("temp config");
    writeln!(
        file,
        "[server]\npublic_port = 4100\nadmin_port = 4101\n\n[site.default_language]\niso2 = \"de\"\nnative_name = \"Deutsch\""
    )
    .expect("write config");

    let path = file.path().to_str().expect("utf-8 path").to_string();
    let cli = CliArgs::parse_from([
        "waymark",
        "--config-file",
        path.as_str(),
        "serve",
        "--server-admin-port",
        "4200",
    ]);
    let settings = load(&cli).expect("settings load");

    assert_eq!(settings.server.public_addr.port(), 4100);
    assert_eq!(settings.server.admin_addr.port(), 4200);
    assert_eq!(settings.site.default_language.iso2, "de");
    assert_eq!(settings.site.default_language.slug, "deutsch");
}

#[test]
fn missing_explicit_config_file_fails() {
    let cli = CliArgs::parse_from(["waymark", "--config-file", "/nonexistent/waymark.toml"]);
    assert!(matches!(load(&cli), Err(LoadError::Build(_))));
}
