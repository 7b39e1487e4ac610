use std::{path::Path, process, sync::Arc, time::Duration};

use tokio::sync::watch;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;
use waymark::{
    application::{error::AppError, redirects::ImportRule},
    config,
    infra::{
        bootstrap::{ApplicationContext, Repositories, ServiceSettings, build_application_context},
        db::PostgresRepositories,
        error::InfraError,
        http,
        memory::MemorySeed,
        telemetry,
    },
};

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let cli_args = <config::CliArgs as clap::Parser>::parse();
    let settings = config::load(&cli_args)
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(args) => run_serve(settings, *args).await,
        config::Command::Redirects(args) => match args.command {
            config::RedirectsCommand::Export(file) => run_export_redirects(settings, &file.file).await,
            config::RedirectsCommand::Import(file) => run_import_redirects(settings, &file.file).await,
        },
        config::Command::Tree(_) => run_tree(settings).await,
    }
}

async fn run_serve(settings: config::Settings, args: config::ServeArgs) -> Result<(), AppError> {
    let repositories = if args.memory {
        let seed = match args.seed.as_deref() {
            Some(path) => MemorySeed::load(path).await?,
            None => MemorySeed::default(),
        };
        info!(
            target = "waymark::serve",
            content = seed.content.len(),
            terms = seed.terms.len(),
            authors = seed.authors.len(),
            "serving from the in-memory store"
        );
        Repositories::memory(&seed.into_repositories())
    } else {
        Repositories::postgres(init_postgres(&settings).await?)
    };

    let app = build_application_context(repositories, &ServiceSettings::from(&settings));
    serve_http(&settings, app).await
}

async fn run_export_redirects(settings: config::Settings, path: &Path) -> Result<(), AppError> {
    let app = postgres_context(&settings).await?;
    let rules = app
        .api_state
        .redirects
        .export()
        .await
        .map_err(|err| AppError::unexpected(err.to_string()))?;

    let json = serde_json::to_vec_pretty(&rules)
        .map_err(|err| AppError::unexpected(format!("failed to encode redirects: {err}")))?;
    tokio::fs::write(path, json).await.map_err(InfraError::from)?;

    info!(
        target = "waymark::redirects::export",
        path = %path.display(),
        count = rules.len(),
        "Export completed"
    );
    Ok(())
}

async fn run_import_redirects(settings: config::Settings, path: &Path) -> Result<(), AppError> {
    let raw = tokio::fs::read(path).await.map_err(InfraError::from)?;
    let entries: Vec<ImportRule> = serde_json::from_slice(&raw).map_err(|err| {
        AppError::validation(format!("{} is not a redirect list: {err}", path.display()))
    })?;

    let app = postgres_context(&settings).await?;
    let count = app
        .api_state
        .redirects
        .import(entries)
        .await
        .map_err(|err| AppError::validation(err.to_string()))?;

    info!(
        target = "waymark::redirects::import",
        path = %path.display(),
        count,
        "Import completed"
    );
    Ok(())
}

async fn run_tree(settings: config::Settings) -> Result<(), AppError> {
    let app = postgres_context(&settings).await?;
    let tree = app
        .api_state
        .sitemap
        .tree()
        .await
        .map_err(|err| AppError::unexpected(err.to_string()))?;
    let json = serde_json::to_string_pretty(&tree)
        .map_err(|err| AppError::unexpected(format!("failed to encode tree: {err}")))?;
    println!("{json}");
    Ok(())
}

async fn postgres_context(settings: &config::Settings) -> Result<ApplicationContext, AppError> {
    let repositories = Repositories::postgres(init_postgres(settings).await?);
    Ok(build_application_context(
        repositories,
        &ServiceSettings::from(settings),
    ))
}

async fn init_postgres(settings: &config::Settings) -> Result<Arc<PostgresRepositories>, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))?;

    let pool = PostgresRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(InfraError::from)?;
    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(InfraError::from)?;

    Ok(Arc::new(PostgresRepositories::new(pool)))
}

async fn serve_http(settings: &config::Settings, app: ApplicationContext) -> Result<(), AppError> {
    let public_router = http::build_router(app.http_state);
    let admin_router = http::build_api_router(app.api_state);

    let public_listener = tokio::net::TcpListener::bind(settings.server.public_addr)
        .await
        .map_err(InfraError::from)?;
    let admin_listener = tokio::net::TcpListener::bind(settings.server.admin_addr)
        .await
        .map_err(InfraError::from)?;
    info!(
        target = "waymark::serve",
        public = %settings.server.public_addr,
        admin = %settings.server.admin_addr,
        "listeners bound"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        wait_for_signal().await;
        let _ = shutdown_tx.send(true);
    });

    let public_server = axum::serve(public_listener, public_router.into_make_service())
        .with_graceful_shutdown(shutdown_requested(shutdown_rx.clone()));
    let admin_server = axum::serve(admin_listener, admin_router.into_make_service())
        .with_graceful_shutdown(shutdown_requested(shutdown_rx.clone()));
    let servers = futures::future::try_join(
        async move { public_server.await },
        async move { admin_server.await },
    );

    let grace = settings.server.graceful_shutdown;
    tokio::select! {
        result = servers => {
            result.map_err(|err| AppError::unexpected(format!("server error: {err}")))?;
        }
        () = grace_expired(shutdown_rx, grace) => {
            warn!(
                target = "waymark::serve",
                grace_seconds = grace.as_secs(),
                "graceful shutdown timed out, dropping open connections"
            );
        }
    }

    info!(target = "waymark::serve", "shutdown complete");
    Ok(())
}

async fn shutdown_requested(mut rx: watch::Receiver<bool>) {
    let _ = rx.wait_for(|requested| *requested).await;
}

async fn grace_expired(rx: watch::Receiver<bool>, grace: Duration) {
    shutdown_requested(rx).await;
    tokio::time::sleep(grace).await;
}

async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(target = "waymark::serve", error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(target = "waymark::serve", error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    info!(target = "waymark::serve", "shutdown signal received");
}
