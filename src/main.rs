use std::{future::IntoFuture, path::Path, process, sync::Arc};

use tokio::{sync::watch, try_join};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;
use vellum::{
    application::{
        error::AppError,
        render::{Compiler, RenderContext},
    },
    config,
    infra::{
        app::{Application, Stores, page_backend},
        db::PostgresRepositories,
        error::InfraError,
        http, telemetry,
        memory::MemoryRepositories,
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
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::ValidateTemplate(args) => run_validate_template(&args).await,
        config::Command::RenderPreview(args) => run_render_preview(&args).await,
        config::Command::Migrate(_) => run_migrate(&settings).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let stores = init_stores(&settings).await?;
    let backend = page_backend(&settings.cache).await?;
    let app = Application::assemble(stores, backend, &settings.cache, &settings.site);

    info!(
        template_cache = settings.cache.enable_template_cache,
        page_cache = settings.cache.enable_page_cache,
        page_backend = ?settings.cache.page_backend,
        "Caches configured"
    );

    serve_http(&settings, app).await
}

async fn init_stores(settings: &config::Settings) -> Result<Stores, AppError> {
    let Some(database_url) = settings.database.url.as_deref() else {
        warn!("No database url configured; using in-memory repositories");
        return Ok(Stores::memory(Arc::new(MemoryRepositories::new())));
    };

    let pool = PostgresRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(InfraError::from)?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(InfraError::from)?;

    Ok(Stores::postgres(Arc::new(PostgresRepositories::new(pool))))
}

async fn run_validate_template(args: &config::ValidateTemplateArgs) -> Result<(), AppError> {
    let source = read_file(&args.file).await?;
    Compiler::new().compile(&source)?;
    println!("{}: ok", args.file.display());
    Ok(())
}

async fn run_render_preview(args: &config::RenderPreviewArgs) -> Result<(), AppError> {
    let source = read_file(&args.template).await?;
    let context = match args.data.as_deref() {
        Some(path) => {
            let raw = read_file(path).await?;
            let value: serde_json::Value = serde_json::from_str(&raw).map_err(|err| {
                AppError::validation(format!("invalid JSON in {}: {err}", path.display()))
            })?;
            RenderContext::from_json(value)
        }
        None => RenderContext::empty(),
    };

    let html = Compiler::new().compile(&source)?.render(&context)?;
    println!("{html}");
    Ok(())
}

async fn run_migrate(settings: &config::Settings) -> Result<(), AppError> {
    let database_url = settings
        .database
        .url
        .as_deref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))
        .map_err(AppError::from)?;

    let pool = PostgresRepositories::connect(database_url, 1)
        .await
        .map_err(InfraError::from)?;
    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(InfraError::from)?;

    info!("Migrations applied");
    Ok(())
}

async fn read_file(path: &Path) -> Result<String, AppError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|err| AppError::from(InfraError::read_file(path, err)))
}

async fn serve_http(settings: &config::Settings, app: Application) -> Result<(), AppError> {
    let public_router = http::build_router(app.http_state);
    let admin_router = http::build_admin_router(app.admin_state);

    let public_listener = tokio::net::TcpListener::bind(settings.server.public_addr)
        .await
        .map_err(|err| InfraError::bind(settings.server.public_addr, err))?;
    let admin_listener = tokio::net::TcpListener::bind(settings.server.admin_addr)
        .await
        .map_err(|err| InfraError::bind(settings.server.admin_addr, err))?;

    info!(
        public_addr = %settings.server.public_addr,
        admin_addr = %settings.server.admin_addr,
        "Listening"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("Shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    let public_server = axum::serve(public_listener, public_router.into_make_service())
        .with_graceful_shutdown(shutdown_requested(shutdown_rx.clone()))
        .into_future();
    let admin_server = axum::serve(admin_listener, admin_router.into_make_service())
        .with_graceful_shutdown(shutdown_requested(shutdown_rx.clone()))
        .into_future();

    let grace = settings.server.graceful_shutdown;
    let drain_deadline = async move {
        shutdown_requested(shutdown_rx).await;
        tokio::time::sleep(grace).await;
    };

    tokio::select! {
        result = async { try_join!(public_server, admin_server) } => {
            result.map_err(|err| AppError::unexpected(format!("server error: {err}")))?;
        }
        () = drain_deadline => {
            warn!(grace_secs = grace.as_secs(), "Graceful shutdown timed out");
        }
    }

    Ok(())
}

async fn shutdown_requested(mut rx: watch::Receiver<bool>) {
    let _ = rx.wait_for(|stopped| *stopped).await;
}

async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to listen for ctrl-c");
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
                error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
