use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};

/// Command-line arguments for the Vellum binary.
#[derive(Debug, Parser)]
#[command(name = "vellum", version, about = "Vellum template-driven page server")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "VELLUM_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the public and administrative HTTP listeners.
    Serve(Box<ServeArgs>),
    /// Compile a template file and report syntax errors.
    #[command(name = "validate-template")]
    ValidateTemplate(ValidateTemplateArgs),
    /// Render a template file against JSON data and print the HTML.
    #[command(name = "render-preview")]
    RenderPreview(RenderPreviewArgs),
    /// Apply pending database migrations.
    Migrate(MigrateArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct DatabaseOverride {
    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub cache: CacheOverrides,

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

    /// Override the site name shown on listings.
    #[arg(long = "site-name", value_name = "NAME")]
    pub site_name: Option<String>,

    /// Override the number of posts listed on the homepage.
    #[arg(long = "site-homepage-size", value_name = "COUNT")]
    pub homepage_size: Option<u32>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct CacheOverrides {
    /// Toggle the compiled-template cache.
    #[arg(
        long = "cache-enable-template-cache",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub enable_template_cache: Option<bool>,

    /// Toggle the rendered-page cache.
    #[arg(
        long = "cache-enable-page-cache",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub enable_page_cache: Option<bool>,

    /// Select the page cache backend (memory|redis).
    #[arg(long = "cache-page-backend", value_name = "BACKEND")]
    pub page_backend: Option<String>,

    /// Override the Redis URL used by the redis page backend.
    #[arg(long = "cache-redis-url", value_name = "URL")]
    pub redis_url: Option<String>,

    /// Override the rendered-page TTL.
    #[arg(long = "cache-page-ttl-seconds", value_name = "SECONDS")]
    pub page_ttl_secs: Option<u64>,
}

#[derive(Debug, Args, Clone)]
pub struct ValidateTemplateArgs {
    /// Template file to compile.
    #[arg(value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub file: PathBuf,
}

#[derive(Debug, Args, Clone)]
pub struct RenderPreviewArgs {
    /// Template file to render.
    #[arg(value_name = "TEMPLATE", value_hint = ValueHint::FilePath)]
    pub template: PathBuf,

    /// JSON file providing the render context.
    #[arg(long = "data", value_name = "JSON", value_hint = ValueHint::FilePath)]
    pub data: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct MigrateArgs {
    #[command(flatten)]
    pub database: DatabaseOverride,
}
