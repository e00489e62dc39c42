use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};

/// Command-line arguments for the Spindle binary.
#[derive(Debug, Parser)]
#[command(name = "spindle", version, about = "Streaming component page renderer")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "SPINDLE_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Serve page documents over HTTP.
    Serve(Box<ServeArgs>),
    /// Render a single page document to standard output.
    Render(RenderArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Clone)]
pub struct RenderArgs {
    #[command(flatten)]
    pub overrides: RenderOverrides,

    /// Page document to render.
    #[arg(value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub file: PathBuf,
}

#[derive(Debug, Args, Default, Clone)]
pub struct RenderOverrides {
    /// Stream page output instead of buffering it.
    #[arg(
        long = "render-streaming",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub streaming: Option<bool>,

    /// Omit the newline after injected doctypes.
    #[arg(
        long = "render-compress-html",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub compress_html: Option<bool>,

    /// Override the directory page documents are loaded from.
    #[arg(long = "render-pages-dir", value_name = "PATH", value_hint = ValueHint::DirPath)]
    pub pages_dir: Option<PathBuf>,

    /// Toggle literal pooling in render queues.
    #[arg(
        long = "queue-pool-enabled",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub pool_enabled: Option<bool>,

    /// Override the maximum number of pooled literals per render.
    #[arg(long = "queue-pool-size", value_name = "COUNT")]
    pub pool_size: Option<u64>,

    /// Toggle pool statistics and their metrics.
    #[arg(
        long = "queue-pool-stats",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub pool_stats: Option<bool>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub render: RenderOverrides,

    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

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
}
