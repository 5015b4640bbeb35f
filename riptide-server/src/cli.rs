//! Command-line surface (spec.md §6 "CLI surface"): `--user`,
//! `--loglevel`, `--version` (the latter handled by `clap`'s built-in
//! `Parser::parse` via `#[command(version)]`).

use clap::Parser;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    Fatal,
    Critical,
}

impl LogLevel {
    /// The `tracing_subscriber::EnvFilter` directive this level maps to.
    /// `FATAL`/`CRITICAL` have no direct `tracing` equivalent; both fold
    /// into `error`, the closest level `tracing` actually has.
    pub fn as_filter_directive(self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warn",
            LogLevel::Error | LogLevel::Fatal | LogLevel::Critical => "error",
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "riptide-proxy", version, about = "Riptide Proxy — developer-facing reverse proxy for container-backed dev environments")]
pub struct Cli {
    /// Path to the system configuration YAML file.
    #[arg(short, long)]
    pub config: Option<String>,

    /// POSIX-only: when started as root, drop to this user's uid/gid
    /// after binding privileged ports (spec.md §6).
    #[arg(long, env = "SUDO_USER")]
    pub user: Option<String>,

    /// Log verbosity (spec.md §6).
    #[arg(long, value_enum, default_value_t = LogLevel::Info)]
    pub loglevel: LogLevel,
}
