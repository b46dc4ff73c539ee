//! Log setup for the console. Filters are built around the SDK's
//! `monitor.*` targets so one component can be traced without opening up
//! the socket and HTTP libraries underneath it.

use std::fs::OpenOptions;
use std::path::PathBuf;

use clap::ValueEnum;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Replaces the computed filter entirely when set.
pub const FILTER_ENV: &str = "MONITOR_LOG_FILTER";

/// Dependencies that stay at `info` however verbose the console gets.
const TRANSPORT_TARGETS: &[&str] = &["tungstenite", "tokio_tungstenite", "hyper", "reqwest", "rustls"];

#[derive(Clone, Copy, Debug, Default, ValueEnum, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Error,
    #[default]
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn directive(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// SDK components that can be traced on their own.
#[derive(Clone, Copy, Debug, ValueEnum, PartialEq, Eq)]
pub enum Component {
    Channel,
    Dispatch,
    Query,
    Console,
}

impl Component {
    fn target(self) -> &'static str {
        match self {
            Component::Channel => "monitor.channel",
            Component::Dispatch => "monitor.dispatch",
            Component::Query => "monitor.query",
            Component::Console => "monitor.console",
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct LogConfig {
    pub level: LogLevel,
    pub trace: Vec<Component>,
    pub file: Option<PathBuf>,
}

#[derive(thiserror::Error, Debug)]
pub enum InitError {
    #[error("failed to open log file {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid {FILTER_ENV} value: {0}")]
    Filter(String),
    #[error("failed to install logger: {0}")]
    Install(String),
}

/// Directive string for `config`: the base level, transport libraries
/// capped at `info`, then any components raised to `trace`.
pub fn directives(config: &LogConfig) -> String {
    let mut out = config.level.directive().to_string();
    if config.level >= LogLevel::Debug || !config.trace.is_empty() {
        for target in TRANSPORT_TARGETS {
            out.push_str(&format!(",{target}=info"));
        }
    }
    for component in &config.trace {
        out.push_str(&format!(",{}=trace", component.target()));
    }
    out
}

fn build_filter(config: &LogConfig, override_filter: Option<String>) -> Result<EnvFilter, InitError> {
    let raw = override_filter.unwrap_or_else(|| directives(config));
    EnvFilter::try_new(&raw).map_err(|err| InitError::Filter(err.to_string()))
}

/// Installs the global subscriber. Keep the guard alive for the life of the
/// process or buffered lines are lost on exit.
pub fn init(config: &LogConfig) -> Result<WorkerGuard, InitError> {
    let filter = build_filter(config, std::env::var(FILTER_ENV).ok())?;

    let (writer, guard) = match &config.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|source| InitError::Io {
                    path: path.clone(),
                    source,
                })?;
            tracing_appender::non_blocking(file)
        }
        None => tracing_appender::non_blocking(std::io::stderr()),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(config.level >= LogLevel::Debug || !config.trace.is_empty())
        .with_ansi(config.file.is_none())
        .with_writer(writer)
        .try_init()
        .map_err(|err| InitError::Install(err.to_string()))?;
    Ok(guard)
}
