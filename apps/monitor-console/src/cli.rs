use std::path::PathBuf;
use std::time::Duration;

use clap::{builder::BoolishValueParser, Args, Parser, Subcommand, ValueEnum};
use monitor_proto::GoroutineScope;
use monitor_sdk::{BuildMode, ClientConfig};

use crate::telemetry::{Component, LogConfig, LogLevel};

#[derive(Parser, Debug)]
#[command(
    name = "monitor-console",
    about = "Live view and queries against a runtime monitor backend",
    author,
    version
)]
pub struct Cli {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    #[command(flatten)]
    pub logging: LoggingArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ConnectionArgs {
    #[arg(
        long,
        global = true,
        env = "MONITOR_DASHBOARD_URL",
        value_name = "URL",
        help = "URL the monitor dashboard is served from; API and live channel URLs derive from it"
    )]
    pub dashboard_url: Option<String>,

    #[arg(
        long = "dev",
        global = true,
        env = "MONITOR_DEV_MODE",
        num_args = 0..=1,
        default_missing_value = "true",
        value_parser = BoolishValueParser::new(),
        value_name = "BOOL",
        help = "Use the development proxy base path (/api/debug)"
    )]
    pub dev_mode: Option<bool>,

    #[arg(
        long,
        global = true,
        env = "MONITOR_HTTP_TIMEOUT_MS",
        value_name = "MS",
        help = "Query request timeout"
    )]
    pub http_timeout_ms: Option<u64>,

    #[arg(
        long,
        global = true,
        env = "MONITOR_RECONNECT_MAX_ATTEMPTS",
        value_name = "N",
        help = "Stop reconnecting after N failed attempts (default: never)"
    )]
    pub reconnect_max_attempts: Option<u32>,

    #[arg(
        long,
        global = true,
        env = "MONITOR_PING_INTERVAL_MS",
        value_name = "MS",
        help = "Keep-alive ping interval while the live channel is open; 0 disables"
    )]
    pub ping_interval_ms: Option<u64>,
}

impl ConnectionArgs {
    /// Layers explicit arguments over the environment-derived defaults.
    pub fn apply(&self, mut config: ClientConfig) -> ClientConfig {
        if let Some(url) = &self.dashboard_url {
            config.dashboard_url = url.clone();
        }
        if let Some(dev) = self.dev_mode {
            config.build_mode = if dev {
                BuildMode::Development
            } else {
                BuildMode::Production
            };
        }
        if let Some(ms) = self.http_timeout_ms {
            config.request_timeout = Duration::from_millis(ms);
        }
        if let Some(max) = self.reconnect_max_attempts {
            config.backoff.max_attempts = (max > 0).then_some(max);
        }
        if let Some(ms) = self.ping_interval_ms {
            config.ping_interval = (ms > 0).then(|| Duration::from_millis(ms));
        }
        config
    }
}

#[derive(Args, Debug, Clone)]
pub struct LoggingArgs {
    #[arg(
        long = "log-level",
        global = true,
        value_enum,
        env = "MONITOR_LOG_LEVEL",
        default_value_t = LogLevel::Warn,
        help = "Minimum log level (error, warn, info, debug, trace)"
    )]
    pub level: LogLevel,

    #[arg(
        long = "log-file",
        global = true,
        value_name = "PATH",
        env = "MONITOR_LOG_FILE",
        help = "Write structured logs to the specified file"
    )]
    pub file: Option<PathBuf>,

    #[arg(
        long = "trace",
        global = true,
        value_enum,
        value_delimiter = ',',
        help = "Trace these components regardless of --log-level (channel, dispatch, query, console)"
    )]
    pub trace: Vec<Component>,
}

impl LoggingArgs {
    pub fn to_config(&self) -> LogConfig {
        LogConfig {
            level: self.level,
            trace: self.trace.clone(),
            file: self.file.clone(),
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Open the live channel and print the store whenever it changes
    Watch(WatchArgs),
    /// List goroutine traces, or fetch one by id
    Goroutines(GoroutineArgs),
    /// List request traces, or fetch one by id
    Requests(RequestArgs),
    /// Search request traces with a structured filter
    Search(SearchArgs),
    /// Fetch the current heap profile
    Heap,
    /// Fetch process and runtime information
    System,
    /// Fetch aggregate monitor statistics
    Stats,
    /// List live channel connections held by the backend
    Connections,
    /// Fetch the combined monitor view
    Monitor(MonitorArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct WatchArgs {
    #[arg(long, value_name = "SECS", help = "Exit after this many seconds")]
    pub duration: Option<u64>,

    #[arg(long, help = "Print the full snapshot as JSON instead of a summary")]
    pub json: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ScopeArg {
    Active,
    History,
    All,
}

impl From<ScopeArg> for GoroutineScope {
    fn from(value: ScopeArg) -> Self {
        match value {
            ScopeArg::Active => GoroutineScope::Active,
            ScopeArg::History => GoroutineScope::History,
            ScopeArg::All => GoroutineScope::All,
        }
    }
}

#[derive(Args, Debug, Clone, Default)]
pub struct GoroutineArgs {
    #[arg(long, conflicts_with_all = ["history", "scope"])]
    pub id: Option<String>,

    #[arg(long, help = "Read from the completed-goroutine history")]
    pub history: bool,

    #[arg(long, value_enum)]
    pub scope: Option<ScopeArg>,

    #[arg(long)]
    pub limit: Option<u32>,

    #[arg(long)]
    pub offset: Option<u32>,

    #[arg(long)]
    pub status: Option<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct RequestArgs {
    #[arg(long, conflicts_with_all = ["history", "active"])]
    pub id: Option<String>,

    #[arg(long, conflicts_with = "history")]
    pub active: bool,

    #[arg(long)]
    pub history: bool,

    #[arg(long)]
    pub limit: Option<u32>,

    #[arg(long, requires = "history")]
    pub method: Option<String>,

    #[arg(long, requires = "history")]
    pub status_code: Option<u16>,

    #[arg(long, requires = "history")]
    pub user_id: Option<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct SearchArgs {
    #[arg(long)]
    pub page: Option<u32>,

    #[arg(long)]
    pub page_size: Option<u32>,

    #[arg(long)]
    pub method: Option<String>,

    #[arg(long)]
    pub url: Option<String>,

    #[arg(long)]
    pub status_code: Option<u16>,

    #[arg(long)]
    pub ip: Option<String>,

    #[arg(long)]
    pub user_id: Option<String>,

    #[arg(long, value_name = "UNIX_SECS")]
    pub since: Option<i64>,

    #[arg(long, value_name = "UNIX_SECS")]
    pub until: Option<i64>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct MonitorArgs {
    #[arg(long)]
    pub goroutines: bool,

    #[arg(long)]
    pub requests: bool,

    #[arg(long)]
    pub stats: bool,

    #[arg(long)]
    pub limit: Option<u32>,
}
