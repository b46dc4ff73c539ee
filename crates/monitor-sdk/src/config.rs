use std::env;
use std::time::Duration;

use monitor_proto::SubscriptionIntent;

use crate::backoff::BackoffPolicy;
use crate::channel::ChannelConfig;
use crate::error::ConfigError;
use crate::paths::{ApiPaths, BuildMode, PageLocation};

pub const LIVE_ENDPOINT: &str = "/ws";

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// URL the dashboard is served from; API and channel URLs derive from it.
    pub dashboard_url: String,
    pub build_mode: BuildMode,
    pub request_timeout: Duration,
    pub backoff: BackoffPolicy,
    /// Application-level keep-alive while the channel is open.
    pub ping_interval: Option<Duration>,
    pub subscription: SubscriptionIntent,
}

impl ClientConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let backoff = BackoffPolicy {
            initial_delay: env_millis("MONITOR_RECONNECT_INITIAL_MS")
                .unwrap_or(defaults.backoff.initial_delay),
            max_delay: env_millis("MONITOR_RECONNECT_MAX_MS").unwrap_or(defaults.backoff.max_delay),
            jitter: env::var("MONITOR_RECONNECT_JITTER")
                .ok()
                .and_then(|val| val.parse::<f64>().ok())
                .map(|val| val.clamp(0.0, 1.0))
                .unwrap_or(defaults.backoff.jitter),
            max_attempts: env::var("MONITOR_RECONNECT_MAX_ATTEMPTS")
                .ok()
                .and_then(|val| val.parse::<u32>().ok())
                .filter(|max| *max > 0),
            ..defaults.backoff
        };
        let ping_interval = match env_millis("MONITOR_PING_INTERVAL_MS") {
            Some(interval) if interval.is_zero() => None,
            Some(interval) => Some(interval),
            None => defaults.ping_interval,
        };

        Self {
            dashboard_url: env::var("MONITOR_DASHBOARD_URL").unwrap_or(defaults.dashboard_url),
            build_mode: if env_truthy("MONITOR_DEV_MODE") {
                BuildMode::Development
            } else {
                BuildMode::Production
            },
            request_timeout: env_millis("MONITOR_HTTP_TIMEOUT_MS").unwrap_or(defaults.request_timeout),
            backoff,
            ping_interval,
            subscription: SubscriptionIntent::all(),
        }
    }

    pub fn paths(&self) -> Result<ApiPaths, ConfigError> {
        let location = PageLocation::parse(&self.dashboard_url)?;
        Ok(ApiPaths::new(location, self.build_mode))
    }

    pub fn channel_config(&self) -> Result<ChannelConfig, ConfigError> {
        Ok(ChannelConfig {
            url: self.paths()?.websocket_url(LIVE_ENDPOINT),
            subscription: self.subscription,
            backoff: self.backoff.clone(),
            ping_interval: self.ping_interval,
        })
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            dashboard_url: "http://localhost:8080/debug/ui/".to_string(),
            build_mode: BuildMode::Production,
            request_timeout: Duration::from_secs(30),
            backoff: BackoffPolicy::default(),
            ping_interval: Some(Duration::from_secs(30)),
            subscription: SubscriptionIntent::all(),
        }
    }
}

fn env_millis(key: &str) -> Option<Duration> {
    env::var(key)
        .ok()
        .and_then(|val| val.trim().parse::<u64>().ok())
        .map(Duration::from_millis)
}

fn env_truthy(key: &str) -> bool {
    match env::var(key) {
        Ok(val) => matches!(
            val.to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        ),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_channel_url_derives_from_dashboard() {
        let config = ClientConfig::default();
        let channel = config.channel_config().expect("valid default");
        assert_eq!(channel.url, "ws://localhost:8080/debug/ws");
        assert_eq!(
            config.paths().unwrap().api_url("/stats"),
            "http://localhost:8080/debug/stats"
        );
    }

    #[test]
    fn invalid_dashboard_url_is_reported() {
        let config = ClientConfig {
            dashboard_url: "::nope::".into(),
            ..Default::default()
        };
        assert!(matches!(
            config.channel_config(),
            Err(ConfigError::DashboardUrl { .. })
        ));
    }
}
