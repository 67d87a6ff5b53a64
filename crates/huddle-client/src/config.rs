//! Client configuration loaded from environment variables.
//!
//! Every setting has a default pointing at a local development backend, so
//! the client starts with zero configuration.

use std::time::Duration;

use huddle_shared::constants::{
    DEFAULT_API_URL, DEFAULT_BOTTOM_THRESHOLD_PX, DEFAULT_HTTP_TIMEOUT_SECS, DEFAULT_PAGE_SIZE,
    DEFAULT_PUSH_RECONNECT_SECS,
};

use crate::feed::FeedSettings;

#[derive(Debug, Clone, PartialEq)]
pub struct FeedConfig {
    /// REST base URL.
    /// Env: `HUDDLE_API_URL`
    /// Default: `http://127.0.0.1:8080/api`
    pub api_url: String,

    /// SSE push endpoint.
    /// Env: `HUDDLE_PUSH_URL`
    /// Default: `<api_url>/events`
    pub push_url: String,

    /// Bearer token sent with every request.
    /// Env: `HUDDLE_API_TOKEN`
    /// Default: none.
    pub api_token: Option<String>,

    /// Messages per page, at least 1.
    /// Env: `HUDDLE_PAGE_SIZE`
    /// Default: `20`
    pub page_size: usize,

    /// Env: `HUDDLE_BOTTOM_THRESHOLD_PX`
    /// Default: `100`
    pub bottom_threshold: f64,

    /// Env: `HUDDLE_HTTP_TIMEOUT_SECS`
    /// Default: `15`
    pub http_timeout: Duration,

    /// Env: `HUDDLE_PUSH_RECONNECT_SECS`
    /// Default: `3`
    pub push_reconnect_delay: Duration,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            push_url: default_push_url(DEFAULT_API_URL),
            api_token: None,
            page_size: DEFAULT_PAGE_SIZE,
            bottom_threshold: DEFAULT_BOTTOM_THRESHOLD_PX,
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            push_reconnect_delay: Duration::from_secs(DEFAULT_PUSH_RECONNECT_SECS),
        }
    }
}

fn default_push_url(api_url: &str) -> String {
    format!("{}/events", api_url.trim_end_matches('/'))
}

impl FeedConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) over an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup("HUDDLE_API_URL").filter(|v| !v.trim().is_empty()) {
            config.api_url = url.trim().to_string();
        }

        config.push_url = match lookup("HUDDLE_PUSH_URL").filter(|v| !v.trim().is_empty()) {
            Some(url) => url.trim().to_string(),
            None => default_push_url(&config.api_url),
        };

        if let Some(token) = lookup("HUDDLE_API_TOKEN") {
            if !token.is_empty() {
                config.api_token = Some(token);
            }
        }

        if let Some(val) = lookup("HUDDLE_PAGE_SIZE") {
            match val.parse::<usize>() {
                Ok(n) if n >= 1 => config.page_size = n,
                _ => tracing::warn!(value = %val, "Invalid HUDDLE_PAGE_SIZE, using default"),
            }
        }

        if let Some(val) = lookup("HUDDLE_BOTTOM_THRESHOLD_PX") {
            match val.parse::<f64>() {
                Ok(px) if px.is_finite() && px >= 0.0 => config.bottom_threshold = px,
                _ => tracing::warn!(
                    value = %val,
                    "Invalid HUDDLE_BOTTOM_THRESHOLD_PX, using default"
                ),
            }
        }

        if let Some(val) = lookup("HUDDLE_HTTP_TIMEOUT_SECS") {
            match val.parse::<u64>() {
                Ok(secs) if secs > 0 => config.http_timeout = Duration::from_secs(secs),
                _ => tracing::warn!(value = %val, "Invalid HUDDLE_HTTP_TIMEOUT_SECS, using default"),
            }
        }

        if let Some(val) = lookup("HUDDLE_PUSH_RECONNECT_SECS") {
            if let Ok(secs) = val.parse::<u64>() {
                config.push_reconnect_delay = Duration::from_secs(secs);
            } else {
                tracing::warn!(value = %val, "Invalid HUDDLE_PUSH_RECONNECT_SECS, using default");
            }
        }

        config
    }

    pub fn feed_settings(&self) -> FeedSettings {
        FeedSettings {
            page_size: self.page_size,
            bottom_threshold: self.bottom_threshold,
        }
    }
}
