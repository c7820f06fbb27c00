//! Executor configuration types

use crate::types::PayloadSpec;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// User-Agent attached to HTTP requests that do not set one
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";

/// Options shared by every request of one template run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ExecuterOptions {
    /// Identifier copied into every result event
    pub template_id: String,
    /// Attack type forced for every request, overriding the template
    pub attack_type: Option<String>,
    /// Candidates replacing declared payload variables
    pub vars_payload: PayloadSpec,
    pub user_agent: String,
    pub network: NetworkTimings,
    pub http: HttpClientConfig,
}

impl Default for ExecuterOptions {
    fn default() -> Self {
        Self {
            template_id: String::new(),
            attack_type: None,
            vars_payload: PayloadSpec::new(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            network: NetworkTimings::default(),
            http: HttpClientConfig::default(),
        }
    }
}

impl ExecuterOptions {
    pub fn new(template_id: &str) -> Self {
        Self {
            template_id: template_id.to_string(),
            ..Default::default()
        }
    }
}

/// Read timings of the network executor
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct NetworkTimings {
    /// Deadline for each discrete read
    pub read_timeout_ms: u64,
    /// Pause before the single drain read
    pub drain_delay_ms: u64,
    /// One-shot window for the full-drain loop
    pub read_all_window_ms: u64,
    /// Buffer size of drain reads when the request sets none
    pub read_size: usize,
    /// Deadline for establishing the connection
    pub connect_timeout_ms: u64,
}

impl Default for NetworkTimings {
    fn default() -> Self {
        Self {
            read_timeout_ms: 2_000,
            drain_delay_ms: 1_000,
            read_all_window_ms: 1_000,
            read_size: 1024,
            connect_timeout_ms: 10_000,
        }
    }
}

impl NetworkTimings {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn drain_delay(&self) -> Duration {
        Duration::from_millis(self.drain_delay_ms)
    }

    pub fn read_all_window(&self) -> Duration {
        Duration::from_millis(self.read_all_window_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

/// HTTP client defaults; the request's own redirect and cookie flags take precedence
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct HttpClientConfig {
    pub timeout_seconds: u64,
    pub follow_redirects: bool,
    pub max_redirects: usize,
    pub cookie_reuse: bool,
    /// Scanners talk to targets with self-signed certificates
    pub accept_invalid_certs: bool,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 10,
            follow_redirects: false,
            max_redirects: 10,
            cookie_reuse: false,
            accept_invalid_certs: true,
        }
    }
}

impl HttpClientConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// Redirect limit when following; zero falls back to ten
    pub fn effective_max_redirects(&self) -> usize {
        if self.max_redirects == 0 {
            10
        } else {
            self.max_redirects
        }
    }
}
