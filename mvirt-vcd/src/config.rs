//! Client and task-wait configuration.

use std::time::Duration;

use clap::Args;

use crate::task::WaitOptions;

/// Connection settings for a VCD endpoint.
#[derive(Debug, Clone)]
pub struct VcdConfig {
    /// API root, e.g. `https://vcd.example.com/api`.
    pub endpoint: String,
    pub api_version: String,
    /// Pre-obtained session token.
    pub token: Option<String>,
    pub accept_invalid_certs: bool,
    pub request_timeout: Duration,
    /// Org used when a resource does not name one.
    pub default_org: Option<String>,
    /// VDC used when a resource does not name one.
    pub default_vdc: Option<String>,
}

impl Default for VcdConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://localhost/api".to_string(),
            api_version: "31.0".to_string(),
            token: None,
            accept_invalid_certs: false,
            request_timeout: Duration::from_secs(60),
            default_org: None,
            default_vdc: None,
        }
    }
}

/// Command-line / environment form of [`VcdConfig`] and [`WaitOptions`].
#[derive(Args, Debug, Clone)]
pub struct ConnectionArgs {
    /// VCD API root (e.g., https://vcd.example.com/api)
    #[arg(long, env = "VCD_URL")]
    pub url: String,

    /// API version sent in the Accept header
    #[arg(long, env = "VCD_API_VERSION", default_value = "31.0")]
    pub api_version: String,

    /// Session token
    #[arg(long, env = "VCD_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Skip TLS certificate verification
    #[arg(long, env = "VCD_ALLOW_UNVERIFIED_SSL")]
    pub allow_unverified_ssl: bool,

    /// Default org for resources that don't set one
    #[arg(long, env = "VCD_ORG")]
    pub org: Option<String>,

    /// Default VDC for resources that don't set one
    #[arg(long, env = "VCD_VDC")]
    pub vdc: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long, default_value = "60")]
    pub request_timeout: u64,

    /// Maximum time to wait for a remote task, in seconds
    #[arg(long, env = "VCD_TASK_TIMEOUT", default_value = "600")]
    pub task_timeout: u64,

    /// Initial task poll interval in milliseconds
    #[arg(long, default_value = "1000", value_parser = clap::value_parser!(u64).range(1..))]
    pub poll_interval_ms: u64,

    /// Upper bound for the task poll interval in milliseconds
    #[arg(long, default_value = "10000", value_parser = clap::value_parser!(u64).range(1..))]
    pub max_poll_interval_ms: u64,
}

impl ConnectionArgs {
    pub fn vcd_config(&self) -> VcdConfig {
        VcdConfig {
            endpoint: self.url.clone(),
            api_version: self.api_version.clone(),
            token: self.token.clone(),
            accept_invalid_certs: self.allow_unverified_ssl,
            request_timeout: Duration::from_secs(self.request_timeout),
            default_org: self.org.clone(),
            default_vdc: self.vdc.clone(),
        }
    }

    pub fn wait_options(&self) -> WaitOptions {
        WaitOptions {
            timeout: Duration::from_secs(self.task_timeout),
            initial_interval: Duration::from_millis(self.poll_interval_ms),
            max_interval: Duration::from_millis(self.max_poll_interval_ms),
            ..WaitOptions::default()
        }
    }
}
