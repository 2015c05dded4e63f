pub mod medline;
pub mod providers;
pub mod record;

pub use record::{links, ResultRecord, ERROR_ID, NO_ABSTRACT, NO_DATA_ID, NO_TITLE};

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// HTTP client configuration shared by every upstream integration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpClientConfig {
    /// Whole-request timeout in seconds, applied to every adapter
    pub timeout_secs: u64,
    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,
    /// User agent string
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            connect_timeout_secs: 5,
            user_agent: concat!(
                "evidence-monitor/",
                env!("CARGO_PKG_VERSION"),
                " (Biomedical Evidence Monitor)"
            )
            .to_string(),
        }
    }
}

impl HttpClientConfig {
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Build a `reqwest` client honouring this configuration
    pub fn build_client(&self) -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(self.timeout())
            .connect_timeout(self.connect_timeout())
            .user_agent(&self.user_agent)
            .build()
            .map_err(Error::Http)
    }
}
