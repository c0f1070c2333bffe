//! HTTP/HTTPS stream source
//!
//! Each [`HttpSource`] owns its own `reqwest` client so header and TLS
//! policy are scoped to that source alone. In particular
//! [`HttpOptions::accept_invalid_certs`] disables certificate validation
//! for this source's requests only - there is no process-wide toggle, so
//! one session's opt-in can never leak into another's transfers.
//!
//! The transport-level connect timeout lives here; the session itself
//! imposes no blanket timeouts on transfers.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header;
use tracing::{debug, warn};

use super::{SourceStream, StreamSource};
use crate::core::UpdateError;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Per-source HTTP behavior
#[derive(Debug, Clone, Default)]
pub struct HttpOptions {
    /// `User-Agent` header; defaults to `upkit/<version>` when unset
    pub user_agent: Option<String>,
    /// `Referer` header sent with every request from this source
    pub referer: Option<String>,
    /// Skip TLS certificate validation for this source's requests.
    ///
    /// An explicit, per-construction opt-in for servers with self-signed
    /// certificates. Never enabled by default.
    pub accept_invalid_certs: bool,
}

/// HTTP-backed stream source
///
/// Reusable: every [`StreamSource::open`] issues a fresh GET over the same
/// client.
pub struct HttpSource {
    url: String,
    referer: Option<String>,
    client: reqwest::Client,
}

impl HttpSource {
    /// Build a source for `url` with the given options.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::Network`] when the HTTP client cannot be
    /// constructed.
    pub fn new(url: String, options: HttpOptions) -> Result<Self, UpdateError> {
        let user_agent = options
            .user_agent
            .unwrap_or_else(|| format!("upkit/{}", env!("CARGO_PKG_VERSION")));

        let mut builder = reqwest::Client::builder()
            .user_agent(user_agent)
            .connect_timeout(CONNECT_TIMEOUT);
        if options.accept_invalid_certs {
            warn!(url = %url, "TLS certificate validation disabled for this source");
            builder = builder.danger_accept_invalid_certs(true);
        }

        let client = builder.build().map_err(|e| UpdateError::Network {
            operation: "create HTTP client".to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            url,
            referer: options.referer,
            client,
        })
    }

    /// The URL this source fetches
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl StreamSource for HttpSource {
    async fn open(&self) -> Result<SourceStream, UpdateError> {
        debug!(url = %self.url, "opening HTTP stream");

        let mut request = self.client.get(&self.url);
        if let Some(referer) = &self.referer {
            request = request.header(header::REFERER, referer);
        }

        let response = request.send().await.map_err(|e| UpdateError::Network {
            operation: format!("fetch {}", self.url),
            reason: e.to_string(),
        })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(UpdateError::NotFound {
                what: self.url.clone(),
            });
        }
        if !status.is_success() {
            return Err(UpdateError::Network {
                operation: format!("fetch {}", self.url),
                reason: format!("HTTP status {status}"),
            });
        }

        Ok(SourceStream::from_response(response, self.description()))
    }

    fn description(&self) -> String {
        self.url.clone()
    }
}
