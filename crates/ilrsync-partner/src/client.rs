//! Partner HTTP client
//!
//! Posts funding records to `{base_url}{summary_path}?academicYear=&period=`
//! as a JSON array.
//!
//! ## Error mapping
//!
//! | Response            | Error                                   |
//! |---------------------|-----------------------------------------|
//! | 2xx                 | none                                    |
//! | 4xx                 | `PipelineError::PartnerApi(description)` |
//! | 5xx / other         | `PartnerError::ServerError`             |
//! | transport failure   | `PartnerError::NetworkError`            |
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use ilrsync_partner::PartnerClient;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client = PartnerClient::new(
//!     "https://partner.example.org",
//!     "/api/v1/skills/fundingSummary",
//!     Duration::from_secs(30),
//! )?;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use anyhow::Result;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use tracing::{debug, info, warn};

use ilrsync_core::domain::{FundingRecord, PipelineError};
use ilrsync_core::ports::IPartnerApi;

use crate::PartnerError;

/// Structured error body returned by the partner on client errors
#[derive(Debug, Deserialize)]
struct PartnerErrorBody {
    description: Option<String>,
}

// ============================================================================
// PartnerClient
// ============================================================================

/// HTTP client for the partner API
pub struct PartnerClient {
    client: Client,
    base_url: String,
    summary_path: String,
}

impl PartnerClient {
    /// Creates a client with a request timeout
    ///
    /// # Arguments
    /// * `base_url` - Partner base URL, e.g. `https://partner.example.org`
    /// * `summary_path` - Path of the funding summary endpoint
    /// * `timeout` - Bound on each request
    ///
    /// # Errors
    /// Returns `PartnerError::NotConfigured` for an empty base URL, or a
    /// network error if the HTTP client cannot be built.
    pub fn new(
        base_url: impl Into<String>,
        summary_path: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, PartnerError> {
        let base_url = base_url.into();
        if base_url.trim().is_empty() {
            return Err(PartnerError::NotConfigured);
        }
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            summary_path: summary_path.into(),
        })
    }

    /// Creates a client with a custom base URL and default settings (useful for testing)
    pub fn with_base_url(base_url: impl Into<String>, summary_path: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            summary_path: summary_path.into(),
        }
    }

    /// Returns the base URL used by this client
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Creates a request builder for an endpoint path
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        self.client.request(method, &url)
    }

    /// Converts a non-success response into the matching error
    async fn error_from(response: Response) -> anyhow::Error {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if status.is_client_error() {
            let description = serde_json::from_str::<PartnerErrorBody>(&body)
                .ok()
                .and_then(|b| b.description)
                .unwrap_or_else(|| describe_status(status, &body));
            warn!(status = %status, description = %description, "Partner rejected request");
            return PipelineError::PartnerApi(description).into();
        }

        warn!(status = %status, "Partner request failed");
        PartnerError::ServerError {
            status: status.as_u16(),
            body,
        }
        .into()
    }
}

fn describe_status(status: StatusCode, body: &str) -> String {
    if body.trim().is_empty() {
        status.to_string()
    } else {
        format!("{}: {}", status, body.trim())
    }
}

#[async_trait::async_trait]
impl IPartnerApi for PartnerClient {
    #[tracing::instrument(skip(self, records), fields(records = records.len()))]
    async fn push_funding_summary(
        &self,
        academic_year: i32,
        period: u32,
        records: &[FundingRecord],
    ) -> Result<()> {
        debug!(path = %self.summary_path, "Posting funding summary");

        let response = self
            .request(Method::POST, &self.summary_path)
            .query(&[
                ("academicYear", academic_year.to_string()),
                ("period", period.to_string()),
            ])
            .json(records)
            .send()
            .await
            .map_err(PartnerError::from)?;

        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }

        info!(academic_year, period, "Partner accepted funding summary");
        Ok(())
    }
}
