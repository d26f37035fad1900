//! ilrsync Partner - Partner API client
//!
//! Provides the async HTTP client that pushes funding summaries to the
//! partner system and implements the `IPartnerApi` port.
//!
//! ## Modules
//!
//! - [`client`] - Partner HTTP client

pub mod client;

pub use client::PartnerClient;

use thiserror::Error;

/// Errors that can occur when communicating with the partner API
///
/// Client errors (4xx) are not represented here: they surface as
/// [`PipelineError::PartnerApi`](ilrsync_core::domain::PipelineError::PartnerApi)
/// with the partner's description.
#[derive(Debug, Error)]
pub enum PartnerError {
    /// The partner base URL is not configured
    #[error("Partner base URL is not configured")]
    NotConfigured,

    /// A server-side error occurred (5xx)
    #[error("Partner server error {status}: {body}")]
    ServerError {
        /// HTTP status code
        status: u16,
        /// Response body, as returned
        body: String,
    },

    /// A network-level error occurred
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),
}
