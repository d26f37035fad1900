//! Runtime feature flags consumed by the pipeline

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::errors::DomainError;

/// Feature flags the pipeline reads at runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Feature {
    /// Scheduled and manual remote sync cycles
    #[serde(rename = "SFA_FTP_SYNC")]
    SfaFtpSync,
    /// Outbound pushes to the partner API
    #[serde(rename = "OPS_CONNECTION")]
    OpsConnection,
}

impl Feature {
    /// Every known feature, in display order
    pub const ALL: [Feature; 2] = [Feature::SfaFtpSync, Feature::OpsConnection];

    /// Stored name of the flag
    pub fn name(&self) -> &'static str {
        match self {
            Feature::SfaFtpSync => "SFA_FTP_SYNC",
            Feature::OpsConnection => "OPS_CONNECTION",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Feature::SfaFtpSync => "Synchronise files from the SFA SFTP drop",
            Feature::OpsConnection => "Push funding summaries to the partner API",
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Feature {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Feature::ALL
            .into_iter()
            .find(|f| f.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| DomainError::UnknownFeature(s.to_string()))
    }
}

/// Current state of one flag as reported by a feature store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureState {
    pub feature: Feature,
    pub active: bool,
    /// True when the state comes from an explicit override rather than
    /// the configured default
    pub overridden: bool,
}
