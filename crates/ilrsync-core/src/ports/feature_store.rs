//! Feature flag store port (driven/secondary port)

use anyhow::Result;

use crate::domain::{Feature, FeatureState};

/// Read/write access to runtime feature flags
#[async_trait::async_trait]
pub trait IFeatureStore: Send + Sync {
    /// Returns whether `feature` is currently active
    async fn is_active(&self, feature: Feature) -> Result<bool>;

    /// Overrides the state of `feature`
    async fn set_active(&self, feature: Feature, active: bool) -> Result<()>;

    /// Returns the state of every known feature
    async fn list(&self) -> Result<Vec<FeatureState>>;

    /// Drops all overrides so the configured defaults apply again
    async fn reset_defaults(&self) -> Result<()>;
}
