//! SQLite implementation of IFeatureStore
//!
//! Explicit overrides are stored in `feature_state`; features without a
//! row report the default taken from the `features` configuration section.

use chrono::Utc;
use sqlx::{Row, SqlitePool};

use ilrsync_core::config::FeaturesConfig;
use ilrsync_core::domain::{Feature, FeatureState};
use ilrsync_core::ports::IFeatureStore;

/// Feature flags with configured defaults and stored overrides
pub struct SqliteFeatureStore {
    pool: SqlitePool,
    defaults: FeaturesConfig,
}

impl SqliteFeatureStore {
    pub fn new(pool: SqlitePool, defaults: FeaturesConfig) -> Self {
        Self { pool, defaults }
    }

    fn default_for(&self, feature: Feature) -> bool {
        match feature {
            Feature::SfaFtpSync => self.defaults.sync_enabled,
            Feature::OpsConnection => self.defaults.partner_connection,
        }
    }

    async fn overridden(&self, feature: Feature) -> anyhow::Result<Option<bool>> {
        let row = sqlx::query("SELECT active FROM feature_state WHERE name = ?")
            .bind(feature.name())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get::<i64, _>("active") != 0))
    }
}

#[async_trait::async_trait]
impl IFeatureStore for SqliteFeatureStore {
    async fn is_active(&self, feature: Feature) -> anyhow::Result<bool> {
        Ok(self
            .overridden(feature)
            .await?
            .unwrap_or_else(|| self.default_for(feature)))
    }

    async fn set_active(&self, feature: Feature, active: bool) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT OR REPLACE INTO feature_state (name, active, updated_at) VALUES (?, ?, ?)",
        )
        .bind(feature.name())
        .bind(active as i64)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        tracing::info!(feature = %feature, active, "Feature flag updated");
        Ok(())
    }

    async fn list(&self) -> anyhow::Result<Vec<FeatureState>> {
        let mut states = Vec::with_capacity(Feature::ALL.len());
        for feature in Feature::ALL {
            let state = match self.overridden(feature).await? {
                Some(active) => FeatureState {
                    feature,
                    active,
                    overridden: true,
                },
                None => FeatureState {
                    feature,
                    active: self.default_for(feature),
                    overridden: false,
                },
            };
            states.push(state);
        }
        Ok(states)
    }

    async fn reset_defaults(&self) -> anyhow::Result<()> {
        let result = sqlx::query("DELETE FROM feature_state")
            .execute(&self.pool)
            .await?;
        tracing::info!(cleared = result.rows_affected(), "Feature flags reset to defaults");
        Ok(())
    }
}
