//! Integration tests for the SQLite adapters
//!
//! These tests exercise the import repository, feature store and secret
//! store against an in-memory SQLite database. Each test function creates
//! a fresh database to ensure test isolation.

use ilrsync_cache::{
    DatabasePool, SqliteFeatureStore, SqliteImportRepository, SqliteSecretStore, TextEncryptor,
};
use ilrsync_core::config::FeaturesConfig;
use ilrsync_core::domain::{
    DataImport, Feature, FundingSummaryRecord, ImportStatus, ImportTypeCode, Pence, SecretType,
    SYSTEM_USER,
};
use ilrsync_core::ports::{IFeatureStore, IImportRepository, ISecretStore};

// ============================================================================
// Test helpers
// ============================================================================

async fn setup() -> DatabasePool {
    DatabasePool::in_memory()
        .await
        .expect("Failed to create in-memory database")
}

fn funding_row(ukprn: i64, period: u32) -> FundingSummaryRecord {
    FundingSummaryRecord {
        academic_year: 2019,
        period,
        actual_year: 2019,
        actual_month: period + 7,
        ukprn,
        funding_line: "AEB - Other Learning (non-procured)".to_string(),
        source: "SFA".to_string(),
        category: "Learning".to_string(),
        month_total: Some(Pence(123_456)),
        total_payment: None,
    }
}

// ============================================================================
// Data imports
// ============================================================================

#[tokio::test]
async fn test_insert_and_get_import() {
    let pool = setup().await;
    let repo = SqliteImportRepository::new(pool.pool().clone());

    let import = DataImport::new(
        "Funding Summary Report 2019 03.csv",
        ImportTypeCode::FundingSummary,
        SYSTEM_USER,
    )
    .with_period(2019, 3);
    let id = repo.insert_import(&import).await.unwrap();

    let loaded = repo.get_import(id).await.unwrap().expect("import exists");
    assert_eq!(loaded.id, Some(id));
    assert_eq!(loaded.file_name, import.file_name);
    assert_eq!(loaded.import_type, ImportTypeCode::FundingSummary);
    assert_eq!(loaded.status, ImportStatus::Processing);
    assert_eq!(loaded.created_by, "System");
    assert_eq!(loaded.period_key(), Some((2019, 3)));
    assert!(loaded.last_export_date.is_none());
}

#[tokio::test]
async fn test_update_import_and_stamp() {
    let pool = setup().await;
    let repo = SqliteImportRepository::new(pool.pool().clone());

    let id = repo
        .insert_import(&DataImport::new("Learner.csv", ImportTypeCode::Learner, SYSTEM_USER))
        .await
        .unwrap();
    let mut import = repo.get_import(id).await.unwrap().unwrap();
    import.complete(17);
    import.mark_exported(chrono::Utc::now());
    repo.update_import(&import).await.unwrap();

    let loaded = repo.get_import(id).await.unwrap().unwrap();
    assert_eq!(loaded.status, ImportStatus::Complete);
    assert_eq!(loaded.rows_processed, 17);
    assert!(loaded.last_export_date.is_some());
}

#[tokio::test]
async fn test_update_unsaved_import_fails() {
    let pool = setup().await;
    let repo = SqliteImportRepository::new(pool.pool().clone());
    let import = DataImport::new("Learner.csv", ImportTypeCode::Learner, SYSTEM_USER);
    assert!(repo.update_import(&import).await.is_err());
}

#[tokio::test]
async fn test_get_missing_import() {
    let pool = setup().await;
    let repo = SqliteImportRepository::new(pool.pool().clone());
    assert!(repo.get_import(42).await.unwrap().is_none());
}

#[tokio::test]
async fn test_list_imports_newest_first() {
    let pool = setup().await;
    let repo = SqliteImportRepository::new(pool.pool().clone());
    for name in ["a.csv", "b.csv", "c.csv"] {
        repo.insert_import(&DataImport::new(name, ImportTypeCode::Learner, SYSTEM_USER))
            .await
            .unwrap();
    }

    let imports = repo.list_imports(2).await.unwrap();
    let names: Vec<_> = imports.iter().map(|i| i.file_name.as_str()).collect();
    assert_eq!(names, vec!["c.csv", "b.csv"]);
}

// ============================================================================
// Funding summary rows
// ============================================================================

#[tokio::test]
async fn test_latest_completed_import_per_period() {
    let pool = setup().await;
    let repo = SqliteImportRepository::new(pool.pool().clone());
    let name = "Funding Summary Report 2019 03.csv";

    let mut first = DataImport::new(name, ImportTypeCode::FundingSummary, SYSTEM_USER)
        .with_period(2019, 3);
    first.complete(10);
    let first_id = repo.insert_import(&first).await.unwrap();

    let mut second = DataImport::new(name, ImportTypeCode::FundingSummary, SYSTEM_USER)
        .with_period(2019, 3);
    second.complete(12);
    let second_id = repo.insert_import(&second).await.unwrap();

    // A later failed upload does not displace the completed one
    let mut broken = DataImport::new(name, ImportTypeCode::FundingSummary, SYSTEM_USER)
        .with_period(2019, 3);
    broken.fail("column [Total] not found in the file");
    repo.insert_import(&broken).await.unwrap();

    let latest = repo
        .latest_completed_import(ImportTypeCode::FundingSummary, 2019, 3)
        .await
        .unwrap();
    assert_eq!(latest, Some(second_id));
    assert_ne!(latest, Some(first_id));

    assert_eq!(
        repo.latest_completed_import(ImportTypeCode::FundingSummary, 2019, 4)
            .await
            .unwrap(),
        None
    );
    assert_eq!(
        repo.latest_completed_import(ImportTypeCode::OccupancyReport, 2019, 3)
            .await
            .unwrap(),
        None
    );
}

#[tokio::test]
async fn test_replace_funding_summary_replaces_only_that_period() {
    let pool = setup().await;
    let repo = SqliteImportRepository::new(pool.pool().clone());

    repo.replace_funding_summary(2019, 3, &[funding_row(1, 3), funding_row(2, 3)])
        .await
        .unwrap();
    repo.replace_funding_summary(2019, 4, &[funding_row(3, 4)])
        .await
        .unwrap();
    let stored = repo
        .replace_funding_summary(2019, 3, &[funding_row(9, 3)])
        .await
        .unwrap();
    assert_eq!(stored, 1);

    let p3 = repo.funding_summary_rows(2019, 3).await.unwrap();
    assert_eq!(p3.len(), 1);
    assert_eq!(p3[0], funding_row(9, 3));

    let p4 = repo.funding_summary_rows(2019, 4).await.unwrap();
    assert_eq!(p4.len(), 1);
    assert_eq!(p4[0].ukprn, 3);

    assert!(repo.funding_summary_rows(2020, 3).await.unwrap().is_empty());
}

// ============================================================================
// Feature store
// ============================================================================

#[tokio::test]
async fn test_feature_defaults_and_overrides() {
    let pool = setup().await;
    let store = SqliteFeatureStore::new(
        pool.pool().clone(),
        FeaturesConfig {
            sync_enabled: true,
            partner_connection: false,
        },
    );

    assert!(store.is_active(Feature::SfaFtpSync).await.unwrap());
    assert!(!store.is_active(Feature::OpsConnection).await.unwrap());

    store.set_active(Feature::SfaFtpSync, false).await.unwrap();
    store.set_active(Feature::OpsConnection, true).await.unwrap();
    assert!(!store.is_active(Feature::SfaFtpSync).await.unwrap());
    assert!(store.is_active(Feature::OpsConnection).await.unwrap());

    let states = store.list().await.unwrap();
    assert_eq!(states.len(), 2);
    assert!(states.iter().all(|s| s.overridden));

    store.reset_defaults().await.unwrap();
    assert!(store.is_active(Feature::SfaFtpSync).await.unwrap());
    assert!(!store.is_active(Feature::OpsConnection).await.unwrap());
    assert!(store.list().await.unwrap().iter().all(|s| !s.overridden));
}

// ============================================================================
// Secret store
// ============================================================================

#[tokio::test]
async fn test_secret_round_trip_is_encrypted_at_rest() {
    let pool = setup().await;
    let encryptor = TextEncryptor::new("passphrase", "a1b2c3d4").unwrap();
    let store = SqliteSecretStore::new(pool.pool().clone(), encryptor);

    assert_eq!(
        store
            .get_secret(SecretType::ArchiveDecryptionPassword)
            .await
            .unwrap(),
        None
    );

    store
        .set_secret(SecretType::ArchiveDecryptionPassword, "zip-pass")
        .await
        .unwrap();
    assert_eq!(
        store
            .get_secret(SecretType::ArchiveDecryptionPassword)
            .await
            .unwrap()
            .as_deref(),
        Some("zip-pass")
    );

    let (raw,): (String,) = sqlx::query_as("SELECT value FROM encrypted_text")
        .fetch_one(pool.pool())
        .await
        .unwrap();
    assert!(!raw.contains("zip-pass"));
}

#[tokio::test]
async fn test_empty_secret_reads_as_none() {
    let pool = setup().await;
    let encryptor = TextEncryptor::new("passphrase", "").unwrap();
    let store = SqliteSecretStore::new(pool.pool().clone(), encryptor);

    store
        .set_secret(SecretType::ArchiveDecryptionPassword, "")
        .await
        .unwrap();
    assert_eq!(
        store
            .get_secret(SecretType::ArchiveDecryptionPassword)
            .await
            .unwrap(),
        None
    );
}

#[tokio::test]
async fn test_secret_with_wrong_key_fails() {
    let pool = setup().await;
    let writer = SqliteSecretStore::new(
        pool.pool().clone(),
        TextEncryptor::new("passphrase", "a1b2").unwrap(),
    );
    writer
        .set_secret(SecretType::ArchiveDecryptionPassword, "zip-pass")
        .await
        .unwrap();

    let reader = SqliteSecretStore::new(
        pool.pool().clone(),
        TextEncryptor::new("other", "a1b2").unwrap(),
    );
    assert!(reader
        .get_secret(SecretType::ArchiveDecryptionPassword)
        .await
        .is_err());
}
