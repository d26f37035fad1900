//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! hexagonal architecture. Ports are interfaces that the domain core
//! depends on, but whose implementations live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`IRemoteSessionFactory`] / [`IRemoteSession`] - Remote SFTP drop location
//! - [`ILockRegistry`] - Cross-instance named locks
//! - [`IFeatureStore`] - Runtime feature flags
//! - [`ISecretStore`] - Encrypted secrets
//! - [`IFileImporter`] - Downstream ingestion of classified files
//! - [`IImportRepository`] - Import records and funding summary rows
//! - [`IPartnerApi`] - Outbound partner HTTP API

pub mod feature_store;
pub mod file_importer;
pub mod import_repository;
pub mod lock_registry;
pub mod partner_api;
pub mod remote_session;
pub mod secret_store;

pub use feature_store::IFeatureStore;
pub use file_importer::IFileImporter;
pub use import_repository::IImportRepository;
pub use lock_registry::ILockRegistry;
pub use partner_api::IPartnerApi;
pub use remote_session::{IRemoteSession, IRemoteSessionFactory};
pub use secret_store::ISecretStore;
