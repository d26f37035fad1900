//! ilrsync Core - Domain logic and business rules
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain entities** - `RemoteEndpoint`, `SyncLock`, `SyncCycle`, `StagedFile`, `DataImport`
//! - **Import type catalogue** - the fixed table of known import types and the
//!   ordered file classifier
//! - **Use cases** - `PushFundingSummaryUseCase`
//! - **Port definitions** - Traits for adapters: `IRemoteSessionFactory`,
//!   `ILockRegistry`, `IFeatureStore`, `ISecretStore`, `IFileImporter`,
//!   `IImportRepository`, `IPartnerApi`
//! - **Configuration** - YAML configuration with validation
//!
//! # Architecture
//!
//! This crate follows the hexagonal (ports & adapters) architecture pattern.
//! The domain module contains pure business logic with no I/O.
//! Ports define trait interfaces that adapter crates implement.
//! Use cases orchestrate domain entities through port interfaces.

pub mod config;
pub mod domain;
pub mod ports;
pub mod usecases;
