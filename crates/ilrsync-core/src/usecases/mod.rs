//! Use cases (interactors) for ilrsync
//!
//! Use cases are thin coordinators that delegate business rules to domain
//! methods and I/O to ports.
//!
//! ## Use Cases
//!
//! - [`PushFundingSummaryUseCase`] - Push a period's funding summary to the partner API

pub mod push_funding_summary;

pub use push_funding_summary::{PushFundingSummaryUseCase, PushOutcome};
