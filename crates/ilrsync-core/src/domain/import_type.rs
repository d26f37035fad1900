//! Import type catalogue
//!
//! Every file the pipeline ingests belongs to exactly one [`ImportType`].
//! The catalogue is a fixed table of immutable records defined at compile
//! time; behavior that depends on a file name (classification) lives in
//! [`crate::domain::classifier`] and only refers to entries by code.
//!
//! ## Flags
//!
//! Each entry carries five independent flags. [`ImportType::should_clear_previous_data`]
//! combines four of them with a strict AND and must never be relaxed.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::errors::DomainError;

// ============================================================================
// ImportTypeCode
// ============================================================================

/// Stable identifier of a catalogue entry
///
/// Serialized in `SCREAMING_SNAKE_CASE` (e.g. `FUNDING_SUMMARY`), which is
/// also the representation stored in the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImportTypeCode {
    FundingSummary,
    OccupancyReport,
    SupplementaryData,
    ProviderAllocation,
    DataValidationIssues,
    GlaFsr,
    GlaOcc,
    IlrCodeValues,
    Learner,
}

impl ImportTypeCode {
    /// Returns the canonical string form of the code
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportTypeCode::FundingSummary => "FUNDING_SUMMARY",
            ImportTypeCode::OccupancyReport => "OCCUPANCY_REPORT",
            ImportTypeCode::SupplementaryData => "SUPPLEMENTARY_DATA",
            ImportTypeCode::ProviderAllocation => "PROVIDER_ALLOCATION",
            ImportTypeCode::DataValidationIssues => "DATA_VALIDATION_ISSUES",
            ImportTypeCode::GlaFsr => "GLA_FSR",
            ImportTypeCode::GlaOcc => "GLA_OCC",
            ImportTypeCode::IlrCodeValues => "ILR_CODE_VALUES",
            ImportTypeCode::Learner => "LEARNER",
        }
    }
}

impl fmt::Display for ImportTypeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImportTypeCode {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CATALOGUE
            .iter()
            .map(|t| t.code)
            .find(|code| code.as_str() == s)
            .ok_or_else(|| DomainError::UnknownImportType(s.to_string()))
    }
}

// ============================================================================
// ImportType
// ============================================================================

/// An immutable catalogue entry describing one kind of importable file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportType {
    /// Stable identifier
    pub code: ImportTypeCode,
    /// Human-readable name shown to operators
    pub description: &'static str,
    /// Whether derived data may be pushed to the partner API
    pub can_push_to_partner: bool,
    /// Whether files of this type are issued per academic year
    pub is_yearly_file: bool,
    /// Whether files of this type are issued per return period
    pub is_monthly_file: bool,
    /// Whether imported data may be deleted after import
    pub is_deletable: bool,
    /// Whether importing marks prior-period data for clearing
    pub clear_previous_data: bool,
}

impl ImportType {
    /// Returns true when the type is issued both yearly and monthly
    pub fn is_periodic(&self) -> bool {
        self.is_yearly_file && self.is_monthly_file
    }

    /// Returns true only when the type is deletable, marked to clear,
    /// yearly and monthly at the same time
    pub fn should_clear_previous_data(&self) -> bool {
        self.is_deletable && self.clear_previous_data && self.is_yearly_file && self.is_monthly_file
    }
}

impl fmt::Display for ImportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description)
    }
}

// ============================================================================
// Catalogue
// ============================================================================

const fn entry(
    code: ImportTypeCode,
    description: &'static str,
    can_push_to_partner: bool,
    is_yearly_file: bool,
    is_monthly_file: bool,
    is_deletable: bool,
    clear_previous_data: bool,
) -> ImportType {
    ImportType {
        code,
        description,
        can_push_to_partner,
        is_yearly_file,
        is_monthly_file,
        is_deletable,
        clear_previous_data,
    }
}

/// The complete, fixed catalogue of import types
pub static CATALOGUE: [ImportType; 9] = [
    entry(ImportTypeCode::FundingSummary, "Funding Summary", true, true, true, false, false),
    entry(ImportTypeCode::OccupancyReport, "Occupancy Report", false, true, true, false, false),
    entry(ImportTypeCode::SupplementaryData, "Supplemental Data", false, true, true, false, false),
    entry(ImportTypeCode::ProviderAllocation, "Provider Allocations", false, true, false, false, false),
    entry(ImportTypeCode::DataValidationIssues, "Data Validation Issues", false, true, true, true, false),
    entry(ImportTypeCode::GlaFsr, "GLA FSR", false, true, true, true, true),
    entry(ImportTypeCode::GlaOcc, "GLA OCC", false, true, true, true, true),
    entry(ImportTypeCode::IlrCodeValues, "ILR Code Values", false, true, false, false, false),
    entry(ImportTypeCode::Learner, "Learner", false, true, true, false, false),
];

/// Returns every catalogue entry in declaration order
pub fn all() -> &'static [ImportType] {
    &CATALOGUE
}

/// Looks up a catalogue entry by its exact description
pub fn get_by_description(description: &str) -> Option<&'static ImportType> {
    CATALOGUE.iter().find(|t| t.description == description)
}

/// Looks up a catalogue entry by code
///
/// Every code has exactly one entry, so this never fails.
pub fn get_by_code(code: ImportTypeCode) -> &'static ImportType {
    CATALOGUE
        .iter()
        .find(|t| t.code == code)
        .unwrap_or(&CATALOGUE[0])
}
