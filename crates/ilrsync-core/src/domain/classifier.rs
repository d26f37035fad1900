//! File name classifier
//!
//! Maps a raw file name to an [`ImportType`] using an ordered list of glob
//! rules. The first rule whose pattern matches the whole name wins; a name
//! that matches no rule is [`ImportTypeMatch::Unrecognized`].
//!
//! Names that do not carry the `.csv` extension are rejected with
//! [`ClassificationError::UnsupportedFormat`] before any rule is tried.
//!
//! Classification depends only on the file name, so the same name always
//! yields the same result.

use std::sync::OnceLock;

use glob::{MatchOptions, Pattern};
use tracing::trace;

use crate::domain::errors::ClassificationError;
use crate::domain::import_type::{get_by_code, ImportType, ImportTypeCode};

/// Extension every importable file must carry (compared case-insensitively)
pub const REQUIRED_EXTENSION: &str = ".csv";

/// Ordered classification rules. Narrower patterns come before the
/// `*Learner*` catch-all, which must stay last.
pub const RULES: &[(&str, ImportTypeCode)] = &[
    ("Funding Summary Report*.csv", ImportTypeCode::FundingSummary),
    ("Occupancy Report*.csv", ImportTypeCode::OccupancyReport),
    ("*Supp Data*.csv", ImportTypeCode::SupplementaryData),
    ("Supplemental Data*.csv", ImportTypeCode::SupplementaryData),
    ("Provider Allocation*.csv", ImportTypeCode::ProviderAllocation),
    ("*Data Validation Issues*.csv", ImportTypeCode::DataValidationIssues),
    ("ILR Code Value*.csv", ImportTypeCode::IlrCodeValues),
    ("GLA FSR*.csv", ImportTypeCode::GlaFsr),
    ("GLA OCC*.csv", ImportTypeCode::GlaOcc),
    ("*Learner*.csv", ImportTypeCode::Learner),
];

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: false,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// Result of classifying a file name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportTypeMatch {
    /// The name matched a rule
    Recognized(&'static ImportType),
    /// The name is a CSV file but matched no rule
    Unrecognized,
}

impl ImportTypeMatch {
    /// Returns the matched import type, if any
    pub fn import_type(&self) -> Option<&'static ImportType> {
        match self {
            ImportTypeMatch::Recognized(t) => Some(t),
            ImportTypeMatch::Unrecognized => None,
        }
    }
}

fn compiled_rules() -> &'static [(Pattern, ImportTypeCode)] {
    static COMPILED: OnceLock<Vec<(Pattern, ImportTypeCode)>> = OnceLock::new();
    COMPILED.get_or_init(|| {
        RULES
            .iter()
            .filter_map(|(pattern, code)| match Pattern::new(pattern) {
                Ok(p) => Some((p, *code)),
                Err(e) => {
                    tracing::error!(pattern = %pattern, error = %e, "Invalid classification rule");
                    None
                }
            })
            .collect()
    })
}

/// Returns true when `file_name` ends in the required extension
pub fn has_required_extension(file_name: &str) -> bool {
    file_name
        .to_ascii_lowercase()
        .ends_with(REQUIRED_EXTENSION)
}

/// Classifies a file name against the ordered rule list
///
/// # Errors
///
/// Returns [`ClassificationError::UnsupportedFormat`] when the name does not
/// end in `.csv` (any case).
pub fn classify(file_name: &str) -> Result<ImportTypeMatch, ClassificationError> {
    if !has_required_extension(file_name) {
        return Err(ClassificationError::UnsupportedFormat(file_name.to_string()));
    }

    for (pattern, code) in compiled_rules() {
        if pattern.matches_with(file_name, MATCH_OPTIONS) {
            trace!(file = %file_name, rule = %pattern, import_type = %code, "Classification rule matched");
            return Ok(ImportTypeMatch::Recognized(get_by_code(*code)));
        }
    }

    trace!(file = %file_name, "No classification rule matched");
    Ok(ImportTypeMatch::Unrecognized)
}
