//! Funding summary rows and the partner wire format
//!
//! [`FundingSummaryRecord`] is one row imported from a funding summary
//! report. [`FundingRecord`] is the common format the partner API accepts;
//! conversion is lossless apart from the derived [`GrantType`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::domain::errors::DomainError;

// ============================================================================
// Pence
// ============================================================================

/// A money amount held as integer pence
///
/// Serialized as a decimal number of pounds (e.g. `1234.5`), parsed from
/// report cells such as `£1,234.50`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pence(pub i64);

impl Pence {
    /// Parses a currency cell
    ///
    /// Accepts an optional leading `-` or surrounding parentheses for
    /// negative amounts, a `£` sign, thousands separators and up to two
    /// decimal places. Returns `Ok(None)` for blank cells.
    pub fn parse_currency(cell: &str) -> Result<Option<Self>, DomainError> {
        let mut s: String = cell
            .trim()
            .chars()
            .filter(|c| *c != ',' && *c != '£' && !c.is_whitespace())
            .collect();
        if s.is_empty() {
            return Ok(None);
        }

        let mut negative = false;
        if s.starts_with('(') && s.ends_with(')') && s.len() >= 2 {
            negative = true;
            s = s[1..s.len() - 1].to_string();
        }
        if let Some(rest) = s.strip_prefix('-') {
            negative = !negative;
            s = rest.to_string();
        }

        let invalid = || DomainError::InvalidAmount(cell.to_string());
        let (whole, fraction) = match s.split_once('.') {
            Some((w, f)) => (w, f),
            None => (s.as_str(), ""),
        };
        if whole.is_empty() && fraction.is_empty() {
            return Err(invalid());
        }
        if !whole.chars().all(|c| c.is_ascii_digit())
            || !fraction.chars().all(|c| c.is_ascii_digit())
            || fraction.len() > 2
        {
            return Err(invalid());
        }

        let pounds: i64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| invalid())?
        };
        let pence: i64 = match fraction.len() {
            0 => 0,
            1 => fraction.parse::<i64>().map_err(|_| invalid())? * 10,
            _ => fraction.parse().map_err(|_| invalid())?,
        };

        let total = pounds
            .checked_mul(100)
            .and_then(|p| p.checked_add(pence))
            .ok_or_else(invalid)?;
        Ok(Some(Pence(if negative { -total } else { total })))
    }

    /// Amount in pounds as a float, for serialization only
    pub fn as_pounds(&self) -> f64 {
        self.0 as f64 / 100.0
    }
}

impl fmt::Display for Pence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}{}.{:02}", sign, abs / 100, abs % 100)
    }
}

impl Serialize for Pence {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_pounds())
    }
}

impl<'de> Deserialize<'de> for Pence {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let pounds = f64::deserialize(deserializer)?;
        Ok(Pence((pounds * 100.0).round() as i64))
    }
}

// ============================================================================
// GrantType
// ============================================================================

/// Grant classification derived from a funding line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GrantType {
    #[serde(rename = "AEB_GRANT")]
    AebGrant,
    #[serde(rename = "AEB_PROCURED")]
    AebProcured,
}

impl GrantType {
    /// Lines mentioning "non-procured" are grant funded; all others are procured
    pub fn from_funding_line(funding_line: &str) -> Self {
        if funding_line.contains("non-procured") {
            GrantType::AebGrant
        } else {
            GrantType::AebProcured
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GrantType::AebGrant => "AEB_GRANT",
            GrantType::AebProcured => "AEB_PROCURED",
        }
    }
}

impl FromStr for GrantType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AEB_GRANT" => Ok(GrantType::AebGrant),
            "AEB_PROCURED" => Ok(GrantType::AebProcured),
            other => Err(DomainError::ValidationFailed(format!("unknown grant type '{other}'"))),
        }
    }
}

// ============================================================================
// Period arithmetic
// ============================================================================

/// Calendar (year, month) of an academic return period
///
/// Academic years start in August: periods 1 to 5 fall in the starting
/// calendar year (Aug to Dec), later periods in the following one.
pub fn actual_year_month(academic_year: i32, period: u32) -> (i32, u32) {
    if period <= 5 {
        (academic_year, period + 7)
    } else {
        (academic_year + 1, period - 5)
    }
}

/// Column header holding a month's total in funding summary reports (`MMM-yy`)
pub fn month_column(actual_year: i32, actual_month: u32) -> String {
    const MONTHS: [&str; 12] = [
        "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
    ];
    let name = MONTHS[((actual_month.clamp(1, 12)) - 1) as usize];
    format!("{}-{:02}", name, actual_year.rem_euclid(100))
}

// ============================================================================
// FundingSummaryRecord
// ============================================================================

/// One imported funding summary row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundingSummaryRecord {
    pub academic_year: i32,
    pub period: u32,
    pub actual_year: i32,
    pub actual_month: u32,
    pub ukprn: i64,
    pub funding_line: String,
    pub source: String,
    pub category: String,
    pub month_total: Option<Pence>,
    pub total_payment: Option<Pence>,
}

impl FundingSummaryRecord {
    /// Converts the row into the partner wire format
    pub fn to_funding_record(&self) -> FundingRecord {
        FundingRecord {
            ukprn: self.ukprn,
            academic_year: self.academic_year,
            period: self.period,
            actual_year: self.actual_year,
            actual_month: self.actual_month,
            grant_type: GrantType::from_funding_line(&self.funding_line),
            funding_line: self.funding_line.clone(),
            source: self.source.clone(),
            category: self.category.clone(),
            month_total: self.month_total,
            total_payment: self.total_payment,
        }
    }
}

// ============================================================================
// FundingRecord
// ============================================================================

/// Partner API wire format for one funding row
///
/// Implements `Eq` and `Hash` so a batch can be collected into a set,
/// collapsing duplicate rows.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FundingRecord {
    pub ukprn: i64,
    pub academic_year: i32,
    pub period: u32,
    pub actual_year: i32,
    pub actual_month: u32,
    pub grant_type: GrantType,
    pub funding_line: String,
    pub source: String,
    pub category: String,
    pub month_total: Option<Pence>,
    pub total_payment: Option<Pence>,
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_parse_currency() {
        let cases = [
            ("1234", 123_400),
            ("1,234.5", 123_450),
            ("£1,234.56", 123_456),
            (" -12.01 ", -1_201),
            ("(12.00)", -1_200),
            (".5", 50),
            ("0", 0),
        ];
        for (cell, pence) in cases {
            assert_eq!(Pence::parse_currency(cell).unwrap(), Some(Pence(pence)), "{cell}");
        }
    }

    #[test]
    fn test_parse_currency_blank() {
        assert_eq!(Pence::parse_currency("").unwrap(), None);
        assert_eq!(Pence::parse_currency("   ").unwrap(), None);
    }

    #[test]
    fn test_parse_currency_invalid() {
        for cell in ["abc", "1.234", "1.2.3", "-", "."] {
            assert!(Pence::parse_currency(cell).is_err(), "{cell}");
        }
    }

    #[test]
    fn test_pence_display_and_serde() {
        assert_eq!(Pence(123_456).to_string(), "1234.56");
        assert_eq!(Pence(-5).to_string(), "-0.05");
        assert_eq!(serde_json::to_string(&Pence(123_450)).unwrap(), "1234.5");
        let back: Pence = serde_json::from_str("1234.56").unwrap();
        assert_eq!(back, Pence(123_456));
    }

    #[test]
    fn test_grant_type_from_funding_line() {
        assert_eq!(
            GrantType::from_funding_line("AEB - Other Learning (non-procured)"),
            GrantType::AebGrant
        );
        assert_eq!(
            GrantType::from_funding_line("AEB - Other Learning (procured from Nov 2017)"),
            GrantType::AebProcured
        );
    }

    #[test]
    fn test_actual_year_month() {
        assert_eq!(actual_year_month(2019, 1), (2019, 8));
        assert_eq!(actual_year_month(2019, 5), (2019, 12));
        assert_eq!(actual_year_month(2019, 6), (2020, 1));
        assert_eq!(actual_year_month(2019, 12), (2020, 7));
    }

    #[test]
    fn test_month_column() {
        assert_eq!(month_column(2019, 8), "Aug-19");
        assert_eq!(month_column(2020, 1), "Jan-20");
    }

    fn row(funding_line: &str) -> FundingSummaryRecord {
        FundingSummaryRecord {
            academic_year: 2019,
            period: 3,
            actual_year: 2019,
            actual_month: 10,
            ukprn: 10_000_001,
            funding_line: funding_line.to_string(),
            source: "EFA".to_string(),
            category: "Learning".to_string(),
            month_total: Some(Pence(1_000)),
            total_payment: Some(Pence(5_000)),
        }
    }

    #[test]
    fn test_conversion_and_set_dedup() {
        let rows = vec![row("AEB (non-procured)"), row("AEB (non-procured)"), row("AEB")];
        let set: HashSet<FundingRecord> = rows.iter().map(|r| r.to_funding_record()).collect();
        assert_eq!(set.len(), 2);
        assert!(set.iter().any(|r| r.grant_type == GrantType::AebGrant));
        assert!(set.iter().any(|r| r.grant_type == GrantType::AebProcured));
    }

    #[test]
    fn test_wire_format_is_camel_case() {
        let json = serde_json::to_value(row("AEB").to_funding_record()).unwrap();
        assert_eq!(json["ukprn"], 10_000_001);
        assert_eq!(json["academicYear"], 2019);
        assert_eq!(json["actualMonth"], 10);
        assert_eq!(json["grantType"], "AEB_PROCURED");
        assert_eq!(json["fundingLine"], "AEB");
        assert_eq!(json["monthTotal"], 10.0);
        assert_eq!(json["totalPayment"], 50.0);
    }
}
