//! Domain primitives: MachineId, BillingDuration, and date helpers.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Calendar date format used on the wire and in storage.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parse a `YYYY-MM-DD` calendar date.
pub fn parse_date(s: &str) -> Result<NaiveDate, chrono::ParseError> {
    NaiveDate::parse_from_str(s.trim(), DATE_FORMAT)
}

/// Format a calendar date as `YYYY-MM-DD`.
pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Claw machine identifier (UUID text).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MachineId(pub String);

impl MachineId {
    /// Create a MachineId from a string.
    pub fn new(id: String) -> Self {
        MachineId(id)
    }

    /// Generate a fresh random identifier.
    pub fn generate() -> Self {
        MachineId(uuid::Uuid::new_v4().to_string())
    }

    /// Get the id as a string reference.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MachineId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Billing cadence for a machine's settlements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingDuration {
    /// Settled twice per month.
    HalfMonth,
    /// Settled once per month.
    FullMonth,
}

impl BillingDuration {
    /// The raw token stored for this duration.
    pub fn as_token(&self) -> &'static str {
        match self {
            BillingDuration::HalfMonth => "half_month",
            BillingDuration::FullMonth => "full_month",
        }
    }
}

impl std::fmt::Display for BillingDuration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_token())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown billing duration: {0}")]
pub struct BillingDurationParseError(pub String);

impl FromStr for BillingDuration {
    type Err = BillingDurationParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "half_month" => Ok(BillingDuration::HalfMonth),
            "full_month" => Ok(BillingDuration::FullMonth),
            other => Err(BillingDurationParseError(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_token_roundtrip() {
        for d in [BillingDuration::HalfMonth, BillingDuration::FullMonth] {
            assert_eq!(BillingDuration::from_str(d.as_token()).unwrap(), d);
        }
        assert!(BillingDuration::from_str("weekly").is_err());
    }

    #[test]
    fn test_duration_serialization() {
        let json = serde_json::to_string(&BillingDuration::HalfMonth).unwrap();
        assert_eq!(json, "\"half_month\"");
    }

    #[test]
    fn test_parse_date() {
        let date = parse_date("2024-03-15").unwrap();
        assert_eq!(format_date(date), "2024-03-15");
        assert!(parse_date("15/03/2024").is_err());
    }

    #[test]
    fn test_machine_id_display() {
        let id = MachineId::new("m-1".to_string());
        assert_eq!(id.to_string(), "m-1");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"m-1\"");
    }

    #[test]
    fn test_generated_ids_are_distinct() {
        assert_ne!(MachineId::generate(), MachineId::generate());
    }
}
