use crate::errors::{DomainError, DomainResult, ValidationError};
use crate::types::{parse_date, parse_datetime, parse_uuid};
use crate::validation::{validate_optional_date_range, Validate, ValidationBuilder};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Reporting granularity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodType {
    Quarter,
    Half,
    Yearly,
}

impl PeriodType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PeriodType::Quarter => "quarter",
            PeriodType::Half => "half",
            PeriodType::Yearly => "yearly",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "quarter" => Some(PeriodType::Quarter),
            "half" => Some(PeriodType::Half),
            "yearly" => Some(PeriodType::Yearly),
            _ => None,
        }
    }

    /// Highest valid `period_number` within one year
    pub fn max_number(&self) -> i64 {
        match self {
            PeriodType::Quarter => 4,
            PeriodType::Half => 2,
            PeriodType::Yearly => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodStatus {
    Open,
    Closed,
}

impl PeriodStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PeriodStatus::Open => "open",
            PeriodStatus::Closed => "closed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "open" => Some(PeriodStatus::Open),
            "closed" => Some(PeriodStatus::Closed),
            _ => None,
        }
    }
}

/// Human readable name: `Q1 2025`, `H2 2025`, `Yearly 2025`
pub fn display_name(period_type: PeriodType, period_number: i64, year: i64) -> String {
    match period_type {
        PeriodType::Quarter => format!("Q{} {}", period_number, year),
        PeriodType::Half => format!("H{} {}", period_number, year),
        PeriodType::Yearly => format!("Yearly {}", year),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportingPeriod {
    pub period_id: Uuid,
    pub year: i64,
    pub period_type: PeriodType,
    pub period_number: i64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: PeriodStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ReportingPeriod {
    pub fn display_name(&self) -> String {
        display_name(self.period_type, self.period_number, self.year)
    }

    pub fn is_open(&self) -> bool {
        self.status == PeriodStatus::Open
    }
}

/// Period as returned to clients, with its display name
#[derive(Debug, Clone, Serialize)]
pub struct PeriodResponse {
    #[serde(flatten)]
    pub period: ReportingPeriod,
    pub display_name: String,
}

impl From<ReportingPeriod> for PeriodResponse {
    fn from(period: ReportingPeriod) -> Self {
        let display_name = period.display_name();
        Self { period, display_name }
    }
}

/// Payload for creating or replacing a period
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeriodInput {
    pub period_type: String,
    pub period_number: i64,
    pub year: i64,
    pub start_date: String,
    pub end_date: String,
    pub status: Option<String>,
}

impl Validate for PeriodInput {
    fn validate(&self) -> DomainResult<()> {
        ValidationBuilder::new("period_type", Some(self.period_type.clone()))
            .required()
            .one_of(&["quarter", "half", "yearly"], Some("must be quarter, half or yearly"))
            .validate()?;

        if let Some(status) = &self.status {
            ValidationBuilder::new("status", Some(status.clone()))
                .one_of(&["open", "closed"], Some("must be open or closed"))
                .validate()?;
        }

        ValidationBuilder::new("year", Some(self.year))
            .range(2000, 2100)
            .validate()?;

        if let Some(period_type) = PeriodType::from_str(&self.period_type) {
            ValidationBuilder::new("period_number", Some(self.period_number))
                .range(1, period_type.max_number())
                .validate()?;
        }

        let start = parse_date(&self.start_date)
            .map_err(|_| ValidationError::format("start_date", "must be a date in YYYY-MM-DD format"))?;
        let end = parse_date(&self.end_date)
            .map_err(|_| ValidationError::format("end_date", "must be a date in YYYY-MM-DD format"))?;
        validate_optional_date_range(Some(start), Some(end), "end_date", "start_date")?;

        Ok(())
    }
}

/// A validated period ready to be checked for conflicts and stored
#[derive(Debug, Clone, PartialEq)]
pub struct PeriodCandidate {
    pub period_type: PeriodType,
    pub period_number: i64,
    pub year: i64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: PeriodStatus,
}

impl PeriodCandidate {
    pub fn display_name(&self) -> String {
        display_name(self.period_type, self.period_number, self.year)
    }
}

impl TryFrom<&PeriodInput> for PeriodCandidate {
    type Error = DomainError;

    fn try_from(input: &PeriodInput) -> DomainResult<Self> {
        input.validate()?;
        Ok(Self {
            period_type: PeriodType::from_str(&input.period_type)
                .ok_or_else(|| ValidationError::invalid_value("period_type", "unknown period type"))?,
            period_number: input.period_number,
            year: input.year,
            start_date: parse_date(&input.start_date)?,
            end_date: parse_date(&input.end_date)?,
            status: input
                .status
                .as_deref()
                .map(|s| {
                    PeriodStatus::from_str(s)
                        .ok_or_else(|| ValidationError::invalid_value("status", "unknown status"))
                })
                .transpose()?
                .unwrap_or(PeriodStatus::Closed),
        })
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct ReportingPeriodRow {
    pub period_id: String,
    pub year: i64,
    pub period_type: String,
    pub period_number: i64,
    pub start_date: String,
    pub end_date: String,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

impl ReportingPeriodRow {
    pub fn into_entity(self) -> DomainResult<ReportingPeriod> {
        Ok(ReportingPeriod {
            period_id: parse_uuid(&self.period_id)?,
            year: self.year,
            period_type: PeriodType::from_str(&self.period_type)
                .ok_or_else(|| DomainError::Internal(format!("Invalid period type: {}", self.period_type)))?,
            period_number: self.period_number,
            start_date: parse_date(&self.start_date)?,
            end_date: parse_date(&self.end_date)?,
            status: PeriodStatus::from_str(&self.status)
                .ok_or_else(|| DomainError::Internal(format!("Invalid period status: {}", self.status)))?,
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(period_type: &str, number: i64) -> PeriodInput {
        PeriodInput {
            period_type: period_type.to_string(),
            period_number: number,
            year: 2025,
            start_date: "2025-01-01".to_string(),
            end_date: "2025-03-31".to_string(),
            status: Some("open".to_string()),
        }
    }

    #[test]
    fn display_names() {
        assert_eq!(display_name(PeriodType::Quarter, 1, 2025), "Q1 2025");
        assert_eq!(display_name(PeriodType::Half, 2, 2024), "H2 2024");
        assert_eq!(display_name(PeriodType::Yearly, 1, 2025), "Yearly 2025");
    }

    #[test]
    fn period_numbers_are_bounded_by_type() {
        assert!(input("quarter", 4).validate().is_ok());
        assert!(input("quarter", 5).validate().is_err());
        assert!(input("half", 3).validate().is_err());
        assert!(input("yearly", 2).validate().is_err());
        assert!(input("quarter", 0).validate().is_err());
        assert!(input("monthly", 1).validate().is_err());
    }

    #[test]
    fn dates_must_be_ordered_and_well_formed() {
        let mut bad_order = input("quarter", 1);
        bad_order.start_date = "2025-04-01".to_string();
        assert!(bad_order.validate().is_err());

        let mut bad_format = input("quarter", 1);
        bad_format.end_date = "31/03/2025".to_string();
        assert!(bad_format.validate().is_err());
    }

    #[test]
    fn candidate_defaults_to_closed() {
        let mut no_status = input("quarter", 1);
        no_status.status = None;
        let candidate = PeriodCandidate::try_from(&no_status).unwrap();
        assert_eq!(candidate.status, PeriodStatus::Closed);
        assert_eq!(candidate.display_name(), "Q1 2025");
    }
}
