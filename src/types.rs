use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, NaiveDate, Utc};
use crate::errors::{DomainError, DomainResult};

// Re-export UserRole and Permission from the permission module
pub use crate::domains::permission::{UserRole, Permission};

/// Storage format for calendar dates (`start_date`, `end_date`)
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Pagination parameters
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaginationParams {
    pub page: u32,
    pub per_page: u32,
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 20,
        }
    }
}

impl PaginationParams {
    /// Clamp user supplied values into a usable range
    pub fn normalized(self) -> Self {
        Self {
            page: self.page.max(1),
            per_page: self.per_page.clamp(1, 200),
        }
    }

    pub fn offset(&self) -> i64 {
        ((self.page.max(1) - 1) as i64) * self.per_page as i64
    }
}

/// Paginated result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub per_page: u32,
    pub total_pages: u32,
}

impl<T> PaginatedResult<T> {
    pub fn new(items: Vec<T>, total: u64, params: PaginationParams) -> Self {
        let total_pages = (total as f64 / params.per_page.max(1) as f64).ceil() as u32;
        Self {
            items,
            total,
            page: params.page,
            per_page: params.per_page,
            total_pages,
        }
    }
}

// --- Row parsing helpers shared by the *Row -> entity conversions ---

pub fn parse_uuid(value: &str) -> DomainResult<Uuid> {
    Uuid::parse_str(value).map_err(|_| DomainError::InvalidUuid(value.to_string()))
}

pub fn parse_optional_uuid(value: &Option<String>) -> DomainResult<Option<Uuid>> {
    value.as_deref().map(parse_uuid).transpose()
}

pub fn parse_datetime(value: &str) -> DomainResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| DomainError::Internal(format!("Invalid date format: {}", value)))
}

pub fn parse_optional_datetime(value: &Option<String>) -> DomainResult<Option<DateTime<Utc>>> {
    value.as_deref().map(parse_datetime).transpose()
}

pub fn parse_date(value: &str) -> DomainResult<NaiveDate> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map_err(|_| DomainError::Internal(format!("Invalid calendar date: {}", value)))
}

pub fn parse_optional_date(value: &Option<String>) -> DomainResult<Option<NaiveDate>> {
    value.as_deref().map(parse_date).transpose()
}

pub fn format_date(date: &NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Update field deserializer: a missing key stays `None`, an explicit `null`
/// becomes `Some(None)`. Pair with `#[serde(default)]`.
pub mod double_option {
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
    where
        T: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        Option::<T>::deserialize(deserializer).map(Some)
    }
}

/// Applies a nullable text update: missing keeps `current`; null or blank clears
pub fn apply_text_update(update: Option<Option<String>>, current: &Option<String>) -> Option<String> {
    match update {
        None => current.clone(),
        Some(value) => value.filter(|text| !text.trim().is_empty()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_offset_and_pages() {
        let params = PaginationParams { page: 3, per_page: 10 };
        assert_eq!(params.offset(), 20);

        let result = PaginatedResult::new(vec![1, 2, 3], 25, params);
        assert_eq!(result.total_pages, 3);

        let zeroed = PaginationParams { page: 0, per_page: 0 }.normalized();
        assert_eq!(zeroed, PaginationParams { page: 1, per_page: 1 });
    }

    #[test]
    fn date_helpers_use_iso_calendar_format() {
        let date = parse_date("2025-03-31").unwrap();
        assert_eq!(format_date(&date), "2025-03-31");
        assert!(parse_date("31/03/2025").is_err());
        assert_eq!(parse_optional_date(&None).unwrap(), None);
    }

    #[derive(Debug, Deserialize)]
    struct Patch {
        #[serde(default, deserialize_with = "double_option::deserialize")]
        note: Option<Option<String>>,
    }

    #[test]
    fn double_option_tells_null_from_missing() {
        let missing: Patch = serde_json::from_str("{}").unwrap();
        assert_eq!(missing.note, None);

        let cleared: Patch = serde_json::from_str(r#"{"note": null}"#).unwrap();
        assert_eq!(cleared.note, Some(None));

        let set: Patch = serde_json::from_str(r#"{"note": "kept"}"#).unwrap();
        assert_eq!(set.note, Some(Some("kept".to_string())));
    }

    #[test]
    fn text_update_keeps_replaces_or_clears() {
        let current = Some("old".to_string());
        assert_eq!(apply_text_update(None, &current), current);
        assert_eq!(apply_text_update(Some(Some("new".into())), &current), Some("new".to_string()));
        assert_eq!(apply_text_update(Some(None), &current), None);
        assert_eq!(apply_text_update(Some(Some("  ".into())), &current), None);
    }
}
