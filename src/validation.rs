use crate::errors::{ValidationError, DomainResult, DomainError};
use chrono::NaiveDate;
use regex::Regex;
use std::sync::OnceLock;

/// A trait that entities should implement for validation.
pub trait Validate {
    /// Validates the entity and returns an error if validation fails.
    fn validate(&self) -> DomainResult<()>;
}

// Common regex patterns
fn email_regex() -> &'static Regex {
    static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();
    EMAIL_REGEX.get_or_init(|| Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("valid email regex"))
}

fn number_token_regex() -> &'static Regex {
    static NUMBER_REGEX: OnceLock<Regex> = OnceLock::new();
    NUMBER_REGEX.get_or_init(|| Regex::new(r"^[0-9]+(\.[0-9]+)*$").expect("valid number regex"))
}

/// Struct for configuring validations in a fluent style
#[derive(Default)]
pub struct ValidationBuilder<T> {
    field_name: String,
    value: Option<T>,
    errors: Vec<ValidationError>,
}

/// Generic validation implementations
impl<T> ValidationBuilder<T> {
    pub fn new(field_name: &str, value: Option<T>) -> Self {
        Self {
            field_name: field_name.to_string(),
            value,
            errors: Vec::new(),
        }
    }

    pub fn required(mut self) -> Self
    where T: Default + PartialEq {
        if self.value.is_none() || self.value == Some(T::default()) {
            self.errors.push(ValidationError::required(&self.field_name));
        }
        self
    }

    /// Complete validation and return result
    pub fn validate(self) -> DomainResult<()> {
        match self.errors.into_iter().next() {
            None => Ok(()),
            // Return the first error for simplicity
            Some(err) => Err(DomainError::Validation(err)),
        }
    }
}

/// String-specific validations
impl ValidationBuilder<String> {
    pub fn min_length(mut self, min: usize) -> Self {
        if let Some(value) = &self.value {
            if value.trim().chars().count() < min {
                self.errors.push(ValidationError::min_length(&self.field_name, min));
            }
        }
        self
    }

    pub fn max_length(mut self, max: usize) -> Self {
        if let Some(value) = &self.value {
            if value.chars().count() > max {
                self.errors.push(ValidationError::max_length(&self.field_name, max));
            }
        }
        self
    }

    pub fn matches_pattern(mut self, pattern: &Regex, message: &str) -> Self {
        if let Some(value) = &self.value {
            if !pattern.is_match(value) {
                self.errors.push(ValidationError::format(&self.field_name, message));
            }
        }
        self
    }

    pub fn email(self) -> Self {
        self.matches_pattern(email_regex(), "must be a valid email address")
    }

    /// Dotted numeric identifiers such as `1`, `1.2` or `3.10.4`
    pub fn number_token(self) -> Self {
        self.matches_pattern(number_token_regex(), "must be a dotted number such as 1 or 1.2")
    }

    pub fn one_of(mut self, allowed_values: &[&str], message: Option<&str>) -> Self {
        if let Some(value) = &self.value {
            if !allowed_values.contains(&value.as_str()) {
                let reason = message.unwrap_or("must be one of the allowed values");
                self.errors.push(ValidationError::invalid_value(&self.field_name, reason));
            }
        }
        self
    }
}

/// Numeric validations
impl<T> ValidationBuilder<T>
where T: PartialOrd + Clone + std::fmt::Display
{
    pub fn range(mut self, min: T, max: T) -> Self {
        if let Some(value) = &self.value {
            if value < &min || value > &max {
                self.errors.push(ValidationError::range(
                    &self.field_name,
                    min.to_string(),
                    max.to_string()
                ));
            }
        }
        self
    }
}

/// Calendar date validation helpers
impl ValidationBuilder<NaiveDate> {
    pub fn not_before(mut self, other: NaiveDate, other_field: &str) -> Self {
        if let Some(value) = &self.value {
            if *value < other {
                self.errors.push(ValidationError::invalid_value(
                    &self.field_name,
                    &format!("cannot be earlier than {}", other_field),
                ));
            }
        }
        self
    }
}

/// Validates an optional date range where both ends may be absent.
pub fn validate_optional_date_range(
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    end_field: &str,
    start_field: &str,
) -> DomainResult<()> {
    match (start, end) {
        (Some(start), Some(end)) => ValidationBuilder::new(end_field, Some(end))
            .not_before(start, start_field)
            .validate(),
        _ => Ok(()),
    }
}

// Common validation utility module for frequently validated input
pub mod common {
    use super::*;

    pub fn validate_password_strength(password: &str) -> DomainResult<()> {
        let mut builder = ValidationBuilder::new("password", Some(password.to_string()));

        builder = builder.min_length(8);

        // Check for complexity (at least one uppercase, one lowercase, one number)
        let has_uppercase = password.chars().any(|c| c.is_uppercase());
        let has_lowercase = password.chars().any(|c| c.is_lowercase());
        let has_digit = password.chars().any(|c| c.is_ascii_digit());

        if !has_uppercase || !has_lowercase || !has_digit {
            builder.errors.push(ValidationError::format(
                "password",
                "must contain at least one uppercase letter, one lowercase letter, and one number",
            ));
        }

        builder.validate()
    }
}
