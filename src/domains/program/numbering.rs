//! Hierarchical numbering: programs under initiative `1` are `1.1`, `1.2`, ...
//! and targets under program `1.2` are `1.2.1`, `1.2.2`, ...

use crate::errors::{DomainError, DomainResult};
use regex::Regex;

fn child_pattern(parent: Option<&str>) -> DomainResult<Regex> {
    let pattern = match parent {
        Some(parent) => format!(r"^{}\.(\d+)$", regex::escape(parent.trim())),
        None => r"^(\d+)$".to_string(),
    };
    Regex::new(&pattern).map_err(|e| DomainError::Internal(format!("Invalid numbering pattern: {}", e)))
}

/// Next number under `parent`: one past the highest existing suffix.
/// Gaps are never reused, so `{1.1, 1.3}` yields `1.4`.
/// With no parent the numbers are plain integers.
pub fn next_child_number<'a, I>(parent: Option<&str>, existing: I) -> DomainResult<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let pattern = child_pattern(parent)?;

    let max_suffix = existing
        .into_iter()
        .filter_map(|number| pattern.captures(number.trim()))
        .filter_map(|caps| caps.get(1).and_then(|m| m.as_str().parse::<u64>().ok()))
        .max()
        .unwrap_or(0);

    Ok(match parent {
        Some(parent) => format!("{}.{}", parent.trim(), max_suffix + 1),
        None => (max_suffix + 1).to_string(),
    })
}

pub fn next_program_number<'a, I>(initiative_number: &str, existing: I) -> DomainResult<String>
where
    I: IntoIterator<Item = &'a str>,
{
    next_child_number(Some(initiative_number), existing)
}

/// Whether `number` is a direct child of `parent`, e.g. `1.4` under `1`
pub fn is_child_number(parent: &str, number: &str) -> DomainResult<bool> {
    Ok(child_pattern(Some(parent))?.is_match(number.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn takes_max_plus_one_without_filling_gaps() {
        let existing = ["1.1", "1.3"];
        assert_eq!(next_program_number("1", existing).unwrap(), "1.4");
    }

    #[test]
    fn first_program_of_an_initiative() {
        assert_eq!(next_program_number("2", Vec::<&str>::new()).unwrap(), "2.1");
    }

    #[test]
    fn suffixes_compare_numerically() {
        let existing = ["3.9", "3.10", "3.2"];
        assert_eq!(next_program_number("3", existing).unwrap(), "3.11");
    }

    #[test]
    fn other_initiatives_and_grandchildren_are_ignored() {
        let existing = ["1.5", "11.7", "1.2.9", "10.1"];
        assert_eq!(next_program_number("1", existing).unwrap(), "1.6");
    }

    #[test]
    fn dots_in_the_parent_are_literal() {
        // "1.2" must not match "152.4" through an unescaped dot
        let existing = ["152.4", "1.2.1"];
        assert_eq!(next_child_number(Some("1.2"), existing).unwrap(), "1.2.2");
    }

    #[test]
    fn plain_numbers_without_parent() {
        assert_eq!(next_child_number(None, ["1", "2", "x"]).unwrap(), "3");
    }

    #[test]
    fn child_number_check() {
        assert!(is_child_number("1", "1.4").unwrap());
        assert!(!is_child_number("1", "2.4").unwrap());
        assert!(!is_child_number("1", "1.4.1").unwrap());
    }
}
