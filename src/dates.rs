use chrono::{Local, NaiveDate};
use regex::Regex;
use std::sync::OnceLock;

use crate::error::IssueError;

fn canonical_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("valid date regex"))
}

fn display_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{2}/\d{2}/\d{4}$").expect("valid date regex"))
}

pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Accepts `YYYY-MM-DD` or `DD/MM/YYYY`; an empty string means today.
pub fn normalize_date(raw: &str) -> Result<NaiveDate, IssueError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(today());
    }

    if canonical_re().is_match(raw) {
        if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
            return Ok(date);
        }
    }

    if display_re().is_match(raw) {
        if let Ok(date) = NaiveDate::parse_from_str(raw, "%d/%m/%Y") {
            return Ok(date);
        }
    }

    Err(IssueError::Format(raw.to_string()))
}

/// `YYYY-MM-DD` as `DD/MM/YYYY`, or the input untouched when it does not parse.
pub fn display_date(canonical: &str) -> String {
    NaiveDate::parse_from_str(canonical, "%Y-%m-%d")
        .map(|d| d.format("%d/%m/%Y").to_string())
        .unwrap_or_else(|_| canonical.to_string())
}
