use chrono::{DateTime, Datelike, NaiveDate};
use log::debug;

/// Username nobody may register, compared case-insensitively
pub const RESERVED_USERNAME: &str = "admin";

/// Minimum age in whole calendar years
pub const MINIMUM_AGE: i32 = 13;

/// Full date formats accepted for a date of birth, besides RFC 3339 timestamps
const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

/// Date of birth that could not be read as a calendar date
#[derive(Debug, thiserror::Error)]
#[error("Invalid date of birth: {0}")]
pub struct InvalidDateOfBirth(pub String);

/// Check whether a username collides with the reserved name
pub fn is_reserved_username(username: &str) -> bool {
    username.to_lowercase() == RESERVED_USERNAME
}

/// Age as the difference between calendar years; month and day are ignored
pub fn age_in_years(date_of_birth: NaiveDate, today: NaiveDate) -> i32 {
    today.year() - date_of_birth.year()
}

/// Check an age against the sign-up minimum
pub fn is_old_enough(age: i32) -> bool {
    age >= MINIMUM_AGE
}

/// Parse a date of birth given as a plain date, a bare year (`1990`), a
/// year and month (`1990-05`) or an RFC 3339 timestamp
///
/// Partial dates fall on the first of the missing month or day.
pub fn parse_date_of_birth(raw: &str) -> Result<NaiveDate, InvalidDateOfBirth> {
    let trimmed = raw.trim();

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return Ok(date);
        }
    }

    if let Some(date) = parse_partial_date(trimmed) {
        return Ok(date);
    }

    match DateTime::parse_from_rfc3339(trimmed) {
        Ok(timestamp) => Ok(timestamp.date_naive()),
        Err(e) => {
            debug!("Rejecting date of birth {:?}: {}", raw, e);
            Err(InvalidDateOfBirth(raw.to_string()))
        }
    }
}

fn parse_partial_date(raw: &str) -> Option<NaiveDate> {
    let (year, month) = match raw.split_once('-') {
        Some((year, month)) => (year, month),
        None => (raw, "01"),
    };

    if year.len() != 4 || !year.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if month.is_empty() || month.len() > 2 || !month.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, 1)
}
