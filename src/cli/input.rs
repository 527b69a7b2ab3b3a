//! Parsers for everything the user types. They never print or retry, that's left to
//! [super::prompt::ask].

use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_english::{parse_date_string, Dialect};
use thiserror::Error;

use crate::{
    export::range::{DateRange, RangeError},
    graph::minimap::ColumnSelection,
    store::entities::{DetailCode, IdError, ResolutionId},
    utils::time::parse_log_date,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InputError {
    #[error("`{0}` is not a date. Try M/D/YYYY, a year, or today")]
    Date(String),
    #[error("Expiration {0} is already in the past")]
    PastDate(String),
    #[error("Please answer Y or N")]
    YesNo,
    #[error("`{0}` is not a single character code")]
    Code(String),
    #[error("Enter at least one code, or N")]
    NoCodes,
    #[error("Expected a number from 1 to {0}")]
    Choice(usize),
    #[error("Answer can't be empty")]
    Empty,
    #[error(transparent)]
    Id(#[from] IdError),
    #[error(transparent)]
    Range(#[from] RangeError),
    #[error("{0}")]
    Selection(String),
}

/// Which end of the year a bare year stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YearEdge {
    Start,
    End,
}

/// Accepts `today`, `M/D/YYYY` with or without padding, a bare year, and relative dates such as
/// `yesterday`.
pub fn parse_date(input: &str, today: NaiveDate, edge: YearEdge) -> Result<NaiveDate, InputError> {
    let input = input.trim();
    let invalid = || InputError::Date(input.to_string());

    if input.eq_ignore_ascii_case("today") {
        return Ok(today);
    }
    if input.len() == 4 && input.chars().all(|c| c.is_ascii_digit()) {
        let year = DateRange::year(input.parse().map_err(|_| invalid())?)?;
        return Ok(match edge {
            YearEdge::Start => year.start(),
            YearEdge::End => year.end(),
        });
    }
    if let Some(date) = parse_log_date(input) {
        return Ok(date);
    }
    if input.contains('/') {
        return Err(invalid());
    }

    let now = Utc.from_utc_datetime(&today.and_time(NaiveTime::MIN));
    parse_date_string(input, now, Dialect::Us)
        .map(|v| v.date_naive())
        .map_err(|_| invalid())
}

/// `never` or `N` mean the resolution doesn't expire.
pub fn parse_expiration(input: &str, today: NaiveDate) -> Result<Option<NaiveDate>, InputError> {
    let trimmed = input.trim();
    if trimmed.eq_ignore_ascii_case("never") || trimmed.eq_ignore_ascii_case("n") {
        return Ok(None);
    }
    let date = parse_date(trimmed, today, YearEdge::End)?;
    if date < today {
        return Err(InputError::PastDate(trimmed.to_string()));
    }
    Ok(Some(date))
}

pub fn parse_yes_no(input: &str) -> Result<bool, InputError> {
    match input.trim().to_lowercase().as_str() {
        "y" | "yes" => Ok(true),
        "n" | "no" => Ok(false),
        _ => Err(InputError::YesNo),
    }
}

/// Answer for a categorical resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodeAnswer {
    NotDone,
    Codes(Vec<DetailCode>),
}

/// `N` or a comma separated list of single character codes. Codes are uppercased and repeated
/// ones dropped, the typed order is kept.
pub fn parse_codes(input: &str) -> Result<CodeAnswer, InputError> {
    let input = input.trim();
    if input.eq_ignore_ascii_case("n") {
        return Ok(CodeAnswer::NotDone);
    }

    let mut codes = Vec::<DetailCode>::new();
    for part in input.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let mut chars = part.chars();
        let code = match (chars.next(), chars.next()) {
            (Some(c), None) => DetailCode::new(c),
            _ => None,
        }
        .ok_or_else(|| InputError::Code(part.to_string()))?;
        if !codes.contains(&code) {
            codes.push(code);
        }
    }

    if codes.is_empty() {
        return Err(InputError::NoCodes);
    }
    Ok(CodeAnswer::Codes(codes))
}

/// 1-based menu choice.
pub fn parse_choice(input: &str, max: usize) -> Result<usize, InputError> {
    input
        .trim()
        .parse::<usize>()
        .ok()
        .filter(|v| (1..=max).contains(v))
        .ok_or(InputError::Choice(max))
}

pub fn parse_id(input: &str) -> Result<ResolutionId, InputError> {
    Ok(ResolutionId::parse(input.trim())?)
}

/// Empty answers are `None`. Anything else names an existing resolution, so the snake_case rule
/// of new ids isn't applied.
pub fn parse_optional_id(input: &str) -> Result<Option<ResolutionId>, InputError> {
    if input.trim().is_empty() {
        return Ok(None);
    }
    Ok(Some(ResolutionId::lookup(input)?))
}

pub fn parse_text(input: &str) -> Result<String, InputError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(InputError::Empty);
    }
    Ok(input.to_string())
}

pub fn parse_selection(input: &str) -> Result<ColumnSelection, InputError> {
    input.parse().map_err(InputError::Selection)
}
