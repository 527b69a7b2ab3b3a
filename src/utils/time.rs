use chrono::{Datelike, NaiveDate};

/// This is the standard way of converting a date to a string in resolve. Months and days are
/// never zero padded, so the 3rd of January 2023 becomes `1/3/2023`.
pub fn format_log_date(date: NaiveDate) -> String {
    format!("{}/{}/{}", date.month(), date.day(), date.year())
}

/// Parses `M/D/YYYY`. Zero padded months and days are accepted as well.
pub fn parse_log_date(value: &str) -> Option<NaiveDate> {
    let mut parts = value.trim().split('/');
    let month = parts.next()?.trim().parse::<u32>().ok()?;
    let day = parts.next()?.trim().parse::<u32>().ok()?;
    let year = parts.next()?.trim();
    if parts.next().is_some() || year.len() != 4 {
        return None;
    }
    NaiveDate::from_ymd_opt(year.parse::<i32>().ok()?, month, day)
}

/// Used for export artifacts, where `/` can't be part of a file name.
pub fn date_to_file_name(date: NaiveDate) -> String {
    format_log_date(date).replace('/', "-")
}
