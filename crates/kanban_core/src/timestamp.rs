//! Timestamps are stored as UTC text in SQLite's `CURRENT_TIMESTAMP` shape, so text order is
//! chronological order and `ORDER BY date_added` needs no conversion.

use crate::error::AppError;
use time::format_description::BorrowedFormatItem;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, Duration, OffsetDateTime, PrimitiveDateTime, UtcOffset};

const STORAGE_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
const MINUTE_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]");
const LOCAL_INPUT_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]");
const DATE_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");

pub fn now() -> OffsetDateTime {
    OffsetDateTime::now_utc()
}

pub fn format(value: OffsetDateTime) -> Result<String, AppError> {
    value
        .to_offset(UtcOffset::UTC)
        .format(STORAGE_FORMAT)
        .map_err(|err| AppError::invalid_data(err.to_string()))
}

/// Deadline given to tasks created without one.
pub fn default_deadline(created: OffsetDateTime) -> OffsetDateTime {
    created + Duration::days(1)
}

pub fn parse(raw: &str) -> Result<OffsetDateTime, AppError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AppError::invalid_input("timestamp is required"));
    }

    if let Ok(parsed) = OffsetDateTime::parse(trimmed, &Rfc3339) {
        return Ok(parsed.to_offset(UtcOffset::UTC));
    }

    for shape in [STORAGE_FORMAT, MINUTE_FORMAT, LOCAL_INPUT_FORMAT] {
        if let Ok(parsed) = PrimitiveDateTime::parse(trimmed, shape) {
            return Ok(parsed.assume_utc());
        }
    }

    if let Ok(date) = Date::parse(trimmed, DATE_FORMAT) {
        return Ok(date.midnight().assume_utc());
    }

    Err(AppError::invalid_input(format!(
        "invalid timestamp '{trimmed}' (expected YYYY-MM-DD, YYYY-MM-DD HH:MM[:SS] or RFC3339)"
    )))
}

/// Parses any accepted input shape and rewrites it in the storage shape.
pub fn normalize(raw: &str) -> Result<String, AppError> {
    format(parse(raw)?)
}

#[cfg(test)]
mod tests {
    use super::{default_deadline, format, normalize, parse};
    use time::macros::datetime;

    #[test]
    fn normalize_accepts_supported_shapes() {
        assert_eq!(normalize("2025-01-01").unwrap(), "2025-01-01 00:00:00");
        assert_eq!(normalize("2025-01-01 09:30").unwrap(), "2025-01-01 09:30:00");
        assert_eq!(normalize("2025-01-01T09:30").unwrap(), "2025-01-01 09:30:00");
        assert_eq!(
            normalize("2025-01-01 09:30:15").unwrap(),
            "2025-01-01 09:30:15"
        );
        assert_eq!(
            normalize("2025-01-01T09:30:00+02:00").unwrap(),
            "2025-01-01 07:30:00"
        );
    }

    #[test]
    fn parse_rejects_garbage() {
        assert_eq!(parse("tomorrow").unwrap_err().code(), "invalid_input");
        assert_eq!(parse("   ").unwrap_err().code(), "invalid_input");
    }

    #[test]
    fn default_deadline_is_one_day_later() {
        let created = datetime!(2025-12-31 23:00 UTC);
        assert_eq!(
            format(default_deadline(created)).unwrap(),
            "2026-01-01 23:00:00"
        );
    }
}
