//! Timestamp presentation in the configured display offset.

use time::macros::{format_description, offset};
use time::{OffsetDateTime, UtcOffset};

use crate::error::Result;

/// India Standard Time (UTC+05:30, no daylight saving).
pub const DEFAULT_DISPLAY_OFFSET: UtcOffset = offset!(+5:30);

/// Format `at` in `offset` as `YYYYMMDD_HHMMSS`, for file names.
pub fn compact_stamp(at: OffsetDateTime, offset: UtcOffset) -> Result<String> {
    let format = format_description!("[year][month][day]_[hour][minute][second]");
    Ok(at.to_offset(offset).format(format)?)
}

/// Format `at` in `offset` as `YYYY-MM-DD HH:MM:SS`, dropping the offset.
pub fn display_stamp(at: OffsetDateTime, offset: UtcOffset) -> Result<String> {
    let format = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    Ok(at.to_offset(offset).format(format)?)
}

/// Parse an offset written as `+HH:MM` or `-HH:MM`.
///
/// ```
/// use envcam_store::clock::parse_utc_offset;
///
/// assert_eq!(parse_utc_offset("+05:30").unwrap().whole_minutes(), 330);
/// assert_eq!(parse_utc_offset("-03:00").unwrap().whole_hours(), -3);
/// assert!(parse_utc_offset("IST").is_err());
/// ```
pub fn parse_utc_offset(raw: &str) -> std::result::Result<UtcOffset, time::error::Parse> {
    let format = format_description!("[offset_hour sign:mandatory]:[offset_minute]");
    UtcOffset::parse(raw, format)
}
