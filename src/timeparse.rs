// src/timeparse.rs
//! Post-time normalization for the Weibo mobile feed.
//!
//! The feed renders publish times as display strings ("刚刚", "5分钟前",
//! "今天 14:30", "03-18 09:12", "2023-12-30 23:59"). [`normalize`] turns one of
//! those into an absolute wall-clock instant, resolved against a caller-given
//! reference instant. It never reads the clock and never panics, so a whole
//! run can be replayed deterministically from a fixed reference.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use once_cell::sync::OnceCell;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Placeholder the extraction layer emits when a card has no time element.
pub const UNKNOWN_TIME: &str = "未知时间";

const JUST_NOW: &str = "刚刚";
const MINUTES_AGO: &str = "分钟前";
const HOURS_AGO: &str = "小时前";
const TODAY: &str = "今天";
const YESTERDAY: &str = "昨天";

const CLOCK_FORMAT: &str = "%H:%M";
const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Why a post time could not be resolved.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, thiserror::Error,
)]
#[serde(rename_all = "snake_case")]
pub enum NormalizationFailure {
    /// Empty string or the [`UNKNOWN_TIME`] placeholder.
    #[error("post time is missing")]
    Missing,
    /// A known pattern matched but its digits or date/time fields did not parse.
    #[error("post time is malformed")]
    Malformed,
    /// No known pattern matched.
    #[error("post time format is not recognized")]
    UnrecognizedFormat,
}

impl NormalizationFailure {
    /// Stable tag used in logs and metric labels.
    pub fn reason(self) -> &'static str {
        match self {
            Self::Missing => "missing",
            Self::Malformed => "malformed",
            Self::UnrecognizedFormat => "unrecognized_format",
        }
    }
}

/// Resolve `raw` against `reference`.
///
/// Patterns are tried in a fixed order and the first match wins:
/// missing → just now → minutes ago → hours ago → today → yesterday →
/// `MM-DD HH:MM` → `YYYY-MM-DD HH:MM`. Surrounding whitespace is ignored.
pub fn normalize(
    raw: &str,
    reference: NaiveDateTime,
) -> Result<NaiveDateTime, NormalizationFailure> {
    let raw = raw.trim();
    if raw.is_empty() || raw == UNKNOWN_TIME {
        return Err(NormalizationFailure::Missing);
    }

    if raw.contains(JUST_NOW) {
        return Ok(reference);
    }
    if raw.contains(MINUTES_AGO) {
        let n = leading_number(raw)?;
        let delta = Duration::try_minutes(n).ok_or(NormalizationFailure::Malformed)?;
        return reference
            .checked_sub_signed(delta)
            .ok_or(NormalizationFailure::Malformed);
    }
    if raw.contains(HOURS_AGO) {
        let n = leading_number(raw)?;
        let delta = Duration::try_hours(n).ok_or(NormalizationFailure::Malformed)?;
        return reference
            .checked_sub_signed(delta)
            .ok_or(NormalizationFailure::Malformed);
    }
    if raw.contains(TODAY) {
        return clock_on(raw, TODAY, reference.date());
    }
    if raw.contains(YESTERDAY) {
        let day = reference
            .date()
            .pred_opt()
            .ok_or(NormalizationFailure::Malformed)?;
        return clock_on(raw, YESTERDAY, day);
    }

    if raw.contains(':') {
        match raw.split('-').count() {
            // MM-DD HH:MM, the year is implied by the reference
            2 => return parse_datetime(&format!("{}-{}", reference.year(), raw)),
            3 => return parse_datetime(raw),
            _ => {}
        }
    }

    Err(NormalizationFailure::UnrecognizedFormat)
}

/// First run of digits in `s`, e.g. `5` in "5分钟前".
fn leading_number(s: &str) -> Result<i64, NormalizationFailure> {
    static RE_DIGITS: OnceCell<Regex> = OnceCell::new();
    let re = RE_DIGITS.get_or_init(|| Regex::new(r"\d+").unwrap());
    re.find(s)
        .and_then(|m| m.as_str().parse::<i64>().ok())
        .ok_or(NormalizationFailure::Malformed)
}

fn clock_on(
    raw: &str,
    token: &str,
    day: NaiveDate,
) -> Result<NaiveDateTime, NormalizationFailure> {
    let clock = raw.replace(token, "");
    NaiveTime::parse_from_str(clock.trim(), CLOCK_FORMAT)
        .map(|t| day.and_time(t))
        .map_err(|_| NormalizationFailure::Malformed)
}

fn parse_datetime(s: &str) -> Result<NaiveDateTime, NormalizationFailure> {
    NaiveDateTime::parse_from_str(s, DATETIME_FORMAT).map_err(|_| NormalizationFailure::Malformed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32, hh: u32, mm: u32, ss: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(hh, mm, ss)
            .unwrap()
    }

    #[test]
    fn missing_and_placeholder() {
        let r = at(2024, 1, 1, 12, 0, 0);
        assert_eq!(normalize("", r), Err(NormalizationFailure::Missing));
        assert_eq!(normalize("   ", r), Err(NormalizationFailure::Missing));
        assert_eq!(normalize(UNKNOWN_TIME, r), Err(NormalizationFailure::Missing));
    }

    #[test]
    fn relative_phrases() {
        let r = at(2024, 1, 1, 12, 0, 30);
        assert_eq!(normalize("刚刚", r), Ok(r));
        assert_eq!(normalize("30分钟前", r), Ok(at(2024, 1, 1, 11, 30, 30)));
        assert_eq!(normalize("13小时前", r), Ok(at(2023, 12, 31, 23, 0, 30)));
        assert_eq!(normalize(" 0分钟前 ", r), Ok(r));
    }

    #[test]
    fn relative_without_digits_is_malformed() {
        let r = at(2024, 1, 1, 12, 0, 0);
        assert_eq!(normalize("几分钟前", r), Err(NormalizationFailure::Malformed));
        assert_eq!(normalize("小时前", r), Err(NormalizationFailure::Malformed));
        assert_eq!(
            normalize("99999999999999999999分钟前", r),
            Err(NormalizationFailure::Malformed)
        );
        assert_eq!(
            normalize("999999999999小时前", r),
            Err(NormalizationFailure::Malformed)
        );
    }

    #[test]
    fn today_and_yesterday() {
        let r = at(2024, 3, 1, 0, 10, 0);
        assert_eq!(normalize("今天 14:30", r), Ok(at(2024, 3, 1, 14, 30, 0)));
        assert_eq!(normalize("今天14:30", r), Ok(at(2024, 3, 1, 14, 30, 0)));
        // leap year: day before March 1st
        assert_eq!(normalize("昨天 09:05", r), Ok(at(2024, 2, 29, 9, 5, 0)));
        assert_eq!(normalize("今天 25:00", r), Err(NormalizationFailure::Malformed));
        assert_eq!(normalize("昨天", r), Err(NormalizationFailure::Malformed));
    }

    #[test]
    fn absolute_dates() {
        let r = at(2024, 6, 15, 8, 0, 0);
        assert_eq!(normalize("03-18 09:12", r), Ok(at(2024, 3, 18, 9, 12, 0)));
        assert_eq!(
            normalize("2023-12-30 23:59", r),
            Ok(at(2023, 12, 30, 23, 59, 0))
        );
        // absolute times are trusted even when they lie after the reference
        assert_eq!(normalize("12-31 10:00", r), Ok(at(2024, 12, 31, 10, 0, 0)));
    }

    #[test]
    fn absolute_calendar_errors_are_malformed() {
        let r = at(2023, 6, 15, 8, 0, 0);
        assert_eq!(normalize("02-29 10:00", r), Err(NormalizationFailure::Malformed));
        assert_eq!(
            normalize("2024-13-01 10:00", r),
            Err(NormalizationFailure::Malformed)
        );
    }

    #[test]
    fn unknown_shapes_are_unrecognized() {
        let r = at(2024, 1, 1, 12, 0, 0);
        for s in ["03-18", "前天", "10:00", "2024-01-01-01 10:00", "yesterday"] {
            assert_eq!(
                normalize(s, r),
                Err(NormalizationFailure::UnrecognizedFormat),
                "{s}"
            );
        }
    }

    #[test]
    fn reason_tags_match_serde_names() {
        for f in [
            NormalizationFailure::Missing,
            NormalizationFailure::Malformed,
            NormalizationFailure::UnrecognizedFormat,
        ] {
            let json = serde_json::to_string(&f).unwrap();
            assert_eq!(json, format!("\"{}\"", f.reason()));
        }
    }
}
