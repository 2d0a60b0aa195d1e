//! Time window resolver (spec §4.1): map a week label to a `[start, end]` instant
//! pair in the configured timezone. Deterministic and side-effect free.

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use digest_common::{DigestError, WeekWindow};
use regex::Regex;

fn week_label_pattern() -> &'static Regex {
    static RE: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d{4})-W(\d{1,2})$").unwrap())
}

/// Resolve `week_label` (e.g. `"2026-W07"`) to the inclusive Monday-00:00 through
/// Sunday-23:59:59.999 window in `tz`, expressed in UTC.
pub fn resolve(week_label: &str, tz: &str) -> Result<WeekWindow, DigestError> {
    let caps = week_label_pattern()
        .captures(week_label)
        .ok_or_else(|| DigestError::InvalidWeekLabel(week_label.to_string()))?;

    let year: i32 = caps[1]
        .parse()
        .map_err(|_| DigestError::InvalidWeekLabel(week_label.to_string()))?;
    let week: u32 = caps[2]
        .parse()
        .map_err(|_| DigestError::InvalidWeekLabel(week_label.to_string()))?;

    if !(1..=53).contains(&week) {
        return Err(DigestError::InvalidWeekLabel(week_label.to_string()));
    }

    let zone: Tz = tz
        .parse()
        .map_err(|_| DigestError::InvalidCalendar(format!("unknown timezone '{tz}'")))?;

    // ISO week 1 contains the year's first Thursday; Jan 4 always falls in it.
    let jan4 = NaiveDate::from_ymd_opt(year, 1, 4)
        .ok_or_else(|| DigestError::InvalidCalendar(format!("invalid year {year}")))?;
    let jan4_weekday = jan4.weekday().num_days_from_monday();
    let week1_monday = jan4 - Duration::days(jan4_weekday as i64);
    let target_monday = week1_monday + Duration::weeks((week - 1) as i64);

    // Weeks beyond the ISO calendar's actual week count (52 or 53) roll into next year's week 1.
    let next_jan4 = NaiveDate::from_ymd_opt(year + 1, 1, 4)
        .ok_or_else(|| DigestError::InvalidCalendar(format!("invalid year {}", year + 1)))?;
    let next_week1_monday = next_jan4 - Duration::days(next_jan4.weekday().num_days_from_monday() as i64);
    if target_monday >= next_week1_monday {
        return Err(DigestError::InvalidCalendar(format!(
            "{year} has no ISO week {week}"
        )));
    }

    let start_local = target_monday
        .and_hms_milli_opt(0, 0, 0, 0)
        .expect("valid time components");
    let end_local = (target_monday + Duration::days(7))
        .and_hms_milli_opt(0, 0, 0, 0)
        .expect("valid time components")
        - Duration::milliseconds(1);

    let start = local_to_utc(&zone, start_local)?;
    let end = local_to_utc(&zone, end_local)?;

    Ok(WeekWindow {
        label: week_label.to_string(),
        tz: tz.to_string(),
        start,
        end,
    })
}

fn local_to_utc(
    zone: &Tz,
    naive: chrono::NaiveDateTime,
) -> Result<DateTime<Utc>, DigestError> {
    zone.from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| {
            DigestError::InvalidCalendar(format!(
                "local time {naive} is ambiguous or nonexistent in {zone}"
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_malformed_label() {
        assert!(resolve("2026-7", "UTC").is_err());
        assert!(resolve("banana", "UTC").is_err());
        assert!(resolve("2026-W54", "UTC").is_err());
        assert!(resolve("2026-W00", "UTC").is_err());
    }

    #[test]
    fn resolves_monday_start_and_sunday_end_in_utc() {
        let window = resolve("2026-W05", "UTC").unwrap();
        assert_eq!(window.start.format("%A").to_string(), "Monday");
        assert_eq!(window.start.format("%H:%M:%S%.3f").to_string(), "00:00:00.000");
        assert_eq!(window.end.format("%A").to_string(), "Sunday");
        assert_eq!(window.end.format("%H:%M:%S%.3f").to_string(), "23:59:59.999");
    }

    #[test]
    fn week_spans_exactly_seven_days() {
        let window = resolve("2026-W10", "UTC").unwrap();
        let span = window.end - window.start;
        assert_eq!(span.num_milliseconds(), Duration::days(7).num_milliseconds() - 1);
    }

    #[test]
    fn resolution_is_deterministic() {
        let a = resolve("2026-W22", "America/New_York").unwrap();
        let b = resolve("2026-W22", "America/New_York").unwrap();
        assert_eq!(a.start, b.start);
        assert_eq!(a.end, b.end);
    }

    #[test]
    fn rejects_unknown_timezone() {
        assert!(resolve("2026-W05", "Not/AZone").is_err());
    }

    #[test]
    fn rejects_out_of_range_week_for_year() {
        // 2023 is a 52-week ISO year (Jan 1 falls on a Sunday).
        assert!(resolve("2023-W53", "UTC").is_err());
    }
}
