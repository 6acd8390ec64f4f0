use anyhow::{anyhow, Context, Result};
use chrono::{prelude::*, Duration, Months};
use once_cell::sync::Lazy;
use regex::Regex;

static DATE_PREFIX_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{4})-(\d{2})-(\d{2})(?:[ T](\d{2}):(\d{2})(?::(\d{2}))?)?")
        .expect("valid regex")
});

/// Resolve a user supplied date (`today`, `tomorrow`, `+3d`, `fri`, `2025-01-31`)
/// to midnight UTC of the named calendar day. RFC 3339 input keeps its time.
pub fn parse_date_spec(spec: &str) -> Result<DateTime<Utc>> {
    let trimmed = spec.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("Date specification cannot be empty"));
    }

    let lower = trimmed.to_ascii_lowercase();
    let today = Local::now().date_naive();

    match lower.as_str() {
        "today" | "now" => return Ok(day_start(today)),
        "tomorrow" => return Ok(day_start(today + Duration::days(1))),
        "yesterday" => return Ok(day_start(today - Duration::days(1))),
        _ => {}
    }

    if lower.starts_with('+') {
        return parse_relative_spec(&lower, today).map(day_start);
    }

    if let Some(weekday) = parse_weekday(&lower) {
        let mut days_ahead = (weekday.num_days_from_monday() as i64
            - today.weekday().num_days_from_monday() as i64)
            .rem_euclid(7);
        if days_ahead == 0 {
            days_ahead = 7;
        }
        return Ok(day_start(today + Duration::days(days_ahead)));
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(parsed.with_timezone(&Utc));
    }

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Ok(day_start(date));
    }

    Err(anyhow!(
        "Unrecognized date specification '{}'. Try YYYY-MM-DD, today, tomorrow, +3d, mon",
        spec
    ))
}

/// Lenient parser for dates as the backend sends them. Anything that does not
/// name a real calendar day (empty, `0000-00-00`, garbage) yields `None`.
pub fn parse_server_date(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(parsed.with_timezone(&Utc));
    }

    let caps = DATE_PREFIX_RE.captures(trimmed)?;
    let number = |idx: usize| caps.get(idx).and_then(|m| m.as_str().parse::<u32>().ok());
    let year = caps.get(1)?.as_str().parse::<i32>().ok()?;
    let date = NaiveDate::from_ymd_opt(year, number(2)?, number(3)?)?;
    let time = match (number(4), number(5)) {
        (Some(hour), Some(minute)) => {
            NaiveTime::from_hms_opt(hour, minute, number(6).unwrap_or(0))?
        }
        _ => NaiveTime::from_hms_opt(0, 0, 0)?,
    };
    Some(Utc.from_utc_datetime(&date.and_time(time)))
}

/// Format a date the way the backend stores due dates and deadlines.
pub fn format_server_date(value: &DateTime<Utc>) -> String {
    value.format("%Y-%m-%d").to_string()
}

pub fn format_server_timestamp(value: &DateTime<Utc>) -> String {
    value.format("%Y-%m-%d %H:%M:%S").to_string()
}

pub(crate) fn day_start(date: NaiveDate) -> DateTime<Utc> {
    let midnight = date.and_hms_opt(0, 0, 0).expect("midnight");
    Utc.from_utc_datetime(&midnight)
}

fn parse_relative_spec(spec: &str, today: NaiveDate) -> Result<NaiveDate> {
    let body = spec.strip_prefix('+').unwrap_or(spec);
    let (number_part, unit) = match body.char_indices().last() {
        Some((split, unit)) if split > 0 => (&body[..split], unit),
        _ => return Err(anyhow!("Relative date '{}' is too short", spec)),
    };
    let value: i64 = number_part.parse().context("Invalid relative offset")?;
    let out_of_range = || anyhow!("Relative date '{}' is out of range", spec);
    match unit {
        'd' => Duration::try_days(value)
            .and_then(|offset| today.checked_add_signed(offset))
            .ok_or_else(out_of_range),
        'w' => Duration::try_weeks(value)
            .and_then(|offset| today.checked_add_signed(offset))
            .ok_or_else(out_of_range),
        'm' => {
            let months = u32::try_from(value).map_err(|_| out_of_range())?;
            today
                .checked_add_months(Months::new(months))
                .ok_or_else(out_of_range)
        }
        other => Err(anyhow!(
            "Unsupported relative unit '{}'. Use d, w, or m.",
            other
        )),
    }
}

fn parse_weekday(label: &str) -> Option<Weekday> {
    match label {
        "mon" | "monday" => Some(Weekday::Mon),
        "tue" | "tuesday" => Some(Weekday::Tue),
        "wed" | "wednesday" => Some(Weekday::Wed),
        "thu" | "thursday" => Some(Weekday::Thu),
        "fri" | "friday" => Some(Weekday::Fri),
        "sat" | "saturday" => Some(Weekday::Sat),
        "sun" | "sunday" => Some(Weekday::Sun),
        _ => None,
    }
}
