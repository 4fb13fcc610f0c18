//! Date and interval helpers shared by constant folding and the executor.
use chrono::{Datelike, Duration, Months, NaiveDate, NaiveDateTime};

/// Interval units understood by folding and execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntervalUnit {
    Year,
    Quarter,
    Month,
    Week,
    Day,
    Hour,
    Minute,
    Second,
}

impl IntervalUnit {
    /// Parse a unit keyword, accepting plural forms (`DAYS`) and any case.
    pub fn parse(unit: &str) -> Option<Self> {
        let upper = unit.trim().to_uppercase();
        let singular = upper.strip_suffix('S').unwrap_or(&upper);
        match singular {
            "YEAR" => Some(IntervalUnit::Year),
            "QUARTER" => Some(IntervalUnit::Quarter),
            "MONTH" => Some(IntervalUnit::Month),
            "WEEK" => Some(IntervalUnit::Week),
            "DAY" => Some(IntervalUnit::Day),
            "HOUR" => Some(IntervalUnit::Hour),
            "MINUTE" => Some(IntervalUnit::Minute),
            "SECOND" => Some(IntervalUnit::Second),
            _ => None,
        }
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            IntervalUnit::Year => "YEAR",
            IntervalUnit::Quarter => "QUARTER",
            IntervalUnit::Month => "MONTH",
            IntervalUnit::Week => "WEEK",
            IntervalUnit::Day => "DAY",
            IntervalUnit::Hour => "HOUR",
            IntervalUnit::Minute => "MINUTE",
            IntervalUnit::Second => "SECOND",
        }
    }

    /// Whether adding this unit to a plain date keeps it a date.
    pub fn is_date_part(&self) -> bool {
        matches!(
            self,
            IntervalUnit::Year
                | IntervalUnit::Quarter
                | IntervalUnit::Month
                | IntervalUnit::Week
                | IntervalUnit::Day
        )
    }
}

/// Split an interval string such as `'30 days'` into amount and unit.
pub fn split_interval(text: &str) -> Option<(i64, IntervalUnit)> {
    let mut parts = text.split_whitespace();
    let amount = parts.next()?.parse::<i64>().ok()?;
    let unit = IntervalUnit::parse(parts.next()?)?;
    if parts.next().is_some() {
        return None;
    }
    Some((amount, unit))
}

pub fn parse_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d").ok()
}

pub fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .or_else(|| parse_date(text).and_then(|d| d.and_hms_opt(0, 0, 0)))
}

/// Shift a date by `amount` units. `None` on overflow or for sub-day units.
pub fn add_to_date(date: NaiveDate, amount: i64, unit: IntervalUnit) -> Option<NaiveDate> {
    match unit {
        IntervalUnit::Year => shift_months(date, amount.checked_mul(12)?),
        IntervalUnit::Quarter => shift_months(date, amount.checked_mul(3)?),
        IntervalUnit::Month => shift_months(date, amount),
        IntervalUnit::Week => date.checked_add_signed(Duration::try_weeks(amount)?),
        IntervalUnit::Day => date.checked_add_signed(Duration::try_days(amount)?),
        _ => None,
    }
}

pub fn add_to_timestamp(
    ts: NaiveDateTime,
    amount: i64,
    unit: IntervalUnit,
) -> Option<NaiveDateTime> {
    match unit {
        IntervalUnit::Hour => ts.checked_add_signed(Duration::try_hours(amount)?),
        IntervalUnit::Minute => ts.checked_add_signed(Duration::try_minutes(amount)?),
        IntervalUnit::Second => ts.checked_add_signed(Duration::try_seconds(amount)?),
        date_unit => {
            let date = add_to_date(ts.date(), amount, date_unit)?;
            Some(date.and_time(ts.time()))
        }
    }
}

fn shift_months(date: NaiveDate, months: i64) -> Option<NaiveDate> {
    let magnitude = u32::try_from(months.unsigned_abs()).ok()?;
    if months >= 0 {
        date.checked_add_months(Months::new(magnitude))
    } else {
        date.checked_sub_months(Months::new(magnitude))
    }
}

pub fn format_date(date: NaiveDate) -> String {
    format!("{:04}-{:02}-{:02}", date.year(), date.month(), date.day())
}

pub fn format_timestamp(ts: NaiveDateTime) -> String {
    ts.format("%Y-%m-%d %H:%M:%S").to_string()
}
