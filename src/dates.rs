//! Date parsing and range filtering at day granularity.
//!
//! Rows whose date does not parse are dropped, never errored: reports cover
//! well-formed history and legacy remnants (repeated headers, blanks) must
//! not abort a run. A date column holding only small numbers is treated as a
//! day-of-month ordinal instead of a calendar date.

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use color_eyre::Result;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ParseWarning;

/// Name of the column added by [`parse_day_column`].
pub const DAY_COLUMN: &str = "day";

/// Spellings the workbook loader uses for date cells it writes into a text
/// column. Every [`DateFormat`] accepts them.
pub(crate) const STAMP_DATE: &str = "%Y-%m-%d";
pub(crate) const STAMP_DATETIME: &str = "%Y-%m-%d %H:%M:%S";

/// Formats tried, in order, by [`DateFormat::Inferred`]. Month-first before
/// day-first for slashed dates.
const INFERRED_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%d-%b-%y",
    "%d-%b-%Y",
    "%m/%d/%Y",
    "%d/%m/%Y",
    "%Y/%m/%d",
    "%d.%m.%Y",
    "%d %b %Y",
    "%d %B %Y",
    "%b %d, %Y",
    "%B %d, %Y",
];

const INFERRED_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DateFormat {
    /// A single strftime format, e.g. `%d-%b-%y` for "05-Mar-24"
    Fixed(String),
    /// ISO and common day-first/month-name spellings
    Inferred,
}

impl DateFormat {
    pub fn fixed(format: impl Into<String>) -> Self {
        DateFormat::Fixed(format.into())
    }

    /// Config/CLI spelling: "infer" selects [`DateFormat::Inferred`], anything
    /// else is a strftime format.
    pub fn from_setting(setting: &str) -> Self {
        if setting.trim().eq_ignore_ascii_case("infer") {
            DateFormat::Inferred
        } else {
            DateFormat::fixed(setting)
        }
    }

    /// Parse one cell. Time of day, if any, is discarded. A fixed format
    /// also accepts the loader's stamp spellings, so date-typed workbook
    /// cells in a column with stray text still parse.
    pub fn parse(&self, raw: &str) -> Option<NaiveDate> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        match self {
            DateFormat::Fixed(format) => parse_with(raw, format)
                .or_else(|| NaiveDate::parse_from_str(raw, STAMP_DATE).ok())
                .or_else(|| {
                    NaiveDateTime::parse_from_str(raw, STAMP_DATETIME)
                        .ok()
                        .map(|dt| dt.date())
                }),
            DateFormat::Inferred => INFERRED_FORMATS
                .iter()
                .find_map(|f| NaiveDate::parse_from_str(raw, f).ok())
                .or_else(|| {
                    INFERRED_DATETIME_FORMATS
                        .iter()
                        .find_map(|f| NaiveDateTime::parse_from_str(raw, f).ok())
                        .map(|dt| dt.date())
                }),
        }
    }
}

fn parse_with(raw: &str, format: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, format).ok().or_else(|| {
        NaiveDateTime::parse_from_str(raw, format)
            .ok()
            .map(|dt| dt.date())
    })
}

/// Inclusive range of calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateRange {
    pub fn new(from: NaiveDate, to: NaiveDate) -> Self {
        Self { from, to }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from <= date && date <= self.to
    }
}

/// Inclusive range of day-of-month ordinals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayRange {
    pub from: i64,
    pub to: i64,
}

impl DayRange {
    pub fn new(from: i64, to: i64) -> Self {
        Self { from, to }
    }

    pub fn contains(&self, day: i64) -> bool {
        self.from <= day && day <= self.to
    }
}

/// Range asked for by a caller. An open end falls back to the earliest or
/// latest value in the data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeRequest<T> {
    pub from: Option<T>,
    pub to: Option<T>,
}

impl<T> Default for RangeRequest<T> {
    fn default() -> Self {
        Self {
            from: None,
            to: None,
        }
    }
}

impl<T> RangeRequest<T> {
    pub fn new(from: Option<T>, to: Option<T>) -> Self {
        Self { from, to }
    }

    pub fn between(from: T, to: T) -> Self {
        Self::new(Some(from), Some(to))
    }
}

impl RangeRequest<NaiveDate> {
    pub fn resolve(self, bounds: Option<DateRange>) -> Option<DateRange> {
        let from = self.from.or(bounds.map(|b| b.from))?;
        let to = self.to.or(bounds.map(|b| b.to))?;
        Some(DateRange::new(from, to))
    }
}

impl RangeRequest<i64> {
    pub fn resolve(self, bounds: Option<DayRange>) -> Option<DayRange> {
        let from = self.from.or(bounds.map(|b| b.from))?;
        let to = self.to.or(bounds.map(|b| b.to))?;
        Some(DayRange::new(from, to))
    }
}

/// How a date-like column is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DateAxis {
    Calendar,
    /// Values are plain day-of-month numbers with no month or year
    DayOfMonth,
}

fn epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default()
}

pub(crate) fn days_since_epoch(date: NaiveDate) -> i64 {
    (date - epoch()).num_days()
}

fn date_from_epoch_days(days: i32) -> Option<NaiveDate> {
    epoch().checked_add_signed(TimeDelta::days(i64::from(days)))
}

/// Per-row dates of a column. Cells already typed Date/Datetime are taken as
/// they are; everything else is stringified and parsed with `format`.
pub fn column_dates(column: &Column, format: &DateFormat) -> Result<Vec<Option<NaiveDate>>> {
    match column.dtype() {
        DataType::Date | DataType::Datetime(_, _) => {
            let days = column.cast(&DataType::Date)?.cast(&DataType::Int32)?;
            Ok(days
                .i32()?
                .into_iter()
                .map(|d| d.and_then(date_from_epoch_days))
                .collect())
        }
        _ => {
            let text = column.cast(&DataType::String)?;
            Ok(text
                .str()?
                .into_iter()
                .map(|cell| cell.and_then(|raw| format.parse(raw)))
                .collect())
        }
    }
}

fn date_series(name: &str, dates: &[Option<NaiveDate>]) -> PolarsResult<Series> {
    let days: Vec<Option<i32>> = dates
        .iter()
        .map(|d| d.map(|d| days_since_epoch(d) as i32))
        .collect();
    Series::new(name.into(), days).cast(&DataType::Date)
}

fn keep_rows(df: &DataFrame, keep: &[bool]) -> PolarsResult<DataFrame> {
    let mask = BooleanChunked::from_slice("keep".into(), keep);
    df.filter(&mask)
}

/// Frame with `column` replaced by a Date column and unparseable rows removed.
#[derive(Debug, Clone)]
pub struct ParsedDates {
    pub frame: DataFrame,
    pub warning: Option<ParseWarning>,
}

pub fn parse_date_column(df: &DataFrame, column: &str, format: &DateFormat) -> Result<ParsedDates> {
    let dates = column_dates(df.column(column)?, format)?;
    let keep: Vec<bool> = dates.iter().map(Option::is_some).collect();
    let dropped = keep.iter().filter(|k| !**k).count();

    let mut frame = df.clone();
    frame.with_column(date_series(column, &dates)?)?;
    let frame = keep_rows(&frame, &keep)?;

    let warning = (dropped > 0).then(|| {
        debug!(column, dropped, "rows with unparseable dates dropped");
        ParseWarning {
            column: column.to_string(),
            dropped_rows: dropped,
        }
    });
    Ok(ParsedDates { frame, warning })
}

/// Rows whose `column` date falls inside `range`. Idempotent.
pub fn filter_date_range(df: &DataFrame, column: &str, range: DateRange) -> Result<DataFrame> {
    let dates = column_dates(df.column(column)?, &DateFormat::Inferred)?;
    let keep: Vec<bool> = dates
        .iter()
        .map(|d| d.is_some_and(|d| range.contains(d)))
        .collect();
    Ok(keep_rows(df, &keep)?)
}

/// Earliest and latest date in `column`, None when it holds no dates.
pub fn date_bounds(df: &DataFrame, column: &str) -> Result<Option<DateRange>> {
    let dates = column_dates(df.column(column)?, &DateFormat::Inferred)?;
    let mut iter = dates.into_iter().flatten();
    let Some(first) = iter.next() else {
        return Ok(None);
    };
    let (min, max) = iter.fold((first, first), |(lo, hi), d| (lo.min(d), hi.max(d)));
    Ok(Some(DateRange::new(min, max)))
}

fn column_numbers(column: &Column) -> Result<Vec<Option<f64>>> {
    let text = column.cast(&DataType::String)?;
    Ok(text
        .str()?
        .into_iter()
        .map(|cell| cell.and_then(|raw| raw.trim().parse::<f64>().ok()))
        .collect())
}

/// DayOfMonth when every non-null value is a number no greater than 31.
/// Any larger value, any non-numeric text, or a temporal column means
/// Calendar. A column with no values at all counts as DayOfMonth.
pub fn detect_axis(df: &DataFrame, column: &str) -> Result<DateAxis> {
    let column = df.column(column)?;
    if matches!(column.dtype(), DataType::Date | DataType::Datetime(_, _)) {
        return Ok(DateAxis::Calendar);
    }
    let text = column.cast(&DataType::String)?;
    let numbers = column_numbers(column)?;
    let day_mode = text
        .str()?
        .into_iter()
        .zip(numbers)
        .all(|(raw, number)| match (raw, number) {
            (None, _) => true,
            (Some(_), Some(n)) => n.is_finite() && n <= 31.0,
            (Some(raw), None) => raw.trim().is_empty(),
        });
    Ok(if day_mode {
        DateAxis::DayOfMonth
    } else {
        DateAxis::Calendar
    })
}

/// Adds an Int64 [`DAY_COLUMN`] from the numeric values of `column`, dropping
/// rows without a number.
pub fn parse_day_column(df: &DataFrame, column: &str) -> Result<ParsedDates> {
    let days: Vec<Option<i64>> = column_numbers(df.column(column)?)?
        .into_iter()
        .map(|n| n.map(|n| n.trunc() as i64))
        .collect();
    let keep: Vec<bool> = days.iter().map(Option::is_some).collect();
    let dropped = keep.iter().filter(|k| !**k).count();

    let mut frame = df.clone();
    frame.with_column(Series::new(DAY_COLUMN.into(), days))?;
    let frame = keep_rows(&frame, &keep)?;

    let warning = (dropped > 0).then(|| ParseWarning {
        column: column.to_string(),
        dropped_rows: dropped,
    });
    Ok(ParsedDates { frame, warning })
}

pub fn filter_day_range(df: &DataFrame, range: DayRange) -> Result<DataFrame> {
    let days = df.column(DAY_COLUMN)?.cast(&DataType::Int64)?;
    let keep: Vec<bool> = days
        .i64()?
        .into_iter()
        .map(|d| d.is_some_and(|d| range.contains(d)))
        .collect();
    Ok(keep_rows(df, &keep)?)
}

pub fn day_bounds(df: &DataFrame) -> Result<Option<DayRange>> {
    let days = df.column(DAY_COLUMN)?.cast(&DataType::Int64)?;
    let days = days.i64()?;
    Ok(match (days.min(), days.max()) {
        (Some(min), Some(max)) => Some(DayRange::new(min, max)),
        _ => None,
    })
}
