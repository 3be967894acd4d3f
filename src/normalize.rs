//! Header normalization and numeric coercion.
//!
//! Headers are trimmed and lower-cased once, before any column lookup.
//! Numeric columns in recruitment sheets mix clean integers with annotated
//! text ("10+", "5,000", "12%"). [`force_numeric`] takes the first numeric
//! token of a value and truncates it to an integer; a value without one
//! becomes 0.

use std::collections::{BTreeMap, HashSet};
use std::sync::OnceLock;

use color_eyre::Result;
use polars::prelude::*;
use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::error::LoadError;

fn number_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[-+]?\d*\.?\d+").expect("number pattern is valid"))
}

pub fn normalize_header(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Rename every column to its trimmed, lower-cased form.
///
/// Idempotent. Two headers that collapse to the same name are rejected
/// rather than silently merged.
pub fn normalize_headers(df: DataFrame) -> std::result::Result<DataFrame, LoadError> {
    let mut seen = HashSet::new();
    let mut columns: Vec<Column> = Vec::with_capacity(df.width());
    for column in df.get_columns() {
        let name = normalize_header(column.name().as_str());
        if !seen.insert(name.clone()) {
            return Err(LoadError::DuplicateColumn(name));
        }
        columns.push(
            column
                .as_materialized_series()
                .clone()
                .with_name(name.as_str().into())
                .into(),
        );
    }
    Ok(DataFrame::new(columns)?)
}

/// First numeric token of `raw` (commas removed), truncated toward zero.
/// None when the value holds no number.
pub fn parse_numeric(raw: &str) -> Option<i64> {
    let cleaned = raw.replace(',', "");
    let token = number_pattern().find(&cleaned)?;
    let value: f64 = token.as_str().parse().ok()?;
    Some(value.trunc() as i64)
}

pub fn force_numeric(raw: &str) -> i64 {
    parse_numeric(raw).unwrap_or(0)
}

/// Per-column count of values that held no number and were defaulted to 0.
/// Blank cells are not counted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CoercionReport {
    pub defaulted: BTreeMap<String, usize>,
}

impl CoercionReport {
    pub fn total(&self) -> usize {
        self.defaulted.values().sum()
    }

    pub fn merge(&mut self, other: CoercionReport) {
        for (column, count) in other.defaulted {
            *self.defaulted.entry(column).or_insert(0) += count;
        }
    }
}

/// Coerce each listed column that is present to Int64 with [`force_numeric`].
/// Absent columns are skipped. Numeric cells are stringified first, so `10.0`
/// becomes 10; nulls become 0.
pub fn coerce_numeric_columns(
    mut df: DataFrame,
    columns: &[&str],
) -> Result<(DataFrame, CoercionReport)> {
    let mut report = CoercionReport::default();
    for &name in columns {
        let Ok(column) = df.column(name) else {
            continue;
        };
        let text = column.cast(&DataType::String)?;
        let mut defaulted = 0usize;
        let values: Vec<i64> = text
            .str()?
            .into_iter()
            .map(|cell| match cell {
                Some(raw) => parse_numeric(raw).unwrap_or_else(|| {
                    if !raw.trim().is_empty() {
                        defaulted += 1;
                    }
                    0
                }),
                None => 0,
            })
            .collect();
        if defaulted > 0 {
            debug!(column = name, defaulted, "non-numeric values defaulted to 0");
            report.defaulted.insert(name.to_string(), defaulted);
        }
        df.with_column(Series::new(name.into(), values))?;
    }
    Ok((df, report))
}
