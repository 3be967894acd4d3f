//! Prepare chart series from report tables: select x/y (and an optional
//! grouping column), collect, and convert to (f64, f64) points.

use chrono::NaiveDate;
use color_eyre::Result;
use polars::prelude::*;
use serde::Serialize;

use crate::aggregate::label;
use crate::dates::days_since_epoch;

const CHART_ROW_LIMIT: usize = 10_000;

/// How x values map back to labels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum XAxisKind {
    Numeric,
    Date, // x = days since Unix epoch
    DayOfMonth,
}

impl XAxisKind {
    pub fn format(self, x: f64) -> String {
        match self {
            XAxisKind::Date => date_from_x(x)
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| x.to_string()),
            XAxisKind::DayOfMonth => format!("{}", x as i64),
            XAxisKind::Numeric => x.to_string(),
        }
    }
}

fn date_from_x(x: f64) -> Option<NaiveDate> {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1)?;
    epoch.checked_add_signed(chrono::TimeDelta::days(x as i64))
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChartSeries {
    pub name: String,
    pub points: Vec<(f64, f64)>,
}

/// Line chart: one series per group, in first-seen order.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChartData {
    pub x_column: String,
    pub y_column: String,
    pub x_kind: XAxisKind,
    pub series: Vec<ChartSeries>,
}

fn x_axis_kind(dtype: &DataType, day_axis: bool) -> XAxisKind {
    match dtype {
        DataType::Date | DataType::Datetime(_, _) => XAxisKind::Date,
        _ if day_axis => XAxisKind::DayOfMonth,
        _ => XAxisKind::Numeric,
    }
}

/// Builds line series of `y` against `x` from `df`.
///
/// Dates become days since the epoch. Rows with a null x or y are dropped and
/// at most `CHART_ROW_LIMIT` rows are used. With `group`, rows are split into
/// one series per group value; a null group value is labelled like a blank
/// table key.
pub fn line_series(
    df: &DataFrame,
    x: &str,
    y: &str,
    group: Option<&str>,
    day_axis: bool,
) -> Result<ChartData> {
    let x_dtype = df.column(x)?.dtype().clone();
    let x_kind = x_axis_kind(&x_dtype, day_axis);

    // Date/Datetime go through Date so every kind lands on whole days.
    let x_expr: Expr = match x_dtype {
        DataType::Date | DataType::Datetime(_, _) => col(x)
            .cast(DataType::Date)
            .cast(DataType::Int32)
            .cast(DataType::Float64),
        _ => col(x).cast(DataType::Float64),
    };
    let mut select_exprs = vec![x_expr.alias("x"), col(y).cast(DataType::Float64).alias("y")];
    if let Some(group) = group {
        select_exprs.push(col(group).cast(DataType::String).alias("group"));
    }

    let points = df
        .clone()
        .lazy()
        .select(select_exprs)
        .slice(0, CHART_ROW_LIMIT as u32)
        .collect()?;

    let xs = points.column("x")?.f64()?;
    let ys = points.column("y")?.f64()?;
    let groups = match group {
        Some(_) => Some(points.column("group")?),
        None => None,
    };

    let mut series: Vec<ChartSeries> = Vec::new();
    for i in 0..points.height() {
        let (Some(x_val), Some(y_val)) = (xs.get(i), ys.get(i)) else {
            continue;
        };
        if !x_val.is_finite() || !y_val.is_finite() {
            continue;
        }
        let name = match groups {
            Some(groups) => label(&groups.get(i)?),
            None => y.to_string(),
        };
        match series.iter_mut().find(|s| s.name == name) {
            Some(existing) => existing.points.push((x_val, y_val)),
            None => series.push(ChartSeries {
                name,
                points: vec![(x_val, y_val)],
            }),
        }
    }

    Ok(ChartData {
        x_column: x.to_string(),
        y_column: y.to_string(),
        x_kind,
        series,
    })
}

/// x coordinate of a calendar date on a [`XAxisKind::Date`] axis.
pub fn date_x(date: NaiveDate) -> f64 {
    days_since_epoch(date) as f64
}
