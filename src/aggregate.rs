//! Grouped summaries and derived measures.
//!
//! Group-by output is in first-seen order of the key values and keeps null
//! keys as their own group: a blank customer name must not make totals
//! disappear. Consistency is the population standard deviation (divisor N).

use std::collections::BTreeSet;

use color_eyre::Result;
use polars::prelude::*;

use crate::schema::{has_all, master};

/// Label used for a null group key when a key is turned into text.
pub const BLANK_LABEL: &str = "(blank)";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reduction {
    Sum,
    Mean,
    /// Population standard deviation (ddof = 0)
    StdPop,
}

impl Reduction {
    fn expr(self, source: &str) -> Expr {
        match self {
            Reduction::Sum => col(source).sum(),
            Reduction::Mean => col(source).mean(),
            Reduction::StdPop => col(source).std(0),
        }
    }
}

/// One output column of a grouped summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Measure {
    pub output: String,
    pub source: String,
    pub reduction: Reduction,
}

impl Measure {
    pub fn new(output: impl Into<String>, source: impl Into<String>, reduction: Reduction) -> Self {
        Self {
            output: output.into(),
            source: source.into(),
            reduction,
        }
    }

    /// Sum of `column`, keeping its name.
    pub fn sum(column: &str) -> Self {
        Self::new(column, column, Reduction::Sum)
    }
}

/// Sums of each column in `columns` that exists in `df`.
pub fn present_sums(df: &DataFrame, columns: &[&str]) -> Vec<Measure> {
    columns
        .iter()
        .filter(|c| has_all(df, &[**c]))
        .map(|c| Measure::sum(c))
        .collect()
}

/// One row per distinct combination of `keys`, in first-seen order.
pub fn group_summary(df: &DataFrame, keys: &[&str], measures: &[Measure]) -> Result<DataFrame> {
    let by: Vec<Expr> = keys.iter().map(|k| col(*k)).collect();
    let aggs: Vec<Expr> = measures
        .iter()
        .map(|m| m.reduction.expr(&m.source).alias(m.output.as_str()))
        .collect();
    Ok(df.clone().lazy().group_by_stable(by).agg(aggs).collect()?)
}

/// Stable sort on one column. Rows with equal values keep their relative
/// order; nulls go last.
pub fn sort_by(df: &DataFrame, column: &str, descending: bool) -> Result<DataFrame> {
    sort_by_columns(df, &[column], descending)
}

pub fn sort_by_columns(df: &DataFrame, columns: &[&str], descending: bool) -> Result<DataFrame> {
    if columns.is_empty() {
        return Ok(df.clone());
    }
    let by: Vec<Expr> = columns.iter().map(|c| col(*c)).collect();
    let options = SortMultipleOptions::default()
        .with_order_descending(descending)
        .with_nulls_last(true)
        .with_maintain_order(true);
    Ok(df.clone().lazy().sort_by_exprs(by, options).collect()?)
}

/// Grouped summary ordered by the key values, nulls last.
pub fn group_summary_sorted(
    df: &DataFrame,
    keys: &[&str],
    measures: &[Measure],
) -> Result<DataFrame> {
    let grouped = group_summary(df, keys, measures)?;
    sort_by_columns(&grouped, keys, false)
}

/// Per-record pending counts, each added only when all its inputs exist:
///
/// ```text
/// l1 pending    = screen select from client - (l1 select + l1 reject)
/// l2 pending    = l1 select - (l2 select + l2 reject)
/// final pending = l2 select - final select
/// ```
///
/// Negative results are kept; they flag data-entry lag.
pub fn derive_pending(df: DataFrame) -> Result<DataFrame> {
    let mut exprs = Vec::new();
    if has_all(&df, &[master::SCREEN_SELECT, master::L1_SELECT, master::L1_REJECT]) {
        exprs.push(
            (col(master::SCREEN_SELECT) - (col(master::L1_SELECT) + col(master::L1_REJECT)))
                .alias(master::L1_PENDING),
        );
    }
    if has_all(&df, &[master::L1_SELECT, master::L2_SELECT, master::L2_REJECT]) {
        exprs.push(
            (col(master::L1_SELECT) - (col(master::L2_SELECT) + col(master::L2_REJECT)))
                .alias(master::L2_PENDING),
        );
    }
    if has_all(&df, &[master::L2_SELECT, master::FINAL_SELECT]) {
        exprs.push(
            (col(master::L2_SELECT) - col(master::FINAL_SELECT)).alias(master::FINAL_PENDING),
        );
    }
    if exprs.is_empty() {
        return Ok(df);
    }
    Ok(df.lazy().with_columns(exprs).collect()?)
}

/// Unrounded `numerator / denominator * 100`; 0 when the denominator is 0.
pub fn share(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator * 100.0
    }
}

/// [`share`] rounded to one decimal, ties to even.
pub fn percentage(numerator: f64, denominator: f64) -> f64 {
    (share(numerator, denominator) * 10.0).round_ties_even() / 10.0
}

/// A percentage column computed row by row from two existing columns.
#[derive(Debug, Clone, Copy)]
pub struct ShareColumn<'a> {
    pub output: &'a str,
    pub numerator: &'a str,
    pub denominator: &'a str,
}

pub fn with_share_columns(mut df: DataFrame, shares: &[ShareColumn<'_>]) -> Result<DataFrame> {
    for spec in shares {
        let num = df.column(spec.numerator)?.cast(&DataType::Float64)?;
        let den = df.column(spec.denominator)?.cast(&DataType::Float64)?;
        let values: Vec<f64> = num
            .f64()?
            .into_iter()
            .zip(den.f64()?)
            .map(|(n, d)| percentage(n.unwrap_or(0.0), d.unwrap_or(0.0)))
            .collect();
        df.with_column(Series::new(spec.output.into(), values))?;
    }
    Ok(df)
}

/// Sum of an integer column; 0 for an empty frame.
pub fn column_total(df: &DataFrame, column: &str) -> Result<i64> {
    let values = df.column(column)?.cast(&DataType::Int64)?;
    Ok(values.i64()?.sum().unwrap_or(0))
}

/// Text for a cell used as a label. Nulls become [`BLANK_LABEL`].
pub fn label(value: &AnyValue<'_>) -> String {
    match value {
        AnyValue::Null => BLANK_LABEL.to_string(),
        AnyValue::String(s) => s.to_string(),
        AnyValue::StringOwned(s) => s.to_string(),
        other => other.str_value().to_string(),
    }
}

/// Key of the row with the largest `measure`.
///
/// The grouped table is stable-sorted by `measure` descending and the first
/// row wins, so among tied groups the one listed first in `df` is chosen.
/// This tie-break follows the row order of the grouped table and is not a
/// ranking rule of its own. None for an empty table.
pub fn top_by(df: &DataFrame, key: &str, measure: &str) -> Result<Option<String>> {
    if df.height() == 0 {
        return Ok(None);
    }
    let sorted = sort_by(df, measure, true)?;
    let value = sorted.column(key)?.get(0)?;
    Ok(Some(label(&value)))
}

/// Sorted distinct non-null values of `column`, as offered by a multi-select.
pub fn distinct_values(df: &DataFrame, column: &str) -> Result<Vec<String>> {
    let text = df.column(column)?.cast(&DataType::String)?;
    let values: BTreeSet<String> = text
        .str()?
        .into_iter()
        .flatten()
        .map(str::to_string)
        .collect();
    Ok(values.into_iter().collect())
}

/// Rows whose `column` is one of `selected`. An empty selection keeps every row.
pub fn filter_in(df: &DataFrame, column: &str, selected: &[String]) -> Result<DataFrame> {
    if selected.is_empty() {
        return Ok(df.clone());
    }
    let text = df.column(column)?.cast(&DataType::String)?;
    let keep: Vec<bool> = text
        .str()?
        .into_iter()
        .map(|v| v.is_some_and(|v| selected.iter().any(|s| s == v)))
        .collect();
    let mask = BooleanChunked::from_slice("keep".into(), &keep);
    Ok(df.filter(&mask)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn i64_values(df: &DataFrame, column: &str) -> Vec<Option<i64>> {
        df.column(column).unwrap().i64().unwrap().into_iter().collect()
    }

    fn f64_values(df: &DataFrame, column: &str) -> Vec<Option<f64>> {
        df.column(column).unwrap().f64().unwrap().into_iter().collect()
    }

    #[test]
    fn group_sum_keeps_first_seen_order_and_null_keys() {
        let df = df!(
            "customer" => &[Some("B"), None, Some("A"), Some("B"), None],
            "open" => &[1i64, 2, 3, 4, 5]
        )
        .unwrap();
        let out = group_summary(&df, &["customer"], &[Measure::sum("open")]).unwrap();
        let keys: Vec<Option<&str>> = out.column("customer").unwrap().str().unwrap().into_iter().collect();
        assert_eq!(keys, vec![Some("B"), None, Some("A")]);
        assert_eq!(i64_values(&out, "open"), vec![Some(5), Some(7), Some(3)]);
    }

    #[test]
    fn sorted_summary_puts_null_group_last() {
        let df = df!(
            "customer" => &[Some("B"), None, Some("A")],
            "open" => &[1i64, 2, 3]
        )
        .unwrap();
        let out = group_summary_sorted(&df, &["customer"], &[Measure::sum("open")]).unwrap();
        let keys: Vec<Option<&str>> = out.column("customer").unwrap().str().unwrap().into_iter().collect();
        assert_eq!(keys, vec![Some("A"), Some("B"), None]);
    }

    #[test]
    fn population_std_dev() {
        let df = df!(
            "recruiter" => &["steady", "steady", "steady", "jumpy", "jumpy", "jumpy"],
            "total" => &[10i64, 10, 10, 0, 20, 10]
        )
        .unwrap();
        let out = group_summary(
            &df,
            &["recruiter"],
            &[
                Measure::new("consistency", "total", Reduction::StdPop),
                Measure::new("avg", "total", Reduction::Mean),
            ],
        )
        .unwrap();
        let std = f64_values(&out, "consistency");
        assert_eq!(std[0], Some(0.0));
        let expected = (200.0f64 / 3.0).sqrt();
        assert!((std[1].unwrap() - expected).abs() < 1e-9);
        assert!((std[1].unwrap() - 8.16).abs() < 0.01);
        assert_eq!(f64_values(&out, "avg"), vec![Some(10.0), Some(10.0)]);
    }

    #[test]
    fn pending_counts_allow_negative() {
        let df = df!(
            "screen select from client" => &[4i64, 1],
            "l1 select" => &[5i64, 2],
            "l1 reject" => &[1i64, 3],
            "l2 select" => &[2i64, 0],
            "l2 reject" => &[1i64, 0],
            "final select" => &[1i64, 2]
        )
        .unwrap();
        let out = derive_pending(df).unwrap();
        assert_eq!(i64_values(&out, "l1 pending"), vec![Some(-2), Some(-4)]);
        assert_eq!(i64_values(&out, "l2 pending"), vec![Some(2), Some(2)]);
        assert_eq!(i64_values(&out, "final pending"), vec![Some(1), Some(-2)]);
    }

    #[test]
    fn pending_skipped_without_inputs() {
        let df = df!("l2 select" => &[3i64], "final select" => &[1i64]).unwrap();
        let out = derive_pending(df).unwrap();
        assert!(out.column("l1 pending").is_err());
        assert!(out.column("l2 pending").is_err());
        assert_eq!(i64_values(&out, "final pending"), vec![Some(2)]);
    }

    #[test]
    fn percentage_is_zero_safe() {
        assert_eq!(percentage(0.0, 0.0), 0.0);
        assert_eq!(percentage(5.0, 0.0), 0.0);
        assert_eq!(percentage(1.0, 3.0), 33.3);
        assert_eq!(percentage(2.0, 3.0), 66.7);
        assert!(!percentage(0.0, 0.0).is_nan());
    }

    #[test]
    fn percentage_ties_round_to_even() {
        assert_eq!(percentage(1.0, 400.0), 0.2);
        assert_eq!(percentage(3.0, 400.0), 0.8);
        assert_eq!(percentage(1.0, 8.0), 12.5);
    }

    #[test]
    fn share_columns_per_row() {
        let df = df!(
            "perm" => &[1i64, 0],
            "total" => &[4i64, 0]
        )
        .unwrap();
        let out = with_share_columns(
            df,
            &[ShareColumn {
                output: "%permanent",
                numerator: "perm",
                denominator: "total",
            }],
        )
        .unwrap();
        assert_eq!(f64_values(&out, "%permanent"), vec![Some(25.0), Some(0.0)]);
    }

    #[test]
    fn top_by_breaks_ties_by_row_order() {
        let df = df!(
            "recruiter" => &["Asha", "Ben", "Chen"],
            "subcon" => &[5i64, 7, 7]
        )
        .unwrap();
        assert_eq!(
            top_by(&df, "recruiter", "subcon").unwrap(),
            Some("Ben".to_string())
        );
        let empty = df.head(Some(0));
        assert_eq!(top_by(&empty, "recruiter", "subcon").unwrap(), None);
    }

    #[test]
    fn distinct_and_filter_in() {
        let df = df!(
            "client" => &[Some("Zeta"), Some("Acme"), None, Some("Acme")],
            "n" => &[1i64, 2, 3, 4]
        )
        .unwrap();
        assert_eq!(distinct_values(&df, "client").unwrap(), vec!["Acme", "Zeta"]);
        let picked = filter_in(&df, "client", &["Acme".to_string()]).unwrap();
        assert_eq!(i64_values(&picked, "n"), vec![Some(2), Some(4)]);
        let all = filter_in(&df, "client", &[]).unwrap();
        assert_eq!(all.height(), 4);
    }

    #[test]
    fn client_sums_after_coercion() {
        let df = df!(
            "customer name" => &["A", "A"],
            "no of open position" => &["10+", "3"],
            "profiles submitted" => &["5", "2"]
        )
        .unwrap();
        let (df, _) = crate::normalize::coerce_numeric_columns(df, master::NUM_COLS).unwrap();
        let out = group_summary(
            &df,
            &[master::CUSTOMER_NAME],
            &present_sums(&df, &[master::OPEN_POSITIONS, master::PROFILES_SUBMITTED]),
        )
        .unwrap();
        assert_eq!(i64_values(&out, master::OPEN_POSITIONS), vec![Some(13)]);
        assert_eq!(i64_values(&out, master::PROFILES_SUBMITTED), vec![Some(7)]);
    }

    #[test]
    fn totals_of_columns() {
        let df = df!("open" => &[10i64, 3]).unwrap();
        assert_eq!(column_total(&df, "open").unwrap(), 13);
        assert_eq!(column_total(&df.head(Some(0)), "open").unwrap(), 0);
    }
}
