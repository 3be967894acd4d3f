//! Report output: aligned text for a terminal, CSV blocks, or one JSON document.

use std::io::Write;

use chrono::NaiveDate;
use color_eyre::Result;
use polars::prelude::*;
use serde::Serialize;
use serde_json::{json, Map, Value};
use tadash_cli::OutputFormat;

use crate::chart_data::ChartData;
use crate::dashboard::{DataQuality, MasterReport, NamedTable, TeamReport};
use crate::error::EmptyResultWarning;

/// Widest cell shown in text tables; longer values are cut with `…`.
const MAX_CELL_WIDTH: usize = 40;

pub fn render_master(
    report: &MasterReport,
    format: OutputFormat,
    out: &mut impl Write,
) -> Result<()> {
    match format {
        OutputFormat::Text => {
            writeln!(
                out,
                "Master dashboard: {} ({} to {})",
                report.sheet, report.range.from, report.range.to
            )?;
            writeln!(out)?;
            write_metrics(
                out,
                &[
                    ("Total open positions", report.kpis.open_positions.to_string()),
                    ("Total profiles submitted", report.kpis.profiles_submitted.to_string()),
                    ("Total onboarded", report.kpis.onboarded.to_string()),
                ],
            )?;
            write_quality(out, &report.quality)?;
            write_text_tables(out, &report.tables())
        }
        OutputFormat::Csv => write_csv_tables(out, &report.tables()),
        OutputFormat::Json => {
            let document = json!({
                "dashboard": "master",
                "sheet": report.sheet,
                "range": report.range,
                "kpis": report.kpis,
                "client_options": report.client_options,
                "role_options": report.role_options,
                "tables": tables_json(&report.tables())?,
                "charts": { "daily_submissions": report.daily_chart },
                "quality": report.quality,
            });
            write_json(out, &document)
        }
    }
}

pub fn render_team(report: &TeamReport, format: OutputFormat, out: &mut impl Write) -> Result<()> {
    match format {
        OutputFormat::Text => {
            writeln!(
                out,
                "Team dashboard: {} ({} to {})",
                report.sheet, report.range.from, report.range.to
            )?;
            writeln!(out)?;
            let kpis = &report.kpis;
            let dash = || "-".to_string();
            write_metrics(
                out,
                &[
                    ("Team total", kpis.total.to_string()),
                    ("Subcon", kpis.subcon.to_string()),
                    ("Permanent", kpis.permanent.to_string()),
                    ("%Subcon", format!("{:.1}%", kpis.pct_subcon)),
                    ("%Permanent", format!("{:.1}%", kpis.pct_permanent)),
                    (
                        "Top subcon recruiter",
                        kpis.top_subcon_recruiter.clone().unwrap_or_else(dash),
                    ),
                    (
                        "Top permanent recruiter",
                        kpis.top_permanent_recruiter.clone().unwrap_or_else(dash),
                    ),
                    (
                        "Most consistent recruiter",
                        report.most_consistent.clone().unwrap_or_else(dash),
                    ),
                ],
            )?;
            if let Some(alert) = &report.alert {
                writeln!(out, "ALERT: {}", alert)?;
            }
            if let Some(warning) = &report.client_warning {
                writeln!(out, "warning: {}", warning)?;
            }
            write_quality(out, &report.quality)?;
            write_text_tables(out, &report.tables())
        }
        OutputFormat::Csv => write_csv_tables(out, &report.tables()),
        OutputFormat::Json => {
            let mut charts = Map::new();
            charts.insert("daily_trend".to_string(), to_value(&report.trend_chart)?);
            let client = match &report.client {
                Some(section) => {
                    charts.insert("client_trend".to_string(), to_value(&section.chart)?);
                    json!({
                        "sheet": section.sheet,
                        "axis": section.axis,
                        "range": section.range,
                    })
                }
                None => Value::Null,
            };
            let document = json!({
                "dashboard": "team",
                "sheet": report.sheet,
                "range": report.range,
                "kpis": report.kpis,
                "alert": report.alert,
                "most_consistent": report.most_consistent,
                "recruiter_options": report.recruiter_options,
                "client": client,
                "client_warning": report.client_warning.as_ref().map(ToString::to_string),
                "tables": tables_json(&report.tables())?,
                "charts": charts,
                "quality": report.quality,
            });
            write_json(out, &document)
        }
    }
}

/// Output for a dashboard whose filters left nothing to show.
pub fn render_empty(
    warning: &EmptyResultWarning,
    format: OutputFormat,
    out: &mut impl Write,
) -> Result<()> {
    match format {
        OutputFormat::Json => write_json(out, &json!({ "warning": warning.to_string() })),
        OutputFormat::Text | OutputFormat::Csv => {
            writeln!(out, "{}", warning)?;
            Ok(())
        }
    }
}

fn to_value(chart: &ChartData) -> Result<Value> {
    Ok(serde_json::to_value(chart)?)
}

fn write_json(out: &mut impl Write, document: &impl Serialize) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, document)?;
    writeln!(out)?;
    Ok(())
}

fn write_metrics(out: &mut impl Write, metrics: &[(&str, String)]) -> Result<()> {
    let width = metrics.iter().map(|(name, _)| name.len()).max().unwrap_or(0);
    for (name, value) in metrics {
        writeln!(out, "  {:<width$}  {}", name, value, width = width)?;
    }
    Ok(())
}

fn write_quality(out: &mut impl Write, quality: &DataQuality) -> Result<()> {
    for warning in &quality.date_warnings {
        writeln!(out, "note: {}", warning)?;
    }
    for (column, count) in &quality.coercion.defaulted {
        writeln!(out, "note: {} non-numeric value(s) in '{}' counted as 0", count, column)?;
    }
    Ok(())
}

fn write_text_tables(out: &mut impl Write, tables: &[NamedTable<'_>]) -> Result<()> {
    for table in tables {
        writeln!(out)?;
        writeln!(out, "== {} ==", table.title)?;
        write_text_table(out, table.frame)?;
    }
    Ok(())
}

/// Columns padded to their widest cell; numbers right-aligned.
pub fn write_text_table(out: &mut impl Write, df: &DataFrame) -> Result<()> {
    let headers: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|name| name.to_string())
        .collect();
    let numeric: Vec<bool> = df
        .get_columns()
        .iter()
        .map(|c| c.dtype().is_primitive_numeric())
        .collect();
    let mut rows: Vec<Vec<String>> = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let mut row = Vec::with_capacity(df.width());
        for column in df.get_columns() {
            row.push(truncate(&cell_text(&column.get(i)?)));
        }
        rows.push(row);
    }
    let widths: Vec<usize> = headers
        .iter()
        .enumerate()
        .map(|(idx, h)| {
            rows.iter()
                .map(|r| r[idx].chars().count())
                .chain(std::iter::once(h.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let line = |cells: &[String]| -> String {
        cells
            .iter()
            .enumerate()
            .map(|(idx, cell)| {
                if numeric[idx] {
                    format!("{:>w$}", cell, w = widths[idx])
                } else {
                    format!("{:<w$}", cell, w = widths[idx])
                }
            })
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };
    writeln!(out, "{}", line(&headers))?;
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    writeln!(out, "{}", rule.join("  "))?;
    for row in &rows {
        writeln!(out, "{}", line(row))?;
    }
    if rows.is_empty() {
        writeln!(out, "(no rows)")?;
    }
    Ok(())
}

fn truncate(text: &str) -> String {
    if text.chars().count() <= MAX_CELL_WIDTH {
        text.to_string()
    } else {
        let kept: String = text.chars().take(MAX_CELL_WIDTH - 1).collect();
        format!("{}…", kept)
    }
}

fn date_text(days: i32) -> String {
    NaiveDate::from_ymd_opt(1970, 1, 1)
        .and_then(|epoch| epoch.checked_add_signed(chrono::TimeDelta::days(i64::from(days))))
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| days.to_string())
}

/// Floats drop trailing zeros after two decimals.
fn float_text(value: f64) -> String {
    if !value.is_finite() {
        return value.to_string();
    }
    let text = format!("{:.2}", value);
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}

/// Display text of one cell. Nulls are empty.
pub fn cell_text(value: &AnyValue<'_>) -> String {
    match value {
        AnyValue::Null => String::new(),
        AnyValue::String(s) => s.to_string(),
        AnyValue::StringOwned(s) => s.to_string(),
        AnyValue::Date(days) => date_text(*days),
        AnyValue::Float64(v) => float_text(*v),
        AnyValue::Float32(v) => float_text(f64::from(*v)),
        other => other.to_string(),
    }
}

fn cell_json(value: &AnyValue<'_>) -> Value {
    match value {
        AnyValue::Null => Value::Null,
        AnyValue::Boolean(b) => Value::from(*b),
        AnyValue::Int8(v) => Value::from(*v),
        AnyValue::Int16(v) => Value::from(*v),
        AnyValue::Int32(v) => Value::from(*v),
        AnyValue::Int64(v) => Value::from(*v),
        AnyValue::UInt8(v) => Value::from(*v),
        AnyValue::UInt16(v) => Value::from(*v),
        AnyValue::UInt32(v) => Value::from(*v),
        AnyValue::UInt64(v) => Value::from(*v),
        AnyValue::Float32(v) => Value::from(f64::from(*v)),
        AnyValue::Float64(v) => Value::from(*v),
        other => Value::from(cell_text(other)),
    }
}

/// Rows of `df` as JSON objects keyed by column name.
pub fn frame_json(df: &DataFrame) -> Result<Value> {
    let mut rows = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let mut row = Map::new();
        for column in df.get_columns() {
            row.insert(column.name().to_string(), cell_json(&column.get(i)?));
        }
        rows.push(Value::Object(row));
    }
    Ok(Value::Array(rows))
}

fn tables_json(tables: &[NamedTable<'_>]) -> Result<Value> {
    let mut map = Map::new();
    for table in tables {
        map.insert(table.title.to_string(), frame_json(table.frame)?);
    }
    Ok(Value::Object(map))
}

fn write_csv_tables(out: &mut impl Write, tables: &[NamedTable<'_>]) -> Result<()> {
    for (idx, table) in tables.iter().enumerate() {
        if idx > 0 {
            writeln!(out)?;
        }
        writeln!(out, "# {}", table.title)?;
        let mut frame = table.frame.clone();
        let mut buffer: Vec<u8> = Vec::new();
        CsvWriter::new(&mut buffer).finish(&mut frame)?;
        out.write_all(&buffer)?;
    }
    Ok(())
}
