//! Team dashboard: daily recruiter throughput plus an optional client sheet.
//!
//! The recruiter sheet is required. The client sheet is optional and may hold
//! either calendar dates or bare day-of-month numbers in its date column;
//! an empty client section is reported as a warning, never as a failure of
//! the whole dashboard.

use chrono::NaiveDate;
use color_eyre::Result;
use polars::prelude::*;
use serde::Serialize;
use std::fmt;
use tracing::{debug, info, warn};

use crate::aggregate::{
    column_total, distinct_values, filter_in, group_summary_sorted, label, percentage, share,
    sort_by, top_by, with_share_columns, Measure, Reduction, ShareColumn,
};
use crate::chart_data::{line_series, ChartData};
use crate::dates::{
    date_bounds, day_bounds, detect_axis, filter_date_range, filter_day_range, parse_date_column,
    parse_day_column, DateAxis, DateFormat, DateRange, DayRange, RangeRequest, DAY_COLUMN,
};
use crate::error::{EmptyResultWarning, Outcome};
use crate::loader::Workbook;
use crate::normalize::coerce_numeric_columns;
use crate::schema::{team, CLIENT_WISE, RECRUITER_DATA};

use super::{prepare_sheet, DataQuality, NamedTable};

/// Default %Permanent below which the team is flagged.
pub const DEFAULT_ALERT_PERMANENT: f64 = 25.0;

pub const CONSISTENCY: &str = "consistency";
pub const AVG_DAILY: &str = "avg daily";
pub const TOTAL_SUM: &str = "total sum";
pub const PERM_SUM: &str = "perm sum";
pub const SUBCON_SUM: &str = "subcon sum";
pub const PCT_PERMANENT: &str = "%permanent";
pub const PCT_SUBCON: &str = "%subcon";

#[derive(Debug, Clone, PartialEq)]
pub struct TeamFilters {
    /// Sheet name tried before auto-detecting the recruiter sheet
    pub recruiter_sheet: String,
    /// Sheet name tried before auto-detecting the client sheet
    pub client_sheet: String,
    /// Open ends default to the span of recruiter dates
    pub recruiter_range: RangeRequest<NaiveDate>,
    /// Empty means every recruiter
    pub recruiters: Vec<String>,
    /// Client range in calendar mode
    pub client_dates: RangeRequest<NaiveDate>,
    /// Client range in day-of-month mode
    pub client_days: RangeRequest<i64>,
    pub alert_permanent: f64,
}

impl Default for TeamFilters {
    fn default() -> Self {
        Self {
            recruiter_sheet: RECRUITER_DATA.sheet_name.to_string(),
            client_sheet: CLIENT_WISE.sheet_name.to_string(),
            recruiter_range: RangeRequest::default(),
            recruiters: Vec::new(),
            client_dates: RangeRequest::default(),
            client_days: RangeRequest::default(),
            alert_permanent: DEFAULT_ALERT_PERMANENT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamKpis {
    pub total: i64,
    pub subcon: i64,
    pub permanent: i64,
    pub pct_subcon: f64,
    pub pct_permanent: f64,
    pub top_subcon_recruiter: Option<String>,
    pub top_permanent_recruiter: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PermanentAlert {
    pub pct_permanent: f64,
    pub threshold: f64,
}

impl fmt::Display for PermanentAlert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Permanent share {:.1}% is below the {:.1}% threshold",
            self.pct_permanent, self.threshold
        )
    }
}

/// Range the client section was cut to, in the axis it was read in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ClientRange {
    Dates(DateRange),
    Days(DayRange),
}

#[derive(Debug, Clone)]
pub struct ClientSection {
    pub sheet: String,
    pub axis: DateAxis,
    pub range: ClientRange,
    /// Subcon/permanent/total sums per client
    pub mix: DataFrame,
    /// Raw (date or day, client, total) rows
    pub trend: DataFrame,
    pub chart: ChartData,
}

#[derive(Debug, Clone)]
pub struct TeamReport {
    pub sheet: String,
    pub range: DateRange,
    /// Recruiters present in the sheet, for the recruiter multi-select
    pub recruiter_options: Vec<String>,
    pub kpis: TeamKpis,
    pub alert: Option<PermanentAlert>,
    pub trend: DataFrame,
    pub trend_chart: ChartData,
    pub mix: DataFrame,
    pub consistency: DataFrame,
    pub most_consistent: Option<String>,
    pub client: Option<ClientSection>,
    pub client_warning: Option<EmptyResultWarning>,
    pub quality: DataQuality,
}

impl TeamReport {
    pub fn tables(&self) -> Vec<NamedTable<'_>> {
        let mut tables = vec![
            NamedTable {
                title: "Daily trend by recruiter",
                frame: &self.trend,
            },
            NamedTable {
                title: "Subcon vs permanent by recruiter",
                frame: &self.mix,
            },
            NamedTable {
                title: "Recruiter consistency",
                frame: &self.consistency,
            },
        ];
        if let Some(client) = &self.client {
            tables.push(NamedTable {
                title: "Subcon vs permanent by client",
                frame: &client.mix,
            });
            tables.push(NamedTable {
                title: "Client trend",
                frame: &client.trend,
            });
        }
        tables
    }
}

/// Runs the team pipeline over every sheet of `workbook`.
pub fn run_team(workbook: &Workbook, filters: &TeamFilters) -> Result<Outcome<TeamReport>> {
    let sheet = workbook
        .find_sheet(&filters.recruiter_sheet, RECRUITER_DATA.required)
        .ok_or_else(|| RECRUITER_DATA.missing_sheet())?;
    let frame = prepare_sheet(sheet, &RECRUITER_DATA)?;
    let mut quality = DataQuality::default();

    let parsed = parse_date_column(&frame, team::DATE, &DateFormat::Inferred)?;
    quality.record_dates(parsed.warning);
    let recruiter_options = distinct_values(&parsed.frame, team::RECRUITER)?;

    let bounds = date_bounds(&parsed.frame, team::DATE)?;
    let Some(range) = filters.recruiter_range.resolve(bounds) else {
        return Ok(Outcome::Empty(EmptyResultWarning::new("recruiter")));
    };
    let in_range = filter_date_range(&parsed.frame, team::DATE, range)?;
    let selected = filter_in(&in_range, team::RECRUITER, &filters.recruiters)?;
    if selected.height() == 0 {
        debug!(from = %range.from, to = %range.to, "no recruiter rows after filters");
        return Ok(Outcome::Empty(EmptyResultWarning::new("recruiter")));
    }

    let (df, coercion) = coerce_numeric_columns(selected, team::NUM_COLS)?;
    quality.coercion.merge(coercion);

    let total = column_total(&df, team::TOTAL)?;
    let subcon = column_total(&df, team::SUBCON)?;
    let permanent = column_total(&df, team::PERMANENT)?;

    let by_recruiter = group_summary_sorted(
        &df,
        &[team::RECRUITER],
        &[
            Measure::sum(team::SUBCON),
            Measure::sum(team::PERMANENT),
            Measure::sum(team::TOTAL),
        ],
    )?;
    let kpis = TeamKpis {
        total,
        subcon,
        permanent,
        pct_subcon: percentage(subcon as f64, total as f64),
        pct_permanent: percentage(permanent as f64, total as f64),
        top_subcon_recruiter: top_by(&by_recruiter, team::RECRUITER, team::SUBCON)?,
        top_permanent_recruiter: top_by(&by_recruiter, team::RECRUITER, team::PERMANENT)?,
    };
    // The displayed share is rounded; the threshold sees the exact one.
    let exact_permanent = share(permanent as f64, total as f64);
    let alert = (exact_permanent < filters.alert_permanent).then(|| {
        warn!(
            pct_permanent = exact_permanent,
            threshold = filters.alert_permanent,
            "permanent share below threshold"
        );
        PermanentAlert {
            pct_permanent: kpis.pct_permanent,
            threshold: filters.alert_permanent,
        }
    });

    let trend = df.select([team::DATE, team::RECRUITER, team::TOTAL])?;
    let trend_chart = line_series(&trend, team::DATE, team::TOTAL, Some(team::RECRUITER), false)?;
    let mix = by_recruiter.select([team::RECRUITER, team::SUBCON, team::PERMANENT])?;

    let consistency = consistency_table(&df)?;
    let most_consistent = match consistency.height() {
        0 => None,
        _ => Some(label(&consistency.column(team::RECRUITER)?.get(0)?)),
    };

    let (client, client_warning) = match client_section(workbook, filters, &mut quality)? {
        Some(Outcome::Ready(section)) => (Some(section), None),
        Some(Outcome::Empty(warning)) => (None, Some(warning)),
        None => (None, None),
    };

    info!(
        sheet = %sheet.name,
        rows = df.height(),
        recruiters = by_recruiter.height(),
        client_section = client.is_some(),
        "team dashboard ready"
    );
    Ok(Outcome::Ready(TeamReport {
        sheet: sheet.name.clone(),
        range,
        recruiter_options,
        kpis,
        alert,
        trend,
        trend_chart,
        mix,
        consistency,
        most_consistent,
        client,
        client_warning,
        quality,
    }))
}

/// Per-recruiter spread of daily totals, steadiest first. Ties keep recruiter
/// order.
fn consistency_table(df: &DataFrame) -> Result<DataFrame> {
    let stats = group_summary_sorted(
        df,
        &[team::RECRUITER],
        &[
            Measure::new(CONSISTENCY, team::TOTAL, Reduction::StdPop),
            Measure::new(AVG_DAILY, team::TOTAL, Reduction::Mean),
            Measure::new(TOTAL_SUM, team::TOTAL, Reduction::Sum),
            Measure::new(PERM_SUM, team::PERMANENT, Reduction::Sum),
            Measure::new(SUBCON_SUM, team::SUBCON, Reduction::Sum),
        ],
    )?;
    let stats = with_share_columns(
        stats,
        &[
            ShareColumn {
                output: PCT_PERMANENT,
                numerator: PERM_SUM,
                denominator: TOTAL_SUM,
            },
            ShareColumn {
                output: PCT_SUBCON,
                numerator: SUBCON_SUM,
                denominator: TOTAL_SUM,
            },
        ],
    )?;
    sort_by(&stats, CONSISTENCY, false)
}

fn empty_client() -> Outcome<ClientSection> {
    Outcome::Empty(EmptyResultWarning::new("client"))
}

/// None when the workbook has no client sheet.
fn client_section(
    workbook: &Workbook,
    filters: &TeamFilters,
    quality: &mut DataQuality,
) -> Result<Option<Outcome<ClientSection>>> {
    let Some(sheet) = workbook.find_sheet(&filters.client_sheet, CLIENT_WISE.required) else {
        debug!("no client sheet in workbook");
        return Ok(None);
    };
    let frame = prepare_sheet(sheet, &CLIENT_WISE)?;
    let axis = detect_axis(&frame, team::DATE)?;

    let (filtered, x_column, range) = match axis {
        DateAxis::DayOfMonth => {
            let parsed = parse_day_column(&frame, team::DATE)?;
            quality.record_dates(parsed.warning);
            let range = match filters.client_days.resolve(day_bounds(&parsed.frame)?) {
                Some(range) => range,
                None => return Ok(Some(empty_client())),
            };
            let filtered = filter_day_range(&parsed.frame, range)?;
            (filtered, DAY_COLUMN, ClientRange::Days(range))
        }
        DateAxis::Calendar => {
            let parsed = parse_date_column(&frame, team::DATE, &DateFormat::Inferred)?;
            quality.record_dates(parsed.warning);
            let range = match filters
                .client_dates
                .resolve(date_bounds(&parsed.frame, team::DATE)?)
            {
                Some(range) => range,
                None => return Ok(Some(empty_client())),
            };
            let filtered = filter_date_range(&parsed.frame, team::DATE, range)?;
            (filtered, team::DATE, ClientRange::Dates(range))
        }
    };
    if filtered.height() == 0 {
        return Ok(Some(empty_client()));
    }

    let (df, coercion) = coerce_numeric_columns(filtered, team::NUM_COLS)?;
    quality.coercion.merge(coercion);

    let mix = group_summary_sorted(
        &df,
        &[team::CLIENT],
        &[
            Measure::sum(team::SUBCON),
            Measure::sum(team::PERMANENT),
            Measure::sum(team::TOTAL),
        ],
    )?;
    let trend = df.select([x_column, team::CLIENT, team::TOTAL])?;
    let chart = line_series(
        &trend,
        x_column,
        team::TOTAL,
        Some(team::CLIENT),
        axis == DateAxis::DayOfMonth,
    )?;
    debug!(sheet = %sheet.name, ?axis, clients = mix.height(), "client section ready");

    Ok(Some(Outcome::Ready(ClientSection {
        sheet: sheet.name.clone(),
        axis,
        range,
        mix,
        trend,
        chart,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LoadError;
    use crate::loader::Sheet;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn recruiter_frame() -> DataFrame {
        df!(
            "Date" => &["2024-01-01", "2024-01-02", "2024-01-03", "2024-01-01", "2024-01-02", "2024-01-03"],
            "Recruiter" => &["Asha", "Asha", "Asha", "Ben", "Ben", "Ben"],
            "Total" => &[10i64, 10, 10, 0, 20, 10],
            "Subcon" => &[8i64, 8, 8, 0, 15, 5],
            "Permanent" => &[2i64, 2, 2, 0, 5, 5]
        )
        .unwrap()
    }

    fn workbook(sheets: Vec<(&str, DataFrame)>) -> Workbook {
        Workbook::from_sheets(
            "test.xlsx",
            sheets
                .into_iter()
                .map(|(name, frame)| Sheet {
                    name: name.to_string(),
                    frame,
                })
                .collect(),
        )
    }

    #[test]
    fn kpis_alert_and_consistency() {
        let book = workbook(vec![("RecruiterData", recruiter_frame())]);
        let report = run_team(&book, &TeamFilters::default()).unwrap().ready().unwrap();
        assert_eq!(report.kpis.total, 60);
        assert_eq!(report.kpis.subcon, 44);
        assert_eq!(report.kpis.permanent, 16);
        assert_eq!(report.kpis.pct_permanent, 26.7);
        assert_eq!(report.kpis.pct_subcon, 73.3);
        assert_eq!(report.kpis.top_subcon_recruiter.as_deref(), Some("Asha"));
        assert_eq!(report.kpis.top_permanent_recruiter.as_deref(), Some("Ben"));
        assert!(report.alert.is_none());
        assert_eq!(report.most_consistent.as_deref(), Some("Asha"));
        assert_eq!(report.trend.height(), 6);
        assert_eq!(report.trend_chart.series.len(), 2);
        assert!(report.client.is_none());
        assert!(report.client_warning.is_none());
    }

    #[test]
    fn alert_below_threshold() {
        let book = workbook(vec![("RecruiterData", recruiter_frame())]);
        let filters = TeamFilters {
            alert_permanent: 30.0,
            ..TeamFilters::default()
        };
        let report = run_team(&book, &filters).unwrap().ready().unwrap();
        let alert = report.alert.unwrap();
        assert_eq!(alert.threshold, 30.0);
        assert_eq!(alert.pct_permanent, 26.7);
    }

    #[test]
    fn alert_uses_unrounded_share() {
        let frame = df!(
            "Date" => &["2024-01-01"],
            "Recruiter" => &["Asha"],
            "Total" => &[10000i64],
            "Subcon" => &[7504i64],
            "Permanent" => &[2496i64]
        )
        .unwrap();
        let book = workbook(vec![("RecruiterData", frame)]);
        let filters = TeamFilters {
            alert_permanent: 25.0,
            ..TeamFilters::default()
        };
        let report = run_team(&book, &filters).unwrap().ready().unwrap();
        assert_eq!(report.kpis.pct_permanent, 25.0);
        let alert = report.alert.unwrap();
        assert_eq!(alert.pct_permanent, 25.0);
        assert_eq!(alert.threshold, 25.0);
    }

    #[test]
    fn recruiter_filter_and_empty_result() {
        let book = workbook(vec![("Daily", recruiter_frame())]);
        let filters = TeamFilters {
            recruiters: vec!["Ben".to_string()],
            ..TeamFilters::default()
        };
        let report = run_team(&book, &filters).unwrap().ready().unwrap();
        assert_eq!(report.sheet, "Daily");
        assert_eq!(report.kpis.total, 30);
        assert_eq!(report.recruiter_options, vec!["Asha", "Ben"]);

        let nobody = TeamFilters {
            recruiters: vec!["Zed".to_string()],
            ..TeamFilters::default()
        };
        let outcome = run_team(&book, &nobody).unwrap();
        assert!(outcome.is_empty());
    }

    #[test]
    fn missing_recruiter_sheet() {
        let book = workbook(vec![("Notes", df!("text" => &["hi"]).unwrap())]);
        let err = run_team(&book, &TeamFilters::default()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<LoadError>(),
            Some(LoadError::MissingSheet { .. })
        ));
    }

    #[test]
    fn client_day_mode() {
        let clients = df!(
            "Date" => &["1", "2", "15"],
            "Client" => &["Acme", "Beta", "Acme"],
            "Total" => &["4", "2", "6"],
            "Subcon" => &["3", "1", "2"],
            "Permanent" => &["1", "1", "4"]
        )
        .unwrap();
        let book = workbook(vec![
            ("RecruiterData", recruiter_frame()),
            ("ClientWise", clients),
        ]);
        let filters = TeamFilters {
            client_days: RangeRequest::between(1, 10),
            ..TeamFilters::default()
        };
        let report = run_team(&book, &filters).unwrap().ready().unwrap();
        let client = report.client.unwrap();
        assert_eq!(client.axis, DateAxis::DayOfMonth);
        assert_eq!(client.range, ClientRange::Days(DayRange::new(1, 10)));
        assert_eq!(client.trend.height(), 2);
        assert_eq!(client.mix.height(), 2);
    }

    #[test]
    fn client_calendar_mode_empty_is_warning() {
        let clients = df!(
            "date" => &["2024-02-01", "2024-02-02"],
            "client" => &["Acme", "Beta"],
            "total" => &[4i64, 2],
            "subcon" => &[3i64, 1],
            "permanent" => &[1i64, 1]
        )
        .unwrap();
        let book = workbook(vec![
            ("RecruiterData", recruiter_frame()),
            ("Clients", clients),
        ]);
        let filters = TeamFilters {
            client_dates: RangeRequest::between(ymd(2024, 3, 1), ymd(2024, 3, 31)),
            ..TeamFilters::default()
        };
        let report = run_team(&book, &filters).unwrap().ready().unwrap();
        assert!(report.client.is_none());
        assert_eq!(
            report.client_warning.unwrap().to_string(),
            "No client data after filters."
        );
    }
}
