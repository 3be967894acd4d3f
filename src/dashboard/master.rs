//! Master record dashboard: one requisition per row with per-stage counts.

use chrono::NaiveDate;
use color_eyre::Result;
use polars::prelude::*;
use serde::Serialize;
use tracing::{debug, info};

use crate::aggregate::{
    column_total, derive_pending, distinct_values, filter_in, group_summary_sorted, present_sums,
    sort_by, Measure,
};
use crate::chart_data::{line_series, ChartData};
use crate::dates::{
    column_dates, date_bounds, filter_date_range, parse_date_column, DateFormat, DateRange,
    RangeRequest,
};
use crate::error::{EmptyResultWarning, Outcome};
use crate::loader::Sheet;
use crate::normalize::coerce_numeric_columns;
use crate::schema::{master, MASTER};

use super::{prepare_sheet, DataQuality, NamedTable};

/// Date format of `req received date` cells, e.g. "05-Mar-24".
pub const DEFAULT_DATE_FORMAT: &str = "%d-%b-%y";

/// Immutable filter state for one master dashboard run.
#[derive(Debug, Clone, PartialEq)]
pub struct MasterFilters {
    pub date_format: DateFormat,
    /// Open ends default to the span of dates in the data
    pub date_range: RangeRequest<NaiveDate>,
    /// Clients shown in the client x role chart; empty means all
    pub clients: Vec<String>,
    /// Job titles shown in the client x role chart; empty means all
    pub roles: Vec<String>,
    /// Reference date for requisition age
    pub as_of: NaiveDate,
}

impl MasterFilters {
    pub fn as_of(as_of: NaiveDate) -> Self {
        Self {
            date_format: DateFormat::fixed(DEFAULT_DATE_FORMAT),
            date_range: RangeRequest::default(),
            clients: Vec::new(),
            roles: Vec::new(),
            as_of,
        }
    }

    pub fn with_date_format(mut self, format: DateFormat) -> Self {
        self.date_format = format;
        self
    }

    pub fn with_date_range(mut self, range: RangeRequest<NaiveDate>) -> Self {
        self.date_range = range;
        self
    }

    pub fn with_clients(mut self, clients: Vec<String>) -> Self {
        self.clients = clients;
        self
    }

    pub fn with_roles(mut self, roles: Vec<String>) -> Self {
        self.roles = roles;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MasterKpis {
    pub open_positions: i64,
    pub profiles_submitted: i64,
    pub onboarded: i64,
}

#[derive(Debug, Clone)]
pub struct MasterReport {
    pub sheet: String,
    /// Date range the report covers
    pub range: DateRange,
    pub kpis: MasterKpis,
    pub client_summary: DataFrame,
    pub recruiter_summary: DataFrame,
    pub daily_submissions: DataFrame,
    pub aging: DataFrame,
    pub pending_summary: DataFrame,
    pub role_summary: DataFrame,
    pub client_roles: DataFrame,
    /// `client_roles` restricted to the selected clients and roles
    pub client_roles_selected: DataFrame,
    pub client_options: Vec<String>,
    pub role_options: Vec<String>,
    pub daily_chart: ChartData,
    pub quality: DataQuality,
}

impl MasterReport {
    pub fn tables(&self) -> Vec<NamedTable<'_>> {
        vec![
            NamedTable {
                title: "Client-wise summary",
                frame: &self.client_summary,
            },
            NamedTable {
                title: "Recruiter-wise performance",
                frame: &self.recruiter_summary,
            },
            NamedTable {
                title: "Daily profile submissions",
                frame: &self.daily_submissions,
            },
            NamedTable {
                title: "Requirement aging",
                frame: &self.aging,
            },
            NamedTable {
                title: "Client-wise pending",
                frame: &self.pending_summary,
            },
            NamedTable {
                title: "Profiles submitted by role",
                frame: &self.role_summary,
            },
            NamedTable {
                title: "Client-wise profiles per role",
                frame: &self.client_roles,
            },
            NamedTable {
                title: "Selected clients and roles",
                frame: &self.client_roles_selected,
            },
        ]
    }
}

const CLIENT_MEASURES: &[&str] = &[
    master::OPEN_POSITIONS,
    master::PROFILES_SUBMITTED,
    master::SCREEN_SELECT,
    master::L1_SELECT,
    master::L2_SELECT,
    master::FINAL_SELECT,
    master::ONBOARDED,
];

const RECRUITER_MEASURES: &[&str] = &[
    master::PROFILES_SUBMITTED,
    master::SCREEN_SELECT,
    master::FINAL_SELECT,
    master::ONBOARDED,
];

const PENDING_MEASURES: &[&str] = &[
    master::L1_PENDING,
    master::L2_PENDING,
    master::FINAL_PENDING,
];

/// Runs the master pipeline over one sheet.
///
/// Dates are parsed and filtered before numeric coercion, so rows outside the
/// range never count toward defaulted values.
pub fn run_master(sheet: &Sheet, filters: &MasterFilters) -> Result<Outcome<MasterReport>> {
    let frame = prepare_sheet(sheet, &MASTER)?;
    let mut quality = DataQuality::default();

    let parsed = parse_date_column(&frame, master::REQ_RECEIVED_DATE, &filters.date_format)?;
    quality.record_dates(parsed.warning);

    let bounds = date_bounds(&parsed.frame, master::REQ_RECEIVED_DATE)?;
    let Some(range) = filters.date_range.resolve(bounds) else {
        return Ok(Outcome::Empty(EmptyResultWarning::new("master")));
    };
    let filtered = filter_date_range(&parsed.frame, master::REQ_RECEIVED_DATE, range)?;
    if filtered.height() == 0 {
        debug!(from = %range.from, to = %range.to, "no requisitions in range");
        return Ok(Outcome::Empty(EmptyResultWarning::new("master")));
    }

    let (df, coercion) = coerce_numeric_columns(filtered, master::NUM_COLS)?;
    quality.coercion = coercion;
    let df = derive_pending(df)?;

    let kpis = MasterKpis {
        open_positions: column_total(&df, master::OPEN_POSITIONS)?,
        profiles_submitted: column_total(&df, master::PROFILES_SUBMITTED)?,
        onboarded: column_total(&df, master::ONBOARDED)?,
    };

    let client_summary = group_summary_sorted(
        &df,
        &[master::CUSTOMER_NAME],
        &present_sums(&df, CLIENT_MEASURES),
    )?;
    let recruiter_summary = group_summary_sorted(
        &df,
        &[master::RECRUITER_ASSIGNED],
        &present_sums(&df, RECRUITER_MEASURES),
    )?;
    let daily_submissions = group_summary_sorted(
        &df,
        &[master::REQ_RECEIVED_DATE],
        &[Measure::sum(master::PROFILES_SUBMITTED)],
    )?;
    let aging = aging_table(&df, filters.as_of)?;
    let pending_summary = group_summary_sorted(
        &df,
        &[master::CUSTOMER_NAME],
        &present_sums(&df, PENDING_MEASURES),
    )?;

    let by_role = group_summary_sorted(
        &df,
        &[master::JOB_TITLE],
        &[Measure::sum(master::PROFILES_SUBMITTED)],
    )?;
    let role_summary = sort_by(&by_role, master::PROFILES_SUBMITTED, true)?;

    let client_roles = group_summary_sorted(
        &df,
        &[master::CUSTOMER_NAME, master::JOB_TITLE],
        &[Measure::sum(master::PROFILES_SUBMITTED)],
    )?;
    let client_options = distinct_values(&client_roles, master::CUSTOMER_NAME)?;
    let role_options = distinct_values(&client_roles, master::JOB_TITLE)?;
    let selected = filter_in(&client_roles, master::CUSTOMER_NAME, &filters.clients)?;
    let client_roles_selected = filter_in(&selected, master::JOB_TITLE, &filters.roles)?;

    let daily_chart = line_series(
        &daily_submissions,
        master::REQ_RECEIVED_DATE,
        master::PROFILES_SUBMITTED,
        None,
        false,
    )?;

    info!(
        sheet = %sheet.name,
        rows = df.height(),
        clients = client_options.len(),
        "master dashboard ready"
    );
    Ok(Outcome::Ready(MasterReport {
        sheet: sheet.name.clone(),
        range,
        kpis,
        client_summary,
        recruiter_summary,
        daily_submissions,
        aging,
        pending_summary,
        role_summary,
        client_roles,
        client_roles_selected,
        client_options,
        role_options,
        daily_chart,
        quality,
    }))
}

/// Open requisitions with their age in days at `as_of`, oldest first.
fn aging_table(df: &DataFrame, as_of: NaiveDate) -> Result<DataFrame> {
    let mut aging = df.select([
        master::CUSTOMER_NAME,
        master::JOB_TITLE,
        master::OPEN_POSITIONS,
        master::REQ_RECEIVED_DATE,
    ])?;
    let received = column_dates(
        aging.column(master::REQ_RECEIVED_DATE)?,
        &DateFormat::Inferred,
    )?;
    let ages: Vec<Option<i64>> = received
        .into_iter()
        .map(|d| d.map(|d| (as_of - d).num_days()))
        .collect();
    aging.with_column(Series::new(master::AGE_DAYS.into(), ages))?;
    sort_by(&aging, master::AGE_DAYS, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LoadError;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sheet(frame: DataFrame) -> Sheet {
        Sheet {
            name: "Sheet1".to_string(),
            frame,
        }
    }

    fn sample() -> DataFrame {
        df!(
            " Req Received Date " => &["01-Jan-24", "02-Jan-24", "bad", "03-Jan-24"],
            "Customer Name" => &["Acme", "Beta", "Acme", "Acme"],
            "Recruiter Assigned" => &["Asha", "Ben", "Asha", "Ben"],
            "Job Title" => &["Dev", "QA", "Dev", "QA"],
            "No of Open Position" => &["10", "3", "1", "2+"],
            "Profiles Submitted" => &["5", "x", "4", "1"],
            "Onboarded" => &["1", "0", "0", "1"]
        )
        .unwrap()
    }

    #[test]
    fn kpis_and_tables() {
        let filters = MasterFilters::as_of(ymd(2024, 1, 10));
        let report = run_master(&sheet(sample()), &filters).unwrap().ready().unwrap();
        assert_eq!(report.range, DateRange::new(ymd(2024, 1, 1), ymd(2024, 1, 3)));
        assert_eq!(
            report.kpis,
            MasterKpis {
                open_positions: 15,
                profiles_submitted: 6,
                onboarded: 2,
            }
        );
        assert_eq!(report.quality.date_warnings[0].dropped_rows, 1);
        assert_eq!(report.quality.coercion.defaulted.get("profiles submitted"), Some(&1));
        assert_eq!(report.client_summary.height(), 2);
        assert_eq!(report.client_options, vec!["Acme", "Beta"]);
        assert_eq!(report.role_options, vec!["Dev", "QA"]);

        let ages: Vec<Option<i64>> = report
            .aging
            .column(master::AGE_DAYS)
            .unwrap()
            .i64()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(ages, vec![Some(9), Some(8), Some(7)]);
        assert_eq!(report.daily_chart.series[0].points.len(), 3);
    }

    #[test]
    fn role_multiselect_restricts_chart_table() {
        let filters = MasterFilters::as_of(ymd(2024, 1, 10)).with_roles(vec!["QA".to_string()]);
        let report = run_master(&sheet(sample()), &filters).unwrap().ready().unwrap();
        assert_eq!(report.client_roles.height(), 3);
        assert_eq!(report.client_roles_selected.height(), 2);
    }

    #[test]
    fn empty_range_is_warning() {
        let filters = MasterFilters::as_of(ymd(2024, 1, 10))
            .with_date_range(RangeRequest::between(ymd(2023, 1, 1), ymd(2023, 1, 31)));
        let outcome = run_master(&sheet(sample()), &filters).unwrap();
        assert!(outcome.is_empty());
    }

    #[test]
    fn missing_column_is_load_error() {
        let df = sample().drop("Onboarded").unwrap();
        let err = run_master(&sheet(df), &MasterFilters::as_of(ymd(2024, 1, 10))).unwrap_err();
        match err.downcast_ref::<LoadError>() {
            Some(LoadError::MissingColumns { missing, .. }) => {
                assert_eq!(missing, &vec!["onboarded".to_string()]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
