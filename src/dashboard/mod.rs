//! The two dashboards built on the loading and aggregation layers.
//!
//! Each dashboard is a pure function from loaded sheets and an immutable
//! filter value to a report. Structural problems surface as [`LoadError`]
//! inside the returned error; filters that leave no rows give
//! [`Outcome::Empty`](crate::error::Outcome::Empty).

use polars::prelude::DataFrame;
use serde::Serialize;

use crate::error::{LoadError, ParseWarning};
use crate::loader::Sheet;
use crate::normalize::{normalize_headers, CoercionReport};
use crate::schema::SheetSchema;

pub mod master;
pub mod team;

pub use master::{run_master, MasterFilters, MasterKpis, MasterReport};
pub use team::{
    run_team, ClientRange, ClientSection, PermanentAlert, TeamFilters, TeamKpis, TeamReport,
};

/// Rows and values the pipeline had to drop or default along the way.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DataQuality {
    pub date_warnings: Vec<ParseWarning>,
    pub coercion: CoercionReport,
}

impl DataQuality {
    pub fn is_clean(&self) -> bool {
        self.date_warnings.is_empty() && self.coercion.total() == 0
    }

    pub(crate) fn record_dates(&mut self, warning: Option<ParseWarning>) {
        self.date_warnings.extend(warning);
    }
}

/// A table in a report, with the heading it is shown under.
#[derive(Debug, Clone, Copy)]
pub struct NamedTable<'a> {
    pub title: &'static str,
    pub frame: &'a DataFrame,
}

/// Normalized headers checked against `schema`.
pub(crate) fn prepare_sheet(sheet: &Sheet, schema: &SheetSchema) -> Result<DataFrame, LoadError> {
    let frame = normalize_headers(sheet.frame.clone())?;
    schema.validate(&sheet.name, &frame)?;
    Ok(frame)
}
