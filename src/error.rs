//! Error and warning taxonomy for the reporting pipeline.
//!
//! Structural problems (unreadable workbook, missing sheet or columns) are a
//! fatal [`LoadError`]. Row-level problems never become errors: unparseable
//! dates are dropped and counted ([`ParseWarning`]), and a filter that leaves
//! nothing to report yields an [`EmptyResultWarning`] through [`Outcome`].

use polars::prelude::PolarsError;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// Fatal problem at the load boundary. Downstream processing must stop.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("could not read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("not a readable workbook: {0}")]
    Format(String),

    #[error("workbook has no worksheets")]
    NoSheets,

    #[error("sheet '{0}' not found in workbook")]
    SheetNotFound(String),

    #[error("no {role} sheet found; need a sheet with columns: {}", .required.join(", "))]
    MissingSheet { role: String, required: Vec<String> },

    #[error("sheet '{sheet}' is missing required columns: {}", .missing.join(", "))]
    MissingColumns { sheet: String, missing: Vec<String> },

    #[error("two columns normalize to the same header '{0}'")]
    DuplicateColumn(String),

    #[error(transparent)]
    Polars(#[from] PolarsError),
}

/// Rows dropped from one column because their value did not parse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParseWarning {
    pub column: String,
    pub dropped_rows: usize,
}

impl fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} row(s) dropped: '{}' did not parse",
            self.dropped_rows, self.column
        )
    }
}

/// Filters left no rows for a view; that view is not rendered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmptyResultWarning {
    pub view: String,
}

impl EmptyResultWarning {
    pub fn new(view: impl Into<String>) -> Self {
        Self { view: view.into() }
    }
}

impl fmt::Display for EmptyResultWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "No {} data after filters.", self.view)
    }
}

/// Result of running a dashboard over loaded data.
#[derive(Debug)]
pub enum Outcome<T> {
    Ready(T),
    Empty(EmptyResultWarning),
}

impl<T> Outcome<T> {
    pub fn ready(self) -> Option<T> {
        match self {
            Outcome::Ready(value) => Some(value),
            Outcome::Empty(_) => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Outcome::Empty(_))
    }
}
