//! Recruitment pipeline dashboards over spreadsheet workbooks.
//!
//! A workbook is loaded once into polars DataFrames ([`loader`]), headers and
//! numeric columns are normalized ([`normalize`]), rows are cut to a date
//! range ([`dates`]) and summarized ([`aggregate`]). The [`dashboard`]
//! module assembles those steps into the master and team reports, and
//! [`render`] writes them as text, CSV or JSON.

pub mod aggregate;
pub mod cache;
pub mod chart_data;
pub mod config;
pub mod dashboard;
pub mod dates;
pub mod error;
pub mod error_display;
pub mod loader;
pub mod normalize;
pub mod render;
pub mod schema;
pub mod source;
pub mod telemetry;

pub use cache::LoadCache;
pub use config::{AppConfig, ConfigManager};
pub use dashboard::{
    run_master, run_team, MasterFilters, MasterReport, TeamFilters, TeamReport,
};
pub use error::{EmptyResultWarning, LoadError, Outcome, ParseWarning};
pub use loader::{Sheet, SheetSelection, Workbook};
pub use source::WorkbookSource;
pub use tadash_cli::{Args, OutputFormat};

/// Application name used for the config directory and other app-specific paths
pub const APP_NAME: &str = "tadash";
