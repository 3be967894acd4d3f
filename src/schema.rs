//! Column mappings for the sheets each dashboard reads.
//!
//! All names are in normalized form (trimmed, lower-case). A sheet is checked
//! once against its schema right after header normalization; a missing
//! required column is a [`LoadError`] there, not a lookup failure deep in the
//! aggregation code.

use polars::prelude::DataFrame;

use crate::error::LoadError;

/// Master record sheet columns.
pub mod master {
    pub const REQ_RECEIVED_DATE: &str = "req received date";
    pub const CUSTOMER_NAME: &str = "customer name";
    pub const RECRUITER_ASSIGNED: &str = "recruiter assigned";
    pub const JOB_TITLE: &str = "job title";
    pub const OPEN_POSITIONS: &str = "no of open position";
    pub const PROFILES_SUBMITTED: &str = "profiles submitted";
    pub const SCREEN_SELECT: &str = "screen select from client";
    pub const FEEDBACK_PENDING: &str = "feedback pending";
    pub const L1_SELECT: &str = "l1 select";
    pub const L2_SELECT: &str = "l2 select";
    pub const FINAL_SELECT: &str = "final select";
    pub const ONBOARDED: &str = "onboarded";
    pub const SCREEN_REJECT: &str = "screen reject from client";
    pub const L1_REJECT: &str = "l1 reject";
    pub const L2_REJECT: &str = "l2 reject";
    pub const TOTAL: &str = "total";
    pub const SUBCON: &str = "subcon";
    pub const PERMANENT: &str = "permanent";

    pub const L1_PENDING: &str = "l1 pending";
    pub const L2_PENDING: &str = "l2 pending";
    pub const FINAL_PENDING: &str = "final pending";
    pub const AGE_DAYS: &str = "age (days)";

    /// Columns coerced to integers when present.
    pub const NUM_COLS: &[&str] = &[
        OPEN_POSITIONS,
        PROFILES_SUBMITTED,
        SCREEN_SELECT,
        FEEDBACK_PENDING,
        L1_SELECT,
        L2_SELECT,
        FINAL_SELECT,
        ONBOARDED,
        SCREEN_REJECT,
        L1_REJECT,
        L2_REJECT,
        TOTAL,
        SUBCON,
        PERMANENT,
    ];
}

/// Recruiter and client sheet columns of the team workbook.
pub mod team {
    pub const DATE: &str = "date";
    pub const RECRUITER: &str = "recruiter";
    pub const CLIENT: &str = "client";
    pub const TOTAL: &str = "total";
    pub const SUBCON: &str = "subcon";
    pub const PERMANENT: &str = "permanent";

    pub const NUM_COLS: &[&str] = &[TOTAL, SUBCON, PERMANENT];
}

/// Required columns of one logical sheet.
#[derive(Debug, Clone, Copy)]
pub struct SheetSchema {
    /// Human-readable role, used in error messages
    pub role: &'static str,
    /// Sheet name looked up before falling back to auto-detection
    pub sheet_name: &'static str,
    pub required: &'static [&'static str],
}

pub const MASTER: SheetSchema = SheetSchema {
    role: "master record",
    sheet_name: "Master",
    required: &[
        master::REQ_RECEIVED_DATE,
        master::CUSTOMER_NAME,
        master::RECRUITER_ASSIGNED,
        master::JOB_TITLE,
        master::OPEN_POSITIONS,
        master::PROFILES_SUBMITTED,
        master::ONBOARDED,
    ],
};

pub const RECRUITER_DATA: SheetSchema = SheetSchema {
    role: "recruiter",
    sheet_name: "RecruiterData",
    required: &[
        team::DATE,
        team::RECRUITER,
        team::TOTAL,
        team::SUBCON,
        team::PERMANENT,
    ],
};

pub const CLIENT_WISE: SheetSchema = SheetSchema {
    role: "client",
    sheet_name: "ClientWise",
    required: &[
        team::DATE,
        team::CLIENT,
        team::TOTAL,
        team::SUBCON,
        team::PERMANENT,
    ],
};

impl SheetSchema {
    /// Required columns absent from `df`, in schema order.
    pub fn missing_columns(&self, df: &DataFrame) -> Vec<String> {
        let present: Vec<&str> = df.get_column_names().iter().map(|s| s.as_str()).collect();
        self.required
            .iter()
            .filter(|c| !present.contains(*c))
            .map(|c| c.to_string())
            .collect()
    }

    /// Check a normalized frame against the schema.
    pub fn validate(&self, sheet: &str, df: &DataFrame) -> Result<(), LoadError> {
        let missing = self.missing_columns(df);
        if missing.is_empty() {
            Ok(())
        } else {
            Err(LoadError::MissingColumns {
                sheet: sheet.to_string(),
                missing,
            })
        }
    }

    pub fn missing_sheet(&self) -> LoadError {
        LoadError::MissingSheet {
            role: self.role.to_string(),
            required: self.required.iter().map(|c| c.to_string()).collect(),
        }
    }
}

/// True when every column in `columns` exists in `df`.
pub fn has_all(df: &DataFrame, columns: &[&str]) -> bool {
    let present: Vec<&str> = df.get_column_names().iter().map(|s| s.as_str()).collect();
    columns.iter().all(|c| present.contains(c))
}
