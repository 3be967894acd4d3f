//! User-facing error message formatting.
//!
//! Uses typed error matching (LoadError, PolarsError variants, io::ErrorKind)
//! rather than string parsing to produce actionable messages.

use polars::prelude::PolarsError;
use std::io;
use std::path::Path;

use crate::error::LoadError;

/// Format a LoadError for someone who has the workbook open in a spreadsheet.
pub fn user_message(err: &LoadError) -> String {
    match err {
        LoadError::Io { path, source } => format!(
            "Could not read {}: {}",
            path.display(),
            user_message_from_io(source, None)
        ),
        LoadError::Format(msg) => format!(
            "Not a readable workbook ({}). Save it as .xlsx or .csv and try again.",
            msg
        ),
        LoadError::NoSheets => "The workbook has no worksheets.".to_string(),
        LoadError::SheetNotFound(sheet) => format!(
            "Sheet '{}' not found. Use --sheet with a sheet name or 0-based index.",
            sheet
        ),
        LoadError::MissingSheet { role, required } => format!(
            "No {} sheet found. Add a sheet with the columns: {}.",
            role,
            required.join(", ")
        ),
        LoadError::MissingColumns { sheet, missing } => format!(
            "Sheet '{}' is missing required columns: {}. Headers are matched ignoring case and surrounding spaces.",
            sheet,
            missing.join(", ")
        ),
        LoadError::DuplicateColumn(name) => format!(
            "Two columns are both named '{}' once case and spaces are ignored. Rename one of them.",
            name
        ),
        LoadError::Polars(pe) => user_message_from_polars(pe),
    }
}

/// Format a PolarsError as a user-facing message by matching on its variant.
pub fn user_message_from_polars(err: &PolarsError) -> String {
    use polars::prelude::PolarsError as PE;

    match err {
        PE::ColumnNotFound(msg) => format!(
            "Column not found: {}. Check spelling and that the column exists.",
            msg
        ),
        PE::Duplicate(msg) => format!("Duplicate column: {}", msg),
        PE::IO { error, msg } => {
            user_message_from_io(error.as_ref(), msg.as_ref().map(|m| m.as_ref()))
        }
        PE::NoData(msg) => format!("No data: {}", msg),
        PE::SchemaMismatch(msg) => format!("Schema mismatch: {}", msg),
        PE::ShapeMismatch(msg) => format!("Row shape mismatch: {}", msg),
        PE::InvalidOperation(msg) => format!("Operation not allowed: {}", msg),
        PE::OutOfBounds(msg) => format!("Index or row out of bounds: {}", msg),
        PE::ComputeError(msg) => format!("Could not compute the report: {}", msg),
        PE::Context { error, msg } => {
            let inner = user_message_from_polars(error);
            format!("{}: {}", msg, inner)
        }
        #[allow(unreachable_patterns)]
        _ => err.to_string(),
    }
}

/// Format an io::Error as a user-facing message by matching on ErrorKind.
pub fn user_message_from_io(err: &io::Error, context: Option<&str>) -> String {
    use std::io::ErrorKind;

    let base: String = match err.kind() {
        ErrorKind::NotFound => "File or directory not found.".to_string(),
        ErrorKind::PermissionDenied => "Permission denied. Check read access.".to_string(),
        ErrorKind::InvalidData | ErrorKind::InvalidInput => {
            "Invalid or corrupted data.".to_string()
        }
        ErrorKind::UnexpectedEof => "Unexpected end of file.".to_string(),
        ErrorKind::Interrupted => "Operation interrupted.".to_string(),
        ErrorKind::OutOfMemory => "Out of memory.".to_string(),
        ErrorKind::Other => {
            let msg = err.to_string();
            if msg.contains("Is a directory") {
                return "Path is a directory, not a file.".to_string();
            }
            return if context.is_some() {
                format!("I/O error: {}", msg)
            } else {
                msg
            };
        }
        _ => err.to_string(),
    };

    match context {
        Some(ctx) if !ctx.is_empty() => format!("{} {}", base, ctx),
        _ => base,
    }
}

/// Format a color_eyre Report by downcasting to known error types.
/// Walks the cause chain to find LoadError, PolarsError or io::Error.
pub fn user_message_from_report(report: &color_eyre::eyre::Report, path: Option<&Path>) -> String {
    let with_path = |msg: String| match path {
        Some(p) => format!("Failed to load {}: {}", p.display(), msg),
        None => msg,
    };
    for cause in report.chain() {
        if let Some(le) = cause.downcast_ref::<LoadError>() {
            return user_message(le);
        }
        if let Some(pe) = cause.downcast_ref::<PolarsError>() {
            return with_path(user_message_from_polars(pe));
        }
        if let Some(io_err) = cause.downcast_ref::<io::Error>() {
            return with_path(user_message_from_io(io_err, None));
        }
    }

    // Fallback: use first line of display to avoid long tracebacks
    let display = report.to_string();
    let first_line = display.lines().next().unwrap_or("An error occurred");
    with_path(first_line.trim().to_string())
}
