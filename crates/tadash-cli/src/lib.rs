//! Shared CLI definitions for tadash.
//!
//! Used by the main application and by the build script (manpage) and
//! gen_docs binary (command-line-options markdown).

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// How reports are written to stdout
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum OutputFormat {
    /// Metric cards and aligned tables for reading in a terminal
    Text,
    /// One CSV block per table, each preceded by a `# title` line
    Csv,
    /// A single JSON document holding every metric, table and chart series
    Json,
}

impl OutputFormat {
    /// Parse the config-file spelling of a format ("text", "csv", "json").
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "text" | "txt" => Some(Self::Text),
            "csv" => Some(Self::Csv),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Command-line arguments for tadash
#[derive(Clone, Parser, Debug)]
#[command(
    name = "tadash",
    version,
    about = "Recruitment pipeline dashboards over spreadsheet workbooks"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Read configuration from this file instead of ~/.config/tadash/config.toml
    #[arg(long = "config", value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Output format (text, csv, json). Overrides config [output] format
    #[arg(long = "output", value_enum, global = true)]
    pub output: Option<OutputFormat>,

    /// Enable debug logging (RUST_LOG still takes precedence)
    #[arg(long = "debug", action, global = true)]
    pub debug: bool,

    /// Generate default configuration file at ~/.config/tadash/config.toml
    #[arg(long = "generate-config", action)]
    pub generate_config: bool,

    /// Force overwrite existing config file when using --generate-config
    #[arg(long = "force", requires = "generate_config", action)]
    pub force: bool,
}

#[derive(Clone, Subcommand, Debug)]
pub enum Command {
    /// Master record dashboard: one sheet of requisitions with per-stage counts
    Master(MasterArgs),
    /// Recruiter and client dashboard: RecruiterData and optional ClientWise sheets
    Team(TeamArgs),
}

#[derive(Clone, clap::Args, Debug)]
pub struct MasterArgs {
    /// Workbook to read (.xlsx, .xlsm, .xlsb, .xls, .ods or .csv). Defaults to config [workbook] path
    #[arg(value_name = "PATH")]
    pub path: Option<PathBuf>,

    /// Sheet to load: 0-based index (e.g. 0) or sheet name (e.g. "Master"). Default: first sheet
    #[arg(long = "sheet", value_name = "SHEET")]
    pub sheet: Option<String>,

    /// First requisition date to include (YYYY-MM-DD). Default: earliest date in the data
    #[arg(long = "from", value_name = "DATE")]
    pub from: Option<String>,

    /// Last requisition date to include (YYYY-MM-DD). Default: latest date in the data
    #[arg(long = "to", value_name = "DATE")]
    pub to: Option<String>,

    /// Restrict the role chart to this client (repeatable)
    #[arg(long = "client", value_name = "NAME")]
    pub clients: Vec<String>,

    /// Restrict the role chart to this job title (repeatable)
    #[arg(long = "role", value_name = "TITLE")]
    pub roles: Vec<String>,

    /// strftime format of the "req received date" column. Default: %d-%b-%y
    #[arg(long = "date-format", value_name = "FORMAT")]
    pub date_format: Option<String>,

    /// Reference date for the aging table (YYYY-MM-DD). Default: today
    #[arg(long = "as-of", value_name = "DATE")]
    pub as_of: Option<String>,
}

#[derive(Clone, clap::Args, Debug)]
pub struct TeamArgs {
    /// Workbook to read (.xlsx, .xlsm, .xlsb, .xls, .ods or .csv). Defaults to config [workbook] path
    #[arg(value_name = "PATH")]
    pub path: Option<PathBuf>,

    /// First recruiter date to include (YYYY-MM-DD). Default: earliest date in the data
    #[arg(long = "from", value_name = "DATE")]
    pub from: Option<String>,

    /// Last recruiter date to include (YYYY-MM-DD). Default: latest date in the data
    #[arg(long = "to", value_name = "DATE")]
    pub to: Option<String>,

    /// Only include this recruiter (repeatable). Default: all recruiters
    #[arg(long = "recruiter", value_name = "NAME")]
    pub recruiters: Vec<String>,

    /// First client date to include when the client sheet holds calendar dates
    #[arg(long = "client-from", value_name = "DATE")]
    pub client_from: Option<String>,

    /// Last client date to include when the client sheet holds calendar dates
    #[arg(long = "client-to", value_name = "DATE")]
    pub client_to: Option<String>,

    /// First day of month to include when the client sheet holds day numbers
    #[arg(long = "client-from-day", value_name = "DAY")]
    pub client_from_day: Option<i64>,

    /// Last day of month to include when the client sheet holds day numbers
    #[arg(long = "client-to-day", value_name = "DAY")]
    pub client_to_day: Option<i64>,

    /// Warn when the team %Permanent falls below this percentage. Overrides config [team] alert_permanent
    #[arg(long = "alert-permanent", value_name = "PCT")]
    pub alert_permanent: Option<f64>,
}

/// Escape `|` and newlines for use in markdown table cells.
fn escape_table_cell(s: &str) -> String {
    s.replace('|', "\\|").replace(['\n', '\r'], " ")
}

fn render_arguments(out: &mut String, cmd: &clap::Command) {
    out.push_str("| Option | Description |\n");
    out.push_str("|--------|-------------|\n");

    for arg in cmd.get_arguments() {
        let id = arg.get_id().as_ref().to_string();
        if id == "help" || id == "version" {
            continue;
        }

        let placeholder: String = arg
            .get_value_names()
            .map(|names| {
                names
                    .iter()
                    .map(|n: &clap::builder::Str| format!("<{}>", n.as_ref() as &str))
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .unwrap_or_default();

        let option_str = if arg.is_positional() {
            if arg.is_required_set() {
                placeholder
            } else {
                format!("[{placeholder}]")
            }
        } else {
            let mut parts = Vec::new();
            if let Some(s) = arg.get_short() {
                parts.push(format!("-{s}"));
            }
            if let Some(l) = arg.get_long() {
                parts.push(format!("--{l}"));
            }
            let op = parts.join(", ");
            if arg.get_action().takes_values() && !placeholder.is_empty() {
                format!("{op} {placeholder}")
            } else {
                op
            }
        };

        let help = arg
            .get_help()
            .map(|h| escape_table_cell(&h.to_string()))
            .unwrap_or_else(|| "-".to_string());

        out.push_str(&format!("| `{option_str}` | {help} |\n"));
    }
}

/// Render command-line options as markdown, one table for the global options
/// and one per subcommand.
pub fn render_options_markdown() -> String {
    let mut cmd = Args::command();
    cmd.build();

    let mut out = String::from("# Command Line Options\n\n");

    out.push_str("## Usage\n\n```\n");
    let usage = cmd.render_usage();
    out.push_str(&usage.to_string());
    out.push_str("\n```\n\n");

    out.push_str("## Options\n\n");
    render_arguments(&mut out, &cmd);

    for sub in cmd.get_subcommands() {
        if sub.get_name() == "help" {
            continue;
        }
        out.push_str(&format!("\n## `{}`\n\n", sub.get_name()));
        if let Some(about) = sub.get_about() {
            out.push_str(&format!("{}\n\n", about));
        }
        render_arguments(&mut out, sub);
    }

    out
}
