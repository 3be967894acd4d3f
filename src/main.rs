use chrono::NaiveDate;
use clap::{CommandFactory, Parser};
use color_eyre::eyre::eyre;
use color_eyre::Result;
use std::io::Write;
use std::path::PathBuf;
use tadash::dashboard::{run_master, run_team, MasterFilters, TeamFilters};
use tadash::dates::{DateFormat, RangeRequest};
use tadash::error_display::user_message_from_report;
use tadash::render::{render_empty, render_master, render_team};
use tadash::{
    AppConfig, ConfigManager, LoadCache, LoadError, Outcome, SheetSelection, WorkbookSource,
    APP_NAME,
};
use tadash_cli::{Args, Command, MasterArgs, OutputFormat, TeamArgs};
use tracing::debug;

/// Parse a YYYY-MM-DD command-line date
fn parse_cli_date(flag: &str, value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| eyre!("Invalid {} date '{}': expected YYYY-MM-DD", flag, value))
}

fn date_request(
    from: &Option<String>,
    to: &Option<String>,
    from_flag: &str,
    to_flag: &str,
) -> Result<RangeRequest<NaiveDate>> {
    let from = from
        .as_deref()
        .map(|v| parse_cli_date(from_flag, v))
        .transpose()?;
    let to = to.as_deref().map(|v| parse_cli_date(to_flag, v)).transpose()?;
    Ok(RangeRequest::new(from, to))
}

fn master_filters(args: &MasterArgs, config: &AppConfig, today: NaiveDate) -> Result<MasterFilters> {
    let as_of = match &args.as_of {
        Some(value) => parse_cli_date("--as-of", value)?,
        None => today,
    };
    let date_format = args
        .date_format
        .as_deref()
        .unwrap_or(&config.master.date_format);
    Ok(MasterFilters::as_of(as_of)
        .with_date_format(DateFormat::from_setting(date_format))
        .with_date_range(date_request(&args.from, &args.to, "--from", "--to")?)
        .with_clients(args.clients.clone())
        .with_roles(args.roles.clone()))
}

fn team_filters(args: &TeamArgs, config: &AppConfig) -> Result<TeamFilters> {
    let alert_permanent = args.alert_permanent.unwrap_or(config.team.alert_permanent);
    if !(0.0..=100.0).contains(&alert_permanent) {
        return Err(eyre!(
            "--alert-permanent must be between 0 and 100, got {}",
            alert_permanent
        ));
    }
    Ok(TeamFilters {
        recruiter_sheet: config.team.recruiter_sheet.clone(),
        client_sheet: config.team.client_sheet.clone(),
        recruiter_range: date_request(&args.from, &args.to, "--from", "--to")?,
        recruiters: args.recruiters.clone(),
        client_dates: date_request(
            &args.client_from,
            &args.client_to,
            "--client-from",
            "--client-to",
        )?,
        client_days: RangeRequest::new(args.client_from_day, args.client_to_day),
        alert_permanent,
    })
}

fn workbook_path(path: &Option<PathBuf>, config: &AppConfig) -> Result<PathBuf> {
    path.clone()
        .or_else(|| config.workbook.path.clone())
        .ok_or_else(|| {
            eyre!("No workbook given. Pass a path or set [workbook] path in the config file.")
        })
}

fn run_master_command(
    args: &MasterArgs,
    config: &AppConfig,
    cache: &mut LoadCache,
    format: OutputFormat,
    out: &mut impl Write,
) -> Result<()> {
    let source = WorkbookSource::path(workbook_path(&args.path, config)?);
    let selection = args
        .sheet
        .as_deref()
        .or(config.workbook.sheet.as_deref())
        .map(SheetSelection::parse)
        .unwrap_or(SheetSelection::First);
    let filters = master_filters(args, config, chrono::Local::now().date_naive())?;
    let workbook = cache.load(&source, &selection)?;
    let sheet = workbook.first().ok_or(LoadError::NoSheets)?;
    debug!(sheet = %sheet.name, ?filters, "running master dashboard");
    match run_master(sheet, &filters)? {
        Outcome::Ready(report) => render_master(&report, format, out),
        Outcome::Empty(warning) => render_empty(&warning, format, out),
    }
}

fn run_team_command(
    args: &TeamArgs,
    config: &AppConfig,
    cache: &mut LoadCache,
    format: OutputFormat,
    out: &mut impl Write,
) -> Result<()> {
    let source = WorkbookSource::path(workbook_path(&args.path, config)?);
    let filters = team_filters(args, config)?;
    let workbook = cache.load(&source, &SheetSelection::All)?;
    debug!(sheets = ?workbook.sheet_names(), ?filters, "running team dashboard");
    match run_team(workbook, &filters)? {
        Outcome::Ready(report) => render_team(&report, format, out),
        Outcome::Empty(warning) => render_empty(&warning, format, out),
    }
}

fn load_config(args: &Args) -> Result<AppConfig> {
    match &args.config {
        Some(path) if !path.exists() => Err(eyre!("Config file not found: {}", path.display())),
        Some(path) => AppConfig::load_from(path),
        None => AppConfig::load(APP_NAME),
    }
}

fn handle_early_exit_flags(args: &Args) -> Result<Option<()>> {
    if args.generate_config {
        let config_manager = ConfigManager::new(APP_NAME)?;
        match config_manager.write_default_config(args.force) {
            Ok(path) => {
                println!("Configuration written to {}", path.display());
                return Ok(Some(()));
            }
            Err(e) => {
                eprintln!("Error writing config: {}", e);
                std::process::exit(1);
            }
        }
    }

    Ok(None)
}

fn run(args: &Args, config: &AppConfig, command: &Command) -> Result<()> {
    let format = args
        .output
        .or_else(|| config.output_format())
        .unwrap_or(OutputFormat::Text);
    let mut cache = LoadCache::new();
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    match command {
        Command::Master(master) => run_master_command(master, config, &mut cache, format, &mut out),
        Command::Team(team) => run_team_command(team, config, &mut cache, format, &mut out),
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    if let Some(()) = handle_early_exit_flags(&args)? {
        return Ok(());
    }

    color_eyre::install()?;
    let config = load_config(&args)?;

    let mut debug_config = config.debug.clone();
    if args.debug {
        debug_config.enabled = true;
    }
    if let Err(e) = tadash::telemetry::init(&debug_config) {
        eprintln!("Warning: {}", e);
    }

    let Some(command) = &args.command else {
        Args::command().print_help()?;
        return Ok(());
    };

    if let Err(e) = run(&args, &config, command) {
        eprintln!("Error: {}", user_message_from_report(&e, None));
        std::process::exit(1);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn master_args(argv: &[&str]) -> MasterArgs {
        let mut full = vec!["tadash", "master"];
        full.extend_from_slice(argv);
        match Args::parse_from(full).command {
            Some(Command::Master(args)) => args,
            other => panic!("expected master command, got {:?}", other),
        }
    }

    fn team_args(argv: &[&str]) -> TeamArgs {
        let mut full = vec!["tadash", "team"];
        full.extend_from_slice(argv);
        match Args::parse_from(full).command {
            Some(Command::Team(args)) => args,
            other => panic!("expected team command, got {:?}", other),
        }
    }

    #[test]
    fn test_master_args_to_filters() {
        let args = master_args(&[
            "book.xlsx",
            "--from",
            "2024-01-05",
            "--client",
            "Acme",
            "--role",
            "Dev",
            "--role",
            "QA",
        ]);
        let filters = master_filters(&args, &AppConfig::default(), ymd(2024, 2, 1)).unwrap();
        assert_eq!(filters.as_of, ymd(2024, 2, 1));
        assert_eq!(filters.date_range, RangeRequest::new(Some(ymd(2024, 1, 5)), None));
        assert_eq!(filters.clients, vec!["Acme"]);
        assert_eq!(filters.roles, vec!["Dev", "QA"]);
        assert_eq!(filters.date_format, DateFormat::fixed("%d-%b-%y"));
    }

    #[test]
    fn test_master_date_format_from_config() {
        let mut config = AppConfig::default();
        config.master.date_format = "infer".to_string();
        let args = master_args(&["--as-of", "2024-03-01"]);
        let filters = master_filters(&args, &config, ymd(2030, 1, 1)).unwrap();
        assert_eq!(filters.date_format, DateFormat::Inferred);
        assert_eq!(filters.as_of, ymd(2024, 3, 1));
    }

    #[test]
    fn test_bad_cli_date_is_error() {
        let args = master_args(&["--to", "03/01/2024"]);
        let err = master_filters(&args, &AppConfig::default(), ymd(2024, 1, 1)).unwrap_err();
        assert!(err.to_string().contains("--to"));
    }

    #[test]
    fn test_team_args_override_config() {
        let mut config = AppConfig::default();
        config.team.alert_permanent = 40.0;
        let args = team_args(&["--recruiter", "Asha", "--client-from-day", "3"]);
        let filters = team_filters(&args, &config).unwrap();
        assert_eq!(filters.alert_permanent, 40.0);
        assert_eq!(filters.recruiters, vec!["Asha"]);
        assert_eq!(filters.client_days, RangeRequest::new(Some(3), None));

        let args = team_args(&["--alert-permanent", "10"]);
        assert_eq!(team_filters(&args, &config).unwrap().alert_permanent, 10.0);

        let args = team_args(&["--alert-permanent", "150"]);
        assert!(team_filters(&args, &config).is_err());
    }

    #[test]
    fn test_workbook_path_falls_back_to_config() {
        let mut config = AppConfig::default();
        assert!(workbook_path(&None, &config).is_err());
        config.workbook.path = Some(PathBuf::from("/data/book.xlsx"));
        assert_eq!(
            workbook_path(&None, &config).unwrap(),
            PathBuf::from("/data/book.xlsx")
        );
    }
}
