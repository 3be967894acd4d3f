use color_eyre::eyre::eyre;
use color_eyre::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tadash_cli::OutputFormat;

use crate::dashboard::master::DEFAULT_DATE_FORMAT;
use crate::dashboard::team::DEFAULT_ALERT_PERMANENT;
use crate::schema::{CLIENT_WISE, RECRUITER_DATA};

/// Manages config directory and config file operations
#[derive(Clone)]
pub struct ConfigManager {
    pub(crate) config_dir: PathBuf,
}

impl ConfigManager {
    /// Create a ConfigManager with a custom config directory (primarily for testing)
    pub fn with_dir(config_dir: PathBuf) -> Self {
        Self { config_dir }
    }

    /// Create a new ConfigManager for the given app name
    pub fn new(app_name: &str) -> Result<Self> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| eyre!("Could not determine config directory"))?
            .join(app_name);

        Ok(Self { config_dir })
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Get path to a specific config file
    pub fn config_path(&self, path: &str) -> PathBuf {
        self.config_dir.join(path)
    }

    pub fn ensure_config_dir(&self) -> Result<()> {
        if !self.config_dir.exists() {
            std::fs::create_dir_all(&self.config_dir)?;
        }
        Ok(())
    }

    /// Default configuration template, with every option commented
    pub fn generate_default_config(&self) -> String {
        DEFAULT_CONFIG_TEMPLATE.to_string()
    }

    /// Write default configuration to config file
    pub fn write_default_config(&self, force: bool) -> Result<PathBuf> {
        let config_path = self.config_path("config.toml");

        if config_path.exists() && !force {
            return Err(eyre!(
                "Config file already exists at {}. Use --force to overwrite.",
                config_path.display()
            ));
        }

        self.ensure_config_dir()?;
        std::fs::write(&config_path, DEFAULT_CONFIG_TEMPLATE)?;

        Ok(config_path)
    }
}

/// Complete application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Configuration format version (for future compatibility)
    pub version: String,
    pub workbook: WorkbookConfig,
    pub master: MasterConfig,
    pub team: TeamConfig,
    pub output: OutputConfig,
    pub debug: DebugConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct WorkbookConfig {
    /// Workbook read when no path is given on the command line
    pub path: Option<PathBuf>,
    /// Sheet for the master dashboard (name or 0-based index)
    pub sheet: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MasterConfig {
    /// strftime format of "req received date"; "infer" tries common formats
    pub date_format: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TeamConfig {
    pub alert_permanent: f64,
    pub recruiter_sheet: String,
    pub client_sheet: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// "text", "csv" or "json"
    pub format: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    pub enabled: bool,
    /// tracing filter directive used when RUST_LOG is unset, e.g. "tadash=debug"
    pub log_filter: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: "0.1".to_string(),
            workbook: WorkbookConfig::default(),
            master: MasterConfig::default(),
            team: TeamConfig::default(),
            output: OutputConfig::default(),
            debug: DebugConfig::default(),
        }
    }
}

impl Default for MasterConfig {
    fn default() -> Self {
        Self {
            date_format: DEFAULT_DATE_FORMAT.to_string(),
        }
    }
}

impl Default for TeamConfig {
    fn default() -> Self {
        Self {
            alert_permanent: DEFAULT_ALERT_PERMANENT,
            recruiter_sheet: RECRUITER_DATA.sheet_name.to_string(),
            client_sheet: CLIENT_WISE.sheet_name.to_string(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: "text".to_string(),
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            log_filter: "warn".to_string(),
        }
    }
}

// Configuration loading and merging
impl AppConfig {
    /// Load configuration from all layers (default → user)
    pub fn load(app_name: &str) -> Result<Self> {
        let config_manager = ConfigManager::new(app_name)?;
        Self::load_from(&config_manager.config_path("config.toml"))
    }

    /// Load defaults overlaid with the file at `path`, if it exists.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = AppConfig::default();
        if path.exists() {
            config.merge(Self::read_file(path)?);
        }
        config.validate()?;
        Ok(config)
    }

    fn read_file(config_path: &Path) -> Result<AppConfig> {
        let content = std::fs::read_to_string(config_path).map_err(|e| {
            eyre!(
                "Failed to read config file at {}: {}",
                config_path.display(),
                e
            )
        })?;

        toml::from_str(&content).map_err(|e| {
            eyre!(
                "Failed to parse config file at {}: {}",
                config_path.display(),
                e
            )
        })
    }

    /// Merge another config into this one (other takes precedence)
    pub fn merge(&mut self, other: AppConfig) {
        if other.version != AppConfig::default().version {
            self.version = other.version;
        }

        self.workbook.merge(other.workbook);
        self.master.merge(other.master);
        self.team.merge(other.team);
        self.output.merge(other.output);
        self.debug.merge(other.debug);
    }

    pub fn validate(&self) -> Result<()> {
        if !self.version.starts_with("0.1") {
            return Err(eyre!(
                "Unsupported config version: {}. Expected 0.1.x",
                self.version
            ));
        }

        if !(0.0..=100.0).contains(&self.team.alert_permanent) {
            return Err(eyre!(
                "alert_permanent must be between 0 and 100, got {}",
                self.team.alert_permanent
            ));
        }

        if self.master.date_format.trim().is_empty() {
            return Err(eyre!("master.date_format must not be empty"));
        }

        if self.output_format().is_none() {
            return Err(eyre!(
                "Invalid output format: {}. Must be 'text', 'csv', or 'json'",
                self.output.format
            ));
        }

        Ok(())
    }

    pub fn output_format(&self) -> Option<OutputFormat> {
        OutputFormat::from_name(&self.output.format)
    }
}

// Merge implementations for each config section
impl WorkbookConfig {
    pub fn merge(&mut self, other: Self) {
        if other.path.is_some() {
            self.path = other.path;
        }
        if other.sheet.is_some() {
            self.sheet = other.sheet;
        }
    }
}

impl MasterConfig {
    pub fn merge(&mut self, other: Self) {
        let default = MasterConfig::default();
        if other.date_format != default.date_format {
            self.date_format = other.date_format;
        }
    }
}

impl TeamConfig {
    pub fn merge(&mut self, other: Self) {
        let default = TeamConfig::default();
        if other.alert_permanent != default.alert_permanent {
            self.alert_permanent = other.alert_permanent;
        }
        if other.recruiter_sheet != default.recruiter_sheet {
            self.recruiter_sheet = other.recruiter_sheet;
        }
        if other.client_sheet != default.client_sheet {
            self.client_sheet = other.client_sheet;
        }
    }
}

impl OutputConfig {
    pub fn merge(&mut self, other: Self) {
        let default = OutputConfig::default();
        if other.format != default.format {
            self.format = other.format;
        }
    }
}

impl DebugConfig {
    pub fn merge(&mut self, other: Self) {
        let default = DebugConfig::default();
        if other.enabled != default.enabled {
            self.enabled = other.enabled;
        }
        if other.log_filter != default.log_filter {
            self.log_filter = other.log_filter;
        }
    }
}

const DEFAULT_CONFIG_TEMPLATE: &str = include_str!("../config/default.toml");
