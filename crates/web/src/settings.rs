//! Panel configuration

use autotest_common::Suite;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_FIRMWARE_DIR: &str = "firmware";

/// Panel configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelConfig {
    /// HTTP listen address
    pub listen: String,

    /// Stored intercom configuration edited by the panel
    pub config_file: PathBuf,

    /// Directory for run reports
    pub logs_dir: PathBuf,

    /// Firmware store root, one subdirectory per version
    pub firmware_dir: PathBuf,

    /// Largest accepted firmware upload
    pub max_upload_bytes: usize,

    /// Lifetime of an unsubmitted editor session
    pub session_ttl_hours: i64,

    /// Working directory the suite commands run in
    pub workdir: PathBuf,

    /// Delay between per-device progress ticks
    pub progress_step_ms: u64,

    /// Commands launched for each suite
    pub suites: SuiteCommands,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:5000".to_string(),
            config_file: PathBuf::from(autotest_common::DEFAULT_CONFIG_FILE),
            logs_dir: PathBuf::from(autotest_common::DEFAULT_LOGS_DIR),
            firmware_dir: PathBuf::from(DEFAULT_FIRMWARE_DIR),
            max_upload_bytes: 512 * 1024 * 1024,
            session_ttl_hours: crate::sessions::DEFAULT_SESSION_TTL_HOURS,
            workdir: PathBuf::from("."),
            progress_step_ms: 100,
            suites: SuiteCommands::default(),
        }
    }
}

/// Suite command lines: program followed by its arguments
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SuiteCommands {
    pub acceptance: Vec<String>,
    pub regression: Vec<String>,
    pub firmware: Vec<String>,
}

impl Default for SuiteCommands {
    fn default() -> Self {
        let python = |script: &str| vec!["python3".to_string(), script.to_string()];
        Self {
            acceptance: python("acceptance.py"),
            regression: python("Regression.py"),
            firmware: python("test_firmware.py"),
        }
    }
}

impl SuiteCommands {
    pub fn command(&self, suite: Suite) -> &[String] {
        match suite {
            Suite::Acceptance => &self.acceptance,
            Suite::Regression => &self.regression,
            Suite::Firmware => &self.firmware,
        }
    }
}

impl PanelConfig {
    /// Load configuration from file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn progress_step(&self) -> Duration {
        Duration::from_millis(self.progress_step_ms)
    }

    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.session_ttl_hours)
    }
}
