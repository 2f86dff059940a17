use std::path::PathBuf;

use chrono::NaiveDate;
use regio_model::{Diagnostics, HarmonizeConfig, ReplayScope};
use regio_report::RunReport;

/// Command-line values that take precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub config_path: PathBuf,
    pub anchor_date: Option<NaiveDate>,
    pub scope: Option<ReplayScope>,
    pub output_dir: Option<PathBuf>,
    /// Run every stage but write no files.
    pub dry_run: bool,
}

impl RunOptions {
    pub fn new(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
            ..Self::default()
        }
    }

    /// Apply the overrides to a loaded configuration.
    pub fn apply(&self, config: &mut HarmonizeConfig) {
        if let Some(anchor_date) = self.anchor_date {
            config.anchor_date = anchor_date;
        }
        if let Some(scope) = self.scope {
            config.scope = scope;
        }
        if let Some(output_dir) = &self.output_dir {
            config.output_dir = Some(output_dir.clone());
        }
    }
}

#[derive(Debug)]
pub struct RunResult {
    pub output_dir: PathBuf,
    pub dry_run: bool,
    pub report: RunReport,
    /// Every diagnostic of the run, in the order raised.
    pub diagnostics: Diagnostics,
    pub change_events: Option<PathBuf>,
    pub run_report: Option<PathBuf>,
}

impl RunResult {
    pub fn has_warnings(&self) -> bool {
        self.diagnostics.has_warnings()
    }
}
