use std::path::{Path, PathBuf};

use regio_model::HarmonizeConfig;
use tracing::debug;

use crate::error::{IngestError, Result};

/// Load and validate a run configuration.
///
/// Relative input paths are resolved against the configuration file's
/// directory so a config can be run from anywhere.
pub fn load_config(path: &Path) -> Result<HarmonizeConfig> {
    let raw = std::fs::read_to_string(path).map_err(|err| IngestError::io(path, err))?;
    let mut config: HarmonizeConfig = toml::from_str(&raw).map_err(|source| IngestError::Toml {
        path: path.to_path_buf(),
        source,
    })?;
    let base = path.parent().unwrap_or_else(|| Path::new(""));
    resolve_paths(&mut config, base);
    config.validate().map_err(|source| IngestError::Harmonize {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(
        path = %path.display(),
        overrides = config.overrides.len(),
        measures = config.measures.len(),
        "loaded config"
    );
    Ok(config)
}

fn resolve(base: &Path, path: &mut PathBuf) {
    if path.is_relative() {
        *path = base.join(&*path);
    }
}

fn resolve_paths(config: &mut HarmonizeConfig, base: &Path) {
    resolve(base, &mut config.sources.events);
    if let Some(anchor_codes) = config.sources.anchor_codes.as_mut() {
        resolve(base, anchor_codes);
    }
    if let Some(output_dir) = config.output_dir.as_mut() {
        resolve(base, output_dir);
    }
    for measure in &mut config.measures {
        resolve(base, &mut measure.input);
        if let Some(coverage) = measure.coverage.as_mut() {
            resolve(base, &mut coverage.reference);
        }
    }
}
