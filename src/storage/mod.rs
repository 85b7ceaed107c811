//! Storage Layer
//!
//! Locates the configuration directory and moves analysis results, page
//! images and exports between the file system and the pipeline.

pub mod documents;

pub use documents::{
    discover_batch_inputs, load_image, load_raw_result, save_image, write_csv_export, write_json_export,
    write_report_outputs, BatchInput, ReportOutputs,
};

use anyhow::Result;
use std::path::PathBuf;

use crate::config::{load_config, AppConfig};

const CONFIG_FILE_NAME: &str = "config.toml";

/// Get the configuration directory
pub fn get_config_dir() -> Result<PathBuf> {
    let proj_dirs = directories::ProjectDirs::from("com", "doc-overlay", "DocOverlay")
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

    let config_dir = proj_dirs.config_dir().to_path_buf();
    std::fs::create_dir_all(&config_dir)?;

    Ok(config_dir)
}

/// Default location of the configuration file
pub fn default_config_path() -> Result<PathBuf> {
    Ok(get_config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the given config file, or the default one when it exists, or built-in defaults
pub fn resolve_config(explicit: Option<&std::path::Path>) -> Result<AppConfig> {
    if let Some(path) = explicit {
        return load_config(path);
    }
    let path = default_config_path()?;
    if path.exists() {
        tracing::info!("Using config file {:?}", path);
        load_config(&path)
    } else {
        tracing::debug!("No config file at {:?}, using defaults", path);
        Ok(AppConfig::default())
    }
}
