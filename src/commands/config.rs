use crate::config::StudyCamConfig;
use std::sync::{Arc, RwLock};
use tauri::command;

lazy_static::lazy_static! {
    static ref GLOBAL_CONFIG: Arc<RwLock<StudyCamConfig>> = Arc::new(RwLock::new(StudyCamConfig::load_or_default()));
}

/// Snapshot of the active configuration
pub(crate) fn current_config() -> Result<StudyCamConfig, String> {
    let config = GLOBAL_CONFIG.read().map_err(|e| e.to_string())?;
    Ok(config.clone())
}

/// Replace, persist and apply a configuration
pub(crate) fn store_config(new_config: StudyCamConfig) -> Result<(), String> {
    new_config.validate().map_err(|e| e.to_string())?;

    {
        let mut config = GLOBAL_CONFIG.write().map_err(|e| e.to_string())?;
        *config = new_config.clone();
    }

    new_config
        .save_to_file(StudyCamConfig::default_path())
        .map_err(|e| e.to_string())?;

    super::capture::apply_config(&new_config)
}

/// Write the active configuration back to disk
pub(crate) fn persist_current() -> Result<(), String> {
    current_config()?
        .save_to_file(StudyCamConfig::default_path())
        .map_err(|e| e.to_string())
}

/// Get the current configuration
#[command]
pub async fn get_config() -> Result<StudyCamConfig, String> {
    current_config()
}

/// Update configuration. Applied to a running pipeline immediately.
#[command]
pub async fn update_config(new_config: StudyCamConfig) -> Result<(), String> {
    store_config(new_config)
}

/// Reset configuration to defaults
#[command]
pub async fn reset_config() -> Result<StudyCamConfig, String> {
    let default_config = StudyCamConfig::default();
    store_config(default_config.clone())?;
    Ok(default_config)
}

/// Store the analysis API key and endpoint
#[command]
pub async fn update_api_settings(api_key: String, endpoint: Option<String>) -> Result<(), String> {
    let mut config = current_config()?;
    config.analysis.api_key = api_key.trim().to_string();
    if let Some(endpoint) = endpoint {
        config.analysis.endpoint = endpoint.trim().to_string();
    }
    store_config(config)
}

/// Get quality thresholds
#[command]
pub async fn get_quality_config() -> Result<crate::config::QualityConfig, String> {
    Ok(current_config()?.quality)
}

/// Update quality thresholds
#[command]
pub async fn update_quality_config(quality: crate::config::QualityConfig) -> Result<(), String> {
    let mut config = current_config()?;
    config.quality = quality;
    store_config(config)
}
