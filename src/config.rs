//! Configuration management for studycam
//!
//! Settings come from three layers, later ones winning: built-in defaults,
//! an optional TOML file, and `STUDYCAM__SECTION__KEY` environment
//! variables. The API key can also be supplied as `STUDYCAM_API_KEY`.

use crate::analysis::HttpClientConfig;
use crate::errors::ConfigError;
use crate::pipeline::{
    CaptureInterval, CaptureSettings, FrameSourceConfig, PipelineConfig, PreviewConfig,
};
use crate::quality::QualityThresholds;
use crate::types::Resolution;
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const ENV_PREFIX: &str = "STUDYCAM";
const API_KEY_VAR: &str = "STUDYCAM_API_KEY";
const CONFIG_PATH_VAR: &str = "STUDYCAM_CONFIG";

/// Root configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StudyCamConfig {
    pub camera: CameraConfig,
    pub quality: QualityConfig,
    pub capture: CaptureConfig,
    pub analysis: AnalysisConfig,
    pub preview: PreviewSettings,
}

/// Camera-specific configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub device_index: u32,
    /// Requested resolution [width, height]
    pub resolution: [u32; 2],
    /// Consecutive failed reads before the camera is reported as failing
    pub failure_report_threshold: u32,
    pub read_retry_delay_ms: u64,
}

/// Quality gate thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    pub min_sharpness: f64,
    pub min_brightness: f64,
    pub max_brightness: f64,
}

/// Capture and auto-capture settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub auto_capture: bool,
    pub interval_secs: u64,
    /// JPEG quality of frames sent for analysis (1-100)
    pub jpeg_quality: u8,
}

/// Remote analysis service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub endpoint: String,
    pub api_key: String,
    pub timeout_secs: u64,
    pub analyze_type: String,
    pub detail_level: String,
}

/// Live preview
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewSettings {
    pub interval_ms: u64,
    /// No frame for this long shows the camera as disconnected
    pub stale_after_ms: u64,
    /// JPEG quality of preview images (1-100)
    pub jpeg_quality: u8,
}

impl Default for CameraConfig {
    fn default() -> Self {
        let hd = Resolution::hd();
        Self {
            device_index: 0,
            resolution: [hd.width, hd.height],
            failure_report_threshold: 30,
            read_retry_delay_ms: 10,
        }
    }
}

impl Default for QualityConfig {
    fn default() -> Self {
        let thresholds = QualityThresholds::default();
        Self {
            min_sharpness: thresholds.min_sharpness,
            min_brightness: thresholds.min_brightness,
            max_brightness: thresholds.max_brightness,
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            auto_capture: false,
            interval_secs: CaptureInterval::DEFAULT_SECS,
            jpeg_quality: 85,
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        let http = HttpClientConfig::default();
        Self {
            endpoint: http.endpoint,
            api_key: String::new(),
            timeout_secs: http.timeout.as_secs(),
            analyze_type: http.analyze_type,
            detail_level: http.detail_level,
        }
    }
}

impl Default for PreviewSettings {
    fn default() -> Self {
        Self {
            interval_ms: 100,
            stale_after_ms: 2000,
            jpeg_quality: 70,
        }
    }
}

impl StudyCamConfig {
    /// Load defaults, then `path` if it exists, then the process environment
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        Self::load_layered(path, std::env::vars().collect())
    }

    /// Same as [`load_from_file`](Self::load_from_file) with an explicit
    /// environment
    pub fn load_layered<P: AsRef<Path>>(
        path: P,
        env: HashMap<String, String>,
    ) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let defaults = Config::try_from(&Self::default())
            .map_err(|e| ConfigError::Parse(format!("Failed to build defaults: {}", e)))?;

        let mut builder = Config::builder().add_source(defaults);
        if path.exists() {
            let text = fs::read_to_string(path)
                .map_err(|e| ConfigError::Read(format!("{}: {}", path.display(), e)))?;
            builder = builder.add_source(File::from_str(&text, FileFormat::Toml));
            log::info!("Loading configuration from {:?}", path);
        } else {
            log::info!("Config file not found at {:?}, using defaults", path);
        }

        let api_key = env.get(API_KEY_VAR).cloned();
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true)
                .source(Some(env)),
        );

        let mut config: StudyCamConfig = builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| ConfigError::Parse(format!("Failed to parse config: {}", e)))?;

        if let Some(key) = api_key.filter(|k| !k.trim().is_empty()) {
            config.analysis.api_key = key;
        }

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                ConfigError::Write(format!("Failed to create config directory: {}", e))
            })?;
        }

        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::Write(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, toml_string)
            .map_err(|e| ConfigError::Write(format!("Failed to write config file: {}", e)))?;

        log::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// `$STUDYCAM_CONFIG`, or `studycam.toml` in the working directory
    pub fn default_path() -> PathBuf {
        std::env::var_os(CONFIG_PATH_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("studycam.toml"))
    }

    /// Load from default location or fall back to defaults
    pub fn load_or_default() -> Self {
        Self::load_from_file(Self::default_path()).unwrap_or_else(|e| {
            log::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        if self.camera.resolution[0] == 0 || self.camera.resolution[1] == 0 {
            return invalid("Invalid camera resolution".to_string());
        }
        self.thresholds().validate().map_err(ConfigError::Invalid)?;
        if let Err(e) = CaptureInterval::from_secs(self.capture.interval_secs) {
            return invalid(e.to_string());
        }
        if !(1..=100).contains(&self.capture.jpeg_quality)
            || !(1..=100).contains(&self.preview.jpeg_quality)
        {
            return invalid("JPEG quality must be between 1 and 100".to_string());
        }
        if self.analysis.timeout_secs == 0 {
            return invalid("Analysis timeout must be at least 1 second".to_string());
        }
        let endpoint = self.analysis.endpoint.trim();
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return invalid(format!("Analysis endpoint is not an http(s) URL: {}", endpoint));
        }
        if self.preview.interval_ms == 0 {
            return invalid("Preview interval must be at least 1 ms".to_string());
        }
        if self.preview.stale_after_ms < self.preview.interval_ms {
            return invalid(format!(
                "Camera stale timeout ({} ms) must not be shorter than the preview interval ({} ms)",
                self.preview.stale_after_ms, self.preview.interval_ms
            ));
        }

        Ok(())
    }

    pub fn thresholds(&self) -> QualityThresholds {
        QualityThresholds {
            min_sharpness: self.quality.min_sharpness,
            min_brightness: self.quality.min_brightness,
            max_brightness: self.quality.max_brightness,
        }
    }

    pub fn capture_interval(&self) -> CaptureInterval {
        CaptureInterval::clamped(self.capture.interval_secs).0
    }

    pub fn capture_settings(&self) -> CaptureSettings {
        CaptureSettings {
            thresholds: self.thresholds(),
            analysis_timeout: Duration::from_secs(self.analysis.timeout_secs),
            jpeg_quality: self.capture.jpeg_quality,
        }
    }

    pub fn http_client_config(&self) -> HttpClientConfig {
        HttpClientConfig {
            endpoint: self.analysis.endpoint.clone(),
            api_key: self.analysis.api_key.clone(),
            timeout: Duration::from_secs(self.analysis.timeout_secs),
            analyze_type: self.analysis.analyze_type.clone(),
            detail_level: self.analysis.detail_level.clone(),
        }
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            source: FrameSourceConfig {
                device_index: self.camera.device_index,
                resolution: Resolution::new(self.camera.resolution[0], self.camera.resolution[1]),
                failure_report_threshold: self.camera.failure_report_threshold,
                read_retry_delay: Duration::from_millis(self.camera.read_retry_delay_ms),
                ..Default::default()
            },
            preview: PreviewConfig {
                interval: Duration::from_millis(self.preview.interval_ms),
                stale_after: Duration::from_millis(self.preview.stale_after_ms),
            },
            capture: self.capture_settings(),
            auto_interval: self.capture_interval(),
            auto_capture: self.capture.auto_capture,
        }
    }
}
