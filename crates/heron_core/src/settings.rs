//! Persistent Settings Management
//!
//! Saves and restores the EQ parameters plus device and stream choices.
//!
//! # Storage Locations
//! - Linux: `~/.config/heron/settings.json`
//! - Windows: `%APPDATA%\heron\settings.json`
//! - macOS: `~/Library/Application Support/com.heron.heron/settings.json`

use std::fs;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use heron_dsp::ChainSettings;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::config::StreamConfig;
use crate::error::{EngineError, EngineResult};
use crate::parameters::EqParameters;

/// Root settings structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeronSettings {
    pub chain: ChainSettings,
    pub bypassed: bool,
    #[serde(default)]
    pub input_device: Option<String>,
    #[serde(default)]
    pub output_device: Option<String>,
    #[serde(default)]
    pub stream: StreamConfig,
}

impl Default for HeronSettings {
    fn default() -> Self {
        Self {
            chain: ChainSettings::default(),
            bypassed: false,
            input_device: None,
            output_device: None,
            stream: StreamConfig::default(),
        }
    }
}

impl HeronSettings {
    /// Load from the platform config path, or defaults if missing/corrupt
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            info!("No config directory, using default settings");
            return Self::default();
        };
        if !path.exists() {
            info!("Using default settings");
            return Self::default();
        }

        match Self::load_from(&path) {
            Ok(settings) => settings,
            Err(e) => {
                error!("{}", e);
                info!("Using default settings");
                Self::default()
            }
        }
    }

    /// Save to the platform config path
    pub fn save(&self) -> EngineResult<()> {
        let path = Self::config_path()
            .ok_or_else(|| EngineError::SettingsError("Could not determine config path".into()))?;
        self.save_to(&path)
    }

    pub fn load_from(path: &Path) -> EngineResult<Self> {
        let file = fs::File::open(path)
            .map_err(|e| EngineError::SettingsError(format!("Failed to open {:?}: {}", path, e)))?;
        let settings = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| EngineError::SettingsError(format!("Failed to parse {:?}: {}", path, e)))?;

        info!("Settings loaded from {:?}", path);
        Ok(settings)
    }

    pub fn save_to(&self, path: &Path) -> EngineResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| EngineError::SettingsError(e.to_string()))?;
        }

        let file = fs::File::create(path).map_err(|e| EngineError::SettingsError(e.to_string()))?;
        serde_json::to_writer_pretty(file, self).map_err(|e| EngineError::SettingsError(e.to_string()))?;

        info!("Settings saved to {:?}", path);
        Ok(())
    }

    /// Copy the store's current values into `chain`
    pub fn capture(&mut self, parameters: &EqParameters) {
        self.chain = parameters.snapshot();
    }

    /// Parameter store seeded from the saved chain
    pub fn to_parameters(&self) -> EqParameters {
        EqParameters::from_settings(&self.chain)
    }

    /// Platform-specific configuration file path
    pub fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("com", "heron", "heron").map(|proj| proj.config_dir().join("settings.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameters::ParameterId;
    use heron_dsp::Slope;

    #[test]
    fn test_default_settings() {
        let settings = HeronSettings::default();
        assert_eq!(settings.chain, ChainSettings::default());
        assert!(!settings.bypassed);
        assert!(settings.input_device.is_none());
        assert_eq!(settings.stream, StreamConfig::default());
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");

        let settings = HeronSettings {
            chain: ChainSettings {
                peak_freq: 2500.0,
                peak_gain_db: -3.5,
                high_cut_slope: Slope::Db24,
                ..Default::default()
            },
            bypassed: true,
            output_device: Some("Speakers".to_string()),
            ..Default::default()
        };

        settings.save_to(&path).unwrap();
        let loaded = HeronSettings::load_from(&path).unwrap();
        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_load_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = HeronSettings::load_from(&dir.path().join("absent.json"));
        assert!(matches!(result, Err(EngineError::SettingsError(_))));
    }

    #[test]
    fn test_load_corrupt_file_fails() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, b"{ not json").unwrap();

        let result = HeronSettings::load_from(file.path());
        assert!(matches!(result, Err(EngineError::SettingsError(_))));
    }

    #[test]
    fn test_backward_compat_missing_fields() {
        // Only the required fields present
        let old_json = r#"{
            "chain": {
                "peak_freq": 750.0,
                "peak_gain_db": 0.0,
                "peak_quality": 1.0,
                "low_cut_freq": 20.0,
                "high_cut_freq": 20000.0,
                "low_cut_slope": "Db12",
                "high_cut_slope": "Db48"
            },
            "bypassed": false
        }"#;

        let settings: HeronSettings = serde_json::from_str(old_json).unwrap();
        assert_eq!(settings.chain.high_cut_slope, Slope::Db48);
        assert!(settings.output_device.is_none());
        assert_eq!(settings.stream, StreamConfig::default());
    }

    #[test]
    fn test_parameters_round_trip() {
        let params = EqParameters::new();
        params.set(ParameterId::LowCutFreq, 80.0);
        params.set(ParameterId::LowCutSlope, 2.0);

        let mut settings = HeronSettings::default();
        settings.capture(&params);
        assert_eq!(settings.chain.low_cut_freq, 80.0);
        assert_eq!(settings.chain.low_cut_slope, Slope::Db36);

        let restored = settings.to_parameters();
        assert_eq!(restored.snapshot(), params.snapshot());
    }
}
