#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Configuration for the emotion map.
//!
//! A default configuration is embedded at compile time via [`include_str!`].
//! [`AppConfig::load`] replaces it with the TOML file named by the
//! `EMOTION_MAP_CONFIG` environment variable when that is set.

pub mod intro;

use std::path::{Path, PathBuf};
use std::time::Duration;

use emotion_map_aggregation_models::Filters;
use emotion_map_survey_models::{Metric, Place};
use serde::Deserialize;

/// Environment variable naming an alternative config file.
pub const CONFIG_ENV_VAR: &str = "EMOTION_MAP_CONFIG";

/// Embedded default configuration.
const DEFAULT_CONFIG_TOML: &str = include_str!("../defaults/emotion_map.toml");

/// Errors that can occur while loading configuration or persisted flags.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Reading or writing a file failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// File that was accessed.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The config file is not valid TOML for [`AppConfig`].
    #[error("Invalid config: {0}")]
    Toml(#[from] toml::de::Error),

    /// A persisted JSON flag file is malformed.
    #[error("Invalid flag file: {0}")]
    Json(#[from] serde_json::Error),
}

/// Top-level application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Where survey tables come from.
    pub data: DataConfig,
    /// Renderer source, layer and timing settings.
    pub map: MapConfig,
    /// Initial selections.
    pub defaults: DefaultsConfig,
    /// Intro modal persistence.
    pub intro: IntroConfig,
}

/// Location and layout of the per-place survey tables.
#[derive(Debug, Clone, Deserialize)]
pub struct DataConfig {
    /// Directory (or URL path prefix) holding the CSV files.
    pub base_dir: PathBuf,
    /// Optional base URL; when set the loader fetches over HTTP.
    #[serde(default)]
    pub base_url: Option<String>,
    /// H3 resolution the hex ids are expected to have.
    pub h3_resolution: u8,
    /// CSV file name for each place.
    pub files: PlaceFiles,
}

impl DataConfig {
    /// Returns the local path of the CSV file for `place`.
    #[must_use]
    pub fn local_path(&self, place: Place) -> PathBuf {
        self.base_dir.join(self.files.get(place))
    }
}

/// One CSV file name per place.
#[derive(Debug, Clone, Deserialize)]
pub struct PlaceFiles {
    /// Indoor responses.
    pub drinnen: String,
    /// Outdoor responses.
    pub draussen: String,
    /// Public transit responses.
    pub oepnv: String,
}

impl PlaceFiles {
    /// Returns the file name configured for `place`.
    #[must_use]
    pub fn get(&self, place: Place) -> &str {
        match place {
            Place::Drinnen => &self.drinnen,
            Place::Draussen => &self.draussen,
            Place::Oepnv => &self.oepnv,
        }
    }
}

/// Renderer-facing settings.
#[derive(Debug, Clone, Deserialize)]
pub struct MapConfig {
    /// Vector source id.
    pub source_id: String,
    /// Source layer holding the hex polygons.
    pub polygon_layer: String,
    /// Source layer holding the hex centroids.
    pub centroid_layer: String,
    /// Feature property promoted to the feature id.
    pub id_property: String,
    /// URL scheme under which the tile archive protocol is registered.
    pub protocol_scheme: String,
    /// Path of the tile archive.
    pub tile_archive: String,
    /// Initial map center as `[lng, lat]`.
    pub center: [f64; 2],
    /// Initial zoom.
    pub zoom: f64,
    /// Coalescing window for feature-state re-application.
    pub debounce_ms: u64,
}

impl MapConfig {
    /// Returns the debounce window as a [`Duration`].
    #[must_use]
    pub const fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Returns the source URL of the tile archive, e.g.
    /// `pmtiles:///berlin-h3-res9-v2.pmtiles`.
    #[must_use]
    pub fn archive_url(&self) -> String {
        format!("{}:///{}", self.protocol_scheme, self.tile_archive)
    }
}

/// Initial selections shown on startup.
#[derive(Debug, Clone, Deserialize)]
pub struct DefaultsConfig {
    /// Initially selected metric.
    pub metric: Metric,
    /// Initially active place.
    pub place: Place,
    /// Initial filter state.
    #[serde(default)]
    pub filters: Filters,
}

/// Where the "seen intro" flag is stored.
#[derive(Debug, Clone, Deserialize)]
pub struct IntroConfig {
    /// JSON file holding the flag.
    pub flag_path: PathBuf,
}

impl AppConfig {
    /// Returns the embedded default configuration.
    ///
    /// # Panics
    ///
    /// Panics if the embedded TOML is malformed (this is a compile-time
    /// guarantee since the config is embedded and covered by tests).
    #[must_use]
    pub fn embedded() -> Self {
        Self::from_toml_str(DEFAULT_CONFIG_TOML)
            .unwrap_or_else(|e| panic!("Failed to parse embedded emotion_map.toml: {e}"))
    }

    /// Parses a configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Toml`] if the text is not a valid config.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// Reads a configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Loads the file named by [`CONFIG_ENV_VAR`], or the embedded default
    /// when the variable is unset.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the variable points at an unreadable or
    /// invalid file.
    pub fn load() -> Result<Self, ConfigError> {
        match std::env::var(CONFIG_ENV_VAR) {
            Ok(path) if !path.trim().is_empty() => {
                log::info!("Loading config from {path}");
                Self::from_path(Path::new(&path))
            }
            _ => {
                log::debug!("Using embedded default config");
                Ok(Self::embedded())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_config_parses() {
        let config = AppConfig::embedded();
        assert_eq!(config.map.source_id, "h3");
        assert_eq!(config.map.polygon_layer, "h3");
        assert_eq!(config.map.centroid_layer, "h3_centroids");
        assert_eq!(config.map.debounce(), Duration::from_millis(50));
        assert_eq!(config.defaults.metric, Metric::Happy);
        assert_eq!(config.defaults.place, Place::Draussen);
        assert_eq!(config.defaults.filters, Filters::default());
        assert_eq!(config.data.h3_resolution, 9);
    }

    #[test]
    fn every_place_has_a_file() {
        let config = AppConfig::embedded();
        for place in Place::all() {
            let path = config.data.local_path(*place);
            assert!(path.to_string_lossy().ends_with(&format!("berlin_{place}.csv")));
        }
    }

    #[test]
    fn archive_url_uses_protocol_scheme() {
        let config = AppConfig::embedded();
        assert_eq!(config.map.archive_url(), "pmtiles:///berlin-h3-res9-v2.pmtiles");
    }

    #[test]
    fn rejects_unknown_metric() {
        let text = DEFAULT_CONFIG_TOML.replace("metric = \"Happy\"", "metric = \"Joy\"");
        assert!(matches!(
            AppConfig::from_toml_str(&text),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn reads_config_file() {
        let dir = std::env::temp_dir().join("emotion_map_config_test_read");
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("custom.toml");
        std::fs::write(
            &path,
            DEFAULT_CONFIG_TOML.replace("debounce_ms = 50", "debounce_ms = 120"),
        )
        .unwrap();

        let config = AppConfig::from_path(&path).unwrap();
        assert_eq!(config.map.debounce_ms, 120);

        let missing = AppConfig::from_path(&dir.join("missing.toml"));
        assert!(matches!(missing, Err(ConfigError::Io { .. })));
        let message = missing.unwrap_err().to_string();
        assert!(message.starts_with("I/O error on "));
        assert!(message.contains("missing.toml"));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
