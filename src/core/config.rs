//! Streaming configuration

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::{Error, Result};

/// Tunables for chunk streaming and material animation.
///
/// Every field has a default, so a config file only needs to name the
/// values it overrides.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamingConfig {
    /// Edge length (in view cells) of the square searched for missing chunks
    pub load_distance: u32,
    /// Edge length (in view cells) of the square outside which chunks are evicted
    pub unload_distance: u32,
    /// Maximum accepted load requests per streaming tick
    pub max_loads_per_tick: u32,
    /// Period of the streaming driver
    pub stream_interval_ms: u64,
    /// Period of the material animation driver
    pub animation_interval_ms: u64,
    /// Maximum fetches the byte source runs at once
    pub max_concurrent_fetches: usize,
    /// Material files (`{key}.mats`) loaded before streaming starts
    pub material_keys: Vec<String>,
    /// Base path for material files and relative texture refs.
    /// Empty means "the world directory".
    pub material_path: String,
    /// World units covered by one chunk edge
    pub chunk_world_size: f32,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            load_distance: 14,
            unload_distance: 16,
            max_loads_per_tick: 8,
            stream_interval_ms: 200,
            animation_interval_ms: 200,
            max_concurrent_fetches: 16,
            material_keys: vec!["block".to_string()],
            material_path: String::new(),
            chunk_world_size: 16.0,
        }
    }
}

impl StreamingConfig {
    /// Low-power profile: smaller load square, same budget.
    pub fn reduced() -> Self {
        Self {
            load_distance: 10,
            unload_distance: 12,
            ..Default::default()
        }
    }

    /// Read a JSON config file. Missing fields keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject combinations the streamer cannot honor
    pub fn validate(&self) -> Result<()> {
        if self.load_distance == 0 {
            return Err(Error::Config("load_distance must be at least 1".into()));
        }
        if self.unload_distance < self.load_distance {
            return Err(Error::Config(format!(
                "unload_distance ({}) must not be smaller than load_distance ({})",
                self.unload_distance, self.load_distance
            )));
        }
        if self.max_loads_per_tick == 0 {
            return Err(Error::Config("max_loads_per_tick must be at least 1".into()));
        }
        if self.max_concurrent_fetches == 0 {
            return Err(Error::Config("max_concurrent_fetches must be at least 1".into()));
        }
        if self.chunk_world_size.is_nan() || self.chunk_world_size <= 0.0 {
            return Err(Error::Config("chunk_world_size must be positive".into()));
        }
        Ok(())
    }

    pub fn stream_interval(&self) -> Duration {
        Duration::from_millis(self.stream_interval_ms)
    }

    pub fn animation_interval(&self) -> Duration {
        Duration::from_millis(self.animation_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = StreamingConfig::default();
        assert_eq!(config.load_distance, 14);
        assert_eq!(config.unload_distance, 16);
        assert_eq!(config.max_loads_per_tick, 8);
        assert_eq!(config.stream_interval(), Duration::from_millis(200));
        assert_eq!(config.material_keys, vec!["block".to_string()]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_reduced() {
        let config = StreamingConfig::reduced();
        assert_eq!(config.load_distance, 10);
        assert_eq!(config.unload_distance, 12);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_partial_json() {
        let config: StreamingConfig =
            serde_json::from_str(r#"{ "load_distance": 6, "unload_distance": 8 }"#).unwrap();
        assert_eq!(config.load_distance, 6);
        assert_eq!(config.unload_distance, 8);
        assert_eq!(config.max_loads_per_tick, 8);
    }

    #[test]
    fn test_config_validate_rejects_bad_values() {
        let config = StreamingConfig { load_distance: 0, ..Default::default() };
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let config = StreamingConfig {
            load_distance: 20,
            unload_distance: 10,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let config = StreamingConfig { max_loads_per_tick: 0, ..Default::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stream.json");
        std::fs::write(&path, r#"{ "max_loads_per_tick": 3 }"#).unwrap();

        let config = StreamingConfig::load(&path).unwrap();
        assert_eq!(config.max_loads_per_tick, 3);

        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(StreamingConfig::load(&path), Err(Error::Config(_))));
    }
}
