use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::consts::{
    DEFAULT_CACHE_CAPACITY_BYTES, DEFAULT_CACHE_TTL_SECS, DEFAULT_MAX_FILE_SIZE, DEFAULT_MAX_ZOOM,
    DEFAULT_SESSION_IDLE_SECS, DEFAULT_STRETCH_TIMEOUT_SECS, DEFAULT_TILE_SIZE,
    DEFAULT_WRITE_DELAY_MS,
};
use crate::error::{PlotError, Result};
use crate::stretch::RangeSpec;

/// Engine settings, loadable from TOML. Every section falls back to its
/// defaults when omitted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Directory derived files are written to.
    pub work_dir: PathBuf,
    /// Source files must live under one of these. Empty allows any path.
    pub source_roots: Vec<PathBuf>,
    /// Largest accepted source file, in bytes.
    pub max_file_size: u64,
    pub max_zoom: f32,
    pub write_delay_ms: u64,
    pub session_idle_secs: u64,
    pub default_range: RangeSpec,
    pub stretch: StretchConfig,
    pub cache: CacheConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            work_dir: std::env::temp_dir().join("skyplot"),
            source_roots: Vec::new(),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            max_zoom: DEFAULT_MAX_ZOOM,
            write_delay_ms: DEFAULT_WRITE_DELAY_MS,
            session_idle_secs: DEFAULT_SESSION_IDLE_SECS,
            default_range: RangeSpec::default(),
            stretch: StretchConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StretchConfig {
    /// Worker threads in the tile pool.
    pub parallel_cores: usize,
    pub tile_size: usize,
    pub timeout_secs: u64,
}

impl Default for StretchConfig {
    fn default() -> Self {
        Self {
            parallel_cores: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            tile_size: DEFAULT_TILE_SIZE,
            timeout_secs: DEFAULT_STRETCH_TIMEOUT_SECS,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub capacity_bytes: usize,
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity_bytes: DEFAULT_CACHE_CAPACITY_BYTES,
            ttl_secs: DEFAULT_CACHE_TTL_SECS,
        }
    }
}

impl EngineConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| PlotError::io_at(path, e))?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).map_err(|e| PlotError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| PlotError::Config(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.stretch.tile_size == 0 {
            return Err(PlotError::Config("stretch.tile_size must be positive".into()));
        }
        if self.max_zoom <= 0.0 {
            return Err(PlotError::Config("max_zoom must be positive".into()));
        }
        Ok(())
    }

    pub fn write_delay(&self) -> Duration {
        Duration::from_millis(self.write_delay_ms)
    }

    pub fn session_idle(&self) -> Duration {
        Duration::from_secs(self.session_idle_secs)
    }

    pub fn stretch_timeout(&self) -> Duration {
        Duration::from_secs(self.stretch.timeout_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.ttl_secs)
    }
}
