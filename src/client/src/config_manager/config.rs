use anyhow::{Context, Result};
use config::Config as RConfig;
use memscan_common::constants::{
    DEFAULT_CHUNK_SIZE, DEFAULT_DARWIN_BINARY_NAME, DEFAULT_DUMP_BYTE_LIMIT,
    DEFAULT_LINUX_BINARY_NAME, DEFAULT_MAX_RESULTS_PER_PROCESS, DEFAULT_OUTPUT_DIR,
    DEFAULT_RESULT_CHANNEL_CAPACITY, DEFAULT_WINDOWS_BINARY_NAME,
};
use memscan_common::platform::BinaryNames;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Config {
    pub max_results_per_process: usize,
    pub chunk_size: usize,
    pub dump_byte_limit: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_region_size: Option<u64>,
    pub output_dir: PathBuf,
    pub result_channel_capacity: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scan_deadline_ms: Option<u64>,
    pub binary_names: BinaryNames,
}

impl Config {
    pub fn scan_deadline(&self) -> Option<Duration> {
        self.scan_deadline_ms.map(Duration::from_millis)
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads defaults, then the config file at `path` (or the user-level
    /// file when present). Every field has a default; the file only needs
    /// the keys it overrides.
    pub fn load_config(path: Option<&Path>) -> Result<Config> {
        let mut builder = RConfig::builder()
            .set_default(
                "max_results_per_process",
                DEFAULT_MAX_RESULTS_PER_PROCESS as u64,
            )?
            .set_default("chunk_size", DEFAULT_CHUNK_SIZE as u64)?
            .set_default("dump_byte_limit", DEFAULT_DUMP_BYTE_LIMIT)?
            .set_default("max_region_size", None::<u64>)?
            .set_default("output_dir", DEFAULT_OUTPUT_DIR)?
            .set_default(
                "result_channel_capacity",
                DEFAULT_RESULT_CHANNEL_CAPACITY as u64,
            )?
            .set_default("scan_deadline_ms", None::<u64>)?
            .set_default("binary_names.linux", DEFAULT_LINUX_BINARY_NAME)?
            .set_default("binary_names.windows", DEFAULT_WINDOWS_BINARY_NAME)?
            .set_default("binary_names.darwin", DEFAULT_DARWIN_BINARY_NAME)?;

        match path {
            Some(path) => {
                builder = builder.add_source(config::File::from(path));
            }
            None => {
                if let Some(default_path) = Self::default_config_path() {
                    builder =
                        builder.add_source(config::File::from(default_path).required(false));
                }
            }
        }

        let config = builder
            .build()?
            .try_deserialize()
            .context("failed to parse config file")?;
        Ok(config)
    }

    pub fn load_default_config() -> Result<Config> {
        Self::load_config(None)
    }

    fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("memscan").join("memscan.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_explicit_file_fails() {
        // A named-but-missing file is an error; only the implicit
        // user-level file is optional.
        assert!(ConfigLoader::load_config(Some(Path::new("/nonexistent/none.toml"))).is_err());
    }

    #[test]
    fn test_defaults_cover_every_field() {
        let config = ConfigLoader::load_default_config().unwrap();
        assert_eq!(
            config.max_results_per_process,
            DEFAULT_MAX_RESULTS_PER_PROCESS
        );
        assert_eq!(config.dump_byte_limit, DEFAULT_DUMP_BYTE_LIMIT);
        assert_eq!(config.max_region_size, None);
        assert_eq!(config.scan_deadline_ms, None);
        assert_eq!(config.binary_names.linux, DEFAULT_LINUX_BINARY_NAME);
        assert_eq!(config.output_dir, PathBuf::from(DEFAULT_OUTPUT_DIR));
    }

    #[test]
    fn test_file_overrides_selected_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memscan.toml");
        std::fs::write(
            &path,
            "max_results_per_process = 3\n\
             dump_byte_limit = 4096\n\
             [binary_names]\n\
             linux = \"fleetd\"\n",
        )
        .unwrap();

        let config = ConfigLoader::load_config(Some(&path)).unwrap();
        assert_eq!(config.max_results_per_process, 3);
        assert_eq!(config.dump_byte_limit, 4096);
        assert_eq!(config.binary_names.linux, "fleetd");
        // Untouched keys keep their defaults.
        assert_eq!(config.chunk_size, DEFAULT_CHUNK_SIZE);
        assert_eq!(config.binary_names.darwin, DEFAULT_DARWIN_BINARY_NAME);
    }

    #[test]
    fn test_scan_deadline_converts_to_duration() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memscan.toml");
        std::fs::write(&path, "scan_deadline_ms = 2500\n").unwrap();

        let config = ConfigLoader::load_config(Some(&path)).unwrap();
        assert_eq!(config.scan_deadline(), Some(Duration::from_millis(2500)));
    }
}
