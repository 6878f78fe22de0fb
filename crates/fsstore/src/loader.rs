//! Config file discovery, loading, and environment variable overlay.
//!
//! Files are loaded in order (later wins):
//! 1. `/etc/fsstore/config.toml` (system)
//! 2. `~/.config/fsstore/config.toml` (user)
//! 3. `./fsstore.toml`, or a path given on the command line
//! 4. Environment variables (`FSSTORE_*`)
//!
//! ```toml
//! [store]
//! base_dir = "/tank/objects"
//! bucket = "store"
//! shard_prefix_len = 2
//! algorithm = "sha256"
//! debug = false
//! ```

use std::env;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{StoreConfigBuilder, ENV_DATA_DIR};
use crate::digest::DigestAlgorithm;

pub const ENV_BUCKET: &str = "FSSTORE_BUCKET";
pub const ENV_DEBUG: &str = "FSSTORE_DEBUG";
pub const ENV_SHARD_PREFIX_LEN: &str = "FSSTORE_SHARD_PREFIX_LEN";
pub const ENV_ALGORITHM: &str = "FSSTORE_ALGORITHM";

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Invalid value for {var}: {value:?}")]
    InvalidEnv { var: &'static str, value: String },
}

/// Information about where config values came from.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// Config files that were loaded (in order)
    pub files: Vec<PathBuf>,
    /// Environment variables that overrode config values
    pub env_overrides: Vec<String>,
}

/// The `[store]` table of a config file. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreSection {
    pub base_dir: Option<PathBuf>,
    pub bucket: Option<String>,
    pub shard_prefix_len: Option<usize>,
    pub debug: Option<bool>,
    pub algorithm: Option<DigestAlgorithm>,
    pub dir_mode: Option<u32>,
}

impl StoreSection {
    /// Overlay `other` on top of `self`; keys set in `other` win.
    pub fn merge(self, other: StoreSection) -> StoreSection {
        StoreSection {
            base_dir: other.base_dir.or(self.base_dir),
            bucket: other.bucket.or(self.bucket),
            shard_prefix_len: other.shard_prefix_len.or(self.shard_prefix_len),
            debug: other.debug.or(self.debug),
            algorithm: other.algorithm.or(self.algorithm),
            dir_mode: other.dir_mode.or(self.dir_mode),
        }
    }

    pub fn apply(self, mut builder: StoreConfigBuilder) -> StoreConfigBuilder {
        if let Some(dir) = self.base_dir {
            builder = builder.base_dir(dir);
        }
        if let Some(bucket) = self.bucket {
            builder = builder.bucket(bucket);
        }
        if let Some(len) = self.shard_prefix_len {
            builder = builder.shard_prefix_len(len);
        }
        if let Some(debug) = self.debug {
            builder = builder.debug(debug);
        }
        if let Some(algorithm) = self.algorithm {
            builder = builder.algorithm(algorithm);
        }
        if let Some(mode) = self.dir_mode {
            builder = builder.dir_mode(mode);
        }
        builder
    }
}

/// Discover config files, optionally with a CLI override path.
///
/// If `cli_path` is provided and exists, it replaces the local override.
/// Returns paths in load order (system, user, local/cli).
pub fn discover_config_files(cli_path: Option<&Path>) -> Vec<PathBuf> {
    let mut files = Vec::new();

    let system = PathBuf::from("/etc/fsstore/config.toml");
    if system.exists() {
        files.push(system);
    }

    if let Some(config_dir) = directories::BaseDirs::new().map(|d| d.config_dir().to_path_buf()) {
        let user = config_dir.join("fsstore/config.toml");
        if user.exists() {
            files.push(user);
        }
    }

    if let Some(path) = cli_path {
        if path.exists() {
            files.push(path.to_path_buf());
            return files;
        }
    }

    let local = PathBuf::from("fsstore.toml");
    if local.exists() {
        files.push(local);
    }

    files
}

/// Load the `[store]` section of a TOML file. A file without one yields an
/// empty section.
pub fn load_from_file(path: &Path) -> Result<StoreSection, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    parse_toml(&contents, path)
}

fn parse_toml(contents: &str, path: &Path) -> Result<StoreSection, ConfigError> {
    let parse_err = |message: String| ConfigError::Parse {
        path: path.to_path_buf(),
        message,
    };

    let table: toml::Table = contents
        .parse()
        .map_err(|e: toml::de::Error| parse_err(e.to_string()))?;

    match table.get("store") {
        Some(section) => section
            .clone()
            .try_into()
            .map_err(|e: toml::de::Error| parse_err(e.to_string())),
        None => Ok(StoreSection::default()),
    }
}

/// Read `FSSTORE_*` overrides through `lookup`, recording which ones applied.
pub fn env_section_from(
    lookup: impl Fn(&str) -> Option<String>,
    sources: &mut ConfigSources,
) -> Result<StoreSection, ConfigError> {
    let mut section = StoreSection::default();

    if let Some(dir) = lookup(ENV_DATA_DIR) {
        section.base_dir = Some(PathBuf::from(dir));
        sources.env_overrides.push(ENV_DATA_DIR.to_string());
    }

    if let Some(bucket) = lookup(ENV_BUCKET) {
        section.bucket = Some(bucket);
        sources.env_overrides.push(ENV_BUCKET.to_string());
    }

    if let Some(value) = lookup(ENV_DEBUG) {
        section.debug = Some(value.eq_ignore_ascii_case("true") || value == "1");
        sources.env_overrides.push(ENV_DEBUG.to_string());
    }

    if let Some(value) = lookup(ENV_SHARD_PREFIX_LEN) {
        let len = value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
            var: ENV_SHARD_PREFIX_LEN,
            value: value.clone(),
        })?;
        section.shard_prefix_len = Some(len);
        sources.env_overrides.push(ENV_SHARD_PREFIX_LEN.to_string());
    }

    if let Some(value) = lookup(ENV_ALGORITHM) {
        let algorithm = value.parse().map_err(|_| ConfigError::InvalidEnv {
            var: ENV_ALGORITHM,
            value: value.clone(),
        })?;
        section.algorithm = Some(algorithm);
        sources.env_overrides.push(ENV_ALGORITHM.to_string());
    }

    Ok(section)
}

/// Build a [`StoreConfigBuilder`] from every source: defaults, config files,
/// then the process environment. Validation still happens at `build()`.
pub fn load_builder(cli_path: Option<&Path>) -> Result<(StoreConfigBuilder, ConfigSources), ConfigError> {
    let mut sources = ConfigSources::default();
    let mut section = StoreSection::default();

    for path in discover_config_files(cli_path) {
        section = section.merge(load_from_file(&path)?);
        sources.files.push(path);
    }

    let env_section = env_section_from(|key| env::var(key).ok(), &mut sources)?;
    section = section.merge(env_section);

    Ok((section.apply(StoreConfigBuilder::default()), sources))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn lookup_in<'a>(
        vars: &'a HashMap<&'a str, &'a str>,
    ) -> impl Fn(&str) -> Option<String> + 'a {
        move |key: &str| vars.get(key).map(|v| v.to_string())
    }

    #[test]
    fn test_parse_store_section() {
        let section = parse_toml(
            r#"
            [store]
            base_dir = "/tank/objects"
            bucket = "media"
            shard_prefix_len = 3
            algorithm = "blake3"
            debug = true
            "#,
            Path::new("test.toml"),
        )
        .unwrap();

        assert_eq!(section.base_dir, Some(PathBuf::from("/tank/objects")));
        assert_eq!(section.bucket.as_deref(), Some("media"));
        assert_eq!(section.shard_prefix_len, Some(3));
        assert_eq!(section.algorithm, Some(DigestAlgorithm::Blake3));
        assert_eq!(section.debug, Some(true));
        assert_eq!(section.dir_mode, None);
    }

    #[test]
    fn test_missing_section_is_empty() {
        let section = parse_toml("[other]\nkey = 1\n", Path::new("test.toml")).unwrap();
        assert_eq!(section, StoreSection::default());
    }

    #[test]
    fn test_unknown_key_rejected() {
        let result = parse_toml("[store]\nbuckett = \"x\"\n", Path::new("bad.toml"));
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_invalid_toml() {
        let result = parse_toml("[store\n", Path::new("bad.toml"));
        match result {
            Err(ConfigError::Parse { path, .. }) => assert_eq!(path, PathBuf::from("bad.toml")),
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_merge_later_wins() {
        let base = StoreSection {
            bucket: Some("a".into()),
            shard_prefix_len: Some(2),
            ..Default::default()
        };
        let over = StoreSection {
            bucket: Some("b".into()),
            ..Default::default()
        };
        let merged = base.merge(over);
        assert_eq!(merged.bucket.as_deref(), Some("b"));
        assert_eq!(merged.shard_prefix_len, Some(2));
    }

    #[test]
    fn test_env_overrides() {
        let vars = HashMap::from([
            (ENV_DATA_DIR, "/env/data"),
            (ENV_BUCKET, "env-bucket"),
            (ENV_DEBUG, "1"),
            (ENV_SHARD_PREFIX_LEN, "4"),
        ]);
        let mut sources = ConfigSources::default();
        let section = env_section_from(lookup_in(&vars), &mut sources).unwrap();

        assert_eq!(section.base_dir, Some(PathBuf::from("/env/data")));
        assert_eq!(section.bucket.as_deref(), Some("env-bucket"));
        assert_eq!(section.debug, Some(true));
        assert_eq!(section.shard_prefix_len, Some(4));
        assert_eq!(sources.env_overrides.len(), 4);
    }

    #[test]
    fn test_env_invalid_shard_len() {
        let vars = HashMap::from([(ENV_SHARD_PREFIX_LEN, "two")]);
        let mut sources = ConfigSources::default();
        let result = env_section_from(lookup_in(&vars), &mut sources);
        assert!(matches!(
            result,
            Err(ConfigError::InvalidEnv { var: ENV_SHARD_PREFIX_LEN, .. })
        ));
    }

    #[test]
    fn test_section_builds_config() {
        let section = StoreSection {
            base_dir: Some(PathBuf::from("/from/file")),
            bucket: Some("filed".into()),
            shard_prefix_len: Some(0),
            ..Default::default()
        };
        let config = section.apply(StoreConfigBuilder::default()).build().unwrap();
        assert_eq!(config.base_dir(), Path::new("/from/file"));
        assert_eq!(config.bucket(), "filed");
        assert_eq!(config.shard_prefix_len(), 0);
    }

    #[test]
    fn test_empty_bucket_from_file_still_rejected() {
        let section = StoreSection {
            base_dir: Some(PathBuf::from("/x")),
            bucket: Some("".into()),
            ..Default::default()
        };
        let result = section.apply(StoreConfigBuilder::default()).build();
        assert!(matches!(result, Err(crate::StoreError::BucketNotSpecified)));
    }

    #[test]
    fn test_load_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fsstore.toml");
        std::fs::write(&path, "[store]\nbucket = \"disk\"\n").unwrap();

        let section = load_from_file(&path).unwrap();
        assert_eq!(section.bucket.as_deref(), Some("disk"));
    }

    #[test]
    fn test_load_missing_file() {
        let result = load_from_file(Path::new("/nonexistent/fsstore.toml"));
        assert!(matches!(result, Err(ConfigError::FileRead { .. })));
    }
}
