//! Configuration file loading and settings resolution
//!
//! Settings come from the command line first, then from the TOML file,
//! then from built-in defaults:
//!
//! ```toml
//! [connection]
//! device = "dev=/dev/ttyUSB0"
//!
//! [transfer]
//! memory = "2732"
//! chunk_size = 16
//! handshake_timeout_ms = 5000   # 0 waits forever
//! ready_code = "READY"
//! ```

use std::path::{Path, PathBuf};

use romflash_core::memory::MemoryType;
use romflash_serial::{SessionConfig, WaitPolicy};
use serde::Deserialize;

use crate::cli::LinkArgs;

/// Configuration file looked up in the working directory
pub const DEFAULT_CONFIG: &str = "romflash.toml";

/// Errors from loading or resolving configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Configuration file could not be read
    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Configuration file is not valid TOML or has unknown keys
    #[error("Failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    /// A required setting was given nowhere
    #[error("No {0} given; use --{0} or set it in the configuration file")]
    Missing(&'static str),
    /// Memory type not in the catalogue
    #[error("Unknown memory type: {0} (see list-chips)")]
    UnknownMemory(String),
}

/// On-disk configuration file
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub connection: ConnectionSection,
    pub transfer: TransferSection,
}

/// `[connection]` table
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConnectionSection {
    pub device: Option<String>,
}

/// `[transfer]` table
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransferSection {
    pub memory: Option<String>,
    pub chunk_size: Option<usize>,
    pub handshake_timeout_ms: Option<u64>,
    pub ready_code: Option<String>,
}

impl FileConfig {
    /// Load the configuration file
    ///
    /// An explicitly given path must exist. Without one, `romflash.toml` is
    /// used if present and an empty configuration otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG);
                if !default.is_file() {
                    log::debug!("No {} found, using defaults", DEFAULT_CONFIG);
                    return Ok(Self::default());
                }
                default
            }
        };

        let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        let config = Self::from_toml_str(&content)
            .map_err(|source| ConfigError::Parse { path: path.clone(), source })?;
        log::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}

/// Fully resolved settings for one command
#[derive(Debug, Clone)]
pub struct Settings {
    /// Connection string or `dummy`
    pub device: String,
    /// Target memory type
    pub memory: MemoryType,
    /// Session tunables
    pub session: SessionConfig,
}

impl Settings {
    /// Merge command-line arguments over the configuration file
    pub fn resolve(args: &LinkArgs, file: &FileConfig) -> Result<Self, ConfigError> {
        let device = args
            .device
            .clone()
            .or_else(|| file.connection.device.clone())
            .ok_or(ConfigError::Missing("device"))?;

        let memory_name = args
            .memory
            .as_deref()
            .or(file.transfer.memory.as_deref())
            .ok_or(ConfigError::Missing("memory"))?;
        let memory: MemoryType = memory_name
            .parse()
            .map_err(|_| ConfigError::UnknownMemory(memory_name.to_string()))?;

        let defaults = SessionConfig::default();
        let session = SessionConfig {
            chunk_size: args
                .chunk_size
                .or(file.transfer.chunk_size)
                .unwrap_or(defaults.chunk_size),
            wait: args
                .timeout_ms
                .or(file.transfer.handshake_timeout_ms)
                .map_or(defaults.wait, WaitPolicy::from_millis),
            ready_code: args
                .ready_code
                .clone()
                .or_else(|| file.transfer.ready_code.clone())
                .unwrap_or(defaults.ready_code),
        };

        Ok(Self {
            device,
            memory,
            session,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use romflash_serial::DEFAULT_WAIT;
    use std::time::Duration;

    const SAMPLE: &str = r#"
[connection]
device = "dev=/dev/ttyUSB0"

[transfer]
memory = "27C64"
chunk_size = 32
handshake_timeout_ms = 5000
ready_code = "INIT"
"#;

    #[test]
    fn test_parse_file() {
        let file = FileConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(file.connection.device.as_deref(), Some("dev=/dev/ttyUSB0"));
        assert_eq!(file.transfer.chunk_size, Some(32));
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        assert!(FileConfig::from_toml_str("[transfer]\nchunk = 4\n").is_err());
    }

    #[test]
    fn test_file_values_apply() {
        let file = FileConfig::from_toml_str(SAMPLE).unwrap();
        let settings = Settings::resolve(&LinkArgs::default(), &file).unwrap();
        assert_eq!(settings.device, "dev=/dev/ttyUSB0");
        assert_eq!(settings.memory, MemoryType::M2764);
        assert_eq!(settings.session.chunk_size, 32);
        assert_eq!(
            settings.session.wait,
            WaitPolicy::Bounded(Duration::from_millis(5000))
        );
        assert_eq!(settings.session.ready_code, "INIT");
    }

    #[test]
    fn test_cli_overrides_file() {
        let file = FileConfig::from_toml_str(SAMPLE).unwrap();
        let args = LinkArgs {
            device: Some("dummy".into()),
            memory: Some("2716".into()),
            chunk_size: Some(8),
            timeout_ms: None,
            ready_code: None,
        };
        let settings = Settings::resolve(&args, &file).unwrap();
        assert_eq!(settings.device, "dummy");
        assert_eq!(settings.memory, MemoryType::M2716);
        assert_eq!(settings.session.chunk_size, 8);
        assert_eq!(settings.session.ready_code, "INIT");
    }

    #[test]
    fn test_defaults() {
        let args = LinkArgs {
            device: Some("dummy".into()),
            memory: Some("32".into()),
            ..LinkArgs::default()
        };
        let settings = Settings::resolve(&args, &FileConfig::default()).unwrap();
        assert_eq!(settings.session, SessionConfig::default());
        assert_eq!(settings.session.wait, WaitPolicy::Bounded(DEFAULT_WAIT));
    }

    #[test]
    fn test_zero_timeout_waits_forever() {
        let file = FileConfig::from_toml_str("[transfer]\nhandshake_timeout_ms = 0\n").unwrap();
        let args = LinkArgs {
            device: Some("dummy".into()),
            memory: Some("2716".into()),
            ..LinkArgs::default()
        };
        let settings = Settings::resolve(&args, &file).unwrap();
        assert_eq!(settings.session.wait, WaitPolicy::Forever);
    }

    #[test]
    fn test_missing_and_invalid_settings() {
        let file = FileConfig::default();
        assert!(matches!(
            Settings::resolve(&LinkArgs::default(), &file),
            Err(ConfigError::Missing("device"))
        ));

        let args = LinkArgs {
            device: Some("dummy".into()),
            memory: Some("2748".into()),
            ..LinkArgs::default()
        };
        assert!(matches!(
            Settings::resolve(&args, &file),
            Err(ConfigError::UnknownMemory(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("romflash.toml");
        std::fs::write(&path, SAMPLE).unwrap();
        let file = FileConfig::load(Some(&path)).unwrap();
        assert_eq!(file.transfer.memory.as_deref(), Some("27C64"));

        let missing = dir.path().join("missing.toml");
        assert!(matches!(
            FileConfig::load(Some(&missing)),
            Err(ConfigError::Read { .. })
        ));
    }
}
