use std::path::Path;

use portal_aggregate::AggregateConfig;
use portal_sync::SyncConfig;
use serde::{Deserialize, Serialize};

use crate::error::{SdkError, SdkResult};

/// Portal configuration, loaded from TOML.
///
/// ```toml
/// [sync]
/// read_timeout_ms = 5000
/// write_timeout_ms = 10000
/// reject_concurrent = true
///
/// [aggregate]
/// all_or_nothing = false
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
    pub sync: SyncConfig,
    pub aggregate: AggregateConfig,
}

impl PortalConfig {
    pub fn from_toml_str(s: &str) -> SdkResult<Self> {
        toml::from_str(s).map_err(|e| SdkError::Config(e.to_string()))
    }

    pub fn load(path: impl AsRef<Path>) -> SdkResult<Self> {
        Self::from_toml_str(&std::fs::read_to_string(path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_sections_use_defaults() {
        let config = PortalConfig::from_toml_str("[aggregate]\nall_or_nothing = true\n").unwrap();
        assert!(config.aggregate.all_or_nothing);
        assert_eq!(config.sync, SyncConfig::default());
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[sync]\nwrite_timeout_ms = 250\nreject_concurrent = false").unwrap();
        let config = PortalConfig::load(file.path()).unwrap();
        assert_eq!(config.sync.write_timeout_ms, 250);
        assert!(!config.sync.reject_concurrent);
        assert_eq!(config.sync.read_timeout_ms, SyncConfig::default().read_timeout_ms);
    }

    #[test]
    fn malformed_toml_is_config_error() {
        let err = PortalConfig::from_toml_str("[sync\n").unwrap_err();
        assert!(matches!(err, SdkError::Config(_)));
    }
}
