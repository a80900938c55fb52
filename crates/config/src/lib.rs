//! On-disk configuration for a coordinator instance.
//!
//! A coordinator is fully owned by whoever constructs it, with no
//! process-wide singletons, so the config file is nothing more than the
//! constructor arguments an operator wants to pin: the peer identity, the
//! data directory for snapshots, and the snapshot save budget.

use core::time::Duration;
use std::fs::{read_to_string, write};

use camino::{Utf8Path, Utf8PathBuf};
use eyre::{Result as EyreResult, WrapErr};
use serde::{Deserialize, Serialize};

pub const CONFIG_FILE: &str = "coordinator.toml";

/// Default wall-clock budget for one snapshot save.
pub const DEFAULT_SAVE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone, Debug, Deserialize, Serialize)]
#[non_exhaustive]
pub struct ConfigFile {
    /// This coordinator's peer identity.
    pub peer_id: String,

    /// Directory the snapshot store writes into.
    pub data_dir: Utf8PathBuf,

    /// Snapshot save budget; a save that exceeds it fails the handler.
    #[serde(
        rename = "save_timeout_ms",
        with = "serde_duration",
        default = "default_save_timeout"
    )]
    pub save_timeout: Duration,
}

const fn default_save_timeout() -> Duration {
    DEFAULT_SAVE_TIMEOUT
}

impl ConfigFile {
    #[must_use]
    pub fn new(peer_id: String, data_dir: Utf8PathBuf) -> Self {
        Self {
            peer_id,
            data_dir,
            save_timeout: DEFAULT_SAVE_TIMEOUT,
        }
    }

    #[must_use]
    pub fn exists(dir: &Utf8Path) -> bool {
        dir.join(CONFIG_FILE).is_file()
    }

    pub fn load(dir: &Utf8Path) -> EyreResult<Self> {
        let path = dir.join(CONFIG_FILE);
        let content = read_to_string(&path)
            .wrap_err_with(|| format!("failed to read configuration from {path:?}"))?;

        toml::from_str(&content).map_err(Into::into)
    }

    pub fn save(&self, dir: &Utf8Path) -> EyreResult<()> {
        let path = dir.join(CONFIG_FILE);
        let content = toml::to_string_pretty(self)?;

        write(&path, content)
            .wrap_err_with(|| format!("failed to write configuration to {path:?}"))?;

        Ok(())
    }
}

mod serde_duration {
    use core::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dir(tmp: &tempfile::TempDir) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(tmp.path().to_owned()).expect("tempdir paths are UTF-8")
    }

    #[test]
    fn round_trips_through_toml() -> EyreResult<()> {
        let tmp = tempfile::TempDir::new()?;
        let dir = dir(&tmp);

        let mut config = ConfigFile::new("peer-alpha".to_owned(), dir.join("data"));
        config.save_timeout = Duration::from_millis(1500);

        assert!(!ConfigFile::exists(&dir));
        config.save(&dir)?;
        assert!(ConfigFile::exists(&dir));

        let loaded = ConfigFile::load(&dir)?;
        assert_eq!(loaded.peer_id, "peer-alpha");
        assert_eq!(loaded.data_dir, dir.join("data"));
        assert_eq!(loaded.save_timeout, Duration::from_millis(1500));

        Ok(())
    }

    #[test]
    fn save_timeout_defaults_when_absent() -> EyreResult<()> {
        let tmp = tempfile::TempDir::new()?;
        let dir = dir(&tmp);

        std::fs::write(
            dir.join(CONFIG_FILE),
            "peer_id = \"peer-alpha\"\ndata_dir = \"/tmp/meshkit\"\n",
        )?;

        let loaded = ConfigFile::load(&dir)?;
        assert_eq!(loaded.save_timeout, DEFAULT_SAVE_TIMEOUT);

        Ok(())
    }
}
