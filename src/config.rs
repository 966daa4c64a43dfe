// Copyright (c) 2026 Glacier Contributors
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! TOML-backed configuration records. Every field carries a default so a
//! config file written by an older release still loads under a newer one.

use crate::core::types::NetworkMagic;
use crate::networking::NodePeriod;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use std::time::Duration;

/// Errors loading or validating a config file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure reading the file.
    #[error("io error reading {path}: {source}")]
    Io {
        /// Path that failed to read.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// The file did not parse as valid TOML for this schema.
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    /// `max_peers_per_ip` was zero, which would make this node unreachable.
    #[error("max_peers_per_ip must be at least 1")]
    ZeroPeerCap,
}

/// Which network this node participates in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkKindConfig {
    /// Fast maintenance interval, used by local test fleets.
    Test,
    /// Public beta network.
    Beta,
    /// Production live network.
    Live,
}

impl Default for NetworkKindConfig {
    fn default() -> Self {
        NetworkKindConfig::Live
    }
}

impl NetworkKindConfig {
    /// The wire magic bytes for this network.
    pub fn magic(self) -> NetworkMagic {
        match self {
            NetworkKindConfig::Test => NetworkMagic::TEST,
            NetworkKindConfig::Beta => NetworkMagic::BETA,
            NetworkKindConfig::Live => NetworkMagic::LIVE,
        }
    }

    /// The maintenance period this network runs at.
    pub fn period(self) -> NodePeriod {
        match self {
            NetworkKindConfig::Test => NodePeriod::Test,
            NetworkKindConfig::Beta | NetworkKindConfig::Live => NodePeriod::Live,
        }
    }
}

/// Peer registry and handshake tuning.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PeerConfig {
    /// UDP port this node listens on.
    pub port: u16,
    /// Maximum concurrently tracked peers sharing one IP address.
    pub max_peers_per_ip: usize,
    /// Seconds since last contact before a peer is purged from the registry.
    pub purge_cutoff_secs: u64,
    /// Seconds before an outstanding reachout attempt may be retried.
    pub reachout_cutoff_secs: u64,
    /// Accept peers whose address is loopback or private-range.
    pub allow_local_peers: bool,
    /// Statically configured bootstrap peers, `host:port` form.
    pub bootstrap_peers: Vec<String>,
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            port: 7075,
            max_peers_per_ip: crate::networking::registry::DEFAULT_MAX_PEERS_PER_IP,
            purge_cutoff_secs: 300,
            reachout_cutoff_secs: 60,
            allow_local_peers: false,
            bootstrap_peers: Vec::new(),
        }
    }
}

impl PeerConfig {
    /// Validate field combinations that can't be expressed in the type alone.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_peers_per_ip == 0 {
            return Err(ConfigError::ZeroPeerCap);
        }
        Ok(())
    }

    /// Peer purge cutoff as a [`Duration`].
    pub fn purge_cutoff(&self) -> Duration {
        Duration::from_secs(self.purge_cutoff_secs)
    }

    /// Reachout retry cutoff as a [`Duration`].
    pub fn reachout_cutoff(&self) -> Duration {
        Duration::from_secs(self.reachout_cutoff_secs)
    }
}

/// Statistics engine tuning, mirrors [`crate::stats::StatsConfig`] in a
/// serializable form.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsConfigToml {
    /// Whether periodic sampling is enabled.
    pub sampling_enabled: bool,
    /// Sample ring capacity per entry.
    pub capacity: usize,
    /// Sample interval in seconds.
    pub interval_secs: u64,
    /// Counter log emission interval in seconds, 0 disables.
    pub log_interval_counters_secs: u64,
    /// Sample log emission interval in seconds, 0 disables.
    pub log_interval_samples_secs: u64,
    /// Number of log emissions before the sink rotates.
    pub log_rotation_count: u32,
}

impl Default for StatsConfigToml {
    fn default() -> Self {
        let d = crate::stats::StatsConfig::default();
        Self {
            sampling_enabled: d.sampling_enabled,
            capacity: d.capacity,
            interval_secs: d.interval.as_secs(),
            log_interval_counters_secs: d.log_interval_counters.as_secs(),
            log_interval_samples_secs: d.log_interval_samples.as_secs(),
            log_rotation_count: d.log_rotation_count,
        }
    }
}

impl StatsConfigToml {
    /// Build the runtime [`crate::stats::StatsConfig`] from this record.
    pub fn to_runtime(&self) -> crate::stats::StatsConfig {
        crate::stats::StatsConfig {
            sampling_enabled: self.sampling_enabled,
            capacity: self.capacity,
            interval: Duration::from_secs(self.interval_secs),
            log_interval_counters: Duration::from_secs(self.log_interval_counters_secs),
            log_interval_samples: Duration::from_secs(self.log_interval_samples_secs),
            log_rotation_count: self.log_rotation_count,
        }
    }
}

/// Top-level node configuration, loaded from `config.toml` in the data
/// directory.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Which network this node joins.
    pub network: NetworkKindConfig,
    /// Directory holding the node's key file, peer database and config.
    pub data_dir: PathBuf,
    /// Peer registry and handshake settings.
    pub peer: PeerConfig,
    /// Statistics engine settings.
    pub stats: StatsConfigToml,
    /// `tracing` log filter, e.g. `"info"` or `"glacier_core=debug"`.
    pub log_filter: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            network: NetworkKindConfig::default(),
            data_dir: PathBuf::from("./data"),
            peer: PeerConfig::default(),
            stats: StatsConfigToml::default(),
            log_filter: "info".to_string(),
        }
    }
}

impl NodeConfig {
    /// Load `config.toml` from `data_dir`, falling back to defaults if the
    /// file does not exist.
    pub fn load_or_default(data_dir: &Path) -> Result<Self, ConfigError> {
        let path = data_dir.join("config.toml");
        if !path.exists() {
            let mut cfg = Self::default();
            cfg.data_dir = data_dir.to_path_buf();
            return Ok(cfg);
        }
        let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        let mut cfg: Self = toml::from_str(&text)?;
        cfg.data_dir = data_dir.to_path_buf();
        cfg.peer.validate()?;
        Ok(cfg)
    }

    /// Parse a config record directly from a TOML string, skipping the
    /// filesystem lookup `load_or_default` does. For embedders that already
    /// have the text in hand.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let cfg: Self = toml::from_str(text)?;
        cfg.peer.validate()?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = NodeConfig::load_or_default(dir.path()).unwrap();
        assert_eq!(cfg.peer.port, 7075);
        assert_eq!(cfg.network, NetworkKindConfig::Live);
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config.toml"), "log_filter = \"debug\"\n").unwrap();
        let cfg = NodeConfig::load_or_default(dir.path()).unwrap();
        assert_eq!(cfg.log_filter, "debug");
        assert_eq!(cfg.peer.max_peers_per_ip, 4);
    }

    #[test]
    fn from_toml_str_parses_without_touching_the_filesystem() {
        let cfg = NodeConfig::from_toml_str("log_filter = \"warn\"\n").unwrap();
        assert_eq!(cfg.log_filter, "warn");
        assert_eq!(cfg.data_dir, PathBuf::from("./data"));
    }

    #[test]
    fn zero_peer_cap_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("config.toml"),
            "[peer]\nmax_peers_per_ip = 0\n",
        )
        .unwrap();
        assert!(matches!(
            NodeConfig::load_or_default(dir.path()),
            Err(ConfigError::ZeroPeerCap)
        ));
    }
}
