// src/config.rs

//! Loads and validates the host's TOML configuration. Follows the same two-stage
//! `RawConfig` -> `Config` pattern the rest of this codebase's configuration
//! uses: deserialize permissively with per-field defaults, then validate once at
//! load time and reject impossible combinations before anything is spawned.

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default)]
    pub ffc: FfcSection,
    #[serde(default)]
    pub mpfc: MpfcSection,
    #[serde(default)]
    pub metrics: MetricsSection,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FfcSection {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_enabled_flags_path")]
    pub enabled_flags_path: String,
    /// Address this node's peer-RPC listener binds to.
    #[serde(default = "default_rpc_bind")]
    pub rpc_bind: String,
    /// `(node id, peer-rpc address)` pairs for every other cluster member.
    #[serde(default)]
    pub peers: Vec<PeerEntry>,
    #[serde(with = "humantime_serde", default = "default_peer_timeout")]
    pub peer_timeout: Duration,
    #[serde(with = "humantime_serde", default = "default_node_timeout")]
    pub node_timeout: Duration,
    /// Whether to run the UDP heartbeat liveness oracle, or treat every
    /// configured peer as always running (useful for tests and single-process
    /// demos).
    #[serde(default)]
    pub use_heartbeat_liveness: bool,
    /// Address this node's heartbeat socket binds to, when
    /// `use_heartbeat_liveness` is set.
    #[serde(default = "default_heartbeat_bind")]
    pub heartbeat_bind: String,
    /// Statically declared flags for this node, as a single "host" application
    /// would declare them. Real embedders register their own `AppCatalog`
    /// instead; this lets the standalone binary run with a meaningful flag set
    /// out of the box.
    #[serde(default)]
    pub flags: Vec<FlagDecl>,
}

impl Default for FfcSection {
    fn default() -> Self {
        Self {
            enabled: false,
            enabled_flags_path: default_enabled_flags_path(),
            rpc_bind: default_rpc_bind(),
            peers: Vec::new(),
            peer_timeout: default_peer_timeout(),
            node_timeout: default_node_timeout(),
            use_heartbeat_liveness: false,
            heartbeat_bind: default_heartbeat_bind(),
            flags: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PeerEntry {
    pub id: String,
    pub addr: String,
}

/// A single statically declared feature flag, as read from `[[ffc.flags]]`.
/// Carries no migration reference: migrations are code, not configuration, so
/// flags declared this way always enable with a no-op migration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FlagDecl {
    pub name: String,
    #[serde(default)]
    pub desc: String,
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default = "default_stability")]
    pub stability: String,
}

fn default_stability() -> String {
    "stable".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MpfcSection {
    #[serde(default)]
    pub enabled: bool,
    #[serde(with = "humantime_serde", default = "default_tick")]
    pub tick: Duration,
    #[serde(default = "default_mem_scale")]
    pub mem_scale: f64,
    #[serde(default = "default_limit_threshold")]
    pub limit_threshold: f64,
    #[serde(default = "default_sum_inc_threshold")]
    pub sum_inc_threshold: f64,
    #[serde(default = "default_sum_inc_amount")]
    pub sum_inc_amount: f64,
    #[serde(default = "default_osc_guard")]
    pub osc_guard: f64,
    #[serde(default = "default_epsilon")]
    pub epsilon: f64,
    #[serde(default = "default_vmm_default_bytes")]
    pub vmm_default_bytes: u64,
}

impl Default for MpfcSection {
    fn default() -> Self {
        Self {
            enabled: false,
            tick: default_tick(),
            mem_scale: default_mem_scale(),
            limit_threshold: default_limit_threshold(),
            sum_inc_threshold: default_sum_inc_threshold(),
            sum_inc_amount: default_sum_inc_amount(),
            osc_guard: default_osc_guard(),
            epsilon: default_epsilon(),
            vmm_default_bytes: default_vmm_default_bytes(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MetricsSection {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

impl Default for MetricsSection {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_metrics_port(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_data_dir() -> String {
    "./data".to_string()
}
fn default_enabled_flags_path() -> String {
    "./data/enabled_flags.json".to_string()
}
fn default_rpc_bind() -> String {
    "127.0.0.1:7420".to_string()
}
fn default_heartbeat_bind() -> String {
    "127.0.0.1:7421".to_string()
}
fn default_peer_timeout() -> Duration {
    Duration::from_secs(5)
}
fn default_node_timeout() -> Duration {
    Duration::from_secs(15)
}
fn default_tick() -> Duration {
    Duration::from_millis(2_500)
}
fn default_mem_scale() -> f64 {
    0.6
}
fn default_limit_threshold() -> f64 {
    0.5
}
fn default_sum_inc_threshold() -> f64 {
    0.95
}
fn default_sum_inc_amount() -> f64 {
    1.0
}
fn default_osc_guard() -> f64 {
    1.0
}
fn default_epsilon() -> f64 {
    1e-6
}
fn default_vmm_default_bytes() -> u64 {
    1 << 30
}
fn default_metrics_port() -> u16 {
    9420
}

/// The validated configuration a host is built from.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub log_level: String,
    pub data_dir: PathBuf,
    pub ffc: FfcSection,
    pub mpfc: MpfcSection,
    pub metrics: MetricsSection,
}

impl Config {
    pub fn from_file(path: &str) -> Result<Self> {
        let raw_str = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file '{path}'"))?;
        let raw: RawConfig =
            toml::from_str(&raw_str).with_context(|| format!("failed to parse config file '{path}'"))?;
        Self::from_raw(raw)
    }

    pub fn from_raw(raw: RawConfig) -> Result<Self> {
        let config = Self {
            host: raw.host,
            log_level: raw.log_level,
            data_dir: PathBuf::from(raw.data_dir),
            ffc: raw.ffc,
            mpfc: raw.mpfc,
            metrics: raw.metrics,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.ffc.enabled {
            self.ffc
                .rpc_bind
                .parse::<SocketAddr>()
                .with_context(|| format!("invalid ffc.rpc_bind address '{}'", self.ffc.rpc_bind))?;
            for peer in &self.ffc.peers {
                peer.addr.parse::<SocketAddr>().with_context(|| {
                    format!("invalid peer address '{}' for node '{}'", peer.addr, peer.id)
                })?;
            }
            if self.ffc.node_timeout.is_zero() {
                return Err(anyhow!("ffc.node_timeout must be greater than zero"));
            }
            let mut seen = std::collections::HashSet::new();
            for flag in &self.ffc.flags {
                if !seen.insert(flag.name.clone()) {
                    warn!(
                        "duplicate flag '{}' declared in ffc.flags; last declaration wins",
                        flag.name
                    );
                }
            }
        }

        if self.mpfc.enabled {
            if self.mpfc.tick.is_zero() {
                return Err(anyhow!("mpfc.tick must be greater than zero"));
            }
            if !(0.0..=1.0).contains(&self.mpfc.mem_scale) {
                return Err(anyhow!("mpfc.mem_scale must be within [0, 1]"));
            }
            if self.mpfc.limit_threshold >= self.mpfc.sum_inc_threshold {
                warn!(
                    "mpfc.limit_threshold ({}) >= mpfc.sum_inc_threshold ({}); the sum-inflation \
                     band will never be reached",
                    self.mpfc.limit_threshold, self.mpfc.sum_inc_threshold
                );
            }
        }

        if self.metrics.enabled
            && self.ffc.enabled
            && self.metrics.port == self.ffc.rpc_bind.rsplit(':').next().and_then(|p| p.parse().ok()).unwrap_or(0)
        {
            return Err(anyhow!(
                "metrics.port collides with ffc.rpc_bind's port"
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate_cleanly() {
        let raw = RawConfig {
            host: default_host(),
            log_level: default_log_level(),
            data_dir: default_data_dir(),
            ffc: FfcSection::default(),
            mpfc: MpfcSection::default(),
            metrics: MetricsSection::default(),
        };
        assert!(Config::from_raw(raw).is_ok());
    }

    #[test]
    fn rejects_unparseable_peer_address() {
        let mut ffc = FfcSection {
            enabled: true,
            ..FfcSection::default()
        };
        ffc.peers.push(PeerEntry {
            id: "node-b".to_string(),
            addr: "not-an-address".to_string(),
        });
        let raw = RawConfig {
            host: default_host(),
            log_level: default_log_level(),
            data_dir: default_data_dir(),
            ffc,
            mpfc: MpfcSection::default(),
            metrics: MetricsSection::default(),
        };
        assert!(Config::from_raw(raw).is_err());
    }

    #[test]
    fn rejects_zero_tick_when_mpfc_enabled() {
        let raw = RawConfig {
            host: default_host(),
            log_level: default_log_level(),
            data_dir: default_data_dir(),
            ffc: FfcSection::default(),
            mpfc: MpfcSection {
                enabled: true,
                tick: Duration::ZERO,
                ..MpfcSection::default()
            },
            metrics: MetricsSection::default(),
        };
        assert!(Config::from_raw(raw).is_err());
    }
}
