//! Configuration types for the neighbor cache
//!
//! This module defines all configuration structures used throughout the crate.
//! Timer values are in seconds, matching the 1 Hz retry engine.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main NDP configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NdpConfig {
    /// Number of interfaces (one neighbor table each)
    #[serde(default = "default_interfaces")]
    pub interfaces: usize,

    /// Neighbor table settings
    #[serde(default)]
    pub cache: CacheConfig,

    /// Neighbor Unreachability Detection timers
    #[serde(default)]
    pub nud: NudConfig,

    /// Retry engine settings
    #[serde(default)]
    pub engine: EngineConfig,
}

impl NdpConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self {
            interfaces: default_interfaces(),
            cache: CacheConfig::default(),
            nud: NudConfig::default(),
            engine: EngineConfig::default(),
        }
    }

    /// Set the number of interfaces
    pub fn with_interfaces(mut self, interfaces: usize) -> Self {
        self.interfaces = interfaces;
        self
    }

    /// Set the per-interface table capacity
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.cache.capacity = capacity;
        self
    }

    /// Enable or disable defensive processing of unsolicited messages
    pub fn with_defensive_processing(mut self, enabled: bool) -> Self {
        self.cache.defensive_processing = enabled;
        self
    }

    /// Load and validate a JSON configuration file
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, crate::Error> {
        let raw = tokio::fs::read_to_string(path.as_ref()).await?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.interfaces == 0 {
            return Err(crate::Error::config("At least one interface is required"));
        }

        self.cache.validate()?;
        self.nud.validate()?;
        self.engine.validate()?;

        Ok(())
    }
}

impl Default for NdpConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Neighbor table configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Entries per interface table
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    /// Refuse to let unsolicited advertisements create or override mappings
    ///
    /// When enabled, an advertisement without the S flag never moves an
    /// Incomplete entry to Stale and never overrides a cached address, and
    /// solicitations for local addresses do not update the cache.
    #[serde(default)]
    pub defensive_processing: bool,
}

impl CacheConfig {
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.capacity == 0 {
            return Err(crate::Error::config("Neighbor cache capacity must be > 0"));
        }
        Ok(())
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            defensive_processing: false,
        }
    }
}

/// NUD timer configuration (RFC 4861 section 10 constants)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NudConfig {
    /// Interval between retransmitted solicitations
    #[serde(default = "default_retrans_timer_secs")]
    pub retrans_timer_secs: u16,

    /// Time spent in Delay before the first unicast probe
    #[serde(default = "default_delay_first_probe_secs")]
    pub delay_first_probe_secs: u16,

    /// Time a confirmed neighbor stays Reachable
    #[serde(default = "default_reachable_time_secs")]
    pub reachable_time_secs: u16,

    /// Multicast solicitations sent before resolution fails
    #[serde(default = "default_max_solicit")]
    pub max_multicast_solicit: u8,

    /// Unicast probes sent before a neighbor is declared unreachable
    #[serde(default = "default_max_solicit")]
    pub max_unicast_solicit: u8,
}

impl NudConfig {
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.retrans_timer_secs == 0
            || self.delay_first_probe_secs == 0
            || self.reachable_time_secs == 0
        {
            return Err(crate::Error::config("NUD timers must be > 0"));
        }
        if self.max_multicast_solicit == 0 || self.max_unicast_solicit == 0 {
            return Err(crate::Error::config("Solicitation maxima must be > 0"));
        }
        Ok(())
    }
}

impl Default for NudConfig {
    fn default() -> Self {
        Self {
            retrans_timer_secs: default_retrans_timer_secs(),
            delay_first_probe_secs: default_delay_first_probe_secs(),
            reachable_time_secs: default_reachable_time_secs(),
            max_multicast_solicit: default_max_solicit(),
            max_unicast_solicit: default_max_solicit(),
        }
    }
}

/// Retry engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Period of the aging tick in milliseconds
    ///
    /// NUD timers count ticks, so anything but 1000 scales every timer.
    /// Tests use shorter periods.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.tick_interval_ms == 0 {
            return Err(crate::Error::config("Tick interval must be > 0"));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
        }
    }
}

fn default_interfaces() -> usize {
    1
}

fn default_capacity() -> usize {
    16
}

fn default_retrans_timer_secs() -> u16 {
    1
}

fn default_delay_first_probe_secs() -> u16 {
    5
}

fn default_reachable_time_secs() -> u16 {
    30
}

fn default_max_solicit() -> u8 {
    3
}

fn default_tick_interval_ms() -> u64 {
    1000
}
