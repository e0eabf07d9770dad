use rekon_common::DomainName;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Enabled domains in enumeration precedence order.
    #[serde(default = "default_enabled_domains")]
    pub enabled_domains: Vec<DomainName>,
    #[serde(default)]
    pub existence_probe: ExistenceProbeConfig,
    #[serde(default)]
    pub wait: WaitConfig,
    #[serde(default)]
    pub search: SearchConfig,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            enabled_domains: default_enabled_domains(),
            existence_probe: ExistenceProbeConfig::default(),
            wait: WaitConfig::default(),
            search: SearchConfig::default(),
        }
    }
}

fn default_enabled_domains() -> Vec<DomainName> {
    vec![
        DomainName::Java,
        DomainName::Html,
        DomainName::Net,
        DomainName::Wpf,
        DomainName::Win,
        DomainName::Swt,
        DomainName::Flex,
    ]
}

/// Bounded probe run on cached and table-resolved handles before reuse.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExistenceProbeConfig {
    #[serde(default = "default_probe_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_probe_interval_ms")]
    pub interval_ms: u64,
}

impl Default for ExistenceProbeConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_probe_timeout_ms(),
            interval_ms: default_probe_interval_ms(),
        }
    }
}

impl ExistenceProbeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

fn default_probe_timeout_ms() -> u64 {
    2000
}

fn default_probe_interval_ms() -> u64 {
    1000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaitConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Every n-th failed attempt purges the map cache and re-searches
    /// with the cache ignored.
    #[serde(default = "default_ignore_cache_every")]
    pub ignore_cache_every: u32,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            ignore_cache_every: default_ignore_cache_every(),
        }
    }
}

impl WaitConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_ignore_cache_every() -> u32 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    #[serde(default = "default_activate_surfaces")]
    pub activate_surfaces: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            activate_surfaces: default_activate_surfaces(),
        }
    }
}

fn default_max_depth() -> usize {
    64
}

fn default_activate_surfaces() -> bool {
    true
}
