// crates/honeygrid-config/src/config.rs
// ============================================================================
// Module: Honeygrid Configuration
// Description: TOML configuration model, strict validation, layout derivation.
// Purpose: Turn one declarative file into a validated pool layout.
// Dependencies: honeygrid_core, serde, thiserror, toml
// ============================================================================

//! ## Overview
//! Configuration loading is strict and fail-closed. The file is bounded in
//! size, must be UTF-8 TOML with no unknown keys, and every numeric field
//! is range-checked before the control plane starts. The pool layout is
//! derived deterministically: container ids are `{prefix}-{n}` (1-based),
//! IP addresses are handed out sequentially across tiers in ascending
//! order starting one past the gateway octet, and ports count up from each
//! tier's base port. The same file therefore always produces the same
//! layout, which is what makes pool initialization idempotent.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use honeygrid_core::ContainerId;
use honeygrid_core::ContainerSpec;
use honeygrid_core::EngineConfig;
use honeygrid_core::Tier;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Maximum accepted config file size in bytes.
const MAX_CONFIG_BYTES: usize = 1_048_576;

/// Maximum accepted config path length in bytes.
const MAX_PATH_LEN: usize = 4_096;

/// Maximum accepted config path component length in bytes.
const MAX_PATH_COMPONENT_LEN: usize = 255;

/// Maximum containers per tier.
const MAX_TIER_COUNT: u32 = 64;

/// Highest host octet usable in a /24 (`.255` is the broadcast address).
const MAX_HOST_OCTET: u32 = 254;

/// Lowest port a container may listen on.
const MIN_BASE_PORT: u16 = 1_024;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading and validation errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Config file could not be read.
    #[error("config io error: {0}")]
    Io(String),
    /// Config file was not valid TOML for this schema.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Config content failed a validation rule.
    #[error("config invalid: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Sections
// ============================================================================

/// One tier's pool settings.
///
/// # Invariants
/// - `count` may be zero; a tier with no pool simply never satisfies
///   assignment at that tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PoolTierConfig {
    /// Number of containers to provision.
    pub count: u32,
    /// First port; container `n` listens on `base_port + n - 1`.
    pub base_port: u16,
    /// Container id prefix; ids are `{prefix}-{n}` with `n` starting at 1.
    pub container_prefix: String,
}

/// Pool settings for all three tiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PoolsConfig {
    /// Tier-1 (low interaction) pool.
    pub tier1: PoolTierConfig,
    /// Tier-2 (medium interaction) pool.
    pub tier2: PoolTierConfig,
    /// Tier-3 (high interaction) pool.
    pub tier3: PoolTierConfig,
}

impl PoolsConfig {
    /// Returns the tier sections in ascending tier order.
    fn tiers(&self) -> [(Tier, &PoolTierConfig); 3] {
        [
            (Tier::Low, &self.tier1),
            (Tier::Medium, &self.tier2),
            (Tier::High, &self.tier3),
        ]
    }
}

/// Honeypot network settings; a /24 subnet is assumed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NetworkConfig {
    /// First three dotted octets of the subnet (for example `10.0.2`).
    pub subnet_prefix: String,
    /// Final octet held by the gateway.
    pub gateway_octet: u8,
}

/// Session lifetime settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    /// Idle lifetime granted on every successful assignment, in seconds.
    pub ttl_secs: u64,
    /// Expiry sweep interval, in seconds.
    pub sweep_interval_secs: u64,
}

/// Proxy synchronization settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProxyConfig {
    /// Final installed path of the routing map file.
    pub map_path: String,
    /// Upstream named in the map's default row.
    pub default_upstream: String,
    /// Proxy liveness URL probed before any reload.
    pub probe_url: String,
    /// Command run to self-test the proxy configuration.
    pub config_test_command: String,
    /// Command run to reload the proxy.
    pub reload_command: String,
    /// Timeout applied to the probe and each command, in seconds.
    pub command_timeout_secs: u64,
}

// ============================================================================
// SECTION: Root Configuration
// ============================================================================

/// Root Honeygrid configuration.
///
/// # Invariants
/// - A value of this type has passed [`HoneygridConfig::validate`]; builders
///   that bypass `load` must call it themselves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HoneygridConfig {
    /// Per-tier pool settings.
    pub pools: PoolsConfig,
    /// Honeypot network settings.
    pub network: NetworkConfig,
    /// Session lifetime settings.
    pub session: SessionConfig,
    /// Proxy synchronization settings.
    pub proxy: ProxyConfig,
}

impl Default for HoneygridConfig {
    fn default() -> Self {
        Self {
            pools: PoolsConfig {
                tier1: PoolTierConfig {
                    count: 5,
                    base_port: 8_081,
                    container_prefix: "trap-tier1".to_owned(),
                },
                tier2: PoolTierConfig {
                    count: 3,
                    base_port: 8_091,
                    container_prefix: "trap-tier2".to_owned(),
                },
                tier3: PoolTierConfig {
                    count: 1,
                    base_port: 8_101,
                    container_prefix: "trap-tier3".to_owned(),
                },
            },
            network: NetworkConfig {
                subnet_prefix: "10.0.2".to_owned(),
                gateway_octet: 1,
            },
            session: SessionConfig {
                ttl_secs: 3_600,
                sweep_interval_secs: 300,
            },
            proxy: ProxyConfig {
                map_path: "/etc/nginx/maps/honeygrid_upstream.map".to_owned(),
                default_upstream: "tier1_pool".to_owned(),
                probe_url: "http://127.0.0.1/health".to_owned(),
                config_test_command: "nginx -t".to_owned(),
                reload_command: "nginx -s reload".to_owned(),
                command_timeout_secs: 5,
            },
        }
    }
}

impl HoneygridConfig {
    /// Loads configuration from the given path, or defaults when `None`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the path is unusable, the file exceeds
    /// the size limit, is not UTF-8 TOML for this schema, or fails
    /// validation.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            let config = Self::default();
            config.validate()?;
            return Ok(config);
        };
        validate_config_path(path)?;
        let bytes = std::fs::read(path).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_BYTES {
            return Err(ConfigError::Invalid(format!(
                "config file exceeds size limit: {} bytes (max {MAX_CONFIG_BYTES})",
                bytes.len()
            )));
        }
        let text = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        Self::from_toml_str(text)
    }

    /// Parses and validates configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] on parse or validation failure.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(text).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates every field range and the derived layout's feasibility.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first violated rule.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut total: u32 = 0;
        for (tier, pool) in self.pools.tiers() {
            if pool.count > MAX_TIER_COUNT {
                return Err(ConfigError::Invalid(format!(
                    "{tier} count out of range: {} (max {MAX_TIER_COUNT})",
                    pool.count
                )));
            }
            if pool.base_port < MIN_BASE_PORT {
                return Err(ConfigError::Invalid(format!(
                    "{tier} base_port below {MIN_BASE_PORT}: {}",
                    pool.base_port
                )));
            }
            if pool.count > 0
                && u32::from(pool.base_port) + pool.count - 1 > u32::from(u16::MAX)
            {
                return Err(ConfigError::Invalid(format!(
                    "{tier} port range overflows: base {} count {}",
                    pool.base_port, pool.count
                )));
            }
            if pool.container_prefix.is_empty() {
                return Err(ConfigError::Invalid(format!("{tier} container_prefix is empty")));
            }
            if !pool
                .container_prefix
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_')
            {
                return Err(ConfigError::Invalid(format!(
                    "{tier} container_prefix contains non-token characters"
                )));
            }
            total = total.saturating_add(pool.count);
        }
        if total == 0 {
            return Err(ConfigError::Invalid("no containers configured in any tier".to_string()));
        }
        validate_subnet_prefix(&self.network.subnet_prefix)?;
        if self.network.gateway_octet == 0 || self.network.gateway_octet == 255 {
            return Err(ConfigError::Invalid(format!(
                "gateway_octet out of range: {}",
                self.network.gateway_octet
            )));
        }
        // Containers occupy the octets after the gateway; the last one must
        // still fit below the broadcast address.
        let available = MAX_HOST_OCTET - u32::from(self.network.gateway_octet);
        if total > available {
            return Err(ConfigError::Invalid(format!(
                "total container count exceeds /24 capacity after gateway octet {}: {total} (max {available})",
                self.network.gateway_octet
            )));
        }

        if self.session.ttl_secs == 0 {
            return Err(ConfigError::Invalid("session ttl_secs must be greater than zero".to_string()));
        }
        if self.session.sweep_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "session sweep_interval_secs must be greater than zero".to_string(),
            ));
        }

        if self.proxy.map_path.is_empty() {
            return Err(ConfigError::Invalid("proxy map_path is empty".to_string()));
        }
        if self.proxy.default_upstream.is_empty() {
            return Err(ConfigError::Invalid("proxy default_upstream is empty".to_string()));
        }
        if self.proxy.probe_url.is_empty() {
            return Err(ConfigError::Invalid("proxy probe_url is empty".to_string()));
        }
        if self.proxy.config_test_command.is_empty() {
            return Err(ConfigError::Invalid("proxy config_test_command is empty".to_string()));
        }
        if self.proxy.reload_command.is_empty() {
            return Err(ConfigError::Invalid("proxy reload_command is empty".to_string()));
        }
        if self.proxy.command_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "proxy command_timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Derives the deterministic container layout.
    ///
    /// IP addresses are assigned sequentially across all tiers in ascending
    /// order, starting one past the gateway octet. Container `n` of a tier
    /// listens on `base_port + n - 1`.
    #[must_use]
    pub fn container_layout(&self) -> Vec<ContainerSpec> {
        let mut specs = Vec::new();
        let mut host_octet: u32 = u32::from(self.network.gateway_octet) + 1;
        for (tier, pool) in self.pools.tiers() {
            for index in 0..pool.count {
                specs.push(ContainerSpec {
                    id: ContainerId::new(format!("{}-{}", pool.container_prefix, index + 1)),
                    tier,
                    host: format!("{}.{host_octet}", self.network.subnet_prefix),
                    port: pool.base_port.saturating_add(
                        u16::try_from(index).unwrap_or(u16::MAX),
                    ),
                });
                host_octet += 1;
            }
        }
        specs
    }

    /// Returns the engine configuration derived from the session section.
    #[must_use]
    pub const fn engine_config(&self) -> EngineConfig {
        EngineConfig::new(self.session.ttl_secs)
    }
}

// ============================================================================
// SECTION: Path and Format Guards
// ============================================================================

/// Rejects config paths that exceed the accepted length limits.
fn validate_config_path(path: &Path) -> Result<(), ConfigError> {
    let raw = path.as_os_str();
    if raw.len() > MAX_PATH_LEN {
        return Err(ConfigError::Invalid(format!(
            "config path exceeds max length: {} bytes (max {MAX_PATH_LEN})",
            raw.len()
        )));
    }
    for component in path.components() {
        if component.as_os_str().len() > MAX_PATH_COMPONENT_LEN {
            return Err(ConfigError::Invalid(
                "config path component too long".to_string(),
            ));
        }
    }
    Ok(())
}

/// Validates the dotted three-octet subnet prefix.
fn validate_subnet_prefix(prefix: &str) -> Result<(), ConfigError> {
    let octets: Vec<&str> = prefix.split('.').collect();
    if octets.len() != 3 {
        return Err(ConfigError::Invalid(format!(
            "subnet_prefix must be three dotted octets: {prefix}"
        )));
    }
    for octet in octets {
        if octet.parse::<u8>().is_err() {
            return Err(ConfigError::Invalid(format!(
                "subnet_prefix octet out of range: {prefix}"
            )));
        }
    }
    Ok(())
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        reason = "Test-only panic-based assertions are permitted."
    )]

    use super::*;

    #[test]
    fn defaults_validate_and_derive_nine_containers() {
        let config = HoneygridConfig::load(None).unwrap();
        let layout = config.container_layout();
        assert_eq!(layout.len(), 9);
        assert_eq!(layout[0].id.as_str(), "trap-tier1-1");
        assert_eq!(layout[0].host, "10.0.2.2");
        assert_eq!(layout[0].port, 8_081);
        // IPs continue sequentially across the tier boundary.
        assert_eq!(layout[5].id.as_str(), "trap-tier2-1");
        assert_eq!(layout[5].host, "10.0.2.7");
        assert_eq!(layout[5].port, 8_091);
        assert_eq!(layout[8].id.as_str(), "trap-tier3-1");
        assert_eq!(layout[8].host, "10.0.2.10");
        assert_eq!(layout[8].port, 8_101);
    }

    #[test]
    fn layout_starts_one_past_the_gateway_octet() {
        let mut config = HoneygridConfig::default();
        config.network.gateway_octet = 10;
        config.validate().unwrap();
        let layout = config.container_layout();
        assert_eq!(layout[0].host, "10.0.2.11");
        assert_eq!(layout[8].host, "10.0.2.19");
        // No container ever lands on the gateway address.
        assert!(layout.iter().all(|spec| spec.host != "10.0.2.10"));
    }

    #[test]
    fn layout_overflowing_the_subnet_is_rejected() {
        let mut config = HoneygridConfig::default();
        // Nine containers after octet 250 would run past .254.
        config.network.gateway_octet = 250;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn layout_is_deterministic() {
        let config = HoneygridConfig::default();
        assert_eq!(config.container_layout(), config.container_layout());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let text = r#"
            [pools.tier1]
            count = 1
            base_port = 8081
            container_prefix = "trap-tier1"
            surprise = true

            [pools.tier2]
            count = 1
            base_port = 8091
            container_prefix = "trap-tier2"

            [pools.tier3]
            count = 1
            base_port = 8101
            container_prefix = "trap-tier3"

            [network]
            subnet_prefix = "10.0.2"
            gateway_octet = 1

            [session]
            ttl_secs = 3600
            sweep_interval_secs = 300

            [proxy]
            map_path = "/etc/nginx/maps/honeygrid_upstream.map"
            default_upstream = "tier1_pool"
            probe_url = "http://127.0.0.1/health"
            config_test_command = "nginx -t"
            reload_command = "nginx -s reload"
            command_timeout_secs = 5
        "#;
        assert!(matches!(
            HoneygridConfig::from_toml_str(text),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn validation_rejects_out_of_range_values() {
        let mut config = HoneygridConfig::default();
        config.pools.tier1.count = MAX_TIER_COUNT + 1;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = HoneygridConfig::default();
        config.session.ttl_secs = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = HoneygridConfig::default();
        config.network.subnet_prefix = "10.0.2.0".to_owned();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = HoneygridConfig::default();
        config.pools.tier1.container_prefix = "trap tier1".to_owned();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = HoneygridConfig::default();
        config.pools.tier1.count = 0;
        config.pools.tier2.count = 0;
        config.pools.tier3.count = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn port_range_overflow_is_rejected() {
        let mut config = HoneygridConfig::default();
        config.pools.tier3.base_port = u16::MAX;
        config.pools.tier3.count = 2;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }
}
