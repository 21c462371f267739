//! TOML-based configuration for Weft nodes.

use std::path::Path;

use serde::Deserialize;

use weft_protocol::types::RmpConfig;
use weft_protocol::ManagerConfig;

use crate::error::NodeError;

/// Top-level node configuration loaded from a TOML file.
#[derive(Debug, Default, Deserialize)]
pub struct NodeConfig {
    #[serde(default)]
    pub node: NodeSection,
    #[serde(default)]
    pub logging: LoggingSection,
    #[serde(default)]
    pub exchange: ExchangeSection,
    #[serde(default)]
    pub reliability: ReliabilitySection,
}

impl NodeConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, NodeError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| NodeError::Config(format!("failed to read config file: {e}")))?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self, NodeError> {
        toml::from_str(s).map_err(|e| NodeError::Config(format!("failed to parse config: {e}")))
    }

    /// The manager configuration this node config describes.
    #[must_use]
    pub fn manager_config(&self) -> ManagerConfig {
        ManagerConfig {
            context_capacity: self.exchange.context_capacity,
            retrans_capacity: self.exchange.retrans_capacity,
            handler_capacity: self.exchange.handler_capacity,
            binding_capacity: self.exchange.binding_capacity,
            tick_interval_ms: self.exchange.tick_interval_ms,
            rmp: RmpConfig {
                initial_retransmit_ticks: self.reliability.initial_retransmit_ticks,
                active_retransmit_ticks: self.reliability.active_retransmit_ticks,
                max_retransmissions: self.reliability.max_retransmissions,
                ack_piggyback_ticks: self.reliability.ack_piggyback_ticks,
            },
        }
    }
}

/// The `[node]` section.
#[derive(Debug, Deserialize)]
pub struct NodeSection {
    /// This node's 64-bit fabric node id.
    pub node_id: Option<u64>,
    /// UDP port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_port() -> u16 {
    weft_core::constants::DEFAULT_PORT
}

impl Default for NodeSection {
    fn default() -> Self {
        Self {
            node_id: None,
            port: default_port(),
        }
    }
}

/// The `[logging]` section.
#[derive(Debug, Deserialize)]
pub struct LoggingSection {
    /// Default log filter when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// "text" or "json".
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// The `[exchange]` section: pool capacities and tick timing.
#[derive(Debug, Deserialize)]
pub struct ExchangeSection {
    #[serde(default = "default_context_capacity")]
    pub context_capacity: usize,
    #[serde(default = "default_retrans_capacity")]
    pub retrans_capacity: usize,
    #[serde(default = "default_handler_capacity")]
    pub handler_capacity: usize,
    #[serde(default = "default_binding_capacity")]
    pub binding_capacity: usize,
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u32,
}

fn default_context_capacity() -> usize {
    16
}

fn default_retrans_capacity() -> usize {
    8
}

fn default_handler_capacity() -> usize {
    8
}

fn default_binding_capacity() -> usize {
    8
}

fn default_tick_interval_ms() -> u32 {
    weft_protocol::reliable::constants::DEFAULT_TICK_INTERVAL_MS
}

impl Default for ExchangeSection {
    fn default() -> Self {
        Self {
            context_capacity: default_context_capacity(),
            retrans_capacity: default_retrans_capacity(),
            handler_capacity: default_handler_capacity(),
            binding_capacity: default_binding_capacity(),
            tick_interval_ms: default_tick_interval_ms(),
        }
    }
}

/// The `[reliability]` section: retransmission defaults in virtual ticks.
#[derive(Debug, Deserialize)]
pub struct ReliabilitySection {
    #[serde(default = "default_initial_retransmit_ticks")]
    pub initial_retransmit_ticks: u16,
    #[serde(default = "default_active_retransmit_ticks")]
    pub active_retransmit_ticks: u16,
    #[serde(default = "default_max_retransmissions")]
    pub max_retransmissions: u8,
    #[serde(default = "default_ack_piggyback_ticks")]
    pub ack_piggyback_ticks: u16,
}

fn default_initial_retransmit_ticks() -> u16 {
    weft_protocol::reliable::constants::DEFAULT_INITIAL_RETRANSMIT_TICKS
}

fn default_active_retransmit_ticks() -> u16 {
    weft_protocol::reliable::constants::DEFAULT_ACTIVE_RETRANSMIT_TICKS
}

fn default_max_retransmissions() -> u8 {
    weft_protocol::reliable::constants::DEFAULT_MAX_RETRANSMISSIONS
}

fn default_ack_piggyback_ticks() -> u16 {
    weft_protocol::reliable::constants::DEFAULT_ACK_PIGGYBACK_TICKS
}

impl Default for ReliabilitySection {
    fn default() -> Self {
        Self {
            initial_retransmit_ticks: default_initial_retransmit_ticks(),
            active_retransmit_ticks: default_active_retransmit_ticks(),
            max_retransmissions: default_max_retransmissions(),
            ack_piggyback_ticks: default_ack_piggyback_ticks(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config = NodeConfig::parse("").unwrap();
        assert_eq!(config.node.port, weft_core::constants::DEFAULT_PORT);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, "text");

        let manager = config.manager_config();
        assert_eq!(manager, weft_protocol::ManagerConfig::default());
    }

    #[test]
    fn full_config_parses() {
        let toml = r#"
            [node]
            node_id = 0x1122334455667788
            port = 7200

            [logging]
            level = "debug"
            format = "json"

            [exchange]
            context_capacity = 4
            retrans_capacity = 2
            handler_capacity = 3
            binding_capacity = 2
            tick_interval_ms = 100

            [reliability]
            initial_retransmit_ticks = 5
            active_retransmit_ticks = 4
            max_retransmissions = 2
            ack_piggyback_ticks = 2
        "#;
        let config = NodeConfig::parse(toml).unwrap();
        assert_eq!(config.node.node_id, Some(0x1122_3344_5566_7788));
        assert_eq!(config.node.port, 7200);
        assert_eq!(config.logging.format, "json");

        let manager = config.manager_config();
        assert_eq!(manager.context_capacity, 4);
        assert_eq!(manager.retrans_capacity, 2);
        assert_eq!(manager.handler_capacity, 3);
        assert_eq!(manager.binding_capacity, 2);
        assert_eq!(manager.tick_interval_ms, 100);
        assert_eq!(manager.rmp.initial_retransmit_ticks, 5);
        assert_eq!(manager.rmp.max_retransmissions, 2);
    }

    #[test]
    fn malformed_config_is_an_error() {
        let result = NodeConfig::parse("[node\nport = {");
        assert!(matches!(result, Err(NodeError::Config(_))));
    }
}
