//! Node configuration
//!
//! The runtime part of a node's configuration. Array size and packet size
//! are compile-time parameters of [`crate::Node`]; what remains is stored in
//! flash (or anywhere else) as postcard-serialized binary data.

use serde::{Deserialize, Serialize};

/// Current configuration layout version
pub const CONFIG_VERSION: u8 = 1;

/// Upper bound on the serialized size of [`NodeConfig`]
pub const MAX_CONFIG_SIZE: usize = 8;

/// Configuration errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Output buffer too small or serialization failed
    Serialize,
    /// Stored bytes are not a valid configuration
    Deserialize,
    /// Stored configuration was written by an incompatible version
    VersionMismatch { found: u8 },
}

/// Runtime node configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NodeConfig {
    /// Layout version, checked on load
    pub version: u8,
    /// This node's address on the link
    pub address: u8,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self::new(0)
    }
}

impl NodeConfig {
    pub const fn new(address: u8) -> Self {
        Self {
            version: CONFIG_VERSION,
            address,
        }
    }

    /// Serialize into `buf`, returning the used prefix
    pub fn to_bytes<'a>(&self, buf: &'a mut [u8]) -> Result<&'a mut [u8], ConfigError> {
        postcard::to_slice(self, buf).map_err(|_| ConfigError::Serialize)
    }

    /// Deserialize and check the layout version
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ConfigError> {
        let config: NodeConfig =
            postcard::from_bytes(bytes).map_err(|_| ConfigError::Deserialize)?;

        if config.version != CONFIG_VERSION {
            return Err(ConfigError::VersionMismatch {
                found: config.version,
            });
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_and_load() {
        let config = NodeConfig::new(0x42);
        let mut buf = [0u8; MAX_CONFIG_SIZE];
        let used = config.to_bytes(&mut buf).unwrap().len();

        assert_eq!(NodeConfig::from_bytes(&buf[..used]), Ok(config));
    }

    #[test]
    fn test_version_mismatch() {
        let mut config = NodeConfig::new(3);
        config.version = CONFIG_VERSION + 1;
        let mut buf = [0u8; MAX_CONFIG_SIZE];
        let used = config.to_bytes(&mut buf).unwrap().len();

        assert_eq!(
            NodeConfig::from_bytes(&buf[..used]),
            Err(ConfigError::VersionMismatch {
                found: CONFIG_VERSION + 1
            })
        );
    }

    #[test]
    fn test_truncated_bytes() {
        assert_eq!(NodeConfig::from_bytes(&[]), Err(ConfigError::Deserialize));
        assert_eq!(
            NodeConfig::from_bytes(&[CONFIG_VERSION]),
            Err(ConfigError::Deserialize)
        );
    }

    #[test]
    fn test_buffer_too_small() {
        let config = NodeConfig::new(1);
        let mut buf = [0u8; 1];
        assert_eq!(config.to_bytes(&mut buf), Err(ConfigError::Serialize));
    }
}
