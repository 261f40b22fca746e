//! Controller configuration.
//!
//! Every field has a default, so an empty file (or no file at all) yields the
//! stock policy: host `10.0.0.10` is the priority host, its traffic goes to
//! queue 1 with flow priority 20, everything else gets priority 10, and
//! installed rules idle out after 30 seconds.

use std::env;
use std::fs;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::Path;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Environment variable naming the YAML configuration file.
pub const CONFIG_ENV: &str = "OFP_QOS_CONFIG";

/// Standard OpenFlow controller port.
pub const DEFAULT_LISTEN: &str = "0.0.0.0:6653";

/// Static QoS and flow-installation policy.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QosPolicy {
    /// IPv4 endpoints whose traffic is classified as priority. Empty disables the exception.
    pub priority_hosts: Vec<Ipv4Addr>,
    /// Output queue selected for priority traffic.
    pub priority_queue: u32,
    /// Flow priority of rules for normal traffic.
    pub normal_priority: u16,
    /// Flow priority of rules for priority traffic.
    pub high_priority: u16,
    /// Seconds of inactivity before the switch expires a learned rule.
    pub idle_timeout: u16,
    /// Absolute rule lifetime in seconds; 0 means no hard expiry.
    pub hard_timeout: u16,
}

impl Default for QosPolicy {
    fn default() -> Self {
        QosPolicy {
            priority_hosts: vec![Ipv4Addr::new(10, 0, 0, 10)],
            priority_queue: 1,
            normal_priority: 10,
            high_priority: 20,
            idle_timeout: 30,
            hard_timeout: 0,
        }
    }
}

/// Top-level configuration of the controller binary.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ControllerConfig {
    pub listen: SocketAddr,
    pub policy: QosPolicy,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        ControllerConfig {
            listen: SocketAddr::from(([0, 0, 0, 0], 6653)),
            policy: QosPolicy::default(),
        }
    }
}

impl ControllerConfig {
    /// Parse a YAML document.
    pub fn from_yaml(doc: &str) -> Result<Self> {
        if doc.trim().is_empty() {
            return Ok(ControllerConfig::default());
        }
        serde_yaml::from_str(doc).map_err(|e| Error::Config(e.to_string()))
    }

    /// Load a YAML configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let doc = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_yaml(&doc)
    }

    /// Load the file named by `OFP_QOS_CONFIG`, or fall back to the defaults.
    pub fn from_env() -> Result<Self> {
        match env::var_os(CONFIG_ENV) {
            Some(path) => Self::load(Path::new(&path)),
            None => Ok(ControllerConfig::default()),
        }
    }
}
