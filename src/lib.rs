//! Reactive OpenFlow 1.3 controller: an L2 learning switch that steers
//! traffic of configured priority hosts onto a dedicated egress queue.

pub mod classifier;
pub mod config;
pub mod error;
pub mod forwarding;
pub mod installer;
pub mod mac_table;
pub mod ofp_controller;
pub mod ofp_header;
pub mod ofp_message;
pub mod openflow0x04;
pub mod packet;
pub mod qos_switch;

#[cfg(test)]
mod test_support;

pub use error::{Error, Result};
