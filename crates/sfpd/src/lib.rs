//! Transceiver State Broker Daemon
//!
//! Tracks SFP/QSFP module presence, configures copper PHYs behind SFPs,
//! and serves EEPROM and PHY requests to clients over Unix sockets.
//! All transceiver state is owned by one command thread; presence events,
//! client requests and the periodic monitor trigger reach it through the
//! same queue.

pub mod broker;
pub mod command;
pub mod config_file;
pub mod error;
pub mod monitor;
pub mod phy_ops;
pub mod platform;
pub mod server;
pub mod service;
pub mod state;
pub mod systemd;

#[cfg(test)]
mod test_utils;

pub use broker::{Broker, Notification, NOTIFY_TOPIC, SGMII_ENABLED};
pub use command::{Command, COMMANDS};
pub use config_file::{
    EndpointsConfig, MonitorConfig, PhyConfig, PortConfig, PresenceConfig, SfpdConfig,
    DEFAULT_CONFIG_PATH,
};
pub use error::{Result, SfpdError};
pub use monitor::{MonitorEntry, MonitorFrame, MonitorMessage, MonitorTimer, MONITOR_TOPIC};
pub use phy_ops::ProbePolicy;
pub use platform::{Platform, SysfsPlatform};
pub use server::SocketServer;
pub use service::{BrokerHandle, BrokerMessage, BrokerService};
pub use state::{ExtraState, PresenceEvent, StateTable, TransceiverRecord};
pub use systemd::SystemdNotifier;
