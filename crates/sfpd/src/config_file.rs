//! Configuration file support for sfpd
//!
//! Loads and validates sfpd configuration from TOML files.
//! Default location: /etc/sfpd/sfpd.conf

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sfp_eeprom::PortType;

use crate::error::{Result, SfpdError};
use crate::phy_ops::ProbePolicy;

/// Default configuration file path
pub const DEFAULT_CONFIG_PATH: &str = "/etc/sfpd/sfpd.conf";

/// Socket endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointsConfig {
    /// Request/reply command socket
    #[serde(default = "default_command_socket")]
    pub command_socket: PathBuf,

    /// Presence notification socket
    #[serde(default = "default_notify_socket")]
    pub notify_socket: PathBuf,

    /// Monitor snapshot socket
    #[serde(default = "default_monitor_socket")]
    pub monitor_socket: PathBuf,

    /// Permission bits applied to sockets this process binds
    #[serde(default = "default_socket_mode")]
    pub socket_mode: u32,
}

/// Monitoring timer
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Initial monitoring interval in milliseconds, 0 = disabled
    #[serde(default)]
    pub interval_ms: u64,
}

/// PHY probing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhyConfig {
    /// Attempts at identifying a PHY when a module is inserted
    #[serde(default = "default_probe_tries")]
    pub probe_tries: u32,

    /// Delay between attempts in milliseconds
    #[serde(default = "default_probe_retry_ms")]
    pub probe_retry_ms: u64,
}

/// Presence polling of configured ports
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceConfig {
    /// Poll interval in milliseconds, 0 = poll once at startup only
    #[serde(default = "default_presence_poll_ms")]
    pub poll_interval_ms: u64,
}

/// One transceiver cage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortConfig {
    /// Port name, e.g. "xe17"
    pub name: String,

    /// Form factor
    #[serde(rename = "type")]
    pub port_type: PortType,

    /// Bus-facing index
    pub index: u32,

    /// EEPROM image file (e.g. an optoe `eeprom` node)
    pub eeprom_path: PathBuf,

    /// File reading "1" when a module is present; when absent, presence
    /// is the existence of `eeprom_path`
    #[serde(default)]
    pub presence_path: Option<PathBuf>,

    /// File taking "1" to disable the transmitter
    #[serde(default)]
    pub tx_disable_path: Option<PathBuf>,
}

/// Complete sfpd configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SfpdConfig {
    /// Default log filter when RUST_LOG is not set
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub endpoints: EndpointsConfig,

    #[serde(default)]
    pub monitor: MonitorConfig,

    #[serde(default)]
    pub phy: PhyConfig,

    #[serde(default)]
    pub presence: PresenceConfig,

    #[serde(default)]
    pub ports: Vec<PortConfig>,
}

// Default functions
fn default_command_socket() -> PathBuf {
    PathBuf::from("/run/sfpd/command.sock")
}

fn default_notify_socket() -> PathBuf {
    PathBuf::from("/run/sfpd/notify.sock")
}

fn default_monitor_socket() -> PathBuf {
    PathBuf::from("/run/sfpd/monitor.sock")
}

fn default_socket_mode() -> u32 {
    0o770
}

fn default_probe_tries() -> u32 {
    1
}

fn default_probe_retry_ms() -> u64 {
    75
}

fn default_presence_poll_ms() -> u64 {
    1000
}

fn default_log_level() -> String {
    "info".to_string()
}

// Default implementations
impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            command_socket: default_command_socket(),
            notify_socket: default_notify_socket(),
            monitor_socket: default_monitor_socket(),
            socket_mode: default_socket_mode(),
        }
    }
}

impl Default for PhyConfig {
    fn default() -> Self {
        Self {
            probe_tries: default_probe_tries(),
            probe_retry_ms: default_probe_retry_ms(),
        }
    }
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_presence_poll_ms(),
        }
    }
}

impl Default for SfpdConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            endpoints: EndpointsConfig::default(),
            monitor: MonitorConfig::default(),
            phy: PhyConfig::default(),
            presence: PresenceConfig::default(),
            ports: Vec::new(),
        }
    }
}

impl SfpdConfig {
    /// Load configuration from file, falling back to defaults if file not found
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        match fs::read_to_string(path) {
            Ok(content) => Self::parse(&content).map_err(|e| {
                SfpdError::Config(format!("Failed to parse config file {}: {}", path.display(), e))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(SfpdError::Io(e)),
        }
    }

    /// Parse and validate configuration text
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| SfpdError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Initial monitoring interval
    pub fn monitor_interval(&self) -> Duration {
        Duration::from_millis(self.monitor.interval_ms)
    }

    /// Presence poll interval, `None` when polling only at startup
    pub fn presence_poll_interval(&self) -> Option<Duration> {
        (self.presence.poll_interval_ms > 0)
            .then(|| Duration::from_millis(self.presence.poll_interval_ms))
    }

    /// PHY probe schedule
    pub fn probe_policy(&self) -> ProbePolicy {
        ProbePolicy {
            tries: self.phy.probe_tries,
            retry: Duration::from_millis(self.phy.probe_retry_ms),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.phy.probe_tries == 0 {
            return Err(SfpdError::Config("probe_tries must be > 0".to_string()));
        }

        if self.endpoints.socket_mode > 0o7777 {
            return Err(SfpdError::Config(format!(
                "socket_mode {:o} is not a permission mode",
                self.endpoints.socket_mode
            )));
        }

        let mut names = HashSet::new();
        let mut slots = HashSet::new();
        for port in &self.ports {
            if port.name.is_empty() {
                return Err(SfpdError::Config("port name must not be empty".to_string()));
            }
            if !names.insert(port.name.as_str()) {
                return Err(SfpdError::Config(format!("duplicate port {}", port.name)));
            }
            if !slots.insert((port.port_type, port.index)) {
                return Err(SfpdError::Config(format!(
                    "port {} reuses {} index {}",
                    port.name, port.port_type, port.index
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = SfpdConfig::default();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.endpoints.socket_mode, 0o770);
        assert_eq!(config.monitor_interval(), Duration::ZERO);
        assert!(config.ports.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_probe_policy_defaults() {
        let policy = SfpdConfig::default().probe_policy();
        assert_eq!(policy.tries, 1);
        assert_eq!(policy.retry, Duration::from_millis(75));
    }

    #[test]
    fn test_toml_deserialization() {
        let config = SfpdConfig::parse(
            r#"
log_level = "debug"

[endpoints]
command_socket = "/tmp/sfpd.sock"

[monitor]
interval_ms = 5000

[[ports]]
name = "xe17"
type = "SFP"
index = 17
eeprom_path = "/sys/bus/i2c/devices/17-0050/eeprom"

[[ports]]
name = "ce0"
type = "QSFP"
index = 0
eeprom_path = "/sys/bus/i2c/devices/30-0050/eeprom"
presence_path = "/sys/class/sfp/ce0/present"
"#,
        )
        .unwrap();

        assert_eq!(config.log_level, "debug");
        assert_eq!(config.endpoints.command_socket, PathBuf::from("/tmp/sfpd.sock"));
        // Unspecified values should use defaults
        assert_eq!(config.endpoints.notify_socket, default_notify_socket());
        assert_eq!(config.monitor_interval(), Duration::from_secs(5));
        assert_eq!(config.ports.len(), 2);
        assert_eq!(config.ports[1].port_type, PortType::Qsfp);
        assert!(config.ports[1].presence_path.is_some());
        assert!(config.ports[0].tx_disable_path.is_none());
    }

    #[test]
    fn test_presence_poll_interval() {
        let mut config = SfpdConfig::default();
        assert_eq!(config.presence_poll_interval(), Some(Duration::from_secs(1)));
        config.presence.poll_interval_ms = 0;
        assert_eq!(config.presence_poll_interval(), None);
    }

    #[test]
    fn test_validate_duplicate_port_name() {
        let err = SfpdConfig::parse(
            r#"
[[ports]]
name = "xe1"
type = "SFP"
index = 1
eeprom_path = "/a"

[[ports]]
name = "xe1"
type = "SFP"
index = 2
eeprom_path = "/b"
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("duplicate port xe1"));
    }

    #[test]
    fn test_validate_duplicate_index() {
        let mut config = SfpdConfig::default();
        for name in ["xe1", "xe2"] {
            config.ports.push(PortConfig {
                name: name.to_string(),
                port_type: PortType::Sfp,
                index: 1,
                eeprom_path: PathBuf::from("/dev/null"),
                presence_path: None,
                tx_disable_path: None,
            });
        }
        assert!(config.validate().is_err());

        config.ports[1].port_type = PortType::Qsfp;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_zero_probe_tries() {
        let mut config = SfpdConfig::default();
        config.phy.probe_tries = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_port_type_rejected() {
        let err = SfpdConfig::parse(
            r#"
[[ports]]
name = "xe1"
type = "OSFP"
index = 1
eeprom_path = "/a"
"#,
        )
        .unwrap_err();
        assert!(matches!(err, SfpdError::Config(_)));
    }

    #[test]
    fn test_load_nonexistent_file_defaults() {
        let config = SfpdConfig::load_or_default("/nonexistent/sfpd.conf").unwrap();
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[phy]\nprobe_tries = 3\nprobe_retry_ms = 10").unwrap();

        let config = SfpdConfig::load_or_default(file.path()).unwrap();
        assert_eq!(config.phy.probe_tries, 3);
        assert_eq!(config.probe_policy().retry, Duration::from_millis(10));
    }

    #[test]
    fn test_load_malformed_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[phy\nprobe_tries = ").unwrap();

        let err = SfpdConfig::load_or_default(file.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }
}
