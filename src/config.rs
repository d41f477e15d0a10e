//! Persisted device settings
//!
//! A flat key-value store of named string settings, read once at startup and
//! persisted as TOML. Provisioning (the captive-portal setup server) writes
//! this file out of band; the core only reads it.
//!
//! Missing keys are self-healing: the first read of an absent key persists
//! it as the empty string, so the provisioning surface always sees the full
//! key set and a re-read keeps returning `""` (idempotent default).

use crate::error::{Error, Result};
use crate::gateway::DEFAULT_STATUS_EVERY;
use crate::link::PeerAddress;
use crate::sender::DEFAULT_DUTY_CYCLE;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default settings file location
pub const DEFAULT_SETTINGS_PATH: &str = "/etc/hivelink.toml";

/// Well-known setting keys
pub mod keys {
    /// Backing Wi-Fi network name (provisioning concern, read at startup)
    pub const SSID: &str = "ssid";
    /// Backing Wi-Fi passphrase
    pub const PASS: &str = "pass";
    /// Message broker URL
    pub const MQTT_BROKER: &str = "mqtt_broker";
    /// Counterpart peer hardware address
    pub const PEER: &str = "peer";
    /// DHT11 sensor pin assignment
    pub const DHT11_PIN: &str = "dht11_pin";
    /// DS18B20 sensor pin assignment
    pub const DS28B20_PIN: &str = "ds28b20_pin";
    /// This device's logical name (gateway identity)
    pub const DEVICE_NAME: &str = "device_name";
    /// This device's own hardware address
    pub const ADDRESS: &str = "address";
    /// Radio socket bind address
    pub const BIND: &str = "bind";
    /// Counterpart peer datagram endpoint
    pub const PEER_ENDPOINT: &str = "peer_endpoint";
    /// Radio channel the link is pinned to
    pub const RADIO_CHANNEL: &str = "radio_channel";
    /// Telemetry frames between gateway heartbeats
    pub const STATUS_EVERY: &str = "status_every";
    /// Sender duty-cycle interval in milliseconds
    pub const DUTY_CYCLE_MS: &str = "duty_cycle_ms";
}

/// Key-value settings store backed by a TOML file
pub struct Settings {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl Settings {
    /// Load settings; a missing file starts an empty store
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let values = match fs::read_to_string(&path) {
            Ok(contents) => {
                toml::from_str(&contents).map_err(|e| Error::Config(e.to_string()))?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self { path, values })
    }

    /// Read a setting; an absent key is persisted as `""` and returned
    pub fn get(&mut self, key: &str) -> Result<String> {
        if let Some(value) = self.values.get(key) {
            return Ok(value.clone());
        }
        self.values.insert(key.to_string(), String::new());
        self.save()?;
        Ok(String::new())
    }

    fn save(&self) -> Result<()> {
        let contents =
            toml::to_string_pretty(&self.values).map_err(|e| Error::Config(e.to_string()))?;
        fs::write(&self.path, contents)?;
        Ok(())
    }

    /// Counterpart peer address; unset or malformed is not recoverable here
    pub fn peer(&mut self) -> Result<PeerAddress> {
        self.get(keys::PEER)?.parse()
    }

    /// Own hardware address, with a role-specific default
    pub fn address(&mut self, default: &str) -> Result<PeerAddress> {
        let value = self.get(keys::ADDRESS)?;
        if value.is_empty() {
            default.parse()
        } else {
            value.parse()
        }
    }

    /// Device name, with a role-specific default
    pub fn device_name(&mut self, default: &str) -> Result<String> {
        let value = self.get(keys::DEVICE_NAME)?;
        Ok(if value.is_empty() {
            default.to_string()
        } else {
            value
        })
    }

    /// Radio socket bind address
    pub fn bind_addr(&mut self, default: &str) -> Result<String> {
        let value = self.get(keys::BIND)?;
        Ok(if value.is_empty() {
            default.to_string()
        } else {
            value
        })
    }

    /// Counterpart peer datagram endpoint (required for the sender role)
    pub fn peer_endpoint(&mut self) -> Result<String> {
        let value = self.get(keys::PEER_ENDPOINT)?;
        if value.is_empty() {
            return Err(Error::Connectivity(
                "peer_endpoint is not configured".into(),
            ));
        }
        Ok(value)
    }

    /// Radio channel; `-1` until one has been discovered and pinned
    pub fn radio_channel(&mut self) -> Result<i64> {
        let value = self.get(keys::RADIO_CHANNEL)?;
        if value.is_empty() {
            return Ok(-1);
        }
        value
            .parse()
            .map_err(|_| Error::Config(format!("radio_channel is not an integer: {value}")))
    }

    /// Heartbeat cadence in telemetry frames
    pub fn status_every(&mut self) -> Result<u32> {
        let value = self.get(keys::STATUS_EVERY)?;
        if value.is_empty() {
            return Ok(DEFAULT_STATUS_EVERY);
        }
        value
            .parse()
            .map_err(|_| Error::Config(format!("status_every is not an integer: {value}")))
    }

    /// Sender duty-cycle interval
    pub fn duty_cycle(&mut self) -> Result<Duration> {
        let value = self.get(keys::DUTY_CYCLE_MS)?;
        if value.is_empty() {
            return Ok(DEFAULT_DUTY_CYCLE);
        }
        let ms: u64 = value
            .parse()
            .map_err(|_| Error::Config(format!("duty_cycle_ms is not an integer: {value}")))?;
        Ok(Duration::from_millis(ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> Settings {
        Settings::load(dir.path().join("hivelink.toml")).unwrap()
    }

    #[test]
    fn absent_key_reads_empty_and_persists() {
        let dir = TempDir::new().unwrap();
        let mut settings = store(&dir);
        assert_eq!(settings.get(keys::DHT11_PIN).unwrap(), "");

        // The default must be durable: a fresh load sees the key as ""
        let mut reloaded = store(&dir);
        assert_eq!(reloaded.get(keys::DHT11_PIN).unwrap(), "");
        let on_disk = fs::read_to_string(dir.path().join("hivelink.toml")).unwrap();
        assert!(on_disk.contains("dht11_pin"));
    }

    #[test]
    fn existing_values_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hivelink.toml");
        fs::write(&path, "peer = \"e0:5a:1b:0c:c6:1c\"\nssid = \"apiary\"\n").unwrap();

        let mut settings = Settings::load(&path).unwrap();
        assert_eq!(settings.get(keys::SSID).unwrap(), "apiary");
        assert_eq!(
            settings.peer().unwrap(),
            "e0:5a:1b:0c:c6:1c".parse().unwrap()
        );
    }

    #[test]
    fn unset_peer_is_an_error() {
        let dir = TempDir::new().unwrap();
        let mut settings = store(&dir);
        assert!(settings.peer().is_err());
    }

    #[test]
    fn typed_defaults_apply_when_unset() {
        let dir = TempDir::new().unwrap();
        let mut settings = store(&dir);
        assert_eq!(settings.status_every().unwrap(), DEFAULT_STATUS_EVERY);
        assert_eq!(settings.duty_cycle().unwrap(), DEFAULT_DUTY_CYCLE);
        assert_eq!(settings.radio_channel().unwrap(), -1);
        assert_eq!(settings.device_name("House").unwrap(), "House");
    }

    #[test]
    fn typed_overrides_parse() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hivelink.toml");
        fs::write(
            &path,
            "status_every = \"10\"\nduty_cycle_ms = \"500\"\nradio_channel = \"6\"\n",
        )
        .unwrap();

        let mut settings = Settings::load(&path).unwrap();
        assert_eq!(settings.status_every().unwrap(), 10);
        assert_eq!(settings.duty_cycle().unwrap(), Duration::from_millis(500));
        assert_eq!(settings.radio_channel().unwrap(), 6);
    }

    #[test]
    fn malformed_numeric_setting_is_a_config_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hivelink.toml");
        fs::write(&path, "status_every = \"twenty\"\n").unwrap();
        let mut settings = Settings::load(&path).unwrap();
        assert!(settings.status_every().is_err());
    }
}
