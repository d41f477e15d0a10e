//! Relay sink: broker-ready formatting of telemetry and status
//!
//! Bridges decoded radio records into the publish/subscribe backbone. The
//! broker itself sits behind the narrow [`BrokerClient`] contract
//! (publish-only, persist flag); connection management and failure
//! classification belong to that collaborator.
//!
//! # Topics and payloads
//!
//! | Record | Topic | Payload keys |
//! |--------|-------|--------------|
//! | Hive telemetry | `telemetry/hive/<hive_name>` | `hive_name`, `t`, `temperature`, optional `humidity`/`pressure` |
//! | Gateway status | `telemetry/gateway/<identity>` | `gateway_name`, `t`, `temperature`, `channel` |
//!
//! Both publish with the persist flag set so the broker retains the latest
//! message per topic. Timestamps are ISO 8601 UTC, stamped at relay time.

use crate::error::{Error, Result};
use crate::sensors::TemperatureProbe;
use crate::wire::{fixed2, Reading};
use serde::Serialize;

/// Topic prefix for per-hive telemetry
pub const HIVE_TOPIC: &str = "telemetry/hive";
/// Topic prefix for gateway status heartbeats
pub const GATEWAY_TOPIC: &str = "telemetry/gateway";

/// Publish-only message broker contract
pub trait BrokerClient: Send {
    fn publish(&mut self, topic: &str, payload: &[u8], persist: bool) -> Result<()>;
}

/// Wall-clock source, injectable for tests
pub trait Clock: Send {
    /// Current time as an ISO 8601 string, e.g. `2026-08-25T07:31:02Z`
    fn now_iso8601(&self) -> String;
}

/// System UTC clock
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_iso8601(&self) -> String {
        chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
    }
}

/// Gateway health snapshot published as the status heartbeat
#[derive(Debug, Clone, Serialize)]
pub struct GatewayStatus {
    pub gateway_name: String,
    pub t: String,
    pub temperature: String,
    pub channel: i64,
}

/// Formats decoded records into topic+payload pairs and forwards them
///
/// The radio channel is discovered once at startup and passed in here
/// explicitly; it stays fixed for the process lifetime.
pub struct RelaySink {
    broker: Box<dyn BrokerClient>,
    clock: Box<dyn Clock>,
    gateway_name: String,
    channel: i64,
    board: Box<dyn TemperatureProbe>,
}

impl RelaySink {
    pub fn new(
        broker: Box<dyn BrokerClient>,
        clock: Box<dyn Clock>,
        gateway_name: impl Into<String>,
        channel: i64,
        board: Box<dyn TemperatureProbe>,
    ) -> Self {
        Self {
            broker,
            clock,
            gateway_name: gateway_name.into(),
            channel,
            board,
        }
    }

    /// Stamp a decoded telemetry record and publish it under its hive topic
    pub fn relay_telemetry(&mut self, reading: &Reading) -> Result<()> {
        let topic = format!("{HIVE_TOPIC}/{}", reading.hive_name);
        let mut record = serde_json::to_value(reading)
            .map_err(|e| Error::Serialization(e.to_string()))?;
        match record.as_object_mut() {
            Some(obj) => {
                obj.insert("t".into(), self.clock.now_iso8601().into());
            }
            // Readings always serialize as objects
            None => {
                return Err(Error::Serialization(
                    "telemetry record is not an object".into(),
                ))
            }
        }
        let payload =
            serde_json::to_vec(&record).map_err(|e| Error::Serialization(e.to_string()))?;
        log::debug!("relaying {} bytes to {topic}", payload.len());
        self.broker.publish(&topic, &payload, true)
    }

    /// Publish the gateway's own status heartbeat
    pub fn publish_status(&mut self) -> Result<()> {
        let status = GatewayStatus {
            gateway_name: self.gateway_name.clone(),
            t: self.clock.now_iso8601(),
            temperature: fixed2(self.board.read_celsius()?),
            channel: self.channel,
        };
        let topic = format!("{GATEWAY_TOPIC}/{}", self.gateway_name);
        let payload =
            serde_json::to_vec(&status).map_err(|e| Error::Serialization(e.to_string()))?;
        log::info!("gateway status heartbeat -> {topic}");
        self.broker.publish(&topic, &payload, true)
    }
}

/// Broker stand-in that publishes to the log
///
/// Lets both roles run end-to-end on a bench with no broker; swap in a real
/// [`BrokerClient`] for production.
pub struct LoggingBroker;

impl BrokerClient for LoggingBroker {
    fn publish(&mut self, topic: &str, payload: &[u8], persist: bool) -> Result<()> {
        log::info!(
            "publish {topic} persist={persist}: {}",
            String::from_utf8_lossy(payload)
        );
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Recorded publish call
    #[derive(Debug, Clone, PartialEq)]
    pub struct Published {
        pub topic: String,
        pub payload: Vec<u8>,
        pub persist: bool,
    }

    /// Recording broker double
    pub struct RecordingBroker {
        calls: Arc<Mutex<Vec<Published>>>,
    }

    impl RecordingBroker {
        pub fn new() -> (Self, Arc<Mutex<Vec<Published>>>) {
            let calls = Arc::new(Mutex::new(Vec::new()));
            (
                Self {
                    calls: Arc::clone(&calls),
                },
                calls,
            )
        }
    }

    impl BrokerClient for RecordingBroker {
        fn publish(&mut self, topic: &str, payload: &[u8], persist: bool) -> Result<()> {
            self.calls.lock().unwrap().push(Published {
                topic: topic.to_string(),
                payload: payload.to_vec(),
                persist,
            });
            Ok(())
        }
    }

    /// Frozen clock
    pub struct FixedClock(pub &'static str);

    impl Clock for FixedClock {
        fn now_iso8601(&self) -> String {
            self.0.to_string()
        }
    }

    /// Fixed-value board probe
    pub struct FixedProbe(pub f64);

    impl TemperatureProbe for FixedProbe {
        fn read_celsius(&mut self) -> Result<f64> {
            Ok(self.0)
        }
    }

    /// Convenience sink over a recording broker
    pub fn recording_sink(channel: i64) -> (RelaySink, Arc<Mutex<Vec<Published>>>) {
        let (broker, calls) = RecordingBroker::new();
        let sink = RelaySink::new(
            Box::new(broker),
            Box::new(FixedClock("2026-08-25T12:00:00Z")),
            "House",
            channel,
            Box::new(FixedProbe(41.2)),
        );
        (sink, calls)
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn telemetry_is_stamped_and_published_persistent() {
        let (mut sink, calls) = recording_sink(6);
        let mut reading = Reading::new("Christine", 21.5);
        reading.humidity = Some(fixed2(55.0));
        sink.relay_telemetry(&reading).unwrap();

        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].topic, "telemetry/hive/Christine");
        assert!(calls[0].persist);

        let record: serde_json::Value = serde_json::from_slice(&calls[0].payload).unwrap();
        assert_eq!(record["hive_name"], "Christine");
        assert_eq!(record["temperature"], "21.50");
        assert_eq!(record["humidity"], "55.00");
        assert_eq!(record["t"], "2026-08-25T12:00:00Z");
        assert!(record.get("pressure").is_none());
    }

    #[test]
    fn status_heartbeat_carries_identity_channel_and_board_temperature() {
        let (mut sink, calls) = recording_sink(11);
        sink.publish_status().unwrap();

        let calls = calls.lock().unwrap();
        assert_eq!(calls[0].topic, "telemetry/gateway/House");
        assert!(calls[0].persist);

        let record: serde_json::Value = serde_json::from_slice(&calls[0].payload).unwrap();
        assert_eq!(record["gateway_name"], "House");
        assert_eq!(record["channel"], 11);
        assert_eq!(record["temperature"], "41.20");
        assert_eq!(record["t"], "2026-08-25T12:00:00Z");
    }
}
