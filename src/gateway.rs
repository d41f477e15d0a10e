//! Gateway-side protocol: the receive loop
//!
//! Single blocking loop with one piece of state, the rolling
//! `since_last_status` counter. On startup the gateway publishes one status
//! heartbeat immediately so the broker sees it online before any telemetry.
//! Per received frame:
//!
//! - ack requests and end-of-batch sentinels are handshake/termination
//!   artifacts: ignored, never counted, never relayed;
//! - everything else is telemetry: strictly decoded, relayed per hive, and
//!   counted toward the next heartbeat;
//! - a malformed payload is logged and dropped; the loop continues.
//!
//! Once the counter reaches the threshold (default 20 telemetry frames) the
//! gateway publishes another heartbeat and resets to zero. The threshold and
//! the senders' duty cycles are independent; no cross-synchronization.

use crate::error::{Error, Result};
use crate::link::RadioLink;
use crate::relay::RelaySink;
use crate::wire::{self, FrameKind};

/// Default telemetry-frame count between status heartbeats
pub const DEFAULT_STATUS_EVERY: u32 = 20;

/// Drives the gateway side of the send/acknowledge/relay protocol
pub struct GatewayProtocol<L: RadioLink> {
    link: L,
    sink: RelaySink,
    status_every: u32,
    since_last_status: u32,
}

impl<L: RadioLink> GatewayProtocol<L> {
    pub fn new(link: L, sink: RelaySink, status_every: u32) -> Self {
        Self {
            link,
            sink,
            status_every,
            since_last_status: 0,
        }
    }

    /// Telemetry frames relayed since the last heartbeat
    pub fn since_last_status(&self) -> u32 {
        self.since_last_status
    }

    /// Handle one inbound frame
    ///
    /// This is the per-frame step of [`run`](Self::run), kept separate so
    /// the classify/decode/relay/heartbeat decision is testable without a
    /// link.
    pub fn process_frame(&mut self, frame: &[u8]) -> Result<()> {
        match wire::classify(frame) {
            FrameKind::AckRequest | FrameKind::Sentinel => {
                log::debug!("ignoring handshake/termination frame");
                Ok(())
            }
            FrameKind::Telemetry => match wire::decode_telemetry(frame) {
                Ok(reading) => {
                    self.sink.relay_telemetry(&reading)?;
                    self.since_last_status += 1;
                    if self.since_last_status >= self.status_every {
                        self.sink.publish_status()?;
                        self.since_last_status = 0;
                    }
                    Ok(())
                }
                Err(e) => {
                    // Fail closed: drop the frame, keep the loop alive
                    log::warn!("dropping malformed telemetry frame: {e}");
                    Ok(())
                }
            },
        }
    }

    /// Receive loop: heartbeat once, then block on the link until it closes
    ///
    /// Transport errors other than a clean link shutdown escalate to the
    /// caller (and from there to the recovery supervisor).
    pub fn run(&mut self) -> Result<()> {
        self.sink.publish_status()?;
        log::info!("gateway activated and waiting for frames");
        loop {
            match self.link.recv() {
                Ok((_peer, frame)) => self.process_frame(&frame)?,
                Err(Error::LinkClosed) => {
                    log::info!("radio link closed, gateway loop stopped");
                    return Ok(());
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::{MockLinkHandle, MockRadioLink, PeerAddress};
    use crate::relay::test_support::{recording_sink, Published};
    use crate::wire::Reading;
    use std::sync::{Arc, Mutex};

    fn gateway() -> (
        GatewayProtocol<MockRadioLink>,
        MockLinkHandle,
        Arc<Mutex<Vec<Published>>>,
    ) {
        let (link, handle) = MockRadioLink::new();
        let (sink, calls) = recording_sink(6);
        (
            GatewayProtocol::new(link, sink, DEFAULT_STATUS_EVERY),
            handle,
            calls,
        )
    }

    fn telemetry(hive: &str, temperature: f64) -> Vec<u8> {
        wire::encode_reading(&Reading::new(hive, temperature)).unwrap()
    }

    fn sender() -> PeerAddress {
        PeerAddress::new([2, 0, 0, 0, 0, 1])
    }

    #[test]
    fn startup_heartbeat_precedes_all_telemetry() {
        let (mut gw, mut handle, calls) = gateway();
        handle.inject(sender(), &telemetry("A", 20.0));
        handle.close();
        gw.run().unwrap();

        let calls = calls.lock().unwrap();
        assert_eq!(calls[0].topic, "telemetry/gateway/House");
        assert_eq!(calls[1].topic, "telemetry/hive/A");
    }

    #[test]
    fn relays_batch_in_order_and_ignores_artifacts() {
        let (mut gw, mut handle, calls) = gateway();
        handle.inject(sender(), b"ack 02:00:00:00:00:01");
        handle.inject(sender(), &telemetry("A", 20.0));
        handle.inject(sender(), &telemetry("B", 21.0));
        handle.inject(sender(), b"end");
        handle.close();
        gw.run().unwrap();

        let calls = calls.lock().unwrap();
        // Startup heartbeat plus exactly the two telemetry relays
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[1].topic, "telemetry/hive/A");
        assert_eq!(calls[2].topic, "telemetry/hive/B");
        assert_eq!(gw.since_last_status(), 2);
    }

    #[test]
    fn malformed_frame_is_dropped_without_crashing_the_loop() {
        let (mut gw, mut handle, calls) = gateway();
        handle.inject(sender(), b"{\"hive_name\":\"A\"");
        handle.inject(sender(), &telemetry("B", 21.0));
        handle.close();
        gw.run().unwrap();

        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].topic, "telemetry/hive/B");
        assert_eq!(gw.since_last_status(), 1);
    }

    #[test]
    fn heartbeat_every_threshold_frames_and_counter_resets() {
        let (mut gw, _handle, calls) = gateway();
        // process_frame drives the counter without a link
        gw.sink.publish_status().unwrap(); // startup heartbeat, as run() would

        for i in 0..40 {
            gw.process_frame(&telemetry("A", 20.0 + i as f64)).unwrap();
        }
        assert_eq!(gw.since_last_status(), 0);

        let calls = calls.lock().unwrap();
        let heartbeats = calls
            .iter()
            .filter(|c| c.topic.starts_with("telemetry/gateway/"))
            .count();
        let relays = calls
            .iter()
            .filter(|c| c.topic.starts_with("telemetry/hive/"))
            .count();
        // Startup + one per 20 telemetry frames
        assert_eq!(heartbeats, 3);
        assert_eq!(relays, 40);
    }

    #[test]
    fn artifacts_do_not_advance_the_heartbeat_counter() {
        let (mut gw, _handle, _calls) = gateway();
        for _ in 0..50 {
            gw.process_frame(b"end").unwrap();
            gw.process_frame(b"ack 02:00:00:00:00:01").unwrap();
        }
        assert_eq!(gw.since_last_status(), 0);
    }

    #[test]
    fn round_trip_preserves_two_digit_temperature() {
        let (mut gw, mut handle, calls) = gateway();
        let frame = wire::encode_reading(&Reading::new("Christine", 21.5)).unwrap();
        handle.inject(sender(), &frame);
        handle.close();
        gw.run().unwrap();

        let calls = calls.lock().unwrap();
        let record: serde_json::Value = serde_json::from_slice(&calls[1].payload).unwrap();
        assert_eq!(record["hive_name"], "Christine");
        assert_eq!(record["temperature"], "21.50");
    }
}
