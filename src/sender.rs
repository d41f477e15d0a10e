//! Sender-side protocol: the duty-cycle state machine
//!
//! One duty cycle walks `Idle → AwaitingAck → Transmitting → Done`:
//!
//! 1. sample every provider into an ordered batch;
//! 2. send the ack request (own address, `require_ack`), the only
//!    acknowledged send of the cycle;
//! 3. only on ack: send each reading as its own frame, batch order
//!    preserved, then the end-of-batch sentinel;
//! 4. sleep the duty interval and start fresh.
//!
//! A failed handshake aborts the cycle outright: no telemetry, no sentinel,
//! no retry until the next scheduled cycle. The unsent batch is dropped
//! (unsent telemetry does not survive a cycle, let alone a restart).

use crate::error::Result;
use crate::link::{PeerAddress, RadioLink};
use crate::sensors::ReadingSource;
use crate::wire::{self, Reading};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Default duty-cycle interval between transmit cycles
pub const DEFAULT_DUTY_CYCLE: Duration = Duration::from_secs(2);

/// Per-cycle protocol states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SenderState {
    Idle,
    AwaitingAck,
    Transmitting,
    Done,
}

/// Drives the sender side of the send/acknowledge/relay protocol
pub struct SenderProtocol<L: RadioLink> {
    link: L,
    own: PeerAddress,
    peer: PeerAddress,
    providers: Vec<Box<dyn ReadingSource>>,
    duty_cycle: Duration,
    state: SenderState,
}

impl<L: RadioLink> SenderProtocol<L> {
    /// The peer must already be registered on the link.
    pub fn new(
        link: L,
        own: PeerAddress,
        peer: PeerAddress,
        providers: Vec<Box<dyn ReadingSource>>,
        duty_cycle: Duration,
    ) -> Self {
        Self {
            link,
            own,
            peer,
            providers,
            duty_cycle,
            state: SenderState::Idle,
        }
    }

    /// Current protocol state (observable for tests and diagnostics)
    pub fn state(&self) -> SenderState {
        self.state
    }

    /// Sample every provider, preserving provider order
    fn sample_batch(&mut self) -> Result<Vec<Reading>> {
        let mut batch = Vec::with_capacity(self.providers.len());
        for provider in &mut self.providers {
            batch.push(provider.sample()?);
        }
        Ok(batch)
    }

    /// Run one duty cycle; returns whether the batch was delivered
    pub fn run_cycle(&mut self) -> Result<bool> {
        let batch = self.sample_batch()?;

        self.state = SenderState::AwaitingAck;
        let acked = self
            .link
            .send(self.peer, &wire::ack_request(self.own), true)?;
        if !acked {
            log::warn!("no ack from gateway {}, skipping transmit cycle", self.peer);
            self.state = SenderState::Idle;
            return Ok(false);
        }

        self.state = SenderState::Transmitting;
        for reading in &batch {
            let frame = wire::encode_reading(reading)?;
            self.link.send(self.peer, &frame, false)?;
        }
        self.link.send(self.peer, wire::SENTINEL, false)?;
        self.state = SenderState::Done;
        log::debug!("transmitted batch of {} readings", batch.len());
        Ok(true)
    }

    /// Duty-cycle loop: sample, transmit, sleep, until the running flag clears
    pub fn run(&mut self, running: &Arc<AtomicBool>) -> Result<()> {
        while running.load(Ordering::Relaxed) {
            self.run_cycle()?;
            self.state = SenderState::Idle;
            sleep_while(self.duty_cycle, running);
        }
        log::info!("sender loop stopped");
        Ok(())
    }
}

/// Sleep in short slices so a cleared running flag cuts the wait short
fn sleep_while(total: Duration, running: &Arc<AtomicBool>) {
    const SLICE: Duration = Duration::from_millis(100);
    let mut remaining = total;
    while !remaining.is_zero() && running.load(Ordering::Relaxed) {
        let step = remaining.min(SLICE);
        std::thread::sleep(step);
        remaining -= step;
    }
}
