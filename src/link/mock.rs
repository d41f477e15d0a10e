//! Mock radio link for testing

use super::{PeerAddress, RadioLink};
use crate::error::{Error, Result};
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// One frame recorded by the mock on `send`
#[derive(Debug, Clone, PartialEq)]
pub struct SentFrame {
    pub to: PeerAddress,
    pub frame: Vec<u8>,
    pub require_ack: bool,
}

struct Shared {
    sent: Vec<SentFrame>,
    /// Scripted handshake outcomes, oldest first; empty means "ack everything"
    ack_script: VecDeque<bool>,
    /// Scripted transport failures, consumed one per `send`
    send_errors: VecDeque<Error>,
}

/// In-memory [`RadioLink`] double
///
/// Records every sent frame in order, serves injected inbound frames from a
/// channel, and reports [`Error::LinkClosed`] once the test handle is
/// dropped or closed.
pub struct MockRadioLink {
    registered: Vec<PeerAddress>,
    shared: Arc<Mutex<Shared>>,
    inbound: Receiver<(PeerAddress, Vec<u8>)>,
}

/// Test-side handle paired with a [`MockRadioLink`]
pub struct MockLinkHandle {
    shared: Arc<Mutex<Shared>>,
    inbound: Option<Sender<(PeerAddress, Vec<u8>)>>,
}

impl MockRadioLink {
    pub fn new() -> (Self, MockLinkHandle) {
        let (tx, rx) = unbounded();
        let shared = Arc::new(Mutex::new(Shared {
            sent: Vec::new(),
            ack_script: VecDeque::new(),
            send_errors: VecDeque::new(),
        }));
        (
            Self {
                registered: Vec::new(),
                shared: Arc::clone(&shared),
                inbound: rx,
            },
            MockLinkHandle {
                shared,
                inbound: Some(tx),
            },
        )
    }
}

impl MockLinkHandle {
    /// Queue an inbound frame for `recv`
    pub fn inject(&self, from: PeerAddress, frame: &[u8]) {
        if let Some(tx) = &self.inbound {
            let _ = tx.send((from, frame.to_vec()));
        }
    }

    /// Script the outcome of the next `require_ack` handshakes, oldest first
    pub fn script_acks(&self, outcomes: &[bool]) {
        let mut shared = self.shared.lock().unwrap();
        shared.ack_script.extend(outcomes.iter().copied());
    }

    /// Fail the next `send` with a transport error (nothing is recorded)
    pub fn fail_next_send(&self, err: Error) {
        let mut shared = self.shared.lock().unwrap();
        shared.send_errors.push_back(err);
    }

    /// Close the inbound side; subsequent `recv` reports `LinkClosed`
    pub fn close(&mut self) {
        self.inbound = None;
    }

    /// Everything sent so far, in order
    pub fn sent_frames(&self) -> Vec<SentFrame> {
        self.shared.lock().unwrap().sent.clone()
    }
}

impl RadioLink for MockRadioLink {
    fn register_peer(&mut self, addr: PeerAddress) -> Result<()> {
        if !self.registered.contains(&addr) {
            self.registered.push(addr);
        }
        Ok(())
    }

    fn send(&mut self, addr: PeerAddress, frame: &[u8], require_ack: bool) -> Result<bool> {
        if !self.registered.contains(&addr) {
            return Err(Error::PeerNotRegistered(addr));
        }
        let mut shared = self.shared.lock().unwrap();
        if let Some(err) = shared.send_errors.pop_front() {
            return Err(err);
        }
        shared.sent.push(SentFrame {
            to: addr,
            frame: frame.to_vec(),
            require_ack,
        });
        if require_ack {
            Ok(shared.ack_script.pop_front().unwrap_or(true))
        } else {
            Ok(true)
        }
    }

    fn recv(&mut self) -> Result<(PeerAddress, Vec<u8>)> {
        self.inbound.recv().map_err(|_| Error::LinkClosed)
    }
}
