//! UDP datagram radio link
//!
//! Bench stand-in for the connectionless field radio: one datagram per
//! frame, unicast to the paired peer. The radio's link-layer acknowledgment
//! is emulated with a small header and an ack-reply echo:
//!
//! ```text
//! ┌──────────────────┬───────────────┬────────────────────┐
//! │ Source (6 bytes) │ Flags (1 byte)│ Frame (plain text) │
//! └──────────────────┴───────────────┴────────────────────┘
//! ```
//!
//! Flags: `0x01` = acknowledgment requested, `0x02` = acknowledgment reply
//! (empty frame). The receive path answers ack requests itself, the way the
//! radio hardware acks below the protocol, so protocol code never sees the
//! handshake traffic.
//!
//! The receive socket runs fully blocking with no timeout: the transport has
//! no periodic wake, which is exactly the no-power-save posture the radio
//! requires. An ack wait is the only bounded read (500 ms).

use super::{PeerAddress, RadioLink, MAX_FRAME_SIZE};
use crate::error::{Error, Result};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::Duration;

/// How long a `require_ack` send waits for the peer's ack reply
const ACK_TIMEOUT: Duration = Duration::from_millis(500);

/// Header: 6-byte source address + 1 flags byte
const HEADER_LEN: usize = 7;

const FLAG_ACK_REQUESTED: u8 = 0x01;
const FLAG_ACK_REPLY: u8 = 0x02;

/// One byte beyond the largest legal datagram, so a read that fills the
/// whole buffer can only be a truncated oversize datagram
const RECV_BUF_LEN: usize = HEADER_LEN + MAX_FRAME_SIZE + 1;

/// UDP-backed [`RadioLink`]
pub struct UdpRadioLink {
    socket: UdpSocket,
    own: PeerAddress,
    /// Known peer endpoints (configured before registration)
    endpoints: HashMap<PeerAddress, SocketAddr>,
    /// Peers registered for sending
    registered: Vec<PeerAddress>,
    recv_buf: Box<[u8; RECV_BUF_LEN]>,
}

impl UdpRadioLink {
    /// Bind the link socket
    pub fn bind(bind_addr: &str, own: PeerAddress) -> Result<Self> {
        let socket = UdpSocket::bind(bind_addr)
            .map_err(|e| Error::Connectivity(format!("cannot bind radio socket {bind_addr}: {e}")))?;
        log::info!("radio link bound on {} as {}", socket.local_addr()?, own);
        Ok(Self {
            socket,
            own,
            endpoints: HashMap::new(),
            registered: Vec::new(),
            recv_buf: Box::new([0u8; RECV_BUF_LEN]),
        })
    }

    /// Map a peer's hardware address to its datagram endpoint
    pub fn add_endpoint(&mut self, addr: PeerAddress, endpoint: impl ToSocketAddrs) -> Result<()> {
        let endpoint = endpoint
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| Error::Connectivity(format!("no endpoint resolves for peer {addr}")))?;
        self.endpoints.insert(addr, endpoint);
        Ok(())
    }

    /// Local socket address (useful when bound to an ephemeral port)
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    fn datagram(&self, flags: u8, frame: &[u8]) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_LEN + frame.len());
        buf.extend_from_slice(&self.own.octets());
        buf.push(flags);
        buf.extend_from_slice(frame);
        buf
    }

    /// Wait for the peer's ack reply within [`ACK_TIMEOUT`]
    ///
    /// Non-ack datagrams arriving during the wait are dropped; with
    /// one-to-one pairing nothing else is expected mid-handshake.
    fn await_ack(&mut self, from: PeerAddress) -> Result<bool> {
        self.socket.set_read_timeout(Some(ACK_TIMEOUT))?;
        let acked = loop {
            match self.socket.recv_from(&mut self.recv_buf[..]) {
                Ok((n, _)) => {
                    if n < HEADER_LEN {
                        continue;
                    }
                    let mut octets = [0u8; 6];
                    octets.copy_from_slice(&self.recv_buf[..6]);
                    let src = PeerAddress::new(octets);
                    let flags = self.recv_buf[6];
                    if flags & FLAG_ACK_REPLY != 0 && src == from {
                        break true;
                    }
                    log::debug!("dropping datagram from {src} during ack wait");
                }
                Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    break false;
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => return Err(Error::Interrupted),
                Err(e) => return Err(e.into()),
            }
        };
        self.socket.set_read_timeout(None)?;
        Ok(acked)
    }
}

impl RadioLink for UdpRadioLink {
    fn register_peer(&mut self, addr: PeerAddress) -> Result<()> {
        if !self.endpoints.contains_key(&addr) {
            return Err(Error::Connectivity(format!(
                "no endpoint configured for peer {addr}"
            )));
        }
        if !self.registered.contains(&addr) {
            self.registered.push(addr);
            log::info!("registered peer {addr}");
        }
        Ok(())
    }

    fn send(&mut self, addr: PeerAddress, frame: &[u8], require_ack: bool) -> Result<bool> {
        if !self.registered.contains(&addr) {
            return Err(Error::PeerNotRegistered(addr));
        }
        if frame.len() > MAX_FRAME_SIZE {
            return Err(Error::Other(format!(
                "frame of {} bytes exceeds transport maximum {MAX_FRAME_SIZE}",
                frame.len()
            )));
        }
        let endpoint = self.endpoints[&addr];
        let flags = if require_ack { FLAG_ACK_REQUESTED } else { 0 };
        let datagram = self.datagram(flags, frame);
        self.socket.send_to(&datagram, endpoint)?;
        if require_ack {
            self.await_ack(addr)
        } else {
            Ok(true)
        }
    }

    fn recv(&mut self) -> Result<(PeerAddress, Vec<u8>)> {
        // Fully blocking; the only bounded read on this socket is an ack wait.
        self.socket.set_read_timeout(None)?;
        loop {
            let (n, source) = match self.socket.recv_from(&mut self.recv_buf[..]) {
                Ok(ok) => ok,
                Err(e) if e.kind() == ErrorKind::Interrupted => return Err(Error::Interrupted),
                Err(e) => return Err(e.into()),
            };
            if n < HEADER_LEN {
                log::debug!("dropping short datagram ({n} bytes) from {source}");
                continue;
            }
            if n == self.recv_buf.len() {
                // recv_from truncated an oversize datagram; never forward
                // a mangled frame
                log::debug!("dropping oversized datagram from {source}");
                continue;
            }
            let mut octets = [0u8; 6];
            octets.copy_from_slice(&self.recv_buf[..6]);
            let src = PeerAddress::new(octets);
            let flags = self.recv_buf[6];
            if flags & FLAG_ACK_REPLY != 0 {
                // Stale ack from an earlier handshake
                continue;
            }
            if flags & FLAG_ACK_REQUESTED != 0 {
                // Link-layer auto-ack, answered below the protocol
                let reply = self.datagram(FLAG_ACK_REPLY, &[]);
                self.socket.send_to(&reply, source)?;
            }
            return Ok((src, self.recv_buf[HEADER_LEN..n].to_vec()));
        }
    }
}
