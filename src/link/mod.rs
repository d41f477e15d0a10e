//! Radio link abstraction
//!
//! Wraps the raw broadcast-style radio transport behind the [`RadioLink`]
//! trait: peer registration plus raw send/receive of opaque byte frames.
//! The link never inspects frame contents; classification is a protocol
//! concern (see [`crate::wire`]).
//!
//! # Operational constraint
//!
//! Radio power saving must stay disabled for the lifetime of a link.
//! Periodic radio power-down (typically hundreds of milliseconds) causes
//! missed inbound frames, so implementations must keep the receive path
//! continuously awake. This is a hard requirement, not an optimization.

use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

mod udp;
pub use udp::UdpRadioLink;

#[cfg(any(test, feature = "mock"))]
mod mock;
#[cfg(any(test, feature = "mock"))]
pub use mock::{MockLinkHandle, MockRadioLink, SentFrame};

/// Soft maximum payload size imposed by the datagram radio transport
pub const MAX_FRAME_SIZE: usize = 250;

/// Fixed-width hardware identifier for one radio endpoint
///
/// Immutable once configured. Each role holds exactly one counterpart
/// address (one-to-one pairing).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PeerAddress([u8; 6]);

impl PeerAddress {
    /// Construct from raw octets
    pub const fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    /// Raw 6-byte form
    pub fn octets(&self) -> [u8; 6] {
        self.0
    }
}

impl FromStr for PeerAddress {
    type Err = Error;

    /// Parse the textual form stored in settings: `aa:bb:cc:dd:ee:ff`
    /// (colons optional).
    fn from_str(s: &str) -> Result<Self> {
        let hex: String = s.chars().filter(|c| *c != ':').collect();
        if hex.len() != 12 {
            return Err(Error::InvalidAddress(s.to_string()));
        }
        let mut octets = [0u8; 6];
        for (i, chunk) in hex.as_bytes().chunks(2).enumerate() {
            let pair = std::str::from_utf8(chunk)
                .map_err(|_| Error::InvalidAddress(s.to_string()))?;
            octets[i] = u8::from_str_radix(pair, 16)
                .map_err(|_| Error::InvalidAddress(s.to_string()))?;
        }
        Ok(Self(octets))
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

/// Radio link trait for frame-level peer communication
pub trait RadioLink: Send {
    /// Register a counterpart peer. Must precede any `send` to that peer;
    /// sending to an unregistered peer is a precondition violation, not a
    /// retryable error.
    fn register_peer(&mut self, addr: PeerAddress) -> Result<()>;

    /// Send one frame to a registered peer.
    ///
    /// With `require_ack` the transport performs its single acknowledgment
    /// handshake and returns whether the peer confirmed receipt within the
    /// transport's implicit timeout. There is no retry at this layer.
    fn send(&mut self, addr: PeerAddress, frame: &[u8], require_ack: bool) -> Result<bool>;

    /// Block until a frame arrives and return it with its source address.
    ///
    /// Never decodes contents. Blocks indefinitely; the transport has no
    /// periodic wake requirement once power saving is disabled.
    fn recv(&mut self) -> Result<(PeerAddress, Vec<u8>)>;
}
