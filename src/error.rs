//! Error types for HiveLink

use crate::link::PeerAddress;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// HiveLink error types
///
/// The propagation policy is structural: `Sensor`, `Decode`, and a failed
/// ack handshake are handled at the component that detects them and never
/// reach the top level. Everything else surfaces to the recovery supervisor,
/// which restarts the device after a fixed delay. `Interrupted` is the one
/// exception: it always passes through untouched so the operator regains
/// control.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration load/store failure
    #[error("config error: {0}")]
    Config(String),

    /// Peer address text did not parse as a 6-byte hardware id
    #[error("invalid peer address: {0}")]
    InvalidAddress(String),

    /// Send attempted before the peer was registered on the link
    #[error("peer not registered: {0}")]
    PeerNotRegistered(PeerAddress),

    /// Malformed inbound telemetry payload
    #[error("decode error: {0}")]
    Decode(String),

    /// Outbound record failed to serialize
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Single sensor sample failed; recovered locally with the last good value
    #[error("transient sensor error: {0}")]
    Sensor(String),

    /// Cannot reach the broker or the radio network; not locally recoverable
    #[error("connectivity error: {0}")]
    Connectivity(String),

    /// The radio link was shut down cleanly (no more frames will arrive)
    #[error("link closed")]
    LinkClosed,

    /// Operator interrupt (Ctrl-C); never converted into a restart
    #[error("operator interrupt")]
    Interrupted,

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}
