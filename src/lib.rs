//! HiveLink - field telemetry relay for low-power hive sensor nodes
//!
//! Two roles share this crate:
//!
//! - **Sender**: samples hive sensors once per duty cycle and transmits the
//!   ordered batch over the connectionless radio link, gated on a single
//!   acknowledgment handshake.
//! - **Gateway**: receives frames in one blocking loop, classifies them by
//!   content, relays decoded telemetry to the message broker per hive, and
//!   publishes its own status heartbeat.
//!
//! Both role loops run under the recovery supervisor: any unexpected error
//! restarts the whole device after a fixed delay, which is the system's
//! sole recovery mechanism.

pub mod config;
pub mod error;
pub mod gateway;
pub mod link;
pub mod relay;
pub mod sender;
pub mod sensors;
pub mod supervisor;
pub mod wire;

// Re-export commonly used types
pub use error::{Error, Result};
