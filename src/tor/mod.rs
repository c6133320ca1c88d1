//! Tor daemon interaction
//!
//! Handles Tor ControlPort communication. Tor is treated as a black box:
//! we authenticate, signal, and leave.

pub mod control;
pub mod protocol;

pub use control::{AuthMethod, ControlChannel, ControlSession, Signal, TorControlChannel};
pub use protocol::{ProtocolInfo, Reply};
