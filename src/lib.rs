//! RustRotate library crate
//!
//! Periodically asks a local Tor daemon for a new identity and reports the
//! resulting exit address.
//!
//! # Modules
//!
//! - [`cli`] - Command-line interface and console reporting
//! - [`config`] - Configuration loading and validation
//! - [`error`] - Control and probe error taxonomy
//! - [`logging`] - tracing subscriber setup
//! - [`probe`] - Exit address lookup through the SOCKS proxy
//! - [`scheduler`] - The rotation loop
//! - [`tor`] - Tor control port client

#![allow(clippy::doc_markdown)] // Doc formatting is secondary
#![allow(clippy::uninlined_format_args)] // Format string style preference
#![allow(clippy::module_name_repetitions)] // TorConfig in config is fine

pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod probe;
pub mod scheduler;
pub mod tor;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
