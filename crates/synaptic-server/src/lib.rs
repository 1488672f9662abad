//! Server and CLI plumbing for the `synaptic` binary.

pub mod config;
pub mod envelope;
pub mod server;
