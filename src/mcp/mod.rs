//! Model Context Protocol (MCP) dispatch core
//!
//! Provides envelope decoding, the tool catalog, per-connection session state and the
//! method dispatcher shared by every transport.

pub mod dispatcher;
pub mod registry;
pub mod rpc;
pub mod session;
