//! HTTP Transport layer for the Model Context Protocol
//!
//! Provides the external API routing: the unary `/mcp` endpoint, the `/mcp/sse` push stream,
//! the `/mcp/ws` duplex socket and the read-only REST endpoints.

pub mod handlers;
pub mod websocket;
