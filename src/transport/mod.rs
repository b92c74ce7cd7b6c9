//! Transport adapters around the dispatcher
//!
//! Each adapter only frames, decodes and delivers; protocol decisions stay in
//! [`crate::mcp::dispatcher`].

pub mod duplex;
pub mod lines;
pub mod push;
pub mod unary;
