//! Host channel transport.

pub mod framing;
pub mod stdio;

pub use stdio::StdioTransport;
