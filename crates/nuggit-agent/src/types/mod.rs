//! Agent data types.

pub mod error;
pub mod message;

pub use error::*;
pub use message::*;
