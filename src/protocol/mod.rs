//! PostgreSQL wire protocol: framing, message encoding, message parsing.

pub mod backend;
pub mod codec;
pub mod framer;
pub mod frontend;
pub mod types;

pub use framer::{Frame, Framer};
