//! Core types for toolloop.

pub mod message;
pub mod tool;

pub use message::*;
pub use tool::*;
