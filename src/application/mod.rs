//! Application boundary shared by the binary and the HTTP surface.

pub mod error;
