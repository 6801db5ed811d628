//! Generic utility primitives with zero engine knowledge.
//!
//! - `io` - File I/O with consistent error handling
//! - `lines` - Line splitting and filtering

pub mod io;
pub mod lines;
