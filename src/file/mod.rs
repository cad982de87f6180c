//! Byte-level access to blob data.
//!
//! - [`io`] - Fixed-width reads and the compressed integer encoders
//! - [`parser`] - The [`parser::Parser`] cursor every decoder reads through

pub mod io;
pub mod parser;
