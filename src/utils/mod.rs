//! Helpers shared by all blob decoders.

mod recursion;

pub use recursion::{RecursionCounter, MAX_RECURSION_DEPTH};
