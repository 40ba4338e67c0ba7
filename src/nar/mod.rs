//! Nix ARchive support
//!
//! Only reading is supported: a NAR held in a `CacheFile` is indexed once and
//! then served by offset.

#[cfg(test)]
pub(crate) mod fixtures;
pub mod listing;

pub use listing::{Located, NarListing, NarNode};
