//! Mirror credentials
//!
//! Binary caches behind authentication are reached with HTTP Basic auth, the
//! login and password coming from a netrc file keyed by hostname.

pub mod netrc;

pub use netrc::{Machine, Netrc};
