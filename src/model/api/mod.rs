//! API-compatible types.
//!
//! The types in this module are serialised in an API-friendly way, e.g.:
//!
//! - Big integers are serialised as decimal strings.
//! - Election IDs are plain integers.

pub mod ballot;
pub mod key;
pub mod receipt;
pub mod status;
