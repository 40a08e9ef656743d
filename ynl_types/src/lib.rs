//! Netlink Family Spec Records
//!
//! Plain data records for the YAML description of a generic netlink
//! family: definitions, attribute sets, operations and multicast groups.
//! No resolution or code generation happens here; the records mirror the
//! YAML keys one to one.

pub mod types;

pub use types::*;
