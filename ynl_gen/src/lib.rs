//! Netlink family code generator.
//!
//! Loads a family spec, resolves it into a model of attribute sets,
//! operations and nested structures, then renders C for the requesting
//! peer (`user`), the handling peer (`kernel`) or the shared constants
//! header (`uapi`).

pub mod codegen;
pub mod error;
pub mod spec;

pub use error::{GenError, GenResult};
