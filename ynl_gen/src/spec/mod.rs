/* In-memory family model: construct from spec records, then resolve */

pub mod attr;
pub mod attr_set;
pub mod enum_set;
pub mod family;
pub mod loader;
pub mod naming;
pub mod operation;
pub mod structs;

/* Raw spec records as deserialized from YAML */
pub mod records {
    pub use ynl_types::*;
}

pub use attr::{Attr, AttrKind, Presence, ScalarType, WirePolicy};
pub use attr_set::AttrSet;
pub use enum_set::{EnumEntry, EnumSet};
pub use family::{Const, Family, Hooks, RootSet};
pub use loader::SpecFile;
pub use operation::{OpDirection, OpMode, OpModeKind, Operation};
pub use structs::Struct;
