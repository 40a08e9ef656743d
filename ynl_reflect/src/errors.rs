use thiserror::Error;
use ynl_gen::GenError;

/// Result alias used across the reflection crate.
pub type ReflectResult<T> = Result<T, ReflectError>;

/// Errors raised while encoding or decoding attribute streams.
#[derive(Debug, Error)]
pub enum ReflectError {
    /// Looking something up in the family model failed.
    #[error("family model lookup failed: {0}")]
    Model(#[from] GenError),

    /// A message carries a member the attribute set does not define.
    #[error("attribute '{attr}' is not defined in set '{set}'")]
    UnknownAttr { set: String, attr: String },

    /// The stream carries an attribute type the set does not define.
    #[error("attribute type {ty} is not defined in set '{set}'")]
    UnknownAttrType { set: String, ty: u16 },

    /// Member is outside the attribute list of an operation message.
    #[error("attribute '{attr}' is not allowed in the {what} of '{op}'")]
    NotAllowed {
        op: String,
        what: &'static str,
        attr: String,
    },

    /// Operation has no message in the requested mode and direction.
    #[error("op '{op}' has no {mode} {what}")]
    NoMessage {
        op: String,
        mode: &'static str,
        what: &'static str,
    },

    /// Stream ended inside an attribute header or payload.
    #[error("truncated attribute at offset {offset}: need {needed} bytes, have {available}")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },

    /// Fixed size payload with the wrong length.
    #[error("bad length for {set}.{attr}: expected {expected} bytes, got {found}")]
    BadLength {
        set: String,
        attr: String,
        expected: usize,
        found: usize,
    },

    /// Payload does not fit the 16-bit attribute length.
    #[error("payload of {set}.{attr} too long ({len} bytes)")]
    TooLong { set: String, attr: String, len: usize },

    /// Attribute type or array index collides with the header flag bits.
    #[error("type {ty} of {set}.{attr} does not fit the attribute header")]
    TypeOutOfRange { set: String, attr: String, ty: u64 },

    /// Single-occurrence container appeared more than once.
    #[error("attribute already present ({set}.{attr})")]
    AlreadyPresent { set: String, attr: String },

    /// Value rejected by the handling peer's policy.
    #[error("policy violation for {set}.{attr}: {reason}")]
    Policy {
        set: String,
        attr: String,
        reason: String,
    },

    /// Value variant does not match the attribute's wire kind.
    #[error("type mismatch for {set}.{attr}: expected {expected}, found {found}")]
    TypeMismatch {
        set: String,
        attr: String,
        expected: &'static str,
        found: &'static str,
    },

    /// String payload is not valid UTF-8.
    #[error("string payload of {set}.{attr} is not valid UTF-8")]
    InvalidString { set: String, attr: String },

    /// Wire kind the runtime can not marshal.
    #[error("{kind} attributes can not be marshalled ({set}.{attr})")]
    Unsupported {
        kind: &'static str,
        set: String,
        attr: String,
    },
}
