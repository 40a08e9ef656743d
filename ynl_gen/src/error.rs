use thiserror::Error;

/// Result alias used across the generator.
pub type GenResult<T> = Result<T, GenError>;

/// Generation-time failures. Every variant is raised before any output
/// is handed back to the caller.
#[derive(Debug, Error)]
pub enum GenError {
    #[error("failed to read spec '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse spec: {0}")]
    Yaml(#[from] serde_yml::Error),

    #[error("SPDX license tag required in the spec")]
    MissingLicense,

    #[error("spec license '{found}' not accepted, license must be: {expected}")]
    License { found: String, expected: &'static str },

    #[error("codegen only supported for genetlink, not '{0}'")]
    UnsupportedProtocol(String),

    #[error("message enum-model '{model}' not supported for {mode} generation")]
    UnsupportedEnumModel { model: String, mode: String },

    #[error("no typed class for type '{kind}' ({set}.{attr})")]
    UnknownAttrType {
        set: String,
        attr: String,
        kind: String,
    },

    #[error("attribute set '{0}' is not defined")]
    UnknownAttrSet(String),

    #[error("attribute '{attr}' is not defined in set '{set}'")]
    UnknownAttr { set: String, attr: String },

    #[error("definition '{0}' is not defined")]
    UnknownDefinition(String),

    #[error("definition '{0}' is not an enum or flags set")]
    NotAnEnum(String),

    #[error("operation '{0}' is not defined")]
    UnknownOperation(String),

    #[error("can't resolve attribute set for op '{0}'")]
    OpWithoutAttrSet(String),

    #[error("can't parse directional ops ({0})")]
    Directional(String),

    #[error("using attr set as root and nested not supported - {0}")]
    RootAndNested(String),

    #[error("inheriting different members not supported ({set}: {existing:?} vs {new:?})")]
    InheritanceConflict {
        set: String,
        existing: Vec<String>,
        new: Vec<String>,
    },

    #[error("dependency cycle among nested attribute sets: {}", .0.join(", "))]
    NestedCycle(Vec<String>),

    #[error("can't get value range for a noncontiguous enum '{0}'")]
    NonContiguousEnum(String),

    #[error("{what} not implemented for type '{kind}' ({set}.{attr})")]
    Unsupported {
        what: &'static str,
        kind: String,
        set: String,
        attr: String,
    },

    #[error("for a global policy all ops must use the same set")]
    GlobalPolicySet,

    #[error("only notifications with consistent types supported ({0})")]
    InconsistentNotification(String),

    #[error("dump of op '{0}' has no reply")]
    DumpWithoutReply(String),

    #[error("policy for '{0}' has no attributes")]
    EmptyPolicy(String),
}
