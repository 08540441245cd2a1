//! VM error types.

/// Runtime type of a slot's value, as seen through the embedding API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotType {
    Bool,
    Num,
    Foreign,
    List,
    Map,
    Null,
    String,
    /// Any other object (instances, classes, functions, fibers, ranges)
    Unknown,
}

/// One entry of a runtime error's stack trace, innermost first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceFrame {
    pub module: String,
    pub line: u32,
    pub function: String,
}

/// Diagnostics delivered to the configured error hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorReport {
    Compile {
        module: String,
        line: u32,
        message: String,
    },
    Runtime {
        message: String,
    },
    StackTrace {
        module: String,
        line: u32,
        function: String,
    },
}

/// Errors returned by the embedding API.
#[derive(Debug, thiserror::Error)]
pub enum VmError {
    /// Source failed to lex or parse
    #[error("Compile error in module '{module}': {message}")]
    Compile { module: String, message: String },

    /// An uncaught runtime error unwound to the API entry point
    #[error("Runtime error: {message}")]
    Runtime {
        message: String,
        trace: Vec<TraceFrame>,
    },

    /// `interpret` or `call` was invoked from inside a foreign method
    #[error("The VM cannot be re-entered from a foreign method")]
    Reentrant,

    #[error("Module '{0}' is not loaded")]
    UnknownModule(String),

    #[error("Variable '{name}' is not defined in module '{module}'")]
    UnknownVariable { module: String, name: String },

    #[error("Slot {slot} is out of range ({count} slots available)")]
    SlotOutOfRange { slot: usize, count: usize },

    #[error("Slot {slot} holds {found:?}, expected {expected:?}")]
    SlotType {
        slot: usize,
        expected: SlotType,
        found: SlotType,
    },

    #[error("Index {index} is out of bounds for a list of {count} elements")]
    IndexOutOfRange { index: i64, count: usize },

    #[error("Value in slot {0} cannot be used as a map key")]
    InvalidMapKey(usize),

    #[error("Handle has already been released")]
    ReleasedHandle,

    #[error("Handle does not refer to a method signature")]
    NotCallHandle,

    #[error("No foreign method is currently executing")]
    NotInForeignCall,
}
