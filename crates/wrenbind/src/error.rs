//! Error types for binding, marshalling, module loading and sessions

use thiserror::Error;
use wrenbind_vm::{TraceFrame, VmError};

/// Errors raised while declaring or compiling bindings
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindError {
    /// A class or member with the same script name already exists
    #[error("Duplicate binding: {0}")]
    DuplicateBinding(String),

    /// A signature mentions a host type whose class has not been declared yet
    #[error("Unknown type '{type_name}' in {context}; declare its class first")]
    UnknownType { type_name: String, context: String },

    #[error("Bindings cannot be declared after the session has been armed")]
    DeclarationAfterArm,

    /// An instance member does not take the bound object as its first parameter
    #[error("Instance member '{member}' of class '{class}' must take Obj<{class}> as its first parameter")]
    InvalidReceiver { class: String, member: String },

    #[error("'{0}' is not a valid script name")]
    InvalidName(String),

    #[error("Invalid member '{member}' in class '{class}': {reason}")]
    InvalidMember {
        class: String,
        member: String,
        reason: String,
    },

    /// The VM asked for a foreign method the dispatch table does not contain
    #[error("No binding for foreign method {class}.{signature} in module '{module}'")]
    UnboundMethod {
        module: String,
        class: String,
        signature: String,
    },
}

/// Errors converting values between slots and host types
#[derive(Debug, Error)]
pub enum MarshalError {
    #[error("expected {expected}, got {found}")]
    TypeMismatch { expected: String, found: String },

    #[error("expected {expected} arguments, got {found}")]
    ArityMismatch { expected: usize, found: usize },

    /// A host object whose type is not bound to any script class
    #[error("type '{0}' is not bound to a script class")]
    UnknownType(String),

    #[error("{value} is out of range for {target}")]
    OutOfRange { value: String, target: String },

    #[error(transparent)]
    Vm(#[from] VmError),
}

impl MarshalError {
    /// Label used when the error aborts a script fiber.
    pub fn kind(&self) -> &'static str {
        match self {
            MarshalError::TypeMismatch { .. } => "TypeMismatch",
            MarshalError::ArityMismatch { .. } => "ArityMismatch",
            MarshalError::UnknownType(_) => "UnknownType",
            MarshalError::OutOfRange { .. } => "OutOfRange",
            MarshalError::Vm(_) => "VmError",
        }
    }
}

/// Errors resolving or loading imported modules
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("Imports are disabled")]
    ImportsDisabled,

    #[error("Module '{0}' not found")]
    NotFound(String),

    #[error("Failed to read module '{name}': {message}")]
    Io { name: String, message: String },
}

/// Errors surfaced by [`crate::Session`]
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Bind(#[from] BindError),

    #[error(transparent)]
    Marshal(MarshalError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("Session is not armed; call arm() before executing scripts")]
    NotArmed,

    #[error("Compile error in module '{module}': {message}")]
    Compile { module: String, message: String },

    /// An uncaught script error
    #[error("Script error: {message}")]
    VmExecution {
        message: String,
        trace: Vec<TraceFrame>,
    },

    #[error("Handle has been released")]
    Released,

    #[error("VM error: {0}")]
    Vm(VmError),
}

impl From<VmError> for SessionError {
    fn from(error: VmError) -> Self {
        match error {
            VmError::Compile { module, message } => SessionError::Compile { module, message },
            VmError::Runtime { message, trace } => SessionError::VmExecution { message, trace },
            VmError::ReleasedHandle => SessionError::Released,
            other => SessionError::Vm(other),
        }
    }
}

impl From<MarshalError> for SessionError {
    fn from(error: MarshalError) -> Self {
        match error {
            MarshalError::Vm(VmError::ReleasedHandle) => SessionError::Released,
            other => SessionError::Marshal(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vm_errors_map_to_session_errors() {
        let error: SessionError = VmError::Runtime {
            message: "boom".to_string(),
            trace: Vec::new(),
        }
        .into();
        assert!(matches!(error, SessionError::VmExecution { ref message, .. } if message == "boom"));

        let error: SessionError = VmError::ReleasedHandle.into();
        assert!(matches!(error, SessionError::Released));

        let error: SessionError = VmError::Reentrant.into();
        assert!(matches!(error, SessionError::Vm(VmError::Reentrant)));
    }

    #[test]
    fn test_error_messages() {
        let error = BindError::InvalidReceiver {
            class: "Point".to_string(),
            member: "length".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Instance member 'length' of class 'Point' must take Obj<Point> as its first parameter"
        );

        let error = MarshalError::TypeMismatch {
            expected: "Int".to_string(),
            found: "String".to_string(),
        };
        assert_eq!(error.to_string(), "expected Int, got String");
        assert_eq!(error.kind(), "TypeMismatch");
        assert_eq!(LoadError::ImportsDisabled.to_string(), "Imports are disabled");
    }
}
