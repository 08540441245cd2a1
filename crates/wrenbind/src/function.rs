//! Typed host functions
//!
//! Any `Fn(A1, .., An) -> R` whose arguments implement [`FromSlot`] and whose
//! result implements [`IntoHostResult`] can be bound as a script method. The
//! conversion produces a [`HostFn`] that decodes arguments from the slots,
//! invokes the function with panics caught, and encodes the result into
//! slot 0.

use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::rc::Rc;

use crate::error::MarshalError;
use crate::marshal::{FromSlot, Slots, Tagged, ToSlot};
use crate::types::{short_type_name, TypeTag};

/// Type-erased host function operating on slots.
pub type HostFn = Rc<dyn Fn(&mut Slots<'_>) -> Result<(), CallFailure>>;

// ============================================================================
// Host errors
// ============================================================================

/// An error raised by host code during a script call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostError {
    /// Short label such as the error type name or `panic`
    pub kind: String,
    pub message: String,
}

impl HostError {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// Build an error from a caught panic payload.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };
        Self::new("panic", message)
    }
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.message, self.kind)
    }
}

impl std::error::Error for HostError {}

/// Why a foreign call did not produce a value
#[derive(Debug)]
pub enum CallFailure {
    /// The script supplied a different number of arguments
    Arity { expected: usize, found: usize },
    /// Argument in `slot` could not be converted
    Argument { slot: usize, error: MarshalError },
    /// The host function failed or panicked
    Host(HostError),
    /// The result could not be converted back
    Return(MarshalError),
}

impl CallFailure {
    pub fn kind(&self) -> &str {
        match self {
            CallFailure::Arity { .. } => "ArityMismatch",
            CallFailure::Argument { error, .. } | CallFailure::Return(error) => error.kind(),
            CallFailure::Host(error) => &error.kind,
        }
    }

    /// Message handed to the aborted fiber for a call to `method`.
    pub fn describe(&self, method: &str) -> String {
        let detail = match self {
            CallFailure::Arity { expected, found } => {
                format!("{}: expected {} arguments, got {}", method, expected, found)
            }
            CallFailure::Argument { slot: 0, error } => format!("{}: receiver {}", method, error),
            CallFailure::Argument { slot, error } => {
                format!("{}: argument {} {}", method, slot, error)
            }
            CallFailure::Host(error) => error.message.clone(),
            CallFailure::Return(error) => format!("{}: return value {}", method, error),
        };
        format!("{} [{}]", detail, self.kind())
    }
}

// ============================================================================
// Results
// ============================================================================

/// Return values of host functions.
///
/// Plain values always succeed. `Result<T, E>` maps `Err` to a [`HostError`]
/// labelled with the short type name of `E`.
pub trait IntoHostResult {
    type Value: ToSlot;

    fn type_tag() -> TypeTag;

    fn into_host_result(self) -> Result<Self::Value, HostError>;
}

impl<T: ToSlot> IntoHostResult for T {
    type Value = T;

    fn type_tag() -> TypeTag {
        <T as Tagged>::type_tag()
    }

    fn into_host_result(self) -> Result<T, HostError> {
        Ok(self)
    }
}

impl<T: ToSlot, E: fmt::Display> IntoHostResult for Result<T, E> {
    type Value = T;

    fn type_tag() -> TypeTag {
        <T as Tagged>::type_tag()
    }

    fn into_host_result(self) -> Result<T, HostError> {
        self.map_err(|error| {
            HostError::new(short_type_name(std::any::type_name::<E>()), error.to_string())
        })
    }
}

// ============================================================================
// Function conversion
// ============================================================================

/// Host callables that can be bound as script methods.
///
/// `Args` is the tuple of parameter types; it only exists to keep the
/// per-arity implementations apart.
pub trait IntoForeignFn<Args, R>: 'static {
    fn param_tags() -> Vec<TypeTag>;

    fn return_tag() -> TypeTag;

    /// Erase the function. With `receiver`, the first parameter is read from
    /// slot 0; otherwise parameters start at slot 1.
    fn into_host_fn(self, receiver: bool) -> HostFn;
}

macro_rules! impl_into_foreign_fn {
    ($($arg:ident),*) => {
        impl<F, R, $($arg,)*> IntoForeignFn<($($arg,)*), R> for F
        where
            F: Fn($($arg),*) -> R + 'static,
            R: IntoHostResult,
            $($arg: FromSlot,)*
        {
            fn param_tags() -> Vec<TypeTag> {
                vec![$(<$arg as Tagged>::type_tag()),*]
            }

            fn return_tag() -> TypeTag {
                <R as IntoHostResult>::type_tag()
            }

            #[allow(non_snake_case, unused_mut, unused_variables, unused_assignments)]
            fn into_host_fn(self, receiver: bool) -> HostFn {
                Rc::new(move |slots: &mut Slots<'_>| {
                    let mut slot = if receiver { 0 } else { 1 };
                    $(
                        let $arg = $arg::from_slot(slots, slot)
                            .map_err(|error| CallFailure::Argument { slot, error })?;
                        slot += 1;
                    )*
                    let result = std::panic::catch_unwind(AssertUnwindSafe(|| (self)($($arg),*)))
                        .map_err(|payload| CallFailure::Host(HostError::from_panic(payload)))?;
                    let value = result.into_host_result().map_err(CallFailure::Host)?;
                    value.to_slot(slots, 0).map_err(CallFailure::Return)
                })
            }
        }
    };
}

impl_into_foreign_fn!();
impl_into_foreign_fn!(A1);
impl_into_foreign_fn!(A1, A2);
impl_into_foreign_fn!(A1, A2, A3);
impl_into_foreign_fn!(A1, A2, A3, A4);
impl_into_foreign_fn!(A1, A2, A3, A4, A5);
impl_into_foreign_fn!(A1, A2, A3, A4, A5, A6);
impl_into_foreign_fn!(A1, A2, A3, A4, A5, A6, A7);
impl_into_foreign_fn!(A1, A2, A3, A4, A5, A6, A7, A8);
