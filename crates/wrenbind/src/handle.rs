//! Durable references to script values and cached call handles
//!
//! A [`WrenRef`] keeps a script value alive across calls. Clones share one VM
//! handle; when the last clone is dropped the handle is queued and the
//! session releases it the next time it touches the VM. Explicit release
//! through [`crate::Session::release`] invalidates every clone at once.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use wrenbind_vm::{Handle, Vm};

use crate::error::MarshalError;
use crate::marshal::{Slots, ToSlot};

// ============================================================================
// Release queue
// ============================================================================

/// Handles whose last host reference was dropped.
#[derive(Debug, Clone, Default)]
pub(crate) struct ReleaseQueue(Rc<RefCell<Vec<Handle>>>);

impl ReleaseQueue {
    fn push(&self, handle: Handle) {
        self.0.borrow_mut().push(handle);
    }

    /// Release every queued handle, returning how many were freed.
    pub(crate) fn drain(&self, vm: &mut Vm) -> usize {
        let pending = std::mem::take(&mut *self.0.borrow_mut());
        let count = pending.len();
        for handle in pending {
            if let Err(error) = vm.release_handle(handle) {
                tracing::warn!(handle = handle.id(), %error, "failed to release dropped handle");
            }
        }
        if count > 0 {
            tracing::trace!(count, "released dropped handles");
        }
        count
    }

    #[cfg(test)]
    pub(crate) fn pending(&self) -> usize {
        self.0.borrow().len()
    }
}

// ============================================================================
// WrenRef
// ============================================================================

struct RefInner {
    handle: Handle,
    released: Cell<bool>,
    queue: ReleaseQueue,
}

impl Drop for RefInner {
    fn drop(&mut self) {
        if !self.released.get() {
            self.queue.push(self.handle);
        }
    }
}

/// Handle to a script value owned by the host
#[derive(Clone)]
pub struct WrenRef {
    inner: Rc<RefInner>,
}

impl WrenRef {
    pub(crate) fn new(handle: Handle, queue: &ReleaseQueue) -> Self {
        Self {
            inner: Rc::new(RefInner {
                handle,
                released: Cell::new(false),
                queue: queue.clone(),
            }),
        }
    }

    pub fn handle(&self) -> Handle {
        self.inner.handle
    }

    pub fn is_released(&self) -> bool {
        self.inner.released.get()
    }

    /// Mark the shared handle released. Returns false if it already was.
    pub(crate) fn mark_released(&self) -> bool {
        !self.inner.released.replace(true)
    }
}

impl PartialEq for WrenRef {
    fn eq(&self, other: &Self) -> bool {
        self.inner.handle == other.inner.handle
    }
}

impl Eq for WrenRef {}

impl fmt::Debug for WrenRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WrenRef")
            .field("handle", &self.inner.handle.id())
            .field("released", &self.is_released())
            .finish()
    }
}

// ============================================================================
// Call handles
// ============================================================================

/// A compiled method signature, reusable across receivers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallHandle {
    signature: Rc<str>,
    arity: usize,
    handle: Handle,
}

impl CallHandle {
    pub(crate) fn new(signature: &str, handle: Handle) -> Self {
        Self {
            signature: signature.into(),
            arity: wrenbind_vm::signature::arity(signature),
            handle,
        }
    }

    pub fn signature(&self) -> &str {
        &self.signature
    }

    /// Number of arguments the signature takes, receiver excluded.
    pub fn arity(&self) -> usize {
        self.arity
    }

    pub(crate) fn handle(&self) -> Handle {
        self.handle
    }
}

// ============================================================================
// Argument packs
// ============================================================================

/// Host values passed as the arguments of a script call.
pub trait ArgPack {
    fn arity(&self) -> usize;

    /// Write the arguments into consecutive slots starting at `first`.
    fn push(self, slots: &mut Slots<'_>, first: usize) -> Result<(), MarshalError>;
}

macro_rules! impl_arg_pack {
    ($count:expr $(, $arg:ident)*) => {
        impl<$($arg: ToSlot,)*> ArgPack for ($($arg,)*) {
            fn arity(&self) -> usize {
                $count
            }

            #[allow(non_snake_case, unused_variables, unused_mut, unused_assignments)]
            fn push(self, slots: &mut Slots<'_>, first: usize) -> Result<(), MarshalError> {
                let ($($arg,)*) = self;
                let mut slot = first;
                $(
                    $arg.to_slot(slots, slot)?;
                    slot += 1;
                )*
                Ok(())
            }
        }
    };
}

impl_arg_pack!(0);
impl_arg_pack!(1, A1);
impl_arg_pack!(2, A1, A2);
impl_arg_pack!(3, A1, A2, A3);
impl_arg_pack!(4, A1, A2, A3, A4);
impl_arg_pack!(5, A1, A2, A3, A4, A5);
impl_arg_pack!(6, A1, A2, A3, A4, A5, A6);
