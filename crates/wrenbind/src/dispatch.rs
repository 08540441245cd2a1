//! Foreign call dispatch
//!
//! The VM resolves every `foreign` member once, when its class is defined,
//! by asking for `(module, class, static, signature)`. The dispatch table
//! answers with the entry the binding compiler produced; calls then decode
//! arguments, invoke the host function and encode the result. Any failure
//! aborts the calling fiber with a descriptive message.

use std::backtrace::Backtrace;
use std::rc::Rc;

use rustc_hash::FxHashMap;
use wrenbind_vm::{ForeignMethodFn, Vm};

use crate::error::BindError;
use crate::function::{CallFailure, HostFn};
use crate::handle::ReleaseQueue;
use crate::marshal::Slots;
use crate::registry::TypeRegistry;
use crate::types::TypeTag;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DispatchKey {
    pub module: String,
    pub class: String,
    pub is_static: bool,
    pub signature: String,
}

/// A bound host function and its script-visible signature
pub struct DispatchEntry {
    /// `Class.signature`, used in diagnostics
    pub label: String,
    pub host_name: String,
    /// Script arguments, receiver excluded
    pub arity: usize,
    pub params: Vec<TypeTag>,
    pub ret: TypeTag,
    pub inline: bool,
    pub(crate) func: HostFn,
}

#[derive(Default, Clone)]
pub struct DispatchTable {
    entries: FxHashMap<DispatchKey, Rc<DispatchEntry>>,
}

impl DispatchTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, key: DispatchKey, entry: DispatchEntry) {
        self.entries.insert(key, Rc::new(entry));
    }

    pub fn lookup(
        &self,
        module: &str,
        class: &str,
        is_static: bool,
        signature: &str,
    ) -> Result<&Rc<DispatchEntry>, BindError> {
        let key = DispatchKey {
            module: module.to_string(),
            class: class.to_string(),
            is_static,
            signature: signature.to_string(),
        };
        self.entries.get(&key).ok_or_else(|| BindError::UnboundMethod {
            module: module.to_string(),
            class: class.to_string(),
            signature: signature.to_string(),
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// State shared by every foreign call once the session is armed
pub(crate) struct Dispatcher {
    pub(crate) types: TypeRegistry,
    pub(crate) refs: ReleaseQueue,
    backtraces: bool,
}

impl Dispatcher {
    pub(crate) fn new(types: TypeRegistry, refs: ReleaseQueue, backtraces: bool) -> Self {
        Self {
            types,
            refs,
            backtraces,
        }
    }

    /// Wrap `entry` as a VM foreign method.
    pub(crate) fn foreign_method(self: &Rc<Self>, entry: Rc<DispatchEntry>) -> ForeignMethodFn {
        let dispatcher = self.clone();
        Rc::new(move |vm: &mut Vm| dispatcher.dispatch(&entry, vm))
    }

    pub(crate) fn dispatch(&self, entry: &DispatchEntry, vm: &mut Vm) {
        let supplied = vm.slot_count().saturating_sub(1);
        let outcome = if supplied != entry.arity {
            Err(CallFailure::Arity {
                expected: entry.arity,
                found: supplied,
            })
        } else {
            let mut slots = Slots::new(vm, &self.types, &self.refs);
            (entry.func)(&mut slots)
        };

        match outcome {
            Ok(()) => tracing::trace!(method = %entry.label, "foreign call"),
            Err(failure) => self.abort(entry, failure, vm),
        }
    }

    fn abort(&self, entry: &DispatchEntry, failure: CallFailure, vm: &mut Vm) {
        let mut message = failure.describe(&entry.label);
        if self.backtraces && matches!(failure, CallFailure::Host(_)) {
            message.push('\n');
            message.push_str(&Backtrace::force_capture().to_string());
        }
        tracing::debug!(method = %entry.label, kind = failure.kind(), "foreign call failed");

        let aborted = vm
            .set_slot_string(0, &message)
            .and_then(|()| vm.abort_fiber(0));
        if let Err(error) = aborted {
            tracing::error!(method = %entry.label, %error, "could not abort fiber");
        }
    }
}
