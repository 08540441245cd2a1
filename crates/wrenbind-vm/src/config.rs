//! Host hooks a VM is created with.

use std::rc::Rc;

use crate::error::ErrorReport;
use crate::vm::Vm;

/// Implementation of a `foreign` method.
///
/// Slot 0 holds the receiver and slots `1..=arity` the arguments when the
/// function is entered; whatever slot 0 holds when it returns is the result.
pub type ForeignMethodFn = Rc<dyn Fn(&mut Vm)>;

/// Receives text written by `System.print` and `System.write`.
pub type WriteFn = Box<dyn Fn(&str)>;

/// `(importer, requested) -> resolved`; `None` means the module does not exist.
pub type ResolveModuleFn = Box<dyn Fn(&str, &str) -> Option<String>>;

/// `resolved name -> source`, or a description of why it could not be loaded.
pub type LoadModuleFn = Box<dyn Fn(&str) -> Result<String, String>>;

/// `(module, class, is_static, signature) -> implementation`
pub type BindForeignMethodFn = Box<dyn Fn(&str, &str, bool, &str) -> Option<ForeignMethodFn>>;

pub type ErrorFn = Box<dyn Fn(&ErrorReport)>;

/// Host hooks. Every hook is optional.
///
/// Without `write` output goes to stdout. Without `resolve_module` import
/// names are used unchanged. Without `load_module` every import fails.
#[derive(Default)]
pub struct VmConfig {
    pub write: Option<WriteFn>,
    pub resolve_module: Option<ResolveModuleFn>,
    pub load_module: Option<LoadModuleFn>,
    pub bind_foreign_method: Option<BindForeignMethodFn>,
    pub error: Option<ErrorFn>,
}

impl VmConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_write(mut self, write: impl Fn(&str) + 'static) -> Self {
        self.write = Some(Box::new(write));
        self
    }

    pub fn with_resolve_module(
        mut self,
        resolve: impl Fn(&str, &str) -> Option<String> + 'static,
    ) -> Self {
        self.resolve_module = Some(Box::new(resolve));
        self
    }

    pub fn with_load_module(
        mut self,
        load: impl Fn(&str) -> Result<String, String> + 'static,
    ) -> Self {
        self.load_module = Some(Box::new(load));
        self
    }

    pub fn with_foreign_methods(
        mut self,
        bind: impl Fn(&str, &str, bool, &str) -> Option<ForeignMethodFn> + 'static,
    ) -> Self {
        self.bind_foreign_method = Some(Box::new(bind));
        self
    }

    pub fn with_error(mut self, error: impl Fn(&ErrorReport) + 'static) -> Self {
        self.error = Some(Box::new(error));
        self
    }
}
