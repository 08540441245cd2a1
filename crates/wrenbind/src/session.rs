//! Binding session
//!
//! A session moves through three states:
//!
//! ```text
//! Declaring ──arm()──▶ Armed ──run()/call()──▶ Executing
//! ```
//!
//! While declaring, modules of bindings are compiled and staged. Arming
//! creates the VM, runs the generated glue of every module in declaration
//! order and freezes the registry. After that only scripts and calls are
//! accepted.

use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

use rustc_hash::FxHashMap;
use wrenbind_vm::{ErrorReport, Vm, VmConfig, VmError};

use crate::compiler::{self, ClassSummary, CompiledModule};
use crate::config::{Config, LoadHook, ResolveHook, SessionOptions};
use crate::decl::ModuleDecl;
use crate::dispatch::{DispatchTable, Dispatcher};
use crate::error::{BindError, LoadError, MarshalError, SessionError};
use crate::handle::{ArgPack, CallHandle, ReleaseQueue, WrenRef};
use crate::marshal::{FromSlot, Slots};
use crate::registry::TypeRegistry;
use crate::resolver::{FsLoader, ModuleLoader, NoImports};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Accepting binding declarations
    Declaring,
    /// Glue loaded, nothing executed yet
    Armed,
    /// Scripts have been run
    Executing,
}

struct Runtime {
    vm: Vm,
    dispatcher: Rc<Dispatcher>,
}

/// Owns a VM together with the bindings exposed to it
pub struct Session {
    state: SessionState,
    config: Config,
    registry: TypeRegistry,
    table: DispatchTable,
    modules: Vec<CompiledModule>,
    refs: ReleaseQueue,
    unbound: Rc<RefCell<Vec<BindError>>>,
    call_handles: FxHashMap<String, CallHandle>,
    runtime: Option<Runtime>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        Self {
            state: SessionState::Declaring,
            config,
            registry: TypeRegistry::new(),
            table: DispatchTable::new(),
            modules: Vec::new(),
            refs: ReleaseQueue::default(),
            unbound: Rc::new(RefCell::new(Vec::new())),
            call_handles: FxHashMap::default(),
            runtime: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn options(&self) -> &SessionOptions {
        &self.config.options
    }

    // ========================================================================
    // Declaring
    // ========================================================================

    /// Compile and stage a module of bindings.
    ///
    /// Nothing is registered when compilation fails.
    pub fn declare(&mut self, module: ModuleDecl) -> Result<(), SessionError> {
        if self.state != SessionState::Declaring {
            return Err(BindError::DeclarationAfterArm.into());
        }

        let mut staged = self.registry.clone();
        let mut compiled = compiler::compile(module, &mut staged)?;
        self.registry = staged;
        for (key, entry) in compiled.entries.drain(..) {
            self.table.insert(key, entry);
        }
        self.modules.push(compiled);
        Ok(())
    }

    /// Create the VM and load the glue of every declared module.
    ///
    /// Arming an armed session does nothing.
    pub fn arm(&mut self) -> Result<(), SessionError> {
        if self.state != SessionState::Declaring {
            return Ok(());
        }

        let options = &self.config.options;
        let dispatcher = Rc::new(Dispatcher::new(
            self.registry.clone(),
            self.refs.clone(),
            options.host_backtraces,
        ));
        let mut vm = Vm::new(self.vm_config(&dispatcher));

        for module in &self.modules {
            if options.dump_glue {
                tracing::info!(target: "wrenbind::glue", module = %module.name, "\n{}", module.glue);
            }
            if options.dump_classes {
                for class in &module.classes {
                    tracing::info!(
                        target: "wrenbind::classes",
                        module = %module.name,
                        class = %class.name,
                        kind = ?class.kind,
                        members = ?class.members,
                        "bound class"
                    );
                }
            }
            self.unbound.borrow_mut().clear();
            let result = vm.interpret(&module.name, &module.glue);
            settle(&self.unbound, result)?;
        }

        tracing::info!(
            modules = self.modules.len(),
            classes = self.registry.len(),
            methods = self.table.len(),
            "session armed"
        );
        self.runtime = Some(Runtime { vm, dispatcher });
        self.state = SessionState::Armed;
        Ok(())
    }

    fn vm_config(&self, dispatcher: &Rc<Dispatcher>) -> VmConfig {
        let config = &self.config;
        let loader: Rc<dyn ModuleLoader> = match &config.loader {
            Some(loader) => loader.clone(),
            None if !config.options.module_dirs.is_empty() => {
                Rc::new(FsLoader::new(config.options.module_dirs.clone()))
            }
            None => Rc::new(NoImports),
        };
        let resolve: ResolveHook = match &config.resolve_module {
            Some(hook) => hook.clone(),
            None => {
                let loader = loader.clone();
                Rc::new(move |importer: &str, name: &str| loader.resolve(importer, name))
            }
        };
        let load: LoadHook = match &config.load_module {
            Some(hook) => hook.clone(),
            None => Rc::new(move |name: &str| loader.load(name)),
        };

        let table = Rc::new(self.table.clone());
        let dispatcher = dispatcher.clone();
        let unbound = self.unbound.clone();

        let vm_config = VmConfig::new()
            .with_resolve_module(move |importer: &str, name: &str| {
                let resolved = resolve(importer, name);
                if resolved.is_empty() {
                    tracing::debug!(importer, module = name, "import not resolved");
                    None
                } else {
                    Some(resolved)
                }
            })
            .with_load_module(move |name: &str| {
                load(name).map_err(|error| {
                    tracing::debug!(module = name, %error, "import failed");
                    error.to_string()
                })
            })
            .with_foreign_methods(move |module, class, is_static, signature| {
                match table.lookup(module, class, is_static, signature) {
                    Ok(entry) => Some(dispatcher.foreign_method(entry.clone())),
                    Err(error) => {
                        tracing::error!(%error, "foreign method has no binding");
                        unbound.borrow_mut().push(error);
                        None
                    }
                }
            })
            .with_error(|report| match report {
                ErrorReport::Compile {
                    module,
                    line,
                    message,
                } => tracing::error!(module = %module, line, "{}", message),
                ErrorReport::Runtime { message } => tracing::error!("{}", message),
                ErrorReport::StackTrace {
                    module,
                    line,
                    function,
                } => tracing::error!(module = %module, line, function = %function, "at"),
            });

        match &config.write {
            Some(write) => {
                let write = write.clone();
                vm_config.with_write(move |text| write(text))
            }
            None => vm_config,
        }
    }

    // ========================================================================
    // Executing
    // ========================================================================

    /// Interpret `source` as module `module`.
    pub fn run(&mut self, module: &str, source: &str) -> Result<(), SessionError> {
        let runtime = self.runtime.as_mut().ok_or(SessionError::NotArmed)?;
        self.state = SessionState::Executing;
        self.refs.drain(&mut runtime.vm);
        self.unbound.borrow_mut().clear();
        let result = runtime.vm.interpret(module, source);
        settle(&self.unbound, result)
    }

    /// Read and interpret a script file as module `module`.
    pub fn run_file(&mut self, module: &str, path: &Path) -> Result<(), SessionError> {
        let source = std::fs::read_to_string(path).map_err(|e| LoadError::Io {
            name: path.display().to_string(),
            message: e.to_string(),
        })?;
        self.run(module, &source)
    }

    pub fn has_variable(&self, module: &str, name: &str) -> bool {
        self.runtime
            .as_ref()
            .is_some_and(|runtime| runtime.vm.has_variable(module, name))
    }

    /// Read top-level variable `name` of `module` as a host value.
    pub fn get<T: FromSlot>(&mut self, module: &str, name: &str) -> Result<T, SessionError> {
        let runtime = self.runtime.as_mut().ok_or(SessionError::NotArmed)?;
        runtime.vm.ensure_slots(1);
        runtime.vm.get_variable(module, name, 0)?;
        let mut slots = Slots::new(&mut runtime.vm, &runtime.dispatcher.types, &self.refs);
        Ok(T::from_slot(&mut slots, 0)?)
    }

    /// Hold on to top-level variable `name` of `module`.
    pub fn get_ref(&mut self, module: &str, name: &str) -> Result<WrenRef, SessionError> {
        self.get(module, name)
    }

    /// A call handle for `signature`, created once and reused afterwards.
    pub fn call_handle(&mut self, signature: &str) -> Result<CallHandle, SessionError> {
        let runtime = self.runtime.as_mut().ok_or(SessionError::NotArmed)?;
        if let Some(handle) = self.call_handles.get(signature) {
            return Ok(handle.clone());
        }
        let handle = CallHandle::new(signature, runtime.vm.make_call_handle(signature));
        self.call_handles
            .insert(signature.to_string(), handle.clone());
        Ok(handle)
    }

    /// Invoke `method` on `receiver` with `args`.
    pub fn call<R: FromSlot>(
        &mut self,
        receiver: &WrenRef,
        method: &CallHandle,
        args: impl ArgPack,
    ) -> Result<R, SessionError> {
        if receiver.is_released() {
            return Err(SessionError::Released);
        }
        if args.arity() != method.arity() {
            return Err(MarshalError::ArityMismatch {
                expected: method.arity(),
                found: args.arity(),
            }
            .into());
        }

        let runtime = self.runtime.as_mut().ok_or(SessionError::NotArmed)?;
        self.state = SessionState::Executing;
        self.refs.drain(&mut runtime.vm);
        self.unbound.borrow_mut().clear();

        let vm = &mut runtime.vm;
        vm.ensure_slots(method.arity() + 1);
        vm.set_slot_handle(0, receiver.handle())?;
        args.push(&mut Slots::new(vm, &runtime.dispatcher.types, &self.refs), 1)?;
        let result = vm.call(method.handle());
        settle(&self.unbound, result)?;

        let mut slots = Slots::new(vm, &runtime.dispatcher.types, &self.refs);
        Ok(R::from_slot(&mut slots, 0)?)
    }

    /// Invoke the method named by `signature`, caching its call handle.
    pub fn call_method<R: FromSlot>(
        &mut self,
        receiver: &WrenRef,
        signature: &str,
        args: impl ArgPack,
    ) -> Result<R, SessionError> {
        let method = self.call_handle(signature)?;
        self.call(receiver, &method, args)
    }

    /// Release `value` and every clone of it. Releasing twice is a no-op.
    pub fn release(&mut self, value: &WrenRef) -> Result<(), SessionError> {
        if !value.mark_released() {
            return Ok(());
        }
        if let Some(runtime) = self.runtime.as_mut() {
            runtime.vm.release_handle(value.handle())?;
            tracing::trace!(handle = value.handle().id(), "released handle");
        }
        Ok(())
    }

    /// Free handles whose last host reference has been dropped.
    pub fn flush_releases(&mut self) -> usize {
        match self.runtime.as_mut() {
            Some(runtime) => self.refs.drain(&mut runtime.vm),
            None => 0,
        }
    }

    /// Number of VM handles currently held, call handles included.
    pub fn live_handles(&mut self) -> usize {
        self.flush_releases();
        self.runtime
            .as_ref()
            .map_or(0, |runtime| runtime.vm.live_handles())
    }

    // ========================================================================
    // Introspection
    // ========================================================================

    /// Glue source generated for `module`, if any bindings target it.
    pub fn glue(&self, module: &str) -> Option<String> {
        let chunks: Vec<&str> = self
            .modules
            .iter()
            .filter(|compiled| compiled.name == module)
            .map(|compiled| compiled.glue.as_str())
            .collect();
        if chunks.is_empty() {
            None
        } else {
            Some(chunks.concat())
        }
    }

    /// Names of modules with bindings, in declaration order.
    pub fn modules(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for compiled in &self.modules {
            if !names.contains(&compiled.name.as_str()) {
                names.push(&compiled.name);
            }
        }
        names
    }

    /// Every bound class with the module it lives in.
    pub fn classes(&self) -> impl Iterator<Item = (&str, &ClassSummary)> {
        self.modules.iter().flat_map(|compiled| {
            compiled
                .classes
                .iter()
                .map(move |class| (compiled.name.as_str(), class))
        })
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub fn dispatch_table(&self) -> &DispatchTable {
        &self.table
    }
}

/// Outcome of one VM entry. A foreign member left unbound while it ran fails
/// the entry even when the script caught the resulting error.
fn settle(unbound: &RefCell<Vec<BindError>>, result: Result<(), VmError>) -> Result<(), SessionError> {
    let recorded = unbound.borrow_mut().drain(..).next();
    match recorded {
        Some(bind_error) => Err(bind_error.into()),
        None => Ok(result?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decl::ClassDecl;

    fn math_session() -> Session {
        let mut session = Session::new();
        session
            .declare(ModuleDecl::new("main").class(
                ClassDecl::namespace("Math").proc("add", |a: i64, b: i64| a + b),
            ))
            .unwrap();
        session
    }

    #[test]
    fn test_state_transitions() {
        let mut session = math_session();
        assert_eq!(session.state(), SessionState::Declaring);
        assert!(matches!(session.run("main", "var x = 1"), Err(SessionError::NotArmed)));

        session.arm().unwrap();
        assert_eq!(session.state(), SessionState::Armed);
        session.run("main", "var x = Math.add(1, 2)").unwrap();
        assert_eq!(session.state(), SessionState::Executing);
        assert_eq!(session.get::<i64>("main", "x").unwrap(), 3);
    }

    #[test]
    fn test_declaration_after_arm() {
        let mut session = math_session();
        session.arm().unwrap();
        let result = session.declare(ModuleDecl::new("other"));
        assert!(matches!(
            result,
            Err(SessionError::Bind(BindError::DeclarationAfterArm))
        ));
    }

    #[test]
    fn test_failed_declaration_registers_nothing() {
        let mut session = Session::new();
        let result = session.declare(
            ModuleDecl::new("main")
                .class(ClassDecl::namespace("Good").proc("ok", || 1i64))
                .class(ClassDecl::namespace("Bad").proc("no way", || 1i64)),
        );
        assert!(result.is_err());
        assert!(session.registry().is_empty());
        assert!(session.dispatch_table().is_empty());
        assert!(session.glue("main").is_none());
    }

    #[test]
    fn test_unbound_foreign_method_is_reported() {
        let mut session = math_session();
        session.arm().unwrap();
        let result = session.run("main", "class Rogue {\n  foreign static missing()\n}\n");
        assert!(matches!(
            result,
            Err(SessionError::Bind(BindError::UnboundMethod { ref signature, .. })) if signature == "missing()"
        ));
    }

    #[test]
    fn test_caught_unbound_method_still_fails_the_run() {
        let mut session = math_session();
        session.arm().unwrap();
        let result = session.run(
            "main",
            "var f = Fiber.new {\n  class Rogue {\n    foreign static missing()\n  }\n}\nf.try()\n",
        );
        assert!(matches!(
            result,
            Err(SessionError::Bind(BindError::UnboundMethod { ref class, .. })) if class == "Rogue"
        ));

        // Later script errors are reported as themselves.
        match session.run("main", "Fiber.abort(\"unrelated\")") {
            Err(SessionError::VmExecution { message, .. }) => assert_eq!(message, "unrelated"),
            other => panic!("expected a script error, got {:?}", other),
        }
        session.run("main", "var ok = Math.add(1, 1)").unwrap();
    }

    #[test]
    fn test_call_handles_are_cached() {
        let mut session = math_session();
        session.arm().unwrap();
        let first = session.call_handle("add(_,_)").unwrap();
        let second = session.call_handle("add(_,_)").unwrap();
        assert_eq!(first, second);
    }
}
