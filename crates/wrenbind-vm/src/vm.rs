//! The VM instance and its embedding API.
//!
//! Hosts exchange values with scripts through a small array of slots. Outside
//! of a foreign call the host owns the slot array and sizes it with
//! [`Vm::ensure_slots`]; while a foreign method runs, slot 0 holds the
//! receiver and the following slots the arguments, and the method leaves its
//! result in slot 0.

use std::any::Any;
use std::rc::Rc;
use std::time::Instant;

use rustc_hash::FxHashMap;

use crate::ast::Stmt;
use crate::config::VmConfig;
use crate::error::{ErrorReport, SlotType, TraceFrame, VmError};
use crate::interpreter::Unwind;
use crate::parser::parse_module;
use crate::signature;
use crate::value::{
    ClassKind, ClassObj, Env, ForeignObj, Frame, MapKey, MapObj, Scope, Value,
};

/// Maximum depth of nested method and function calls.
pub(crate) const MAX_CALL_DEPTH: usize = 128;

/// A durable reference to a script value or a method signature.
///
/// Handles stay valid until released with [`Vm::release_handle`] or the VM
/// is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(u64);

impl Handle {
    pub fn id(&self) -> u64 {
        self.0
    }
}

pub(crate) enum HandleEntry {
    Value(Value),
    Call(String),
}

pub(crate) struct Module {
    pub name: Rc<str>,
    pub scope: Env,
}

/// Built-in classes every module can see.
pub(crate) struct CoreClasses {
    pub object: Rc<ClassObj>,
    pub class: Rc<ClassObj>,
    pub bool_: Rc<ClassObj>,
    pub null: Rc<ClassObj>,
    pub num: Rc<ClassObj>,
    pub string: Rc<ClassObj>,
    pub list: Rc<ClassObj>,
    pub map: Rc<ClassObj>,
    pub range: Rc<ClassObj>,
    pub fn_: Rc<ClassObj>,
    pub fiber: Rc<ClassObj>,
    pub system: Rc<ClassObj>,
}

impl CoreClasses {
    fn new() -> Self {
        let object = Rc::new(ClassObj::new("Object", ClassKind::Object, false, None));
        let core = |name: &str, kind| {
            Rc::new(ClassObj::new(name, kind, false, Some(object.clone())))
        };
        Self {
            class: core("Class", ClassKind::Class),
            bool_: core("Bool", ClassKind::Bool),
            null: core("Null", ClassKind::Null),
            num: core("Num", ClassKind::Num),
            string: core("String", ClassKind::String),
            list: core("List", ClassKind::List),
            map: core("Map", ClassKind::Map),
            range: core("Range", ClassKind::Range),
            fn_: core("Fn", ClassKind::Fn),
            fiber: core("Fiber", ClassKind::Fiber),
            system: core("System", ClassKind::System),
            object,
        }
    }

    fn all(&self) -> [&Rc<ClassObj>; 12] {
        [
            &self.object,
            &self.class,
            &self.bool_,
            &self.null,
            &self.num,
            &self.string,
            &self.list,
            &self.map,
            &self.range,
            &self.fn_,
            &self.fiber,
            &self.system,
        ]
    }
}

/// A single script VM.
///
/// A `Vm` is single threaded and not re-entrant: foreign methods receive
/// `&mut Vm` for slot access but may not call [`Vm::interpret`] or
/// [`Vm::call`].
pub struct Vm {
    pub(crate) config: VmConfig,
    pub(crate) core: CoreClasses,
    pub(crate) core_scope: Env,
    pub(crate) modules: FxHashMap<Rc<str>, Rc<Module>>,
    pub(crate) slots: Vec<Value>,
    pub(crate) handles: FxHashMap<u64, HandleEntry>,
    next_handle: u64,
    pub(crate) foreign_depth: usize,
    pub(crate) pending_abort: Option<Value>,
    pub(crate) call_stack: Vec<TraceFrame>,
    pub(crate) last_trace: Vec<TraceFrame>,
    pub(crate) started: Instant,
}

impl Vm {
    pub fn new(config: VmConfig) -> Self {
        let core = CoreClasses::new();
        let core_scope = Scope::root(None);
        for class in core.all() {
            Scope::define(&core_scope, class.name.clone(), Value::Class(class.clone()));
        }
        Self {
            config,
            core,
            core_scope,
            modules: FxHashMap::default(),
            slots: Vec::new(),
            handles: FxHashMap::default(),
            next_handle: 1,
            foreign_depth: 0,
            pending_abort: None,
            call_stack: Vec::new(),
            last_trace: Vec::new(),
            started: Instant::now(),
        }
    }

    // ========================================================================
    // Execution
    // ========================================================================

    /// Compile and run `source` in `module`, creating the module if needed.
    pub fn interpret(&mut self, module: &str, source: &str) -> Result<(), VmError> {
        if self.foreign_depth > 0 {
            return Err(VmError::Reentrant);
        }
        let statements = self.compile(module, source)?;
        let module = self.module_or_insert(module);
        self.call_stack.clear();
        match self.run_module(&module, &statements) {
            Err(Unwind::Error(error)) => Err(self.runtime_failure(error)),
            _ => Ok(()),
        }
    }

    /// Invoke the method a call handle names on the receiver in slot 0 with
    /// the arguments in the following slots. The result is left in slot 0.
    pub fn call(&mut self, method: Handle) -> Result<(), VmError> {
        if self.foreign_depth > 0 {
            return Err(VmError::Reentrant);
        }
        let signature = match self.handles.get(&method.0) {
            Some(HandleEntry::Call(signature)) => signature.clone(),
            Some(HandleEntry::Value(_)) => return Err(VmError::NotCallHandle),
            None => return Err(VmError::ReleasedHandle),
        };
        let arity = signature::arity(&signature);
        if self.slots.len() <= arity {
            return Err(VmError::SlotOutOfRange {
                slot: arity,
                count: self.slots.len(),
            });
        }

        let receiver = self.slots[0].clone();
        let args = self.slots[1..=arity].to_vec();
        self.call_stack.clear();
        match self.invoke(receiver, &signature, args) {
            Ok(result) | Err(Unwind::Return(result)) => {
                self.slots[0] = result;
                Ok(())
            }
            Err(Unwind::Error(error)) => Err(self.runtime_failure(error)),
            Err(Unwind::Break | Unwind::Continue) => {
                self.slots[0] = Value::Null;
                Ok(())
            }
        }
    }

    /// Abort the fiber running the current foreign method with the value in
    /// `slot` as its error. Takes effect when the foreign method returns.
    pub fn abort_fiber(&mut self, slot: usize) -> Result<(), VmError> {
        if self.foreign_depth == 0 {
            return Err(VmError::NotInForeignCall);
        }
        let error = self.slot(slot)?.clone();
        self.pending_abort = Some(error);
        Ok(())
    }

    pub fn in_foreign_call(&self) -> bool {
        self.foreign_depth > 0
    }

    fn compile(&mut self, module: &str, source: &str) -> Result<Vec<Stmt>, VmError> {
        parse_module(source).map_err(|errors| {
            for error in &errors {
                self.report(ErrorReport::Compile {
                    module: module.to_string(),
                    line: error.span.line,
                    message: error.to_string(),
                });
            }
            let message = errors
                .first()
                .map(|error| error.to_string())
                .unwrap_or_default();
            tracing::debug!(module, %message, "compile error");
            VmError::Compile {
                module: module.to_string(),
                message,
            }
        })
    }

    /// Compile a module for `import`; failures become script errors.
    pub(crate) fn compile_import(&mut self, module: &str, source: &str) -> Result<Vec<Stmt>, String> {
        self.compile(module, source).map_err(|error| error.to_string())
    }

    pub(crate) fn module_or_insert(&mut self, name: &str) -> Rc<Module> {
        if let Some(module) = self.modules.get(name) {
            return module.clone();
        }
        let module = Rc::new(Module {
            name: name.into(),
            scope: Scope::root(Some(self.core_scope.clone())),
        });
        self.modules.insert(module.name.clone(), module.clone());
        module
    }

    pub(crate) fn run_module(&mut self, module: &Rc<Module>, statements: &[Stmt]) -> Result<(), Unwind> {
        let frame = Frame {
            module: module.name.clone(),
            this: None,
            class: None,
        };
        self.push_frame(&module.name, "(script)")?;
        let result = self.exec_block(statements, &module.scope, &frame);
        self.pop_frame();
        result
    }

    /// Turn an uncaught error into a `VmError`, reporting it to the error hook.
    fn runtime_failure(&mut self, error: Value) -> VmError {
        let message = self.plain_string(&error);
        let trace = std::mem::take(&mut self.last_trace);
        self.report(ErrorReport::Runtime {
            message: message.clone(),
        });
        for frame in &trace {
            self.report(ErrorReport::StackTrace {
                module: frame.module.clone(),
                line: frame.line,
                function: frame.function.clone(),
            });
        }
        tracing::debug!(%message, depth = trace.len(), "uncaught runtime error");
        VmError::Runtime { message, trace }
    }

    pub(crate) fn report(&self, report: ErrorReport) {
        if let Some(hook) = &self.config.error {
            hook(&report);
        }
    }

    pub(crate) fn write(&self, text: &str) {
        match &self.config.write {
            Some(hook) => hook(text),
            None => {
                use std::io::Write;
                let mut stdout = std::io::stdout();
                let _ = stdout.write_all(text.as_bytes());
                let _ = stdout.flush();
            }
        }
    }

    // ========================================================================
    // Slots
    // ========================================================================

    /// Grow the slot array to at least `count` slots.
    pub fn ensure_slots(&mut self, count: usize) {
        if self.slots.len() < count {
            self.slots.resize(count, Value::Null);
        }
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn slot(&self, slot: usize) -> Result<&Value, VmError> {
        self.slots.get(slot).ok_or(VmError::SlotOutOfRange {
            slot,
            count: self.slots.len(),
        })
    }

    fn set_slot(&mut self, slot: usize, value: Value) -> Result<(), VmError> {
        let count = self.slots.len();
        let target = self
            .slots
            .get_mut(slot)
            .ok_or(VmError::SlotOutOfRange { slot, count })?;
        *target = value;
        Ok(())
    }

    fn type_error(&self, slot: usize, expected: SlotType) -> VmError {
        VmError::SlotType {
            slot,
            expected,
            found: self
                .slots
                .get(slot)
                .map(Value::slot_type)
                .unwrap_or(SlotType::Null),
        }
    }

    pub fn slot_type(&self, slot: usize) -> Result<SlotType, VmError> {
        Ok(self.slot(slot)?.slot_type())
    }

    /// Name of the class of the value in `slot`.
    pub fn slot_class_name(&self, slot: usize) -> Result<String, VmError> {
        let value = self.slot(slot)?;
        Ok(self.class_of(value).name.to_string())
    }

    pub fn get_slot_bool(&self, slot: usize) -> Result<bool, VmError> {
        match self.slot(slot)? {
            Value::Bool(b) => Ok(*b),
            _ => Err(self.type_error(slot, SlotType::Bool)),
        }
    }

    pub fn get_slot_double(&self, slot: usize) -> Result<f64, VmError> {
        match self.slot(slot)? {
            Value::Num(n) => Ok(*n),
            _ => Err(self.type_error(slot, SlotType::Num)),
        }
    }

    pub fn get_slot_string(&self, slot: usize) -> Result<String, VmError> {
        match self.slot(slot)? {
            Value::Str(s) => Ok(s.to_string()),
            _ => Err(self.type_error(slot, SlotType::String)),
        }
    }

    pub fn set_slot_bool(&mut self, slot: usize, value: bool) -> Result<(), VmError> {
        self.set_slot(slot, Value::Bool(value))
    }

    pub fn set_slot_double(&mut self, slot: usize, value: f64) -> Result<(), VmError> {
        self.set_slot(slot, Value::Num(value))
    }

    pub fn set_slot_string(&mut self, slot: usize, value: &str) -> Result<(), VmError> {
        self.set_slot(slot, Value::str(value))
    }

    pub fn set_slot_null(&mut self, slot: usize) -> Result<(), VmError> {
        self.set_slot(slot, Value::Null)
    }

    // ------------------------------------------------------------------------
    // Lists
    // ------------------------------------------------------------------------

    pub fn set_slot_new_list(&mut self, slot: usize) -> Result<(), VmError> {
        self.set_slot(slot, Value::list(Vec::new()))
    }

    pub fn get_list_count(&self, slot: usize) -> Result<usize, VmError> {
        match self.slot(slot)? {
            Value::List(items) => Ok(items.borrow().len()),
            _ => Err(self.type_error(slot, SlotType::List)),
        }
    }

    /// Copy element `index` of the list in `list_slot` into `element_slot`.
    pub fn get_list_element(
        &mut self,
        list_slot: usize,
        index: usize,
        element_slot: usize,
    ) -> Result<(), VmError> {
        let element = match self.slot(list_slot)? {
            Value::List(items) => {
                let items = items.borrow();
                items
                    .get(index)
                    .cloned()
                    .ok_or(VmError::IndexOutOfRange {
                        index: index as i64,
                        count: items.len(),
                    })?
            }
            _ => return Err(self.type_error(list_slot, SlotType::List)),
        };
        self.set_slot(element_slot, element)
    }

    /// Insert the value in `element_slot` at `index`; negative indices count
    /// from the end, `-1` appends.
    pub fn insert_in_list(
        &mut self,
        list_slot: usize,
        index: i64,
        element_slot: usize,
    ) -> Result<(), VmError> {
        let element = self.slot(element_slot)?.clone();
        match self.slot(list_slot)? {
            Value::List(items) => {
                let mut items = items.borrow_mut();
                let count = items.len();
                let position = if index < 0 {
                    count as i64 + 1 + index
                } else {
                    index
                };
                if position < 0 || position > count as i64 {
                    return Err(VmError::IndexOutOfRange { index, count });
                }
                items.insert(position as usize, element);
                Ok(())
            }
            _ => Err(self.type_error(list_slot, SlotType::List)),
        }
    }

    // ------------------------------------------------------------------------
    // Maps
    // ------------------------------------------------------------------------

    pub fn set_slot_new_map(&mut self, slot: usize) -> Result<(), VmError> {
        self.set_slot(
            slot,
            Value::Map(Rc::new(std::cell::RefCell::new(MapObj::default()))),
        )
    }

    pub fn get_map_count(&self, slot: usize) -> Result<usize, VmError> {
        match self.slot(slot)? {
            Value::Map(map) => Ok(map.borrow().len()),
            _ => Err(self.type_error(slot, SlotType::Map)),
        }
    }

    /// Copy the key of entry `index` (insertion order) into `key_slot`.
    pub fn get_map_key_at(
        &mut self,
        map_slot: usize,
        index: usize,
        key_slot: usize,
    ) -> Result<(), VmError> {
        let key = match self.slot(map_slot)? {
            Value::Map(map) => {
                let map = map.borrow();
                map.entry_at(index)
                    .map(|(key, _)| key.clone())
                    .ok_or(VmError::IndexOutOfRange {
                        index: index as i64,
                        count: map.len(),
                    })?
            }
            _ => return Err(self.type_error(map_slot, SlotType::Map)),
        };
        self.set_slot(key_slot, key)
    }

    /// Copy the value stored under the key in `key_slot` into `value_slot`,
    /// or null when the key is absent.
    pub fn get_map_value(
        &mut self,
        map_slot: usize,
        key_slot: usize,
        value_slot: usize,
    ) -> Result<(), VmError> {
        let key = MapKey::from_value(self.slot(key_slot)?).ok_or(VmError::InvalidMapKey(key_slot))?;
        let value = match self.slot(map_slot)? {
            Value::Map(map) => map.borrow().get(&key).cloned().unwrap_or(Value::Null),
            _ => return Err(self.type_error(map_slot, SlotType::Map)),
        };
        self.set_slot(value_slot, value)
    }

    pub fn set_map_value(
        &mut self,
        map_slot: usize,
        key_slot: usize,
        value_slot: usize,
    ) -> Result<(), VmError> {
        let key_value = self.slot(key_slot)?.clone();
        let key = MapKey::from_value(&key_value).ok_or(VmError::InvalidMapKey(key_slot))?;
        let value = self.slot(value_slot)?.clone();
        match self.slot(map_slot)? {
            Value::Map(map) => {
                map.borrow_mut().insert(key, key_value, value);
                Ok(())
            }
            _ => Err(self.type_error(map_slot, SlotType::Map)),
        }
    }

    // ------------------------------------------------------------------------
    // Foreign objects
    // ------------------------------------------------------------------------

    /// Create an instance of the foreign class in `class_slot` wrapping
    /// `data` and store it in `slot`.
    pub fn set_slot_new_foreign(
        &mut self,
        slot: usize,
        class_slot: usize,
        data: Rc<dyn Any>,
    ) -> Result<(), VmError> {
        let class = match self.slot(class_slot)? {
            Value::Class(class) if class.is_foreign => class.clone(),
            _ => return Err(self.type_error(class_slot, SlotType::Foreign)),
        };
        self.set_slot(slot, Value::Foreign(Rc::new(ForeignObj { class, data })))
    }

    pub fn get_slot_foreign(&self, slot: usize) -> Result<Rc<dyn Any>, VmError> {
        match self.slot(slot)? {
            Value::Foreign(foreign) => Ok(foreign.data.clone()),
            _ => Err(self.type_error(slot, SlotType::Foreign)),
        }
    }

    // ========================================================================
    // Modules and variables
    // ========================================================================

    pub fn has_module(&self, module: &str) -> bool {
        self.modules.contains_key(module)
    }

    pub fn has_variable(&self, module: &str, name: &str) -> bool {
        self.modules
            .get(module)
            .is_some_and(|m| m.scope.borrow().vars.contains_key(name))
    }

    /// Load top-level variable `name` of `module` into `slot`.
    pub fn get_variable(&mut self, module: &str, name: &str, slot: usize) -> Result<(), VmError> {
        let found = self
            .modules
            .get(module)
            .ok_or_else(|| VmError::UnknownModule(module.to_string()))?;
        let value = found
            .scope
            .borrow()
            .vars
            .get(name)
            .cloned()
            .ok_or_else(|| VmError::UnknownVariable {
                module: module.to_string(),
                name: name.to_string(),
            })?;
        self.set_slot(slot, value)
    }

    // ========================================================================
    // Handles
    // ========================================================================

    fn insert_handle(&mut self, entry: HandleEntry) -> Handle {
        let id = self.next_handle;
        self.next_handle += 1;
        self.handles.insert(id, entry);
        Handle(id)
    }

    /// Create a handle keeping the value in `slot` alive.
    pub fn make_handle(&mut self, slot: usize) -> Result<Handle, VmError> {
        let value = self.slot(slot)?.clone();
        Ok(self.insert_handle(HandleEntry::Value(value)))
    }

    /// Create a handle for invoking `signature` via [`Vm::call`].
    pub fn make_call_handle(&mut self, signature: &str) -> Handle {
        self.insert_handle(HandleEntry::Call(signature.to_string()))
    }

    pub fn set_slot_handle(&mut self, slot: usize, handle: Handle) -> Result<(), VmError> {
        let value = match self.handles.get(&handle.0) {
            Some(HandleEntry::Value(value)) => value.clone(),
            Some(HandleEntry::Call(_)) => return Err(VmError::NotCallHandle),
            None => return Err(VmError::ReleasedHandle),
        };
        self.set_slot(slot, value)
    }

    pub fn release_handle(&mut self, handle: Handle) -> Result<(), VmError> {
        tracing::trace!(handle = handle.0, "release handle");
        self.handles
            .remove(&handle.0)
            .map(|_| ())
            .ok_or(VmError::ReleasedHandle)
    }

    /// Number of handles not yet released.
    pub fn live_handles(&self) -> usize {
        self.handles.len()
    }

    // ========================================================================
    // Call stack
    // ========================================================================

    pub(crate) fn push_frame(&mut self, module: &str, function: &str) -> Result<(), Unwind> {
        if self.call_stack.len() >= MAX_CALL_DEPTH {
            return Err(self.error("Stack overflow."));
        }
        self.call_stack.push(TraceFrame {
            module: module.to_string(),
            line: 0,
            function: function.to_string(),
        });
        Ok(())
    }

    pub(crate) fn pop_frame(&mut self) {
        self.call_stack.pop();
    }

    pub(crate) fn set_line(&mut self, line: u32) {
        if let Some(frame) = self.call_stack.last_mut() {
            frame.line = line;
        }
    }

    /// Build a script error, recording the current stack for reporting.
    pub(crate) fn error(&mut self, message: impl AsRef<str>) -> Unwind {
        self.error_value(Value::str(message.as_ref()))
    }

    pub(crate) fn error_value(&mut self, value: Value) -> Unwind {
        self.last_trace = self.call_stack.iter().rev().cloned().collect();
        Unwind::Error(value)
    }
}

impl Drop for Vm {
    fn drop(&mut self) {
        // Classes, closures and module scopes reference each other; break the
        // cycles so everything is freed.
        self.handles.clear();
        self.slots.clear();
        for module in self.modules.values() {
            let vars = std::mem::take(&mut module.scope.borrow_mut().vars);
            for value in vars.values() {
                if let Value::Class(class) = value {
                    class.clear();
                }
            }
        }
        self.modules.clear();
        for class in self.core.all() {
            class.clear();
        }
    }
}
