//! Tree-walking evaluation of statements and expressions.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::ast::{ClassDecl, Expr, InterpSegment, MethodKind, Stmt, StmtKind};
use crate::config::ForeignMethodFn;
use crate::signature;
use crate::value::{
    format_num, ClassKind, ClassObj, Closure, Env, FiberObj, FiberState, Frame, Instance,
    MapKey, MapObj, Method, RangeObj, Scope, ScriptMethod, Value,
};
use crate::vm::Vm;

/// Non-local control flow.
pub(crate) enum Unwind {
    /// A runtime error or fiber abort carrying the error value
    Error(Value),
    Return(Value),
    Break,
    Continue,
}

pub(crate) type Exec<T> = Result<T, Unwind>;

impl Vm {
    // ========================================================================
    // Statements
    // ========================================================================

    pub(crate) fn exec_block(&mut self, statements: &[Stmt], env: &Env, frame: &Frame) -> Exec<()> {
        for statement in statements {
            self.exec_stmt(statement, env, frame)?;
        }
        Ok(())
    }

    fn exec_stmt(&mut self, stmt: &Stmt, env: &Env, frame: &Frame) -> Exec<()> {
        self.set_line(stmt.line);
        match &stmt.kind {
            StmtKind::Var { name, init } => {
                let value = match init {
                    Some(init) => self.eval(init, env, frame)?,
                    None => Value::Null,
                };
                Scope::define(env, name.clone(), value);
            }
            StmtKind::Expr(expr) => {
                self.eval(expr, env, frame)?;
            }
            StmtKind::Block(statements) => {
                let inner = Scope::child(env);
                self.exec_block(statements, &inner, frame)?;
            }
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                if self.eval(cond, env, frame)?.is_truthy() {
                    self.exec_stmt(then_branch, env, frame)?;
                } else if let Some(else_branch) = else_branch {
                    self.exec_stmt(else_branch, env, frame)?;
                }
            }
            StmtKind::While { cond, body } => {
                while self.eval(cond, env, frame)?.is_truthy() {
                    match self.exec_stmt(body, env, frame) {
                        Err(Unwind::Break) => break,
                        Err(Unwind::Continue) | Ok(()) => {}
                        Err(other) => return Err(other),
                    }
                }
            }
            StmtKind::For { var, seq, body } => {
                let seq = self.eval(seq, env, frame)?;
                self.exec_for(var, seq, body, env, frame)?;
            }
            StmtKind::Break => return Err(Unwind::Break),
            StmtKind::Continue => return Err(Unwind::Continue),
            StmtKind::Return(value) => {
                let value = match value {
                    Some(expr) => self.eval(expr, env, frame)?,
                    None => Value::Null,
                };
                return Err(Unwind::Return(value));
            }
            StmtKind::Class(decl) => {
                let class = self.define_class(decl, env, frame)?;
                Scope::define(env, decl.name.clone(), Value::Class(class));
            }
            StmtKind::Import { module, names } => {
                self.import_module(&frame.module, module, names, env)?;
            }
        }
        Ok(())
    }

    fn exec_for(&mut self, var: &Rc<str>, seq: Value, body: &Stmt, env: &Env, frame: &Frame) -> Exec<()> {
        // Built-in sequences are snapshotted, except lists which are re-read
        // each step so appends during iteration are seen.
        let items = match &seq {
            Value::List(list) => {
                let mut index = 0;
                loop {
                    let item = match list.borrow().get(index) {
                        Some(item) => item.clone(),
                        None => return Ok(()),
                    };
                    if !self.exec_loop_body(var, item, body, env, frame)? {
                        return Ok(());
                    }
                    index += 1;
                }
            }
            Value::Range(range) => range.values(),
            Value::Str(s) => s.chars().map(|c| Value::str(c.encode_utf8(&mut [0; 4]))).collect(),
            Value::Map(map) => map.borrow().entries().iter().map(|(key, _)| key.clone()).collect(),
            _ => return self.exec_for_protocol(var, seq, body, env, frame),
        };
        for item in items {
            if !self.exec_loop_body(var, item, body, env, frame)? {
                break;
            }
        }
        Ok(())
    }

    /// Iterate a user-defined sequence through `iterate(_)` / `iteratorValue(_)`.
    fn exec_for_protocol(&mut self, var: &Rc<str>, seq: Value, body: &Stmt, env: &Env, frame: &Frame) -> Exec<()> {
        let mut iterator = Value::Null;
        loop {
            iterator = self.invoke(seq.clone(), "iterate(_)", vec![iterator])?;
            if !iterator.is_truthy() {
                return Ok(());
            }
            let item = self.invoke(seq.clone(), "iteratorValue(_)", vec![iterator.clone()])?;
            if !self.exec_loop_body(var, item, body, env, frame)? {
                return Ok(());
            }
        }
    }

    /// Run one iteration; false when the loop should stop.
    fn exec_loop_body(&mut self, var: &Rc<str>, item: Value, body: &Stmt, env: &Env, frame: &Frame) -> Exec<bool> {
        let scope = Scope::child(env);
        Scope::define(&scope, var.clone(), item);
        match self.exec_stmt(body, &scope, frame) {
            Ok(()) | Err(Unwind::Continue) => Ok(true),
            Err(Unwind::Break) => Ok(false),
            Err(other) => Err(other),
        }
    }

    fn import_module(
        &mut self,
        importer: &str,
        requested: &str,
        names: &[(Rc<str>, Rc<str>)],
        env: &Env,
    ) -> Exec<()> {
        let resolved = match &self.config.resolve_module {
            Some(resolve) => resolve(importer, requested),
            None => Some(requested.to_string()),
        };
        let resolved = match resolved {
            Some(name) if !name.is_empty() => name,
            _ => {
                return Err(self.error(format!(
                    "Could not resolve module '{}' imported from '{}'.",
                    requested, importer
                )))
            }
        };

        if !self.has_module(&resolved) {
            let source = match &self.config.load_module {
                Some(load) => load(&resolved),
                None => Err("module loading is not configured".to_string()),
            };
            let source = source.map_err(|reason| {
                self.error(format!("Could not load module '{}': {}", resolved, reason))
            })?;
            tracing::debug!(module = %resolved, importer, "loading module");
            let statements = self
                .compile_import(&resolved, &source)
                .map_err(|message| self.error(message))?;
            let module = self.module_or_insert(&resolved);
            self.run_module(&module, &statements)?;
        }

        let module = self.module_or_insert(&resolved);
        for (name, alias) in names {
            let value = module.scope.borrow().vars.get(name).cloned();
            match value {
                Some(value) => Scope::define(env, alias.clone(), value),
                None => {
                    return Err(self.error(format!(
                        "Could not find a variable named '{}' in module '{}'.",
                        name, resolved
                    )))
                }
            }
        }
        Ok(())
    }

    // ========================================================================
    // Classes
    // ========================================================================

    fn define_class(&mut self, decl: &ClassDecl, env: &Env, frame: &Frame) -> Exec<Rc<ClassObj>> {
        let superclass = match &decl.superclass {
            Some(name) => match Scope::lookup(env, name) {
                Some(Value::Class(class)) if matches!(class.kind, ClassKind::User | ClassKind::Object) => class,
                Some(Value::Class(class)) => {
                    return Err(self.error(format!(
                        "Class '{}' cannot inherit from built-in class '{}'.",
                        decl.name, class.name
                    )))
                }
                _ => {
                    return Err(self.error(format!(
                        "Class '{}' cannot inherit from a non-class object.",
                        decl.name
                    )))
                }
            },
            None => self.core.object.clone(),
        };

        let class = Rc::new(ClassObj::new(
            &decl.name,
            ClassKind::User,
            decl.is_foreign,
            Some(superclass),
        ));

        for method in &decl.methods {
            let signature = method.signature();
            let is_static = method.is_static || method.kind == MethodKind::Constructor;
            let bound = if method.is_foreign {
                match self.bind_foreign(&frame.module, &decl.name, method.is_static, &signature) {
                    Some(function) => Method::Foreign(function),
                    None => {
                        return Err(self.error(format!(
                            "Could not find foreign method '{}' for class {} in module '{}'.",
                            signature, decl.name, frame.module
                        )))
                    }
                }
            } else {
                let body = match &method.body {
                    Some(body) => body.clone(),
                    None => Rc::new(Vec::new()),
                };
                let script = Rc::new(ScriptMethod {
                    name: method.name.clone(),
                    params: method.params.clone(),
                    body,
                    env: env.clone(),
                    module: frame.module.clone(),
                });
                if method.kind == MethodKind::Constructor {
                    if decl.is_foreign {
                        return Err(self.error(format!(
                            "Foreign class '{}' cannot define a script constructor.",
                            decl.name
                        )));
                    }
                    Method::Constructor(script)
                } else {
                    Method::Script(script)
                }
            };
            let table = if is_static { &class.statics } else { &class.methods };
            table.borrow_mut().insert(signature, bound);
        }
        Ok(class)
    }

    fn bind_foreign(&self, module: &str, class: &str, is_static: bool, signature: &str) -> Option<ForeignMethodFn> {
        self.config
            .bind_foreign_method
            .as_ref()
            .and_then(|bind| bind(module, class, is_static, signature))
    }

    pub(crate) fn class_of(&self, value: &Value) -> Rc<ClassObj> {
        let core = &self.core;
        match value {
            Value::Null => core.null.clone(),
            Value::Bool(_) => core.bool_.clone(),
            Value::Num(_) => core.num.clone(),
            Value::Str(_) => core.string.clone(),
            Value::List(_) => core.list.clone(),
            Value::Map(_) => core.map.clone(),
            Value::Range(_) => core.range.clone(),
            Value::Class(_) => core.class.clone(),
            Value::Instance(instance) => instance.class.clone(),
            Value::Foreign(foreign) => foreign.class.clone(),
            Value::Fn(_) => core.fn_.clone(),
            Value::Fiber(_) => core.fiber.clone(),
        }
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    pub(crate) fn eval(&mut self, expr: &Expr, env: &Env, frame: &Frame) -> Exec<Value> {
        match expr {
            Expr::Null => Ok(Value::Null),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Num(n) => Ok(Value::Num(*n)),
            Expr::Str(s) => Ok(Value::Str(s.clone())),
            Expr::Interpolation(segments) => {
                let mut out = String::new();
                for segment in segments {
                    match segment {
                        InterpSegment::Text(text) => out.push_str(text),
                        InterpSegment::Expr(expr) => {
                            let value = self.eval(expr, env, frame)?;
                            out.push_str(&self.to_display(&value)?);
                        }
                    }
                }
                Ok(Value::str(&out))
            }
            Expr::List(items) => {
                let items = self.eval_all(items, env, frame)?;
                Ok(Value::list(items))
            }
            Expr::Map(entries) => {
                let mut map = MapObj::default();
                for (key, value) in entries {
                    let key = self.eval(key, env, frame)?;
                    let value = self.eval(value, env, frame)?;
                    let hashed = self.map_key(&key)?;
                    map.insert(hashed, key, value);
                }
                Ok(Value::Map(Rc::new(RefCell::new(map))))
            }
            Expr::Var(name) => self.lookup_var(name, env, frame),
            Expr::Field(name) => {
                let instance = self.field_owner(frame)?;
                let value = instance.fields.borrow().get(name).cloned();
                Ok(value.unwrap_or(Value::Null))
            }
            Expr::StaticField(name) => {
                let class = self.static_owner(frame)?;
                let value = class.static_fields.borrow().get(name).cloned();
                Ok(value.unwrap_or(Value::Null))
            }
            Expr::This => match &frame.this {
                Some(this) => Ok(this.clone()),
                None => Err(self.error("Cannot use 'this' outside of a method.")),
            },
            Expr::Assign { target, value } => {
                let value = self.eval(value, env, frame)?;
                if Scope::assign(env, target, value.clone()) {
                    return Ok(value);
                }
                match &frame.this {
                    Some(this) if is_lowercase(target) => {
                        let this = this.clone();
                        self.invoke(this, &signature::setter(target), vec![value])
                    }
                    _ => Err(self.error(format!("Variable '{}' is not defined.", target))),
                }
            }
            Expr::FieldAssign {
                field,
                is_static,
                value,
            } => {
                let value = self.eval(value, env, frame)?;
                if *is_static {
                    let class = self.static_owner(frame)?;
                    class.static_fields.borrow_mut().insert(field.clone(), value.clone());
                } else {
                    let instance = self.field_owner(frame)?;
                    instance.fields.borrow_mut().insert(field.clone(), value.clone());
                }
                Ok(value)
            }
            Expr::Call {
                receiver,
                name,
                args,
            } => {
                let receiver = match receiver {
                    Some(receiver) => self.eval(receiver, env, frame)?,
                    None => match &frame.this {
                        Some(this) => this.clone(),
                        None => {
                            let arity = args.as_ref().map_or(0, Vec::len);
                            return Err(self.error(format!(
                                "Undefined function '{}'.",
                                signature::method(name, arity)
                            )));
                        }
                    },
                };
                match args {
                    None => self.invoke(receiver, name, Vec::new()),
                    Some(args) => {
                        let args = self.eval_all(args, env, frame)?;
                        self.invoke(receiver, &signature::method(name, args.len()), args)
                    }
                }
            }
            Expr::Setter {
                receiver,
                name,
                value,
            } => {
                let receiver = self.eval(receiver, env, frame)?;
                let value = self.eval(value, env, frame)?;
                self.invoke(receiver, &signature::setter(name), vec![value])
            }
            Expr::Subscript { receiver, args } => {
                let receiver = self.eval(receiver, env, frame)?;
                let args = self.eval_all(args, env, frame)?;
                self.invoke(receiver, &signature::subscript(args.len()), args)
            }
            Expr::SubscriptSet {
                receiver,
                args,
                value,
            } => {
                let receiver = self.eval(receiver, env, frame)?;
                let mut args = self.eval_all(args, env, frame)?;
                let arity = args.len();
                args.push(self.eval(value, env, frame)?);
                self.invoke(receiver, &signature::subscript_setter(arity), args)
            }
            Expr::Binary { op, left, right } => {
                let left = self.eval(left, env, frame)?;
                let right = self.eval(right, env, frame)?;
                self.invoke(left, &signature::infix(op), vec![right])
            }
            Expr::Unary { op, operand } => {
                let operand = self.eval(operand, env, frame)?;
                self.invoke(operand, op, Vec::new())
            }
            Expr::And(left, right) => {
                let left = self.eval(left, env, frame)?;
                if !left.is_truthy() {
                    return Ok(left);
                }
                self.eval(right, env, frame)
            }
            Expr::Or(left, right) => {
                let left = self.eval(left, env, frame)?;
                if left.is_truthy() {
                    return Ok(left);
                }
                self.eval(right, env, frame)
            }
            Expr::Conditional {
                cond,
                then_expr,
                else_expr,
            } => {
                if self.eval(cond, env, frame)?.is_truthy() {
                    self.eval(then_expr, env, frame)
                } else {
                    self.eval(else_expr, env, frame)
                }
            }
            Expr::Range { from, to, inclusive } => {
                let from = self.eval(from, env, frame)?;
                let to = self.eval(to, env, frame)?;
                match (&from, &to) {
                    (Value::Num(a), Value::Num(b)) => Ok(Value::Range(Rc::new(RangeObj {
                        from: *a,
                        to: *b,
                        inclusive: *inclusive,
                    }))),
                    (Value::Num(_), _) => Err(self.error("Right hand side of range must be a number.")),
                    _ => {
                        let op = if *inclusive { ".." } else { "..." };
                        self.invoke(from, &signature::infix(op), vec![to])
                    }
                }
            }
            Expr::Closure(decl) => Ok(Value::Fn(Rc::new(Closure {
                decl: decl.clone(),
                env: env.clone(),
                frame: frame.clone(),
            }))),
        }
    }

    fn eval_all(&mut self, exprs: &[Expr], env: &Env, frame: &Frame) -> Exec<Vec<Value>> {
        exprs.iter().map(|expr| self.eval(expr, env, frame)).collect()
    }

    fn lookup_var(&mut self, name: &str, env: &Env, frame: &Frame) -> Exec<Value> {
        if let Some(value) = Scope::lookup(env, name) {
            return Ok(value);
        }
        match &frame.this {
            // A bare lowercase name inside a method is a getter call on `this`.
            Some(this) if is_lowercase(name) => {
                let this = this.clone();
                self.invoke(this, name, Vec::new())
            }
            _ => Err(self.error(format!("Variable '{}' is not defined.", name))),
        }
    }

    fn field_owner(&mut self, frame: &Frame) -> Exec<Rc<Instance>> {
        match &frame.this {
            Some(Value::Instance(instance)) => Ok(instance.clone()),
            _ => Err(self.error("Cannot use an instance field outside of an instance method.")),
        }
    }

    fn static_owner(&mut self, frame: &Frame) -> Exec<Rc<ClassObj>> {
        match &frame.class {
            Some(class) => Ok(class.clone()),
            None => Err(self.error("Cannot use a static field outside of a class.")),
        }
    }

    pub(crate) fn map_key(&mut self, key: &Value) -> Exec<MapKey> {
        match MapKey::from_value(key) {
            Some(key) => Ok(key),
            None => Err(self.error("Key must be a value type.")),
        }
    }

    // ========================================================================
    // Calls
    // ========================================================================

    /// Dispatch `signature` on `receiver`.
    pub(crate) fn invoke(&mut self, receiver: Value, signature: &str, args: Vec<Value>) -> Exec<Value> {
        if let Value::Class(class) = &receiver {
            let found = class.statics.borrow().get(signature).cloned();
            if let Some(method) = found {
                let owner = class.clone();
                return self.call_method(method, owner, receiver, args, signature);
            }
            let class = class.clone();
            if let Some(result) = self.call_static_builtin(&class, signature, &args) {
                return result;
            }
        } else {
            let class = self.class_of(&receiver);
            if let Some((owner, method)) = class.find_method(signature) {
                return self.call_method(method, owner, receiver, args, signature);
            }
        }

        if let Some(result) = self.call_builtin(&receiver, signature, &args) {
            return result;
        }
        if let Some(result) = self.call_object_builtin(&receiver, signature, &args) {
            return result;
        }

        let described = match &receiver {
            Value::Class(class) => format!("{} metaclass", class.name),
            other => self.class_of(other).name.to_string(),
        };
        Err(self.error(format!("{} does not implement '{}'.", described, signature)))
    }

    fn call_method(
        &mut self,
        method: Method,
        owner: Rc<ClassObj>,
        receiver: Value,
        args: Vec<Value>,
        signature: &str,
    ) -> Exec<Value> {
        match method {
            Method::Script(script) => self.call_script(&script, owner, receiver, args),
            Method::Constructor(script) => {
                let instance = Value::Instance(Rc::new(Instance {
                    class: owner.clone(),
                    fields: RefCell::new(FxHashMap::default()),
                }));
                self.call_script(&script, owner, instance.clone(), args)?;
                Ok(instance)
            }
            Method::Foreign(function) => self.call_foreign(&function, receiver, args, signature),
        }
    }

    fn call_script(&mut self, method: &ScriptMethod, owner: Rc<ClassObj>, this: Value, args: Vec<Value>) -> Exec<Value> {
        let env = Scope::child(&method.env);
        for (param, arg) in method.params.iter().zip(args) {
            Scope::define(&env, param.clone(), arg);
        }
        let function = format!("{}.{}", owner.name, method.name);
        let frame = Frame {
            module: method.module.clone(),
            this: Some(this),
            class: Some(owner),
        };
        self.push_frame(&frame.module, &function)?;
        let result = self.exec_block(&method.body, &env, &frame);
        self.pop_frame();
        self.finish_body(result)
    }

    fn finish_body(&mut self, result: Exec<()>) -> Exec<Value> {
        match result {
            Ok(()) => Ok(Value::Null),
            Err(Unwind::Return(value)) => Ok(value),
            Err(Unwind::Break | Unwind::Continue) => {
                Err(self.error("'break' or 'continue' used outside of a loop."))
            }
            Err(error) => Err(error),
        }
    }

    /// Run a foreign method with a fresh slot frame.
    fn call_foreign(&mut self, function: &ForeignMethodFn, receiver: Value, args: Vec<Value>, signature: &str) -> Exec<Value> {
        let mut frame_slots = Vec::with_capacity(args.len() + 1);
        frame_slots.push(receiver);
        frame_slots.extend(args);

        let saved = std::mem::replace(&mut self.slots, frame_slots);
        self.foreign_depth += 1;
        function(self);
        self.foreign_depth -= 1;
        let slots = std::mem::replace(&mut self.slots, saved);

        if let Some(error) = self.pending_abort.take() {
            tracing::trace!(signature, "foreign method aborted fiber");
            return Err(self.error_value(error));
        }
        Ok(slots.into_iter().next().unwrap_or(Value::Null))
    }

    /// Call a function value with `args`. Missing arguments are an error,
    /// extra ones are ignored.
    pub(crate) fn call_closure(&mut self, closure: &Rc<Closure>, args: Vec<Value>) -> Exec<Value> {
        let params = &closure.decl.params;
        if args.len() < params.len() {
            return Err(self.error("Function expects more arguments."));
        }
        let env = Scope::child(&closure.env);
        for (param, arg) in params.iter().zip(args) {
            Scope::define(&env, param.clone(), arg);
        }
        let module = closure.frame.module.clone();
        self.push_frame(&module, "(fn)")?;
        let result = self.exec_block(&closure.decl.body, &env, &closure.frame);
        self.pop_frame();
        self.finish_body(result)
    }

    /// Run a fiber to completion. With `catch`, an error ends the fiber and
    /// is returned as its value instead of propagating.
    pub(crate) fn run_fiber(&mut self, fiber: &Rc<FiberObj>, arg: Option<Value>, catch: bool) -> Exec<Value> {
        match fiber.state.get() {
            FiberState::Done => return Err(self.error("Cannot call a finished fiber.")),
            FiberState::Running => return Err(self.error("Fiber has already been called.")),
            FiberState::New => {}
        }
        fiber.state.set(FiberState::Running);
        let args = match arg {
            Some(arg) if !fiber.func.decl.params.is_empty() => vec![arg],
            _ => Vec::new(),
        };
        let result = self.call_closure(&fiber.func, args);
        fiber.state.set(FiberState::Done);
        match result {
            Err(Unwind::Error(error)) => {
                *fiber.error.borrow_mut() = error.clone();
                if catch {
                    Ok(error)
                } else {
                    Err(Unwind::Error(error))
                }
            }
            other => other,
        }
    }

    pub(crate) fn new_fiber(&self, func: Rc<Closure>) -> Value {
        Value::Fiber(Rc::new(FiberObj {
            func,
            state: Cell::new(FiberState::New),
            error: RefCell::new(Value::Null),
        }))
    }

    // ========================================================================
    // Strings
    // ========================================================================

    /// String form of a value, calling a script-defined `toString` when the
    /// value's class has one.
    pub(crate) fn to_display(&mut self, value: &Value) -> Exec<String> {
        match value {
            Value::List(items) => {
                let items = items.borrow().clone();
                let mut parts = Vec::with_capacity(items.len());
                for item in &items {
                    parts.push(self.to_display(item)?);
                }
                Ok(format!("[{}]", parts.join(", ")))
            }
            Value::Map(map) => {
                let entries = map.borrow().entries().to_vec();
                let mut parts = Vec::with_capacity(entries.len());
                for (key, value) in &entries {
                    let key = self.to_display(key)?;
                    let value = self.to_display(value)?;
                    parts.push(format!("{}: {}", key, value));
                }
                Ok(format!("{{{}}}", parts.join(", ")))
            }
            Value::Instance(_) | Value::Foreign(_) => {
                let class = self.class_of(value);
                if class.find_method("toString").is_none() {
                    return Ok(self.plain_string(value));
                }
                match self.invoke(value.clone(), "toString", Vec::new())? {
                    Value::Str(s) => Ok(s.to_string()),
                    other => Ok(self.plain_string(&other)),
                }
            }
            _ => Ok(self.plain_string(value)),
        }
    }

    /// String form of a value without running script code.
    pub(crate) fn plain_string(&self, value: &Value) -> String {
        match value {
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Num(n) => format_num(*n),
            Value::Str(s) => s.to_string(),
            Value::List(items) => {
                let parts: Vec<_> = items.borrow().iter().map(|item| self.plain_string(item)).collect();
                format!("[{}]", parts.join(", "))
            }
            Value::Map(map) => {
                let parts: Vec<_> = map
                    .borrow()
                    .entries()
                    .iter()
                    .map(|(k, v)| format!("{}: {}", self.plain_string(k), self.plain_string(v)))
                    .collect();
                format!("{{{}}}", parts.join(", "))
            }
            Value::Range(range) => format!(
                "{}{}{}",
                format_num(range.from),
                if range.inclusive { ".." } else { "..." },
                format_num(range.to)
            ),
            Value::Class(class) => class.name.to_string(),
            other => format!("instance of {}", self.class_of(other).name),
        }
    }
}

fn is_lowercase(name: &str) -> bool {
    name.chars().next().is_some_and(|c| c.is_lowercase())
}
