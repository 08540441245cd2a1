//! Runtime values and heap objects.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::ast::{FnDecl, Stmt};
use crate::config::ForeignMethodFn;
use crate::error::SlotType;

/// A script value.
#[derive(Clone)]
pub(crate) enum Value {
    Null,
    Bool(bool),
    Num(f64),
    Str(Rc<str>),
    List(Rc<RefCell<Vec<Value>>>),
    Map(Rc<RefCell<MapObj>>),
    Range(Rc<RangeObj>),
    Class(Rc<ClassObj>),
    Instance(Rc<Instance>),
    Foreign(Rc<ForeignObj>),
    Fn(Rc<Closure>),
    Fiber(Rc<FiberObj>),
}

impl Value {
    pub fn str(s: &str) -> Value {
        Value::Str(s.into())
    }

    pub fn list(items: Vec<Value>) -> Value {
        Value::List(Rc::new(RefCell::new(items)))
    }

    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Null | Value::Bool(false))
    }

    pub fn slot_type(&self) -> SlotType {
        match self {
            Value::Null => SlotType::Null,
            Value::Bool(_) => SlotType::Bool,
            Value::Num(_) => SlotType::Num,
            Value::Str(_) => SlotType::String,
            Value::List(_) => SlotType::List,
            Value::Map(_) => SlotType::Map,
            Value::Foreign(_) => SlotType::Foreign,
            _ => SlotType::Unknown,
        }
    }

    /// Value equality: by value for primitives, strings and ranges, by
    /// identity for everything else.
    pub fn equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Num(a), Value::Num(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Range(a), Value::Range(b)) => {
                a.from == b.from && a.to == b.to && a.inclusive == b.inclusive
            }
            (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b),
            (Value::Map(a), Value::Map(b)) => Rc::ptr_eq(a, b),
            (Value::Class(a), Value::Class(b)) => Rc::ptr_eq(a, b),
            (Value::Instance(a), Value::Instance(b)) => Rc::ptr_eq(a, b),
            (Value::Foreign(a), Value::Foreign(b)) => Rc::ptr_eq(a, b),
            (Value::Fn(a), Value::Fn(b)) => Rc::ptr_eq(a, b),
            (Value::Fiber(a), Value::Fiber(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Num(n) => write!(f, "{}", format_num(*n)),
            Value::Str(s) => write!(f, "{:?}", s),
            Value::List(items) => f.debug_list().entries(items.borrow().iter()).finish(),
            Value::Map(map) => write!(f, "<map of {}>", map.borrow().len()),
            Value::Range(r) => write!(f, "{:?}", r),
            Value::Class(class) => write!(f, "<class {}>", class.name),
            Value::Instance(instance) => write!(f, "<instance of {}>", instance.class.name),
            Value::Foreign(foreign) => write!(f, "<foreign {}>", foreign.class.name),
            Value::Fn(_) => write!(f, "<fn>"),
            Value::Fiber(_) => write!(f, "<fiber>"),
        }
    }
}

/// Format a number the way `System.print` shows it.
pub(crate) fn format_num(n: f64) -> String {
    if n.is_nan() {
        return "nan".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "infinity" } else { "-infinity" }.to_string();
    }
    if n == n.trunc() && n.abs() < 1e15 {
        return format!("{}", n as i64);
    }

    // Fourteen significant digits, trailing zeros trimmed.
    let exponent = n.abs().log10().floor() as i32;
    if !(-4..15).contains(&exponent) {
        let formatted = format!("{:.13e}", n);
        let (mantissa, exp) = formatted.split_once('e').unwrap_or((&formatted, "0"));
        let mantissa = trim_fraction(mantissa);
        let exp: i32 = exp.parse().unwrap_or(0);
        let sign = if exp < 0 { '-' } else { '+' };
        return format!("{}e{}{:02}", mantissa, sign, exp.abs());
    }
    let decimals = (13 - exponent).max(0) as usize;
    trim_fraction(&format!("{:.*}", decimals, n)).to_string()
}

fn trim_fraction(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

#[derive(Debug)]
pub(crate) struct RangeObj {
    pub from: f64,
    pub to: f64,
    pub inclusive: bool,
}

impl RangeObj {
    /// The numbers the range iterates over, counting down when `to < from`.
    pub fn values(&self) -> Vec<Value> {
        let mut out = Vec::new();
        let step = if self.to >= self.from { 1.0 } else { -1.0 };
        let mut x = self.from;
        loop {
            let past_end = if step > 0.0 {
                x > self.to || (!self.inclusive && x >= self.to)
            } else {
                x < self.to || (!self.inclusive && x <= self.to)
            };
            if past_end {
                return out;
            }
            out.push(Value::Num(x));
            x += step;
        }
    }
}

/// Hashable projection of the value types that may key a map.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum MapKey {
    Null,
    Bool(bool),
    Num(u64),
    Str(Rc<str>),
    Range(u64, u64, bool),
    Class(usize),
}

impl MapKey {
    pub fn from_value(value: &Value) -> Option<MapKey> {
        let key = match value {
            Value::Null => MapKey::Null,
            Value::Bool(b) => MapKey::Bool(*b),
            Value::Num(n) => MapKey::Num(num_bits(*n)),
            Value::Str(s) => MapKey::Str(s.clone()),
            Value::Range(r) => MapKey::Range(num_bits(r.from), num_bits(r.to), r.inclusive),
            Value::Class(class) => MapKey::Class(Rc::as_ptr(class) as usize),
            _ => return None,
        };
        Some(key)
    }
}

fn num_bits(n: f64) -> u64 {
    if n == 0.0 {
        0.0f64.to_bits()
    } else {
        n.to_bits()
    }
}

/// Insertion-ordered map object.
#[derive(Default)]
pub(crate) struct MapObj {
    index: FxHashMap<MapKey, usize>,
    entries: Vec<(Value, Value)>,
}

impl MapObj {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, key: &MapKey) -> Option<&Value> {
        self.index.get(key).map(|&i| &self.entries[i].1)
    }

    pub fn contains(&self, key: &MapKey) -> bool {
        self.index.contains_key(key)
    }

    pub fn insert(&mut self, key: MapKey, key_value: Value, value: Value) {
        match self.index.get(&key) {
            Some(&i) => self.entries[i].1 = value,
            None => {
                self.index.insert(key, self.entries.len());
                self.entries.push((key_value, value));
            }
        }
    }

    pub fn remove(&mut self, key: &MapKey) -> Option<Value> {
        let i = self.index.remove(key)?;
        let (_, removed) = self.entries.swap_remove(i);
        if let Some((moved_key, _)) = self.entries.get(i) {
            if let Some(moved) = MapKey::from_value(moved_key) {
                self.index.insert(moved, i);
            }
        }
        Some(removed)
    }

    pub fn clear(&mut self) {
        self.index.clear();
        self.entries.clear();
    }

    pub fn entry_at(&self, i: usize) -> Option<&(Value, Value)> {
        self.entries.get(i)
    }

    pub fn entries(&self) -> &[(Value, Value)] {
        &self.entries
    }
}

/// Which built-in behavior a class carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ClassKind {
    Object,
    Class,
    Bool,
    Null,
    Num,
    String,
    List,
    Map,
    Range,
    Fn,
    Fiber,
    System,
    User,
}

pub(crate) struct ClassObj {
    pub name: Rc<str>,
    pub kind: ClassKind,
    pub is_foreign: bool,
    pub superclass: Option<Rc<ClassObj>>,
    pub methods: RefCell<FxHashMap<String, Method>>,
    pub statics: RefCell<FxHashMap<String, Method>>,
    pub static_fields: RefCell<FxHashMap<Rc<str>, Value>>,
}

impl ClassObj {
    pub fn new(
        name: &str,
        kind: ClassKind,
        is_foreign: bool,
        superclass: Option<Rc<ClassObj>>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            is_foreign,
            superclass,
            methods: RefCell::new(FxHashMap::default()),
            statics: RefCell::new(FxHashMap::default()),
            static_fields: RefCell::new(FxHashMap::default()),
        }
    }

    /// Find an instance method along the superclass chain, along with the
    /// class that defines it.
    pub fn find_method(self: &Rc<Self>, signature: &str) -> Option<(Rc<ClassObj>, Method)> {
        let mut class = Some(self.clone());
        while let Some(current) = class {
            if let Some(method) = current.methods.borrow().get(signature) {
                return Some((current.clone(), method.clone()));
            }
            class = current.superclass.clone();
        }
        None
    }

    pub fn is_subclass_of(self: &Rc<Self>, other: &Rc<ClassObj>) -> bool {
        let mut class = Some(self.clone());
        while let Some(current) = class {
            if Rc::ptr_eq(&current, other) {
                return true;
            }
            class = current.superclass.clone();
        }
        false
    }

    /// Drop every method and static field so closures referencing the class
    /// release it.
    pub fn clear(&self) {
        self.methods.borrow_mut().clear();
        self.statics.borrow_mut().clear();
        self.static_fields.borrow_mut().clear();
    }
}

#[derive(Clone)]
pub(crate) enum Method {
    Script(Rc<ScriptMethod>),
    /// `construct` initializer, invoked on the class
    Constructor(Rc<ScriptMethod>),
    Foreign(ForeignMethodFn),
}

pub(crate) struct ScriptMethod {
    pub name: Rc<str>,
    pub params: Vec<Rc<str>>,
    pub body: Rc<Vec<Stmt>>,
    pub env: Env,
    pub module: Rc<str>,
}

pub(crate) struct Instance {
    pub class: Rc<ClassObj>,
    pub fields: RefCell<FxHashMap<Rc<str>, Value>>,
}

/// Instance of a foreign class: opaque host data tagged with its class.
pub(crate) struct ForeignObj {
    pub class: Rc<ClassObj>,
    pub data: Rc<dyn Any>,
}

/// Execution context a body runs in.
#[derive(Clone)]
pub(crate) struct Frame {
    pub module: Rc<str>,
    pub this: Option<Value>,
    /// Class whose method is executing; owns static fields
    pub class: Option<Rc<ClassObj>>,
}

pub(crate) struct Closure {
    pub decl: Rc<FnDecl>,
    pub env: Env,
    pub frame: Frame,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FiberState {
    New,
    Running,
    Done,
}

pub(crate) struct FiberObj {
    pub func: Rc<Closure>,
    pub state: Cell<FiberState>,
    pub error: RefCell<Value>,
}

pub(crate) type Env = Rc<RefCell<Scope>>;

/// A lexical scope.
#[derive(Default)]
pub(crate) struct Scope {
    pub vars: FxHashMap<Rc<str>, Value>,
    pub parent: Option<Env>,
}

impl Scope {
    pub fn root(parent: Option<Env>) -> Env {
        Rc::new(RefCell::new(Scope {
            vars: FxHashMap::default(),
            parent,
        }))
    }

    pub fn child(parent: &Env) -> Env {
        Self::root(Some(parent.clone()))
    }

    pub fn lookup(env: &Env, name: &str) -> Option<Value> {
        let mut scope = Some(env.clone());
        while let Some(current) = scope {
            let borrowed = current.borrow();
            if let Some(value) = borrowed.vars.get(name) {
                return Some(value.clone());
            }
            scope = borrowed.parent.clone();
        }
        None
    }

    /// Assign to an existing variable; false when no scope defines it.
    pub fn assign(env: &Env, name: &str, value: Value) -> bool {
        let mut scope = Some(env.clone());
        while let Some(current) = scope {
            let mut borrowed = current.borrow_mut();
            if let Some(slot) = borrowed.vars.get_mut(name) {
                *slot = value;
                return true;
            }
            scope = borrowed.parent.clone();
        }
        false
    }

    pub fn define(env: &Env, name: Rc<str>, value: Value) {
        env.borrow_mut().vars.insert(name, value);
    }
}
