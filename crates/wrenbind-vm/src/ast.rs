//! Abstract syntax tree produced by the parser and walked by the interpreter.

use std::rc::Rc;

/// A parsed statement together with the line it starts on.
#[derive(Debug, Clone)]
pub struct Stmt {
    pub kind: StmtKind,
    pub line: u32,
}

#[derive(Debug, Clone)]
pub enum StmtKind {
    Var {
        name: Rc<str>,
        init: Option<Expr>,
    },
    Expr(Expr),
    Block(Vec<Stmt>),
    If {
        cond: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },
    While {
        cond: Expr,
        body: Box<Stmt>,
    },
    For {
        var: Rc<str>,
        seq: Expr,
        body: Box<Stmt>,
    },
    Break,
    Continue,
    Return(Option<Expr>),
    Class(Rc<ClassDecl>),
    Import {
        module: Rc<str>,
        /// `(name in the imported module, local alias)`
        names: Vec<(Rc<str>, Rc<str>)>,
    },
}

#[derive(Debug, Clone)]
pub enum Expr {
    Null,
    Bool(bool),
    Num(f64),
    Str(Rc<str>),
    Interpolation(Vec<InterpSegment>),
    List(Vec<Expr>),
    Map(Vec<(Expr, Expr)>),
    Var(Rc<str>),
    Field(Rc<str>),
    StaticField(Rc<str>),
    This,
    Assign {
        target: Rc<str>,
        value: Box<Expr>,
    },
    FieldAssign {
        field: Rc<str>,
        is_static: bool,
        value: Box<Expr>,
    },
    /// Method call, getter access or bare call on `this`.
    ///
    /// `args == None` means getter syntax (`a.b`); a block argument is
    /// appended to the argument list.
    Call {
        receiver: Option<Box<Expr>>,
        name: Rc<str>,
        args: Option<Vec<Expr>>,
    },
    Setter {
        receiver: Box<Expr>,
        name: Rc<str>,
        value: Box<Expr>,
    },
    Subscript {
        receiver: Box<Expr>,
        args: Vec<Expr>,
    },
    SubscriptSet {
        receiver: Box<Expr>,
        args: Vec<Expr>,
        value: Box<Expr>,
    },
    /// Infix operator dispatched as a method (`+(_)`, `is(_)`, ...)
    Binary {
        op: &'static str,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// Prefix operator dispatched as a method (`-`, `!`, `~`)
    Unary {
        op: &'static str,
        operand: Box<Expr>,
    },
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Conditional {
        cond: Box<Expr>,
        then_expr: Box<Expr>,
        else_expr: Box<Expr>,
    },
    Range {
        from: Box<Expr>,
        to: Box<Expr>,
        inclusive: bool,
    },
    Closure(Rc<FnDecl>),
}

#[derive(Debug, Clone)]
pub enum InterpSegment {
    Text(Rc<str>),
    Expr(Expr),
}

/// Parameters and body of a block argument or method.
#[derive(Debug, Clone)]
pub struct FnDecl {
    pub params: Vec<Rc<str>>,
    pub body: Rc<Vec<Stmt>>,
}

#[derive(Debug, Clone)]
pub struct ClassDecl {
    pub name: Rc<str>,
    pub superclass: Option<Rc<str>>,
    pub is_foreign: bool,
    pub methods: Vec<MethodDecl>,
    pub line: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodKind {
    Method,
    Getter,
    Setter,
    Subscript,
    SubscriptSetter,
    Infix,
    Prefix,
    Constructor,
}

#[derive(Debug, Clone)]
pub struct MethodDecl {
    pub kind: MethodKind,
    pub name: Rc<str>,
    pub params: Vec<Rc<str>>,
    pub is_static: bool,
    pub is_foreign: bool,
    /// `None` for foreign methods
    pub body: Option<Rc<Vec<Stmt>>>,
    pub line: u32,
}

impl MethodDecl {
    /// The dispatch signature of this method, e.g. `add(_,_)` or `x=(_)`.
    pub fn signature(&self) -> String {
        match self.kind {
            MethodKind::Method | MethodKind::Constructor => {
                crate::signature::method(&self.name, self.params.len())
            }
            MethodKind::Getter => self.name.to_string(),
            MethodKind::Setter => crate::signature::setter(&self.name),
            MethodKind::Subscript => crate::signature::subscript(self.params.len()),
            MethodKind::SubscriptSetter => {
                crate::signature::subscript_setter(self.params.len().saturating_sub(1))
            }
            MethodKind::Infix => crate::signature::infix(&self.name),
            MethodKind::Prefix => self.name.to_string(),
        }
    }
}
