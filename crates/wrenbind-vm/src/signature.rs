//! Method signature strings.
//!
//! Every method is dispatched by a signature string that encodes its name
//! and arity the way call sites spell it: `name(_,_)` for methods, `name`
//! for getters, `name=(_)` for setters, `[_]` / `[_]=(_)` for subscripts
//! and `+(_)` / `-` for infix and prefix operators.

/// `name(_,...)` with `arity` placeholders.
pub fn method(name: &str, arity: usize) -> String {
    format!("{}({})", name, placeholders(arity))
}

/// `name=(_)`
pub fn setter(name: &str) -> String {
    format!("{}=(_)", name)
}

/// `[_,...]`
pub fn subscript(arity: usize) -> String {
    format!("[{}]", placeholders(arity))
}

/// `[_,...]=(_)`
pub fn subscript_setter(arity: usize) -> String {
    format!("[{}]=(_)", placeholders(arity))
}

/// `op(_)`
pub fn infix(op: &str) -> String {
    format!("{}(_)", op)
}

/// Number of arguments (receiver excluded) a signature takes.
pub fn arity(signature: &str) -> usize {
    // Names may contain underscores; placeholders always follow `(`, `[` or `,`.
    signature
        .as_bytes()
        .windows(2)
        .filter(|pair| pair[1] == b'_' && matches!(pair[0], b'(' | b'[' | b','))
        .count()
}

fn placeholders(arity: usize) -> String {
    vec!["_"; arity].join(",")
}
