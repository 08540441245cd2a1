//! Binding compiler
//!
//! Turns a [`ModuleDecl`] into script glue source plus the dispatch entries
//! the VM binds `foreign` members to. Classes are processed in declaration
//! order, so a signature may only mention host types registered earlier in
//! the same module or by previously declared modules.

use std::fmt::Write as _;

use rustc_hash::FxHashSet;
use wrenbind_vm::signature;

use crate::decl::{ClassDecl, ClassShape, MemberDecl, MemberKind, ModuleDecl};
use crate::dispatch::{DispatchEntry, DispatchKey};
use crate::error::BindError;
use crate::function::HostFn;
use crate::registry::{BindingKind, TypeRegistry};
use crate::types::{HostTypeId, TypeTag};

const RESERVED_WORDS: &[&str] = &[
    "as", "break", "class", "construct", "continue", "else", "false", "for", "foreign", "if",
    "import", "in", "is", "null", "return", "static", "super", "this", "true", "var", "while",
];

const INFIX_OPERATORS: &[&str] = &[
    "+", "-", "*", "/", "%", "<", ">", "<=", ">=", "==", "!=", "..", "...",
];

const PREFIX_OPERATORS: &[&str] = &["-", "!", "~"];

/// Output of compiling one module declaration
pub struct CompiledModule {
    pub name: String,
    pub glue: String,
    pub classes: Vec<ClassSummary>,
    pub(crate) entries: Vec<(DispatchKey, DispatchEntry)>,
}

/// Description of a bound class for diagnostics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassSummary {
    pub name: String,
    pub kind: BindingKind,
    /// Glue declarations of every member
    pub members: Vec<String>,
}

/// Whether `name` can be used as a script identifier.
pub fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    let starts_ok = chars
        .next()
        .is_some_and(|first| first.is_ascii_alphabetic());
    starts_ok
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !RESERVED_WORDS.contains(&name)
}

fn check_name(name: &str) -> Result<(), BindError> {
    if is_valid_name(name) {
        Ok(())
    } else {
        Err(BindError::InvalidName(name.to_string()))
    }
}

/// Compile `decl`, registering its classes in `registry`.
///
/// On error `registry` may hold part of the module; callers compile against
/// a copy and keep it only on success.
pub fn compile(decl: ModuleDecl, registry: &mut TypeRegistry) -> Result<CompiledModule, BindError> {
    let mut compiled = CompiledModule {
        name: decl.name,
        glue: String::new(),
        classes: Vec::new(),
        entries: Vec::new(),
    };
    if compiled.name.is_empty() {
        return Err(BindError::InvalidName(String::new()));
    }

    let module = compiled.name.clone();
    for class in decl.classes {
        let summary = compile_class(&module, class, registry, &mut compiled)?;
        compiled.classes.push(summary);
    }

    tracing::debug!(
        module = %compiled.name,
        classes = compiled.classes.len(),
        entries = compiled.entries.len(),
        "compiled bindings"
    );
    Ok(compiled)
}

fn compile_class(
    module: &str,
    class: ClassDecl,
    registry: &mut TypeRegistry,
    out: &mut CompiledModule,
) -> Result<ClassSummary, BindError> {
    check_name(&class.name)?;
    let (kind, host) = match &class.shape {
        ClassShape::Namespace => (BindingKind::Namespace, None),
        ClassShape::Object(host) => (BindingKind::Object, Some(*host)),
        ClassShape::Enum { host, .. } => (BindingKind::Enum, Some(*host)),
    };
    registry.register(module, &class.name, kind, host)?;

    let mut lines = Vec::new();
    if let ClassShape::Enum { variants, .. } = &class.shape {
        lines = enum_lines(&class.name, variants)?;
    }

    let mut emitter = ClassEmitter {
        module,
        class: &class.name,
        host: match &class.shape {
            ClassShape::Object(host) => Some(*host),
            _ => None,
        },
        registry,
        seen: FxHashSet::default(),
        lines: &mut lines,
        entries: &mut out.entries,
    };
    for member in class.members {
        emitter.member(member)?;
    }
    for field in class.fields {
        check_name(&field.name)?;
        emitter.check_known(&field.tag, &field.name)?;
        let field_getter = signature_for(MemberKind::Getter, &field.name, 0);
        if !emitter.seen.contains(&(false, field_getter.clone())) {
            emitter.emit(&field.name, false, MemberKind::Getter, &field.name, 0, field.getter, vec![], field.tag.clone(), false);
        }
        if let Some(setter) = field.setter {
            let field_setter = signature_for(MemberKind::Setter, &field.name, 1);
            if !emitter.seen.contains(&(false, field_setter)) {
                emitter.emit(&field.name, false, MemberKind::Setter, &field.name, 1, setter, vec![field.tag], TypeTag::Null, false);
            }
        }
    }

    let header = match kind {
        BindingKind::Object => format!("foreign class {} {{", class.name),
        _ => format!("class {} {{", class.name),
    };
    let _ = writeln!(out.glue, "{}", header);
    for line in &lines {
        let _ = writeln!(out.glue, "  {}", line);
    }
    let _ = writeln!(out.glue, "}}\n");

    Ok(ClassSummary {
        name: class.name,
        kind,
        members: lines,
    })
}

fn enum_lines(class: &str, variants: &[(String, i64)]) -> Result<Vec<String>, BindError> {
    let mut seen = FxHashSet::default();
    let mut ordinals = FxHashSet::default();
    let mut lines = Vec::with_capacity(variants.len() + 2);
    for (name, ordinal) in variants {
        check_name(name)?;
        if !seen.insert(name.as_str()) {
            return Err(BindError::DuplicateBinding(format!(
                "variant '{}' in enum '{}'",
                name, class
            )));
        }
        if !ordinals.insert(*ordinal) {
            return Err(BindError::DuplicateBinding(format!(
                "ordinal {} of variant '{}' in enum '{}'",
                ordinal, name, class
            )));
        }
        lines.push(format!("static {} {{ {} }}", name, ordinal));
    }
    // A variant named `low` or `high` is shadowed by these.
    let low = variants.iter().map(|(_, ordinal)| *ordinal).min();
    let high = variants.iter().map(|(_, ordinal)| *ordinal).max();
    if let (Some(low), Some(high)) = (low, high) {
        lines.push(format!("static low {{ {} }}", low));
        lines.push(format!("static high {{ {} }}", high));
    }
    Ok(lines)
}

fn signature_for(kind: MemberKind, name: &str, arity: usize) -> String {
    match kind {
        MemberKind::Method | MemberKind::Constructor => signature::method(name, arity),
        MemberKind::Getter => name.to_string(),
        MemberKind::Setter => signature::setter(name),
        MemberKind::Operator if arity == 0 => name.to_string(),
        MemberKind::Operator => signature::infix(name),
        MemberKind::Subscript => signature::subscript(arity),
        MemberKind::SubscriptSetter => signature::subscript_setter(arity.saturating_sub(1)),
    }
}

fn glue_params(count: usize) -> String {
    (0..count)
        .map(|index| format!("a{}", index))
        .collect::<Vec<_>>()
        .join(", ")
}

fn glue_declaration(kind: MemberKind, name: &str, is_static: bool, arity: usize) -> String {
    let body = match kind {
        MemberKind::Method | MemberKind::Constructor => format!("{}({})", name, glue_params(arity)),
        MemberKind::Getter => name.to_string(),
        MemberKind::Setter => format!("{}=(a0)", name),
        MemberKind::Operator if arity == 0 => name.to_string(),
        MemberKind::Operator => format!("{}(a0)", name),
        MemberKind::Subscript => format!("[{}]", glue_params(arity)),
        MemberKind::SubscriptSetter => {
            format!("[{}]=(a{})", glue_params(arity - 1), arity - 1)
        }
    };
    if is_static {
        format!("foreign static {}", body)
    } else {
        format!("foreign {}", body)
    }
}

struct ClassEmitter<'a> {
    module: &'a str,
    class: &'a str,
    host: Option<HostTypeId>,
    registry: &'a TypeRegistry,
    seen: FxHashSet<(bool, String)>,
    lines: &'a mut Vec<String>,
    entries: &'a mut Vec<(DispatchKey, DispatchEntry)>,
}

impl ClassEmitter<'_> {
    fn invalid(&self, member: &str, reason: impl Into<String>) -> BindError {
        BindError::InvalidMember {
            class: self.class.to_string(),
            member: member.to_string(),
            reason: reason.into(),
        }
    }

    fn check_known(&self, tag: &TypeTag, member: &str) -> Result<(), BindError> {
        self.registry
            .check_known(tag, &format!("{}.{}", self.class, member))
    }

    fn member(&mut self, member: MemberDecl) -> Result<(), BindError> {
        let MemberDecl {
            host_name,
            script_name,
            kind,
            is_static,
            inline,
            params,
            ret,
            func,
        } = member;

        match kind {
            MemberKind::Operator | MemberKind::Subscript | MemberKind::SubscriptSetter => {}
            _ => check_name(&script_name)?,
        }
        for tag in params.iter().chain(std::iter::once(&ret)) {
            self.check_known(tag, &script_name)?;
        }

        // Instance members read their receiver from the first parameter.
        let script_params = if is_static {
            params.clone()
        } else {
            let receiver = self.host.map(TypeTag::Object);
            match (params.first(), receiver) {
                (Some(first), Some(expected)) if *first == expected => params[1..].to_vec(),
                _ => {
                    return Err(BindError::InvalidReceiver {
                        class: self.class.to_string(),
                        member: script_name,
                    })
                }
            }
        };
        let arity = script_params.len();

        match kind {
            MemberKind::Getter if arity != 0 => {
                return Err(self.invalid(&script_name, "getters take no arguments"))
            }
            MemberKind::Setter if arity != 1 => {
                return Err(self.invalid(&script_name, "setters take exactly one argument"))
            }
            MemberKind::Constructor => {
                if self.host.is_none() {
                    return Err(self.invalid(&script_name, "constructors require an object class"));
                }
                if ret != self.host.map(TypeTag::Object).unwrap_or(TypeTag::Null) {
                    return Err(self.invalid(
                        &script_name,
                        format!("constructors must return Obj<{}>", self.class),
                    ));
                }
            }
            MemberKind::Operator => {
                let valid = match arity {
                    0 => PREFIX_OPERATORS.contains(&script_name.as_str()),
                    1 => INFIX_OPERATORS.contains(&script_name.as_str()),
                    _ => false,
                };
                if !valid || is_static {
                    return Err(self.invalid(&script_name, "not a valid instance operator"));
                }
            }
            MemberKind::Subscript if arity == 0 || is_static => {
                return Err(self.invalid(&script_name, "subscripts take at least one index"))
            }
            MemberKind::SubscriptSetter if arity < 2 || is_static => {
                return Err(self.invalid(
                    &script_name,
                    "subscript setters take at least one index and a value",
                ))
            }
            _ => {}
        }

        let signature = signature_for(kind, &script_name, arity);
        if self.seen.contains(&(is_static, signature.clone())) {
            return Err(BindError::DuplicateBinding(format!(
                "'{}' in class '{}'",
                signature, self.class
            )));
        }
        self.emit(&host_name, is_static, kind, &script_name, arity, func, script_params, ret, inline);
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn emit(
        &mut self,
        host_name: &str,
        is_static: bool,
        kind: MemberKind,
        script_name: &str,
        arity: usize,
        func: HostFn,
        params: Vec<TypeTag>,
        ret: TypeTag,
        inline: bool,
    ) {
        let signature = signature_for(kind, script_name, arity);
        self.lines
            .push(glue_declaration(kind, script_name, is_static, arity));
        self.seen.insert((is_static, signature.clone()));

        let label = format!("{}.{}", self.class, signature);
        tracing::trace!(module = self.module, method = %label, host = host_name, "bound member");
        let key = DispatchKey {
            module: self.module.to_string(),
            class: self.class.to_string(),
            is_static,
            signature,
        };
        self.entries.push((
            key,
            DispatchEntry {
                label,
                host_name: host_name.to_string(),
                arity,
                params,
                ret,
                inline,
                func,
            },
        ));
    }
}
