//! Declarative binding surface
//!
//! A [`ModuleDecl`] lists the classes a script module should see. Classes
//! come in three shapes:
//!
//! - namespaces ([`ClassDecl::namespace`]) hold static functions only
//! - objects ([`ClassDecl::object`]) wrap a host type in a foreign class
//! - enums ([`EnumDecl::of`]) expose integer constants
//!
//! Declarations are plain data until compiled by the session.

use crate::function::{HostFn, IntoForeignFn};
use crate::host::{HostEnum, HostType};
use crate::types::{short_type_name, HostTypeId, TypeTag};

/// Bindings for one script module
pub struct ModuleDecl {
    pub(crate) name: String,
    pub(crate) classes: Vec<ClassDecl>,
}

impl ModuleDecl {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            classes: Vec::new(),
        }
    }

    /// Add a class; classes are bound in the order they are added.
    pub fn class(mut self, class: impl Into<ClassDecl>) -> Self {
        self.classes.push(class.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MemberKind {
    Method,
    Getter,
    Setter,
    Constructor,
    Operator,
    Subscript,
    SubscriptSetter,
}

pub(crate) struct MemberDecl {
    /// Name the host registered the member under
    pub host_name: String,
    /// Name visible to scripts
    pub script_name: String,
    pub kind: MemberKind,
    pub is_static: bool,
    pub inline: bool,
    pub params: Vec<TypeTag>,
    pub ret: TypeTag,
    pub func: HostFn,
}

pub(crate) struct FieldMember {
    pub name: String,
    pub tag: TypeTag,
    pub getter: HostFn,
    pub setter: Option<HostFn>,
}

pub(crate) enum ClassShape {
    Namespace,
    Object(HostTypeId),
    Enum {
        host: HostTypeId,
        variants: Vec<(String, i64)>,
    },
}

/// A script class backed by host functions
pub struct ClassDecl {
    pub(crate) name: String,
    pub(crate) shape: ClassShape,
    pub(crate) members: Vec<MemberDecl>,
    pub(crate) fields: Vec<FieldMember>,
}

impl ClassDecl {
    /// A class of static functions.
    pub fn namespace(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            shape: ClassShape::Namespace,
            members: Vec::new(),
            fields: Vec::new(),
        }
    }

    /// A foreign class wrapping `T`, named after the type.
    ///
    /// Fields listed by [`HostType::fields`] become getter/setter pairs unless
    /// a member with the same signature is declared explicitly.
    pub fn object<T: HostType>() -> Self {
        let host = HostTypeId::of::<T>();
        let fields = T::fields()
            .into_iter()
            .map(|field| FieldMember {
                name: field.name,
                tag: field.tag,
                getter: field.getter,
                setter: field.setter,
            })
            .collect();
        Self {
            name: host.short_name(),
            shape: ClassShape::Object(host),
            members: Vec::new(),
            fields,
        }
    }

    /// Rename the class as seen by scripts.
    pub fn alias(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn is_namespace(&self) -> bool {
        matches!(self.shape, ClassShape::Namespace)
    }

    fn push<F, Args, R>(
        mut self,
        host_name: &str,
        script_name: &str,
        kind: MemberKind,
        is_static: bool,
        inline: bool,
        f: F,
    ) -> Self
    where
        F: IntoForeignFn<Args, R>,
    {
        let is_static = is_static || self.is_namespace() || kind == MemberKind::Constructor;
        self.members.push(MemberDecl {
            host_name: host_name.to_string(),
            script_name: script_name.to_string(),
            kind,
            is_static,
            inline,
            params: F::param_tags(),
            ret: F::return_tag(),
            func: f.into_host_fn(!is_static),
        });
        self
    }

    /// A method. On object classes the first parameter is the receiver and
    /// must be `Obj<Self>`.
    pub fn proc<F, Args, R>(self, name: &str, f: F) -> Self
    where
        F: IntoForeignFn<Args, R>,
    {
        self.push(name, name, MemberKind::Method, false, false, f)
    }

    /// A method exposed to scripts under `alias`.
    pub fn proc_as<F, Args, R>(self, name: &str, alias: &str, f: F) -> Self
    where
        F: IntoForeignFn<Args, R>,
    {
        self.push(name, alias, MemberKind::Method, false, false, f)
    }

    /// A method implemented by a closure with no named host counterpart.
    pub fn inline<F, Args, R>(self, name: &str, f: F) -> Self
    where
        F: IntoForeignFn<Args, R>,
    {
        self.push(name, name, MemberKind::Method, false, true, f)
    }

    /// A static method on an object class.
    pub fn static_proc<F, Args, R>(self, name: &str, f: F) -> Self
    where
        F: IntoForeignFn<Args, R>,
    {
        if self.is_namespace() {
            tracing::warn!(
                class = %self.name,
                member = name,
                "namespace members are always static"
            );
        }
        self.push(name, name, MemberKind::Method, true, false, f)
    }

    /// A property read without parentheses.
    pub fn getter<F, Args, R>(self, name: &str, f: F) -> Self
    where
        F: IntoForeignFn<Args, R>,
    {
        self.push(name, name, MemberKind::Getter, false, false, f)
    }

    /// A property assignment `name = value`.
    pub fn setter<F, Args, R>(self, name: &str, f: F) -> Self
    where
        F: IntoForeignFn<Args, R>,
    {
        self.push(name, name, MemberKind::Setter, false, false, f)
    }

    /// A static constructor returning `Obj<Self>`.
    pub fn constructor<F, Args, R>(self, name: &str, f: F) -> Self
    where
        F: IntoForeignFn<Args, R>,
    {
        self.push(name, name, MemberKind::Constructor, true, false, f)
    }

    /// An operator: infix (`+`, `==`, ...) with one argument, prefix (`-`,
    /// `!`, `~`) with none, or the subscripts `[]` and `[]=`.
    pub fn operator<F, Args, R>(self, op: &str, f: F) -> Self
    where
        F: IntoForeignFn<Args, R>,
    {
        let kind = match op {
            "[]" => MemberKind::Subscript,
            "[]=" => MemberKind::SubscriptSetter,
            _ => MemberKind::Operator,
        };
        self.push(op, op, kind, false, false, f)
    }
}

/// A host enum exposed as a class of constants
pub struct EnumDecl {
    name: String,
    host: HostTypeId,
    variants: Vec<(String, i64)>,
}

impl EnumDecl {
    pub fn of<E: HostEnum>() -> Self {
        let variants = E::variants()
            .iter()
            .map(|(name, variant)| (name.to_string(), variant.ordinal()))
            .collect();
        Self {
            name: short_type_name(std::any::type_name::<E>()),
            host: HostTypeId::of::<E>(),
            variants,
        }
    }

    /// Drop `prefix` from variant names that start with it.
    pub fn strip_prefix(mut self, prefix: &str) -> Self {
        for (name, _) in &mut self.variants {
            if let Some(rest) = name.strip_prefix(prefix) {
                if !rest.is_empty() {
                    *name = rest.to_string();
                }
            }
        }
        self
    }

    pub fn alias(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl From<EnumDecl> for ClassDecl {
    fn from(decl: EnumDecl) -> Self {
        Self {
            name: decl.name,
            shape: ClassShape::Enum {
                host: decl.host,
                variants: decl.variants,
            },
            members: Vec::new(),
            fields: Vec::new(),
        }
    }
}
