//! Type tags describing the script-visible shape of host values

use std::any::TypeId;
use std::fmt;

/// Identity of a host type bound to a script class or enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HostTypeId {
    id: TypeId,
    name: &'static str,
}

impl HostTypeId {
    pub fn of<T: 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.id
    }

    /// Fully qualified host type name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Host type name without its path or generic arguments.
    pub fn short_name(&self) -> String {
        short_type_name(self.name)
    }
}

/// Reduce `a::b::Pair<c::D>` to `Pair`.
pub fn short_type_name(full: &str) -> String {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base).to_string()
}

/// The script-facing category of a parameter or return value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeTag {
    Int,
    Float,
    Bool,
    Str,
    List(Box<TypeTag>),
    Map(Box<TypeTag>, Box<TypeTag>),
    Enum(HostTypeId),
    /// Opaque handle to any script value
    Ref,
    /// A bound host object
    Object(HostTypeId),
    Null,
    Optional(Box<TypeTag>),
    /// Dynamically typed value
    Any,
}

impl TypeTag {
    /// Host types this tag refers to, nested ones included.
    pub fn host_types(&self) -> Vec<HostTypeId> {
        let mut found = Vec::new();
        self.collect_host_types(&mut found);
        found
    }

    fn collect_host_types(&self, found: &mut Vec<HostTypeId>) {
        match self {
            TypeTag::Enum(id) | TypeTag::Object(id) => found.push(*id),
            TypeTag::List(inner) | TypeTag::Optional(inner) => inner.collect_host_types(found),
            TypeTag::Map(key, value) => {
                key.collect_host_types(found);
                value.collect_host_types(found);
            }
            _ => {}
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeTag::Int => write!(f, "Int"),
            TypeTag::Float => write!(f, "Float"),
            TypeTag::Bool => write!(f, "Bool"),
            TypeTag::Str => write!(f, "String"),
            TypeTag::List(inner) => write!(f, "List<{}>", inner),
            TypeTag::Map(key, value) => write!(f, "Map<{}, {}>", key, value),
            TypeTag::Enum(id) | TypeTag::Object(id) => write!(f, "{}", id.short_name()),
            TypeTag::Ref => write!(f, "Ref"),
            TypeTag::Null => write!(f, "Null"),
            TypeTag::Optional(inner) => write!(f, "{}?", inner),
            TypeTag::Any => write!(f, "Any"),
        }
    }
}
