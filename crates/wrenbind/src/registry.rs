//! Registry of host types bound to script classes
//!
//! Every bound class is recorded under its `(module, class)` pair and, when it
//! wraps a host type, under that type's [`TypeId`]. The marshaller uses the
//! latter to find the script class for host objects it has to hand back.

use std::any::TypeId;

use rustc_hash::FxHashMap;

use crate::error::BindError;
use crate::types::{HostTypeId, TypeTag};

/// What kind of script class a binding produces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    /// Plain class holding static members only
    Namespace,
    /// Foreign class wrapping a host object
    Object,
    /// Class exposing enum constants
    Enum,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeBinding {
    pub module: String,
    pub class_name: String,
    pub kind: BindingKind,
    pub host: Option<HostTypeId>,
}

#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    bindings: Vec<TypeBinding>,
    by_name: FxHashMap<(String, String), usize>,
    by_type: FxHashMap<TypeId, usize>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a class binding.
    ///
    /// Fails when the class name is taken in `module` or the host type is
    /// already bound elsewhere.
    pub fn register(
        &mut self,
        module: &str,
        class_name: &str,
        kind: BindingKind,
        host: Option<HostTypeId>,
    ) -> Result<&TypeBinding, BindError> {
        let key = (module.to_string(), class_name.to_string());
        if self.by_name.contains_key(&key) {
            return Err(BindError::DuplicateBinding(format!(
                "class '{}' in module '{}'",
                class_name, module
            )));
        }
        if let Some(host) = host {
            if let Some(existing) = self.resolve(host.type_id()) {
                return Err(BindError::DuplicateBinding(format!(
                    "host type '{}' is already bound as '{}.{}'",
                    host.name(),
                    existing.module,
                    existing.class_name
                )));
            }
        }

        let index = self.bindings.len();
        self.bindings.push(TypeBinding {
            module: module.to_string(),
            class_name: class_name.to_string(),
            kind,
            host,
        });
        self.by_name.insert(key, index);
        if let Some(host) = host {
            self.by_type.insert(host.type_id(), index);
        }
        tracing::trace!(module, class = class_name, ?kind, "registered class");
        Ok(&self.bindings[index])
    }

    pub fn resolve(&self, type_id: TypeId) -> Option<&TypeBinding> {
        self.by_type.get(&type_id).map(|&index| &self.bindings[index])
    }

    pub fn resolve_name(&self, module: &str, class_name: &str) -> Option<&TypeBinding> {
        self.by_name
            .get(&(module.to_string(), class_name.to_string()))
            .map(|&index| &self.bindings[index])
    }

    /// Check that every host type mentioned by `tag` has been registered.
    pub fn check_known(&self, tag: &TypeTag, context: &str) -> Result<(), BindError> {
        for host in tag.host_types() {
            if self.resolve(host.type_id()).is_none() {
                return Err(BindError::UnknownType {
                    type_name: host.short_name(),
                    context: context.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Bindings in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &TypeBinding> {
        self.bindings.iter()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Point;
    struct Other;

    #[test]
    fn test_register_and_resolve() {
        let mut registry = TypeRegistry::new();
        registry
            .register("geo", "Point", BindingKind::Object, Some(HostTypeId::of::<Point>()))
            .unwrap();
        registry.register("geo", "Math", BindingKind::Namespace, None).unwrap();

        let binding = registry.resolve(TypeId::of::<Point>()).unwrap();
        assert_eq!(binding.module, "geo");
        assert_eq!(binding.class_name, "Point");
        assert!(registry.resolve(TypeId::of::<Other>()).is_none());
        assert_eq!(registry.resolve_name("geo", "Math").unwrap().kind, BindingKind::Namespace);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_duplicate_class_name() {
        let mut registry = TypeRegistry::new();
        registry.register("main", "Math", BindingKind::Namespace, None).unwrap();
        let result = registry.register("main", "Math", BindingKind::Namespace, None);
        assert!(matches!(result, Err(BindError::DuplicateBinding(_))));

        // The same name in another module is a different class.
        assert!(registry.register("other", "Math", BindingKind::Namespace, None).is_ok());
    }

    #[test]
    fn test_duplicate_host_type() {
        let mut registry = TypeRegistry::new();
        let host = Some(HostTypeId::of::<Point>());
        registry.register("main", "Point", BindingKind::Object, host).unwrap();
        let result = registry.register("main", "Vec2", BindingKind::Object, host);
        assert!(matches!(result, Err(BindError::DuplicateBinding(_))));
    }

    #[test]
    fn test_check_known() {
        let mut registry = TypeRegistry::new();
        let tag = TypeTag::List(Box::new(TypeTag::Object(HostTypeId::of::<Point>())));
        assert_eq!(
            registry.check_known(&tag, "Shapes.all()"),
            Err(BindError::UnknownType {
                type_name: "Point".to_string(),
                context: "Shapes.all()".to_string(),
            })
        );
        registry
            .register("main", "Point", BindingKind::Object, Some(HostTypeId::of::<Point>()))
            .unwrap();
        assert!(registry.check_known(&tag, "Shapes.all()").is_ok());
        assert!(registry.check_known(&TypeTag::Int, "x").is_ok());
    }
}
