//! Host objects and enums exposed to scripts
//!
//! Host structs are shared with scripts as [`Obj<T>`]: a reference counted
//! cell stored as the foreign data of a script object. Enums implementing
//! [`HostEnum`] travel as their integer ordinals.

use std::any::{Any, TypeId};
use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

use wrenbind_vm::SlotType;

use crate::error::MarshalError;
use crate::function::{CallFailure, HostFn};
use crate::marshal::{FromSlot, Slots, Tagged, ToSlot};
use crate::types::{HostTypeId, TypeTag};

// ============================================================================
// Objects
// ============================================================================

/// Host types that can back a foreign script class.
pub trait HostType: 'static {
    /// Public fields surfaced as getter/setter pairs.
    fn fields() -> Vec<FieldDecl<Self>>
    where
        Self: Sized,
    {
        Vec::new()
    }
}

/// Shared handle to a host object living inside a script object
pub struct Obj<T>(Rc<RefCell<T>>);

impl<T> Obj<T> {
    pub fn new(value: T) -> Self {
        Self(Rc::new(RefCell::new(value)))
    }

    /// # Panics
    ///
    /// Panics if the object is currently mutably borrowed.
    pub fn borrow(&self) -> Ref<'_, T> {
        self.0.borrow()
    }

    /// # Panics
    ///
    /// Panics if the object is currently borrowed.
    pub fn borrow_mut(&self) -> RefMut<'_, T> {
        self.0.borrow_mut()
    }

    /// Whether both handles point at the same object.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl<T: Clone> Obj<T> {
    pub fn get(&self) -> T {
        self.0.borrow().clone()
    }
}

impl<T> Clone for Obj<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T: fmt::Debug> fmt::Debug for Obj<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Obj").field(&self.0.borrow()).finish()
    }
}

impl<T: HostType> Tagged for Obj<T> {
    fn type_tag() -> TypeTag {
        TypeTag::Object(HostTypeId::of::<T>())
    }
}

impl<T: HostType> FromSlot for Obj<T> {
    fn from_slot(slots: &mut Slots<'_>, slot: usize) -> Result<Self, MarshalError> {
        let expected = Self::type_tag();
        slots.expect(slot, SlotType::Foreign, &expected)?;
        let data = slots.vm().get_slot_foreign(slot)?;
        data.downcast::<RefCell<T>>()
            .map(Obj)
            .map_err(|_| slots.mismatch(&expected, slot))
    }
}

impl<T: HostType> ToSlot for Obj<T> {
    fn to_slot(self, slots: &mut Slots<'_>, slot: usize) -> Result<(), MarshalError> {
        let binding = slots
            .types()
            .resolve(TypeId::of::<T>())
            .ok_or_else(|| MarshalError::UnknownType(HostTypeId::of::<T>().short_name()))?;
        let data: Rc<dyn Any> = self.0;
        slots.with_scratch(|slots, class_slot| {
            let vm = slots.vm();
            vm.get_variable(&binding.module, &binding.class_name, class_slot)?;
            vm.set_slot_new_foreign(slot, class_slot, data)?;
            Ok(())
        })
    }
}

// ============================================================================
// Fields
// ============================================================================

/// A host struct field exposed as a script property
pub struct FieldDecl<T> {
    pub(crate) name: String,
    pub(crate) tag: TypeTag,
    pub(crate) getter: HostFn,
    pub(crate) setter: Option<HostFn>,
    _owner: std::marker::PhantomData<fn(T)>,
}

impl<T: HostType> FieldDecl<T> {
    /// A readable and writable field.
    pub fn new<V>(
        name: &str,
        get: impl Fn(&T) -> V + 'static,
        set: impl Fn(&mut T, V) + 'static,
    ) -> Self
    where
        V: FromSlot + ToSlot + 'static,
    {
        let mut field = Self::read_only(name, get);
        field.setter = Some(Rc::new(move |slots: &mut Slots<'_>| {
            let this = Obj::<T>::from_slot(slots, 0)
                .map_err(|error| CallFailure::Argument { slot: 0, error })?;
            let value = V::from_slot(slots, 1).map_err(|error| CallFailure::Argument { slot: 1, error })?;
            set(&mut this.borrow_mut(), value);
            ().to_slot(slots, 0).map_err(CallFailure::Return)
        }));
        field
    }

    /// A field scripts can read but not assign.
    pub fn read_only<V>(name: &str, get: impl Fn(&T) -> V + 'static) -> Self
    where
        V: ToSlot + 'static,
    {
        let getter: HostFn = Rc::new(move |slots: &mut Slots<'_>| {
            let this = Obj::<T>::from_slot(slots, 0)
                .map_err(|error| CallFailure::Argument { slot: 0, error })?;
            let value = get(&this.borrow());
            value.to_slot(slots, 0).map_err(CallFailure::Return)
        });
        Self {
            name: name.to_string(),
            tag: <V as Tagged>::type_tag(),
            getter,
            setter: None,
            _owner: std::marker::PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Implement [`HostType`] for a struct, exposing the listed fields.
///
/// ```ignore
/// host_fields!(Point { x: f64, y: f64 });
/// host_fields!(Opaque);
/// ```
#[macro_export]
macro_rules! host_fields {
    ($ty:ty) => {
        impl $crate::HostType for $ty {}
    };
    ($ty:ty { $($field:ident : $fty:ty),* $(,)? }) => {
        impl $crate::HostType for $ty {
            fn fields() -> Vec<$crate::FieldDecl<Self>> {
                vec![$(
                    $crate::FieldDecl::new(
                        stringify!($field),
                        |this: &$ty| -> $fty { this.$field.clone() },
                        |this: &mut $ty, value: $fty| this.$field = value,
                    )
                ),*]
            }
        }
    };
}

// ============================================================================
// Enums
// ============================================================================

/// Host enums exposed as classes of integer constants.
pub trait HostEnum: Copy + 'static {
    /// Every variant with its host name, in declaration order.
    fn variants() -> &'static [(&'static str, Self)];

    fn ordinal(self) -> i64;

    fn from_ordinal(ordinal: i64) -> Option<Self> {
        Self::variants()
            .iter()
            .map(|(_, variant)| *variant)
            .find(|variant| variant.ordinal() == ordinal)
    }
}

/// Decode an enum passed as its ordinal.
pub fn decode_enum<E: HostEnum>(slots: &mut Slots<'_>, slot: usize) -> Result<E, MarshalError> {
    let expected = TypeTag::Enum(HostTypeId::of::<E>());
    slots.expect(slot, SlotType::Num, &expected)?;
    let value = slots.vm().get_slot_double(slot)?;
    let out_of_range = || MarshalError::OutOfRange {
        value: value.to_string(),
        target: expected.to_string(),
    };
    if value.fract() != 0.0 || value.is_nan() {
        return Err(out_of_range());
    }
    E::from_ordinal(value as i64).ok_or_else(out_of_range)
}

pub fn encode_enum<E: HostEnum>(value: E, slots: &mut Slots<'_>, slot: usize) -> Result<(), MarshalError> {
    slots.vm().set_slot_double(slot, value.ordinal() as f64)?;
    Ok(())
}

/// Define an enum usable as a binding parameter or return value.
///
/// ```ignore
/// host_enum! {
///     pub enum Mode { Fast = 1, Safe = 2 }
/// }
/// ```
#[macro_export]
macro_rules! host_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $($variant:ident $(= $value:expr)?),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        $vis enum $name {
            $($variant $(= $value)?),+
        }

        impl $crate::HostEnum for $name {
            fn variants() -> &'static [(&'static str, Self)] {
                &[$((stringify!($variant), $name::$variant)),+]
            }

            fn ordinal(self) -> i64 {
                self as i64
            }
        }

        impl $crate::Tagged for $name {
            fn type_tag() -> $crate::TypeTag {
                $crate::TypeTag::Enum($crate::HostTypeId::of::<Self>())
            }
        }

        impl $crate::FromSlot for $name {
            fn from_slot(
                slots: &mut $crate::Slots<'_>,
                slot: usize,
            ) -> Result<Self, $crate::MarshalError> {
                $crate::host::decode_enum(slots, slot)
            }
        }

        impl $crate::ToSlot for $name {
            fn to_slot(
                self,
                slots: &mut $crate::Slots<'_>,
                slot: usize,
            ) -> Result<(), $crate::MarshalError> {
                $crate::host::encode_enum(self, slots, slot)
            }
        }
    };
}
