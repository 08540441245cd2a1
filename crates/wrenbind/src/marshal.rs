//! Conversion between VM slots and host values
//!
//! [`FromSlot`] reads a host value out of a slot and [`ToSlot`] writes one
//! into a slot. Both carry a [`TypeTag`] through [`Tagged`] so the binding
//! compiler can validate signatures before any call happens.
//!
//! Composite values are built through scratch slots allocated above every
//! slot in use, so decoding one argument never clobbers another.

use std::collections::{BTreeMap, HashMap};
use std::hash::{BuildHasher, Hash};

use wrenbind_vm::{SlotType, Vm, VmError};

use crate::error::MarshalError;
use crate::handle::{ReleaseQueue, WrenRef};
use crate::registry::TypeRegistry;
use crate::types::TypeTag;

// ============================================================================
// Slot context
// ============================================================================

/// Access to the VM slots during a conversion
pub struct Slots<'a> {
    vm: &'a mut Vm,
    types: &'a TypeRegistry,
    refs: &'a ReleaseQueue,
    top: usize,
}

impl<'a> Slots<'a> {
    pub(crate) fn new(vm: &'a mut Vm, types: &'a TypeRegistry, refs: &'a ReleaseQueue) -> Self {
        let top = vm.slot_count();
        Self { vm, types, refs, top }
    }

    pub fn vm(&mut self) -> &mut Vm {
        self.vm
    }

    pub fn types(&self) -> &'a TypeRegistry {
        self.types
    }

    pub(crate) fn refs(&self) -> &'a ReleaseQueue {
        self.refs
    }

    /// Run `f` with a temporary slot above every slot in use.
    pub fn with_scratch<R>(
        &mut self,
        f: impl FnOnce(&mut Self, usize) -> Result<R, MarshalError>,
    ) -> Result<R, MarshalError> {
        let slot = self.top;
        self.top += 1;
        self.vm.ensure_slots(self.top);
        let result = f(self, slot);
        self.top -= 1;
        result
    }

    pub fn slot_type(&self, slot: usize) -> Result<SlotType, MarshalError> {
        Ok(self.vm.slot_type(slot)?)
    }

    /// Human readable description of what `slot` holds.
    pub fn describe(&self, slot: usize) -> String {
        match self.vm.slot_type(slot) {
            Ok(SlotType::Foreign | SlotType::Unknown) => self
                .vm
                .slot_class_name(slot)
                .unwrap_or_else(|_| "Unknown".to_string()),
            Ok(kind) => format!("{:?}", kind),
            Err(_) => "nothing".to_string(),
        }
    }

    pub fn mismatch(&self, expected: &TypeTag, slot: usize) -> MarshalError {
        MarshalError::TypeMismatch {
            expected: expected.to_string(),
            found: self.describe(slot),
        }
    }

    /// Fail with a type mismatch unless `slot` holds a `kind` value.
    pub fn expect(&self, slot: usize, kind: SlotType, expected: &TypeTag) -> Result<(), MarshalError> {
        if self.slot_type(slot)? == kind {
            Ok(())
        } else {
            Err(self.mismatch(expected, slot))
        }
    }

    fn number(&self, slot: usize, expected: &TypeTag) -> Result<f64, MarshalError> {
        self.expect(slot, SlotType::Num, expected)?;
        Ok(self.vm.get_slot_double(slot)?)
    }
}

// ============================================================================
// Traits
// ============================================================================

/// Types with a script-facing [`TypeTag`].
pub trait Tagged {
    fn type_tag() -> TypeTag;
}

/// Read a host value out of a slot.
pub trait FromSlot: Tagged + Sized {
    fn from_slot(slots: &mut Slots<'_>, slot: usize) -> Result<Self, MarshalError>;
}

/// Write a host value into a slot.
pub trait ToSlot: Tagged {
    fn to_slot(self, slots: &mut Slots<'_>, slot: usize) -> Result<(), MarshalError>;
}

// ============================================================================
// Numbers
// ============================================================================

// Integer parameters accept any number and truncate toward zero. `MAX + 1`
// is exact as an exclusive bound for every width; for 64-bit types
// `MAX as f64` already rounds up to it.
macro_rules! impl_integer {
    ($($ty:ty),*) => {
        $(
            impl Tagged for $ty {
                fn type_tag() -> TypeTag {
                    TypeTag::Int
                }
            }

            impl FromSlot for $ty {
                fn from_slot(slots: &mut Slots<'_>, slot: usize) -> Result<Self, MarshalError> {
                    let value = slots.number(slot, &TypeTag::Int)?.trunc();
                    if value.is_nan() || value < <$ty>::MIN as f64 || value >= <$ty>::MAX as f64 + 1.0 {
                        return Err(MarshalError::OutOfRange {
                            value: value.to_string(),
                            target: stringify!($ty).to_string(),
                        });
                    }
                    Ok(value as $ty)
                }
            }

            impl ToSlot for $ty {
                fn to_slot(self, slots: &mut Slots<'_>, slot: usize) -> Result<(), MarshalError> {
                    slots.vm().set_slot_double(slot, self as f64)?;
                    Ok(())
                }
            }
        )*
    };
}

impl_integer!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

macro_rules! impl_float {
    ($($ty:ty),*) => {
        $(
            impl Tagged for $ty {
                fn type_tag() -> TypeTag {
                    TypeTag::Float
                }
            }

            impl FromSlot for $ty {
                fn from_slot(slots: &mut Slots<'_>, slot: usize) -> Result<Self, MarshalError> {
                    Ok(slots.number(slot, &TypeTag::Float)? as $ty)
                }
            }

            impl ToSlot for $ty {
                fn to_slot(self, slots: &mut Slots<'_>, slot: usize) -> Result<(), MarshalError> {
                    slots.vm().set_slot_double(slot, self as f64)?;
                    Ok(())
                }
            }
        )*
    };
}

impl_float!(f32, f64);

// ============================================================================
// Scalars
// ============================================================================

impl Tagged for bool {
    fn type_tag() -> TypeTag {
        TypeTag::Bool
    }
}

impl FromSlot for bool {
    fn from_slot(slots: &mut Slots<'_>, slot: usize) -> Result<Self, MarshalError> {
        slots.expect(slot, SlotType::Bool, &TypeTag::Bool)?;
        Ok(slots.vm.get_slot_bool(slot)?)
    }
}

impl ToSlot for bool {
    fn to_slot(self, slots: &mut Slots<'_>, slot: usize) -> Result<(), MarshalError> {
        slots.vm.set_slot_bool(slot, self)?;
        Ok(())
    }
}

impl Tagged for String {
    fn type_tag() -> TypeTag {
        TypeTag::Str
    }
}

impl FromSlot for String {
    fn from_slot(slots: &mut Slots<'_>, slot: usize) -> Result<Self, MarshalError> {
        slots.expect(slot, SlotType::String, &TypeTag::Str)?;
        Ok(slots.vm.get_slot_string(slot)?)
    }
}

impl ToSlot for String {
    fn to_slot(self, slots: &mut Slots<'_>, slot: usize) -> Result<(), MarshalError> {
        slots.vm.set_slot_string(slot, &self)?;
        Ok(())
    }
}

impl Tagged for &str {
    fn type_tag() -> TypeTag {
        TypeTag::Str
    }
}

impl ToSlot for &str {
    fn to_slot(self, slots: &mut Slots<'_>, slot: usize) -> Result<(), MarshalError> {
        slots.vm.set_slot_string(slot, self)?;
        Ok(())
    }
}

impl Tagged for () {
    fn type_tag() -> TypeTag {
        TypeTag::Null
    }
}

/// Accepts any value and discards it.
impl FromSlot for () {
    fn from_slot(_slots: &mut Slots<'_>, _slot: usize) -> Result<Self, MarshalError> {
        Ok(())
    }
}

impl ToSlot for () {
    fn to_slot(self, slots: &mut Slots<'_>, slot: usize) -> Result<(), MarshalError> {
        slots.vm.set_slot_null(slot)?;
        Ok(())
    }
}

// ============================================================================
// Optional values
// ============================================================================

impl<T: Tagged> Tagged for Option<T> {
    fn type_tag() -> TypeTag {
        TypeTag::Optional(Box::new(T::type_tag()))
    }
}

impl<T: FromSlot> FromSlot for Option<T> {
    fn from_slot(slots: &mut Slots<'_>, slot: usize) -> Result<Self, MarshalError> {
        if slots.slot_type(slot)? == SlotType::Null {
            Ok(None)
        } else {
            T::from_slot(slots, slot).map(Some)
        }
    }
}

impl<T: ToSlot> ToSlot for Option<T> {
    fn to_slot(self, slots: &mut Slots<'_>, slot: usize) -> Result<(), MarshalError> {
        match self {
            Some(value) => value.to_slot(slots, slot),
            None => ().to_slot(slots, slot),
        }
    }
}

// ============================================================================
// Lists
// ============================================================================

impl<T: Tagged> Tagged for Vec<T> {
    fn type_tag() -> TypeTag {
        TypeTag::List(Box::new(T::type_tag()))
    }
}

impl<T: FromSlot> FromSlot for Vec<T> {
    fn from_slot(slots: &mut Slots<'_>, slot: usize) -> Result<Self, MarshalError> {
        slots.expect(slot, SlotType::List, &Self::type_tag())?;
        let count = slots.vm.get_list_count(slot)?;
        slots.with_scratch(|slots, element| {
            let mut items = Vec::with_capacity(count);
            for index in 0..count {
                slots.vm.get_list_element(slot, index, element)?;
                items.push(T::from_slot(slots, element)?);
            }
            Ok(items)
        })
    }
}

impl<T: ToSlot> ToSlot for Vec<T> {
    fn to_slot(self, slots: &mut Slots<'_>, slot: usize) -> Result<(), MarshalError> {
        slots.vm.set_slot_new_list(slot)?;
        slots.with_scratch(|slots, element| {
            for item in self {
                item.to_slot(slots, element)?;
                slots.vm.insert_in_list(slot, -1, element)?;
            }
            Ok(())
        })
    }
}

// ============================================================================
// Maps
// ============================================================================

/// Visit every entry of the map in `slot` as `(key_slot, value_slot)`.
fn read_map_entries(
    slots: &mut Slots<'_>,
    slot: usize,
    mut visit: impl FnMut(&mut Slots<'_>, usize, usize) -> Result<(), MarshalError>,
) -> Result<(), MarshalError> {
    let count = slots.vm.get_map_count(slot)?;
    slots.with_scratch(|slots, key| {
        slots.with_scratch(|slots, value| {
            for index in 0..count {
                slots.vm.get_map_key_at(slot, index, key)?;
                slots.vm.get_map_value(slot, key, value)?;
                visit(slots, key, value)?;
            }
            Ok(())
        })
    })
}

fn write_map_entries<K: ToSlot, V: ToSlot>(
    slots: &mut Slots<'_>,
    slot: usize,
    entries: impl IntoIterator<Item = (K, V)>,
) -> Result<(), MarshalError> {
    slots.vm.set_slot_new_map(slot)?;
    slots.with_scratch(|slots, key_slot| {
        slots.with_scratch(|slots, value_slot| {
            for (key, value) in entries {
                key.to_slot(slots, key_slot)?;
                value.to_slot(slots, value_slot)?;
                slots.vm.set_map_value(slot, key_slot, value_slot)?;
            }
            Ok(())
        })
    })
}

impl<K: Tagged, V: Tagged, S> Tagged for HashMap<K, V, S> {
    fn type_tag() -> TypeTag {
        TypeTag::Map(Box::new(K::type_tag()), Box::new(V::type_tag()))
    }
}

impl<K, V, S> FromSlot for HashMap<K, V, S>
where
    K: FromSlot + Eq + Hash,
    V: FromSlot,
    S: BuildHasher + Default,
{
    fn from_slot(slots: &mut Slots<'_>, slot: usize) -> Result<Self, MarshalError> {
        slots.expect(slot, SlotType::Map, &Self::type_tag())?;
        let mut map = HashMap::default();
        read_map_entries(slots, slot, |slots, key, value| {
            map.insert(K::from_slot(slots, key)?, V::from_slot(slots, value)?);
            Ok(())
        })?;
        Ok(map)
    }
}

impl<K: ToSlot, V: ToSlot, S> ToSlot for HashMap<K, V, S> {
    fn to_slot(self, slots: &mut Slots<'_>, slot: usize) -> Result<(), MarshalError> {
        write_map_entries(slots, slot, self)
    }
}

impl<K: Tagged, V: Tagged> Tagged for BTreeMap<K, V> {
    fn type_tag() -> TypeTag {
        TypeTag::Map(Box::new(K::type_tag()), Box::new(V::type_tag()))
    }
}

impl<K: FromSlot + Ord, V: FromSlot> FromSlot for BTreeMap<K, V> {
    fn from_slot(slots: &mut Slots<'_>, slot: usize) -> Result<Self, MarshalError> {
        slots.expect(slot, SlotType::Map, &Self::type_tag())?;
        let mut map = BTreeMap::new();
        read_map_entries(slots, slot, |slots, key, value| {
            map.insert(K::from_slot(slots, key)?, V::from_slot(slots, value)?);
            Ok(())
        })?;
        Ok(map)
    }
}

impl<K: ToSlot, V: ToSlot> ToSlot for BTreeMap<K, V> {
    fn to_slot(self, slots: &mut Slots<'_>, slot: usize) -> Result<(), MarshalError> {
        write_map_entries(slots, slot, self)
    }
}

// ============================================================================
// References
// ============================================================================

impl Tagged for WrenRef {
    fn type_tag() -> TypeTag {
        TypeTag::Ref
    }
}

impl FromSlot for WrenRef {
    fn from_slot(slots: &mut Slots<'_>, slot: usize) -> Result<Self, MarshalError> {
        let handle = slots.vm.make_handle(slot)?;
        Ok(WrenRef::new(handle, slots.refs()))
    }
}

impl ToSlot for WrenRef {
    fn to_slot(self, slots: &mut Slots<'_>, slot: usize) -> Result<(), MarshalError> {
        if self.is_released() {
            return Err(VmError::ReleasedHandle.into());
        }
        slots.vm.set_slot_handle(slot, self.handle())?;
        Ok(())
    }
}

impl ToSlot for &WrenRef {
    fn to_slot(self, slots: &mut Slots<'_>, slot: usize) -> Result<(), MarshalError> {
        self.clone().to_slot(slots, slot)
    }
}

impl Tagged for &WrenRef {
    fn type_tag() -> TypeTag {
        TypeTag::Ref
    }
}

// ============================================================================
// Dynamic values
// ============================================================================

/// A script value of any shape
#[derive(Debug, Clone, PartialEq)]
pub enum HostValue {
    Null,
    Bool(bool),
    Num(f64),
    Str(String),
    List(Vec<HostValue>),
    /// Entries in script insertion order
    Map(Vec<(HostValue, HostValue)>),
    /// Anything else, held by reference
    Ref(WrenRef),
}

impl HostValue {
    pub fn as_num(&self) -> Option<f64> {
        match self {
            HostValue::Num(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            HostValue::Str(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, HostValue::Null)
    }
}

impl From<f64> for HostValue {
    fn from(value: f64) -> Self {
        HostValue::Num(value)
    }
}

impl From<bool> for HostValue {
    fn from(value: bool) -> Self {
        HostValue::Bool(value)
    }
}

impl From<&str> for HostValue {
    fn from(value: &str) -> Self {
        HostValue::Str(value.to_string())
    }
}

impl From<String> for HostValue {
    fn from(value: String) -> Self {
        HostValue::Str(value)
    }
}

impl Tagged for HostValue {
    fn type_tag() -> TypeTag {
        TypeTag::Any
    }
}

impl FromSlot for HostValue {
    fn from_slot(slots: &mut Slots<'_>, slot: usize) -> Result<Self, MarshalError> {
        let value = match slots.slot_type(slot)? {
            SlotType::Null => HostValue::Null,
            SlotType::Bool => HostValue::Bool(slots.vm.get_slot_bool(slot)?),
            SlotType::Num => HostValue::Num(slots.vm.get_slot_double(slot)?),
            SlotType::String => HostValue::Str(slots.vm.get_slot_string(slot)?),
            SlotType::List => HostValue::List(Vec::from_slot(slots, slot)?),
            SlotType::Map => {
                let mut entries = Vec::new();
                read_map_entries(slots, slot, |slots, key, value| {
                    entries.push((HostValue::from_slot(slots, key)?, HostValue::from_slot(slots, value)?));
                    Ok(())
                })?;
                HostValue::Map(entries)
            }
            SlotType::Foreign | SlotType::Unknown => HostValue::Ref(WrenRef::from_slot(slots, slot)?),
        };
        Ok(value)
    }
}

impl ToSlot for HostValue {
    fn to_slot(self, slots: &mut Slots<'_>, slot: usize) -> Result<(), MarshalError> {
        match self {
            HostValue::Null => ().to_slot(slots, slot),
            HostValue::Bool(value) => value.to_slot(slots, slot),
            HostValue::Num(value) => value.to_slot(slots, slot),
            HostValue::Str(value) => value.to_slot(slots, slot),
            HostValue::List(items) => items.to_slot(slots, slot),
            HostValue::Map(entries) => write_map_entries(slots, slot, entries),
            HostValue::Ref(value) => value.to_slot(slots, slot),
        }
    }
}
