//! Foreign-side values and template container instances.
//!
//! [`ForeignContainer`] is the interop runtime's view of an instantiated
//! template container. Marshalling only touches it through the primitives the
//! runtime exposes: construct empty, insert, iterate, size, clear.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;
use std::sync::Arc;

use ordered_float::OrderedFloat;
use rustc_hash::FxHashMap;

use crate::{ContainerKind, ElementType, ForeignHandle, ScalarType, TypeHash};

/// A single foreign scalar or object reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ForeignValue {
    /// Null pointer or default-constructed object slot.
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Char(u8),
    Float(OrderedFloat<f64>),
    Str(Arc<str>),
    Instance(ForeignHandle),
}

impl ForeignValue {
    /// Value-initialized element of the given type, as `T()` would produce.
    pub fn default_for(element: &ElementType) -> ForeignValue {
        match element {
            ElementType::Scalar(ScalarType::Bool) => ForeignValue::Bool(false),
            ElementType::Scalar(s) if s.is_signed_integer() => ForeignValue::Int(0),
            ElementType::Scalar(s) if s.is_unsigned_integer() => ForeignValue::UInt(0),
            ElementType::Scalar(s) if s.is_character() => ForeignValue::Char(0),
            ElementType::Scalar(s) if s.is_floating() => ForeignValue::Float(OrderedFloat(0.0)),
            ElementType::Scalar(_) => ForeignValue::Str(Arc::from("")),
            ElementType::Named(_) | ElementType::Unknown => ForeignValue::Null,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            ForeignValue::Null => "null",
            ForeignValue::Bool(_) => "bool",
            ForeignValue::Int(_) => "signed integer",
            ForeignValue::UInt(_) => "unsigned integer",
            ForeignValue::Char(_) => "char",
            ForeignValue::Float(_) => "floating point",
            ForeignValue::Str(_) => "string",
            ForeignValue::Instance(_) => "instance",
        }
    }
}

impl fmt::Display for ForeignValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ForeignValue::Null => write!(f, "null"),
            ForeignValue::Bool(b) => write!(f, "{b}"),
            ForeignValue::Int(i) => write!(f, "{i}"),
            ForeignValue::UInt(u) => write!(f, "{u}"),
            ForeignValue::Char(c) => write!(f, "'{}'", char::from(*c)),
            ForeignValue::Float(v) => write!(f, "{}", v.0),
            ForeignValue::Str(s) => write!(f, "{s:?}"),
            ForeignValue::Instance(handle) => write!(f, "{handle}"),
        }
    }
}

/// Storage of an instantiated template container.
#[derive(Debug, Clone, PartialEq)]
pub enum ForeignContainer {
    Vector(Vec<ForeignValue>),
    List(VecDeque<ForeignValue>),
    Set(BTreeSet<ForeignValue>),
    Map(BTreeMap<ForeignValue, ForeignValue>),
    HashMap(FxHashMap<ForeignValue, ForeignValue>),
    Pair(ForeignValue, ForeignValue),
    Complex {
        re: OrderedFloat<f64>,
        im: OrderedFloat<f64>,
    },
}

impl ForeignContainer {
    /// Default-constructed container of the given kind.
    ///
    /// Pairs take value-initialized members from `elements`.
    pub fn empty(kind: ContainerKind, elements: &[ElementType]) -> ForeignContainer {
        match kind {
            ContainerKind::Vector => ForeignContainer::Vector(Vec::new()),
            ContainerKind::List => ForeignContainer::List(VecDeque::new()),
            ContainerKind::Set => ForeignContainer::Set(BTreeSet::new()),
            ContainerKind::Map => ForeignContainer::Map(BTreeMap::new()),
            ContainerKind::HashMap => ForeignContainer::HashMap(FxHashMap::default()),
            ContainerKind::Pair => {
                let first = elements.first().map(ForeignValue::default_for);
                let second = elements.get(1).map(ForeignValue::default_for);
                ForeignContainer::Pair(
                    first.unwrap_or(ForeignValue::Null),
                    second.unwrap_or(ForeignValue::Null),
                )
            }
            ContainerKind::Complex => ForeignContainer::Complex {
                re: OrderedFloat(0.0),
                im: OrderedFloat(0.0),
            },
        }
    }

    pub fn kind(&self) -> ContainerKind {
        match self {
            ForeignContainer::Vector(_) => ContainerKind::Vector,
            ForeignContainer::List(_) => ContainerKind::List,
            ForeignContainer::Set(_) => ContainerKind::Set,
            ForeignContainer::Map(_) => ContainerKind::Map,
            ForeignContainer::HashMap(_) => ContainerKind::HashMap,
            ForeignContainer::Pair(..) => ContainerKind::Pair,
            ForeignContainer::Complex { .. } => ContainerKind::Complex,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ForeignContainer::Vector(v) => v.len(),
            ForeignContainer::List(l) => l.len(),
            ForeignContainer::Set(s) => s.len(),
            ForeignContainer::Map(m) => m.len(),
            ForeignContainer::HashMap(m) => m.len(),
            ForeignContainer::Pair(..) => 2,
            ForeignContainer::Complex { .. } => 2,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert one element into a sequence or set.
    ///
    /// Sequences append (`push_back`); sets insert in order. Returns false for
    /// kinds that do not hold single values.
    pub fn insert(&mut self, value: ForeignValue) -> bool {
        match self {
            ForeignContainer::Vector(v) => v.push(value),
            ForeignContainer::List(l) => l.push_back(value),
            ForeignContainer::Set(s) => {
                s.insert(value);
            }
            _ => return false,
        }
        true
    }

    /// Insert or overwrite one key/value entry of a map.
    ///
    /// Returns false for kinds that are not maps.
    pub fn insert_pair(&mut self, key: ForeignValue, value: ForeignValue) -> bool {
        match self {
            ForeignContainer::Map(m) => {
                m.insert(key, value);
            }
            ForeignContainer::HashMap(m) => {
                m.insert(key, value);
            }
            _ => return false,
        }
        true
    }

    /// Iterate the values of a sequence, set or pair in container order.
    pub fn values(&self) -> Box<dyn Iterator<Item = &ForeignValue> + '_> {
        match self {
            ForeignContainer::Vector(v) => Box::new(v.iter()),
            ForeignContainer::List(l) => Box::new(l.iter()),
            ForeignContainer::Set(s) => Box::new(s.iter()),
            ForeignContainer::Pair(first, second) => Box::new([first, second].into_iter()),
            _ => Box::new(std::iter::empty()),
        }
    }

    /// Iterate the entries of a map. Hash maps yield in unspecified order.
    pub fn entries(&self) -> Box<dyn Iterator<Item = (&ForeignValue, &ForeignValue)> + '_> {
        match self {
            ForeignContainer::Map(m) => Box::new(m.iter()),
            ForeignContainer::HashMap(m) => Box::new(m.iter()),
            _ => Box::new(std::iter::empty()),
        }
    }

    /// Handles of every instance held as an element, key or mapped value.
    pub fn instance_handles(&self) -> Vec<ForeignHandle> {
        let handle = |value: &ForeignValue| match value {
            ForeignValue::Instance(handle) => Some(*handle),
            _ => None,
        };
        self.values()
            .filter_map(handle)
            .chain(self.entries().flat_map(|(k, v)| handle(k).into_iter().chain(handle(v))))
            .collect()
    }

    pub fn get_key(&self, key: &ForeignValue) -> Option<&ForeignValue> {
        match self {
            ForeignContainer::Map(m) => m.get(key),
            ForeignContainer::HashMap(m) => m.get(key),
            _ => None,
        }
    }

    pub fn remove_key(&mut self, key: &ForeignValue) -> Option<ForeignValue> {
        match self {
            ForeignContainer::Map(m) => m.remove(key),
            ForeignContainer::HashMap(m) => m.remove(key),
            _ => None,
        }
    }

    pub fn contains(&self, value: &ForeignValue) -> bool {
        match self {
            ForeignContainer::Set(s) => s.contains(value),
            ForeignContainer::Map(m) => m.contains_key(value),
            ForeignContainer::HashMap(m) => m.contains_key(value),
            _ => self.values().any(|v| v == value),
        }
    }

    pub fn reserve(&mut self, additional: usize) {
        match self {
            ForeignContainer::Vector(v) => v.reserve(additional),
            ForeignContainer::List(l) => l.reserve(additional),
            ForeignContainer::HashMap(m) => m.reserve(additional),
            _ => {}
        }
    }

    pub fn clear(&mut self) {
        match self {
            ForeignContainer::Vector(v) => v.clear(),
            ForeignContainer::List(l) => l.clear(),
            ForeignContainer::Set(s) => s.clear(),
            ForeignContainer::Map(m) => m.clear(),
            ForeignContainer::HashMap(m) => m.clear(),
            ForeignContainer::Pair(..) | ForeignContainer::Complex { .. } => {}
        }
    }

    /// Replace all values of a sequence or set in one operation.
    ///
    /// Returns false for kinds that do not hold single values.
    pub fn replace_values(&mut self, values: Vec<ForeignValue>) -> bool {
        match self {
            ForeignContainer::Vector(v) => *v = values,
            ForeignContainer::List(l) => *l = values.into(),
            ForeignContainer::Set(s) => *s = values.into_iter().collect(),
            _ => return false,
        }
        true
    }
}

/// A foreign container instance living in a [`crate::ForeignHeap`].
#[derive(Debug, Clone, PartialEq)]
pub struct ForeignInstance {
    /// Identity of the instantiated container type.
    pub type_hash: TypeHash,
    /// Display name of the instantiated container type.
    pub type_name: Arc<str>,
    pub container: ForeignContainer,
}

impl ForeignInstance {
    pub fn new(type_hash: TypeHash, type_name: &str, container: ForeignContainer) -> Self {
        Self {
            type_hash,
            type_name: Arc::from(type_name),
            container,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_insert_preserves_order() {
        let mut list = ForeignContainer::empty(ContainerKind::List, &[]);
        for i in [3, 1, 2] {
            assert!(list.insert(ForeignValue::Int(i)));
        }
        let values: Vec<_> = list.values().cloned().collect();
        assert_eq!(
            values,
            vec![ForeignValue::Int(3), ForeignValue::Int(1), ForeignValue::Int(2)]
        );
    }

    #[test]
    fn set_insert_deduplicates_and_sorts() {
        let mut set = ForeignContainer::empty(ContainerKind::Set, &[]);
        for i in [3, 1, 3] {
            set.insert(ForeignValue::Int(i));
        }
        assert_eq!(set.len(), 2);
        assert_eq!(set.values().next(), Some(&ForeignValue::Int(1)));
    }

    #[test]
    fn maps_reject_single_values() {
        let mut map = ForeignContainer::empty(ContainerKind::Map, &[]);
        assert!(!map.insert(ForeignValue::Int(1)));
        assert!(map.insert_pair(ForeignValue::Int(1), ForeignValue::Bool(true)));
        assert_eq!(map.get_key(&ForeignValue::Int(1)), Some(&ForeignValue::Bool(true)));
        assert_eq!(map.remove_key(&ForeignValue::Int(1)), Some(ForeignValue::Bool(true)));
        assert!(map.is_empty());
    }

    #[test]
    fn empty_pair_value_initializes_members() {
        let pair = ForeignContainer::empty(
            ContainerKind::Pair,
            &[ScalarType::UInt.into(), ScalarType::String.into()],
        );
        assert_eq!(
            pair,
            ForeignContainer::Pair(ForeignValue::UInt(0), ForeignValue::Str(Arc::from("")))
        );
    }
}
