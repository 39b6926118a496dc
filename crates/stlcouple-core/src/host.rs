//! Host-side values.
//!
//! [`HostValue`] models the untyped values of the host language. Lists, sets
//! and dicts are shared-identity objects: cloning a `HostValue::List` clones
//! the handle, not the contents, so writing through one clone is visible
//! through every other. Copy-back depends on this to update the caller's
//! collection in place.

use std::cell::{Ref, RefCell, RefMut};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use ordered_float::OrderedFloat;

use crate::{ForeignHandle, HostType};

/// A host complex number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HostComplex {
    pub re: OrderedFloat<f64>,
    pub im: OrderedFloat<f64>,
}

impl HostComplex {
    pub fn new(re: f64, im: f64) -> Self {
        Self {
            re: OrderedFloat(re),
            im: OrderedFloat(im),
        }
    }
}

/// The hashable subset of host values: set elements and dict keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HostKey {
    None,
    Bool(bool),
    Int(i64),
    Float(OrderedFloat<f64>),
    Str(Arc<str>),
    Complex(HostComplex),
    Tuple(Vec<HostKey>),
    Foreign(ForeignHandle),
}

impl HostKey {
    pub fn host_type(&self) -> HostType {
        match self {
            HostKey::None => HostType::None,
            HostKey::Bool(_) => HostType::Bool,
            HostKey::Int(_) => HostType::Int,
            HostKey::Float(_) => HostType::Float,
            HostKey::Str(_) => HostType::Str,
            HostKey::Complex(_) => HostType::Complex,
            HostKey::Tuple(_) => HostType::Tuple,
            HostKey::Foreign(_) => HostType::Foreign,
        }
    }

    pub fn into_value(self) -> HostValue {
        match self {
            HostKey::None => HostValue::None,
            HostKey::Bool(b) => HostValue::Bool(b),
            HostKey::Int(i) => HostValue::Int(i),
            HostKey::Float(f) => HostValue::Float(f),
            HostKey::Str(s) => HostValue::Str(s),
            HostKey::Complex(c) => HostValue::Complex(c),
            HostKey::Tuple(items) => {
                HostValue::Tuple(items.into_iter().map(HostKey::into_value).collect())
            }
            HostKey::Foreign(handle) => HostValue::Foreign(handle),
        }
    }
}

impl fmt::Display for HostKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostKey::None => write!(f, "None"),
            HostKey::Bool(b) => write!(f, "{}", if *b { "True" } else { "False" }),
            HostKey::Int(i) => write!(f, "{i}"),
            HostKey::Float(v) => write!(f, "{}", v.0),
            HostKey::Str(s) => write!(f, "{s:?}"),
            HostKey::Complex(c) => write!(f, "({}+{}j)", c.re.0, c.im.0),
            HostKey::Tuple(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, ")")
            }
            HostKey::Foreign(handle) => write!(f, "{handle}"),
        }
    }
}

/// A mutable, shared host list.
#[derive(Clone, PartialEq, Default)]
pub struct HostList(Rc<RefCell<Vec<HostValue>>>);

impl HostList {
    pub fn new(items: Vec<HostValue>) -> Self {
        Self(Rc::new(RefCell::new(items)))
    }

    pub fn borrow(&self) -> Ref<'_, Vec<HostValue>> {
        self.0.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, Vec<HostValue>> {
        self.0.borrow_mut()
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    pub fn to_vec(&self) -> Vec<HostValue> {
        self.0.borrow().clone()
    }

    /// Replace the contents in place, keeping identity.
    pub fn replace(&self, items: Vec<HostValue>) {
        *self.0.borrow_mut() = items;
    }

    /// Whether both handles refer to the same list object.
    pub fn ptr_eq(&self, other: &HostList) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for HostList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.0.borrow().iter()).finish()
    }
}

/// A mutable, shared host set.
#[derive(Clone, PartialEq, Default)]
pub struct HostSet(Rc<RefCell<BTreeSet<HostKey>>>);

impl HostSet {
    pub fn new(items: BTreeSet<HostKey>) -> Self {
        Self(Rc::new(RefCell::new(items)))
    }

    pub fn borrow(&self) -> Ref<'_, BTreeSet<HostKey>> {
        self.0.borrow()
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    pub fn replace(&self, items: BTreeSet<HostKey>) {
        *self.0.borrow_mut() = items;
    }

    pub fn ptr_eq(&self, other: &HostSet) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for HostSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.0.borrow().iter()).finish()
    }
}

/// A mutable, shared host dict.
#[derive(Clone, PartialEq, Default)]
pub struct HostDict(Rc<RefCell<BTreeMap<HostKey, HostValue>>>);

impl HostDict {
    pub fn new(entries: BTreeMap<HostKey, HostValue>) -> Self {
        Self(Rc::new(RefCell::new(entries)))
    }

    pub fn borrow(&self) -> Ref<'_, BTreeMap<HostKey, HostValue>> {
        self.0.borrow()
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    pub fn replace(&self, entries: BTreeMap<HostKey, HostValue>) {
        *self.0.borrow_mut() = entries;
    }

    pub fn ptr_eq(&self, other: &HostDict) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for HostDict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.0.borrow().iter()).finish()
    }
}

/// A host-language value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum HostValue {
    #[default]
    None,
    Bool(bool),
    Int(i64),
    Float(OrderedFloat<f64>),
    Str(Arc<str>),
    Complex(HostComplex),
    Tuple(Vec<HostValue>),
    List(HostList),
    Set(HostSet),
    Dict(HostDict),
    /// A wrapped foreign instance.
    Foreign(ForeignHandle),
}

impl HostValue {
    pub fn list(items: impl IntoIterator<Item = HostValue>) -> Self {
        HostValue::List(HostList::new(items.into_iter().collect()))
    }

    pub fn set(items: impl IntoIterator<Item = HostKey>) -> Self {
        HostValue::Set(HostSet::new(items.into_iter().collect()))
    }

    pub fn dict(entries: impl IntoIterator<Item = (HostKey, HostValue)>) -> Self {
        HostValue::Dict(HostDict::new(entries.into_iter().collect()))
    }

    pub fn str(s: &str) -> Self {
        HostValue::Str(Arc::from(s))
    }

    pub fn float(f: f64) -> Self {
        HostValue::Float(OrderedFloat(f))
    }

    pub fn host_type(&self) -> HostType {
        match self {
            HostValue::None => HostType::None,
            HostValue::Bool(_) => HostType::Bool,
            HostValue::Int(_) => HostType::Int,
            HostValue::Float(_) => HostType::Float,
            HostValue::Str(_) => HostType::Str,
            HostValue::Complex(_) => HostType::Complex,
            HostValue::Tuple(_) => HostType::Tuple,
            HostValue::List(_) => HostType::Sequence,
            HostValue::Set(_) => HostType::Set,
            HostValue::Dict(_) => HostType::Mapping,
            HostValue::Foreign(_) => HostType::Foreign,
        }
    }

    /// The collection shape of this value, if it has one.
    pub fn shape(&self) -> Option<HostShape> {
        match self {
            HostValue::List(_) => Some(HostShape::Sequence),
            HostValue::Set(_) => Some(HostShape::Set),
            HostValue::Dict(_) => Some(HostShape::Mapping),
            HostValue::Tuple(items) if items.len() == 2 => Some(HostShape::Pair),
            HostValue::Complex(_) => Some(HostShape::Complex),
            _ => None,
        }
    }

    /// Convert to a hashable key. Lists, sets and dicts are not hashable.
    pub fn to_key(&self) -> Option<HostKey> {
        match self {
            HostValue::None => Some(HostKey::None),
            HostValue::Bool(b) => Some(HostKey::Bool(*b)),
            HostValue::Int(i) => Some(HostKey::Int(*i)),
            HostValue::Float(f) => Some(HostKey::Float(*f)),
            HostValue::Str(s) => Some(HostKey::Str(s.clone())),
            HostValue::Complex(c) => Some(HostKey::Complex(*c)),
            HostValue::Tuple(items) => items
                .iter()
                .map(HostValue::to_key)
                .collect::<Option<Vec<_>>>()
                .map(HostKey::Tuple),
            HostValue::Foreign(handle) => Some(HostKey::Foreign(*handle)),
            HostValue::List(_) | HostValue::Set(_) | HostValue::Dict(_) => None,
        }
    }

    pub fn as_list(&self) -> Option<&HostList> {
        match self {
            HostValue::List(list) => Some(list),
            _ => None,
        }
    }

    pub fn as_set(&self) -> Option<&HostSet> {
        match self {
            HostValue::Set(set) => Some(set),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&HostDict> {
        match self {
            HostValue::Dict(dict) => Some(dict),
            _ => None,
        }
    }
}

impl From<i64> for HostValue {
    fn from(value: i64) -> Self {
        HostValue::Int(value)
    }
}

impl From<f64> for HostValue {
    fn from(value: f64) -> Self {
        HostValue::Float(OrderedFloat(value))
    }
}

impl From<bool> for HostValue {
    fn from(value: bool) -> Self {
        HostValue::Bool(value)
    }
}

impl From<&str> for HostValue {
    fn from(value: &str) -> Self {
        HostValue::Str(Arc::from(value))
    }
}

impl From<HostKey> for HostValue {
    fn from(key: HostKey) -> Self {
        key.into_value()
    }
}

impl From<i64> for HostKey {
    fn from(value: i64) -> Self {
        HostKey::Int(value)
    }
}

impl From<&str> for HostKey {
    fn from(value: &str) -> Self {
        HostKey::Str(Arc::from(value))
    }
}

/// The shape of a host collection that selects a container conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HostShape {
    /// An ordered list literal.
    Sequence,
    /// A set literal.
    Set,
    /// A two-element tuple.
    Pair,
    /// A dict literal.
    Mapping,
    /// A complex number.
    Complex,
}

impl HostShape {
    pub const fn name(self) -> &'static str {
        match self {
            HostShape::Sequence => "sequence",
            HostShape::Set => "set",
            HostShape::Pair => "pair",
            HostShape::Mapping => "mapping",
            HostShape::Complex => "complex",
        }
    }
}

impl fmt::Display for HostShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
