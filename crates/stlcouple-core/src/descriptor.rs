//! Container descriptors: one per instantiated template container type.

use std::fmt;
use std::sync::Arc;

use crate::{
    ElementConversionError, ElementType, ForeignContainer, ForeignInstance, HostList, HostShape,
    HostValue, ScalarType, TypeHash,
};

/// The template a container type is instantiated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ContainerKind {
    Vector,
    List,
    Set,
    Map,
    HashMap,
    Pair,
    Complex,
}

impl ContainerKind {
    /// Recognize a template prefix such as `std::vector`.
    pub fn from_prefix(prefix: &str) -> Option<ContainerKind> {
        match prefix.trim() {
            "std::vector" => Some(ContainerKind::Vector),
            "std::list" => Some(ContainerKind::List),
            "std::set" => Some(ContainerKind::Set),
            "std::map" => Some(ContainerKind::Map),
            "__gnu_cxx::hash_map" | "std::unordered_map" => Some(ContainerKind::HashMap),
            "std::pair" => Some(ContainerKind::Pair),
            "std::complex" => Some(ContainerKind::Complex),
            _ => None,
        }
    }

    pub const fn prefix(self) -> &'static str {
        match self {
            ContainerKind::Vector => "std::vector",
            ContainerKind::List => "std::list",
            ContainerKind::Set => "std::set",
            ContainerKind::Map => "std::map",
            ContainerKind::HashMap => "__gnu_cxx::hash_map",
            ContainerKind::Pair => "std::pair",
            ContainerKind::Complex => "std::complex",
        }
    }

    /// Number of element types the template takes.
    pub const fn arity(self) -> usize {
        match self {
            ContainerKind::Map | ContainerKind::HashMap | ContainerKind::Pair => 2,
            _ => 1,
        }
    }

    /// Host shapes that convert into this kind.
    pub const fn accepted_shapes(self) -> &'static [HostShape] {
        match self {
            ContainerKind::Vector | ContainerKind::List => &[HostShape::Sequence],
            ContainerKind::Set => &[HostShape::Set, HostShape::Sequence],
            ContainerKind::Map | ContainerKind::HashMap => &[HostShape::Mapping],
            ContainerKind::Pair => &[HostShape::Pair],
            ContainerKind::Complex => &[HostShape::Complex],
        }
    }

    pub const fn is_sequence(self) -> bool {
        matches!(self, ContainerKind::Vector | ContainerKind::List)
    }

    pub const fn is_map(self) -> bool {
        matches!(self, ContainerKind::Map | ContainerKind::HashMap)
    }
}

impl fmt::Display for ContainerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.prefix())
    }
}

/// Composite registry key: template kind plus element type tuple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DescriptorKey {
    pub kind: ContainerKind,
    pub elements: Vec<ElementType>,
}

impl DescriptorKey {
    pub fn new(kind: ContainerKind, elements: Vec<ElementType>) -> Self {
        Self { kind, elements }
    }

    /// Canonical spelling, e.g. `std::map<long, double>`.
    pub fn canonical_name(&self) -> String {
        let args: Vec<&str> = self.elements.iter().map(ElementType::name).collect();
        format!("{}<{}>", self.kind.prefix(), args.join(", "))
    }

    pub fn type_hash(&self) -> TypeHash {
        let args: Vec<TypeHash> = self.elements.iter().map(ElementType::type_hash).collect();
        TypeHash::from_template_instance(TypeHash::from_name(self.kind.prefix()), &args)
    }
}

impl fmt::Display for DescriptorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.canonical_name())
    }
}

/// Fills an empty container from host values in one pass.
pub type BulkFill =
    fn(&[HostValue], ScalarType, &mut ForeignContainer) -> Result<(), ElementConversionError>;

/// Rewrites a host list from a container in one pass.
pub type BulkRefill =
    fn(&ForeignContainer, ScalarType, &HostList) -> Result<(), ElementConversionError>;

/// Specialized whole-container paths for one element type.
#[derive(Debug, Clone, Copy)]
pub struct BulkHooks {
    pub fill: BulkFill,
    pub refill: BulkRefill,
}

static UNKNOWN_ELEMENT: ElementType = ElementType::Unknown;

/// Describes one instantiated container type. Immutable after registration.
#[derive(Debug, Clone)]
pub struct ContainerDescriptor {
    /// Display name the instantiation was registered under.
    pub name: Arc<str>,
    pub key: DescriptorKey,
    pub type_hash: TypeHash,
    pub bulk: Option<BulkHooks>,
}

impl ContainerDescriptor {
    pub fn new(name: &str, kind: ContainerKind, elements: Vec<ElementType>) -> Self {
        let key = DescriptorKey::new(kind, elements);
        Self {
            name: Arc::from(name),
            type_hash: key.type_hash(),
            key,
            bulk: None,
        }
    }

    pub fn with_bulk_hooks(mut self, hooks: BulkHooks) -> Self {
        self.bulk = Some(hooks);
        self
    }

    pub fn kind(&self) -> ContainerKind {
        self.key.kind
    }

    pub fn element_types(&self) -> &[ElementType] {
        &self.key.elements
    }

    /// The single element type, or the key type of a map, or the first type of a pair.
    pub fn element(&self) -> &ElementType {
        self.key.elements.first().unwrap_or(&UNKNOWN_ELEMENT)
    }

    /// The mapped type of a map, or the second type of a pair.
    pub fn second_element(&self) -> &ElementType {
        self.key.elements.get(1).unwrap_or(&UNKNOWN_ELEMENT)
    }

    /// Construct a default-constructed instance of this type.
    pub fn construct_empty(&self) -> ForeignInstance {
        ForeignInstance {
            type_hash: self.type_hash,
            type_name: self.name.clone(),
            container: ForeignContainer::empty(self.kind(), &self.key.elements),
        }
    }

    /// Whether another descriptor describes the same instantiation.
    pub fn is_identical(&self, other: &ContainerDescriptor) -> bool {
        self.key == other.key && self.bulk.is_some() == other.bulk.is_some()
    }
}

impl fmt::Display for ContainerDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixes_round_trip() {
        for kind in [
            ContainerKind::Vector,
            ContainerKind::List,
            ContainerKind::Set,
            ContainerKind::Map,
            ContainerKind::HashMap,
            ContainerKind::Pair,
            ContainerKind::Complex,
        ] {
            assert_eq!(ContainerKind::from_prefix(kind.prefix()), Some(kind));
        }
        assert_eq!(ContainerKind::from_prefix("std::deque"), None);
        assert_eq!(ContainerKind::from_prefix("std::unordered_map"), Some(ContainerKind::HashMap));
    }

    #[test]
    fn canonical_name_and_hash_follow_elements() {
        let a = DescriptorKey::new(
            ContainerKind::Map,
            vec![ScalarType::Long.into(), ScalarType::Double.into()],
        );
        let b = DescriptorKey::new(
            ContainerKind::Map,
            vec![ScalarType::Double.into(), ScalarType::Long.into()],
        );
        assert_eq!(a.canonical_name(), "std::map<long, double>");
        assert_ne!(a.type_hash(), b.type_hash());
    }

    #[test]
    fn construct_empty_carries_identity() {
        let descriptor = ContainerDescriptor::new(
            "std::vector< int >",
            ContainerKind::Vector,
            vec![ScalarType::Int.into()],
        );
        let instance = descriptor.construct_empty();
        assert_eq!(&*instance.type_name, "std::vector< int >");
        assert_eq!(instance.type_hash, descriptor.type_hash);
        assert!(instance.container.is_empty());
    }

    #[test]
    fn sets_accept_sequences() {
        assert!(ContainerKind::Set.accepted_shapes().contains(&HostShape::Sequence));
        assert!(!ContainerKind::Vector.accepted_shapes().contains(&HostShape::Set));
    }
}
