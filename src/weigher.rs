//! Conversion weights for whole containers.
//!
//! A container weigher is built once per coupled descriptor. It precomputes
//! the weight of every host scalar kind into each element type, so weighing
//! a host collection only classifies its elements and looks the kinds up.
//!
//! The weight of a collection is the worst weight among the kinds its
//! elements have, plus [`ConversionWeight::CONTAINER_PENALTY`]:
//!
//! - maps add the worst key weight and the worst value weight, each with its
//!   own penalty, so an exact map weighs two penalties
//! - pairs add both members
//! - a host list into a set costs one extra epsilon, since the set drops its
//!   order and duplicates
//! - an empty collection weighs the penalties alone
//!
//! Elements of a nested container type are weighed one by one through the
//! inner type's own weigher.

use rustc_hash::FxHashSet;

use stlcouple_core::{
    ContainerDescriptor, ContainerKind, ConversionWeight, ElementType, HostKey, HostType, HostValue,
};
use stlcouple_registry::{ContainerType, ScalarConversions};

const ROWS: usize = HostType::SCALARS.len();

/// Precomputed weights of every host scalar kind into one element type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct WeightRow([ConversionWeight; ROWS]);

impl WeightRow {
    fn new(element: &ElementType, scalars: &dyn ScalarConversions) -> Self {
        Self(HostType::SCALARS.map(|host| scalars.weigh(host, element)))
    }

    fn get(&self, host: HostType) -> ConversionWeight {
        HostType::SCALARS
            .iter()
            .position(|h| *h == host)
            .map_or(ConversionWeight::INFINITE, |i| self.0[i])
    }

    /// Worst weight over the distinct host kinds.
    fn worst(&self, kinds: impl Iterator<Item = HostType>) -> ConversionWeight {
        let kinds: FxHashSet<HostType> = kinds.collect();
        kinds
            .into_iter()
            .map(|host| self.get(host))
            .max()
            .unwrap_or(ConversionWeight::ZERO)
    }
}

/// Weighs host elements against one element slot.
#[derive(Debug, Clone)]
struct ElementWeigher {
    row: WeightRow,
    nested: Option<Box<ContainerWeigher>>,
}

impl ElementWeigher {
    fn new(element: &ElementType, scalars: &dyn ScalarConversions) -> Self {
        Self {
            row: WeightRow::new(element, scalars),
            nested: None,
        }
    }

    fn weigh(&self, value: &HostValue) -> ConversionWeight {
        match &self.nested {
            Some(inner) if value.shape().is_some() => inner.weigh(value),
            _ => self.row.get(value.host_type()),
        }
    }

    fn worst<'v>(&self, values: impl Iterator<Item = &'v HostValue>) -> ConversionWeight {
        if self.nested.is_none() {
            return self.row.worst(values.map(HostValue::host_type));
        }
        values
            .map(|value| self.weigh(value))
            .max()
            .unwrap_or(ConversionWeight::ZERO)
    }

    fn worst_key<'k>(&self, keys: impl Iterator<Item = &'k HostKey>) -> ConversionWeight {
        if self.nested.is_none() {
            return self.row.worst(keys.map(HostKey::host_type));
        }
        keys.map(|key| self.weigh(&key.clone().into_value()))
            .max()
            .unwrap_or(ConversionWeight::ZERO)
    }
}

/// Weighs host values against one coupled container type.
#[derive(Debug, Clone)]
pub struct ContainerWeigher {
    kind: ContainerKind,
    element: ElementWeigher,
    second: ElementWeigher,
    complex_part: ConversionWeight,
}

impl ContainerWeigher {
    pub fn new(descriptor: &ContainerDescriptor, scalars: &dyn ScalarConversions) -> Self {
        Self {
            kind: descriptor.kind(),
            element: ElementWeigher::new(descriptor.element(), scalars),
            second: ElementWeigher::new(descriptor.second_element(), scalars),
            complex_part: scalars.weigh(HostType::Float, descriptor.element()),
        }
    }

    /// Weigher for a coupled type, including the weighers of its nested
    /// element types.
    pub fn for_type(container_type: &ContainerType) -> Self {
        let descriptor = container_type.descriptor();
        let mut weigher = Self::new(descriptor, container_type.scalars().as_ref());
        for (slot, element) in descriptor.element_types().iter().enumerate() {
            if let Some(inner) = container_type.nested(element) {
                weigher = weigher.with_nested(slot, Self::for_type(inner));
            }
        }
        weigher
    }

    /// Weigh element slot `slot` (0 for the element or key, 1 for the
    /// mapped value or second member) through `inner`.
    pub fn with_nested(mut self, slot: usize, inner: ContainerWeigher) -> Self {
        let target = if slot == 0 { &mut self.element } else { &mut self.second };
        target.nested = Some(Box::new(inner));
        self
    }

    /// Weight of one host scalar kind into the (first) element type.
    pub fn element_weight(&self, host: HostType) -> ConversionWeight {
        self.element.row.get(host)
    }

    /// Weight of converting `value` into this container type.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn weigh(&self, value: &HostValue) -> ConversionWeight {
        let insight = match (self.kind, value) {
            (ContainerKind::Vector | ContainerKind::List, HostValue::List(list)) => {
                self.element.worst(list.borrow().iter())
            }
            (ContainerKind::Set, HostValue::List(list)) => {
                self.element.worst(list.borrow().iter()) + ConversionWeight::EPSILON
            }
            (ContainerKind::Set, HostValue::Set(set)) => self.element.worst_key(set.borrow().iter()),
            (ContainerKind::Map | ContainerKind::HashMap, HostValue::Dict(dict)) => {
                let dict = dict.borrow();
                self.element.worst_key(dict.keys())
                    + ConversionWeight::CONTAINER_PENALTY
                    + self.second.worst(dict.values())
            }
            (ContainerKind::Pair, HostValue::Tuple(items)) if items.len() == 2 => {
                self.element.weigh(&items[0]) + self.second.weigh(&items[1])
            }
            (ContainerKind::Complex, HostValue::Complex(_)) => self.complex_part,
            _ => return ConversionWeight::INFINITE,
        };
        insight + ConversionWeight::CONTAINER_PENALTY
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BuiltinScalars;
    use stlcouple_core::{HostComplex, HostDict, HostList, HostSet, ScalarType};

    fn weigher(kind: ContainerKind, elements: Vec<ElementType>) -> ContainerWeigher {
        let descriptor = ContainerDescriptor::new("test", kind, elements);
        ContainerWeigher::new(&descriptor, &BuiltinScalars)
    }

    #[test]
    fn exact_element_match_costs_only_the_penalty() {
        let w = weigher(ContainerKind::Vector, vec![ScalarType::Long.into()]);
        let value = HostValue::list([HostValue::Int(1), HostValue::Int(2)]);
        assert_eq!(w.weigh(&value), ConversionWeight::CONTAINER_PENALTY);
    }

    #[test]
    fn worst_element_dominates() {
        let w = weigher(ContainerKind::Vector, vec![ScalarType::Double.into()]);
        let floats = HostValue::list([HostValue::float(1.0)]);
        let mixed = HostValue::list([HostValue::float(1.0), HostValue::Int(2)]);
        assert!(w.weigh(&floats) < w.weigh(&mixed));
        assert_eq!(
            w.weigh(&mixed),
            ConversionWeight::PROMOTION + ConversionWeight::CONTAINER_PENALTY
        );
    }

    #[test]
    fn impossible_element_makes_container_impossible() {
        let w = weigher(ContainerKind::Vector, vec![ScalarType::Long.into()]);
        let value = HostValue::list([HostValue::Int(1), HostValue::str("x")]);
        assert!(!w.weigh(&value).is_possible());
    }

    #[test]
    fn empty_collection_weighs_penalty() {
        let w = weigher(ContainerKind::Vector, vec![ScalarType::Int.into()]);
        let empty_list = HostValue::List(HostList::default());
        assert_eq!(w.weigh(&empty_list), ConversionWeight::CONTAINER_PENALTY);

        let w = weigher(ContainerKind::Set, vec![ScalarType::Int.into()]);
        let empty_set = HostValue::Set(HostSet::default());
        assert_eq!(w.weigh(&empty_set), ConversionWeight::CONTAINER_PENALTY);

        let w = weigher(ContainerKind::Map, vec![ScalarType::Int.into(), ScalarType::Int.into()]);
        let empty_dict = HostValue::Dict(HostDict::default());
        assert_eq!(
            w.weigh(&empty_dict),
            ConversionWeight::CONTAINER_PENALTY + ConversionWeight::CONTAINER_PENALTY
        );
    }

    #[test]
    fn list_into_set_costs_more_than_into_vector() {
        let vector = weigher(ContainerKind::Vector, vec![ScalarType::Long.into()]);
        let set = weigher(ContainerKind::Set, vec![ScalarType::Long.into()]);
        let list = HostValue::list([HostValue::Int(1), HostValue::Int(2)]);
        assert_eq!(
            set.weigh(&list),
            vector.weigh(&list) + ConversionWeight::EPSILON
        );
        assert!(vector.weigh(&list) < set.weigh(&list));

        let host_set = HostValue::set([HostKey::from(1), HostKey::from(2)]);
        assert_eq!(set.weigh(&host_set), ConversionWeight::CONTAINER_PENALTY);
    }

    #[test]
    fn maps_sum_key_and_value() {
        let w = weigher(
            ContainerKind::Map,
            vec![ScalarType::String.into(), ScalarType::Int.into()],
        );
        let value = HostValue::dict([(HostKey::from("a"), HostValue::Int(1))]);
        assert_eq!(
            w.weigh(&value),
            ConversionWeight::EPSILON + ConversionWeight::CONTAINER_PENALTY + ConversionWeight::CONTAINER_PENALTY
        );
    }

    #[test]
    fn exact_map_weighs_a_penalty_per_component() {
        let w = weigher(
            ContainerKind::Map,
            vec![ScalarType::String.into(), ScalarType::Long.into()],
        );
        let value = HostValue::dict([(HostKey::from("a"), HostValue::Int(1))]);
        assert_eq!(w.weigh(&value), ConversionWeight::new(0, 2, 0, 0));
    }

    #[test]
    fn wrong_shape_is_impossible() {
        let w = weigher(ContainerKind::Map, vec![ScalarType::Long.into(), ScalarType::Long.into()]);
        assert_eq!(w.weigh(&HostValue::List(HostList::default())), ConversionWeight::INFINITE);
    }

    #[test]
    fn pairs_and_complex() {
        let pair = weigher(
            ContainerKind::Pair,
            vec![ScalarType::Long.into(), ScalarType::Float.into()],
        );
        let value = HostValue::Tuple(vec![HostValue::Int(1), HostValue::float(0.5)]);
        assert_eq!(
            pair.weigh(&value),
            ConversionWeight::EPSILON + ConversionWeight::CONTAINER_PENALTY
        );

        let complex = weigher(ContainerKind::Complex, vec![ScalarType::Double.into()]);
        assert_eq!(
            complex.weigh(&HostValue::Complex(HostComplex::new(1.0, 2.0))),
            ConversionWeight::CONTAINER_PENALTY
        );
    }

    #[test]
    fn nested_elements_use_the_inner_weigher() {
        let pair = weigher(ContainerKind::Pair, vec![ScalarType::Int.into(), ScalarType::Int.into()]);
        let w = weigher(
            ContainerKind::Vector,
            vec![ElementType::Named("std::pair<int, int>".into())],
        )
        .with_nested(0, pair.clone());

        let pairs = HostValue::list([
            HostValue::Tuple(vec![HostValue::Int(1), HostValue::Int(2)]),
            HostValue::Tuple(vec![HostValue::Int(3), HostValue::Int(4)]),
        ]);
        let inner = pair.weigh(&HostValue::Tuple(vec![HostValue::Int(1), HostValue::Int(2)]));
        assert!(inner.is_possible());
        assert_eq!(w.weigh(&pairs), inner + ConversionWeight::CONTAINER_PENALTY);

        let bad = HostValue::list([HostValue::Tuple(vec![HostValue::Int(1), HostValue::str("x")])]);
        assert!(!w.weigh(&bad).is_possible());
        assert!(!w.weigh(&HostValue::list([HostValue::Int(1)])).is_possible());
    }

    #[test]
    fn unknown_elements_are_generic() {
        let w = weigher(ContainerKind::Vector, vec![ElementType::Unknown]);
        let value = HostValue::list([HostValue::Int(1)]);
        assert_eq!(
            w.weigh(&value),
            ConversionWeight::USER_DEFINED + ConversionWeight::CONTAINER_PENALTY
        );
        assert!(w.weigh(&value).is_possible());
    }
}
