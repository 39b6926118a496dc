//! Derived capabilities installed on coupled container types.
//!
//! Every operation here is written against the container's own primitives
//! (iterate, size, insert) plus the scalar collaborator, so the same code
//! serves every element type.
//!
//! An element type that is itself a coupled container is *nested*: its
//! elements are instances owned by the outer container, and readback turns
//! them into host collections through the inner type.

use std::fmt;
use std::sync::Arc;

use bitflags::bitflags;

use stlcouple_core::{
    AccessError, ContainerDescriptor, ContainerKind, ElementConversionError, ElementPosition,
    ElementType, ForeignContainer, ForeignHandle, ForeignHeap, ForeignInstance, ForeignValue,
    HostComplex, HostKey, HostValue,
};

use crate::ScalarConversions;

bitflags! {
    /// Operations a coupled container type supports.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Capabilities: u16 {
        /// Readback into the equivalent host collection.
        const TO_HOST = 1 << 0;
        /// Element count.
        const LENGTH = 1 << 1;
        /// Iteration in container order.
        const ITERATION = 1 << 2;
        /// Positional element access.
        const INDEX = 1 << 3;
        /// Range access returning a host list.
        const SLICE = 1 << 4;
        /// Content equality between two instances.
        const EQUALITY = 1 << 5;
        /// Membership test.
        const CONTAINS = 1 << 6;
        /// Lookup by key.
        const KEY_LOOKUP = 1 << 7;
        /// Insert, overwrite and delete by key.
        const KEY_MUTATION = 1 << 8;
    }
}

impl Capabilities {
    /// Capabilities derived for a container kind.
    pub fn for_kind(kind: ContainerKind) -> Capabilities {
        let base = Capabilities::TO_HOST | Capabilities::EQUALITY;
        match kind {
            ContainerKind::Vector | ContainerKind::List => {
                base | Capabilities::LENGTH
                    | Capabilities::ITERATION
                    | Capabilities::INDEX
                    | Capabilities::SLICE
                    | Capabilities::CONTAINS
            }
            ContainerKind::Set => {
                base | Capabilities::LENGTH
                    | Capabilities::ITERATION
                    | Capabilities::INDEX
                    | Capabilities::CONTAINS
            }
            ContainerKind::Map | ContainerKind::HashMap => {
                base | Capabilities::LENGTH
                    | Capabilities::ITERATION
                    | Capabilities::CONTAINS
                    | Capabilities::KEY_LOOKUP
                    | Capabilities::KEY_MUTATION
            }
            ContainerKind::Pair => {
                base | Capabilities::LENGTH | Capabilities::ITERATION | Capabilities::INDEX
            }
            ContainerKind::Complex => base,
        }
    }
}

/// A coupled container type with its installed capabilities.
#[derive(Clone)]
pub struct ContainerType {
    descriptor: Arc<ContainerDescriptor>,
    capabilities: Capabilities,
    scalars: Arc<dyn ScalarConversions>,
    nested: Vec<(ElementType, ContainerType)>,
}

impl ContainerType {
    pub fn new(descriptor: Arc<ContainerDescriptor>, scalars: Arc<dyn ScalarConversions>) -> Self {
        Self {
            capabilities: Capabilities::for_kind(descriptor.kind()),
            descriptor,
            scalars,
            nested: Vec::new(),
        }
    }

    /// Treat `element` as the coupled container type `inner`.
    pub fn with_nested(mut self, element: ElementType, inner: ContainerType) -> Self {
        self.nested.retain(|(e, _)| *e != element);
        self.nested.push((element, inner));
        self
    }

    /// The coupled container type behind `element`, if it is nested.
    pub fn nested(&self, element: &ElementType) -> Option<&ContainerType> {
        self.nested.iter().find(|(e, _)| e == element).map(|(_, inner)| inner)
    }

    pub fn descriptor(&self) -> &Arc<ContainerDescriptor> {
        &self.descriptor
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn supports(&self, capability: Capabilities) -> bool {
        self.capabilities.contains(capability)
    }

    pub fn scalars(&self) -> &Arc<dyn ScalarConversions> {
        &self.scalars
    }

    // ==========================================================================
    // Element conversion
    // ==========================================================================

    /// Convert one foreign element to its host form.
    ///
    /// Instances of a nested container type read back as host collections.
    pub fn element_to_host(
        &self,
        value: &ForeignValue,
        element: &ElementType,
        position: ElementPosition,
        heap: &ForeignHeap,
    ) -> Result<HostValue, ElementConversionError> {
        if let (ForeignValue::Instance(handle), Some(inner)) = (value, self.nested(element)) {
            let instance = heap.get(*handle).ok_or_else(|| {
                ElementConversionError::new(position.clone(), element.name(), "released instance")
            })?;
            return inner
                .container_to_host(&instance.container, heap)
                .map_err(|err| err.at(position));
        }
        self.scalars.to_host(value, element).map_err(|cause| {
            ElementConversionError::new(position, "host value", value.kind_name()).with_cause(cause)
        })
    }

    /// Convert one host element to its foreign form.
    pub fn element_to_foreign(
        &self,
        value: &HostValue,
        element: &ElementType,
        position: ElementPosition,
        heap: &ForeignHeap,
    ) -> Result<ForeignValue, ElementConversionError> {
        self.scalars.to_foreign(value, element, heap).map_err(|cause| {
            ElementConversionError::new(position, element.name(), value.host_type().name())
                .with_cause(cause)
        })
    }

    fn element_to_key(
        &self,
        value: &ForeignValue,
        element: &ElementType,
        position: ElementPosition,
        heap: &ForeignHeap,
    ) -> Result<HostKey, ElementConversionError> {
        let host = self.element_to_host(value, element, position.clone(), heap)?;
        host.to_key().ok_or_else(|| {
            ElementConversionError::new(position, "hashable value", host.host_type().name())
        })
    }

    // ==========================================================================
    // Readback
    // ==========================================================================

    /// Read a whole container back into the equivalent host collection.
    ///
    /// Sequences keep their order, sets and maps become host sets and dicts,
    /// pairs become 2-tuples and complex numbers become host complex numbers.
    pub fn container_to_host(
        &self,
        container: &ForeignContainer,
        heap: &ForeignHeap,
    ) -> Result<HostValue, ElementConversionError> {
        let element = self.descriptor.element();
        match container {
            ForeignContainer::Vector(_) | ForeignContainer::List(_) => {
                let items = container
                    .values()
                    .enumerate()
                    .map(|(i, v)| self.element_to_host(v, element, ElementPosition::Index(i), heap))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(HostValue::list(items))
            }
            ForeignContainer::Set(_) => {
                let items = container
                    .values()
                    .enumerate()
                    .map(|(i, v)| self.element_to_key(v, element, ElementPosition::Index(i), heap))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(HostValue::set(items))
            }
            ForeignContainer::Map(_) | ForeignContainer::HashMap(_) => {
                let value_type = self.descriptor.second_element();
                let entries = container
                    .entries()
                    .enumerate()
                    .map(|(i, (k, v))| {
                        let key = self.element_to_key(k, element, ElementPosition::Index(i), heap)?;
                        let value = self.element_to_host(
                            v,
                            value_type,
                            ElementPosition::ValueAt(key.clone()),
                            heap,
                        )?;
                        Ok((key, value))
                    })
                    .collect::<Result<Vec<_>, ElementConversionError>>()?;
                Ok(HostValue::dict(entries))
            }
            ForeignContainer::Pair(first, second) => Ok(HostValue::Tuple(vec![
                self.element_to_host(first, element, ElementPosition::First, heap)?,
                self.element_to_host(
                    second,
                    self.descriptor.second_element(),
                    ElementPosition::Second,
                    heap,
                )?,
            ])),
            ForeignContainer::Complex { re, im } => Ok(HostValue::Complex(HostComplex {
                re: *re,
                im: *im,
            })),
        }
    }

    // ==========================================================================
    // Instance operations
    // ==========================================================================

    fn require(&self, capability: Capabilities, operation: &'static str) -> Result<(), AccessError> {
        if self.capabilities.contains(capability) {
            Ok(())
        } else {
            Err(AccessError::Unsupported {
                container: self.descriptor.name.to_string(),
                operation,
            })
        }
    }

    /// Resolve a handle to an instance of this type.
    pub fn instance<'h>(
        &self,
        heap: &'h ForeignHeap,
        handle: ForeignHandle,
    ) -> Result<&'h ForeignInstance, AccessError> {
        let instance = heap
            .get(handle)
            .ok_or(AccessError::StaleHandle { index: handle.index })?;
        self.check_type(instance)?;
        Ok(instance)
    }

    fn instance_mut<'h>(
        &self,
        heap: &'h mut ForeignHeap,
        handle: ForeignHandle,
    ) -> Result<&'h mut ForeignInstance, AccessError> {
        let instance = heap
            .get_mut(handle)
            .ok_or(AccessError::StaleHandle { index: handle.index })?;
        self.check_type(instance)?;
        Ok(instance)
    }

    fn check_type(&self, instance: &ForeignInstance) -> Result<(), AccessError> {
        if instance.type_hash == self.descriptor.type_hash {
            Ok(())
        } else {
            Err(AccessError::ShapeMismatch {
                expected: self.descriptor.name.to_string(),
                actual: instance.type_name.to_string(),
            })
        }
    }

    /// `toHost`: read an instance back into a host collection.
    pub fn to_host(&self, heap: &ForeignHeap, handle: ForeignHandle) -> Result<HostValue, AccessError> {
        self.require(Capabilities::TO_HOST, "conversion to host")?;
        let instance = self.instance(heap, handle)?;
        Ok(self.container_to_host(&instance.container, heap)?)
    }

    pub fn len(&self, heap: &ForeignHeap, handle: ForeignHandle) -> Result<usize, AccessError> {
        self.require(Capabilities::LENGTH, "len")?;
        Ok(self.instance(heap, handle)?.container.len())
    }

    /// Iterate in container order: values for sequences, sets and pairs, keys for maps.
    pub fn iter(&self, heap: &ForeignHeap, handle: ForeignHandle) -> Result<Vec<HostValue>, AccessError> {
        self.require(Capabilities::ITERATION, "iteration")?;
        let container = &self.instance(heap, handle)?.container;
        let element = self.descriptor.element();
        let items = if container.kind().is_map() {
            container
                .entries()
                .enumerate()
                .map(|(i, (k, _))| self.element_to_host(k, element, ElementPosition::Index(i), heap))
                .collect::<Result<Vec<_>, _>>()?
        } else if let ForeignContainer::Pair(first, second) = container {
            vec![
                self.element_to_host(first, element, ElementPosition::First, heap)?,
                self.element_to_host(
                    second,
                    self.descriptor.second_element(),
                    ElementPosition::Second,
                    heap,
                )?,
            ]
        } else {
            container
                .values()
                .enumerate()
                .map(|(i, v)| self.element_to_host(v, element, ElementPosition::Index(i), heap))
                .collect::<Result<Vec<_>, _>>()?
        };
        Ok(items)
    }

    /// Positional access. Negative indices count from the end.
    pub fn get(&self, heap: &ForeignHeap, handle: ForeignHandle, index: i64) -> Result<HostValue, AccessError> {
        self.require(Capabilities::INDEX, "indexing")?;
        let container = &self.instance(heap, handle)?.container;
        let len = container.len();
        let position = normalize_index(index, len)
            .ok_or(AccessError::IndexOutOfRange { index, len })?;

        let (value, element) = match container {
            ForeignContainer::Pair(first, second) => {
                if position == 0 {
                    (first, self.descriptor.element())
                } else {
                    (second, self.descriptor.second_element())
                }
            }
            _ => {
                let value = container
                    .values()
                    .nth(position)
                    .ok_or(AccessError::IndexOutOfRange { index, len })?;
                (value, self.descriptor.element())
            }
        };
        Ok(self.element_to_host(value, element, ElementPosition::Index(position), heap)?)
    }

    /// Range access with host slice semantics: bounds are clamped, negative
    /// bounds count from the end.
    pub fn slice(
        &self,
        heap: &ForeignHeap,
        handle: ForeignHandle,
        start: Option<i64>,
        stop: Option<i64>,
    ) -> Result<HostValue, AccessError> {
        self.require(Capabilities::SLICE, "slicing")?;
        let container = &self.instance(heap, handle)?.container;
        let len = container.len();
        let start = clamp_bound(start.unwrap_or(0), len);
        let stop = clamp_bound(stop.unwrap_or(len as i64), len);

        let element = self.descriptor.element();
        let items = container
            .values()
            .enumerate()
            .skip(start)
            .take(stop.saturating_sub(start))
            .map(|(i, v)| self.element_to_host(v, element, ElementPosition::Index(i), heap))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(HostValue::list(items))
    }

    /// Membership test. Values that cannot convert to the element type are never members.
    ///
    /// Host collections are compared against nested elements by readback.
    pub fn contains(&self, heap: &ForeignHeap, handle: ForeignHandle, value: &HostValue) -> Result<bool, AccessError> {
        self.require(Capabilities::CONTAINS, "membership test")?;
        let container = &self.instance(heap, handle)?.container;
        let element = self.descriptor.element();
        if self.nested(element).is_some() && value.shape().is_some() {
            for (i, item) in container.values().enumerate() {
                if self.element_to_host(item, element, ElementPosition::Index(i), heap)? == *value {
                    return Ok(true);
                }
            }
            return Ok(false);
        }
        match self.element_to_foreign(value, self.descriptor.element(), ElementPosition::Whole, heap) {
            Ok(foreign) => Ok(container.contains(&foreign)),
            Err(_) => Ok(false),
        }
    }

    /// Map lookup.
    pub fn get_item(&self, heap: &ForeignHeap, handle: ForeignHandle, key: &HostValue) -> Result<HostValue, AccessError> {
        self.require(Capabilities::KEY_LOOKUP, "key lookup")?;
        let container = &self.instance(heap, handle)?.container;
        let host_key = lookup_key(key)?;
        let foreign_key = self.element_to_foreign(
            key,
            self.descriptor.element(),
            ElementPosition::Key(host_key.clone()),
            heap,
        )?;
        let value = container
            .get_key(&foreign_key)
            .ok_or(AccessError::KeyNotFound { key: host_key.clone() })?;
        Ok(self.element_to_host(
            value,
            self.descriptor.second_element(),
            ElementPosition::ValueAt(host_key),
            heap,
        )?)
    }

    /// Map insert-or-overwrite.
    pub fn set_item(
        &self,
        heap: &mut ForeignHeap,
        handle: ForeignHandle,
        key: &HostValue,
        value: &HostValue,
    ) -> Result<(), AccessError> {
        self.require(Capabilities::KEY_MUTATION, "item assignment")?;
        self.instance(heap, handle)?;
        let host_key = lookup_key(key)?;
        let foreign_key = self.element_to_foreign(
            key,
            self.descriptor.element(),
            ElementPosition::Key(host_key.clone()),
            heap,
        )?;
        let foreign_value = self.element_to_foreign(
            value,
            self.descriptor.second_element(),
            ElementPosition::ValueAt(host_key),
            heap,
        )?;
        if let ForeignValue::Instance(element) = foreign_value {
            heap.add_ref(element);
        }
        let replaced = self.instance_mut(heap, handle)?.container.remove_key(&foreign_key);
        self.instance_mut(heap, handle)?
            .container
            .insert_pair(foreign_key, foreign_value);
        if let Some(ForeignValue::Instance(element)) = replaced {
            heap.release(element);
        }
        Ok(())
    }

    /// Map delete.
    pub fn del_item(&self, heap: &mut ForeignHeap, handle: ForeignHandle, key: &HostValue) -> Result<(), AccessError> {
        self.require(Capabilities::KEY_MUTATION, "item deletion")?;
        self.instance(heap, handle)?;
        let host_key = lookup_key(key)?;
        let foreign_key = self.element_to_foreign(
            key,
            self.descriptor.element(),
            ElementPosition::Key(host_key.clone()),
            heap,
        )?;
        let removed = self
            .instance_mut(heap, handle)?
            .container
            .remove_key(&foreign_key)
            .ok_or(AccessError::KeyNotFound { key: host_key })?;
        if let ForeignValue::Instance(element) = removed {
            heap.release(element);
        }
        Ok(())
    }

    /// Content equality of two instances of this type.
    pub fn equals(&self, heap: &ForeignHeap, a: ForeignHandle, b: ForeignHandle) -> Result<bool, AccessError> {
        self.require(Capabilities::EQUALITY, "equality")?;
        let a = self.instance(heap, a)?;
        let b = self.instance(heap, b)?;
        Ok(a.container == b.container)
    }
}

impl fmt::Debug for ContainerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContainerType")
            .field("descriptor", &self.descriptor.name)
            .field("capabilities", &self.capabilities)
            .field("nested", &self.nested.iter().map(|(e, _)| e.name()).collect::<Vec<_>>())
            .finish()
    }
}

fn lookup_key(key: &HostValue) -> Result<HostKey, AccessError> {
    key.to_key().ok_or_else(|| {
        AccessError::Element(ElementConversionError::new(
            ElementPosition::Whole,
            "hashable key",
            key.host_type().name(),
        ))
    })
}

fn normalize_index(index: i64, len: usize) -> Option<usize> {
    let len = len as i64;
    let index = if index < 0 { index + len } else { index };
    (0..len).contains(&index).then_some(index as usize)
}

fn clamp_bound(bound: i64, len: usize) -> usize {
    let len = len as i64;
    let bound = if bound < 0 { bound + len } else { bound };
    bound.clamp(0, len) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequences_get_slices_maps_get_keys() {
        let vector = Capabilities::for_kind(ContainerKind::Vector);
        assert!(vector.contains(Capabilities::SLICE | Capabilities::INDEX));
        assert!(!vector.contains(Capabilities::KEY_LOOKUP));

        let map = Capabilities::for_kind(ContainerKind::HashMap);
        assert!(map.contains(Capabilities::KEY_LOOKUP | Capabilities::KEY_MUTATION));
        assert!(!map.contains(Capabilities::SLICE));

        let complex = Capabilities::for_kind(ContainerKind::Complex);
        assert_eq!(complex, Capabilities::TO_HOST | Capabilities::EQUALITY);
    }

    #[test]
    fn index_normalization() {
        assert_eq!(normalize_index(0, 3), Some(0));
        assert_eq!(normalize_index(-1, 3), Some(2));
        assert_eq!(normalize_index(3, 3), None);
        assert_eq!(normalize_index(-4, 3), None);
        assert_eq!(normalize_index(0, 0), None);
    }

    #[test]
    fn slice_bounds_clamp() {
        assert_eq!(clamp_bound(-1, 3), 2);
        assert_eq!(clamp_bound(10, 3), 3);
        assert_eq!(clamp_bound(-10, 3), 0);
    }
}
