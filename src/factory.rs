//! Conversion functors.
//!
//! A functor turns one host collection into a freshly constructed foreign
//! instance, using only the container's insert primitives and the scalar
//! collaborator. Value functors leave the instance as a frame temporary.
//! Volatile functors additionally bind it to the host collection so the
//! frame copies its final contents back when the call ends.
//!
//! Any element failure aborts the whole conversion before the instance is
//! allocated, so nothing partial ever reaches the heap.
//!
//! Elements of a nested container type go through the inner type's value
//! conversion. Each inner instance is a frame temporary that the outer
//! instance also holds a reference on, so it lives exactly as long as the
//! outer one.

use std::sync::Arc;

use ordered_float::OrderedFloat;
use tracing::trace;

use stlcouple_core::{
    CallFrame, ContainerKind, CopyBackError, CopyBackFn, ElementConversionError, ElementPosition,
    ElementType, ForeignContainer, ForeignHandle, ForeignHeap, ForeignInstance, ForeignValue, HostKey,
    HostValue,
};
use stlcouple_registry::{ContainerType, ConversionFunctor, Semantics};

/// Builds the conversion functors of one coupled container type.
#[derive(Debug, Clone)]
pub struct FunctorFactory {
    container_type: ContainerType,
}

impl FunctorFactory {
    pub fn new(container_type: ContainerType) -> Self {
        Self { container_type }
    }

    /// Build the functor for one semantics.
    pub fn build(&self, semantics: Semantics) -> ConversionFunctor {
        let container_type = self.container_type.clone();
        match semantics {
            Semantics::Value => Arc::new(move |value: &HostValue, frame: &mut CallFrame<'_>| {
                let handle = convert_value(&container_type, value, frame)?;
                trace!(target: "marshal", container = %container_type.descriptor().name, %handle, "value copy");
                Ok(handle)
            }),
            Semantics::Volatile => {
                let copy_back = copy_back_fn(container_type.clone());
                Arc::new(move |value: &HostValue, frame: &mut CallFrame<'_>| {
                    let handle = convert_value(&container_type, value, frame)?;
                    let name = container_type.descriptor().name.clone();
                    trace!(target: "marshal", container = %name, %handle, "volatile copy");
                    frame.bind(value.clone(), handle, name, copy_back.clone());
                    Ok(handle)
                })
            }
        }
    }
}

/// Build a functor for `container_type` with the given semantics.
pub fn build(container_type: &ContainerType, semantics: Semantics) -> ConversionFunctor {
    FunctorFactory::new(container_type.clone()).build(semantics)
}

// ==========================================================================
// Construction
// ==========================================================================

/// Construct `value` as a frame temporary owning its instance elements.
fn convert_value(
    container_type: &ContainerType,
    value: &HostValue,
    frame: &mut CallFrame<'_>,
) -> Result<ForeignHandle, ElementConversionError> {
    let instance = construct(container_type, value, frame)?;
    frame.heap_mut().retain_elements(&instance);
    Ok(frame.allocate_temporary(instance))
}

#[cfg_attr(feature = "profiling", profiling::function)]
fn construct(
    container_type: &ContainerType,
    value: &HostValue,
    frame: &mut CallFrame<'_>,
) -> Result<ForeignInstance, ElementConversionError> {
    let descriptor = container_type.descriptor();
    let kind = descriptor.kind();
    let shape_error = || {
        ElementConversionError::new(
            ElementPosition::Whole,
            descriptor.name.to_string(),
            value.host_type().name(),
        )
    };
    let mut instance = descriptor.construct_empty();

    match kind {
        ContainerKind::Vector | ContainerKind::List | ContainerKind::Set => {
            let list_items;
            let set_items: Vec<HostValue>;
            let items: &[HostValue] = match value {
                HostValue::List(list) => {
                    list_items = list.borrow();
                    &list_items
                }
                HostValue::Set(set) if kind == ContainerKind::Set => {
                    set_items = set.borrow().iter().cloned().map(HostKey::into_value).collect();
                    &set_items
                }
                _ => return Err(shape_error()),
            };
            fill_sequence(container_type, items, &mut instance.container, frame)?;
        }
        ContainerKind::Map | ContainerKind::HashMap => {
            let dict = value.as_dict().ok_or_else(shape_error)?;
            let entries = dict.borrow();
            instance.container.reserve(entries.len());
            for (key, item) in entries.iter() {
                let foreign_key = convert_element(
                    container_type,
                    &key.clone().into_value(),
                    descriptor.element(),
                    ElementPosition::Key(key.clone()),
                    frame,
                )?;
                let foreign_value = convert_element(
                    container_type,
                    item,
                    descriptor.second_element(),
                    ElementPosition::ValueAt(key.clone()),
                    frame,
                )?;
                instance.container.insert_pair(foreign_key, foreign_value);
            }
        }
        ContainerKind::Pair => match value {
            HostValue::Tuple(items) if items.len() == 2 => {
                let first = convert_element(
                    container_type,
                    &items[0],
                    descriptor.element(),
                    ElementPosition::First,
                    frame,
                )?;
                let second = convert_element(
                    container_type,
                    &items[1],
                    descriptor.second_element(),
                    ElementPosition::Second,
                    frame,
                )?;
                instance.container = ForeignContainer::Pair(first, second);
            }
            _ => return Err(shape_error()),
        },
        ContainerKind::Complex => {
            let HostValue::Complex(complex) = value else {
                return Err(shape_error());
            };
            instance.container = ForeignContainer::Complex {
                re: complex_part(container_type, complex.re, ElementPosition::Real, frame.heap())?,
                im: complex_part(container_type, complex.im, ElementPosition::Imaginary, frame.heap())?,
            };
        }
    }
    Ok(instance)
}

fn fill_sequence(
    container_type: &ContainerType,
    items: &[HostValue],
    container: &mut ForeignContainer,
    frame: &mut CallFrame<'_>,
) -> Result<(), ElementConversionError> {
    let descriptor = container_type.descriptor();
    let element = descriptor.element();
    if let (Some(bulk), Some(scalar)) = (descriptor.bulk, element.as_scalar()) {
        return (bulk.fill)(items, scalar, container);
    }

    container.reserve(items.len());
    for (i, item) in items.iter().enumerate() {
        let converted = convert_element(container_type, item, element, ElementPosition::Index(i), frame)?;
        container.insert(converted);
    }
    Ok(())
}

/// Convert one element. Host collections bound for a nested container type
/// become inner instances; everything else goes to the scalar collaborator.
fn convert_element(
    container_type: &ContainerType,
    item: &HostValue,
    element: &ElementType,
    position: ElementPosition,
    frame: &mut CallFrame<'_>,
) -> Result<ForeignValue, ElementConversionError> {
    match container_type.nested(element) {
        Some(inner) if item.shape().is_some() => {
            let handle = convert_value(inner, item, frame).map_err(|err| err.at(position))?;
            Ok(ForeignValue::Instance(handle))
        }
        _ => container_type.element_to_foreign(item, element, position, frame.heap()),
    }
}

fn complex_part(
    container_type: &ContainerType,
    part: OrderedFloat<f64>,
    position: ElementPosition,
    heap: &ForeignHeap,
) -> Result<OrderedFloat<f64>, ElementConversionError> {
    let element = container_type.descriptor().element();
    match container_type.element_to_foreign(&HostValue::Float(part), element, position.clone(), heap)? {
        ForeignValue::Float(value) => Ok(value),
        other => Err(ElementConversionError::new(position, element.name(), other.kind_name())),
    }
}

// ==========================================================================
// Copy-back
// ==========================================================================

/// Copy-back for volatile instances of `container_type`.
///
/// Sequences are rewritten in order. Sets and dicts have their contents
/// replaced wholesale. A host list bound to a set receives the set's
/// contents in set order. Tuples and complex numbers cannot be updated in
/// place, so copy-back only succeeds when their contents are unchanged.
pub fn copy_back_fn(container_type: ContainerType) -> CopyBackFn {
    Arc::new(move |heap: &ForeignHeap, instance: &ForeignInstance, host: &HostValue| {
        copy_back(&container_type, heap, instance, host)
    })
}

#[cfg_attr(feature = "profiling", profiling::function)]
fn copy_back(
    container_type: &ContainerType,
    heap: &ForeignHeap,
    instance: &ForeignInstance,
    host: &HostValue,
) -> Result<(), CopyBackError> {
    let descriptor = container_type.descriptor();
    let target = || descriptor.name.to_string();
    let element_error = |source| CopyBackError::Element {
        target: target(),
        source,
    };

    if let (HostValue::List(list), Some(bulk), Some(scalar)) =
        (host, descriptor.bulk, descriptor.element().as_scalar())
    {
        return (bulk.refill)(&instance.container, scalar, list).map_err(element_error);
    }

    let readback = container_type
        .container_to_host(&instance.container, heap)
        .map_err(element_error)?;
    match (host, readback) {
        (HostValue::List(list), HostValue::List(items)) => list.replace(items.to_vec()),
        (HostValue::List(list), HostValue::Set(keys)) => {
            list.replace(keys.borrow().iter().cloned().map(HostKey::into_value).collect())
        }
        (HostValue::Set(set), HostValue::Set(keys)) => set.replace(keys.borrow().clone()),
        (HostValue::Dict(dict), HostValue::Dict(entries)) => dict.replace(entries.borrow().clone()),
        (HostValue::Tuple(_) | HostValue::Complex(_), readback) if *host == readback => {}
        (other, _) => {
            return Err(CopyBackError::HostShapeMismatch {
                target: target(),
                actual: other.host_type().name(),
            });
        }
    }
    Ok(())
}
