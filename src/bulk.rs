//! Whole-container paths for integer vectors.
//!
//! Integer vectors are the most common argument type by far, so their
//! conversion skips the per-element collaborator calls: the host list is
//! converted into one buffer and assigned to the vector in a single
//! operation, and copy-back rewrites the host list the same way. Results and
//! error positions are identical to the element-wise path.

use stlcouple_core::{
    BulkHooks, ContainerKind, ElementConversionError, ElementPosition, ElementType,
    ForeignContainer, HostList, HostValue, ScalarType,
};

use crate::scalars::{foreign_to_host, scalar_to_foreign};

/// Element types that get the bulk path.
pub const BULK_ELEMENTS: [ScalarType; 6] = [
    ScalarType::Int,
    ScalarType::UInt,
    ScalarType::Long,
    ScalarType::ULong,
    ScalarType::LongLong,
    ScalarType::ULongLong,
];

/// The bulk hooks for a container, if it qualifies.
pub fn hooks_for(kind: ContainerKind, element: &ElementType) -> Option<BulkHooks> {
    let scalar = element.as_scalar()?;
    (kind == ContainerKind::Vector && BULK_ELEMENTS.contains(&scalar)).then_some(BulkHooks {
        fill: fill_integers,
        refill: refill_integers,
    })
}

#[cfg_attr(feature = "profiling", profiling::function)]
fn fill_integers(
    values: &[HostValue],
    target: ScalarType,
    container: &mut ForeignContainer,
) -> Result<(), ElementConversionError> {
    let converted = values
        .iter()
        .enumerate()
        .map(|(i, value)| {
            scalar_to_foreign(value, target).map_err(|cause| {
                ElementConversionError::new(
                    ElementPosition::Index(i),
                    target.name(),
                    value.host_type().name(),
                )
                .with_cause(cause)
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    if container.replace_values(converted) {
        Ok(())
    } else {
        Err(ElementConversionError::new(
            ElementPosition::Whole,
            "sequence container",
            container.kind().prefix(),
        ))
    }
}

#[cfg_attr(feature = "profiling", profiling::function)]
fn refill_integers(
    container: &ForeignContainer,
    _target: ScalarType,
    list: &HostList,
) -> Result<(), ElementConversionError> {
    let items = container
        .values()
        .enumerate()
        .map(|(i, value)| {
            foreign_to_host(value).map_err(|cause| {
                ElementConversionError::new(ElementPosition::Index(i), "host value", value.kind_name())
                    .with_cause(cause)
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    list.replace(items);
    Ok(())
}
