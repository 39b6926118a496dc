//! Core data model for cross-language container marshalling.
//!
//! This crate holds the types shared by the registry and the marshalling
//! layer:
//!
//! - [`TypeHash`]: deterministic identity for foreign types
//! - [`ScalarType`], [`HostType`], [`ElementType`]: the two type vocabularies
//! - [`ConversionWeight`]: ordered, summable conversion cost
//! - [`HostValue`]: host-language values with shared-identity collections
//! - [`ForeignContainer`], [`ForeignHeap`]: foreign instances and their arena
//! - [`ContainerDescriptor`]: one instantiated container type
//! - [`CallFrame`]: call-scoped temporaries and copy-back bindings
//! - error types for every stage

mod descriptor;
mod element_type;
mod error;
mod foreign;
mod heap;
mod host;
mod transient;
mod type_hash;
mod weight;

pub use descriptor::{
    BulkFill, BulkHooks, BulkRefill, ContainerDescriptor, ContainerKind, DescriptorKey,
};
pub use element_type::{ElementType, HostType, ScalarType};
pub use error::{
    AccessError, AmbiguousConversionError, ConfigurationError, CopyBackError,
    ElementConversionError, ElementPosition, MarshalError, ScalarConversionError,
};
pub use foreign::{ForeignContainer, ForeignInstance, ForeignValue};
pub use heap::{ForeignHandle, ForeignHeap};
pub use host::{HostComplex, HostDict, HostKey, HostList, HostSet, HostShape, HostValue};
pub use transient::{
    BindingHandle, BindingState, CallFrame, CopyBackFn, CopyBackReport, TransientBinding,
};
pub use type_hash::{TypeHash, hash_constants};
pub use weight::ConversionWeight;
