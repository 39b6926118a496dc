//! Host/foreign container marshalling.
//!
//! `stlcouple` makes foreign (C++ standard library style) containers usable
//! from a dynamic host runtime and the other way around:
//!
//! - [`Coupler`] turns instantiation names such as `std::vector<int>` into
//!   registered container types with conversion records for both copy
//!   semantics
//! - [`Dispatcher`] ranks overloaded foreign functions against host
//!   arguments, converts them and copies volatile arguments back
//! - [`ContainerType`] exposes sequence and mapping access on foreign
//!   instances
//!
//! # Example
//!
//! ```
//! use stlcouple::{ContainerRegistry, Coupler, ForeignHeap, HostValue, MarshalConfig, Semantics};
//! use stlcouple::CallFrame;
//!
//! let mut registry = ContainerRegistry::new();
//! let descriptor = Coupler::new(&mut registry, MarshalConfig::default())
//!     .couple("std::vector<int>", None)
//!     .unwrap();
//!
//! let host = HostValue::list([HostValue::Int(1), HostValue::Int(2)]);
//! let record = registry.conversion_for(&host, &descriptor.key, Semantics::Value).unwrap();
//!
//! let mut heap = ForeignHeap::new();
//! let mut frame = CallFrame::new(&mut heap);
//! let handle = record.convert(&host, &mut frame).unwrap();
//! let container_type = registry.container_type(&descriptor.key).unwrap();
//! assert_eq!(container_type.to_host(frame.heap(), handle).unwrap(), host);
//! ```

pub mod bulk;
pub mod config;
pub mod coupler;
pub mod dispatch;
pub mod factory;
pub mod logging;
pub mod resolver;
pub mod scalars;
pub mod weigher;

pub use stlcouple_core::{
    AccessError, AmbiguousConversionError, BindingHandle, BindingState, BulkHooks, CallFrame,
    ConfigurationError, ContainerDescriptor, ContainerKind, ConversionWeight, CopyBackError,
    CopyBackReport, DescriptorKey, ElementConversionError, ElementPosition, ElementType,
    ForeignContainer, ForeignHandle, ForeignHeap, ForeignInstance, ForeignValue, HostComplex,
    HostDict, HostKey, HostList, HostSet, HostShape, HostType, HostValue, MarshalError,
    ScalarConversionError, ScalarType, TypeHash,
};
pub use stlcouple_registry::{
    Capabilities, ContainerRegistry, ContainerType, ConversionFunctor, ConversionRecord,
    ScalarConversions, Semantics, Weigher,
};

pub use config::{MarshalConfig, ParseTiePolicyError, TiePolicy};
pub use coupler::Coupler;
pub use dispatch::{
    CallOutcome, Dispatcher, ForeignArg, NativeFunction, Overload, ParamType, Parameter, Passing,
};
pub use factory::FunctorFactory;
pub use logging::init_logging;
pub use resolver::{ElementHint, TemplateName, resolve, resolve_elements};
pub use scalars::BuiltinScalars;
pub use weigher::ContainerWeigher;
