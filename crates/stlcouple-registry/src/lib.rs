//! Container descriptor registry.
//!
//! Holds every coupled container type together with the conversion records
//! that produce it from host collections and the capabilities installed on it.

mod capabilities;
mod record;
mod registry;
mod scalars;

pub use capabilities::{Capabilities, ContainerType};
pub use record::{
    ConversionFunctor, ConversionKey, ConversionRecord, Semantics, Weigher, priority_weight,
};
pub use registry::ContainerRegistry;
pub use scalars::ScalarConversions;
