//! Conversion records: one direction of a host-to-foreign conversion.

use std::fmt;
use std::sync::Arc;

use stlcouple_core::{
    CallFrame, ConversionWeight, DescriptorKey, ElementConversionError, ForeignHandle, HostShape,
    HostValue,
};

/// Whether a conversion produces an independent copy or a copy-back binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Semantics {
    /// A new, independent foreign container.
    Value,
    /// A temporary container bound back to its host collection.
    Volatile,
}

impl Semantics {
    pub const fn name(self) -> &'static str {
        match self {
            Semantics::Value => "value",
            Semantics::Volatile => "volatile",
        }
    }
}

impl fmt::Display for Semantics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Builds a foreign instance from a host value inside a call frame.
///
/// The returned handle is a frame temporary.
pub type ConversionFunctor = Arc<
    dyn Fn(&HostValue, &mut CallFrame<'_>) -> Result<ForeignHandle, ElementConversionError>
        + Send
        + Sync,
>;

/// Ranks converting a host value with a conversion record.
pub type Weigher = Arc<dyn Fn(&HostValue) -> ConversionWeight + Send + Sync>;

/// Lookup key for a [`ConversionRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConversionKey {
    pub shape: HostShape,
    pub target: DescriptorKey,
    pub semantics: Semantics,
}

/// One registered conversion direction.
#[derive(Clone)]
pub struct ConversionRecord {
    pub shape: HostShape,
    pub target: DescriptorKey,
    pub semantics: Semantics,
    pub functor: ConversionFunctor,
    /// Registration priority; every step above 1 adds one promotion.
    pub priority: u32,
    pub weigher: Weigher,
}

impl ConversionRecord {
    pub fn key(&self) -> ConversionKey {
        ConversionKey {
            shape: self.shape,
            target: self.target.clone(),
            semantics: self.semantics,
        }
    }

    /// Total weight of converting `value` with this record.
    pub fn weigh(&self, value: &HostValue) -> ConversionWeight {
        (self.weigher)(value) + priority_weight(self.priority)
    }

    /// Run the functor.
    pub fn convert(
        &self,
        value: &HostValue,
        frame: &mut CallFrame<'_>,
    ) -> Result<ForeignHandle, ElementConversionError> {
        (self.functor)(value, frame)
    }
}

impl fmt::Debug for ConversionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionRecord")
            .field("shape", &self.shape)
            .field("target", &self.target)
            .field("semantics", &self.semantics)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

/// Weight contributed by a registration priority.
pub fn priority_weight(priority: u32) -> ConversionWeight {
    ConversionWeight::new(0, priority.saturating_sub(1), 0, 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_priority_adds_nothing() {
        assert!(priority_weight(1).is_exact());
        assert!(priority_weight(0).is_exact());
        assert_eq!(priority_weight(3).as_tuple(), (0, 2, 0, 0));
    }
}
