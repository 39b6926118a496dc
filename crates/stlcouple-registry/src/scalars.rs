//! The single-value conversion collaborator.

use stlcouple_core::{
    ConversionWeight, ElementType, ForeignHeap, ForeignValue, HostType, HostValue,
    ScalarConversionError,
};

/// Converts and ranks single values between host and foreign representations.
///
/// Container conversions are built on top of this: every element, key and
/// member goes through one of these methods. Implementations must be
/// stateless or internally synchronized, because one instance is shared by
/// every coupled container type across threads.
pub trait ScalarConversions: Send + Sync {
    /// Rank converting a host value of kind `source` into `target`.
    ///
    /// Returns [`ConversionWeight::INFINITE`] when no conversion exists.
    fn weigh(&self, source: HostType, target: &ElementType) -> ConversionWeight;

    /// Convert one host value into a foreign value of type `target`.
    ///
    /// `heap` resolves wrapped foreign instances for named element types.
    fn to_foreign(
        &self,
        value: &HostValue,
        target: &ElementType,
        heap: &ForeignHeap,
    ) -> Result<ForeignValue, ScalarConversionError>;

    /// Convert one foreign value of type `source` back into a host value.
    fn to_host(
        &self,
        value: &ForeignValue,
        source: &ElementType,
    ) -> Result<HostValue, ScalarConversionError>;
}
