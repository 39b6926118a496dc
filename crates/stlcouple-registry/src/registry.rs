//! ContainerRegistry - descriptors, conversion records and installed capabilities.
//!
//! # Storage Model
//!
//! - **Descriptors**: keyed by [`DescriptorKey`] (kind plus element type tuple).
//!   Display names and type hashes are secondary indexes onto the same key.
//! - **Conversions**: keyed by [`ConversionKey`] (host shape, target, semantics).
//!   A per-shape list keeps declaration order for tie-breaking.
//! - **Container types**: the capabilities installed per descriptor.
//!
//! # Thread Safety
//!
//! `ContainerRegistry` is populated through `&mut self` during a registration
//! phase and then shared read-only, typically as `Arc<ContainerRegistry>`.
//! Every stored functor is `Send + Sync`, so concurrent calls on different
//! threads can read the registry without locking. Registration that must
//! happen concurrently has to be serialized by the caller (e.g. behind a
//! `RwLock`); [`ContainerRegistry::publish`] inserts a coupling all at once so
//! readers never see a half-registered descriptor.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use tracing::debug;

use stlcouple_core::{
    ConfigurationError, ContainerDescriptor, DescriptorKey, HostShape, HostValue, TypeHash,
};

use crate::{ContainerType, ConversionKey, ConversionRecord, Semantics};

/// Container descriptor registry and conversion record set.
#[derive(Default)]
pub struct ContainerRegistry {
    /// Descriptors by composite key (PRIMARY storage).
    descriptors: FxHashMap<DescriptorKey, Arc<ContainerDescriptor>>,

    /// Every display name a descriptor was registered under.
    names: FxHashMap<Arc<str>, DescriptorKey>,

    /// Reverse index: type hash -> key, for resolving instances.
    hashes: FxHashMap<TypeHash, DescriptorKey>,

    /// Conversion records.
    conversions: FxHashMap<ConversionKey, ConversionRecord>,

    /// Conversion keys per host shape, in declaration order.
    by_shape: FxHashMap<HostShape, Vec<ConversionKey>>,

    /// Installed capabilities per descriptor.
    types: FxHashMap<DescriptorKey, ContainerType>,
}

impl ContainerRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    // ==========================================================================
    // Registration
    // ==========================================================================

    /// Register a descriptor.
    ///
    /// Registering the same instantiation again returns the existing
    /// descriptor; a new display name for it becomes an alias. Registering a
    /// known display name with different element types is an error.
    pub fn register_descriptor(
        &mut self,
        descriptor: ContainerDescriptor,
    ) -> Result<Arc<ContainerDescriptor>, ConfigurationError> {
        self.check_descriptor(&descriptor)?;

        if let Some(existing) = self.descriptors.get(&descriptor.key) {
            let existing = existing.clone();
            self.names.insert(descriptor.name.clone(), existing.key.clone());
            return Ok(existing);
        }

        debug!(target: "registry", name = %descriptor.name, key = %descriptor.key, "descriptor registered");
        let descriptor = Arc::new(descriptor);
        self.names.insert(descriptor.name.clone(), descriptor.key.clone());
        self.hashes.insert(descriptor.type_hash, descriptor.key.clone());
        self.descriptors.insert(descriptor.key.clone(), descriptor.clone());
        Ok(descriptor)
    }

    fn check_descriptor(&self, descriptor: &ContainerDescriptor) -> Result<(), ConfigurationError> {
        if let Some(key) = self.names.get(&descriptor.name)
            && *key != descriptor.key
        {
            return Err(ConfigurationError::ConflictingRegistration {
                name: descriptor.name.to_string(),
                existing: key.canonical_name(),
                requested: descriptor.key.canonical_name(),
            });
        }
        Ok(())
    }

    /// Install one direction of a conversion.
    ///
    /// A second record for the same shape, target and semantics is an error.
    pub fn register_conversion(&mut self, record: ConversionRecord) -> Result<(), ConfigurationError> {
        self.check_conversion(&record)?;
        self.insert_conversion(record);
        Ok(())
    }

    fn check_conversion(&self, record: &ConversionRecord) -> Result<(), ConfigurationError> {
        if self.conversions.contains_key(&record.key()) {
            return Err(ConfigurationError::ConflictingConversion {
                target: record.target.canonical_name(),
                shape: record.shape.to_string(),
                semantics: record.semantics.name(),
            });
        }
        Ok(())
    }

    fn insert_conversion(&mut self, record: ConversionRecord) {
        let key = record.key();
        debug!(
            target: "registry",
            shape = %record.shape,
            target_type = %record.target,
            semantics = %record.semantics,
            priority = record.priority,
            "conversion registered"
        );
        self.by_shape.entry(record.shape).or_default().push(key.clone());
        self.conversions.insert(key, record);
    }

    /// Install the derived capabilities of a registered descriptor.
    pub fn install_type(&mut self, container_type: ContainerType) {
        self.types
            .insert(container_type.descriptor().key.clone(), container_type);
    }

    /// Publish a complete coupling: descriptor, conversion records and capabilities.
    ///
    /// Everything is validated before anything is inserted, so a failed
    /// publish leaves the registry unchanged.
    pub fn publish(
        &mut self,
        descriptor: Arc<ContainerDescriptor>,
        records: Vec<ConversionRecord>,
        container_type: ContainerType,
    ) -> Result<Arc<ContainerDescriptor>, ConfigurationError> {
        self.check_descriptor(&descriptor)?;
        if let Some(existing) = self.descriptors.get(&descriptor.key) {
            return Err(ConfigurationError::ConflictingRegistration {
                name: descriptor.name.to_string(),
                existing: existing.name.to_string(),
                requested: descriptor.key.canonical_name(),
            });
        }
        for record in &records {
            self.check_conversion(record)?;
        }

        debug!(target: "registry", name = %descriptor.name, records = records.len(), "coupling published");
        self.names.insert(descriptor.name.clone(), descriptor.key.clone());
        self.hashes.insert(descriptor.type_hash, descriptor.key.clone());
        self.descriptors.insert(descriptor.key.clone(), descriptor.clone());
        for record in records {
            self.insert_conversion(record);
        }
        self.install_type(container_type);
        Ok(descriptor)
    }

    /// Add a display-name alias for an already registered descriptor.
    pub fn register_alias(&mut self, name: &str, key: &DescriptorKey) -> Result<(), ConfigurationError> {
        if let Some(existing) = self.names.get(name)
            && existing != key
        {
            return Err(ConfigurationError::ConflictingRegistration {
                name: name.to_string(),
                existing: existing.canonical_name(),
                requested: key.canonical_name(),
            });
        }
        self.names.insert(Arc::from(name), key.clone());
        Ok(())
    }

    // ==========================================================================
    // Lookup
    // ==========================================================================

    pub fn descriptor(&self, key: &DescriptorKey) -> Option<&Arc<ContainerDescriptor>> {
        self.descriptors.get(key)
    }

    pub fn descriptor_by_name(&self, name: &str) -> Option<&Arc<ContainerDescriptor>> {
        self.names.get(name).and_then(|key| self.descriptors.get(key))
    }

    pub fn descriptor_by_hash(&self, hash: TypeHash) -> Option<&Arc<ContainerDescriptor>> {
        self.hashes.get(&hash).and_then(|key| self.descriptors.get(key))
    }

    pub fn contains(&self, key: &DescriptorKey) -> bool {
        self.descriptors.contains_key(key)
    }

    pub fn container_type(&self, key: &DescriptorKey) -> Option<&ContainerType> {
        self.types.get(key)
    }

    pub fn container_type_by_hash(&self, hash: TypeHash) -> Option<&ContainerType> {
        self.hashes.get(&hash).and_then(|key| self.types.get(key))
    }

    pub fn conversion(
        &self,
        shape: HostShape,
        target: &DescriptorKey,
        semantics: Semantics,
    ) -> Option<&ConversionRecord> {
        self.conversions.get(&ConversionKey {
            shape,
            target: target.clone(),
            semantics,
        })
    }

    /// The record that converts `value` into `target`, chosen by the value's shape.
    pub fn conversion_for(
        &self,
        value: &HostValue,
        target: &DescriptorKey,
        semantics: Semantics,
    ) -> Option<&ConversionRecord> {
        self.conversion(value.shape()?, target, semantics)
    }

    /// All records triggered by a host shape, in declaration order.
    pub fn conversions_from(
        &self,
        shape: HostShape,
        semantics: Semantics,
    ) -> impl Iterator<Item = &ConversionRecord> {
        self.by_shape
            .get(&shape)
            .into_iter()
            .flatten()
            .filter(move |key| key.semantics == semantics)
            .filter_map(|key| self.conversions.get(key))
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &Arc<ContainerDescriptor>> {
        self.descriptors.values()
    }

    /// Number of registered descriptors.
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn conversion_count(&self) -> usize {
        self.conversions.len()
    }
}

impl std::fmt::Debug for ContainerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContainerRegistry")
            .field("descriptors", &self.descriptors.len())
            .field("names", &self.names.len())
            .field("conversions", &self.conversions.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stlcouple_core::{
        CallFrame, ContainerKind, ConversionWeight, ElementConversionError, ElementPosition,
        ScalarType,
    };

    fn vector_of(name: &str, scalar: ScalarType) -> ContainerDescriptor {
        ContainerDescriptor::new(name, ContainerKind::Vector, vec![scalar.into()])
    }

    fn record(target: &DescriptorKey, semantics: Semantics) -> ConversionRecord {
        ConversionRecord {
            shape: HostShape::Sequence,
            target: target.clone(),
            semantics,
            functor: Arc::new(|_value: &HostValue, _frame: &mut CallFrame<'_>| {
                Err(ElementConversionError::new(ElementPosition::Whole, "nothing", "anything"))
            }),
            priority: 1,
            weigher: Arc::new(|_: &HostValue| ConversionWeight::CONTAINER_PENALTY),
        }
    }

    #[test]
    fn identical_registration_is_idempotent() {
        let mut registry = ContainerRegistry::new();
        let first = registry
            .register_descriptor(vector_of("std::vector<int>", ScalarType::Int))
            .unwrap();
        let second = registry
            .register_descriptor(vector_of("std::vector<int32_t>", ScalarType::Int))
            .unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.len(), 1);
        assert!(registry.descriptor_by_name("std::vector<int32_t>").is_some());
    }

    #[test]
    fn conflicting_element_type_is_rejected() {
        let mut registry = ContainerRegistry::new();
        registry
            .register_descriptor(vector_of("std::vector<int>", ScalarType::Int))
            .unwrap();

        let err = registry
            .register_descriptor(vector_of("std::vector<int>", ScalarType::Double))
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::ConflictingRegistration { .. }));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn duplicate_conversion_is_rejected() {
        let mut registry = ContainerRegistry::new();
        let descriptor = registry
            .register_descriptor(vector_of("std::vector<long>", ScalarType::Long))
            .unwrap();

        registry
            .register_conversion(record(&descriptor.key, Semantics::Value))
            .unwrap();
        registry
            .register_conversion(record(&descriptor.key, Semantics::Volatile))
            .unwrap();
        assert!(registry
            .register_conversion(record(&descriptor.key, Semantics::Value))
            .is_err());
        assert_eq!(registry.conversion_count(), 2);
    }

    #[test]
    fn conversions_from_keeps_declaration_order() {
        let mut registry = ContainerRegistry::new();
        let a = registry
            .register_descriptor(vector_of("std::vector<long>", ScalarType::Long))
            .unwrap();
        let b = registry
            .register_descriptor(vector_of("std::vector<double>", ScalarType::Double))
            .unwrap();
        registry.register_conversion(record(&a.key, Semantics::Value)).unwrap();
        registry.register_conversion(record(&b.key, Semantics::Value)).unwrap();
        registry.register_conversion(record(&b.key, Semantics::Volatile)).unwrap();

        let targets: Vec<_> = registry
            .conversions_from(HostShape::Sequence, Semantics::Value)
            .map(|r| r.target.canonical_name())
            .collect();
        assert_eq!(targets, vec!["std::vector<long>", "std::vector<double>"]);
    }

    #[test]
    fn lookup_by_hash() {
        let mut registry = ContainerRegistry::new();
        let descriptor = registry
            .register_descriptor(vector_of("std::vector<long>", ScalarType::Long))
            .unwrap();
        assert!(registry.descriptor_by_hash(descriptor.type_hash).is_some());
        assert!(registry.container_type_by_hash(descriptor.type_hash).is_none());
    }
}
