//! Container coupling.
//!
//! [`Coupler::couple`] turns a container instantiation name into a fully
//! registered container type: descriptor, value and volatile conversion
//! records for every host shape the kind accepts, weighers, and derived
//! capabilities. Everything is built before anything is inserted, so a
//! failed coupling leaves the registry untouched.
//!
//! An element type that is itself a container instantiation, such as the
//! pair in `std::vector<std::pair<int, int> >`, is coupled first and then
//! converted, weighed and read back through its own coupled type.

use std::sync::Arc;

use tracing::{info, warn};

use stlcouple_core::{ConfigurationError, ContainerDescriptor, ContainerKind, ElementType, HostValue};
use stlcouple_registry::{
    ContainerRegistry, ContainerType, ConversionRecord, ScalarConversions, Semantics, Weigher,
};

use crate::bulk;
use crate::config::MarshalConfig;
use crate::factory::FunctorFactory;
use crate::resolver::{ElementHint, TemplateName, resolve_elements};
use crate::scalars::BuiltinScalars;
use crate::weigher::ContainerWeigher;

/// Couples container instantiations into a registry.
pub struct Coupler<'r> {
    registry: &'r mut ContainerRegistry,
    scalars: Arc<dyn ScalarConversions>,
    config: MarshalConfig,
    /// Bulk hooks implement the builtin rules, so they only apply with them.
    builtin_scalars: bool,
}

impl<'r> Coupler<'r> {
    /// A coupler using the builtin scalar conversions.
    pub fn new(registry: &'r mut ContainerRegistry, config: MarshalConfig) -> Self {
        Self {
            registry,
            scalars: BuiltinScalars::shared(),
            config,
            builtin_scalars: true,
        }
    }

    /// A coupler using a custom scalar collaborator.
    pub fn with_scalars(
        registry: &'r mut ContainerRegistry,
        scalars: Arc<dyn ScalarConversions>,
        config: MarshalConfig,
    ) -> Self {
        Self {
            registry,
            scalars,
            config,
            builtin_scalars: false,
        }
    }

    pub fn config(&self) -> &MarshalConfig {
        &self.config
    }

    pub fn registry(&self) -> &ContainerRegistry {
        self.registry
    }

    /// Couple one container instantiation.
    ///
    /// `element` overrides the element types parsed from `name`. Coupling an
    /// instantiation that is already registered returns the existing
    /// descriptor and records `name` as an alias.
    ///
    /// # Errors
    ///
    /// - [`ConfigurationError::UnknownKind`] for an unsupported template
    /// - [`ConfigurationError::ElementArity`] for the wrong number of element types
    /// - [`ConfigurationError::ConflictingRegistration`] when `name` is already
    ///   registered with different element types
    /// - any of the above for a container element type
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn couple(
        &mut self,
        name: &str,
        element: Option<ElementHint>,
    ) -> Result<Arc<ContainerDescriptor>, ConfigurationError> {
        let result = self.try_couple(name, element.as_ref());
        match &result {
            Ok(descriptor) => {
                info!(target: "coupler", name, key = %descriptor.key, "container coupled");
            }
            Err(err) => {
                warn!(target: "coupler", name, error = %err, "coupling failed");
            }
        }
        result
    }

    /// Couple several instantiations, stopping at the first failure.
    pub fn couple_all<'n>(
        &mut self,
        names: impl IntoIterator<Item = &'n str>,
    ) -> Result<Vec<Arc<ContainerDescriptor>>, ConfigurationError> {
        names.into_iter().map(|name| self.couple(name, None)).collect()
    }

    fn try_couple(
        &mut self,
        name: &str,
        element: Option<&ElementHint>,
    ) -> Result<Arc<ContainerDescriptor>, ConfigurationError> {
        let parsed = TemplateName::parse(name);
        let kind = ContainerKind::from_prefix(parsed.prefix).ok_or_else(|| {
            ConfigurationError::UnknownKind {
                prefix: parsed.prefix.to_string(),
                name: name.to_string(),
            }
        })?;
        let elements = resolve_elements(kind, element, name)?;

        let mut descriptor = ContainerDescriptor::new(name, kind, elements);
        if let Some(existing) = self.registry.descriptor(&descriptor.key).cloned() {
            self.registry.register_alias(name, &existing.key)?;
            return Ok(existing);
        }

        if self.builtin_scalars
            && self.config.bulk_fill
            && let Some(hooks) = bulk::hooks_for(kind, descriptor.element())
        {
            descriptor = descriptor.with_bulk_hooks(hooks);
        }

        let mut nested = Vec::new();
        for element in descriptor.element_types() {
            if let Some(inner) = self.couple_element(element)? {
                nested.push((element.clone(), inner));
            }
        }

        let descriptor = Arc::new(descriptor);
        let container_type = nested.into_iter().fold(
            ContainerType::new(descriptor.clone(), self.scalars.clone()),
            |container_type, (element, inner)| container_type.with_nested(element, inner),
        );
        let records = self.records_for(&container_type);
        self.registry.publish(descriptor, records, container_type)
    }

    /// Couple a named element type that is itself a container instantiation.
    fn couple_element(&mut self, element: &ElementType) -> Result<Option<ContainerType>, ConfigurationError> {
        let ElementType::Named(name) = element else {
            return Ok(None);
        };
        if ContainerKind::from_prefix(TemplateName::parse(name).prefix).is_none() {
            return Ok(None);
        }
        let inner = self.couple(name, None)?;
        Ok(self.registry.container_type(&inner.key).cloned())
    }

    /// One value and one volatile record per accepted host shape.
    fn records_for(&self, container_type: &ContainerType) -> Vec<ConversionRecord> {
        let descriptor = container_type.descriptor();
        let container_weigher = ContainerWeigher::for_type(container_type);
        let weigher: Weigher = Arc::new(move |value: &HostValue| container_weigher.weigh(value));
        let factory = FunctorFactory::new(container_type.clone());

        let mut records = Vec::new();
        for shape in descriptor.kind().accepted_shapes() {
            for semantics in [Semantics::Value, Semantics::Volatile] {
                records.push(ConversionRecord {
                    shape: *shape,
                    target: descriptor.key.clone(),
                    semantics,
                    functor: factory.build(semantics),
                    priority: self.config.conversion_priority,
                    weigher: weigher.clone(),
                });
            }
        }
        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stlcouple_core::{ConversionWeight, HostKey, HostShape, HostType, ScalarType};

    #[test]
    fn couples_vector_with_both_semantics() {
        let mut registry = ContainerRegistry::new();
        let descriptor = Coupler::new(&mut registry, MarshalConfig::default())
            .couple("std::vector<int>", None)
            .unwrap();

        assert_eq!(descriptor.element(), &ElementType::Scalar(ScalarType::Int));
        assert!(descriptor.bulk.is_some());
        assert!(registry
            .conversion(HostShape::Sequence, &descriptor.key, Semantics::Value)
            .is_some());
        assert!(registry
            .conversion(HostShape::Sequence, &descriptor.key, Semantics::Volatile)
            .is_some());
        assert!(registry.container_type(&descriptor.key).is_some());
    }

    #[test]
    fn unknown_prefix_registers_nothing() {
        let mut registry = ContainerRegistry::new();
        let err = Coupler::new(&mut registry, MarshalConfig::default())
            .couple("std::deque<int>", None)
            .unwrap_err();
        assert_eq!(
            err,
            ConfigurationError::UnknownKind {
                prefix: "std::deque".into(),
                name: "std::deque<int>".into(),
            }
        );
        assert!(registry.is_empty());
        assert_eq!(registry.conversion_count(), 0);
    }

    #[test]
    fn recoupling_is_idempotent() {
        let mut registry = ContainerRegistry::new();
        let mut coupler = Coupler::new(&mut registry, MarshalConfig::default());
        let first = coupler.couple("std::vector<long>", None).unwrap();
        let second = coupler.couple("std::vector< long >", None).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.conversion_count(), 2);
        assert!(registry.descriptor_by_name("std::vector< long >").is_some());
    }

    #[test]
    fn explicit_hint_conflicts_with_registered_name() {
        let mut registry = ContainerRegistry::new();
        let mut coupler = Coupler::new(&mut registry, MarshalConfig::default());
        coupler.couple("std::vector<int>", None).unwrap();
        let err = coupler
            .couple("std::vector<int>", Some(ElementHint::Host(HostType::Float)))
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::ConflictingRegistration { .. }));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn sets_register_for_sets_and_sequences() {
        let mut registry = ContainerRegistry::new();
        let descriptor = Coupler::new(&mut registry, MarshalConfig::default())
            .couple("std::set<std::string>", None)
            .unwrap();
        assert_eq!(registry.conversion_count(), 4);
        assert!(registry
            .conversion(HostShape::Sequence, &descriptor.key, Semantics::Value)
            .is_some());
    }

    #[test]
    fn set_records_rank_lists_below_sets() {
        let mut registry = ContainerRegistry::new();
        let descriptor = Coupler::new(&mut registry, MarshalConfig::default())
            .couple("std::set<long>", None)
            .unwrap();
        let from_list = registry
            .conversion(HostShape::Sequence, &descriptor.key, Semantics::Value)
            .unwrap();
        let from_set = registry
            .conversion(HostShape::Set, &descriptor.key, Semantics::Value)
            .unwrap();

        let list = HostValue::list([HostValue::Int(1), HostValue::Int(2)]);
        let set = HostValue::set([HostKey::from(1), HostKey::from(2)]);
        assert_eq!(from_list.weigh(&list), from_set.weigh(&set) + ConversionWeight::EPSILON);
    }

    #[test]
    fn container_elements_are_coupled_first() {
        let mut registry = ContainerRegistry::new();
        let descriptor = Coupler::new(&mut registry, MarshalConfig::default())
            .couple("std::vector<std::pair<int, int> >", None)
            .unwrap();

        let element = descriptor.element().clone();
        assert_eq!(element, ElementType::Named("std::pair<int, int>".into()));
        let inner = registry.descriptor_by_name("std::pair<int, int>").unwrap();
        assert_eq!(inner.kind(), ContainerKind::Pair);
        assert_eq!(registry.len(), 2);

        let container_type = registry.container_type(&descriptor.key).unwrap();
        assert_eq!(
            container_type.nested(&element).map(|t| t.descriptor().key.clone()),
            Some(inner.key.clone())
        );
    }

    #[test]
    fn class_elements_stay_named() {
        let mut registry = ContainerRegistry::new();
        let descriptor = Coupler::new(&mut registry, MarshalConfig::default())
            .couple("std::vector<Point>", None)
            .unwrap();
        assert_eq!(registry.len(), 1);
        let container_type = registry.container_type(&descriptor.key).unwrap();
        assert!(container_type.nested(descriptor.element()).is_none());
    }

    #[test]
    fn bulk_fill_can_be_disabled() {
        let mut registry = ContainerRegistry::new();
        let descriptor = Coupler::new(&mut registry, MarshalConfig::default().with_bulk_fill(false))
            .couple("std::vector<int>", None)
            .unwrap();
        assert!(descriptor.bulk.is_none());
    }

    #[test]
    fn priority_is_recorded() {
        let mut registry = ContainerRegistry::new();
        let descriptor = Coupler::new(
            &mut registry,
            MarshalConfig::default().with_conversion_priority(2),
        )
        .couple("std::list<double>", None)
        .unwrap();
        let record = registry
            .conversion(HostShape::Sequence, &descriptor.key, Semantics::Value)
            .unwrap();
        assert_eq!(record.priority, 2);
    }
}
