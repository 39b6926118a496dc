//! Call dispatch across the language boundary.
//!
//! [`Dispatcher`] ranks the overloads of a foreign function against the host
//! arguments of a call, converts the arguments of the winner inside a
//! [`CallFrame`], invokes it, and lets the frame copy volatile arguments
//! back before the result is returned.
//!
//! # Ranking
//!
//! Each argument is weighed independently. An overload is *better* than
//! another when it is no worse on any argument and strictly better on at
//! least one. Two overloads where each wins somewhere, or that weigh the
//! same everywhere, tie. Ties between overloads with identical parameter
//! lists are ignored (the first is kept); other ties are resolved by the
//! configured [`TiePolicy`].

use std::fmt;
use std::sync::Arc;

use tracing::{debug, trace};

use stlcouple_core::{
    AccessError, AmbiguousConversionError, CallFrame, ContainerKind, ConversionWeight, CopyBackError,
    DescriptorKey, ElementConversionError, ElementPosition, ElementType, ForeignHandle, ForeignHeap,
    ForeignValue, HostValue, MarshalError,
};
use stlcouple_registry::{ContainerRegistry, ConversionRecord, ScalarConversions, Semantics};

use crate::config::{MarshalConfig, TiePolicy};
use crate::scalars::BuiltinScalars;

/// A foreign function body.
///
/// Receives the heap the arguments live in and returns its result or an
/// error message.
pub type NativeFunction =
    Arc<dyn Fn(&mut ForeignHeap, &[ForeignArg]) -> Result<ForeignValue, String> + Send + Sync>;

/// A converted argument as the foreign side sees it.
#[derive(Debug, Clone, PartialEq)]
pub enum ForeignArg {
    Value(ForeignValue),
    Instance { handle: ForeignHandle, mutable: bool },
}

impl ForeignArg {
    pub fn handle(&self) -> Option<ForeignHandle> {
        match self {
            ForeignArg::Instance { handle, .. } => Some(*handle),
            ForeignArg::Value(ForeignValue::Instance(handle)) => Some(*handle),
            ForeignArg::Value(_) => None,
        }
    }
}

/// How a parameter is passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Passing {
    Value,
    ConstRef,
    /// Non-const reference: container arguments are converted volatile.
    MutRef,
}

/// Declared type of a parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ParamType {
    Scalar(ElementType),
    Container(DescriptorKey),
}

/// One formal parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Parameter {
    pub ty: ParamType,
    pub passing: Passing,
}

impl Parameter {
    pub fn scalar(element: impl Into<ElementType>) -> Self {
        Self {
            ty: ParamType::Scalar(element.into()),
            passing: Passing::Value,
        }
    }

    pub fn container(key: DescriptorKey) -> Self {
        Self {
            ty: ParamType::Container(key),
            passing: Passing::ConstRef,
        }
    }

    pub fn container_mut(key: DescriptorKey) -> Self {
        Self {
            ty: ParamType::Container(key),
            passing: Passing::MutRef,
        }
    }

    fn semantics(&self) -> Semantics {
        match self.passing {
            Passing::MutRef => Semantics::Volatile,
            Passing::Value | Passing::ConstRef => Semantics::Value,
        }
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match &self.ty {
            ParamType::Scalar(element) => element.name().to_string(),
            ParamType::Container(key) => key.canonical_name(),
        };
        match self.passing {
            Passing::Value => write!(f, "{name}"),
            Passing::ConstRef => write!(f, "const {name}&"),
            Passing::MutRef => write!(f, "{name}&"),
        }
    }
}

/// One alternative of an overloaded foreign function.
#[derive(Clone)]
pub struct Overload {
    pub name: Arc<str>,
    pub params: Vec<Parameter>,
    pub returns: ElementType,
    pub function: NativeFunction,
}

impl Overload {
    pub fn new<F>(name: &str, params: Vec<Parameter>, returns: impl Into<ElementType>, function: F) -> Self
    where
        F: Fn(&mut ForeignHeap, &[ForeignArg]) -> Result<ForeignValue, String> + Send + Sync + 'static,
    {
        Self {
            name: Arc::from(name),
            params,
            returns: returns.into(),
            function: Arc::new(function),
        }
    }

    /// Display signature, e.g. `sum(const std::vector<long>&)`.
    pub fn signature(&self) -> String {
        let params: Vec<String> = self.params.iter().map(ToString::to_string).collect();
        format!("{}({})", self.name, params.join(", "))
    }
}

impl fmt::Debug for Overload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Overload")
            .field("signature", &self.signature())
            .field("returns", &self.returns)
            .finish_non_exhaustive()
    }
}

/// Result of a completed call.
#[derive(Debug, Clone, PartialEq)]
pub struct CallOutcome {
    pub value: HostValue,
    /// Index of the overload that ran.
    pub overload: usize,
    /// Copy-back failures. They do not undo the call.
    pub copy_back_errors: Vec<CopyBackError>,
}

/// How one candidate relates to the best one found so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Relationship {
    Better,
    Worse,
    Equivalent,
    Ambiguous,
}

fn compare(known: &[ConversionWeight], suggested: &[ConversionWeight]) -> Relationship {
    let mut better = false;
    let mut worse = false;
    for (k, s) in known.iter().zip(suggested) {
        if k < s {
            worse = true;
        } else if s < k {
            better = true;
        }
    }
    match (better, worse) {
        (true, false) => Relationship::Better,
        (false, true) => Relationship::Worse,
        (false, false) => Relationship::Equivalent,
        (true, true) => Relationship::Ambiguous,
    }
}

/// Ranks, converts and invokes foreign calls against a shared registry.
pub struct Dispatcher {
    registry: Arc<ContainerRegistry>,
    scalars: Arc<dyn ScalarConversions>,
    config: MarshalConfig,
}

impl Dispatcher {
    pub fn new(registry: Arc<ContainerRegistry>, config: MarshalConfig) -> Self {
        Self::with_scalars(registry, BuiltinScalars::shared(), config)
    }

    pub fn with_scalars(
        registry: Arc<ContainerRegistry>,
        scalars: Arc<dyn ScalarConversions>,
        config: MarshalConfig,
    ) -> Self {
        Self {
            registry,
            scalars,
            config,
        }
    }

    pub fn registry(&self) -> &Arc<ContainerRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &MarshalConfig {
        &self.config
    }

    // ==========================================================================
    // Ranking
    // ==========================================================================

    /// Weight of passing `arg` for `param`.
    pub fn weigh_argument(&self, heap: &ForeignHeap, param: &Parameter, arg: &HostValue) -> ConversionWeight {
        match (&param.ty, arg) {
            (ParamType::Scalar(element), _) => self.scalars.weigh(arg.host_type(), element),
            (ParamType::Container(key), HostValue::Foreign(handle)) => match heap.get(*handle) {
                Some(instance) if instance.type_hash == key.type_hash() => ConversionWeight::ZERO,
                _ => ConversionWeight::INFINITE,
            },
            (ParamType::Container(key), _) => self
                .registry
                .conversion_for(arg, key, param.semantics())
                .map_or(ConversionWeight::INFINITE, |record| record.weigh(arg)),
        }
    }

    /// Per-argument weights of an overload, or `None` if it cannot take `args`.
    pub fn weigh_overload(
        &self,
        heap: &ForeignHeap,
        overload: &Overload,
        args: &[HostValue],
    ) -> Option<Vec<ConversionWeight>> {
        if overload.params.len() != args.len() {
            return None;
        }
        let weights: Vec<ConversionWeight> = overload
            .params
            .iter()
            .zip(args)
            .map(|(param, arg)| self.weigh_argument(heap, param, arg))
            .collect();
        weights.iter().all(ConversionWeight::is_possible).then_some(weights)
    }

    /// Pick the overload to call.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn select(
        &self,
        heap: &ForeignHeap,
        overloads: &[Overload],
        args: &[HostValue],
    ) -> Result<usize, MarshalError> {
        let mut best: Option<(usize, Vec<ConversionWeight>)> = None;
        let mut tied: Vec<usize> = Vec::new();

        for (index, overload) in overloads.iter().enumerate() {
            let Some(weights) = self.weigh_overload(heap, overload, args) else {
                trace!(target: "dispatch", signature = %overload.signature(), "not viable");
                continue;
            };
            let Some((best_index, best_weights)) = &best else {
                best = Some((index, weights));
                continue;
            };
            match compare(best_weights, &weights) {
                Relationship::Better => {
                    best = Some((index, weights));
                    tied.clear();
                }
                Relationship::Worse => {}
                Relationship::Equivalent | Relationship::Ambiguous => {
                    if overloads[*best_index].params != overload.params {
                        tied.push(index);
                    }
                }
            }
        }

        let Some((index, weights)) = best else {
            let name = overloads.first().map_or("<empty overload set>", |o| &*o.name);
            return Err(MarshalError::NoViableConversion {
                target: name.to_string(),
                actual: describe_args(args),
            });
        };

        if !tied.is_empty() {
            match self.config.tie_policy {
                TiePolicy::Reject => {
                    let candidates = std::iter::once(index)
                        .chain(tied)
                        .map(|i| overloads[i].signature())
                        .collect();
                    return Err(AmbiguousConversionError {
                        context: overloads[index].name.to_string(),
                        candidates,
                        weight: weights.iter().copied().sum(),
                    }
                    .into());
                }
                TiePolicy::DeclarationOrder => {
                    debug!(target: "dispatch", signature = %overloads[index].signature(), ties = tied.len(), "tie resolved by declaration order");
                }
            }
        }

        debug!(target: "dispatch", signature = %overloads[index].signature(), ?weights, "overload selected");
        Ok(index)
    }

    /// The lightest registered conversion of `value` into any container type.
    pub fn best_conversion(
        &self,
        value: &HostValue,
        semantics: Semantics,
    ) -> Result<&ConversionRecord, MarshalError> {
        let no_viable = || MarshalError::NoViableConversion {
            target: "any coupled container".to_string(),
            actual: value.host_type().name().to_string(),
        };
        let shape = value.shape().ok_or_else(no_viable)?;

        let mut best: Option<(&ConversionRecord, ConversionWeight)> = None;
        let mut tied: Vec<&ConversionRecord> = Vec::new();
        for record in self.registry.conversions_from(shape, semantics) {
            let weight = record.weigh(value);
            if !weight.is_possible() {
                continue;
            }
            match best {
                None => best = Some((record, weight)),
                Some((_, known)) if weight < known => {
                    best = Some((record, weight));
                    tied.clear();
                }
                Some((_, known)) if weight == known => tied.push(record),
                Some(_) => {}
            }
        }

        let (record, weight) = best.ok_or_else(no_viable)?;
        if !tied.is_empty() && self.config.tie_policy == TiePolicy::Reject {
            return Err(AmbiguousConversionError {
                context: format!("{} {}", value.host_type().name(), semantics),
                candidates: std::iter::once(record)
                    .chain(tied)
                    .map(|r| r.target.canonical_name())
                    .collect(),
                weight,
            }
            .into());
        }
        Ok(record)
    }

    // ==========================================================================
    // Calls
    // ==========================================================================

    /// Select an overload, convert the arguments, call it and copy back.
    ///
    /// Every argument is converted before the call. Volatile arguments copy
    /// back after the call returns, also when it fails, and before this
    /// function returns.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn call(
        &self,
        heap: &mut ForeignHeap,
        overloads: &[Overload],
        args: &[HostValue],
    ) -> Result<CallOutcome, MarshalError> {
        let index = self.select(heap, overloads, args)?;
        let overload = &overloads[index];

        let mut frame = CallFrame::new(heap);
        let mut foreign_args = Vec::with_capacity(args.len());
        for (param, arg) in overload.params.iter().zip(args) {
            foreign_args.push(self.marshal_argument(&mut frame, param, arg)?);
        }

        for arg in &foreign_args {
            if let ForeignArg::Instance { handle, mutable: true } = arg
                && let Some(binding) = frame.binding_for(*handle)
            {
                frame.mark_bound(binding);
            }
        }

        let result = (overload.function)(frame.heap_mut(), &foreign_args);
        let report = frame.finish();
        let value = result.map_err(|message| MarshalError::ForeignCall {
            function: overload.name.to_string(),
            message,
        })?;

        let value = self.scalars.to_host(&value, &overload.returns).map_err(|cause| {
            ElementConversionError::new(ElementPosition::Whole, "host value", value.kind_name())
                .with_cause(cause)
        })?;
        Ok(CallOutcome {
            value,
            overload: index,
            copy_back_errors: report.errors,
        })
    }

    fn marshal_argument(
        &self,
        frame: &mut CallFrame<'_>,
        param: &Parameter,
        arg: &HostValue,
    ) -> Result<ForeignArg, MarshalError> {
        let mutable = param.passing == Passing::MutRef;
        match (&param.ty, arg) {
            (ParamType::Scalar(element), _) => {
                let value = self.scalars.to_foreign(arg, element, frame.heap()).map_err(|cause| {
                    ElementConversionError::new(ElementPosition::Whole, element.name(), arg.host_type().name())
                        .with_cause(cause)
                })?;
                Ok(ForeignArg::Value(value))
            }
            (ParamType::Container(_), HostValue::Foreign(handle)) => Ok(ForeignArg::Instance {
                handle: *handle,
                mutable,
            }),
            (ParamType::Container(key), _) => {
                let record = self
                    .registry
                    .conversion_for(arg, key, param.semantics())
                    .ok_or_else(|| no_viable(key, arg))?;
                let handle = record.convert(arg, frame)?;
                Ok(ForeignArg::Instance { handle, mutable })
            }
        }
    }

    // ==========================================================================
    // Direct conversions
    // ==========================================================================

    /// Value-copy `value` into a new, independent instance of `target`.
    ///
    /// The caller owns the returned instance.
    pub fn value_copy(
        &self,
        heap: &mut ForeignHeap,
        value: &HostValue,
        target: &DescriptorKey,
    ) -> Result<ForeignHandle, MarshalError> {
        let record = self
            .registry
            .conversion_for(value, target, Semantics::Value)
            .ok_or_else(|| no_viable(target, value))?;
        let mut frame = CallFrame::new(heap);
        let handle = record.convert(value, &mut frame)?;
        frame.persist(handle);
        frame.finish();
        Ok(handle)
    }

    /// Volatile-copy `value` into a temporary of `target` bound to `value`.
    ///
    /// The binding starts unbound; mark it bound with
    /// [`CallFrame::mark_bound`] once the instance is handed out by mutable
    /// reference, and the frame copies back when it closes.
    pub fn volatile(
        &self,
        frame: &mut CallFrame<'_>,
        value: &HostValue,
        target: &DescriptorKey,
    ) -> Result<ForeignHandle, MarshalError> {
        let record = self
            .registry
            .conversion_for(value, target, Semantics::Volatile)
            .ok_or_else(|| no_viable(target, value))?;
        Ok(record.convert(value, frame)?)
    }

    /// Read any coupled instance back into a host collection.
    pub fn to_host(&self, heap: &ForeignHeap, handle: ForeignHandle) -> Result<HostValue, MarshalError> {
        let instance = heap
            .get(handle)
            .ok_or(AccessError::StaleHandle { index: handle.index })?;
        let container_type = self
            .registry
            .container_type_by_hash(instance.type_hash)
            .ok_or_else(|| MarshalError::NoViableConversion {
                target: "host value".to_string(),
                actual: instance.type_name.to_string(),
            })?;
        Ok(container_type.to_host(heap, handle)?)
    }

    /// Value-copy a host list into an already coupled `std::vector<element>`.
    pub fn build_vector(
        &self,
        heap: &mut ForeignHeap,
        element: &str,
        values: &HostValue,
    ) -> Result<ForeignHandle, MarshalError> {
        let key = DescriptorKey::new(ContainerKind::Vector, vec![ElementType::canonicalize(element)]);
        if !self.registry.contains(&key) {
            return Err(no_viable(&key, values));
        }
        self.value_copy(heap, values, &key)
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn no_viable(target: &DescriptorKey, value: &HostValue) -> MarshalError {
    MarshalError::NoViableConversion {
        target: target.canonical_name(),
        actual: value.host_type().name().to_string(),
    }
}

fn describe_args(args: &[HostValue]) -> String {
    let names: Vec<&str> = args.iter().map(|a| a.host_type().name()).collect();
    format!("({})", names.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Coupler;
    use stlcouple_core::{HostType, ScalarType};

    fn registry_with(names: &[&str]) -> Arc<ContainerRegistry> {
        let mut registry = ContainerRegistry::new();
        Coupler::new(&mut registry, MarshalConfig::default())
            .couple_all(names.iter().copied())
            .unwrap();
        Arc::new(registry)
    }

    fn key(kind: ContainerKind, element: ScalarType) -> DescriptorKey {
        DescriptorKey::new(kind, vec![element.into()])
    }

    fn returns_len(heap: &mut ForeignHeap, args: &[ForeignArg]) -> Result<ForeignValue, String> {
        let handle = args[0].handle().ok_or("expected an instance")?;
        let len = heap.get(handle).ok_or("stale")?.container.len();
        Ok(ForeignValue::Int(len as i64))
    }

    #[test]
    fn compare_uses_witnesses() {
        let a = [ConversionWeight::ZERO, ConversionWeight::PROMOTION];
        let b = [ConversionWeight::EPSILON, ConversionWeight::PROMOTION];
        let c = [ConversionWeight::PROMOTION, ConversionWeight::ZERO];
        assert_eq!(compare(&b, &a), Relationship::Better);
        assert_eq!(compare(&a, &b), Relationship::Worse);
        assert_eq!(compare(&a, &a), Relationship::Equivalent);
        assert_eq!(compare(&a, &c), Relationship::Ambiguous);
    }

    #[test]
    fn picks_exact_element_type() {
        let registry = registry_with(&["std::vector<long>", "std::vector<double>"]);
        let dispatcher = Dispatcher::new(registry, MarshalConfig::default());
        let overloads = [
            Overload::new(
                "size",
                vec![Parameter::container(key(ContainerKind::Vector, ScalarType::Double))],
                ScalarType::Long,
                returns_len,
            ),
            Overload::new(
                "size",
                vec![Parameter::container(key(ContainerKind::Vector, ScalarType::Long))],
                ScalarType::Long,
                returns_len,
            ),
        ];
        let mut heap = ForeignHeap::new();

        let ints = HostValue::list([HostValue::Int(1), HostValue::Int(2)]);
        let outcome = dispatcher.call(&mut heap, &overloads, &[ints]).unwrap();
        assert_eq!(outcome.overload, 1);
        assert_eq!(outcome.value, HostValue::Int(2));

        let floats = HostValue::list([HostValue::float(1.0)]);
        assert_eq!(dispatcher.select(&heap, &overloads, &[floats]).unwrap(), 0);
        assert_eq!(heap.live_count(), 0);
    }

    #[test]
    fn ties_follow_policy() {
        let registry = registry_with(&["std::vector<int>", "std::list<int>"]);
        let overloads = [
            Overload::new(
                "f",
                vec![Parameter::container(key(ContainerKind::Vector, ScalarType::Int))],
                ElementType::Unknown,
                |_: &mut ForeignHeap, _: &[ForeignArg]| Ok(ForeignValue::Null),
            ),
            Overload::new(
                "f",
                vec![Parameter::container(key(ContainerKind::List, ScalarType::Int))],
                ElementType::Unknown,
                |_: &mut ForeignHeap, _: &[ForeignArg]| Ok(ForeignValue::Null),
            ),
        ];
        let heap = ForeignHeap::new();
        let args = [HostValue::list([HostValue::Int(1)])];

        let rejecting = Dispatcher::new(registry.clone(), MarshalConfig::default());
        let err = rejecting.select(&heap, &overloads, &args).unwrap_err();
        let MarshalError::Ambiguous(err) = err else {
            panic!("expected ambiguity, got {err:?}");
        };
        assert_eq!(err.candidates.len(), 2);

        let ordered = Dispatcher::new(
            registry,
            MarshalConfig::default().with_tie_policy(TiePolicy::DeclarationOrder),
        );
        assert_eq!(ordered.select(&heap, &overloads, &args).unwrap(), 0);
    }

    #[test]
    fn no_viable_overload() {
        let registry = registry_with(&["std::vector<long>"]);
        let dispatcher = Dispatcher::new(registry, MarshalConfig::default());
        let overloads = [Overload::new(
            "g",
            vec![Parameter::scalar(ScalarType::Long)],
            ElementType::Unknown,
            |_: &mut ForeignHeap, _: &[ForeignArg]| Ok(ForeignValue::Null),
        )];
        let err = dispatcher
            .select(&ForeignHeap::new(), &overloads, &[HostValue::str("x")])
            .unwrap_err();
        assert!(matches!(err, MarshalError::NoViableConversion { .. }));
    }

    #[test]
    fn best_conversion_rejects_ties() {
        let registry = registry_with(&["std::vector<int>", "std::list<int>", "std::vector<long>"]);
        let dispatcher = Dispatcher::new(registry, MarshalConfig::default());
        let value = HostValue::list([HostValue::Int(1)]);
        let record = dispatcher.best_conversion(&value, Semantics::Value).unwrap();
        assert_eq!(record.target.canonical_name(), "std::vector<long>");

        let registry = registry_with(&["std::vector<int>", "std::list<int>"]);
        let dispatcher = Dispatcher::new(registry, MarshalConfig::default());
        assert!(matches!(
            dispatcher.best_conversion(&value, Semantics::Value),
            Err(MarshalError::Ambiguous(_))
        ));
    }

    #[test]
    fn parameter_display() {
        let k = key(ContainerKind::Vector, ScalarType::Long);
        assert_eq!(Parameter::container(k.clone()).to_string(), "const std::vector<long>&");
        assert_eq!(Parameter::container_mut(k).to_string(), "std::vector<long>&");
        assert_eq!(Parameter::scalar(ElementType::from_host(HostType::Int)).to_string(), "long");
    }
}
