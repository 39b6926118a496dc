//! Call-scoped ownership tracking and copy-back.
//!
//! A [`CallFrame`] owns all marshalling state of one foreign call: the
//! temporary instances converted arguments live in, and one
//! [`TransientBinding`] per volatile argument. Bindings refer to their
//! instance through a [`ForeignHandle`] only, so a binding never keeps an
//! instance alive.
//!
//! # Lifecycle
//!
//! ```text
//! Created --mark_bound--> Bound --frame exit--> CopiedBack --> Released
//! Created --frame exit (never passed to native code)--------> Released
//! ```
//!
//! The frame exits through [`CallFrame::finish`] or, on any early return or
//! unwind, through `Drop`. Either way each `Bound` binding copies back exactly
//! once, after the call and before control leaves the frame, and then every
//! temporary is released from the heap.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::{CopyBackError, ForeignHandle, ForeignHeap, ForeignInstance, HostValue};

/// Writes a foreign instance's current contents back into a host collection.
///
/// The heap resolves instances the container holds as elements.
pub type CopyBackFn = Arc<
    dyn Fn(&ForeignHeap, &ForeignInstance, &HostValue) -> Result<(), CopyBackError> + Send + Sync,
>;

/// One-shot state of a [`TransientBinding`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingState {
    Created,
    Bound,
    CopiedBack,
    Released,
}

/// Index of a binding in its frame's call-local table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BindingHandle(u32);

/// Couples a host collection to the temporary foreign instance built from it.
pub struct TransientBinding {
    host: HostValue,
    instance: ForeignHandle,
    target: Arc<str>,
    copy_back: CopyBackFn,
    state: BindingState,
}

impl TransientBinding {
    pub fn state(&self) -> BindingState {
        self.state
    }

    pub fn instance(&self) -> ForeignHandle {
        self.instance
    }

    pub fn host(&self) -> &HostValue {
        &self.host
    }
}

impl fmt::Debug for TransientBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransientBinding")
            .field("target", &self.target)
            .field("instance", &self.instance)
            .field("state", &self.state)
            .finish()
    }
}

/// Outcome of closing a frame.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CopyBackReport {
    /// Bindings whose copy-back ran (successfully or not).
    pub fired: usize,
    /// Bindings released without copy-back because they were never bound.
    pub discarded: usize,
    pub errors: Vec<CopyBackError>,
}

impl CopyBackReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Marshalling state of one foreign call.
pub struct CallFrame<'h> {
    heap: &'h mut ForeignHeap,
    bindings: Vec<TransientBinding>,
    temporaries: Vec<ForeignHandle>,
    report: CopyBackReport,
    closed: bool,
}

impl<'h> CallFrame<'h> {
    pub fn new(heap: &'h mut ForeignHeap) -> Self {
        Self {
            heap,
            bindings: Vec::new(),
            temporaries: Vec::new(),
            report: CopyBackReport::default(),
            closed: false,
        }
    }

    pub fn heap(&self) -> &ForeignHeap {
        self.heap
    }

    pub fn heap_mut(&mut self) -> &mut ForeignHeap {
        self.heap
    }

    // ==========================================================================
    // Temporaries
    // ==========================================================================

    /// Allocate an instance that the frame releases when it exits.
    pub fn allocate_temporary(&mut self, instance: ForeignInstance) -> ForeignHandle {
        let handle = self.heap.allocate(instance);
        self.temporaries.push(handle);
        handle
    }

    /// Stop tracking a temporary; the caller becomes responsible for releasing it.
    pub fn persist(&mut self, handle: ForeignHandle) -> bool {
        match self.temporaries.iter().position(|h| *h == handle) {
            Some(pos) => {
                self.temporaries.remove(pos);
                true
            }
            None => false,
        }
    }

    pub fn temporary_count(&self) -> usize {
        self.temporaries.len()
    }

    // ==========================================================================
    // Bindings
    // ==========================================================================

    /// Create a binding in state `Created`.
    pub fn bind(
        &mut self,
        host: HostValue,
        instance: ForeignHandle,
        target: Arc<str>,
        copy_back: CopyBackFn,
    ) -> BindingHandle {
        let handle = BindingHandle(self.bindings.len() as u32);
        trace!(target: "copy_back", container = %target, %instance, "binding created");
        self.bindings.push(TransientBinding {
            host,
            instance,
            target,
            copy_back,
            state: BindingState::Created,
        });
        handle
    }

    /// Record that the bound instance was handed to native code by mutable reference.
    ///
    /// Only `Created` bindings can become `Bound`; returns false otherwise.
    pub fn mark_bound(&mut self, handle: BindingHandle) -> bool {
        match self.bindings.get_mut(handle.0 as usize) {
            Some(binding) if binding.state == BindingState::Created => {
                binding.state = BindingState::Bound;
                true
            }
            _ => false,
        }
    }

    /// Find the binding created for an instance.
    pub fn binding_for(&self, instance: ForeignHandle) -> Option<BindingHandle> {
        self.bindings
            .iter()
            .position(|b| b.instance == instance)
            .map(|i| BindingHandle(i as u32))
    }

    pub fn binding(&self, handle: BindingHandle) -> Option<&TransientBinding> {
        self.bindings.get(handle.0 as usize)
    }

    pub fn binding_count(&self) -> usize {
        self.bindings.len()
    }

    // ==========================================================================
    // Exit
    // ==========================================================================

    /// Close the frame: copy back bound bindings, then release temporaries.
    pub fn finish(mut self) -> CopyBackReport {
        self.close();
        std::mem::take(&mut self.report)
    }

    #[cfg_attr(feature = "profiling", profiling::function)]
    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        for binding in &mut self.bindings {
            match binding.state {
                BindingState::Bound => {
                    let result = match self.heap.get(binding.instance) {
                        Some(instance) => (binding.copy_back)(&*self.heap, instance, &binding.host),
                        None => Err(CopyBackError::InstanceReleased {
                            target: binding.target.to_string(),
                        }),
                    };
                    binding.state = BindingState::CopiedBack;
                    self.report.fired += 1;
                    match result {
                        Ok(()) => {
                            debug!(target: "copy_back", container = %binding.target, "copied back");
                        }
                        Err(err) => {
                            warn!(target: "copy_back", container = %binding.target, error = %err, "copy-back failed");
                            self.report.errors.push(err);
                        }
                    }
                }
                BindingState::Created => {
                    self.report.discarded += 1;
                    trace!(target: "copy_back", container = %binding.target, "unbound binding discarded");
                }
                BindingState::CopiedBack | BindingState::Released => {}
            }
            binding.state = BindingState::Released;
        }

        for handle in self.temporaries.drain(..) {
            self.heap.release(handle);
        }
    }
}

impl Drop for CallFrame<'_> {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for CallFrame<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallFrame")
            .field("bindings", &self.bindings)
            .field("temporaries", &self.temporaries.len())
            .field("closed", &self.closed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ForeignContainer, ForeignValue, HostList, TypeHash};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn instance(values: &[i64]) -> ForeignInstance {
        ForeignInstance::new(
            TypeHash::from_name("std::vector<long>"),
            "std::vector<long>",
            ForeignContainer::Vector(values.iter().copied().map(ForeignValue::Int).collect()),
        )
    }

    fn counting_copy_back(counter: Arc<AtomicUsize>) -> CopyBackFn {
        Arc::new(move |_heap: &ForeignHeap, instance: &ForeignInstance, host: &HostValue| {
            counter.fetch_add(1, Ordering::SeqCst);
            let list = host.as_list().ok_or(CopyBackError::HostShapeMismatch {
                target: instance.type_name.to_string(),
                actual: "non-list",
            })?;
            let values = instance
                .container
                .values()
                .map(|v| match v {
                    ForeignValue::Int(i) => HostValue::Int(*i),
                    _ => HostValue::None,
                })
                .collect();
            list.replace(values);
            Ok(())
        })
    }

    #[test]
    fn bound_binding_fires_once_with_final_contents() {
        let mut heap = ForeignHeap::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let host = HostValue::list([HostValue::Int(1)]);

        let mut frame = CallFrame::new(&mut heap);
        let handle = frame.allocate_temporary(instance(&[1]));
        let binding = frame.bind(host.clone(), handle, "v".into(), counting_copy_back(counter.clone()));
        assert!(frame.mark_bound(binding));
        assert!(!frame.mark_bound(binding));

        for i in 2..5 {
            let inst = frame.heap_mut().get_mut(handle).unwrap();
            inst.container.insert(ForeignValue::Int(i));
        }

        let report = frame.finish();
        assert_eq!(report.fired, 1);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(
            host.as_list().map(HostList::to_vec),
            Some((1..5).map(HostValue::Int).collect())
        );
        assert!(!heap.is_live(handle));
    }

    #[test]
    fn unbound_binding_never_copies_back() {
        let mut heap = ForeignHeap::new();
        let counter = Arc::new(AtomicUsize::new(0));
        {
            let mut frame = CallFrame::new(&mut heap);
            let handle = frame.allocate_temporary(instance(&[7]));
            frame.bind(HostValue::list([]), handle, "v".into(), counting_copy_back(counter.clone()));
        }
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert_eq!(heap.live_count(), 0);
    }

    #[test]
    fn drop_fires_pending_copy_back() {
        let mut heap = ForeignHeap::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let host = HostValue::list([HostValue::Int(3)]);

        let early_exit = |heap: &mut ForeignHeap| -> Result<(), &'static str> {
            let mut frame = CallFrame::new(heap);
            let handle = frame.allocate_temporary(instance(&[3]));
            let binding = frame.bind(host.clone(), handle, "v".into(), counting_copy_back(counter.clone()));
            frame.mark_bound(binding);
            Err("foreign call failed")
        };

        assert!(early_exit(&mut heap).is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(heap.live_count(), 0);
    }

    #[test]
    fn released_instance_reports_error_without_rearming() {
        let mut heap = ForeignHeap::new();
        let counter = Arc::new(AtomicUsize::new(0));

        let mut frame = CallFrame::new(&mut heap);
        let handle = frame.allocate_temporary(instance(&[1]));
        let binding = frame.bind(HostValue::list([]), handle, "v".into(), counting_copy_back(counter.clone()));
        frame.mark_bound(binding);
        frame.heap_mut().free(handle);

        let report = frame.finish();
        assert_eq!(report.fired, 1);
        assert!(matches!(report.errors.as_slice(), [CopyBackError::InstanceReleased { .. }]));
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn persisted_instances_survive_the_frame() {
        let mut heap = ForeignHeap::new();
        let handle = {
            let mut frame = CallFrame::new(&mut heap);
            let handle = frame.allocate_temporary(instance(&[1, 2]));
            assert!(frame.persist(handle));
            assert_eq!(frame.temporary_count(), 0);
            handle
        };
        assert!(heap.is_live(handle));
    }
}
