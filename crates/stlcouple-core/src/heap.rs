//! Generational arena for foreign container instances.

use std::fmt;

use crate::ForeignInstance;

/// Handle to an instance in a [`ForeignHeap`].
///
/// Copyable and non-owning: holding a handle does not keep the instance
/// alive. The generation detects handles that outlived their instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ForeignHandle {
    /// Index into ForeignHeap.slots
    pub index: u32,
    /// Generation for use-after-free detection
    pub generation: u32,
}

impl ForeignHandle {
    pub fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }
}

impl fmt::Display for ForeignHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<foreign #{}:{}>", self.index, self.generation)
    }
}

/// Heap storage for foreign instances with generational indices.
///
/// Instances are stored in a Vec with generation tracking. When an instance
/// is freed, its slot is reused but the generation is incremented, so stale
/// handles resolve to `None` instead of to the new occupant.
#[derive(Default)]
pub struct ForeignHeap {
    slots: Vec<HeapSlot>,
    free_list: Vec<u32>,
}

struct HeapSlot {
    generation: u32,
    value: Option<ForeignInstance>,
    ref_count: u32,
}

impl ForeignHeap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a new instance with a reference count of one.
    pub fn allocate(&mut self, instance: ForeignInstance) -> ForeignHandle {
        if let Some(index) = self.free_list.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(instance);
            slot.ref_count = 1;
            ForeignHandle::new(index, slot.generation)
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(HeapSlot {
                generation: 0,
                value: Some(instance),
                ref_count: 1,
            });
            ForeignHandle::new(index, 0)
        }
    }

    /// Returns None if the handle is stale.
    pub fn get(&self, handle: ForeignHandle) -> Option<&ForeignInstance> {
        let slot = self.slots.get(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.value.as_ref()
    }

    /// Returns None if the handle is stale.
    pub fn get_mut(&mut self, handle: ForeignHandle) -> Option<&mut ForeignInstance> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.value.as_mut()
    }

    pub fn is_live(&self, handle: ForeignHandle) -> bool {
        self.get(handle).is_some()
    }

    /// Increment reference count.
    pub fn add_ref(&mut self, handle: ForeignHandle) -> bool {
        if let Some(slot) = self.slots.get_mut(handle.index as usize)
            && slot.generation == handle.generation
            && slot.value.is_some()
        {
            slot.ref_count = slot.ref_count.saturating_add(1);
            return true;
        }
        false
    }

    /// Take one reference on every instance `instance` holds as an element.
    ///
    /// Containers own their instance elements: freeing the container gives
    /// those references back.
    pub fn retain_elements(&mut self, instance: &ForeignInstance) {
        for handle in instance.container.instance_handles() {
            self.add_ref(handle);
        }
    }

    /// Decrement reference count, free if zero.
    ///
    /// Returns true if the instance was freed.
    pub fn release(&mut self, handle: ForeignHandle) -> bool {
        let freed = self.drop_ref(handle);
        let released = freed.is_some();
        if let Some(instance) = freed {
            self.release_elements(instance);
        }
        released
    }

    /// Free an instance immediately, regardless of its reference count.
    pub fn free(&mut self, handle: ForeignHandle) {
        if let Some(instance) = self.vacate(handle) {
            self.release_elements(instance);
        }
    }

    fn drop_ref(&mut self, handle: ForeignHandle) -> Option<ForeignInstance> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation || slot.value.is_none() {
            return None;
        }
        slot.ref_count = slot.ref_count.saturating_sub(1);
        if slot.ref_count > 0 {
            return None;
        }
        self.vacate(handle)
    }

    fn vacate(&mut self, handle: ForeignHandle) -> Option<ForeignInstance> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        let instance = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free_list.push(handle.index);
        Some(instance)
    }

    /// Worklist instead of recursion: nesting depth is unbounded.
    fn release_elements(&mut self, instance: ForeignInstance) {
        let mut pending = instance.container.instance_handles();
        while let Some(handle) = pending.pop() {
            if let Some(freed) = self.drop_ref(handle) {
                pending.extend(freed.container.instance_handles());
            }
        }
    }

    pub fn ref_count(&self, handle: ForeignHandle) -> Option<u32> {
        let slot = self.slots.get(handle.index as usize)?;
        if slot.generation == handle.generation && slot.value.is_some() {
            Some(slot.ref_count)
        } else {
            None
        }
    }

    /// Number of live instances.
    pub fn live_count(&self) -> usize {
        self.slots.len() - self.free_list.len()
    }
}

impl fmt::Debug for ForeignHeap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForeignHeap")
            .field("slot_count", &self.slots.len())
            .field("free_count", &self.free_list.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ForeignContainer, ForeignValue, TypeHash};

    fn vector(values: &[i64]) -> ForeignInstance {
        ForeignInstance::new(
            TypeHash::from_name("std::vector<long>"),
            "std::vector<long>",
            ForeignContainer::Vector(values.iter().copied().map(ForeignValue::Int).collect()),
        )
    }

    #[test]
    fn release_frees_at_zero_and_invalidates_handle() {
        let mut heap = ForeignHeap::new();
        let handle = heap.allocate(vector(&[1, 2]));
        assert!(heap.add_ref(handle));
        assert_eq!(heap.ref_count(handle), Some(2));

        assert!(!heap.release(handle));
        assert!(heap.release(handle));
        assert!(heap.get(handle).is_none());
        assert_eq!(heap.live_count(), 0);
    }

    #[test]
    fn reused_slot_rejects_stale_handle() {
        let mut heap = ForeignHeap::new();
        let first = heap.allocate(vector(&[1]));
        heap.free(first);

        let second = heap.allocate(vector(&[2]));
        assert_eq!(first.index, second.index);
        assert_ne!(first.generation, second.generation);
        assert!(heap.get(first).is_none());
        assert!(heap.get(second).is_some());
    }

    #[test]
    fn freeing_a_container_releases_its_elements() {
        let mut heap = ForeignHeap::new();
        let inner = heap.allocate(vector(&[1]));
        let shared = heap.allocate(vector(&[2]));
        let outer = ForeignInstance::new(
            TypeHash::from_name("std::vector<std::vector<long> >"),
            "std::vector<std::vector<long> >",
            ForeignContainer::Vector(vec![ForeignValue::Instance(inner), ForeignValue::Instance(shared)]),
        );
        heap.retain_elements(&outer);
        heap.release(inner);
        let outer = heap.allocate(outer);
        assert_eq!(heap.ref_count(inner), Some(1));
        assert_eq!(heap.ref_count(shared), Some(2));

        assert!(heap.release(outer));
        assert!(!heap.is_live(inner));
        assert_eq!(heap.ref_count(shared), Some(1));
        assert_eq!(heap.live_count(), 1);
    }

    #[test]
    fn double_free_is_ignored() {
        let mut heap = ForeignHeap::new();
        let handle = heap.allocate(vector(&[]));
        heap.free(handle);
        heap.free(handle);
        assert_eq!(heap.live_count(), 0);
        assert!(!heap.release(handle));
    }
}
