// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Thread-safe handle allocation.

use std::sync::{Mutex, MutexGuard};
use umbra_core::rid::GENERATION_MASK;
use umbra_core::{ResourceKind, Rid, ServerError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotState {
    /// A resource of this kind owns the slot.
    Live(ResourceKind),
    /// Freed by the caller; teardown on the render thread has not run yet.
    Retired,
    /// Available for reuse.
    Free,
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    generation: u32,
    state: SlotState,
}

#[derive(Debug, Default)]
struct AllocatorInner {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live_per_kind: [usize; ResourceKind::ALL.len()],
}

/// Hands out [`Rid`]s from one index space shared by every resource kind.
///
/// Allocation is immediate and callable from any thread, which lets `*_create`
/// return a usable handle before the render thread has initialised the object.
/// Freeing is split in two steps: [`RidAllocator::retire`] invalidates the handle
/// right away (so double frees are caught at the call site), and
/// [`RidAllocator::recycle`] returns the index to the free list once the render
/// thread tore the object down. An index is therefore never reused while a queued
/// command could still refer to the object it named.
#[derive(Debug, Default)]
pub struct RidAllocator {
    inner: Mutex<AllocatorInner>,
}

fn next_generation(generation: u32) -> u32 {
    match (generation + 1) & GENERATION_MASK {
        0 => 1,
        g => g,
    }
}

impl RidAllocator {
    /// Creates an empty allocator.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, AllocatorInner> {
        // Every critical section leaves the slot list consistent.
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Allocates a live handle of `kind`. O(1) amortized.
    ///
    /// Recycled indices come back with the generation they were given at retirement,
    /// so every handle previously minted for the slot stays invalid.
    pub fn allocate(&self, kind: ResourceKind) -> Rid {
        let mut guard = self.lock();
        let inner = &mut *guard;
        inner.live_per_kind[kind.tag() as usize] += 1;
        if let Some(index) = inner.free.pop() {
            let slot = &mut inner.slots[index as usize];
            slot.state = SlotState::Live(kind);
            Rid::from_parts(index, slot.generation, kind)
        } else {
            let index = inner.slots.len() as u32;
            inner.slots.push(Slot {
                generation: 1,
                state: SlotState::Live(kind),
            });
            Rid::from_parts(index, 1, kind)
        }
    }

    /// Invalidates `rid`.
    ///
    /// ## Errors
    /// * `ServerError::DoubleFree` - If the handle was already retired.
    /// * `ServerError::InvalidHandle` - If the handle was never minted by this allocator.
    pub fn retire(&self, rid: Rid) -> Result<(), ServerError> {
        if !rid.is_valid() {
            return Err(ServerError::InvalidHandle(rid));
        }
        let mut guard = self.lock();
        let inner = &mut *guard;
        let Some(slot) = inner.slots.get_mut(rid.index() as usize) else {
            return Err(ServerError::InvalidHandle(rid));
        };
        match slot.state {
            SlotState::Live(kind) if kind == rid.kind() && slot.generation == rid.generation() => {
                slot.generation = next_generation(slot.generation);
                slot.state = SlotState::Retired;
                inner.live_per_kind[kind.tag() as usize] -= 1;
                Ok(())
            }
            _ if rid.generation() < slot.generation => Err(ServerError::DoubleFree(rid)),
            _ => Err(ServerError::InvalidHandle(rid)),
        }
    }

    /// Makes the index of a retired handle available again.
    ///
    /// Calling this for a slot that is not retired does nothing.
    pub fn recycle(&self, index: u32) {
        let mut guard = self.lock();
        let inner = &mut *guard;
        if let Some(slot) = inner.slots.get_mut(index as usize) {
            if slot.state == SlotState::Retired {
                slot.state = SlotState::Free;
                inner.free.push(index);
            }
        }
    }

    /// Returns `true` if `rid` was allocated and not retired since.
    pub fn is_live(&self, rid: Rid) -> bool {
        let inner = self.lock();
        inner.slots.get(rid.index() as usize).is_some_and(|slot| {
            slot.generation == rid.generation() && slot.state == SlotState::Live(rid.kind())
        })
    }

    /// Number of live handles across all kinds.
    pub fn live_count(&self) -> usize {
        self.lock().live_per_kind.iter().sum()
    }

    /// Number of live handles of one kind.
    pub fn live_count_of(&self, kind: ResourceKind) -> usize {
        self.lock().live_per_kind[kind.tag() as usize]
    }

    /// Every live handle, in index order.
    pub fn live_handles(&self) -> Vec<Rid> {
        let inner = self.lock();
        inner
            .slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| match slot.state {
                SlotState::Live(kind) => Some(Rid::from_parts(index as u32, slot.generation, kind)),
                _ => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn handles_are_unique_across_kinds() {
        let allocator = RidAllocator::new();
        let a = allocator.allocate(ResourceKind::Mesh);
        let b = allocator.allocate(ResourceKind::Texture);
        assert_ne!(a.index(), b.index());
        assert!(a.is_valid() && b.is_valid());
        assert_eq!(allocator.live_count(), 2);
        assert_eq!(allocator.live_count_of(ResourceKind::Mesh), 1);
    }

    #[test]
    fn retire_invalidates_and_detects_double_free() {
        let allocator = RidAllocator::new();
        let rid = allocator.allocate(ResourceKind::Light);
        assert!(allocator.is_live(rid));

        allocator.retire(rid).unwrap();
        assert!(!allocator.is_live(rid));
        assert_eq!(allocator.retire(rid), Err(ServerError::DoubleFree(rid)));
        assert_eq!(allocator.live_count(), 0);
    }

    #[test]
    fn retired_index_is_not_reused_before_recycle() {
        let allocator = RidAllocator::new();
        let first = allocator.allocate(ResourceKind::Mesh);
        allocator.retire(first).unwrap();

        let second = allocator.allocate(ResourceKind::Mesh);
        assert_ne!(second.index(), first.index());

        allocator.recycle(first.index());
        let third = allocator.allocate(ResourceKind::Camera);
        assert_eq!(third.index(), first.index());
        assert_eq!(third.generation(), first.generation() + 1);
        // The stale handle still fails even though its index is live again.
        assert!(!allocator.is_live(first));
        assert_eq!(allocator.retire(first), Err(ServerError::DoubleFree(first)));
    }

    #[test]
    fn forged_handles_are_invalid() {
        let allocator = RidAllocator::new();
        let real = allocator.allocate(ResourceKind::Mesh);
        let wrong_kind = Rid::from_parts(real.index(), real.generation(), ResourceKind::Texture);
        let out_of_range = Rid::from_parts(99, 1, ResourceKind::Mesh);

        assert!(!allocator.is_live(wrong_kind));
        assert_eq!(
            allocator.retire(wrong_kind),
            Err(ServerError::InvalidHandle(wrong_kind))
        );
        assert_eq!(
            allocator.retire(out_of_range),
            Err(ServerError::InvalidHandle(out_of_range))
        );
        assert_eq!(
            allocator.retire(Rid::INVALID),
            Err(ServerError::InvalidHandle(Rid::INVALID))
        );
        assert!(allocator.is_live(real));
    }

    #[test]
    fn generation_skips_zero_on_wrap() {
        assert_eq!(next_generation(GENERATION_MASK), 1);
        assert_eq!(next_generation(1), 2);
    }

    #[test]
    fn concurrent_allocation_yields_unique_handles() {
        let allocator = Arc::new(RidAllocator::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let allocator = allocator.clone();
                std::thread::spawn(move || {
                    (0..250)
                        .map(|_| allocator.allocate(ResourceKind::CanvasItem))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for rid in handle.join().unwrap() {
                assert!(seen.insert(rid));
            }
        }
        assert_eq!(seen.len(), 1000);
        assert_eq!(allocator.live_handles().len(), 1000);
    }
}
