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

use umbra_core::{ResourceKind, Rid, ServerError};

/// Slot storage for the objects of one resource kind.
///
/// Slots are indexed by [`Rid::index`]. Each occupied slot remembers the full handle it
/// was inserted with; every lookup compares index, generation and kind, so a stale or
/// forged handle finds nothing.
#[derive(Debug, Clone)]
pub struct HandleTable<T> {
    kind: ResourceKind,
    slots: Vec<Option<(Rid, T)>>,
    len: usize,
}

impl<T> HandleTable<T> {
    /// Creates an empty table for `kind`.
    pub fn new(kind: ResourceKind) -> Self {
        Self {
            kind,
            slots: Vec::new(),
            len: 0,
        }
    }

    /// The kind of handles accepted by this table.
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Stores `value` under `rid`. A slot already owned by `rid` is replaced.
    ///
    /// ## Errors
    /// * `ServerError::WrongKind` - If `rid` is of another kind.
    /// * `ServerError::InvalidHandle` - If the slot is owned by another handle.
    pub fn insert(&mut self, rid: Rid, value: T) -> Result<(), ServerError> {
        ServerError::check_kind(rid, self.kind)?;
        let index = rid.index() as usize;
        if index >= self.slots.len() {
            self.slots.resize_with(index + 1, || None);
        }
        let slot = &mut self.slots[index];
        if matches!(slot, Some((owner, _)) if *owner != rid) {
            return Err(ServerError::InvalidHandle(rid));
        }
        if slot.replace((rid, value)).is_none() {
            self.len += 1;
        }
        Ok(())
    }

    /// Returns the object named by `rid`, if live.
    pub fn get(&self, rid: Rid) -> Option<&T> {
        match self.slots.get(rid.index() as usize) {
            Some(Some((owner, value))) if *owner == rid => Some(value),
            _ => None,
        }
    }

    /// Returns the object named by `rid` mutably, if live.
    pub fn get_mut(&mut self, rid: Rid) -> Option<&mut T> {
        match self.slots.get_mut(rid.index() as usize) {
            Some(Some((owner, value))) if *owner == rid => Some(value),
            _ => None,
        }
    }

    /// Like [`HandleTable::get`], with a typed error.
    ///
    /// ## Errors
    /// * `ServerError::WrongKind` - If `rid` is of another kind.
    /// * `ServerError::InvalidHandle` - If `rid` names no live object.
    pub fn lookup(&self, rid: Rid) -> Result<&T, ServerError> {
        ServerError::check_kind(rid, self.kind)?;
        self.get(rid).ok_or(ServerError::InvalidHandle(rid))
    }

    /// Like [`HandleTable::get_mut`], with a typed error.
    ///
    /// ## Errors
    /// * `ServerError::WrongKind` - If `rid` is of another kind.
    /// * `ServerError::InvalidHandle` - If `rid` names no live object.
    pub fn lookup_mut(&mut self, rid: Rid) -> Result<&mut T, ServerError> {
        ServerError::check_kind(rid, self.kind)?;
        self.get_mut(rid).ok_or(ServerError::InvalidHandle(rid))
    }

    /// Removes and returns the object named by `rid`.
    pub fn remove(&mut self, rid: Rid) -> Option<T> {
        let slot = self.slots.get_mut(rid.index() as usize)?;
        if !matches!(slot, Some((owner, _)) if *owner == rid) {
            return None;
        }
        self.len -= 1;
        slot.take().map(|(_, value)| value)
    }

    /// Returns `true` if `rid` names a live object.
    pub fn contains(&self, rid: Rid) -> bool {
        self.get(rid).is_some()
    }

    /// Number of live objects.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the table holds no object.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Iterates over live objects in index order.
    pub fn iter(&self) -> impl Iterator<Item = (Rid, &T)> {
        self.slots
            .iter()
            .filter_map(|slot| slot.as_ref().map(|(rid, value)| (*rid, value)))
    }

    /// Iterates mutably over live objects in index order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Rid, &mut T)> {
        self.slots
            .iter_mut()
            .filter_map(|slot| slot.as_mut().map(|(rid, value)| (*rid, value)))
    }

    /// Handles of every live object, in index order.
    pub fn handles(&self) -> Vec<Rid> {
        self.iter().map(|(rid, _)| rid).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mesh(index: u32, generation: u32) -> Rid {
        Rid::from_parts(index, generation, ResourceKind::Mesh)
    }

    #[test]
    fn insert_then_get() {
        let mut table = HandleTable::new(ResourceKind::Mesh);
        table.insert(mesh(3, 1), "cube").unwrap();
        assert_eq!(table.get(mesh(3, 1)), Some(&"cube"));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn stale_generation_misses() {
        let mut table = HandleTable::new(ResourceKind::Mesh);
        table.insert(mesh(0, 2), 1).unwrap();
        assert!(table.get(mesh(0, 1)).is_none());
        assert_eq!(
            table.lookup(mesh(0, 1)),
            Err(ServerError::InvalidHandle(mesh(0, 1)))
        );
        assert!(table.remove(mesh(0, 1)).is_none());
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn insert_never_evicts_another_owner() {
        let mut table = HandleTable::new(ResourceKind::Mesh);
        table.insert(mesh(1, 3), "current").unwrap();
        assert_eq!(
            table.insert(mesh(1, 2), "stale"),
            Err(ServerError::InvalidHandle(mesh(1, 2)))
        );
        assert_eq!(table.get(mesh(1, 3)), Some(&"current"));

        // The owner itself may replace its value.
        table.insert(mesh(1, 3), "rebuilt").unwrap();
        assert_eq!(table.get(mesh(1, 3)), Some(&"rebuilt"));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn wrong_kind_is_rejected() {
        let mut table = HandleTable::<u8>::new(ResourceKind::Mesh);
        let light = Rid::from_parts(0, 1, ResourceKind::Light);
        assert!(matches!(
            table.insert(light, 0),
            Err(ServerError::WrongKind { .. })
        ));
        assert!(matches!(
            table.lookup(light),
            Err(ServerError::WrongKind { .. })
        ));
    }

    #[test]
    fn remove_then_lookup_fails() {
        let mut table = HandleTable::new(ResourceKind::Mesh);
        table.insert(mesh(5, 1), 10).unwrap();
        assert_eq!(table.remove(mesh(5, 1)), Some(10));
        assert!(!table.contains(mesh(5, 1)));
        assert!(table.is_empty());
    }

    #[test]
    fn iteration_is_in_index_order() {
        let mut table = HandleTable::new(ResourceKind::Mesh);
        table.insert(mesh(7, 1), 'c').unwrap();
        table.insert(mesh(2, 1), 'a').unwrap();
        table.insert(mesh(4, 1), 'b').unwrap();
        let values: String = table.iter().map(|(_, v)| *v).collect();
        assert_eq!(values, "abc");
        assert_eq!(table.handles()[0], mesh(2, 1));
    }
}
