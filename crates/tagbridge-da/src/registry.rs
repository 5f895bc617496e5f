// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Bidirectional tag ⇄ item handle map.
//!
//! The registry is read from the notification context while the session
//! manager repopulates it, so both directions live behind one lock and are
//! updated together.

use std::collections::HashMap;

use parking_lot::RwLock;
use tagbridge_core::TagId;

use crate::codec::VarType;
use crate::transport::ItemHandle;

// =============================================================================
// ItemEntry
// =============================================================================

/// What the registry knows about a provisioned item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemEntry {
    /// Protocol handle.
    pub handle: ItemHandle,
    /// Wire type the server reported when the item was created.
    pub data_type: VarType,
    /// Item name.
    pub name: String,
}

impl ItemEntry {
    /// Creates an entry.
    pub fn new(handle: ItemHandle, data_type: VarType, name: impl Into<String>) -> Self {
        Self {
            handle,
            data_type,
            name: name.into(),
        }
    }
}

// =============================================================================
// TagRegistry
// =============================================================================

#[derive(Debug, Default)]
struct Maps {
    by_id: HashMap<TagId, ItemEntry>,
    by_handle: HashMap<ItemHandle, TagId>,
}

/// Mapping between caller tag ids and item handles.
///
/// The two directions are always inverse to each other: registering a pair
/// evicts any older pair sharing either key.
#[derive(Debug, Default)]
pub struct TagRegistry {
    maps: RwLock<Maps>,
}

impl TagRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Associates `id` with `entry`, replacing any stale mapping of either key.
    pub fn register(&self, id: TagId, entry: ItemEntry) {
        let mut maps = self.maps.write();

        if let Some(old) = maps.by_id.remove(&id) {
            maps.by_handle.remove(&old.handle);
        }
        if let Some(old_id) = maps.by_handle.remove(&entry.handle) {
            maps.by_id.remove(&old_id);
        }

        maps.by_handle.insert(entry.handle, id);
        maps.by_id.insert(id, entry);
    }

    /// Returns the item registered for `id`.
    pub fn lookup_handle(&self, id: TagId) -> Option<ItemEntry> {
        self.maps.read().by_id.get(&id).cloned()
    }

    /// Returns the tag id registered for `handle`.
    pub fn lookup_id(&self, handle: ItemHandle) -> Option<TagId> {
        self.maps.read().by_handle.get(&handle).copied()
    }

    /// Removes every mapping.
    pub fn clear(&self) {
        let mut maps = self.maps.write();
        maps.by_id.clear();
        maps.by_handle.clear();
    }

    /// Returns the number of registered tags.
    pub fn len(&self) -> usize {
        self.maps.read().by_id.len()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.maps.read().by_id.is_empty()
    }

    /// Returns registered tag ids in ascending order.
    pub fn ids(&self) -> Vec<TagId> {
        let mut ids: Vec<TagId> = self.maps.read().by_id.keys().copied().collect();
        ids.sort();
        ids
    }
}
