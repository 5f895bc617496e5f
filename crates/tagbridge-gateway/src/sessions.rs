// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Table of live sessions indexed by generation-checked handles.
//!
//! A slot is reused after its session is closed, but its generation is
//! bumped first, so a handle kept by a caller past `CloseDriver` never
//! resolves to the session that later took the slot.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

// =============================================================================
// SessionHandle
// =============================================================================

/// Opaque handle naming one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionHandle {
    index: u32,
    generation: u32,
}

impl SessionHandle {
    /// Packs the handle into one integer for callers that store it opaquely.
    pub fn as_u64(&self) -> u64 {
        (u64::from(self.generation) << 32) | u64::from(self.index)
    }

    /// Inverse of [`as_u64`](Self::as_u64).
    pub fn from_u64(raw: u64) -> Self {
        Self {
            index: raw as u32,
            generation: (raw >> 32) as u32,
        }
    }

    /// Slot index.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Slot generation at creation time.
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Display for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}.{}", self.index, self.generation)
    }
}

// =============================================================================
// SessionRegistry
// =============================================================================

struct Slot<S> {
    generation: u32,
    session: Option<Arc<S>>,
}

struct Slots<S> {
    slots: Vec<Slot<S>>,
    free: Vec<u32>,
    live: usize,
}

/// Generation-checked table of sessions.
pub struct SessionRegistry<S> {
    inner: Mutex<Slots<S>>,
}

impl<S> SessionRegistry<S> {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Slots {
                slots: Vec::new(),
                free: Vec::new(),
                live: 0,
            }),
        }
    }

    /// Stores a session and returns its handle.
    pub fn insert(&self, session: Arc<S>) -> SessionHandle {
        let mut inner = self.inner.lock();
        inner.live += 1;

        if let Some(index) = inner.free.pop() {
            let slot = &mut inner.slots[index as usize];
            slot.session = Some(session);
            return SessionHandle {
                index,
                generation: slot.generation,
            };
        }

        let index = inner.slots.len() as u32;
        inner.slots.push(Slot {
            generation: 0,
            session: Some(session),
        });
        SessionHandle {
            index,
            generation: 0,
        }
    }

    /// Returns the session named by `handle`, if it is still live.
    pub fn get(&self, handle: SessionHandle) -> Option<Arc<S>> {
        let inner = self.inner.lock();
        inner
            .slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.session.clone())
    }

    /// Removes the session named by `handle`. Stale handles remove nothing.
    pub fn remove(&self, handle: SessionHandle) -> Option<Arc<S>> {
        let mut inner = self.inner.lock();
        let slot = inner
            .slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)?;

        let session = slot.session.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        inner.free.push(handle.index);
        inner.live -= 1;
        Some(session)
    }

    /// Removes every session.
    pub fn drain(&self) -> Vec<Arc<S>> {
        let mut inner = self.inner.lock();
        let mut drained = Vec::with_capacity(inner.live);
        let mut freed = Vec::new();

        for (index, slot) in inner.slots.iter_mut().enumerate() {
            if let Some(session) = slot.session.take() {
                slot.generation = slot.generation.wrapping_add(1);
                freed.push(index as u32);
                drained.push(session);
            }
        }
        inner.free.extend(freed);
        inner.live = 0;
        drained
    }

    /// Returns handles of live sessions.
    pub fn handles(&self) -> Vec<SessionHandle> {
        let inner = self.inner.lock();
        inner
            .slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.session.is_some())
            .map(|(index, slot)| SessionHandle {
                index: index as u32,
                generation: slot.generation,
            })
            .collect()
    }

    /// Returns the number of live sessions.
    pub fn len(&self) -> usize {
        self.inner.lock().live
    }

    /// Returns `true` if no session is live.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<S> Default for SessionRegistry<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> fmt::Debug for SessionRegistry<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("live", &self.len())
            .finish()
    }
}
