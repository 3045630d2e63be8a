//! Handle registry for CueBridge
//!
//! Maps native handles back to the wrapper that owns them, so notifications
//! coming from the engine can find their object. Entries hold weak references
//! only; the registry never keeps a wrapper alive.

use crate::error::{CueBridgeError, Result};
use crate::lifecycle::{LifeCell, ObjectCore};
use crate::native::{HandleKind, NativeHandle};
use std::collections::HashMap;
use std::ptr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

struct RegistryEntry {
    object: Weak<ObjectCore>,
    life: Arc<LifeCell>,
    owner: NativeHandle,
    kind: HandleKind,
}

impl RegistryEntry {
    fn is_bound(&self) -> bool {
        self.object.strong_count() > 0 && self.life.is_live()
    }
}

/// An entry taken out of the registry by the notification path.
pub(crate) struct ClaimedEntry {
    pub(crate) life: Arc<LifeCell>,
    /// `None` when the wrapper was already being dropped.
    pub(crate) object: Option<Arc<ObjectCore>>,
}

/// The table behind the registry lock.
///
/// Methods here run with the lock held and must not call into the native
/// engine or drop the last strong reference to an object.
#[derive(Default)]
pub(crate) struct RegistryTable {
    entries: HashMap<NativeHandle, RegistryEntry>,
}

impl RegistryTable {
    fn insert(&mut self, object: &Arc<ObjectCore>) -> Result<()> {
        let handle = object.handle();
        if !object.owner_life().is_live() {
            return Err(CueBridgeError::InvalidState(format!(
                "engine {} is being disposed",
                object.owner()
            )));
        }
        if self.entries.get(&handle).is_some_and(RegistryEntry::is_bound) {
            return Err(CueBridgeError::DuplicateHandle(handle));
        }

        self.entries.insert(
            handle,
            RegistryEntry {
                object: Arc::downgrade(object),
                life: object.life().clone(),
                owner: object.owner(),
                kind: object.kind(),
            },
        );
        Ok(())
    }

    fn resolve(&mut self, handle: NativeHandle) -> Option<Arc<ObjectCore>> {
        let entry = self.entries.get(&handle)?;
        match entry.object.upgrade() {
            Some(object) => Some(object),
            None => {
                log::trace!("Dropping expired registry entry for {handle}");
                self.entries.remove(&handle);
                None
            }
        }
    }

    /// Removes the entry for `handle` if it still belongs to `object`.
    pub(crate) fn unregister(&mut self, handle: NativeHandle, object: *const ObjectCore) -> bool {
        let bound = self
            .entries
            .get(&handle)
            .is_some_and(|entry| ptr::eq(entry.object.as_ptr(), object));
        if bound {
            self.entries.remove(&handle);
        }
        bound
    }

    /// Takes a cue entry out of the table and wins its disposal, even when the
    /// wrapper is in the middle of being dropped.
    pub(crate) fn claim_cue(&mut self, handle: NativeHandle) -> Option<ClaimedEntry> {
        let entry = self.entries.get(&handle)?;
        if entry.kind != HandleKind::Cue {
            log::warn!("Ignoring cue notification for {} {handle}", entry.kind);
            return None;
        }
        if !entry.life.claim() {
            return None;
        }
        let entry = self.entries.remove(&handle)?;
        Some(ClaimedEntry {
            object: entry.object.upgrade(),
            life: entry.life,
        })
    }

    fn owned_by(&self, engine: NativeHandle) -> Vec<Arc<ObjectCore>> {
        self.entries
            .iter()
            .filter(|(handle, entry)| {
                entry.owner == engine && **handle != engine && entry.life.is_live()
            })
            .filter_map(|(_, entry)| entry.object.upgrade())
            .collect()
    }
}

/// Process-wide map from native handle to live wrapper.
#[derive(Default)]
pub struct InstanceRegistry {
    table: Mutex<RegistryTable>,
}

impl InstanceRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, RegistryTable> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Binds `object` to its handle.
    ///
    /// # Errors
    ///
    /// [`CueBridgeError::DuplicateHandle`] if a live object already owns the
    /// handle, [`CueBridgeError::InvalidState`] if the owning engine is no
    /// longer live.
    pub(crate) fn register(&self, object: &Arc<ObjectCore>) -> Result<()> {
        self.lock().insert(object)?;
        log::trace!("Registered {} {}", object.kind(), object.handle());
        Ok(())
    }

    pub(crate) fn resolve(&self, handle: NativeHandle) -> Option<Arc<ObjectCore>> {
        let mut table = self.lock();
        table.resolve(handle)
    }

    /// Live dependents of `engine`, excluding the engine itself.
    pub(crate) fn snapshot_owned_by(&self, engine: NativeHandle) -> Vec<Arc<ObjectCore>> {
        let table = self.lock();
        table.owned_by(engine)
    }

    /// Whether `handle` is bound to a live object.
    pub fn contains(&self, handle: NativeHandle) -> bool {
        self.resolve(handle)
            .is_some_and(|object| !object.is_disposed())
    }

    /// Number of entries, including ones whose wrapper is gone but which have
    /// not been pruned yet.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Handles of the live objects owned by `engine`.
    pub fn handles_owned_by(&self, engine: NativeHandle) -> Vec<NativeHandle> {
        let table = self.lock();
        table
            .entries
            .iter()
            .filter(|(handle, entry)| entry.owner == engine && **handle != engine && entry.is_bound())
            .map(|(handle, _)| *handle)
            .collect()
    }
}
