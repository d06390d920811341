//! Per-policy instance caches.
//!
//! Singleton slots hold a [`OnceCell`] so concurrent first resolutions
//! share one construction. Weak slots hold a [`WeakInstance`] that is
//! re-checked on every read. Both are tagged with the generation of the
//! registration that filled them.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::OnceCell;

use crate::instance::{Instance, WeakInstance};
use crate::key::TypeKey;

pub(crate) type SingletonCell = Arc<OnceCell<Instance>>;

#[derive(Clone)]
struct SingletonSlot {
    generation: u64,
    cell: SingletonCell,
}

impl SingletonSlot {
    fn new(generation: u64) -> Self {
        Self {
            generation,
            cell: Arc::new(OnceCell::new()),
        }
    }
}

struct WeakSlot {
    generation: u64,
    handle: WeakInstance,
}

#[derive(Default)]
pub(crate) struct InstanceCache {
    singletons: DashMap<TypeKey, SingletonSlot>,
    weak: DashMap<TypeKey, WeakSlot>,
}

impl InstanceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cell for `key` at `generation`, creating it if needed.
    ///
    /// A slot left over from an older registration is replaced. A caller
    /// still holding an older registration gets a detached cell so it
    /// never overwrites the newer slot.
    pub fn singleton_cell(&self, key: &TypeKey, generation: u64) -> SingletonCell {
        let mut slot = self
            .singletons
            .entry(key.clone())
            .or_insert_with(|| SingletonSlot::new(generation));

        if slot.generation < generation {
            *slot = SingletonSlot::new(generation);
        } else if slot.generation > generation {
            return Arc::new(OnceCell::new());
        }
        slot.cell.clone()
    }

    /// The live weakly retained instance for `key`, if any.
    pub fn live_weak(&self, key: &TypeKey, generation: u64) -> Option<Instance> {
        let slot = self.weak.get(key)?;
        if slot.generation != generation {
            return None;
        }
        slot.handle.upgrade()
    }

    /// Stores a weak handle unless a live instance from the same generation
    /// beat us to it, in which case that instance is returned instead.
    pub fn store_weak(
        &self,
        key: &TypeKey,
        generation: u64,
        handle: WeakInstance,
        instance: Instance,
    ) -> Instance {
        match self.weak.entry(key.clone()) {
            Entry::Occupied(mut occupied) => {
                let slot = occupied.get();
                if slot.generation == generation
                    && let Some(live) = slot.handle.upgrade()
                {
                    return live;
                }
                if slot.generation <= generation {
                    occupied.insert(WeakSlot { generation, handle });
                }
                instance
            }
            Entry::Vacant(vacant) => {
                vacant.insert(WeakSlot { generation, handle });
                instance
            }
        }
    }

    /// Drops any cached state for `key`.
    pub fn invalidate(&self, key: &TypeKey) {
        self.singletons.remove(key);
        self.weak.remove(key);
    }

    /// Drops every cached entry for which `keep` returns `false`.
    /// Returns how many entries were dropped.
    pub fn clear_except(&self, keep: impl Fn(&TypeKey) -> bool) -> usize {
        let before = self.singletons.len() + self.weak.len();
        self.singletons.retain(|key, _| keep(key));
        self.weak.retain(|key, _| keep(key));
        before - (self.singletons.len() + self.weak.len())
    }

    /// Number of singleton slots holding a built instance.
    pub fn built_singletons(&self) -> usize {
        self.singletons
            .iter()
            .filter(|slot| slot.cell.initialized())
            .count()
    }

    /// `(weak slots, weak slots whose instance is still alive)`.
    pub fn weak_counts(&self) -> (usize, usize) {
        let total = self.weak.len();
        let live = self.weak.iter().filter(|slot| slot.handle.is_alive()).count();
        (total, live)
    }

    /// Removes weak slots whose instance has been dropped.
    pub fn purge_dead_weak(&self) -> usize {
        let before = self.weak.len();
        self.weak.retain(|_, slot| slot.handle.is_alive());
        before - self.weak.len()
    }
}
