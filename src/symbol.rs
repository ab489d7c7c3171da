//! Symbol identifiers and the dense-with-spillover map used to hold
//! per-symbol state across the order book, aggregators, and profiles.

use dashmap::DashMap;

/// Numeric identifier for a tradeable instrument.
pub type SymbolId = u32;

/// A map from [`SymbolId`] to `V` optimized for the common case of small,
/// densely packed ids: lookups for `id < dense_capacity` hit a flat `Vec`
/// in O(1); larger ids spill into a concurrent hash map. Mirrors the
/// direct-array-plus-overflow-list pattern used throughout the original
/// engine's symbol-keyed structures (bar matrix, per-policy state).
#[derive(Debug)]
pub struct SymbolMap<V> {
    dense: Vec<Option<V>>,
    overflow: DashMap<SymbolId, V>,
}

impl<V> SymbolMap<V> {
    /// Creates a map whose dense region covers `[0, dense_capacity)`.
    #[must_use]
    pub fn new(dense_capacity: usize) -> Self {
        let mut dense = Vec::with_capacity(dense_capacity);
        dense.resize_with(dense_capacity, || None);
        Self {
            dense,
            overflow: DashMap::new(),
        }
    }

    #[inline]
    fn in_dense_range(&self, id: SymbolId) -> bool {
        (id as usize) < self.dense.len()
    }

    /// Returns a clone of the entry for `id`, if present.
    pub fn get(&self, id: SymbolId) -> Option<V>
    where
        V: Clone,
    {
        if self.in_dense_range(id) {
            self.dense[id as usize].clone()
        } else {
            self.overflow.get(&id).map(|e| e.value().clone())
        }
    }

    /// `true` iff `id` has an entry.
    #[must_use]
    pub fn contains(&self, id: SymbolId) -> bool {
        if self.in_dense_range(id) {
            self.dense[id as usize].is_some()
        } else {
            self.overflow.contains_key(&id)
        }
    }

    /// Inserts or replaces the entry for `id`.
    pub fn insert(&mut self, id: SymbolId, value: V) {
        if self.in_dense_range(id) {
            self.dense[id as usize] = Some(value);
        } else {
            self.overflow.insert(id, value);
        }
    }

    /// Removes and returns the entry for `id`, if any.
    pub fn remove(&mut self, id: SymbolId) -> Option<V> {
        if self.in_dense_range(id) {
            self.dense[id as usize].take()
        } else {
            self.overflow.remove(&id).map(|(_, v)| v)
        }
    }

    /// Runs `f` against the entry for `id`, creating it with `default` if
    /// absent. This is the primary entry point used by aggregators: "find
    /// or initialize the per-symbol state, then update it."
    pub fn entry_with<R>(&mut self, id: SymbolId, default: impl FnOnce() -> V, f: impl FnOnce(&mut V) -> R) -> R {
        if self.in_dense_range(id) {
            let slot = &mut self.dense[id as usize];
            if slot.is_none() {
                *slot = Some(default());
            }
            f(slot.as_mut().expect("just inserted"))
        } else {
            let mut entry = self.overflow.entry(id).or_insert_with(default);
            f(entry.value_mut())
        }
    }

    /// Clears every entry, dense and overflow, without shrinking capacity.
    pub fn clear(&mut self) {
        for slot in &mut self.dense {
            *slot = None;
        }
        self.overflow.clear();
    }

    /// Iterates over every populated dense entry. Used by `stop()`-driven
    /// flush paths that must visit every initialized symbol.
    pub fn dense_iter_mut(&mut self) -> impl Iterator<Item = (SymbolId, &mut V)> {
        self.dense
            .iter_mut()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_mut().map(|v| (i as SymbolId, v)))
    }

    /// Drains every overflow entry (dense entries are not included; callers
    /// typically combine this with [`Self::dense_iter_mut`]).
    pub fn overflow_drain(&mut self) -> Vec<(SymbolId, V)> {
        let keys: Vec<SymbolId> = self.overflow.iter().map(|e| *e.key()).collect();
        keys.into_iter()
            .filter_map(|k| self.overflow.remove(&k).map(|(_, v)| v).map(|v| (k, v)))
            .collect()
    }
}
