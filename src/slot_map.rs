//! SlotHashMap: hash map with an explicit, position-addressable slot table.

use core::borrow::Borrow;
use core::cell::Cell;
use core::hash::{BuildHasher, Hash};
use core::mem;
use hashbrown::HashTable;
use std::collections::hash_map::RandomState;

/// Validated handle to one occupied slot. Issued by [`SlotHashMap::find_slot`]
/// and honored only while the map's generation matches the one captured here;
/// any structural change (new slot, removal) retires all outstanding indices.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct SlotIndex {
    slot: usize,
    generation: u64,
}

impl SlotIndex {
    /// Raw position of the slot in the table.
    pub fn position(&self) -> usize {
        self.slot
    }
}

/// One slot of the table. Vacant slots are tombstones: they keep their
/// position and thread the free list until an insert reclaims them.
#[derive(Debug)]
enum Slot<K, V> {
    Occupied { hash: u64, key: K, value: V },
    Vacant { next_free: Option<usize> },
}

impl<K, V> Slot<K, V> {
    fn is_live(&self) -> bool {
        matches!(self, Slot::Occupied { .. })
    }
}

pub struct SlotHashMap<K, V, S = RandomState> {
    hasher: S,
    index: HashTable<usize>,
    slots: Vec<Slot<K, V>>, // position-stable storage; never compacted
    free_head: Option<usize>,
    live: usize,
    generation: u64,
    source_id: u64,
}

// Per-thread instance ids let views debug-check they are used with the map
// they were created from. The map itself may be Send; views are not.
fn next_source_id() -> u64 {
    thread_local! {
        static NEXT: Cell<u64> = Cell::new(1);
    }
    NEXT.with(|c| {
        let id = c.get();
        c.set(id + 1);
        id
    })
}

impl<K, V> SlotHashMap<K, V>
where
    K: Eq + Hash,
{
    pub fn new() -> Self {
        Self::with_hasher(Default::default())
    }
}

impl<K, V> Default for SlotHashMap<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S> SlotHashMap<K, V, S> {
    pub fn with_hasher(hasher: S) -> Self {
        Self {
            hasher,
            index: HashTable::new(),
            slots: Vec::new(),
            free_head: None,
            live: 0,
            generation: 0,
            source_id: next_source_id(),
        }
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Scan bound for slot-order walks: every allocated position, live or
    /// tombstoned, lies in `0..slot_bound()`.
    pub fn slot_bound(&self) -> usize {
        self.slots.len()
    }

    /// Occupancy predicate for a raw slot position.
    pub fn is_live(&self, pos: usize) -> bool {
        self.slots.get(pos).is_some_and(Slot::is_live)
    }

    /// Current structural revision. Bumped on slot allocation and removal,
    /// not on value overwrite.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn source_id(&self) -> u64 {
        self.source_id
    }

    /// Resolve a validated slot index. `None` once the index is stale.
    pub fn slot_entry(&self, idx: SlotIndex) -> Option<(&K, &V)> {
        if idx.generation != self.generation {
            return None;
        }
        self.entry_at(idx.slot)
    }

    /// Mutable counterpart of [`slot_entry`](Self::slot_entry); the key stays shared.
    pub fn slot_entry_mut(&mut self, idx: SlotIndex) -> Option<(&K, &mut V)> {
        if idx.generation != self.generation {
            return None;
        }
        self.entry_at_mut(idx.slot)
    }

    /// Position-addressed access, `None` for tombstones and positions past
    /// the bound. This is the primitive slot-order scans are built from.
    pub fn entry_at(&self, pos: usize) -> Option<(&K, &V)> {
        match self.slots.get(pos) {
            Some(Slot::Occupied { key, value, .. }) => Some((key, value)),
            _ => None,
        }
    }

    pub fn entry_at_mut(&mut self, pos: usize) -> Option<(&K, &mut V)> {
        match self.slots.get_mut(pos) {
            Some(Slot::Occupied { key, value, .. }) => Some((&*key, value)),
            _ => None,
        }
    }

    /// Live entries in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.slots.iter().filter_map(|slot| match slot {
            Slot::Occupied { key, value, .. } => Some((key, value)),
            Slot::Vacant { .. } => None,
        })
    }

    /// Live entries in slot order, values mutable.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&K, &mut V)> {
        self.slots.iter_mut().filter_map(|slot| match slot {
            Slot::Occupied { key, value, .. } => Some((&*key, value)),
            Slot::Vacant { .. } => None,
        })
    }
}

impl<K, V, S> SlotHashMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    fn make_hash<Q>(&self, q: &Q) -> u64
    where
        Q: ?Sized + Hash,
    {
        self.hasher.hash_one(q)
    }

    /// Find the slot holding `q`, returning a handle valid for the current
    /// generation.
    pub fn find_slot<Q>(&self, q: &Q) -> Option<SlotIndex>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let hash = self.make_hash(q);
        self.index
            .find(hash, |&pos| {
                matches!(&self.slots[pos], Slot::Occupied { key, .. } if key.borrow() == q)
            })
            .map(|&pos| SlotIndex {
                slot: pos,
                generation: self.generation,
            })
    }

    pub fn contains_key<Q>(&self, q: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.find_slot(q).is_some()
    }

    pub fn get<Q>(&self, q: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let idx = self.find_slot(q)?;
        self.slot_entry(idx).map(|(_, v)| v)
    }

    pub fn get_mut<Q>(&mut self, q: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let idx = self.find_slot(q)?;
        self.slot_entry_mut(idx).map(|(_, v)| v)
    }

    /// Upsert. Overwriting an existing key returns the old value and is not
    /// a structural change; inserting a new key reclaims a tombstone (or
    /// appends) and bumps the generation.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        let hash = self.make_hash(&key);
        let slots = &self.slots;
        match self.index.entry(
            hash,
            |&pos| matches!(&slots[pos], Slot::Occupied { key: k, .. } if *k == key),
            |&pos| match &slots[pos] {
                Slot::Occupied { hash, .. } => *hash,
                Slot::Vacant { .. } => 0,
            },
        ) {
            hashbrown::hash_table::Entry::Occupied(o) => {
                let pos = *o.get();
                match &mut self.slots[pos] {
                    Slot::Occupied { value: stored, .. } => Some(mem::replace(stored, value)),
                    Slot::Vacant { .. } => unreachable!("index never points at tombstones"),
                }
            }
            hashbrown::hash_table::Entry::Vacant(v) => {
                let slot = Slot::Occupied { hash, key, value };
                let pos = match self.free_head {
                    Some(pos) => {
                        self.free_head = match self.slots[pos] {
                            Slot::Vacant { next_free } => next_free,
                            Slot::Occupied { .. } => {
                                unreachable!("free list links only vacant slots")
                            }
                        };
                        self.slots[pos] = slot;
                        pos
                    }
                    None => {
                        self.slots.push(slot);
                        self.slots.len() - 1
                    }
                };
                let _ = v.insert(pos);
                self.live += 1;
                self.generation += 1;
                None
            }
        }
    }

    /// Remove an entry, leaving a tombstone on the free list.
    pub fn remove<Q>(&mut self, q: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let hash = self.make_hash(q);
        let slots = &self.slots;
        let entry = self
            .index
            .find_entry(hash, |&pos| {
                matches!(&slots[pos], Slot::Occupied { key, .. } if key.borrow() == q)
            })
            .ok()?;
        let (pos, _) = entry.remove();

        let tombstone = Slot::Vacant {
            next_free: self.free_head,
        };
        let old = mem::replace(&mut self.slots[pos], tombstone);
        self.free_head = Some(pos);
        self.live -= 1;
        self.generation += 1;
        match old {
            Slot::Occupied { value, .. } => Some(value),
            Slot::Vacant { .. } => unreachable!("index never points at tombstones"),
        }
    }
}

impl<K, V, S> Extend<(K, V)> for SlotHashMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            let _ = self.insert(k, v);
        }
    }
}

impl<K, V, S> FromIterator<(K, V)> for SlotHashMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher + Default,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::with_hasher(S::default());
        map.extend(iter);
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    /// Invariant: overwriting an existing key replaces the value in place,
    /// returns the old one, and is not a structural change.
    #[test]
    fn upsert_replaces_value_without_structural_change() {
        let mut m: SlotHashMap<String, i32> = SlotHashMap::new();
        assert_eq!(m.insert("k".to_string(), 1), None);
        let gen_before = m.generation();
        let idx = m.find_slot("k").unwrap();

        assert_eq!(m.insert("k".to_string(), 2), Some(1));
        assert_eq!(m.generation(), gen_before);
        assert_eq!(m.len(), 1);
        // The pre-overwrite index still resolves and sees the new value.
        assert_eq!(m.slot_entry(idx).map(|(_, v)| *v), Some(2));
    }

    /// Invariant: removal leaves a tombstone (position still allocated, not
    /// live) and live iteration skips it.
    #[test]
    fn remove_leaves_tombstone_skipped_by_iteration() {
        let mut m: SlotHashMap<String, i32> = SlotHashMap::new();
        for (i, k) in ["a", "b", "c"].iter().enumerate() {
            m.insert((*k).to_string(), i as i32);
        }
        let pos = m.find_slot("b").unwrap().position();
        assert_eq!(m.remove("b"), Some(1));

        assert_eq!(m.slot_bound(), 3, "tombstone keeps its position");
        assert!(!m.is_live(pos));
        assert!(m.entry_at(pos).is_none());

        let seen: BTreeSet<String> = m.iter().map(|(k, _)| k.clone()).collect();
        let expected: BTreeSet<String> = ["a", "c"].iter().map(|s| (*s).to_string()).collect();
        assert_eq!(seen, expected);
        assert_eq!(m.len(), 2);
    }

    /// Invariant: inserting after a removal reclaims the tombstoned position
    /// instead of growing the slot table.
    #[test]
    fn insert_reclaims_tombstone() {
        let mut m: SlotHashMap<String, i32> = SlotHashMap::new();
        m.insert("a".to_string(), 1);
        m.insert("b".to_string(), 2);
        let freed = m.find_slot("a").unwrap().position();
        m.remove("a");

        m.insert("c".to_string(), 3);
        assert_eq!(m.slot_bound(), 2, "no growth while a tombstone is free");
        assert_eq!(m.find_slot("c").unwrap().position(), freed);
        assert!(m.is_live(freed));
    }

    /// Invariant: a slot index issued before a structural change never
    /// resolves afterward, even when the physical slot was reused.
    #[test]
    fn stale_index_does_not_alias_reused_slot() {
        let mut m: SlotHashMap<String, i32> = SlotHashMap::new();
        m.insert("old".to_string(), 1);
        let idx = m.find_slot("old").unwrap();

        m.remove("old");
        assert!(m.slot_entry(idx).is_none(), "stale after removal");

        // Reuses the same physical position.
        m.insert("new".to_string(), 2);
        assert_eq!(m.find_slot("new").unwrap().position(), idx.position());
        assert!(m.slot_entry(idx).is_none(), "stale index must not see the new entry");
        assert!(m.slot_entry(m.find_slot("new").unwrap()).is_some());
    }

    /// Invariant: borrowed lookup works (store `String`, query with `&str`).
    #[test]
    fn borrowed_lookup_with_str() {
        let mut m: SlotHashMap<String, i32> = SlotHashMap::new();
        m.insert("hello".to_string(), 1);
        assert!(m.contains_key("hello"));
        assert!(!m.contains_key("world"));
        assert!(m.find_slot("hello").is_some());
        assert!(m.find_slot("world").is_none());
    }

    /// Invariant: lookups resolve correctly under total hash collision;
    /// equality probing picks the right slot.
    #[test]
    fn collision_handling_with_const_hasher() {
        #[derive(Clone, Default)]
        struct ConstBuildHasher;
        struct ConstHasher;
        impl BuildHasher for ConstBuildHasher {
            type Hasher = ConstHasher;
            fn build_hasher(&self) -> Self::Hasher {
                ConstHasher
            }
        }
        impl core::hash::Hasher for ConstHasher {
            fn write(&mut self, _bytes: &[u8]) {}
            fn finish(&self) -> u64 {
                0
            } // force all keys into the same hash bucket
        }

        let mut m: SlotHashMap<String, i32, ConstBuildHasher> =
            SlotHashMap::with_hasher(ConstBuildHasher);
        m.insert("a".to_string(), 1);
        m.insert("b".to_string(), 2);

        let ia = m.find_slot("a").expect("find a");
        let ib = m.find_slot("b").expect("find b");
        assert_ne!(ia.position(), ib.position());
        assert_eq!(m.get("a"), Some(&1));
        assert_eq!(m.get("b"), Some(&2));
    }

    /// Invariant: `iter_mut` writes through to storage; subsequent lookups
    /// observe the updates.
    #[test]
    fn iteration_and_mutation() {
        let mut m: SlotHashMap<String, i32> = SlotHashMap::new();
        let keys = ["k1", "k2", "k3"];
        for (i, k) in keys.iter().enumerate() {
            m.insert((*k).to_string(), i as i32);
        }

        for (_k, v) in m.iter_mut() {
            *v += 10;
        }
        assert_eq!(m.get("k1"), Some(&10));
        assert_eq!(m.get("k2"), Some(&11));
        assert_eq!(m.get("k3"), Some(&12));
    }

    /// Invariant: `len`/`is_empty` track live entries only, unaffected by
    /// tombstones.
    #[test]
    fn len_counts_live_entries_only() {
        let mut m: SlotHashMap<String, i32> = SlotHashMap::new();
        assert_eq!(m.len(), 0);
        assert!(m.is_empty());

        m.insert("a".to_string(), 1);
        m.insert("b".to_string(), 2);
        assert_eq!(m.len(), 2);

        m.remove("a");
        assert_eq!(m.len(), 1);
        assert!(!m.is_empty());
        assert_eq!(m.slot_bound(), 2);

        m.remove("b");
        assert_eq!(m.len(), 0);
        assert!(m.is_empty());
    }

    /// Invariant: removing an absent key is a no-op and returns `None`.
    #[test]
    fn remove_absent_is_noop() {
        let mut m: SlotHashMap<String, i32> = SlotHashMap::new();
        m.insert("a".to_string(), 1);
        let gen_before = m.generation();
        assert_eq!(m.remove("x"), None);
        assert_eq!(m.generation(), gen_before);
        assert_eq!(m.len(), 1);
    }
}
