#![cfg(test)]

// Property tests for SlotHashMap + MapView kept inside the crate so they do
// not require feature gates to access internal modules.

use crate::slot_map::{SlotHashMap, SlotIndex};
use crate::Viewable;
use proptest::prelude::*;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::hash::Hasher;

// Key newtype with Borrow<str> to exercise borrowed lookup.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
struct Key(String);
impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
impl std::borrow::Borrow<str> for Key {
    fn borrow(&self) -> &str {
        &self.0
    }
}

// Pool-indexed operations to improve shrinking: indices shrink to earlier
// keys, pool length shrinks, and op lists shrink in length.
#[derive(Clone, Debug)]
enum OpI {
    Insert(usize, i32),
    Remove(usize),
    Find(usize),
    Contains(String),
    MutateViaView(usize, i32),
    Scan,
}

fn key_from(pool: &[String], i: usize) -> Key {
    Key(pool[i].clone())
}

fn arb_scenario() -> impl Strategy<Value = (Vec<String>, Vec<OpI>)> {
    proptest::collection::vec("[a-z]{0,5}", 1..=8).prop_flat_map(|pool| {
        let idxs: Vec<usize> = (0..pool.len()).collect();
        let idx = proptest::sample::select(idxs);
        let contains_pool = proptest::sample::select(pool.clone());
        let op = prop_oneof![
            (idx.clone(), any::<i32>()).prop_map(|(i, v)| OpI::Insert(i, v)),
            idx.clone().prop_map(OpI::Remove),
            idx.clone().prop_map(OpI::Find),
            prop_oneof![
                contains_pool.prop_map(|s: String| s),
                "[a-z]{0,5}".prop_map(|s| s)
            ]
            .prop_map(OpI::Contains),
            (idx.clone(), any::<i32>()).prop_map(|(i, d)| OpI::MutateViaView(i, d)),
            Just(OpI::Scan),
        ];
        proptest::collection::vec(op, 1..60).prop_map(move |ops| (pool.clone(), ops))
    })
}

fn scan(sut: &mut SlotHashMap<Key, i32>) -> BTreeMap<Key, i32> {
    let view = sut.view();
    let mut cur = view.cursor();
    let mut out = BTreeMap::new();
    while let Some(e) = cur.next(sut) {
        let prev = out.insert(e.key().clone(), *e.value());
        assert!(prev.is_none(), "a pass must yield each live slot once");
    }
    out
}

// Property: State-machine equivalence against std::collections::HashMap.
// Invariants exercised across random operation sequences:
// - insert is an upsert: old value returned on overwrite, None on new key;
//   overwrite is not structural (generation unchanged).
// - find_slot/contains_key parity with the model; borrowed lookup works.
// - remove returns the model's value, tombstones the slot, and the key is
//   gone from lookups and scans.
// - View value_mut write-through matches mutating the model.
// - A full cursor pass equals the model's entry set (tombstones skipped).
// - Slot indices captured before a structural change never resolve after it.
// - len/is_empty parity with the model after every op; the slot table never
//   shrinks (tombstones keep positions allocated).
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine((pool, ops) in arb_scenario()) {
        let mut sut: SlotHashMap<Key, i32> = SlotHashMap::new();
        let mut model: HashMap<Key, i32> = HashMap::new();
        let mut stale: Vec<SlotIndex> = Vec::new();
        let view = sut.view();

        for op in ops {
            match op {
                OpI::Insert(i, v) => {
                    let k = key_from(&pool, i);
                    let gen_before = sut.generation();
                    // New-key insert retires every outstanding index.
                    let retiring: Vec<SlotIndex> = if model.contains_key(&k) {
                        Vec::new()
                    } else {
                        model.keys().filter_map(|mk| sut.find_slot(mk)).collect()
                    };
                    let old = sut.insert(k.clone(), v);
                    let model_old = model.insert(k.clone(), v);
                    prop_assert_eq!(old, model_old);
                    if old.is_some() {
                        prop_assert_eq!(sut.generation(), gen_before, "overwrite is not structural");
                    } else {
                        prop_assert!(sut.generation() > gen_before);
                        stale.extend(retiring);
                    }
                }
                OpI::Remove(i) => {
                    let k = key_from(&pool, i);
                    let pre = sut.find_slot(&k);
                    let removed = sut.remove(&k);
                    let model_removed = model.remove(&k);
                    prop_assert_eq!(removed, model_removed);
                    if let Some(idx) = pre {
                        if removed.is_some() {
                            stale.push(idx);
                        }
                    }
                    if removed.is_some() {
                        prop_assert!(sut.find_slot(&k).is_none());
                    }
                }
                OpI::Find(i) => {
                    let k = key_from(&pool, i);
                    let found = sut.find_slot(&k);
                    prop_assert_eq!(found.is_some(), model.contains_key(&k));
                    if let Some(idx) = found {
                        let (fk, fv) = sut.slot_entry(idx).expect("fresh index resolves");
                        prop_assert_eq!(fk, &k);
                        prop_assert_eq!(Some(fv), model.get(&k));
                        prop_assert!(sut.is_live(idx.position()));
                    }
                }
                OpI::Contains(s) => {
                    let has = sut.contains_key(s.as_str());
                    let has_model = model.keys().any(|k| k.0 == s);
                    prop_assert_eq!(has, has_model);
                }
                OpI::MutateViaView(i, d) => {
                    let k = key_from(&pool, i);
                    match view.value_mut(&mut sut, &k) {
                        Ok(v) => {
                            prop_assert!(model.contains_key(&k));
                            *v = v.saturating_add(d);
                            let mv = model.get_mut(&k).expect("present in model");
                            *mv = mv.saturating_add(d);
                        }
                        Err(_) => prop_assert!(!model.contains_key(&k)),
                    }
                }
                OpI::Scan => {
                    let seen = scan(&mut sut);
                    let expected: BTreeMap<Key, i32> =
                        model.iter().map(|(k, v)| (k.clone(), *v)).collect();
                    prop_assert_eq!(seen, expected);
                }
            }

            // Post-conditions after each op
            // 1) Stale indices must never resolve.
            for &idx in &stale {
                prop_assert!(sut.slot_entry(idx).is_none());
            }
            // 2) Size parity; tombstones keep the table monotone.
            prop_assert_eq!(sut.len(), model.len());
            prop_assert_eq!(sut.is_empty(), model.is_empty());
            prop_assert!(sut.slot_bound() >= sut.len());
        }
    }
}

// Collision variant using a constant hasher to stress equality resolution.
#[derive(Clone, Default)]
struct ConstBuildHasher;
struct ConstHasher;
impl std::hash::BuildHasher for ConstBuildHasher {
    type Hasher = ConstHasher;
    fn build_hasher(&self) -> Self::Hasher {
        ConstHasher
    }
}
impl Hasher for ConstHasher {
    fn write(&mut self, _bytes: &[u8]) {}
    fn finish(&self) -> u64 {
        0
    }
}

// Property: lookup/scan/remove parity under worst-case collisions (constant
// hasher), stressing equality probing in the index and tombstone reuse.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine_with_collisions((pool, ops) in arb_scenario()) {
        let mut sut: SlotHashMap<Key, i32, ConstBuildHasher> =
            SlotHashMap::with_hasher(ConstBuildHasher);
        let mut model: HashMap<Key, i32> = HashMap::new();

        for op in ops {
            match op {
                OpI::Insert(i, v) => {
                    let k = key_from(&pool, i);
                    prop_assert_eq!(sut.insert(k.clone(), v), model.insert(k, v));
                }
                OpI::Remove(i) => {
                    let k = key_from(&pool, i);
                    prop_assert_eq!(sut.remove(&k), model.remove(&k));
                }
                OpI::Find(i) => {
                    let k = key_from(&pool, i);
                    prop_assert_eq!(sut.find_slot(&k).is_some(), model.contains_key(&k));
                }
                OpI::Contains(s) => {
                    let has = sut.contains_key(s.as_str());
                    prop_assert_eq!(has, model.keys().any(|k| k.0 == s));
                }
                OpI::MutateViaView(i, d) => {
                    let k = key_from(&pool, i);
                    if let Some(v) = sut.get_mut(&k) {
                        *v = v.saturating_add(d);
                        let mv = model.get_mut(&k).expect("present in model");
                        *mv = mv.saturating_add(d);
                    } else {
                        prop_assert!(!model.contains_key(&k));
                    }
                }
                OpI::Scan => {
                    let seen: BTreeMap<Key, i32> =
                        sut.iter().map(|(k, v)| (k.clone(), *v)).collect();
                    let expected: BTreeMap<Key, i32> =
                        model.iter().map(|(k, v)| (k.clone(), *v)).collect();
                    prop_assert_eq!(seen, expected);
                }
            }

            prop_assert_eq!(sut.len(), model.len());
            prop_assert_eq!(sut.is_empty(), model.is_empty());
        }
    }
}
