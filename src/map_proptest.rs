// Property tests for StableHashMap kept inside the crate so the index and
// store statistics stay reachable without feature gates.

use crate::case_fold::{AsciiCaseInsensitive, KeyEquivalence};
use crate::map::{Handle, InsertError, StableHashMap};
use proptest::prelude::*;
use std::collections::{BTreeSet, HashMap};
use std::hash::{BuildHasher, Hasher};

// Operations index into a key pool so shrinking moves toward earlier keys.
// `casing` selects a case variant of the pooled key. `Fill` inserts a run of
// pool keys at once so tables get past their first few growths.
#[derive(Clone, Debug)]
enum Op {
    Assign(usize, u8, i32),
    TryInsert(usize, u8, i32),
    Erase(usize, u8),
    RemoveHandle(usize),
    Find(usize, u8),
    Mutate(usize, i32),
    Fill(usize, u8),
    Reserve(u8),
    Iterate,
    Clear,
}

fn variant(key: &str, casing: u8) -> String {
    key.chars()
        .enumerate()
        .map(|(i, c)| {
            if (casing >> (i % 8)) & 1 == 1 {
                c.to_ascii_uppercase()
            } else {
                c
            }
        })
        .collect()
}

fn arb_scenario(
    max_pool: usize,
    max_ops: usize,
) -> impl Strategy<Value = (Vec<String>, Vec<Op>)> {
    proptest::collection::vec("[a-zA-Z]{0,5}", 1..=max_pool).prop_flat_map(move |pool| {
        let idxs: Vec<usize> = (0..pool.len()).collect();
        let idx = proptest::sample::select(idxs);
        let op = prop_oneof![
            4 => (idx.clone(), any::<u8>(), any::<i32>()).prop_map(|(i, c, v)| Op::Assign(i, c, v)),
            2 => (idx.clone(), any::<u8>(), any::<i32>()).prop_map(|(i, c, v)| Op::TryInsert(i, c, v)),
            2 => (idx.clone(), any::<u8>()).prop_map(|(i, c)| Op::Erase(i, c)),
            1 => idx.clone().prop_map(Op::RemoveHandle),
            2 => (idx.clone(), any::<u8>()).prop_map(|(i, c)| Op::Find(i, c)),
            1 => (idx.clone(), any::<i32>()).prop_map(|(i, d)| Op::Mutate(i, d)),
            1 => (idx.clone(), any::<u8>()).prop_map(|(i, c)| Op::Fill(i, c)),
            1 => any::<u8>().prop_map(Op::Reserve),
            1 => Just(Op::Iterate),
            1 => Just(Op::Clear),
        ];
        proptest::collection::vec(op, 1..max_ops).prop_map(move |ops| (pool.clone(), ops))
    })
}

// Model keyed by the folded key; remembers the casing of the first insertion.
struct Model {
    entries: HashMap<String, (String, i32)>,
    live: HashMap<String, Handle>,
    stale: Vec<Handle>,
}

impl Model {
    fn new() -> Self {
        Self {
            entries: HashMap::new(),
            live: HashMap::new(),
            stale: Vec::new(),
        }
    }
}

fn run<S>(mut sut: StableHashMap<String, i32, AsciiCaseInsensitive, S>, pool: Vec<String>, ops: Vec<Op>)
    -> Result<(), TestCaseError>
where
    S: BuildHasher,
{
    let mut model = Model::new();
    for op in ops {
        match op {
            Op::Assign(i, c, v) => {
                let k = variant(&pool[i], c);
                let folded = k.to_ascii_lowercase();
                let (h, old) = sut.insert_or_assign(k.clone(), v);
                match model.entries.get_mut(&folded) {
                    Some(e) => {
                        prop_assert_eq!(old, Some(e.1));
                        prop_assert_eq!(Some(&h), model.live.get(&folded), "overwrite keeps handle");
                        e.1 = v;
                    }
                    None => {
                        prop_assert!(old.is_none());
                        model.entries.insert(folded.clone(), (k, v));
                        model.live.insert(folded, h);
                    }
                }
            }
            Op::TryInsert(i, c, v) => {
                let k = variant(&pool[i], c);
                let folded = k.to_ascii_lowercase();
                match sut.try_insert(k.clone(), v) {
                    Ok(h) => {
                        prop_assert!(!model.entries.contains_key(&folded));
                        model.entries.insert(folded.clone(), (k, v));
                        model.live.insert(folded, h);
                    }
                    Err(InsertError::DuplicateKey { existing }) => {
                        prop_assert_eq!(Some(&existing), model.live.get(&folded));
                    }
                }
            }
            Op::Erase(i, c) => {
                let k = variant(&pool[i], c);
                let folded = k.to_ascii_lowercase();
                let before = sut.len();
                let erased = sut.erase(&k);
                prop_assert_eq!(erased, model.entries.remove(&folded).is_some());
                if erased {
                    let h = model.live.remove(&folded).expect("tracked handle");
                    model.stale.push(h);
                } else {
                    prop_assert_eq!(sut.len(), before);
                }
            }
            Op::RemoveHandle(i) => {
                let folded = pool[i].to_ascii_lowercase();
                if let Some(h) = model.live.remove(&folded) {
                    let (k, v) = sut.remove_handle(h).expect("live handle");
                    let (mk, mv) = model.entries.remove(&folded).expect("present in model");
                    prop_assert_eq!(k, mk);
                    prop_assert_eq!(v, mv);
                    model.stale.push(h);
                }
            }
            Op::Find(i, c) => {
                let k = variant(&pool[i], c);
                let folded = k.to_ascii_lowercase();
                prop_assert_eq!(sut.find(&k), model.live.get(&folded).copied());
                prop_assert_eq!(sut.get(&k), model.entries.get(&folded).map(|e| &e.1));
            }
            Op::Mutate(i, d) => {
                let folded = pool[i].to_ascii_lowercase();
                if let Some(&h) = model.live.get(&folded) {
                    let v = h.value_mut(&mut sut).expect("live handle resolves");
                    *v = v.wrapping_add(d);
                    let e = model.entries.get_mut(&folded).expect("present in model");
                    e.1 = e.1.wrapping_add(d);
                }
            }
            Op::Fill(start, c) => {
                for i in start..pool.len() {
                    let k = variant(&pool[i], c);
                    let folded = k.to_ascii_lowercase();
                    let h = sut.get_or_insert_with(k.clone(), || i as i32);
                    match model.live.get(&folded) {
                        Some(&existing) => prop_assert_eq!(h, existing),
                        None => {
                            model.entries.insert(folded.clone(), (k, i as i32));
                            model.live.insert(folded, h);
                        }
                    }
                }
            }
            Op::Reserve(n) => {
                sut.reserve(n as usize);
                prop_assert!(sut.capacity() >= sut.len() + n as usize);
            }
            Op::Iterate => {
                let s: BTreeSet<(String, i32)> =
                    sut.iter().map(|(_, k, v)| (k.clone(), *v)).collect();
                let m: BTreeSet<(String, i32)> = model.entries.values().cloned().collect();
                prop_assert_eq!(s, m);
            }
            Op::Clear => {
                sut.clear();
                model.entries.clear();
                model.stale.extend(model.live.drain().map(|(_, h)| h));
            }
        }

        // Post-conditions after each op
        for &h in &model.stale {
            prop_assert!(h.value(&sut).is_none());
        }
        for (folded, &h) in &model.live {
            let (k, v) = &model.entries[folded];
            prop_assert_eq!(h.key(&sut), Some(k));
            prop_assert_eq!(h.value(&sut), Some(v));
        }
        prop_assert_eq!(sut.len(), model.entries.len());
        prop_assert!(sut.capacity() >= sut.len());
    }
    Ok(())
}

// Property: state-machine equivalence against a model keyed by lower-cased
// strings. Case variants share one entry; overwrite keeps the handle and the
// original casing; stale handles never resolve; the load bound holds.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine((pool, ops) in arb_scenario(8, 80)) {
        run(StableHashMap::new(), pool, ops)?;
    }
}

// Property: the same state machine over a pool large enough that the index
// grows several times and erased slots are reused under the model.
proptest! {
    #![proptest_config(ProptestConfig { cases: 32, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine_through_growth((pool, ops) in arb_scenario(96, 300)) {
        run(StableHashMap::new(), pool, ops)?;
    }
}

#[derive(Clone, Default)]
struct ConstBuildHasher;
struct ConstHasher;
impl BuildHasher for ConstBuildHasher {
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

// Property: same invariants when every key collides, so every lookup walks
// one probe chain through live and erased slots.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine_with_collisions((pool, ops) in arb_scenario(8, 80)) {
        run(StableHashMap::with_hasher(ConstBuildHasher), pool, ops)?;
    }
}

// Property: equivalent keys hash identically for arbitrary byte strings.
proptest! {
    #[test]
    fn prop_fold_consistency(s in proptest::collection::vec(any::<u8>(), 0..64), mask in any::<u64>()) {
        let t: Vec<u8> = s
            .iter()
            .enumerate()
            .map(|(i, b)| if (mask >> (i % 64)) & 1 == 1 { b.to_ascii_uppercase() } else { *b })
            .collect();
        let e = AsciiCaseInsensitive;
        prop_assert!(e.keys_equal(&s, &t));
        let b = std::collections::hash_map::RandomState::new();
        let mut h1 = b.build_hasher();
        let mut h2 = b.build_hasher();
        e.hash_key(&s, &mut h1);
        e.hash_key(&t, &mut h2);
        prop_assert_eq!(h1.finish(), h2.finish());
    }
}
