#![cfg(test)]

// Property tests for HashTable kept inside the crate so they can reach the
// structural validator on every step.

use crate::hash_table::{EqMode, HashTable, Inserted, ResizePolicy, ValueEq};
use proptest::prelude::*;
use std::collections::HashMap;

#[derive(Clone, Copy, Default)]
struct KeyEq;
impl ValueEq<(String, i32)> for KeyEq {
    fn equal(&self, probe: &(String, i32), stored: &(String, i32), _mode: EqMode) -> bool {
        probe.0 == stored.0
    }
}
impl ValueEq<(String, i32), str> for KeyEq {
    fn equal(&self, probe: &str, stored: &(String, i32), _mode: EqMode) -> bool {
        probe == stored.0
    }
}

// A deliberately weak hash (few distinct values) so chains get long and
// head/middle/tail unlinking is exercised constantly.
fn weak_hash(s: &str) -> u32 {
    s.bytes().fold(0u32, |acc, b| acc.wrapping_add(b as u32)) % 13
}

#[derive(Clone, Debug)]
enum Op {
    Insert(usize, i32),
    Remove(usize),
    Find(usize),
    Drain,
}

fn arb_policy() -> impl Strategy<Value = ResizePolicy> {
    prop_oneof![
        Just(ResizePolicy::Grow),
        Just(ResizePolicy::GrowAndShrink),
    ]
}

fn arb_scenario() -> impl Strategy<Value = (Vec<String>, Vec<Op>)> {
    proptest::collection::vec("[a-z]{0,4}", 1..=40).prop_flat_map(|pool| {
        let n = pool.len();
        let op = prop_oneof![
            6 => (0..n, any::<i32>()).prop_map(|(i, v)| Op::Insert(i, v)),
            4 => (0..n).prop_map(Op::Remove),
            3 => (0..n).prop_map(Op::Find),
            1 => Just(Op::Drain),
        ];
        proptest::collection::vec(op, 1..200).prop_map(move |ops| (pool.clone(), ops))
    })
}

// Property: State-machine equivalence against std::collections::HashMap.
// Invariants exercised across random operation sequences:
// - Duplicate inserts report the stored record and leave it unchanged.
// - `find`/`remove` agree with the model for present and absent keys.
// - `len` tracks the model; `validate` passes after every step, so chains
//   and the free list always partition the slots across resizes.
// - Capacity stays a power of two and never drops below the floor.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine(policy in arb_policy(), (pool, ops) in arb_scenario()) {
        let mut sut: HashTable<(String, i32), KeyEq> = HashTable::new(8, KeyEq, policy).unwrap();
        let mut model: HashMap<String, i32> = HashMap::new();

        for op in ops {
            match op {
                Op::Insert(i, v) => {
                    let k = pool[i].clone();
                    let hash = weak_hash(&k);
                    match sut.insert((k.clone(), v), hash).unwrap() {
                        Inserted::New(stored) => {
                            prop_assert!(!model.contains_key(&k));
                            prop_assert_eq!(stored.1, v);
                            model.insert(k, v);
                        }
                        Inserted::Existing { stored, rejected } => {
                            prop_assert_eq!(Some(&stored.1), model.get(&k));
                            prop_assert_eq!(rejected.1, v);
                        }
                    }
                }
                Op::Remove(i) => {
                    let k = &pool[i];
                    let got = sut.remove(&k[..], weak_hash(k)).unwrap().map(|r| r.1);
                    prop_assert_eq!(got, model.remove(k));
                }
                Op::Find(i) => {
                    let k = &pool[i];
                    let got = sut.find(&k[..], weak_hash(k)).map(|r| r.1);
                    prop_assert_eq!(got, model.get(k).copied());
                }
                Op::Drain => {
                    let mut drained: Vec<(String, i32)> = sut.drain();
                    let mut expected: Vec<(String, i32)> = model.drain().collect();
                    drained.sort();
                    expected.sort();
                    prop_assert_eq!(drained, expected);
                }
            }

            prop_assert_eq!(sut.len(), model.len());
            prop_assert!(sut.validate().is_ok(), "validate failed: {:?}", sut.validate());
            let cap = sut.capacity();
            prop_assert!(cap.is_power_of_two() && cap >= 8);
            prop_assert!(sut.len() <= cap);
        }

        for (k, v) in &model {
            prop_assert_eq!(sut.find(&k[..], weak_hash(k)).map(|r| r.1), Some(*v));
        }
    }
}
