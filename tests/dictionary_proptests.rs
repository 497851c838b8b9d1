// Dictionary property tests.
//
// Property: presence and refcount match outstanding handles per content.
//  - Model: per-key stack of handles obtained from inserts.
//  - Invariant: refcount(key) == live[k].len() (None when empty);
//               len() == count(keys with outstanding handles).
//  - Operations: insert (copy), insert (explicit length), insert_zero_copy,
//    remove-one, remove-all, remove of absent content.
//  - Handles for one key always share storage.
use proptest::prelude::*;
use rc_dict::{DictError, Dictionary, Interned};
use std::sync::Arc;

proptest! {
    #[test]
    fn prop_refcount_matches_handles(
        keys in 1usize..=6,
        ops in proptest::collection::vec((0u8..=5u8, 0usize..100usize), 1..150),
    ) {
        let dict = Dictionary::builder().initial_capacity(8).build().unwrap();
        let mut live: Vec<Vec<Interned>> = (0..keys).map(|_| Vec::new()).collect();

        for (op, raw_k) in ops {
            let k = raw_k % keys;
            let key = format!("k{}", k);
            match op {
                0 => live[k].push(dict.insert(&key, 0).unwrap()),
                // Explicit length over a longer buffer.
                1 => {
                    let padded = format!("{key}-suffix");
                    live[k].push(dict.insert(&padded, key.len()).unwrap());
                }
                2 => live[k].push(dict.insert_zero_copy(Arc::from(key.as_str())).unwrap()),
                3 => {
                    if let Some(h) = live[k].pop() {
                        dict.remove(&h).unwrap();
                    } else {
                        prop_assert_eq!(dict.remove(&key), Err(DictError::NotFound));
                    }
                }
                4 => {
                    while let Some(h) = live[k].pop() {
                        dict.remove(&h).unwrap();
                    }
                }
                5 => {
                    let len_before = dict.len();
                    prop_assert_eq!(dict.remove("never-inserted"), Err(DictError::NotFound));
                    prop_assert_eq!(dict.len(), len_before);
                }
                _ => unreachable!(),
            }

            let expected = if live[k].is_empty() { None } else { Some(live[k].len() as u32) };
            prop_assert_eq!(dict.refcount(&key), expected);
            if let Some(first) = live[k].first() {
                prop_assert!(live[k].iter().all(|h| h.ptr_eq(first)));
                prop_assert_eq!(first.as_str(), key.as_str());
            }
        }

        let expected_len = live.iter().filter(|v| !v.is_empty()).count();
        prop_assert_eq!(dict.len(), expected_len);

        for v in &mut live {
            while let Some(h) = v.pop() {
                dict.remove(&h).unwrap();
            }
        }
        prop_assert!(dict.is_empty());
        prop_assert_eq!(dict.clean(), 0);
    }
}
