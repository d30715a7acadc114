//! Radix Trie Equivalence - the trie must behave exactly like a `BTreeMap`.
//!
//! Random operation sequences are applied to both maps and every
//! query is compared, along with the trie's structural check.

use exchange_book::radix_trie::{NodeKind, RadixTrie};
use exchange_book::Direction;
use proptest::prelude::*;
use rand::prelude::*;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;
use std::ops::ControlFlow;

#[derive(Clone, Debug)]
enum Op {
    Insert(u64, u32),
    Remove(u64),
    Query(u64),
}

/// Keys clustered so that prefixes are shared, plus a few wild ones.
fn key_strategy() -> impl Strategy<Value = u64> {
    prop_oneof![
        4 => 0u64..512,
        3 => (0u64..4096).prop_map(|k| 0x0001_0000_0000 + k * 37),
        1 => any::<u64>(),
        1 => prop_oneof![Just(0u64), Just(u64::MAX), Just(u64::MAX - 1), Just(1u64 << 63)],
    ]
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        5 => (key_strategy(), any::<u32>()).prop_map(|(k, v)| Op::Insert(k, v)),
        3 => key_strategy().prop_map(Op::Remove),
        2 => key_strategy().prop_map(Op::Query),
    ]
}

fn check_queries(trie: &RadixTrie<u32>, reference: &BTreeMap<u64, u32>, key: u64) {
    let expect = |e: Option<(&u64, &u32)>| e.map(|(k, v)| (*k, *v));
    let got = |g: Option<(u64, &u32)>| g.map(|(k, v)| (k, *v));

    assert_eq!(trie.get(key), reference.get(&key));
    assert_eq!(got(trie.ceiling(key)), expect(reference.range(key..).next()));
    assert_eq!(got(trie.floor(key)), expect(reference.range(..=key).next_back()));
    assert_eq!(
        got(trie.higher(key)),
        key.checked_add(1).and_then(|k| expect(reference.range(k..).next()))
    );
    assert_eq!(
        got(trie.lower(key)),
        key.checked_sub(1).and_then(|k| expect(reference.range(..=k).next_back()))
    );
}

fn check_whole(trie: &RadixTrie<u32>, reference: &BTreeMap<u64, u32>) {
    trie.validate().unwrap();
    assert_eq!(trie.len(), reference.len());
    assert_eq!(trie.is_empty(), reference.is_empty());
    assert_eq!(trie.first().map(|(k, v)| (k, *v)), reference.iter().next().map(|(k, v)| (*k, *v)));
    assert_eq!(trie.last().map(|(k, v)| (k, *v)), reference.iter().next_back().map(|(k, v)| (*k, *v)));

    let expected: Vec<(u64, u32)> = reference.iter().map(|(k, v)| (*k, *v)).collect();
    assert_eq!(trie.entries(), expected);

    let mut descending = Vec::new();
    let _ = trie.for_each(Direction::Descending, &mut |k, v| {
        descending.push((k, *v));
        ControlFlow::Continue(())
    });
    descending.reverse();
    assert_eq!(descending, expected);
}

proptest! {
    #[test]
    fn prop_matches_btree_map(ops in prop::collection::vec(op_strategy(), 1..400)) {
        let mut trie = RadixTrie::new();
        let mut reference = BTreeMap::new();

        for op in ops {
            match op {
                Op::Insert(k, v) => prop_assert_eq!(trie.insert(k, v), reference.insert(k, v)),
                Op::Remove(k) => prop_assert_eq!(trie.remove(k), reference.remove(&k)),
                Op::Query(k) => check_queries(&trie, &reference, k),
            }
        }
        check_whole(&trie, &reference);
    }

    #[test]
    fn prop_insert_then_remove_all_leaves_empty(keys in prop::collection::btree_set(key_strategy(), 1..300)) {
        let mut trie = RadixTrie::new();
        for (i, key) in keys.iter().enumerate() {
            prop_assert_eq!(trie.insert(*key, i as u32), None);
        }
        prop_assert_eq!(trie.len(), keys.len());

        for key in &keys {
            prop_assert!(trie.remove(*key).is_some());
            prop_assert!(trie.get(*key).is_none());
        }
        prop_assert!(trie.is_empty());
        prop_assert_eq!(trie.root_kind(), None);
        trie.validate().unwrap();
    }
}

#[test]
fn test_seeded_churn_dense_band() {
    let mut rng = ChaCha8Rng::seed_from_u64(0x0A27);
    let mut trie = RadixTrie::new();
    let mut reference = BTreeMap::new();

    // Dense band so nodes grow to full width and shrink back
    for round in 0..200_000u32 {
        let key = 1_000_000 + rng.gen_range(0..2_000u64);
        if rng.gen_bool(0.55) {
            assert_eq!(trie.insert(key, round), reference.insert(key, round));
        } else {
            assert_eq!(trie.remove(key), reference.remove(&key));
        }
        if round % 10_000 == 0 {
            check_queries(&trie, &reference, key);
            check_whole(&trie, &reference);
        }
    }
    check_whole(&trie, &reference);
}

#[test]
fn test_root_grows_through_every_node_kind() {
    let mut trie = RadixTrie::new();
    let mut kinds = Vec::new();

    // Keys differing only in the lowest byte share one inner root
    for byte in 0..256u64 {
        trie.insert(0xAB00 + byte, byte);
        if let Some(kind) = trie.root_kind() {
            if kinds.last() != Some(&kind) {
                kinds.push(kind);
            }
        }
    }
    assert_eq!(
        kinds,
        vec![NodeKind::Leaf, NodeKind::Node4, NodeKind::Node16, NodeKind::Node48, NodeKind::Node256]
    );

    for byte in 0..255u64 {
        trie.remove(0xAB00 + byte);
        trie.validate().unwrap();
    }
    assert_eq!(trie.root_kind(), Some(NodeKind::Leaf));
    assert_eq!(trie.first(), Some((0xABFF, &255)));
}
