use proptest::prelude::*;

use parking_lot::Mutex;
use std::collections::BTreeMap;

use crate::tree::KeyTree;
use crate::{default_partition, Config, MapReduce};

fn key_strategy() -> impl Strategy<Value = String> + Clone {
    // Short keys over a small alphabet force duplicates, frequent-node
    // churn, and every tree shape the insert rule can produce.
    "[a-d]{1,3}"
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_tree_drains_like_btreemap(keys in prop::collection::vec(key_strategy(), 0..=200)) {
        let mut tree = KeyTree::new();
        let mut model: BTreeMap<String, u64> = BTreeMap::new();

        for key in &keys {
            tree.insert(key);
            *model.entry(key.clone()).or_insert(0) += 1;
        }
        prop_assert_eq!(tree.len(), model.len());

        // Drain in delivery order, checking structure before and after
        // every removal; each exhausted pull must leave the tree untouched.
        tree.reset_cursor();
        let mut drained: Vec<(String, u64)> = Vec::new();
        while let Some(key) = tree.cursor_key().map(String::from) {
            tree.validate();
            let mut pulls = 0u64;
            while tree.pull(&key) {
                pulls += 1;
            }
            tree.validate();
            prop_assert!(!tree.pull(&key), "exhausted key must stay exhausted");
            drained.push((key, pulls));
        }

        prop_assert!(tree.is_empty());
        let expected: Vec<(String, u64)> = model.into_iter().collect();
        prop_assert_eq!(drained, expected);
    }

    #[test]
    fn prop_engine_matches_serial_count(
        docs in prop::collection::vec(
            prop::collection::vec(key_strategy(), 0..=15),
            0..=8,
        ),
        partitions in 1usize..=5,
        mappers in 1usize..=4,
        reducers in 1usize..=3,
    ) {
        let inputs: Vec<String> = docs.iter().map(|doc| doc.join(" ")).collect();

        let mut expected: BTreeMap<String, u64> = BTreeMap::new();
        for doc in &docs {
            for key in doc {
                *expected.entry(key.clone()).or_insert(0) += 1;
            }
        }

        // Delivery log per partition, in arrival order.
        let delivered: Mutex<Vec<(usize, String, u64)>> = Mutex::new(Vec::new());
        let engine = MapReduce::new(Config { partitions, mappers, reducers });
        engine
            .run(
                &inputs,
                |emitter, doc| {
                    for word in doc.split_whitespace() {
                        emitter.emit(word, "1");
                    }
                },
                |key, puller| {
                    let mut n = 0u64;
                    while puller.pull(key) {
                        n += 1;
                    }
                    delivered.lock().push((puller.partition(), key.to_string(), n));
                },
            )
            .unwrap();
        let delivered = delivered.into_inner();

        // Counts match the serial reference exactly.
        let mut got: BTreeMap<String, u64> = BTreeMap::new();
        for (_, key, n) in &delivered {
            prop_assert!(got.insert(key.clone(), *n).is_none(), "duplicate delivery of {}", key);
        }
        prop_assert_eq!(&got, &expected);

        // Every key went to the partition the partitioner chose, and each
        // partition's delivery order is strictly ascending.
        let mut per_partition: Vec<Vec<&str>> = vec![Vec::new(); partitions];
        for (partition, key, _) in &delivered {
            prop_assert_eq!(*partition, default_partition(key, partitions));
            per_partition[*partition].push(key);
        }
        for keys in &per_partition {
            prop_assert!(
                keys.windows(2).all(|pair| pair[0] < pair[1]),
                "partition delivery order not strictly ascending: {:?}",
                keys
            );
        }
    }
}
