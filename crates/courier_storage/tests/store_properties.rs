//! Model-based tests: both stores must behave like a plain FIFO.

use courier_storage::{ElementStore, FileElementStore, InMemoryStore, StoreOptions};
use proptest::prelude::*;
use std::collections::VecDeque;
use tempfile::tempdir;

#[derive(Debug, Clone)]
enum Op {
    Add(Vec<u8>),
    Remove(u64),
    Clear,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        6 => prop::collection::vec(any::<u8>(), 1..200).prop_map(Op::Add),
        3 => (0u64..6).prop_map(Op::Remove),
        1 => Just(Op::Clear),
    ]
}

fn apply(store: &dyn ElementStore, model: &mut VecDeque<Vec<u8>>, op: &Op) {
    match op {
        Op::Add(data) => {
            store.add(data).unwrap();
            model.push_back(data.clone());
        }
        Op::Remove(n) => {
            store.remove(*n).unwrap();
            let amount = (*n as usize).min(model.len());
            model.drain(..amount);
        }
        Op::Clear => {
            store.clear().unwrap();
            model.clear();
        }
    }
}

fn assert_matches(store: &dyn ElementStore, model: &VecDeque<Vec<u8>>) {
    assert_eq!(store.size(), model.len() as u64);
    assert_eq!(store.peek().unwrap(), model.front().cloned());
    let expected: Vec<_> = model.iter().cloned().collect();
    assert_eq!(store.iter().collect::<Vec<_>>(), expected);
    assert_eq!(store.peek_many(u64::MAX).unwrap(), expected);
}

fn fast_options() -> StoreOptions {
    // Low threshold so random runs cross the compaction path.
    StoreOptions::new().shrink_threshold(2_048).sync_writes(false)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn file_store_matches_fifo_model(ops in prop::collection::vec(op_strategy(), 1..80)) {
        let dir = tempdir().unwrap();
        let store = FileElementStore::open(&dir.path().join("queue"), fast_options()).unwrap();
        let mut model = VecDeque::new();

        for op in &ops {
            apply(&store, &mut model, op);
            assert_matches(&store, &model);
        }
    }

    #[test]
    fn memory_store_matches_fifo_model(ops in prop::collection::vec(op_strategy(), 1..80)) {
        let store = InMemoryStore::new();
        let mut model = VecDeque::new();

        for op in &ops {
            apply(&store, &mut model, op);
        }
        assert_matches(&store, &model);
    }

    #[test]
    fn file_store_survives_reopen(ops in prop::collection::vec(op_strategy(), 1..60)) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("queue");
        let mut model = VecDeque::new();

        {
            let store = FileElementStore::open(&path, fast_options()).unwrap();
            for op in &ops {
                apply(&store, &mut model, op);
            }
        }

        let store = FileElementStore::open(&path, fast_options()).unwrap();
        assert_matches(&store, &model);
        prop_assert!(store.verify().unwrap().is_ok());
    }

    #[test]
    fn peek_many_is_bounded_by_size(count in 0usize..30, max in 0u64..50) {
        let dir = tempdir().unwrap();
        let store = FileElementStore::open(&dir.path().join("queue"), fast_options()).unwrap();
        for i in 0..count {
            store.add(format!("record-{i}").as_bytes()).unwrap();
        }

        let peeked = store.peek_many(max).unwrap();
        prop_assert_eq!(peeked.len() as u64, max.min(count as u64));
        prop_assert_eq!(store.size(), count as u64);
    }
}

#[test]
fn file_store_many_records_round_trip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("queue");
    let options = StoreOptions::new().sync_writes(false);

    {
        let store = FileElementStore::open(&path, options.clone()).unwrap();
        for i in 0..500u32 {
            store.add(&i.to_le_bytes()).unwrap();
        }
        store.remove(150).unwrap();
    }

    let store = FileElementStore::open(&path, options).unwrap();
    assert_eq!(store.size(), 350);
    let first = store.peek().unwrap().unwrap();
    assert_eq!(u32::from_le_bytes(first.try_into().unwrap()), 150);

    let all: Vec<u32> = store
        .iter()
        .map(|bytes| u32::from_le_bytes(bytes.try_into().unwrap()))
        .collect();
    assert_eq!(all, (150..500).collect::<Vec<_>>());
}

#[test]
fn file_store_shared_across_threads() {
    use std::sync::Arc;
    use std::thread;

    let dir = tempdir().unwrap();
    let store = Arc::new(
        FileElementStore::open(&dir.path().join("queue"), StoreOptions::new().sync_writes(false))
            .unwrap(),
    );

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for i in 0..50 {
                    store.add(format!("{t}-{i}").as_bytes()).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(store.size(), 200);
    assert!(store.verify().unwrap().is_ok());

    // Per-thread order is preserved.
    for t in 0..4 {
        let prefix = format!("{t}-");
        let seen: Vec<u32> = store
            .iter()
            .map(|bytes| String::from_utf8(bytes).unwrap())
            .filter_map(|s| s.strip_prefix(&prefix).map(|n| n.parse().unwrap()))
            .collect();
        assert_eq!(seen, (0..50).collect::<Vec<_>>());
    }
}
