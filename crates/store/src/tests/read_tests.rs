use crate::*;
use tempfile::tempdir;

// --------------------- get ---------------------

#[test]
fn get_missing_key_fails_with_not_found() {
    let dir = tempdir().unwrap();
    let store = Store::new(dir.path(), "t").unwrap();

    assert!(matches!(store.get("nope"), Err(StoreError::NotFound)));
}

#[test]
fn get_does_not_disturb_neighbours() {
    let dir = tempdir().unwrap();
    let store = Store::new(dir.path(), "t").unwrap();

    store.put("a", "1").unwrap();
    store.put("b", "2").unwrap();
    store.put("c", "3").unwrap();
    store.delete("b").unwrap();

    assert_eq!(store.get("a").unwrap(), "1");
    assert!(matches!(store.get("b"), Err(StoreError::NotFound)));
    assert_eq!(store.get("c").unwrap(), "3");
}

// --------------------- list_keys ---------------------

#[test]
fn list_keys_is_sorted_and_live_only() {
    let dir = tempdir().unwrap();
    let store = Store::new(dir.path(), "t").unwrap();

    store.put("cherry", "3").unwrap();
    store.put("apple", "1").unwrap();
    store.put("banana", "2").unwrap();
    store.delete("banana").unwrap();

    assert_eq!(store.list_keys().unwrap(), vec!["apple", "cherry"]);
}

#[test]
fn list_keys_on_empty_store_is_empty() {
    let dir = tempdir().unwrap();
    let store = Store::new(dir.path(), "t").unwrap();
    assert!(store.list_keys().unwrap().is_empty());
}

// --------------------- fold ---------------------

#[test]
fn fold_visits_every_live_pair_in_order() {
    let dir = tempdir().unwrap();
    let store = Store::new(dir.path(), "t").unwrap();

    store.put("a", "1").unwrap();
    store.put("b", "2").unwrap();
    store.put("c", "3").unwrap();
    store.delete("b").unwrap();

    let joined = store
        .fold(
            |key, value, mut acc: String| {
                acc.push_str(key);
                acc.push('=');
                acc.push_str(value);
                acc.push(';');
                acc
            },
            String::new(),
        )
        .unwrap();

    assert_eq!(joined, "a=1;c=3;");
}

#[test]
fn fold_counts_entries() {
    let dir = tempdir().unwrap();
    let store = Store::new(dir.path(), "t").unwrap();

    for i in 0..50 {
        store.put(&format!("k{}", i), "v").unwrap();
    }

    let count = store.fold(|_, _, acc: u64| acc + 1, 0).unwrap();
    assert_eq!(count, 50);
}

// --------------------- merge (reserved) ---------------------

#[test]
fn merge_is_a_noop() {
    let dir = tempdir().unwrap();
    let store = Store::new(dir.path(), "t").unwrap();

    store.put("k", "v").unwrap();
    store.merge().unwrap();
    assert_eq!(store.get("k").unwrap(), "v");
    assert_eq!(store.segment_count(), 1);
}
