//! End-to-end lifecycle tests driving the store the way the shell does.

use store::{Store, StoreError, INDEX_FILE_NAME};
use tempfile::tempdir;

#[test]
fn full_lifecycle_put_get_delete_sync_close_load() {
    let dir = tempdir().unwrap();

    {
        let store = Store::new(dir.path(), "shell").unwrap();
        store.put("user:1", "alice").unwrap();
        store.put("user:2", "bob").unwrap();
        store.put("user:1", "alice-v2").unwrap();
        store.delete("user:2").unwrap();
        store.sync().unwrap();

        assert_eq!(store.get("user:1").unwrap(), "alice-v2");
        assert!(matches!(store.get("user:2"), Err(StoreError::NotFound)));
        assert_eq!(store.list_keys().unwrap(), vec!["user:1"]);
        store.close().unwrap();
    }

    assert!(dir.path().join("shell").join(INDEX_FILE_NAME).exists());

    let store = Store::load(dir.path(), "shell").unwrap();
    assert_eq!(store.get("user:1").unwrap(), "alice-v2");
    assert!(matches!(store.get("user:2"), Err(StoreError::NotFound)));
    assert_eq!(store.key_count(), 1);
}

#[test]
fn two_stores_in_one_process_do_not_interfere() {
    let dir = tempdir().unwrap();

    let a = Store::new(dir.path(), "a").unwrap();
    let b = Store::new(dir.path(), "b").unwrap();

    a.put("k", "from-a").unwrap();
    b.put("k", "from-b").unwrap();

    assert_eq!(a.get("k").unwrap(), "from-a");
    assert_eq!(b.get("k").unwrap(), "from-b");

    a.delete("k").unwrap();
    assert!(matches!(a.get("k"), Err(StoreError::NotFound)));
    assert_eq!(b.get("k").unwrap(), "from-b");
}

#[test]
fn fold_accumulates_like_the_shell_stats() {
    let dir = tempdir().unwrap();
    let store = Store::new(dir.path(), "shell").unwrap();

    store.put("a", "1").unwrap();
    store.put("b", "22").unwrap();
    store.put("c", "333").unwrap();

    let total_value_bytes = store.fold(|_, value, acc: usize| acc + value.len(), 0).unwrap();
    assert_eq!(total_value_bytes, 6);
}
