use serde::{Deserialize, Serialize};
use tempfile::tempdir;

use super::{DocumentStore, SharedStore};

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct Item {
    name: String,
    qty: u32,
}

fn item(name: &str, qty: u32) -> Item {
    Item {
        name: name.to_string(),
        qty,
    }
}

#[test]
fn test_insert_get_remove() {
    let store = DocumentStore::temporary().unwrap();

    store.insert("items", "a", &item("bolt", 3)).unwrap();
    store.insert("items", "b", &item("nut", 9)).unwrap();
    assert_eq!(store.count("items").unwrap(), 2);
    assert_eq!(store.get::<Item>("items", "a").unwrap(), Some(item("bolt", 3)));

    assert!(store.remove("items", "a").unwrap());
    assert!(!store.remove("items", "a").unwrap());
    assert_eq!(store.get::<Item>("items", "a").unwrap(), None);
    assert_eq!(store.count("items").unwrap(), 1);
}

#[test]
fn test_collections_are_isolated() {
    let store = DocumentStore::temporary().unwrap();

    store.insert("items", "a", &item("bolt", 3)).unwrap();
    assert_eq!(store.get::<Item>("orders", "a").unwrap(), None);
    assert_eq!(store.count("orders").unwrap(), 0);
}

#[test]
fn test_decoding_into_wrong_shape_fails() {
    let store = DocumentStore::temporary().unwrap();

    store.insert("items", "a", &"just a string").unwrap();
    assert!(store.get::<Item>("items", "a").is_err());
}

#[tokio::test]
async fn test_documents_survive_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("db");

    {
        let store = DocumentStore::open(&path).await.unwrap();
        store.insert("items", "a", &item("bolt", 3)).unwrap();
        store.flush().await.unwrap();
    }

    let store = DocumentStore::open(&path).await.unwrap();
    assert_eq!(store.get::<Item>("items", "a").unwrap(), Some(item("bolt", 3)));
}

#[tokio::test]
async fn test_shared_store_connects() {
    let shared = SharedStore::new();
    assert!(!shared.is_connected());

    shared.connect("memory://").await.unwrap();
    let store = shared.clone().handle().unwrap();
    store.insert("items", "x", &item("gear", 1)).unwrap();

    assert_eq!(
        shared.handle().unwrap().get::<Item>("items", "x").unwrap(),
        Some(item("gear", 1))
    );
}
