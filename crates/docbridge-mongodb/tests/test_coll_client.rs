//! Integration tests for collection client operations.
//!
//! These tests require a MongoDB server to be running.
//! Set MONGODB_URI (defaults to mongodb://localhost:27017/docbridge_test) and
//! run with `--ignored`.

use bson::{doc, oid::ObjectId};
use docbridge_mongodb::{
    BulkUpdate, CollClient, DbClient, DocumentShape, Fields, FindAndModifyOptions,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
struct Product {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    id: Option<ObjectId>,
    sku: String,
    #[serde(default)]
    price: i32,
    #[serde(default)]
    stock: i32,
}

impl DocumentShape for Product {
    const FIELDS: &'static [&'static str] = &["_id", "sku", "price", "stock"];
}

fn product(sku: &str, price: i32) -> Product {
    Product {
        id: None,
        sku: sku.to_string(),
        price,
        stock: 0,
    }
}

fn db_client() -> DbClient {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let uri = std::env::var("MONGODB_URI")
        .unwrap_or_else(|_| "mongodb://localhost:27017/docbridge_test".to_string());
    DbClient::new(uri)
}

// Each test works on its own collection and starts from an empty one
async fn fresh_collection(db: &DbClient, name: &str) -> CollClient<Product> {
    let client = db.get_coll_client(name, Fields::all_of::<Product>());
    client.handle().await.unwrap().drop().await.unwrap();
    client
}

#[tokio::test]
#[ignore] // Only run with --ignored flag when database is available
async fn test_count_tracks_inserts() {
    let db = db_client();
    let products = fresh_collection(&db, "count_tracks_inserts").await;

    assert_eq!(products.count(Some(doc! {})).await.unwrap(), 0);

    for sku in ["a", "b", "c", "d"] {
        products.create_one(&product(sku, 1)).await.unwrap();
    }

    assert_eq!(products.count(None).await.unwrap(), 4);
    assert_eq!(products.count(Some(doc! { "sku": "b" })).await.unwrap(), 1);
}

#[tokio::test]
#[ignore]
async fn test_create_one_round_trip() {
    let db = db_client();
    let products = fresh_collection(&db, "create_one_round_trip").await;

    let item = product("round-trip", 250);
    let id = products.create_one(&item).await.unwrap();

    let found = products
        .get_one(doc! { "_id": id.clone() }, None)
        .await
        .unwrap()
        .expect("inserted document should be found");

    assert_eq!(Some(found.id.unwrap()), id.as_object_id());
    assert_eq!(found.sku, item.sku);
    assert_eq!(found.price, item.price);
}

#[tokio::test]
#[ignore]
async fn test_get_one_missing_returns_none() {
    let db = db_client();
    let products = fresh_collection(&db, "get_one_missing").await;

    let found = products.get_one(doc! { "sku": "nope" }, None).await.unwrap();
    assert!(found.is_none());
}

#[tokio::test]
#[ignore]
async fn test_get_one_applies_explicit_projection() {
    let db = db_client();
    let products = fresh_collection(&db, "get_one_projection").await;
    products.create_one(&product("projected", 99)).await.unwrap();

    let fields = Fields::typed::<Product>(&["sku"]).unwrap();
    let found = products
        .get_one(doc! { "sku": "projected" }, Some(&fields))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(found.sku, "projected");
    assert_eq!(found.price, 0);
}

#[tokio::test]
#[ignore]
async fn test_bulk_insert_returns_ids_in_input_order() {
    let db = db_client();
    let products = fresh_collection(&db, "bulk_insert_order").await;

    let items = vec![product("first", 1), product("second", 2), product("third", 3)];
    let before = products.count(None).await.unwrap();

    let ids = products.bulk_insert(&items).await.unwrap();
    assert_eq!(ids.len(), 3);
    assert_eq!(products.count(None).await.unwrap(), before + 3);

    for (id, item) in ids.iter().zip(&items) {
        let found = products.get_one(doc! { "_id": id.clone() }, None).await.unwrap().unwrap();
        assert_eq!(found.sku, item.sku);
    }
}

#[tokio::test]
#[ignore]
async fn test_bulk_insert_empty_is_noop() {
    let db = db_client();
    let products = fresh_collection(&db, "bulk_insert_empty").await;

    let ids = products.bulk_insert(&[]).await.unwrap();
    assert!(ids.is_empty());
    assert_eq!(products.count(None).await.unwrap(), 0);
}

#[tokio::test]
#[ignore]
async fn test_get_all_and_get_mul_paging() {
    let db = db_client();
    let products = fresh_collection(&db, "get_mul_paging").await;

    let items: Vec<Product> = (0..10).map(|i| product(&format!("p{}", i), i)).collect();
    products.bulk_insert(&items).await.unwrap();

    let all = products.get_all(doc! {}, None).await.unwrap();
    assert_eq!(all.len(), 10);

    let page = products
        .get_mul(doc! {}, None, Some(doc! { "price": 1 }), 3, 4)
        .await
        .unwrap();
    let prices: Vec<i32> = page.iter().map(|p| p.price).collect();
    assert_eq!(prices, vec![3, 4, 5, 6]);

    let tail = products
        .get_mul(doc! {}, None, Some(doc! { "price": -1 }), 8, 5)
        .await
        .unwrap();
    let prices: Vec<i32> = tail.iter().map(|p| p.price).collect();
    assert_eq!(prices, vec![1, 0]);

    let empty = products.get_mul(doc! {}, None, None, 0, 0).await.unwrap();
    assert!(empty.is_empty());
}

#[tokio::test]
#[ignore]
async fn test_update_all_without_match_creates_nothing() {
    let db = db_client();
    let products = fresh_collection(&db, "update_all_no_match").await;
    products.create_one(&product("kept", 5)).await.unwrap();

    let modified = products
        .update_all(doc! { "sku": "ghost" }, doc! { "$set": { "price": 1 } }, false)
        .await
        .unwrap();

    assert_eq!(modified, 0);
    assert_eq!(products.count(None).await.unwrap(), 1);
}

#[tokio::test]
#[ignore]
async fn test_update_all_modifies_every_match() {
    let db = db_client();
    let products = fresh_collection(&db, "update_all_matches").await;
    products
        .bulk_insert(&[product("x", 1), product("y", 1), product("z", 2)])
        .await
        .unwrap();

    let modified = products
        .update_all(doc! { "price": 1 }, doc! { "$inc": { "stock": 10 } }, false)
        .await
        .unwrap();
    assert_eq!(modified, 2);

    let upserted = products
        .update_all(doc! { "sku": "new" }, doc! { "$set": { "price": 7 } }, true)
        .await
        .unwrap();
    assert_eq!(upserted, 0);
    assert_eq!(products.count(Some(doc! { "sku": "new" })).await.unwrap(), 1);
}

#[tokio::test]
#[ignore]
async fn test_bulk_update_with_and_without_upsert() {
    let db = db_client();
    let products = fresh_collection(&db, "bulk_update").await;
    products.bulk_insert(&[product("a", 1), product("b", 2)]).await.unwrap();

    let updates = vec![
        BulkUpdate::new(doc! { "sku": "a" }, doc! { "$set": { "stock": 3 } }),
        BulkUpdate::new(doc! { "sku": "missing" }, doc! { "$set": { "stock": 4 } }),
    ];
    products.bulk_update(updates.clone(), false).await.unwrap();

    let a = products.get_one(doc! { "sku": "a" }, None).await.unwrap().unwrap();
    assert_eq!(a.stock, 3);
    assert_eq!(products.count(None).await.unwrap(), 2);

    products.bulk_update(updates, true).await.unwrap();
    assert_eq!(products.count(None).await.unwrap(), 3);
}

#[tokio::test]
#[ignore]
async fn test_bulk_update_surfaces_driver_failure() {
    let db = db_client();
    let products = fresh_collection(&db, "bulk_update_failure").await;
    products.create_one(&product("a", 1)).await.unwrap();

    let updates = vec![BulkUpdate::new(doc! { "sku": "a" }, doc! { "$bogus": { "stock": 1 } })];
    let err = products.bulk_update(updates, false).await.unwrap_err();
    assert!(err.is_driver_error());
}

#[tokio::test]
#[ignore]
async fn test_bulk_update_applies_remaining_pairs_after_a_failure() {
    let db = db_client();
    let products = fresh_collection(&db, "bulk_update_partial_failure").await;

    let items: Vec<Product> = (0..20).map(|i| product(&format!("s{}", i), i)).collect();
    products.bulk_insert(&items).await.unwrap();

    let mut updates = vec![BulkUpdate::new(
        doc! { "sku": "s0" },
        doc! { "$bogus": { "stock": 1 } },
    )];
    updates.extend(
        (1..20).map(|i| BulkUpdate::new(doc! { "sku": format!("s{}", i) }, doc! { "$set": { "stock": 9 } })),
    );

    let err = products.bulk_update(updates, false).await.unwrap_err();
    assert!(err.is_driver_error());

    assert_eq!(products.count(Some(doc! { "stock": 9 })).await.unwrap(), 19);
    let untouched = products.get_one(doc! { "sku": "s0" }, None).await.unwrap().unwrap();
    assert_eq!(untouched.stock, 0);
}

#[tokio::test]
#[ignore]
async fn test_find_and_modify_returns_old_or_new() {
    let db = db_client();
    let products = fresh_collection(&db, "find_and_modify").await;
    products.create_one(&product("fm", 10)).await.unwrap();

    let before = products
        .find_and_modify(
            doc! { "sku": "fm" },
            doc! { "$inc": { "price": 1 } },
            FindAndModifyOptions::default(),
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(before.price, 10);

    let after = products
        .find_and_modify(
            doc! { "sku": "fm" },
            doc! { "$inc": { "price": 1 } },
            FindAndModifyOptions {
                return_new: true,
                ..FindAndModifyOptions::default()
            },
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(after.price, 12);
}

#[tokio::test]
#[ignore]
async fn test_find_and_modify_upsert_creates_document() {
    let db = db_client();
    let products = fresh_collection(&db, "find_and_modify_upsert").await;

    let created = products
        .find_and_modify(
            doc! { "sku": "fresh" },
            doc! { "$set": { "price": 42 } },
            FindAndModifyOptions {
                return_new: true,
                upsert: true,
                ..FindAndModifyOptions::default()
            },
        )
        .await
        .unwrap()
        .expect("upsert should return the created document");

    assert_eq!(created.sku, "fresh");
    assert_eq!(created.price, 42);
    assert_eq!(products.count(None).await.unwrap(), 1);
}

#[tokio::test]
#[ignore]
async fn test_collection_clients_share_one_connection() {
    let db = db_client();
    let first: CollClient<Product> = db.get_coll_client("shared_a", Fields::new());
    let second: CollClient<Product> = db.get_coll_client("shared_b", Fields::new());

    let (a, b) = tokio::join!(first.count(None), second.count(None));
    a.unwrap();
    b.unwrap();

    db.ping().await.unwrap();
    assert_eq!(db.database().await.unwrap().name(), db.database_name());
}
