//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container for efficiency.
//! Run with:
//!
//! ```bash
//! cargo test -p kv-store --test postgres_integration -- --test-threads=1
//! ```

use std::sync::Arc;

use kv_store::{
    ConditionalOutcome, FieldCheck, KvStore, KvStoreExt, Mutation, PostgresKvStore, Precondition,
};
use serde_json::json;
use serial_test::serial;
use sqlx::PgPool;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

/// Global shared container
static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();
            sqlx::raw_sql(include_str!("../../../migrations/001_create_kv_items.sql"))
                .execute(&temp_pool)
                .await
                .unwrap();
            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh store with its own pool and a cleared table
async fn get_test_store() -> PostgresKvStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(10)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE kv_items")
        .execute(&pool)
        .await
        .unwrap();

    PostgresKvStore::new(pool)
}

fn reserve_condition() -> Precondition {
    Precondition::Exists.and(Precondition::field("available", FieldCheck::GreaterThan(0)))
}

fn release_condition() -> Precondition {
    Precondition::field("available", FieldCheck::LessThanField("capacity".into()))
}

#[tokio::test]
#[serial]
async fn test_put_get_roundtrip() {
    let store = get_test_store().await;

    store
        .put("unit/FL-1", json!({ "id": "FL-1", "available": 3, "capacity": 3 }))
        .await
        .unwrap();

    let item = store.get("unit/FL-1").await.unwrap().unwrap();
    assert_eq!(item.key, "unit/FL-1");
    assert_eq!(item.value["available"], 3);
    assert!(store.get("unit/missing").await.unwrap().is_none());
    assert!(store.exists("unit/FL-1").await.unwrap());
}

#[tokio::test]
#[serial]
async fn test_put_overwrites() {
    let store = get_test_store().await;

    store.put("k", json!({ "v": 1 })).await.unwrap();
    store.put("k", json!({ "v": 2 })).await.unwrap();

    let value: serde_json::Value = store.get_as("k").await.unwrap().unwrap();
    assert_eq!(value["v"], 2);
}

#[tokio::test]
#[serial]
async fn test_conditional_decrement_stops_at_zero() {
    let store = get_test_store().await;
    store
        .put("unit/a", json!({ "available": 1, "capacity": 1 }))
        .await
        .unwrap();

    let first = store
        .conditional_update("unit/a", reserve_condition(), Mutation::increment("available", -1))
        .await
        .unwrap();
    let second = store
        .conditional_update("unit/a", reserve_condition(), Mutation::increment("available", -1))
        .await
        .unwrap();

    assert!(first.is_applied());
    match second {
        ConditionalOutcome::PreconditionFailed { current } => {
            assert_eq!(current.unwrap().value["available"], 0);
        }
        other => panic!("expected precondition failure, got {other:?}"),
    }
}

#[tokio::test]
#[serial]
async fn test_conditional_increment_respects_capacity() {
    let store = get_test_store().await;
    store
        .put("unit/a", json!({ "available": 1, "capacity": 1 }))
        .await
        .unwrap();

    let outcome = store
        .conditional_update("unit/a", release_condition(), Mutation::increment("available", 1))
        .await
        .unwrap();

    assert!(!outcome.is_applied());
}

#[tokio::test]
#[serial]
async fn test_conditional_update_on_missing_key() {
    let store = get_test_store().await;

    let outcome = store
        .conditional_update("unit/none", reserve_condition(), Mutation::increment("available", -1))
        .await
        .unwrap();

    assert_eq!(outcome, ConditionalOutcome::PreconditionFailed { current: None });
}

#[tokio::test]
#[serial]
async fn test_insert_if_absent_only_once() {
    let store = get_test_store().await;

    let first = store
        .conditional_update("booking/1", Precondition::Absent, Mutation::Insert(json!({ "n": 1 })))
        .await
        .unwrap();
    let second = store
        .conditional_update("booking/1", Precondition::Absent, Mutation::Insert(json!({ "n": 2 })))
        .await
        .unwrap();

    assert!(first.is_applied());
    assert!(!second.is_applied());
}

#[tokio::test]
#[serial]
async fn test_concurrent_decrements_never_oversell() {
    let store = get_test_store().await;
    store
        .put("unit/hot", json!({ "available": 5, "capacity": 5 }))
        .await
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..20 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store
                .conditional_update(
                    "unit/hot",
                    reserve_condition(),
                    Mutation::increment("available", -1),
                )
                .await
                .unwrap()
                .is_applied()
        }));
    }

    let mut successes = 0;
    for handle in handles {
        if handle.await.unwrap() {
            successes += 1;
        }
    }

    assert_eq!(successes, 5);
    let item = store.get("unit/hot").await.unwrap().unwrap();
    assert_eq!(item.value["available"], 0);
}

#[tokio::test]
#[serial]
async fn test_scan_prefix() {
    let store = get_test_store().await;

    store.put("booking/b", json!({ "n": 2 })).await.unwrap();
    store.put("booking/a", json!({ "n": 1 })).await.unwrap();
    store.put("unit/a", json!({ "n": 3 })).await.unwrap();

    let items = store.scan_prefix("booking/").await.unwrap();
    let keys: Vec<_> = items.iter().map(|i| i.key.as_str()).collect();
    assert_eq!(keys, vec!["booking/a", "booking/b"]);
}
