use rusqlite::Connection;
use serde_json::json;
use tempfile::TempDir;

use gymsync::{
    core::{db::LocalDb, queue::PendingQueue},
    persist::{LocalStore, PersistError, SCHEMA_VERSION, sqlite::SqliteStore},
    types::{Operation, RecordKey, StoreName},
};

#[test]
fn records_survive_reopen_in_insertion_order() {
    let tmp = TempDir::new().expect("tmp");
    let db_path = tmp.path().join("offline.db");

    let mut store = SqliteStore::open(&db_path).expect("open sqlite");
    store
        .put(StoreName::WorkoutLogs, json!({"id": 9, "log_date": "2024-01-02"}))
        .expect("put");
    store
        .put(StoreName::WorkoutLogs, json!({"id": "temp-1", "log_date": "2024-01-03"}))
        .expect("put");
    store
        .put(StoreName::WorkoutLogs, json!({"id": 9, "log_date": "2024-01-01"}))
        .expect("upsert");
    drop(store);

    let reopened = SqliteStore::open(&db_path).expect("reopen");
    assert_eq!(reopened.upgraded_from(), SCHEMA_VERSION);
    let all = reopened.get_all(StoreName::WorkoutLogs).expect("all");
    assert_eq!(
        all,
        vec![
            json!({"id": 9, "log_date": "2024-01-01"}),
            json!({"id": "temp-1", "log_date": "2024-01-03"}),
        ]
    );
    assert!(reopened.get_all(StoreName::Exercises).expect("empty").is_empty());
}

#[test]
fn keyless_records_get_auto_increment_ids() {
    let mut store = SqliteStore::open_in_memory().expect("open");
    let k1 = store.put(StoreName::Exercises, json!({"name": "Squat"})).expect("put");
    store.put(StoreName::Exercises, json!({"id": 41, "name": "Bench"})).expect("put");
    let k3 = store.put(StoreName::Exercises, json!({"id": null, "name": "Row"})).expect("put");

    assert_eq!(k1, RecordKey::Int(1));
    assert_eq!(k3, RecordKey::Int(42));
    let row = store.get(StoreName::Exercises, &k3).expect("get").expect("row");
    assert_eq!(row["id"], json!(42));

    let err = store.put(StoreName::PendingSync, json!({"store": "exercises"}));
    assert!(matches!(err, Err(PersistError::MissingKey(StoreName::PendingSync))));
}

#[test]
fn integer_and_text_keys_stay_distinct() {
    let mut store = SqliteStore::open_in_memory().expect("open");
    store.put(StoreName::Exercises, json!({"id": 5, "kind": "int"})).expect("put");
    store.put(StoreName::Exercises, json!({"id": "5", "kind": "text"})).expect("put");
    assert_eq!(store.count(StoreName::Exercises).expect("count"), 2);

    let text = store
        .get(StoreName::Exercises, &RecordKey::from("5"))
        .expect("get")
        .expect("row");
    assert_eq!(text["kind"], json!("text"));

    store.delete(StoreName::Exercises, &RecordKey::Int(5)).expect("delete");
    assert_eq!(store.count(StoreName::Exercises).expect("count"), 1);
}

#[test]
fn put_many_rolls_back_on_bad_record() {
    let mut store = SqliteStore::open_in_memory().expect("open");
    store.put(StoreName::PendingSync, json!({"id": "q0"})).expect("put");

    let res = store.put_many(
        StoreName::PendingSync,
        vec![json!({"id": "q1"}), json!({"id": "q2"}), json!("not an object")],
    );
    assert!(res.is_err());
    assert_eq!(store.count(StoreName::PendingSync).expect("count"), 1);

    let keys = store
        .put_many(StoreName::PendingSync, vec![json!({"id": "q1"}), json!({"id": "q2"})])
        .expect("put_many");
    assert_eq!(keys, vec![RecordKey::from("q1"), RecordKey::from("q2")]);
    assert_eq!(store.count(StoreName::PendingSync).expect("count"), 3);
}

#[test]
fn clear_touches_only_one_collection() {
    let mut store = SqliteStore::open_in_memory().expect("open");
    store.put(StoreName::DailyHabits, json!({"id": 1})).expect("put");
    store.put(StoreName::FoodQuality, json!({"id": 1})).expect("put");
    store.clear(StoreName::DailyHabits).expect("clear");
    assert_eq!(store.count(StoreName::DailyHabits).expect("count"), 0);
    assert_eq!(store.count(StoreName::FoodQuality).expect("count"), 1);
}

#[test]
fn upgrade_from_older_schema_keeps_existing_rows() {
    let tmp = TempDir::new().expect("tmp");
    let db_path = tmp.path().join("v1.db");

    {
        let conn = Connection::open(&db_path).expect("open raw");
        conn.execute_batch(
            "CREATE TABLE \"dailyHabits\" (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                rec_key NOT NULL UNIQUE,
                payload TEXT NOT NULL
            );
            INSERT INTO \"dailyHabits\"(rec_key, payload)
                VALUES (3, '{\"id\":3,\"log_date\":\"2023-12-31\"}');
            PRAGMA user_version = 1;",
        )
        .expect("seed v1");
    }

    let mut store = SqliteStore::open(&db_path).expect("upgrade");
    assert_eq!(store.upgraded_from(), 1);
    assert_eq!(
        store.get_all(StoreName::DailyHabits).expect("kept"),
        vec![json!({"id": 3, "log_date": "2023-12-31"})]
    );
    store.put(StoreName::PendingSync, json!({"id": "q"})).expect("new collection usable");

    let conn = Connection::open(&db_path).expect("raw");
    let version: u32 = conn
        .pragma_query_value(None, "user_version", |row| row.get(0))
        .expect("version");
    assert_eq!(version, SCHEMA_VERSION);
}

#[test]
fn newer_schema_is_refused() {
    let tmp = TempDir::new().expect("tmp");
    let db_path = tmp.path().join("future.db");
    {
        let conn = Connection::open(&db_path).expect("open raw");
        conn.pragma_update(None, "user_version", SCHEMA_VERSION + 1)
            .expect("bump");
    }
    let err = SqliteStore::open(&db_path).err().expect("refused");
    assert!(matches!(err, PersistError::SchemaTooNew { .. }));
}

#[tokio::test]
async fn queue_persists_across_lazy_reopen() {
    let tmp = TempDir::new().expect("tmp");
    let db_path = tmp.path().join("queue.db");

    let first = PendingQueue::new(LocalDb::sqlite(&db_path));
    let item = first
        .enqueue(
            StoreName::WorkoutLogs,
            Operation::Create,
            json!({"log_date": "2024-01-15", "day_type": "Upper"}),
        )
        .await
        .expect("enqueue");
    drop(first);

    let second = PendingQueue::new(LocalDb::sqlite(&db_path));
    assert!(!second.db().is_initialized());
    let pending = second.list_pending().await.expect("list");
    assert_eq!(pending, vec![item]);
    assert_eq!(second.refresh_count().await.expect("count"), 1);
}
