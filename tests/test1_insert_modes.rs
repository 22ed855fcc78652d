use std::sync::Arc;

use sql_databackend::prelude::*;

fn doc(id: i64, body: &str) -> Document {
    let mut d = Document::new();
    d.set("id", CellValue::Int(id));
    d.set("body", CellValue::Text(body.to_string()));
    d
}

fn mapping() -> Vec<(String, ColumnType)> {
    vec![
        ("id".to_string(), ColumnType::Int64),
        ("body".to_string(), ColumnType::String),
    ]
}

#[tokio::test]
async fn normal_mode_appends_rows() {
    let engine = Arc::new(MemoryEngine::new("db"));
    let backend = SqlDataBackend::new(engine.clone(), "test");

    backend
        .create_table_and_schema("docs", mapping())
        .await
        .unwrap();
    backend
        .insert("docs", vec![doc(1, "a"), doc(2, "b")])
        .await
        .unwrap();
    assert_eq!(engine.row_count("docs").unwrap(), 2);

    backend.insert("docs", vec![doc(3, "c")]).await.unwrap();
    assert_eq!(engine.row_count("docs").unwrap(), 3);

    let rows = backend.fetch("docs").await.unwrap();
    assert_eq!(rows[2].get("body"), Some(&CellValue::Text("c".to_string())));
}

#[tokio::test]
async fn empty_batch_is_a_no_op() {
    let engine = Arc::new(MemoryEngine::new("db"));
    let backend = SqlDataBackend::new(engine.clone(), "test");

    backend
        .create_table_and_schema("docs", mapping())
        .await
        .unwrap();
    backend.insert("docs", vec![]).await.unwrap();
    assert_eq!(engine.row_count("docs").unwrap(), 0);
}

#[tokio::test]
async fn insert_into_missing_table_propagates() {
    let engine = Arc::new(MemoryEngine::new("db"));
    let backend = SqlDataBackend::new(engine, "test");

    let err = backend.insert("missing", vec![doc(1, "a")]).await.unwrap_err();
    assert!(matches!(err, DataBackendError::TableNotFound(_)));
}

#[tokio::test]
async fn in_memory_mode_materializes_and_replaces() {
    let engine = Arc::new(MemoryEngine::new("db"));
    let backend = SqlDataBackend::with_mode(engine.clone(), "test", true);
    assert!(backend.in_memory());

    // No table up front; the insert itself materializes it.
    backend
        .insert("docs", vec![doc(1, "a"), doc(2, "b")])
        .await
        .unwrap();
    assert_eq!(engine.row_count("docs").unwrap(), 2);

    // A second insert replaces the table rather than appending.
    backend.insert("docs", vec![doc(9, "z")]).await.unwrap();
    assert_eq!(engine.row_count("docs").unwrap(), 1);
    let rows = backend.fetch("docs").await.unwrap();
    assert_eq!(rows[0].get("id"), Some(&CellValue::Int(9)));
}

#[tokio::test]
async fn dialect_conversion_applies_on_the_way_in_and_out() {
    let engine = Arc::new(MemoryEngine::with_dialect("db", "clickhouse"));
    let backend = SqlDataBackend::with_mode(engine.clone(), "test", true);
    assert_eq!(backend.dialect(), "clickhouse");

    let mut row = Document::new();
    row.set("id", CellValue::Int(1));
    row.set("payload", CellValue::Bytes(b"raw-bytes".to_vec()));
    backend.insert("docs", vec![row]).await.unwrap();

    // The helper rewrote the table name and encoded the binary value.
    assert!(engine.table_exists("`docs`").await.unwrap());
    assert!(!engine.table_exists("docs").await.unwrap());

    let stored = engine.fetch_all("`docs`").await.unwrap();
    let CellValue::Text(text) = stored[0].get("payload").unwrap() else {
        panic!("payload should be stored as text");
    };
    assert!(text.starts_with(BASE64_PREFIX));

    // Reading through the backend undoes the encoding.
    let recovered = backend.fetch("`docs`").await.unwrap();
    assert_eq!(
        recovered[0].get("payload"),
        Some(&CellValue::Bytes(b"raw-bytes".to_vec()))
    );
}

#[tokio::test]
async fn url_combines_engine_url_and_name() {
    let engine = Arc::new(MemoryEngine::new("db"));
    let backend = SqlDataBackend::new(engine, "test");
    assert_eq!(backend.url(), "memory://db/test");
}
