#![cfg(all(feature = "postgres", feature = "test-utils"))]

use serde_json::json;
use sql_databackend::prelude::*;
use sql_databackend::test_utils::{setup_postgres_embedded, stop_postgres_embedded};

fn sample_mapping() -> Vec<(String, ColumnType)> {
    vec![
        ("id".to_string(), ColumnType::Int64),
        ("body".to_string(), ColumnType::String),
        ("embedding".to_string(), ColumnType::Bytes),
        ("meta".to_string(), ColumnType::Json),
        ("created".to_string(), ColumnType::Timestamp),
    ]
}

async fn run_backend_suite(
    cfg: deadpool_postgres::Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let backend = SqlDataBackend::connect_postgres(cfg, "databackend").await?;
    assert_eq!(backend.dialect(), "postgres");
    assert!(backend.url().starts_with("postgres://"));
    assert!(backend.url().ends_with("/databackend"));

    create_insert_and_read_back(&backend).await?;
    catalog_lookups(&backend).await?;
    output_destination(&backend).await?;
    hostile_identifier_propagates(&backend).await?;
    metadata_round_trip(&backend).await?;

    assert!(matches!(
        backend.drop_data(false).await,
        Err(DataBackendError::Unimplemented(_))
    ));
    backend.disconnect().await?;
    Ok(())
}

async fn create_insert_and_read_back(
    backend: &SqlDataBackend,
) -> Result<(), Box<dyn std::error::Error>> {
    let table = backend
        .create_table_and_schema("documents", sample_mapping())
        .await?;
    assert_eq!(table.identifier(), "documents");

    // Same call again takes the tolerant path.
    let again = backend
        .create_table_and_schema("documents", sample_mapping())
        .await?;
    assert_eq!(again.schema().get("id"), Some(ColumnType::Int64));

    let created = chrono::NaiveDate::from_ymd_opt(2026, 1, 2)
        .and_then(|d| d.and_hms_opt(3, 4, 5))
        .ok_or("bad fixture timestamp")?;
    let mut full = Document::new();
    full.set("id", CellValue::Int(1));
    full.set("body", CellValue::Text("hello".to_string()));
    full.set("embedding", CellValue::Bytes(vec![0, 1, 2]));
    full.set("meta", CellValue::Json(json!({"lang": "en"})));
    full.set("created", CellValue::Timestamp(created));

    // A row missing columns gets them filled with NULL.
    let mut partial = Document::new();
    partial.set("id", CellValue::Int(2));

    backend.insert("documents", vec![full, partial]).await?;
    backend.insert("documents", vec![]).await?;

    let rows = backend.fetch("documents").await?;
    assert_eq!(rows.len(), 2);
    let first = rows
        .iter()
        .find(|d| d.get("id") == Some(&CellValue::Int(1)))
        .ok_or("row 1 missing")?;
    assert_eq!(
        first.get("body"),
        Some(&CellValue::Text("hello".to_string()))
    );
    assert_eq!(first.get("embedding"), Some(&CellValue::Bytes(vec![0, 1, 2])));
    assert_eq!(first.get("meta"), Some(&CellValue::Json(json!({"lang": "en"}))));
    assert_eq!(first.get("created"), Some(&CellValue::Timestamp(created)));

    let second = rows
        .iter()
        .find(|d| d.get("id") == Some(&CellValue::Int(2)))
        .ok_or("row 2 missing")?;
    assert_eq!(second.get("body"), Some(&CellValue::Null));
    assert_eq!(second.get("embedding"), Some(&CellValue::Null));
    Ok(())
}

async fn catalog_lookups(backend: &SqlDataBackend) -> Result<(), Box<dyn std::error::Error>> {
    let engine = backend.engine();
    assert!(engine.table_exists("documents").await?);
    assert!(!engine.table_exists("not_there").await?);

    let table = backend.get_table("documents").await?;
    assert_eq!(table.schema().get("id"), Some(ColumnType::Int64));
    assert_eq!(table.schema().get("embedding"), Some(ColumnType::Bytes));
    assert_eq!(table.schema().get("meta"), Some(ColumnType::Json));
    assert_eq!(table.schema().get("created"), Some(ColumnType::Timestamp));

    assert!(matches!(
        backend.get_table("not_there").await,
        Err(DataBackendError::TableNotFound(_))
    ));
    assert!(matches!(
        backend.fetch("not_there").await,
        Err(DataBackendError::TableNotFound(_))
    ));
    Ok(())
}

async fn output_destination(backend: &SqlDataBackend) -> Result<(), Box<dyn std::error::Error>> {
    let out = backend.create_output_dest("p1", Some(dtype("string")?.into()))?;
    assert_eq!(out.identifier(), "_outputs.p1");

    backend
        .create_table_and_schema(out.identifier(), out.schema().fields().to_vec())
        .await?;
    let mut output = Document::new();
    output.set(INPUT_KEY, CellValue::Text("1".to_string()));
    output.set(OUTPUT_KEY, CellValue::Text("greeting".to_string()));
    backend.insert(out.identifier(), vec![output]).await?;

    let outputs = backend.fetch("_outputs.p1").await?;
    assert_eq!(outputs.len(), 1);
    assert_eq!(
        outputs[0].get(OUTPUT_KEY),
        Some(&CellValue::Text("greeting".to_string()))
    );
    Ok(())
}

async fn hostile_identifier_propagates(
    backend: &SqlDataBackend,
) -> Result<(), Box<dyn std::error::Error>> {
    let err = backend
        .create_table_and_schema("bad name", vec![("id".to_string(), ColumnType::Int64)])
        .await;
    assert!(matches!(err, Err(DataBackendError::SchemaError(_))));
    Ok(())
}

async fn metadata_round_trip(backend: &SqlDataBackend) -> Result<(), Box<dyn std::error::Error>> {
    let metadata = backend.build_metadata();
    metadata.init().await?;
    metadata.init().await?;

    let v0 = metadata
        .create_component("model", "clf", json!({"k": 1}))
        .await?;
    let v1 = metadata
        .create_component("model", "clf", json!({"k": 2}))
        .await?;
    assert_eq!((v0, v1), (0, 1));
    assert_eq!(metadata.latest_version("model", "clf").await?, Some(1));

    metadata.create_job("job-1", "fit", json!({})).await?;
    metadata
        .update_job_status("job-1", JobStatus::Running)
        .await?;
    assert_eq!(metadata.job_status("job-1").await?, Some(JobStatus::Running));
    Ok(())
}

#[test]
fn postgres_backend_end_to_end() -> Result<(), Box<dyn std::error::Error>> {
    let mut cfg = deadpool_postgres::Config::new();
    cfg.dbname = Some("databackend_test".to_string());
    let pg = setup_postgres_embedded(&cfg)?;

    let rt = tokio::runtime::Runtime::new()?;
    let result = rt.block_on(run_backend_suite(pg.config.clone()));
    stop_postgres_embedded(pg);
    result
}
