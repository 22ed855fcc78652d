use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;
use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::debug;

use crate::document::Document;
use crate::engine::QueryEngine;
use crate::error::DataBackendError;
use crate::schema::{ColumnType, TableSchema};
use crate::types::CellValue;

/// Table recording component versions.
pub const COMPONENTS_TABLE: &str = "_components";
/// Table recording job submissions and status changes, append-only.
pub const JOBS_TABLE: &str = "_jobs";

/// Lifecycle states a job moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Success,
    Failed,
}

impl JobStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Success => "success",
            JobStatus::Failed => "failed",
        }
    }
}

impl FromStr for JobStatus {
    type Err = DataBackendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "running" => Ok(JobStatus::Running),
            "success" => Ok(JobStatus::Success),
            "failed" => Ok(JobStatus::Failed),
            other => Err(DataBackendError::Other(format!(
                "unknown job status '{other}'"
            ))),
        }
    }
}

/// One versioned component registration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComponentRecord {
    pub type_id: String,
    pub identifier: String,
    pub version: i64,
    pub info: JsonValue,
}

/// The current view of one job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobRecord {
    pub job_id: String,
    pub method: String,
    pub status: JobStatus,
    pub info: JsonValue,
}

/// Metadata store keeping its bookkeeping in two tables on the same
/// engine the data lives on.
///
/// Job status changes are appended rather than updated in place. Each row
/// carries a store-assigned sequence number, and the row with the highest
/// `(updated_at, seq)` wins, whatever order the engine returns rows in.
/// That keeps the store inside the engine seam, which has no row-update
/// operation.
pub struct SqlMetadataStore {
    engine: Arc<dyn QueryEngine>,
    job_seq: AtomicI64,
}

impl SqlMetadataStore {
    #[must_use]
    pub fn new(engine: Arc<dyn QueryEngine>) -> Self {
        SqlMetadataStore {
            engine,
            job_seq: AtomicI64::new(0),
        }
    }

    /// Create the bookkeeping tables if they are not there yet and seed
    /// the job sequence counter from what is already recorded. Must run
    /// before any other operation on a fresh database.
    ///
    /// # Errors
    ///
    /// Passes through engine failures other than the tables existing.
    pub async fn init(&self) -> Result<(), DataBackendError> {
        let components = TableSchema::new(
            COMPONENTS_TABLE,
            vec![
                ("type_id".to_string(), ColumnType::String),
                ("identifier".to_string(), ColumnType::String),
                ("version".to_string(), ColumnType::Int64),
                ("created_at".to_string(), ColumnType::Timestamp),
                ("info".to_string(), ColumnType::Json),
            ],
        )?;
        let jobs = TableSchema::new(
            JOBS_TABLE,
            vec![
                ("job_id".to_string(), ColumnType::String),
                ("method".to_string(), ColumnType::String),
                ("status".to_string(), ColumnType::String),
                ("updated_at".to_string(), ColumnType::Timestamp),
                ("seq".to_string(), ColumnType::Int64),
                ("info".to_string(), ColumnType::Json),
            ],
        )?;

        for (name, schema) in [(COMPONENTS_TABLE, components), (JOBS_TABLE, jobs)] {
            if self.engine.table_exists(name).await? {
                continue;
            }
            match self.engine.create_table(name, &schema).await {
                Ok(()) => debug!("created metadata table '{}'", name),
                Err(DataBackendError::TableExists(_)) => {}
                Err(e) => return Err(e),
            }
        }

        // New appends get sequence numbers above anything already recorded.
        let recorded = self
            .engine
            .fetch_all(JOBS_TABLE)
            .await?
            .iter()
            .filter_map(|doc| doc.get("seq").and_then(CellValue::as_int).copied())
            .max();
        if let Some(max_seq) = recorded {
            self.job_seq.fetch_max(max_seq + 1, Ordering::Relaxed);
        }
        Ok(())
    }

    /// Register a new version of a component and return the version
    /// number it was given. Versions start at 0.
    ///
    /// # Errors
    ///
    /// Passes through engine failures; `TableNotFound` means `init` has
    /// not run.
    pub async fn create_component(
        &self,
        type_id: &str,
        identifier: &str,
        info: JsonValue,
    ) -> Result<i64, DataBackendError> {
        let version = self
            .latest_version(type_id, identifier)
            .await?
            .map_or(0, |v| v + 1);

        let mut doc = Document::new();
        doc.set("type_id", CellValue::Text(type_id.to_string()));
        doc.set("identifier", CellValue::Text(identifier.to_string()));
        doc.set("version", CellValue::Int(version));
        doc.set("created_at", CellValue::Timestamp(Utc::now().naive_utc()));
        doc.set("info", CellValue::Json(info));
        self.engine.insert(COMPONENTS_TABLE, vec![doc]).await?;
        Ok(version)
    }

    /// Highest registered version of a component, if any.
    ///
    /// # Errors
    ///
    /// Passes through engine failures.
    pub async fn latest_version(
        &self,
        type_id: &str,
        identifier: &str,
    ) -> Result<Option<i64>, DataBackendError> {
        let rows = self.engine.fetch_all(COMPONENTS_TABLE).await?;
        Ok(rows
            .iter()
            .filter(|doc| {
                text_field(doc, "type_id") == Some(type_id)
                    && text_field(doc, "identifier") == Some(identifier)
            })
            .filter_map(|doc| doc.get("version").and_then(CellValue::as_int).copied())
            .max())
    }

    /// Identifiers registered under a component type, sorted.
    ///
    /// # Errors
    ///
    /// Passes through engine failures.
    pub async fn show_components(&self, type_id: &str) -> Result<Vec<String>, DataBackendError> {
        let rows = self.engine.fetch_all(COMPONENTS_TABLE).await?;
        let mut identifiers: Vec<String> = Vec::new();
        for doc in &rows {
            if text_field(doc, "type_id") != Some(type_id) {
                continue;
            }
            if let Some(identifier) = text_field(doc, "identifier") {
                if !identifiers.iter().any(|seen| seen == identifier) {
                    identifiers.push(identifier.to_string());
                }
            }
        }
        identifiers.sort();
        Ok(identifiers)
    }

    /// One component registration, at an explicit version or the latest.
    ///
    /// # Errors
    ///
    /// Passes through engine failures.
    pub async fn get_component(
        &self,
        type_id: &str,
        identifier: &str,
        version: Option<i64>,
    ) -> Result<Option<ComponentRecord>, DataBackendError> {
        let wanted = match version {
            Some(v) => Some(v),
            None => self.latest_version(type_id, identifier).await?,
        };
        let Some(wanted) = wanted else {
            return Ok(None);
        };

        let rows = self.engine.fetch_all(COMPONENTS_TABLE).await?;
        for doc in &rows {
            if text_field(doc, "type_id") == Some(type_id)
                && text_field(doc, "identifier") == Some(identifier)
                && doc.get("version").and_then(CellValue::as_int) == Some(&wanted)
            {
                return Ok(Some(ComponentRecord {
                    type_id: type_id.to_string(),
                    identifier: identifier.to_string(),
                    version: wanted,
                    info: json_field(doc),
                }));
            }
        }
        Ok(None)
    }

    /// Record a new job in `Pending` state.
    ///
    /// # Errors
    ///
    /// Passes through engine failures.
    pub async fn create_job(
        &self,
        job_id: &str,
        method: &str,
        info: JsonValue,
    ) -> Result<(), DataBackendError> {
        self.append_job_row(job_id, method, JobStatus::Pending, info)
            .await
    }

    /// Append a status change for a known job.
    ///
    /// # Errors
    ///
    /// Returns `Other` when the job was never created.
    pub async fn update_job_status(
        &self,
        job_id: &str,
        status: JobStatus,
    ) -> Result<(), DataBackendError> {
        let Some(current) = self.find_job(job_id).await? else {
            return Err(DataBackendError::Other(format!("unknown job '{job_id}'")));
        };
        self.append_job_row(job_id, &current.method, status, current.info)
            .await
    }

    /// Current status of a job, if it exists.
    ///
    /// # Errors
    ///
    /// Passes through engine failures.
    pub async fn job_status(&self, job_id: &str) -> Result<Option<JobStatus>, DataBackendError> {
        Ok(self.find_job(job_id).await?.map(|job| job.status))
    }

    /// Current view of every job, sorted by job id.
    ///
    /// # Errors
    ///
    /// Passes through engine failures.
    pub async fn show_jobs(&self) -> Result<Vec<JobRecord>, DataBackendError> {
        let rows = self.engine.fetch_all(JOBS_TABLE).await?;
        let mut latest: Vec<(JobKey, JobRecord)> = Vec::new();
        for doc in &rows {
            let record = job_from_doc(doc)?;
            let key = job_key(doc);
            match latest
                .iter_mut()
                .find(|(_, seen)| seen.job_id == record.job_id)
            {
                Some((seen_key, seen)) => {
                    if key >= *seen_key {
                        *seen_key = key;
                        *seen = record;
                    }
                }
                None => latest.push((key, record)),
            }
        }
        let mut jobs: Vec<JobRecord> = latest.into_iter().map(|(_, record)| record).collect();
        jobs.sort_by(|a, b| a.job_id.cmp(&b.job_id));
        Ok(jobs)
    }

    async fn find_job(&self, job_id: &str) -> Result<Option<JobRecord>, DataBackendError> {
        let rows = self.engine.fetch_all(JOBS_TABLE).await?;
        let mut latest: Option<(JobKey, JobRecord)> = None;
        for doc in &rows {
            if text_field(doc, "job_id") != Some(job_id) {
                continue;
            }
            let record = job_from_doc(doc)?;
            let key = job_key(doc);
            if latest.as_ref().is_none_or(|(seen, _)| key >= *seen) {
                latest = Some((key, record));
            }
        }
        Ok(latest.map(|(_, record)| record))
    }

    async fn append_job_row(
        &self,
        job_id: &str,
        method: &str,
        status: JobStatus,
        info: JsonValue,
    ) -> Result<(), DataBackendError> {
        let seq = self.job_seq.fetch_add(1, Ordering::Relaxed);
        let mut doc = Document::new();
        doc.set("job_id", CellValue::Text(job_id.to_string()));
        doc.set("method", CellValue::Text(method.to_string()));
        doc.set("status", CellValue::Text(status.as_str().to_string()));
        doc.set("updated_at", CellValue::Timestamp(Utc::now().naive_utc()));
        doc.set("seq", CellValue::Int(seq));
        doc.set("info", CellValue::Json(info));
        self.engine.insert(JOBS_TABLE, vec![doc]).await
    }
}

/// Ordering key of one job row. The sequence number breaks ties between
/// rows stamped within the same timestamp tick.
type JobKey = (chrono::NaiveDateTime, i64);

fn job_key(doc: &Document) -> JobKey {
    let at = doc
        .get("updated_at")
        .and_then(CellValue::as_timestamp)
        .unwrap_or_default();
    let seq = doc
        .get("seq")
        .and_then(CellValue::as_int)
        .copied()
        .unwrap_or(0);
    (at, seq)
}

fn text_field<'a>(doc: &'a Document, column: &str) -> Option<&'a str> {
    doc.get(column).and_then(CellValue::as_text)
}

fn json_field(doc: &Document) -> JsonValue {
    doc.get("info")
        .and_then(CellValue::as_json)
        .cloned()
        .unwrap_or(JsonValue::Null)
}

fn job_from_doc(doc: &Document) -> Result<JobRecord, DataBackendError> {
    let job_id = text_field(doc, "job_id")
        .ok_or_else(|| DataBackendError::Other("job row without a job_id".to_string()))?;
    let method = text_field(doc, "method").unwrap_or_default();
    let status = text_field(doc, "status")
        .ok_or_else(|| DataBackendError::Other(format!("job '{job_id}' row without a status")))?
        .parse()?;
    Ok(JobRecord {
        job_id: job_id.to_string(),
        method: method.to_string(),
        status,
        info: json_field(doc),
    })
}
