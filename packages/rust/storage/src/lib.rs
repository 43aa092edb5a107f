//! libSQL storage layer for Letterpress (local embedded mode).
//!
//! The [`Storage`] struct wraps a libSQL database holding generation jobs and
//! the organization-owned reference data (knowledge items, events) the
//! pipeline reads.
//!
//! **Access rules:**
//! - The pipeline task is the only writer of a given job record.
//! - Pollers (`letterpress status`, `show`) read through the same handle or
//!   via [`Storage::open_readonly`].

mod migrations;

use std::path::Path;

use chrono::{DateTime, Utc};
use letterpress_shared::{
    Event, FinalDocument, GenerationJob, JobId, JobStatus, KnowledgeItem, LetterpressError,
    LogEntry, Result,
};
use libsql::{Connection, Database, params};

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
}

/// How a job ended.
#[derive(Debug, Clone)]
pub enum JobOutcome {
    /// The document was assembled.
    Ready(Box<FinalDocument>),
    /// A mandatory stage failed.
    Failed,
}

const JOB_COLUMNS: &str = "id, organization_id, topic, options_json, status, progress, \
                           logs_json, content_json, created_at, updated_at";

impl Storage {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| LetterpressError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| LetterpressError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| LetterpressError::Storage(e.to_string()))?;

        let storage = Self {
            db,
            conn,
            readonly: false,
        };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Open an existing database at `path` for polling only.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(LetterpressError::Storage(format!(
                "database not found at {}",
                path.display()
            )));
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| LetterpressError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| LetterpressError::Storage(e.to_string()))?;

        Ok(Self {
            db,
            conn,
            readonly: true,
        })
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn.execute_batch(migration.sql).await.map_err(|e| {
                    LetterpressError::Storage(format!(
                        "migration v{} failed: {e}",
                        migration.version
                    ))
                })?;
            }
        }
        Ok(())
    }

    /// Current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => match rows.next().await {
                Ok(Some(row)) => row.get::<u32>(0).unwrap_or(0),
                _ => 0,
            },
            Err(_) => 0,
        }
    }

    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(LetterpressError::Storage(
                "database is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Job operations
    // -----------------------------------------------------------------------

    /// Insert a newly created job record.
    pub async fn insert_job(&self, job: &GenerationJob) -> Result<()> {
        self.check_writable()?;
        let options_json = to_json(&job.options)?;
        let logs_json = to_json(&job.logs)?;
        let content_json = job.content.as_ref().map(to_json).transpose()?;

        self.conn
            .execute(
                "INSERT INTO generation_jobs (id, organization_id, topic, options_json, status,
                     progress, logs_json, content_json, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    job.id.to_string(),
                    job.organization_id.as_str(),
                    job.topic.as_str(),
                    options_json,
                    job.status.as_str(),
                    i64::from(job.progress),
                    logs_json,
                    content_json,
                    job.created_at.to_rfc3339(),
                    job.updated_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| LetterpressError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Get a job by ID.
    pub async fn get_job(&self, id: &JobId) -> Result<Option<GenerationJob>> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {JOB_COLUMNS} FROM generation_jobs WHERE id = ?1"),
                params![id.to_string()],
            )
            .await
            .map_err(|e| LetterpressError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_job(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(LetterpressError::Storage(e.to_string())),
        }
    }

    /// Most recent jobs for an organization, newest first.
    pub async fn list_jobs(&self, organization_id: &str, limit: u32) -> Result<Vec<GenerationJob>> {
        // UUID v7 ids sort by creation time.
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {JOB_COLUMNS} FROM generation_jobs
                     WHERE organization_id = ?1 ORDER BY id DESC LIMIT ?2"
                ),
                params![organization_id, limit],
            )
            .await
            .map_err(|e| LetterpressError::Storage(e.to_string()))?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(row_to_job(&row)?);
        }
        Ok(results)
    }

    /// Append one log line and raise progress to at least `progress`.
    ///
    /// Read-then-write with no transaction: callers must be the job's only
    /// writer. Terminal jobs are never modified.
    pub async fn append_job_log(&self, id: &JobId, message: &str, progress: Option<u8>) -> Result<()> {
        self.check_writable()?;
        let mut job = self.require_active_job(id).await?;

        job.logs.push(LogEntry::now(message));
        if let Some(checkpoint) = progress {
            job.progress = job.progress.max(checkpoint.min(100));
        }

        self.conn
            .execute(
                "UPDATE generation_jobs SET logs_json = ?1, progress = ?2, updated_at = ?3
                 WHERE id = ?4",
                params![
                    to_json(&job.logs)?,
                    i64::from(job.progress),
                    Utc::now().to_rfc3339(),
                    id.to_string(),
                ],
            )
            .await
            .map_err(|e| LetterpressError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Move a job to its terminal state, appending a final log line.
    ///
    /// `Ready` writes the document and sets progress to 100. Fails with a
    /// validation error if the job is already terminal.
    pub async fn finish_job(&self, id: &JobId, outcome: JobOutcome, message: &str) -> Result<()> {
        self.check_writable()?;
        let mut job = self.require_active_job(id).await?;
        job.logs.push(LogEntry::now(message));

        let (status, content_json) = match &outcome {
            JobOutcome::Ready(doc) => {
                job.progress = 100;
                (JobStatus::Ready, Some(to_json(doc.as_ref())?))
            }
            JobOutcome::Failed => (JobStatus::Failed, None),
        };

        self.conn
            .execute(
                "UPDATE generation_jobs
                 SET status = ?1, progress = ?2, logs_json = ?3, content_json = ?4, updated_at = ?5
                 WHERE id = ?6 AND status = 'generating'",
                params![
                    status.as_str(),
                    i64::from(job.progress),
                    to_json(&job.logs)?,
                    content_json,
                    Utc::now().to_rfc3339(),
                    id.to_string(),
                ],
            )
            .await
            .map_err(|e| LetterpressError::Storage(e.to_string()))?;

        tracing::info!(job = %id, status = %status, "job finished");
        Ok(())
    }

    async fn require_active_job(&self, id: &JobId) -> Result<GenerationJob> {
        let job = self
            .get_job(id)
            .await?
            .ok_or_else(|| LetterpressError::Storage(format!("job {id} not found")))?;
        if job.status.is_terminal() {
            return Err(LetterpressError::validation(format!(
                "job {id} is already {}",
                job.status
            )));
        }
        Ok(job)
    }

    // -----------------------------------------------------------------------
    // Knowledge items
    // -----------------------------------------------------------------------

    pub async fn insert_knowledge_item(&self, item: &KnowledgeItem) -> Result<()> {
        self.check_writable()?;
        self.conn
            .execute(
                "INSERT INTO knowledge_items (id, organization_id, title, content, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    item.id.as_str(),
                    item.organization_id.as_str(),
                    item.title.as_str(),
                    item.content.as_str(),
                    item.created_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| LetterpressError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Case-insensitive substring match over title and content.
    pub async fn search_knowledge(
        &self,
        organization_id: &str,
        query: &str,
        limit: u32,
    ) -> Result<Vec<KnowledgeItem>> {
        let needle = query.trim().to_lowercase();
        let mut rows = self
            .conn
            .query(
                "SELECT id, organization_id, title, content, created_at FROM knowledge_items
                 WHERE organization_id = ?1
                   AND (instr(lower(title), ?2) > 0 OR instr(lower(content), ?2) > 0)
                 ORDER BY created_at DESC
                 LIMIT ?3",
                params![organization_id, needle, limit],
            )
            .await
            .map_err(|e| LetterpressError::Storage(e.to_string()))?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(KnowledgeItem {
                id: get_string(&row, 0)?,
                organization_id: get_string(&row, 1)?,
                title: get_string(&row, 2)?,
                content: get_string(&row, 3)?,
                created_at: parse_timestamp(&get_string(&row, 4)?)?,
            });
        }
        Ok(results)
    }

    // -----------------------------------------------------------------------
    // Events
    // -----------------------------------------------------------------------

    pub async fn insert_event(&self, event: &Event) -> Result<()> {
        self.check_writable()?;
        self.conn
            .execute(
                "INSERT INTO events (id, organization_id, title, description, starts_at, location, url)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    event.id.as_str(),
                    event.organization_id.as_str(),
                    event.title.as_str(),
                    event.description.as_str(),
                    event.starts_at.timestamp(),
                    event.location.as_deref(),
                    event.url.as_deref(),
                ],
            )
            .await
            .map_err(|e| LetterpressError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Events starting at or after `now`, soonest first, capped at `limit`.
    pub async fn upcoming_events(
        &self,
        organization_id: &str,
        now: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<Event>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, organization_id, title, description, starts_at, location, url
                 FROM events
                 WHERE organization_id = ?1 AND starts_at >= ?2
                 ORDER BY starts_at ASC
                 LIMIT ?3",
                params![organization_id, now.timestamp(), limit],
            )
            .await
            .map_err(|e| LetterpressError::Storage(e.to_string()))?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            let ts: i64 = row
                .get(4)
                .map_err(|e| LetterpressError::Storage(e.to_string()))?;
            results.push(Event {
                id: get_string(&row, 0)?,
                organization_id: get_string(&row, 1)?,
                title: get_string(&row, 2)?,
                description: row.get::<String>(3).unwrap_or_default(),
                starts_at: DateTime::from_timestamp(ts, 0).ok_or_else(|| {
                    LetterpressError::Storage(format!("invalid event timestamp {ts}"))
                })?,
                location: row.get::<String>(5).ok(),
                url: row.get::<String>(6).ok(),
            });
        }
        Ok(results)
    }
}

// ---------------------------------------------------------------------------
// Row helpers
// ---------------------------------------------------------------------------

fn get_string(row: &libsql::Row, idx: i32) -> Result<String> {
    row.get::<String>(idx)
        .map_err(|e| LetterpressError::Storage(e.to_string()))
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| LetterpressError::Storage(format!("invalid date: {e}")))
}

fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| LetterpressError::Storage(format!("encode failed: {e}")))
}

fn from_json<T: serde::de::DeserializeOwned>(column: &str, raw: &str) -> Result<T> {
    serde_json::from_str(raw)
        .map_err(|e| LetterpressError::Storage(format!("corrupt {column}: {e}")))
}

/// Convert a database row to a [`GenerationJob`].
fn row_to_job(row: &libsql::Row) -> Result<GenerationJob> {
    let id = get_string(row, 0)?;
    let status = get_string(row, 4)?;
    let progress: i64 = row
        .get(5)
        .map_err(|e| LetterpressError::Storage(e.to_string()))?;
    let content = match row.get::<String>(7).ok() {
        Some(raw) => Some(from_json("content_json", &raw)?),
        None => None,
    };

    Ok(GenerationJob {
        id: id
            .parse()
            .map_err(|e| LetterpressError::Storage(format!("invalid job id {id}: {e}")))?,
        organization_id: get_string(row, 1)?,
        topic: get_string(row, 2)?,
        options: from_json("options_json", &get_string(row, 3)?)?,
        status: status.parse()?,
        progress: progress.clamp(0, 100) as u8,
        logs: from_json("logs_json", &get_string(row, 6)?)?,
        content,
        created_at: parse_timestamp(&get_string(row, 8)?)?,
        updated_at: parse_timestamp(&get_string(row, 9)?)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};
    use letterpress_shared::{
        DocumentFooter, DocumentHeader, GenerationMode, GenerationRequest,
    };
    use uuid::Uuid;

    /// Create a temp file storage for testing.
    async fn test_storage() -> Storage {
        let tmp = std::env::temp_dir().join(format!("lp_test_{}.db", Uuid::now_v7()));
        Storage::open(&tmp).await.expect("open test db")
    }

    fn new_job(org: &str, topic: &str) -> GenerationJob {
        let options = GenerationRequest::new(topic, GenerationMode::Quick)
            .resolve()
            .expect("resolve");
        GenerationJob::new(org, options)
    }

    fn document() -> FinalDocument {
        FinalDocument {
            header: DocumentHeader {
                title: "The Week in Care".into(),
                subtitle: "What changed".into(),
                date: NaiveDate::from_ymd_opt(2026, 1, 5).expect("date"),
                logo_url: None,
                brand_name: None,
            },
            sections: vec![],
            footer: DocumentFooter {
                text: "Thanks for reading".into(),
                links: vec![],
            },
        }
    }

    #[tokio::test]
    async fn open_and_migrate() {
        let storage = test_storage().await;
        assert_eq!(storage.get_schema_version().await, 2);
    }

    #[tokio::test]
    async fn idempotent_migration() {
        let tmp = std::env::temp_dir().join(format!("lp_test_{}.db", Uuid::now_v7()));
        let s1 = Storage::open(&tmp).await.expect("first open");
        drop(s1);
        let s2 = Storage::open(&tmp).await.expect("second open");
        assert_eq!(s2.get_schema_version().await, 2);
    }

    #[tokio::test]
    async fn job_insert_and_get() {
        let storage = test_storage().await;
        let job = new_job("acme", "AI in Healthcare");
        storage.insert_job(&job).await.expect("insert");

        let found = storage.get_job(&job.id).await.expect("get").expect("exists");
        assert_eq!(found.id, job.id);
        assert_eq!(found.topic, "AI in Healthcare");
        assert_eq!(found.status, JobStatus::Generating);
        assert_eq!(found.options.num_sections, 3);
        assert_eq!(found.logs.len(), 1);
        assert!(found.content.is_none());

        assert!(storage.get_job(&JobId::new()).await.expect("get").is_none());
    }

    #[tokio::test]
    async fn progress_never_decreases() {
        let storage = test_storage().await;
        let job = new_job("acme", "Remote work");
        storage.insert_job(&job).await.unwrap();

        storage.append_job_log(&job.id, "Planned", Some(20)).await.unwrap();
        storage.append_job_log(&job.id, "Late checkpoint", Some(10)).await.unwrap();
        storage.append_job_log(&job.id, "Note only", None).await.unwrap();

        let found = storage.get_job(&job.id).await.unwrap().unwrap();
        assert_eq!(found.progress, 20);
        let messages: Vec<_> = found.logs.iter().map(|l| l.message.as_str()).collect();
        assert_eq!(messages, ["Job queued", "Planned", "Late checkpoint", "Note only"]);
    }

    #[tokio::test]
    async fn finish_ready_writes_content_and_freezes_job() {
        let storage = test_storage().await;
        let job = new_job("acme", "Climate tech");
        storage.insert_job(&job).await.unwrap();

        storage
            .finish_job(&job.id, JobOutcome::Ready(Box::new(document())), "Newsletter ready")
            .await
            .expect("finish");

        let found = storage.get_job(&job.id).await.unwrap().unwrap();
        assert_eq!(found.status, JobStatus::Ready);
        assert_eq!(found.progress, 100);
        assert_eq!(found.content.as_ref().expect("content").header.title, "The Week in Care");

        // Terminal jobs are never mutated again.
        assert!(storage.append_job_log(&job.id, "late", Some(50)).await.is_err());
        assert!(
            storage
                .finish_job(&job.id, JobOutcome::Failed, "again")
                .await
                .is_err()
        );
        let again = storage.get_job(&job.id).await.unwrap().unwrap();
        assert_eq!(again.logs.len(), found.logs.len());
        assert_eq!(again.status, JobStatus::Ready);
    }

    #[tokio::test]
    async fn finish_failed_leaves_content_unset() {
        let storage = test_storage().await;
        let job = new_job("acme", "Fintech");
        storage.insert_job(&job).await.unwrap();
        storage.append_job_log(&job.id, "Loading", Some(5)).await.unwrap();

        storage
            .finish_job(&job.id, JobOutcome::Failed, "No generation providers available")
            .await
            .unwrap();

        let found = storage.get_job(&job.id).await.unwrap().unwrap();
        assert_eq!(found.status, JobStatus::Failed);
        assert_eq!(found.progress, 5);
        assert!(found.content.is_none());
        assert_eq!(
            found.logs.last().map(|l| l.message.as_str()),
            Some("No generation providers available")
        );
    }

    #[tokio::test]
    async fn list_jobs_newest_first_per_org() {
        let storage = test_storage().await;
        let first = new_job("acme", "One");
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let second = new_job("acme", "Two");
        let other = new_job("globex", "Three");
        for job in [&first, &second, &other] {
            storage.insert_job(job).await.unwrap();
        }

        let jobs = storage.list_jobs("acme", 10).await.unwrap();
        let topics: Vec<_> = jobs.iter().map(|j| j.topic.as_str()).collect();
        assert_eq!(topics, ["Two", "One"]);
        assert_eq!(storage.list_jobs("acme", 1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn knowledge_substring_search() {
        let storage = test_storage().await;
        for (org, title, content) in [
            ("acme", "Telehealth policy", "Our clinics offer remote consults."),
            ("acme", "Parking", "Visitors park in lot B."),
            ("globex", "Telehealth FAQ", "Another org."),
        ] {
            storage
                .insert_knowledge_item(&KnowledgeItem {
                    id: Uuid::now_v7().to_string(),
                    organization_id: org.into(),
                    title: title.into(),
                    content: content.into(),
                    created_at: Utc::now(),
                })
                .await
                .unwrap();
        }

        let hits = storage.search_knowledge("acme", "TELEHEALTH", 5).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].title, "Telehealth policy");

        let hits = storage.search_knowledge("acme", "remote", 5).await.unwrap();
        assert_eq!(hits.len(), 1);

        assert!(storage.search_knowledge("acme", "quantum", 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn upcoming_events_are_future_ordered_and_capped() {
        let storage = test_storage().await;
        let now = Utc::now();
        for (title, offset_days) in [("Past meetup", -3), ("Later summit", 20), ("Soon webinar", 2), ("Mid workshop", 9)] {
            storage
                .insert_event(&Event {
                    id: Uuid::now_v7().to_string(),
                    organization_id: "acme".into(),
                    title: title.into(),
                    description: String::new(),
                    starts_at: now + Duration::days(offset_days),
                    location: Some("Online".into()),
                    url: None,
                })
                .await
                .unwrap();
        }

        let events = storage.upcoming_events("acme", now, 2).await.unwrap();
        let titles: Vec<_> = events.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, ["Soon webinar", "Mid workshop"]);
        assert_eq!(events[0].location.as_deref(), Some("Online"));
        assert!(events[0].url.is_none());
    }

    #[tokio::test]
    async fn readonly_rejects_writes() {
        let tmp = std::env::temp_dir().join(format!("lp_test_{}.db", Uuid::now_v7()));
        drop(Storage::open(&tmp).await.expect("create"));

        let ro = Storage::open_readonly(&tmp).await.expect("open readonly");
        let job = new_job("acme", "Read only");
        assert!(ro.insert_job(&job).await.is_err());
        assert!(ro.list_jobs("acme", 5).await.expect("reads work").is_empty());
    }
}
