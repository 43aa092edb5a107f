//! Progress reporting for generation jobs.
//!
//! Stages report through [`ProgressReporter`]; [`StorageReporter`] appends to
//! the job record so pollers see logs and progress as they happen.

use std::sync::Arc;

use async_trait::async_trait;
use letterpress_shared::JobId;
use letterpress_storage::Storage;
use tracing::{debug, info, warn};

/// Pipeline stages, in execution order. Assembly completes the job at 100%.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Config,
    Plan,
    Research,
    Knowledge,
    Events,
    Sections,
    Sanitize,
}

impl Stage {
    /// Job progress once this stage has completed.
    pub fn percent(&self) -> u8 {
        match self {
            Self::Config => 5,
            Self::Plan => 20,
            Self::Research => 30,
            Self::Knowledge => 35,
            Self::Events => 40,
            Self::Sections => 85,
            Self::Sanitize => 90,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Config => "config",
            Self::Plan => "plan",
            Self::Research => "research",
            Self::Knowledge => "knowledge",
            Self::Events => "events",
            Self::Sections => "sections",
            Self::Sanitize => "sanitize",
        }
    }
}

/// Receives job progress. Reporting never fails the job.
#[async_trait]
pub trait ProgressReporter: Send + Sync {
    /// Append a log line without moving progress.
    async fn log(&self, message: &str);
    /// Append a log line and advance progress to `percent`.
    async fn progress(&self, percent: u8, message: &str);

    /// Mark `stage` as complete.
    async fn checkpoint(&self, stage: Stage, message: &str) {
        self.progress(stage.percent(), message).await;
    }
}

/// No-op reporter for headless/test usage.
pub struct SilentProgress;

#[async_trait]
impl ProgressReporter for SilentProgress {
    async fn log(&self, _message: &str) {}
    async fn progress(&self, _percent: u8, _message: &str) {}
}

/// Persists every report to the job record.
pub struct StorageReporter {
    storage: Arc<Storage>,
    job_id: JobId,
}

impl StorageReporter {
    pub fn new(storage: Arc<Storage>, job_id: JobId) -> Self {
        Self { storage, job_id }
    }

    async fn append(&self, message: &str, progress: Option<u8>) {
        info!(job_id = %self.job_id, progress, "{message}");
        if let Err(e) = self
            .storage
            .append_job_log(&self.job_id, message, progress)
            .await
        {
            warn!(job_id = %self.job_id, error = %e, "could not persist job log");
        }
    }
}

#[async_trait]
impl ProgressReporter for StorageReporter {
    async fn log(&self, message: &str) {
        self.append(message, None).await;
    }

    async fn progress(&self, percent: u8, message: &str) {
        self.append(message, Some(percent)).await;
    }

    async fn checkpoint(&self, stage: Stage, message: &str) {
        debug!(job_id = %self.job_id, stage = stage.as_str(), "stage complete");
        self.append(message, Some(stage.percent())).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use letterpress_shared::{GenerationJob, GenerationMode, GenerationRequest};
    use uuid::Uuid;

    #[test]
    fn stage_percentages_increase() {
        let stages = [
            Stage::Config,
            Stage::Plan,
            Stage::Research,
            Stage::Knowledge,
            Stage::Events,
            Stage::Sections,
            Stage::Sanitize,
        ];
        assert!(stages.windows(2).all(|w| w[0].percent() < w[1].percent()));
        assert!(Stage::Sanitize.percent() < 100);
    }

    #[test]
    fn stage_names_are_stable() {
        assert_eq!(Stage::Config.as_str(), "config");
        assert_eq!(Stage::Knowledge.as_str(), "knowledge");
        assert_eq!(Stage::Sanitize.as_str(), "sanitize");
    }

    #[tokio::test]
    async fn storage_reporter_appends_logs_and_progress() {
        let tmp = std::env::temp_dir().join(format!("lp_test_{}.db", Uuid::now_v7()));
        let storage = Arc::new(Storage::open(&tmp).await.expect("open"));
        let options = GenerationRequest::new("AI in Healthcare", GenerationMode::Quick)
            .resolve()
            .expect("resolve");
        let job = GenerationJob::new("acme", options);
        storage.insert_job(&job).await.expect("insert");

        let reporter = StorageReporter::new(storage.clone(), job.id);
        reporter.log("Planning content").await;
        reporter.checkpoint(Stage::Plan, "Plan ready").await;

        let stored = storage.get_job(&job.id).await.expect("get").expect("exists");
        assert_eq!(stored.progress, 20);
        let messages: Vec<_> = stored.logs.iter().map(|l| l.message.as_str()).collect();
        assert_eq!(messages, ["Job queued", "Planning content", "Plan ready"]);
    }
}
