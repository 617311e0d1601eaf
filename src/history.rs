use sqlx::SqlitePool;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;

use crate::db_helpers::record_history_in_db;
use crate::models::Article;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryAction {
    Create,
    Patch,
}

impl HistoryAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryAction::Create => "create",
            HistoryAction::Patch => "patch",
        }
    }
}

#[derive(Debug)]
pub struct HistoryJob {
    pub action: HistoryAction,
    pub article: Article,
}

/// Handle to the background history writer.
///
/// Recording is fire-and-forget: the handler that mutated the article has
/// already answered by the time the entry is written, and a job that cannot
/// be queued or written is logged and dropped.
#[derive(Debug, Clone)]
pub struct HistoryRecorder {
    sender: mpsc::Sender<HistoryJob>,
}

impl HistoryRecorder {
    /// Spawns the single worker that drains the queue. The worker stops once
    /// every `HistoryRecorder` clone has been dropped and the queue is empty.
    pub fn start(pool: SqlitePool, capacity: usize) -> (Self, JoinHandle<()>) {
        let (sender, mut receiver) = mpsc::channel::<HistoryJob>(capacity);
        let worker = tokio::spawn(async move {
            while let Some(job) = receiver.recv().await {
                match record_history_in_db(&pool, job.action.as_str(), &job.article).await {
                    Ok(history) => tracing::debug!(
                        article_id = history.article_id,
                        version = history.version,
                        action = %history.action,
                        "Recorded article history"
                    ),
                    Err(e) => tracing::error!(
                        article_id = job.article.id,
                        action = job.action.as_str(),
                        error = %e,
                        "Failed to record article history"
                    ),
                }
            }
            tracing::debug!("History worker stopped");
        });
        (HistoryRecorder { sender }, worker)
    }

    /// Queues a snapshot of `article`. Never blocks.
    pub fn record(&self, action: HistoryAction, article: Article) {
        let article_id = article.id;
        match self.sender.try_send(HistoryJob { action, article }) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => tracing::warn!(
                article_id,
                action = action.as_str(),
                "History queue is full, dropping entry"
            ),
            Err(TrySendError::Closed(_)) => tracing::warn!(
                article_id,
                action = action.as_str(),
                "History worker is gone, dropping entry"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    fn article() -> Article {
        let now = NaiveDateTime::from_timestamp_opt(0, 0).unwrap();
        Article {
            id: 1,
            uuid: "a".to_string(),
            title: "Hello".to_string(),
            content: "x".to_string(),
            status: "DRAFT".to_string(),
            writer_id: 1,
            slug: "hello".to_string(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    #[test]
    fn actions_have_stable_labels() {
        assert_eq!(HistoryAction::Create.as_str(), "create");
        assert_eq!(HistoryAction::Patch.as_str(), "patch");
    }

    #[tokio::test]
    async fn record_drops_jobs_instead_of_blocking() {
        let (sender, mut receiver) = mpsc::channel(1);
        let recorder = HistoryRecorder { sender };

        recorder.record(HistoryAction::Create, article());
        recorder.record(HistoryAction::Patch, article());

        let job = receiver.recv().await.unwrap();
        assert_eq!(job.action, HistoryAction::Create);
        assert!(receiver.try_recv().is_err());

        drop(receiver);
        recorder.record(HistoryAction::Patch, article());
    }
}
