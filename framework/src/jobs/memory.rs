use async_trait::async_trait;
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::entry::JobEntry;
use super::traits::QueueProvider;
use super::JobError;

/// In-memory [`QueueProvider`] for development and testing.
///
/// Jobs are stored in a `Vec` behind a mutex. Not durable: all jobs are lost
/// on restart.
#[derive(Clone, Default)]
pub struct MemoryQueue {
    entries: Arc<Mutex<Vec<JobEntry>>>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every entry, in insertion order.
    pub async fn entries(&self) -> Vec<JobEntry> {
        self.entries.lock().await.clone()
    }

    pub async fn get(&self, id: Uuid) -> Option<JobEntry> {
        let entries = self.entries.lock().await;
        entries.iter().find(|e| e.id == id).cloned()
    }
}

#[async_trait]
impl QueueProvider for MemoryQueue {
    async fn insert(&self, entry: &JobEntry) -> Result<(), JobError> {
        let mut entries = self.entries.lock().await;
        entries.push(entry.clone());
        Ok(())
    }

    async fn claim_next(
        &self,
        worker_id: &str,
        queue: &str,
    ) -> Result<Option<JobEntry>, JobError> {
        let mut entries = self.entries.lock().await;
        let now = OffsetDateTime::now_utc();

        let Some(entry) = entries.iter_mut().find(|e| e.is_claimable(queue, now)) else {
            return Ok(None);
        };
        entry.claim(worker_id, now);
        Ok(Some(entry.clone()))
    }

    async fn update(&self, entry: &JobEntry) -> Result<(), JobError> {
        let mut entries = self.entries.lock().await;
        if let Some(existing) = entries.iter_mut().find(|e| e.id == entry.id) {
            *existing = entry.clone();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::{JobOpts, JobStatus};
    use std::time::Duration;

    fn entry(queue: &str, delay: Option<Duration>) -> JobEntry {
        let opts = JobOpts {
            queue: queue.to_string(),
            delay,
            ..Default::default()
        };
        JobEntry::new("test", serde_json::json!({}), &opts)
    }

    #[tokio::test]
    async fn claims_only_from_the_named_queue() {
        let queue = MemoryQueue::new();
        queue.insert(&entry("mail", None)).await.unwrap();

        assert!(queue.claim_next("w1", "default").await.unwrap().is_none());

        let claimed = queue.claim_next("w1", "mail").await.unwrap().unwrap();
        assert_eq!(claimed.status, JobStatus::Running);
        assert_eq!(claimed.attempts, 1);
        assert_eq!(claimed.locked_by.as_deref(), Some("w1"));

        assert!(queue.claim_next("w2", "mail").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delayed_entries_are_not_claimable_yet() {
        let queue = MemoryQueue::new();
        queue
            .insert(&entry("default", Some(Duration::from_secs(3600))))
            .await
            .unwrap();

        assert!(queue.claim_next("w1", "default").await.unwrap().is_none());
        assert_eq!(queue.entries().await.len(), 1);
    }
}
