use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use courier::jobs::{
    enqueue, enqueue_with, Job, JobOpts, JobRegistry, JobResult, JobStatus, MemoryQueue, Worker,
};
use serde::{Deserialize, Serialize};

#[derive(Default)]
struct Counter {
    runs: AtomicUsize,
}

#[derive(Serialize, Deserialize)]
struct Tick {
    fail: bool,
}

#[async_trait]
impl Job for Tick {
    const JOB_TYPE: &'static str = "test::tick";
    type Context = Counter;

    fn default_opts() -> JobOpts {
        JobOpts {
            max_attempts: 1,
            ..Default::default()
        }
    }

    async fn perform(self, ctx: &Counter) -> JobResult {
        ctx.runs.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err("boom".into());
        }
        Ok(Some(serde_json::json!({ "ok": true })))
    }
}

fn worker(queue: &Arc<MemoryQueue>) -> Worker<Counter> {
    Worker::new(
        queue.clone(),
        JobRegistry::new().register::<Tick>(),
        Counter::default(),
    )
}

#[tokio::test]
async fn completes_and_records_result() {
    let queue = Arc::new(MemoryQueue::new());
    let id = enqueue(queue.as_ref(), Tick { fail: false }).await.unwrap();

    let status = worker(&queue).work_once().await.unwrap();
    assert_eq!(status, Some(JobStatus::Completed));

    let entry = queue.get(id).await.unwrap();
    assert_eq!(entry.result, Some(serde_json::json!({ "ok": true })));
    assert!(entry.completed_at.is_some());
}

#[tokio::test]
async fn exhausted_jobs_fail_permanently() {
    let queue = Arc::new(MemoryQueue::new());
    let id = enqueue(queue.as_ref(), Tick { fail: true }).await.unwrap();

    let status = worker(&queue).work_once().await.unwrap();
    assert_eq!(status, Some(JobStatus::Failed));

    let entry = queue.get(id).await.unwrap();
    assert_eq!(entry.last_error.as_deref(), Some("boom"));
}

#[tokio::test]
async fn unknown_job_types_fail() {
    let queue = Arc::new(MemoryQueue::new());
    let registry: JobRegistry<Counter> = JobRegistry::new();
    assert!(!registry.contains(Tick::JOB_TYPE));

    enqueue(queue.as_ref(), Tick { fail: false }).await.unwrap();
    let worker = Worker::new(queue.clone(), registry, Counter::default());

    assert_eq!(worker.work_once().await.unwrap(), Some(JobStatus::Failed));
}

#[tokio::test]
async fn expired_jobs_are_skipped() {
    let queue = Arc::new(MemoryQueue::new());
    let opts = JobOpts {
        expires_in: Some(Duration::ZERO),
        ..Default::default()
    };
    enqueue_with(queue.as_ref(), Tick { fail: false }, opts)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;

    assert_eq!(
        worker(&queue).work_once().await.unwrap(),
        Some(JobStatus::Expired)
    );
}

#[tokio::test]
async fn workers_only_drain_their_queue() {
    let queue = Arc::new(MemoryQueue::new());
    let opts = JobOpts {
        queue: "reports".into(),
        ..Default::default()
    };
    enqueue_with(queue.as_ref(), Tick { fail: false }, opts)
        .await
        .unwrap();

    assert_eq!(worker(&queue).work_once().await.unwrap(), None);
    assert_eq!(
        worker(&queue).queue("reports").work_once().await.unwrap(),
        Some(JobStatus::Completed)
    );
}

#[tokio::test]
async fn started_worker_processes_in_background() {
    let queue = Arc::new(MemoryQueue::new());
    let id = enqueue(queue.as_ref(), Tick { fail: false }).await.unwrap();

    worker(&queue)
        .poll_interval(Duration::from_millis(10))
        .start();

    for _ in 0..100 {
        if queue.get(id).await.map(|e| e.status) == Some(JobStatus::Completed) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job was not processed");
}
