//! Single-consumer FIFO task queue with an inflight sub-task registry
//! for cooperative cancellation.
//!
//! Grounded in `examples/original_source/app/queue.py::JobQueue`: an
//! `asyncio.Queue` for submission plus `_inflight: Dict[str,
//! List[asyncio.Task]]` so `cancel(task_id)` can abort every
//! concurrently-running candidate a strategy spawned for that task.

use std::collections::HashMap;
use std::sync::Arc;

use orc_sse_hub::SseHub;
use orc_types::Task;
use tokio::sync::{mpsc, Mutex};
use tokio::task::AbortHandle;
use uuid::Uuid;

/// FIFO submission side. Cloning is cheap; every clone submits onto the
/// same underlying channel.
#[derive(Clone)]
pub struct JobQueueHandle {
    sender: mpsc::UnboundedSender<Task>,
    inflight: Arc<Mutex<HashMap<Uuid, Vec<AbortHandle>>>>,
    sse_hub: SseHub,
}

/// Single-consumer side; only the worker loop holds this.
pub struct JobQueueReceiver {
    receiver: mpsc::UnboundedReceiver<Task>,
}

pub fn job_queue(sse_hub: SseHub) -> (JobQueueHandle, JobQueueReceiver) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (
        JobQueueHandle {
            sender,
            inflight: Arc::new(Mutex::new(HashMap::new())),
            sse_hub,
        },
        JobQueueReceiver { receiver },
    )
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("worker loop is no longer receiving tasks")]
    Closed,
}

impl JobQueueHandle {
    /// Enqueue `task`. Never blocks — the worker loop is the sole FIFO
    /// consumer and never interleaves tasks at the top level, per §5.
    pub fn submit(&self, task: Task) -> Result<(), QueueError> {
        self.sender.send(task).map_err(|_| QueueError::Closed)
    }

    /// Register the abort handles for every cooperative sub-task a
    /// strategy spawned for `task_id`, replacing any prior registration.
    pub async fn register_inflight(&self, task_id: Uuid, handles: Vec<AbortHandle>) {
        self.inflight.lock().await.insert(task_id, handles);
    }

    /// Drop `task_id`'s inflight registration once the task has reached
    /// a terminal state; a no-op if nothing was registered.
    pub async fn clear_inflight(&self, task_id: Uuid) {
        self.inflight.lock().await.remove(&task_id);
    }

    /// Abort every registered sub-task for `task_id` and publish a
    /// `{"status": "canceled"}` frame. Returns `true` iff an inflight
    /// registration existed (i.e. the task was actually running).
    /// Updating the task's persisted status is the caller's
    /// responsibility, since this queue has no store dependency.
    pub async fn cancel(&self, task_id: Uuid) -> bool {
        let handles = self.inflight.lock().await.remove(&task_id);
        let was_running = handles.is_some();
        for handle in handles.into_iter().flatten() {
            handle.abort();
        }
        self.sse_hub
            .publish(task_id, &serde_json::json!({ "status": "canceled" }))
            .await;
        was_running
    }
}

impl JobQueueReceiver {
    /// Dequeue the next task FIFO. Returns `None` once every
    /// [`JobQueueHandle`] has been dropped.
    pub async fn recv(&mut self) -> Option<Task> {
        self.receiver.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orc_types::{Constraints, InputSpec, Metadata, RepoSpec, TaskType};

    fn sample_task() -> Task {
        Task::new_queued(
            TaskType::Code,
            InputSpec {
                goal: "implement a thing".into(),
                language: Some("java".into()),
                frameworks: vec![],
                repo: RepoSpec::default(),
                constraints: Constraints::default(),
            },
            None,
            None,
            Metadata::default(),
            "v1",
        )
    }

    #[tokio::test]
    async fn submit_then_recv_is_fifo() {
        let (handle, mut receiver) = job_queue(SseHub::new());
        let t1 = sample_task();
        let t2 = sample_task();
        let id1 = t1.id;
        handle.submit(t1).unwrap();
        handle.submit(t2).unwrap();

        let first = receiver.recv().await.unwrap();
        assert_eq!(first.id, id1);
    }

    #[tokio::test]
    async fn cancel_without_registration_returns_false() {
        let (handle, _receiver) = job_queue(SseHub::new());
        let was_running = handle.cancel(Uuid::new_v4()).await;
        assert!(!was_running);
    }

    #[tokio::test]
    async fn cancel_aborts_registered_handles_and_publishes_status() {
        let (handle, _receiver) = job_queue(SseHub::new());
        let task_id = Uuid::new_v4();
        let join = tokio::spawn(async {
            tokio::time::sleep(std::time::Duration::from_secs(60)).await;
        });
        handle.register_inflight(task_id, vec![join.abort_handle()]).await;

        let mut sub = handle.sse_hub.subscribe(task_id).await;
        let was_running = handle.cancel(task_id).await;
        assert!(was_running);

        let msg = sub.recv().await.unwrap();
        assert!(msg.contains("canceled"));
        assert!(join.await.unwrap_err().is_cancelled());
    }
}
