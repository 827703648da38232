// Cola falsa para los tests del driver: registra todo lo que recibe.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use chrono::Utc;
use common::{
    queue::Result, CompletedTask, QueueError, QueueStats, TaskId, TaskOutcome, TaskQueue, TaskSpec,
};

#[derive(Default)]
pub struct Recorded {
    pub submitted: Vec<TaskSpec>,
    pub pending: VecDeque<TaskId>,
    pub waits: usize,
    pub shutdowns: usize,
}

pub struct FakeQueue {
    log: Arc<Mutex<Recorded>>,
    pub reject_submits: bool,
    /// Si es true, una de cada dos llamadas a `wait` agota el timeout
    pub flaky_wait: bool,
    /// Si es true, `wait` nunca devuelve nada
    pub stuck: bool,
    /// Si es true, `wait` devuelve error
    pub fail_wait: bool,
}

impl FakeQueue {
    pub fn new() -> (Self, Arc<Mutex<Recorded>>) {
        let log = Arc::new(Mutex::new(Recorded::default()));
        let queue = Self {
            log: log.clone(),
            reject_submits: false,
            flaky_wait: false,
            stuck: false,
            fail_wait: false,
        };
        (queue, log)
    }
}

#[async_trait]
impl TaskQueue for FakeQueue {
    async fn submit(&mut self, task: TaskSpec) -> Result<TaskId> {
        if self.reject_submits {
            return Err(QueueError::Closed);
        }
        let mut log = self.log.lock().unwrap();
        log.submitted.push(task);
        let id = log.submitted.len() as TaskId;
        log.pending.push_back(id);
        Ok(id)
    }

    fn is_empty(&self) -> bool {
        self.log.lock().unwrap().pending.is_empty()
    }

    fn stats(&self) -> QueueStats {
        QueueStats {
            running: self.log.lock().unwrap().pending.len(),
            ..QueueStats::default()
        }
    }

    async fn wait(&mut self, timeout: Duration) -> Result<Option<CompletedTask>> {
        let popped = {
            let mut log = self.log.lock().unwrap();
            log.waits += 1;
            if self.fail_wait {
                return Err(QueueError::Closed);
            }
            if self.stuck || (self.flaky_wait && log.waits % 2 == 1) {
                None
            } else {
                log.pending.pop_front()
            }
        };

        let Some(id) = popped else {
            tokio::time::sleep(timeout.min(Duration::from_millis(10))).await;
            return Ok(None);
        };

        let now = Utc::now();
        Ok(Some(CompletedTask {
            id,
            command: "true".to_string(),
            outcome: TaskOutcome::Success,
            exit_code: Some(0),
            output: String::new(),
            submitted_at: now,
            finished_at: now,
        }))
    }

    async fn shutdown(self) -> Result<()> {
        self.log.lock().unwrap().shutdowns += 1;
        Ok(())
    }
}
