use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::task::{CompletedTask, TaskId, TaskSpec};

pub type Result<T> = std::result::Result<T, QueueError>;

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("binding inválido: {0}")]
    InvalidBinding(String),

    #[error("la tarea pide {requested} cores pero la cola solo tiene {available}")]
    TooManyCores { requested: u32, available: u32 },

    #[error("la cola está cerrada")]
    Closed,
}

/// Tareas enviadas y todavía no recuperadas con `wait`, por estado.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub waiting: usize,
    pub running: usize,
    pub complete: usize,
}

impl QueueStats {
    pub fn outstanding(&self) -> usize {
        self.waiting + self.running + self.complete
    }
}

/// Sesión de cola de tareas ya inicializada.
///
/// El driver solo usa estas operaciones; quién ejecuta las tareas y dónde
/// queda del lado de la implementación.
#[async_trait]
pub trait TaskQueue: Send {
    /// Encola la tarea. La cola pasa a ser dueña de ella.
    async fn submit(&mut self, task: TaskSpec) -> Result<TaskId>;

    /// `true` si no queda ninguna tarea enviada sin recuperar.
    fn is_empty(&self) -> bool;

    fn stats(&self) -> QueueStats;

    /// Espera hasta `timeout` a que termine alguna tarea.
    /// `Ok(None)` si se agotó el tiempo o la cola está vacía.
    async fn wait(&mut self, timeout: Duration) -> Result<Option<CompletedTask>>;

    /// Libera la cola. Consume el handle, así que solo puede pasar una vez.
    async fn shutdown(self) -> Result<()>
    where
        Self: Sized;
}
