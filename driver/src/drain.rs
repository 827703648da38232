use std::time::Duration;

use common::{QueueError, TaskQueue};
use tracing::debug;

/// Timeout de cada `wait` dentro del drain.
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Espera y descarta tareas hasta que la cola queda vacía.
///
/// No tiene límite de iteraciones; un `wait` que agota el timeout no es
/// error. Devuelve cuántas tareas se recuperaron.
pub async fn drain<Q: TaskQueue>(queue: &mut Q, timeout: Duration) -> Result<usize, QueueError> {
    let mut retrieved = 0;
    while !queue.is_empty() {
        if let Some(task) = queue.wait(timeout).await? {
            debug!(
                "descartando tarea {} ({:?}, {} ms)",
                task.id,
                task.outcome,
                task.elapsed().num_milliseconds()
            );
            retrieved += 1;
        }
    }
    Ok(retrieved)
}
