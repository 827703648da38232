use std::{
    io,
    path::PathBuf,
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use async_trait::async_trait;
use chrono::Utc;
use common::{
    queue::Result, CompletedTask, QueueError, QueueStats, TaskId, TaskOutcome, TaskQueue, TaskSpec,
};
use tokio::{
    sync::{mpsc, Semaphore},
    task::JoinSet,
    time::timeout,
};
use tracing::{debug, info, warn};

use crate::{
    cache::InputCache,
    config::LocalQueueConfig,
    sandbox::{valid_remote_name, OutputError, Sandbox},
};

/// Lo que comparten todas las tareas en vuelo.
struct Shared {
    cores: Arc<Semaphore>,
    cache: InputCache,
    sandbox_root: PathBuf,
    stats: Mutex<QueueStats>,
    done_tx: mpsc::UnboundedSender<CompletedTask>,
}

impl Shared {
    fn stats(&self) -> MutexGuard<'_, QueueStats> {
        self.stats.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Waiting,
    Running,
    Done,
}

/// Lugar que ocupa una tarea en `QueueStats` hasta entregar su resultado.
///
/// Si la tarea se aborta o entra en pánico, el drop devuelve el contador
/// que tenía tomado y la cola puede quedar vacía.
struct Slot {
    shared: Arc<Shared>,
    phase: Phase,
}

impl Slot {
    fn waiting(shared: Arc<Shared>) -> Self {
        shared.stats().waiting += 1;
        Self {
            shared,
            phase: Phase::Waiting,
        }
    }

    fn start(&mut self) {
        if self.phase == Phase::Waiting {
            let mut stats = self.shared.stats();
            stats.waiting -= 1;
            stats.running += 1;
        }
        self.phase = Phase::Running;
    }

    /// Pasa a `complete`; desde ahí el contador lo baja `wait`.
    fn finish(&mut self) {
        if self.phase == Phase::Running {
            let mut stats = self.shared.stats();
            stats.running -= 1;
            stats.complete += 1;
        }
        self.phase = Phase::Done;
    }
}

impl Drop for Slot {
    fn drop(&mut self) {
        let mut stats = self.shared.stats();
        match self.phase {
            Phase::Waiting => stats.waiting -= 1,
            Phase::Running => stats.running -= 1,
            Phase::Done => {}
        }
    }
}

/// Cola de tareas que ejecuta todo en la máquina local.
///
/// Cada tarea corre con `sh -c` dentro de su propio sandbox y ocupa
/// `cores` permisos del semáforo mientras corre, así que nunca hay más
/// cores en uso que los configurados.
pub struct LocalQueue {
    config: LocalQueueConfig,
    session_root: PathBuf,
    shared: Arc<Shared>,
    tasks: JoinSet<()>,
    done_rx: mpsc::UnboundedReceiver<CompletedTask>,
    next_id: TaskId,
}

impl LocalQueue {
    pub fn new(config: LocalQueueConfig) -> Self {
        let (done_tx, done_rx) = mpsc::unbounded_channel();
        let session_root = config.session_root(&uuid::Uuid::new_v4().to_string());
        let shared = Shared {
            cores: Arc::new(Semaphore::new(config.cores as usize)),
            cache: InputCache::new(session_root.join("cache")),
            sandbox_root: session_root.join("sandbox"),
            stats: Mutex::new(QueueStats::default()),
            done_tx,
        };

        info!(
            "cola local en {} con {} cores",
            session_root.display(),
            config.cores
        );

        Self {
            config,
            session_root,
            shared: Arc::new(shared),
            tasks: JoinSet::new(),
            done_rx,
            next_id: 1,
        }
    }

    pub fn cores(&self) -> u32 {
        self.config.cores
    }

    fn validate(&self, task: &TaskSpec) -> Result<()> {
        if task.cores > self.config.cores {
            return Err(QueueError::TooManyCores {
                requested: task.cores,
                available: self.config.cores,
            });
        }

        for binding in task.input_files().iter().chain(task.output_files()) {
            if !valid_remote_name(&binding.remote) {
                return Err(QueueError::InvalidBinding(format!(
                    "nombre remoto '{}' para {}",
                    binding.remote,
                    binding.local.display()
                )));
            }
        }
        Ok(())
    }

    fn reap_finished(&mut self) {
        while let Some(res) = self.tasks.try_join_next() {
            match res {
                Err(e) if e.is_panic() => warn!("tarea local entró en pánico: {:?}", e),
                Err(e) => debug!("tarea local abortada: {:?}", e),
                Ok(()) => {}
            }
        }
    }
}

#[async_trait]
impl TaskQueue for LocalQueue {
    async fn submit(&mut self, task: TaskSpec) -> Result<TaskId> {
        if self.shared.cores.is_closed() {
            return Err(QueueError::Closed);
        }
        self.validate(&task)?;

        let id = self.next_id;
        self.next_id += 1;
        let mut slot = Slot::waiting(self.shared.clone());

        debug!("encolando tarea {} ({} cores): {}", id, task.cores, task.command);
        self.tasks.spawn(async move {
            let done = run_task(id, task, &mut slot).await;
            slot.finish();
            // si el receptor ya no existe la cola se está cerrando
            let _ = slot.shared.done_tx.send(done);
        });

        Ok(id)
    }

    fn is_empty(&self) -> bool {
        self.shared.stats().outstanding() == 0
    }

    fn stats(&self) -> QueueStats {
        *self.shared.stats()
    }

    async fn wait(&mut self, wait_for: Duration) -> Result<Option<CompletedTask>> {
        self.reap_finished();
        if self.is_empty() {
            return Ok(None);
        }

        match timeout(wait_for, self.done_rx.recv()).await {
            Ok(Some(task)) => {
                self.shared.stats().complete -= 1;
                debug!("tarea {} recuperada ({:?})", task.id, task.outcome);
                Ok(Some(task))
            }
            Ok(None) => Err(QueueError::Closed),
            Err(_) => Ok(None),
        }
    }

    async fn shutdown(mut self) -> Result<()> {
        let stats = self.stats();
        info!(
            "cerrando cola local (esperando={}, corriendo={}, completas={})",
            stats.waiting, stats.running, stats.complete
        );

        self.shared.cores.close();
        self.tasks.shutdown().await;

        match tokio::fs::remove_dir_all(&self.session_root).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        // `.queue` solo se va si no quedó nada más adentro
        if let Err(e) = tokio::fs::remove_dir(self.config.queue_root()).await {
            debug!("dejo {}: {}", self.config.queue_root().display(), e);
        }
        Ok(())
    }
}

async fn run_task(id: TaskId, task: TaskSpec, slot: &mut Slot) -> CompletedTask {
    let submitted_at = Utc::now();
    let shared = slot.shared.clone();

    // cores == 0 se adquiere al instante
    let permit = shared.cores.clone().acquire_many_owned(task.cores).await;
    slot.start();

    let (outcome, exit_code, output) = match permit {
        Ok(_permit) => execute(id, &task, &shared).await,
        Err(_) => (
            TaskOutcome::StagingFailed("la cola está cerrada".to_string()),
            None,
            String::new(),
        ),
    };

    CompletedTask {
        id,
        command: task.command,
        outcome,
        exit_code,
        output,
        submitted_at,
        finished_at: Utc::now(),
    }
}

async fn execute(id: TaskId, task: &TaskSpec, shared: &Shared) -> (TaskOutcome, Option<i32>, String) {
    let sandbox = match Sandbox::create(&shared.sandbox_root).await {
        Ok(sb) => sb,
        Err(e) => {
            warn!("tarea {}: no pude crear sandbox: {}", id, e);
            return (TaskOutcome::StagingFailed(e.to_string()), None, String::new());
        }
    };
    debug!("tarea {} corre en {}", id, sandbox.path().display());

    let result = async {
        if let Err(e) = sandbox.stage_inputs(task.input_files(), &shared.cache).await {
            warn!("tarea {}: {}", id, e);
            return (TaskOutcome::StagingFailed(e), None, String::new());
        }

        let run = match sandbox.run(&task.command).await {
            Ok(run) => run,
            Err(e) => {
                warn!("tarea {}: no pude lanzar el comando: {}", id, e);
                return (TaskOutcome::StagingFailed(e.to_string()), None, String::new());
            }
        };

        let outcome = match sandbox.collect_outputs(task.output_files()).await {
            Err(OutputError::Missing(name)) => TaskOutcome::MissingOutput(name),
            Err(OutputError::Copy(msg)) => TaskOutcome::StagingFailed(msg),
            Ok(()) if run.success => TaskOutcome::Success,
            Ok(()) => TaskOutcome::CommandFailed,
        };

        info!("tarea {} terminó: {:?} (exit={:?})", id, outcome, run.exit_code);
        (outcome, run.exit_code, run.output)
    }
    .await;

    sandbox.remove().await;
    result
}
