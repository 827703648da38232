use std::{
    io,
    path::{Path, PathBuf},
};

use common::{CacheMode, FileType, TaskQueue, TaskSpec};
use tokio::{fs::File, io::AsyncWriteExt};
use tracing::{debug, warn};

use crate::command::SubmitArgs;

/// Input compartido por todas las tareas sintéticas.
pub const INPUT_FILE: &str = "input.0";

const MIB: usize = 1024 * 1024;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SubmitReport {
    pub submitted: usize,
    pub failed: usize,
}

/// Genera cargas de trabajo de prueba.
///
/// Es dueño del contador de tareas: cada output se llama `output.<N>` con
/// N creciente durante toda la sesión, así dos tareas en vuelo nunca
/// comparten archivo de salida.
pub struct WorkloadSynth {
    workdir: PathBuf,
    next_task: u64,
}

impl WorkloadSynth {
    pub fn new(workdir: impl Into<PathBuf>, first_task: u64) -> Self {
        Self {
            workdir: workdir.into(),
            next_task: first_task,
        }
    }

    pub fn next_task(&self) -> u64 {
        self.next_task
    }

    pub fn input_path(&self) -> PathBuf {
        self.workdir.join(INPUT_FILE)
    }

    fn next_output_path(&mut self) -> PathBuf {
        let n = self.next_task;
        self.next_task += 1;
        self.workdir.join(format!("output.{n}"))
    }

    /// Escribe `size_mb` MiB de ceros en `input.0`.
    pub async fn generate_input(&self, size_mb: i64) -> io::Result<PathBuf> {
        let size_mb = usize::try_from(size_mb).map_err(|_| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("tamaño de input inválido: {size_mb} MB"),
            )
        })?;

        let path = self.input_path();
        let mut file = File::create(&path).await?;
        let block = vec![0u8; MIB];
        for _ in 0..size_mb {
            file.write_all(&block).await?;
        }
        file.flush().await?;
        Ok(path)
    }

    /// Arma una tarea que escribe `output_mb` MB de ceros y duerme `run_secs`.
    pub fn build_task(&mut self, input: &Path, run_secs: i64, output_mb: i64) -> TaskSpec {
        let output = self.next_output_path();
        TaskSpec::new(format!(
            "dd if=/dev/zero of=outfile bs=1M count={output_mb}; sleep {run_secs}"
        ))
        .specify_file(input, "infile", FileType::Input, CacheMode::Cache)
        .specify_file(output, "outfile", FileType::Output, CacheMode::NoCache)
        .specify_cores(1)
    }

    /// Genera el input una sola vez y envía `count` tareas.
    ///
    /// Los errores de generación y de envío se registran pero no se
    /// propagan: el comando `submit` nunca falla.
    pub async fn submit_tasks<Q: TaskQueue>(
        &mut self,
        queue: &mut Q,
        args: SubmitArgs,
    ) -> SubmitReport {
        if let Err(e) = self.generate_input(args.input_mb).await {
            warn!("no pude generar {}: {}", INPUT_FILE, e);
        }

        let input = self.input_path();
        let mut report = SubmitReport::default();
        for _ in 0..args.count.max(0) {
            let task = self.build_task(&input, args.run_secs, args.output_mb);
            match queue.submit(task).await {
                Ok(id) => {
                    debug!("tarea {} enviada", id);
                    report.submitted += 1;
                }
                Err(e) => {
                    warn!("falló el envío de una tarea: {}", e);
                    report.failed += 1;
                }
            }
        }

        if report.failed > 0 {
            warn!("{} de {} tareas no se pudieron enviar", report.failed, args.count);
        }
        report
    }
}
