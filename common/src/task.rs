use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

pub type TaskId = u64;

/// Dirección de un archivo asociado a la tarea.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Input,
    Output,
}

/// Si la cola puede reutilizar el archivo entre tareas sin volver a transferirlo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheMode {
    Cache,
    NoCache,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileBinding {
    /// Ruta local (origen para inputs, destino para outputs)
    pub local: PathBuf,
    /// Nombre del archivo dentro del sandbox de la tarea
    pub remote: String,
    pub cache: CacheMode,
}

/// Descripción de una tarea antes de enviarla a la cola.
///
/// Se construye igual que en la librería de colas clásica:
/// `new` con el comando, después `specify_file` por cada archivo y
/// `specify_cores`. Al hacer `submit` la cola se queda con el valor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSpec {
    pub command: String,
    pub inputs: Vec<FileBinding>,
    pub outputs: Vec<FileBinding>,
    pub cores: u32,
}

impl TaskSpec {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            cores: 1,
        }
    }

    pub fn specify_file(
        mut self,
        local: impl AsRef<Path>,
        remote: impl Into<String>,
        file_type: FileType,
        cache: CacheMode,
    ) -> Self {
        let binding = FileBinding {
            local: local.as_ref().to_path_buf(),
            remote: remote.into(),
            cache,
        };
        match file_type {
            FileType::Input => self.inputs.push(binding),
            FileType::Output => self.outputs.push(binding),
        }
        self
    }

    pub fn specify_cores(mut self, cores: u32) -> Self {
        self.cores = cores;
        self
    }

    pub fn input_files(&self) -> &[FileBinding] {
        &self.inputs
    }

    pub fn output_files(&self) -> &[FileBinding] {
        &self.outputs
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Success,
    /// El comando terminó con código distinto de cero (o por señal)
    CommandFailed,
    /// Un output declarado no apareció en el sandbox
    MissingOutput(String),
    /// No se pudo preparar el sandbox o copiar algún archivo
    StagingFailed(String),
}

/// Tarea devuelta por `TaskQueue::wait`. Soltar el valor la descarta.
#[derive(Debug, Clone)]
pub struct CompletedTask {
    pub id: TaskId,
    pub command: String,
    pub outcome: TaskOutcome,
    pub exit_code: Option<i32>,
    /// stdout + stderr del comando
    pub output: String,
    pub submitted_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl CompletedTask {
    pub fn succeeded(&self) -> bool {
        self.outcome == TaskOutcome::Success
    }

    /// Tiempo entre el submit y el fin de la tarea.
    pub fn elapsed(&self) -> chrono::Duration {
        self.finished_at - self.submitted_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn specify_file_separa_inputs_y_outputs() {
        let task = TaskSpec::new("cat infile > outfile")
            .specify_file("input.0", "infile", FileType::Input, CacheMode::Cache)
            .specify_file("output.7", "outfile", FileType::Output, CacheMode::NoCache)
            .specify_cores(2);

        assert_eq!(task.cores, 2);
        assert_eq!(task.input_files().len(), 1);
        assert_eq!(task.output_files().len(), 1);
        assert_eq!(task.input_files()[0].remote, "infile");
        assert_eq!(task.input_files()[0].cache, CacheMode::Cache);
        assert_eq!(task.output_files()[0].local, PathBuf::from("output.7"));
        assert_eq!(task.output_files()[0].cache, CacheMode::NoCache);
    }

    #[test]
    fn tarea_nueva_pide_un_core() {
        let task = TaskSpec::new("true");
        assert_eq!(task.cores, 1);
        assert!(task.inputs.is_empty());
        assert!(task.outputs.is_empty());
    }

    #[test]
    fn elapsed_mide_desde_el_submit() {
        let submitted_at = Utc::now();
        let task = CompletedTask {
            id: 3,
            command: "true".to_string(),
            outcome: TaskOutcome::Success,
            exit_code: Some(0),
            output: String::new(),
            submitted_at,
            finished_at: submitted_at + chrono::Duration::milliseconds(1500),
        };
        assert_eq!(task.elapsed().num_milliseconds(), 1500);
        assert!(task.succeeded());
    }
}
