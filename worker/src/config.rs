use std::{env, path::PathBuf};

use sysinfo::{System, SystemExt};

/// Cores que la cola local reparte entre tareas.
/// - Si existe DRIVER_CORES (> 0) se usa ese valor
/// - Si no, los CPUs lógicos que reporta sysinfo
pub fn default_cores() -> u32 {
    env::var("DRIVER_CORES")
        .ok()
        .and_then(|s| s.parse::<u32>().ok())
        .filter(|n| *n > 0)
        .unwrap_or_else(detected_cores)
}

fn detected_cores() -> u32 {
    let mut sys = System::new();
    sys.refresh_cpu();
    (sys.cpus().len() as u32).max(1)
}

#[derive(Debug, Clone)]
pub struct LocalQueueConfig {
    /// Directorio base; cada sesión de cola vive en `.queue/<uuid>/`
    pub workdir: PathBuf,
    pub cores: u32,
}

impl LocalQueueConfig {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
            cores: default_cores(),
        }
    }

    pub fn with_cores(mut self, cores: u32) -> Self {
        self.cores = cores.max(1);
        self
    }

    pub(crate) fn queue_root(&self) -> PathBuf {
        self.workdir.join(".queue")
    }

    /// Raíz de una sesión. Solo esta carpeta se borra al cerrar la cola.
    pub(crate) fn session_root(&self, session: &str) -> PathBuf {
        self.queue_root().join(session)
    }
}
