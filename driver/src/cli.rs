use anyhow::{Context, Result};
use clap::Parser;
use std::{env, io, path::PathBuf, time::Duration};
use tokio::io::BufReader;
use tracing_subscriber::EnvFilter;
use worker::{LocalQueue, LocalQueueConfig};

use crate::{
    interpreter::{Interpreter, Settings},
    interrupt::Interrupt,
    synth::WorkloadSynth,
};

/// Directorio de trabajo:
/// - DRIVER_WORKDIR si está definida
/// - si no, el directorio actual
fn default_workdir() -> PathBuf {
    env::var_os("DRIVER_WORKDIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}

#[derive(Parser, Debug)]
#[command(name = "driver")]
#[command(about = "Driver interactivo para probar una cola de tareas")]
struct Cli {
    /// Dónde se generan input.0 y output.N (y la cola local)
    #[arg(long, value_name = "DIR", default_value_os_t = default_workdir())]
    workdir: PathBuf,

    /// Cores de la cola local (DRIVER_CORES o los CPUs de la máquina)
    #[arg(long, value_name = "N", default_value_t = worker::default_cores())]
    cores: u32,

    /// Timeout de cada wait mientras se vacía la cola
    #[arg(long, value_name = "SECS", default_value_t = 5)]
    wait_timeout: u64,

    /// Primer N para los nombres output.N
    #[arg(long, value_name = "N", default_value_t = 0)]
    first_task: u64,

    /// Esperar a las tareas pendientes antes de salir
    #[arg(long)]
    drain_on_exit: bool,

    #[arg(long, default_value = "driver > ")]
    prompt: String,

    /// Leer comandos de un archivo en vez de stdin
    #[arg(long, value_name = "FILE")]
    script: Option<PathBuf>,
}

impl Cli {
    fn settings(&self) -> Settings {
        Settings {
            prompt: self.prompt.clone(),
            wait_timeout: Duration::from_secs(self.wait_timeout),
            drain_on_exit: self.drain_on_exit,
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("driver=info,worker=warn"));

    // logs a stderr para no mezclarlos con el prompt
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    tokio::fs::create_dir_all(&cli.workdir)
        .await
        .with_context(|| format!("no pude crear {}", cli.workdir.display()))?;

    // el script se abre antes de crear la cola: si falla no hay nada que cerrar
    let script = match &cli.script {
        Some(path) => Some(
            tokio::fs::File::open(path)
                .await
                .with_context(|| format!("no pude abrir el script {}", path.display()))?,
        ),
        None => None,
    };

    let queue = LocalQueue::new(LocalQueueConfig::new(&cli.workdir).with_cores(cli.cores));
    let synth = WorkloadSynth::new(&cli.workdir, cli.first_task);
    let interrupt = Interrupt::new();
    interrupt.listen_ctrl_c();

    let interpreter = Interpreter::new(queue, synth, cli.settings(), interrupt);
    let mut out = io::stdout();
    let mut err = io::stderr();

    match script {
        Some(file) => interpreter.run(BufReader::new(file), &mut out, &mut err).await,
        None => {
            interpreter
                .run(BufReader::new(tokio::io::stdin()), &mut out, &mut err)
                .await
        }
    }
}
