use std::{io::Write, time::Duration};

use anyhow::{Context, Result};
use common::TaskQueue;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, info, warn};

use crate::{
    command::{Command, HELP},
    drain::{drain, DEFAULT_WAIT_TIMEOUT},
    interrupt::Interrupt,
    synth::WorkloadSynth,
};

#[derive(Debug, Clone)]
pub struct Settings {
    pub prompt: String,
    pub wait_timeout: Duration,
    /// Esperar a las tareas pendientes antes de cerrar la cola
    pub drain_on_exit: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            prompt: "driver > ".to_string(),
            wait_timeout: DEFAULT_WAIT_TIMEOUT,
            drain_on_exit: false,
        }
    }
}

enum Flow {
    Continue,
    Exit,
}

/// Loop interactivo: prompt, leer línea, ejecutar, repetir.
///
/// `run` consume el intérprete y cierra la cola exactamente una vez,
/// salga por `quit`/`exit`, por fin de entrada o por una interrupción en
/// el prompt.
pub struct Interpreter<Q> {
    queue: Q,
    synth: WorkloadSynth,
    settings: Settings,
    interrupt: Interrupt,
}

impl<Q: TaskQueue> Interpreter<Q> {
    pub fn new(queue: Q, synth: WorkloadSynth, settings: Settings, interrupt: Interrupt) -> Self {
        Self {
            queue,
            synth,
            settings,
            interrupt,
        }
    }

    pub async fn run<R, W, E>(mut self, input: R, out: &mut W, err: &mut E) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: Write,
        E: Write,
    {
        let looped = self.command_loop(input, out, err).await;

        if self.settings.drain_on_exit && looped.is_ok() {
            info!("esperando tareas pendientes antes de salir");
            if let Err(e) = self.wait_all(err).await {
                warn!("no pude reportar el drain de salida: {}", e);
            }
        }

        let closed = self.queue.shutdown().await;
        looped.context("error leyendo o escribiendo comandos")?;
        closed.context("error cerrando la cola")?;
        Ok(())
    }

    async fn command_loop<R, W, E>(&mut self, input: R, out: &mut W, err: &mut E) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: Write,
        E: Write,
    {
        let mut lines = input.lines();
        loop {
            write!(out, "{}", self.settings.prompt)?;
            out.flush()?;

            let line = tokio::select! {
                line = lines.next_line() => line?,
                _ = self.interrupt.triggered() => {
                    writeln!(out)?;
                    info!("interrupción en el prompt, saliendo");
                    None
                }
            };

            let Some(line) = line else {
                debug!("fin de la entrada");
                break;
            };

            if let Flow::Exit = self.dispatch(&line, out, err).await? {
                break;
            }
        }
        Ok(())
    }

    async fn dispatch<W: Write, E: Write>(
        &mut self,
        line: &str,
        out: &mut W,
        err: &mut E,
    ) -> std::io::Result<Flow> {
        match Command::parse(line) {
            Command::Sleep(secs) => {
                writeln!(out, "durmiendo {} segundos...", secs)?;
                out.flush()?;
                let pause = Duration::from_secs(secs.max(0) as u64);
                tokio::select! {
                    _ = tokio::time::sleep(pause) => {}
                    _ = self.interrupt.triggered() => {
                        writeln!(err, "sleep interrumpido")?;
                    }
                }
            }
            Command::Wait => {
                writeln!(out, "esperando a todas las tareas...")?;
                out.flush()?;
                self.wait_all(err).await?;
            }
            Command::Submit(args) => {
                writeln!(out, "enviando {} tareas...", args.count)?;
                out.flush()?;
                let report = self.synth.submit_tasks(&mut self.queue, args).await;
                info!(
                    "submit: {} enviadas, {} fallidas (siguiente output.{})",
                    report.submitted,
                    report.failed,
                    self.synth.next_task()
                );
            }
            Command::Quit => return Ok(Flow::Exit),
            Command::Help => {
                out.write_all(HELP.as_bytes())?;
            }
            Command::Comment => {}
            Command::Malformed(line) => {
                writeln!(err, "ignorando línea mal formada: {}", line)?;
            }
        }
        Ok(Flow::Continue)
    }

    /// Drain cancelable: una interrupción corta la espera y vuelve al prompt.
    async fn wait_all<E: Write>(&mut self, err: &mut E) -> std::io::Result<()> {
        let timeout = self.settings.wait_timeout;
        let drained = tokio::select! {
            res = drain(&mut self.queue, timeout) => Some(res),
            _ = self.interrupt.triggered() => None,
        };

        match drained {
            Some(Ok(n)) => info!("{} tareas recuperadas", n),
            Some(Err(e)) => writeln!(err, "error esperando tareas: {}", e)?,
            None => writeln!(
                err,
                "wait interrumpido ({} tareas pendientes)",
                self.queue.stats().outstanding()
            )?,
        }
        Ok(())
    }
}
