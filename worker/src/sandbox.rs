use std::{
    io,
    path::{Path, PathBuf},
    process::Stdio,
};

use common::{CacheMode, FileBinding};
use tokio::{fs, process::Command};
use tracing::{debug, warn};

use crate::cache::InputCache;

/// Directorio privado donde corre una tarea.
pub(crate) struct Sandbox {
    dir: PathBuf,
}

/// Resultado crudo de correr el comando.
pub(crate) struct CommandRun {
    pub exit_code: Option<i32>,
    pub success: bool,
    pub output: String,
}

impl Sandbox {
    pub(crate) async fn create(root: &Path) -> io::Result<Self> {
        let dir = root.join(uuid::Uuid::new_v4().to_string());
        fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    pub(crate) fn path(&self) -> &Path {
        &self.dir
    }

    /// Deja cada input dentro del sandbox con su nombre remoto.
    pub(crate) async fn stage_inputs(
        &self,
        inputs: &[FileBinding],
        cache: &InputCache,
    ) -> Result<(), String> {
        for input in inputs {
            let target = self.dir.join(&input.remote);
            let staged = match input.cache {
                CacheMode::Cache => match cache.fetch(input).await {
                    // copia propia: el comando puede escribir su input
                    Ok(cached) => fs::copy(&cached, &target).await.map(|_| ()),
                    Err(e) => Err(e),
                },
                CacheMode::NoCache => fs::copy(&input.local, &target).await.map(|_| ()),
            };

            staged.map_err(|e| format!("input {}: {}", input.local.display(), e))?;
        }
        Ok(())
    }

    pub(crate) async fn run(&self, command: &str) -> io::Result<CommandRun> {
        let out = Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(&self.dir)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await?;

        let mut output = String::from_utf8_lossy(&out.stdout).into_owned();
        output.push_str(&String::from_utf8_lossy(&out.stderr));

        Ok(CommandRun {
            exit_code: out.status.code(),
            success: out.status.success(),
            output,
        })
    }

    /// Copia los outputs de vuelta. Devuelve el nombre remoto del primero que falte.
    pub(crate) async fn collect_outputs(&self, outputs: &[FileBinding]) -> Result<(), OutputError> {
        for output in outputs {
            let produced = self.dir.join(&output.remote);
            if fs::metadata(&produced).await.is_err() {
                return Err(OutputError::Missing(output.remote.clone()));
            }

            if let Some(parent) = output.local.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent)
                        .await
                        .map_err(|e| OutputError::Copy(format!("{}: {}", parent.display(), e)))?;
                }
            }

            fs::copy(&produced, &output.local)
                .await
                .map_err(|e| OutputError::Copy(format!("{}: {}", output.local.display(), e)))?;
            debug!("output {} -> {}", output.remote, output.local.display());
        }
        Ok(())
    }

    pub(crate) async fn remove(self) {
        if let Err(e) = fs::remove_dir_all(&self.dir).await {
            warn!("no pude borrar sandbox {}: {}", self.dir.display(), e);
        }
    }
}

pub(crate) enum OutputError {
    Missing(String),
    Copy(String),
}

/// Los nombres remotos tienen que ser nombres de archivo simples.
pub(crate) fn valid_remote_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains('/')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(local: &Path, remote: &str, cache: CacheMode) -> FileBinding {
        FileBinding {
            local: local.to_path_buf(),
            remote: remote.to_string(),
            cache,
        }
    }

    #[test]
    fn nombres_remotos_validos() {
        assert!(valid_remote_name("infile"));
        assert!(valid_remote_name("out.1"));
        assert!(!valid_remote_name(""));
        assert!(!valid_remote_name(".."));
        assert!(!valid_remote_name("a/b"));
    }

    #[tokio::test]
    async fn stage_run_y_collect() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("input.0");
        std::fs::write(&src, b"datos\n").unwrap();
        let cache = InputCache::new(dir.path().join("cache"));

        let sb = Sandbox::create(&dir.path().join("sandbox")).await.unwrap();
        sb.stage_inputs(&[input(&src, "infile", CacheMode::Cache)], &cache)
            .await
            .unwrap();

        let run = sb.run("cat infile > outfile; echo listo").await.unwrap();
        assert!(run.success);
        assert_eq!(run.exit_code, Some(0));
        assert_eq!(run.output.trim(), "listo");

        let dest = dir.path().join("res").join("output.0");
        let outs = [input(&dest, "outfile", CacheMode::NoCache)];
        assert!(sb.collect_outputs(&outs).await.is_ok());
        assert_eq!(std::fs::read(&dest).unwrap(), b"datos\n");

        let sb_path = sb.path().to_path_buf();
        sb.remove().await;
        assert!(!sb_path.exists());
    }

    #[tokio::test]
    async fn tarea_que_pisa_su_input_no_toca_la_cache() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("input.0");
        std::fs::write(&src, b"original").unwrap();
        let cache = InputCache::new(dir.path().join("cache"));
        let binding = input(&src, "infile", CacheMode::Cache);

        let sb = Sandbox::create(&dir.path().join("sandbox")).await.unwrap();
        sb.stage_inputs(std::slice::from_ref(&binding), &cache)
            .await
            .unwrap();
        let run = sb.run("echo pisado > infile").await.unwrap();
        assert!(run.success);
        sb.remove().await;

        let cached = cache.fetch(&binding).await.unwrap();
        assert_eq!(std::fs::read(&cached).unwrap(), b"original");

        let otro = Sandbox::create(&dir.path().join("sandbox")).await.unwrap();
        otro.stage_inputs(&[binding], &cache).await.unwrap();
        assert_eq!(
            std::fs::read(otro.path().join("infile")).unwrap(),
            b"original"
        );
    }

    #[tokio::test]
    async fn collect_reporta_output_faltante() {
        let dir = tempfile::tempdir().unwrap();
        let sb = Sandbox::create(dir.path()).await.unwrap();
        let outs = [input(&dir.path().join("x"), "nunca", CacheMode::NoCache)];
        match sb.collect_outputs(&outs).await {
            Err(OutputError::Missing(name)) => assert_eq!(name, "nunca"),
            _ => panic!("esperaba output faltante"),
        }
    }

    #[tokio::test]
    async fn run_captura_codigo_de_salida() {
        let dir = tempfile::tempdir().unwrap();
        let sb = Sandbox::create(dir.path()).await.unwrap();
        let run = sb.run("echo mal >&2; exit 3").await.unwrap();
        assert!(!run.success);
        assert_eq!(run.exit_code, Some(3));
        assert!(run.output.contains("mal"));
    }
}
