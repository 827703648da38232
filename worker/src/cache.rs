use std::{
    collections::hash_map::DefaultHasher,
    hash::{Hash, Hasher},
    io,
    path::{Path, PathBuf},
};

use common::FileBinding;
use tokio::{fs, sync::Mutex};
use tracing::debug;

/// Copias de los inputs marcados como `Cache`.
///
/// Cada entrada se refresca solo si el archivo original cambió
/// (tamaño distinto o mtime posterior a la copia).
pub(crate) struct InputCache {
    dir: PathBuf,
    // serializa las copias para que dos tareas no escriban la misma entrada
    lock: Mutex<()>,
}

impl InputCache {
    pub(crate) fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            lock: Mutex::new(()),
        }
    }

    fn entry_path(&self, binding: &FileBinding) -> PathBuf {
        let mut hasher = DefaultHasher::new();
        binding.local.hash(&mut hasher);
        self.dir
            .join(format!("{:016x}-{}", hasher.finish(), binding.remote))
    }

    /// Devuelve la ruta de la copia cacheada, copiándola si hace falta.
    pub(crate) async fn fetch(&self, binding: &FileBinding) -> io::Result<PathBuf> {
        let _guard = self.lock.lock().await;
        let cached = self.entry_path(binding);

        if is_fresh(&binding.local, &cached).await? {
            debug!("cache hit para {}", binding.local.display());
            return Ok(cached);
        }

        // copia + rename: un fetch a medias nunca queda como entrada válida
        fs::create_dir_all(&self.dir).await?;
        let partial = cached.with_file_name(format!(
            "{}.part",
            cached.file_name().unwrap_or_default().to_string_lossy()
        ));
        fs::copy(&binding.local, &partial).await?;
        fs::rename(&partial, &cached).await?;
        debug!(
            "cache: copiado {} -> {}",
            binding.local.display(),
            cached.display()
        );
        Ok(cached)
    }
}

async fn is_fresh(source: &Path, cached: &Path) -> io::Result<bool> {
    let src = fs::metadata(source).await?;
    let dst = match fs::metadata(cached).await {
        Ok(m) => m,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e),
    };

    if src.len() != dst.len() {
        return Ok(false);
    }

    match (src.modified(), dst.modified()) {
        (Ok(s), Ok(d)) => Ok(s <= d),
        _ => Ok(false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::CacheMode;

    fn binding(local: &Path) -> FileBinding {
        FileBinding {
            local: local.to_path_buf(),
            remote: "infile".to_string(),
            cache: CacheMode::Cache,
        }
    }

    #[tokio::test]
    async fn fetch_copia_una_vez_y_reutiliza() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("input.0");
        std::fs::write(&src, b"hola").unwrap();

        let cache = InputCache::new(dir.path().join("cache"));
        let first = cache.fetch(&binding(&src)).await.unwrap();
        let mtime = std::fs::metadata(&first).unwrap().modified().unwrap();

        let second = cache.fetch(&binding(&src)).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(std::fs::metadata(&second).unwrap().modified().unwrap(), mtime);
        assert_eq!(std::fs::read(&second).unwrap(), b"hola");
    }

    #[tokio::test]
    async fn fetch_refresca_si_cambia_el_tamano() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("input.0");
        std::fs::write(&src, b"a").unwrap();

        let cache = InputCache::new(dir.path().join("cache"));
        cache.fetch(&binding(&src)).await.unwrap();

        std::fs::write(&src, b"abcdef").unwrap();
        let cached = cache.fetch(&binding(&src)).await.unwrap();
        assert_eq!(std::fs::read(&cached).unwrap(), b"abcdef");
    }

    #[tokio::test]
    async fn fetch_falla_si_no_existe_el_origen() {
        let dir = tempfile::tempdir().unwrap();
        let cache = InputCache::new(dir.path().join("cache"));
        let res = cache.fetch(&binding(&dir.path().join("nada"))).await;
        assert!(res.is_err());
    }
}
