use std::sync::Arc;

use tokio::sync::Notify;
use tracing::{debug, warn};

/// Aviso de interrupción del operador (Ctrl-C).
///
/// Solo despierta a quien esté esperando en ese momento: un `sleep` o un
/// `wait` en curso se cancelan, y si el driver está en el prompt se toma
/// como fin de la entrada.
#[derive(Clone, Default)]
pub struct Interrupt {
    notify: Arc<Notify>,
}

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.notify.notify_waiters();
    }

    pub async fn triggered(&self) {
        self.notify.notified().await;
    }

    pub fn listen_ctrl_c(&self) {
        let interrupt = self.clone();
        tokio::spawn(async move {
            loop {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    warn!("no pude escuchar Ctrl-C: {}", e);
                    return;
                }
                debug!("Ctrl-C recibido");
                interrupt.trigger();
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn trigger_despierta_a_quien_espera() {
        let interrupt = Interrupt::new();
        let other = interrupt.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            other.trigger();
        });

        let woke = tokio::time::timeout(Duration::from_secs(5), interrupt.triggered()).await;
        assert!(woke.is_ok());
    }

    #[tokio::test]
    async fn trigger_sin_nadie_esperando_no_queda_pendiente() {
        let interrupt = Interrupt::new();
        interrupt.trigger();

        let woke = tokio::time::timeout(Duration::from_millis(50), interrupt.triggered()).await;
        assert!(woke.is_err());
    }
}
