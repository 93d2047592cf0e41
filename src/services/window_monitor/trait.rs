use crate::config::Config;
use crate::error::{Result, SwitchError};
use crate::events::WindowInfo;
use std::sync::Arc;
use tracing::info;

/// Trait for window backends that can enumerate top-level windows
#[async_trait::async_trait]
pub trait WindowBackend: Send + Sync {
    /// Быстрая проверка работоспособности бэкенда
    async fn probe(&self) -> Result<()>;

    /// Снимок всех окон верхнего уровня (класс, заголовок, процесс-владелец)
    async fn snapshot(&self) -> Result<Vec<WindowInfo>>;
}

/// Factory function to create an appropriate window backend based on the
/// configured backend and the dry_run flag
pub async fn create_window_backend(
    config: Arc<Config>,
    dry_run: bool,
) -> Result<Arc<dyn WindowBackend>> {
    if dry_run {
        info!("Dry-run режим - используем эмулированный оконный бэкенд");
        return Ok(Arc::new(super::dry_run::DryRunWindowBackend::with_demo(
            &config,
        )));
    }

    match config.window.backend.as_str() {
        "wmctrl" => {
            let backend = super::wmctrl::WmctrlBackend::new();
            backend.probe().await?;
            Ok(Arc::new(backend))
        }
        "sway" => {
            let backend = super::sway::SwayBackend::new();
            backend.probe().await?;
            Ok(Arc::new(backend))
        }
        _ => {
            // "auto": перебираем бэкенды в порядке предпочтения
            let wmctrl = super::wmctrl::WmctrlBackend::new();
            if wmctrl.probe().await.is_ok() {
                info!("Используем оконный бэкенд wmctrl");
                return Ok(Arc::new(wmctrl));
            }

            let sway = super::sway::SwayBackend::new();
            if sway.probe().await.is_ok() {
                info!("Используем оконный бэкенд sway");
                return Ok(Arc::new(sway));
            }

            Err(SwitchError::BackendUnavailable(
                "Ни один оконный бэкенд не работает (wmctrl, sway)".to_string(),
            ))
        }
    }
}
