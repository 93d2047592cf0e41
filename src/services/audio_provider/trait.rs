use crate::config::Config;
use crate::error::{Result, SwitchError};
use crate::events::{AudioDevice, AudioEvent};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::info;

/// Trait for audio providers that can run against different backends
#[async_trait::async_trait]
pub trait AudioProvider: Send + Sync {
    /// Зафиксировать текущее устройство по умолчанию и зарегистрировать
    /// наблюдение за изменениями. Повторные вызовы не регистрируют
    /// наблюдение заново, но могут перечитать устройство по умолчанию.
    async fn initialize(&self) -> Result<()>;

    /// Перечислить активные устройства вывода с пометкой текущего
    /// устройства по умолчанию. При сбое перечисления возвращает пустой
    /// список - сбой логируется, но не пробрасывается вызывающему.
    async fn list_playback_devices(&self) -> Vec<AudioDevice>;

    /// None, если устройства по умолчанию нет или запрос не удался
    async fn default_device(&self) -> Option<AudioDevice>;

    /// false при любом сбое поиска, включая пустой id
    async fn device_exists(&self, id: &str) -> bool;

    /// Сделать устройство выводом по умолчанию для всех ролей использования.
    /// false без ошибки, если устройство отсутствует, неактивно или
    /// платформенный вызов не удался. При успехе синтезирует
    /// DefaultDeviceChanged.
    async fn set_default_device(&self, id: &str) -> bool;

    fn subscribe(&self) -> broadcast::Receiver<AudioEvent>;

    /// Остановить наблюдение; безопасно вызывать многократно
    async fn shutdown(&self);
}

/// Factory function to create an appropriate audio provider based on the
/// configured backend and the dry_run flag
pub async fn create_audio_provider(
    config: Arc<Config>,
    dry_run: bool,
) -> Result<Arc<dyn AudioProvider>> {
    if dry_run {
        info!("Dry-run режим - используем эмулированный аудио-бэкенд");
        return Ok(Arc::new(super::dry_run::DryRunAudioProvider::with_demo_devices()));
    }

    match config.audio.backend.as_str() {
        "pactl" => {
            super::pactl::PactlProvider::probe().await?;
            Ok(Arc::new(super::pactl::PactlProvider::new()))
        }
        "wpctl" => {
            super::wpctl::WpctlProvider::probe().await?;
            Ok(Arc::new(super::wpctl::WpctlProvider::new()))
        }
        _ => {
            // "auto": перебираем бэкенды в порядке предпочтения
            if super::pactl::PactlProvider::probe().await.is_ok() {
                info!("Используем аудио-бэкенд pactl");
                return Ok(Arc::new(super::pactl::PactlProvider::new()));
            }

            if super::wpctl::WpctlProvider::probe().await.is_ok() {
                info!("Используем аудио-бэкенд wpctl");
                return Ok(Arc::new(super::wpctl::WpctlProvider::new()));
            }

            Err(SwitchError::BackendUnavailable(
                "Ни один аудио-бэкенд не работает (pactl, wpctl)".to_string(),
            ))
        }
    }
}
