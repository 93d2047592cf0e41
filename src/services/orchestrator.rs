use crate::config::RetryConfig;
use crate::debug_if_enabled;
use crate::events::WindowInfo;
use crate::services::audio_provider::AudioProvider;
use crate::services::notifier::Notifier;
use crate::services::settings::Settings;
use crate::utils::CancelToken;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::{debug, info, warn};

/// Потребитель сигналов монитора: активация/деактивация focus-режима
#[async_trait::async_trait]
pub trait SwitchHandler: Send + Sync {
    async fn handle_activation(&self, window: &WindowInfo);
    async fn handle_deactivation(&self);
}

/// Оркестратор переключения аудиоустройства.
///
/// Протокол store-switch-retry-restore: на активацию сохраняется текущее
/// устройство по умолчанию и запускается переключение на целевое с
/// коротким передним протоколом повторов (3 попытки, экспоненциальная
/// задержка) и, при его исчерпании, длинным фоновым (6 попыток по 5с).
/// На деактивацию фоновый повтор отменяется и сохранённое устройство
/// восстанавливается одной попыткой.
///
/// Живым может быть не более одного фонового повтора: на каждую активацию
/// создаётся новый токен отмены, а предыдущий отменяется. Сбои платформы
/// приходят как отрицательные результаты, а не ошибки - оркестратор
/// никогда не прерывает процесс из-за них.
pub struct SwitchOrchestrator {
    audio: Arc<dyn AudioProvider>,
    settings: Arc<Settings>,
    notifier: Arc<dyn Notifier>,
    retry: RetryConfig,
    stored_device: Mutex<Option<String>>,
    cancel: Mutex<Arc<CancelToken>>,
    background: Mutex<Option<JoinHandle<()>>>,
}

impl SwitchOrchestrator {
    pub fn new(
        audio: Arc<dyn AudioProvider>,
        settings: Arc<Settings>,
        notifier: Arc<dyn Notifier>,
        retry: RetryConfig,
    ) -> Self {
        Self {
            audio,
            settings,
            notifier,
            retry,
            stored_device: Mutex::new(None),
            cancel: Mutex::new(Arc::new(CancelToken::new())),
            background: Mutex::new(None),
        }
    }

    /// Id устройства, сохранённого при последней активации
    pub fn stored_device_id(&self) -> Option<String> {
        self.stored_device.lock().clone()
    }

    /// Отменить предыдущий фоновый повтор и выдать свежий токен.
    /// Задача-владелец старого токена завершится на ближайшей границе
    /// задержки; уже начатый платформенный вызов доводится до конца.
    fn replace_cancel_token(&self) -> Arc<CancelToken> {
        let fresh = Arc::new(CancelToken::new());
        let previous = {
            let mut slot = self.cancel.lock();
            std::mem::replace(&mut *slot, Arc::clone(&fresh))
        };
        previous.cancel();

        // Старая задача отцепляется и дорабатывает до границы отмены
        self.background.lock().take();

        fresh
    }

    async fn activation(&self, window: &WindowInfo) {
        info!("Активация focus-режима: {}", window);

        let cancel = self.replace_cancel_token();

        // Запоминаем, что было устройством по умолчанию до активации
        let current = self.audio.default_device().await;
        *self.stored_device.lock() = current.as_ref().map(|device| device.id.clone());
        match &current {
            Some(device) => info!("Сохранено предыдущее устройство: {}", device.short_name),
            None => warn!("Текущее устройство по умолчанию не определено"),
        }

        // Отсутствие настройки - нормальная ситуация, а не ошибка
        let Some(target) = self.settings.target_device_id() else {
            info!("Целевое устройство не настроено - переключение не требуется");
            return;
        };

        if self.foreground_switch(&target, &cancel).await {
            self.notify_switch(&target, true).await;
            return;
        }

        if cancel.is_cancelled() {
            return;
        }

        warn!(
            "Передний протокол исчерпан ({} попыток) - запускаем фоновый повтор",
            self.retry.foreground_attempts
        );
        self.start_background_retry(target, cancel);
    }

    /// Передний протокол: до foreground_attempts попыток, задержка перед
    /// попыткой n равна base * 2^(n-2); перед первой попыткой и после
    /// последней задержек нет
    async fn foreground_switch(&self, target: &str, cancel: &CancelToken) -> bool {
        for attempt in 1..=self.retry.foreground_attempts {
            if attempt > 1 {
                let delay = Duration::from_millis(
                    self.retry.foreground_base_delay_ms * 2u64.pow(attempt - 2),
                );
                if !cancel.sleep(delay).await {
                    debug!("Переднее переключение отменено");
                    return false;
                }
            }

            debug_if_enabled!("Попытка переключения #{} на '{}'", attempt, target);
            if self.audio.set_default_device(target).await {
                return true;
            }
        }

        false
    }

    fn start_background_retry(&self, target: String, cancel: Arc<CancelToken>) {
        let audio = Arc::clone(&self.audio);
        let settings = Arc::clone(&self.settings);
        let notifier = Arc::clone(&self.notifier);
        let retry = self.retry.clone();

        let handle = tokio::spawn(async move {
            for attempt in 1..=retry.background_attempts {
                // Ожидание перед каждой попыткой, включая первую
                if !cancel
                    .sleep(Duration::from_millis(retry.background_interval_ms))
                    .await
                {
                    debug!("Фоновый повтор отменён");
                    return;
                }

                debug_if_enabled!("Фоновая попытка #{} на '{}'", attempt, target);
                if audio.set_default_device(&target).await {
                    let name = device_label(&audio, &target).await;
                    if settings.show_notifications() {
                        notifier.announce_switch(&name, true).await;
                    }
                    return;
                }
            }

            // Протокол исчерпан: до следующей активации попыток больше нет
            warn!(
                "Фоновый повтор исчерпан ({} попыток) - устройство '{}' недоступно",
                retry.background_attempts, target
            );
            if settings.show_notifications() {
                notifier.announce_device_missing(&target).await;
            }
        });

        *self.background.lock() = Some(handle);
    }

    async fn deactivation(&self) {
        info!("Деактивация focus-режима");

        // Сначала гасим фоновый повтор, потом восстанавливаем
        self.replace_cancel_token();

        let stored = self.stored_device.lock().take();
        let Some(stored) = stored else {
            info!("Предыдущее устройство не сохранено - восстанавливать нечего");
            return;
        };

        // Одна попытка без повторов: устройство было активно мгновение
        // назад, сбои инициализации здесь не ожидаются
        if self.audio.set_default_device(&stored).await {
            self.notify_switch(&stored, false).await;
        } else {
            warn!("Не удалось восстановить устройство '{}'", stored);
        }
    }

    async fn notify_switch(&self, device_id: &str, activated: bool) {
        if !self.settings.show_notifications() {
            return;
        }
        let name = device_label(&self.audio, device_id).await;
        self.notifier.announce_switch(&name, activated).await;
    }
}

#[async_trait::async_trait]
impl SwitchHandler for SwitchOrchestrator {
    async fn handle_activation(&self, window: &WindowInfo) {
        self.activation(window).await;
    }

    async fn handle_deactivation(&self) {
        self.deactivation().await;
    }
}

/// Полное имя устройства для уведомлений; если устройство не удалось
/// найти, показываем его id
async fn device_label(audio: &Arc<dyn AudioProvider>, id: &str) -> String {
    audio
        .list_playback_devices()
        .await
        .into_iter()
        .find(|device| device.id == id)
        .map(|device| device.full_name)
        .unwrap_or_else(|| id.to_string())
}
