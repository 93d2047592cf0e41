use std::collections::HashMap;
use tracing::{debug, info, warn};
use zbus::zvariant::Value;
use zbus::Connection;

/// Канал уведомлений пользователя о переключениях
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn announce_switch(&self, device_name: &str, activated: bool);
    async fn announce_device_missing(&self, device_name: &str);
}

/// Уведомления через org.freedesktop.Notifications.
///
/// Соединение с session bus создаётся лениво и кэшируется. Ошибки
/// доставки логируются и глотаются: уведомления не должны ронять
/// переключение.
pub struct DesktopNotifier {
    connection: tokio::sync::Mutex<Option<Connection>>,
}

impl DesktopNotifier {
    pub fn new() -> Self {
        Self {
            connection: tokio::sync::Mutex::new(None),
        }
    }

    async fn send(&self, summary: &str, body: &str) {
        if let Err(error) = self.try_send(summary, body).await {
            warn!("Не удалось отправить уведомление: {}", error);
        }
    }

    async fn try_send(&self, summary: &str, body: &str) -> zbus::Result<()> {
        let mut guard = self.connection.lock().await;
        if guard.is_none() {
            *guard = Some(Connection::session().await?);
            debug!("Соединение с session bus установлено");
        }
        let connection = guard.as_ref().ok_or(zbus::Error::InvalidReply)?;

        connection
            .call_method(
                Some("org.freedesktop.Notifications"),
                "/org/freedesktop/Notifications",
                Some("org.freedesktop.Notifications"),
                "Notify",
                &(
                    "focus-switch",
                    0u32,
                    "audio-headphones",
                    summary,
                    body,
                    Vec::<&str>::new(),
                    HashMap::<&str, Value>::new(),
                    5000i32,
                ),
            )
            .await?;
        Ok(())
    }
}

impl Default for DesktopNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Notifier for DesktopNotifier {
    async fn announce_switch(&self, device_name: &str, activated: bool) {
        let summary = if activated {
            "Звук переключён"
        } else {
            "Звук восстановлен"
        };
        self.send(summary, device_name).await;
    }

    async fn announce_device_missing(&self, device_name: &str) {
        self.send(
            "Устройство недоступно",
            &format!("Не удалось переключиться на {}", device_name),
        )
        .await;
    }
}

/// Заглушка для dry-run: уведомления только пишутся в лог
pub struct LogNotifier;

#[async_trait::async_trait]
impl Notifier for LogNotifier {
    async fn announce_switch(&self, device_name: &str, activated: bool) {
        if activated {
            info!("[dry-run] Уведомление: звук переключён на {}", device_name);
        } else {
            info!("[dry-run] Уведомление: звук восстановлен на {}", device_name);
        }
    }

    async fn announce_device_missing(&self, device_name: &str) {
        info!("[dry-run] Уведомление: устройство {} недоступно", device_name);
    }
}

pub fn create_notifier(dry_run: bool) -> std::sync::Arc<dyn Notifier> {
    if dry_run {
        std::sync::Arc::new(LogNotifier)
    } else {
        std::sync::Arc::new(DesktopNotifier::new())
    }
}
