use crate::error::{Result, SwitchError};
use crate::events::{AudioDevice, AudioEvent};
use std::process::Command;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Запасной бэкенд PipeWire через wpctl, для систем без pipewire-pulse.
///
/// У wpctl нет аналога `pactl subscribe`, поэтому события изменений
/// синтезируются только успешным set_default_device. Числовые id у
/// WirePlumber нестабильны между перезагрузками, так что целевое
/// устройство предпочтительнее настраивать под бэкенд pactl.
pub struct WpctlProvider {
    events: broadcast::Sender<AudioEvent>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ParsedStatusSink {
    id: String,
    name: String,
    is_default: bool,
}

impl WpctlProvider {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(32);
        Self { events }
    }

    pub async fn probe() -> Result<()> {
        let output = Command::new("wpctl").arg("status").output()?;
        if output.status.success() {
            Ok(())
        } else {
            Err(SwitchError::BackendUnavailable("wpctl failed".to_string()))
        }
    }

    fn query_sinks() -> Result<Vec<ParsedStatusSink>> {
        let output = Command::new("wpctl")
            .arg("status")
            .output()
            .map_err(|e| SwitchError::Internal(format!("wpctl не найден: {}", e)))?;

        if !output.status.success() {
            return Err(SwitchError::Internal("wpctl status вернул ошибку".to_string()));
        }

        Ok(parse_status_sinks(&String::from_utf8_lossy(&output.stdout)))
    }
}

#[async_trait::async_trait]
impl super::AudioProvider for WpctlProvider {
    async fn initialize(&self) -> Result<()> {
        let current = self.default_device().await;
        debug!(
            "Исходное устройство по умолчанию: {}",
            current.map(|d| d.full_name).unwrap_or_else(|| "нет".to_string())
        );
        info!("Бэкенд wpctl не поддерживает поток событий - изменения извне не отслеживаются");
        Ok(())
    }

    async fn list_playback_devices(&self) -> Vec<AudioDevice> {
        match Self::query_sinks() {
            Ok(sinks) => sinks
                .into_iter()
                .map(|sink| {
                    let device = AudioDevice::new(sink.id, sink.name);
                    if sink.is_default {
                        device.as_default()
                    } else {
                        device
                    }
                })
                .collect(),
            Err(e) => {
                error!("Сбой перечисления аудиоустройств: {}", e);
                Vec::new()
            }
        }
    }

    async fn default_device(&self) -> Option<AudioDevice> {
        self.list_playback_devices()
            .await
            .into_iter()
            .find(|device| device.is_default)
    }

    async fn device_exists(&self, id: &str) -> bool {
        if id.is_empty() {
            return false;
        }

        match Self::query_sinks() {
            Ok(sinks) => sinks.iter().any(|sink| sink.id == id),
            Err(e) => {
                debug!("device_exists({}): сбой поиска: {}", id, e);
                false
            }
        }
    }

    async fn set_default_device(&self, id: &str) -> bool {
        if !self.device_exists(id).await {
            warn!("Устройство '{}' отсутствует или неактивно", id);
            return false;
        }

        match Command::new("wpctl").args(["set-default", id]).status() {
            Ok(status) if status.success() => {
                let device = self
                    .list_playback_devices()
                    .await
                    .into_iter()
                    .find(|device| device.id == id);
                info!(
                    "Устройство по умолчанию переключено на: {}",
                    device.as_ref().map(|d| d.full_name.as_str()).unwrap_or(id)
                );
                let _ = self.events.send(AudioEvent::DefaultDeviceChanged(device));
                true
            }
            Ok(status) => {
                warn!("wpctl set-default завершился со статусом {}", status);
                false
            }
            Err(e) => {
                warn!("Не удалось запустить wpctl set-default: {}", e);
                false
            }
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<AudioEvent> {
        self.events.subscribe()
    }

    async fn shutdown(&self) {}
}

/// Разбор секции Sinks из вывода `wpctl status`:
///
/// ```text
///  ├─ Sinks:
///  │  *   55. Family 17h HD Audio Controller [vol: 0.40]
///  │      71. USB Headset                    [vol: 1.00]
///  │
/// ```
fn parse_status_sinks(text: &str) -> Vec<ParsedStatusSink> {
    let mut sinks = Vec::new();
    let mut in_sinks = false;

    for line in text.lines() {
        if line.contains("Sinks:") {
            in_sinks = true;
            continue;
        }

        if !in_sinks {
            continue;
        }

        // Конец секции: пустая ветка дерева или следующий заголовок
        let body = line.trim_start_matches(['│', '├', '└', '─', ' ']);
        if body.is_empty() || body.ends_with(':') {
            in_sinks = false;
            continue;
        }

        let (is_default, body) = match body.strip_prefix('*') {
            Some(rest) => (true, rest.trim_start()),
            None => (false, body),
        };

        let Some(dot) = body.find('.') else { continue };
        let id = body[..dot].trim();
        if id.is_empty() || !id.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }

        let mut name = body[dot + 1..].trim();
        if let Some(vol) = name.rfind(" [vol:") {
            name = name[..vol].trim_end();
        }

        sinks.push(ParsedStatusSink {
            id: id.to_string(),
            name: name.to_string(),
            is_default,
        });
    }

    sinks
}
