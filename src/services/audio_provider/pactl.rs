use crate::error::{Result, SwitchError};
use crate::events::{AudioDevice, AudioEvent};
use parking_lot::Mutex;
use std::process::Command;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::io::AsyncBufReadExt;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Бэкенд PulseAudio / pipewire-pulse через утилиту pactl.
///
/// PulseAudio ведёт единственный sink по умолчанию, поэтому один вызов
/// set-default-sink покрывает все три роли использования разом.
/// Изменения отслеживаются потоком `pactl subscribe`.
pub struct PactlProvider {
    events: broadcast::Sender<AudioEvent>,
    watcher: Mutex<Option<JoinHandle<()>>>,
    baseline: Mutex<Option<AudioDevice>>,
    initialized: AtomicBool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ParsedSink {
    name: String,
    description: String,
    state: String,
}

/// Сигнал, извлечённый из строки `pactl subscribe`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SubscribeSignal {
    Devices,
    Server,
}

impl PactlProvider {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(32);
        Self {
            events,
            watcher: Mutex::new(None),
            baseline: Mutex::new(None),
            initialized: AtomicBool::new(false),
        }
    }

    pub async fn probe() -> Result<()> {
        let output = Command::new("pactl").arg("info").output()?;
        if output.status.success() {
            Ok(())
        } else {
            Err(SwitchError::BackendUnavailable("pactl failed".to_string()))
        }
    }

    fn query_sinks(&self) -> Result<Vec<ParsedSink>> {
        let output = Command::new("pactl")
            .args(["list", "sinks"])
            .output()
            .map_err(|e| SwitchError::Internal(format!("pactl не найден: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SwitchError::Internal(format!(
                "pactl list sinks вернул ошибку: {}",
                stderr
            )));
        }

        Ok(parse_sinks(&String::from_utf8_lossy(&output.stdout)))
    }

    fn query_default_sink_name() -> Option<String> {
        let output = Command::new("pactl").arg("get-default-sink").output().ok()?;
        if !output.status.success() {
            return None;
        }

        let name = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if name.is_empty() {
            None
        } else {
            Some(name)
        }
    }

    fn devices_snapshot(&self) -> Vec<AudioDevice> {
        let sinks = match self.query_sinks() {
            Ok(sinks) => sinks,
            Err(e) => {
                error!("Сбой перечисления аудиоустройств: {}", e);
                return Vec::new();
            }
        };

        let default_name = Self::query_default_sink_name();

        sinks
            .into_iter()
            .map(|sink| {
                let is_default = default_name.as_deref() == Some(sink.name.as_str());
                debug!("Sink {} [{}]", sink.name, sink.state);
                let device = AudioDevice::new(sink.name, sink.description);
                if is_default {
                    device.as_default()
                } else {
                    device
                }
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl super::AudioProvider for PactlProvider {
    async fn initialize(&self) -> Result<()> {
        let current = self.default_device().await;
        *self.baseline.lock() = current.clone();
        debug!(
            "Исходное устройство по умолчанию: {}",
            current.map(|d| d.full_name).unwrap_or_else(|| "нет".to_string())
        );

        // Повторные вызовы только перечитывают baseline
        if self.initialized.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let mut child = tokio::process::Command::new("pactl")
            .arg("subscribe")
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        let stdout = child.stdout.take().ok_or_else(|| {
            SwitchError::Internal("pactl subscribe без stdout".to_string())
        })?;

        let events = self.events.clone();
        let handle = tokio::spawn(async move {
            // Ребёнок живёт внутри задачи: kill_on_drop завершает его
            // при остановке наблюдения
            let _child = child;
            let mut lines = tokio::io::BufReader::new(stdout).lines();

            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => match classify_subscribe_line(&line) {
                        Some(SubscribeSignal::Devices) => {
                            let _ = events.send(AudioEvent::DevicesChanged);
                        }
                        Some(SubscribeSignal::Server) => {
                            // Смена устройства по умолчанию приходит как
                            // событие сервера - перечитываем его
                            let device = Self::query_default_sink_name()
                                .map(|name| AudioDevice::new(name.clone(), name).as_default());
                            let _ = events.send(AudioEvent::DefaultDeviceChanged(device));
                        }
                        None => {}
                    },
                    Ok(None) => {
                        warn!("Поток pactl subscribe завершился");
                        break;
                    }
                    Err(e) => {
                        warn!("Ошибка чтения pactl subscribe: {}", e);
                        break;
                    }
                }
            }
        });

        *self.watcher.lock() = Some(handle);
        info!("Наблюдение за аудиоустройствами запущено (pactl subscribe)");
        Ok(())
    }

    async fn list_playback_devices(&self) -> Vec<AudioDevice> {
        self.devices_snapshot()
    }

    async fn default_device(&self) -> Option<AudioDevice> {
        let name = Self::query_default_sink_name()?;

        // Обогащаем описание из полного перечисления, если получится
        match self.query_sinks() {
            Ok(sinks) => sinks
                .into_iter()
                .find(|sink| sink.name == name)
                .map(|sink| AudioDevice::new(sink.name, sink.description).as_default())
                .or_else(|| Some(AudioDevice::new(name.clone(), name).as_default())),
            Err(_) => Some(AudioDevice::new(name.clone(), name).as_default()),
        }
    }

    async fn device_exists(&self, id: &str) -> bool {
        if id.is_empty() {
            return false;
        }

        match self.query_sinks() {
            Ok(sinks) => sinks.iter().any(|sink| sink.name == id),
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

        let status = Command::new("pactl").args(["set-default-sink", id]).status();

        match status {
            Ok(status) if status.success() => {
                let device = self
                    .devices_snapshot()
                    .into_iter()
                    .find(|device| device.id == id);
                info!(
                    "Устройство по умолчанию переключено на: {}",
                    device
                        .as_ref()
                        .map(|d| d.full_name.as_str())
                        .unwrap_or(id)
                );
                let _ = self.events.send(AudioEvent::DefaultDeviceChanged(device));
                true
            }
            Ok(status) => {
                warn!("pactl set-default-sink завершился со статусом {}", status);
                false
            }
            Err(e) => {
                warn!("Не удалось запустить pactl set-default-sink: {}", e);
                false
            }
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<AudioEvent> {
        self.events.subscribe()
    }

    async fn shutdown(&self) {
        if let Some(handle) = self.watcher.lock().take() {
            handle.abort();
            info!("Наблюдение за аудиоустройствами остановлено");
        }
        self.initialized.store(false, Ordering::SeqCst);
    }
}

fn parse_sinks(text: &str) -> Vec<ParsedSink> {
    let mut sinks = Vec::new();
    let mut name: Option<String> = None;
    let mut description: Option<String> = None;
    let mut state = String::new();

    let mut flush = |name: &mut Option<String>, description: &mut Option<String>, state: &mut String| {
        if let Some(name) = name.take() {
            sinks.push(ParsedSink {
                description: description.take().unwrap_or_else(|| name.clone()),
                name,
                state: std::mem::take(state),
            });
        } else {
            description.take();
            state.clear();
        }
    };

    for line in text.lines() {
        let trimmed = line.trim();

        if trimmed.starts_with("Sink #") {
            flush(&mut name, &mut description, &mut state);
        } else if let Some(value) = trimmed.strip_prefix("Name: ") {
            name = Some(value.trim().to_string());
        } else if let Some(value) = trimmed.strip_prefix("Description: ") {
            description = Some(value.trim().to_string());
        } else if let Some(value) = trimmed.strip_prefix("State: ") {
            state = value.trim().to_string();
        }
    }

    flush(&mut name, &mut description, &mut state);
    sinks
}

fn classify_subscribe_line(line: &str) -> Option<SubscribeSignal> {
    // Формат: Event 'change' on sink #55 / Event 'change' on server #0
    if !line.starts_with("Event ") {
        return None;
    }

    if line.contains(" on server ") {
        Some(SubscribeSignal::Server)
    } else if line.contains(" on sink ") {
        Some(SubscribeSignal::Devices)
    } else {
        None
    }
}
