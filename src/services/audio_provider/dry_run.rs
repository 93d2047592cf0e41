use crate::error::Result;
use crate::events::{AudioDevice, AudioEvent, DeviceRole};
use parking_lot::Mutex;
use std::collections::HashMap;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Эмулированный аудио-бэкенд для dry-run режима и тестов.
///
/// Держит таблицу устройств и устройство по умолчанию отдельно для каждой
/// роли использования, умеет по сценарию проваливать ближайшие попытки
/// переключения и записывает все вызовы set_default_device.
pub struct DryRunAudioProvider {
    devices: Mutex<Vec<AudioDevice>>,
    role_defaults: Mutex<HashMap<DeviceRole, String>>,
    fail_next: Mutex<u32>,
    set_calls: Mutex<Vec<String>>,
    events: broadcast::Sender<AudioEvent>,
}

impl DryRunAudioProvider {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(32);
        Self {
            devices: Mutex::new(Vec::new()),
            role_defaults: Mutex::new(HashMap::new()),
            fail_next: Mutex::new(0),
            set_calls: Mutex::new(Vec::new()),
            events,
        }
    }

    pub fn with_demo_devices() -> Self {
        let provider = Self::new();
        provider.add_device(AudioDevice::new("dry-speakers", "Built-in Speakers (dry run)"), true);
        provider.add_device(AudioDevice::new("dry-headset", "USB Headset (dry run)"), false);
        provider
    }

    pub fn add_device(&self, device: AudioDevice, make_default: bool) {
        let id = device.id.clone();
        self.devices.lock().push(device);

        if make_default {
            let mut defaults = self.role_defaults.lock();
            for role in DeviceRole::ALL {
                defaults.insert(role, id.clone());
            }
        }

        let _ = self.events.send(AudioEvent::DevicesChanged);
    }

    pub fn remove_device(&self, id: &str) {
        self.devices.lock().retain(|device| device.id != id);
        self.role_defaults.lock().retain(|_, default| default != id);
        let _ = self.events.send(AudioEvent::DevicesChanged);
    }

    /// Запланировать провал ближайших n вызовов set_default_device
    pub fn fail_next_sets(&self, n: u32) {
        *self.fail_next.lock() = n;
    }

    pub fn set_calls(&self) -> Vec<String> {
        self.set_calls.lock().clone()
    }

    pub fn role_default(&self, role: DeviceRole) -> Option<String> {
        self.role_defaults.lock().get(&role).cloned()
    }

    fn find(&self, id: &str) -> Option<AudioDevice> {
        self.devices.lock().iter().find(|device| device.id == id).cloned()
    }

    fn default_id(&self) -> Option<String> {
        self.role_defaults.lock().get(&DeviceRole::Multimedia).cloned()
    }
}

impl Default for DryRunAudioProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl super::AudioProvider for DryRunAudioProvider {
    async fn initialize(&self) -> Result<()> {
        info!("Dry-run аудио-бэкенд инициализирован");
        Ok(())
    }

    async fn list_playback_devices(&self) -> Vec<AudioDevice> {
        let default_id = self.default_id();
        self.devices
            .lock()
            .iter()
            .cloned()
            .map(|mut device| {
                device.is_default = default_id.as_deref() == Some(device.id.as_str());
                device
            })
            .collect()
    }

    async fn default_device(&self) -> Option<AudioDevice> {
        let id = self.default_id()?;
        self.find(&id).map(AudioDevice::as_default)
    }

    async fn device_exists(&self, id: &str) -> bool {
        if id.is_empty() {
            return false;
        }
        self.find(id).is_some()
    }

    async fn set_default_device(&self, id: &str) -> bool {
        self.set_calls.lock().push(id.to_string());

        {
            let mut fail_next = self.fail_next.lock();
            if *fail_next > 0 {
                *fail_next -= 1;
                debug!("[DRY RUN] Переключение на '{}' провалено по сценарию", id);
                return false;
            }
        }

        let Some(device) = self.find(id) else {
            warn!("[DRY RUN] Устройство '{}' отсутствует", id);
            return false;
        };

        {
            let mut defaults = self.role_defaults.lock();
            for role in DeviceRole::ALL {
                defaults.insert(role, id.to_string());
            }
        }

        info!("[DRY RUN] Устройство по умолчанию переключено на: {}", device.full_name);
        let _ = self
            .events
            .send(AudioEvent::DefaultDeviceChanged(Some(device.as_default())));
        true
    }

    fn subscribe(&self) -> broadcast::Receiver<AudioEvent> {
        self.events.subscribe()
    }

    async fn shutdown(&self) {}
}

#[cfg(test)]
mod tests {
    use super::super::AudioProvider;
    use super::*;

    fn provider_with_two_devices() -> DryRunAudioProvider {
        let provider = DryRunAudioProvider::new();
        provider.add_device(AudioDevice::new("dev-B", "Built-in Speakers"), true);
        provider.add_device(AudioDevice::new("dev-A", "USB Headset (Analog Stereo)"), false);
        provider
    }

    #[tokio::test]
    async fn test_device_exists() {
        let provider = provider_with_two_devices();

        assert!(provider.device_exists("dev-A").await);
        assert!(!provider.device_exists("dev-X").await);
        // Пустой id - тоже несуществующее устройство
        assert!(!provider.device_exists("").await);
    }

    #[tokio::test]
    async fn test_set_default_for_missing_device_keeps_current() {
        let provider = provider_with_two_devices();

        assert!(!provider.set_default_device("dev-X").await);

        let default = provider.default_device().await.unwrap();
        assert_eq!(default.id, "dev-B");
    }

    #[tokio::test]
    async fn test_set_default_updates_all_roles() {
        let provider = provider_with_two_devices();

        assert!(provider.set_default_device("dev-A").await);

        for role in DeviceRole::ALL {
            assert_eq!(provider.role_default(role).as_deref(), Some("dev-A"));
        }

        let devices = provider.list_playback_devices().await;
        let dev_a = devices.iter().find(|d| d.id == "dev-A").unwrap();
        let dev_b = devices.iter().find(|d| d.id == "dev-B").unwrap();
        assert!(dev_a.is_default);
        assert!(!dev_b.is_default);
    }

    #[tokio::test]
    async fn test_scripted_failures() {
        let provider = provider_with_two_devices();
        provider.fail_next_sets(2);

        assert!(!provider.set_default_device("dev-A").await);
        assert!(!provider.set_default_device("dev-A").await);
        assert!(provider.set_default_device("dev-A").await);
        assert_eq!(provider.set_calls().len(), 3);
    }

    #[tokio::test]
    async fn test_set_default_emits_event() {
        let provider = provider_with_two_devices();
        let mut events = provider.subscribe();

        assert!(provider.set_default_device("dev-A").await);

        match events.recv().await.unwrap() {
            AudioEvent::DefaultDeviceChanged(Some(device)) => {
                assert_eq!(device.id, "dev-A");
                assert!(device.is_default);
            }
            other => panic!("Неожиданное событие: {:?}", other),
        }
    }
}
