//! Runtime settings that survive restarts.
//!
//! Unlike the static config file, these values can change while the daemon
//! is running (the target device is picked after enumerating what the host
//! actually has) and are written back to their own TOML file next to the
//! config.

use crate::config::Config;
use crate::error::Result;
use anyhow::Context;
use figment::providers::{Format, Serialized, Toml};
use figment::Figment;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::watch;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingsValues {
    /// Id целевого устройства; None или пустая строка - переключение выключено
    pub target_device_id: Option<String>,
    pub show_notifications: bool,
}

impl Default for SettingsValues {
    fn default() -> Self {
        Self {
            target_device_id: None,
            show_notifications: true,
        }
    }
}

/// Изменяемые настройки с записью на диск и каналом изменений
pub struct Settings {
    values: RwLock<SettingsValues>,
    path: Option<PathBuf>,
    changes: watch::Sender<SettingsValues>,
}

impl Settings {
    /// Загрузка: значения из конфига перекрываются файлом настроек,
    /// если он уже существует
    pub fn load(config: &Config, path: &Path) -> Result<Self> {
        let seed = SettingsValues {
            target_device_id: config.audio.target_device_id.clone(),
            show_notifications: config.notifications.enabled,
        };

        let values: SettingsValues = Figment::new()
            .merge(Serialized::defaults(seed))
            .merge(Toml::file(path))
            .extract()
            .with_context(|| format!("не удалось прочитать настройки из {}", path.display()))?;

        if path.exists() {
            info!("Настройки загружены из {}", path.display());
        } else {
            debug!("Файл настроек {} отсутствует, используем конфиг", path.display());
        }

        let (changes, _) = watch::channel(values.clone());
        Ok(Self {
            values: RwLock::new(values),
            path: Some(path.to_path_buf()),
            changes,
        })
    }

    /// Настройки без файла, только в памяти
    pub fn in_memory(values: SettingsValues) -> Self {
        let (changes, _) = watch::channel(values.clone());
        Self {
            values: RwLock::new(values),
            path: None,
            changes,
        }
    }

    pub fn target_device_id(&self) -> Option<String> {
        self.values
            .read()
            .target_device_id
            .clone()
            .filter(|id| !id.is_empty())
    }

    pub fn show_notifications(&self) -> bool {
        self.values.read().show_notifications
    }

    pub fn snapshot(&self) -> SettingsValues {
        self.values.read().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SettingsValues> {
        self.changes.subscribe()
    }

    /// Изменить настройки и записать их на диск. Ошибка записи не
    /// откатывает изменение в памяти
    pub fn update<F>(&self, apply: F) -> Result<()>
    where
        F: FnOnce(&mut SettingsValues),
    {
        let updated = {
            let mut values = self.values.write();
            apply(&mut values);
            values.clone()
        };
        let _ = self.changes.send(updated.clone());

        if let Some(path) = &self.path {
            let body = toml::to_string_pretty(&updated)
                .context("не удалось сериализовать настройки")?;
            if let Err(error) = std::fs::write(path, body) {
                warn!("Не удалось сохранить настройки в {}: {}", path.display(), error);
                return Err(crate::error::SwitchError::Io(error));
            }
            debug!("Настройки сохранены в {}", path.display());
        }

        Ok(())
    }
}
