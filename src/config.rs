use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub logging: LoggingConfig,
    pub window: WindowConfig,
    pub audio: AudioConfig,
    pub notifications: NotificationConfig,
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
    pub filter: String,
}

/// Описание целевого окна focus-режима: класс + точный заголовок +
/// имена процессов-владельцев
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WindowConfig {
    pub backend: String,
    pub class: String,
    pub title: String,
    pub host_processes: Vec<String>,
    pub poll_interval_ms: u64,
    pub cooldown_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AudioConfig {
    pub backend: String,
    #[serde(default)]
    pub target_device_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NotificationConfig {
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetryConfig {
    pub foreground_attempts: u32,
    pub foreground_base_delay_ms: u64,
    pub background_attempts: u32,
    pub background_interval_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
                filter: "focus_switch_rust=info".to_string(),
            },
            window: WindowConfig {
                backend: "auto".to_string(),
                class: "FocusMode".to_string(),
                title: "Focus Mode".to_string(),
                host_processes: vec!["focus-host".to_string()],
                poll_interval_ms: 500,
                cooldown_ms: 1000,
            },
            audio: AudioConfig {
                backend: "auto".to_string(),
                target_device_id: None,
            },
            notifications: NotificationConfig { enabled: true },
            retry: RetryConfig {
                foreground_attempts: 3,
                foreground_base_delay_ms: 500,
                background_attempts: 6,
                background_interval_ms: 5000,
            },
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let config_path = config_path.as_ref();

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(config_path))
            .merge(Env::prefixed("FOCUS_"));

        let config: Config = figment
            .extract()
            .with_context(|| format!("Не удалось загрузить конфигурацию из {:?}", config_path))?;

        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        // Валидация настроек логирования
        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!("Неверный уровень логирования: {}", self.logging.level),
        }

        match self.logging.format.as_str() {
            "pretty" | "json" => {}
            _ => anyhow::bail!("Неверный формат логирования: {}", self.logging.format),
        }

        // Валидация описания окна
        match self.window.backend.as_str() {
            "auto" | "wmctrl" | "sway" => {}
            _ => anyhow::bail!("Неверный бэкенд детекции окон: {}", self.window.backend),
        }

        if self.window.class.is_empty() {
            anyhow::bail!("window.class не может быть пустым");
        }

        if self.window.title.is_empty() {
            anyhow::bail!("window.title не может быть пустым");
        }

        if self.window.host_processes.is_empty() {
            anyhow::bail!("window.host_processes не может быть пустым");
        }

        if self.window.poll_interval_ms < 100 {
            anyhow::bail!("poll_interval_ms должно быть минимум 100");
        }

        // Валидация аудио-бэкенда
        match self.audio.backend.as_str() {
            "auto" | "pactl" | "wpctl" => {}
            _ => anyhow::bail!("Неверный аудио-бэкенд: {}", self.audio.backend),
        }

        // Валидация протокола повторов
        if self.retry.foreground_attempts == 0 {
            anyhow::bail!("foreground_attempts должно быть больше 0");
        }

        if self.retry.foreground_base_delay_ms == 0 {
            anyhow::bail!("foreground_base_delay_ms должно быть больше 0");
        }

        if self.retry.background_interval_ms == 0 {
            anyhow::bail!("background_interval_ms должно быть больше 0");
        }

        Ok(())
    }

    /// Проверить, совпадает ли имя процесса с одним из ожидаемых
    /// процессов-владельцев (регистронезависимо)
    pub fn matches_host_process(&self, process_name: &str) -> bool {
        let name_lower = process_name.to_lowercase();
        self.window
            .host_processes
            .iter()
            .any(|host| host.to_lowercase() == name_lower)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_validation() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_retry_config() {
        let mut config = Config::default();
        config.retry.foreground_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.retry.background_interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_window_rule_rejected() {
        let mut config = Config::default();
        config.window.class = String::new();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.window.host_processes.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_backend_rejected() {
        let mut config = Config::default();
        config.audio.backend = "alsa".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.window.backend = "xdotool".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_matches_host_process() {
        let mut config = Config::default();
        config.window.host_processes =
            vec!["FocusHost".to_string(), "focus-helper".to_string()];

        assert!(config.matches_host_process("focushost"));
        assert!(config.matches_host_process("FOCUS-HELPER"));
        assert!(!config.matches_host_process("firefox"));
    }
}
