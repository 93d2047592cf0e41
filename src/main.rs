use anyhow::Result;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};
mod config;
mod error;
mod events;
mod services;
mod utils;

use config::Config;
use services::{
    create_audio_provider, create_notifier, create_window_backend, FocusModeMonitor, Settings,
    SwitchOrchestrator,
};

#[derive(Parser, Debug)]
#[command(name = "focus-switch")]
#[command(about = "Переключение аудиоустройства по появлению окна focus-режима")]
struct Args {
    /// Путь к файлу конфигурации
    #[arg(short, long, default_value = "focus-switch.toml")]
    config: String,

    /// Режим сухого запуска (без реальных действий)
    #[arg(long)]
    dry_run: bool,

    /// Уровень логирования
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Показать устройства воспроизведения и выйти
    #[arg(long)]
    list_devices: bool,

    /// Сохранить целевое устройство в настройках и выйти
    #[arg(long, value_name = "DEVICE_ID")]
    set_device: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Инициализация системы логирования
    init_tracing(&args.log_level)?;

    info!("Запуск Focus Switch v{}", env!("CARGO_PKG_VERSION"));

    // Загрузка конфигурации
    let config = Arc::new(Config::load(&args.config)?);
    info!("Конфигурация загружена из: {}", args.config);

    if args.dry_run {
        warn!("Режим сухого запуска - реальные действия отключены");
    }

    // Аудиопровайдер нужен и в обычном режиме, и для --list-devices
    let audio = create_audio_provider(config.clone(), args.dry_run).await?;
    audio.initialize().await?;

    if args.list_devices {
        list_devices(&audio).await;
        audio.shutdown().await;
        return Ok(());
    }

    // Настройки живут в отдельном файле рядом с конфигом
    let settings_path = settings_path_for(Path::new(&args.config));
    let settings = Arc::new(Settings::load(&config, &settings_path)?);

    if let Some(device_id) = args.set_device {
        if !audio.device_exists(&device_id).await {
            audio.shutdown().await;
            anyhow::bail!("Устройство '{}' не найдено среди активных", device_id);
        }
        settings.update(|values| values.target_device_id = Some(device_id.clone()))?;
        info!("Целевое устройство сохранено: {}", device_id);
        println!("Настройки: {:?}", settings.snapshot());
        audio.shutdown().await;
        return Ok(());
    }
    match settings.target_device_id() {
        Some(id) => info!("Целевое устройство: {}", id),
        None => warn!("Целевое устройство не настроено - переключение отключено"),
    }

    // Сборка конвейера: монитор окон -> оркестратор -> аудиопровайдер
    let notifier = create_notifier(args.dry_run);
    let orchestrator = Arc::new(SwitchOrchestrator::new(
        audio.clone(),
        settings,
        notifier,
        config.retry.clone(),
    ));
    let backend = create_window_backend(config.clone(), args.dry_run).await?;
    let monitor = Arc::new(FocusModeMonitor::new(
        config.clone(),
        backend,
        orchestrator.clone(),
    ));

    info!("Все компоненты инициализированы");

    // Ошибка первого снимка окон фатальна: без бэкенда следить не за чем
    monitor.start().await?;

    if monitor.is_focus_mode_active() {
        info!("Focus-режим активен с момента запуска");
    }

    // Экспорт состояния: переходы focus-режима и изменения
    // аудиоподсистемы видны в логе
    let mut state_rx = monitor.subscribe_state();
    let mut audio_rx = audio.subscribe();
    let state_handle = tokio::spawn(async move {
        loop {
            tokio::select! {
                changed = state_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    if *state_rx.borrow() {
                        info!("Focus-режим активен");
                    } else {
                        info!("Focus-режим выключен");
                    }
                }
                event = audio_rx.recv() => {
                    match event {
                        Ok(events::AudioEvent::DefaultDeviceChanged(Some(device))) => {
                            info!("Устройство по умолчанию теперь: {}", device);
                        }
                        Ok(events::AudioEvent::DefaultDeviceChanged(None)) => {
                            warn!("Устройство по умолчанию пропало");
                        }
                        Ok(events::AudioEvent::DevicesChanged) => {
                            info!("Список аудиоустройств изменился");
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!("Пропущено {} аудио-событий", skipped);
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                    }
                }
            }
        }
    });

    info!("Все сервисы запущены");

    // Ожидание сигнала завершения
    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Получен сигнал завершения (Ctrl+C)");
        }
        Err(err) => {
            error!("Ошибка при ожидании сигнала завершения: {}", err);
        }
    }

    info!("Завершение работы...");

    // Останавливаем наблюдение; сохранённое устройство не восстанавливаем,
    // чтобы не дёргать звук под ногами у пользователя
    monitor.stop();
    state_handle.abort();

    let shutdown_timeout = tokio::time::Duration::from_secs(5);
    let shutdown_result = tokio::time::timeout(shutdown_timeout, async {
        audio.shutdown().await;
        let _ = state_handle.await;
    })
    .await;

    match shutdown_result {
        Ok(_) => info!("Все сервисы завершили работу корректно"),
        Err(_) => warn!("Таймаут при завершении сервисов"),
    }

    info!("Focus Switch завершил работу");
    Ok(())
}

async fn list_devices(audio: &Arc<dyn services::AudioProvider>) {
    let devices = audio.list_playback_devices().await;
    if devices.is_empty() {
        println!("Устройства воспроизведения не найдены");
        return;
    }
    println!("Устройства воспроизведения:");
    for device in devices {
        let marker = if device.is_default { "*" } else { " " };
        println!("  {} {}  {}", marker, device.id, device.full_name);
    }
}

/// "focus-switch.toml" -> "focus-switch-settings.toml" в том же каталоге
fn settings_path_for(config_path: &Path) -> PathBuf {
    let stem = config_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("focus-switch");
    config_path.with_file_name(format!("{}-settings.toml", stem))
}

fn init_tracing(level: &str) -> Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().compact())
        .init();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_path_sits_next_to_config() {
        let path = settings_path_for(Path::new("/etc/focus/focus-switch.toml"));
        assert_eq!(
            path,
            PathBuf::from("/etc/focus/focus-switch-settings.toml")
        );
    }

    #[test]
    fn test_settings_path_without_extension() {
        let path = settings_path_for(Path::new("myconf"));
        assert_eq!(path, PathBuf::from("myconf-settings.toml"));
    }
}
