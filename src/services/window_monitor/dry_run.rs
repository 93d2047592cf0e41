use crate::config::Config;
use crate::error::Result;
use crate::events::WindowInfo;
use parking_lot::Mutex;
use tracing::info;

/// Эмулированный оконный бэкенд для dry-run режима и тестов.
///
/// В тестах снимок задаётся напрямую через set_windows/clear_windows.
/// В dry-run режиме демон периодически "показывает" и "прячет" целевое
/// окно, чтобы прогнать весь цикл переключения без реального рабочего
/// стола.
pub struct DryRunWindowBackend {
    windows: Mutex<Vec<WindowInfo>>,
    demo: Option<DemoScript>,
}

struct DemoScript {
    target: WindowInfo,
    toggle_every: u32,
    counter: Mutex<u32>,
}

impl DryRunWindowBackend {
    pub fn new() -> Self {
        Self {
            windows: Mutex::new(Vec::new()),
            demo: None,
        }
    }

    /// Бэкенд для dry-run режима: целевое окно из конфигурации
    /// появляется и исчезает каждые toggle_every снимков
    pub fn with_demo(config: &Config) -> Self {
        let target = WindowInfo::new(0xd17, config.window.title.clone())
            .with_class(config.window.class.clone())
            .with_process(
                config
                    .window
                    .host_processes
                    .first()
                    .cloned()
                    .unwrap_or_else(|| "focus-host".to_string()),
            );

        Self {
            windows: Mutex::new(Vec::new()),
            demo: Some(DemoScript {
                target,
                toggle_every: 20,
                counter: Mutex::new(0),
            }),
        }
    }

    pub fn add_window(&self, window: WindowInfo) {
        self.windows.lock().push(window);
    }

    pub fn remove_window(&self, handle: u64) {
        self.windows.lock().retain(|window| window.handle != handle);
    }

    pub fn clear_windows(&self) {
        self.windows.lock().clear();
    }
}

impl Default for DryRunWindowBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl super::WindowBackend for DryRunWindowBackend {
    async fn probe(&self) -> Result<()> {
        Ok(())
    }

    async fn snapshot(&self) -> Result<Vec<WindowInfo>> {
        if let Some(demo) = &self.demo {
            let mut counter = demo.counter.lock();
            *counter += 1;

            let present = (*counter / demo.toggle_every) % 2 == 1;
            let mut windows = self.windows.lock();
            let has_target = windows.iter().any(|w| w.handle == demo.target.handle);

            if present && !has_target {
                info!("Dry-run: эмулируем появление окна {}", demo.target);
                windows.push(demo.target.clone());
            } else if !present && has_target {
                info!("Dry-run: эмулируем исчезновение окна {}", demo.target);
                windows.retain(|w| w.handle != demo.target.handle);
            }

            return Ok(windows.clone());
        }

        Ok(self.windows.lock().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::super::WindowBackend;
    use super::*;

    #[tokio::test]
    async fn test_snapshot_reflects_set_windows() {
        let backend = DryRunWindowBackend::new();
        assert!(backend.snapshot().await.unwrap().is_empty());

        backend.add_window(WindowInfo::new(1, "Focus Mode".to_string()));
        assert_eq!(backend.snapshot().await.unwrap().len(), 1);

        backend.remove_window(1);
        assert!(backend.snapshot().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_demo_toggles_target_presence() {
        let config = Config::default();
        let backend = DryRunWindowBackend::with_demo(&config);

        let mut appeared = false;
        let mut disappeared = false;
        let mut was_present = false;

        for _ in 0..100 {
            let present = !backend.snapshot().await.unwrap().is_empty();
            if present && !was_present {
                appeared = true;
            }
            if !present && was_present {
                disappeared = true;
            }
            was_present = present;
        }

        assert!(appeared);
        assert!(disappeared);
    }
}
