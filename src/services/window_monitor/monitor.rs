use crate::config::Config;
use crate::debug_if_enabled;
use crate::error::Result;
use crate::events::{WindowEvent, WindowInfo};
use crate::services::orchestrator::SwitchHandler;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, Instant};
use tracing::{debug, info, warn};

/// Состояние детектора focus-режима.
/// Инвариант: active_window установлен тогда и только тогда, когда
/// is_active == true. Все переходы выполняются под одним мьютексом.
#[derive(Debug, Default)]
struct DetectorState {
    is_active: bool,
    active_window: Option<u64>,
    last_deactivation: Option<Instant>,
}

/// Монитор жизненного цикла окна focus-режима.
///
/// Снимки бэкенда превращаются в события появления/исчезновения, события
/// проходят четырёхступенчатый фильтр (верхний уровень, класс, заголовок,
/// процесс-владелец), затем анти-дребезг и двухшаговую проверку
/// деактивации. Подтверждённые переходы передаются обработчику.
pub struct FocusModeMonitor {
    config: Arc<Config>,
    backend: Arc<dyn super::WindowBackend>,
    handler: Arc<dyn SwitchHandler>,
    state: Mutex<DetectorState>,
    listening: AtomicBool,
    loop_task: Mutex<Option<JoinHandle<()>>>,
    state_tx: watch::Sender<bool>,
}

impl FocusModeMonitor {
    pub fn new(
        config: Arc<Config>,
        backend: Arc<dyn super::WindowBackend>,
        handler: Arc<dyn SwitchHandler>,
    ) -> Self {
        let (state_tx, _) = watch::channel(false);
        Self {
            config,
            backend,
            handler,
            state: Mutex::new(DetectorState::default()),
            listening: AtomicBool::new(false),
            loop_task: Mutex::new(None),
            state_tx,
        }
    }

    /// Переход Stopped -> Listening: одноразовая синхронная проверка
    /// присутствия окна, затем цикл наблюдения. Повторный вызов при
    /// активном наблюдении - no-op. Сбой начального снимка фатален.
    pub async fn start(self: &Arc<Self>) -> Result<()> {
        if self.listening.swap(true, Ordering::SeqCst) {
            debug!("Монитор уже запущен");
            return Ok(());
        }

        let initial = match self.backend.snapshot().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                self.listening.store(false, Ordering::SeqCst);
                return Err(e);
            }
        };

        // Окно может быть открыто ещё до запуска - активируемся сразу,
        // не дожидаясь события
        if let Some(window) = self.find_target(&initial) {
            info!("Окно focus-режима уже присутствует при запуске: {}", window);
            self.process_event(WindowEvent::created(window)).await;
        }

        let monitor = Arc::clone(self);
        let handle = tokio::spawn(async move {
            monitor.event_loop(initial).await;
        });
        *self.loop_task.lock() = Some(handle);

        info!("Монитор окна focus-режима запущен");
        Ok(())
    }

    /// Переход Listening -> Stopped; идемпотентен
    pub fn stop(&self) {
        if !self.listening.swap(false, Ordering::SeqCst) {
            return;
        }

        if let Some(handle) = self.loop_task.lock().take() {
            handle.abort();
        }
        info!("Монитор окна focus-режима остановлен");
    }

    pub fn is_focus_mode_active(&self) -> bool {
        self.state.lock().is_active
    }

    /// Канал FocusModeStateChanged для внешних наблюдателей
    pub fn subscribe_state(&self) -> watch::Receiver<bool> {
        self.state_tx.subscribe()
    }

    async fn event_loop(self: Arc<Self>, initial: Vec<WindowInfo>) {
        let mut prev: HashMap<u64, WindowInfo> = initial
            .into_iter()
            .map(|window| (window.handle, window))
            .collect();

        let mut poll = interval(Duration::from_millis(self.config.window.poll_interval_ms));
        poll.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            poll.tick().await;

            let snapshot = match self.backend.snapshot().await {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    warn!("Сбой снимка окон: {}", e);
                    continue;
                }
            };

            let current: HashMap<u64, WindowInfo> = snapshot
                .into_iter()
                .map(|window| (window.handle, window))
                .collect();

            for (handle, window) in &current {
                if !prev.contains_key(handle) {
                    self.process_event(WindowEvent::created(window.clone())).await;
                }
            }

            for (handle, window) in &prev {
                if !current.contains_key(handle) {
                    self.process_event(WindowEvent::destroyed(window.clone())).await;
                }
            }

            prev = current;
        }
    }

    /// Фильтр событий + логика переходов. Вызывается только из
    /// последовательного пути обработки (начальная проверка и цикл
    /// наблюдения), поэтому переходы не перемешиваются.
    pub(crate) async fn process_event(&self, event: WindowEvent) {
        // Стадия 1: только окна верхнего уровня
        if !event.window.top_level {
            return;
        }

        // Стадия 2: точное совпадение класса
        if event.window.class != self.config.window.class {
            return;
        }

        // Стадия 3: точный заголовок (регистронезависимо) - только для
        // событий появления; при destroy/hide заголовок легитимно
        // может отсутствовать
        if event.kind.is_appearance()
            && !event
                .window
                .title
                .eq_ignore_ascii_case(&self.config.window.title)
        {
            return;
        }

        // Стадия 4: процесс-владелец; процесс уже завершился - несовпадение
        let Some(process) = event.window.process.as_deref() else {
            debug_if_enabled!("Процесс-владелец окна {} неизвестен - пропускаем", event.window);
            return;
        };
        if !self.config.matches_host_process(process) {
            return;
        }

        debug_if_enabled!("Событие прошло фильтр: {}", event);

        if event.kind.is_appearance() {
            self.handle_appearance(event.window).await;
        } else if event.kind.is_disappearance() {
            self.handle_disappearance(event.window).await;
        }
    }

    async fn handle_appearance(&self, window: WindowInfo) {
        {
            let mut state = self.state.lock();

            if state.is_active {
                debug!("Focus-режим уже активен - событие игнорируется");
                return;
            }

            // Анти-дребезг: при пересоздании окна платформа даёт частые
            // show/hide - слишком быстрое повторное появление отбрасываем
            if let Some(last) = state.last_deactivation {
                let cooldown = Duration::from_millis(self.config.window.cooldown_ms);
                if last.elapsed() < cooldown {
                    debug!(
                        "Событие появления в пределах cooldown ({}мс) - игнорируется",
                        self.config.window.cooldown_ms
                    );
                    return;
                }
            }

            state.is_active = true;
            state.active_window = Some(window.handle);
        }

        let _ = self.state_tx.send(true);
        info!("Focus-режим активирован: {}", window);
        self.handler.handle_activation(&window).await;
    }

    async fn handle_disappearance(&self, window: WindowInfo) {
        {
            let state = self.state.lock();
            if !state.is_active {
                return;
            }
        }

        // Двухшаговая деактивация: одиночному destroy/hide не доверяем,
        // внутри приложения окна пересоздаются. Независимо перепроверяем,
        // осталось ли целевое окно.
        match self.backend.snapshot().await {
            Ok(snapshot) => {
                if let Some(still_there) = self.find_target(&snapshot) {
                    debug!(
                        "Окно focus-режима всё ещё присутствует ({}) - ложное исчезновение",
                        still_there
                    );
                    return;
                }
            }
            Err(e) => {
                // Отсутствие не подтверждено - остаёмся активными, чтобы
                // не восстановить устройство по ложному срабатыванию
                warn!("Перепроверка присутствия окна не удалась: {}", e);
                return;
            }
        }

        {
            let mut state = self.state.lock();
            if !state.is_active {
                return;
            }
            state.is_active = false;
            state.active_window = None;
            state.last_deactivation = Some(Instant::now());
        }

        let _ = self.state_tx.send(false);
        info!("Focus-режим деактивирован: {}", window);
        self.handler.handle_deactivation().await;
    }

    fn find_target(&self, windows: &[WindowInfo]) -> Option<WindowInfo> {
        windows
            .iter()
            .find(|window| {
                window.top_level
                    && window.matches_class_and_title(
                        &self.config.window.class,
                        &self.config.window.title,
                    )
                    && window
                        .process
                        .as_deref()
                        .map(|process| self.config.matches_host_process(process))
                        .unwrap_or(false)
            })
            .cloned()
    }
}

impl Drop for FocusModeMonitor {
    fn drop(&mut self) {
        if let Some(handle) = self.loop_task.lock().take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::DryRunWindowBackend;
    use super::*;
    use crate::events::WindowEventKind;

    #[derive(Default)]
    struct RecordingHandler {
        activations: Mutex<Vec<String>>,
        deactivations: Mutex<u32>,
    }

    #[async_trait::async_trait]
    impl SwitchHandler for RecordingHandler {
        async fn handle_activation(&self, window: &WindowInfo) {
            self.activations.lock().push(window.title.clone());
        }

        async fn handle_deactivation(&self) {
            *self.deactivations.lock() += 1;
        }
    }

    fn test_config() -> Arc<Config> {
        let mut config = Config::default();
        config.window.class = "FocusMode".to_string();
        config.window.title = "Focus Mode".to_string();
        config.window.host_processes = vec!["focus-host".to_string()];
        Arc::new(config)
    }

    fn target_window() -> WindowInfo {
        WindowInfo::new(0x4a, "Focus Mode".to_string())
            .with_class("FocusMode".to_string())
            .with_pid(1234)
            .with_process("focus-host".to_string())
    }

    fn setup() -> (
        Arc<FocusModeMonitor>,
        Arc<DryRunWindowBackend>,
        Arc<RecordingHandler>,
    ) {
        let backend = Arc::new(DryRunWindowBackend::new());
        let handler = Arc::new(RecordingHandler::default());
        let monitor = Arc::new(FocusModeMonitor::new(
            test_config(),
            backend.clone(),
            handler.clone(),
        ));
        (monitor, backend, handler)
    }

    #[tokio::test]
    async fn test_initial_presence_triggers_activation() {
        let (monitor, backend, handler) = setup();
        backend.add_window(target_window());

        monitor.start().await.unwrap();

        assert!(monitor.is_focus_mode_active());
        assert_eq!(handler.activations.lock().len(), 1);
        monitor.stop();
    }

    #[tokio::test]
    async fn test_filter_rejects_mismatched_events() {
        let (monitor, _backend, handler) = setup();

        // Не тот класс
        let wrong_class = WindowInfo::new(1, "Focus Mode".to_string())
            .with_class("Browser".to_string())
            .with_process("focus-host".to_string());
        monitor.process_event(WindowEvent::created(wrong_class)).await;

        // Не тот заголовок
        let wrong_title = WindowInfo::new(2, "Settings".to_string())
            .with_class("FocusMode".to_string())
            .with_process("focus-host".to_string());
        monitor.process_event(WindowEvent::created(wrong_title)).await;

        // Не тот процесс
        let wrong_process = target_window().with_process("impostor".to_string());
        monitor.process_event(WindowEvent::created(wrong_process)).await;

        // Неизвестный процесс (владелец уже завершился)
        let mut no_process = target_window();
        no_process.process = None;
        monitor.process_event(WindowEvent::created(no_process)).await;

        // Дочерний UI-элемент
        let child = target_window().as_child_element();
        monitor.process_event(WindowEvent::created(child)).await;

        assert!(!monitor.is_focus_mode_active());
        assert!(handler.activations.lock().is_empty());
    }

    #[tokio::test]
    async fn test_title_case_insensitive() {
        let (monitor, _backend, handler) = setup();

        let mut window = target_window();
        window.title = "FOCUS MODE".to_string();
        monitor.process_event(WindowEvent::created(window)).await;

        assert!(monitor.is_focus_mode_active());
        assert_eq!(handler.activations.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_activation_ignored() {
        let (monitor, _backend, handler) = setup();

        monitor.process_event(WindowEvent::created(target_window())).await;
        monitor.process_event(WindowEvent::created(target_window())).await;

        assert_eq!(handler.activations.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_two_step_deactivation_rejects_false_disappearance() {
        let (monitor, backend, handler) = setup();

        backend.add_window(target_window());
        monitor.process_event(WindowEvent::created(target_window())).await;
        assert!(monitor.is_focus_mode_active());

        // Окно "исчезло" по событию, но перепроверка находит его в снимке
        monitor
            .process_event(WindowEvent::destroyed(target_window()))
            .await;

        assert!(monitor.is_focus_mode_active());
        assert_eq!(*handler.deactivations.lock(), 0);
    }

    #[tokio::test]
    async fn test_confirmed_disappearance_deactivates() {
        let (monitor, backend, handler) = setup();

        backend.add_window(target_window());
        monitor.process_event(WindowEvent::created(target_window())).await;

        backend.clear_windows();
        // Заголовок при destroy может быть пустым - фильтр его не проверяет
        let mut gone = target_window();
        gone.title = String::new();
        monitor.process_event(WindowEvent::destroyed(gone)).await;

        assert!(!monitor.is_focus_mode_active());
        assert_eq!(*handler.deactivations.lock(), 1);
    }

    #[tokio::test]
    async fn test_disappearance_while_inactive_ignored() {
        let (monitor, _backend, handler) = setup();

        monitor
            .process_event(WindowEvent::destroyed(target_window()))
            .await;

        assert_eq!(*handler.deactivations.lock(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cooldown_suppresses_rapid_reactivation() {
        let (monitor, backend, handler) = setup();

        // Активация и подтверждённая деактивация
        monitor.process_event(WindowEvent::created(target_window())).await;
        backend.clear_windows();
        monitor
            .process_event(WindowEvent::destroyed(target_window()))
            .await;
        assert!(!monitor.is_focus_mode_active());

        // Повторные появления в пределах 1000мс - игнорируются оба
        tokio::time::advance(Duration::from_millis(300)).await;
        monitor.process_event(WindowEvent::created(target_window())).await;
        tokio::time::advance(Duration::from_millis(200)).await;
        monitor.process_event(WindowEvent::created(target_window())).await;
        assert!(!monitor.is_focus_mode_active());
        assert_eq!(handler.activations.lock().len(), 1);

        // После истечения cooldown активация проходит
        tokio::time::advance(Duration::from_millis(800)).await;
        monitor.process_event(WindowEvent::created(target_window())).await;
        assert!(monitor.is_focus_mode_active());
        assert_eq!(handler.activations.lock().len(), 2);
    }

    #[tokio::test]
    async fn test_shown_and_hidden_follow_same_paths() {
        let (monitor, backend, handler) = setup();

        monitor
            .process_event(WindowEvent::new(target_window(), WindowEventKind::Shown))
            .await;
        assert!(monitor.is_focus_mode_active());

        backend.clear_windows();
        monitor
            .process_event(WindowEvent::new(target_window(), WindowEventKind::Hidden))
            .await;
        assert!(!monitor.is_focus_mode_active());
        assert_eq!(*handler.deactivations.lock(), 1);
    }

    #[tokio::test]
    async fn test_start_stop_idempotent() {
        let (monitor, _backend, _handler) = setup();

        monitor.start().await.unwrap();
        monitor.start().await.unwrap();
        assert!(monitor.loop_task.lock().is_some());

        monitor.stop();
        monitor.stop();
        assert!(monitor.loop_task.lock().is_none());

        // После остановки можно запуститься заново
        monitor.start().await.unwrap();
        assert!(monitor.loop_task.lock().is_some());
        monitor.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_event_loop_detects_appearance() {
        let (monitor, backend, handler) = setup();

        monitor.start().await.unwrap();
        assert!(!monitor.is_focus_mode_active());

        backend.add_window(target_window());
        tokio::time::sleep(Duration::from_millis(1200)).await;

        assert!(monitor.is_focus_mode_active());
        assert_eq!(handler.activations.lock().len(), 1);
        monitor.stop();
    }

    #[tokio::test]
    async fn test_state_channel_follows_transitions() {
        let (monitor, backend, _handler) = setup();
        let state_rx = monitor.subscribe_state();
        assert!(!*state_rx.borrow());

        monitor.process_event(WindowEvent::created(target_window())).await;
        assert!(*state_rx.borrow());

        backend.clear_windows();
        monitor
            .process_event(WindowEvent::destroyed(target_window()))
            .await;
        assert!(!*state_rx.borrow());
    }
}
