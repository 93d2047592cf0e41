use serde::{Deserialize, Serialize};
use std::fmt;

/// Информация об окне
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WindowInfo {
    pub handle: u64,
    pub title: String,
    pub class: String,
    pub pid: Option<u32>,
    pub process: Option<String>,
    /// false для дочерних UI-элементов; бэкенды перечисляют только
    /// окна верхнего уровня
    pub top_level: bool,
}

impl WindowInfo {
    pub fn new(handle: u64, title: String) -> Self {
        Self {
            handle,
            title,
            class: String::new(),
            pid: None,
            process: None,
            top_level: true,
        }
    }

    pub fn with_class(mut self, class: String) -> Self {
        self.class = class;
        self
    }

    pub fn with_pid(mut self, pid: u32) -> Self {
        self.pid = Some(pid);
        self
    }

    pub fn with_process(mut self, process: String) -> Self {
        self.process = Some(process);
        self
    }

    #[allow(dead_code)]
    pub fn as_child_element(mut self) -> Self {
        self.top_level = false;
        self
    }

    /// Точное совпадение класса и заголовка (заголовок - регистронезависимо)
    pub fn matches_class_and_title(&self, class: &str, title: &str) -> bool {
        self.class == class && self.title.eq_ignore_ascii_case(title)
    }
}

impl fmt::Display for WindowInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.class.is_empty() {
            write!(f, "0x{:x} \"{}\"", self.handle, self.title)
        } else {
            write!(f, "0x{:x} \"{}\" ({})", self.handle, self.title, self.class)
        }
    }
}

/// Событие жизненного цикла окна
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowEvent {
    pub window: WindowInfo,
    pub timestamp: std::time::Instant,
    pub kind: WindowEventKind,
}

impl WindowEvent {
    pub fn new(window: WindowInfo, kind: WindowEventKind) -> Self {
        Self {
            window,
            timestamp: std::time::Instant::now(),
            kind,
        }
    }

    pub fn created(window: WindowInfo) -> Self {
        Self::new(window, WindowEventKind::Created)
    }

    pub fn destroyed(window: WindowInfo) -> Self {
        Self::new(window, WindowEventKind::Destroyed)
    }
}

impl fmt::Display for WindowEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?}: {} ({}ms ago)",
            self.kind,
            self.window,
            self.timestamp.elapsed().as_millis()
        )
    }
}

/// Тип события окна
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WindowEventKind {
    Created,
    Destroyed,
    Shown,
    Hidden,
}

impl WindowEventKind {
    /// События появления окна (заголовок обязан присутствовать)
    pub fn is_appearance(self) -> bool {
        matches!(self, WindowEventKind::Created | WindowEventKind::Shown)
    }

    /// События исчезновения окна (заголовок может отсутствовать)
    pub fn is_disappearance(self) -> bool {
        matches!(self, WindowEventKind::Destroyed | WindowEventKind::Hidden)
    }
}
