use serde::{Deserialize, Serialize};
use std::fmt;

/// Аудиоустройство вывода. Неизменяемый результат перечисления:
/// идентичность определяется по `id`, при следующем запросе создаётся
/// свежее значение.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioDevice {
    pub id: String,
    pub short_name: String,
    pub full_name: String,
    pub is_default: bool,
}

impl AudioDevice {
    pub fn new(id: impl Into<String>, full_name: impl Into<String>) -> Self {
        let full_name = full_name.into();
        let short_name = short_name_of(&full_name);
        Self {
            id: id.into(),
            short_name,
            full_name,
            is_default: false,
        }
    }

    pub fn as_default(mut self) -> Self {
        self.is_default = true;
        self
    }
}

impl fmt::Display for AudioDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_default {
            write!(f, "{} [default]", self.full_name)
        } else {
            write!(f, "{}", self.full_name)
        }
    }
}

/// Короткое имя - описание до первой скобки
fn short_name_of(full_name: &str) -> String {
    match full_name.find(" (") {
        Some(pos) => full_name[..pos].to_string(),
        None => full_name.to_string(),
    }
}

/// Роль использования устройства по умолчанию. Разные приложения
/// запрашивают "своё" устройство по разным ролям, поэтому переключение
/// всегда затрагивает все три роли разом.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceRole {
    Multimedia,
    Console,
    Communications,
}

impl DeviceRole {
    pub const ALL: [DeviceRole; 3] = [
        DeviceRole::Multimedia,
        DeviceRole::Console,
        DeviceRole::Communications,
    ];
}

/// Событие изменения аудиоподсистемы
#[derive(Debug, Clone)]
pub enum AudioEvent {
    DefaultDeviceChanged(Option<AudioDevice>),
    DevicesChanged,
}
