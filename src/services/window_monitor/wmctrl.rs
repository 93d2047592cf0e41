use crate::error::{Result, SwitchError};
use crate::events::WindowInfo;
use crate::utils::process::process_name;
use std::process::Command;
use tracing::debug;

/// Оконный бэкенд для X11 через `wmctrl -lpx`
pub struct WmctrlBackend;

#[derive(Debug, Clone, PartialEq, Eq)]
struct ParsedWindow {
    handle: u64,
    pid: u32,
    class: String,
    title: String,
}

impl WmctrlBackend {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl super::WindowBackend for WmctrlBackend {
    async fn probe(&self) -> Result<()> {
        let output = Command::new("wmctrl").args(["-l"]).output()?;
        if output.status.success() {
            Ok(())
        } else {
            Err(SwitchError::BackendUnavailable("wmctrl failed".to_string()))
        }
    }

    async fn snapshot(&self) -> Result<Vec<WindowInfo>> {
        let output = Command::new("wmctrl")
            .args(["-lpx"])
            .output()
            .map_err(|e| SwitchError::Internal(format!("wmctrl не найден: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SwitchError::Internal(format!(
                "wmctrl вернул ошибку: {}",
                stderr
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let windows = stdout
            .lines()
            .filter_map(|line| {
                let parsed = parse_wmctrl_line(line)?;
                let mut window = WindowInfo::new(parsed.handle, parsed.title)
                    .with_class(parsed.class);
                if parsed.pid != 0 {
                    window = window.with_pid(parsed.pid);
                    // Процесс мог уже завершиться - тогда имя останется пустым
                    if let Some(name) = process_name(parsed.pid) {
                        window = window.with_process(name);
                    }
                }
                Some(window)
            })
            .collect::<Vec<_>>();

        debug!("wmctrl: {} окон в снимке", windows.len());
        Ok(windows)
    }
}

/// Разбор строки `wmctrl -lpx`:
///
/// ```text
/// 0x03a00003 -1 1234   navigator.Firefox    hostname Mozilla Firefox
/// ```
///
/// Поля: id окна, рабочий стол, pid, WM_CLASS (instance.Class), хост,
/// дальше заголовок (может содержать пробелы и быть пустым)
fn parse_wmctrl_line(line: &str) -> Option<ParsedWindow> {
    let mut rest = line;
    let mut fields = [""; 5];

    for field in fields.iter_mut() {
        rest = rest.trim_start();
        if rest.is_empty() {
            return None;
        }
        let end = rest
            .find(char::is_whitespace)
            .unwrap_or(rest.len());
        *field = &rest[..end];
        rest = &rest[end..];
    }

    let handle = u64::from_str_radix(fields[0].trim_start_matches("0x"), 16).ok()?;
    let pid = fields[2].parse::<u32>().ok()?;

    // WM_CLASS приходит как "instance.Class" - сравниваем по Class
    let class = fields[3]
        .rsplit_once('.')
        .map(|(_, class)| class)
        .unwrap_or(fields[3])
        .to_string();

    Some(ParsedWindow {
        handle,
        pid,
        class,
        title: rest.trim().to_string(),
    })
}
