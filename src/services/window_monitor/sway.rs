use crate::error::{Result, SwitchError};
use crate::events::WindowInfo;
use crate::utils::process::process_name;
use std::process::Command;
use tracing::debug;

/// Оконный бэкенд для Sway/wlroots через `swaymsg -t get_tree`
pub struct SwayBackend;

impl SwayBackend {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl super::WindowBackend for SwayBackend {
    async fn probe(&self) -> Result<()> {
        let output = Command::new("swaymsg").args(["-t", "get_tree"]).output()?;
        if output.status.success() {
            Ok(())
        } else {
            Err(SwitchError::BackendUnavailable("sway failed".to_string()))
        }
    }

    async fn snapshot(&self) -> Result<Vec<WindowInfo>> {
        let output = Command::new("swaymsg")
            .args(["-t", "get_tree"])
            .output()
            .map_err(|e| SwitchError::Internal(format!("swaymsg не найден: {}", e)))?;

        if !output.status.success() {
            return Err(SwitchError::Internal(
                "swaymsg вернул ошибку".to_string(),
            ));
        }

        let tree: serde_json::Value =
            serde_json::from_slice(&output.stdout).map_err(|e| {
                SwitchError::Internal(format!("Не удалось разобрать дерево sway: {}", e))
            })?;

        let mut windows = Vec::new();
        collect_windows(&tree, &mut windows);

        // Имена процессов подставляем после обхода
        let windows = windows
            .into_iter()
            .map(|window| match window.pid.and_then(process_name) {
                Some(name) => window.with_process(name),
                None => window,
            })
            .collect::<Vec<_>>();

        debug!("sway: {} окон в снимке", windows.len());
        Ok(windows)
    }
}

/// Рекурсивный обход дерева контейнеров: окном считается узел с pid и
/// app_id (wayland) или window_properties.class (xwayland)
fn collect_windows(node: &serde_json::Value, out: &mut Vec<WindowInfo>) {
    let pid = node.get("pid").and_then(|v| v.as_u64());

    let class = node
        .get("app_id")
        .and_then(|v| v.as_str())
        .or_else(|| {
            node.get("window_properties")
                .and_then(|props| props.get("class"))
                .and_then(|v| v.as_str())
        });

    if let (Some(pid), Some(class)) = (pid, class) {
        let handle = node.get("id").and_then(|v| v.as_u64()).unwrap_or(0);
        let title = node
            .get("name")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();

        out.push(
            WindowInfo::new(handle, title)
                .with_class(class.to_string())
                .with_pid(pid as u32),
        );
    }

    for key in ["nodes", "floating_nodes"] {
        if let Some(children) = node.get(key).and_then(|v| v.as_array()) {
            for child in children {
                collect_windows(child, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_TREE: &str = r#"{
        "id": 1,
        "name": "root",
        "nodes": [
            {
                "id": 10,
                "name": "workspace 1",
                "nodes": [
                    {
                        "id": 42,
                        "name": "Focus Mode",
                        "pid": 1234,
                        "app_id": "FocusMode",
                        "nodes": []
                    },
                    {
                        "id": 43,
                        "name": "Mozilla Firefox",
                        "pid": 5678,
                        "app_id": null,
                        "window_properties": { "class": "Firefox" },
                        "nodes": []
                    }
                ],
                "floating_nodes": [
                    {
                        "id": 44,
                        "name": "Calculator",
                        "pid": 910,
                        "app_id": "org.gnome.Calculator",
                        "nodes": []
                    }
                ]
            }
        ]
    }"#;

    #[test]
    fn test_collect_windows() {
        let tree: serde_json::Value = serde_json::from_str(SAMPLE_TREE).unwrap();
        let mut windows = Vec::new();
        collect_windows(&tree, &mut windows);

        assert_eq!(windows.len(), 3);

        assert_eq!(windows[0].handle, 42);
        assert_eq!(windows[0].class, "FocusMode");
        assert_eq!(windows[0].title, "Focus Mode");
        assert_eq!(windows[0].pid, Some(1234));

        // xwayland-окно с классом из window_properties
        assert_eq!(windows[1].class, "Firefox");

        // floating-окна тоже попадают в снимок
        assert_eq!(windows[2].handle, 44);
    }

    #[test]
    fn test_containers_without_pid_skipped() {
        let tree: serde_json::Value = serde_json::from_str(SAMPLE_TREE).unwrap();
        let mut windows = Vec::new();
        collect_windows(&tree, &mut windows);

        // Корень и workspace не считаются окнами
        assert!(windows.iter().all(|w| w.handle != 1 && w.handle != 10));
    }
}
