//! WindowMonitor service: responsibility and boundaries
//!
//! This module and its submodules are responsible ONLY for observing the
//! window lifecycle (snapshots and appearance/disappearance events depending
//! on backend) and deciding when focus mode has truly started or stopped:
//! the filter pipeline, the anti-flap cooldown and the deactivation
//! re-check. It MUST NOT contain any audio logic. What happens on
//! activation/deactivation is decided exclusively by the SwitchHandler
//! consumer (SwitchOrchestrator).

mod dry_run;
mod monitor;
mod sway;
mod r#trait;
mod wmctrl;

pub use self::dry_run::DryRunWindowBackend;
pub use self::monitor::FocusModeMonitor;
pub use self::r#trait::{create_window_backend, WindowBackend};
