pub mod audio_provider;
pub mod notifier;
pub mod orchestrator;
pub mod settings;
pub mod window_monitor;

pub use audio_provider::{create_audio_provider, AudioProvider};
pub use notifier::{create_notifier, Notifier};
pub use orchestrator::{SwitchHandler, SwitchOrchestrator};
pub use settings::Settings;
pub use window_monitor::{create_window_backend, FocusModeMonitor};
