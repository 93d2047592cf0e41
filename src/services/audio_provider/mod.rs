//! AudioProvider service: responsibility and boundaries
//!
//! This module and its submodules are responsible ONLY for talking to the
//! platform audio subsystem: enumerating playback devices, reading/setting
//! the system default output and emitting change events. It MUST NOT contain
//! any switching policy (what to switch to, when to retry, what to restore).
//! All switching decisions are made exclusively by SwitchOrchestrator.

mod dry_run;
mod pactl;
mod r#trait;
mod wpctl;

pub use self::dry_run::DryRunAudioProvider;
pub use self::r#trait::{create_audio_provider, AudioProvider};
