pub mod audio;
pub mod window;

pub use audio::{AudioDevice, AudioEvent, DeviceRole};
pub use window::{WindowEvent, WindowEventKind, WindowInfo};
