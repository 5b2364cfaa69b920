//! Photo booth
//!
//! Architecture:
//! - `app.rs` - state machine, event loop and session startup/shutdown
//! - `platform.rs` - opening the console, framebuffer, buttons and camera
//! - `input.rs` - evdev button handling
//! - `capture.rs` - external capture tool and photo file naming
//! - `ui.rs` - status text rendering

pub mod app;
pub mod capture;
pub mod input;
pub mod platform;
pub mod ui;

pub use app::{clean_exit_code, run, Booth, BoothState, PhotoResult, NOT_A_TERMINAL_HINT};
pub use capture::{capture_path, Camera, CaptureOutcome, CaptureRequest, CommandCamera};
pub use input::{BoothInput, EvdevInput, InputSource, KeyMap, ShutdownSignals};
pub use platform::{LinuxPlatform, Platform};
pub use ui::{render_text, sizes, Palette};
