//! Configuration management for the photo booth.
//!
//! Everything has a default; a YAML file only needs the keys it changes.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::format::{Item, StrftimeItems};
use evdev::Key;
use serde::Deserialize;
use tracing::info;

use crate::cli::Args;
use crate::error::{BoothError, Result};

/// Location checked when no `--config` is given
pub const DEFAULT_CONFIG_PATH: &str = "/etc/fb-photo-booth.yaml";

/// Main configuration structure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub framebuffer: FramebufferConfig,
    pub capture: CaptureConfig,
    pub countdown: CountdownConfig,
    pub keys: KeyConfig,
    pub messages: MessageConfig,
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)
            .map_err(|e| BoothError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load the explicit config file, else the default location if present,
    /// else built-in defaults; then apply CLI overrides.
    pub fn resolve(args: &Args) -> Result<Self> {
        let config = match &args.config {
            Some(path) => {
                let config = Self::load(path)?;
                info!(config_path = %path.display(), "Configuration loaded");
                config
            }
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
                let config = Self::load(DEFAULT_CONFIG_PATH)?;
                info!(config_path = DEFAULT_CONFIG_PATH, "Configuration loaded from default location");
                config
            }
            None => {
                info!("No config file found, using CLI arguments and defaults");
                Self::default()
            }
        };

        let config = config.with_cli_overrides(args);
        config.validate()?;
        Ok(config)
    }

    /// Apply CLI argument overrides to the configuration.
    pub fn with_cli_overrides(mut self, args: &Args) -> Self {
        if let Some(ref device) = args.framebuffer {
            self.framebuffer.device = Some(device.clone());
        }

        if let Some(ref dir) = args.output_dir {
            self.capture.output_dir = dir.clone();
        }

        if let Some(ref tool) = args.capture_tool {
            self.capture.tool = tool.clone();
        }

        if let Some(from) = args.countdown {
            self.countdown.from = from;
        }

        self
    }

    /// Check for settings the booth cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.capture.tool.trim().is_empty() {
            return Err(BoothError::Config("capture.tool must not be empty".to_string()));
        }
        if StrftimeItems::new(&self.capture.timestamp_format).any(|item| matches!(item, Item::Error)) {
            return Err(BoothError::Config(format!(
                "capture.timestamp_format is not a valid strftime format: {}",
                self.capture.timestamp_format
            )));
        }
        if self.keys.trigger.is_empty() {
            return Err(BoothError::Config("keys.trigger must list at least one key".to_string()));
        }
        if self.keys.quit.is_empty() {
            return Err(BoothError::Config("keys.quit must list at least one key".to_string()));
        }
        if let Some(code) = self.keys.trigger.iter().find(|c| self.keys.quit.contains(c)) {
            return Err(BoothError::Config(format!(
                "key code {} is both a trigger and a quit key",
                code
            )));
        }
        Ok(())
    }
}

/// Which framebuffer to draw on.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FramebufferConfig {
    /// Explicit device node; when unset the node mapped to the active vt is used
    pub device: Option<String>,
}

/// External capture tool invocation.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Program to run, fswebcam compatible
    pub tool: String,
    /// Arguments inserted before the generated ones (e.g. `--device /dev/video1`)
    pub extra_args: Vec<String>,
    /// Directory photos are saved to
    pub output_dir: PathBuf,
    /// File name prefix, followed by the timestamp
    pub filename_prefix: String,
    /// chrono format string for the timestamp part
    pub timestamp_format: String,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            tool: "fswebcam".to_string(),
            extra_args: Vec::new(),
            output_dir: PathBuf::from("."),
            filename_prefix: "raw-".to_string(),
            timestamp_format: "%Y%m%d-%H%M%S".to_string(),
        }
    }
}

/// Countdown pacing.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CountdownConfig {
    /// First number shown; counts down to 1
    pub from: u32,
    /// Delay between numbers in milliseconds
    pub step_ms: u64,
    /// How long a capture failure stays on screen in milliseconds
    pub error_display_ms: u64,
}

impl CountdownConfig {
    pub fn step(&self) -> Duration {
        Duration::from_millis(self.step_ms)
    }

    pub fn error_display(&self) -> Duration {
        Duration::from_millis(self.error_display_ms)
    }
}

impl Default for CountdownConfig {
    fn default() -> Self {
        Self {
            from: 3,
            step_ms: 1250,
            error_display_ms: 2000,
        }
    }
}

/// Input key codes (`KEY_*` from `<linux/input-event-codes.h>`).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct KeyConfig {
    /// Keys that start a capture
    pub trigger: Vec<u16>,
    /// Keys that end the program
    pub quit: Vec<u16>,
}

impl Default for KeyConfig {
    fn default() -> Self {
        Self {
            trigger: vec![Key::KEY_ENTER.code(), Key::KEY_CAMERA.code()],
            quit: vec![Key::KEY_BACKSPACE.code()],
        }
    }
}

/// On-screen text.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MessageConfig {
    pub ready: String,
    pub cheese: String,
    pub processing: String,
    pub failed: String,
}

impl Default for MessageConfig {
    fn default() -> Self {
        Self {
            ready: "Ready!".to_string(),
            cheese: "Cheese!".to_string(),
            processing: "Please wait...".to_string(),
            failed: "Capture failed".to_string(),
        }
    }
}
