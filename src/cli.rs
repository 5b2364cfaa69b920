//! Command-line argument parsing.

use std::path::PathBuf;

use clap::Parser;

/// Framebuffer photo booth - countdown, capture and display on a kiosk console
#[derive(Parser, Debug, Default)]
#[command(name = "fb-photo-booth")]
#[command(about = "Framebuffer photo booth - countdown, capture and display on a kiosk console")]
#[command(version)]
pub struct Args {
    /// Path to configuration file (optional, defaults used if not found)
    #[arg(short, long, env = "FB_PHOTO_BOOTH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    pub log_level: String,

    /// Framebuffer device to draw on instead of the one mapped to the active console
    #[arg(long)]
    pub framebuffer: Option<String>,

    /// Directory captured photos are saved to
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Capture tool to invoke
    #[arg(long)]
    pub capture_tool: Option<String>,

    /// Countdown start value
    #[arg(long)]
    pub countdown: Option<u32>,
}
