//! Photo capture via an external webcam tool
//!
//! The booth does not talk to the camera itself. It runs an fswebcam-compatible
//! program that grabs a frame, scales it to the framebuffer resolution and saves
//! a PNG, then loads that file back for display.

use std::path::{Path, PathBuf};
use std::process::Command;

use chrono::{DateTime, Local};
use tracing::{info, warn};

use crate::config::CaptureConfig;
use crate::error::Result;

/// What to capture and where to put it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureRequest {
    pub width: u32,
    pub height: u32,
    pub greyscale: bool,
    pub path: PathBuf,
}

/// How a capture attempt ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// The tool exited successfully
    Saved,
    /// The tool ran but reported failure
    Failed { code: Option<i32> },
}

/// Anything that can produce a PNG for a [`CaptureRequest`].
pub trait Camera {
    /// Take a picture, blocking until done
    fn capture(&mut self, request: &CaptureRequest) -> Result<CaptureOutcome>;
}

/// Runs an fswebcam-compatible command line
#[derive(Debug, Clone)]
pub struct CommandCamera {
    tool: String,
    extra_args: Vec<String>,
}

impl CommandCamera {
    pub fn new(config: &CaptureConfig) -> Self {
        Self {
            tool: config.tool.clone(),
            extra_args: config.extra_args.clone(),
        }
    }

    /// Arguments for one capture, after any configured extras
    pub fn args(&self, request: &CaptureRequest) -> Vec<String> {
        let mut args = self.extra_args.clone();
        args.push("--quiet".to_string());
        args.push("--no-banner".to_string());
        args.push("--scale".to_string());
        args.push(format!("{}x{}", request.width, request.height));
        if request.greyscale {
            args.push("--greyscale".to_string());
        }
        args.push("--png".to_string());
        args.push("--save".to_string());
        args.push(request.path.to_string_lossy().into_owned());
        args
    }
}

impl Camera for CommandCamera {
    fn capture(&mut self, request: &CaptureRequest) -> Result<CaptureOutcome> {
        let args = self.args(request);
        info!(tool = %self.tool, path = %request.path.display(), "Capturing photo");

        // No timeout: a hung tool stalls the booth. std resets the signal
        // mask in the child, so Ctrl-C still reaches it.
        let status = Command::new(&self.tool).args(&args).status()?;

        if status.success() {
            Ok(CaptureOutcome::Saved)
        } else {
            warn!(tool = %self.tool, status = %status, "Capture tool failed");
            Ok(CaptureOutcome::Failed {
                code: status.code(),
            })
        }
    }
}

/// `<dir>/<prefix><timestamp>.png`, with `-N` appended if that name is taken
pub fn capture_path(config: &CaptureConfig, now: DateTime<Local>) -> PathBuf {
    let stem = format!(
        "{}{}",
        config.filename_prefix,
        now.format(&config.timestamp_format)
    );
    unique_path(&config.output_dir, &stem, "png")
}

fn unique_path(dir: &Path, stem: &str, extension: &str) -> PathBuf {
    let candidate = dir.join(format!("{}.{}", stem, extension));
    if !candidate.exists() {
        return candidate;
    }
    (1u32..)
        .map(|n| dir.join(format!("{}-{}.{}", stem, n, extension)))
        .find(|path| !path.exists())
        .unwrap_or(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn request(greyscale: bool) -> CaptureRequest {
        CaptureRequest {
            width: 178,
            height: 128,
            greyscale,
            path: PathBuf::from("raw-20240101-120000.png"),
        }
    }

    #[test]
    fn test_command_line_matches_fswebcam() {
        let camera = CommandCamera::new(&CaptureConfig::default());
        assert_eq!(
            camera.args(&request(true)),
            vec![
                "--quiet",
                "--no-banner",
                "--scale",
                "178x128",
                "--greyscale",
                "--png",
                "--save",
                "raw-20240101-120000.png"
            ]
        );
        assert!(!camera.args(&request(false)).contains(&"--greyscale".to_string()));
    }

    #[test]
    fn test_extra_args_come_first() {
        let config = CaptureConfig {
            extra_args: vec!["--device".to_string(), "/dev/video1".to_string()],
            ..Default::default()
        };
        let args = CommandCamera::new(&config).args(&request(false));
        assert_eq!(&args[..2], &["--device", "/dev/video1"]);
    }

    #[test]
    fn test_capture_path_is_timestamped_and_unique() {
        let dir = tempfile::tempdir().unwrap();
        let config = CaptureConfig {
            output_dir: dir.path().to_path_buf(),
            ..Default::default()
        };
        let now = Local.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();

        let first = capture_path(&config, now);
        assert_eq!(first, dir.path().join("raw-20240102-030405.png"));

        std::fs::write(&first, b"").unwrap();
        let second = capture_path(&config, now);
        assert_eq!(second, dir.path().join("raw-20240102-030405-1.png"));
    }

    #[test]
    fn test_missing_tool_is_an_io_error() {
        let config = CaptureConfig {
            tool: "/nonexistent/capture-tool".to_string(),
            ..Default::default()
        };
        let mut camera = CommandCamera::new(&config);
        assert!(camera.capture(&request(false)).is_err());
    }

    #[test]
    fn test_nonzero_exit_is_reported() {
        let config = CaptureConfig {
            tool: "false".to_string(),
            ..Default::default()
        };
        let mut camera = CommandCamera::new(&config);
        assert_eq!(
            camera.capture(&request(false)).unwrap(),
            CaptureOutcome::Failed { code: Some(1) }
        );
    }

    #[test]
    fn test_tool_runs_with_signals_unblocked() {
        use nix::sys::signal::{SigSet, Signal};

        let mut mask = SigSet::empty();
        mask.add(Signal::SIGINT);
        mask.add(Signal::SIGTERM);
        mask.thread_block().unwrap();

        let config = CaptureConfig {
            tool: "sh".to_string(),
            extra_args: vec![
                "-c".to_string(),
                "grep -q '^SigBlk:[[:space:]]*0*$' /proc/self/status".to_string(),
            ],
            ..Default::default()
        };
        let mut camera = CommandCamera::new(&config);
        let outcome = camera.capture(&request(false)).unwrap();

        mask.thread_unblock().unwrap();
        assert_eq!(outcome, CaptureOutcome::Saved);
    }
}
