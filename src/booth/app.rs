//! Booth state machine and event loop
//!
//! ```text
//! Idle --trigger--> Countdown --> Capturing --> Displaying --> Idle
//!   \--quit--> Terminated
//! ```
//!
//! Everything runs on one thread. While counting down, capturing or displaying,
//! input is not read; presses made during that time are discarded before the
//! booth goes back to idle.

use std::io::Write;
use std::path::Path;
use std::thread;

use chrono::Local;
use image::imageops::FilterType;
use image::GenericImageView;
use tracing::{debug, error, info, warn};

use super::capture::{capture_path, Camera, CaptureOutcome, CaptureRequest};
use super::input::{BoothInput, InputSource};
use super::platform::Platform;
use super::ui::{render_text, sizes, Palette};
use crate::config::Config;
use crate::error::{BoothError, Result};
use crate::framebuffer::{encode, Framebuffer, FramebufferDevice, PixelFormat};

/// Printed when the booth is started outside a virtual terminal
pub const NOT_A_TERMINAL_HINT: [&str; 2] = [
    "Must run this program on a virtual terminal.",
    "Hint: use `chvt` and `conspy` to remotely control virtual terminals.",
];

/// Where the booth is in its cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoothState {
    Idle,
    Countdown,
    Capturing,
    Displaying,
    Terminated,
}

/// Result of one trigger
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhotoResult {
    /// The photo is on screen
    Shown { path: std::path::PathBuf },
    /// Capture or decode failed; the error prompt was shown
    Failed,
}

/// The photo booth: owns the framebuffer, the buttons and the camera
pub struct Booth<F: FramebufferDevice, I: InputSource, C: Camera> {
    fb: Framebuffer<F>,
    input: I,
    camera: C,
    config: Config,
    format: PixelFormat,
    palette: Palette,
    state: BoothState,
}

impl<F: FramebufferDevice, I: InputSource, C: Camera> Booth<F, I, C> {
    pub fn new(fb: Framebuffer<F>, input: I, camera: C, config: Config) -> Self {
        let format = fb.pixel_format();
        let palette = Palette::for_format(&format);
        Self {
            fb,
            input,
            camera,
            config,
            format,
            palette,
            state: BoothState::Idle,
        }
    }

    pub fn state(&self) -> BoothState {
        self.state
    }

    pub fn framebuffer(&self) -> &Framebuffer<F> {
        &self.fb
    }

    pub fn input(&self) -> &I {
        &self.input
    }

    pub fn camera(&self) -> &C {
        &self.camera
    }

    fn enter(&mut self, state: BoothState) {
        debug!(from = ?self.state, to = ?state, "Booth state change");
        self.state = state;
    }

    /// Serve triggers until a quit key is pressed or input ends.
    ///
    /// The ready prompt is drawn on start and after a failed capture; a
    /// successful photo stays on screen until the next trigger.
    pub fn run(&mut self) -> Result<()> {
        info!(
            width = self.format.width,
            height = self.format.height,
            bpp = self.format.bits_per_pixel,
            "Entering booth event loop"
        );

        let mut show_prompt = true;
        loop {
            self.enter(BoothState::Idle);
            if show_prompt {
                let ready = self.config.messages.ready.clone();
                self.show_text(&ready, sizes::PROMPT)?;
            }

            match self.input.next_input()? {
                Some(BoothInput::Trigger) => {
                    let result = self.take_photo()?;
                    show_prompt = result == PhotoResult::Failed;
                    self.input.discard_pending()?;
                }
                Some(BoothInput::Quit) => {
                    info!("Quit requested");
                    break;
                }
                None => {
                    warn!("Input closed, leaving booth");
                    break;
                }
            }
        }

        self.enter(BoothState::Terminated);
        Ok(())
    }

    /// One full countdown, capture and display cycle
    pub fn take_photo(&mut self) -> Result<PhotoResult> {
        self.countdown()?;

        self.enter(BoothState::Capturing);
        let cheese = self.config.messages.cheese.clone();
        self.show_text(&cheese, sizes::PROMPT)?;

        let request = CaptureRequest {
            width: self.format.width,
            height: self.format.height,
            greyscale: self.fb.wants_greyscale(),
            path: capture_path(&self.config.capture, Local::now()),
        };
        let outcome = match self.camera.capture(&request) {
            Ok(outcome) => outcome,
            Err(BoothError::Io(e)) => {
                error!(error = %e, "Failed to run capture tool");
                CaptureOutcome::Failed { code: None }
            }
            Err(e) => return Err(e),
        };

        self.enter(BoothState::Displaying);
        let processing = self.config.messages.processing.clone();
        self.show_text(&processing, sizes::STATUS)?;

        if let CaptureOutcome::Failed { code } = outcome {
            warn!(code = ?code, "Capture failed");
            self.show_failure()?;
            return Ok(PhotoResult::Failed);
        }

        match self.show_photo(&request.path) {
            Ok(()) => {
                info!(path = %request.path.display(), "Photo displayed");
                Ok(PhotoResult::Shown { path: request.path })
            }
            Err(BoothError::Image(e)) => {
                error!(path = %request.path.display(), error = %e, "Failed to load captured photo");
                self.show_failure()?;
                Ok(PhotoResult::Failed)
            }
            Err(e) => Err(e),
        }
    }

    fn countdown(&mut self) -> Result<()> {
        self.enter(BoothState::Countdown);
        let step = self.config.countdown.step();
        for n in (1..=self.config.countdown.from).rev() {
            self.show_text(&n.to_string(), sizes::COUNTDOWN)?;
            thread::sleep(step);
        }
        Ok(())
    }

    fn show_failure(&mut self) -> Result<()> {
        let failed = self.config.messages.failed.clone();
        self.show_text(&failed, sizes::STATUS)?;
        thread::sleep(self.config.countdown.error_display());
        Ok(())
    }

    /// Draw centred text over the whole screen
    pub fn show_text(&mut self, text: &str, size_px: u32) -> Result<()> {
        let image = render_text(
            self.format.width,
            self.format.height,
            text,
            size_px,
            self.palette,
        );
        self.fb.write_raw(&encode(&image, &self.format))
    }

    /// Load a captured PNG, fit it to the screen and draw it
    pub fn show_photo(&mut self, path: &Path) -> Result<()> {
        let mut image = image::open(path)?;
        let (width, height) = (self.format.width, self.format.height);
        if image.dimensions() != (width, height) {
            debug!(
                src = ?image.dimensions(),
                width = width,
                height = height,
                "Resizing photo to screen"
            );
            image = image.resize_exact(width, height, FilterType::Triangle);
        }
        self.fb.write_raw(&encode(&image, &self.format))
    }
}

/// Run a booth session: graphics mode, framebuffer for the active vt, event loop.
///
/// Text mode is restored before this returns, whether the loop ended normally
/// or with an error.
pub fn run<P: Platform>(platform: &mut P, config: &Config) -> Result<()> {
    let vt = platform.open_terminal()?;
    let graphics = vt.enter_graphics()?;

    let console = graphics.terminal().active()?;
    info!(vt = console, "Active virtual terminal");

    let fb = platform.open_framebuffer(console)?;
    let input = platform.open_input()?;
    let camera = platform.camera()?;

    let mut booth = Booth::new(fb, input, camera, config.clone());
    let result = booth.run();

    drop(booth);
    drop(graphics);
    result
}

/// Exit status for errors that end the booth cleanly, writing the operator hint
/// to `out`. Other errors return `None` and should propagate.
pub fn clean_exit_code(err: &BoothError, out: &mut dyn Write) -> Option<u8> {
    match err {
        BoothError::NotATerminal => {
            for line in NOT_A_TERMINAL_HINT {
                let _ = writeln!(out, "{}", line);
            }
            Some(1)
        }
        _ => None,
    }
}
