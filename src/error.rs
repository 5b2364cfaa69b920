//! Error types for the photo booth.

use thiserror::Error;

/// Errors that can occur while driving the console, framebuffer, camera or buttons.
#[derive(Error, Debug)]
pub enum BoothError {
    /// The controlling terminal is not a kernel virtual terminal (e.g. an SSH session).
    #[error("Controlling terminal is not a virtual terminal")]
    NotATerminal,

    /// Plain I/O failure (open, write, spawn).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A device-control request was rejected by the driver.
    #[error("{request} failed: {source}")]
    Ioctl {
        request: &'static str,
        #[source]
        source: nix::Error,
    },

    /// The driver answered the screen info queries with unusable geometry.
    #[error("Invalid screen info: {0}")]
    InvalidScreenInfo(String),

    /// Decoding or encoding an image failed.
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// No input device advertises key events.
    #[error("No key input devices found")]
    NoInputDevices,
}

impl BoothError {
    pub(crate) fn ioctl(request: &'static str) -> impl FnOnce(nix::Error) -> Self {
        move |source| BoothError::Ioctl { request, source }
    }
}

/// Result type alias for booth operations.
pub type Result<T> = std::result::Result<T, BoothError>;
