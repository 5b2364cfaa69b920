//! Framebuffer photo booth
//!
//! Runs on a Linux virtual terminal: switches the console to graphics mode,
//! shows a prompt on the framebuffer, counts down on a button press, captures a
//! photo with an external tool and displays it. Text mode is restored on exit.

pub mod booth;
pub mod cli;
pub mod config;
pub mod error;
pub mod framebuffer;
pub mod logging;
pub mod terminal;

pub use config::Config;
pub use error::{BoothError, Result};
