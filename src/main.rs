//! Framebuffer photo booth entry point.

use std::io;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use fb_photo_booth::booth::{self, LinuxPlatform};
use fb_photo_booth::cli::Args;
use fb_photo_booth::logging::init_logging;
use fb_photo_booth::Config;

fn main() -> Result<ExitCode> {
    let args = Args::parse();

    init_logging(&args.log_level).context("Failed to initialise logging")?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting fb-photo-booth"
    );

    let config = Config::resolve(&args).context("Failed to load configuration")?;

    let mut platform =
        LinuxPlatform::new(config.clone()).context("Failed to install signal handling")?;
    match booth::run(&mut platform, &config) {
        Ok(()) => {
            info!("Photo booth stopped");
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => match booth::clean_exit_code(&e, &mut io::stderr()) {
            Some(code) => Ok(ExitCode::from(code)),
            None => Err(anyhow::Error::new(e).context("Photo booth failed")),
        },
    }
}
