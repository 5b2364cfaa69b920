//! Device acquisition
//!
//! Everything the booth opens at startup comes from a [`Platform`], so the whole
//! startup and shutdown sequence can run against mock devices.

use tracing::info;

use super::capture::{Camera, CommandCamera};
use super::input::{EvdevInput, InputSource, KeyMap, ShutdownSignals};
use crate::config::Config;
use crate::error::Result;
use crate::framebuffer::{FbNode, Framebuffer, FramebufferDevice};
use crate::terminal::{ConsoleDevice, ConsoleTty, VirtualTerminal};

/// Opens the devices a booth session needs.
pub trait Platform {
    type Console: ConsoleDevice;
    type Framebuffer: FramebufferDevice;
    type Input: InputSource;
    type Camera: Camera;

    /// The controlling virtual terminal
    fn open_terminal(&mut self) -> Result<VirtualTerminal<Self::Console>>;

    /// The framebuffer to draw on, given the active vt
    fn open_framebuffer(&mut self, console: u32) -> Result<Framebuffer<Self::Framebuffer>>;

    /// Button input
    fn open_input(&mut self) -> Result<Self::Input>;

    /// Photo source
    fn camera(&mut self) -> Result<Self::Camera>;
}

/// Real devices on a Linux console
pub struct LinuxPlatform {
    config: Config,
    signals: Option<ShutdownSignals>,
}

impl LinuxPlatform {
    /// Takes over SIGINT and SIGTERM straight away, before the console leaves
    /// text mode
    pub fn new(config: Config) -> Result<Self> {
        Ok(Self {
            config,
            signals: Some(ShutdownSignals::open()?),
        })
    }
}

impl Platform for LinuxPlatform {
    type Console = ConsoleTty;
    type Framebuffer = FbNode;
    type Input = EvdevInput;
    type Camera = CommandCamera;

    fn open_terminal(&mut self) -> Result<VirtualTerminal<ConsoleTty>> {
        VirtualTerminal::open()
    }

    fn open_framebuffer(&mut self, console: u32) -> Result<Framebuffer<FbNode>> {
        match &self.config.framebuffer.device {
            Some(path) => {
                info!(path = %path, "Using configured framebuffer");
                Framebuffer::open(path)
            }
            None => Framebuffer::for_console(console),
        }
    }

    fn open_input(&mut self) -> Result<EvdevInput> {
        let signals = match self.signals.take() {
            Some(signals) => signals,
            None => ShutdownSignals::open()?,
        };
        EvdevInput::open(KeyMap::new(&self.config.keys), signals)
    }

    fn camera(&mut self) -> Result<CommandCamera> {
        Ok(CommandCamera::new(&self.config.capture))
    }
}
