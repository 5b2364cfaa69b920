//! Virtual Terminal Control
//!
//! Opens the controlling terminal and switches it between text and graphics
//! mode. In graphics mode the kernel stops drawing the text console, so the
//! framebuffer can be owned by this process without the cursor or printk output
//! scribbling over it.
//!
//! Graphics mode is only ever entered through [`VirtualTerminal::enter_graphics`],
//! whose guard puts the console back into text mode when dropped. A console left
//! in graphics mode with nobody drawing to it is blank and unusable.

use std::fs::{File, OpenOptions};
use std::os::unix::io::AsRawFd;

use nix::errno::Errno;
use tracing::{debug, error, info};

use super::sys::{self, KdMode, VtStat};
use crate::error::{BoothError, Result};

/// Controlling terminal of the process
pub const CONTROLLING_TTY: &str = "/dev/tty";

/// Device-control contract of a kernel console.
///
/// Every call is a round trip to the device; implementations must not cache mode.
pub trait ConsoleDevice {
    /// KDGETMODE
    fn kd_mode(&self) -> Result<KdMode>;

    /// KDSETMODE
    fn set_kd_mode(&self, mode: KdMode) -> Result<()>;

    /// VT_GETSTATE
    fn vt_state(&self) -> Result<VtStat>;

    /// VT_OPENQRY: first free vt, or -1 mapped to an error
    fn open_query(&self) -> Result<u32>;

    /// VT_ACTIVATE
    fn activate(&self, vt: u32) -> Result<()>;

    /// VT_WAITACTIVE
    fn wait_active(&self, vt: u32) -> Result<()>;
}

/// The real controlling terminal
#[derive(Debug)]
pub struct ConsoleTty {
    file: File,
}

impl ConsoleTty {
    /// Open `/dev/tty` and make sure it is a kernel console.
    ///
    /// Sessions without a controlling terminal fail with ENXIO, pseudo terminals
    /// (SSH, terminal emulators) reject KDGETMODE with ENOTTY. Both are reported
    /// as [`BoothError::NotATerminal`].
    pub fn open() -> Result<Self> {
        let file = match OpenOptions::new().read(true).write(true).open(CONTROLLING_TTY) {
            Ok(file) => file,
            Err(e) if e.raw_os_error() == Some(libc::ENXIO) => {
                return Err(BoothError::NotATerminal)
            }
            Err(e) => return Err(e.into()),
        };

        let tty = Self { file };
        match tty.kd_mode() {
            Ok(mode) => {
                debug!(mode = ?mode, "Opened controlling terminal");
                Ok(tty)
            }
            Err(BoothError::Ioctl {
                source: Errno::ENOTTY | Errno::EINVAL,
                ..
            }) => Err(BoothError::NotATerminal),
            Err(e) => Err(e),
        }
    }

    fn fd(&self) -> libc::c_int {
        self.file.as_raw_fd()
    }
}

fn vt_arg(vt: u32) -> Result<libc::c_int> {
    libc::c_int::try_from(vt).map_err(|_| BoothError::Ioctl {
        request: "VT_ACTIVATE",
        source: Errno::EINVAL,
    })
}

impl ConsoleDevice for ConsoleTty {
    fn kd_mode(&self) -> Result<KdMode> {
        let mut mode: libc::c_int = 0;
        // SAFETY: fd is open for the lifetime of self, KDGETMODE writes one int
        unsafe { sys::kd_getmode(self.fd(), &mut mode) }.map_err(BoothError::ioctl("KDGETMODE"))?;
        Ok(KdMode::from(mode))
    }

    fn set_kd_mode(&self, mode: KdMode) -> Result<()> {
        // SAFETY: KDSETMODE takes its argument by value
        unsafe { sys::kd_setmode(self.fd(), mode.raw()) }.map_err(BoothError::ioctl("KDSETMODE"))?;
        Ok(())
    }

    fn vt_state(&self) -> Result<VtStat> {
        let mut state = VtStat::default();
        // SAFETY: `state` matches struct vt_stat
        unsafe { sys::vt_getstate(self.fd(), &mut state) }
            .map_err(BoothError::ioctl("VT_GETSTATE"))?;
        Ok(state)
    }

    fn open_query(&self) -> Result<u32> {
        let mut vt: libc::c_int = -1;
        // SAFETY: VT_OPENQRY writes one int
        unsafe { sys::vt_openqry(self.fd(), &mut vt) }.map_err(BoothError::ioctl("VT_OPENQRY"))?;
        u32::try_from(vt).map_err(|_| BoothError::Ioctl {
            request: "VT_OPENQRY",
            source: Errno::EBUSY,
        })
    }

    fn activate(&self, vt: u32) -> Result<()> {
        // SAFETY: argument by value
        unsafe { sys::vt_activate(self.fd(), vt_arg(vt)?) }
            .map_err(BoothError::ioctl("VT_ACTIVATE"))?;
        Ok(())
    }

    fn wait_active(&self, vt: u32) -> Result<()> {
        // SAFETY: argument by value
        unsafe { sys::vt_waitactive(self.fd(), vt_arg(vt)?) }
            .map_err(BoothError::ioctl("VT_WAITACTIVE"))?;
        Ok(())
    }
}

/// Handle on the controlling virtual terminal
pub struct VirtualTerminal<C: ConsoleDevice = ConsoleTty> {
    console: C,
}

impl VirtualTerminal<ConsoleTty> {
    /// Open the controlling terminal; fails with [`BoothError::NotATerminal`]
    /// when run remotely
    pub fn open() -> Result<Self> {
        Ok(Self::new(ConsoleTty::open()?))
    }
}

impl<C: ConsoleDevice> VirtualTerminal<C> {
    pub fn new(console: C) -> Self {
        Self { console }
    }

    /// Number of the currently active vt
    pub fn active(&self) -> Result<u32> {
        Ok(self.console.vt_state()?.v_active as u32)
    }

    /// First vt nobody has opened yet
    pub fn next_available(&self) -> Result<u32> {
        self.console.open_query()
    }

    /// Switch to vt `num` and wait until the switch has happened
    pub fn activate(&self, num: u32) -> Result<()> {
        self.console.activate(num)?;
        self.console.wait_active(num)?;
        info!(vt = num, "Activated virtual terminal");
        Ok(())
    }

    /// Current display mode, straight from the kernel
    pub fn mode(&self) -> Result<KdMode> {
        self.console.kd_mode()
    }

    pub fn set_graphics_mode(&self) -> Result<()> {
        self.console.set_kd_mode(KdMode::Graphics)
    }

    pub fn set_text_mode(&self) -> Result<()> {
        self.console.set_kd_mode(KdMode::Text)
    }

    /// Enter graphics mode until the returned guard is dropped
    pub fn enter_graphics(&self) -> Result<GraphicsMode<'_, C>> {
        self.set_graphics_mode()?;
        info!("Console switched to graphics mode");
        Ok(GraphicsMode { vt: self })
    }

    pub fn console(&self) -> &C {
        &self.console
    }
}

/// Restores text mode on drop, including during unwinding
#[must_use = "graphics mode ends as soon as the guard is dropped"]
pub struct GraphicsMode<'a, C: ConsoleDevice> {
    vt: &'a VirtualTerminal<C>,
}

impl<C: ConsoleDevice> GraphicsMode<'_, C> {
    pub fn terminal(&self) -> &VirtualTerminal<C> {
        self.vt
    }
}

impl<C: ConsoleDevice> Drop for GraphicsMode<'_, C> {
    fn drop(&mut self) {
        match self.vt.set_text_mode() {
            Ok(()) => info!("Console restored to text mode"),
            Err(e) => error!(error = %e, "Failed to restore text mode"),
        }
    }
}
