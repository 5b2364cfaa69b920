//! Framebuffer platform adapter
//!
//! The handful of kernel calls the booth needs from `/dev/fbN`, behind a trait so
//! the converter and the booth state machine can run against [`super::mock`].

use std::fs::{File, OpenOptions};
use std::os::unix::fs::FileExt;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::sys::{self, FbCon2FbMap, FbFixScreenInfo, FbVarScreenInfo};
use crate::error::{BoothError, Result};

/// Node used to issue console-to-framebuffer mapping queries
pub const CONTROL_FRAMEBUFFER: &str = "/dev/fb0";

/// Query and write contract of a framebuffer device.
pub trait FramebufferDevice {
    /// FBIOGET_FSCREENINFO
    fn fixed_info(&self) -> Result<FbFixScreenInfo>;

    /// FBIOGET_VSCREENINFO
    fn variable_info(&self) -> Result<FbVarScreenInfo>;

    /// FBIOGET_CON2FBMAP: framebuffer index routed to `console`
    fn console_to_framebuffer(&self, console: u32) -> Result<u32>;

    /// Write `bytes` at byte `offset` of video memory
    fn write_at(&mut self, offset: u64, bytes: &[u8]) -> Result<()>;
}

/// A real `/dev/fbN` node
#[derive(Debug)]
pub struct FbNode {
    file: File,
    path: PathBuf,
}

impl FbNode {
    /// Open a framebuffer node for read/write
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        debug!(path = %path.display(), "Opened framebuffer node");
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FramebufferDevice for FbNode {
    fn fixed_info(&self) -> Result<FbFixScreenInfo> {
        let mut fix = FbFixScreenInfo::default();
        // SAFETY: fd is open for the lifetime of self and `fix` matches the kernel layout
        unsafe { sys::fbioget_fscreeninfo(self.file.as_raw_fd(), &mut fix) }
            .map_err(BoothError::ioctl("FBIOGET_FSCREENINFO"))?;
        Ok(fix)
    }

    fn variable_info(&self) -> Result<FbVarScreenInfo> {
        let mut var = FbVarScreenInfo::default();
        // SAFETY: as above
        unsafe { sys::fbioget_vscreeninfo(self.file.as_raw_fd(), &mut var) }
            .map_err(BoothError::ioctl("FBIOGET_VSCREENINFO"))?;
        Ok(var)
    }

    fn console_to_framebuffer(&self, console: u32) -> Result<u32> {
        let mut map = FbCon2FbMap {
            console,
            framebuffer: 0,
        };
        // SAFETY: as above
        unsafe { sys::fbioget_con2fbmap(self.file.as_raw_fd(), &mut map) }
            .map_err(BoothError::ioctl("FBIOGET_CON2FBMAP"))?;
        Ok(map.framebuffer)
    }

    fn write_at(&mut self, offset: u64, bytes: &[u8]) -> Result<()> {
        self.file.write_all_at(bytes, offset)?;
        Ok(())
    }
}

/// Device node path of the framebuffer a console is routed to.
///
/// Multi-head systems may map different consoles to different framebuffers, so
/// the active VT has to be resolved rather than assuming `/dev/fb0`.
pub fn resolve_console_framebuffer<D: FramebufferDevice>(
    control: &D,
    console: u32,
) -> Result<PathBuf> {
    let index = control.console_to_framebuffer(console)?;
    let path = PathBuf::from(format!("/dev/fb{}", index));
    debug!(console = console, path = %path.display(), "Resolved console framebuffer");
    Ok(path)
}
