//! In-memory framebuffer for testing and development.
//!
//! Answers the screen info queries from configurable structures and records
//! every write into a byte vector sized like video memory. Clones share state,
//! so a test can keep a handle after passing the device into a [`super::Framebuffer`].

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::debug;

use super::device::FramebufferDevice;
use super::sys::{FbBitField, FbFixScreenInfo, FbVarScreenInfo, Visual};
use crate::error::{BoothError, Result};

#[derive(Debug)]
struct MockFbState {
    fix: FbFixScreenInfo,
    var: FbVarScreenInfo,
    memory: Vec<u8>,
    writes: Vec<(u64, usize)>,
    console_map: HashMap<u32, u32>,
    fail_queries: bool,
}

/// Mock framebuffer device
#[derive(Debug, Clone)]
pub struct MockFramebuffer {
    state: Arc<RwLock<MockFbState>>,
}

impl MockFramebuffer {
    /// Create a mock answering with the given screen info
    pub fn new(fix: FbFixScreenInfo, var: FbVarScreenInfo) -> Self {
        Self {
            state: Arc::new(RwLock::new(MockFbState {
                memory: vec![0u8; fix.smem_len as usize],
                fix,
                var,
                writes: Vec::new(),
                console_map: HashMap::new(),
                fail_queries: false,
            })),
        }
    }

    /// Build screen info for a packed-pixel display
    pub fn with_format(
        width: u32,
        height: u32,
        bits_per_pixel: u32,
        line_length: u32,
        visual: Visual,
        channels: [FbBitField; 4],
    ) -> Self {
        let mut fix = FbFixScreenInfo::default();
        fix.id[..4].copy_from_slice(b"mock");
        fix.smem_len = line_length * height;
        fix.visual = visual.raw();
        fix.line_length = line_length;

        let var = FbVarScreenInfo {
            xres: width,
            yres: height,
            xres_virtual: width,
            yres_virtual: height,
            bits_per_pixel,
            red: channels[0],
            green: channels[1],
            blue: channels[2],
            transp: channels[3],
            ..Default::default()
        };

        Self::new(fix, var)
    }

    /// 1 bpp monochrome LCD with byte-aligned, 32-bit padded scanlines
    pub fn monochrome(width: u32, height: u32) -> Self {
        let line_length = ((width + 31) / 32) * 4;
        let mono = FbBitField::new(0, 1);
        Self::with_format(
            width,
            height,
            1,
            line_length,
            Visual::Mono01,
            [mono, mono, mono, FbBitField::default()],
        )
    }

    /// 16 bpp true-color RGB565 panel
    pub fn rgb565(width: u32, height: u32) -> Self {
        Self::with_format(
            width,
            height,
            16,
            width * 2,
            Visual::TrueColor,
            [
                FbBitField::new(11, 5),
                FbBitField::new(5, 6),
                FbBitField::new(0, 5),
                FbBitField::default(),
            ],
        )
    }

    /// 32 bpp true-color XRGB8888 display
    pub fn xrgb8888(width: u32, height: u32) -> Self {
        Self::with_format(
            width,
            height,
            32,
            width * 4,
            Visual::TrueColor,
            [
                FbBitField::new(16, 8),
                FbBitField::new(8, 8),
                FbBitField::new(0, 8),
                FbBitField::new(24, 8),
            ],
        )
    }

    /// Route `console` to framebuffer index `framebuffer`
    pub fn map_console(&self, console: u32, framebuffer: u32) {
        self.write_state().console_map.insert(console, framebuffer);
    }

    /// Make every subsequent device-control query fail
    pub fn fail_queries(&self) {
        self.write_state().fail_queries = true;
    }

    pub fn edit_fixed(&self, f: impl FnOnce(&mut FbFixScreenInfo)) {
        let mut state = self.write_state();
        f(&mut state.fix);
        let len = state.fix.smem_len as usize;
        state.memory.resize(len, 0);
    }

    pub fn edit_variable(&self, f: impl FnOnce(&mut FbVarScreenInfo)) {
        f(&mut self.write_state().var);
    }

    /// Snapshot of video memory
    pub fn memory(&self) -> Vec<u8> {
        self.read_state().memory.clone()
    }

    /// Every write as (offset, length), oldest first
    pub fn writes(&self) -> Vec<(u64, usize)> {
        self.read_state().writes.clone()
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, MockFbState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_state(&self) -> std::sync::RwLockWriteGuard<'_, MockFbState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    fn check_queries(&self, request: &'static str) -> Result<()> {
        if self.read_state().fail_queries {
            return Err(BoothError::Ioctl {
                request,
                source: nix::Error::ENOTTY,
            });
        }
        Ok(())
    }
}

impl FramebufferDevice for MockFramebuffer {
    fn fixed_info(&self) -> Result<FbFixScreenInfo> {
        self.check_queries("FBIOGET_FSCREENINFO")?;
        Ok(self.read_state().fix)
    }

    fn variable_info(&self) -> Result<FbVarScreenInfo> {
        self.check_queries("FBIOGET_VSCREENINFO")?;
        Ok(self.read_state().var)
    }

    fn console_to_framebuffer(&self, console: u32) -> Result<u32> {
        self.check_queries("FBIOGET_CON2FBMAP")?;
        self.read_state()
            .console_map
            .get(&console)
            .copied()
            .ok_or(BoothError::Ioctl {
                request: "FBIOGET_CON2FBMAP",
                source: nix::Error::EINVAL,
            })
    }

    fn write_at(&mut self, offset: u64, bytes: &[u8]) -> Result<()> {
        let mut state = self.write_state();
        let start = offset as usize;
        let end = start + bytes.len();
        if end > state.memory.len() {
            return Err(BoothError::Io(std::io::Error::from_raw_os_error(libc::ENOSPC)));
        }
        state.memory[start..end].copy_from_slice(bytes);
        state.writes.push((offset, bytes.len()));
        debug!(offset = offset, len = bytes.len(), "Mock framebuffer write");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framebuffer::device::resolve_console_framebuffer;
    use std::path::PathBuf;

    #[test]
    fn test_console_mapping_resolves_device_path() {
        let control = MockFramebuffer::rgb565(320, 240);
        control.map_console(2, 1);

        let path = resolve_console_framebuffer(&control, 2).unwrap();
        assert_eq!(path, PathBuf::from("/dev/fb1"));

        assert!(resolve_console_framebuffer(&control, 7).is_err());
    }

    #[test]
    fn test_write_past_end_is_rejected() {
        let mut mock = MockFramebuffer::rgb565(4, 4);
        assert!(mock.write_at(0, &[0u8; 32]).is_ok());
        assert!(mock.write_at(1, &[0u8; 32]).is_err());
        assert_eq!(mock.writes(), vec![(0, 32)]);
    }
}
