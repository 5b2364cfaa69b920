//! Framebuffer Device Wrapper
//!
//! Owns an open framebuffer and the two screen info structures queried when it
//! was opened. Geometry and pixel format are fixed for the lifetime of the
//! handle; writes go through [`Framebuffer::write_raw`] and must already be in the
//! device's native encoding (see [`super::convert`]).

use std::path::Path;

use tracing::{info, warn};

use super::convert::PixelFormat;
use super::device::{resolve_console_framebuffer, FbNode, FramebufferDevice, CONTROL_FRAMEBUFFER};
use super::sys::{FbBitField, FbFixScreenInfo, FbType, FbVarScreenInfo, Visual};
use crate::error::{BoothError, Result};

/// Visible resolution in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub x: u32,
    pub y: u32,
}

/// Physical size of the picture in millimetres
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhysicalSize {
    pub width: u32,
    pub height: u32,
}

/// An open framebuffer
pub struct Framebuffer<D: FramebufferDevice = FbNode> {
    device: D,
    fix: FbFixScreenInfo,
    var: FbVarScreenInfo,
}

impl Framebuffer<FbNode> {
    /// Open the framebuffer device at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_device(FbNode::open(path)?)
    }

    /// Open the framebuffer the given virtual terminal is routed to
    pub fn for_console(console: u32) -> Result<Self> {
        let control = FbNode::open(CONTROL_FRAMEBUFFER)?;
        let path = resolve_console_framebuffer(&control, console)?;
        drop(control);
        Self::open(path)
    }
}

impl<D: FramebufferDevice> Framebuffer<D> {
    /// Query both screen info structures from `device` and take ownership of it
    pub fn from_device(device: D) -> Result<Self> {
        let fix = device.fixed_info()?;
        let var = device.variable_info()?;

        if var.xres == 0 || var.yres == 0 {
            return Err(BoothError::InvalidScreenInfo(format!(
                "resolution {}x{}",
                var.xres, var.yres
            )));
        }
        if var.bits_per_pixel == 0 {
            return Err(BoothError::InvalidScreenInfo("bits_per_pixel is 0".to_string()));
        }
        if fix.line_length == 0 {
            return Err(BoothError::InvalidScreenInfo("line_length is 0".to_string()));
        }

        info!(
            id = %fix.id_str(),
            width = var.xres,
            height = var.yres,
            bpp = var.bits_per_pixel,
            stride = fix.line_length,
            visual = ?Visual::from(fix.visual),
            grayscale = var.grayscale,
            "Framebuffer opened"
        );

        Ok(Self { device, fix, var })
    }

    /// Blank the whole of video memory
    pub fn clear(&mut self) -> Result<()> {
        let zeros = vec![0u8; self.fix.smem_len as usize];
        self.device.write_at(0, &zeros)
    }

    /// Write already-encoded bytes starting at offset zero.
    ///
    /// Anything beyond the end of video memory is dropped.
    pub fn write_raw(&mut self, bytes: &[u8]) -> Result<()> {
        let len = bytes.len().min(self.fix.smem_len as usize);
        if len < bytes.len() {
            warn!(
                len = bytes.len(),
                smem_len = self.fix.smem_len,
                "Frame larger than video memory, truncating"
            );
        }
        self.device.write_at(0, &bytes[..len])
    }

    pub fn resolution(&self) -> Resolution {
        Resolution {
            x: self.var.xres,
            y: self.var.yres,
        }
    }

    pub fn virtual_resolution(&self) -> Resolution {
        Resolution {
            x: self.var.xres_virtual,
            y: self.var.yres_virtual,
        }
    }

    pub fn bits_per_pixel(&self) -> u32 {
        self.var.bits_per_pixel
    }

    /// Bytes per scanline, including any padding
    pub fn line_length(&self) -> u32 {
        self.fix.line_length
    }

    /// Raw grayscale field: 0 = color, 1 = grayscale, >1 = FOURCC
    pub fn grayscale(&self) -> u32 {
        self.var.grayscale
    }

    pub fn physical_size(&self) -> PhysicalSize {
        PhysicalSize {
            width: self.var.width,
            height: self.var.height,
        }
    }

    pub fn fb_type(&self) -> FbType {
        FbType::from(self.fix.fb_type)
    }

    pub fn visual(&self) -> Visual {
        Visual::from(self.fix.visual)
    }

    pub fn id(&self) -> String {
        self.fix.id_str()
    }

    /// Length of video memory in bytes
    pub fn buffer_len(&self) -> u32 {
        self.fix.smem_len
    }

    /// Red, green, blue and transparency bitfields
    pub fn channels(&self) -> [FbBitField; 4] {
        [self.var.red, self.var.green, self.var.blue, self.var.transp]
    }

    /// Whether captures for this screen should be taken in greyscale
    pub fn wants_greyscale(&self) -> bool {
        self.var.grayscale != 0 || self.var.bits_per_pixel == 1
    }

    /// Format descriptor for [`super::convert::encode`]
    pub fn pixel_format(&self) -> PixelFormat {
        PixelFormat {
            width: self.var.xres,
            height: self.var.yres,
            bits_per_pixel: self.var.bits_per_pixel,
            line_length: self.fix.line_length,
            visual: self.visual(),
            red: self.var.red,
            green: self.var.green,
            blue: self.var.blue,
            transp: self.var.transp,
        }
    }

    /// The underlying device adapter
    pub fn device(&self) -> &D {
        &self.device
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framebuffer::mock::MockFramebuffer;

    #[test]
    fn test_open_populates_geometry_from_queries() {
        let mock = MockFramebuffer::rgb565(320, 240);
        let fb = Framebuffer::from_device(mock).unwrap();

        assert_eq!(fb.resolution(), Resolution { x: 320, y: 240 });
        assert_eq!(fb.bits_per_pixel(), 16);
        assert_eq!(fb.line_length(), 640);
        assert_eq!(fb.visual(), Visual::TrueColor);
        assert_eq!(fb.grayscale(), 0);
        assert!(!fb.wants_greyscale());
    }

    #[test]
    fn test_open_rejects_zeroed_geometry() {
        let mock = MockFramebuffer::rgb565(320, 240);
        mock.edit_variable(|var| var.bits_per_pixel = 0);
        assert!(matches!(
            Framebuffer::from_device(mock),
            Err(BoothError::InvalidScreenInfo(_))
        ));

        let mock = MockFramebuffer::rgb565(320, 240);
        mock.edit_fixed(|fix| fix.line_length = 0);
        assert!(matches!(
            Framebuffer::from_device(mock),
            Err(BoothError::InvalidScreenInfo(_))
        ));

        let mock = MockFramebuffer::rgb565(320, 240);
        mock.edit_variable(|var| var.yres = 0);
        assert!(Framebuffer::from_device(mock).is_err());
    }

    #[test]
    fn test_failed_query_surfaces_error() {
        let mock = MockFramebuffer::rgb565(320, 240);
        mock.fail_queries();
        assert!(matches!(
            Framebuffer::from_device(mock),
            Err(BoothError::Ioctl { .. })
        ));
    }

    #[test]
    fn test_clear_zeroes_whole_buffer() {
        let mock = MockFramebuffer::monochrome(178, 128);
        let handle = mock.clone();
        let mut fb = Framebuffer::from_device(mock).unwrap();

        fb.write_raw(&[0xAA; 16]).unwrap();
        fb.clear().unwrap();

        let memory = handle.memory();
        assert_eq!(memory.len(), fb.buffer_len() as usize);
        assert!(memory.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_monochrome_wants_greyscale_capture() {
        let fb = Framebuffer::from_device(MockFramebuffer::monochrome(178, 128)).unwrap();
        assert_eq!(fb.bits_per_pixel(), 1);
        assert_eq!(fb.line_length(), 24);
        assert!(fb.wants_greyscale());
    }
}
