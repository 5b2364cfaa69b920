//! Kernel framebuffer ABI
//!
//! Mirrors `<linux/fb.h>`. All fields are native-endian; `c_ulong` fields are
//! pointer-sized so the layout matches the running kernel on both 32 and 64-bit
//! targets.

use nix::{ioctl_read_bad, ioctl_readwrite_bad};

pub const FBIOGET_VSCREENINFO: u32 = 0x4600;
pub const FBIOGET_FSCREENINFO: u32 = 0x4602;
pub const FBIOGET_CON2FBMAP: u32 = 0x460F;

/// Channel position inside a packed pixel
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FbBitField {
    /// Beginning of the bitfield, counted from the least significant bit
    pub offset: u32,
    /// Length of the bitfield
    pub length: u32,
    /// != 0: most significant bit is right
    pub msb_right: u32,
}

impl FbBitField {
    pub const fn new(offset: u32, length: u32) -> Self {
        Self {
            offset,
            length,
            msb_right: 0,
        }
    }
}

/// `struct fb_var_screeninfo`
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct FbVarScreenInfo {
    pub xres: u32,
    pub yres: u32,
    pub xres_virtual: u32,
    pub yres_virtual: u32,
    pub xoffset: u32,
    pub yoffset: u32,
    pub bits_per_pixel: u32,
    /// 0 = color, 1 = grayscale, >1 = FOURCC
    pub grayscale: u32,
    pub red: FbBitField,
    pub green: FbBitField,
    pub blue: FbBitField,
    pub transp: FbBitField,
    pub nonstd: u32,
    pub activate: u32,
    /// Height of picture in mm
    pub height: u32,
    /// Width of picture in mm
    pub width: u32,
    pub accel_flags: u32,
    // Timing: not used, but part of the struct size
    pub pixclock: u32,
    pub left_margin: u32,
    pub right_margin: u32,
    pub upper_margin: u32,
    pub lower_margin: u32,
    pub hsync_len: u32,
    pub vsync_len: u32,
    pub sync: u32,
    pub vmode: u32,
    pub rotate: u32,
    pub colorspace: u32,
    pub reserved: [u32; 4],
}

/// `struct fb_fix_screeninfo`
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct FbFixScreenInfo {
    /// Identification string, e.g. "st7586"
    pub id: [u8; 16],
    pub smem_start: libc::c_ulong,
    pub smem_len: u32,
    pub fb_type: u32,
    pub type_aux: u32,
    pub visual: u32,
    pub xpanstep: u16,
    pub ypanstep: u16,
    pub ywrapstep: u16,
    pub line_length: u32,
    pub mmio_start: libc::c_ulong,
    pub mmio_len: u32,
    pub accel: u32,
    pub capabilities: u16,
    pub reserved: [u16; 2],
}

impl FbFixScreenInfo {
    /// The id string up to its first NUL
    pub fn id_str(&self) -> String {
        let end = self.id.iter().position(|&b| b == 0).unwrap_or(self.id.len());
        String::from_utf8_lossy(&self.id[..end]).into_owned()
    }
}

/// `struct fb_con2fbmap`
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct FbCon2FbMap {
    pub console: u32,
    pub framebuffer: u32,
}

ioctl_read_bad!(fbioget_vscreeninfo, FBIOGET_VSCREENINFO, FbVarScreenInfo);
ioctl_read_bad!(fbioget_fscreeninfo, FBIOGET_FSCREENINFO, FbFixScreenInfo);
ioctl_readwrite_bad!(fbioget_con2fbmap, FBIOGET_CON2FBMAP, FbCon2FbMap);

/// `FB_TYPE_*`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FbType {
    PackedPixels,
    Planes,
    InterleavedPlanes,
    Text,
    VgaPlanes,
    FourCc,
    Unknown(u32),
}

impl From<u32> for FbType {
    fn from(value: u32) -> Self {
        match value {
            0 => Self::PackedPixels,
            1 => Self::Planes,
            2 => Self::InterleavedPlanes,
            3 => Self::Text,
            4 => Self::VgaPlanes,
            5 => Self::FourCc,
            other => Self::Unknown(other),
        }
    }
}

/// `FB_VISUAL_*`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visual {
    /// Monochrome, 1 = black, 0 = white
    Mono01,
    /// Monochrome, 1 = white, 0 = black
    Mono10,
    TrueColor,
    PseudoColor,
    DirectColor,
    StaticPseudoColor,
    FourCc,
    Unknown(u32),
}

impl From<u32> for Visual {
    fn from(value: u32) -> Self {
        match value {
            0 => Self::Mono01,
            1 => Self::Mono10,
            2 => Self::TrueColor,
            3 => Self::PseudoColor,
            4 => Self::DirectColor,
            5 => Self::StaticPseudoColor,
            6 => Self::FourCc,
            other => Self::Unknown(other),
        }
    }
}

impl Visual {
    /// Raw `FB_VISUAL_*` value
    pub fn raw(self) -> u32 {
        match self {
            Self::Mono01 => 0,
            Self::Mono10 => 1,
            Self::TrueColor => 2,
            Self::PseudoColor => 3,
            Self::DirectColor => 4,
            Self::StaticPseudoColor => 5,
            Self::FourCc => 6,
            Self::Unknown(other) => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_struct_sizes_match_kernel_abi() {
        // fb_var_screeninfo is 160 bytes on every architecture
        assert_eq!(std::mem::size_of::<FbVarScreenInfo>(), 160);
        assert_eq!(std::mem::size_of::<FbCon2FbMap>(), 8);
        #[cfg(target_pointer_width = "64")]
        assert_eq!(std::mem::size_of::<FbFixScreenInfo>(), 80);
        #[cfg(target_pointer_width = "32")]
        assert_eq!(std::mem::size_of::<FbFixScreenInfo>(), 68);
    }

    #[test]
    fn test_visual_round_trips_unknown_values() {
        assert_eq!(Visual::from(2), Visual::TrueColor);
        assert_eq!(Visual::from(42), Visual::Unknown(42));
        assert_eq!(Visual::from(42).raw(), 42);
        assert_eq!(FbType::from(0), FbType::PackedPixels);
    }

    #[test]
    fn test_id_str_stops_at_nul() {
        let mut fix = FbFixScreenInfo::default();
        fix.id[..6].copy_from_slice(b"st7586");
        assert_eq!(fix.id_str(), "st7586");
    }
}
