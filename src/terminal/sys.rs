//! Kernel console ABI (`<linux/vt.h>`, `<linux/kd.h>`)

use nix::{ioctl_read_bad, ioctl_write_int_bad};

pub const VT_OPENQRY: u32 = 0x5600;
pub const VT_GETSTATE: u32 = 0x5603;
pub const VT_ACTIVATE: u32 = 0x5606;
pub const VT_WAITACTIVE: u32 = 0x5607;
pub const KDSETMODE: u32 = 0x4B3A;
pub const KDGETMODE: u32 = 0x4B3B;

/// `struct vt_stat`
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct VtStat {
    /// Active vt
    pub v_active: u16,
    /// Signal to send
    pub v_signal: u16,
    /// Bitmask of allocated vts
    pub v_state: u16,
}

ioctl_read_bad!(vt_openqry, VT_OPENQRY, libc::c_int);
ioctl_read_bad!(vt_getstate, VT_GETSTATE, VtStat);
ioctl_write_int_bad!(vt_activate, VT_ACTIVATE);
ioctl_write_int_bad!(vt_waitactive, VT_WAITACTIVE);
ioctl_write_int_bad!(kd_setmode, KDSETMODE);
ioctl_read_bad!(kd_getmode, KDGETMODE, libc::c_int);

/// Console display mode (`KD_*`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KdMode {
    Text,
    Graphics,
    /// Obsolete
    Text0,
    /// Obsolete
    Text1,
    Unknown(i32),
}

impl From<i32> for KdMode {
    fn from(value: i32) -> Self {
        match value {
            0x00 => Self::Text,
            0x01 => Self::Graphics,
            0x02 => Self::Text0,
            0x03 => Self::Text1,
            other => Self::Unknown(other),
        }
    }
}

impl KdMode {
    pub fn raw(self) -> i32 {
        match self {
            Self::Text => 0x00,
            Self::Graphics => 0x01,
            Self::Text0 => 0x02,
            Self::Text1 => 0x03,
            Self::Unknown(other) => other,
        }
    }
}
