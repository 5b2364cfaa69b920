//! Linux framebuffer access
//!
//! Architecture:
//! - `sys.rs` - `<linux/fb.h>` structures and ioctl wrappers
//! - `device.rs` - platform adapter trait and the real `/dev/fbN` node
//! - `fb.rs` - the owned framebuffer handle and its derived properties
//! - `convert.rs` - bitmap to native pixel layout conversion
//! - `mock.rs` - in-memory device for tests

pub mod convert;
pub mod device;
pub mod fb;
pub mod mock;
pub mod sys;

pub use convert::{encode, rgb565, PixelFormat};
pub use device::{resolve_console_framebuffer, FbNode, FramebufferDevice};
pub use fb::{Framebuffer, PhysicalSize, Resolution};
pub use mock::MockFramebuffer;
pub use sys::{FbBitField, FbType, Visual};
