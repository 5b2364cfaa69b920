//! Kernel virtual terminal control

pub mod mock;
pub mod sys;
pub mod vt;

pub use mock::MockConsole;
pub use sys::{KdMode, VtStat};
pub use vt::{ConsoleDevice, ConsoleTty, GraphicsMode, VirtualTerminal};
