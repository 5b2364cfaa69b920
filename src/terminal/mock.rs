//! Mock console for testing.

use std::sync::{Arc, RwLock};

use tracing::debug;

use super::sys::{KdMode, VtStat};
use super::vt::ConsoleDevice;
use crate::error::Result;

#[derive(Debug)]
struct MockConsoleState {
    mode: KdMode,
    active: u16,
    allocated: u16,
    history: Vec<KdMode>,
}

/// Simulated kernel console. Clones share state.
#[derive(Debug, Clone)]
pub struct MockConsole {
    state: Arc<RwLock<MockConsoleState>>,
}

impl MockConsole {
    /// A console in text mode with `active` as the foreground vt
    pub fn new(active: u16) -> Self {
        Self {
            state: Arc::new(RwLock::new(MockConsoleState {
                mode: KdMode::Text,
                active,
                allocated: 1u16.checked_shl(active as u32).unwrap_or(0),
                history: Vec::new(),
            })),
        }
    }

    pub fn current_mode(&self) -> KdMode {
        self.read_state().mode
    }

    /// Every KDSETMODE issued, oldest first
    pub fn mode_history(&self) -> Vec<KdMode> {
        self.read_state().history.clone()
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, MockConsoleState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_state(&self) -> std::sync::RwLockWriteGuard<'_, MockConsoleState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl ConsoleDevice for MockConsole {
    fn kd_mode(&self) -> Result<KdMode> {
        Ok(self.read_state().mode)
    }

    fn set_kd_mode(&self, mode: KdMode) -> Result<()> {
        let mut state = self.write_state();
        debug!(mode = ?mode, "Mock KDSETMODE");
        state.mode = mode;
        state.history.push(mode);
        Ok(())
    }

    fn vt_state(&self) -> Result<VtStat> {
        let state = self.read_state();
        Ok(VtStat {
            v_active: state.active,
            v_signal: 0,
            v_state: state.allocated,
        })
    }

    fn open_query(&self) -> Result<u32> {
        let state = self.read_state();
        let free = (1..16).find(|vt| state.allocated & (1 << vt) == 0).unwrap_or(16);
        Ok(free)
    }

    fn activate(&self, vt: u32) -> Result<()> {
        let mut state = self.write_state();
        state.active = vt as u16;
        state.allocated |= 1u16.checked_shl(vt).unwrap_or(0);
        Ok(())
    }

    fn wait_active(&self, _vt: u32) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_high_vt_numbers_do_not_overflow() {
        let console = MockConsole::new(20);
        let state = console.vt_state().unwrap();
        assert_eq!(state.v_active, 20);
        assert_eq!(state.v_state, 0);
        assert_eq!(console.open_query().unwrap(), 1);
    }
}
