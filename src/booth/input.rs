//! Button Input Handler
//!
//! Reads key events from every evdev device (`/dev/input/event*`) that reports
//! EV_KEY: the brick's buttons, a USB keyboard, a remote shutter. All devices are
//! multiplexed with `poll(2)` on a single thread, together with a signalfd
//! that turns SIGINT and SIGTERM into a quit.
//!
//! Only key-down events count. Presses that arrive while the booth is busy
//! (countdown, capture, display) are discarded through
//! [`InputSource::discard_pending`] rather than replayed afterwards.

use std::collections::VecDeque;
use std::io;
use std::os::unix::io::{AsRawFd, BorrowedFd, RawFd};

use evdev::{Device, EventType, InputEventKind, Key};
use nix::errno::Errno;
use nix::fcntl::{fcntl, FcntlArg, OFlag};
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use nix::sys::signal::{SigSet, Signal};
use nix::sys::signalfd::{SfdFlags, SignalFd};
use tracing::{debug, info, warn};

use crate::config::KeyConfig;
use crate::error::{BoothError, Result};

/// Inputs the booth reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoothInput {
    /// Start a countdown and capture
    Trigger,
    /// Leave the booth
    Quit,
}

/// Maps raw key codes to booth inputs
#[derive(Debug, Clone)]
pub struct KeyMap {
    trigger: Vec<u16>,
    quit: Vec<u16>,
}

impl KeyMap {
    pub fn new(config: &KeyConfig) -> Self {
        Self {
            trigger: config.trigger.clone(),
            quit: config.quit.clone(),
        }
    }

    pub fn classify(&self, key: Key) -> Option<BoothInput> {
        let code = key.code();
        if self.quit.contains(&code) {
            Some(BoothInput::Quit)
        } else if self.trigger.contains(&code) {
            Some(BoothInput::Trigger)
        } else {
            None
        }
    }
}

impl Default for KeyMap {
    fn default() -> Self {
        Self::new(&KeyConfig::default())
    }
}

/// Source of booth inputs.
pub trait InputSource {
    /// Block until the next recognised press. `None` means input has ended.
    fn next_input(&mut self) -> Result<Option<BoothInput>>;

    /// Drop everything queued so far; returns how many presses were dropped
    fn discard_pending(&mut self) -> Result<usize>;
}

/// SIGINT and SIGTERM, delivered through a signalfd.
///
/// Creating one blocks both signals on the calling thread, so they no longer
/// kill the process outright; they stay pending until [`ShutdownSignals::take`]
/// reads them. The console guard therefore gets to run on Ctrl-C and
/// `systemctl stop`.
pub struct ShutdownSignals {
    fd: SignalFd,
}

impl ShutdownSignals {
    pub fn open() -> Result<Self> {
        let mut mask = SigSet::empty();
        mask.add(Signal::SIGINT);
        mask.add(Signal::SIGTERM);
        mask.thread_block().map_err(BoothError::ioctl("sigprocmask"))?;

        let fd = SignalFd::with_flags(&mask, SfdFlags::SFD_NONBLOCK | SfdFlags::SFD_CLOEXEC)
            .map_err(BoothError::ioctl("signalfd"))?;
        debug!("Shutdown signals routed to signalfd");
        Ok(Self { fd })
    }

    /// Consume one pending shutdown signal, if any
    pub fn take(&mut self) -> Result<Option<Signal>> {
        match self.fd.read_signal() {
            Ok(Some(info)) => Ok(Signal::try_from(info.ssi_signo as libc::c_int).ok()),
            Ok(None) => Ok(None),
            Err(Errno::EINTR) => Ok(None),
            Err(e) => Err(BoothError::Ioctl {
                request: "signalfd read",
                source: e,
            }),
        }
    }

    fn as_raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }
}

/// Key input from evdev devices
pub struct EvdevInput {
    devices: Vec<Device>,
    keymap: KeyMap,
    signals: ShutdownSignals,
    pending: VecDeque<BoothInput>,
}

impl EvdevInput {
    /// Open every input device that can produce key events
    pub fn open(keymap: KeyMap, signals: ShutdownSignals) -> Result<Self> {
        let mut devices = Vec::new();

        for (path, device) in evdev::enumerate() {
            if !device.supported_events().contains(EventType::KEY) {
                debug!(path = %path.display(), "Skipping non-key input device");
                continue;
            }
            set_nonblocking(&device)?;
            info!(
                path = %path.display(),
                name = device.name().unwrap_or("unknown"),
                "Found key input device"
            );
            devices.push(device);
        }

        if devices.is_empty() {
            return Err(BoothError::NoInputDevices);
        }

        Ok(Self::with_devices(devices, keymap, signals))
    }

    /// Build from already opened, non-blocking devices
    pub fn with_devices(devices: Vec<Device>, keymap: KeyMap, signals: ShutdownSignals) -> Self {
        Self {
            devices,
            keymap,
            signals,
            pending: VecDeque::new(),
        }
    }

    /// Number of devices still attached
    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    /// Drain whatever `device` has buffered, mapped through `keymap`
    fn read_device(device: &mut Device, keymap: &KeyMap) -> io::Result<Vec<BoothInput>> {
        let mut inputs = Vec::new();
        loop {
            let events: Vec<_> = match device.fetch_events() {
                Ok(events) => events.collect(),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            if events.is_empty() {
                break;
            }
            for event in events {
                // Key-up (0) and autorepeat (2) are ignored
                if let InputEventKind::Key(key) = event.kind() {
                    if event.value() == 1 {
                        if let Some(input) = keymap.classify(key) {
                            debug!(key = ?key, input = ?input, "Key pressed");
                            inputs.push(input);
                        }
                    }
                }
            }
        }
        Ok(inputs)
    }

    /// Read the devices at `indices`, dropping any that have been unplugged
    fn read_devices(&mut self, indices: &[usize]) -> Result<Vec<BoothInput>> {
        let mut inputs = Vec::new();
        let mut gone = Vec::new();

        for &index in indices {
            match Self::read_device(&mut self.devices[index], &self.keymap) {
                Ok(read) => inputs.extend(read),
                Err(e) if device_gone(&e) => {
                    warn!(
                        name = self.devices[index].name().unwrap_or("unknown"),
                        "Input device removed"
                    );
                    gone.push(index);
                }
                Err(e) => return Err(e.into()),
            }
        }

        for index in gone.into_iter().rev() {
            self.devices.remove(index);
        }
        Ok(inputs)
    }

    /// Wait until a device or the signalfd is readable, then read the devices
    fn wait_and_read(&mut self) -> Result<()> {
        let ready: Vec<usize> = {
            let mut fds: Vec<PollFd> = self
                .devices
                .iter()
                .map(|device| device.as_raw_fd())
                .chain(std::iter::once(self.signals.as_raw_fd()))
                .map(|fd| {
                    // SAFETY: devices and the signalfd outlive this poll call
                    let fd = unsafe { BorrowedFd::borrow_raw(fd) };
                    PollFd::new(fd, PollFlags::POLLIN)
                })
                .collect();

            match poll(&mut fds, PollTimeout::NONE) {
                Ok(_) => {}
                Err(Errno::EINTR) => return Ok(()),
                Err(e) => {
                    return Err(BoothError::Ioctl {
                        request: "poll",
                        source: e,
                    })
                }
            }

            fds.iter()
                .take(self.devices.len())
                .enumerate()
                .filter(|(_, fd)| {
                    fd.revents()
                        .map(|r| r.intersects(PollFlags::POLLIN | PollFlags::POLLERR | PollFlags::POLLHUP))
                        .unwrap_or(false)
                })
                .map(|(i, _)| i)
                .collect()
        };

        let inputs = self.read_devices(&ready)?;
        self.pending.extend(inputs);
        Ok(())
    }
}

impl InputSource for EvdevInput {
    fn next_input(&mut self) -> Result<Option<BoothInput>> {
        loop {
            if let Some(signal) = self.signals.take()? {
                info!(signal = %signal, "Shutdown signal received");
                return Ok(Some(BoothInput::Quit));
            }
            if let Some(input) = self.pending.pop_front() {
                return Ok(Some(input));
            }
            if self.devices.is_empty() {
                warn!("No key input devices left");
                return Ok(None);
            }
            self.wait_and_read()?;
        }
    }

    fn discard_pending(&mut self) -> Result<usize> {
        let all: Vec<usize> = (0..self.devices.len()).collect();
        let dropped = self.pending.len() + self.read_devices(&all)?.len();
        self.pending.clear();
        if dropped > 0 {
            warn!(dropped = dropped, "Discarded button presses received while busy");
        }
        Ok(dropped)
    }
}

/// Read errors that mean the device was unplugged
fn device_gone(err: &io::Error) -> bool {
    matches!(err.raw_os_error(), Some(libc::ENODEV))
}

fn set_nonblocking(device: &Device) -> Result<()> {
    let fd = device.as_raw_fd();
    let flags = fcntl(fd, FcntlArg::F_GETFL).map_err(BoothError::ioctl("F_GETFL"))?;
    let flags = OFlag::from_bits_truncate(flags) | OFlag::O_NONBLOCK;
    fcntl(fd, FcntlArg::F_SETFL(flags)).map_err(BoothError::ioctl("F_SETFL"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_keymap() {
        let keymap = KeyMap::default();
        assert_eq!(keymap.classify(Key::KEY_ENTER), Some(BoothInput::Trigger));
        assert_eq!(keymap.classify(Key::KEY_CAMERA), Some(BoothInput::Trigger));
        assert_eq!(keymap.classify(Key::KEY_BACKSPACE), Some(BoothInput::Quit));
        assert_eq!(keymap.classify(Key::KEY_A), None);
    }

    #[test]
    fn test_custom_keymap() {
        let keymap = KeyMap::new(&KeyConfig {
            trigger: vec![Key::KEY_SPACE.code()],
            quit: vec![Key::KEY_ESC.code()],
        });
        assert_eq!(keymap.classify(Key::KEY_SPACE), Some(BoothInput::Trigger));
        assert_eq!(keymap.classify(Key::KEY_ESC), Some(BoothInput::Quit));
        assert_eq!(keymap.classify(Key::KEY_ENTER), None);
    }

    #[test]
    fn test_unplugged_device_errors() {
        assert!(device_gone(&io::Error::from_raw_os_error(libc::ENODEV)));
        assert!(!device_gone(&io::Error::from_raw_os_error(libc::EIO)));
        assert!(!device_gone(&io::Error::from(io::ErrorKind::WouldBlock)));
    }

    #[test]
    fn test_no_devices_left_ends_input() {
        let signals = ShutdownSignals::open().unwrap();
        let mut input = EvdevInput::with_devices(Vec::new(), KeyMap::default(), signals);
        assert_eq!(input.device_count(), 0);
        assert_eq!(input.next_input().unwrap(), None);
        assert_eq!(input.discard_pending().unwrap(), 0);
    }

    #[test]
    fn test_sigterm_is_a_quit() {
        let signals = ShutdownSignals::open().unwrap();
        let mut input = EvdevInput::with_devices(Vec::new(), KeyMap::default(), signals);

        // Blocked on this thread, so it stays pending for the signalfd
        nix::sys::signal::raise(Signal::SIGTERM).unwrap();

        assert_eq!(input.next_input().unwrap(), Some(BoothInput::Quit));
        assert_eq!(input.next_input().unwrap(), None);
    }

    #[test]
    fn test_signal_is_consumed_once() {
        let mut signals = ShutdownSignals::open().unwrap();
        assert_eq!(signals.take().unwrap(), None);

        nix::sys::signal::raise(Signal::SIGINT).unwrap();
        assert_eq!(signals.take().unwrap(), Some(Signal::SIGINT));
        assert_eq!(signals.take().unwrap(), None);
    }
}
