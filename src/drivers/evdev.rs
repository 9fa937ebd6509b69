// Linux evdev reader for the touchscreen and an optional keyboard
//
// Devices are opened non-blocking and drained every poll. Touch
// coordinates are reported in physical panel pixels; rotation into
// the logical canvas happens in the app, once per event.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;

use evdev::{AbsoluteAxisCode, Device, EventType, KeyCode, SynchronizationCode};

use crate::board::{InputEvent, Key};
use crate::drivers::{EventSource, HwError};

const KEY_PRESS: i32 = 1;

const KEYS: [(KeyCode, Key); 11] = [
    (KeyCode::KEY_ESC, Key::Escape),
    (KeyCode::KEY_ENTER, Key::Enter),
    (KeyCode::KEY_UP, Key::Up),
    (KeyCode::KEY_LEFT, Key::Left),
    (KeyCode::KEY_RIGHT, Key::Right),
    (KeyCode::KEY_DOWN, Key::Down),
    (KeyCode::KEY_DELETE, Key::Delete),
    (KeyCode::KEY_S, Key::Char('s')),
    (KeyCode::KEY_G, Key::Char('g')),
    (KeyCode::KEY_L, Key::Char('l')),
    (KeyCode::KEY_F, Key::Char('f')),
];

fn map_key(code: KeyCode) -> Option<InputEvent> {
    if code == KeyCode::KEY_Q {
        return Some(InputEvent::Quit);
    }
    KEYS.iter()
        .find(|(k, _)| *k == code)
        .map(|&(_, key)| InputEvent::Key(key))
}

#[derive(Default)]
struct TouchState {
    x: u16,
    y: u16,
    down: bool,
    // BTN_TOUCH edge waiting for the next SYN_REPORT
    edge: Option<bool>,
}

impl TouchState {
    fn feed(&mut self, kind: EventType, code: u16, value: i32, out: &mut Vec<InputEvent>) {
        if kind == EventType::ABSOLUTE {
            let pos = value.clamp(0, u16::MAX as i32) as u16;
            let axis = AbsoluteAxisCode(code);
            if axis == AbsoluteAxisCode::ABS_X || axis == AbsoluteAxisCode::ABS_MT_POSITION_X {
                self.x = pos;
            } else if axis == AbsoluteAxisCode::ABS_Y || axis == AbsoluteAxisCode::ABS_MT_POSITION_Y {
                self.y = pos;
            }
        } else if kind == EventType::KEY {
            let key = KeyCode::new(code);
            if key == KeyCode::BTN_TOUCH {
                self.edge = Some(value != 0);
            } else if value == KEY_PRESS
                && let Some(ev) = map_key(key)
            {
                out.push(ev);
            }
        } else if kind == EventType::SYNCHRONIZATION
            && code == SynchronizationCode::SYN_REPORT.0
            && let Some(down) = self.edge.take()
            && down != self.down
        {
            self.down = down;
            let (x, y) = (self.x, self.y);
            out.push(if down {
                InputEvent::TouchDown { x, y }
            } else {
                InputEvent::TouchUp { x, y }
            });
        }
    }
}

pub struct EvdevDevice {
    path: PathBuf,
    device: Device,
    touch: TouchState,
}

impl EvdevDevice {
    pub fn open(path: &Path) -> Result<Self, HwError> {
        let device = Device::open(path)?;
        device.set_nonblocking(true)?;
        Ok(Self {
            path: path.to_path_buf(),
            device,
            touch: TouchState::default(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn name(&self) -> &str {
        self.device.name().unwrap_or("unnamed")
    }

    /// Drains pending events. Err means the device is gone.
    fn drain(&mut self, out: &mut Vec<InputEvent>) -> io::Result<()> {
        loop {
            let events = match self.device.fetch_events() {
                Ok(events) => events,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(()),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            let mut seen = 0usize;
            for ev in events {
                seen += 1;
                self.touch.feed(ev.event_type(), ev.code(), ev.value(), out);
            }
            if seen == 0 {
                return Ok(());
            }
        }
    }
}

/// Every readable /dev/input/event* node.
pub struct EvdevInput {
    devices: Vec<EvdevDevice>,
}

impl EvdevInput {
    pub fn open_all() -> Self {
        Self::open_dir(Path::new("/dev/input"))
    }

    pub fn open_dir(dir: &Path) -> Self {
        let mut paths: Vec<PathBuf> = match fs::read_dir(dir) {
            Ok(entries) => entries
                .filter_map(|e| e.ok().map(|e| e.path()))
                .filter(|p| {
                    p.file_name()
                        .and_then(|n| n.to_str())
                        .is_some_and(|n| n.starts_with("event"))
                })
                .collect(),
            Err(e) => {
                log::warn!("evdev: cannot read {}: {}", dir.display(), e);
                Vec::new()
            }
        };
        paths.sort();

        let mut devices = Vec::new();
        for p in paths {
            match EvdevDevice::open(&p) {
                Ok(d) => {
                    log::info!("evdev: opened {} ({})", p.display(), d.name());
                    devices.push(d);
                }
                Err(e) => log::warn!("evdev: {}: {}", p.display(), e),
            }
        }
        Self { devices }
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

impl EventSource for EvdevInput {
    fn poll(&mut self, _now: Instant, out: &mut Vec<InputEvent>) {
        self.devices.retain_mut(|d| match d.drain(out) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("evdev: dropping {}: {}", d.path().display(), e);
                false
            }
        });
    }
}
