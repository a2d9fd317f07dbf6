use evdev::{Device, InputEventKind, Key, RelativeAxisType};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;

/// Pointer input as seen by the virtual canvas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerEvent {
    Press,
    /// Relative motion accumulated over one evdev report.
    Motion { dx: i32, dy: i32 },
    Release,
}

/// Flags the main thread sets for the reader thread.
pub struct ReaderControl {
    pub grab: AtomicBool,
    pub quit: AtomicBool,
}

impl ReaderControl {
    pub fn new() -> Self {
        Self {
            grab: AtomicBool::new(false),
            quit: AtomicBool::new(false),
        }
    }
}

/// Find a mouse device by enumerating /dev/input/event*.
/// Returns the first device that supports REL_X, REL_Y, and BTN_LEFT.
pub fn find_mouse_device() -> Option<PathBuf> {
    for i in 0..64 {
        let path = PathBuf::from(format!("/dev/input/event{}", i));
        if !path.exists() {
            continue;
        }
        if let Ok(device) = Device::open(&path) {
            if is_mouse(&device) {
                log::info!(
                    "Found mouse: {} at {}",
                    device.name().unwrap_or("unknown"),
                    path.display()
                );
                return Some(path);
            }
        }
    }
    None
}

fn is_mouse(device: &Device) -> bool {
    let has_rel_xy = device.supported_relative_axes().is_some_and(|axes| {
        axes.contains(RelativeAxisType::REL_X) && axes.contains(RelativeAxisType::REL_Y)
    });
    let has_btn_left = device
        .supported_keys()
        .is_some_and(|keys| keys.contains(Key::BTN_LEFT));
    has_rel_xy && has_btn_left
}

/// Collapses raw evdev events into [`PointerEvent`]s, one motion per SYN
/// report.
#[derive(Debug, Default)]
pub struct EventFolder {
    dx: i32,
    dy: i32,
}

impl EventFolder {
    pub fn push(&mut self, kind: InputEventKind, value: i32, out: &mut Vec<PointerEvent>) {
        match kind {
            InputEventKind::RelAxis(RelativeAxisType::REL_X) => self.dx += value,
            InputEventKind::RelAxis(RelativeAxisType::REL_Y) => self.dy += value,
            InputEventKind::Key(Key::BTN_LEFT) => {
                self.flush(out);
                match value {
                    1 => out.push(PointerEvent::Press),
                    0 => out.push(PointerEvent::Release),
                    // 2 is autorepeat
                    _ => {}
                }
            }
            InputEventKind::Synchronization(_) => self.flush(out),
            _ => {}
        }
    }

    fn flush(&mut self, out: &mut Vec<PointerEvent>) {
        if self.dx != 0 || self.dy != 0 {
            out.push(PointerEvent::Motion {
                dx: self.dx,
                dy: self.dy,
            });
            self.dx = 0;
            self.dy = 0;
        }
    }
}

pub struct MouseReader {
    device: Device,
    control: Arc<ReaderControl>,
    events: Sender<PointerEvent>,
    grabbed: bool,
}

impl MouseReader {
    pub fn new(
        device_path: &str,
        control: Arc<ReaderControl>,
        events: Sender<PointerEvent>,
    ) -> std::io::Result<Self> {
        let device = Device::open(device_path)?;
        log::info!(
            "Opened mouse device: {} ({})",
            device.name().unwrap_or("unknown"),
            device_path
        );
        Ok(Self {
            device,
            control,
            events,
            grabbed: false,
        })
    }

    /// Run the blocking event loop. Call from a dedicated thread.
    /// Returns when asked to quit or when the receiving side is gone.
    pub fn run(&mut self) {
        let mut folder = EventFolder::default();
        let mut batch = Vec::new();

        loop {
            if self.control.quit.load(Ordering::Relaxed) {
                break;
            }
            self.sync_grab();

            let raw: Vec<_> = match self.device.fetch_events() {
                Ok(iter) => iter.map(|ev| (ev.kind(), ev.value())).collect(),
                Err(e) => {
                    if self.control.quit.load(Ordering::Relaxed) {
                        break;
                    }
                    // Control signals interrupt the blocking read with EINTR.
                    if e.kind() == std::io::ErrorKind::Interrupted {
                        continue;
                    }
                    log::error!("Error reading mouse events: {}", e);
                    std::thread::sleep(std::time::Duration::from_millis(10));
                    continue;
                }
            };

            for (kind, value) in raw {
                folder.push(kind, value, &mut batch);
            }
            for ev in batch.drain(..) {
                if self.events.send(ev).is_err() {
                    self.release_grab();
                    return;
                }
            }
        }

        self.release_grab();
    }

    fn sync_grab(&mut self) {
        let want = self.control.grab.load(Ordering::Relaxed);
        if want == self.grabbed {
            return;
        }
        if want {
            match self.device.grab() {
                Ok(()) => {
                    self.grabbed = true;
                    log::info!("Mouse grabbed");
                }
                Err(e) => log::warn!("Failed to grab mouse: {}", e),
            }
        } else {
            self.release_grab();
        }
    }

    fn release_grab(&mut self) {
        if !self.grabbed {
            return;
        }
        if let Err(e) = self.device.ungrab() {
            log::warn!("Failed to ungrab mouse: {}", e);
        }
        self.grabbed = false;
        log::info!("Mouse released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evdev::Synchronization;

    fn fold(events: &[(InputEventKind, i32)]) -> Vec<PointerEvent> {
        let mut folder = EventFolder::default();
        let mut out = Vec::new();
        for &(kind, value) in events {
            folder.push(kind, value, &mut out);
        }
        out
    }

    const SYN: InputEventKind = InputEventKind::Synchronization(Synchronization::SYN_REPORT);

    #[test]
    fn test_motion_folds_per_report() {
        let out = fold(&[
            (InputEventKind::RelAxis(RelativeAxisType::REL_X), 3),
            (InputEventKind::RelAxis(RelativeAxisType::REL_Y), -2),
            (InputEventKind::RelAxis(RelativeAxisType::REL_X), 1),
            (SYN, 0),
            (InputEventKind::RelAxis(RelativeAxisType::REL_Y), 5),
            (SYN, 0),
        ]);
        assert_eq!(
            out,
            vec![
                PointerEvent::Motion { dx: 4, dy: -2 },
                PointerEvent::Motion { dx: 0, dy: 5 },
            ]
        );
    }

    #[test]
    fn test_button_edges() {
        let out = fold(&[
            (InputEventKind::Key(Key::BTN_LEFT), 1),
            (SYN, 0),
            (InputEventKind::RelAxis(RelativeAxisType::REL_X), 7),
            (InputEventKind::Key(Key::BTN_LEFT), 0),
            (SYN, 0),
        ]);
        assert_eq!(
            out,
            vec![
                PointerEvent::Press,
                PointerEvent::Motion { dx: 7, dy: 0 },
                PointerEvent::Release,
            ]
        );
    }

    #[test]
    fn test_ignores_other_buttons_and_wheel() {
        let out = fold(&[
            (InputEventKind::Key(Key::BTN_RIGHT), 1),
            (InputEventKind::RelAxis(RelativeAxisType::REL_WHEEL), 1),
            (SYN, 0),
        ]);
        assert!(out.is_empty());
    }
}
