use std::time::{Duration, Instant};

use crate::joystick::{JoystickState, NormalizedPosition};
use crate::link::Transport;
use crate::mouse::PointerEvent;
use crate::schedule::Interval;
use crate::transmitter::{Tick, Transmitter, TxState};

/// Result of one [`Controller::poll`].
#[derive(Debug, Default)]
pub struct Polled {
    /// New X/Y values to show, when the display tick ran.
    pub display: Option<NormalizedPosition>,
    pub tick: Option<Tick>,
}

/// Ties the virtual canvas, the pointer and the transmitter together.
///
/// Everything runs on the caller's thread. Two recurring tasks share the
/// same period but are independent: the display tick refreshes the shown
/// X/Y values, the transmit tick (armed only while transmitting) writes
/// them to the port.
pub struct Controller<T: Transport> {
    joystick: JoystickState,
    transmitter: Transmitter<T>,
    display: Interval,
    port: Option<String>,
    sensitivity: f64,
    pressed: bool,
}

impl<T: Transport> Controller<T> {
    pub fn new(transport: T, baud: u32, period: Duration, port: Option<String>) -> Self {
        Self {
            joystick: JoystickState::new(),
            transmitter: Transmitter::new(transport, baud, period),
            display: Interval::new(period),
            port,
            sensitivity: 1.0,
            pressed: false,
        }
    }

    pub fn with_sensitivity(mut self, sensitivity: f32) -> Self {
        self.sensitivity = f64::from(sensitivity);
        self
    }

    pub fn with_knob_radius(mut self, radius: f64) -> Self {
        self.joystick.set_knob_radius(radius);
        self
    }

    pub fn joystick(&self) -> &JoystickState {
        &self.joystick
    }

    pub fn is_transmitting(&self) -> bool {
        self.transmitter.state() == TxState::Transmitting
    }

    /// Canvas (re)layout. Recentres the knob and starts the display tick.
    pub fn layout(&mut self, width: f64, height: f64, now: Instant) {
        self.joystick.resize(width, height);
        log::info!(
            "Canvas {}x{}, knob radius {}",
            width,
            height,
            self.joystick.knob_radius()
        );
        if !self.display.is_armed() {
            self.display.arm_at(now + self.display.period());
        }
    }

    pub fn pointer(&mut self, event: PointerEvent) {
        match event {
            PointerEvent::Press => self.pressed = true,
            PointerEvent::Motion { dx, dy } => {
                if !self.pressed {
                    return;
                }
                let pos = self.joystick.position();
                let to = self.joystick.within_reach(
                    pos.x + f64::from(dx) * self.sensitivity,
                    pos.y + f64::from(dy) * self.sensitivity,
                );
                self.joystick.drag(to.x, to.y);
            }
            PointerEvent::Release => {
                self.pressed = false;
                self.joystick.release();
            }
        }
    }

    /// Start transmitting on the selected port. An open failure is reported
    /// and leaves the controller idle.
    pub fn start(&mut self, now: Instant) -> bool {
        match self.transmitter.start(self.port.as_deref(), now) {
            Ok(started) => started,
            Err(e) => {
                log::error!("{}", e);
                false
            }
        }
    }

    pub fn stop(&mut self) {
        self.transmitter.stop();
    }

    /// Run whatever is due at `now`.
    pub fn poll(&mut self, now: Instant) -> Polled {
        let mut polled = Polled::default();
        if self.display.fire(now) {
            // Skipped while the canvas has no size.
            polled.display = self.joystick.normalized();
        }

        polled.tick = self.transmitter.tick(&self.joystick, now);
        match &polled.tick {
            Some(Tick::Sent(pos)) => log::debug!("sent {},{}", pos.x, pos.y),
            Some(Tick::Failed(e)) => log::warn!("{}; transmission stopped", e),
            _ => {}
        }
        polled
    }

    pub fn next_deadline(&self) -> [Option<Instant>; 2] {
        [self.display.deadline(), self.transmitter.deadline()]
    }

    pub fn shutdown(&mut self) {
        if self.transmitter.is_link_open() {
            log::info!("Closing serial port");
        }
        self.transmitter.shutdown();
        self.display.disarm();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::mock::MockTransport;

    const PERIOD: Duration = Duration::from_millis(100);

    fn controller(port: Option<&str>) -> (MockTransport, Controller<MockTransport>) {
        let mock = MockTransport::default();
        let ctl = Controller::new(mock.clone(), 9600, PERIOD, port.map(str::to_string));
        (mock, ctl)
    }

    #[test]
    fn test_drag_to_left_edge_sends_minus_128() {
        let (mock, mut ctl) = controller(Some("/dev/ttyUSB0"));
        let t0 = Instant::now();
        ctl.layout(200.0, 100.0, t0);

        // From the centre (100, 50) to (0, 50).
        ctl.pointer(PointerEvent::Press);
        ctl.pointer(PointerEvent::Motion { dx: -100, dy: 0 });
        assert!(ctl.start(t0));
        ctl.poll(t0);

        assert_eq!(mock.lines().first().map(String::as_str), Some("-128,0\n"));
    }

    #[test]
    fn test_motion_without_press_is_ignored() {
        let (_, mut ctl) = controller(None);
        ctl.layout(200.0, 100.0, Instant::now());
        ctl.pointer(PointerEvent::Motion { dx: 40, dy: 40 });
        assert_eq!(ctl.joystick().normalized(), Some(NormalizedPosition { x: 0, y: 0 }));
    }

    #[test]
    fn test_release_recentres() {
        let (mock, mut ctl) = controller(Some("/dev/ttyUSB0"));
        let t0 = Instant::now();
        ctl.layout(200.0, 100.0, t0);
        ctl.start(t0);

        ctl.pointer(PointerEvent::Press);
        ctl.pointer(PointerEvent::Motion { dx: 100, dy: 50 });
        ctl.poll(t0);
        ctl.pointer(PointerEvent::Release);
        ctl.poll(t0 + PERIOD);

        assert_eq!(mock.lines(), vec!["128,128\n", "0,0\n"]);
    }

    #[test]
    fn test_long_swipe_comes_back_quickly() {
        let (_, mut ctl) = controller(None);
        ctl.layout(200.0, 100.0, Instant::now());
        ctl.pointer(PointerEvent::Press);
        ctl.pointer(PointerEvent::Motion { dx: 10_000, dy: 0 });
        assert_eq!(ctl.joystick().position().x, 400.0);

        // Back across the whole overshoot in one canvas width.
        ctl.pointer(PointerEvent::Motion { dx: -200, dy: 0 });
        assert_eq!(ctl.joystick().normalized(), Some(NormalizedPosition { x: 128, y: 0 }));
    }

    #[test]
    fn test_relayout_while_transmitting_uses_new_size() {
        let (mock, mut ctl) = controller(Some("/dev/ttyUSB0"));
        let t0 = Instant::now();
        ctl.layout(200.0, 100.0, t0);
        assert!(ctl.start(t0));

        ctl.pointer(PointerEvent::Press);
        ctl.pointer(PointerEvent::Motion { dx: -100, dy: 0 });
        ctl.poll(t0);

        ctl.layout(400.0, 400.0, t0 + PERIOD / 2);
        assert_eq!(ctl.joystick().position().x, 200.0);
        assert_eq!(ctl.joystick().position().y, 200.0);

        // Still pressed: drag on from the new centre.
        ctl.pointer(PointerEvent::Motion { dx: 100, dy: -100 });
        ctl.poll(t0 + PERIOD);

        assert_eq!(mock.lines(), vec!["-128,0\n", "64,-64\n"]);
    }

    #[test]
    fn test_knob_radius_option() {
        let (_, ctl) = controller(None);
        let ctl = ctl.with_knob_radius(8.0);
        assert_eq!(ctl.joystick().knob_radius(), 8.0);
    }

    #[test]
    fn test_sensitivity_scales_motion() {
        let (_, ctl) = controller(None);
        let mut ctl = ctl.with_sensitivity(0.5);
        ctl.layout(200.0, 200.0, Instant::now());
        ctl.pointer(PointerEvent::Press);
        ctl.pointer(PointerEvent::Motion { dx: 100, dy: -100 });
        let pos = ctl.joystick().position();
        assert_eq!((pos.x, pos.y), (150.0, 50.0));
    }

    #[test]
    fn test_start_without_port_stays_idle() {
        let (mock, mut ctl) = controller(None);
        ctl.layout(200.0, 100.0, Instant::now());
        assert!(!ctl.start(Instant::now()));
        assert!(!ctl.is_transmitting());
        assert_eq!(mock.open_count(), 0);
    }

    #[test]
    fn test_open_failure_is_not_fatal() {
        let (mock, mut ctl) = controller(Some("/dev/ttyBUSY"));
        mock.refuse_open.set(true);
        let t0 = Instant::now();
        ctl.layout(200.0, 100.0, t0);
        assert!(!ctl.start(t0));
        assert!(!ctl.is_transmitting());

        mock.refuse_open.set(false);
        assert!(ctl.start(t0));
        assert!(ctl.is_transmitting());
    }

    #[test]
    fn test_stop_then_no_more_writes() {
        let (mock, mut ctl) = controller(Some("/dev/ttyUSB0"));
        let t0 = Instant::now();
        ctl.layout(200.0, 100.0, t0);
        ctl.start(t0);
        ctl.poll(t0);
        ctl.poll(t0 + PERIOD);
        ctl.stop();
        for i in 2..10 {
            ctl.poll(t0 + PERIOD * i);
        }
        assert_eq!(mock.lines().len(), 2);
        assert_eq!(mock.open_links.get(), 0);
    }

    #[test]
    fn test_display_tick_runs_while_idle() {
        let (mock, mut ctl) = controller(Some("/dev/ttyUSB0"));
        let t0 = Instant::now();
        ctl.layout(200.0, 100.0, t0);
        assert!(ctl.poll(t0).display.is_none());

        ctl.pointer(PointerEvent::Press);
        ctl.pointer(PointerEvent::Motion { dx: 100, dy: 0 });
        let polled = ctl.poll(t0 + PERIOD);
        assert!(polled.tick.is_none());
        assert_eq!(polled.display, Some(NormalizedPosition { x: 128, y: 0 }));
        assert!(mock.written.borrow().is_empty());
    }

    #[test]
    fn test_display_skipped_before_layout() {
        let (_, mut ctl) = controller(None);
        let t0 = Instant::now();
        assert!(ctl.poll(t0 + PERIOD).display.is_none());
        ctl.layout(200.0, 100.0, t0);
        assert_eq!(
            ctl.poll(t0 + PERIOD).display,
            Some(NormalizedPosition { x: 0, y: 0 })
        );
    }

    #[test]
    fn test_write_failure_reported_and_stopped() {
        let (mock, mut ctl) = controller(Some("/dev/ttyUSB0"));
        let t0 = Instant::now();
        ctl.layout(200.0, 100.0, t0);
        ctl.start(t0);
        mock.fail_writes.set(true);
        assert!(matches!(ctl.poll(t0).tick, Some(Tick::Failed(_))));
        assert!(!ctl.is_transmitting());
    }
}
