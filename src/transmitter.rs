use std::io::Write;
use std::time::{Duration, Instant};

use crate::joystick::{JoystickState, NormalizedPosition};
use crate::link::{LinkError, Transport};
use crate::schedule::Interval;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxState {
    Idle,
    Transmitting,
}

/// What a transmit tick did.
#[derive(Debug)]
pub enum Tick {
    Sent(NormalizedPosition),
    /// Canvas has no size yet; nothing written, still running.
    Skipped,
    /// First tick after a stop: connection closed, not re-armed.
    Stopped,
    /// Write failed: transmission stopped and connection dropped.
    Failed(LinkError),
}

/// Streams the joystick position to a serial link on a fixed interval.
///
/// Stop only flips the state. The tick already armed still fires, sees
/// `Idle` before writing, closes the link and does not re-arm. So no write
/// happens after a stop is requested.
pub struct Transmitter<T: Transport> {
    transport: T,
    baud: u32,
    state: TxState,
    link: Option<T::Link>,
    schedule: Interval,
}

impl<T: Transport> Transmitter<T> {
    pub fn new(transport: T, baud: u32, period: Duration) -> Self {
        Self {
            transport,
            baud,
            state: TxState::Idle,
            link: None,
            schedule: Interval::new(period),
        }
    }

    pub fn state(&self) -> TxState {
        self.state
    }

    pub fn is_link_open(&self) -> bool {
        self.link.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.schedule.deadline()
    }

    /// Open `port` and begin transmitting; the first tick is due at `now`.
    ///
    /// Returns `Ok(false)` without touching the port when no port is selected
    /// or transmission is already running.
    pub fn start(&mut self, port: Option<&str>, now: Instant) -> Result<bool, LinkError> {
        let port = match port {
            Some(p) if !p.is_empty() => p,
            _ => {
                log::warn!("No serial port selected");
                return Ok(false);
            }
        };
        if self.state == TxState::Transmitting {
            return Ok(false);
        }

        // A stop whose closing tick has not fired yet still holds the link.
        self.link = None;
        self.link = Some(self.transport.open(port, self.baud)?);
        self.state = TxState::Transmitting;
        self.schedule.arm_at(now);
        log::info!("Transmitting on {}", port);
        Ok(true)
    }

    pub fn stop(&mut self) {
        if self.state == TxState::Transmitting {
            self.state = TxState::Idle;
            log::info!("Stop requested");
        }
    }

    /// Run the transmit task if it is due. `None` when nothing was due.
    pub fn tick(&mut self, joystick: &JoystickState, now: Instant) -> Option<Tick> {
        if !self.schedule.fire(now) {
            return None;
        }

        if self.state == TxState::Idle {
            self.close();
            log::info!("Transmission stopped");
            return Some(Tick::Stopped);
        }

        let Some(pos) = joystick.normalized() else {
            return Some(Tick::Skipped);
        };

        match self.send(pos) {
            Ok(()) => Some(Tick::Sent(pos)),
            Err(e) => {
                self.state = TxState::Idle;
                self.close();
                Some(Tick::Failed(e))
            }
        }
    }

    /// Stop immediately and close the link.
    pub fn shutdown(&mut self) {
        self.state = TxState::Idle;
        self.close();
    }

    fn send(&mut self, pos: NormalizedPosition) -> Result<(), LinkError> {
        let Some(link) = self.link.as_mut() else {
            return Err(LinkError::NotOpen);
        };
        link.write_all(pos.to_line().as_bytes())?;
        link.flush()?;
        Ok(())
    }

    fn close(&mut self) {
        self.link = None;
        self.schedule.disarm();
    }
}
