use log::debug;

use crate::{config::Timings, connectivity::ConnectivityState, hardware::OutputPin};

/// What the status LED should be doing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IndicatorState {
    /// No WiFi: unprovisioned, connecting or link down
    FastBlink,
    /// WiFi is up but the alert server cannot be found
    SlowBlink,
    /// Everything connected; the level mirrors the alert state
    Solid(bool),
}

impl IndicatorState {
    /// The indicator is never stored on its own; it is recomputed from the
    /// connectivity and alert state every time it is drawn.
    pub fn derive(connectivity: ConnectivityState, alert_active: bool) -> Self {
        match connectivity {
            ConnectivityState::Unprovisioned
            | ConnectivityState::Connecting
            | ConnectivityState::WifiDown => IndicatorState::FastBlink,
            ConnectivityState::WifiUpNoServer => IndicatorState::SlowBlink,
            ConnectivityState::WifiUpServerUp => IndicatorState::Solid(alert_active),
        }
    }
}

/// Drives the output pin for a derived [`IndicatorState`].
///
/// Only the blink phase is remembered between calls.
pub struct Indicator<O> {
    pin: O,
    fast_blink_ms: u64,
    slow_blink_ms: u64,
    shown: Option<IndicatorState>,
    level: bool,
    last_toggle_ms: u64,
}

impl<O: OutputPin> Indicator<O> {
    pub fn new(mut pin: O, timings: &Timings) -> Self {
        pin.set_level(false);
        Self {
            pin,
            fast_blink_ms: timings.fast_blink_ms,
            slow_blink_ms: timings.slow_blink_ms,
            shown: None,
            level: false,
            last_toggle_ms: 0,
        }
    }

    /// Draw `state` at time `now_ms`.
    ///
    /// A solid state is written immediately, never on the next blink tick.
    /// Blink states toggle the pin each time their interval has elapsed.
    pub fn show(&mut self, state: IndicatorState, now_ms: u64) {
        if self.shown != Some(state) {
            debug!("Indicator: {:?}", state);
        }

        match state {
            IndicatorState::Solid(level) => {
                if self.shown != Some(state) || self.level != level {
                    self.write(level);
                }
            }
            IndicatorState::FastBlink | IndicatorState::SlowBlink => {
                let interval = if state == IndicatorState::FastBlink {
                    self.fast_blink_ms
                } else {
                    self.slow_blink_ms
                };

                if !matches!(
                    self.shown,
                    Some(IndicatorState::FastBlink | IndicatorState::SlowBlink)
                ) {
                    self.last_toggle_ms = now_ms;
                } else if now_ms.saturating_sub(self.last_toggle_ms) >= interval {
                    self.last_toggle_ms = now_ms;
                    self.write(!self.level);
                }
            }
        }

        self.shown = Some(state);
    }

    /// Override the pin outside the state machine, as the factory reset
    /// sequence does. The next [`Indicator::show`] takes over again.
    pub fn force(&mut self, level: bool) {
        self.shown = None;
        self.write(level);
    }

    pub fn shown(&self) -> Option<IndicatorState> {
        self.shown
    }

    pub fn level(&self) -> bool {
        self.level
    }

    fn write(&mut self, level: bool) {
        self.level = level;
        self.pin.set_level(level);
    }
}
