//! PTT keying and the TX/RX status indicator.
//!
//! PTT is a two-state gate with configurable polarity. While keyed, the
//! receive path is inhibited so the modem cannot decode its own
//! transmission. The status LED mirrors TX/RX/idle but holds each color
//! for a minimum number of ticks so rapid toggling does not flicker.

use crate::hw::{Polarity, PttLine};

#[derive(Debug, Clone)]
pub struct PttControl {
    polarity: Polarity,
    keyed: bool,
}

impl PttControl {
    pub fn new(polarity: Polarity) -> Self {
        Self {
            polarity,
            keyed: false,
        }
    }

    pub fn keyed(&self) -> bool {
        self.keyed
    }

    /// Receive is inhibited exactly while keyed.
    pub fn receive_inhibited(&self) -> bool {
        self.keyed
    }

    pub fn key(&mut self, line: &mut dyn PttLine) {
        if !self.keyed {
            self.keyed = true;
            line.set_level(self.polarity.level(true));
            log::debug!("PTT keyed");
        }
    }

    pub fn unkey(&mut self, line: &mut dyn PttLine) {
        if self.keyed {
            self.keyed = false;
            line.set_level(self.polarity.level(false));
            log::debug!("PTT unkeyed");
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LedState {
    #[default]
    Idle,
    Receiving,
    Transmitting,
}

/// Debounced status indicator.
#[derive(Debug, Clone)]
pub struct StatusLed {
    state: LedState,
    requested: LedState,
    min_hold_ticks: u32,
    held: u32,
}

impl StatusLed {
    pub fn new(min_hold_ticks: u32) -> Self {
        Self {
            state: LedState::Idle,
            requested: LedState::Idle,
            min_hold_ticks,
            held: 0,
        }
    }

    /// Record the state the modem wants shown.
    pub fn request(&mut self, state: LedState) {
        self.requested = state;
    }

    /// Advance one tick; the displayed state only changes once the hold
    /// time has elapsed. TX is applied immediately so the operator sees
    /// keying without delay.
    pub fn tick(&mut self) -> LedState {
        if self.requested == LedState::Transmitting && self.state != LedState::Transmitting {
            self.state = LedState::Transmitting;
            self.held = 0;
            return self.state;
        }
        if self.held < self.min_hold_ticks {
            self.held += 1;
        } else if self.state != self.requested {
            self.state = self.requested;
            self.held = 0;
        }
        self.state
    }

    pub fn state(&self) -> LedState {
        self.state
    }
}
