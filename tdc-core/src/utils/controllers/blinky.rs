//! Remote LED control on a single digital pin.
//!
//! The simplest remote-wiring demo: switch one output pin from the phone.

use serde::{Deserialize, Serialize};

use super::drive::PinActuator;

/// Pin wired to the demo LED.
pub const LED_PIN: u8 = 13;

/// LED command variants.
///
/// Serialized as JSON with tag `"bc"`.
#[derive(Debug, Serialize, Deserialize, Clone, Copy)]
#[serde(tag = "bc", rename_all = "snake_case")]
pub enum BlinkyCommand {
    On,
    Off,
}

/// Latched on/off state for the demo LED pin.
pub struct Blinky {
    pin: u8,
    is_on: bool,
}

impl Blinky {
    pub fn new(pin: u8) -> Self {
        Self { pin, is_on: false }
    }

    pub fn is_on(&self) -> bool {
        self.is_on
    }

    /// Execute an incoming `BlinkyCommand`.
    ///
    /// Redundant commands still write the pin, so a freshly reconnected
    /// board ends up in the commanded state.
    pub fn ex_command<A: PinActuator>(
        &mut self,
        cmd: BlinkyCommand,
        pins: &mut A,
    ) -> Result<(), A::Error> {
        match cmd {
            BlinkyCommand::On => {
                self.is_on = true;
                pins.digital_write(self.pin, true)
            }
            BlinkyCommand::Off => {
                self.is_on = false;
                pins.digital_write(self.pin, false)
            }
        }
    }
}
