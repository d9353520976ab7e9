//! Tilt-to-drive mapping.
//!
//! Translates classified tilt into ordered pin writes for one of two motor
//! wirings. The mapper is an open-loop, synchronous transform: one reading
//! in, a short sequence of pin writes out, no feedback path. It remembers the
//! last-commanded turn and direction so a direction change always releases
//! the opposing actuation before engaging the new one.

use serde::{Deserialize, Serialize};

use crate::utils::math::tilt::{
    classify_direction, classify_turn, drive_weight, map_weight, Direction, TiltConfig,
    TiltReading, Turn,
};

/// Narrow actuation-sink interface.
///
/// Implementations must issue writes in call order; reordering or batching
/// could transiently drive both pins of an opposing pair.
pub trait PinActuator {
    type Error;

    /// Drive a pin fully high or low.
    fn digital_write(
        &mut self,
        pin: u8,
        high: bool,
    ) -> Result<(), Self::Error>;

    /// Drive a PWM-capable pin with an 8-bit duty value.
    fn analog_write(
        &mut self,
        pin: u8,
        value: u8,
    ) -> Result<(), Self::Error>;
}

// Direction-pin levels for the direction/power wiring.
const LEVEL_LEFT: bool = false;
const LEVEL_RIGHT: bool = true;
const LEVEL_FORWARD: bool = false;
const LEVEL_REVERSE: bool = true;

/// Motor wiring variants found on the supported boards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriveWiring {
    /// One direction pin plus one power pin per axis (Velleman KA03 shield).
    ///
    /// The longitudinal power pin is PWM-driven for proportional speed. The
    /// lateral motor stalls at partial power, so its power pin is driven
    /// digitally and turns are always full-on.
    DirectionPower {
        fb_direction: u8,
        fb_power: u8,
        lr_direction: u8,
        lr_power: u8,
    },
    /// One digital pin per direction (Maisto PCB).
    ///
    /// Powering both pins of a pair at once damages the board, so the
    /// opposite pin is always released before the new one engages.
    PinPerDirection {
        forward: u8,
        reverse: u8,
        left: u8,
        right: u8,
    },
}

impl Default for DriveWiring {
    fn default() -> Self {
        DriveWiring::DirectionPower {
            fb_direction: 8,
            fb_power: 9,
            lr_direction: 2,
            lr_power: 3,
        }
    }
}

/// Drive command variants carried over the connection.
///
/// Serialized as JSON with tag `"dc"`.
#[derive(Debug, Serialize, Deserialize, Clone, Copy)]
#[serde(tag = "dc", rename_all = "snake_case")]
pub enum DriveCommand {
    /// One tilt sample from the remote controller.
    T { lr: f32, fb: f32 },
    /// Release every drive pin and reset the mapper state.
    Stop,
}

/// Open-loop tilt-to-drive mapper.
///
/// State is updated on every invocation, not only on change, so the next
/// sample's transition check is always against the last commanded actuation.
pub struct TiltDriveMapper {
    config: TiltConfig,
    wiring: DriveWiring,
    turn: Turn,
    direction: Direction,
}

impl TiltDriveMapper {
    pub fn new(
        wiring: DriveWiring,
        config: TiltConfig,
    ) -> Self {
        Self {
            config,
            wiring,
            turn: Turn::None,
            direction: Direction::None,
        }
    }

    /// Last-commanded lateral actuation.
    pub fn turn(&self) -> Turn {
        self.turn
    }

    /// Last-commanded longitudinal actuation.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Apply one orientation reading: lateral axis first, then longitudinal.
    pub fn apply<A: PinActuator>(
        &mut self,
        reading: TiltReading,
        pins: &mut A,
    ) -> Result<(), A::Error> {
        self.apply_turn(reading.lr, pins)?;
        self.apply_direction(reading.fb, pins)
    }

    fn apply_turn<A: PinActuator>(
        &mut self,
        lr: f32,
        pins: &mut A,
    ) -> Result<(), A::Error> {
        let target = classify_turn(lr, &self.config);
        match self.wiring {
            DriveWiring::DirectionPower {
                lr_direction,
                lr_power,
                ..
            } => match target {
                Turn::Left => {
                    if self.turn != Turn::Left {
                        // cut power before the direction pin flips
                        pins.digital_write(lr_power, false)?;
                        pins.digital_write(lr_direction, LEVEL_LEFT)?;
                    }
                    pins.digital_write(lr_power, true)?;
                }
                Turn::Right => {
                    if self.turn != Turn::Right {
                        pins.digital_write(lr_power, false)?;
                        pins.digital_write(lr_direction, LEVEL_RIGHT)?;
                    }
                    pins.digital_write(lr_power, true)?;
                }
                Turn::None => pins.digital_write(lr_power, false)?,
            },
            DriveWiring::PinPerDirection { left, right, .. } => match target {
                Turn::Left => {
                    if self.turn != Turn::Left {
                        pins.digital_write(right, false)?;
                    }
                    pins.digital_write(left, true)?;
                }
                Turn::Right => {
                    if self.turn != Turn::Right {
                        pins.digital_write(left, false)?;
                    }
                    pins.digital_write(right, true)?;
                }
                Turn::None => {
                    pins.digital_write(left, false)?;
                    pins.digital_write(right, false)?;
                }
            },
        }
        self.turn = target;
        Ok(())
    }

    fn apply_direction<A: PinActuator>(
        &mut self,
        fb: f32,
        pins: &mut A,
    ) -> Result<(), A::Error> {
        let target = classify_direction(fb, &self.config);
        match self.wiring {
            DriveWiring::DirectionPower {
                fb_direction,
                fb_power,
                ..
            } => match target {
                Direction::Reverse => {
                    let value = map_weight(drive_weight(fb, Direction::Reverse, &self.config));
                    if self.direction != Direction::Reverse {
                        pins.analog_write(fb_power, 0)?;
                        pins.digital_write(fb_direction, LEVEL_REVERSE)?;
                    }
                    pins.analog_write(fb_power, value)?;
                    self.direction = Direction::Reverse;
                }
                Direction::Forward => {
                    let value = map_weight(drive_weight(fb, Direction::Forward, &self.config));
                    if self.direction != Direction::Forward {
                        pins.analog_write(fb_power, 0)?;
                        pins.digital_write(fb_direction, LEVEL_FORWARD)?;
                    }
                    pins.analog_write(fb_power, value)?;
                    self.direction = Direction::Forward;
                }
                // Neutral zeroes the power pin only; the direction pin and
                // the recorded direction stay as they were.
                Direction::None => pins.analog_write(fb_power, 0)?,
            },
            DriveWiring::PinPerDirection {
                forward, reverse, ..
            } => {
                match target {
                    Direction::Reverse => {
                        if self.direction != Direction::Reverse {
                            pins.digital_write(forward, false)?;
                        }
                        pins.digital_write(reverse, true)?;
                    }
                    Direction::Forward => {
                        if self.direction != Direction::Forward {
                            pins.digital_write(reverse, false)?;
                        }
                        pins.digital_write(forward, true)?;
                    }
                    Direction::None => {
                        pins.digital_write(reverse, false)?;
                        pins.digital_write(forward, false)?;
                    }
                }
                self.direction = target;
            }
        }
        Ok(())
    }

    /// Release every wired pin and reset both axes to neutral.
    ///
    /// This is the single teardown path: callers must run it before dropping
    /// the connection that owns the sink.
    pub fn all_stop<A: PinActuator>(
        &mut self,
        pins: &mut A,
    ) -> Result<(), A::Error> {
        match self.wiring {
            DriveWiring::DirectionPower {
                fb_power, lr_power, ..
            } => {
                pins.digital_write(lr_power, false)?;
                pins.analog_write(fb_power, 0)?;
            }
            DriveWiring::PinPerDirection {
                forward,
                reverse,
                left,
                right,
            } => {
                pins.digital_write(left, false)?;
                pins.digital_write(right, false)?;
                pins.digital_write(forward, false)?;
                pins.digital_write(reverse, false)?;
            }
        }
        self.turn = Turn::None;
        self.direction = Direction::None;
        Ok(())
    }
}
