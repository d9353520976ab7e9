//! Tilt classification for the two-axis drive mapper.
//!
//! Converts raw accelerometer tilt into turn/direction targets and a drive
//! magnitude. Everything here is pure; the stateful pin sequencing lives in
//! `controllers::drive`.
//!
//! The longitudinal neutral band is asymmetric on purpose. Holding the phone
//! at a moderate backward angle is the natural resting posture, so reverse
//! only engages beyond -0.5 while forward engages for any positive tilt.
//!
//! # Example
//! ```rust
//! use tdc_core::utils::math::tilt::{classify_turn, TiltConfig, Turn};
//! let cfg = TiltConfig::default();
//! assert_eq!(classify_turn(-0.6, &cfg), Turn::Left);
//! ```

use libm;

/// One two-axis orientation sample.
///
/// `lr` is lateral tilt and `fb` fore/aft tilt, each nominally in
/// [-1.0, 1.0]. Out-of-range values are tolerated; the only consumer of the
/// magnitude clamps before use.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TiltReading {
    pub lr: f32,
    pub fb: f32,
}

/// Last-commanded lateral actuation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Turn {
    None,
    Left,
    Right,
}

/// Last-commanded longitudinal actuation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    None,
    Forward,
    Reverse,
}

/// Deadzone thresholds for both axes.
///
/// `lateral_deadzone` is the magnitude `|lr|` must exceed before a turn
/// registers. `longitudinal_deadzone` is how far past zero a *backward* tilt
/// must go before reverse engages; forward engages for any `fb > 0`.
#[derive(Debug, Clone, Copy)]
pub struct TiltConfig {
    pub lateral_deadzone: f32,
    pub longitudinal_deadzone: f32,
}

impl Default for TiltConfig {
    fn default() -> Self {
        Self {
            lateral_deadzone: 0.4,
            longitudinal_deadzone: 0.5,
        }
    }
}

/// Classify the lateral axis. Boundary values fall in the deadzone.
pub fn classify_turn(
    lr: f32,
    config: &TiltConfig,
) -> Turn {
    if lr < -config.lateral_deadzone {
        Turn::Left
    } else if lr > config.lateral_deadzone {
        Turn::Right
    } else {
        Turn::None
    }
}

/// Classify the longitudinal axis.
///
/// Reverse is `fb < -longitudinal_deadzone`, forward is `fb > 0`, and the
/// band in between idles.
pub fn classify_direction(
    fb: f32,
    config: &TiltConfig,
) -> Direction {
    if fb < -config.longitudinal_deadzone {
        Direction::Reverse
    } else if fb > 0.0 {
        Direction::Forward
    } else {
        Direction::None
    }
}

/// Raw drive weight for a classified direction.
///
/// Reverse measures distance past the reverse threshold; forward uses the
/// tilt directly. Neutral weighs nothing.
pub fn drive_weight(
    fb: f32,
    direction: Direction,
    config: &TiltConfig,
) -> f32 {
    match direction {
        Direction::Reverse => -(fb + config.longitudinal_deadzone),
        Direction::Forward => fb,
        Direction::None => 0.0,
    }
}

/// Map a raw weight onto the 8-bit PWM range.
///
/// The usable weight span is [0, 0.5], so the weight is doubled, clamped to
/// [0, 1], and scaled to 0-255 with rounding. The clamp absorbs any
/// out-of-range input.
pub fn map_weight(weight: f32) -> u8 {
    let clamped = (weight * 2.0).clamp(0.0, 1.0);
    libm::roundf(clamped * 255.0) as u8
}
