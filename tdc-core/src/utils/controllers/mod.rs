//! Command dispatch for the tilt-drive car.
//!
//! - `drive`: the tilt-to-drive mapper and its actuation strategies.
//! - `pins`: PCA9685-backed pin actuation over a shared I2C bus.
//! - `blinky`: remote LED on a single digital pin.

pub mod blinky;
pub mod drive;
pub mod pins;

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use serde::{Deserialize, Serialize};

use crate::utils::math::tilt::{TiltConfig, TiltReading};
use blinky::{Blinky, BlinkyCommand, LED_PIN};
use drive::{DriveCommand, DriveWiring, PinActuator, TiltDriveMapper};

/// Channel used to receive all remote commands (`SystemCommand` messages).
///
/// A single queue serializes every pin write against the shared expander;
/// splitting drive and LED traffic over separate queues could interleave an
/// opposing-pair switch mid-sequence.
pub static SYSTEM_CHANNEL: embassy_sync::channel::Channel<
    CriticalSectionRawMutex,
    SystemCommand,
    16,
> = embassy_sync::channel::Channel::new();

#[derive(Debug, Serialize, Deserialize, Clone, Copy)]
#[serde(tag = "ct", rename_all = "snake_case")] // ct = command type
pub enum SystemCommand {
    D(DriveCommand),
    B(BlinkyCommand),
}

/// Owns the actuation sink and the stateful controllers driving it.
pub struct SystemController<A> {
    pub pins: Option<A>,
    mapper: TiltDriveMapper,
    blinky: Blinky,
}

impl<A> SystemController<A>
where
    A: PinActuator,
    A::Error: core::fmt::Debug,
{
    /// Build a controller over an already-initialized actuation sink.
    pub fn from_actuator(
        actuator: A,
        wiring: Option<DriveWiring>,
        config: Option<TiltConfig>,
    ) -> Self {
        SystemController {
            pins: Some(actuator),
            mapper: TiltDriveMapper::new(wiring.unwrap_or_default(), config.unwrap_or_default()),
            blinky: Blinky::new(LED_PIN),
        }
    }

    /// Drain the command channel forever, one pin sequence at a time.
    pub async fn command_loop(&mut self) -> ! {
        loop {
            let command = SYSTEM_CHANNEL.receiver().receive().await;
            tracing::info!("Received command: {:?}", command);
            if let Some(pins) = self.pins.as_mut() {
                let result = match command {
                    SystemCommand::D(DriveCommand::T { lr, fb }) => {
                        self.mapper.apply(TiltReading { lr, fb }, pins)
                    }
                    SystemCommand::D(DriveCommand::Stop) => self.mapper.all_stop(pins),
                    SystemCommand::B(cmd) => self.blinky.ex_command(cmd, pins),
                };
                if let Err(e) = result {
                    tracing::error!("command failed: {:?}", e);
                }
            } else {
                tracing::warn!(
                    "command received but actuator not initialized: {:?}",
                    command
                );
            }
        }
    }
}

impl<I2C, E> SystemController<pins::ExpanderPins<'static, I2C>>
where
    I2C: embedded_hal::i2c::I2c<Error = E> + 'static,
    E: core::fmt::Debug,
{
    /// Build a controller over the PWM expander on the given bus.
    ///
    /// If the expander fails to initialize the bus is scanned for anything
    /// that responds and the controller runs with no sink, logging every
    /// command it would have executed.
    pub fn new(
        i2c_bus: &'static RefCell<I2C>,
        wiring: Option<DriveWiring>,
        config: Option<TiltConfig>,
    ) -> Self {
        let mut expander = pins::ExpanderPins::new(i2c_bus);
        let pins = match expander.init_devices() {
            Ok(()) => {
                if let Err(e) = expander.configure_pwm() {
                    tracing::warn!("PWM configuration failed: {:?}", e);
                }
                Some(expander)
            }
            Err(e) => {
                tracing::warn!("I2C init failed, scanning instead: {:?}", e);
                expander.scan_bus();
                None
            }
        };

        SystemController {
            pins,
            mapper: TiltDriveMapper::new(wiring.unwrap_or_default(), config.unwrap_or_default()),
            blinky: Blinky::new(LED_PIN),
        }
    }
}
