//! PCA9685-backed pin actuation over a shared I2C bus.
//!
//! The car's motor shield hangs off a 16-channel PWM expander; each logical
//! pin maps to one channel. Digital writes drive a channel fully on or off,
//! analog writes scale 0-255 onto the chip's 12-bit duty range. Writes go
//! out one channel per call, in call order.

use core::cell::RefCell;

use embedded_hal::i2c::I2c;
use embedded_hal_bus::i2c::RefCellDevice;
use pwm_pca9685::{Address as PwmAddress, Channel, Error as PwmError, Pca9685};

use super::drive::PinActuator;

/// Default I2C address of the PWM expander.
pub const PWM_ADDRESS: u8 = 0x40;

/// Full-scale duty of one channel (12 bit).
const MAX_DUTY: u16 = 4095;

/// Errors that can occur when interacting with the expander.
#[derive(Debug)]
pub enum DeviceError<E: core::fmt::Debug> {
    PwmError(PwmError<E>),
    PwmNotInitialized,
    InvalidPin(u8),
}

/// High-level driver for the PWM expander on a shared I2C bus.
pub struct ExpanderPins<'a, I2C: 'static> {
    i2c: &'a RefCell<I2C>,
    pub pwm: Option<Pca9685<RefCellDevice<'a, I2C>>>,
}

impl<'a, I2C, E> ExpanderPins<'a, I2C>
where
    I2C: I2c<Error = E> + 'static,
    E: core::fmt::Debug,
{
    /// Create a new pin manager over the given bus. No traffic is issued
    /// until `init_devices`.
    pub fn new(i2c_bus: &'a RefCell<I2C>) -> Self {
        ExpanderPins {
            i2c: i2c_bus,
            pwm: None,
        }
    }

    /// Bring up the PWM expander on the bus.
    pub fn init_devices(&mut self) -> Result<(), DeviceError<E>> {
        let pwm = Pca9685::new(RefCellDevice::new(self.i2c), PwmAddress::from(PWM_ADDRESS))
            .map_err(DeviceError::PwmError)?;
        self.pwm = Some(pwm);
        Ok(())
    }

    /// Scan the I2C bus for devices and log any found addresses.
    pub fn scan_bus(&self) {
        let mut bus = self.i2c.borrow_mut();
        for addr in 0x03..0x78 {
            if bus.write(addr, &[]).is_ok() {
                tracing::warn!("I2C device found at 0x{:02X}", addr);
            }
        }
    }

    /// Configure and enable the PWM expander (prescale to 60Hz).
    pub fn configure_pwm(&mut self) -> Result<(), DeviceError<E>> {
        if let Some(pca) = &mut self.pwm {
            pca.enable().map_err(DeviceError::PwmError)?;
            tracing::info!("PWM enabled");
            pca.set_prescale(100).map_err(DeviceError::PwmError)?;
            tracing::info!("PWM prescale set to 60Hz");
        } else {
            tracing::error!("PWM not initialized");
        }

        Ok(())
    }

    /// Enable the PWM expander outputs.
    pub fn enable(&mut self) -> Result<(), DeviceError<E>> {
        if let Some(pca) = self.pwm.as_mut() {
            pca.enable().map_err(DeviceError::PwmError)?;
        }
        Ok(())
    }

    /// Disable the PWM expander outputs.
    pub fn disable(&mut self) -> Result<(), DeviceError<E>> {
        if let Some(pca) = self.pwm.as_mut() {
            pca.disable().map_err(DeviceError::PwmError)?;
        }
        Ok(())
    }

    fn set_duty(
        &mut self,
        pin: u8,
        duty: u16,
    ) -> Result<(), DeviceError<E>> {
        let channel = channel_for(pin).ok_or(DeviceError::InvalidPin(pin))?;
        let pca = self.pwm.as_mut().ok_or(DeviceError::PwmNotInitialized)?;
        pca.set_channel_on_off(channel, 0, duty)
            .map_err(DeviceError::PwmError)
    }
}

impl<'a, I2C, E> PinActuator for ExpanderPins<'a, I2C>
where
    I2C: I2c<Error = E> + 'static,
    E: core::fmt::Debug,
{
    type Error = DeviceError<E>;

    fn digital_write(
        &mut self,
        pin: u8,
        high: bool,
    ) -> Result<(), Self::Error> {
        self.set_duty(pin, if high { MAX_DUTY } else { 0 })
    }

    fn analog_write(
        &mut self,
        pin: u8,
        value: u8,
    ) -> Result<(), Self::Error> {
        let duty = ((value as f32 / 255.0) * MAX_DUTY as f32) as u16;
        self.set_duty(pin, duty)
    }
}

fn channel_for(pin: u8) -> Option<Channel> {
    match pin {
        0 => Some(Channel::C0),
        1 => Some(Channel::C1),
        2 => Some(Channel::C2),
        3 => Some(Channel::C3),
        4 => Some(Channel::C4),
        5 => Some(Channel::C5),
        6 => Some(Channel::C6),
        7 => Some(Channel::C7),
        8 => Some(Channel::C8),
        9 => Some(Channel::C9),
        10 => Some(Channel::C10),
        11 => Some(Channel::C11),
        12 => Some(Channel::C12),
        13 => Some(Channel::C13),
        14 => Some(Channel::C14),
        15 => Some(Channel::C15),
        _ => None,
    }
}
