use core::cell::RefCell;

use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction as I2cTrans};
use tdc_core::utils::connection::server::{ServerTimer, WebSocket};
use tdc_core::utils::controllers::drive::{DriveWiring, PinActuator, TiltDriveMapper};
use tdc_core::utils::controllers::pins::{ExpanderPins, PWM_ADDRESS};
use tdc_core::utils::controllers::SystemController;
use tdc_core::utils::math::tilt::{TiltConfig, TiltReading};

/// Create a write transaction for the given I2C address and data payload.
pub fn write(
    addr: u8,
    data: Vec<u8>,
) -> I2cTrans {
    I2cTrans::write(addr, data)
}

/// ON_L register of a channel; a duty write transfers four bytes from there.
fn channel_reg(channel: u8) -> u8 {
    0x06 + 4 * channel
}

/// Expected payload of one `set_channel_on_off(channel, 0, duty)` call.
fn duty_write(
    channel: u8,
    duty: u16,
) -> I2cTrans {
    write(
        PWM_ADDRESS,
        vec![
            channel_reg(channel),
            0x00,
            0x00,
            (duty & 0xFF) as u8,
            (duty >> 8) as u8,
        ],
    )
}

/// MODE1 write enabling register auto-increment, issued once before the
/// first double-register transfer.
fn auto_increment() -> I2cTrans {
    write(PWM_ADDRESS, vec![0x00, 0x31])
}

#[test]
fn test_init_devices() {
    // Constructing the expander driver issues no bus traffic.
    let mock = I2cMock::new(&[]);
    let i2c_bus = RefCell::new(mock);
    let mut pins = ExpanderPins::new(&i2c_bus);
    pins.init_devices().unwrap();
    i2c_bus.borrow_mut().done();
}

#[test]
fn test_configure_pwm() {
    // Expected transactions for enabling PWM and setting prescale (includes sleep handling)
    let expectations = [
        write(PWM_ADDRESS, vec![0x00, 0x01]),
        write(PWM_ADDRESS, vec![0x00, 0x11]),
        write(PWM_ADDRESS, vec![0xFE, 100]),
        write(PWM_ADDRESS, vec![0x00, 0x01]),
    ];

    let mock = I2cMock::new(&expectations);
    let i2c_bus = RefCell::new(mock);
    let mut pins = ExpanderPins::new(&i2c_bus);
    pins.init_devices().unwrap();
    pins.configure_pwm().unwrap();
    i2c_bus.borrow_mut().done();
}

#[test]
fn test_digital_write_levels() {
    let expectations = [
        auto_increment(),
        duty_write(3, 4095),
        duty_write(3, 0),
    ];

    let mock = I2cMock::new(&expectations);
    let i2c_bus = RefCell::new(mock);
    let mut pins = ExpanderPins::new(&i2c_bus);
    pins.init_devices().unwrap();
    pins.digital_write(3, true).unwrap();
    pins.digital_write(3, false).unwrap();
    i2c_bus.borrow_mut().done();
}

#[test]
fn test_analog_write_scales_to_12_bit() {
    let expectations = [
        auto_increment(),
        duty_write(9, 4095),
        duty_write(9, 2055), // 128/255 of full scale
        duty_write(9, 0),
    ];

    let mock = I2cMock::new(&expectations);
    let i2c_bus = RefCell::new(mock);
    let mut pins = ExpanderPins::new(&i2c_bus);
    pins.init_devices().unwrap();
    pins.analog_write(9, 255).unwrap();
    pins.analog_write(9, 128).unwrap();
    pins.analog_write(9, 0).unwrap();
    i2c_bus.borrow_mut().done();
}

#[test]
fn test_enable_disable_outputs() {
    // Enable clears the sleep bit, disable sets it again.
    let expectations = [
        write(PWM_ADDRESS, vec![0x00, 0x01]),
        write(PWM_ADDRESS, vec![0x00, 0x11]),
    ];

    let mock = I2cMock::new(&expectations);
    let i2c_bus = RefCell::new(mock);
    let mut pins = ExpanderPins::new(&i2c_bus);
    pins.init_devices().unwrap();
    pins.enable().unwrap();
    pins.disable().unwrap();
    i2c_bus.borrow_mut().done();
}

/// The controller constructor brings the expander up and configures PWM.
#[test]
fn test_system_controller_configures_expander() {
    let expectations = [
        write(PWM_ADDRESS, vec![0x00, 0x01]),
        write(PWM_ADDRESS, vec![0x00, 0x11]),
        write(PWM_ADDRESS, vec![0xFE, 100]),
        write(PWM_ADDRESS, vec![0x00, 0x01]),
    ];

    let i2c_bus: &'static RefCell<I2cMock> =
        Box::leak(Box::new(RefCell::new(I2cMock::new(&expectations))));
    let ctrl = SystemController::new(i2c_bus, None, None);
    assert!(ctrl.pins.is_some());
    i2c_bus.borrow_mut().done();
}

/// Instantiating the WebSocket server types.
#[test]
fn test_websocket_types_exist() {
    let _ws = WebSocket {
        session_id: String::from("controller-1"),
    };
    let _timer: ServerTimer = ServerTimer;
}

#[test]
fn test_invalid_pin_issues_no_traffic() {
    let mock = I2cMock::new(&[]);
    let i2c_bus = RefCell::new(mock);
    let mut pins = ExpanderPins::new(&i2c_bus);
    pins.init_devices().unwrap();
    assert!(pins.digital_write(16, true).is_err());
    i2c_bus.borrow_mut().done();
}

/// A full mapper invocation over the expander, byte for byte: left turn on
/// the pin-per-direction wiring releases the right pin before the left one
/// engages, and the neutral longitudinal band releases both drive pins.
#[test]
fn test_mapper_transaction_order() {
    let expectations = [
        auto_increment(),
        duty_write(11, 0),    // right released first
        duty_write(10, 4095), // then left engages
        duty_write(9, 0),     // reverse released
        duty_write(8, 0),     // forward released
    ];

    let mock = I2cMock::new(&expectations);
    let i2c_bus = RefCell::new(mock);
    let mut pins = ExpanderPins::new(&i2c_bus);
    pins.init_devices().unwrap();

    let wiring = DriveWiring::PinPerDirection {
        forward: 8,
        reverse: 9,
        left: 10,
        right: 11,
    };
    let mut mapper = TiltDriveMapper::new(wiring, TiltConfig::default());
    mapper
        .apply(TiltReading { lr: -0.6, fb: -0.2 }, &mut pins)
        .unwrap();
    i2c_bus.borrow_mut().done();
}
