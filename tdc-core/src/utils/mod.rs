//! Utility re-exports and helper macros for the tilt-drive car.
//!
//! This module re-exports the core components, timing, tilt math, and
//! connection handling:
//!
//! - `connection`: WebSocket server, session handling, and the link state
//!   machine
//! - `controllers`: the tilt-to-drive mapper, the PWM-expander pin sink, and
//!   the remote LED
//! - `math`: pure tilt-classification arithmetic
//!
//! The `mk_static!` macro simplifies static initialization in no-std contexts.

pub mod connection;
pub mod controllers;
pub mod math;

pub use connection::server::run as wss;
pub use controllers::drive::TiltDriveMapper;
pub use controllers::SystemController;
pub use embassy_time::*;

#[macro_export]
/// Initialize a no-std static cell and write the given value into it.
///
/// This macro creates a `static_cell::StaticCell` for type `$t` and initializes
/// it with `$val`, returning a mutable reference to the stored value.
macro_rules! mk_static {
    ($t:ty, $val:expr) => {{
        static STATIC_CELL: static_cell::StaticCell<$t> = static_cell::StaticCell::new();
        STATIC_CELL.uninit().write($val)
    }};
}
