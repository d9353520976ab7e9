//! Tilt-to-drive control core for a phone-steered RC car on no-std embedded platforms.
#![no_std]

extern crate alloc;

pub mod utils;
