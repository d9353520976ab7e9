//! Pure math helpers.

pub mod tilt;
