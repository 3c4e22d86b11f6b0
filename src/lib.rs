//! Daikin IR remote emulation: climate state in, 38 kHz pulse trains out, and back again.

pub mod broadlink;
pub mod config;
pub mod daikin;
pub mod modem;
pub mod pwm;
pub mod smartir;
