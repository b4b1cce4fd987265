//! A library to list and change display resolutions.
//!
//! The OS is reached through the [`DisplayService`] trait; [`platform::SystemDisplays`] implements
//! it with CoreGraphics on macOS and `winuser.h` calls on Windows.

pub mod cli;
mod display;
pub mod platform;
pub mod report;
#[cfg(test)]
mod testing;
mod types;

pub use display::*;
pub use types::*;
