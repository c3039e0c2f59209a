//! HDMI TV output: encoder timing and power sequencing plus the mixer that
//! composites layers into it.
//!
//! # Pipeline
//! ```text
//! DisplayMode → layout::translate → RegisterLayout ─┐
//!                                                   ├→ Hdmi (PHY, timing, infoframes)
//! Overlay → Mixer layers (vsync-gated commits) ─────┘
//! ```
//!
//! Two hardware generations are supported; see [`HardwareGeneration`].
//! Everything the driver needs from the board comes in through the traits
//! in [`platform`] and `embedded-hal`.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod config;
pub mod device;
pub mod driver;
pub mod error;
pub mod hdmi;
pub mod lock;
pub mod mixer;
pub mod mode;
pub mod platform;
pub mod utils;
pub mod waitqueue;

#[cfg(test)]
mod testing;

pub use config::{HardwareGeneration, HdmiConfig, MixerConfig};
pub use driver::TvOut;
pub use error::{Error, Result};
pub use lock::Spinlock;
