//! Device abstraction layer
//!
//! Trait-based callback surfaces so the host display framework can drive
//! the encoder and compositor alone or combined:
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │           Display management framework          │
//! └───────────────────┬─────────────────────────────┘
//!                     │
//! ┌───────────────────┴─────────────────────────────┐
//! │              Device Traits                      │
//! │          (Panel, OverlayManager)                │
//! └───────────────────┬─────────────────────────────┘
//!                     │
//!         ┌───────────┼───────────┐
//!         │           │           │
//!    ┌────┴────┐ ┌────┴────┐ ┌────┴────┐
//!    │  Hdmi   │ │  TvOut  │ │  Mixer  │
//!    └─────────┘ └─────────┘ └─────────┘
//! ```

pub mod display;

pub use display::{OverlayManager, Panel};

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;

use crate::error::Result;
use crate::hdmi::{Hdmi, PowerMode};
use crate::mixer::{LayerId, Mixer, Overlay};
use crate::mode::DisplayMode;
use crate::platform::{ClockControl, HdmiBoard, MonitorInfo, MonitorInfoSource, RegisterBlock};

impl<R, I, B, D, M> Panel for Hdmi<R, I, B, D, M>
where
    R: RegisterBlock,
    I: I2c,
    B: HdmiBoard,
    D: DelayNs,
    M: MonitorInfoSource,
{
    fn is_connected(&mut self) -> bool {
        Hdmi::is_connected(self)
    }

    fn get_capabilities(&mut self) -> Result<MonitorInfo> {
        Hdmi::get_capabilities(self)
    }

    fn check_timing(&self, mode: &DisplayMode) -> Result<()> {
        Hdmi::check_timing(self, mode)
    }

    fn set_power(&mut self, mode: PowerMode) -> Result<()> {
        Hdmi::set_power(self, mode)
    }

    fn mode_fixup(&self, requested: &DisplayMode, candidates: &[DisplayMode]) -> Result<DisplayMode> {
        Hdmi::mode_fixup(self, requested, candidates)
    }

    fn mode_set(&mut self, mode: &DisplayMode) -> Result<()> {
        Hdmi::mode_set(self, mode)
    }

    fn commit(&mut self) -> Result<()> {
        Hdmi::commit(self)
    }
}

impl<R, C, D> OverlayManager for Mixer<R, C, D>
where
    R: RegisterBlock,
    C: ClockControl,
    D: DelayNs,
{
    fn layer_set(&self, zpos: Option<usize>, overlay: Option<&Overlay>) -> Result<LayerId> {
        Mixer::layer_set(self, zpos, overlay)
    }

    fn layer_commit(&self, zpos: Option<usize>) -> Result<()> {
        Mixer::layer_commit(self, zpos)
    }

    fn layer_disable(&self, zpos: Option<usize>) -> Result<()> {
        Mixer::layer_disable(self, zpos)
    }

    fn enable_vblank(&self, pipe: i32) -> Result<()> {
        Mixer::enable_vblank(self, pipe)
    }

    fn disable_vblank(&self) {
        Mixer::disable_vblank(self)
    }
}
