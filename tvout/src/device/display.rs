//! Display device callbacks
//!
//! The two halves of a TV output as seen by the display-management
//! framework:
//! - Panel: connector and encoder (connection, timing, power, commit)
//! - Overlay manager: compositor layers and vblank notification

use crate::error::Result;
use crate::hdmi::PowerMode;
use crate::mixer::{LayerId, Overlay};
use crate::mode::DisplayMode;
use crate::platform::MonitorInfo;

/// Connector and encoder callbacks.
///
/// Implemented by the HDMI encoder and by the combined driver.
pub trait Panel {
    /// Is a sink attached?
    fn is_connected(&mut self) -> bool;

    /// Sink capabilities; `NotFound` when the monitor cannot be read
    fn get_capabilities(&mut self) -> Result<MonitorInfo>;

    /// Accept or reject a mode without touching hardware
    fn check_timing(&self, mode: &DisplayMode) -> Result<()>;

    fn set_power(&mut self, mode: PowerMode) -> Result<()>;

    /// The requested mode when supported, otherwise the first supported
    /// candidate
    fn mode_fixup(&self, requested: &DisplayMode, candidates: &[DisplayMode]) -> Result<DisplayMode>;

    /// Latch a mode for the next commit
    fn mode_set(&mut self, mode: &DisplayMode) -> Result<()>;

    /// Program the latched mode
    fn commit(&mut self) -> Result<()>;
}

/// Compositor callbacks.
///
/// Layers are addressed by z-position; `None` picks the default layer.
pub trait OverlayManager {
    fn layer_set(&self, zpos: Option<usize>, overlay: Option<&Overlay>) -> Result<LayerId>;

    fn layer_commit(&self, zpos: Option<usize>) -> Result<()>;

    fn layer_disable(&self, zpos: Option<usize>) -> Result<()>;

    fn enable_vblank(&self, pipe: i32) -> Result<()>;

    fn disable_vblank(&self);
}
