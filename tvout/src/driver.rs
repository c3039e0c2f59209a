//! Combined TV output driver.
//!
//! Pairs one HDMI encoder with the mixer feeding it and orders their
//! sequences:
//!
//! ```text
//! mode_set → commit ─┬─ power on (encoder, then mixer) if needed
//!                    ├─ encoder: PHY, timing, infoframes, enable
//!                    └─ mixer: re-apply enabled layers
//! ```
//!
//! The encoder is brought up before the mixer and taken down after it, so
//! layers are only ever programmed against a running timing generator.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use log::{debug, info};

use crate::config::HardwareGeneration;
use crate::device::{OverlayManager, Panel};
use crate::error::{Error, Result};
use crate::hdmi::{AudioPort, Hdmi, HotplugIrq, HotplugListener, PowerMode};
use crate::mixer::{LayerId, Mixer, Overlay, VsyncOutcome};
use crate::mode::DisplayMode;
use crate::platform::{ClockControl, HdmiBoard, MonitorInfo, MonitorInfoSource, RegisterBlock};

/// HDMI encoder plus mixer of one output pipe
pub struct TvOut<R, I, B, D, M, C, V> {
    hdmi: Hdmi<R, I, B, D, M>,
    mixer: Mixer<R, C, V>,
    audio: Option<AudioPort<R>>,
}

impl<R, I, B, D, M, C, V> TvOut<R, I, B, D, M, C, V>
where
    R: RegisterBlock,
    I: I2c,
    B: HdmiBoard,
    D: DelayNs,
    M: MonitorInfoSource,
    C: ClockControl,
    V: DelayNs,
{
    /// Both halves must be of the same hardware generation.
    pub fn new(hdmi: Hdmi<R, I, B, D, M>, mixer: Mixer<R, C, V>) -> Result<Self> {
        if hdmi.generation() != mixer.generation() {
            return Err(Error::InvalidArgument);
        }
        info!("tvout: {:?} pipeline", hdmi.generation());
        Ok(Self {
            hdmi,
            mixer,
            audio: None,
        })
    }

    pub fn generation(&self) -> HardwareGeneration {
        self.hdmi.generation()
    }

    pub fn hdmi(&self) -> &Hdmi<R, I, B, D, M> {
        &self.hdmi
    }

    pub fn mixer(&self) -> &Mixer<R, C, V> {
        &self.mixer
    }

    /// Audio handle while powered on generations with the legacy audio path
    pub fn audio(&self) -> Option<&AudioPort<R>> {
        self.audio.as_ref()
    }

    pub fn is_powered(&self) -> bool {
        self.hdmi.is_powered()
    }

    /// Bring up the encoder, then the mixer. A failed encoder apply leaves
    /// the encoder powered, so the mixer and audio handle still follow it
    /// and a later commit only has to retry the timing.
    fn power_on(&mut self) -> Result<()> {
        let encoder = if self.hdmi.is_powered() {
            Ok(())
        } else {
            self.hdmi.power_on().map(|port| self.audio = port)
        };
        if self.hdmi.is_powered() {
            if self.audio.is_none() {
                self.audio = self.hdmi.audio_port();
            }
            self.mixer.power_on();
        }
        encoder
    }

    fn power_off(&mut self) {
        self.mixer.power_off();
        self.audio = None;
        self.hdmi.power_off();
    }

    // =========================================================================
    // Interrupts
    // =========================================================================

    /// Mixer interrupt entry point
    pub fn handle_vsync(&self) -> VsyncOutcome {
        self.mixer.handle_irq()
    }

    /// Handle for the hotplug interrupt handlers
    pub fn hotplug_irq(&self) -> HotplugIrq<R> {
        self.hdmi.hotplug_irq()
    }

    /// Deliver queued hotplug events to `listener`
    pub fn dispatch_hotplug<L: HotplugListener>(&self, listener: &mut L) -> usize {
        self.hdmi.dispatch_hotplug(listener)
    }

    pub fn wait_for_vsync(&self) -> Result<()> {
        self.mixer.wait_for_vsync()
    }
}

impl<R, I, B, D, M, C, V> Panel for TvOut<R, I, B, D, M, C, V>
where
    R: RegisterBlock,
    I: I2c,
    B: HdmiBoard,
    D: DelayNs,
    M: MonitorInfoSource,
    C: ClockControl,
    V: DelayNs,
{
    fn is_connected(&mut self) -> bool {
        self.hdmi.is_connected()
    }

    fn get_capabilities(&mut self) -> Result<MonitorInfo> {
        self.hdmi.get_capabilities()
    }

    fn check_timing(&self, mode: &DisplayMode) -> Result<()> {
        self.hdmi.check_timing(mode)
    }

    fn set_power(&mut self, mode: PowerMode) -> Result<()> {
        debug!("tvout: power {:?}", mode);
        match mode {
            PowerMode::On => {
                self.power_on()?;
                self.hdmi.enable_video();
            }
            PowerMode::Standby => self.hdmi.disable_video(),
            PowerMode::Off => self.power_off(),
        }
        Ok(())
    }

    fn mode_fixup(&self, requested: &DisplayMode, candidates: &[DisplayMode]) -> Result<DisplayMode> {
        self.hdmi.mode_fixup(requested, candidates)
    }

    fn mode_set(&mut self, mode: &DisplayMode) -> Result<()> {
        self.hdmi.mode_set(mode)
    }

    /// Power up if needed, then program timing before layers.
    fn commit(&mut self) -> Result<()> {
        let was_powered = self.hdmi.is_powered();
        self.power_on()?;
        if !was_powered && self.hdmi.is_enabled() {
            // Power-on applied the latched mode and re-applied layers
            return Ok(());
        }
        self.hdmi.commit()?;
        self.mixer.apply();
        Ok(())
    }
}

impl<R, I, B, D, M, C, V> OverlayManager for TvOut<R, I, B, D, M, C, V>
where
    R: RegisterBlock,
    I: I2c,
    B: HdmiBoard,
    D: DelayNs,
    M: MonitorInfoSource,
    C: ClockControl,
    V: DelayNs,
{
    fn layer_set(&self, zpos: Option<usize>, overlay: Option<&Overlay>) -> Result<LayerId> {
        self.mixer.layer_set(zpos, overlay)
    }

    fn layer_commit(&self, zpos: Option<usize>) -> Result<()> {
        self.mixer.layer_commit(zpos)
    }

    fn layer_disable(&self, zpos: Option<usize>) -> Result<()> {
        self.mixer.layer_disable(zpos)
    }

    fn enable_vblank(&self, pipe: i32) -> Result<()> {
        self.mixer.enable_vblank(pipe)
    }

    fn disable_vblank(&self) {
        self.mixer.disable_vblank()
    }
}
