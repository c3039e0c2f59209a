//! Mixer: blends two graphics layers and the video layer into the HDMI
//! output.
//!
//! # Locking
//!
//! Every register sequence runs under the state lock with vsync gating
//! off, so the interrupt handler (which takes the same lock) never sees a
//! half-programmed layer. Gating is re-enabled before the lock is
//! released, except across the video processor reset wait, where no layer
//! is enabled. Reset and layer commits come from the same control path and
//! are not run concurrently.
//!
//! The delay provider is locked for one sleep at a time, never across a
//! whole wait.
//!
//! # Update throttling
//!
//! Gen2 counts outstanding layer updates in hardware. A graphics commit
//! issues at most one update trigger per vsync; the interrupt handler
//! re-arms the trigger once the count drains.

pub mod layer;
pub mod regs;
pub mod vp;

use core::sync::atomic::{AtomicBool, Ordering};

use embedded_hal::delay::DelayNs;
use log::{debug, warn};

pub use layer::{LayerId, Overlay, PixelFormat, WindowLayer, LAYER_COUNT};

use self::regs::*;
use crate::config::{HardwareGeneration, MixerConfig};
use crate::error::{Error, Result, TimeoutSource};
use crate::lock::Spinlock;
use crate::mode::ScanClass;
use crate::platform::{Clock, ClockControl, RegisterBlock};
use crate::waitqueue::WaitQueue;

/// Budget of a blocking vsync wait
pub const VSYNC_TIMEOUT_MS: u32 = 1000;

/// Gen2 destination shift for 1440x900 output
const WIDE_900_LAYER_OFFSET: u32 = 224;

/// Delay provider shared between callers. The lock is held for one sleep
/// at a time, so a long wait never starves another caller.
struct SharedDelay<'a, D>(&'a Spinlock<D>);

impl<D: DelayNs> DelayNs for SharedDelay<'_, D> {
    fn delay_ns(&mut self, ns: u32) {
        self.0.lock().delay_ns(ns);
    }

    fn delay_us(&mut self, us: u32) {
        self.0.lock().delay_us(us);
    }

    fn delay_ms(&mut self, ms: u32) {
        self.0.lock().delay_ms(ms);
    }
}

/// Register windows of one mixer instance
pub enum MixerRegs<R> {
    /// Mixer plus its video processor
    Gen1 { mixer: R, vp: R },
    Gen2 { mixer: R },
}

impl<R> MixerRegs<R> {
    fn generation(&self) -> HardwareGeneration {
        match self {
            MixerRegs::Gen1 { .. } => HardwareGeneration::Gen1,
            MixerRegs::Gen2 { .. } => HardwareGeneration::Gen2,
        }
    }
}

/// What a vsync interrupt amounted to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VsyncOutcome {
    /// Not a vsync interrupt
    Idle,
    /// Interlaced base addresses not latched yet; try again next vsync
    Deferred,
    /// Vblank on the pipe, layer updates still in flight
    Vblank,
    /// Vblank and every pending layer update has landed
    FlipComplete,
}

/// Register snapshot of one graphics layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayerRegisters {
    pub cfg: u32,
    pub base: u32,
    pub span: u32,
    pub wh: u32,
    pub sxy: u32,
    pub dxy: u32,
}

struct MixerState<R> {
    regs: MixerRegs<R>,
    layers: [WindowLayer; LAYER_COUNT],
    enabled: [bool; LAYER_COUNT],
    interlace: bool,
    pipe: Option<u32>,
    previous_dxy: u32,
}

impl<R: RegisterBlock> MixerState<R> {
    fn mixer(&self) -> &R {
        match &self.regs {
            MixerRegs::Gen1 { mixer, .. } | MixerRegs::Gen2 { mixer } => mixer,
        }
    }

    fn vsync_set_update(&self, enable: bool) {
        self.mixer().write_mask(
            MXR_STATUS,
            if enable { MXR_STATUS_SYNC_ENABLE } else { 0 },
            MXR_STATUS_SYNC_ENABLE,
        );
        if let MixerRegs::Gen1 { vp, .. } = &self.regs {
            vp.write(VP_SHADOW_UPDATE, if enable { VP_SHADOW_UPDATE_ENABLE } else { 0 });
        }
    }

    fn cfg_scan(&self, width: u32, height: u32) {
        let mut val = if self.interlace {
            MXR_CFG_SCAN_INTERLACE
        } else {
            MXR_CFG_SCAN_PROGRESSIVE
        };
        val |= match ScanClass::classify(width, height) {
            Some(ScanClass::SdNtsc) => MXR_CFG_SCAN_NTSC | MXR_CFG_SCAN_SD,
            Some(ScanClass::SdPal) => MXR_CFG_SCAN_PAL | MXR_CFG_SCAN_SD,
            Some(ScanClass::Hd720) => MXR_CFG_SCAN_HD_720 | MXR_CFG_SCAN_HD,
            Some(ScanClass::Hd1080) => MXR_CFG_SCAN_HD_1080 | MXR_CFG_SCAN_HD,
            None => {
                warn!("mixer: invalid scan configuration {}x{}", width, height);
                return;
            }
        };
        self.mixer().write_mask(MXR_CFG, val, MXR_CFG_SCAN_MASK);
    }

    fn cfg_rgb_fmt(&self, height: u32) {
        let regs = self.mixer();
        let val = match height {
            480 | 576 => MXR_CFG_RGB601_0_255,
            _ => {
                regs.write(MXR_CM_COEFF_Y, CM_COEFF_Y);
                regs.write(MXR_CM_COEFF_CB, CM_COEFF_CB);
                regs.write(MXR_CM_COEFF_CR, CM_COEFF_CR);
                MXR_CFG_RGB709_16_235
            }
        };
        regs.write_mask(MXR_CFG, val, MXR_CFG_RGB_FMT_MASK);
    }

    fn cfg_layer(&self, layer: LayerId, enable: bool) {
        let val = if enable { !0 } else { 0 };
        let regs = self.mixer();
        match layer {
            LayerId::Graphics0 => regs.write_mask(MXR_CFG, val, MXR_CFG_GRP0_ENABLE),
            LayerId::Graphics1 => regs.write_mask(MXR_CFG, val, MXR_CFG_GRP1_ENABLE),
            LayerId::VideoScaler => {
                if let MixerRegs::Gen1 { vp, .. } = &self.regs {
                    vp.write_mask(VP_ENABLE, val, VP_ENABLE_ON);
                }
                regs.write_mask(MXR_CFG, val, MXR_CFG_VP_ENABLE);
            }
        }
    }

    /// Shift both graphics layers right to cover the 1440x900 field
    /// counter limitation.
    fn set_layer_offset(&mut self, offset: u32) {
        let regs = self.mixer();
        let mut current_dxy = regs.read(MXR_GRAPHIC1_DXY);
        if self.previous_dxy != current_dxy {
            current_dxy = current_dxy.wrapping_add(grp_xy(offset, 0));
            regs.write(MXR_GRAPHIC1_DXY, current_dxy);
            self.previous_dxy = current_dxy;
        }
        self.mixer().write(MXR_GRAPHIC0_DXY, grp_xy(offset, 0));
    }

    fn layer_update_count(&self) -> u32 {
        match self.regs {
            MixerRegs::Gen1 { .. } => 0,
            MixerRegs::Gen2 { .. } => {
                (self.mixer().read(MXR_CFG) & MXR_CFG_LAYER_UPDATE_COUNT_MASK)
                    >> MXR_CFG_LAYER_UPDATE_COUNT_SHIFT
            }
        }
    }

    fn layer_update(&self) {
        if let MixerRegs::Gen2 { mixer } = &self.regs {
            mixer.write_mask(MXR_CFG, !0, MXR_CFG_LAYER_UPDATE);
        }
    }

    fn run(&self) {
        self.mixer().write_mask(MXR_STATUS, !0, MXR_STATUS_REG_RUN);
        self.regs_dump();
    }

    fn regs_dump(&self) {
        let regs = self.mixer();
        let dump: [(&str, usize); 18] = [
            ("MXR_STATUS", MXR_STATUS),
            ("MXR_CFG", MXR_CFG),
            ("MXR_INT_EN", MXR_INT_EN),
            ("MXR_INT_STATUS", MXR_INT_STATUS),
            ("MXR_LAYER_CFG", MXR_LAYER_CFG),
            ("MXR_VIDEO_CFG", MXR_VIDEO_CFG),
            ("MXR_GRAPHIC0_CFG", MXR_GRAPHIC0_CFG),
            ("MXR_GRAPHIC0_BASE", MXR_GRAPHIC0_BASE),
            ("MXR_GRAPHIC0_SPAN", MXR_GRAPHIC0_SPAN),
            ("MXR_GRAPHIC0_WH", MXR_GRAPHIC0_WH),
            ("MXR_GRAPHIC0_SXY", MXR_GRAPHIC0_SXY),
            ("MXR_GRAPHIC0_DXY", MXR_GRAPHIC0_DXY),
            ("MXR_GRAPHIC1_CFG", MXR_GRAPHIC1_CFG),
            ("MXR_GRAPHIC1_BASE", MXR_GRAPHIC1_BASE),
            ("MXR_GRAPHIC1_SPAN", MXR_GRAPHIC1_SPAN),
            ("MXR_GRAPHIC1_WH", MXR_GRAPHIC1_WH),
            ("MXR_GRAPHIC1_SXY", MXR_GRAPHIC1_SXY),
            ("MXR_GRAPHIC1_DXY", MXR_GRAPHIC1_DXY),
        ];
        for (name, offset) in dump {
            debug!("mixer: {} = {:#010x}", name, regs.read(offset));
        }
    }

    /// Interlaced Gen1 output latches base addresses one field late.
    fn shadow_pending(&self) -> bool {
        if !self.interlace || !matches!(self.regs, MixerRegs::Gen1 { .. }) {
            return false;
        }
        let regs = self.mixer();
        (0..2).any(|i| regs.read(graphic_base(i)) != regs.read(graphic_base_shadow(i)))
    }
}

/// Mixer driver
pub struct Mixer<R, C, D> {
    config: MixerConfig,
    state: Spinlock<MixerState<R>>,
    clocks: Spinlock<C>,
    delay: Spinlock<D>,
    powered: AtomicBool,
    vsync_pending: AtomicBool,
    vsync_queue: WaitQueue,
}

impl<R, C, D> Mixer<R, C, D>
where
    R: RegisterBlock,
    C: ClockControl,
    D: DelayNs,
{
    /// Create a powered-off mixer. The register windows must match the
    /// configured generation.
    pub fn new(config: MixerConfig, regs: MixerRegs<R>, clocks: C, delay: D) -> Result<Self> {
        if regs.generation() != config.generation {
            return Err(Error::InvalidArgument);
        }
        Ok(Self {
            config,
            state: Spinlock::new(MixerState {
                regs,
                layers: [WindowLayer::default(); LAYER_COUNT],
                enabled: [false; LAYER_COUNT],
                interlace: false,
                pipe: None,
                previous_dxy: 0,
            }),
            clocks: Spinlock::new(clocks),
            delay: Spinlock::new(delay),
            powered: AtomicBool::new(false),
            vsync_pending: AtomicBool::new(false),
            vsync_queue: WaitQueue::new(),
        })
    }

    pub fn generation(&self) -> HardwareGeneration {
        self.config.generation
    }

    pub fn is_powered(&self) -> bool {
        self.powered.load(Ordering::Acquire)
    }

    pub fn is_interlaced(&self) -> bool {
        self.state.lock().interlace
    }

    pub fn pipe(&self) -> Option<u32> {
        self.state.lock().pipe
    }

    pub fn is_layer_enabled(&self, layer: LayerId) -> bool {
        self.state.lock().enabled[layer.index()]
    }

    /// Latched window state of `layer`
    pub fn window(&self, layer: LayerId) -> WindowLayer {
        self.state.lock().layers[layer.index()]
    }

    /// `None` selects the default layer
    fn resolve(&self, zpos: Option<usize>) -> Result<LayerId> {
        match zpos {
            None => Ok(self.config.default_layer),
            Some(index) => LayerId::from_index(index).map_err(|e| {
                warn!("mixer: overlay plane {} is wrong", index);
                e
            }),
        }
    }

    // =========================================================================
    // Layers
    // =========================================================================

    /// Latch an overlay description for a layer. Touches no hardware.
    pub fn layer_set(&self, zpos: Option<usize>, overlay: Option<&Overlay>) -> Result<LayerId> {
        let overlay = overlay.ok_or_else(|| {
            warn!("mixer: overlay is missing");
            Error::InvalidArgument
        })?;
        let layer = self.resolve(zpos)?;
        debug!(
            "mixer: set {}x{} at ({},{}) to {}x{} at ({},{}) on {:?}",
            overlay.source.size.width,
            overlay.source.size.height,
            overlay.source.top_left.x,
            overlay.source.top_left.y,
            overlay.destination.size.width,
            overlay.destination.size.height,
            overlay.destination.top_left.x,
            overlay.destination.top_left.y,
            layer
        );

        let mut state = self.state.lock();
        let slot = &mut state.layers[layer.index()];
        *slot = slot.from_overlay(overlay)?;
        Ok(layer)
    }

    /// Program a layer from its latched description. Does nothing while
    /// powered off.
    pub fn layer_commit(&self, zpos: Option<usize>) -> Result<()> {
        let layer = self.resolve(zpos)?;
        debug!("mixer: commit {:?}", layer);
        if !self.is_powered() {
            debug!("mixer: not powered on");
            return Ok(());
        }
        self.commit_layer(layer)
    }

    fn commit_layer(&self, layer: LayerId) -> Result<()> {
        match (layer, self.config.generation) {
            (LayerId::VideoScaler, HardwareGeneration::Gen1) => self.video_buffer(),
            (LayerId::VideoScaler, HardwareGeneration::Gen2) => Err(Error::Unsupported),
            (layer, _) => {
                self.graph_buffer(layer);
                Ok(())
            }
        }
    }

    fn graph_buffer(&self, layer: LayerId) {
        let win = layer.index();
        let mut state = self.state.lock();
        let data = state.layers[win];

        let fmt = match data.bpp {
            16 => GRP_FMT_ARGB4444,
            _ => GRP_FMT_ARGB8888,
        };
        let base = data.graphics_base();
        state.interlace = data.interlaced;

        state.vsync_set_update(false);
        state.enabled[win] = true;

        let regs = state.mixer();
        regs.write_mask(graphic_cfg(win), grp_cfg_format(fmt), MXR_GRP_CFG_FORMAT_MASK);
        regs.write(graphic_span(win), data.fb_width);
        // No scaling on graphics layers
        regs.write(graphic_wh(win), grp_wh(data.crtc_width, data.crtc_height, 0, 0));
        // Source offset is folded into the base address
        regs.write(graphic_sxy(win), grp_xy(0, 0));
        regs.write(graphic_dxy(win), grp_xy(data.crtc_x, data.crtc_y));
        regs.write(graphic_base(win), base);

        state.cfg_scan(data.mode_width, data.mode_height);
        if self.config.generation == HardwareGeneration::Gen2
            && data.mode_width == 1440
            && data.mode_height == 900
        {
            state.set_layer_offset(WIDE_900_LAYER_OFFSET);
        }
        state.cfg_rgb_fmt(data.mode_height);
        state.cfg_layer(layer, true);
        state.cfg_layer(self.config.default_layer, true);

        // One update trigger per vsync
        if !state.layers[win].updated && state.layer_update_count() == 0 {
            state.layer_update();
        }
        state.layers[win].updated = true;
        state.run();

        state.vsync_set_update(true);
    }

    fn video_buffer(&self) -> Result<()> {
        let win = LayerId::VideoScaler.index();
        let mut state = self.state.lock();
        let data = state.layers[win];
        let buffers = vp::video_buffers(&data).map_err(|e| {
            warn!("mixer: pixel format for vp is wrong {:?}", data.format);
            e
        })?;
        state.interlace = data.interlaced;

        state.vsync_set_update(false);
        state.enabled[win] = true;

        if let MixerRegs::Gen1 { vp: processor, .. } = &state.regs {
            vp::program(processor, &data, &buffers);
        }
        state.cfg_scan(data.mode_width, data.mode_height);
        state.cfg_rgb_fmt(data.mode_height);
        state.cfg_layer(LayerId::VideoScaler, true);
        state.run();

        state.vsync_set_update(true);
        if let MixerRegs::Gen1 { vp: processor, .. } = &state.regs {
            vp::regs_dump(processor);
        }
        Ok(())
    }

    /// Turn a layer off at the next vsync. A vsync timeout is logged and the
    /// layer is disabled anyway.
    pub fn layer_disable(&self, zpos: Option<usize>) -> Result<()> {
        let layer = self.resolve(zpos)?;
        debug!("mixer: disable {:?}", layer);
        if !self.is_powered() {
            return Ok(());
        }

        if let Err(e) = self.wait_for_vsync() {
            warn!("mixer: disabling {:?} without vsync: {}", layer, e);
        }

        let mut state = self.state.lock();
        state.vsync_set_update(false);
        state.enabled[layer.index()] = false;
        state.cfg_layer(layer, false);
        state.vsync_set_update(true);
        Ok(())
    }

    /// Re-program every enabled layer
    pub fn apply(&self) {
        for layer in LayerId::ALL {
            if !self.is_layer_enabled(layer) {
                continue;
            }
            if let Err(e) = self.layer_commit(Some(layer.index())) {
                warn!("mixer: re-apply {:?} failed: {}", layer, e);
            }
        }
    }

    /// Atomic view of a graphics layer's registers
    pub fn layer_registers(&self, layer: LayerId) -> Result<LayerRegisters> {
        if !layer.is_graphics() {
            return Err(Error::InvalidArgument);
        }
        let win = layer.index();
        let state = self.state.lock();
        let regs = state.mixer();
        Ok(LayerRegisters {
            cfg: regs.read(graphic_cfg(win)),
            base: regs.read(graphic_base(win)),
            span: regs.read(graphic_span(win)),
            wh: regs.read(graphic_wh(win)),
            sxy: regs.read(graphic_sxy(win)),
            dxy: regs.read(graphic_dxy(win)),
        })
    }

    // =========================================================================
    // Vsync
    // =========================================================================

    pub fn enable_vblank(&self, pipe: i32) -> Result<()> {
        debug!("mixer: enable vblank on pipe {}", pipe);
        let pipe = u32::try_from(pipe).map_err(|_| Error::InvalidArgument)?;
        if !self.is_powered() {
            return Err(Error::NotPowered);
        }
        let mut state = self.state.lock();
        state.pipe = Some(pipe);
        state.mixer().write_mask(MXR_INT_EN, MXR_INT_EN_VSYNC, MXR_INT_EN_VSYNC);
        Ok(())
    }

    pub fn disable_vblank(&self) {
        if !self.is_powered() {
            return;
        }
        let state = self.state.lock();
        debug!("mixer: disable vblank on pipe {:?}", state.pipe);
        state.mixer().write_mask(MXR_INT_EN, 0, MXR_INT_EN_VSYNC);
    }

    /// Block until the next completed flip, for at most one second.
    pub fn wait_for_vsync(&self) -> Result<()> {
        self.vsync_queue.arm();
        self.vsync_pending.store(true, Ordering::Release);

        let woken = self.vsync_queue.wait(VSYNC_TIMEOUT_MS, &mut SharedDelay(&self.delay));
        if woken {
            Ok(())
        } else {
            self.vsync_pending.store(false, Ordering::Release);
            Err(Error::Timeout(TimeoutSource::Vsync))
        }
    }

    /// Interrupt entry point. Always acknowledges the vsync status.
    pub fn handle_irq(&self) -> VsyncOutcome {
        let mut state = self.state.lock();
        if !self.is_powered() {
            warn!("mixer: interrupt while powered off");
        }

        let status = state.mixer().read(MXR_INT_STATUS);
        let outcome = if status & MXR_INT_STATUS_VSYNC == 0 {
            VsyncOutcome::Idle
        } else if state.shadow_pending() {
            VsyncOutcome::Deferred
        } else if state.layer_update_count() != 0 {
            VsyncOutcome::Vblank
        } else {
            for layer in state.layers.iter_mut() {
                layer.updated = false;
            }
            if self.vsync_pending.swap(false, Ordering::AcqRel) {
                debug!("mixer: vsync waiter woken");
                self.vsync_queue.wake_all();
            }
            VsyncOutcome::FlipComplete
        };

        // Vsync is cleared through a different bit than it is reported on
        state.mixer().write(MXR_INT_STATUS, status | MXR_INT_CLEAR_VSYNC);
        outcome
    }

    // =========================================================================
    // Power
    // =========================================================================

    /// Reset to the default blending setup with every layer disabled.
    ///
    /// Vsync gating stays off for the whole reset. The state lock is
    /// dropped while the video processor comes out of reset so the
    /// interrupt handler can keep acknowledging vsync.
    pub fn reset(&self) {
        debug!("mixer: reset");
        let vp_reset_started = self.reset_mixer();

        if vp_reset_started {
            let idle = || match &self.state.lock().regs {
                MixerRegs::Gen1 { vp: processor, .. } => vp::reset_idle(processor),
                MixerRegs::Gen2 { .. } => true,
            };
            if let Err(e) = vp::wait_reset(&mut SharedDelay(&self.delay), idle) {
                warn!("mixer: {}", e);
                if let MixerRegs::Gen1 { vp: processor, .. } = &self.state.lock().regs {
                    vp::regs_dump(processor);
                }
            }
        }

        let state = self.state.lock();
        let regs = state.mixer();
        if let MixerRegs::Gen1 { vp: processor, .. } = &state.regs {
            vp::default_filter(processor);
        }

        regs.write_mask(MXR_CFG, 0, MXR_CFG_GRP0_ENABLE);
        regs.write_mask(MXR_CFG, 0, MXR_CFG_GRP1_ENABLE);
        regs.write_mask(MXR_CFG, 0, MXR_CFG_VP_ENABLE);

        state.vsync_set_update(true);
    }

    /// Default mixer setup with gating off. Returns whether a video
    /// processor reset was started.
    fn reset_mixer(&self) -> bool {
        let state = self.state.lock();
        let regs = state.mixer();

        regs.write_mask(MXR_STATUS, !0, MXR_STATUS_SOFT_RESET);
        state.vsync_set_update(false);

        regs.write_mask(MXR_CFG, MXR_CFG_DST_HDMI, MXR_CFG_DST_MASK);
        regs.write_mask(MXR_CFG, MXR_CFG_OUT_RGB888, MXR_CFG_OUT_MASK);
        regs.write_mask(MXR_STATUS, MXR_STATUS_16_BURST, MXR_STATUS_BURST_MASK);

        // OSD above framebuffer above video
        regs.write(MXR_LAYER_CFG, layer_cfg(3, 2, 1));

        regs.write(MXR_BG_COLOR0, MXR_BG_COLOR_DEFAULT);
        regs.write(MXR_BG_COLOR1, MXR_BG_COLOR_DEFAULT);
        regs.write(MXR_BG_COLOR2, MXR_BG_COLOR_DEFAULT);

        let mut val = MXR_GRP_CFG_COLOR_KEY_DISABLE | MXR_GRP_CFG_WIN_BLEND_EN | grp_cfg_alpha(0xff);
        regs.write(graphic_cfg(0), val);
        val |= MXR_GRP_CFG_BLEND_PRE_MUL | MXR_GRP_CFG_PIXEL_BLEND_EN;
        regs.write(graphic_cfg(1), val);

        match &state.regs {
            MixerRegs::Gen1 { vp: processor, .. } => {
                vp::start_reset(processor);
                true
            }
            MixerRegs::Gen2 { .. } => false,
        }
    }

    fn gated_clocks(&self) -> &'static [Clock] {
        match self.config.generation {
            HardwareGeneration::Gen1 => &[Clock::Mixer, Clock::VideoProcessor, Clock::SclkMixer],
            HardwareGeneration::Gen2 => &[Clock::Mixer],
        }
    }

    /// Clock up, reset and restore vblank and layers. No-op when on.
    pub fn power_on(&self) {
        debug!("mixer: power on, powered {}", self.is_powered());
        if self.is_powered() {
            return;
        }
        {
            let mut clocks = self.clocks.lock();
            for clock in self.gated_clocks() {
                clocks.enable(*clock);
            }
        }
        self.powered.store(true, Ordering::Release);

        self.reset();
        let pipe = self.pipe();
        if let Some(pipe) = pipe {
            // Recorded pipes always fit
            let _ = self.enable_vblank(pipe as i32);
        }
        self.apply();
    }

    /// Gate the clocks and reset. No-op when off.
    pub fn power_off(&self) {
        debug!("mixer: power off, powered {}", self.is_powered());
        if !self.is_powered() {
            return;
        }
        {
            let mut clocks = self.clocks.lock();
            for clock in self.gated_clocks() {
                clocks.disable(*clock);
            }
        }
        self.reset();
        self.powered.store(false, Ordering::Release);
    }

    pub fn regs_dump(&self) {
        let state = self.state.lock();
        state.regs_dump();
        if let MixerRegs::Gen1 { vp: processor, .. } = &state.regs {
            vp::regs_dump(processor);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;
    use std::time::{Duration, Instant};

    use embedded_graphics::geometry::{Point, Size};
    use embedded_graphics::primitives::Rectangle;

    use super::*;
    use crate::testing::{ClockOp, FakeRegs, NoDelay, SharedClocks, SleepDelay};

    type TestMixer<D> = Mixer<FakeRegs, SharedClocks, D>;

    struct Rig<D> {
        mixer: TestMixer<D>,
        regs: FakeRegs,
        vp: FakeRegs,
        clocks: SharedClocks,
    }

    fn rig_with<D: DelayNs>(generation: HardwareGeneration, delay: D) -> Rig<D> {
        let regs = FakeRegs::new();
        let vp = FakeRegs::new();
        let clocks = SharedClocks::new();
        let windows = match generation {
            HardwareGeneration::Gen1 => MixerRegs::Gen1 {
                mixer: regs.clone(),
                vp: vp.clone(),
            },
            HardwareGeneration::Gen2 => MixerRegs::Gen2 { mixer: regs.clone() },
        };
        let mixer = Mixer::new(MixerConfig::new(generation), windows, clocks.clone(), delay).unwrap();
        Rig {
            mixer,
            regs,
            vp,
            clocks,
        }
    }

    fn rig(generation: HardwareGeneration) -> Rig<NoDelay> {
        rig_with(generation, NoDelay)
    }

    fn overlay(mode: Size) -> Overlay {
        Overlay {
            dma_addr: [0x4000_0000, 0],
            format: PixelFormat::Argb8888,
            bpp: 32,
            source: Rectangle::new(Point::zero(), Size::new(640, 480)),
            pitch: 640 * 4,
            destination: Rectangle::new(Point::new(16, 8), Size::new(640, 480)),
            mode,
            interlaced: false,
        }
    }

    fn video_overlay() -> Overlay {
        Overlay {
            dma_addr: [0x5000_0000, 0x5100_0000],
            format: PixelFormat::Nv12,
            bpp: 8,
            source: Rectangle::new(Point::zero(), Size::new(1280, 720)),
            pitch: 1280,
            destination: Rectangle::new(Point::zero(), Size::new(1280, 720)),
            mode: Size::new(1280, 720),
            interlaced: false,
        }
    }

    #[test]
    fn test_generation_mismatch() {
        let result = Mixer::new(
            MixerConfig::new(HardwareGeneration::Gen1),
            MixerRegs::Gen2 { mixer: FakeRegs::new() },
            SharedClocks::new(),
            NoDelay,
        );
        assert!(matches!(result, Err(Error::InvalidArgument)));
    }

    #[test]
    fn test_layer_set_validation() {
        let r = rig(HardwareGeneration::Gen2);
        let ov = overlay(Size::new(1280, 720));
        assert_eq!(r.mixer.layer_set(Some(3), Some(&ov)), Err(Error::InvalidArgument));
        assert_eq!(r.mixer.layer_set(Some(0), None), Err(Error::InvalidArgument));
        assert_eq!(r.mixer.layer_set(None, Some(&ov)), Ok(LayerId::Graphics0));
        assert_eq!(r.mixer.layer_set(Some(1), Some(&ov)), Ok(LayerId::Graphics1));
        assert!(r.regs.writes().is_empty());
    }

    #[test]
    fn test_commit_while_off_is_noop() {
        let r = rig(HardwareGeneration::Gen2);
        r.mixer.layer_set(Some(0), Some(&overlay(Size::new(1280, 720)))).unwrap();
        r.mixer.layer_commit(Some(0)).unwrap();
        assert!(r.regs.writes().is_empty());
        assert!(!r.mixer.is_layer_enabled(LayerId::Graphics0));
    }

    #[test]
    fn test_power_on_resets() {
        let r = rig(HardwareGeneration::Gen1);
        r.vp.script(VP_SRESET, &[0]);
        r.mixer.power_on();
        assert!(r.mixer.is_powered());
        assert_eq!(
            r.clocks.log(),
            vec![
                ClockOp::Enable(Clock::Mixer),
                ClockOp::Enable(Clock::VideoProcessor),
                ClockOp::Enable(Clock::SclkMixer),
            ]
        );
        assert_eq!(r.regs.get(MXR_LAYER_CFG), 0x321);
        assert_eq!(r.regs.get(MXR_BG_COLOR1), 0x008080);
        assert_eq!(r.regs.get(MXR_CFG) & MXR_CFG_DST_MASK, MXR_CFG_DST_HDMI);
        assert_eq!(r.regs.get(MXR_CFG) & MXR_CFG_OUT_MASK, MXR_CFG_OUT_RGB888);
        assert_eq!(r.regs.get(MXR_STATUS) & MXR_STATUS_SYNC_ENABLE, MXR_STATUS_SYNC_ENABLE);
        assert_eq!(r.regs.get(graphic_cfg(0)), 0x0022_00ff);
        assert_eq!(r.regs.get(graphic_cfg(1)), 0x0033_00ff);
        assert_eq!(r.vp.writes_to(VP_SRESET), vec![VP_SRESET_PROCESSING]);
        assert!(r.vp.was_written(VP_POLY4_C0_LL));

        // Second power-on changes nothing
        let writes = r.regs.writes().len();
        r.mixer.power_on();
        assert_eq!(r.regs.writes().len(), writes);
        assert_eq!(r.clocks.log().len(), 3);
    }

    #[test]
    fn test_power_off() {
        let r = rig(HardwareGeneration::Gen2);
        r.mixer.power_off();
        assert!(r.clocks.log().is_empty());

        r.mixer.power_on();
        r.mixer.power_off();
        assert!(!r.mixer.is_powered());
        assert_eq!(
            r.clocks.log(),
            vec![ClockOp::Enable(Clock::Mixer), ClockOp::Disable(Clock::Mixer)]
        );
    }

    #[test]
    fn test_graphics_commit() {
        let r = rig(HardwareGeneration::Gen2);
        r.mixer.power_on();
        r.regs.clear_log();

        let mut ov = overlay(Size::new(1280, 720));
        ov.source.top_left = Point::new(4, 1);
        r.mixer.layer_set(Some(1), Some(&ov)).unwrap();
        r.mixer.layer_commit(Some(1)).unwrap();

        let lr = r.mixer.layer_registers(LayerId::Graphics1).unwrap();
        assert_eq!(lr.base, 0x4000_0000 + (640 + 4) * 4);
        assert_eq!(lr.span, 640);
        assert_eq!(lr.wh, grp_wh(640, 480, 0, 0));
        assert_eq!(lr.sxy, 0);
        assert_eq!(lr.dxy, grp_xy(16, 8));
        assert_eq!(lr.cfg & MXR_GRP_CFG_FORMAT_MASK, grp_cfg_format(GRP_FMT_ARGB8888));

        let cfg = r.regs.get(MXR_CFG);
        assert_eq!(cfg & MXR_CFG_GRP1_ENABLE, MXR_CFG_GRP1_ENABLE);
        // Default layer comes along
        assert_eq!(cfg & MXR_CFG_GRP0_ENABLE, MXR_CFG_GRP0_ENABLE);
        assert_eq!(cfg & MXR_CFG_SCAN_MASK, MXR_CFG_SCAN_PROGRESSIVE | MXR_CFG_SCAN_HD);
        assert_eq!(cfg & MXR_CFG_RGB_FMT_MASK, MXR_CFG_RGB709_16_235);
        assert_eq!(r.regs.get(MXR_CM_COEFF_CR), CM_COEFF_CR);
        assert_eq!(r.regs.get(MXR_STATUS) & MXR_STATUS_REG_RUN, MXR_STATUS_REG_RUN);

        // Gating off first, back on last
        let status = r.regs.writes_to(MXR_STATUS);
        assert_eq!(status.first().map(|v| v & MXR_STATUS_SYNC_ENABLE), Some(0));
        assert_eq!(
            status.last().map(|v| v & MXR_STATUS_SYNC_ENABLE),
            Some(MXR_STATUS_SYNC_ENABLE)
        );
        assert!(r.mixer.window(LayerId::Graphics1).updated);
    }

    #[test]
    fn test_sd_output_uses_full_range() {
        let r = rig(HardwareGeneration::Gen2);
        r.mixer.power_on();
        r.mixer.layer_set(None, Some(&overlay(Size::new(720, 576)))).unwrap();
        r.mixer.layer_commit(None).unwrap();
        let cfg = r.regs.get(MXR_CFG);
        assert_eq!(cfg & MXR_CFG_RGB_FMT_MASK, MXR_CFG_RGB601_0_255);
        assert_eq!(cfg & MXR_CFG_SCAN_MASK, MXR_CFG_SCAN_PROGRESSIVE | MXR_CFG_SCAN_PAL);
        assert!(!r.regs.was_written(MXR_CM_COEFF_Y));
    }

    /// Rising edges of the layer update bit
    fn update_triggers(regs: &FakeRegs) -> usize {
        let mut prev = 0;
        regs.writes_to(MXR_CFG)
            .into_iter()
            .filter(|v| {
                let rising = v & !prev & MXR_CFG_LAYER_UPDATE != 0;
                prev = *v;
                rising
            })
            .count()
    }

    #[test]
    fn test_one_update_trigger_per_vsync() {
        let r = rig(HardwareGeneration::Gen2);
        r.mixer.power_on();
        r.mixer.layer_set(Some(0), Some(&overlay(Size::new(1280, 720)))).unwrap();
        r.mixer.layer_commit(Some(0)).unwrap();
        assert_eq!(update_triggers(&r.regs), 1);

        // Hardware still counting: no second trigger, not even after a vsync
        let mut cfg = r.regs.get(MXR_CFG) & !MXR_CFG_LAYER_UPDATE;
        cfg |= 1 << MXR_CFG_LAYER_UPDATE_COUNT_SHIFT;
        r.regs.set(MXR_CFG, cfg);
        r.regs.clear_log();
        r.mixer.layer_commit(Some(0)).unwrap();
        r.regs.set(MXR_INT_STATUS, MXR_INT_STATUS_VSYNC);
        assert_eq!(r.mixer.handle_irq(), VsyncOutcome::Vblank);
        r.mixer.layer_commit(Some(0)).unwrap();
        assert_eq!(update_triggers(&r.regs), 0);

        // Count drained: the flip completes and the trigger re-arms
        r.regs.set(MXR_CFG, cfg & !MXR_CFG_LAYER_UPDATE_COUNT_MASK);
        r.regs.set(MXR_INT_STATUS, MXR_INT_STATUS_VSYNC);
        assert_eq!(r.mixer.handle_irq(), VsyncOutcome::FlipComplete);
        assert!(!r.mixer.window(LayerId::Graphics0).updated);
        r.regs.clear_log();
        r.mixer.layer_commit(Some(0)).unwrap();
        assert_eq!(update_triggers(&r.regs), 1);
    }

    #[test]
    fn test_wide_900_layer_offset() {
        let r = rig(HardwareGeneration::Gen2);
        r.mixer.power_on();
        r.regs.set(MXR_GRAPHIC1_DXY, grp_xy(10, 0));
        r.mixer.layer_set(Some(0), Some(&overlay(Size::new(1440, 900)))).unwrap();
        r.mixer.layer_commit(Some(0)).unwrap();
        assert_eq!(r.regs.get(MXR_GRAPHIC0_DXY), grp_xy(224, 0));
        assert_eq!(r.regs.get(MXR_GRAPHIC1_DXY), grp_xy(234, 0));

        // Already shifted: left alone
        r.mixer.layer_commit(Some(0)).unwrap();
        assert_eq!(r.regs.get(MXR_GRAPHIC1_DXY), grp_xy(234, 0));
    }

    #[test]
    fn test_no_layer_offset_for_other_modes() {
        for mode in [Size::new(1280, 720), Size::new(1920, 1080), Size::new(1440, 1080)] {
            let r = rig(HardwareGeneration::Gen2);
            r.mixer.power_on();
            r.mixer.layer_set(Some(1), Some(&overlay(mode))).unwrap();
            r.mixer.layer_commit(Some(1)).unwrap();
            assert!(!r.regs.was_written(MXR_GRAPHIC0_DXY));
        }

        // Gen1 has no such quirk
        let r = rig(HardwareGeneration::Gen1);
        r.mixer.power_on();
        r.mixer.layer_set(Some(1), Some(&overlay(Size::new(1440, 900)))).unwrap();
        r.mixer.layer_commit(Some(1)).unwrap();
        assert!(!r.regs.was_written(MXR_GRAPHIC0_DXY));
    }

    #[test]
    fn test_video_commit_gen1() {
        let r = rig(HardwareGeneration::Gen1);
        r.mixer.power_on();
        r.mixer.layer_set(Some(2), Some(&video_overlay())).unwrap();
        r.mixer.layer_commit(Some(2)).unwrap();

        assert_eq!(r.vp.get(VP_ENABLE), VP_ENABLE_ON);
        assert_eq!(r.regs.get(MXR_CFG) & MXR_CFG_VP_ENABLE, MXR_CFG_VP_ENABLE);
        assert_eq!(r.vp.get(VP_TOP_C_PTR), 0x5100_0000);
        assert_eq!(r.vp.get(VP_H_RATIO), 1 << 16);
        assert_eq!(r.vp.get(VP_SHADOW_UPDATE), VP_SHADOW_UPDATE_ENABLE);
        assert!(r.mixer.is_layer_enabled(LayerId::VideoScaler));
    }

    #[test]
    fn test_video_commit_rejected() {
        let r = rig(HardwareGeneration::Gen2);
        r.mixer.power_on();
        r.mixer.layer_set(Some(2), Some(&video_overlay())).unwrap();
        assert_eq!(r.mixer.layer_commit(Some(2)), Err(Error::Unsupported));

        let r = rig(HardwareGeneration::Gen1);
        r.mixer.power_on();
        let mut rgb = video_overlay();
        rgb.format = PixelFormat::Argb8888;
        rgb.bpp = 32;
        rgb.pitch = 1280 * 4;
        r.mixer.layer_set(Some(2), Some(&rgb)).unwrap();
        assert_eq!(r.mixer.layer_commit(Some(2)), Err(Error::InvalidArgument));
        assert!(!r.mixer.is_layer_enabled(LayerId::VideoScaler));
    }

    #[test]
    fn test_interlaced_shadow_defers_flip() {
        let r = rig(HardwareGeneration::Gen1);
        r.mixer.power_on();
        let mut ov = overlay(Size::new(1920, 1080));
        ov.interlaced = true;
        r.mixer.layer_set(Some(0), Some(&ov)).unwrap();
        r.mixer.layer_commit(Some(0)).unwrap();
        assert!(r.mixer.is_interlaced());

        r.regs.set(MXR_INT_STATUS, MXR_INT_STATUS_VSYNC);
        assert_eq!(r.mixer.handle_irq(), VsyncOutcome::Deferred);
        assert!(r.mixer.window(LayerId::Graphics0).updated);

        // Hardware latches the address
        r.regs.set(graphic_base_shadow(0), r.regs.get(graphic_base(0)));
        r.regs.set(MXR_INT_STATUS, MXR_INT_STATUS_VSYNC);
        assert_eq!(r.mixer.handle_irq(), VsyncOutcome::FlipComplete);
    }

    #[test]
    fn test_irq_clears_status() {
        let r = rig(HardwareGeneration::Gen2);
        r.mixer.power_on();
        r.regs.set(MXR_INT_STATUS, 0);
        assert_eq!(r.mixer.handle_irq(), VsyncOutcome::Idle);
        assert_eq!(r.regs.get(MXR_INT_STATUS), MXR_INT_CLEAR_VSYNC);

        r.regs.set(MXR_INT_STATUS, MXR_INT_STATUS_VSYNC);
        assert_eq!(r.mixer.handle_irq(), VsyncOutcome::FlipComplete);
        assert_eq!(
            r.regs.get(MXR_INT_STATUS),
            MXR_INT_STATUS_VSYNC | MXR_INT_CLEAR_VSYNC
        );
    }

    #[test]
    fn test_vblank_enable() {
        let r = rig(HardwareGeneration::Gen2);
        assert_eq!(r.mixer.enable_vblank(-1), Err(Error::InvalidArgument));
        assert_eq!(r.mixer.enable_vblank(0), Err(Error::NotPowered));

        r.mixer.power_on();
        r.mixer.enable_vblank(1).unwrap();
        assert_eq!(r.mixer.pipe(), Some(1));
        assert_eq!(r.regs.get(MXR_INT_EN), MXR_INT_EN_VSYNC);

        r.mixer.disable_vblank();
        assert_eq!(r.regs.get(MXR_INT_EN), 0);

        // Pipe survives a power cycle and is re-armed
        r.mixer.power_off();
        r.mixer.power_on();
        assert_eq!(r.regs.get(MXR_INT_EN), MXR_INT_EN_VSYNC);
    }

    #[test]
    fn test_power_cycle_reapplies_layers() {
        let r = rig(HardwareGeneration::Gen2);
        r.mixer.power_on();
        r.mixer.layer_set(Some(1), Some(&overlay(Size::new(1280, 720)))).unwrap();
        r.mixer.layer_commit(Some(1)).unwrap();
        r.mixer.power_off();
        assert_eq!(r.regs.get(MXR_CFG) & MXR_CFG_GRP1_ENABLE, 0);

        r.mixer.power_on();
        assert_eq!(r.regs.get(MXR_CFG) & MXR_CFG_GRP1_ENABLE, MXR_CFG_GRP1_ENABLE);
        assert_eq!(r.regs.get(graphic_span(1)), 640);
    }

    #[test]
    fn test_wait_for_vsync_timeout() {
        let r = rig(HardwareGeneration::Gen2);
        assert_eq!(r.mixer.wait_for_vsync(), Err(Error::Timeout(TimeoutSource::Vsync)));
    }

    #[test]
    fn test_layer_disable_after_timeout() {
        let r = rig(HardwareGeneration::Gen2);
        r.mixer.power_on();
        r.mixer.layer_set(Some(0), Some(&overlay(Size::new(1280, 720)))).unwrap();
        r.mixer.layer_commit(Some(0)).unwrap();

        // No interrupt arrives; disable proceeds anyway
        r.mixer.layer_disable(Some(0)).unwrap();
        assert!(!r.mixer.is_layer_enabled(LayerId::Graphics0));
        assert_eq!(r.regs.get(MXR_CFG) & MXR_CFG_GRP0_ENABLE, 0);
        assert_eq!(r.regs.get(MXR_STATUS) & MXR_STATUS_SYNC_ENABLE, MXR_STATUS_SYNC_ENABLE);
    }

    #[test]
    fn test_vsync_wakes_waiter() {
        let r = rig_with(HardwareGeneration::Gen2, SleepDelay);
        r.mixer.power_on();
        let mixer = Arc::new(r.mixer);
        let regs = r.regs.clone();

        let irq = {
            let mixer = Arc::clone(&mixer);
            thread::spawn(move || {
                for _ in 0..200 {
                    thread::sleep(Duration::from_millis(2));
                    regs.set(MXR_INT_STATUS, MXR_INT_STATUS_VSYNC);
                    mixer.handle_irq();
                }
            })
        };
        assert_eq!(mixer.wait_for_vsync(), Ok(()));
        irq.join().unwrap();
    }

    #[test]
    fn test_irq_never_sees_partial_commit() {
        let r = rig_with(HardwareGeneration::Gen2, SleepDelay);
        r.mixer.power_on();
        let mixer = Arc::new(r.mixer);
        let regs = r.regs.clone();

        let a = overlay(Size::new(1280, 720));
        let mut b = a;
        b.dma_addr[0] = 0x4800_0000;
        b.destination = Rectangle::new(Point::new(200, 100), Size::new(320, 240));
        b.pitch = 320 * 4;

        let expected = |ov: &Overlay| {
            let win = WindowLayer::default().from_overlay(ov).unwrap();
            vec![win.graphics_base(), grp_xy(win.crtc_x, win.crtc_y), win.fb_width]
        };
        let (exp_a, exp_b) = (expected(&a), expected(&b));

        mixer.layer_set(Some(0), Some(&a)).unwrap();
        mixer.layer_commit(Some(0)).unwrap();

        // Only the handler writes the status, under the state lock
        regs.snapshot_on_write(
            MXR_INT_STATUS,
            &[graphic_base(0), graphic_dxy(0), graphic_span(0), MXR_STATUS],
        );

        let writer = {
            let mixer = Arc::clone(&mixer);
            thread::spawn(move || {
                for i in 0..500 {
                    let ov = if i % 2 == 0 { &b } else { &a };
                    mixer.layer_set(Some(0), Some(ov)).unwrap();
                    mixer.layer_commit(Some(0)).unwrap();
                }
            })
        };
        let irq = {
            let mixer = Arc::clone(&mixer);
            let regs = regs.clone();
            thread::spawn(move || {
                for _ in 0..500 {
                    regs.set(MXR_INT_STATUS, MXR_INT_STATUS_VSYNC);
                    mixer.handle_irq();
                }
            })
        };
        writer.join().unwrap();
        irq.join().unwrap();

        let snapshots = regs.snapshots();
        assert_eq!(snapshots.len(), 500);
        for snap in snapshots {
            let layer = &snap[..3];
            assert!(layer == exp_a || layer == exp_b, "partial layer state {:?}", layer);
            assert_eq!(snap[3] & MXR_STATUS_SYNC_ENABLE, MXR_STATUS_SYNC_ENABLE);
        }
    }

    #[test]
    fn test_irq_runs_during_vp_reset() {
        let r = rig_with(HardwareGeneration::Gen1, SleepDelay);
        let mut busy = [VP_SRESET_PROCESSING; 21];
        busy[20] = 0;
        r.vp.script(VP_SRESET, &busy);
        let mixer = Arc::new(r.mixer);

        let reset = {
            let mixer = Arc::clone(&mixer);
            thread::spawn(move || mixer.reset())
        };
        thread::sleep(Duration::from_millis(30));

        r.regs.set(MXR_INT_STATUS, MXR_INT_STATUS_VSYNC);
        let started = Instant::now();
        mixer.handle_irq();
        assert!(started.elapsed() < Duration::from_millis(100));
        assert!(!reset.is_finished());
        assert!(r.regs.was_written(MXR_INT_STATUS));

        reset.join().unwrap();
        assert_eq!(r.vp.reads_of(VP_SRESET), 21);
        assert_eq!(r.regs.get(MXR_STATUS) & MXR_STATUS_SYNC_ENABLE, MXR_STATUS_SYNC_ENABLE);
    }

    #[test]
    fn test_vsync_wait_does_not_hold_delay() {
        let r = rig_with(HardwareGeneration::Gen1, SleepDelay);
        r.vp.script(VP_SRESET, &[VP_SRESET_PROCESSING, 0]);
        let mixer = Arc::new(r.mixer);

        let waiter = {
            let mixer = Arc::clone(&mixer);
            thread::spawn(move || mixer.wait_for_vsync())
        };
        thread::sleep(Duration::from_millis(20));

        let started = Instant::now();
        mixer.reset();
        assert!(started.elapsed() < Duration::from_millis(500));
        assert_eq!(waiter.join().unwrap(), Err(Error::Timeout(TimeoutSource::Vsync)));
    }
}
