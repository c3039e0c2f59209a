//! HDMI encoder: power sequencing, mode programming and hotplug.
//!
//! # Power states
//!
//! The encoder is either off or on. Power-on brings up the rails, the PHY
//! and the core, then moves interrupt handling from the external hotplug
//! line to the controller. Power-off mirrors the sequence. Both directions
//! are idempotent.
//!
//! Register writes outside the power sequences only happen while powered.

pub mod audio;
pub mod hotplug;
pub mod infoframe;
pub mod layout;
pub mod phy;
pub mod preset;
pub mod regs;

use alloc::sync::Arc;
use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use log::{debug, info, warn};

pub use audio::AudioPort;
pub use hotplug::{HotplugEvent, HotplugIrq, HotplugListener};
pub use layout::{ModeConfig, RegisterLayout};

use self::infoframe::Infoframe;
use self::phy::PhyConfigurator;
use self::regs::*;
use crate::config::{HardwareGeneration, HdmiConfig};
use crate::error::{Error, Result, TimeoutSource};
use crate::lock::Spinlock;
use crate::mode::{DisplayMode, ScanClass};
use crate::platform::{Clock, HdmiBoard, HpdRoute, IrqLine, MonitorInfo, MonitorInfoSource, RegisterBlock};

/// Core reset and interrupt-enable hold
const HOLD_MS: u32 = 10;

/// Requested display power level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerMode {
    On,
    /// Powered, with the output showing the blank colour
    Standby,
    Off,
}

/// Whether `generation` can drive `mode`: it must scan it out and the PHY
/// must have an exact entry for its clock.
pub fn check_timing(mode: &DisplayMode, generation: HardwareGeneration) -> Result<()> {
    if !mode.is_well_formed() {
        return Err(Error::ModeRejected);
    }
    let scannable = match generation {
        HardwareGeneration::Gen1 => preset::find(mode).is_some(),
        HardwareGeneration::Gen2 => ScanClass::classify(mode.hdisplay, mode.vdisplay).is_some(),
    };
    if !scannable {
        return Err(Error::ModeRejected);
    }
    phy::select(mode.clock_hz, generation)
        .map(|_| ())
        .map_err(|_| Error::ModeRejected)
}

/// State shared with the interrupt and audio handles.
pub(crate) struct HdmiShared<R> {
    pub(crate) regs: R,
    pub(crate) powered: AtomicBool,
    /// Hotplug events are suppressed during core reset and init
    pub(crate) hpd_handle: AtomicBool,
    pub(crate) hdmi_sink: AtomicBool,
    pub(crate) sink_audio: AtomicBool,
    pub(crate) sample_rate: AtomicU32,
    pub(crate) events: Spinlock<hotplug::EventQueue>,
}

/// HDMI encoder driver
pub struct Hdmi<R, I, B, D, M> {
    config: HdmiConfig,
    shared: Arc<HdmiShared<R>>,
    phy: PhyConfigurator<I>,
    board: B,
    delay: D,
    monitor: M,
    mode: Option<ModeConfig>,
    video_enabled: bool,
    enabled: bool,
}

impl<R, I, B, D, M> Hdmi<R, I, B, D, M>
where
    R: RegisterBlock,
    I: I2c,
    B: HdmiBoard,
    D: DelayNs,
    M: MonitorInfoSource,
{
    /// Create a powered-off encoder listening on the external hotplug line.
    pub fn new(config: HdmiConfig, regs: R, phy_bus: I, mut board: B, delay: D, monitor: M) -> Self {
        board.hpd_route(HpdRoute::Gpio);
        board.irq_enable(IrqLine::External);

        Self {
            config,
            shared: Arc::new(HdmiShared {
                regs,
                powered: AtomicBool::new(false),
                hpd_handle: AtomicBool::new(true),
                hdmi_sink: AtomicBool::new(false),
                sink_audio: AtomicBool::new(false),
                sample_rate: AtomicU32::new(audio::DEFAULT_SAMPLE_RATE),
                events: Spinlock::new(hotplug::EventQueue::new()),
            }),
            phy: PhyConfigurator::new(phy_bus, config.phy_address),
            board,
            delay,
            monitor,
            mode: None,
            video_enabled: false,
            enabled: false,
        }
    }

    pub fn generation(&self) -> HardwareGeneration {
        self.config.generation
    }

    pub fn is_powered(&self) -> bool {
        self.shared.powered.load(Ordering::Acquire)
    }

    /// True once a mode has been committed while powered
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn mode_config(&self) -> Option<&ModeConfig> {
        self.mode.as_ref()
    }

    pub fn board(&self) -> &B {
        &self.board
    }

    fn regs(&self) -> &R {
        &self.shared.regs
    }

    // =========================================================================
    // Hotplug
    // =========================================================================

    /// Handle for the interrupt handlers of both hotplug lines
    pub fn hotplug_irq(&self) -> HotplugIrq<R> {
        HotplugIrq::new(Arc::clone(&self.shared))
    }

    /// Deliver queued hotplug events. Returns how many were delivered.
    pub fn dispatch_hotplug<L: HotplugListener>(&self, listener: &mut L) -> usize {
        let mut delivered = 0;
        loop {
            // Release the queue before calling out
            let event = self.shared.events.lock().pop_front();
            match event {
                Some(event) => {
                    listener.hotplug(event);
                    delivered += 1;
                }
                None => return delivered,
            }
        }
    }

    pub fn is_connected(&mut self) -> bool {
        if self.is_powered() {
            self.regs().read(HPD_STATUS) & 0x1 != 0
        } else {
            self.board.hpd_level()
        }
    }

    /// Read the sink's capabilities and remember whether it takes HDMI
    /// packets and audio.
    pub fn get_capabilities(&mut self) -> Result<MonitorInfo> {
        let info = self.monitor.read_monitor_info().ok_or(Error::NotFound)?;
        debug!("hdmi: {} monitor, audio {}", if info.hdmi_sink { "hdmi" } else { "dvi" }, info.audio);
        self.shared.hdmi_sink.store(info.hdmi_sink, Ordering::Release);
        self.shared.sink_audio.store(info.audio, Ordering::Release);
        Ok(info)
    }

    // =========================================================================
    // Mode handling
    // =========================================================================

    /// Accept a mode only if this generation can scan it out and the PHY has
    /// an exact entry for its clock. Touches no hardware.
    pub fn check_timing(&self, mode: &DisplayMode) -> Result<()> {
        debug!("hdmi: check timing {}", mode);
        check_timing(mode, self.config.generation)
    }

    /// The requested mode if supported, else the first supported candidate.
    pub fn mode_fixup(&self, requested: &DisplayMode, candidates: &[DisplayMode]) -> Result<DisplayMode> {
        if self.check_timing(requested).is_ok() {
            return Ok(*requested);
        }
        let substitute = candidates
            .iter()
            .find(|m| self.check_timing(m).is_ok())
            .copied()
            .ok_or(Error::ModeRejected)?;
        info!("hdmi: requested {} unsupported, using {}", requested, substitute);
        Ok(substitute)
    }

    /// Translate and remember `mode`; hardware is programmed by [`Self::commit`].
    pub fn mode_set(&mut self, mode: &DisplayMode) -> Result<()> {
        self.check_timing(mode)?;
        self.mode = Some(layout::translate(mode, self.config.generation)?);
        Ok(())
    }

    /// Program the stored mode. Does nothing while powered off.
    pub fn commit(&mut self) -> Result<()> {
        debug!("hdmi: commit, powered {}", self.is_powered());
        if !self.is_powered() {
            return Ok(());
        }
        let mode = self.mode.ok_or(Error::InvalidArgument)?;
        self.apply(&mode)?;
        self.enabled = true;
        Ok(())
    }

    fn apply(&mut self, mode: &ModeConfig) -> Result<()> {
        let generation = self.config.generation;
        let entry = phy::select(mode.pixel_clock, generation)?;

        self.phy
            .reset(&self.shared.regs, &mut self.board, generation, &mut self.delay);
        self.phy.apply(entry, &mut self.delay)?;

        self.conf_reset();
        self.conf_init(mode.vic);
        if generation == HardwareGeneration::Gen1 {
            audio::init(self.regs(), self.shared.sample_rate.load(Ordering::Acquire));
        }

        self.timing_apply(mode)?;

        if generation == HardwareGeneration::Gen1 {
            audio::control(self.regs(), true, self.shared.sink_audio.load(Ordering::Acquire));
        }
        self.regs_dump("start");
        Ok(())
    }

    /// Write the timing layout, wait for the PLL, then enable the core and
    /// the timing generator.
    fn timing_apply(&mut self, mode: &ModeConfig) -> Result<()> {
        let generation = self.config.generation;
        mode.layout.write(self.regs());

        if let Err(timeout) = phy::wait_for_lock(&self.shared.regs, generation, &mut self.delay) {
            warn!(
                "hdmi: phy pll could not reach steady state after {} polls",
                timeout.attempts
            );
            self.regs_dump("timing apply");
            if self.config.strict_pll_lock {
                return Err(Error::Timeout(TimeoutSource::PllLock));
            }
        }

        self.board.disable(Clock::SclkHdmi);
        self.board.set_parent(Clock::SclkHdmi, Clock::SclkHdmiPhy);
        self.board.enable(Clock::SclkHdmi);

        let regs = self.regs();
        regs.write_mask(CON_0, !0, HDMI_EN);
        let tg = if mode.interlaced { TG_EN | FIELD_EN } else { TG_EN };
        regs.write_mask(TG_CMD, !0, tg);
        Ok(())
    }

    fn conf_reset(&mut self) {
        self.shared.hpd_handle.store(false, Ordering::Release);

        let rstout = GenerationRegs::of(self.config.generation).core_rstout;
        self.regs().write_mask(rstout, 0, CORE_SW_RSTOUT);
        self.delay.delay_ms(HOLD_MS);
        self.regs().write_mask(rstout, !0, CORE_SW_RSTOUT);
        self.delay.delay_ms(HOLD_MS);

        self.shared.hpd_handle.store(true, Ordering::Release);
    }

    /// Default controller state: hotplug interrupts, HDMI or DVI mode and
    /// the metadata packets.
    fn conf_init(&mut self, vic: u8) {
        self.shared.hpd_handle.store(false, Ordering::Release);

        let intc = INTC_EN_GLOBAL | INTC_EN_HPD_PLUG | INTC_EN_HPD_UNPLUG;
        self.regs().write_mask(INTC_CON, 0, intc);
        self.delay.delay_ms(HOLD_MS);
        self.regs().write_mask(INTC_CON, !0, intc);

        self.regs().write_mask(MODE_SEL, MODE_HDMI_EN, MODE_MASK);

        if self.video_enabled {
            self.enable_video();
        } else {
            self.disable_video();
        }

        let hdmi_sink = self.shared.hdmi_sink.load(Ordering::Acquire);
        let regs = self.regs();
        if !hdmi_sink {
            regs.write_mask(MODE_SEL, MODE_DVI_EN, MODE_MASK);
            regs.write_byte(CON_2, VID_PREAMBLE_DIS | GUARD_BAND_DIS);
        }

        match self.config.generation {
            HardwareGeneration::Gen1 => {
                regs.write_byte(V13_BLUE_SCREEN_0, 0x12);
                regs.write_byte(V13_BLUE_SCREEN_1, 0x34);
                regs.write_byte(V13_BLUE_SCREEN_2, 0x56);

                // AVI every vsync, forced RGB
                regs.write_byte(V13_AVI_CON, AVI_CON_EVERY_VSYNC);
                regs.write_byte(v13_avi_byte(0), 0);
                regs.write_mask(CON_1, 0x10 << 5, 0x11 << 5);

                regs.write_byte(V13_SPD_CON, 0x02);
                regs.write_byte(V13_AUI_CON, AUI_CON_EVERY_VSYNC);
                regs.write_byte(V13_ACR_CON, 0x04);
            }
            HardwareGeneration::Gen2 => {
                regs.write_mask(CON_1, 2, 3 << 5);
                infoframe::write_packet(regs, &Infoframe::avi(vic), hdmi_sink);
                infoframe::write_packet(regs, &Infoframe::audio(), hdmi_sink);
            }
        }

        self.shared.hpd_handle.store(true, Ordering::Release);
    }

    // =========================================================================
    // Video gating (Gen2)
    // =========================================================================

    /// Show mixer output again
    pub fn enable_video(&mut self) {
        if self.config.generation == HardwareGeneration::Gen1 {
            return;
        }
        self.video_enabled = true;
        if self.is_powered() {
            self.regs().write_mask(CON_0, 0, BLUE_SCR_EN);
        }
    }

    /// Replace mixer output with a black blue-screen
    pub fn disable_video(&mut self) {
        if self.config.generation == HardwareGeneration::Gen1 {
            return;
        }
        self.video_enabled = false;
        if !self.is_powered() {
            return;
        }
        let regs = self.regs();
        for reg in [
            BLUE_SCREEN_R_0,
            BLUE_SCREEN_R_1,
            BLUE_SCREEN_G_0,
            BLUE_SCREEN_G_1,
            BLUE_SCREEN_B_0,
            BLUE_SCREEN_B_1,
        ] {
            regs.write_byte(reg, 0);
        }
        regs.write_mask(CON_0, !0, BLUE_SCR_EN);
    }

    // =========================================================================
    // Power sequencing
    // =========================================================================

    pub fn set_power(&mut self, mode: PowerMode) -> Result<()> {
        debug!("hdmi: power {:?}", mode);
        match mode {
            PowerMode::On => {
                self.power_on()?;
                self.enable_video();
            }
            PowerMode::Standby => self.disable_video(),
            PowerMode::Off => self.power_off(),
        }
        Ok(())
    }

    /// Power the encoder up. Returns the audio handle on generations with
    /// the legacy audio path, and `None` when already on.
    pub fn power_on(&mut self) -> Result<Option<AudioPort<R>>> {
        if self.is_powered() {
            return Ok(None);
        }

        self.board.hpd_route(HpdRoute::Controller);
        if let Err(e) = self.board.regulators_enable() {
            self.board.hpd_route(HpdRoute::Gpio);
            return Err(e);
        }
        self.board.enable(Clock::HdmiPhy);

        if self.phy.set_power(true).is_err() {
            warn!("hdmi: phy power-on incomplete");
        }
        self.shared.powered.store(true, Ordering::Release);

        let generation = self.config.generation;
        self.phy
            .reset(&self.shared.regs, &mut self.board, generation, &mut self.delay);
        self.conf_reset();
        self.conf_init(self.mode.map_or(0, |m| m.vic));
        if generation == HardwareGeneration::Gen1 {
            audio::init(self.regs(), self.shared.sample_rate.load(Ordering::Acquire));
        }

        let applied = match self.mode {
            Some(mode) => self.apply(&mode).map(|_| self.enabled = true),
            None => Ok(()),
        };

        self.board.irq_disable(IrqLine::External);
        self.board.irq_enable(IrqLine::Internal);
        applied?;

        Ok(self.audio_port())
    }

    /// Power the encoder down. A no-op when already off.
    pub fn power_off(&mut self) {
        if !self.is_powered() {
            return;
        }

        self.board.hpd_route(HpdRoute::Gpio);
        if self.phy.set_power(false).is_err() {
            warn!("hdmi: phy power-off incomplete");
        }
        let generation = self.config.generation;
        self.phy
            .reset(&self.shared.regs, &mut self.board, generation, &mut self.delay);

        self.board.disable(Clock::HdmiPhy);
        self.board.regulators_disable();
        self.enabled = false;
        self.shared.powered.store(false, Ordering::Release);

        self.board.irq_disable(IrqLine::Internal);
        self.board.irq_enable(IrqLine::External);
    }

    /// Audio handle for a powered Gen1 encoder
    pub fn audio_port(&self) -> Option<AudioPort<R>> {
        match self.config.generation {
            HardwareGeneration::Gen1 if self.is_powered() => {
                Some(AudioPort::new(Arc::clone(&self.shared)))
            }
            _ => None,
        }
    }

    // =========================================================================
    // Diagnostics
    // =========================================================================

    /// Log the control, core and timing generator registers.
    pub fn regs_dump(&self, prefix: &str) {
        let regs = self.regs();
        let gen_regs = GenerationRegs::of(self.config.generation);
        let dump: [(&str, usize); 10] = [
            ("INTC_CON", INTC_CON),
            ("INTC_FLAG", INTC_FLAG),
            ("HPD_STATUS", HPD_STATUS),
            ("PHY_RSTOUT", gen_regs.phy_rstout),
            ("CORE_RSTOUT", gen_regs.core_rstout),
            ("PHY_STATUS", gen_regs.phy_status),
            ("CON_0", CON_0),
            ("MODE_SEL", MODE_SEL),
            ("INT_PRO_MODE", INT_PRO_MODE),
            ("TG_CMD", TG_CMD),
        ];
        debug!("{}: ---- HDMI REGISTERS ----", prefix);
        for (name, offset) in dump {
            debug!("{}: {} = {:#010x}", prefix, name, regs.read(offset));
        }
        if let Some(mode) = &self.mode {
            let tg = mode.layout.timing_generator();
            debug!(
                "{}: tg h_fsz={} hact={}+{} v_fsz={} vact={}+{}",
                prefix, tg.h_fsz, tg.hact_st, tg.hact_sz, tg.v_fsz, tg.vact_st, tg.vact_sz
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mode::preset;
    use crate::testing::{BoardOp, ClockOp, FakeBoard, FakeI2c, FakeMonitor, FakeRegs, NoDelay};

    type TestHdmi = Hdmi<FakeRegs, FakeI2c, FakeBoard, NoDelay, FakeMonitor>;

    fn hdmi(generation: HardwareGeneration) -> (TestHdmi, FakeRegs, FakeI2c) {
        let regs = FakeRegs::new();
        let bus = FakeI2c::new();
        // PLL reports lock
        for status in [PHY_STATUS_0, V13_PHY_STATUS] {
            regs.set(status, PHY_STATUS_READY);
        }
        let hdmi = Hdmi::new(
            HdmiConfig::new(generation),
            regs.clone(),
            bus.clone(),
            FakeBoard::new(),
            NoDelay,
            FakeMonitor::hdmi_with_audio(),
        );
        (hdmi, regs, bus)
    }

    #[test]
    fn test_check_timing() {
        let (gen2, _, _) = hdmi(HardwareGeneration::Gen2);
        assert!(gen2.check_timing(&preset("1440x900").unwrap()).is_ok());
        assert!(gen2.check_timing(&preset("1080p60").unwrap()).is_ok());
        // 65 MHz has a PHY entry but 1024x768 has no scan class
        assert!(gen2.check_timing(&preset("1024x768").unwrap()).is_err());
        // No PHY entry for 74.2 MHz
        let mut mode = preset("720p60").unwrap();
        mode.clock_hz = 74_200_000;
        assert_eq!(gen2.check_timing(&mode), Err(Error::ModeRejected));

        let (gen1, _, _) = hdmi(HardwareGeneration::Gen1);
        assert!(gen1.check_timing(&preset("1080i50").unwrap()).is_ok());
        assert!(gen1.check_timing(&preset("480p60").unwrap()).is_ok());
        assert_eq!(gen1.check_timing(&preset("1440x900").unwrap()), Err(Error::ModeRejected));
        assert_eq!(gen1.check_timing(&preset("800x600").unwrap()), Err(Error::ModeRejected));
    }

    #[test]
    fn test_check_timing_touches_no_hardware() {
        let (hdmi, regs, bus) = hdmi(HardwareGeneration::Gen2);
        let _ = hdmi.check_timing(&preset("800x600").unwrap());
        let _ = hdmi.check_timing(&preset("1080p60").unwrap());
        assert!(regs.writes().is_empty());
        assert!(bus.writes().is_empty());
    }

    #[test]
    fn test_mode_fixup() {
        let (hdmi, _, _) = hdmi(HardwareGeneration::Gen1);
        let wanted = preset("720p60").unwrap();
        assert_eq!(hdmi.mode_fixup(&wanted, &[]), Ok(wanted));

        let unsupported = preset("1440x900").unwrap();
        let candidates = [preset("800x600").unwrap(), preset("1080p60").unwrap(), wanted];
        assert_eq!(
            hdmi.mode_fixup(&unsupported, &candidates),
            Ok(preset("1080p60").unwrap())
        );
        assert_eq!(
            hdmi.mode_fixup(&unsupported, &candidates[..1]),
            Err(Error::ModeRejected)
        );
    }

    #[test]
    fn test_commit_while_off_is_noop() {
        let (mut hdmi, regs, bus) = hdmi(HardwareGeneration::Gen2);
        hdmi.mode_set(&preset("720p60").unwrap()).unwrap();
        hdmi.commit().unwrap();
        assert!(!hdmi.is_enabled());
        assert!(regs.writes().is_empty());
        assert!(bus.writes().is_empty());
    }

    #[test]
    fn test_power_on_sequence() {
        let (mut hdmi, regs, _) = hdmi(HardwareGeneration::Gen2);
        assert!(hdmi.power_on().unwrap().is_none());
        assert!(hdmi.is_powered());

        let ops = hdmi.board().ops();
        let first_regulator = ops.iter().position(|op| *op == BoardOp::RegulatorsOn).unwrap();
        let irq_switch = ops
            .iter()
            .position(|op| *op == BoardOp::IrqEnable(IrqLine::Internal))
            .unwrap();
        assert_eq!(ops[0], BoardOp::HpdRoute(HpdRoute::Gpio));
        assert!(ops.contains(&BoardOp::HpdRoute(HpdRoute::Controller)));
        assert!(first_regulator < irq_switch);
        assert_eq!(ops.last(), Some(&BoardOp::IrqEnable(IrqLine::Internal)));
        assert!(hdmi.board().clock_log().contains(&ClockOp::Enable(Clock::HdmiPhy)));

        // Core reset deasserted, hotplug interrupts on
        assert_eq!(regs.writes_to(CORE_RSTOUT), vec![0, 1]);
        assert_eq!(
            regs.get(INTC_CON),
            INTC_EN_GLOBAL | INTC_EN_HPD_PLUG | INTC_EN_HPD_UNPLUG
        );
    }

    #[test]
    fn test_power_on_is_idempotent() {
        let (mut hdmi, regs, bus) = hdmi(HardwareGeneration::Gen2);
        hdmi.power_on().unwrap();
        let writes = regs.writes().len();
        let bus_writes = bus.writes().len();
        let board_ops = hdmi.board().ops().len();

        assert!(hdmi.power_on().unwrap().is_none());
        assert_eq!(regs.writes().len(), writes);
        assert_eq!(bus.writes().len(), bus_writes);
        assert_eq!(hdmi.board().ops().len(), board_ops);
        assert!(hdmi.is_powered());
    }

    #[test]
    fn test_power_off_is_idempotent_and_mirrors() {
        let (mut hdmi, regs, _) = hdmi(HardwareGeneration::Gen2);
        hdmi.power_off();
        assert!(regs.writes().is_empty());
        assert_eq!(hdmi.board().ops().len(), 2);

        hdmi.power_on().unwrap();
        hdmi.power_off();
        assert!(!hdmi.is_powered());
        let ops = hdmi.board().ops();
        assert_eq!(ops.last(), Some(&BoardOp::IrqEnable(IrqLine::External)));
        assert!(ops.contains(&BoardOp::RegulatorsOff));
        assert!(hdmi.board().clock_log().contains(&ClockOp::Disable(Clock::HdmiPhy)));

        let writes = regs.writes().len();
        let board_ops = hdmi.board().ops().len();
        hdmi.power_off();
        assert_eq!(regs.writes().len(), writes);
        assert_eq!(hdmi.board().ops().len(), board_ops);
    }

    #[test]
    fn test_regulator_failure_aborts_power_on() {
        let (mut hdmi, regs, _) = hdmi(HardwareGeneration::Gen2);
        hdmi.board.fail_regulators(true);
        assert!(hdmi.power_on().is_err());
        assert!(!hdmi.is_powered());
        assert!(regs.writes().is_empty());
    }

    #[test]
    fn test_commit_programs_mode() {
        let (mut hdmi, regs, bus) = hdmi(HardwareGeneration::Gen2);
        hdmi.get_capabilities().unwrap();
        hdmi.power_on().unwrap();
        hdmi.mode_set(&preset("1080i60").unwrap()).unwrap();
        hdmi.commit().unwrap();
        assert!(hdmi.is_enabled());

        // Blob for 74.25 MHz followed by operation mode
        let blob = phy::select(74_250_000, HardwareGeneration::Gen2).unwrap().blob;
        let writes = bus.writes();
        let pos = writes.iter().position(|(_, w)| w[..] == blob[..]).unwrap();
        assert_eq!(writes[pos + 1].1, vec![0x1f, 0x80]);

        assert_eq!(regs.get(CON_0) & HDMI_EN, HDMI_EN);
        assert_eq!(regs.get(TG_CMD), TG_EN | FIELD_EN);
        assert_eq!(regs.get(INT_PRO_MODE), 1);
        assert_eq!(regs.get(avi_byte(4)), 5);

        // Timing before enable
        let log = regs.writes();
        let last_timing = log.iter().rposition(|(off, _)| *off == TG_FIELD_BOT_HDMI_L + 4).unwrap();
        let enable = log.iter().rposition(|(off, _)| *off == TG_CMD).unwrap();
        assert!(last_timing < enable);

        let clocks = hdmi.board().clock_log();
        assert_eq!(
            clocks.last(),
            Some(&ClockOp::Enable(Clock::SclkHdmi))
        );
        assert!(clocks.contains(&ClockOp::SetParent(Clock::SclkHdmi, Clock::SclkHdmiPhy)));
    }

    #[test]
    fn test_commit_without_mode() {
        let (mut hdmi, _, _) = hdmi(HardwareGeneration::Gen2);
        hdmi.power_on().unwrap();
        assert_eq!(hdmi.commit(), Err(Error::InvalidArgument));
    }

    #[test]
    fn test_commit_bus_error_aborts() {
        let (mut hdmi, regs, bus) = hdmi(HardwareGeneration::Gen2);
        hdmi.power_on().unwrap();
        hdmi.mode_set(&preset("720p60").unwrap()).unwrap();
        bus.fail_all_writes(true);
        assert_eq!(hdmi.commit(), Err(Error::Bus));
        assert!(!hdmi.is_enabled());
        assert_eq!(regs.get(TG_CMD), 0);
    }

    #[test]
    fn test_pll_timeout_is_warning_unless_strict() {
        let (mut hdmi, regs, _) = hdmi(HardwareGeneration::Gen2);
        regs.set(PHY_STATUS_0, 0);
        hdmi.power_on().unwrap();
        hdmi.mode_set(&preset("720p60").unwrap()).unwrap();
        assert!(hdmi.commit().is_ok());
        assert_eq!(regs.get(TG_CMD), TG_EN);

        let strict = HdmiConfig::new(HardwareGeneration::Gen2).with_strict_pll_lock(true);
        let regs = FakeRegs::new();
        let mut hdmi = Hdmi::new(
            strict,
            regs.clone(),
            FakeI2c::new(),
            FakeBoard::new(),
            NoDelay,
            FakeMonitor::hdmi_with_audio(),
        );
        hdmi.power_on().unwrap();
        hdmi.mode_set(&preset("720p60").unwrap()).unwrap();
        assert_eq!(hdmi.commit(), Err(Error::Timeout(TimeoutSource::PllLock)));
        assert_eq!(regs.get(TG_CMD), 0);
    }

    #[test]
    fn test_dvi_sink_disables_packets() {
        let (mut hdmi, regs, _) = hdmi(HardwareGeneration::Gen2);
        // Capabilities never read: treated as DVI
        hdmi.power_on().unwrap();
        assert_eq!(regs.get(MODE_SEL) & MODE_MASK, MODE_DVI_EN);
        assert_eq!(
            regs.get(CON_2),
            (VID_PREAMBLE_DIS | GUARD_BAND_DIS) as u32
        );
        assert_eq!(regs.get(AVI_CON), 0);
        assert!(!regs.was_written(AVI_HEADER0));
    }

    #[test]
    fn test_gen1_audio_port() {
        let (mut hdmi, regs, _) = hdmi(HardwareGeneration::Gen1);
        hdmi.get_capabilities().unwrap();
        let port = hdmi.power_on().unwrap().unwrap();
        assert_eq!(port.sample_rate(), 44100);

        port.set_sample_rate(48000).unwrap();
        assert_eq!(regs.get(ACR_N0), (6144 & 0xff) as u32);
        assert_eq!(regs.get(I2S_CH_ST_3), 0x2);

        port.set_enabled(false).unwrap();
        assert_eq!(regs.get(V13_AUI_CON), 0);

        hdmi.power_off();
        assert_eq!(port.set_enabled(true), Err(Error::NotPowered));
        assert_eq!(port.set_sample_rate(44100), Err(Error::NotPowered));
    }

    #[test]
    fn test_gen2_has_no_audio_port() {
        let (mut hdmi, _, _) = hdmi(HardwareGeneration::Gen2);
        assert!(hdmi.power_on().unwrap().is_none());
        assert!(hdmi.audio_port().is_none());
    }

    #[test]
    fn test_standby_blanks_video() {
        let (mut hdmi, regs, _) = hdmi(HardwareGeneration::Gen2);
        hdmi.set_power(PowerMode::On).unwrap();
        assert_eq!(regs.get(CON_0) & BLUE_SCR_EN, 0);

        hdmi.set_power(PowerMode::Standby).unwrap();
        assert_eq!(regs.get(CON_0) & BLUE_SCR_EN, BLUE_SCR_EN);
        assert_eq!(regs.get(BLUE_SCREEN_G_1), 0);
        assert!(hdmi.is_powered());

        hdmi.set_power(PowerMode::Off).unwrap();
        assert!(!hdmi.is_powered());
    }

    #[test]
    fn test_hotplug_events() {
        let (mut hdmi, regs, _) = hdmi(HardwareGeneration::Gen2);
        let irq = hdmi.hotplug_irq();

        // Off: external line, no register access
        assert_eq!(irq.handle(), Some(HotplugEvent::Changed));
        assert!(!regs.was_written(INTC_FLAG));

        hdmi.power_on().unwrap();
        regs.set(INTC_FLAG, INTC_FLAG_HPD_PLUG);
        assert_eq!(irq.clone().handle(), Some(HotplugEvent::Plugged));
        assert_eq!(regs.writes_to(INTC_FLAG), vec![INTC_FLAG_HPD_PLUG]);

        let mut seen = Vec::new();
        let delivered = hdmi.dispatch_hotplug(&mut |e: HotplugEvent| seen.push(e));
        assert_eq!(delivered, 2);
        assert_eq!(seen, [HotplugEvent::Changed, HotplugEvent::Plugged]);
        assert_eq!(hdmi.dispatch_hotplug(&mut |_: HotplugEvent| {}), 0);
    }

    #[test]
    fn test_hotplug_queue_overflow() {
        let (hdmi, _, _) = hdmi(HardwareGeneration::Gen2);
        let irq = hdmi.hotplug_irq();
        for _ in 0..crate::config::HOTPLUG_QUEUE_DEPTH + 3 {
            irq.handle();
        }
        let mut count = 0;
        hdmi.dispatch_hotplug(&mut |_: HotplugEvent| count += 1);
        assert_eq!(count, crate::config::HOTPLUG_QUEUE_DEPTH);
    }

    #[test]
    fn test_is_connected() {
        let (mut hdmi, regs, _) = hdmi(HardwareGeneration::Gen2);
        hdmi.board.set_hpd_level(true);
        assert!(hdmi.is_connected());

        hdmi.power_on().unwrap();
        regs.set(HPD_STATUS, 0);
        assert!(!hdmi.is_connected());
        regs.set(HPD_STATUS, 1);
        assert!(hdmi.is_connected());
    }

    #[test]
    fn test_capabilities_missing() {
        let regs = FakeRegs::new();
        let mut hdmi = Hdmi::new(
            HdmiConfig::new(HardwareGeneration::Gen2),
            regs,
            FakeI2c::new(),
            FakeBoard::new(),
            NoDelay,
            FakeMonitor::absent(),
        );
        assert_eq!(hdmi.get_capabilities(), Err(Error::NotFound));
    }
}
