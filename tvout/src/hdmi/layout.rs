//! Mode translation into generation-specific register layouts.
//!
//! [`translate`] is pure: it turns a [`DisplayMode`] into a fully populated
//! [`RegisterLayout`] plus the CEA video identification code. Nothing is
//! written until [`RegisterLayout::write`] is called from the commit path.

use log::debug;

use super::preset::{self, Gen1Preset, TimingGenerator};
use super::regs::*;
use crate::config::HardwareGeneration;
use crate::error::{Error, Result};
use crate::mode::{cea_vic, DisplayMode, ModeFlags};
use crate::platform::RegisterBlock;
use crate::utils::le_bytes;

/// Value of a field that has no meaning for the current scan type
pub const NOT_APPLICABLE: u16 = 0xFFFF;

/// Samples the Gen2 sync counters lag behind the mode timings
const HSYNC_ADJUST: u32 = 2;

/// Active-area shift for the 1440x900 timing-generator limitation
const WIDE_900_SHIFT: u16 = 0xE0;

/// Gen1 registers come straight from a preset.
pub type Gen1Layout = Gen1Preset;

/// Gen2 core timing fields. Every field is 16 bits wide on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Gen2Core {
    pub h_blank: u16,
    pub v2_blank: u16,
    pub v1_blank: u16,
    pub v_line: u16,
    pub h_line: u16,
    pub hsync_pol: u8,
    pub vsync_pol: u8,
    pub int_pro_mode: u8,
    pub v_blank_f0: u16,
    pub v_blank_f1: u16,
    pub h_sync_start: u16,
    pub h_sync_end: u16,
    pub v_sync_line_bef_2: u16,
    pub v_sync_line_bef_1: u16,
    pub v_sync_line_aft_2: u16,
    pub v_sync_line_aft_1: u16,
    pub v_sync_line_aft_pxl_2: u16,
    pub v_sync_line_aft_pxl_1: u16,
    /// 3D / extended blanking F2..F5
    pub v_blank_ext: [u16; 4],
    /// 3D / extended sync-after lines 3..6
    pub v_sync_line_aft_ext: [u16; 4],
    /// 3D / extended sync-after pixels 3..6
    pub v_sync_line_aft_pxl_ext: [u16; 4],
    pub vact_space: [u16; 6],
}

/// Gen2 register image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Gen2Layout {
    pub core: Gen2Core,
    pub tg: TimingGenerator,
    pub vact_st3: u16,
    pub vact_st4: u16,
    pub tg_3d: u8,
}

/// Register image for one hardware generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterLayout {
    Gen1(Gen1Layout),
    Gen2(Gen2Layout),
}

/// Result of translating a mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeConfig {
    /// Pixel clock in Hz, used to pick the PHY entry
    pub pixel_clock: u32,
    /// CEA video identification code, 0 when not a CEA format
    pub vic: u8,
    pub interlaced: bool,
    pub layout: RegisterLayout,
}

/// True for the one timing that needs the active-area shift.
pub fn is_wide_900_quirk(mode: &DisplayMode) -> bool {
    mode.hdisplay == 1440 && mode.vdisplay == 900 && mode.clock_hz == 106_500_000
}

/// Translate `mode` into the register layout of `generation`.
///
/// Gen1 fails with [`Error::ModeRejected`] when no preset covers the mode.
/// Gen2 fails with [`Error::InvalidArgument`] on malformed timings.
pub fn translate(mode: &DisplayMode, generation: HardwareGeneration) -> Result<ModeConfig> {
    let layout = match generation {
        HardwareGeneration::Gen1 => {
            let preset = preset::find(mode).ok_or(Error::ModeRejected)?;
            RegisterLayout::Gen1(*preset)
        }
        HardwareGeneration::Gen2 => {
            if !mode.is_well_formed() {
                return Err(Error::InvalidArgument);
            }
            RegisterLayout::Gen2(gen2_layout(mode))
        }
    };

    let config = ModeConfig {
        pixel_clock: mode.clock_hz,
        vic: cea_vic(mode),
        interlaced: mode.is_interlaced(),
        layout,
    };
    debug!("hdmi: translated {} vic={}", mode, config.vic);
    Ok(config)
}

fn gen2_layout(m: &DisplayMode) -> Gen2Layout {
    let f = |v: u32| v as u16;
    let mut core = Gen2Core {
        h_blank: f(m.htotal - m.hdisplay),
        v_line: f(m.vtotal),
        h_line: f(m.htotal),
        hsync_pol: m.flags.contains(ModeFlags::NHSYNC) as u8,
        vsync_pol: m.flags.contains(ModeFlags::NVSYNC) as u8,
        int_pro_mode: m.is_interlaced() as u8,
        // A sync start at the active edge wraps, as the hardware expects
        h_sync_start: f(m.hsync_start.wrapping_sub(m.hdisplay).wrapping_sub(HSYNC_ADJUST)),
        h_sync_end: f(m.hsync_end.wrapping_sub(m.hdisplay).wrapping_sub(HSYNC_ADJUST)),
        v_blank_ext: [NOT_APPLICABLE; 4],
        v_sync_line_aft_ext: [NOT_APPLICABLE; 4],
        v_sync_line_aft_pxl_ext: [NOT_APPLICABLE; 4],
        vact_space: [NOT_APPLICABLE; 6],
        ..Gen2Core::default()
    };

    let mut tg = TimingGenerator {
        h_fsz: f(m.htotal),
        hact_st: f(m.htotal - m.hdisplay),
        hact_sz: f(m.hdisplay),
        v_fsz: f(m.vtotal),
        vsync: 0x1,
        vsync2: 0x233,
        field_chg: 0x233,
        vsync_top_hdmi: 0x1,
        vsync_bot_hdmi: 0x233,
        field_top_hdmi: 0x1,
        field_bot_hdmi: 0x233,
        ..TimingGenerator::default()
    };

    let (vact_st3, vact_st4);
    if m.is_interlaced() {
        let half_pixels = f(m.htotal / 2 + (m.hsync_start - m.hdisplay));
        core.v_sync_line_bef_2 = f((m.vsync_end - m.vdisplay) / 2);
        core.v_sync_line_bef_1 = f((m.vsync_start - m.vdisplay) / 2);
        core.v2_blank = f(m.vtotal / 2);
        core.v1_blank = f((m.vtotal - m.vdisplay) / 2);
        core.v_blank_f0 = f((m.vtotal + (m.vsync_end - m.vsync_start) * 4 + 5) / 2);
        core.v_blank_f1 = f(m.vtotal);
        core.v_sync_line_aft_2 = f(m.vtotal / 2 + 7);
        core.v_sync_line_aft_1 = f(m.vtotal / 2 + 2);
        core.v_sync_line_aft_pxl_2 = half_pixels;
        core.v_sync_line_aft_pxl_1 = half_pixels;
        tg.vact_st = f((m.vtotal - m.vdisplay) / 2);
        tg.vact_sz = f(m.vdisplay / 2);
        tg.vact_st2 = 0x249;
        vact_st3 = 0x0;
        vact_st4 = 0x0;
    } else {
        core.v_sync_line_bef_2 = f(m.vsync_end - m.vdisplay);
        core.v_sync_line_bef_1 = f(m.vsync_start - m.vdisplay);
        core.v2_blank = f(m.vtotal);
        core.v1_blank = f(m.vtotal - m.vdisplay);
        core.v_blank_f0 = NOT_APPLICABLE;
        core.v_blank_f1 = NOT_APPLICABLE;
        core.v_sync_line_aft_2 = NOT_APPLICABLE;
        core.v_sync_line_aft_1 = NOT_APPLICABLE;
        core.v_sync_line_aft_pxl_2 = NOT_APPLICABLE;
        core.v_sync_line_aft_pxl_1 = NOT_APPLICABLE;
        tg.vact_st = f(m.vtotal - m.vdisplay);
        tg.vact_sz = f(m.vdisplay);
        // reset values
        tg.vact_st2 = 0x248;
        vact_st3 = 0x47b;
        vact_st4 = 0x6ae;
    }

    if is_wide_900_quirk(m) {
        tg.hact_st = tg.hact_st.wrapping_sub(WIDE_900_SHIFT);
        tg.hact_sz += WIDE_900_SHIFT;
    }

    Gen2Layout {
        core,
        tg,
        vact_st3,
        vact_st4,
        tg_3d: 0,
    }
}

// =============================================================================
// Register writes
// =============================================================================

fn write_bytes<R: RegisterBlock>(regs: &R, offset: usize, bytes: &[u8]) {
    for (i, byte) in bytes.iter().enumerate() {
        regs.write_byte(offset + 4 * i, *byte);
    }
}

fn write_u16<R: RegisterBlock>(regs: &R, offset: usize, value: u16) {
    write_bytes(regs, offset, &le_bytes::<2>(value as u32));
}

fn write_tg<R: RegisterBlock>(regs: &R, tg: &TimingGenerator) {
    write_u16(regs, TG_H_FSZ_L, tg.h_fsz);
    write_u16(regs, TG_HACT_ST_L, tg.hact_st);
    write_u16(regs, TG_HACT_SZ_L, tg.hact_sz);
    write_u16(regs, TG_V_FSZ_L, tg.v_fsz);
    write_u16(regs, TG_VSYNC_L, tg.vsync);
    write_u16(regs, TG_VSYNC2_L, tg.vsync2);
    write_u16(regs, TG_VACT_ST_L, tg.vact_st);
    write_u16(regs, TG_VACT_SZ_L, tg.vact_sz);
    write_u16(regs, TG_FIELD_CHG_L, tg.field_chg);
    write_u16(regs, TG_VACT_ST2_L, tg.vact_st2);
    write_u16(regs, TG_VSYNC_TOP_HDMI_L, tg.vsync_top_hdmi);
    write_u16(regs, TG_VSYNC_BOT_HDMI_L, tg.vsync_bot_hdmi);
    write_u16(regs, TG_FIELD_TOP_HDMI_L, tg.field_top_hdmi);
    write_u16(regs, TG_FIELD_BOT_HDMI_L, tg.field_bot_hdmi);
}

impl RegisterLayout {
    pub fn generation(&self) -> HardwareGeneration {
        match self {
            RegisterLayout::Gen1(_) => HardwareGeneration::Gen1,
            RegisterLayout::Gen2(_) => HardwareGeneration::Gen2,
        }
    }

    /// Timing-generator window of either generation
    pub fn timing_generator(&self) -> &TimingGenerator {
        match self {
            RegisterLayout::Gen1(layout) => &layout.tg,
            RegisterLayout::Gen2(layout) => &layout.tg,
        }
    }

    /// Write every core and timing-generator field. The enable bits are not
    /// touched.
    pub fn write<R: RegisterBlock>(&self, regs: &R) {
        match self {
            RegisterLayout::Gen1(layout) => {
                let core = &layout.core;
                write_bytes(regs, H_BLANK_0, &core.h_blank);
                write_bytes(regs, V13_V_BLANK_0, &core.v_blank);
                write_bytes(regs, V13_H_V_LINE_0, &core.h_v_line);
                regs.write_byte(VSYNC_POL, core.vsync_pol);
                regs.write_byte(INT_PRO_MODE, core.int_pro_mode);
                write_bytes(regs, V13_V_BLANK_F_0, &core.v_blank_f);
                write_bytes(regs, V13_H_SYNC_GEN_0, &core.h_sync_gen);
                write_bytes(regs, V13_V_SYNC_GEN_1_0, &core.v_sync_gen1);
                write_bytes(regs, V13_V_SYNC_GEN_2_0, &core.v_sync_gen2);
                write_bytes(regs, V13_V_SYNC_GEN_3_0, &core.v_sync_gen3);
                write_tg(regs, &layout.tg);
            }
            RegisterLayout::Gen2(layout) => {
                let core = &layout.core;
                write_u16(regs, H_BLANK_0, core.h_blank);
                write_u16(regs, V2_BLANK_0, core.v2_blank);
                write_u16(regs, V1_BLANK_0, core.v1_blank);
                write_u16(regs, V_LINE_0, core.v_line);
                write_u16(regs, H_LINE_0, core.h_line);
                regs.write_byte(HSYNC_POL, core.hsync_pol);
                regs.write_byte(VSYNC_POL, core.vsync_pol);
                regs.write_byte(INT_PRO_MODE, core.int_pro_mode);
                write_u16(regs, V_BLANK_F0_0, core.v_blank_f0);
                write_u16(regs, V_BLANK_F1_0, core.v_blank_f1);
                write_u16(regs, H_SYNC_START_0, core.h_sync_start);
                write_u16(regs, H_SYNC_END_0, core.h_sync_end);
                write_u16(regs, V_SYNC_LINE_BEF_2_0, core.v_sync_line_bef_2);
                write_u16(regs, V_SYNC_LINE_BEF_1_0, core.v_sync_line_bef_1);
                write_u16(regs, V_SYNC_LINE_AFT_2_0, core.v_sync_line_aft_2);
                write_u16(regs, V_SYNC_LINE_AFT_1_0, core.v_sync_line_aft_1);
                write_u16(regs, V_SYNC_LINE_AFT_PXL_2_0, core.v_sync_line_aft_pxl_2);
                write_u16(regs, V_SYNC_LINE_AFT_PXL_1_0, core.v_sync_line_aft_pxl_1);

                // F2..F5, AFT_3..6 and AFT_PXL_3..6 are each four consecutive
                // 8-byte-strided fields.
                for i in 0..4 {
                    write_u16(regs, V_BLANK_F2_0 + 8 * i, core.v_blank_ext[i]);
                    write_u16(regs, V_SYNC_LINE_AFT_3_0 + 8 * i, core.v_sync_line_aft_ext[i]);
                    write_u16(
                        regs,
                        V_SYNC_LINE_AFT_PXL_3_0 + 8 * i,
                        core.v_sync_line_aft_pxl_ext[i],
                    );
                }
                for (i, space) in core.vact_space.iter().enumerate() {
                    write_u16(regs, VACT_SPACE_1_0 + 8 * i, *space);
                }

                write_tg(regs, &layout.tg);
                write_u16(regs, TG_VACT_ST3_L, layout.vact_st3);
                write_u16(regs, TG_VACT_ST4_L, layout.vact_st4);
                regs.write_byte(TG_3D, layout.tg_3d);
            }
        }
    }
}
