//! HDMI encoder register map.
//!
//! Byte-wide registers sit at word-aligned offsets; multi-byte fields span
//! consecutive registers, least significant byte first.

use crate::config::HardwareGeneration;

// =============================================================================
// Register Windows
// =============================================================================

pub const CTRL_BASE: usize = 0x0000_0000;
pub const CORE_BASE: usize = 0x0001_0000;
pub const I2S_BASE: usize = 0x0004_0000;
pub const TG_BASE: usize = 0x0005_0000;

// =============================================================================
// Control Registers
// =============================================================================

pub const INTC_CON: usize = CTRL_BASE + 0x0000;
pub const INTC_FLAG: usize = CTRL_BASE + 0x0004;
pub const HPD_STATUS: usize = CTRL_BASE + 0x000C;

// Gen1 only
pub const V13_PHY_RSTOUT: usize = CTRL_BASE + 0x0014;
pub const V13_PHY_VPLL: usize = CTRL_BASE + 0x0018;
pub const V13_PHY_CMU: usize = CTRL_BASE + 0x001C;
pub const V13_CORE_RSTOUT: usize = CTRL_BASE + 0x0020;

// Gen2 only
pub const PHY_STATUS_0: usize = CTRL_BASE + 0x0020;
pub const PHY_RSTOUT: usize = CTRL_BASE + 0x0074;
pub const CORE_RSTOUT: usize = CTRL_BASE + 0x0080;

// INTC_CON bits
pub const INTC_EN_GLOBAL: u32 = 1 << 6;
pub const INTC_EN_HPD_PLUG: u32 = 1 << 3;
pub const INTC_EN_HPD_UNPLUG: u32 = 1 << 2;

// INTC_FLAG bits
pub const INTC_FLAG_HPD_PLUG: u32 = 1 << 3;
pub const INTC_FLAG_HPD_UNPLUG: u32 = 1 << 2;

pub const PHY_STATUS_READY: u32 = 1 << 0;
pub const PHY_SW_RSTOUT: u32 = 1 << 0;
pub const CORE_SW_RSTOUT: u32 = 1 << 0;

// =============================================================================
// Core Registers
// =============================================================================

pub const CON_0: usize = CORE_BASE + 0x0000;
pub const CON_1: usize = CORE_BASE + 0x0004;
pub const CON_2: usize = CORE_BASE + 0x0008;
pub const SYS_STATUS: usize = CORE_BASE + 0x0010;
pub const V13_PHY_STATUS: usize = CORE_BASE + 0x0014;
pub const STATUS_EN: usize = CORE_BASE + 0x0020;
pub const HPD: usize = CORE_BASE + 0x0030;
pub const MODE_SEL: usize = CORE_BASE + 0x0040;
pub const ENC_EN: usize = CORE_BASE + 0x0044;

// CON_0 bits
pub const HDMI_EN: u32 = 1 << 0;
pub const ASP_EN: u32 = 1 << 2;
pub const ASP_DIS: u32 = 0;
pub const ASP_MASK: u32 = 1 << 2;
pub const BLUE_SCR_EN: u32 = 1 << 5;

// CON_2 bits
pub const GUARD_BAND_DIS: u8 = 1 << 1;
pub const VID_PREAMBLE_DIS: u8 = 1 << 5;

// MODE_SEL bits
pub const MODE_DVI_EN: u32 = 1 << 0;
pub const MODE_HDMI_EN: u32 = 1 << 1;
pub const MODE_MASK: u32 = 3;

// Gen1 blue screen colour
pub const V13_BLUE_SCREEN_0: usize = CORE_BASE + 0x0050;
pub const V13_BLUE_SCREEN_1: usize = CORE_BASE + 0x0054;
pub const V13_BLUE_SCREEN_2: usize = CORE_BASE + 0x0058;

// Gen2 blue screen colour
pub const BLUE_SCREEN_R_0: usize = CORE_BASE + 0x0050;
pub const BLUE_SCREEN_R_1: usize = CORE_BASE + 0x0054;
pub const BLUE_SCREEN_G_0: usize = CORE_BASE + 0x0058;
pub const BLUE_SCREEN_G_1: usize = CORE_BASE + 0x005C;
pub const BLUE_SCREEN_B_0: usize = CORE_BASE + 0x0060;
pub const BLUE_SCREEN_B_1: usize = CORE_BASE + 0x0064;

// Timing fields shared by both generations
pub const H_BLANK_0: usize = CORE_BASE + 0x00A0;
pub const HSYNC_POL: usize = CORE_BASE + 0x00E0;
pub const VSYNC_POL: usize = CORE_BASE + 0x00E4;
pub const INT_PRO_MODE: usize = CORE_BASE + 0x00E8;

// Gen1 timing fields (narrow, preset-driven)
pub const V13_V_BLANK_0: usize = CORE_BASE + 0x00B0;
pub const V13_H_V_LINE_0: usize = CORE_BASE + 0x00C0;
pub const V13_V_BLANK_F_0: usize = CORE_BASE + 0x0110;
pub const V13_H_SYNC_GEN_0: usize = CORE_BASE + 0x0120;
pub const V13_V_SYNC_GEN_1_0: usize = CORE_BASE + 0x0130;
pub const V13_V_SYNC_GEN_2_0: usize = CORE_BASE + 0x0140;
pub const V13_V_SYNC_GEN_3_0: usize = CORE_BASE + 0x0150;

// Gen2 timing fields (computed)
pub const V2_BLANK_0: usize = CORE_BASE + 0x00B0;
pub const V1_BLANK_0: usize = CORE_BASE + 0x00B8;
pub const V_LINE_0: usize = CORE_BASE + 0x00C0;
pub const H_LINE_0: usize = CORE_BASE + 0x00C8;
pub const V_BLANK_F0_0: usize = CORE_BASE + 0x0110;
pub const V_BLANK_F1_0: usize = CORE_BASE + 0x0118;
pub const H_SYNC_START_0: usize = CORE_BASE + 0x0120;
pub const H_SYNC_END_0: usize = CORE_BASE + 0x0128;
pub const V_SYNC_LINE_BEF_2_0: usize = CORE_BASE + 0x0130;
pub const V_SYNC_LINE_BEF_1_0: usize = CORE_BASE + 0x0138;
pub const V_SYNC_LINE_AFT_2_0: usize = CORE_BASE + 0x0140;
pub const V_SYNC_LINE_AFT_1_0: usize = CORE_BASE + 0x0148;
pub const V_SYNC_LINE_AFT_PXL_2_0: usize = CORE_BASE + 0x0150;
pub const V_SYNC_LINE_AFT_PXL_1_0: usize = CORE_BASE + 0x0158;
pub const V_BLANK_F2_0: usize = CORE_BASE + 0x0160;
pub const V_BLANK_F3_0: usize = CORE_BASE + 0x0168;
pub const V_BLANK_F4_0: usize = CORE_BASE + 0x0170;
pub const V_BLANK_F5_0: usize = CORE_BASE + 0x0178;
pub const V_SYNC_LINE_AFT_3_0: usize = CORE_BASE + 0x0180;
pub const V_SYNC_LINE_AFT_4_0: usize = CORE_BASE + 0x0188;
pub const V_SYNC_LINE_AFT_5_0: usize = CORE_BASE + 0x0190;
pub const V_SYNC_LINE_AFT_6_0: usize = CORE_BASE + 0x0198;
pub const V_SYNC_LINE_AFT_PXL_3_0: usize = CORE_BASE + 0x01A0;
pub const V_SYNC_LINE_AFT_PXL_4_0: usize = CORE_BASE + 0x01A8;
pub const V_SYNC_LINE_AFT_PXL_5_0: usize = CORE_BASE + 0x01B0;
pub const V_SYNC_LINE_AFT_PXL_6_0: usize = CORE_BASE + 0x01B8;
pub const VACT_SPACE_1_0: usize = CORE_BASE + 0x01C0;
pub const VACT_SPACE_2_0: usize = CORE_BASE + 0x01C8;
pub const VACT_SPACE_3_0: usize = CORE_BASE + 0x01D0;
pub const VACT_SPACE_4_0: usize = CORE_BASE + 0x01D8;
pub const VACT_SPACE_5_0: usize = CORE_BASE + 0x01E0;
pub const VACT_SPACE_6_0: usize = CORE_BASE + 0x01E8;

// Gen1 packet control
pub const V13_ACR_CON: usize = CORE_BASE + 0x0180;
pub const V13_AVI_CON: usize = CORE_BASE + 0x0300;
pub const V13_AUI_CON: usize = CORE_BASE + 0x0360;
pub const V13_SPD_CON: usize = CORE_BASE + 0x0400;

/// Gen1 AVI payload byte `n` (0-based)
pub const fn v13_avi_byte(n: usize) -> usize {
    CORE_BASE + 0x0320 + 4 * n
}

// Audio clock recovery (shared offsets, control register differs)
pub const ACR_CON: usize = CORE_BASE + 0x0400;
pub const ACR_MCTS0: usize = CORE_BASE + 0x0410;
pub const ACR_MCTS1: usize = CORE_BASE + 0x0414;
pub const ACR_MCTS2: usize = CORE_BASE + 0x0418;
pub const ACR_CTS0: usize = CORE_BASE + 0x0420;
pub const ACR_CTS1: usize = CORE_BASE + 0x0424;
pub const ACR_CTS2: usize = CORE_BASE + 0x0428;
pub const ACR_N0: usize = CORE_BASE + 0x0430;
pub const ACR_N1: usize = CORE_BASE + 0x0434;
pub const ACR_N2: usize = CORE_BASE + 0x0438;

// Gen2 packet registers
pub const AVI_CON: usize = CORE_BASE + 0x0300;
pub const VSI_CON: usize = CORE_BASE + 0x0700;
pub const AVI_HEADER0: usize = CORE_BASE + 0x0710;
pub const AVI_CHECK_SUM: usize = CORE_BASE + 0x071C;
pub const AUI_CON: usize = CORE_BASE + 0x0800;
pub const AUI_HEADER0: usize = CORE_BASE + 0x0810;
pub const AUI_CHECK_SUM: usize = CORE_BASE + 0x081C;

/// Gen2 AVI payload byte `n` (1-based)
pub const fn avi_byte(n: usize) -> usize {
    CORE_BASE + 0x0720 + 4 * (n - 1)
}

/// Gen2 audio infoframe payload byte `n` (1-based)
pub const fn aui_byte(n: usize) -> usize {
    CORE_BASE + 0x0820 + 4 * (n - 1)
}

pub const AVI_CON_DO_NOT_TRANSMIT: u8 = 0;
pub const AVI_CON_EVERY_VSYNC: u8 = 1 << 1;
pub const AUI_CON_NO_TRAN: u8 = 0;
pub const AUI_CON_EVERY_VSYNC: u8 = 1 << 1;
pub const VSI_CON_DO_NOT_TRANSMIT: u8 = 0;

// =============================================================================
// I2S Audio Input
// =============================================================================

pub const I2S_CLK_CON: usize = I2S_BASE + 0x0000;
pub const I2S_CON_1: usize = I2S_BASE + 0x0004;
pub const I2S_CON_2: usize = I2S_BASE + 0x0008;
pub const I2S_PIN_SEL_0: usize = I2S_BASE + 0x000C;
pub const I2S_PIN_SEL_1: usize = I2S_BASE + 0x0010;
pub const I2S_PIN_SEL_2: usize = I2S_BASE + 0x0014;
pub const I2S_PIN_SEL_3: usize = I2S_BASE + 0x0018;
pub const I2S_DSD_CON: usize = I2S_BASE + 0x001C;
pub const I2S_MUX_CON: usize = I2S_BASE + 0x0020;
pub const I2S_CH_ST_CON: usize = I2S_BASE + 0x0024;
pub const I2S_CH_ST_0: usize = I2S_BASE + 0x0028;
pub const I2S_CH_ST_1: usize = I2S_BASE + 0x002C;
pub const I2S_CH_ST_2: usize = I2S_BASE + 0x0030;
pub const I2S_CH_ST_3: usize = I2S_BASE + 0x0034;
pub const I2S_CH_ST_4: usize = I2S_BASE + 0x0038;
pub const I2S_MUX_CH: usize = I2S_BASE + 0x0054;
pub const I2S_MUX_CUV: usize = I2S_BASE + 0x0058;

pub const I2S_CLK_DIS: u8 = 0;
pub const I2S_CLK_EN: u8 = 1;

// I2S_MUX_CON
pub const I2S_IN_DISABLE: u8 = 1 << 7;
pub const I2S_AUD_I2S: u8 = 1 << 2;
pub const I2S_CUV_I2S_ENABLE: u8 = 1 << 1;
pub const I2S_MUX_ENABLE: u8 = 1 << 0;

// I2S_MUX_CH
pub const I2S_CH0_EN: u8 = 3 << 0;
pub const I2S_CH1_EN: u8 = 3 << 2;
pub const I2S_CH2_EN: u8 = 3 << 4;

pub const I2S_CUV_RL_EN: u8 = 0x03;

// I2S_PIN_SEL
pub const fn i2s_sel_low(pin: u8) -> u8 {
    pin & 0x7
}
pub const fn i2s_sel_high(pin: u8) -> u8 {
    (pin & 0x7) << 4
}

// I2S_CON_1
pub const I2S_SCLK_FALLING_EDGE: u8 = 1 << 1;
pub const I2S_L_CH_LOW_POL: u8 = 1 << 0;

// I2S_CON_2
pub const I2S_MSB_FIRST_MODE: u8 = 0;
pub const I2S_BASIC_FORMAT: u8 = 0;
pub const fn i2s_set_bit_ch(bits: u8) -> u8 {
    (bits & 0x3) << 4
}
pub const fn i2s_set_sdata_bit(bits: u8) -> u8 {
    (bits & 0x3) << 2
}

// I2S_CH_ST
pub const I2S_CH_STATUS_MODE_0: u8 = 0 << 6;
pub const I2S_2AUD_CH_WITHOUT_PREEMPH: u8 = 0 << 3;
pub const I2S_COPYRIGHT: u8 = 0 << 2;
pub const I2S_LINEAR_PCM: u8 = 0 << 1;
pub const I2S_CONSUMER_FORMAT: u8 = 0;
pub const I2S_CD_PLAYER: u8 = 0x00;
pub const fn i2s_set_source_num(n: u8) -> u8 {
    n & 0xf
}
pub const I2S_CLK_ACCUR_LEVEL_2: u8 = 0 << 4;
pub const fn i2s_set_smp_freq(code: u8) -> u8 {
    code & 0xf
}
pub const I2S_ORG_SMP_FREQ_44_1: u8 = 0xf << 4;
pub const I2S_WORD_LEN_MAX24_24BITS: u8 = 0x5 << 1;
pub const I2S_WORD_LEN_MAX_24BITS: u8 = 1 << 0;
pub const I2S_CH_STATUS_RELOAD: u8 = 1 << 0;

// =============================================================================
// Timing Generator
// =============================================================================

pub const TG_CMD: usize = TG_BASE + 0x0000;
pub const TG_H_FSZ_L: usize = TG_BASE + 0x0018;
pub const TG_HACT_ST_L: usize = TG_BASE + 0x0020;
pub const TG_HACT_SZ_L: usize = TG_BASE + 0x0028;
pub const TG_V_FSZ_L: usize = TG_BASE + 0x0030;
pub const TG_VSYNC_L: usize = TG_BASE + 0x0038;
pub const TG_VSYNC2_L: usize = TG_BASE + 0x0040;
pub const TG_VACT_ST_L: usize = TG_BASE + 0x0048;
pub const TG_VACT_SZ_L: usize = TG_BASE + 0x0050;
pub const TG_FIELD_CHG_L: usize = TG_BASE + 0x0058;
pub const TG_VACT_ST2_L: usize = TG_BASE + 0x0060;
pub const TG_VACT_ST3_L: usize = TG_BASE + 0x0068;
pub const TG_VACT_ST4_L: usize = TG_BASE + 0x0070;
pub const TG_VSYNC_TOP_HDMI_L: usize = TG_BASE + 0x0078;
pub const TG_VSYNC_BOT_HDMI_L: usize = TG_BASE + 0x0080;
pub const TG_FIELD_TOP_HDMI_L: usize = TG_BASE + 0x0088;
pub const TG_FIELD_BOT_HDMI_L: usize = TG_BASE + 0x0090;
pub const TG_3D: usize = TG_BASE + 0x00F0;

// TG_CMD bits
pub const TG_EN: u32 = 1 << 0;
pub const FIELD_EN: u32 = 1 << 1;

// =============================================================================
// Per-generation selectors
// =============================================================================

/// Registers whose location depends on the hardware generation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationRegs {
    pub phy_rstout: usize,
    pub core_rstout: usize,
    pub phy_status: usize,
    pub acr_con: usize,
}

impl GenerationRegs {
    pub const fn of(generation: HardwareGeneration) -> Self {
        match generation {
            HardwareGeneration::Gen1 => Self {
                phy_rstout: V13_PHY_RSTOUT,
                core_rstout: V13_CORE_RSTOUT,
                phy_status: V13_PHY_STATUS,
                acr_con: V13_ACR_CON,
            },
            HardwareGeneration::Gen2 => Self {
                phy_rstout: PHY_RSTOUT,
                core_rstout: CORE_RSTOUT,
                phy_status: PHY_STATUS_0,
                acr_con: ACR_CON,
            },
        }
    }
}
