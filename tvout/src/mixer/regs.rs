//! Mixer and video processor register map.

// =============================================================================
// Mixer
// =============================================================================

pub const MXR_STATUS: usize = 0x0000;
pub const MXR_CFG: usize = 0x0004;
pub const MXR_INT_EN: usize = 0x0008;
pub const MXR_INT_STATUS: usize = 0x000C;
pub const MXR_LAYER_CFG: usize = 0x0010;
pub const MXR_VIDEO_CFG: usize = 0x0014;

pub const MXR_GRAPHIC0_CFG: usize = 0x0020;
pub const MXR_GRAPHIC0_BASE: usize = 0x0024;
pub const MXR_GRAPHIC0_SPAN: usize = 0x0028;
pub const MXR_GRAPHIC0_SXY: usize = 0x002C;
pub const MXR_GRAPHIC0_WH: usize = 0x0030;
pub const MXR_GRAPHIC0_DXY: usize = 0x0034;

pub const MXR_GRAPHIC1_CFG: usize = 0x0040;
pub const MXR_GRAPHIC1_BASE: usize = 0x0044;
pub const MXR_GRAPHIC1_SPAN: usize = 0x0048;
pub const MXR_GRAPHIC1_SXY: usize = 0x004C;
pub const MXR_GRAPHIC1_WH: usize = 0x0050;
pub const MXR_GRAPHIC1_DXY: usize = 0x0054;

pub const MXR_BG_CFG: usize = 0x0060;
pub const MXR_BG_COLOR0: usize = 0x0064;
pub const MXR_BG_COLOR1: usize = 0x0068;
pub const MXR_BG_COLOR2: usize = 0x006C;

pub const MXR_CM_COEFF_Y: usize = 0x0080;
pub const MXR_CM_COEFF_CB: usize = 0x0084;
pub const MXR_CM_COEFF_CR: usize = 0x0088;

// Per graphics layer, stride 0x20
pub const fn graphic_cfg(layer: usize) -> usize {
    MXR_GRAPHIC0_CFG + layer * 0x20
}
pub const fn graphic_base(layer: usize) -> usize {
    MXR_GRAPHIC0_BASE + layer * 0x20
}
pub const fn graphic_span(layer: usize) -> usize {
    MXR_GRAPHIC0_SPAN + layer * 0x20
}
pub const fn graphic_sxy(layer: usize) -> usize {
    MXR_GRAPHIC0_SXY + layer * 0x20
}
pub const fn graphic_wh(layer: usize) -> usize {
    MXR_GRAPHIC0_WH + layer * 0x20
}
pub const fn graphic_dxy(layer: usize) -> usize {
    MXR_GRAPHIC0_DXY + layer * 0x20
}
/// Shadow copy latched at vsync
pub const fn graphic_base_shadow(layer: usize) -> usize {
    0x2024 + layer * 0x20
}

// MXR_STATUS
pub const MXR_STATUS_SOFT_RESET: u32 = 1 << 8;
pub const MXR_STATUS_16_BURST: u32 = 1 << 7;
pub const MXR_STATUS_BURST_MASK: u32 = 1 << 7;
pub const MXR_STATUS_SYNC_ENABLE: u32 = 1 << 2;
pub const MXR_STATUS_REG_RUN: u32 = 1 << 0;

// MXR_CFG
pub const MXR_CFG_LAYER_UPDATE: u32 = 1 << 31;
pub const MXR_CFG_LAYER_UPDATE_COUNT_MASK: u32 = 3 << 29;
pub const MXR_CFG_LAYER_UPDATE_COUNT_SHIFT: u32 = 29;
pub const MXR_CFG_RGB601_0_255: u32 = 0 << 9;
pub const MXR_CFG_RGB601_16_235: u32 = 1 << 9;
pub const MXR_CFG_RGB709_0_255: u32 = 2 << 9;
pub const MXR_CFG_RGB709_16_235: u32 = 3 << 9;
pub const MXR_CFG_RGB_FMT_MASK: u32 = 0x600;
pub const MXR_CFG_OUT_YUV444: u32 = 0 << 8;
pub const MXR_CFG_OUT_RGB888: u32 = 1 << 8;
pub const MXR_CFG_OUT_MASK: u32 = 1 << 8;
pub const MXR_CFG_DST_SDO: u32 = 0 << 7;
pub const MXR_CFG_DST_HDMI: u32 = 1 << 7;
pub const MXR_CFG_DST_MASK: u32 = 1 << 7;
pub const MXR_CFG_SCAN_HD_720: u32 = 0 << 6;
pub const MXR_CFG_SCAN_HD_1080: u32 = 1 << 6;
pub const MXR_CFG_GRP1_ENABLE: u32 = 1 << 5;
pub const MXR_CFG_GRP0_ENABLE: u32 = 1 << 4;
pub const MXR_CFG_VP_ENABLE: u32 = 1 << 3;
pub const MXR_CFG_SCAN_INTERLACE: u32 = 0 << 2;
pub const MXR_CFG_SCAN_PROGRESSIVE: u32 = 1 << 2;
pub const MXR_CFG_SCAN_NTSC: u32 = 0 << 1;
pub const MXR_CFG_SCAN_PAL: u32 = 1 << 1;
pub const MXR_CFG_SCAN_SD: u32 = 0;
pub const MXR_CFG_SCAN_HD: u32 = 1 << 0;
pub const MXR_CFG_SCAN_MASK: u32 = 0x47;

// MXR_GRAPHICn_CFG
pub const MXR_GRP_CFG_COLOR_KEY_DISABLE: u32 = 1 << 21;
pub const MXR_GRP_CFG_BLEND_PRE_MUL: u32 = 1 << 20;
pub const MXR_GRP_CFG_WIN_BLEND_EN: u32 = 1 << 17;
pub const MXR_GRP_CFG_PIXEL_BLEND_EN: u32 = 1 << 16;
pub const MXR_GRP_CFG_FORMAT_MASK: u32 = 0xf << 8;
pub const fn grp_cfg_format(fmt: u32) -> u32 {
    fmt << 8
}
pub const fn grp_cfg_alpha(alpha: u32) -> u32 {
    alpha & 0xff
}

// Graphics pixel format codes
pub const GRP_FMT_ARGB4444: u32 = 6;
pub const GRP_FMT_ARGB8888: u32 = 7;

// MXR_GRAPHICn_WH / SXY / DXY
pub const fn grp_wh(width: u32, height: u32, h_scale: u32, v_scale: u32) -> u32 {
    (h_scale << 28) | ((width & 0x7ff) << 16) | (v_scale << 12) | (height & 0x7ff)
}
pub const fn grp_xy(x: u32, y: u32) -> u32 {
    ((x & 0x7ff) << 16) | (y & 0x7ff)
}

// MXR_INT_EN / MXR_INT_STATUS
pub const MXR_INT_EN_VSYNC: u32 = 1 << 11;
pub const MXR_INT_CLEAR_VSYNC: u32 = 1 << 11;
pub const MXR_INT_STATUS_VSYNC: u32 = 1 << 0;

// MXR_LAYER_CFG priorities
pub const fn layer_cfg(grp1: u32, grp0: u32, vp: u32) -> u32 {
    (grp1 << 8) | (grp0 << 4) | vp
}

pub const MXR_BG_COLOR_DEFAULT: u32 = 0x008080;

// BT.709 limited range colour matrix
pub const CM_COEFF_Y: u32 = (1 << 30) | (94 << 20) | (314 << 10) | 32;
pub const CM_COEFF_CB: u32 = (972 << 20) | (851 << 10) | 225;
pub const CM_COEFF_CR: u32 = (225 << 20) | (820 << 10) | 1004;

// =============================================================================
// Video processor
// =============================================================================

pub const VP_ENABLE: usize = 0x0000;
pub const VP_SRESET: usize = 0x0004;
pub const VP_SHADOW_UPDATE: usize = 0x0008;
pub const VP_FIELD_ID: usize = 0x000C;
pub const VP_MODE: usize = 0x0010;
pub const VP_IMG_SIZE_Y: usize = 0x0014;
pub const VP_IMG_SIZE_C: usize = 0x0018;
pub const VP_PER_RATE_CTRL: usize = 0x001C;
pub const VP_TOP_Y_PTR: usize = 0x0028;
pub const VP_BOT_Y_PTR: usize = 0x002C;
pub const VP_TOP_C_PTR: usize = 0x0030;
pub const VP_BOT_C_PTR: usize = 0x0034;
pub const VP_SRC_H_POSITION: usize = 0x0044;
pub const VP_SRC_V_POSITION: usize = 0x0048;
pub const VP_SRC_WIDTH: usize = 0x004C;
pub const VP_SRC_HEIGHT: usize = 0x0050;
pub const VP_DST_H_POSITION: usize = 0x0054;
pub const VP_DST_V_POSITION: usize = 0x0058;
pub const VP_DST_WIDTH: usize = 0x005C;
pub const VP_DST_HEIGHT: usize = 0x0060;
pub const VP_H_RATIO: usize = 0x0064;
pub const VP_V_RATIO: usize = 0x0068;
pub const VP_POLY8_Y0_LL: usize = 0x006C;
pub const VP_POLY4_Y0_LL: usize = 0x00EC;
pub const VP_POLY4_C0_LL: usize = 0x012C;
pub const VP_ENDIAN_MODE: usize = 0x03CC;

pub const VP_ENABLE_ON: u32 = 1 << 0;
pub const VP_SRESET_PROCESSING: u32 = 1 << 0;
pub const VP_SHADOW_UPDATE_ENABLE: u32 = 1 << 0;

pub const VP_MODE_NV12: u32 = 0 << 6;
pub const VP_MODE_NV21: u32 = 1 << 6;
pub const VP_MODE_LINE_SKIP: u32 = 1 << 5;
pub const VP_MODE_MEM_LINEAR: u32 = 0 << 4;
pub const VP_MODE_MEM_TILED: u32 = 1 << 4;
pub const VP_MODE_FMT_MASK: u32 = 5 << 4;

pub const fn vp_img_size(h: u32, v: u32) -> u32 {
    (h << 16) | v
}
pub const fn vp_src_h_position(x: u32) -> u32 {
    x << 4
}

pub const VP_ENDIAN_MODE_LITTLE: u32 = 1 << 0;
