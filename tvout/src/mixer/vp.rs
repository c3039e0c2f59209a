//! Video processor: the scaler in front of the video layer (Gen1 only).

use embedded_hal::delay::DelayNs;
use log::debug;

use super::layer::{PixelFormat, WindowLayer};
use super::regs::*;
use crate::error::{Error, Result, TimeoutSource};
use crate::platform::RegisterBlock;
use crate::utils::poll_until;

/// Soft reset poll budget
const RESET_ATTEMPTS: u32 = 100;
const RESET_INTERVAL_MS: u32 = 10;

/// Second-field offset for tiled buffers
const TILED_FIELD_OFFSET: u32 = 0x40;

// Default polyphase coefficients, signed taps
#[rustfmt::skip]
const FILTER_Y_HORIZ_TAP8: [i8; 64] = [
    0,   -1,  -1,  -1,  -1,  -1,  -1,  -1,
    -1,  -1,  -1,  -1,  -1,  0,   0,   0,
    0,   2,   4,   5,   6,   6,   6,   6,
    6,   5,   5,   4,   3,   2,   1,   1,
    0,   -6,  -12, -16, -18, -20, -21, -20,
    -20, -18, -16, -13, -10, -8,  -5,  -2,
    127, 126, 125, 121, 114, 107, 99,  89,
    79,  68,  57,  46,  35,  25,  16,  8,
];

#[rustfmt::skip]
const FILTER_Y_VERT_TAP4: [i8; 64] = [
    0,   -3,  -6,  -8,  -8,  -8,  -8,  -7,
    -6,  -5,  -4,  -3,  -2,  -1,  -1,  0,
    127, 126, 124, 118, 111, 102, 92,  81,
    70,  59,  48,  37,  27,  19,  11,  5,
    0,   5,   11,  19,  27,  37,  48,  59,
    70,  81,  92,  102, 111, 118, 124, 126,
    0,   0,   -1,  -1,  -2,  -3,  -4,  -5,
    -6,  -7,  -8,  -8,  -8,  -8,  -6,  -3,
];

#[rustfmt::skip]
const FILTER_CR_HORIZ_TAP4: [i8; 32] = [
    0,   -3,  -6,  -8,  -8,  -8,  -8,  -7,
    -6,  -5,  -4,  -3,  -2,  -1,  -1,  0,
    127, 126, 124, 118, 111, 102, 92,  81,
    70,  59,  48,  37,  27,  19,  11,  5,
];

/// Pack taps four to a register, first tap in the top byte.
fn filter_set<R: RegisterBlock>(vp: &R, offset: usize, taps: &[i8]) {
    for (i, chunk) in taps.chunks_exact(4).enumerate() {
        let word = chunk
            .iter()
            .fold(0u32, |acc, tap| (acc << 8) | (*tap as u8) as u32);
        vp.write(offset + 4 * i, word);
    }
}

/// Load the default scaling filters
pub(crate) fn default_filter<R: RegisterBlock>(vp: &R) {
    filter_set(vp, VP_POLY8_Y0_LL, &FILTER_Y_HORIZ_TAP8);
    filter_set(vp, VP_POLY4_Y0_LL, &FILTER_Y_VERT_TAP4);
    filter_set(vp, VP_POLY4_C0_LL, &FILTER_CR_HORIZ_TAP4);
}

/// Start a soft reset of the video processor.
pub(crate) fn start_reset<R: RegisterBlock>(vp: &R) {
    vp.write(VP_SRESET, VP_SRESET_PROCESSING);
}

pub(crate) fn reset_idle<R: RegisterBlock>(vp: &R) -> bool {
    vp.read(VP_SRESET) & VP_SRESET_PROCESSING == 0
}

/// Wait for a started soft reset to finish. `idle` samples [`reset_idle`];
/// callers decide what they hold while sampling.
pub(crate) fn wait_reset<D, F>(delay: &mut D, idle: F) -> Result<()>
where
    D: DelayNs,
    F: FnMut() -> bool,
{
    poll_until(RESET_ATTEMPTS, RESET_INTERVAL_MS, delay, idle)
        .map(|_| ())
        .map_err(|_| Error::Timeout(TimeoutSource::VideoProcessorReset))
}

/// Horizontal and vertical scaling ratios in 16.16 fixed point.
///
/// Both ratios are computed from the destination size alone, so the scaler
/// always runs 1:1 whatever the source crop is.
pub fn scaling_ratios(win: &WindowLayer) -> (u32, u32) {
    let ratio = |dst: u32| if dst == 0 { 0 } else { (dst << 16) / dst };
    (ratio(win.crtc_width), ratio(win.crtc_height))
}

/// Buffer pointers for the top and bottom fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoBuffers {
    pub luma: [u32; 2],
    pub chroma: [u32; 2],
    pub tiled: bool,
}

/// Work out plane addresses for `win`. Non-YUV formats are rejected unless
/// the layer carries no buffer at all.
pub fn video_buffers(win: &WindowLayer) -> Result<VideoBuffers> {
    let tiled = match win.format {
        PixelFormat::Nv12Tiled => true,
        PixelFormat::Nv12 => false,
        _ if win.dma_addr == 0 => false,
        _ => return Err(Error::InvalidArgument),
    };

    let luma0 = win.dma_addr;
    let chroma0 = if win.chroma_dma_addr != 0 {
        win.chroma_dma_addr
    } else {
        luma0.wrapping_add(win.fb_width.wrapping_mul(win.fb_height))
    };

    let (luma1, chroma1) = if !win.interlaced {
        (0, 0)
    } else if tiled {
        (
            luma0.wrapping_add(TILED_FIELD_OFFSET),
            chroma0.wrapping_add(TILED_FIELD_OFFSET),
        )
    } else {
        (
            luma0.wrapping_add(win.fb_width),
            chroma0.wrapping_add(win.fb_width),
        )
    };

    Ok(VideoBuffers {
        luma: [luma0, luma1],
        chroma: [chroma0, chroma1],
        tiled,
    })
}

/// Program source, destination, ratios and buffers. Runs with vsync gating
/// off.
pub(crate) fn program<R: RegisterBlock>(vp: &R, win: &WindowLayer, buffers: &VideoBuffers) {
    let interlace = win.interlaced;

    vp.write_mask(VP_MODE, if interlace { !0 } else { 0 }, VP_MODE_LINE_SKIP);
    let mem = if buffers.tiled { VP_MODE_MEM_TILED } else { VP_MODE_MEM_LINEAR };
    vp.write_mask(VP_MODE, VP_MODE_NV12 | mem, VP_MODE_FMT_MASK);

    vp.write(VP_IMG_SIZE_Y, vp_img_size(win.fb_width, win.fb_height));
    // Halved chroma height avoids chroma distortion
    vp.write(VP_IMG_SIZE_C, vp_img_size(win.fb_width, win.fb_height / 2));

    vp.write(VP_SRC_WIDTH, win.crtc_width);
    vp.write(VP_SRC_HEIGHT, win.crtc_height);
    vp.write(VP_SRC_H_POSITION, vp_src_h_position(win.fb_x));
    vp.write(VP_SRC_V_POSITION, win.fb_y);

    vp.write(VP_DST_WIDTH, win.crtc_width);
    vp.write(VP_DST_H_POSITION, win.crtc_x);
    if interlace {
        vp.write(VP_DST_HEIGHT, win.crtc_height / 2);
        vp.write(VP_DST_V_POSITION, win.crtc_y / 2);
    } else {
        vp.write(VP_DST_HEIGHT, win.crtc_height);
        vp.write(VP_DST_V_POSITION, win.crtc_y);
    }

    let (h_ratio, v_ratio) = scaling_ratios(win);
    vp.write(VP_H_RATIO, h_ratio);
    vp.write(VP_V_RATIO, v_ratio);

    vp.write(VP_ENDIAN_MODE, VP_ENDIAN_MODE_LITTLE);

    vp.write(VP_TOP_Y_PTR, buffers.luma[0]);
    vp.write(VP_BOT_Y_PTR, buffers.luma[1]);
    vp.write(VP_TOP_C_PTR, buffers.chroma[0]);
    vp.write(VP_BOT_C_PTR, buffers.chroma[1]);
}

pub(crate) fn regs_dump<R: RegisterBlock>(vp: &R) {
    let dump: [(&str, usize); 23] = [
        ("VP_ENABLE", VP_ENABLE),
        ("VP_SRESET", VP_SRESET),
        ("VP_SHADOW_UPDATE", VP_SHADOW_UPDATE),
        ("VP_FIELD_ID", VP_FIELD_ID),
        ("VP_MODE", VP_MODE),
        ("VP_IMG_SIZE_Y", VP_IMG_SIZE_Y),
        ("VP_IMG_SIZE_C", VP_IMG_SIZE_C),
        ("VP_PER_RATE_CTRL", VP_PER_RATE_CTRL),
        ("VP_TOP_Y_PTR", VP_TOP_Y_PTR),
        ("VP_BOT_Y_PTR", VP_BOT_Y_PTR),
        ("VP_TOP_C_PTR", VP_TOP_C_PTR),
        ("VP_BOT_C_PTR", VP_BOT_C_PTR),
        ("VP_ENDIAN_MODE", VP_ENDIAN_MODE),
        ("VP_SRC_H_POSITION", VP_SRC_H_POSITION),
        ("VP_SRC_V_POSITION", VP_SRC_V_POSITION),
        ("VP_SRC_WIDTH", VP_SRC_WIDTH),
        ("VP_SRC_HEIGHT", VP_SRC_HEIGHT),
        ("VP_DST_H_POSITION", VP_DST_H_POSITION),
        ("VP_DST_V_POSITION", VP_DST_V_POSITION),
        ("VP_DST_WIDTH", VP_DST_WIDTH),
        ("VP_DST_HEIGHT", VP_DST_HEIGHT),
        ("VP_H_RATIO", VP_H_RATIO),
        ("VP_V_RATIO", VP_V_RATIO),
    ];
    for (name, offset) in dump {
        debug!("vp: {} = {:#010x}", name, vp.read(offset));
    }
}
