//! Gen1 timing presets.
//!
//! Gen1 hardware packs several timing fields into shared registers, so it is
//! driven from fixed per-format byte tables instead of computed values.

use crate::mode::DisplayMode;

/// Gen1 core timing bytes, exactly as written to the registers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Gen1Core {
    pub h_blank: [u8; 2],
    pub v_blank: [u8; 3],
    pub h_v_line: [u8; 3],
    pub vsync_pol: u8,
    pub int_pro_mode: u8,
    pub v_blank_f: [u8; 3],
    pub h_sync_gen: [u8; 3],
    pub v_sync_gen1: [u8; 3],
    pub v_sync_gen2: [u8; 3],
    pub v_sync_gen3: [u8; 3],
}

/// Timing-generator window shared by both generations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimingGenerator {
    pub h_fsz: u16,
    pub hact_st: u16,
    pub hact_sz: u16,
    pub v_fsz: u16,
    pub vsync: u16,
    pub vsync2: u16,
    pub vact_st: u16,
    pub vact_sz: u16,
    pub field_chg: u16,
    pub vact_st2: u16,
    pub vsync_top_hdmi: u16,
    pub vsync_bot_hdmi: u16,
    pub field_top_hdmi: u16,
    pub field_bot_hdmi: u16,
}

/// A Gen1 timing preset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Gen1Preset {
    pub core: Gen1Core,
    pub tg: TimingGenerator,
}

const fn tg(
    h_fsz: u16,
    hact: (u16, u16),
    v_fsz: u16,
    vact: (u16, u16),
    vact_st2: u16,
    vsync_bot_hdmi: u16,
) -> TimingGenerator {
    TimingGenerator {
        h_fsz,
        hact_st: hact.0,
        hact_sz: hact.1,
        v_fsz,
        vsync: 0x0001,
        vsync2: 0x0233,
        vact_st: vact.0,
        vact_sz: vact.1,
        field_chg: 0x0233,
        vact_st2,
        vsync_top_hdmi: 0x0001,
        vsync_bot_hdmi,
        field_top_hdmi: 0x0001,
        field_bot_hdmi: 0x0233,
    }
}

static PRESET_480P: Gen1Preset = Gen1Preset {
    core: Gen1Core {
        h_blank: [0x8a, 0x00],
        v_blank: [0x0d, 0x6a, 0x01],
        h_v_line: [0x0d, 0xa2, 0x35],
        vsync_pol: 0x01,
        int_pro_mode: 0x00,
        v_blank_f: [0x00, 0x00, 0x00],
        h_sync_gen: [0x0e, 0x30, 0x11],
        v_sync_gen1: [0x0f, 0x90, 0x00],
        // unused by this format
        v_sync_gen2: [0x00, 0x00, 0x00],
        v_sync_gen3: [0x00, 0x00, 0x00],
    },
    tg: tg(0x035a, (0x008a, 0x02d0), 0x020d, (0x002d, 0x01e0), 0x0249, 0x0233),
};

static PRESET_720P60: Gen1Preset = Gen1Preset {
    core: Gen1Core {
        h_blank: [0x72, 0x01],
        v_blank: [0xee, 0xf2, 0x00],
        h_v_line: [0xee, 0x22, 0x67],
        vsync_pol: 0x00,
        int_pro_mode: 0x00,
        v_blank_f: [0x00, 0x00, 0x00],
        h_sync_gen: [0x6c, 0x50, 0x02],
        v_sync_gen1: [0x0a, 0x50, 0x00],
        v_sync_gen2: [0x01, 0x10, 0x00],
        v_sync_gen3: [0x01, 0x10, 0x00],
    },
    tg: tg(0x0672, (0x0171, 0x0501), 0x02ee, (0x001e, 0x02d0), 0x0249, 0x0001),
};

static PRESET_1080I50: Gen1Preset = Gen1Preset {
    core: Gen1Core {
        h_blank: [0xd0, 0x02],
        v_blank: [0x32, 0xb2, 0x00],
        h_v_line: [0x65, 0x04, 0xa5],
        vsync_pol: 0x00,
        int_pro_mode: 0x01,
        v_blank_f: [0x49, 0x2a, 0x23],
        h_sync_gen: [0x0e, 0xea, 0x08],
        v_sync_gen1: [0x07, 0x20, 0x00],
        v_sync_gen2: [0x39, 0x42, 0x23],
        v_sync_gen3: [0x38, 0x87, 0x73],
    },
    tg: tg(0x0a50, (0x02cf, 0x0781), 0x0465, (0x0016, 0x021c), 0x0249, 0x0233),
};

static PRESET_1080P50: Gen1Preset = Gen1Preset {
    core: Gen1Core {
        h_blank: [0xd0, 0x02],
        v_blank: [0x65, 0x6c, 0x01],
        h_v_line: [0x65, 0x04, 0xa5],
        vsync_pol: 0x00,
        int_pro_mode: 0x00,
        v_blank_f: [0x00, 0x00, 0x00],
        h_sync_gen: [0x0e, 0xea, 0x08],
        v_sync_gen1: [0x09, 0x40, 0x00],
        v_sync_gen2: [0x01, 0x10, 0x00],
        v_sync_gen3: [0x01, 0x10, 0x00],
    },
    tg: tg(0x0a50, (0x02cf, 0x0781), 0x0465, (0x002d, 0x0438), 0x0248, 0x0001),
};

static PRESET_1080I60: Gen1Preset = Gen1Preset {
    core: Gen1Core {
        h_blank: [0x18, 0x01],
        v_blank: [0x32, 0xb2, 0x00],
        h_v_line: [0x65, 0x84, 0x89],
        vsync_pol: 0x00,
        int_pro_mode: 0x01,
        v_blank_f: [0x49, 0x2a, 0x23],
        h_sync_gen: [0x56, 0x08, 0x02],
        v_sync_gen1: [0x07, 0x20, 0x00],
        v_sync_gen2: [0x39, 0x42, 0x23],
        v_sync_gen3: [0xa4, 0x44, 0x4a],
    },
    tg: tg(0x0898, (0x0117, 0x0781), 0x0465, (0x0016, 0x021c), 0x0249, 0x0233),
};

static PRESET_1080P60: Gen1Preset = Gen1Preset {
    core: Gen1Core {
        h_blank: [0x18, 0x01],
        v_blank: [0x65, 0x6c, 0x01],
        h_v_line: [0x65, 0x84, 0x89],
        vsync_pol: 0x00,
        int_pro_mode: 0x00,
        v_blank_f: [0x00, 0x00, 0x00],
        h_sync_gen: [0x56, 0x08, 0x02],
        v_sync_gen1: [0x09, 0x40, 0x00],
        v_sync_gen2: [0x01, 0x10, 0x00],
        v_sync_gen3: [0x01, 0x10, 0x00],
    },
    tg: tg(0x0898, (0x0117, 0x0781), 0x0465, (0x002d, 0x0438), 0x0248, 0x0001),
};

/// Formats Gen1 can produce: (width, height, refresh, interlaced, preset)
static GEN1_PRESETS: [(u32, u32, u32, bool, &Gen1Preset); 7] = [
    (1280, 720, 60, false, &PRESET_720P60),
    (1280, 720, 50, false, &PRESET_720P60),
    (720, 480, 60, false, &PRESET_480P),
    (1920, 1080, 50, true, &PRESET_1080I50),
    (1920, 1080, 50, false, &PRESET_1080P50),
    (1920, 1080, 60, true, &PRESET_1080I60),
    (1920, 1080, 60, false, &PRESET_1080P60),
];

/// Find the Gen1 preset for `mode` by size, refresh and scan type.
pub fn find(mode: &DisplayMode) -> Option<&'static Gen1Preset> {
    let refresh = mode.refresh();
    let interlaced = mode.is_interlaced();
    GEN1_PRESETS
        .iter()
        .find(|(w, h, r, i, _)| {
            *w == mode.hdisplay && *h == mode.vdisplay && *r == refresh && *i == interlaced
        })
        .map(|(_, _, _, _, preset)| *preset)
}
