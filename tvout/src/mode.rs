//! Display timing description and the CEA-861 video identification table.

use core::fmt;

bitflags::bitflags! {
    /// Scan and sync polarity flags of a display mode
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct ModeFlags: u32 {
        /// Positive horizontal sync
        const PHSYNC = 1 << 0;
        /// Negative horizontal sync
        const NHSYNC = 1 << 1;
        /// Positive vertical sync
        const PVSYNC = 1 << 2;
        /// Negative vertical sync
        const NVSYNC = 1 << 3;
        /// Interlaced scan
        const INTERLACE = 1 << 4;
    }
}

/// Abstract display timing.
///
/// Vertical values of interlaced modes count frame lines, not field lines.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DisplayMode {
    pub hdisplay: u32,
    pub hsync_start: u32,
    pub hsync_end: u32,
    pub htotal: u32,
    pub vdisplay: u32,
    pub vsync_start: u32,
    pub vsync_end: u32,
    pub vtotal: u32,
    /// Pixel clock in Hz
    pub clock_hz: u32,
    pub flags: ModeFlags,
}

impl DisplayMode {
    /// Build a mode from a kHz clock and `[active, sync start, sync end,
    /// total]` for each direction.
    pub const fn new(
        clock_khz: u32,
        h: [u32; 4],
        v: [u32; 4],
        flags: ModeFlags,
    ) -> Self {
        Self {
            hdisplay: h[0],
            hsync_start: h[1],
            hsync_end: h[2],
            htotal: h[3],
            vdisplay: v[0],
            vsync_start: v[1],
            vsync_end: v[2],
            vtotal: v[3],
            clock_hz: clock_khz * 1000,
            flags,
        }
    }

    pub fn is_interlaced(&self) -> bool {
        self.flags.contains(ModeFlags::INTERLACE)
    }

    /// Vertical refresh in Hz, rounded to nearest, doubled for interlaced
    /// scan (field rate).
    pub fn refresh(&self) -> u32 {
        if self.htotal == 0 || self.vtotal == 0 {
            return 0;
        }
        let per_line = self.clock_hz / self.htotal;
        let refresh = (per_line + self.vtotal / 2) / self.vtotal;
        if self.is_interlaced() {
            refresh * 2
        } else {
            refresh
        }
    }

    /// True when every timing field and the pixel clock are usable.
    pub fn is_well_formed(&self) -> bool {
        self.hdisplay > 0
            && self.hdisplay <= self.hsync_start
            && self.hsync_start <= self.hsync_end
            && self.hsync_end <= self.htotal
            && self.vdisplay > 0
            && self.vdisplay <= self.vsync_start
            && self.vsync_start <= self.vsync_end
            && self.vsync_end <= self.vtotal
            && self.clock_hz > 0
    }

    fn same_timings(&self, other: &DisplayMode) -> bool {
        const COMPARED: ModeFlags = ModeFlags::all();
        self.hdisplay == other.hdisplay
            && self.hsync_start == other.hsync_start
            && self.hsync_end == other.hsync_end
            && self.htotal == other.htotal
            && self.vdisplay == other.vdisplay
            && self.vsync_start == other.vsync_start
            && self.vsync_end == other.vsync_end
            && self.vtotal == other.vtotal
            && (self.flags & COMPARED) == (other.flags & COMPARED)
    }
}

impl fmt::Display for DisplayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{}{}@{} ({} kHz)",
            self.hdisplay,
            self.vdisplay,
            if self.is_interlaced() { "i" } else { "p" },
            self.refresh(),
            self.clock_hz / 1000
        )
    }
}

// =============================================================================
// CEA-861 Timings
// =============================================================================

const P: ModeFlags = ModeFlags::PHSYNC.union(ModeFlags::PVSYNC);
const N: ModeFlags = ModeFlags::NHSYNC.union(ModeFlags::NVSYNC);
const PI: ModeFlags = P.union(ModeFlags::INTERLACE);

/// (VIC, timing) pairs. Only the first VIC of an aspect-ratio pair is listed.
const CEA_MODES: &[(u8, DisplayMode)] = &[
    (1, DisplayMode::new(25175, [640, 656, 752, 800], [480, 490, 492, 525], N)),
    (2, DisplayMode::new(27000, [720, 736, 798, 858], [480, 489, 495, 525], N)),
    (4, DisplayMode::new(74250, [1280, 1390, 1430, 1650], [720, 725, 730, 750], P)),
    (5, DisplayMode::new(74250, [1920, 2008, 2052, 2200], [1080, 1084, 1094, 1125], PI)),
    (16, DisplayMode::new(148500, [1920, 2008, 2052, 2200], [1080, 1084, 1089, 1125], P)),
    (17, DisplayMode::new(27000, [720, 732, 796, 864], [576, 581, 586, 625], N)),
    (19, DisplayMode::new(74250, [1280, 1720, 1760, 1980], [720, 725, 730, 750], P)),
    (20, DisplayMode::new(74250, [1920, 2448, 2492, 2640], [1080, 1084, 1094, 1125], PI)),
    (31, DisplayMode::new(148500, [1920, 2448, 2492, 2640], [1080, 1084, 1089, 1125], P)),
    (32, DisplayMode::new(74250, [1920, 2558, 2602, 2750], [1080, 1084, 1089, 1125], P)),
    (33, DisplayMode::new(74250, [1920, 2448, 2492, 2640], [1080, 1084, 1089, 1125], P)),
    (34, DisplayMode::new(74250, [1920, 2008, 2052, 2200], [1080, 1084, 1089, 1125], P)),
];

/// Companion clock of a CEA entry, in Hz rounded to the kHz.
///
/// Rates that are multiples of 6 Hz exist in both integer and 1000/1001
/// flavours. The table lists the 59.94 Hz flavour for 480-line modes and
/// the integer flavour otherwise.
fn cea_alternate_clock(cea: &DisplayMode) -> u32 {
    let khz = cea.clock_hz / 1000;
    if cea.refresh() % 6 != 0 {
        return cea.clock_hz;
    }
    let alternate = if cea.vdisplay == 480 {
        (khz * 1001 + 500) / 1000
    } else {
        (khz * 1000 + 500) / 1001
    };
    alternate * 1000
}

/// Video identification code for `mode`, or 0 when the timing is not a
/// CEA-861 format.
///
/// The pixel clock may be either the listed clock or its 1000/1001
/// companion (rounded to the kHz, as the PHY tables list it).
pub fn cea_vic(mode: &DisplayMode) -> u8 {
    CEA_MODES
        .iter()
        .find(|(_, cea)| {
            cea.same_timings(mode)
                && (mode.clock_hz == cea.clock_hz || mode.clock_hz == cea_alternate_clock(cea))
        })
        .map(|(vic, _)| *vic)
        .unwrap_or(0)
}

/// CEA timing for `vic`, if listed.
pub fn cea_mode(vic: u8) -> Option<DisplayMode> {
    CEA_MODES.iter().find(|(v, _)| *v == vic).map(|(_, m)| *m)
}

// =============================================================================
// Named presets
// =============================================================================

/// Modes addressable by name from the host tool.
pub const PRESETS: &[(&str, DisplayMode)] = &[
    ("480p60", DisplayMode::new(27027, [720, 736, 798, 858], [480, 489, 495, 525], N)),
    ("576p50", DisplayMode::new(27000, [720, 732, 796, 864], [576, 581, 586, 625], N)),
    ("720p50", DisplayMode::new(74250, [1280, 1720, 1760, 1980], [720, 725, 730, 750], P)),
    ("720p60", DisplayMode::new(74250, [1280, 1390, 1430, 1650], [720, 725, 730, 750], P)),
    ("1080i50", DisplayMode::new(74250, [1920, 2448, 2492, 2640], [1080, 1084, 1094, 1125], PI)),
    ("1080i60", DisplayMode::new(74250, [1920, 2008, 2052, 2200], [1080, 1084, 1094, 1125], PI)),
    ("1080p24", DisplayMode::new(74250, [1920, 2558, 2602, 2750], [1080, 1084, 1089, 1125], P)),
    ("1080p30", DisplayMode::new(74250, [1920, 2008, 2052, 2200], [1080, 1084, 1089, 1125], P)),
    ("1080p50", DisplayMode::new(148500, [1920, 2448, 2492, 2640], [1080, 1084, 1089, 1125], P)),
    ("1080p60", DisplayMode::new(148500, [1920, 2008, 2052, 2200], [1080, 1084, 1089, 1125], P)),
    ("800x600", DisplayMode::new(40000, [800, 840, 968, 1056], [600, 601, 605, 628], P)),
    ("1024x768", DisplayMode::new(65000, [1024, 1048, 1184, 1344], [768, 771, 777, 806], N)),
    (
        "1440x900",
        DisplayMode::new(
            106500,
            [1440, 1520, 1672, 1904],
            [900, 903, 909, 934],
            ModeFlags::NHSYNC.union(ModeFlags::PVSYNC),
        ),
    ),
];

/// Look up a named preset.
pub fn preset(name: &str) -> Option<DisplayMode> {
    PRESETS.iter().find(|(n, _)| *n == name).map(|(_, m)| *m)
}

// =============================================================================
// Scan classes
// =============================================================================

/// Output scan class the compositor can generate for a frame size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanClass {
    SdNtsc,
    SdPal,
    Hd720,
    Hd1080,
}

impl ScanClass {
    /// Classify a frame size; `None` when the compositor cannot scan it out.
    pub fn classify(width: u32, height: u32) -> Option<Self> {
        if (464..=720).contains(&width) && height <= 480 {
            Some(ScanClass::SdNtsc)
        } else if (464..=720).contains(&width) && height <= 576 {
            Some(ScanClass::SdPal)
        } else if (1024..=1280).contains(&width) && height <= 720 {
            Some(ScanClass::Hd720)
        } else if (width == 1440 && height == 900) || ((1664..=1920).contains(&width) && height <= 1080) {
            Some(ScanClass::Hd1080)
        } else {
            None
        }
    }
}
