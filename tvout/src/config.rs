//! Device configuration.

use crate::mixer::LayerId;

/// Hardware generation of the HDMI encoder and mixer pair.
///
/// Fixed for the lifetime of a device instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HardwareGeneration {
    /// Preset-table timing, video processor, shadow-register interlace check,
    /// legacy audio path
    Gen1,
    /// Computed timing layout, layer update counter, no video processor
    Gen2,
}

impl HardwareGeneration {
    /// Parse "1"/"2"/"gen1"/"gen2" (used by the host tool).
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "1" | "gen1" | "Gen1" => Some(HardwareGeneration::Gen1),
            "2" | "gen2" | "Gen2" => Some(HardwareGeneration::Gen2),
            _ => None,
        }
    }
}

/// Default 7-bit I2C address of the PHY
pub const DEFAULT_PHY_ADDRESS: u8 = 0x38;

/// Hotplug events kept before the oldest is dropped
pub const HOTPLUG_QUEUE_DEPTH: usize = 8;

/// HDMI encoder configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HdmiConfig {
    pub generation: HardwareGeneration,
    /// I2C address of the clock synthesizer
    pub phy_address: u8,
    /// Return an error when the PLL never locks instead of continuing
    pub strict_pll_lock: bool,
}

impl HdmiConfig {
    pub const fn new(generation: HardwareGeneration) -> Self {
        Self {
            generation,
            phy_address: DEFAULT_PHY_ADDRESS,
            strict_pll_lock: false,
        }
    }

    pub const fn with_phy_address(mut self, address: u8) -> Self {
        self.phy_address = address;
        self
    }

    pub const fn with_strict_pll_lock(mut self, strict: bool) -> Self {
        self.strict_pll_lock = strict;
        self
    }
}

/// Mixer configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MixerConfig {
    pub generation: HardwareGeneration,
    /// Layer kept enabled whenever any graphics layer is committed
    pub default_layer: LayerId,
}

impl MixerConfig {
    pub const fn new(generation: HardwareGeneration) -> Self {
        Self {
            generation,
            default_layer: LayerId::Graphics0,
        }
    }

    pub const fn with_default_layer(mut self, layer: LayerId) -> Self {
        self.default_layer = layer;
        self
    }
}
