//! HDMI PHY clock synthesizer.
//!
//! The PHY sits on a serial control bus and is programmed with a 32-byte
//! calibration blob per pixel clock. Blobs are vendor-calibrated and are
//! reproduced byte for byte; only exact clock matches are accepted.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{Error as _, I2c};
use log::{debug, error};

use super::regs::{GenerationRegs, PHY_STATUS_READY, PHY_SW_RSTOUT};
use crate::config::HardwareGeneration;
use crate::error::{Error, Result};
use crate::platform::{Clock, ClockControl, RegisterBlock};
use crate::utils::{poll_until, PollTimeout};

/// Size of a PHY register image
pub const PHY_CONF_LEN: usize = 32;

/// Mode register of the PHY
const PHY_MODE_REG: u8 = 0x1f;
const PHY_MODE_CONFIG: u8 = 0x00;
const PHY_MODE_OPERATION: u8 = 0x80;

/// PLL lock poll budget: 100 x 1 ms
const PLL_LOCK_ATTEMPTS: u32 = 100;
const PLL_LOCK_INTERVAL_MS: u32 = 1;

/// Reset assert and deassert hold
const RESET_HOLD_MS: u32 = 10;

/// Calibration blob for one pixel clock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhyConfigEntry {
    /// Exact pixel clock in Hz
    pub pixel_clock: u32,
    pub blob: [u8; PHY_CONF_LEN],
}

const fn entry(pixel_clock: u32, blob: [u8; PHY_CONF_LEN]) -> PhyConfigEntry {
    PhyConfigEntry { pixel_clock, blob }
}

// =============================================================================
// Calibration tables
// =============================================================================

static GEN1_PHY_CONFIGS: [PhyConfigEntry; 5] = [
    entry(27_000_000, [
        0x01, 0x05, 0x00, 0xD8, 0x10, 0x1C, 0x30, 0x40,
        0x6B, 0x10, 0x02, 0x51, 0xDF, 0xF2, 0x54, 0x87,
        0x84, 0x00, 0x30, 0x38, 0x00, 0x08, 0x10, 0xE0,
        0x22, 0x40, 0xE3, 0x26, 0x00, 0x00, 0x00, 0x00,
    ]),
    entry(27_027_000, [
        0x01, 0x05, 0x00, 0xD4, 0x10, 0x9C, 0x09, 0x64,
        0x6B, 0x10, 0x02, 0x51, 0xDF, 0xF2, 0x54, 0x87,
        0x84, 0x00, 0x30, 0x38, 0x00, 0x08, 0x10, 0xE0,
        0x22, 0x40, 0xE3, 0x26, 0x00, 0x00, 0x00, 0x00,
    ]),
    entry(74_176_000, [
        0x01, 0x05, 0x00, 0xD8, 0x10, 0x9C, 0xEF, 0x5B,
        0x6D, 0x10, 0x01, 0x51, 0xEF, 0xF3, 0x54, 0xB9,
        0x84, 0x00, 0x30, 0x38, 0x00, 0x08, 0x10, 0xE0,
        0x22, 0x40, 0xA5, 0x26, 0x01, 0x00, 0x00, 0x00,
    ]),
    entry(74_250_000, [
        0x01, 0x05, 0x00, 0xD8, 0x10, 0x9C, 0xF8, 0x40,
        0x6A, 0x10, 0x01, 0x51, 0xFF, 0xF1, 0x54, 0xBA,
        0x84, 0x00, 0x10, 0x38, 0x00, 0x08, 0x10, 0xE0,
        0x22, 0x40, 0xA4, 0x26, 0x01, 0x00, 0x00, 0x00,
    ]),
    entry(148_500_000, [
        0x01, 0x05, 0x00, 0xD8, 0x10, 0x9C, 0xF8, 0x40,
        0x6A, 0x18, 0x00, 0x51, 0xFF, 0xF1, 0x54, 0xBA,
        0x84, 0x00, 0x10, 0x38, 0x00, 0x08, 0x10, 0xE0,
        0x22, 0x40, 0xA4, 0x26, 0x02, 0x00, 0x00, 0x00,
    ]),
];

static GEN2_PHY_CONFIGS: [PhyConfigEntry; 13] = [
    entry(25_200_000, [
        0x01, 0x51, 0x2A, 0x75, 0x40, 0x01, 0x00, 0x08,
        0x82, 0x80, 0xFC, 0xD8, 0x45, 0xA0, 0xAC, 0x80,
        0x08, 0x80, 0x11, 0x04, 0x02, 0x22, 0x44, 0x86,
        0x54, 0xF4, 0x24, 0x00, 0x00, 0x00, 0x01, 0x80,
    ]),
    entry(27_000_000, [
        0x01, 0xD1, 0x22, 0x51, 0x40, 0x08, 0xFC, 0x20,
        0x98, 0xA0, 0xCB, 0xD8, 0x45, 0xA0, 0xAC, 0x80,
        0x06, 0x80, 0x11, 0x04, 0x02, 0x22, 0x44, 0x86,
        0x54, 0xE4, 0x24, 0x00, 0x00, 0x00, 0x01, 0x80,
    ]),
    entry(27_027_000, [
        0x01, 0xD1, 0x2D, 0x72, 0x40, 0x64, 0x12, 0x08,
        0x43, 0xA0, 0x0E, 0xD9, 0x45, 0xA0, 0xAC, 0x80,
        0x08, 0x80, 0x11, 0x04, 0x02, 0x22, 0x44, 0x86,
        0x54, 0xE3, 0x24, 0x00, 0x00, 0x00, 0x01, 0x00,
    ]),
    entry(36_000_000, [
        0x01, 0x51, 0x2D, 0x55, 0x40, 0x01, 0x00, 0x08,
        0x82, 0x80, 0x0E, 0xD9, 0x45, 0xA0, 0xAC, 0x80,
        0x08, 0x80, 0x11, 0x04, 0x02, 0x22, 0x44, 0x86,
        0x54, 0xAB, 0x24, 0x00, 0x00, 0x00, 0x01, 0x80,
    ]),
    entry(40_000_000, [
        0x01, 0x51, 0x32, 0x55, 0x40, 0x01, 0x00, 0x08,
        0x82, 0x80, 0x2C, 0xD9, 0x45, 0xA0, 0xAC, 0x80,
        0x08, 0x80, 0x11, 0x04, 0x02, 0x22, 0x44, 0x86,
        0x54, 0x9A, 0x24, 0x00, 0x00, 0x00, 0x01, 0x80,
    ]),
    entry(65_000_000, [
        0x01, 0xD1, 0x36, 0x34, 0x40, 0x1E, 0x0A, 0x08,
        0x82, 0xA0, 0x45, 0xD9, 0x45, 0xA0, 0xAC, 0x80,
        0x08, 0x80, 0x11, 0x04, 0x02, 0x22, 0x44, 0x86,
        0x54, 0xBD, 0x24, 0x01, 0x00, 0x00, 0x01, 0x80,
    ]),
    entry(74_176_000, [
        0x01, 0xD1, 0x3E, 0x35, 0x40, 0x5B, 0xDE, 0x08,
        0x82, 0xA0, 0x73, 0xD9, 0x45, 0xA0, 0xAC, 0x80,
        0x56, 0x80, 0x11, 0x04, 0x02, 0x22, 0x44, 0x86,
        0x54, 0xA6, 0x24, 0x01, 0x00, 0x00, 0x01, 0x80,
    ]),
    entry(74_250_000, [
        0x01, 0xD1, 0x1F, 0x10, 0x40, 0x40, 0xF8, 0x08,
        0x81, 0xA0, 0xBA, 0xD8, 0x45, 0xA0, 0xAC, 0x80,
        0x3C, 0x80, 0x11, 0x04, 0x02, 0x22, 0x44, 0x86,
        0x54, 0xA5, 0x24, 0x01, 0x00, 0x00, 0x01, 0x00,
    ]),
    entry(83_500_000, [
        0x01, 0xD1, 0x23, 0x11, 0x40, 0x0C, 0xFB, 0x08,
        0x85, 0xA0, 0xD1, 0xD8, 0x45, 0xA0, 0xAC, 0x80,
        0x08, 0x80, 0x11, 0x04, 0x02, 0x22, 0x44, 0x86,
        0x54, 0x93, 0x24, 0x01, 0x00, 0x00, 0x01, 0x80,
    ]),
    entry(106_500_000, [
        0x01, 0xD1, 0x2C, 0x12, 0x40, 0x0C, 0x09, 0x08,
        0x84, 0xA0, 0x0A, 0xD9, 0x45, 0xA0, 0xAC, 0x80,
        0x08, 0x80, 0x11, 0x04, 0x02, 0x22, 0x44, 0x86,
        0x54, 0x73, 0x24, 0x01, 0x00, 0x00, 0x01, 0x80,
    ]),
    entry(108_000_000, [
        0x01, 0x51, 0x2D, 0x15, 0x40, 0x01, 0x00, 0x08,
        0x82, 0x80, 0x0E, 0xD9, 0x45, 0xA0, 0xAC, 0x80,
        0x08, 0x80, 0x11, 0x04, 0x02, 0x22, 0x44, 0x86,
        0x54, 0xC7, 0x25, 0x03, 0x00, 0x00, 0x01, 0x80,
    ]),
    entry(146_250_000, [
        0x01, 0xD1, 0x3D, 0x15, 0x40, 0x18, 0xFD, 0x08,
        0x83, 0xA0, 0x6E, 0xD9, 0x45, 0xA0, 0xAC, 0x80,
        0x08, 0x80, 0x11, 0x04, 0x02, 0x22, 0x44, 0x86,
        0x54, 0x50, 0x25, 0x03, 0x00, 0x00, 0x01, 0x80,
    ]),
    entry(148_500_000, [
        0x01, 0xD1, 0x1F, 0x00, 0x40, 0x40, 0xF8, 0x08,
        0x81, 0xA0, 0xBA, 0xD8, 0x45, 0xA0, 0xAC, 0x80,
        0x3C, 0x80, 0x11, 0x04, 0x02, 0x22, 0x44, 0x86,
        0x54, 0x4B, 0x25, 0x03, 0x00, 0x00, 0x01, 0x00,
    ]),
];

/// Calibration table of `generation`
pub fn table(generation: HardwareGeneration) -> &'static [PhyConfigEntry] {
    match generation {
        HardwareGeneration::Gen1 => &GEN1_PHY_CONFIGS,
        HardwareGeneration::Gen2 => &GEN2_PHY_CONFIGS,
    }
}

/// Exact-match lookup. There is no nearest-clock fallback.
pub fn select(pixel_clock: u32, generation: HardwareGeneration) -> Result<&'static PhyConfigEntry> {
    table(generation)
        .iter()
        .find(|entry| entry.pixel_clock == pixel_clock)
        .ok_or(Error::NotFound)
}

/// Poll the controller's PHY status until the PLL reports lock.
pub fn wait_for_lock<R, D>(
    regs: &R,
    generation: HardwareGeneration,
    delay: &mut D,
) -> core::result::Result<u32, PollTimeout>
where
    R: RegisterBlock,
    D: DelayNs,
{
    let status = GenerationRegs::of(generation).phy_status;
    poll_until(PLL_LOCK_ATTEMPTS, PLL_LOCK_INTERVAL_MS, delay, || {
        regs.read(status) & PHY_STATUS_READY != 0
    })
}

// =============================================================================
// Configurator
// =============================================================================

/// Drives the PHY over its serial bus.
pub struct PhyConfigurator<I> {
    bus: I,
    address: u8,
}

impl<I: I2c> PhyConfigurator<I> {
    pub fn new(bus: I, address: u8) -> Self {
        Self { bus, address }
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    /// Give the bus back
    pub fn release(self) -> I {
        self.bus
    }

    fn send(&mut self, bytes: &[u8], what: &str) -> Result<()> {
        self.bus.write(self.address, bytes).map_err(|e| {
            error!("hdmiphy: {} failed: {:?}", what, e.kind());
            Error::Bus
        })
    }

    /// Push a calibration blob and switch the PHY to operating mode.
    ///
    /// A failed or short transfer aborts with [`Error::Bus`]; writes already
    /// issued are not rolled back.
    pub fn apply<D: DelayNs>(&mut self, entry: &PhyConfigEntry, delay: &mut D) -> Result<()> {
        self.send(&entry.blob, "configure")?;
        delay.delay_ms(RESET_HOLD_MS);
        self.send(&[PHY_MODE_REG, PHY_MODE_OPERATION], "enable")?;

        let mut readback = [0u8; PHY_CONF_LEN];
        if let Err(e) = self.bus.read(self.address, &mut readback) {
            error!("hdmiphy: read back failed: {:?}", e.kind());
            return Err(Error::Bus);
        }
        for (i, (written, read)) in entry.blob.iter().zip(readback.iter()).enumerate() {
            debug!("hdmiphy[{:#04x}] write[{:#04x}] - recv [{:#04x}]", i, written, read);
        }
        Ok(())
    }

    /// Return the PHY to configuration mode and pulse its reset line.
    ///
    /// The pixel clock runs from the free-running source until the next
    /// successful lock reparents it.
    pub fn reset<R, C, D>(&mut self, regs: &R, clocks: &mut C, generation: HardwareGeneration, delay: &mut D)
    where
        R: RegisterBlock,
        C: ClockControl,
        D: DelayNs,
    {
        clocks.disable(Clock::SclkHdmi);
        clocks.set_parent(Clock::SclkHdmi, Clock::SclkPixel);
        clocks.enable(Clock::SclkHdmi);

        // Reset proceeds even if the PHY did not answer
        let _ = self.send(&[PHY_MODE_REG, PHY_MODE_CONFIG], "config mode");

        let rstout = GenerationRegs::of(generation).phy_rstout;
        regs.write_mask(rstout, !0, PHY_SW_RSTOUT);
        delay.delay_ms(RESET_HOLD_MS);
        regs.write_mask(rstout, 0, PHY_SW_RSTOUT);
        delay.delay_ms(RESET_HOLD_MS);
    }

    /// Power the PHY up or down.
    ///
    /// The PHY has no bit-set primitive, so the whole register file is read
    /// once and updated through a local cache.
    pub fn set_power(&mut self, on: bool) -> Result<()> {
        debug!("hdmiphy: power {}", if on { "on" } else { "off" });

        let mut cache = [0u8; PHY_CONF_LEN];
        self.bus
            .write_read(self.address, &[0x00], &mut cache)
            .map_err(|e| {
                error!("hdmiphy: register cache read failed: {:?}", e.kind());
                Error::Bus
            })?;

        let mode = if on { PHY_MODE_OPERATION } else { PHY_MODE_CONFIG };
        self.update_bits(&mut cache, PHY_MODE_REG, 0xff, mode)?;
        if !on {
            // oscillator pad, re-enabled by the next calibration blob
            self.update_bits(&mut cache, 0x0b, 0xc0, 0x00)?;
        }
        let powerdown = if on { 0x00 } else { 0xff };
        self.update_bits(&mut cache, 0x1d, 0x80, powerdown)?;
        self.update_bits(&mut cache, 0x1d, 0x77, powerdown)?;
        if !on {
            self.update_bits(&mut cache, 0x04, 1 << 3, 0x00)?;
        }
        Ok(())
    }

    fn update_bits(&mut self, cache: &mut [u8; PHY_CONF_LEN], reg: u8, mask: u8, value: u8) -> Result<()> {
        let slot = &mut cache[reg as usize];
        *slot = (*slot & !mask) | (value & mask);
        let byte = *slot;
        self.send(&[reg, byte], "update")
    }
}
