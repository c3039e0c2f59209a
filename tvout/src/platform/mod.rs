//! Platform abstraction layer.
//!
//! Everything the driver consumes from its host lives here: register
//! windows, clock tree control, power rails, interrupt routing and the
//! monitor capability source. The serial bus and delays come from
//! `embedded-hal`.

use core::ptr::{read_volatile, write_volatile};

use crate::error::Result;

// =============================================================================
// Register Access
// =============================================================================

/// A window of 32-bit device registers addressed by byte offset.
pub trait RegisterBlock {
    /// Read a 32-bit register
    fn read(&self, offset: usize) -> u32;

    /// Write a 32-bit register
    fn write(&self, offset: usize, value: u32);

    /// Write the low byte of a register
    fn write_byte(&self, offset: usize, value: u8) {
        self.write(offset, value as u32);
    }

    /// Read-modify-write the bits selected by `mask`
    fn write_mask(&self, offset: usize, value: u32, mask: u32) {
        let old = self.read(offset);
        self.write(offset, (value & mask) | (old & !mask));
    }
}

/// Memory-mapped register window.
#[derive(Debug, Clone, Copy)]
pub struct Mmio {
    base: usize,
}

impl Mmio {
    /// # Safety
    /// `base` must be the start of a mapped device register window that
    /// stays valid for the lifetime of the returned value.
    pub const unsafe fn new(base: usize) -> Self {
        Self { base }
    }
}

impl RegisterBlock for Mmio {
    #[inline]
    fn read(&self, offset: usize) -> u32 {
        unsafe { read_volatile((self.base + offset) as *const u32) }
    }

    #[inline]
    fn write(&self, offset: usize, value: u32) {
        unsafe { write_volatile((self.base + offset) as *mut u32, value) }
    }

    #[inline]
    fn write_byte(&self, offset: usize, value: u8) {
        unsafe { write_volatile((self.base + offset) as *mut u8, value) }
    }
}

// =============================================================================
// Clock Tree, Power and Interrupts
// =============================================================================

/// Clocks gated or reparented by the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Clock {
    /// HDMI controller bus clock
    Hdmi,
    /// HDMI special clock (pixel domain)
    SclkHdmi,
    /// Free-running pixel source used while the PHY is reconfigured
    SclkPixel,
    /// PHY-generated pixel clock
    SclkHdmiPhy,
    /// PHY gate
    HdmiPhy,
    /// Mixer bus clock
    Mixer,
    /// Video processor bus clock
    VideoProcessor,
    /// Mixer special clock
    SclkMixer,
}

/// Clock tree primitives
pub trait ClockControl {
    fn enable(&mut self, clock: Clock);
    fn disable(&mut self, clock: Clock);
    fn set_parent(&mut self, clock: Clock, parent: Clock);
}

/// Interrupt lines feeding the hotplug handler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrqLine {
    /// Controller interrupt, usable while the encoder is powered
    Internal,
    /// GPIO interrupt on the hotplug-detect pin
    External,
}

/// Where the hotplug-detect pin is routed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HpdRoute {
    /// Plain GPIO input with pull-down (encoder off)
    Gpio,
    /// Controller function (encoder on)
    Controller,
}

/// Board services used by the HDMI power sequencer
pub trait HdmiBoard: ClockControl {
    /// Enable the encoder's supply rails
    fn regulators_enable(&mut self) -> Result<()>;
    fn regulators_disable(&mut self);

    fn irq_enable(&mut self, line: IrqLine);
    fn irq_disable(&mut self, line: IrqLine);

    /// Configure the hotplug-detect pin function
    fn hpd_route(&mut self, route: HpdRoute);
    /// Current hotplug-detect pin level
    fn hpd_level(&mut self) -> bool;
}

// =============================================================================
// Monitor Capability
// =============================================================================

/// Capabilities of the attached sink
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MonitorInfo {
    /// Sink accepts HDMI packets (as opposed to DVI only)
    pub hdmi_sink: bool,
    /// Sink accepts audio
    pub audio: bool,
}

/// Reads the sink's capability block (EDID over DDC on real hardware)
pub trait MonitorInfoSource {
    fn read_monitor_info(&mut self) -> Option<MonitorInfo>;
}
