//! Host-side fakes for the platform traits.
//!
//! Every fake is `Clone` over shared state so a test can keep a handle while
//! the driver owns the other one.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use std::vec::Vec;

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{self, ErrorKind, ErrorType, I2c, NoAcknowledgeSource, Operation};

use crate::error::{Error, Result};
use crate::platform::{
    Clock, ClockControl, HdmiBoard, HpdRoute, IrqLine, MonitorInfo, MonitorInfoSource, RegisterBlock,
};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

// =============================================================================
// Registers
// =============================================================================

#[derive(Default)]
struct RegState {
    values: HashMap<usize, u32>,
    log: Vec<(usize, u32)>,
    reads: HashMap<usize, usize>,
    scripts: HashMap<usize, VecDeque<u32>>,
    watch: Option<(usize, Vec<usize>)>,
    snapshots: Vec<Vec<u32>>,
}

/// In-memory register window recording every write in order.
#[derive(Clone, Default)]
pub struct FakeRegs {
    state: Arc<Mutex<RegState>>,
}

impl FakeRegs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value, 0 if never touched
    pub fn get(&self, offset: usize) -> u32 {
        lock(&self.state).values.get(&offset).copied().unwrap_or(0)
    }

    /// Preload a value without logging a write
    pub fn set(&self, offset: usize, value: u32) {
        lock(&self.state).values.insert(offset, value);
    }

    /// Queue values returned by successive reads of `offset`. Once drained,
    /// reads fall back to the stored value.
    pub fn script(&self, offset: usize, values: &[u32]) {
        lock(&self.state)
            .scripts
            .entry(offset)
            .or_default()
            .extend(values.iter().copied());
    }

    pub fn was_written(&self, offset: usize) -> bool {
        lock(&self.state).log.iter().any(|(off, _)| *off == offset)
    }

    pub fn writes_to(&self, offset: usize) -> Vec<u32> {
        lock(&self.state)
            .log
            .iter()
            .filter(|(off, _)| *off == offset)
            .map(|(_, v)| *v)
            .collect()
    }

    pub fn reads_of(&self, offset: usize) -> usize {
        lock(&self.state).reads.get(&offset).copied().unwrap_or(0)
    }

    /// Every write so far, oldest first
    pub fn writes(&self) -> Vec<(usize, u32)> {
        lock(&self.state).log.clone()
    }

    /// Capture `offsets` every time `trigger` is written, as seen by the
    /// writer at that moment.
    pub fn snapshot_on_write(&self, trigger: usize, offsets: &[usize]) {
        lock(&self.state).watch = Some((trigger, offsets.to_vec()));
    }

    pub fn snapshots(&self) -> Vec<Vec<u32>> {
        lock(&self.state).snapshots.clone()
    }

    pub fn clear_log(&self) {
        let mut state = lock(&self.state);
        state.log.clear();
        state.reads.clear();
    }
}

impl RegisterBlock for FakeRegs {
    fn read(&self, offset: usize) -> u32 {
        let mut state = lock(&self.state);
        *state.reads.entry(offset).or_insert(0) += 1;
        if let Some(value) = state.scripts.get_mut(&offset).and_then(|q| q.pop_front()) {
            return value;
        }
        state.values.get(&offset).copied().unwrap_or(0)
    }

    fn write(&self, offset: usize, value: u32) {
        let mut state = lock(&self.state);
        let snapshot: Option<Vec<u32>> = match &state.watch {
            Some((trigger, offsets)) if *trigger == offset => Some(
                offsets
                    .iter()
                    .map(|off| state.values.get(off).copied().unwrap_or(0))
                    .collect(),
            ),
            _ => None,
        };
        if let Some(snapshot) = snapshot {
            state.snapshots.push(snapshot);
        }
        state.values.insert(offset, value);
        state.log.push((offset, value));
    }
}

// =============================================================================
// I2C
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FakeI2cError;

impl i2c::Error for FakeI2cError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data)
    }
}

#[derive(Default)]
struct BusState {
    writes: Vec<(u8, Vec<u8>)>,
    reads: usize,
    read_data: Vec<u8>,
    fail_after: Option<usize>,
    fail_all: bool,
}

/// I2C bus recording writes and serving reads from a fixed image.
#[derive(Clone, Default)]
pub struct FakeI2c {
    state: Arc<Mutex<BusState>>,
}

impl FakeI2c {
    pub fn new() -> Self {
        Self::default()
    }

    /// Successful writes, with the write half of a write-read included
    pub fn writes(&self) -> Vec<(u8, Vec<u8>)> {
        lock(&self.state).writes.clone()
    }

    pub fn reads(&self) -> usize {
        lock(&self.state).reads
    }

    /// Let `n` writes through, fail the rest
    pub fn fail_write_after(&self, n: usize) {
        lock(&self.state).fail_after = Some(n);
    }

    pub fn fail_all_writes(&self, fail: bool) {
        lock(&self.state).fail_all = fail;
    }

    pub fn set_read_data(&self, data: &[u8]) {
        lock(&self.state).read_data = data.to_vec();
    }
}

impl ErrorType for FakeI2c {
    type Error = FakeI2cError;
}

impl I2c for FakeI2c {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> core::result::Result<(), Self::Error> {
        let mut state = lock(&self.state);
        for op in operations.iter_mut() {
            match op {
                Operation::Write(bytes) => {
                    let exhausted = state.fail_after.is_some_and(|n| state.writes.len() >= n);
                    if state.fail_all || exhausted {
                        return Err(FakeI2cError);
                    }
                    state.writes.push((address, bytes.to_vec()));
                }
                Operation::Read(buf) => {
                    state.reads += 1;
                    for (i, b) in buf.iter_mut().enumerate() {
                        *b = state.read_data.get(i).copied().unwrap_or(0);
                    }
                }
            }
        }
        Ok(())
    }
}

// =============================================================================
// Board
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockOp {
    Enable(Clock),
    Disable(Clock),
    SetParent(Clock, Clock),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardOp {
    RegulatorsOn,
    RegulatorsOff,
    IrqEnable(IrqLine),
    IrqDisable(IrqLine),
    HpdRoute(HpdRoute),
}

/// Clock tree and board services recording every call.
#[derive(Default)]
pub struct FakeBoard {
    clocks: Vec<ClockOp>,
    ops: Vec<BoardOp>,
    fail_regulators: bool,
    hpd_level: bool,
}

impl FakeBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clock_log(&self) -> Vec<ClockOp> {
        self.clocks.clone()
    }

    pub fn ops(&self) -> Vec<BoardOp> {
        self.ops.clone()
    }

    pub fn fail_regulators(&mut self, fail: bool) {
        self.fail_regulators = fail;
    }

    pub fn set_hpd_level(&mut self, level: bool) {
        self.hpd_level = level;
    }
}

impl ClockControl for FakeBoard {
    fn enable(&mut self, clock: Clock) {
        self.clocks.push(ClockOp::Enable(clock));
    }

    fn disable(&mut self, clock: Clock) {
        self.clocks.push(ClockOp::Disable(clock));
    }

    fn set_parent(&mut self, clock: Clock, parent: Clock) {
        self.clocks.push(ClockOp::SetParent(clock, parent));
    }
}

impl HdmiBoard for FakeBoard {
    fn regulators_enable(&mut self) -> Result<()> {
        if self.fail_regulators {
            return Err(Error::NotPowered);
        }
        self.ops.push(BoardOp::RegulatorsOn);
        Ok(())
    }

    fn regulators_disable(&mut self) {
        self.ops.push(BoardOp::RegulatorsOff);
    }

    fn irq_enable(&mut self, line: IrqLine) {
        self.ops.push(BoardOp::IrqEnable(line));
    }

    fn irq_disable(&mut self, line: IrqLine) {
        self.ops.push(BoardOp::IrqDisable(line));
    }

    fn hpd_route(&mut self, route: HpdRoute) {
        self.ops.push(BoardOp::HpdRoute(route));
    }

    fn hpd_level(&mut self) -> bool {
        self.hpd_level
    }
}

/// Shared clock log for drivers that own their clock handle
#[derive(Clone, Default)]
pub struct SharedClocks {
    log: Arc<Mutex<Vec<ClockOp>>>,
}

impl SharedClocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&self) -> Vec<ClockOp> {
        lock(&self.log).clone()
    }
}

impl ClockControl for SharedClocks {
    fn enable(&mut self, clock: Clock) {
        lock(&self.log).push(ClockOp::Enable(clock));
    }

    fn disable(&mut self, clock: Clock) {
        lock(&self.log).push(ClockOp::Disable(clock));
    }

    fn set_parent(&mut self, clock: Clock, parent: Clock) {
        lock(&self.log).push(ClockOp::SetParent(clock, parent));
    }
}

// =============================================================================
// Monitor
// =============================================================================

pub struct FakeMonitor(Option<MonitorInfo>);

impl FakeMonitor {
    pub fn hdmi_with_audio() -> Self {
        Self(Some(MonitorInfo {
            hdmi_sink: true,
            audio: true,
        }))
    }

    pub fn dvi() -> Self {
        Self(Some(MonitorInfo::default()))
    }

    pub fn absent() -> Self {
        Self(None)
    }
}

impl MonitorInfoSource for FakeMonitor {
    fn read_monitor_info(&mut self) -> Option<MonitorInfo> {
        self.0
    }
}

// =============================================================================
// Delays
// =============================================================================

/// Returns immediately
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDelay;

impl DelayNs for NoDelay {
    fn delay_ns(&mut self, _ns: u32) {}
}

/// Returns immediately, adding up the time it was asked to wait
#[derive(Debug, Default)]
pub struct CountingDelay {
    total_ns: u64,
}

impl CountingDelay {
    pub fn total_ms(&self) -> u64 {
        self.total_ns / 1_000_000
    }
}

impl DelayNs for CountingDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.total_ns += ns as u64;
    }

    fn delay_ms(&mut self, ms: u32) {
        self.total_ns += ms as u64 * 1_000_000;
    }
}

/// Real sleep, for tests racing another thread
#[derive(Debug, Clone, Copy, Default)]
pub struct SleepDelay;

impl DelayNs for SleepDelay {
    fn delay_ns(&mut self, ns: u32) {
        std::thread::sleep(Duration::from_nanos(ns as u64));
    }
}
