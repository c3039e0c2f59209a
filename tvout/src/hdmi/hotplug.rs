//! Hotplug interrupt handling.
//!
//! The interrupt side only acknowledges the controller and queues an event.
//! Framework notification happens later, from [`super::Hdmi::dispatch_hotplug`],
//! which is the only consumer of the queue.

use alloc::sync::Arc;
use core::sync::atomic::Ordering;

use heapless::Deque;
use log::{debug, warn};

use super::regs::{INTC_FLAG, INTC_FLAG_HPD_PLUG, INTC_FLAG_HPD_UNPLUG};
use super::HdmiShared;
use crate::config::HOTPLUG_QUEUE_DEPTH;
use crate::platform::RegisterBlock;

/// What the interrupt observed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotplugEvent {
    Plugged,
    Unplugged,
    /// Pin activity without controller flags (encoder off, or both flags)
    Changed,
}

/// Receives hotplug notifications outside interrupt context.
pub trait HotplugListener {
    fn hotplug(&mut self, event: HotplugEvent);
}

impl<F: FnMut(HotplugEvent)> HotplugListener for F {
    fn hotplug(&mut self, event: HotplugEvent) {
        self(event)
    }
}

pub(crate) type EventQueue = Deque<HotplugEvent, HOTPLUG_QUEUE_DEPTH>;

/// Push `event`, dropping the oldest entry when the queue is full.
pub(crate) fn enqueue(queue: &mut EventQueue, event: HotplugEvent) {
    if queue.is_full() {
        if let Some(dropped) = queue.pop_front() {
            warn!("hdmi: hotplug queue full, dropping {:?}", dropped);
        }
    }
    let _ = queue.push_back(event);
}

/// Interrupt-context handle, cheap to clone.
pub struct HotplugIrq<R> {
    shared: Arc<HdmiShared<R>>,
}

impl<R> Clone for HotplugIrq<R> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<R: RegisterBlock> HotplugIrq<R> {
    pub(crate) fn new(shared: Arc<HdmiShared<R>>) -> Self {
        Self { shared }
    }

    /// Interrupt entry point for both the internal and the external line.
    ///
    /// Returns the event queued, if any.
    pub fn handle(&self) -> Option<HotplugEvent> {
        let shared = &self.shared;
        let mut event = HotplugEvent::Changed;

        if shared.powered.load(Ordering::Acquire) {
            let flags = shared.regs.read(INTC_FLAG);
            let unplug = flags & INTC_FLAG_HPD_UNPLUG != 0;
            let plug = flags & INTC_FLAG_HPD_PLUG != 0;
            let handling = shared.hpd_handle.load(Ordering::Acquire);
            if unplug {
                debug!("hdmi: int unplugged, handling:{}", handling);
                shared.regs.write_mask(INTC_FLAG, !0, INTC_FLAG_HPD_UNPLUG);
            }
            if plug {
                debug!("hdmi: int plugged, handling:{}", handling);
                shared.regs.write_mask(INTC_FLAG, !0, INTC_FLAG_HPD_PLUG);
            }
            event = match (plug, unplug) {
                (true, false) => HotplugEvent::Plugged,
                (false, true) => HotplugEvent::Unplugged,
                _ => HotplugEvent::Changed,
            };
        }

        if !shared.hpd_handle.load(Ordering::Acquire) {
            return None;
        }
        enqueue(&mut shared.events.lock(), event);
        Some(event)
    }
}
