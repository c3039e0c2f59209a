//! Bounded busy-wait helpers shared by the PHY and video-processor paths.

use embedded_hal::delay::DelayNs;

/// A bounded poll ran out of attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollTimeout {
    /// Attempts made before giving up
    pub attempts: u32,
}

/// Poll `ready` up to `attempts` times, sleeping `interval_ms` between
/// failed checks.
///
/// Returns the number of attempts used on success. Blocking and
/// uncancellable: the worst case is `attempts * interval_ms` milliseconds.
pub fn poll_until<D, F>(
    attempts: u32,
    interval_ms: u32,
    delay: &mut D,
    mut ready: F,
) -> Result<u32, PollTimeout>
where
    D: DelayNs,
    F: FnMut() -> bool,
{
    for attempt in 1..=attempts {
        if ready() {
            return Ok(attempt);
        }
        delay.delay_ms(interval_ms);
    }
    Err(PollTimeout { attempts })
}

/// Split `value` into `N` little-endian bytes.
pub fn le_bytes<const N: usize>(value: u32) -> [u8; N] {
    let mut out = [0u8; N];
    for (i, byte) in out.iter_mut().enumerate() {
        *byte = (value >> (8 * i)) as u8;
    }
    out
}
