//! Error type shared by the HDMI, PHY and mixer paths.

use core::fmt;

/// Which bounded wait ran out of budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutSource {
    /// PHY PLL never reported lock (100 x 1 ms)
    PllLock,
    /// Video processor soft reset never completed (100 x 10 ms)
    VideoProcessorReset,
    /// No vertical sync within one second
    Vsync,
}

/// Error type for display pipeline operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The mode cannot be produced on this hardware generation
    ModeRejected,
    /// Lookup miss (PHY entry, monitor information)
    NotFound,
    /// Serial bus transaction failed or transferred fewer bytes than asked
    Bus,
    /// A bounded wait expired
    Timeout(TimeoutSource),
    /// Bad layer index, missing overlay description or unsupported format
    InvalidArgument,
    /// Register access attempted while the device is powered off
    NotPowered,
    /// Operation has no implementation on this hardware generation
    Unsupported,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::ModeRejected => write!(f, "Mode rejected"),
            Error::NotFound => write!(f, "Not found"),
            Error::Bus => write!(f, "Serial bus error"),
            Error::Timeout(TimeoutSource::PllLock) => write!(f, "PHY PLL lock timeout"),
            Error::Timeout(TimeoutSource::VideoProcessorReset) => {
                write!(f, "Video processor reset timeout")
            }
            Error::Timeout(TimeoutSource::Vsync) => write!(f, "Vsync wait timeout"),
            Error::InvalidArgument => write!(f, "Invalid argument"),
            Error::NotPowered => write!(f, "Device not powered"),
            Error::Unsupported => write!(f, "Unsupported on this hardware generation"),
        }
    }
}

/// Result alias used throughout the crate
pub type Result<T> = core::result::Result<T, Error>;
