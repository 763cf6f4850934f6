//! Error codes shared between board drivers and the bring-up sequence.
//!
//! Drivers report failure the way the host RTOS expects it: a negated errno.
//! [`ErrorCode`] carries that value unchanged from the failing driver to the
//! host, so the supervisor sees exactly what the SD or SPI driver returned.

use thiserror_no_std::Error;

/// A negated errno value reported by a board driver.
///
/// Always strictly negative. Constructed from a positive errno with
/// [`ErrorCode::from_errno`] or taken from the named constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ErrorCode(i32);

impl ErrorCode {
    /// I/O error (`-EIO`).
    pub const EIO: Self = Self(-5);
    /// No such device (`-ENXIO`).
    pub const ENXIO: Self = Self(-6);
    /// Out of memory (`-ENOMEM`).
    pub const ENOMEM: Self = Self(-12);
    /// Device or resource busy (`-EBUSY`).
    pub const EBUSY: Self = Self(-16);
    /// No such device (`-ENODEV`).
    pub const ENODEV: Self = Self(-19);
    /// Invalid argument (`-EINVAL`).
    pub const EINVAL: Self = Self(-22);
    /// Operation timed out (`-ETIMEDOUT`).
    pub const ETIMEDOUT: Self = Self(-110);

    /// Build an error code from a positive errno (`5` becomes `-5`).
    ///
    /// Returns `None` for zero, which is the success status and never an error.
    #[must_use]
    pub const fn from_errno(errno: u16) -> Option<Self> {
        if errno == 0 {
            None
        } else {
            // u16 -> i32 is lossless, so the negation cannot wrap.
            Some(Self((errno as i32).wrapping_neg()))
        }
    }

    /// The negated errno, as the host runtime expects it.
    #[must_use]
    pub const fn get(self) -> i32 {
        self.0
    }
}

impl core::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "errno {}", self.0)
    }
}

/// The DMA buffer allocator could not reserve its pool.
///
/// Non-fatal: the bring-up sequence logs it and continues in degraded mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AllocError {
    /// The requested pool does not fit in the reserved region.
    #[error("DMA pool exhausted")]
    Exhausted,
    /// The allocator reported a driver error.
    #[error("DMA allocator failed: {0}")]
    Driver(ErrorCode),
}
