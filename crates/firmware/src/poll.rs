//! Serial DMA poll registration.
//!
//! Receivers running on DMA only see an interrupt when a buffer half fills.
//! Short frames sit in the buffer until the next poll drains them, so the
//! poll runs every millisecond for the lifetime of the process.

use embassy_time::Duration;
use platform::{Callout, PeriodicPollHandle, PeriodicRegistrar, ScheduleError};

use crate::board_config::SERIAL_DMA_POLL_INTERVAL;

/// Register `callout` to run after `interval`, then every `interval`.
pub fn register_periodic<R: PeriodicRegistrar + ?Sized>(
    registrar: &mut R,
    interval: Duration,
    callout: Callout,
) -> Result<PeriodicPollHandle, ScheduleError> {
    registrar.call_every(interval, interval, callout)
}

/// Register the serial DMA poll at [`SERIAL_DMA_POLL_INTERVAL`].
pub fn register_serial_dma_poll<R: PeriodicRegistrar + ?Sized>(
    registrar: &mut R,
    callout: Callout,
) -> Result<PeriodicPollHandle, ScheduleError> {
    let handle = register_periodic(registrar, SERIAL_DMA_POLL_INTERVAL, callout)?;
    log_debug!("serial DMA poll in slot {}", handle.slot());
    Ok(handle)
}
