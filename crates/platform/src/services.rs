//! System services the bring-up sequence invokes but does not implement.
//!
//! Each hook corresponds to one host-runtime subsystem. Only the DMA
//! allocator reports failure, and that failure is survivable.

use crate::error::AllocError;

/// Host runtime subsystems initialised during bring-up.
pub trait SystemServices {
    /// Configure the board's timer peripherals (clock gating, prescalers).
    /// Runs during early board initialisation, before any rail switching.
    fn init_board_timers(&mut self);

    /// Run static constructors of the application image.
    fn init_language_runtime(&mut self);

    /// Load the parameter store.
    fn init_param_store(&mut self);

    /// Start the high-resolution timebase. Anything that schedules callouts
    /// must come after this.
    fn init_timebase(&mut self);

    /// Reserve the DMA-capable buffer pool.
    fn init_dma_allocator(&mut self) -> Result<(), AllocError>;

    /// Start CPU load accounting.
    fn init_cpu_load(&mut self);

    /// Start the SD card automounter.
    fn init_automount(&mut self);
}
