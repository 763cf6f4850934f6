//! Bring-up orchestrator.
//!
//! Runs the application bring-up stages once, in a fixed order, and stops at
//! the first fatal failure:
//!
//! ```text
//! RailsEnabling → LanguageRuntimePrep → ParamStoreInit → TimebaseInit
//!   → DmaAllocInit → CpuLoadInstrumentInit → SerialPollRegister → LedInit
//!   → SdInit → AutomountInit → SpiInit → Ready
//!
//! SdInit  ─fail→ Faulted(StorageInit(code))
//! SpiInit ─fail→ Faulted(BusInit(code))
//! ```
//!
//! # Failure classes
//!
//! - Storage and bus failures are fatal: the fault color is asserted once and
//!   the driver's code is returned unchanged. Nothing after the failing stage
//!   runs.
//! - DMA pool and callout table exhaustion are logged and bring-up continues;
//!   the stage is recorded as [`StageOutcome::Degraded`].
//! - Everything else has no failure path.
//!
//! The orchestrator is consumed by [`Orchestrator::run`]; bring-up cannot be
//! restarted.

use platform::{
    Callout, ErrorCode, GpioController, LedColor, PeriodicPollHandle, PeriodicRegistrar,
    PeripheralBus, RailControl, StatusLed, SystemServices,
};
use thiserror_no_std::Error;

use crate::board_config::BringUpOptions;
use crate::bus::BusInitializer;
use crate::poll::register_serial_dma_poll;
use crate::sequencer::{EarlyInit, PowerSequencer};

/// Everything bring-up needs from the board.
pub trait Board:
    GpioController + RailControl + PeripheralBus + StatusLed + SystemServices + PeriodicRegistrar
{
}

impl<T> Board for T where
    T: GpioController
        + RailControl
        + PeripheralBus
        + StatusLed
        + SystemServices
        + PeriodicRegistrar
        + ?Sized
{
}

/// Application bring-up stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BringUpStage {
    /// SD card, sensors and ethernet rails; SPI chip selects.
    RailsEnabling,
    /// Static constructors of the application image.
    LanguageRuntimePrep,
    /// Parameter store.
    ParamStoreInit,
    /// High-resolution timebase.
    TimebaseInit,
    /// DMA buffer pool.
    DmaAllocInit,
    /// CPU load accounting (optional).
    CpuLoadInstrumentInit,
    /// 1 ms serial DMA poll (optional).
    SerialPollRegister,
    /// LED driver start, all channels off.
    LedInit,
    /// SDHC controller and card.
    SdInit,
    /// SD automounter (optional).
    AutomountInit,
    /// SPI buses (optional).
    SpiInit,
}

impl BringUpStage {
    /// Number of stages.
    pub const COUNT: usize = 11;

    /// Every stage, in execution order.
    pub const ALL: [Self; Self::COUNT] = [
        Self::RailsEnabling,
        Self::LanguageRuntimePrep,
        Self::ParamStoreInit,
        Self::TimebaseInit,
        Self::DmaAllocInit,
        Self::CpuLoadInstrumentInit,
        Self::SerialPollRegister,
        Self::LedInit,
        Self::SdInit,
        Self::AutomountInit,
        Self::SpiInit,
    ];

    /// Stage name for logs.
    pub const fn name(self) -> &'static str {
        match self {
            Self::RailsEnabling => "RailsEnabling",
            Self::LanguageRuntimePrep => "LanguageRuntimePrep",
            Self::ParamStoreInit => "ParamStoreInit",
            Self::TimebaseInit => "TimebaseInit",
            Self::DmaAllocInit => "DmaAllocInit",
            Self::CpuLoadInstrumentInit => "CpuLoadInstrumentInit",
            Self::SerialPollRegister => "SerialPollRegister",
            Self::LedInit => "LedInit",
            Self::SdInit => "SdInit",
            Self::AutomountInit => "AutomountInit",
            Self::SpiInit => "SpiInit",
        }
    }
}

/// Fatal bring-up failures. Each carries the driver's code unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BringUpError {
    /// SD/MMC controller or card bring-up failed.
    #[error("storage init failed: {0}")]
    StorageInit(ErrorCode),
    /// SPI bus bring-up failed.
    #[error("bus init failed: {0}")]
    BusInit(ErrorCode),
}

impl BringUpError {
    /// The driver's negated errno.
    pub const fn code(self) -> ErrorCode {
        match self {
            Self::StorageInit(code) | Self::BusInit(code) => code,
        }
    }

    /// Stage that produced this error.
    pub const fn stage(self) -> BringUpStage {
        match self {
            Self::StorageInit(_) => BringUpStage::SdInit,
            Self::BusInit(_) => BringUpStage::SpiInit,
        }
    }
}

/// Where the orchestrator is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BringUpState {
    /// Executing a stage.
    Running(BringUpStage),
    /// Every stage done.
    Ready,
    /// Stopped at a fatal failure.
    Faulted(BringUpError),
}

/// How a stage ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StageOutcome {
    /// Ran to completion.
    Completed,
    /// Disabled in [`BringUpOptions`].
    Skipped,
    /// Ran, failed, and bring-up carried on.
    Degraded,
    /// Ran and failed fatally.
    Failed(ErrorCode),
}

/// One entry of the stage trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StageRecord {
    /// Stage
    pub stage: BringUpStage,
    /// Result
    pub outcome: StageOutcome,
}

/// Result of a bring-up run.
#[derive(Debug)]
pub struct BringUpReport {
    state: BringUpState,
    trace: heapless::Vec<StageRecord, { BringUpStage::COUNT }>,
    serial_poll: Option<PeriodicPollHandle>,
}

impl BringUpReport {
    /// Terminal state: `Ready` or `Faulted`.
    pub fn state(&self) -> BringUpState {
        self.state
    }

    /// `true` when every stage succeeded.
    pub fn is_ready(&self) -> bool {
        self.state == BringUpState::Ready
    }

    /// `Ok(())` when ready, otherwise the fatal error.
    pub fn result(&self) -> Result<(), BringUpError> {
        match self.state {
            BringUpState::Faulted(err) => Err(err),
            BringUpState::Ready | BringUpState::Running(_) => Ok(()),
        }
    }

    /// Host status convention: `0` on success, negated errno on failure.
    pub fn status_code(&self) -> i32 {
        match self.result() {
            Ok(()) => 0,
            Err(err) => err.code().get(),
        }
    }

    /// Stages reached, in execution order.
    pub fn trace(&self) -> &[StageRecord] {
        &self.trace
    }

    /// How `stage` ended, or `None` if it was never reached.
    pub fn outcome(&self, stage: BringUpStage) -> Option<StageOutcome> {
        self.trace
            .iter()
            .find(|r| r.stage == stage)
            .map(|r| r.outcome)
    }

    /// `true` if `stage` was reached and not skipped.
    pub fn executed(&self, stage: BringUpStage) -> bool {
        matches!(
            self.outcome(stage),
            Some(StageOutcome::Completed | StageOutcome::Degraded | StageOutcome::Failed(_))
        )
    }

    /// Handle of the serial DMA poll, if it was registered.
    pub fn serial_poll(&self) -> Option<PeriodicPollHandle> {
        self.serial_poll
    }
}

/// One-shot bring-up driver.
pub struct Orchestrator {
    options: BringUpOptions,
    serial_poll: Callout,
    state: BringUpState,
    trace: heapless::Vec<StageRecord, { BringUpStage::COUNT }>,
    poll_handle: Option<PeriodicPollHandle>,
}

impl Orchestrator {
    /// Orchestrator for the given stage switches. `serial_poll` is the
    /// callout registered by the `SerialPollRegister` stage.
    pub fn new(options: BringUpOptions, serial_poll: Callout) -> Self {
        Self {
            options,
            serial_poll,
            state: BringUpState::Running(BringUpStage::RailsEnabling),
            trace: heapless::Vec::new(),
            poll_handle: None,
        }
    }

    /// Run every stage against `board`, starting from an early-initialised
    /// sequencer.
    pub fn run<B: Board + ?Sized>(
        mut self,
        sequencer: PowerSequencer<EarlyInit>,
        board: &mut B,
    ) -> BringUpReport {
        self.enter(BringUpStage::RailsEnabling);
        let rails = sequencer.enable_application_rails(board);
        self.finish(BringUpStage::RailsEnabling, StageOutcome::Completed);

        self.enter(BringUpStage::LanguageRuntimePrep);
        board.init_language_runtime();
        self.finish(BringUpStage::LanguageRuntimePrep, StageOutcome::Completed);

        self.enter(BringUpStage::ParamStoreInit);
        board.init_param_store();
        self.finish(BringUpStage::ParamStoreInit, StageOutcome::Completed);

        self.enter(BringUpStage::TimebaseInit);
        board.init_timebase();
        self.finish(BringUpStage::TimebaseInit, StageOutcome::Completed);

        self.enter(BringUpStage::DmaAllocInit);
        let outcome = match board.init_dma_allocator() {
            Ok(()) => StageOutcome::Completed,
            Err(_) => {
                log_error!("DMA alloc FAILED");
                StageOutcome::Degraded
            }
        };
        self.finish(BringUpStage::DmaAllocInit, outcome);

        if self.options.cpu_load {
            self.enter(BringUpStage::CpuLoadInstrumentInit);
            board.init_cpu_load();
            self.finish(BringUpStage::CpuLoadInstrumentInit, StageOutcome::Completed);
        } else {
            self.skip(BringUpStage::CpuLoadInstrumentInit);
        }

        if self.options.serial_dma_poll {
            self.enter(BringUpStage::SerialPollRegister);
            let outcome = match register_serial_dma_poll(board, self.serial_poll) {
                Ok(handle) => {
                    self.poll_handle = Some(handle);
                    StageOutcome::Completed
                }
                Err(_) => {
                    log_error!("serial DMA poll registration FAILED");
                    StageOutcome::Degraded
                }
            };
            self.finish(BringUpStage::SerialPollRegister, outcome);
        } else {
            self.skip(BringUpStage::SerialPollRegister);
        }

        self.enter(BringUpStage::LedInit);
        board.start();
        board.all_off();
        self.finish(BringUpStage::LedInit, StageOutcome::Completed);

        let bus = BusInitializer::new(&rails);

        self.enter(BringUpStage::SdInit);
        if let Err(err) = bus.init_sdcard(board) {
            return self.fault(board, err);
        }
        self.finish(BringUpStage::SdInit, StageOutcome::Completed);

        if self.options.automount {
            self.enter(BringUpStage::AutomountInit);
            board.init_automount();
            self.finish(BringUpStage::AutomountInit, StageOutcome::Completed);
        } else {
            self.skip(BringUpStage::AutomountInit);
        }

        if self.options.spi {
            self.enter(BringUpStage::SpiInit);
            if let Err(err) = bus.init_spi_bus(board) {
                return self.fault(board, err);
            }
            self.finish(BringUpStage::SpiInit, StageOutcome::Completed);
        } else {
            self.skip(BringUpStage::SpiInit);
        }

        self.state = BringUpState::Ready;
        log_info!("bring-up complete");
        self.into_report()
    }

    fn enter(&mut self, stage: BringUpStage) {
        self.state = BringUpState::Running(stage);
        log_debug!("stage {}", stage.name());
    }

    fn finish(&mut self, stage: BringUpStage, outcome: StageOutcome) {
        // One record per stage, COUNT stages: the trace cannot overflow.
        let _ = self.trace.push(StageRecord { stage, outcome });
    }

    fn skip(&mut self, stage: BringUpStage) {
        log_debug!("stage {} skipped", stage.name());
        self.finish(stage, StageOutcome::Skipped);
    }

    fn fault<B: Board + ?Sized>(mut self, board: &mut B, err: BringUpError) -> BringUpReport {
        let stage = err.stage();
        log_error!(
            "bring-up failed in {}: errno {}",
            stage.name(),
            err.code().get()
        );
        self.finish(stage, StageOutcome::Failed(err.code()));
        board.set(LedColor::FAULT, true);
        self.state = BringUpState::Faulted(err);
        self.into_report()
    }

    fn into_report(self) -> BringUpReport {
        BringUpReport {
            state: self.state,
            trace: self.trace,
            serial_poll: self.poll_handle,
        }
    }
}
