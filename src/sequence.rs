//! Program and erase sequences: write enable, confirm, command, optionally confirm completion.
//!
//! Every sub-step is recorded in a [`Report`] in the order it ran, so a failing step never
//! hides another one. [`Report::status`] folds the steps into [`Status`] flags where the empty
//! value means success.

use bitflags::bitflags;
use embedded_hal::delay::DelayNs;
use heapless::Vec;

use crate::{
    address::{Address, EraseSize},
    chip::Timing,
    error::Error,
    interface::{Clock, FlashInterface},
    poll::{PollOutcome, Poller},
    register::PollTarget,
};

bitflags! {
    /// Accumulated status of a flash operation, empty on success
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Status: u8 {
        /// A status bit did not reach its value in time
        const TIMEOUT = 1 << 0;
        /// The bus reported an error
        const DEVICE = 1 << 1;
        /// The program or erase command was not sent
        const SKIPPED = 1 << 2;
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Status {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "Status({=u8:#04x})", self.bits())
    }
}

/// A sub-step of a sequence
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    WriteEnable,
    ConfirmWriteEnable,
    Program,
    Erase,
    ConfirmIdle,
    WriteDisable,
}

/// How a sub-step ended
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome<E> {
    Ok,
    /// The wait matched on its last chance read, counted as success
    MatchedLate,
    TimedOut,
    Device(E),
}

impl<E> StepOutcome<E> {
    pub fn is_ok(&self) -> bool {
        matches!(self, StepOutcome::Ok | StepOutcome::MatchedLate)
    }

    pub fn status(&self) -> Status {
        match self {
            StepOutcome::Ok | StepOutcome::MatchedLate => Status::empty(),
            StepOutcome::TimedOut => Status::TIMEOUT,
            StepOutcome::Device(_) => Status::DEVICE,
        }
    }
}

impl<E> From<Result<(), E>> for StepOutcome<E> {
    fn from(res: Result<(), E>) -> Self {
        match res {
            Ok(()) => StepOutcome::Ok,
            Err(e) => StepOutcome::Device(e),
        }
    }
}

impl<E> From<Result<PollOutcome, E>> for StepOutcome<E> {
    fn from(res: Result<PollOutcome, E>) -> Self {
        match res {
            Ok(PollOutcome::Matched) => StepOutcome::Ok,
            Ok(PollOutcome::MatchedAfterDeadline) => StepOutcome::MatchedLate,
            Ok(PollOutcome::TimedOut) => StepOutcome::TimedOut,
            Err(e) => StepOutcome::Device(e),
        }
    }
}

const MAX_STEPS: usize = 6;

/// Ordered record of the sub-steps of one program or erase
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report<E> {
    steps: Vec<(Step, StepOutcome<E>), MAX_STEPS>,
    skipped: bool,
}

impl<E> Report<E> {
    fn new() -> Self {
        Self {
            steps: Vec::new(),
            skipped: false,
        }
    }

    fn record(&mut self, step: Step, outcome: StepOutcome<E>) -> bool {
        let ok = outcome.is_ok();
        let pushed = self.steps.push((step, outcome));
        debug_assert!(pushed.is_ok(), "more than {} steps recorded", MAX_STEPS);
        ok
    }

    pub fn steps(&self) -> &[(Step, StepOutcome<E>)] {
        &self.steps
    }

    /// Whether `step` ran, successfully or not
    pub fn issued(&self, step: Step) -> bool {
        self.steps.iter().any(|(s, _)| *s == step)
    }

    pub fn outcome(&self, step: Step) -> Option<&StepOutcome<E>> {
        self.steps.iter().find(|(s, _)| *s == step).map(|(_, o)| o)
    }

    /// Bitwise OR of every step's status
    pub fn status(&self) -> Status {
        let mut status = if self.skipped {
            Status::SKIPPED
        } else {
            Status::empty()
        };
        for (_, outcome) in self.steps.iter() {
            status |= outcome.status();
        }
        status
    }

    pub fn is_ok(&self) -> bool {
        self.status().is_empty()
    }

    /// The first failing step as an error
    pub fn into_result(self) -> Result<(), Error<E>> {
        for (_, outcome) in self.steps {
            match outcome {
                StepOutcome::Ok | StepOutcome::MatchedLate => {}
                StepOutcome::TimedOut => return Err(Error::Timeout),
                StepOutcome::Device(e) => return Err(Error::Spi(e)),
            }
        }
        Ok(())
    }
}

/// Send write enable and wait for WEL. Returns false, marking the report skipped, if the
/// latch could not be confirmed.
fn enable_write<I, C, D>(
    iface: &mut I,
    poller: &mut Poller<C, D>,
    timing: &Timing,
    report: &mut Report<I::Error>,
) -> bool
where
    I: FlashInterface,
    C: Clock,
    D: DelayNs,
{
    let enabled = report.record(Step::WriteEnable, iface.issue_write_enable(true).into())
        && report.record(
            Step::ConfirmWriteEnable,
            poller
                .wait(iface, PollTarget::WRITE_ENABLED, timing.t_wsr_us)
                .into(),
        );
    if !enabled {
        log::debug!("write enable not confirmed, command skipped");
        report.skipped = true;
    }
    enabled
}

/// Program `buff` at `addr`.
///
/// The program command is only sent once the write enable latch is confirmed. With `block`
/// the completion is awaited; a timeout there is reported but the data may still land.
///
/// The completion budget is tBP for a single byte and widens with the length up to tPP, see
/// [`Timing::program_max_us`].
pub fn program<I, C, D>(
    iface: &mut I,
    poller: &mut Poller<C, D>,
    timing: &Timing,
    addr: Address,
    buff: &[u8],
    block: bool,
) -> Report<I::Error>
where
    I: FlashInterface,
    C: Clock,
    D: DelayNs,
{
    let mut report = Report::new();
    if !enable_write(iface, poller, timing, &mut report) {
        return report;
    }

    report.record(Step::Program, iface.issue_program(addr, buff).into());
    if block {
        let budget = timing.program_max_us(buff.len());
        report.record(
            Step::ConfirmIdle,
            poller.wait(iface, PollTarget::IDLE, budget).into(),
        );
    }
    report
}

/// Erase the `size` unit containing `addr`.
///
/// Same shape as [`program`], with the completion budget taken from the erase size. Write
/// disable is always sent last, whatever happened before.
pub fn erase<I, C, D>(
    iface: &mut I,
    poller: &mut Poller<C, D>,
    timing: &Timing,
    size: EraseSize,
    addr: Address,
    block: bool,
) -> Report<I::Error>
where
    I: FlashInterface,
    C: Clock,
    D: DelayNs,
{
    let mut report = Report::new();
    if enable_write(iface, poller, timing, &mut report) {
        report.record(Step::Erase, iface.issue_erase(size, addr).into());
        if block {
            report.record(
                Step::ConfirmIdle,
                poller
                    .wait(iface, PollTarget::IDLE, timing.erase_max_us(size))
                    .into(),
            );
        }
    }
    report.record(Step::WriteDisable, iface.issue_write_enable(false).into());
    report
}
