//! Waiting for a status register bit to reach a value.
//!
//! Two strategies are available, chosen per chip family through [`crate::chip::ChipInfo`]:
//!
//! * [`WaitStrategy::Adaptive`] derives its deadline from the nominal duration of the
//!   operation (1.5 times of it) and samples with a shrinking interval. Once the deadline
//!   has passed the register is read one last time, a match there still counts.
//! * [`WaitStrategy::Fixed`] samples at a constant interval until a fixed timeout.

use embedded_hal::delay::DelayNs;

use crate::{
    interface::{Clock, FlashInterface},
    register::PollTarget,
};

/// Floor of the adaptive sleep budget, the sleep itself is half of it.
pub const MIN_REMAINING_US: u32 = 200;

/// How a [`Poller`] decides when to sample and when to give up
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStrategy {
    /// Deadline at 1.5x the expected duration, halving sleep between samples
    Adaptive,
    /// Deadline at `timeout_us` regardless of the expected duration
    Fixed {
        timeout_us: u32,
        poll_interval_us: u32,
    },
}

impl WaitStrategy {
    pub const fn fixed(timeout_us: u32, poll_interval_us: u32) -> Self {
        WaitStrategy::Fixed {
            timeout_us,
            poll_interval_us,
        }
    }
}

/// Result of a single wait
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// The bit matched before the deadline
    Matched,
    /// The deadline passed but the last chance read matched
    MatchedAfterDeadline,
    /// Even the last chance read did not match
    TimedOut,
}

impl PollOutcome {
    pub fn is_match(self) -> bool {
        !matches!(self, PollOutcome::TimedOut)
    }
}

/// Read the status register once and tell whether `target` is met.
pub fn sample<I: FlashInterface>(iface: &mut I, target: PollTarget) -> Result<bool, I::Error> {
    let status = iface.read_status_register()?;
    log::trace!("status {:02x}, waiting for {:?}={}", status, target.bit, target.value);
    Ok(target.matches(status))
}

/// Blocking status register poller.
///
/// Owns the clock used to measure deadlines and the delay used to sleep between samples.
pub struct Poller<C, D> {
    clock: C,
    delay: D,
    strategy: WaitStrategy,
}

impl<C, D> Poller<C, D>
where
    C: Clock,
    D: DelayNs,
{
    pub fn new(clock: C, delay: D, strategy: WaitStrategy) -> Self {
        Self {
            clock,
            delay,
            strategy,
        }
    }

    pub fn strategy(&self) -> WaitStrategy {
        self.strategy
    }

    pub fn set_strategy(&mut self, strategy: WaitStrategy) {
        self.strategy = strategy;
    }

    /// The delay provider, also used for pin timing by the driver
    pub fn delay(&mut self) -> &mut D {
        &mut self.delay
    }

    /// Give back the clock and the delay
    pub fn release(self) -> (C, D) {
        (self.clock, self.delay)
    }

    /// Block until `target` is met or the strategy gives up.
    ///
    /// `max_expected_us` is the nominal duration of the operation being waited on, not a hard
    /// deadline. Every sample is one status register read. Bus errors end the wait immediately.
    pub fn wait<I: FlashInterface>(
        &mut self,
        iface: &mut I,
        target: PollTarget,
        max_expected_us: u32,
    ) -> Result<PollOutcome, I::Error> {
        let outcome = match self.strategy {
            WaitStrategy::Adaptive => self.wait_adaptive(iface, target, max_expected_us)?,
            WaitStrategy::Fixed {
                timeout_us,
                poll_interval_us,
            } => self.wait_fixed(iface, target, timeout_us, poll_interval_us)?,
        };
        if outcome != PollOutcome::Matched {
            log::debug!(
                "wait for {:?}={} ended with {:?}",
                target.bit,
                target.value,
                outcome
            );
        }
        Ok(outcome)
    }

    fn wait_adaptive<I: FlashInterface>(
        &mut self,
        iface: &mut I,
        target: PollTarget,
        max_expected_us: u32,
    ) -> Result<PollOutcome, I::Error> {
        let deadline = max_expected_us as u64 * 3 / 2;
        let mut remaining = max_expected_us.max(MIN_REMAINING_US);
        let start = self.clock.now_us();

        loop {
            if self.elapsed_since(start) >= deadline {
                return Ok(if sample(iface, target)? {
                    PollOutcome::MatchedAfterDeadline
                } else {
                    PollOutcome::TimedOut
                });
            }

            if sample(iface, target)? {
                return Ok(PollOutcome::Matched);
            }
            // The sample ended past the deadline, it was the last chance read.
            if self.elapsed_since(start) >= deadline {
                return Ok(PollOutcome::TimedOut);
            }

            // Never sleep past the deadline, the next check must see it. The truncated
            // sleep may fall under the 100 µs floor.
            let left = deadline.saturating_sub(self.elapsed_since(start));
            let sleep = ((remaining / 2) as u64).min(left);
            if sleep > 0 {
                self.delay.delay_us(sleep as u32);
            }

            remaining = (remaining - remaining / 2).max(MIN_REMAINING_US);
        }
    }

    fn wait_fixed<I: FlashInterface>(
        &mut self,
        iface: &mut I,
        target: PollTarget,
        timeout_us: u32,
        poll_interval_us: u32,
    ) -> Result<PollOutcome, I::Error> {
        let start = self.clock.now_us();
        loop {
            if self.elapsed_since(start) > timeout_us as u64 {
                return Ok(PollOutcome::TimedOut);
            }
            if sample(iface, target)? {
                return Ok(PollOutcome::Matched);
            }
            if poll_interval_us > 0 {
                self.delay.delay_us(poll_interval_us);
            }
        }
    }

    fn elapsed_since(&mut self, start: u64) -> u64 {
        self.clock.now_us().saturating_sub(start)
    }
}
