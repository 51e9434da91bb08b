//! Bounded polling of an external condition.
//!
//! A [`Poller`] repeatedly invokes a probe until it reports that the condition
//! was reached, the attempt budget is exhausted, the probe itself fails or
//! the wait is cancelled.
//!
//! The probe distinguishes two kinds of "no":
//! - `Ok(Convergence::Pending(observation))`: the condition does not hold yet, try again later.
//! - `Err(error)`: the condition could not be evaluated at all, stop immediately.
mod cancel;

pub use cancel::CancelToken;

use std::fmt::{Debug, Display, Formatter};
use std::num::NonZeroU32;
use std::time::{Duration, Instant};

use crate::common::error::HarnessError;
use crate::common::utils::time::now_monotonic;

/// What a single probe invocation observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Convergence<T, P> {
    /// The condition holds.
    Reached(T),
    /// The condition does not hold yet.
    Pending(P),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    max_attempts: u32,
    interval: Duration,
}

impl PollPolicy {
    pub const fn fixed(max_attempts: NonZeroU32, interval: Duration) -> Self {
        Self {
            max_attempts: max_attempts.get(),
            interval,
        }
    }

    pub fn new(max_attempts: u32, interval: Duration) -> crate::Result<Self> {
        let max_attempts = NonZeroU32::new(max_attempts).ok_or_else(|| {
            HarnessError::ConfigError("Poll policy needs at least one attempt".to_string())
        })?;
        Ok(Self::fixed(max_attempts, interval))
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Upper bound of the time spent sleeping between attempts.
    pub fn max_wait(&self) -> Duration {
        self.interval.saturating_mul(self.max_attempts - 1)
    }
}

#[derive(Debug)]
pub enum FailureReason<E> {
    /// All attempts were used and the condition was never reached.
    Exhausted,
    /// The probe could not evaluate the condition.
    ProbeFailed(E),
    Cancelled,
    /// The next attempt would happen after the deadline.
    DeadlineExceeded,
}

/// Failed poll.
///
/// The last pending observation is kept even when the poll ended because of
/// a probe error, so both can be inspected.
#[derive(Debug)]
pub struct PollFailure<P, E> {
    pub attempts: u32,
    pub last_observation: Option<P>,
    pub reason: FailureReason<E>,
}

impl<P, E> PollFailure<P, E> {
    pub fn is_exhausted(&self) -> bool {
        matches!(self.reason, FailureReason::Exhausted)
    }

    pub fn into_probe_error(self) -> Option<E> {
        match self.reason {
            FailureReason::ProbeFailed(error) => Some(error),
            _ => None,
        }
    }
}

impl<P: Display, E: Display> Display for PollFailure<P, E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.reason {
            FailureReason::Exhausted => {
                write!(f, "condition not reached after {} attempt(s)", self.attempts)?
            }
            FailureReason::ProbeFailed(error) => {
                write!(f, "probe failed at attempt {}: {error}", self.attempts)?
            }
            FailureReason::Cancelled => write!(f, "cancelled after {} attempt(s)", self.attempts)?,
            FailureReason::DeadlineExceeded => {
                write!(f, "deadline exceeded after {} attempt(s)", self.attempts)?
            }
        }
        if let Some(observation) = &self.last_observation {
            write!(f, " (last observation: {observation})")?;
        }
        Ok(())
    }
}

impl<P: Display + Debug, E: Display + Debug> std::error::Error for PollFailure<P, E> {}

impl<P: Display, E: Display> From<PollFailure<P, E>> for HarnessError {
    fn from(failure: PollFailure<P, E>) -> Self {
        match failure.reason {
            FailureReason::Cancelled => HarnessError::Cancelled,
            _ => HarnessError::ConvergenceError(failure.to_string()),
        }
    }
}

pub type PollOutcome<T, P, E> = Result<T, PollFailure<P, E>>;

pub struct Poller {
    name: String,
    policy: PollPolicy,
    cancel: Option<CancelToken>,
    deadline: Option<Instant>,
}

impl Poller {
    pub fn new(name: impl Into<String>, policy: PollPolicy) -> Self {
        Self {
            name: name.into(),
            policy,
            cancel: None,
            deadline: None,
        }
    }

    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn policy(&self) -> &PollPolicy {
        &self.policy
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Polls `probe`, blocking the current thread between attempts.
    pub fn run<T, P, E, F>(&self, probe: F) -> PollOutcome<T, P, E>
    where
        F: FnMut() -> Result<Convergence<T, P>, E>,
        P: Display,
        E: Display,
    {
        self.run_with_sleep(probe, std::thread::sleep)
    }

    pub fn run_with_sleep<T, P, E, F, S>(&self, mut probe: F, mut sleep: S) -> PollOutcome<T, P, E>
    where
        F: FnMut() -> Result<Convergence<T, P>, E>,
        S: FnMut(Duration),
        P: Display,
        E: Display,
    {
        let max_attempts = self.policy.max_attempts;
        let mut last_observation = None;
        let mut attempt = 0;

        loop {
            attempt += 1;
            match probe() {
                Ok(Convergence::Reached(value)) => {
                    log::info!("{}: reached at attempt {attempt}/{max_attempts}", self.name);
                    return Ok(value);
                }
                Ok(Convergence::Pending(observation)) => {
                    log::debug!(
                        "{}: attempt {attempt}/{max_attempts} not converged: {observation}",
                        self.name
                    );
                    last_observation = Some(observation);
                }
                Err(error) => {
                    log::error!(
                        "{}: probe failed at attempt {attempt}/{max_attempts}: {error}",
                        self.name
                    );
                    return Err(PollFailure {
                        attempts: attempt,
                        last_observation,
                        reason: FailureReason::ProbeFailed(error),
                    });
                }
            }

            if attempt >= max_attempts {
                log::warn!("{}: giving up after {attempt} attempt(s)", self.name);
                return Err(PollFailure {
                    attempts: attempt,
                    last_observation,
                    reason: FailureReason::Exhausted,
                });
            }
            if let Some(reason) = self.check_interrupt() {
                log::warn!("{}: stopped after {attempt} attempt(s)", self.name);
                return Err(PollFailure {
                    attempts: attempt,
                    last_observation,
                    reason,
                });
            }
            sleep(self.policy.interval);
        }
    }

    fn check_interrupt<E>(&self) -> Option<FailureReason<E>> {
        if self.cancel.as_ref().is_some_and(|token| token.is_cancelled()) {
            return Some(FailureReason::Cancelled);
        }
        // A wake-up time that cannot be represented is past any deadline
        let wake_up = now_monotonic().checked_add(self.policy.interval);
        match self.deadline {
            Some(deadline) if wake_up.is_none_or(|wake_up| wake_up > deadline) => {
                Some(FailureReason::DeadlineExceeded)
            }
            _ => None,
        }
    }
}

/// Polls `probe` with `policy`, without cancellation.
pub fn poll<T, P, E, F>(name: &str, policy: PollPolicy, probe: F) -> PollOutcome<T, P, E>
where
    F: FnMut() -> Result<Convergence<T, P>, E>,
    P: Display,
    E: Display,
{
    Poller::new(name, policy).run(probe)
}
