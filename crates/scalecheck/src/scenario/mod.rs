//! End-to-end scenarios.
//!
//! Each scenario provisions the test infrastructure with Terraform, triggers a
//! change of the autoscaler configuration and waits until the database instance
//! is scaled accordingly. Infrastructure is destroyed at the end even if the
//! validation failed.
pub mod per_project;
pub mod unified;

use std::num::NonZeroU32;
use std::path::Path;
use std::time::Duration;

use crate::common::error::HarnessError;
use crate::database::InstanceAdmin;
use crate::poll::{CancelToken, PollPolicy, Poller};
use crate::scheduler::SchedulerClient;
use crate::stage::run_test_stage;
use crate::terraform::{Terraform, TerraformOptions, load_options, save_options};
use crate::tool::CommandRunner;

pub const DEFAULT_REGION: &str = "us-central1";
pub const DEFAULT_TERRAFORM_DIR: &str = "..";
pub const SPANNER_TEST_PROCESSING_UNITS: u32 = 100;
pub const SPANNER_TARGET_PROCESSING_UNITS: u32 = 200;

const POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Up to one minute.
pub const SHORT_WAIT: PollPolicy = PollPolicy::fixed(NonZeroU32::new(6).unwrap(), POLL_INTERVAL);
/// Up to five minutes.
pub const LONG_WAIT: PollPolicy = PollPolicy::fixed(NonZeroU32::new(30).unwrap(), POLL_INTERVAL);

/// External systems used by the scenarios.
pub struct Services<'a> {
    pub runner: &'a dyn CommandRunner,
    pub admin: &'a dyn InstanceAdmin,
    pub scheduler: &'a dyn SchedulerClient,
    pub cancel: CancelToken,
}

impl Services<'_> {
    pub fn poller(&self, name: &str, policy: PollPolicy) -> Poller {
        Poller::new(name, policy).with_cancel(self.cancel.clone())
    }

    /// Runs a stage unless cancellation was requested.
    fn stage<F>(&self, name: &str, stage: F) -> crate::Result<()>
    where
        F: FnOnce() -> crate::Result<()>,
    {
        self.cancel.check()?;
        run_test_stage(name, stage)
    }

    fn setup(&self, options: TerraformOptions) -> crate::Result<()> {
        self.stage("setup", || {
            save_options(&options)?;
            Terraform::new(self.runner, &options).init()?;
            Ok(())
        })
    }

    fn apply(&self, terraform_dir: &Path) -> crate::Result<()> {
        self.stage("apply", || {
            let options = load_options(terraform_dir)?;
            Terraform::new(self.runner, &options).apply_and_idempotent()?;
            Ok(())
        })
    }

    /// Runs `stages` and then always tears the infrastructure down.
    /// The first error wins.
    fn with_teardown<F>(&self, terraform_dir: &Path, stages: F) -> crate::Result<()>
    where
        F: FnOnce() -> crate::Result<()>,
    {
        let result = stages();
        let teardown = run_test_stage("teardown", || {
            let options = load_options(terraform_dir)?;
            Terraform::new(self.runner, &options).destroy()?;
            Ok(())
        });
        if let (Err(_), Err(error)) = (&result, &teardown) {
            log::error!("Teardown failed as well: {error}");
        }
        result.and(teardown)
    }
}

/// Collects results of steps that do not stop a stage when they fail.
/// The first error is kept, later ones are only logged.
#[derive(Default)]
struct FirstError(Option<HarnessError>);

impl FirstError {
    fn record<T, E: Into<HarnessError>>(&mut self, step: &str, result: Result<T, E>) {
        if let Err(error) = result {
            let error = error.into();
            log::error!("{step} failed: {error}");
            self.0.get_or_insert(error);
        }
    }

    fn finish(self) -> crate::Result<()> {
        match self.0 {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use crate::common::error::HarnessError;
    use crate::poll::PollPolicy;
    use crate::scenario::{FirstError, LONG_WAIT, SHORT_WAIT};
    use std::time::Duration;

    pub fn instant_policy(attempts: u32) -> PollPolicy {
        PollPolicy::new(attempts, Duration::ZERO).unwrap()
    }

    #[test]
    fn default_waits() {
        assert_eq!(SHORT_WAIT.max_attempts(), 6);
        assert_eq!(SHORT_WAIT.max_wait(), Duration::from_secs(50));
        assert_eq!(LONG_WAIT.max_attempts(), 30);
        assert_eq!(LONG_WAIT.interval(), Duration::from_secs(10));
    }

    #[test]
    fn first_error_wins() {
        let mut errors = FirstError::default();
        errors.record("a", Ok::<_, HarnessError>(1));
        errors.record("b", Err::<(), _>(HarnessError::ConfigError("b".to_string())));
        errors.record("c", Err::<(), _>(HarnessError::Cancelled));
        assert!(matches!(errors.finish(), Err(HarnessError::ConfigError(message)) if message == "b"));
        assert!(FirstError::default().finish().is_ok());
    }
}
