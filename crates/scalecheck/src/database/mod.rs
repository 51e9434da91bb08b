//! Capacity of the managed database instance.
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::str::FromStr;

use crate::common::error::HarnessError;
use crate::poll::{Convergence, PollOutcome, Poller};
use crate::tool::{CommandRunner, Invocation, run_checked};

/// `projects/{project}/instances/{instance}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceName {
    pub project: String,
    pub instance: String,
}

impl InstanceName {
    pub fn new(project: &str, instance: &str) -> Self {
        Self {
            project: project.to_string(),
            instance: instance.to_string(),
        }
    }
}

impl FromStr for InstanceName {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split('/').collect::<Vec<_>>().as_slice() {
            ["projects", project, "instances", instance]
                if !project.is_empty() && !instance.is_empty() =>
            {
                Ok(Self::new(project, instance))
            }
            _ => Err(HarnessError::ConfigError(format!(
                "Invalid instance name `{s}`, expected projects/<project>/instances/<instance>"
            ))),
        }
    }
}

impl Display for InstanceName {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "projects/{}/instances/{}", self.project, self.instance)
    }
}

pub trait InstanceAdmin {
    /// Currently provisioned processing units of the instance.
    fn processing_units(&self, instance: &InstanceName) -> crate::Result<u32>;
}

/// Instance admin backed by the `gcloud` CLI.
pub struct GcloudInstanceAdmin<'a> {
    runner: &'a dyn CommandRunner,
    gcloud: PathBuf,
}

impl<'a> GcloudInstanceAdmin<'a> {
    pub fn new(runner: &'a dyn CommandRunner, gcloud: PathBuf) -> Self {
        Self { runner, gcloud }
    }
}

impl InstanceAdmin for GcloudInstanceAdmin<'_> {
    fn processing_units(&self, instance: &InstanceName) -> crate::Result<u32> {
        let args = [
            "spanner".to_string(),
            "instances".to_string(),
            "describe".to_string(),
            instance.instance.clone(),
            format!("--project={}", instance.project),
            "--format=json".to_string(),
        ];
        let output = run_checked(self.runner, &Invocation::new(&self.gcloud, args))?;
        parse_processing_units(output.stdout_str()?)
    }
}

fn parse_processing_units(output: &str) -> crate::Result<u32> {
    let instance: serde_json::Value = serde_json::from_str(output)?;
    instance["processingUnits"]
        .as_u64()
        .and_then(|units| u32::try_from(units).ok())
        .ok_or_else(|| {
            HarnessError::SerializationError("JSON key processingUnits not found".to_string())
        })
}

/// Waits until the instance reports `target` processing units.
///
/// Other unit counts are retried, a failing query ends the wait immediately.
pub fn wait_for_processing_units(
    admin: &dyn InstanceAdmin,
    instance: &InstanceName,
    target: u32,
    poller: &Poller,
) -> PollOutcome<u32, u32, HarnessError> {
    log::info!(
        "Waiting for {instance} to reach {target} PUs (up to {} attempts every {})",
        poller.policy().max_attempts(),
        humantime::format_duration(poller.policy().interval())
    );
    poller.run(|| {
        let units = admin.processing_units(instance)?;
        if units == target {
            Ok(Convergence::Reached(units))
        } else {
            Ok(Convergence::Pending(units))
        }
    })
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::str::FromStr;
    use std::time::Duration;

    use crate::common::error::HarnessError;
    use crate::database::{
        GcloudInstanceAdmin, InstanceAdmin, InstanceName, parse_processing_units,
        wait_for_processing_units,
    };
    use crate::poll::{FailureReason, PollPolicy, Poller};
    use crate::tests::utils::{FakeInstanceAdmin, ScriptedRunner, exit_output, ok_output};

    fn instance() -> InstanceName {
        InstanceName::new("p1", "autoscaler-test")
    }

    fn poller(attempts: u32) -> Poller {
        Poller::new("units", PollPolicy::new(attempts, Duration::ZERO).unwrap())
    }

    #[test]
    fn parse_instance_name() {
        let name = InstanceName::from_str("projects/p1/instances/autoscaler-test").unwrap();
        assert_eq!(name, instance());
        assert_eq!(name.to_string(), "projects/p1/instances/autoscaler-test");
        assert!(InstanceName::from_str("projects/p1/instances/").is_err());
        assert!(InstanceName::from_str("autoscaler-test").is_err());
    }

    #[test]
    fn parse_units() {
        let output = r#"{"config": "projects/p1/instanceConfigs/regional-us-central1", "displayName": "autoscaler-test", "processingUnits": 100, "state": "READY"}"#;
        assert_eq!(parse_processing_units(output).unwrap(), 100);
        assert!(parse_processing_units(r#"{"nodeCount": 1}"#).is_err());
    }

    #[test]
    fn gcloud_describe() {
        let runner = ScriptedRunner::new()
            .respond("spanner instances describe", ok_output(r#"{"processingUnits": 200}"#));
        let admin = GcloudInstanceAdmin::new(&runner, PathBuf::from("gcloud"));
        assert_eq!(admin.processing_units(&instance()).unwrap(), 200);
        assert_eq!(
            runner.commands(),
            vec!["spanner instances describe autoscaler-test --project=p1 --format=json"]
        );
    }

    #[test]
    fn gcloud_describe_failure() {
        let runner = ScriptedRunner::new().respond("spanner", exit_output(1, "NOT_FOUND"));
        let admin = GcloudInstanceAdmin::new(&runner, PathBuf::from("gcloud"));
        assert!(matches!(
            admin.processing_units(&instance()),
            Err(HarnessError::ToolError { .. })
        ));
    }

    #[test]
    fn wait_reaches_target() {
        let admin = FakeInstanceAdmin::new(vec![Ok(100), Ok(100), Ok(200)]);
        let units = wait_for_processing_units(&admin, &instance(), 200, &poller(3)).unwrap();
        assert_eq!(units, 200);
        assert_eq!(admin.calls(), 3);
    }

    #[test]
    fn wait_exhausted() {
        let admin = FakeInstanceAdmin::new(vec![Ok(100)]);
        let failure = wait_for_processing_units(&admin, &instance(), 200, &poller(2)).unwrap_err();
        assert!(failure.is_exhausted());
        assert_eq!(failure.last_observation, Some(100));
        assert_eq!(admin.calls(), 2);
    }

    #[test]
    fn wait_stops_on_query_error() {
        let admin = FakeInstanceAdmin::new(vec![Ok(100), Err("permission denied".to_string())]);
        let failure =
            wait_for_processing_units(&admin, &instance(), 200, &poller(30)).unwrap_err();
        assert!(matches!(failure.reason, FailureReason::ProbeFailed(_)));
        assert_eq!(admin.calls(), 2);

        let error = HarnessError::from(failure);
        assert!(matches!(error, HarnessError::ConvergenceError(_)));
        assert!(error.to_string().contains("permission denied"));
    }
}
