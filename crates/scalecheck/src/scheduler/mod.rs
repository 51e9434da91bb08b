//! Scheduled job that periodically triggers the autoscaler.
//!
//! The job carries the autoscaler configuration as its Pub/Sub message body:
//! a JSON array with one object per monitored instance.
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::str::FromStr;

use crate::common::error::HarnessError;
use crate::tool::{CommandRunner, Invocation, run_checked};

/// Payload field holding the minimal instance size.
pub const MIN_SIZE_KEY: &str = "minSize";

/// `projects/{project}/locations/{location}/jobs/{job}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobName {
    pub project: String,
    pub location: String,
    pub job: String,
}

impl FromStr for JobName {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split('/').collect::<Vec<_>>().as_slice() {
            ["projects", project, "locations", location, "jobs", job]
                if !project.is_empty() && !location.is_empty() && !job.is_empty() =>
            {
                Ok(Self {
                    project: project.to_string(),
                    location: location.to_string(),
                    job: job.to_string(),
                })
            }
            _ => Err(HarnessError::ConfigError(format!(
                "Invalid scheduler job name `{s}`, expected projects/<project>/locations/<location>/jobs/<job>"
            ))),
        }
    }
}

impl Display for JobName {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "projects/{}/locations/{}/jobs/{}",
            self.project, self.location, self.job
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerJob {
    pub name: String,
    /// Decoded Pub/Sub message body.
    pub data: Vec<u8>,
}

pub trait SchedulerClient {
    fn get_job(&self, name: &JobName) -> crate::Result<SchedulerJob>;
    /// Replaces the Pub/Sub message body of the job, other fields are kept.
    fn update_job_data(&self, name: &JobName, data: &[u8]) -> crate::Result<()>;
}

/// Scheduler client backed by the `gcloud` CLI.
pub struct GcloudScheduler<'a> {
    runner: &'a dyn CommandRunner,
    gcloud: PathBuf,
}

impl<'a> GcloudScheduler<'a> {
    pub fn new(runner: &'a dyn CommandRunner, gcloud: PathBuf) -> Self {
        Self { runner, gcloud }
    }

    fn job_args(&self, command: &[&str], name: &JobName) -> Vec<String> {
        let mut args: Vec<String> = command.iter().map(|arg| arg.to_string()).collect();
        args.extend([
            name.job.clone(),
            format!("--project={}", name.project),
            format!("--location={}", name.location),
        ]);
        args
    }
}

impl SchedulerClient for GcloudScheduler<'_> {
    fn get_job(&self, name: &JobName) -> crate::Result<SchedulerJob> {
        let mut args = self.job_args(&["scheduler", "jobs", "describe"], name);
        args.push("--format=json".to_string());
        let output = run_checked(self.runner, &Invocation::new(&self.gcloud, args))?;
        parse_job(output.stdout_str()?)
    }

    fn update_job_data(&self, name: &JobName, data: &[u8]) -> crate::Result<()> {
        let body = std::str::from_utf8(data)
            .map_err(|e| HarnessError::PayloadError(format!("Payload is not UTF-8: {e}")))?;
        let mut args = self.job_args(&["scheduler", "jobs", "update", "pubsub"], name);
        args.push(format!("--message-body={body}"));
        run_checked(self.runner, &Invocation::new(&self.gcloud, args))?;
        Ok(())
    }
}

fn parse_job(output: &str) -> crate::Result<SchedulerJob> {
    let job: serde_json::Value = serde_json::from_str(output)?;
    let name = job["name"]
        .as_str()
        .ok_or_else(|| HarnessError::SerializationError("JSON key name not found".to_string()))?;
    let data = match job["pubsubTarget"]["data"].as_str() {
        Some(data) => STANDARD.decode(data)?,
        None => {
            return Err(HarnessError::PayloadError(format!(
                "Job {name} has no Pub/Sub target data"
            )));
        }
    };
    Ok(SchedulerJob {
        name: name.to_string(),
        data,
    })
}

/// Returns `payload` with `minSize` of the first config set to `units`.
pub fn with_min_size(payload: &[u8], units: u32) -> crate::Result<Vec<u8>> {
    let mut configs: serde_json::Value = serde_json::from_slice(payload)
        .map_err(|e| HarnessError::PayloadError(format!("Payload is not JSON: {e}")))?;
    let config = configs
        .as_array_mut()
        .and_then(|configs| configs.first_mut())
        .and_then(|config| config.as_object_mut())
        .ok_or_else(|| {
            HarnessError::PayloadError(
                "Payload must be a non-empty array of configuration objects".to_string(),
            )
        })?;
    config.insert(MIN_SIZE_KEY.to_string(), units.into());
    Ok(serde_json::to_vec(&configs)?)
}

/// Changes the minimal size in the autoscaler config carried by the job.
pub fn set_min_size(client: &dyn SchedulerClient, name: &JobName, units: u32) -> crate::Result<()> {
    let job = client.get_job(name)?;
    let data = with_min_size(&job.data, units)?;
    log::info!("Setting {MIN_SIZE_KEY} of {name} to {units}");
    client.update_job_data(name, &data)
}
