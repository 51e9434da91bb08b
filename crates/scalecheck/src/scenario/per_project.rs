//! Per-project deployment on Cloud Functions.
//!
//! The autoscaler is configured through the payload of a scheduled job, so the
//! scale-up is triggered by raising `minSize` in that payload.
use derive_builder::Builder;
use std::path::PathBuf;

use crate::common::error::HarnessError;
use crate::database::{InstanceName, wait_for_processing_units};
use crate::poll::PollPolicy;
use crate::scenario::{
    DEFAULT_REGION, DEFAULT_TERRAFORM_DIR, LONG_WAIT, SHORT_WAIT, SPANNER_TARGET_PROCESSING_UNITS,
    SPANNER_TEST_PROCESSING_UNITS, Services,
};
use crate::scheduler::{JobName, set_min_size};
use crate::terraform::{Terraform, TerraformOptions, load_options};

/// Terraform output with the full name of the scheduler job.
pub const SCHEDULER_JOB_OUTPUT: &str = "scheduler_job_id";

/// App Engine application required by Cloud Scheduler, it usually already exists in the project.
const APP_ENGINE_ADDRESS: &str = "module.scheduler.google_app_engine_application.app";

#[derive(Builder, Clone, Debug)]
#[builder(pattern = "owned")]
pub struct PerProjectConfig {
    #[builder(setter(into))]
    pub project_id: String,
    #[builder(default = "DEFAULT_REGION.to_string()", setter(into))]
    pub region: String,
    #[builder(default = "PathBuf::from(DEFAULT_TERRAFORM_DIR)")]
    pub terraform_dir: PathBuf,
    #[builder(default = "PathBuf::from(\"terraform\")")]
    pub terraform_binary: PathBuf,
    #[builder(default = "\"autoscaler-test\".to_string()", setter(into))]
    pub spanner_name: String,
    #[builder(default = "SPANNER_TEST_PROCESSING_UNITS")]
    pub test_units: u32,
    #[builder(default = "SPANNER_TARGET_PROCESSING_UNITS")]
    pub target_units: u32,
    /// Wait for the initial size of the instance.
    #[builder(default = "SHORT_WAIT")]
    pub initial_wait: PollPolicy,
    /// Wait for the instance to be scaled to the target size.
    #[builder(default = "LONG_WAIT")]
    pub scale_wait: PollPolicy,
}

impl PerProjectConfigBuilder {
    pub fn finish(self) -> crate::Result<PerProjectConfig> {
        self.build()
            .map_err(|e| HarnessError::ConfigError(e.to_string()))
    }
}

impl PerProjectConfig {
    pub fn terraform_options(&self) -> TerraformOptions {
        TerraformOptions::new(self.terraform_binary.clone(), self.terraform_dir.clone())
            .var("project_id", self.project_id.as_str())
            .var("region", self.region.as_str())
            .var("spanner_name", self.spanner_name.as_str())
            .var("terraform_spanner_test", true)
            .var("spanner_test_processing_units", self.test_units)
    }
}

pub fn run_per_project(services: &Services, config: &PerProjectConfig) -> crate::Result<()> {
    let terraform_dir = config.terraform_dir.as_path();
    services.setup(config.terraform_options())?;

    services.with_teardown(terraform_dir, || {
        services.stage("import", || {
            let options = load_options(terraform_dir)?;
            Terraform::new(services.runner, &options)
                .import(APP_ENGINE_ADDRESS, &config.project_id)?;
            Ok(())
        })?;

        services.apply(terraform_dir)?;

        services.stage("validate", || {
            let options = load_options(terraform_dir)?;
            let job: JobName = Terraform::new(services.runner, &options)
                .output(SCHEDULER_JOB_OUTPUT)?
                .parse()?;

            let instance = InstanceName::new(&config.project_id, &config.spanner_name);
            log::info!("Using instance ID: {instance}");

            let initial = services.poller("initial processing units", config.initial_wait);
            wait_for_processing_units(services.admin, &instance, config.test_units, &initial)?;

            set_min_size(services.scheduler, &job, config.target_units)?;

            let scaled = services.poller("scaled processing units", config.scale_wait);
            wait_for_processing_units(services.admin, &instance, config.target_units, &scaled)?;
            Ok(())
        })
    })
}
