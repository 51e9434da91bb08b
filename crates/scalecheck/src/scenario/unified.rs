//! Unified deployment on GKE.
//!
//! The autoscaler configuration is baked into the deployment, so the scale-up
//! is triggered by redeploying it with a new target size.
use derive_builder::Builder;
use std::path::PathBuf;

use crate::common::error::HarnessError;
use crate::database::{InstanceName, wait_for_processing_units};
use crate::deploy::{DEFAULT_DEPLOY_SCRIPT, deploy_autoscaler};
use crate::poll::PollPolicy;
use crate::scenario::{
    DEFAULT_TERRAFORM_DIR, FirstError, LONG_WAIT, SPANNER_TARGET_PROCESSING_UNITS,
    SPANNER_TEST_PROCESSING_UNITS, Services,
};
use crate::terraform::TerraformOptions;

#[derive(Builder, Clone, Debug)]
#[builder(pattern = "owned")]
pub struct UnifiedConfig {
    #[builder(setter(into))]
    pub project_id: String,
    #[builder(setter(into))]
    pub region: String,
    #[builder(default = "PathBuf::from(DEFAULT_TERRAFORM_DIR)")]
    pub terraform_dir: PathBuf,
    #[builder(default = "PathBuf::from(\"terraform\")")]
    pub terraform_binary: PathBuf,
    #[builder(default = "PathBuf::from(DEFAULT_DEPLOY_SCRIPT)")]
    pub deploy_script: PathBuf,
    #[builder(default = "\"autoscale-test\".to_string()", setter(into))]
    pub spanner_name: String,
    #[builder(default = "SPANNER_TEST_PROCESSING_UNITS")]
    pub test_units: u32,
    #[builder(default = "SPANNER_TARGET_PROCESSING_UNITS")]
    pub target_units: u32,
    #[builder(default = "LONG_WAIT")]
    pub initial_wait: PollPolicy,
    #[builder(default = "LONG_WAIT")]
    pub scale_wait: PollPolicy,
}

impl UnifiedConfigBuilder {
    pub fn finish(self) -> crate::Result<UnifiedConfig> {
        self.build()
            .map_err(|e| HarnessError::ConfigError(e.to_string()))
    }
}

impl UnifiedConfig {
    pub fn terraform_options(&self) -> TerraformOptions {
        TerraformOptions::new(self.terraform_binary.clone(), self.terraform_dir.clone())
            .var("project_id", self.project_id.as_str())
            .var("region", self.region.as_str())
            .var("spanner_name", self.spanner_name.as_str())
            .var("terraform_spanner_test", true)
            .var("terraform_spanner_state", true)
            .var("spanner_test_processing_units", self.test_units)
    }
}

pub fn run_unified(services: &Services, config: &UnifiedConfig) -> crate::Result<()> {
    let terraform_dir = config.terraform_dir.as_path();
    services.setup(config.terraform_options())?;

    services.with_teardown(terraform_dir, || {
        services.apply(terraform_dir)?;

        // A failed step does not stop the validation, the first error is reported
        services.stage("validate", || {
            let instance = InstanceName::new(&config.project_id, &config.spanner_name);
            log::info!("Using instance ID: {instance}");
            let mut errors = FirstError::default();

            let initial = services.poller("initial processing units", config.initial_wait);
            errors.record(
                "Initial wait",
                wait_for_processing_units(services.admin, &instance, config.test_units, &initial),
            );

            services.cancel.check()?;
            errors.record(
                "Deploy",
                deploy_autoscaler(
                    services.runner,
                    &config.deploy_script,
                    &config.project_id,
                    &config.region,
                    config.target_units,
                ),
            );

            services.cancel.check()?;
            let scaled = services.poller("scaled processing units", config.scale_wait);
            errors.record(
                "Scaled wait",
                wait_for_processing_units(services.admin, &instance, config.target_units, &scaled),
            );
            errors.finish()
        })
    })
}
