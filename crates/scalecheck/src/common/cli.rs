use std::path::PathBuf;

use clap::Parser;

use crate::common::env::{
    PROJECT_ID, REGION, SCALECHECK_DEBUG, SCALECHECK_GCLOUD, SCALECHECK_TERRAFORM,
};
use crate::common::error::HarnessError;
use crate::common::utils::time::{ArgDuration, now_monotonic};
use crate::deploy::DEFAULT_DEPLOY_SCRIPT;
use crate::poll::{CancelToken, PollPolicy, Poller};
use crate::scenario::{DEFAULT_REGION, DEFAULT_TERRAFORM_DIR};

// Common CLI options
#[derive(Parser)]
pub struct CommonOpts {
    /// Path to the Terraform binary (looked up in PATH by default)
    #[arg(
        long,
        value_hint = clap::ValueHint::FilePath,
        global = true,
        env = SCALECHECK_TERRAFORM,
        help_heading("GLOBAL OPTIONS"),
        hide_short_help(true)
    )]
    pub terraform: Option<PathBuf>,

    /// Path to the gcloud binary (looked up in PATH by default)
    #[arg(
        long,
        value_hint = clap::ValueHint::FilePath,
        global = true,
        env = SCALECHECK_GCLOUD,
        help_heading("GLOBAL OPTIONS"),
        hide_short_help(true)
    )]
    pub gcloud: Option<PathBuf>,

    /// Enables more detailed log output
    #[arg(
        long,
        env = SCALECHECK_DEBUG,
        global = true,
        help_heading("GLOBAL OPTIONS"),
        hide_short_help(true)
    )]
    pub debug: bool,
}

// Root CLI options
#[derive(Parser)]
#[command(
    author,
    about,
    version(crate::SCALECHECK_VERSION),
    disable_help_subcommand(true),
    help_expected(true)
)]
pub struct RootOptions {
    #[clap(flatten)]
    pub common: CommonOpts,

    #[clap(subcommand)]
    pub subcmd: SubCommand,
}

#[derive(Parser)]
pub enum SubCommand {
    /// Deploy the per-project (Cloud Functions) autoscaler and check that it scales
    /// the instance after its scheduler configuration changes
    PerProject(PerProjectOpts),
    /// Deploy the unified (GKE) autoscaler and check that it scales the instance
    /// after a redeploy
    Unified(UnifiedOpts),
    /// Wait until an instance reports the given number of processing units
    Wait(WaitOpts),
    /// Change the minimal size in the autoscaler config of a scheduler job
    SetMinSize(SetMinSizeOpts),
}

#[derive(Parser)]
pub struct ScenarioOpts {
    /// Project where the test infrastructure is created
    #[arg(long, env = PROJECT_ID)]
    pub project_id: String,

    /// Directory with the Terraform configuration
    #[arg(long, value_hint = clap::ValueHint::DirPath, default_value = DEFAULT_TERRAFORM_DIR)]
    pub terraform_dir: PathBuf,
}

#[derive(Parser)]
pub struct PerProjectOpts {
    #[clap(flatten)]
    pub scenario: ScenarioOpts,

    /// Region of the test infrastructure
    #[arg(long, default_value = DEFAULT_REGION)]
    pub region: String,
}

#[derive(Parser)]
pub struct UnifiedOpts {
    #[clap(flatten)]
    pub scenario: ScenarioOpts,

    /// Region of the test infrastructure
    #[arg(long, env = REGION)]
    pub region: String,

    /// Script that deploys the autoscaler, called with `<project> <region> <units>`
    #[arg(long, value_hint = clap::ValueHint::FilePath, default_value = DEFAULT_DEPLOY_SCRIPT)]
    pub deploy_script: PathBuf,
}

#[derive(Parser)]
pub struct WaitOpts {
    /// Instance name (projects/<project>/instances/<instance>)
    #[arg(long)]
    pub instance: String,

    /// Expected number of processing units
    #[arg(long)]
    pub target: u32,

    /// How many times the instance is queried
    #[arg(long, default_value_t = 30)]
    pub retries: u32,

    /// Delay between queries
    #[arg(long, default_value = "10s")]
    pub interval: ArgDuration,

    /// Give up after this duration, regardless of the remaining retries
    #[arg(long)]
    pub timeout: Option<ArgDuration>,
}

impl WaitOpts {
    /// Poller following the retry options, with a deadline when `--timeout` is set.
    pub fn poller(&self, cancel: &CancelToken) -> crate::Result<Poller> {
        let policy = PollPolicy::new(self.retries, *self.interval.get())?;
        let poller = Poller::new("processing units", policy).with_cancel(cancel.clone());
        match &self.timeout {
            Some(timeout) => {
                let deadline = now_monotonic().checked_add(*timeout.get()).ok_or_else(|| {
                    HarnessError::ConfigError(format!(
                        "Timeout {} is too large",
                        humantime::format_duration(*timeout.get())
                    ))
                })?;
                Ok(poller.with_deadline(deadline))
            }
            None => Ok(poller),
        }
    }
}

#[derive(Parser)]
pub struct SetMinSizeOpts {
    /// Job name (projects/<project>/locations/<location>/jobs/<job>)
    #[arg(long)]
    pub job: String,

    /// New minimal size of the instance
    #[arg(long)]
    pub units: u32,
}
