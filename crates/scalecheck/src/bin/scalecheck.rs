use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::Context;
use clap::{CommandFactory, FromArgMatches};
use colored::Colorize;

use scalecheck::common::cli::{
    CommonOpts, PerProjectOpts, RootOptions, SetMinSizeOpts, SubCommand, UnifiedOpts, WaitOpts,
};
use scalecheck::common::setup::setup_logging;
use scalecheck::common::utils::fs::absolute_path;
use scalecheck::database::{GcloudInstanceAdmin, InstanceName, wait_for_processing_units};
use scalecheck::poll::CancelToken;
use scalecheck::scenario::Services;
use scalecheck::scenario::per_project::{PerProjectConfigBuilder, run_per_project};
use scalecheck::scenario::unified::{UnifiedConfigBuilder, run_unified};
use scalecheck::scheduler::{GcloudScheduler, JobName, set_min_size};
use scalecheck::tool::{SystemRunner, locate_tool};

/// Resolved locations of the external tools.
struct Tools {
    terraform: Option<PathBuf>,
    gcloud: PathBuf,
}

impl Tools {
    fn resolve(common: &CommonOpts) -> anyhow::Result<Self> {
        let gcloud = match &common.gcloud {
            Some(path) => path.clone(),
            None => locate_tool("gcloud")?,
        };
        Ok(Self {
            terraform: common.terraform.clone(),
            gcloud,
        })
    }

    fn terraform(&self) -> anyhow::Result<PathBuf> {
        match &self.terraform {
            Some(path) => Ok(path.clone()),
            None => Ok(locate_tool("terraform")?),
        }
    }
}

fn with_services<F>(tools: &Tools, cancel: &CancelToken, f: F) -> anyhow::Result<()>
where
    F: FnOnce(&Services) -> scalecheck::Result<()>,
{
    let runner = SystemRunner;
    let admin = GcloudInstanceAdmin::new(&runner, tools.gcloud.clone());
    let scheduler = GcloudScheduler::new(&runner, tools.gcloud.clone());
    let services = Services {
        runner: &runner,
        admin: &admin,
        scheduler: &scheduler,
        cancel: cancel.clone(),
    };
    f(&services)?;
    Ok(())
}

fn terraform_dir(path: &Path) -> anyhow::Result<PathBuf> {
    absolute_path(path.to_path_buf())
        .with_context(|| format!("Cannot resolve Terraform directory {}", path.display()))
}

// Commands

fn command_per_project(
    tools: &Tools,
    cancel: &CancelToken,
    opts: PerProjectOpts,
) -> anyhow::Result<()> {
    let config = PerProjectConfigBuilder::default()
        .project_id(opts.scenario.project_id)
        .region(opts.region)
        .terraform_dir(terraform_dir(&opts.scenario.terraform_dir)?)
        .terraform_binary(tools.terraform()?)
        .finish()?;
    with_services(tools, cancel, |services| run_per_project(services, &config))
}

fn command_unified(tools: &Tools, cancel: &CancelToken, opts: UnifiedOpts) -> anyhow::Result<()> {
    let config = UnifiedConfigBuilder::default()
        .project_id(opts.scenario.project_id)
        .region(opts.region)
        .terraform_dir(terraform_dir(&opts.scenario.terraform_dir)?)
        .terraform_binary(tools.terraform()?)
        .deploy_script(opts.deploy_script)
        .finish()?;
    with_services(tools, cancel, |services| run_unified(services, &config))
}

fn command_wait(tools: &Tools, cancel: &CancelToken, opts: WaitOpts) -> anyhow::Result<()> {
    let instance = InstanceName::from_str(&opts.instance)?;
    let poller = opts.poller(cancel)?;

    let runner = SystemRunner;
    let admin = GcloudInstanceAdmin::new(&runner, tools.gcloud.clone());
    let units = wait_for_processing_units(&admin, &instance, opts.target, &poller)
        .map_err(scalecheck::Error::from)?;
    log::info!("Instance {instance} reached {units} PUs");
    Ok(())
}

fn command_set_min_size(tools: &Tools, opts: SetMinSizeOpts) -> anyhow::Result<()> {
    let job = JobName::from_str(&opts.job)?;
    let runner = SystemRunner;
    let scheduler = GcloudScheduler::new(&runner, tools.gcloud.clone());
    set_min_size(&scheduler, &job, opts.units)?;
    Ok(())
}

fn main() -> scalecheck::Result<()> {
    let matches = RootOptions::command().get_matches();
    let top_opts = match RootOptions::from_arg_matches(&matches) {
        Ok(opts) => opts,
        Err(error) => error.exit(),
    };

    setup_logging(top_opts.common.debug);

    let cancel = CancelToken::new();
    cancel.install_signal_handlers()?;

    let result = Tools::resolve(&top_opts.common).and_then(|tools| match top_opts.subcmd {
        SubCommand::PerProject(opts) => command_per_project(&tools, &cancel, opts),
        SubCommand::Unified(opts) => command_unified(&tools, &cancel, opts),
        SubCommand::Wait(opts) => command_wait(&tools, &cancel, opts),
        SubCommand::SetMinSize(opts) => command_set_min_size(&tools, opts),
    });

    if let Err(e) = result {
        eprintln!("{} {e:?}", "Error:".red().bold());
        std::process::exit(1);
    }

    eprintln!("{}", "Success".green().bold());
    Ok(())
}
