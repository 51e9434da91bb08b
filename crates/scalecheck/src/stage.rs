//! Named steps of an end-to-end scenario.
//!
//! Any stage can be skipped by setting `SKIP_<stage name>` in the environment,
//! e.g. `SKIP_teardown=1` keeps the infrastructure alive for a rerun of `validate`.
use std::time::Instant;

use crate::common::env::skip_stage_env;

pub fn should_skip_stage(name: &str) -> bool {
    std::env::var_os(skip_stage_env(name)).is_some()
}

pub fn run_test_stage<F>(name: &str, stage: F) -> crate::Result<()>
where
    F: FnOnce() -> crate::Result<()>,
{
    if should_skip_stage(name) {
        log::info!(
            "The '{}' environment variable is set, so skipping stage '{name}'",
            skip_stage_env(name)
        );
        return Ok(());
    }

    log::info!("Running stage '{name}'");
    let start = Instant::now();
    let result = stage();
    let duration = humantime::format_duration(std::time::Duration::from_secs(
        start.elapsed().as_secs(),
    ));
    match &result {
        Ok(()) => log::info!("Stage '{name}' finished in {duration}"),
        Err(error) => log::error!("Stage '{name}' failed after {duration}: {error}"),
    }
    result
}
