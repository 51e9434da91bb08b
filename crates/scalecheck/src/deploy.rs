use std::path::Path;

use crate::tool::{CommandRunner, Invocation, run_checked};

pub const DEFAULT_DEPLOY_SCRIPT: &str = "./gke_deploy.sh";

/// Runs the deployment script as `<script> <project> <region> <units>`.
/// Its output is forwarded to ours.
pub fn deploy_autoscaler(
    runner: &dyn CommandRunner,
    script: &Path,
    project_id: &str,
    region: &str,
    target_units: u32,
) -> crate::Result<()> {
    let invocation = Invocation::new(
        script,
        [
            project_id.to_string(),
            region.to_string(),
            target_units.to_string(),
        ],
    )
    .streamed();

    log::info!(
        "Executing deploy script with args: {}",
        invocation.command_line()
    );
    if let Err(error) = run_checked(runner, &invocation) {
        log::error!("There was an error running the deploy script: {error}");
        return Err(error);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};

    use crate::deploy::deploy_autoscaler;
    use crate::tests::utils::{ScriptedRunner, exit_output};

    #[test]
    fn deploy_arguments() {
        let runner = ScriptedRunner::new();
        deploy_autoscaler(&runner, Path::new("./gke_deploy.sh"), "p1", "europe-west1", 200)
            .unwrap();

        let invocations = runner.invocations();
        assert_eq!(invocations.len(), 1);
        assert_eq!(invocations[0].program, PathBuf::from("./gke_deploy.sh"));
        assert_eq!(invocations[0].args, vec!["p1", "europe-west1", "200"]);
        assert!(invocations[0].stream_output);
    }

    #[test]
    fn deploy_failure() {
        let runner = ScriptedRunner::new().respond("p1", exit_output(1, ""));
        assert!(
            deploy_autoscaler(&runner, Path::new("./gke_deploy.sh"), "p1", "r", 200).is_err()
        );
    }
}
