mod options;

pub use options::{TerraformOptions, load_options, options_path, save_options};

use crate::common::error::HarnessError;
use crate::tool::{CommandRunner, Invocation, check_tool_output, run_checked};

/// Exit code of `plan -detailed-exitcode` when the plan contains changes.
const PLAN_HAS_CHANGES: i32 = 2;

/// Runs Terraform commands described by [`TerraformOptions`].
pub struct Terraform<'a> {
    runner: &'a dyn CommandRunner,
    options: &'a TerraformOptions,
}

impl<'a> Terraform<'a> {
    pub fn new(runner: &'a dyn CommandRunner, options: &'a TerraformOptions) -> Self {
        Self { runner, options }
    }

    fn no_color(&self, args: &mut Vec<String>) {
        if self.options.no_color {
            args.push("-no-color".to_string());
        }
    }

    /// Arguments of a command that accepts input variables.
    pub fn format_args(&self, command: &str, flags: &[&str], trailing: &[&str]) -> Vec<String> {
        let mut args = vec![command.to_string()];
        args.extend(flags.iter().map(|flag| flag.to_string()));
        self.no_color(&mut args);
        args.extend(self.options.var_args());
        args.extend(trailing.iter().map(|arg| arg.to_string()));
        args
    }

    fn invocation(&self, args: Vec<String>) -> Invocation {
        Invocation::new(&self.options.binary, args).in_dir(&self.options.terraform_dir)
    }

    fn run(&self, args: Vec<String>) -> crate::Result<String> {
        log::info!("Running terraform {}", args.join(" "));
        let output = run_checked(self.runner, &self.invocation(args))?;
        Ok(output.stdout_str()?.to_string())
    }

    pub fn init(&self) -> crate::Result<String> {
        let mut args = vec!["init".to_string(), "-upgrade=false".to_string()];
        self.no_color(&mut args);
        self.run(args)
    }

    pub fn apply(&self) -> crate::Result<String> {
        self.run(self.format_args("apply", &["-input=false", "-auto-approve"], &[]))
    }

    /// Applies the configuration and checks that a second plan has no changes.
    pub fn apply_and_idempotent(&self) -> crate::Result<String> {
        let output = self.apply()?;

        let args = self.format_args(
            "plan",
            &["-input=false", "-lock=false", "-detailed-exitcode"],
            &[],
        );
        log::info!("Running terraform {}", args.join(" "));
        let plan = self.runner.run(&self.invocation(args))?;
        match plan.status {
            Some(0) => Ok(output),
            Some(PLAN_HAS_CHANGES) => Err(HarnessError::tool(
                "terraform",
                format!(
                    "Terraform configuration not idempotent, plan after apply has changes:\n{}",
                    plan.stdout_str()?.trim()
                ),
            )),
            _ => check_tool_output("terraform", plan).map(|_| output),
        }
    }

    pub fn destroy(&self) -> crate::Result<String> {
        self.run(self.format_args("destroy", &["-auto-approve", "-input=false"], &[]))
    }

    /// Imports an existing resource `id` under `address` into the state.
    pub fn import(&self, address: &str, id: &str) -> crate::Result<String> {
        self.run(self.format_args("import", &["-input=false"], &[address, id]))
    }

    /// Value of output `name`. Strings are returned without quotes,
    /// other values as JSON.
    pub fn output(&self, name: &str) -> crate::Result<String> {
        let args = ["output", "-no-color", "-json", name]
            .iter()
            .map(|arg| arg.to_string())
            .collect();
        let stdout = self.run(args)?;
        let value: serde_json::Value = serde_json::from_str(stdout.trim())?;
        Ok(match value {
            serde_json::Value::String(value) => value,
            value => value.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use crate::common::error::HarnessError;
    use crate::terraform::{Terraform, TerraformOptions};
    use crate::tests::utils::{ScriptedRunner, exit_output, ok_output};

    fn options() -> TerraformOptions {
        TerraformOptions::new("/bin/terraform".into(), PathBuf::from("/work/tf"))
            .var("project_id", "p1")
            .var("region", "us-central1")
    }

    #[test]
    fn init_args() {
        let runner = ScriptedRunner::new();
        let options = options();
        Terraform::new(&runner, &options).init().unwrap();

        let invocation = &runner.invocations()[0];
        assert_eq!(invocation.program, PathBuf::from("/bin/terraform"));
        assert_eq!(invocation.workdir, Some(PathBuf::from("/work/tf")));
        assert_eq!(runner.commands(), vec!["init -upgrade=false -no-color"]);
    }

    #[test]
    fn import_args() {
        let runner = ScriptedRunner::new();
        let options = options();
        Terraform::new(&runner, &options)
            .import("module.scheduler.google_app_engine_application.app", "p1")
            .unwrap();
        insta::assert_snapshot!(runner.commands()[0], @"import -input=false -no-color -var project_id=p1 -var region=us-central1 module.scheduler.google_app_engine_application.app p1");
    }

    #[test]
    fn destroy_args_with_colors() {
        let runner = ScriptedRunner::new();
        let mut options = options();
        options.no_color = false;
        Terraform::new(&runner, &options).destroy().unwrap();
        insta::assert_snapshot!(runner.commands()[0], @"destroy -auto-approve -input=false -var project_id=p1 -var region=us-central1");
    }

    #[test]
    fn apply_and_idempotent_passes() {
        let runner = ScriptedRunner::new().respond("apply", ok_output("Apply complete!"));
        let options = options();
        let output = Terraform::new(&runner, &options)
            .apply_and_idempotent()
            .unwrap();
        assert_eq!(output, "Apply complete!");
        assert_eq!(
            runner.commands(),
            vec![
                "apply -input=false -auto-approve -no-color -var project_id=p1 -var region=us-central1",
                "plan -input=false -lock=false -detailed-exitcode -no-color -var project_id=p1 -var region=us-central1",
            ]
        );
    }

    #[test]
    fn apply_not_idempotent() {
        let runner = ScriptedRunner::new().respond("plan", exit_output(2, ""));
        let options = options();
        let result = Terraform::new(&runner, &options).apply_and_idempotent();
        match result {
            Err(HarnessError::ToolError { message, .. }) => {
                assert!(message.contains("not idempotent"))
            }
            result => panic!("unexpected result {result:?}"),
        }
    }

    #[test]
    fn plan_error() {
        let runner = ScriptedRunner::new().respond("plan", exit_output(1, "Error: provider"));
        let options = options();
        let result = Terraform::new(&runner, &options).apply_and_idempotent();
        match result {
            Err(HarnessError::ToolError { message, .. }) => {
                assert!(message.contains("Error: provider"))
            }
            result => panic!("unexpected result {result:?}"),
        }
    }

    #[test]
    fn failed_apply_skips_plan() {
        let runner = ScriptedRunner::new().respond("apply", exit_output(1, "quota"));
        let options = options();
        assert!(
            Terraform::new(&runner, &options)
                .apply_and_idempotent()
                .is_err()
        );
        assert_eq!(runner.commands().len(), 1);
    }

    #[test]
    fn output_string() {
        let runner = ScriptedRunner::new().respond(
            "output -no-color -json scheduler_job_id",
            ok_output("\"projects/p1/locations/us-central1/jobs/poll-main\"\n"),
        );
        let options = options();
        let value = Terraform::new(&runner, &options)
            .output("scheduler_job_id")
            .unwrap();
        assert_eq!(value, "projects/p1/locations/us-central1/jobs/poll-main");
    }

    #[test]
    fn output_non_string() {
        let runner = ScriptedRunner::new().respond("output", ok_output("[1, 2]\n"));
        let options = options();
        let value = Terraform::new(&runner, &options).output("ids").unwrap();
        assert_eq!(value, "[1,2]");
    }

    #[test]
    fn output_invalid_json() {
        let runner = ScriptedRunner::new().respond("output", ok_output("Warning: No outputs"));
        let options = options();
        assert!(matches!(
            Terraform::new(&runner, &options).output("ids"),
            Err(HarnessError::SerializationError(_))
        ));
    }
}
