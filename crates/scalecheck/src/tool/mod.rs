//! Invocation of external command line tools (Terraform, gcloud, deploy scripts).
use bstr::ByteSlice;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::common::error::HarnessError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub workdir: Option<PathBuf>,
    /// Forward stdout/stderr of the process to our own instead of capturing them.
    pub stream_output: bool,
}

impl Invocation {
    pub fn new<I, S>(program: impl Into<PathBuf>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            workdir: None,
            stream_output: false,
        }
    }

    pub fn in_dir(mut self, workdir: &Path) -> Self {
        self.workdir = Some(workdir.to_path_buf());
        self
    }

    pub fn streamed(mut self) -> Self {
        self.stream_output = true;
        self
    }

    pub fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.program.display().to_string())
    }

    pub fn command_line(&self) -> String {
        let mut line = self.program.display().to_string();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    /// Exit code, `None` if the process was killed by a signal.
    pub status: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }

    pub fn stdout_str(&self) -> crate::Result<&str> {
        self.stdout
            .to_str()
            .map_err(|e| HarnessError::SerializationError(format!("Invalid UTF-8 output: {e}")))
    }
}

/// Something that can run an external program to completion.
pub trait CommandRunner {
    /// Fails only if the program could not be started.
    /// A non-zero exit code is reported through [`ToolOutput::status`].
    fn run(&self, invocation: &Invocation) -> crate::Result<ToolOutput>;
}

/// Runs programs as child processes of the current process.
#[derive(Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, invocation: &Invocation) -> crate::Result<ToolOutput> {
        log::debug!("Running command `{}`", invocation.command_line());

        let mut command = Command::new(&invocation.program);
        command.args(&invocation.args);
        if let Some(workdir) = &invocation.workdir {
            command.current_dir(workdir);
        }

        let output = if invocation.stream_output {
            let status = command
                .stdin(Stdio::null())
                .stdout(Stdio::inherit())
                .stderr(Stdio::inherit())
                .status()?;
            ToolOutput {
                status: status.code(),
                ..Default::default()
            }
        } else {
            let output = command.stdin(Stdio::null()).output()?;
            ToolOutput {
                status: output.status.code(),
                stdout: output.stdout,
                stderr: output.stderr,
            }
        };

        log::trace!(
            "`{}` output\nStdout\n{}Stderr\n{}",
            invocation.program_name(),
            output.stdout.to_str_lossy(),
            output.stderr.to_str_lossy()
        );
        Ok(output)
    }
}

pub fn check_tool_output(program: &str, output: ToolOutput) -> crate::Result<ToolOutput> {
    if !output.success() {
        return Err(HarnessError::tool(
            program,
            format!(
                "Exit code: {}\nStderr: {}\nStdout: {}",
                output.status.unwrap_or(-1),
                output.stderr.to_str_lossy().trim(),
                output.stdout.to_str_lossy().trim()
            ),
        ));
    }
    Ok(output)
}

/// Runs the invocation and fails if it does not exit successfully.
pub fn run_checked(runner: &dyn CommandRunner, invocation: &Invocation) -> crate::Result<ToolOutput> {
    let program = invocation.program_name();
    let output = runner.run(invocation).map_err(|e| match e {
        HarnessError::IoError(e) => HarnessError::tool(&program, format!("start failed: {e}")),
        e => e,
    })?;
    check_tool_output(&program, output)
}

/// Finds `name` in `PATH`.
pub fn locate_tool(name: &str) -> crate::Result<PathBuf> {
    which::which(name).map_err(|e| {
        HarnessError::ConfigError(format!(
            "Cannot find `{name}` binary ({e}). Make sure that it is installed and in PATH."
        ))
    })
}
