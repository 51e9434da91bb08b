use std::cell::RefCell;

use crate::common::error::HarnessError;
use crate::database::{InstanceAdmin, InstanceName};
use crate::scheduler::{JobName, SchedulerClient, SchedulerJob};
use crate::tool::{CommandRunner, Invocation, ToolOutput};

pub fn ok_output(stdout: &str) -> ToolOutput {
    ToolOutput {
        status: Some(0),
        stdout: stdout.as_bytes().to_vec(),
        stderr: vec![],
    }
}

pub fn exit_output(code: i32, stderr: &str) -> ToolOutput {
    ToolOutput {
        status: Some(code),
        stdout: vec![],
        stderr: stderr.as_bytes().to_vec(),
    }
}

struct Response {
    args_prefix: String,
    output: ToolOutput,
}

/// Command runner that records invocations and answers them from a script.
/// Responses are matched by the prefix of the space-joined arguments.
/// Unmatched invocations succeed with an empty output.
#[derive(Default)]
pub struct ScriptedRunner {
    responses: RefCell<Vec<Response>>,
    invocations: RefCell<Vec<Invocation>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, args_prefix: &str, output: ToolOutput) -> Self {
        self.responses.borrow_mut().push(Response {
            args_prefix: args_prefix.to_string(),
            output,
        });
        self
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations.borrow().clone()
    }

    /// Arguments of each invocation, joined by spaces.
    pub fn commands(&self) -> Vec<String> {
        self.invocations
            .borrow()
            .iter()
            .map(|invocation| invocation.args.join(" "))
            .collect()
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, invocation: &Invocation) -> crate::Result<ToolOutput> {
        self.invocations.borrow_mut().push(invocation.clone());

        let args = invocation.args.join(" ");
        let output = self
            .responses
            .borrow()
            .iter()
            .find(|response| args.starts_with(&response.args_prefix))
            .map(|response| response.output.clone())
            .unwrap_or_else(|| ok_output(""));
        Ok(output)
    }
}

/// Instance admin that reports a scripted sequence of processing units.
/// The last entry repeats forever.
pub struct FakeInstanceAdmin {
    units: Vec<Result<u32, String>>,
    calls: RefCell<usize>,
}

impl FakeInstanceAdmin {
    pub fn new(units: Vec<Result<u32, String>>) -> Self {
        assert!(!units.is_empty());
        Self {
            units,
            calls: RefCell::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        *self.calls.borrow()
    }
}

impl InstanceAdmin for FakeInstanceAdmin {
    fn processing_units(&self, _instance: &InstanceName) -> crate::Result<u32> {
        let mut calls = self.calls.borrow_mut();
        let index = (*calls).min(self.units.len() - 1);
        *calls += 1;
        self.units[index]
            .clone()
            .map_err(|e| HarnessError::tool("gcloud", e))
    }
}

/// Scheduler holding a single job in memory.
pub struct FakeScheduler {
    pub job: RefCell<SchedulerJob>,
    pub updates: RefCell<Vec<Vec<u8>>>,
}

impl FakeScheduler {
    pub fn new(name: &str, data: &str) -> Self {
        Self {
            job: RefCell::new(SchedulerJob {
                name: name.to_string(),
                data: data.as_bytes().to_vec(),
            }),
            updates: Default::default(),
        }
    }

    pub fn data_json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.job.borrow().data).unwrap()
    }
}

impl SchedulerClient for FakeScheduler {
    fn get_job(&self, name: &JobName) -> crate::Result<SchedulerJob> {
        let job = self.job.borrow();
        if job.name != name.to_string() {
            return Err(HarnessError::tool("gcloud", format!("job {name} not found")));
        }
        Ok(job.clone())
    }

    fn update_job_data(&self, name: &JobName, data: &[u8]) -> crate::Result<()> {
        self.get_job(name)?;
        self.updates.borrow_mut().push(data.to_vec());
        self.job.borrow_mut().data = data.to_vec();
        Ok(())
    }
}
