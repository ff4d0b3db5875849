use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use pipedag::dag::NodeKind;
use pipedag::engine::ActionOutcome;
use pipedag::errors::Result;
use pipedag::exec::{ExecutorBackend, LeafInvocation};
use pipedag::fs::mock::MockFileSystem;
use pipedag::fs::FileSystem;

/// A fake executor that:
/// - records every command it is asked to run
/// - "produces" outputs in a [`MockFileSystem`]: the stdout redirect target
///   and, for file nodes, the node's own path
/// - optionally fails the n-th invocation with a given exit status, writing
///   nothing for it
#[derive(Debug, Clone)]
pub struct FakeExecutor {
    fs: MockFileSystem,
    invocations: Arc<Mutex<Vec<LeafInvocation>>>,
    fail_at: Option<(usize, i32)>,
}

impl FakeExecutor {
    pub fn new(fs: MockFileSystem) -> Self {
        Self {
            fs,
            invocations: Arc::new(Mutex::new(Vec::new())),
            fail_at: None,
        }
    }

    /// Fail the `nth` invocation (1-based) with exit status `status`.
    pub fn failing_at(mut self, nth: usize, status: i32) -> Self {
        self.fail_at = Some((nth, status));
        self
    }

    pub fn invocations(&self) -> Vec<LeafInvocation> {
        self.invocations.lock().unwrap().clone()
    }

    pub fn invocation_count(&self) -> usize {
        self.invocations.lock().unwrap().len()
    }

    /// Node ids in invocation order.
    pub fn nodes(&self) -> Vec<String> {
        self.invocations().into_iter().map(|i| i.node).collect()
    }

    fn produce(&self, invocation: &LeafInvocation) -> Result<()> {
        let command = &invocation.command;
        let output = format!("output of {}\n", command.program);

        if let Some(redirect) = &command.stdout {
            let mut content = String::new();
            if redirect.append && self.fs.exists(&redirect.path) {
                content = self.fs.read_to_string(&redirect.path)?;
            }
            if let Some(header) = &redirect.header {
                content.push_str(header);
                content.push('\n');
            }
            content.push_str(&output);
            self.fs.write(&redirect.path, content.as_bytes())?;
        }

        let node_path = Path::new(&invocation.node);
        let redirected_to_node = command
            .stdout
            .as_ref()
            .is_some_and(|r| r.path.as_path() == node_path);
        if invocation.kind == NodeKind::File && !redirected_to_node {
            self.fs.write(node_path, output.as_bytes())?;
        }
        Ok(())
    }
}

impl ExecutorBackend for FakeExecutor {
    fn execute(
        &self,
        invocation: LeafInvocation,
    ) -> Pin<Box<dyn Future<Output = Result<ActionOutcome>> + Send + '_>> {
        Box::pin(async move {
            let nth = {
                let mut guard = self.invocations.lock().unwrap();
                guard.push(invocation.clone());
                guard.len()
            };

            if let Some((fail_nth, status)) = self.fail_at {
                if fail_nth == nth {
                    return Ok(ActionOutcome::Failed(status));
                }
            }

            self.produce(&invocation)?;
            Ok(ActionOutcome::Success)
        })
    }
}
