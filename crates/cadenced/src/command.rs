//! Shell-command jobs declared under `[[jobs]]` in cadence.toml.

use async_trait::async_trait;
use cadence_core::JobConfig;
use cadence_scheduler::{Job, JobContext, JobError, JobSpec};
use tokio::process::Command;
use tracing::debug;

/// Keep failure messages short enough for a one-line report.
const MAX_STDERR_CHARS: usize = 200;

/// Runs `sh -c <command>` on every dispatch.
///
/// A non-zero exit becomes a [`JobError`] carrying the exit code and the tail
/// of stderr. When `on_success_assert` is set, that condition is asserted
/// after a successful run and cleared after a failed one, so other jobs can
/// depend on this one.
pub struct CommandJob {
    spec: JobSpec,
    command: String,
    on_success_assert: Option<String>,
}

impl CommandJob {
    pub fn from_config(config: &JobConfig) -> Self {
        let spec = JobSpec {
            name: config.name.clone(),
            conditions: config.conditions.clone(),
            schedule: Some(config.schedule.clone()),
        };
        Self {
            spec,
            command: config.command.clone(),
            on_success_assert: config.on_success_assert.clone(),
        }
    }
}

#[async_trait]
impl Job for CommandJob {
    fn spec(&self) -> &JobSpec {
        &self.spec
    }

    async fn run(&self, ctx: &JobContext) -> Result<(), JobError> {
        debug!(command = %self.command, "spawning");
        let output = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .stdin(std::process::Stdio::null())
            .output()
            .await
            .map_err(|e| JobError::new(format!("spawn failed: {e}")))?;

        if output.status.success() {
            if let Some(name) = &self.on_success_assert {
                ctx.condition_set(name);
            }
            return Ok(());
        }

        if let Some(name) = &self.on_success_assert {
            ctx.condition_del(name);
        }
        let code = output
            .status
            .code()
            .map_or_else(|| "killed by signal".to_string(), |c| format!("exit {c}"));
        let stderr_text = String::from_utf8_lossy(&output.stderr);
        let stderr = tail(stderr_text.trim(), MAX_STDERR_CHARS);
        if stderr.is_empty() {
            Err(JobError::new(code))
        } else {
            Err(JobError::new(format!("{code}: {stderr}")))
        }
    }
}

/// Last `max` chars of `s`, on a char boundary.
fn tail(s: &str, max: usize) -> &str {
    let count = s.chars().count();
    if count <= max {
        return s;
    }
    let skip = count - max;
    match s.char_indices().nth(skip) {
        Some((idx, _)) => &s[idx..],
        None => s,
    }
}
