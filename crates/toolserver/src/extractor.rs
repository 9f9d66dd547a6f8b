use crate::{error::JobError, sites::SiteProfile};
use std::{
    path::Path,
    process::{ExitStatus, Stdio},
    time::Duration,
};
use tokio::process::Command;

/// Captured streams of a successful extractor run.
#[derive(Debug)]
pub struct ToolOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

/// Runs the external extraction tool (gallery-dl compatible CLI).
#[derive(Debug, Clone)]
pub struct Extractor {
    program: String,
    extra_args: Vec<String>,
    download_timeout: Duration,
    fetch_timeout: Duration,
}

impl Extractor {
    pub fn new(program: impl Into<String>, download_timeout: Duration, fetch_timeout: Duration) -> Self {
        Self {
            program: program.into(),
            extra_args: Vec::new(),
            download_timeout,
            fetch_timeout,
        }
    }

    /// Arguments placed right after the program, before any generated flag.
    pub fn with_extra_args(mut self, args: Vec<String>) -> Self {
        self.extra_args = args;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub async fn run_download(
        &self,
        url: &str,
        workspace: &Path,
        profile: Option<&SiteProfile>,
    ) -> Result<ToolOutput, JobError> {
        let args = self.download_args(url, workspace, profile);
        self.run(args, self.download_timeout).await
    }

    pub async fn run_metadata(&self, url: &str, profile: Option<&SiteProfile>) -> Result<ToolOutput, JobError> {
        let args = self.metadata_args(url, profile);
        self.run(args, self.fetch_timeout).await
    }

    fn download_args(&self, url: &str, workspace: &Path, profile: Option<&SiteProfile>) -> Vec<String> {
        let mut args = self.common_args();
        args.push("--destination".to_string());
        args.push(workspace.display().to_string());
        push_credentials(&mut args, profile);
        args.push(url.to_string());
        args
    }

    fn metadata_args(&self, url: &str, profile: Option<&SiteProfile>) -> Vec<String> {
        let mut args = self.common_args();
        push_credentials(&mut args, profile);
        args.push("--dump-json".to_string());
        args.push(url.to_string());
        args
    }

    fn common_args(&self) -> Vec<String> {
        let mut args = self.extra_args.clone();
        args.push("--ignore-config".to_string());
        args
    }

    async fn run(&self, args: Vec<String>, limit: Duration) -> Result<ToolOutput, JobError> {
        tracing::debug!(program = %self.program, args = %args.join(" "), "running extractor");

        let child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| JobError::ExtractionFailed(format!("failed to start {}: {e}", self.program)))?;

        // Dropping the pending wait on timeout drops the child, which kills it.
        let output = match tokio::time::timeout(limit, child.wait_with_output()).await {
            Ok(result) => result
                .map_err(|e| JobError::ExtractionFailed(format!("failed to wait for {}: {e}", self.program)))?,
            Err(_) => {
                tracing::warn!(program = %self.program, timeout_secs = limit.as_secs_f64(), "extractor timed out");
                return Err(JobError::ExtractionTimeout(limit));
            }
        };

        let stderr_text = String::from_utf8_lossy(&output.stderr);
        tracing::debug!(
            status = %output.status,
            stdout_bytes = output.stdout.len(),
            stderr = %stderr_text.trim(),
            "extractor finished"
        );

        if !output.status.success() {
            tracing::warn!(status = %output.status, stderr = %stderr_text.trim(), "extractor failed");
            return Err(JobError::ExtractionFailed(failure_message(output.status, &stderr_text)));
        }

        Ok(ToolOutput {
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}

fn push_credentials(args: &mut Vec<String>, profile: Option<&SiteProfile>) {
    if let Some(file) = profile.and_then(SiteProfile::credential_file) {
        args.push("--cookies".to_string());
        args.push(file.display().to_string());
    }
}

fn failure_message(status: ExitStatus, stderr: &str) -> String {
    let stderr = stderr.trim();
    if stderr.is_empty() {
        format!("extractor exited with {status}")
    } else {
        stderr.to_string()
    }
}
