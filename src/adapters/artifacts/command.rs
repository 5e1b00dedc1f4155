//! External command format converter
//!
//! Runs a configured program with `{input}` / `{output}` placeholders in its
//! arguments. The program writes to a temporary path that is renamed over
//! the target only after it exits successfully. A run that times out is
//! retried with backoff.

use crate::adapters::artifacts::traits::FormatConverter;
use crate::config::schema::{ConvertConfig, INPUT_PLACEHOLDER, OUTPUT_PLACEHOLDER};
use crate::core::retry::RetryPolicy;
use crate::domain::{ArtifactError, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Converts artifacts by running an external program
pub struct CommandConverter {
    program: String,
    args: Vec<String>,
    target_extension: String,
    timeout: Duration,
    retry: RetryPolicy,
}

impl CommandConverter {
    pub fn new(config: &ConvertConfig) -> Self {
        Self {
            program: config.program.clone(),
            args: config.args.clone(),
            target_extension: config.target_extension.clone(),
            timeout: Duration::from_secs(config.timeout_seconds),
            retry: RetryPolicy::from(&config.retry),
        }
    }

    /// Replace the retry policy
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn render_args(&self, input: &Path, output: &Path) -> Vec<String> {
        let input = input.to_string_lossy();
        let output = output.to_string_lossy();
        self.args
            .iter()
            .map(|arg| {
                arg.replace(INPUT_PLACEHOLDER, &input)
                    .replace(OUTPUT_PLACEHOLDER, &output)
            })
            .collect()
    }

    async fn convert_once(&self, input: &Path, output: &Path) -> Result<()> {
        let partial = partial_path(output);
        let args = self.render_args(input, &partial);

        let child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ArtifactError::ConversionFailed {
                path: input.display().to_string(),
                message: format!("cannot start {}: {e}", self.program),
            })?;

        let finished = tokio::time::timeout(self.timeout, child.wait_with_output()).await;
        let process_output = match finished {
            Ok(result) => result?,
            Err(_) => {
                let _ = tokio::fs::remove_file(&partial).await;
                return Err(ArtifactError::Timeout(format!(
                    "{} on {} exceeded {}s",
                    self.program,
                    input.display(),
                    self.timeout.as_secs()
                ))
                .into());
            }
        };

        if !process_output.status.success() {
            let _ = tokio::fs::remove_file(&partial).await;
            let stderr = String::from_utf8_lossy(&process_output.stderr);
            return Err(ArtifactError::ConversionFailed {
                path: input.display().to_string(),
                message: format!("{} exited with {}: {}", self.program, process_output.status, stderr.trim()),
            }
            .into());
        }

        if !tokio::fs::try_exists(&partial).await.unwrap_or(false) {
            return Err(ArtifactError::ConversionFailed {
                path: input.display().to_string(),
                message: format!("{} produced no output", self.program),
            }
            .into());
        }

        tokio::fs::rename(&partial, output).await?;
        Ok(())
    }
}

#[async_trait]
impl FormatConverter for CommandConverter {
    async fn convert(&self, input: &Path, output: &Path) -> Result<()> {
        if !tokio::fs::try_exists(input).await.unwrap_or(false) {
            return Err(ArtifactError::Missing(input.display().to_string()).into());
        }
        if let Some(parent) = output.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        self.retry
            .run("convert", || self.convert_once(input, output))
            .await?;
        tracing::debug!(input = %input.display(), output = %output.display(), "Converted artifact");
        Ok(())
    }

    fn target_extension(&self) -> &str {
        &self.target_extension
    }
}

/// `dir/I1.jpg` becomes `dir/I1.partial.jpg`, keeping the extension the
/// converter may key its output format on
fn partial_path(output: &Path) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match output.extension() {
        Some(ext) => format!("{stem}.partial.{}", ext.to_string_lossy()),
        None => format!("{stem}.partial"),
    };
    output.with_file_name(name)
}
