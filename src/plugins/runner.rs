// ============================================
// TANZU CLI - Plugin Runner
// ============================================

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use tokio::process::Command;

use crate::error::{PluginError, Result};

/// Runs an installed plugin binary, forwarding CLI arguments.
#[derive(Debug, Clone)]
pub struct Runner {
    name: String,
    path: PathBuf,
    test_path: Option<PathBuf>,
    args: Vec<String>,
}

impl Runner {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            test_path: None,
            args,
        }
    }

    /// Binary used by [`Runner::run_test`].
    pub fn with_test_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.test_path = Some(path.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Run the plugin attached to the current terminal.
    pub async fn run(&self) -> Result<ExitStatus> {
        self.run_binary(&self.path, "plugin").await
    }

    /// Run the plugin's test binary attached to the current terminal.
    pub async fn run_test(&self) -> Result<ExitStatus> {
        let path = self
            .test_path
            .as_deref()
            .ok_or_else(|| PluginError::not_found("test plugin", &self.name))?;
        self.run_binary(path, "test plugin").await
    }

    /// Run the plugin and capture stdout and stderr.
    ///
    /// A non-zero exit is an error carrying the captured stderr.
    pub async fn run_output(&self) -> Result<(String, String)> {
        self.ensure_exists(&self.path, "plugin")?;
        tracing::debug!(plugin = %self.name, args = ?self.args, "running plugin for output");

        let output = Command::new(&self.path)
            .args(&self.args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| PluginError::io("execute", &self.path, e))?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        if !output.status.success() {
            return Err(PluginError::PluginExited {
                name: self.name.clone(),
                status: output.status,
                stderr: stderr.trim().to_string(),
            });
        }
        Ok((stdout, stderr))
    }

    async fn run_binary(&self, path: &Path, kind: &'static str) -> Result<ExitStatus> {
        self.ensure_exists(path, kind)?;
        tracing::debug!(plugin = %self.name, path = %path.display(), args = ?self.args, "running {}", kind);

        let mut child = Command::new(path)
            .args(&self.args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| PluginError::io("execute", path, e))?;

        child
            .wait()
            .await
            .map_err(|e| PluginError::io("wait for", path, e))
    }

    fn ensure_exists(&self, path: &Path, kind: &'static str) -> Result<()> {
        if path.is_file() {
            Ok(())
        } else {
            Err(PluginError::not_found(kind, &self.name))
        }
    }
}
