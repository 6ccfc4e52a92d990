// ============================================
// TANZU CLI - Installed Plugin Query
// ============================================

//! How the catalog learns what an installed binary is.
//!
//! Plugins are independent executables, so the only source of truth is the
//! binary itself: run with the hidden `info` argument it prints its JSON
//! descriptor on stdout and exits 0. After an install the catalog also
//! runs `post-install` so the plugin can set up its own configuration.

use async_trait::async_trait;
use std::path::Path;
use tokio::process::Command;

use super::descriptor::PluginDescriptor;
use crate::error::{PluginError, Result};

/// Hidden argument every plugin answers with its descriptor.
pub const INFO_COMMAND: &str = "info";

/// Argument run once after a plugin binary is written.
pub const POST_INSTALL_COMMAND: &str = "post-install";

/// Older plugins predate `post-install`; their CLI framework answers this.
const UNKNOWN_COMMAND: &str = "unknown command";

#[async_trait]
pub trait PluginQuery: Send + Sync {
    /// Describe the binary at `path`, installed as plugin `name`.
    async fn describe(&self, name: &str, path: &Path) -> Result<PluginDescriptor>;

    /// Let a freshly installed plugin initialize its configuration.
    async fn initialize(&self, name: &str, path: &Path) -> Result<()>;
}

/// Query that executes `<binary> info`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecQuery;

#[async_trait]
impl PluginQuery for ExecQuery {
    async fn describe(&self, name: &str, path: &Path) -> Result<PluginDescriptor> {
        let output = Command::new(path)
            .arg(INFO_COMMAND)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| PluginError::Describe {
                name: name.to_string(),
                source: Some(Box::new(e)),
            })?;

        if !output.status.success() {
            tracing::debug!(
                plugin = name,
                status = %output.status,
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "plugin info exited unsuccessfully"
            );
            return Err(PluginError::Describe {
                name: name.to_string(),
                source: Some(format!("`{} {}` exited with {}", path.display(), INFO_COMMAND, output.status).into()),
            });
        }

        PluginDescriptor::from_json(&output.stdout).map_err(|source| PluginError::DescriptionDecode {
            name: name.to_string(),
            source,
        })
    }

    async fn initialize(&self, name: &str, path: &Path) -> Result<()> {
        let output = Command::new(path)
            .arg(POST_INSTALL_COMMAND)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| PluginError::io("execute", path, e))?;
        if output.status.success() {
            return Ok(());
        }

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        if combined.contains(UNKNOWN_COMMAND) {
            tracing::debug!(plugin = name, "plugin has no post-install command");
            return Ok(());
        }
        Err(PluginError::PluginExited {
            name: name.to_string(),
            status: output.status,
            stderr: combined.trim().to_string(),
        })
    }
}
