// ============================================
// TANZU CLI - Local Filesystem Repository
// ============================================

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tokio::fs;

use super::{resolve_version, Repository, MANIFEST_FILE_NAME, PLUGIN_FILE_NAME, TEST_DIRECTORY};
use crate::error::{PluginError, Result};
use crate::plugins::arch::Arch;
use crate::plugins::manifest::{Manifest, Plugin};
use crate::plugins::version::VersionSelector;

/// Repository backed by a directory on the local host.
#[derive(Debug, Clone)]
pub struct LocalRepository {
    name: String,
    path: PathBuf,
    version_selector: VersionSelector,
}

impl LocalRepository {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            version_selector: VersionSelector::default(),
        }
    }

    pub fn with_version_selector(mut self, selector: VersionSelector) -> Self {
        self.version_selector = selector;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read(&self, path: &Path, kind: &'static str, name: &str) -> Result<Vec<u8>> {
        match fs::read(path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "{} missing from local repository", kind);
                Err(PluginError::not_found(kind, name))
            }
            Err(e) => Err(PluginError::io("read", path, e)),
        }
    }

    async fn versions(&self, name: &str) -> Result<Vec<String>> {
        let dir = self.path.join(name);
        let mut entries = fs::read_dir(&dir)
            .await
            .map_err(|e| PluginError::io("read directory", &dir, e))?;

        let mut versions = BTreeSet::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| PluginError::io("read directory", &dir, e))?
        {
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| PluginError::io("stat", entry.path(), e))?;
            if file_type.is_dir() {
                versions.insert(entry.file_name().to_string_lossy().into_owned());
            }
        }
        Ok(versions.into_iter().collect())
    }
}

#[async_trait]
impl Repository for LocalRepository {
    async fn list(&self) -> Result<Vec<Plugin>> {
        let manifest = self.manifest().await?;
        let mut plugins = Vec::with_capacity(manifest.plugins.len());
        for plugin in &manifest.plugins {
            plugins.push(self.describe(&plugin.name).await?);
        }
        Ok(plugins)
    }

    async fn describe(&self, name: &str) -> Result<Plugin> {
        let path = self.path.join(name).join(PLUGIN_FILE_NAME);
        let bytes = self.read(&path, "plugin", name).await?;
        let mut plugin: Plugin = serde_yaml::from_slice(&bytes)
            .map_err(|e| PluginError::decode(path.display().to_string(), e))?;
        plugin.versions = self.versions(name).await?;
        Ok(plugin)
    }

    async fn fetch(&self, name: &str, version: &str, arch: Arch) -> Result<Vec<u8>> {
        let version = resolve_version(self, name, version).await?;
        let path = self
            .path
            .join(name)
            .join(&version)
            .join(arch.artifact_name(name));
        self.read(&path, "artifact", &path.display().to_string()).await
    }

    async fn fetch_test(&self, name: &str, version: &str, arch: Arch) -> Result<Vec<u8>> {
        let version = resolve_version(self, name, version).await?;
        let path = self
            .path
            .join(name)
            .join(&version)
            .join(TEST_DIRECTORY)
            .join(arch.test_artifact_name(name));
        self.read(&path, "test artifact", &path.display().to_string())
            .await
    }

    async fn manifest(&self) -> Result<Manifest> {
        let path = self.path.join(MANIFEST_FILE_NAME);
        let bytes = self.read(&path, "manifest", &path.display().to_string()).await?;
        serde_yaml::from_slice(&bytes).map_err(|e| PluginError::decode(path.display().to_string(), e))
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn version_selector(&self) -> VersionSelector {
        self.version_selector
    }
}
