// ============================================
// TANZU CLI - Plugin Repositories
// ============================================

//! Sources of plugin artifacts.
//!
//! Both repository kinds share one layout below their root:
//!
//! ```text
//! manifest.yaml
//! <plugin>/plugin.yaml
//! <plugin>/<version>/<artifact>
//! <plugin>/<version>/test/<test-artifact>
//! ```

mod gcp;
mod local;

pub use gcp::{GcpBucketRepository, GcpRepositoryOptions, DEFAULT_GCS_ENDPOINT};
pub use local::LocalRepository;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use super::arch::Arch;
use super::manifest::{Manifest, Plugin};
use super::version::VersionSelector;
use crate::config::{PluginRepository, VersionSelectorLevel};
use crate::error::{PluginError, Result};

/// File name of the repository inventory.
pub const MANIFEST_FILE_NAME: &str = "manifest.yaml";
/// File name of a per-plugin descriptor.
pub const PLUGIN_FILE_NAME: &str = "plugin.yaml";
/// Default root directory inside a repository.
pub const DEFAULT_ARTIFACTS_DIRECTORY: &str = "artifacts";
/// Sub-directory holding test artifacts for a version.
pub const TEST_DIRECTORY: &str = "test";
/// Version keyword resolved through the repository's selector.
pub const VERSION_LATEST: &str = "latest";
/// Plugin name keyword meaning every plugin in a repository.
pub const ALL_PLUGINS: &str = "all";
/// Upper bound on a remote manifest query.
pub const DEFAULT_MANIFEST_QUERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Name of the built-in community repository.
pub const COMMUNITY_REPOSITORY_NAME: &str = "community";
/// Bucket of the built-in community repository.
pub const COMMUNITY_BUCKET_NAME: &str = "tanzu-cli";

/// A named source of plugin artifacts.
#[async_trait]
pub trait Repository: Send + Sync {
    /// All plugins in the manifest, each with its published versions.
    async fn list(&self) -> Result<Vec<Plugin>>;

    /// Descriptor of one plugin plus the versions available for it.
    async fn describe(&self, name: &str) -> Result<Plugin>;

    /// Raw bytes of a plugin binary. `version` may be [`VERSION_LATEST`].
    async fn fetch(&self, name: &str, version: &str, arch: Arch) -> Result<Vec<u8>>;

    /// Raw bytes of a plugin's test binary. `version` may be [`VERSION_LATEST`].
    async fn fetch_test(&self, name: &str, version: &str, arch: Arch) -> Result<Vec<u8>>;

    /// The repository inventory.
    async fn manifest(&self) -> Result<Manifest>;

    fn name(&self) -> &str;

    fn version_selector(&self) -> VersionSelector;
}

/// Turn `latest` into a concrete version using the repository's selector.
pub(crate) async fn resolve_version<R>(repo: &R, name: &str, version: &str) -> Result<String>
where
    R: Repository + ?Sized,
{
    if version.is_empty() {
        return Err(PluginError::EmptyVersion(name.to_string()));
    }
    if version != VERSION_LATEST {
        return Ok(version.to_string());
    }

    let plugin = repo.describe(name).await?;
    let resolved = plugin.find_version(repo.version_selector());
    if resolved.is_empty() {
        return Err(PluginError::NoSuitableVersion {
            name: name.to_string(),
            versions: plugin.versions,
        });
    }
    tracing::debug!(plugin = name, version = %resolved, repo = repo.name(), "resolved latest version");
    Ok(resolved)
}

/// Build one repository from its persisted configuration entry.
pub fn load_repository(
    config: &PluginRepository,
    selector: VersionSelector,
) -> Option<Arc<dyn Repository>> {
    if let Some(gcp) = &config.gcp_plugin_repository {
        let mut options = GcpRepositoryOptions::new(&gcp.name, &gcp.bucket_name)
            .with_version_selector(selector);
        if let Some(root) = gcp.root_path.as_deref().filter(|r| !r.is_empty()) {
            options = options.with_root_path(root);
        }
        return Some(Arc::new(GcpBucketRepository::new(options)));
    }
    if let Some(local) = &config.local_plugin_repository {
        return Some(Arc::new(
            LocalRepository::new(&local.name, &local.path).with_version_selector(selector),
        ));
    }
    None
}

/// Build every configured repository, in configuration order.
pub fn load_repositories(
    configs: &[PluginRepository],
    level: VersionSelectorLevel,
) -> Vec<Arc<dyn Repository>> {
    let selector = VersionSelector::from(level);
    configs
        .iter()
        .filter_map(|config| {
            let repo = load_repository(config, selector);
            if repo.is_none() {
                tracing::warn!("skipping repository entry with no known type");
            }
            repo
        })
        .collect()
}
