// ============================================
// TANZU CLI - Multi Repository Aggregator
// ============================================

use std::collections::BTreeMap;
use std::sync::Arc;

use super::descriptor::PluginDescriptor;
use super::manifest::Plugin;
use super::repository::Repository;
use super::version::VersionSelector;
use crate::error::{PluginError, Result};

/// An ordered set of repositories queried front to back.
///
/// Entries are not deduplicated; two repositories may share a name.
#[derive(Clone, Default)]
pub struct MultiRepo {
    repositories: Vec<Arc<dyn Repository>>,
}

impl MultiRepo {
    pub fn new(repositories: Vec<Arc<dyn Repository>>) -> Self {
        Self { repositories }
    }

    pub fn add_repository(&mut self, repo: Arc<dyn Repository>) {
        self.repositories.push(repo);
    }

    /// Remove every repository called `name`.
    pub fn remove_repository(&mut self, name: &str) {
        self.repositories.retain(|repo| repo.name() != name);
    }

    pub fn get_repository(&self, name: &str) -> Result<Arc<dyn Repository>> {
        self.repositories
            .iter()
            .find(|repo| repo.name() == name)
            .cloned()
            .ok_or_else(|| PluginError::not_found("repository", name))
    }

    pub fn repositories(&self) -> &[Arc<dyn Repository>] {
        &self.repositories
    }

    pub fn is_empty(&self) -> bool {
        self.repositories.is_empty()
    }

    /// First repository, in insertion order, whose listing contains `plugin`.
    ///
    /// A repository that cannot be listed is skipped rather than failing the
    /// whole lookup.
    pub async fn find(&self, plugin: &str) -> Result<Arc<dyn Repository>> {
        for repo in &self.repositories {
            let plugins = match repo.list().await {
                Ok(plugins) => plugins,
                Err(e) => {
                    tracing::debug!(repo = repo.name(), error = %e, "could not list repository");
                    continue;
                }
            };
            if plugins.iter().any(|p| p.name == plugin) {
                tracing::debug!(plugin, repo = repo.name(), "found plugin");
                return Ok(repo.clone());
            }
        }
        Err(PluginError::not_found("plugin in any repository", plugin))
    }

    /// Every repository's plugins keyed by repository name, for display.
    pub async fn list_plugins(&self) -> Result<BTreeMap<String, Vec<Plugin>>> {
        let mut plugins = BTreeMap::new();
        for repo in &self.repositories {
            let listed = repo.list().await?;
            plugins.insert(repo.name().to_string(), listed);
        }
        Ok(plugins)
    }

    /// First repository offering a newer version of an installed plugin.
    ///
    /// Repositories that fail the check are logged and skipped.
    pub async fn has_update_in(
        &self,
        descriptor: &PluginDescriptor,
    ) -> Result<Option<(Arc<dyn Repository>, String)>> {
        for repo in &self.repositories {
            match has_plugin_update(repo.as_ref(), None, descriptor).await {
                Ok(Some(version)) => return Ok(Some((repo.clone(), version))),
                Ok(None) => {}
                Err(e) => {
                    tracing::debug!(
                        plugin = %descriptor.name,
                        repo = repo.name(),
                        error = %e,
                        "could not check for update"
                    );
                }
            }
        }
        Ok(None)
    }
}

/// The newer version `repo` offers for an installed plugin, if any.
///
/// `selector` defaults to the repository's own selector.
pub async fn has_plugin_update(
    repo: &dyn Repository,
    selector: Option<VersionSelector>,
    descriptor: &PluginDescriptor,
) -> Result<Option<String>> {
    let selector = selector.unwrap_or_else(|| repo.version_selector());
    let plugin = repo.describe(&descriptor.name).await?;
    let latest = plugin.find_version(selector);
    if latest.is_empty() {
        return Err(PluginError::NoSuitableVersion {
            name: descriptor.name.clone(),
            versions: plugin.versions,
        });
    }
    if descriptor.is_older_than(&latest)? {
        Ok(Some(latest))
    } else {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::arch::Arch;
    use crate::plugins::manifest::Manifest;
    use async_trait::async_trait;

    struct StaticRepo {
        name: String,
        plugins: Vec<Plugin>,
        broken: bool,
    }

    impl StaticRepo {
        fn new(name: &str, plugins: &[(&str, &[&str])]) -> Arc<dyn Repository> {
            Arc::new(Self {
                name: name.to_string(),
                plugins: plugins
                    .iter()
                    .map(|(n, versions)| Plugin::new(*n, "").with_versions(versions.iter().copied()))
                    .collect(),
                broken: false,
            })
        }

        fn broken(name: &str) -> Arc<dyn Repository> {
            Arc::new(Self {
                name: name.to_string(),
                plugins: Vec::new(),
                broken: true,
            })
        }
    }

    #[async_trait]
    impl Repository for StaticRepo {
        async fn list(&self) -> Result<Vec<Plugin>> {
            if self.broken {
                return Err(PluginError::transport("list", &self.name, "unreachable"));
            }
            Ok(self.plugins.clone())
        }

        async fn describe(&self, name: &str) -> Result<Plugin> {
            self.list()
                .await?
                .into_iter()
                .find(|p| p.name == name)
                .ok_or_else(|| PluginError::not_found("plugin", name))
        }

        async fn fetch(&self, name: &str, _version: &str, _arch: Arch) -> Result<Vec<u8>> {
            Err(PluginError::not_found("artifact", name))
        }

        async fn fetch_test(&self, name: &str, _version: &str, _arch: Arch) -> Result<Vec<u8>> {
            Err(PluginError::not_found("test artifact", name))
        }

        async fn manifest(&self) -> Result<Manifest> {
            Ok(Manifest {
                plugins: self.list().await?,
                ..Default::default()
            })
        }

        fn name(&self) -> &str {
            &self.name
        }

        fn version_selector(&self) -> VersionSelector {
            VersionSelector::Stable
        }
    }

    #[tokio::test]
    async fn test_find_scans_in_order() {
        let repos = MultiRepo::new(vec![
            StaticRepo::new("first", &[("login", &["v0.1.0"])]),
            StaticRepo::new("second", &[("login", &["v0.2.0"]), ("qux", &["v1.0.0"])]),
        ]);

        assert_eq!(repos.find("login").await.unwrap().name(), "first");
        assert_eq!(repos.find("qux").await.unwrap().name(), "second");
        assert!(repos.find("absent").await.err().unwrap().is_not_found());
    }

    #[tokio::test]
    async fn test_find_skips_broken_repositories() {
        let repos = MultiRepo::new(vec![
            StaticRepo::broken("down"),
            StaticRepo::new("up", &[("package", &["v0.1.0"])]),
        ]);
        assert_eq!(repos.find("package").await.unwrap().name(), "up");
    }

    #[tokio::test]
    async fn test_remove_drops_every_duplicate() {
        let mut repos = MultiRepo::default();
        repos.add_repository(StaticRepo::new("dup", &[]));
        repos.add_repository(StaticRepo::new("keep", &[]));
        repos.add_repository(StaticRepo::new("dup", &[]));

        repos.remove_repository("dup");
        let names: Vec<&str> = repos.repositories().iter().map(|r| r.name()).collect();
        assert_eq!(names, vec!["keep"]);
        assert!(repos.get_repository("dup").err().unwrap().is_not_found());
    }

    #[tokio::test]
    async fn test_list_plugins_keyed_by_repository() {
        let repos = MultiRepo::new(vec![
            StaticRepo::new("a", &[("login", &["v0.1.0"])]),
            StaticRepo::new("b", &[("cluster", &["v0.1.0"]), ("package", &["v0.1.0"])]),
        ]);
        let listed = repos.list_plugins().await.unwrap();
        assert_eq!(listed["a"].len(), 1);
        assert_eq!(listed["b"].len(), 2);
    }

    #[tokio::test]
    async fn test_update_detection() {
        let repos = MultiRepo::new(vec![
            StaticRepo::broken("down"),
            StaticRepo::new("old", &[("login", &["v0.1.0"])]),
            StaticRepo::new("new", &[("login", &["v0.1.0", "v0.3.0", "v0.4.0-alpha.1"])]),
        ]);
        let installed = PluginDescriptor::new("login", "Login", "v0.2.0", "System");

        let (repo, version) = repos.has_update_in(&installed).await.unwrap().unwrap();
        assert_eq!(repo.name(), "new");
        assert_eq!(version, "v0.3.0");

        let current = PluginDescriptor::new("login", "Login", "v0.3.0", "System");
        assert!(repos.has_update_in(&current).await.unwrap().is_none());

        let alpha = has_plugin_update(
            repos.get_repository("new").unwrap().as_ref(),
            Some(VersionSelector::Alpha),
            &current,
        )
        .await
        .unwrap();
        assert_eq!(alpha.as_deref(), Some("v0.4.0-alpha.1"));
    }
}
