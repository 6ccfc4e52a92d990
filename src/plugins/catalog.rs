// ============================================
// TANZU CLI - Local Plugin Catalog
// ============================================

//! The set of plugin binaries installed under one root directory.
//!
//! There is no ledger file: installed plugins are discovered by listing the
//! root and asking each binary to describe itself (see [`PluginQuery`]).

use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use super::arch::{plugin_name_from_bin, plugin_name_from_test_bin, Arch};
use super::descriptor::PluginDescriptor;
use super::multi_repo::MultiRepo;
use super::query::{ExecQuery, PluginQuery};
use super::repository::{Repository, VERSION_LATEST};
use super::runner::Runner;
use crate::error::{PluginError, Result};

/// Name reserved for the core CLI itself.
pub const CORE_NAME: &str = "core";

/// Plugins every installation is expected to carry.
pub const DEFAULT_DISTRO: &[&str] = &[
    "login",
    "pinniped-auth",
    "cluster",
    "management-cluster",
    "kubernetes-release",
    "package",
    "secret",
];

const TEST_DIR: &str = "test";
const MIN_CONCURRENT: usize = 2;

/// Local plugin registry and lifecycle manager.
#[derive(Clone)]
pub struct Catalog {
    root: PathBuf,
    distro: Vec<String>,
    arch: Arch,
    query: Arc<dyn PluginQuery>,
    max_concurrent: usize,
}

impl Catalog {
    /// Open the catalog at `root`, creating the directory tree if missing.
    pub fn new(root: impl Into<PathBuf>, distro: Vec<String>) -> Result<Self> {
        let arch = Arch::current().ok_or_else(|| {
            PluginError::not_found(
                "published arch for target",
                format!("{}/{}", std::env::consts::OS, std::env::consts::ARCH),
            )
        })?;
        Self::with_arch(root, distro, arch)
    }

    /// Open the catalog for an explicit target arch.
    pub fn with_arch(root: impl Into<PathBuf>, distro: Vec<String>, arch: Arch) -> Result<Self> {
        let root = root.into();
        ensure_dir(&root.join(TEST_DIR))?;

        let max_concurrent = std::thread::available_parallelism()
            .map(|n| n.get() / 2)
            .unwrap_or(0)
            .max(MIN_CONCURRENT);

        Ok(Self {
            root,
            distro,
            arch,
            query: Arc::new(ExecQuery),
            max_concurrent,
        })
    }

    /// Replace the installed-plugin query port.
    pub fn with_query(mut self, query: Arc<dyn PluginQuery>) -> Self {
        self.query = query;
        self
    }

    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn distro(&self) -> &[String] {
        &self.distro
    }

    pub fn arch(&self) -> Arch {
        self.arch
    }

    pub fn plugin_path(&self, name: &str) -> PathBuf {
        self.root.join(self.arch.bin_name(name))
    }

    pub fn test_plugin_path(&self, name: &str) -> PathBuf {
        self.root.join(TEST_DIR).join(self.arch.test_bin_name(name))
    }

    /// Describe every installed plugin.
    ///
    /// One binary that cannot describe itself fails the whole listing.
    pub async fn list(&self) -> Result<Vec<PluginDescriptor>> {
        self.list_excluding(&[]).await
    }

    /// Like [`Catalog::list`], skipping the named plugins.
    pub async fn list_excluding(&self, exclude: &[&str]) -> Result<Vec<PluginDescriptor>> {
        let names = installed_names(&self.root, plugin_name_from_bin).await?;
        let mut descriptors = Vec::with_capacity(names.len());
        for name in names {
            if exclude.contains(&name.as_str()) {
                continue;
            }
            descriptors.push(self.describe(&name).await?);
        }
        Ok(descriptors)
    }

    /// Describe one installed plugin by running it.
    pub async fn describe(&self, name: &str) -> Result<PluginDescriptor> {
        let path = self.plugin_path(name);
        if !path.is_file() {
            return Err(PluginError::not_found("plugin", name));
        }
        self.query.describe(name, &path).await
    }

    /// Fetch a plugin from `repo` and install it, replacing any earlier binary.
    pub async fn install(&self, name: &str, version: &str, repo: &dyn Repository) -> Result<()> {
        if name == CORE_NAME {
            return Err(PluginError::CoreNotInstallable);
        }
        tracing::info!(plugin = name, version, repo = repo.name(), "installing plugin");

        let bytes = repo.fetch(name, version, self.arch).await?;
        let path = self.plugin_path(name);
        write_executable(&path, bytes).await?;
        tracing::debug!(plugin = name, path = %path.display(), "installed plugin");

        self.initialize(name).await;
        Ok(())
    }

    /// Run the plugin's `post-install` step. Failures are logged, never returned.
    pub async fn initialize(&self, name: &str) {
        if let Err(e) = self.query.initialize(name, &self.plugin_path(name)).await {
            tracing::warn!(plugin = name, error = %e, "failed to initialize plugin after installation");
        }
    }

    pub async fn upgrade(&self, name: &str, version: &str, repo: &dyn Repository) -> Result<()> {
        self.install(name, version, repo).await
    }

    /// Install every plugin `repo` publishes at the version its selector picks.
    pub async fn install_all(&self, repo: Arc<dyn Repository>) -> Result<()> {
        let plugins = repo.list().await?;
        let selector = repo.version_selector();

        let mut seen = HashSet::new();
        let mut jobs = Vec::with_capacity(plugins.len());
        for plugin in plugins {
            if plugin.name == CORE_NAME || !seen.insert(plugin.name.clone()) {
                continue;
            }
            let version = plugin.find_version(selector);
            if version.is_empty() {
                return Err(PluginError::NoSuitableVersion {
                    name: plugin.name,
                    versions: plugin.versions,
                });
            }
            jobs.push((plugin.name, version));
        }

        self.fan_out(jobs, move |catalog, name, version| {
            let repo = repo.clone();
            async move { catalog.install(&name, &version, repo.as_ref()).await }
        })
        .await
    }

    /// [`Catalog::install_all`] for each repository in order. Later
    /// repositories overwrite plugins an earlier one also published.
    pub async fn install_all_multi(&self, repos: &MultiRepo) -> Result<()> {
        for repo in repos.repositories() {
            self.install_all(repo.clone()).await?;
        }
        Ok(())
    }

    /// Make sure every distro plugin is installed.
    ///
    /// Missing plugins are installed concurrently at `latest` from whichever
    /// repository lists them first. The first failure is returned and the
    /// remaining installers are cancelled.
    pub async fn ensure_distro(&self, repos: &MultiRepo) -> Result<()> {
        let installed: HashSet<String> = self.list().await?.into_iter().map(|d| d.name).collect();

        let mut seen = HashSet::new();
        let jobs: Vec<(String, String)> = self
            .distro
            .iter()
            .filter(|name| !installed.contains(*name) && seen.insert(name.as_str()))
            .map(|name| (name.clone(), VERSION_LATEST.to_string()))
            .collect();
        if jobs.is_empty() {
            tracing::debug!("distro already satisfied");
            return Ok(());
        }

        let repos = repos.clone();
        self.fan_out(jobs, move |catalog, name, version| {
            let repos = repos.clone();
            async move {
                let repo = repos.find(&name).await?;
                catalog.install(&name, &version, repo.as_ref()).await
            }
        })
        .await
    }

    /// True if every distro plugin appears in `descriptors`.
    pub fn is_distribution_satisfied(&self, descriptors: &[PluginDescriptor]) -> bool {
        self.distro
            .iter()
            .all(|name| descriptors.iter().any(|d| &d.name == name))
    }

    /// Remove an installed plugin binary.
    pub async fn delete(&self, name: &str) -> Result<()> {
        let path = self.plugin_path(name);
        fs::remove_file(&path)
            .await
            .map_err(|e| PluginError::io("remove", path, e))?;
        tracing::info!(plugin = name, "deleted plugin");
        Ok(())
    }

    /// Remove every plugin and test binary.
    pub async fn clean(&self) -> Result<()> {
        match fs::remove_dir_all(&self.root).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(PluginError::io("remove", &self.root, e)),
        }
        ensure_dir(&self.root.join(TEST_DIR))
    }

    /// Fetch and install the test binary for a plugin.
    pub async fn install_test(&self, name: &str, version: &str, repo: &dyn Repository) -> Result<()> {
        let bytes = repo.fetch_test(name, version, self.arch).await?;
        write_executable(&self.test_plugin_path(name), bytes).await
    }

    pub async fn list_tests(&self) -> Result<Vec<PluginDescriptor>> {
        let names = installed_names(&self.root.join(TEST_DIR), plugin_name_from_test_bin).await?;
        let mut descriptors = Vec::with_capacity(names.len());
        for name in names {
            descriptors.push(self.describe_test(&name).await?);
        }
        Ok(descriptors)
    }

    pub async fn describe_test(&self, name: &str) -> Result<PluginDescriptor> {
        let path = self.test_plugin_path(name);
        if !path.is_file() {
            return Err(PluginError::not_found("test plugin", name));
        }
        self.query.describe(name, &path).await
    }

    /// Install the test binary for `plugin` unless one built from the same
    /// commit is already present. Install failures are logged, not returned.
    pub async fn ensure_test(&self, plugin: &PluginDescriptor, repos: &MultiRepo) -> Result<()> {
        if let Ok(test) = self.describe_test(&plugin.name).await {
            if test.build_sha == plugin.build_sha {
                return Ok(());
            }
        }
        let repo = repos.find(&plugin.name).await?;
        tracing::info!(plugin = %plugin.name, "installing test for plugin");
        if let Err(e) = self
            .install_test(&plugin.name, &plugin.version, repo.as_ref())
            .await
        {
            tracing::warn!(plugin = %plugin.name, error = %e, "could not install test for plugin");
        }
        Ok(())
    }

    pub async fn ensure_tests(&self, repos: &MultiRepo, exclude: &[&str]) -> Result<()> {
        for plugin in self.list_excluding(exclude).await? {
            self.ensure_test(&plugin, repos).await?;
        }
        Ok(())
    }

    /// A runner for an installed plugin.
    pub fn runner(&self, name: &str, args: Vec<String>) -> Runner {
        Runner::new(name, self.plugin_path(name), args).with_test_path(self.test_plugin_path(name))
    }

    /// Run `job` for every `(name, version)` pair with bounded concurrency.
    ///
    /// Returns the first error. Once an error is seen the cancellation token
    /// fires and outstanding workers are aborted.
    async fn fan_out<F, Fut>(&self, jobs: Vec<(String, String)>, job: F) -> Result<()>
    where
        F: Fn(Catalog, String, String) -> Fut,
        Fut: std::future::Future<Output = Result<()>> + Send + 'static,
    {
        let token = CancellationToken::new();
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut workers = JoinSet::new();

        for (name, version) in jobs {
            let work = job(self.clone(), name.clone(), version);
            let token = token.clone();
            let semaphore = semaphore.clone();

            workers.spawn(async move {
                let permit = tokio::select! {
                    permit = semaphore.acquire_owned() => permit.ok(),
                    _ = token.cancelled() => None,
                };
                let Some(_permit) = permit else {
                    return Err(PluginError::Cancelled);
                };
                tokio::select! {
                    result = work => result.map(|()| name),
                    _ = token.cancelled() => Err(PluginError::Cancelled),
                }
            });
        }

        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(Ok(name)) => tracing::debug!(plugin = %name, "done installing"),
                Ok(Err(e)) => {
                    tracing::error!(error = %e, "plugin install failed, cancelling remaining installs");
                    token.cancel();
                    workers.abort_all();
                    return Err(e);
                }
                Err(join_error) if join_error.is_cancelled() => {}
                Err(join_error) => {
                    token.cancel();
                    workers.abort_all();
                    return Err(PluginError::WorkerFailed(join_error.to_string()));
                }
            }
        }
        Ok(())
    }
}

fn ensure_dir(dir: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        std::fs::DirBuilder::new()
            .recursive(true)
            .mode(0o755)
            .create(dir)
            .map_err(|e| PluginError::io("create directory", dir, e))
    }
    #[cfg(not(unix))]
    {
        std::fs::create_dir_all(dir).map_err(|e| PluginError::io("create directory", dir, e))
    }
}

/// Plugin names of the non-directory entries in `dir`, sorted.
async fn installed_names(dir: &Path, name_of: fn(&str) -> Option<&str>) -> Result<Vec<String>> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(dir = %dir.display(), "no plugins currently found");
            return Ok(Vec::new());
        }
        Err(e) => return Err(PluginError::io("read directory", dir, e)),
    };

    let mut names = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| PluginError::io("read directory", dir, e))?
    {
        let file_type = entry
            .file_type()
            .await
            .map_err(|e| PluginError::io("stat", entry.path(), e))?;
        if file_type.is_dir() {
            continue;
        }
        let file_name = entry.file_name();
        let file_name = file_name.to_string_lossy();
        match name_of(&file_name) {
            Some(name) => names.push(name.to_string()),
            None => tracing::debug!(file = %file_name, "ignoring non-plugin file"),
        }
    }
    names.sort();
    Ok(names)
}

/// Write `bytes` as an executable at `path`.
///
/// The data lands in a uniquely named temp file next to `path` first and is
/// renamed over it, so a concurrent reader never sees a partial binary and
/// concurrent writers of the same plugin never share a temp file.
async fn write_executable(path: &Path, bytes: Vec<u8>) -> Result<()> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || persist_executable(&path, &bytes))
        .await
        .map_err(|e| PluginError::WorkerFailed(e.to_string()))?
}

fn persist_executable(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::Builder::new()
        .prefix(".tanzu-install-")
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(|e| PluginError::io("create temp file in", dir, e))?;

    tmp.write_all(bytes)
        .and_then(|()| tmp.as_file().sync_all())
        .map_err(|e| PluginError::io("could not write file", tmp.path(), e))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tmp.as_file()
            .set_permissions(std::fs::Permissions::from_mode(0o755))
            .map_err(|e| PluginError::io("chmod", tmp.path(), e))?;
    }

    tmp.persist(path)
        .map_err(|e| PluginError::io("rename", path, e.error))?;
    Ok(())
}
