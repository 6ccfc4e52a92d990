use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use super::lock::{ConfigLock, DEFAULT_LOCK_TIMEOUT};
use crate::error::{PluginError, Result};
use crate::plugins::catalog::DEFAULT_DISTRO;
use crate::plugins::repository::{
    COMMUNITY_BUCKET_NAME, COMMUNITY_REPOSITORY_NAME, DEFAULT_ARTIFACTS_DIRECTORY,
};
use crate::plugins::version::VersionSelector;

/// Environment variable overriding the config file location.
pub const CONFIG_ENV: &str = "TANZU_CONFIG";

/// Config path accepted by `config set` for the unstable version level.
pub const UNSTABLE_VERSIONS_PATH: &str = "unstable-versions";

/// The persisted client configuration (`config.yaml`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    /// Name of the active server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub servers: Vec<Server>,

    #[serde(default)]
    pub client_options: ClientOptions,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientOptions {
    #[serde(default)]
    pub cli: CliOptions,

    /// Plugin feature flags: plugin name, then flag name, then value
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub features: BTreeMap<String, BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CliOptions {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub repositories: Vec<PluginRepository>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub discovery_sources: Vec<DiscoverySource>,

    #[serde(default)]
    pub unstable_version_selector: VersionSelectorLevel,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distro: Option<Vec<String>>,
}

/// One configured repository. Exactly one of the fields is expected to be set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginRepository {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gcp_plugin_repository: Option<GcpRepositoryConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_plugin_repository: Option<LocalRepositoryConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GcpRepositoryConfig {
    pub name: String,
    pub bucket_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalRepositoryConfig {
    pub name: String,
    pub path: String,
}

impl PluginRepository {
    pub fn gcp(name: impl Into<String>, bucket_name: impl Into<String>, root_path: Option<String>) -> Self {
        Self {
            gcp_plugin_repository: Some(GcpRepositoryConfig {
                name: name.into(),
                bucket_name: bucket_name.into(),
                root_path,
            }),
            local_plugin_repository: None,
        }
    }

    pub fn local(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            gcp_plugin_repository: None,
            local_plugin_repository: Some(LocalRepositoryConfig {
                name: name.into(),
                path: path.into(),
            }),
        }
    }

    /// The built-in community bucket.
    pub fn community() -> Self {
        Self::gcp(
            COMMUNITY_REPOSITORY_NAME,
            COMMUNITY_BUCKET_NAME,
            Some(DEFAULT_ARTIFACTS_DIRECTORY.to_string()),
        )
    }

    pub fn name(&self) -> Option<&str> {
        self.gcp_plugin_repository
            .as_ref()
            .map(|r| r.name.as_str())
            .or_else(|| self.local_plugin_repository.as_ref().map(|r| r.name.as_str()))
    }

    /// Where the repository lives, for display.
    pub fn location(&self) -> String {
        if let Some(gcp) = &self.gcp_plugin_repository {
            match gcp.root_path.as_deref() {
                Some(root) if !root.is_empty() => format!("gs://{}/{}", gcp.bucket_name, root),
                _ => format!("gs://{}", gcp.bucket_name),
            }
        } else if let Some(local) = &self.local_plugin_repository {
            local.path.clone()
        } else {
            String::new()
        }
    }
}

/// A plugin discovery source. Exactly one of the fields is expected to be set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiscoverySource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local: Option<LocalDiscovery>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oci: Option<OciDiscovery>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalDiscovery {
    pub name: String,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OciDiscovery {
    pub name: String,
    pub image: String,
}

impl DiscoverySource {
    pub fn local(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            local: Some(LocalDiscovery {
                name: name.into(),
                path: path.into(),
            }),
            oci: None,
        }
    }

    pub fn oci(name: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            local: None,
            oci: Some(OciDiscovery {
                name: name.into(),
                image: image.into(),
            }),
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.local
            .as_ref()
            .map(|s| s.name.as_str())
            .or_else(|| self.oci.as_ref().map(|s| s.name.as_str()))
    }

    pub fn kind(&self) -> &'static str {
        if self.local.is_some() {
            "local"
        } else if self.oci.is_some() {
            "oci"
        } else {
            "unknown"
        }
    }

    pub fn location(&self) -> &str {
        self.local
            .as_ref()
            .map(|s| s.path.as_str())
            .or_else(|| self.oci.as_ref().map(|s| s.image.as_str()))
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerType {
    ManagementCluster,
    Global,
}

impl fmt::Display for ServerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ManagementCluster => write!(f, "managementcluster"),
            Self::Global => write!(f, "global"),
        }
    }
}

/// A server the CLI can target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Server {
    pub name: String,

    #[serde(rename = "type")]
    pub server_type: ServerType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

/// How far into pre-releases `latest` may reach.
///
/// Unknown values in the config file read as [`VersionSelectorLevel::None`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionSelectorLevel {
    #[default]
    None,
    Alpha,
    Experimental,
    All,
}

impl From<VersionSelectorLevel> for VersionSelector {
    fn from(level: VersionSelectorLevel) -> Self {
        match level {
            VersionSelectorLevel::None => VersionSelector::Stable,
            VersionSelectorLevel::Alpha => VersionSelector::Alpha,
            VersionSelectorLevel::Experimental => VersionSelector::Experimental,
            VersionSelectorLevel::All => VersionSelector::Any,
        }
    }
}

impl FromStr for VersionSelectorLevel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "alpha" => Ok(Self::Alpha),
            "experimental" => Ok(Self::Experimental),
            "all" => Ok(Self::All),
            other => Err(format!(
                "unknown version selector level {:?}, expected none, alpha, experimental or all",
                other
            )),
        }
    }
}

impl<'de> Deserialize<'de> for VersionSelectorLevel {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?.unwrap_or_default();
        if raw.is_empty() {
            return Ok(Self::default());
        }
        Ok(raw.parse().unwrap_or_else(|e: String| {
            tracing::warn!(error = %e, "falling back to stable versions");
            Self::default()
        }))
    }
}

impl fmt::Display for VersionSelectorLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::None => "none",
            Self::Alpha => "alpha",
            Self::Experimental => "experimental",
            Self::All => "all",
        };
        f.write_str(s)
    }
}

impl ClientConfig {
    /// `$TANZU_CONFIG`, else `~/.config/tanzu/config.yaml`.
    pub fn path() -> Result<PathBuf> {
        if let Some(path) = std::env::var_os(CONFIG_ENV).filter(|p| !p.is_empty()) {
            return Ok(PathBuf::from(path));
        }
        let home = dirs::home_dir().ok_or_else(|| PluginError::not_found("directory", "home"))?;
        Ok(home.join(".config").join("tanzu").join("config.yaml"))
    }

    /// Read the config at `path`. A missing file is an empty config.
    pub fn load(path: &Path) -> Result<Self> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no client config, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(PluginError::io("read", path, e)),
        };
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&content).map_err(|e| PluginError::decode(path.display().to_string(), e))
    }

    /// Write the config to `path`.
    ///
    /// The file is replaced by renaming a fully written sibling over it, so
    /// readers that skip the lock see either the old or the new config.
    pub fn save(&self, path: &Path) -> Result<()> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir).map_err(|e| PluginError::io("create directory", dir, e))?;
        let content = serde_yaml::to_string(self)
            .map_err(|e| PluginError::decode(path.display().to_string(), e))?;

        let mut tmp = tempfile::Builder::new()
            .prefix(".config-")
            .suffix(".tmp")
            .tempfile_in(dir)
            .map_err(|e| PluginError::io("create temp file in", dir, e))?;
        tmp.write_all(content.as_bytes())
            .and_then(|()| tmp.as_file().sync_all())
            .map_err(|e| PluginError::io("write", tmp.path(), e))?;
        tmp.persist(path)
            .map_err(|e| PluginError::io("write", path, e.error))?;
        Ok(())
    }

    /// Read-modify-write the config under its file lock.
    pub async fn update<F, T>(path: &Path, f: F) -> Result<T>
    where
        F: FnOnce(&mut ClientConfig) -> Result<T>,
    {
        Self::update_with_timeout(path, DEFAULT_LOCK_TIMEOUT, f).await
    }

    pub async fn update_with_timeout<F, T>(path: &Path, timeout: Duration, f: F) -> Result<T>
    where
        F: FnOnce(&mut ClientConfig) -> Result<T>,
    {
        let _lock = ConfigLock::acquire_with_timeout(path, timeout).await?;
        let mut config = Self::load(path)?;
        let out = f(&mut config)?;
        config.save(path)?;
        Ok(out)
    }

    /// Configured repositories, or the community repository if there are none.
    pub fn repositories(&self) -> Vec<PluginRepository> {
        if self.client_options.cli.repositories.is_empty() {
            vec![PluginRepository::community()]
        } else {
            self.client_options.cli.repositories.clone()
        }
    }

    pub fn add_repository(&mut self, repo: PluginRepository) -> Result<()> {
        let name = repo.name().unwrap_or_default().to_string();
        if self
            .client_options
            .cli
            .repositories
            .iter()
            .any(|r| r.name() == Some(name.as_str()))
        {
            return Err(PluginError::AlreadyExists { kind: "repository", name });
        }
        self.client_options.cli.repositories.push(repo);
        Ok(())
    }

    /// Remove every repository called `name`.
    pub fn remove_repository(&mut self, name: &str) -> Result<()> {
        let repos = &mut self.client_options.cli.repositories;
        let before = repos.len();
        repos.retain(|r| r.name() != Some(name));
        if repos.len() == before {
            return Err(PluginError::not_found("repository", name));
        }
        Ok(())
    }

    pub fn discovery_sources(&self) -> &[DiscoverySource] {
        &self.client_options.cli.discovery_sources
    }

    pub fn add_discovery_source(&mut self, source: DiscoverySource) -> Result<()> {
        let name = source.name().unwrap_or_default().to_string();
        let sources = &mut self.client_options.cli.discovery_sources;
        if sources.iter().any(|s| s.name() == Some(name.as_str())) {
            return Err(PluginError::AlreadyExists {
                kind: "discovery source",
                name,
            });
        }
        sources.push(source);
        Ok(())
    }

    pub fn remove_discovery_source(&mut self, name: &str) -> Result<()> {
        let sources = &mut self.client_options.cli.discovery_sources;
        let before = sources.len();
        sources.retain(|s| s.name() != Some(name));
        if sources.len() == before {
            return Err(PluginError::not_found("discovery source", name));
        }
        Ok(())
    }

    /// Configured distro, or the default plugin set.
    pub fn distro(&self) -> Vec<String> {
        match &self.client_options.cli.distro {
            Some(distro) => distro.clone(),
            None => DEFAULT_DISTRO.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn version_selector_level(&self) -> VersionSelectorLevel {
        self.client_options.cli.unstable_version_selector
    }

    pub fn version_selector(&self) -> VersionSelector {
        self.version_selector_level().into()
    }

    pub fn set_feature(&mut self, plugin: &str, flag: &str, value: &str) {
        self.client_options
            .features
            .entry(plugin.to_string())
            .or_default()
            .insert(flag.to_string(), value.to_string());
    }

    pub fn is_feature_enabled(&self, plugin: &str, flag: &str) -> bool {
        self.client_options
            .features
            .get(plugin)
            .and_then(|flags| flags.get(flag))
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    }

    /// Apply `config set <path> <value>`.
    ///
    /// Accepted paths are `features.<plugin>.<flag>` and `unstable-versions`.
    pub fn set_path(&mut self, path: &str, value: &str) -> Result<()> {
        if path == UNSTABLE_VERSIONS_PATH {
            let level = value
                .parse::<VersionSelectorLevel>()
                .map_err(|_| PluginError::InvalidConfigPath(format!("{}={}", path, value)))?;
            self.client_options.cli.unstable_version_selector = level;
            return Ok(());
        }

        let parts: Vec<&str> = path.split('.').collect();
        match parts.as_slice() {
            ["features", plugin, flag] if !plugin.is_empty() && !flag.is_empty() => {
                self.set_feature(plugin, flag, value);
                Ok(())
            }
            _ => Err(PluginError::InvalidConfigPath(path.to_string())),
        }
    }

    /// Remove a server, clearing `current` if it pointed at it.
    pub fn remove_server(&mut self, name: &str) -> Result<()> {
        let before = self.servers.len();
        self.servers.retain(|s| s.name != name);
        if self.servers.len() == before {
            return Err(PluginError::not_found("server", name));
        }
        if self.current.as_deref() == Some(name) {
            self.current = None;
        }
        Ok(())
    }

    pub fn current_server(&self) -> Option<&Server> {
        let current = self.current.as_deref()?;
        self.servers.iter().find(|s| s.name == current)
    }
}
