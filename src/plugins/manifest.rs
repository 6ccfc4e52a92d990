// ============================================
// TANZU CLI - Repository Manifest
// ============================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::version::VersionSelector;

/// Inventory file (`manifest.yaml`) at the root of a repository.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    /// When the manifest was published
    #[serde(default, rename = "created", skip_serializing_if = "Option::is_none")]
    pub created_time: Option<DateTime<Utc>>,

    #[serde(default)]
    pub plugins: Vec<Plugin>,

    /// Deprecated alias of `core_version`, still written by older publishers
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub core_version: String,
}

impl Manifest {
    pub fn from_yaml(content: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(content)
    }

    /// Version of the core CLI, honouring the legacy `version` field first.
    pub fn core_version(&self) -> &str {
        if !self.version.is_empty() {
            &self.version
        } else {
            &self.core_version
        }
    }

    pub fn contains(&self, plugin: &str) -> bool {
        self.plugins.iter().any(|p| p.name == plugin)
    }
}

/// A plugin as a repository sees it: one name, many published versions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plugin {
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub versions: Vec<String>,
}

impl Plugin {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            versions: Vec::new(),
        }
    }

    pub fn with_versions<I, S>(mut self, versions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.versions = versions.into_iter().map(Into::into).collect();
        self
    }

    /// Apply a selector to the published versions.
    pub fn find_version(&self, selector: VersionSelector) -> String {
        selector.select(&self.versions)
    }
}
