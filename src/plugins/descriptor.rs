// ============================================
// TANZU CLI - Plugin Descriptor
// ============================================

use serde::{Deserialize, Serialize};

use super::version::{compare_versions, is_valid_version};
use crate::error::{PluginError, Result};

/// Self-description a plugin publishes, both as `plugin.yaml` in a
/// repository and as the JSON printed by `<binary> info`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginDescriptor {
    pub name: String,

    pub description: String,

    /// Semantic version of the plugin
    pub version: String,

    /// Command group the plugin is listed under (e.g. `Run`, `Manage`, `System`)
    pub group: String,

    #[serde(default, rename = "docURL", skip_serializing_if = "Option::is_none")]
    pub doc_url: Option<String>,

    #[serde(default, rename = "buildSHA", skip_serializing_if = "String::is_empty")]
    pub build_sha: String,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub hidden: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
}

impl PluginDescriptor {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        version: impl Into<String>,
        group: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            version: version.into(),
            group: group.into(),
            doc_url: None,
            build_sha: String::new(),
            hidden: false,
            aliases: Vec::new(),
        }
    }

    pub fn from_yaml(content: &str) -> std::result::Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(content)
    }

    pub fn from_json(content: &[u8]) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_slice(content)
    }

    /// Check required fields, collecting every problem rather than the first.
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();

        if self.name.is_empty() {
            problems.push("plugin name cannot be empty".to_string());
        }
        if self.version.is_empty() {
            problems.push(format!("plugin {:?} version cannot be empty", self.name));
        } else if !is_valid_version(&self.version) {
            problems.push(format!(
                "version {:?} of plugin {:?} is not a valid semantic version",
                self.version, self.name
            ));
        }
        if self.description.is_empty() {
            problems.push(format!("plugin {:?} description cannot be empty", self.name));
        }
        if self.group.is_empty() {
            problems.push(format!("plugin {:?} group cannot be empty", self.name));
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(PluginError::InvalidDescriptor(problems))
        }
    }

    /// True if `candidate` is strictly newer than this descriptor's version.
    pub fn is_older_than(&self, candidate: &str) -> Result<bool> {
        match compare_versions(candidate, &self.version) {
            Some(ordering) => Ok(ordering.is_gt()),
            None if !is_valid_version(&self.version) => {
                Err(PluginError::InvalidVersion(self.version.clone()))
            }
            None => Err(PluginError::InvalidVersion(candidate.to_string())),
        }
    }
}
