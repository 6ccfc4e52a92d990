// ============================================
// TANZU CLI - Object Store (GCS) Repository
// ============================================

//! Repository backed by a public Google Cloud Storage bucket.
//!
//! Requests go to the anonymous GCS JSON API, so no credentials are needed.
//! The endpoint is configurable which also allows pointing at an emulator.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::time::Duration;
use url::Url;

use super::{
    resolve_version, Repository, COMMUNITY_BUCKET_NAME, COMMUNITY_REPOSITORY_NAME,
    DEFAULT_ARTIFACTS_DIRECTORY, DEFAULT_MANIFEST_QUERY_TIMEOUT, MANIFEST_FILE_NAME,
    PLUGIN_FILE_NAME, TEST_DIRECTORY,
};
use crate::error::{PluginError, Result};
use crate::plugins::arch::Arch;
use crate::plugins::manifest::{Manifest, Plugin};
use crate::plugins::version::VersionSelector;

pub const DEFAULT_GCS_ENDPOINT: &str = "https://storage.googleapis.com";

/// Construction options for [`GcpBucketRepository`].
#[derive(Debug, Clone)]
pub struct GcpRepositoryOptions {
    pub name: String,
    pub bucket_name: String,
    pub root_path: String,
    pub endpoint: String,
    pub version_selector: VersionSelector,
    pub manifest_timeout: Duration,
}

impl GcpRepositoryOptions {
    pub fn new(name: impl Into<String>, bucket_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bucket_name: bucket_name.into(),
            root_path: DEFAULT_ARTIFACTS_DIRECTORY.to_string(),
            endpoint: DEFAULT_GCS_ENDPOINT.to_string(),
            version_selector: VersionSelector::default(),
            manifest_timeout: DEFAULT_MANIFEST_QUERY_TIMEOUT,
        }
    }

    /// The public community repository.
    pub fn community() -> Self {
        Self::new(COMMUNITY_REPOSITORY_NAME, COMMUNITY_BUCKET_NAME)
    }

    pub fn with_root_path(mut self, root_path: impl Into<String>) -> Self {
        self.root_path = root_path.into();
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_version_selector(mut self, selector: VersionSelector) -> Self {
        self.version_selector = selector;
        self
    }

    pub fn with_manifest_timeout(mut self, timeout: Duration) -> Self {
        self.manifest_timeout = timeout;
        self
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectList {
    #[serde(default)]
    items: Vec<ObjectItem>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ObjectItem {
    name: String,
}

/// Artifact repository living in a GCS bucket.
pub struct GcpBucketRepository {
    options: GcpRepositoryOptions,
    client: reqwest::Client,
}

impl GcpBucketRepository {
    pub fn new(options: GcpRepositoryOptions) -> Self {
        Self {
            options,
            client: reqwest::Client::new(),
        }
    }

    pub fn bucket_name(&self) -> &str {
        &self.options.bucket_name
    }

    pub fn root_path(&self) -> &str {
        &self.options.root_path
    }

    /// Object key below the repository root.
    fn object_path(&self, parts: &[&str]) -> String {
        std::iter::once(self.options.root_path.trim_matches('/'))
            .chain(parts.iter().copied())
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join("/")
    }

    fn objects_url(&self) -> Result<Url> {
        let mut url = Url::parse(&self.options.endpoint)
            .map_err(|e| PluginError::transport("parse endpoint", &self.options.endpoint, e))?;
        url.path_segments_mut()
            .map_err(|_| {
                PluginError::transport("parse endpoint", &self.options.endpoint, "endpoint cannot be a base URL")
            })?
            .pop_if_empty()
            .extend(["storage", "v1", "b", self.options.bucket_name.as_str(), "o"]);
        Ok(url)
    }

    fn media_url(&self, object: &str) -> Result<Url> {
        let mut url = self.objects_url()?;
        url.path_segments_mut()
            .map_err(|_| PluginError::transport("build url", object, "endpoint cannot be a base URL"))?
            .push(object);
        url.query_pairs_mut().append_pair("alt", "media");
        Ok(url)
    }

    /// Read a whole object, mapping 404 onto a not-found error of `kind`.
    async fn read_object(&self, object: &str, kind: &'static str, name: &str) -> Result<Vec<u8>> {
        let url = self.media_url(object)?;
        tracing::debug!(bucket = %self.options.bucket_name, object, "fetching object");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| PluginError::transport("read object", object, e))?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(PluginError::not_found(kind, name)),
            status if !status.is_success() => Err(PluginError::transport(
                "read object",
                object,
                format!("repository {:?} returned {}", self.options.name, status),
            )),
            _ => {
                let bytes = response
                    .bytes()
                    .await
                    .map_err(|e| PluginError::transport("read object", object, e))?;
                Ok(bytes.to_vec())
            }
        }
    }

    /// Names of every object under `prefix`, following pagination.
    async fn list_objects(&self, prefix: &str) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut url = self.objects_url()?;
            {
                let mut query = url.query_pairs_mut();
                query.append_pair("prefix", prefix);
                query.append_pair("fields", "items(name),nextPageToken");
                if let Some(token) = &page_token {
                    query.append_pair("pageToken", token);
                }
            }

            let response = self
                .client
                .get(url)
                .send()
                .await
                .map_err(|e| PluginError::transport("list objects", prefix, e))?;
            let status = response.status();
            if !status.is_success() {
                return Err(PluginError::transport(
                    "list objects",
                    prefix,
                    format!("repository {:?} returned {}", self.options.name, status),
                ));
            }
            let page: ObjectList = response
                .json()
                .await
                .map_err(|e| PluginError::decode(format!("object listing for {:?}", prefix), e))?;

            names.extend(page.items.into_iter().map(|item| item.name));
            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(names)
    }

    async fn read_manifest(&self) -> Result<Manifest> {
        let path = self.object_path(&[MANIFEST_FILE_NAME]);
        let bytes = self.read_object(&path, "manifest", &path).await?;
        serde_yaml::from_slice(&bytes).map_err(|e| PluginError::decode(path, e))
    }
}

/// First path segment of every object below a plugin directory.
///
/// Objects directly in the plugin directory (such as `plugin.yaml`) are not
/// versions and are skipped.
fn versions_from_objects(plugin_prefix: &str, objects: &[String]) -> Vec<String> {
    let versions: BTreeSet<String> = objects
        .iter()
        .filter_map(|object| object.strip_prefix(plugin_prefix))
        .filter_map(|rest| rest.split_once('/'))
        .map(|(version, _)| version)
        .filter(|version| !version.is_empty() && *version != PLUGIN_FILE_NAME)
        .map(str::to_string)
        .collect();
    versions.into_iter().collect()
}

#[async_trait]
impl Repository for GcpBucketRepository {
    async fn list(&self) -> Result<Vec<Plugin>> {
        let manifest = self.manifest().await?;
        let mut plugins = Vec::with_capacity(manifest.plugins.len());
        for plugin in &manifest.plugins {
            plugins.push(self.describe(&plugin.name).await?);
        }
        Ok(plugins)
    }

    async fn describe(&self, name: &str) -> Result<Plugin> {
        let descriptor_path = self.object_path(&[name, PLUGIN_FILE_NAME]);
        let bytes = self.read_object(&descriptor_path, "plugin", name).await?;
        let mut plugin: Plugin = serde_yaml::from_slice(&bytes)
            .map_err(|e| PluginError::decode(descriptor_path.clone(), e))?;

        let prefix = format!("{}/", self.object_path(&[name]));
        let objects = self.list_objects(&prefix).await?;
        plugin.versions = versions_from_objects(&prefix, &objects);
        Ok(plugin)
    }

    async fn fetch(&self, name: &str, version: &str, arch: Arch) -> Result<Vec<u8>> {
        let version = resolve_version(self, name, version).await?;
        let path = self.object_path(&[name, &version, &arch.artifact_name(name)]);
        self.read_object(&path, "artifact", &path).await
    }

    async fn fetch_test(&self, name: &str, version: &str, arch: Arch) -> Result<Vec<u8>> {
        let version = resolve_version(self, name, version).await?;
        let path = self.object_path(&[name, &version, TEST_DIRECTORY, &arch.test_artifact_name(name)]);
        self.read_object(&path, "test artifact", &path).await
    }

    async fn manifest(&self) -> Result<Manifest> {
        let timeout = self.options.manifest_timeout;
        tokio::time::timeout(timeout, self.read_manifest())
            .await
            .map_err(|_| PluginError::Timeout {
                what: format!("manifest query for repository {:?}", self.options.name),
                after: timeout,
            })?
    }

    fn name(&self) -> &str {
        &self.options.name
    }

    fn version_selector(&self) -> VersionSelector {
        self.options.version_selector
    }
}
