use anyhow::{Context, Result};
use std::path::PathBuf;

use crate::config::ClientConfig;
use crate::plugins::{load_repositories, Catalog, MultiRepo};
use crate::ui::Console;

const PLUGIN_ROOT_DIR: &str = "tanzu-cli";

/// Everything a command handler needs, built once per invocation.
pub struct AppContext {
    pub config_path: PathBuf,
    pub config: ClientConfig,
    pub catalog: Catalog,
    pub repos: MultiRepo,
    pub console: Console,
}

impl AppContext {
    pub fn load(plugin_root: Option<PathBuf>) -> Result<Self> {
        let config_path = ClientConfig::path().context("Could not determine config path")?;
        let config = ClientConfig::load(&config_path)
            .with_context(|| format!("Failed to load config {}", config_path.display()))?;

        let root = match plugin_root {
            Some(root) => root,
            None => dirs::data_dir()
                .context("Could not determine data directory")?
                .join(PLUGIN_ROOT_DIR),
        };
        let catalog = Catalog::new(&root, config.distro())
            .with_context(|| format!("Failed to open plugin root {}", root.display()))?;

        let repos = MultiRepo::new(load_repositories(
            &config.repositories(),
            config.version_selector_level(),
        ));

        tracing::debug!(
            config = %config_path.display(),
            root = %root.display(),
            repositories = repos.repositories().len(),
            "loaded context"
        );

        Ok(Self {
            config_path,
            config,
            catalog,
            repos,
            console: Console::new(),
        })
    }
}
