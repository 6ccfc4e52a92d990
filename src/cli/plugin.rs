use anyhow::{bail, Context, Result};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use super::{AppContext, PluginCommands, RepoCommands, SourceCommands};
use crate::config::{ClientConfig, DiscoverySource, PluginRepository};
use crate::error::PluginError;
use crate::plugins::{LocalRepository, Repository, ALL_PLUGINS};

const LOCAL_REPOSITORY_NAME: &str = "local";

pub async fn handle(ctx: &AppContext, command: PluginCommands) -> Result<()> {
    match command {
        PluginCommands::List => {
            let installed = ctx.catalog.list().await?;
            let mut updates = BTreeMap::new();
            for plugin in &installed {
                if let Some((repo, version)) = ctx.repos.has_update_in(plugin).await? {
                    tracing::debug!(plugin = %plugin.name, repo = repo.name(), %version, "update available");
                    updates.insert(plugin.name.clone(), version);
                }
            }
            ctx.console.list_installed(&installed, &updates);
            if !ctx.catalog.is_distribution_satisfied(&installed) {
                ctx.console
                    .warn("some default plugins are missing, run `tanzu init` to install them");
            }
        }
        PluginCommands::Search => {
            let available = ctx.repos.list_plugins().await?;
            ctx.console.list_available(&available);
        }
        PluginCommands::Describe { name } => {
            let plugin = ctx.catalog.describe(&name).await.map_err(suggest_install)?;
            ctx.console.describe(&plugin);
            if let Err(e) = plugin.validate() {
                ctx.console.warn(&e.to_string());
            }
        }
        PluginCommands::Install { name, version, local } => {
            install(ctx, &name, &version, local).await?;
        }
        PluginCommands::Upgrade { name, version } => {
            let repo = ctx.repos.find(&name).await?;
            ctx.catalog.upgrade(&name, &version, repo.as_ref()).await?;
            ctx.console.success(&format!("successfully upgraded plugin {}", name));
        }
        PluginCommands::Delete { name, yes } => {
            if !yes && !ctx.console.confirm(&format!("Delete plugin {}?", name)) {
                ctx.console.info("aborted");
                return Ok(());
            }
            ctx.catalog.delete(&name).await.map_err(suggest_install)?;
            ctx.console.success(&format!("successfully deleted plugin {}", name));
        }
        PluginCommands::Clean => {
            ctx.catalog.clean().await?;
            ctx.console.success("successfully cleaned up all plugins");
        }
        PluginCommands::Repo { command } => repo(ctx, command).await?,
        PluginCommands::Source { command } => source(ctx, command).await?,
    }
    Ok(())
}

async fn install(ctx: &AppContext, name: &str, version: &str, local: Option<PathBuf>) -> Result<()> {
    if let Some(path) = local {
        let path = std::fs::canonicalize(&path)
            .with_context(|| format!("Local repository {} not found", path.display()))?;
        let repo: Arc<dyn Repository> = Arc::new(
            LocalRepository::new(LOCAL_REPOSITORY_NAME, path)
                .with_version_selector(ctx.config.version_selector()),
        );
        if name == ALL_PLUGINS {
            ctx.catalog.install_all(repo).await?;
            ctx.console.success("successfully installed all plugins");
        } else {
            ctx.catalog.install(name, version, repo.as_ref()).await?;
            ctx.console.success(&format!("successfully installed plugin {}", name));
        }
        return Ok(());
    }

    if name == ALL_PLUGINS {
        ctx.catalog.install_all_multi(&ctx.repos).await?;
        ctx.console.success("successfully installed all plugins");
        return Ok(());
    }

    let repo = ctx.repos.find(name).await?;
    ctx.catalog.install(name, version, repo.as_ref()).await?;
    ctx.console
        .success(&format!("successfully installed plugin {} from {}", name, repo.name()));
    Ok(())
}

async fn repo(ctx: &AppContext, command: RepoCommands) -> Result<()> {
    match command {
        RepoCommands::List => ctx.console.list_repositories(&ctx.config.repositories()),
        RepoCommands::Add {
            name,
            bucket,
            root_path,
            local,
        } => {
            let entry = match (bucket, local) {
                (Some(bucket), None) => PluginRepository::gcp(&name, bucket, root_path),
                (None, Some(path)) => {
                    let path = std::fs::canonicalize(&path)
                        .with_context(|| format!("Local repository {} not found", path.display()))?;
                    PluginRepository::local(&name, path.to_string_lossy())
                }
                _ => bail!("exactly one of --bucket or --local is required"),
            };
            ClientConfig::update(&ctx.config_path, |config| config.add_repository(entry)).await?;
            ctx.console.success(&format!("added repository {}", name));
        }
        RepoCommands::Delete { name } => {
            ClientConfig::update(&ctx.config_path, |config| config.remove_repository(&name)).await?;
            ctx.console.success(&format!("deleted repository {}", name));
        }
    }
    Ok(())
}

async fn source(ctx: &AppContext, command: SourceCommands) -> Result<()> {
    match command {
        SourceCommands::List => ctx.console.list_sources(ctx.config.discovery_sources()),
        SourceCommands::Add { name, local, oci } => {
            let entry = match (local, oci) {
                (Some(path), None) => DiscoverySource::local(&name, path.to_string_lossy()),
                (None, Some(image)) => DiscoverySource::oci(&name, image),
                _ => bail!("exactly one of --local or --oci is required"),
            };
            ClientConfig::update(&ctx.config_path, |config| config.add_discovery_source(entry))
                .await?;
            ctx.console.success(&format!("added discovery source {}", name));
        }
        SourceCommands::Delete { name } => {
            ClientConfig::update(&ctx.config_path, |config| config.remove_discovery_source(&name))
                .await?;
            ctx.console.success(&format!("deleted discovery source {}", name));
        }
    }
    Ok(())
}

/// Run an installed plugin with the remaining arguments.
pub async fn run_external(ctx: &AppContext, mut args: Vec<String>) -> Result<i32> {
    if args.is_empty() {
        bail!("no plugin name given");
    }
    let name = args.remove(0);
    let runner = ctx.catalog.runner(&name, args);
    let status = runner.run().await.map_err(suggest_install)?;
    Ok(status.code().unwrap_or(1))
}

/// Attach an install hint to not-found errors.
pub(super) fn suggest_install(err: PluginError) -> anyhow::Error {
    if err.is_not_found() {
        let hint = match &err {
            PluginError::NotFound { name, .. } => format!("try `tanzu plugin install {}`", name),
            _ => "try `tanzu plugin install`".to_string(),
        };
        anyhow::Error::new(err).context(hint)
    } else {
        err.into()
    }
}
