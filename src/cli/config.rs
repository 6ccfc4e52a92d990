use anyhow::Result;

use super::{AppContext, ConfigCommands, ServerCommands};
use crate::config::{ClientConfig, PluginRepository};

pub async fn handle(ctx: &AppContext, command: ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Get => ctx.console.show_config(&ctx.config, &ctx.config_path),
        ConfigCommands::Init => {
            ClientConfig::update(&ctx.config_path, |config| {
                let distro = config.distro();
                let cli = &mut config.client_options.cli;
                if cli.repositories.is_empty() {
                    cli.repositories.push(PluginRepository::community());
                }
                if cli.distro.is_none() {
                    cli.distro = Some(distro);
                }
                Ok(())
            })
            .await?;
            for plugin in ctx.catalog.list().await? {
                ctx.catalog.initialize(&plugin.name).await;
            }
            ctx.console.success(&format!(
                "config initialized at {}",
                ctx.config_path.display()
            ));
        }
        ConfigCommands::Set { path, value } => {
            ClientConfig::update(&ctx.config_path, |config| config.set_path(&path, &value)).await?;
            ctx.console.success(&format!("set {} to {}", path, value));
        }
        ConfigCommands::Server { command } => match command {
            ServerCommands::List => ctx.console.list_servers(&ctx.config),
            ServerCommands::Delete { name, yes } => {
                if !yes && !ctx.console.confirm(&format!("Delete server {}?", name)) {
                    ctx.console.info("aborted");
                    return Ok(());
                }
                ClientConfig::update(&ctx.config_path, |config| config.remove_server(&name)).await?;
                ctx.console.success(&format!("deleted server {}", name));
            }
        },
    }
    Ok(())
}
