use colored::Colorize;
use std::collections::BTreeMap;
use std::path::Path;

use crate::config::{ClientConfig, DiscoverySource, PluginRepository};
use crate::plugins::{Plugin, PluginDescriptor};

pub struct Console;

impl Console {
    pub fn new() -> Self {
        Self
    }

    pub fn info(&self, message: &str) {
        println!("{} {}", "[INFO]".blue(), message);
    }

    pub fn warn(&self, message: &str) {
        eprintln!("{} {}", "[WARN]".yellow(), message);
    }

    pub fn error(&self, message: &str) {
        eprintln!("{} {}", "[ERROR]".red(), message);
    }

    pub fn success(&self, message: &str) {
        println!("{} {}", "[OK]".green(), message);
    }

    /// Installed plugins, with an update marker where one is known.
    pub fn list_installed(&self, plugins: &[PluginDescriptor], updates: &BTreeMap<String, String>) {
        println!("\n{}", "INSTALLED PLUGINS".bold().underline());
        println!("{}", "─".repeat(60));
        if plugins.is_empty() {
            println!("  {}", "no plugins installed".dimmed());
        }
        for plugin in plugins.iter().filter(|p| !p.hidden) {
            let update = updates
                .get(&plugin.name)
                .map(|v| format!(" (update available: {})", v).yellow().to_string())
                .unwrap_or_default();
            println!(
                "  {} {} {}{}",
                "•".cyan(),
                plugin.name.cyan().bold(),
                plugin.version.dimmed(),
                update
            );
            println!("    {}", plugin.description);
        }
        println!();
    }

    /// Plugins each repository publishes.
    pub fn list_available(&self, by_repo: &BTreeMap<String, Vec<Plugin>>) {
        for (repo, plugins) in by_repo {
            println!("\n{} {}", "REPOSITORY".bold().underline(), repo.green().bold());
            println!("{}", "─".repeat(60));
            for plugin in plugins {
                println!(
                    "  {} {} {}",
                    "•".cyan(),
                    plugin.name.cyan().bold(),
                    format!("[{}]", plugin.versions.join(", ")).dimmed()
                );
                if !plugin.description.is_empty() {
                    println!("    {}", plugin.description);
                }
            }
        }
        println!();
    }

    pub fn describe(&self, plugin: &PluginDescriptor) {
        println!("\n{}", plugin.name.bold().underline());
        println!("  {} {}", "Description:".yellow(), plugin.description);
        println!("  {} {}", "Version:".yellow(), plugin.version);
        println!("  {} {}", "Group:".yellow(), plugin.group);
        if !plugin.build_sha.is_empty() {
            println!("  {} {}", "Build SHA:".yellow(), plugin.build_sha.dimmed());
        }
        if let Some(url) = &plugin.doc_url {
            println!("  {} {}", "Docs:".yellow(), url);
        }
        if !plugin.aliases.is_empty() {
            println!("  {} {}", "Aliases:".yellow(), plugin.aliases.join(", "));
        }
        println!();
    }

    pub fn list_repositories(&self, repos: &[PluginRepository]) {
        println!("\n{}", "REPOSITORIES".bold().underline());
        println!("{}", "─".repeat(60));
        for repo in repos {
            println!(
                "  {} {} {}",
                "•".cyan(),
                repo.name().unwrap_or("<unnamed>").cyan().bold(),
                repo.location().dimmed()
            );
        }
        println!();
    }

    pub fn list_sources(&self, sources: &[DiscoverySource]) {
        println!("\n{}", "DISCOVERY SOURCES".bold().underline());
        println!("{}", "─".repeat(60));
        if sources.is_empty() {
            println!("  {}", "no discovery sources configured".dimmed());
        }
        for source in sources {
            println!(
                "  {} {} {} {}",
                "•".cyan(),
                source.name().unwrap_or("<unnamed>").cyan().bold(),
                format!("[{}]", source.kind()).yellow(),
                source.location().dimmed()
            );
        }
        println!();
    }

    pub fn list_servers(&self, config: &ClientConfig) {
        println!("\n{}", "SERVERS".bold().underline());
        println!("{}", "─".repeat(60));
        if config.servers.is_empty() {
            println!("  {}", "no servers configured".dimmed());
        }
        for server in &config.servers {
            let marker = if config.current.as_deref() == Some(server.name.as_str()) {
                "→ "
            } else {
                "  "
            };
            println!(
                "  {}{} {} {}",
                marker.green(),
                server.name.cyan().bold(),
                format!("({})", server.server_type).dimmed(),
                server.endpoint.as_deref().unwrap_or_default().dimmed()
            );
        }
        println!();
    }

    pub fn show_config(&self, config: &ClientConfig, path: &Path) {
        println!("\n{}", "CONFIGURATION".bold().underline());
        println!("{}", "─".repeat(60));
        match serde_yaml::to_string(config) {
            Ok(yaml) => println!("{}", yaml.trim_start_matches("---\n")),
            Err(e) => self.error(&format!("could not render config: {}", e)),
        }
        println!("  {} {}", "Config file:".yellow(), path.display().to_string().dimmed());
        println!();
    }

    pub fn confirm(&self, message: &str) -> bool {
        print!("{} {} [y/N]: ", "[CONFIRM]".yellow().bold(), message);
        std::io::Write::flush(&mut std::io::stdout()).ok();

        let mut input = String::new();
        if std::io::stdin().read_line(&mut input).is_ok() {
            let input = input.trim().to_lowercase();
            return input == "y" || input == "yes";
        }
        false
    }
}

impl Default for Console {
    fn default() -> Self {
        Self::new()
    }
}
