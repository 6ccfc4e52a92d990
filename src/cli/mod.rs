mod config;
mod context;
mod plugin;

pub use context::AppContext;

use anyhow::Result;
use clap::{ArgGroup, Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use crate::plugins::VERSION_LATEST;

/// Environment variable overriding where plugins are installed.
pub const PLUGIN_ROOT_ENV: &str = "TANZU_PLUGIN_ROOT";

#[derive(Parser)]
#[command(name = "tanzu")]
#[command(author = "Tanzu CLI Team")]
#[command(version)]
#[command(about = "The Tanzu CLI", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Directory plugins are installed into
    #[arg(long, global = true, env = PLUGIN_ROOT_ENV)]
    pub plugin_root: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Install the default plugin distribution
    Init,

    /// Show version information
    Version,

    /// Manage plugins
    Plugin {
        #[command(subcommand)]
        command: PluginCommands,
    },

    /// Get and set client configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Test plugins
    Test {
        #[command(subcommand)]
        command: TestCommands,
    },

    /// Run an installed plugin
    #[command(external_subcommand)]
    External(Vec<String>),
}

#[derive(Subcommand)]
pub enum PluginCommands {
    /// List installed plugins
    List,

    /// List plugins available in the configured repositories
    Search,

    /// Describe an installed plugin
    Describe {
        /// Plugin name
        name: String,
    },

    /// Install a plugin, or `all` to install every published plugin
    Install {
        /// Plugin name or `all`
        name: String,

        /// Version to install
        #[arg(short, long, default_value = VERSION_LATEST)]
        version: String,

        /// Install from a local repository directory
        #[arg(short, long)]
        local: Option<PathBuf>,
    },

    /// Upgrade a plugin
    Upgrade {
        /// Plugin name
        name: String,

        /// Version to upgrade to
        #[arg(short, long, default_value = VERSION_LATEST)]
        version: String,
    },

    /// Delete a plugin
    Delete {
        /// Plugin name
        name: String,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Remove every installed plugin
    Clean,

    /// Manage plugin repositories
    Repo {
        #[command(subcommand)]
        command: RepoCommands,
    },

    /// Manage plugin discovery sources
    Source {
        #[command(subcommand)]
        command: SourceCommands,
    },
}

#[derive(Subcommand)]
pub enum RepoCommands {
    /// List configured repositories
    List,

    /// Add a repository
    #[command(group(ArgGroup::new("kind").required(true).args(["bucket", "local"])))]
    Add {
        /// Repository name
        #[arg(short, long)]
        name: String,

        /// Object store bucket
        #[arg(short, long)]
        bucket: Option<String>,

        /// Root path inside the bucket
        #[arg(long, requires = "bucket")]
        root_path: Option<String>,

        /// Local directory
        #[arg(short, long)]
        local: Option<PathBuf>,
    },

    /// Delete a repository
    Delete {
        /// Repository name
        name: String,
    },
}

#[derive(Subcommand)]
pub enum SourceCommands {
    /// List configured discovery sources
    List,

    /// Add a discovery source
    #[command(group(ArgGroup::new("kind").required(true).args(["local", "oci"])))]
    Add {
        /// Source name
        #[arg(short, long)]
        name: String,

        /// Local directory
        #[arg(short, long)]
        local: Option<PathBuf>,

        /// OCI image reference
        #[arg(short, long)]
        oci: Option<String>,
    },

    /// Delete a discovery source
    Delete {
        /// Source name
        name: String,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the current configuration
    Get,

    /// Write the default repositories and distro to the config
    Init,

    /// Set `features.<plugin>.<flag>` or `unstable-versions`
    Set {
        /// Config path
        path: String,

        /// New value
        value: String,
    },

    /// Manage servers
    Server {
        #[command(subcommand)]
        command: ServerCommands,
    },
}

#[derive(Subcommand)]
pub enum ServerCommands {
    /// List servers
    List,

    /// Delete a server
    Delete {
        /// Server name
        name: String,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
pub enum TestCommands {
    /// Fetch test binaries for installed plugins
    Fetch {
        /// Only this plugin
        name: Option<String>,
    },

    /// Run a plugin's tests
    Plugins {
        /// Plugin name
        name: String,

        /// Arguments passed to the test binary
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
}

/// Run one parsed command. Returns the process exit code.
pub async fn run(cli: Cli) -> Result<i32> {
    if let Commands::Version = cli.command {
        println!("{} {}", "version:".yellow(), env!("CARGO_PKG_VERSION"));
        return Ok(0);
    }

    let ctx = AppContext::load(cli.plugin_root)?;

    match cli.command {
        Commands::Version => {}
        Commands::Init => {
            ctx.catalog.ensure_distro(&ctx.repos).await?;
            ctx.console.success("successfully initialized the CLI");
        }
        Commands::Plugin { command } => plugin::handle(&ctx, command).await?,
        Commands::Config { command } => config::handle(&ctx, command).await?,
        Commands::Test { command } => return test::handle(&ctx, command).await,
        Commands::External(args) => return plugin::run_external(&ctx, args).await,
    }

    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_version_leaves_plugin_root_alone() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("plugins");
        let cli = Cli::try_parse_from([
            "tanzu",
            "--plugin-root",
            root.to_str().unwrap(),
            "version",
        ])
        .unwrap();

        assert_eq!(run(cli).await.unwrap(), 0);
        assert!(!root.exists());
    }

    #[test]
    fn test_unknown_subcommand_is_external() {
        let cli = Cli::try_parse_from(["tanzu", "cluster", "list", "--all"]).unwrap();
        match cli.command {
            Commands::External(args) => assert_eq!(args, vec!["cluster", "list", "--all"]),
            _ => panic!("expected an external plugin command"),
        }
    }
}
