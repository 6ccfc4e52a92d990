use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tanzu::cli::{self, Cli};
use tanzu::error::PluginError;
use tanzu::ui::Console;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let code = match cli::run(cli).await {
        Ok(code) => code,
        Err(err) => {
            if let Some(plugin_err) = err.downcast_ref::<PluginError>() {
                if plugin_err.is_fatal() {
                    tracing::error!(error = %plugin_err, "fatal error");
                }
            }
            Console::new().error(&format!("{:#}", err));
            1
        }
    };

    std::process::exit(code);
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "tanzu=debug" } else { "tanzu=info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
