//! baas CLI binary entry point.

use baas_client::cli::{auth, resources, Cli, Commands};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    let cli = Cli::parse_args();

    let filter = if cli.global.verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let result = match cli.command {
        Commands::Login(args) => auth::handle_login(&cli.global, args).await,
        Commands::Status => auth::handle_status(&cli.global).await,
        Commands::Logout => auth::handle_logout(&cli.global).await,
        Commands::Whoami(args) => auth::handle_whoami(&cli.global, args).await,
        Commands::Find(args) => resources::handle_find(&cli.global, args).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
