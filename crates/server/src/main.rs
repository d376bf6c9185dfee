mod cli;
mod config;
mod routes;
mod state;

use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    //  Logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,gemma_server=debug")),
        )
        .init();

    let args = cli::Cli::parse();

    match args.command {
        Some(cli::Commands::Run(run_args)) => cli::run::execute(args.global, run_args).await,
        Some(cli::Commands::Count(count_args)) => {
            cli::count::execute(args.global, count_args).await
        }
        Some(cli::Commands::Config(c)) => cli::config_cmd::execute(c).await,
        Some(cli::Commands::Serve(serve_args)) => {
            cli::serve::execute(args.global, serve_args).await
        }
        // Default: start HTTP server
        None => cli::serve::execute(args.global, cli::ServeArgs::default()).await,
    }
}
