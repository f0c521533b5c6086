use clap::Parser;
use sorload::cli::{handle_import, handle_urls, Cli, Commands};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("sorload=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing();

    let config = cli.config.as_deref();
    let result = match cli.command {
        Commands::Import(args) => handle_import(config, args).await,
        Commands::Urls { range, source } => handle_urls(config, range, source),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
