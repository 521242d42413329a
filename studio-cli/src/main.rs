mod args;
mod commands;

use std::process::ExitCode;

use args::{Cli, Command};
use clap::Parser;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli.log);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            match err.downcast_ref::<gemini_studio::Error>() {
                Some(studio_err) => {
                    tracing::debug!(error = %studio_err, "generation failed");
                    eprintln!("{}", studio_err.user_message());
                }
                None => eprintln!("gemini-studio error: {err:#}"),
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let store = commands::credential_store(cli.credentials.as_deref())?;
    match cli.command {
        Command::Key { action } => commands::run_key(&store, action),
        Command::Generate(args) => commands::run_generate(&store, args).await,
    }
}

fn init_tracing(log_filter: &str) {
    use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

    let filter = EnvFilter::try_new(log_filter).unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);
    tracing_subscriber::registry().with(filter).with(fmt_layer).init();
}
