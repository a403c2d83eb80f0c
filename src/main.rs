use clap::Parser;
use tracing_subscriber::EnvFilter;

use deepgene::cli::{Cli, Commands};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

fn report_error(err: &anyhow::Error) {
    if let Some(gene_err) = err.downcast_ref::<deepgene::error::DeepGeneError>() {
        eprintln!("Error: {gene_err}");
    } else {
        eprintln!("Error: {err}");
    }
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    init_tracing();

    let cli = Cli::parse();
    match cli.command {
        Commands::Shell => match deepgene::cli::shell::run(cli.json).await {
            Ok(()) => std::process::ExitCode::SUCCESS,
            Err(err) => {
                report_error(&err);
                std::process::ExitCode::from(1)
            }
        },
        _ => match deepgene::cli::run(cli).await {
            Ok(output) => {
                println!("{output}");
                std::process::ExitCode::SUCCESS
            }
            Err(err) => {
                report_error(&err);
                std::process::ExitCode::from(1)
            }
        },
    }
}
