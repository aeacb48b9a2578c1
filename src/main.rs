use std::path::PathBuf;
use std::process::ExitCode;

use buganime::logging;
use clap::Parser;

/// Convert anime files to 4K
#[derive(Parser, Debug)]
#[command(version)]
struct Args {
    /// Path to the input file or directory
    input_path: PathBuf,

    /// Accept files with no subtitles
    #[arg(long)]
    accept_no_subtitles: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();

    match logging::init_tracing(&args.input_path) {
        Some(log_path) => tracing::info!("Using log file location: {}", log_path.display()),
        None => tracing::warn!("Could not create a log file, logging to stdout only"),
    }

    tracing::info!("Buganime started running on {}", args.input_path.display());
    match buganime::process_path(&args.input_path, args.accept_no_subtitles).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("Failed to convert {}: {err:#}", args.input_path.display());
            ExitCode::FAILURE
        }
    }
}
