//! Flowtap CLI
//!
//! Attaches to a running interception relay as a WebSocket client and prints
//! the traffic the relay offers, for operator diagnosis. The tap never
//! modifies a flow; full content is only pulled for the sides enabled on the
//! command line.

use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod tap;

/// Flowtap - watch traffic passing through an interception relay
///
/// Connects to the relay's WebSocket API, answers every negotiation, and
/// logs summaries (or full content, with --requests/--responses) of the
/// flows the proxy engine is carrying.
#[derive(Parser, Debug)]
#[command(name = "flowtap")]
#[command(version, about, long_about = None)]
struct Args {
    /// WebSocket URL of the relay to attach to
    #[arg(short, long, env = "FLOWTAP_URL", default_value = "ws://127.0.0.1:8082")]
    url: String,

    /// Pull full request content instead of summaries only
    #[arg(long)]
    requests: bool,

    /// Pull full response content instead of summaries only
    #[arg(long)]
    responses: bool,

    /// Output format: text or json
    #[arg(short, long, default_value = "text")]
    format: OutputFormat,
}

#[derive(Debug, Clone, clap::ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = Args::parse();
    let options = tap::TapOptions {
        url: args.url,
        requests: args.requests,
        responses: args.responses,
        json_output: matches!(args.format, OutputFormat::Json),
    };

    match tap::run_tap(&options).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
