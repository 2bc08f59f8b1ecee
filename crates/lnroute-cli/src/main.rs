//! lnroute CLI: command-line interface for a running lnroute node.
//!
//! Subcommands: init, status, getroutes, layer, inform, reserve, unreserve,
//! reservations, feedback.

mod client;
mod commands;

use clap::{Parser, Subcommand};

/// lnroute: route computation for Lightning payments.
#[derive(Parser, Debug)]
#[command(name = "lnroute", version, about, long_about = None)]
struct Cli {
    /// API endpoint of the node.
    #[arg(short, long, global = true, default_value = client::DEFAULT_ENDPOINT)]
    endpoint: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a default node configuration.
    Init(commands::init::InitArgs),
    /// Query the status of a running node.
    Status,
    /// Compute routes between two nodes.
    Getroutes(commands::getroutes::GetRoutesArgs),
    /// Inspect and edit layers.
    Layer(commands::layer::LayerArgs),
    /// Record an observation about an edge's liquidity.
    Inform(commands::inform::InformArgs),
    /// Hold capacity along a path.
    Reserve(commands::reserve::ReserveArgs),
    /// Release capacity held along a path.
    Unreserve(commands::reserve::UnreserveArgs),
    /// List outstanding reservations.
    Reservations,
    /// Report how a payment attempt ended.
    Feedback(commands::feedback::FeedbackArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let api = client::ApiClient::new(&cli.endpoint);

    match &cli.command {
        Commands::Init(args) => commands::init::run(args),
        Commands::Status => commands::status::run(&api).await,
        Commands::Getroutes(args) => commands::getroutes::run(&api, args).await,
        Commands::Layer(args) => commands::layer::run(&api, args).await,
        Commands::Inform(args) => commands::inform::run(&api, args).await,
        Commands::Reserve(args) => commands::reserve::run_reserve(&api, args).await,
        Commands::Unreserve(args) => commands::reserve::run_unreserve(&api, args).await,
        Commands::Reservations => commands::reserve::run_list(&api).await,
        Commands::Feedback(args) => commands::feedback::run(&api, args).await,
    }
}
