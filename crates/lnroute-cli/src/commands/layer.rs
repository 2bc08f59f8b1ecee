//! `lnroute layer`: inspect and edit layers.

use clap::{Args, Subcommand};
use lnroute_core::{NodeId, ShortChannelIdDir};
use lnroute_routing::{Bias, Layer};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::client::ApiClient;

#[derive(Args, Debug)]
pub struct LayerArgs {
    #[command(subcommand)]
    pub command: LayerCommand,
}

#[derive(Subcommand, Debug)]
pub enum LayerCommand {
    /// List layers, or show one.
    List {
        name: Option<String>,
    },
    /// Create an empty layer.
    Create {
        name: String,
        /// Keep the layer across node restarts.
        #[arg(long)]
        persistent: bool,
    },
    /// Remove a layer and everything in it.
    Remove {
        name: String,
    },
    /// Exclude a node from routes using this layer.
    DisableNode {
        layer: String,
        node: NodeId,
    },
    /// Exclude one direction of a channel.
    DisableChannel {
        layer: String,
        short_channel_id_dir: ShortChannelIdDir,
    },
    /// Set or adjust a channel's bias, in parts per million of the amount.
    Bias {
        layer: String,
        short_channel_id_dir: ShortChannelIdDir,
        #[arg(allow_hyphen_values = true)]
        bias: i64,
        #[arg(long)]
        description: Option<String>,
        /// Add to the current bias instead of replacing it.
        #[arg(long)]
        relative: bool,
    },
    /// Drop constraints observed before a UNIX timestamp.
    Age {
        layer: String,
        cutoff: u64,
    },
}

#[derive(Serialize, Deserialize)]
struct AgeResponse {
    removed: usize,
}

fn print_layer(layer: &Layer) {
    println!(
        "{}{}",
        layer.name,
        if layer.persistent { " (persistent)" } else { "" }
    );
    println!("  Disabled nodes:     {}", layer.disabled_nodes.len());
    println!("  Disabled channels:  {}", layer.disabled_channels.len());
    println!("  Created channels:   {}", layer.created_channels.len());
    println!("  Channel updates:    {}", layer.channel_updates.len());
    println!("  Constraints:        {}", layer.constraints.len());
    println!("  Biases:             {}", layer.biases.len());
}

pub async fn run(api: &ApiClient, args: &LayerArgs) -> anyhow::Result<()> {
    match &args.command {
        LayerCommand::List { name } => {
            let layers: Vec<Layer> = match name {
                Some(name) => api.get_query("/api/v1/layers", &[("name", name)]).await?,
                None => api.get("/api/v1/layers").await?,
            };
            if layers.is_empty() {
                println!("No layers.");
            }
            for layer in &layers {
                print_layer(layer);
            }
        }
        LayerCommand::Create { name, persistent } => {
            let layer: Layer = api
                .post(
                    "/api/v1/layers",
                    &json!({ "name": name, "persistent": persistent }),
                )
                .await?;
            println!("Created layer {}", layer.name);
        }
        LayerCommand::Remove { name } => {
            let layer: Layer = api.delete(&format!("/api/v1/layers/{name}")).await?;
            println!("Removed layer {}", layer.name);
        }
        LayerCommand::DisableNode { layer, node } => {
            let _: Layer = api
                .post(
                    &format!("/api/v1/layers/{layer}/disable-node"),
                    &json!({ "node": node }),
                )
                .await?;
            println!("Disabled node {node} in {layer}");
        }
        LayerCommand::DisableChannel {
            layer,
            short_channel_id_dir,
        } => {
            let _: Layer = api
                .post(
                    &format!("/api/v1/layers/{layer}/disable-channel"),
                    &json!({ "short_channel_id_dir": short_channel_id_dir }),
                )
                .await?;
            println!("Disabled {short_channel_id_dir} in {layer}");
        }
        LayerCommand::Bias {
            layer,
            short_channel_id_dir,
            bias,
            description,
            relative,
        } => {
            let biases: Vec<Bias> = api
                .post(
                    &format!("/api/v1/layers/{layer}/biases"),
                    &json!({
                        "short_channel_id_dir": short_channel_id_dir,
                        "bias": bias,
                        "description": description,
                        "relative": relative,
                    }),
                )
                .await?;
            match biases.first() {
                Some(b) => println!("Bias on {} is now {} ppm", b.short_channel_id_dir, b.bias),
                None => println!("Bias on {short_channel_id_dir} removed"),
            }
        }
        LayerCommand::Age { layer, cutoff } => {
            let resp: AgeResponse = api
                .post(
                    &format!("/api/v1/layers/{layer}/age"),
                    &json!({ "cutoff": cutoff }),
                )
                .await?;
            println!("Removed {} constraint bound(s) from {layer}", resp.removed);
        }
    }
    Ok(())
}
