use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "graffiti",
    about = "Graffiti: publish and discover JSON objects across origins",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Federation config (TOML). Without one, the local development origin
    /// is the only origin.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Act as this actor. Reads without an actor are anonymous.
    #[arg(short, long, global = true)]
    pub actor: Option<String>,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run an origin server
    Serve(ServeArgs),
    /// Fetch an object
    Get(GetArgs),
    /// Create or replace an object
    Put(PutArgs),
    /// Apply JSON patches to an object
    Patch(PatchArgs),
    /// Delete an object
    Delete(DeleteArgs),
    /// Stream objects in channels, or continue a previous stream
    Discover(DiscoverArgs),
    /// Stream the actor's objects that are in no channel
    Orphans(OrphansArgs),
    /// Per-channel counts of the actor's objects
    ChannelStats,
}

#[derive(Args)]
pub struct ServeArgs {
    /// Server config (TOML)
    #[arg(long)]
    pub server_config: Option<PathBuf>,
    #[arg(long)]
    pub bind: Option<SocketAddr>,
    /// Origin token to mint urls under, e.g. `remote:pod.example`
    #[arg(long)]
    pub origin: Option<String>,
}

#[derive(Args)]
pub struct GetArgs {
    pub url: String,
    /// JSON schema the object must satisfy
    #[arg(long, default_value = "{}")]
    pub schema: String,
}

#[derive(Args)]
pub struct PutArgs {
    /// The object's value, as JSON
    pub value: String,
    /// Replace this url instead of creating a new object
    #[arg(long)]
    pub url: Option<String>,
    #[arg(long = "channel")]
    pub channels: Vec<String>,
    /// Restrict visibility to these actors (comma separated; empty for
    /// owner only)
    #[arg(long, value_delimiter = ',', num_args = 0..)]
    pub allowed: Option<Vec<String>>,
}

#[derive(Args)]
pub struct PatchArgs {
    pub url: String,
    /// JSON patch for the value
    #[arg(long)]
    pub value: Option<String>,
    /// JSON patch for the channel list
    #[arg(long)]
    pub channels: Option<String>,
    /// JSON patch for the allowed list
    #[arg(long)]
    pub allowed: Option<String>,
}

#[derive(Args)]
pub struct DeleteArgs {
    pub url: String,
}

#[derive(Args)]
pub struct DiscoverArgs {
    #[arg(long = "channel", required_unless_present = "cursor")]
    pub channels: Vec<String>,
    #[arg(long, default_value = "{}")]
    pub schema: String,
    /// Continue from a cursor a previous stream returned
    #[arg(long, conflicts_with = "channels")]
    pub cursor: Option<String>,
}

#[derive(Args)]
pub struct OrphansArgs {
    #[arg(long, default_value = "{}")]
    pub schema: String,
}
