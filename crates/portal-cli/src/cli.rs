use std::net::SocketAddr;
use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "portal",
    about = "Multi-instance portal: routing, aggregated listings and personal-info sync",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Fixture describing users and instance data (defaults to the demo set)
    #[arg(long, global = true)]
    pub fixture: Option<PathBuf>,

    /// Server configuration file (TOML); its [portal] table tunes sync and aggregation
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Clone, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show a user's instances and whether each is reachable
    Instances(UserArgs),
    /// Show which instance serves a request kind
    Route(RouteArgs),
    /// Show the routed copy of a user's personal info
    Profile(UserArgs),
    /// List payslips from every accessible instance
    Payslips(ListArgs),
    /// List documents from every accessible instance
    Documents(DocumentsArgs),
    /// Sync field values to every accessible instance
    Sync(SyncArgs),
    /// Start the HTTP server
    Serve(ServeArgs),
}

#[derive(Args)]
pub struct UserArgs {
    pub user: String,
}

#[derive(Args)]
pub struct RouteArgs {
    pub user: String,
    /// Request kind, e.g. getPersonalInfo
    pub kind: String,
}

#[derive(Args)]
pub struct ListArgs {
    pub user: String,
    #[arg(long)]
    pub instance: Option<String>,
    #[arg(long)]
    pub from: Option<NaiveDate>,
    #[arg(long)]
    pub to: Option<NaiveDate>,
    /// Most recent first instead of instance order
    #[arg(long)]
    pub newest_first: bool,
}

#[derive(Args)]
pub struct DocumentsArgs {
    #[command(flatten)]
    pub list: ListArgs,
    /// Only documents of this type (certificate, contract)
    #[arg(long = "type")]
    pub kind: Option<String>,
}

#[derive(Args)]
pub struct SyncArgs {
    pub user: String,
    #[arg(long, default_value = "personalInfo")]
    pub entity: String,
    /// Field assignment as dotted.path=value; repeatable
    #[arg(long = "set", value_name = "FIELD=VALUE", required = true)]
    pub assignments: Vec<String>,
    /// Resolve every conflict this way and commit
    #[arg(long)]
    pub resolve: Option<ResolveChoice>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum ResolveChoice {
    Current,
    New,
}

#[derive(Args)]
pub struct ServeArgs {
    /// Overrides bind_addr from the configuration file
    #[arg(long)]
    pub bind: Option<SocketAddr>,
}
