use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "tgimg", version, about = "Resolve Telegram preview links into locally cached images")]
pub struct Cli {
    /// Configuration file (TOML, YAML or JSON). Defaults to the per-user
    /// configuration directory if a file exists there.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
    /// Log at debug level. `RUST_LOG` takes precedence.
    #[arg(short, long, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Serve the resolve API and the image store over HTTP.
    Serve,
    /// Resolve a single link into the image store.
    Resolve {
        /// The `t.me` preview link.
        link: String,
        /// Also publish the image to the configured image host.
        #[arg(long)]
        upload: bool,
    },
}
