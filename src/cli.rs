use clap::{Parser, Subcommand};
use std::path::PathBuf;

use clipsync::backend::HistoryKind;
use clipsync::config::ReceiverMode;

#[derive(Parser, Debug)]
#[command(name = "clipsync")]
#[command(version, about = "Keeps the local clipboard in sync with a clipboard history server", long_about = None)]
pub struct Cli {
    /// Path to the config file (defaults to ~/.clipsync/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the sync loop until Ctrl-C (default if no command given)
    Run {
        /// How server-originated updates are received
        #[arg(short, long, value_enum)]
        receiver: Option<ReceiverMode>,
    },
    /// Submit one value to the server
    Push {
        text: String,

        /// Remote list to append to
        #[arg(short, long, value_enum, default_value_t = HistoryKind::Copied)]
        kind: HistoryKind,
    },
    /// Fetch the latest server value and put it on the clipboard
    Pull,
    /// List remote history
    History {
        /// Which list to show
        #[arg(short, long, value_enum, default_value_t = HistoryKind::Copied)]
        kind: HistoryKind,

        /// Choose an entry interactively and copy it to the clipboard
        #[arg(short, long)]
        pick: bool,
    },
    /// Show the config file location and effective settings
    Config {
        /// Write a default config file if none exists
        #[arg(long)]
        init: bool,
    },
}
