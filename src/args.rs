use clap::{Parser, Subcommand};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the directory containing `jmapc.toml`.
    ///
    /// Defaults to the platform config directory.
    #[clap(short = 'C', long)]
    pub path: Option<PathBuf>,

    #[clap(flatten)]
    pub verbose: Verbosity<WarnLevel>,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List every mailbox of the account.
    Mailboxes,

    /// Show the most recently received emails.
    Recent {
        /// Only show emails in this mailbox.
        #[clap(short, long)]
        mailbox: Option<String>,

        /// Number of emails to show.
        #[clap(short = 'n', long, default_value_t = 10)]
        limit: u64,
    },

    /// Send a JSON object to the server and print what comes back.
    Echo {
        /// A JSON object.
        json: String,
    },
}
