//! CLI argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Default file for the dump taken before programming
pub const DEFAULT_BEFORE: &str = "eprom_before.txt";
/// Default file for the dump taken after programming
pub const DEFAULT_AFTER: &str = "eprom_after.txt";

#[derive(Parser)]
#[command(name = "romflash")]
#[command(author, version, about = "EPROM programmer for serial programming controllers", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Configuration file (TOML format)
    /// Defaults to ./romflash.toml if it exists
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Link and transfer options shared across commands
///
/// Anything left unset falls back to the configuration file.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct LinkArgs {
    /// Controller link: dev=<port>[:baud], ip=<host>:<port>, a device name, or dummy
    #[arg(short, long)]
    pub device: Option<String>,

    /// Memory type (2716, 2732, 2764, 27128, 27256, 27512)
    #[arg(short, long)]
    pub memory: Option<String>,

    /// Bytes per flow-controlled write chunk
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// Give up on a handshake after this many milliseconds (default 30000, 0 waits forever)
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Code the controller sends when it is ready
    #[arg(long)]
    pub ready_code: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Program an image: read, write, read back and verify
    Program {
        /// Program image (one 8-bit binary string per line)
        #[arg(short, long)]
        input: PathBuf,

        /// Where to store the dump taken before programming
        #[arg(long, default_value = DEFAULT_BEFORE)]
        before: PathBuf,

        /// Where to store the dump taken after programming
        #[arg(long, default_value = DEFAULT_AFTER)]
        after: PathBuf,

        /// Don't prompt for the programming voltage steps
        #[arg(short, long)]
        yes: bool,

        #[command(flatten)]
        link: LinkArgs,
    },

    /// Read memory contents to file
    Read {
        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        #[command(flatten)]
        link: LinkArgs,
    },

    /// Verify memory contents against an image without writing
    Verify {
        /// Program image (one 8-bit binary string per line)
        #[arg(short, long)]
        input: PathBuf,

        /// Also store the dump to this file
        #[arg(long)]
        after: Option<PathBuf>,

        #[command(flatten)]
        link: LinkArgs,
    },

    /// List supported memory types
    ListChips,
}
