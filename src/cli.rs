use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "offload")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(
    about = "Upload finished media folders to rclone drives within a daily quota, then clean them up",
    long_about = None
)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long)]
    pub quiet: bool,

    /// Config file (default: ~/.config/offload/config.toml)
    #[arg(short, long, env = "OFFLOAD_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Verify and delete uploads older than the grace period
    #[arg(long, conflicts_with = "status")]
    pub cleanup: bool,

    /// Show what is waiting for cleanup
    #[arg(long)]
    pub status: bool,

    /// Show what would happen without copying, checking or deleting
    #[arg(short = 'n', long)]
    pub dry_run: bool,
}

/// What a single invocation does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Upload,
    Cleanup,
    Status,
}

impl Cli {
    pub fn mode(&self) -> Mode {
        if self.cleanup {
            Mode::Cleanup
        } else if self.status {
            Mode::Status
        } else {
            Mode::Upload
        }
    }
}
