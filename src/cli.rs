//! Command-line interface for iarchive

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "iarchive")]
#[command(about = "Create, inspect, modify and extract archives", long_about = None)]
pub struct Cli {
    /// JSON config file (chunkSize, externalArchiver, nativeEncryption, ...)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Streaming block size in bytes (overrides the config file)
    #[arg(long, global = true)]
    pub chunk_size: Option<usize>,

    /// Print debug diagnostics
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show supported formats and their capabilities
    Formats {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Create a new archive from files or directories
    Create {
        /// Output archive file
        #[arg(short, long)]
        output: PathBuf,

        /// Archive format (zip, tar, tar.gz, 7z, gzip, bzip2, xz); guessed from the output name if omitted
        #[arg(short, long)]
        format: Option<String>,

        /// Input files or directories
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Descend into nested directories
        #[arg(short, long)]
        recursive: bool,

        /// Encrypt the archive (ZIP only)
        #[arg(short, long)]
        password: Option<String>,

        /// Skip files whose name ends with this suffix
        #[arg(short, long)]
        exclude: Option<String>,
    },

    /// List archive contents
    List {
        /// Archive file
        archive: PathBuf,

        #[arg(short, long)]
        format: Option<String>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Extract an archive
    Extract {
        /// Input archive file
        archive: PathBuf,

        /// Output directory
        #[arg(short, long)]
        output: PathBuf,

        #[arg(short, long)]
        format: Option<String>,

        /// Skip members whose name ends with this suffix
        #[arg(short, long)]
        exclude: Option<String>,
    },

    /// Add files to an existing ZIP or TAR archive
    Append {
        archive: PathBuf,

        #[arg(required = true)]
        files: Vec<PathBuf>,

        #[arg(short, long)]
        format: Option<String>,
    },

    /// Remove one member from a TAR archive
    Delete {
        archive: PathBuf,

        /// Member name as shown by `list`
        member: String,

        #[arg(short, long)]
        format: Option<String>,
    },

    /// Print the SHA-256 of one or more files
    Checksum {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}
