use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use dlv_stream::{FlushRetention, NamingStrategy, Partitioner};

#[derive(Parser)]
#[command(
    name = "dlv",
    about = "dlv: batch records into delivery streams and flush them to disk",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Read newline-delimited records from stdin into partitioned streams
    Ingest(IngestArgs),
    /// List flushed artifacts under a directory
    Ls(LsArgs),
    /// Print the effective stream-set configuration as TOML
    Config(ConfigArgs),
}

/// Stream-set settings shared by commands; flags override the config file.
#[derive(Args, Debug, Default)]
pub struct StreamArgs {
    /// TOML file describing the stream set
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Destination directory for artifacts
    #[arg(long)]
    pub dest: Option<PathBuf>,
    /// Artifact prefix; `{partition}` expands to the partition index
    #[arg(long)]
    pub prefix: Option<String>,
    #[arg(short = 'n', long)]
    pub partitions: Option<usize>,
    #[arg(long, value_enum)]
    pub partitioner: Option<PartitionerArg>,
    #[arg(long, value_enum)]
    pub naming: Option<NamingArg>,
    #[arg(long, value_enum)]
    pub retention: Option<RetentionArg>,
    /// Do not write artifacts for empty buffers
    #[arg(long)]
    pub skip_empty: bool,
    /// fsync every artifact before reporting success
    #[arg(long)]
    pub fsync: bool,
    #[arg(long)]
    pub flush_interval_ms: Option<u64>,
}

#[derive(Args)]
pub struct IngestArgs {
    #[command(flatten)]
    pub stream: StreamArgs,
    /// Partition key is the text before the first occurrence of this
    /// character (the whole line when absent)
    #[arg(long)]
    pub key_delimiter: Option<char>,
}

#[derive(Args)]
pub struct LsArgs {
    /// Directory to list
    #[arg(default_value = "dest")]
    pub dir: PathBuf,
}

#[derive(Args)]
pub struct ConfigArgs {
    #[command(flatten)]
    pub stream: StreamArgs,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum PartitionerArg {
    Random,
    KeyHash,
    RoundRobin,
}

impl From<PartitionerArg> for Partitioner {
    fn from(arg: PartitionerArg) -> Self {
        match arg {
            PartitionerArg::Random => Partitioner::Random,
            PartitionerArg::KeyHash => Partitioner::KeyHash,
            PartitionerArg::RoundRobin => Partitioner::RoundRobin,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum NamingArg {
    UnixNanos,
    Sequence,
    Uuid,
}

impl From<NamingArg> for NamingStrategy {
    fn from(arg: NamingArg) -> Self {
        match arg {
            NamingArg::UnixNanos => NamingStrategy::UnixNanos,
            NamingArg::Sequence => NamingStrategy::UnixNanosWithSequence,
            NamingArg::Uuid => NamingStrategy::Uuid,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum RetentionArg {
    KeepAll,
    DiscardFlushed,
}

impl From<RetentionArg> for FlushRetention {
    fn from(arg: RetentionArg) -> Self {
        match arg {
            RetentionArg::KeepAll => FlushRetention::KeepAll,
            RetentionArg::DiscardFlushed => FlushRetention::DiscardFlushed,
        }
    }
}
