use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use colored::Colorize;
use dlv_sink::SyncMode;
use dlv_stream::{DeliveryConfig, FlushRetention, FsDeliveryStream, StreamSet, StreamStats};
use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Ingest(args) => cmd_ingest(args, cli.format),
        Command::Ls(args) => cmd_ls(args, cli.format),
        Command::Config(args) => cmd_config(args),
    }
}

/// Baseline for the CLI before the config file and flags apply.
///
/// `ingest` flushes on a timer, so flushed bytes are discarded by default;
/// keeping them would rewrite the whole history on every tick.
pub fn cli_defaults() -> DeliveryConfig {
    DeliveryConfig {
        retention: FlushRetention::DiscardFlushed,
        ..DeliveryConfig::default()
    }
}

/// Merge the optional config file with command-line overrides.
pub fn resolve_config(args: &StreamArgs) -> anyhow::Result<DeliveryConfig> {
    let base = cli_defaults();
    let mut config = match &args.config {
        Some(path) => DeliveryConfig::load_over(path, &base)?,
        None => base,
    };
    if let Some(dest) = &args.dest {
        config.dest_dir = dest.clone();
    }
    if let Some(prefix) = &args.prefix {
        config.prefix_template = prefix.clone();
    }
    if let Some(n) = args.partitions {
        config.partitions = n;
    }
    if let Some(p) = args.partitioner {
        config.partitioner = p.into();
    }
    if let Some(n) = args.naming {
        config.naming = n.into();
    }
    if let Some(r) = args.retention {
        config.retention = r.into();
    }
    if args.skip_empty {
        config.skip_empty = true;
    }
    if args.fsync {
        config.sync = SyncMode::EveryWrite;
    }
    if let Some(ms) = args.flush_interval_ms {
        config.flush_interval_ms = ms;
    }
    config.validate()?;
    Ok(config)
}

// ---- ingest ----

#[derive(Debug, Serialize)]
pub struct PartitionSummary {
    pub partition: usize,
    pub prefix: String,
    #[serde(flatten)]
    pub stats: StreamStats,
}

fn cmd_ingest(args: IngestArgs, format: OutputFormat) -> anyhow::Result<()> {
    let config = resolve_config(&args.stream)?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("starting runtime")?;

    let stdin = BufReader::new(tokio::io::stdin());
    let summary = runtime.block_on(ingest(stdin, &config, args.key_delimiter))?;
    print_summary(&summary, &config.dest_dir, format)
}

/// Route every line of `input` into a filesystem stream set, flushing on
/// `config.flush_interval()` and once more at end of input.
pub async fn ingest<R>(
    input: R,
    config: &DeliveryConfig,
    key_delimiter: Option<char>,
) -> anyhow::Result<Vec<PartitionSummary>>
where
    R: AsyncBufRead + Unpin,
{
    let set = Arc::new(StreamSet::filesystem(config).context("building stream set")?);
    info!(
        dest = %config.dest_dir.display(),
        partitions = set.len(),
        "ingest started"
    );

    let mut lines = input.lines();
    let mut ticker = tokio::time::interval(config.flush_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line.context("reading input")? {
                    Some(line) => {
                        route_line(&set, &line, key_delimiter)?;
                    }
                    None => break,
                }
            }
            _ = ticker.tick() => {
                let set = Arc::clone(&set);
                let failures = tokio::task::spawn_blocking(move || flush_partitions(&set)).await?;
                if failures > 0 {
                    warn!(failures, "periodic flush incomplete; buffers retained for next tick");
                }
            }
        }
    }

    let final_set = Arc::clone(&set);
    let failures = tokio::task::spawn_blocking(move || flush_partitions(&final_set)).await?;
    if failures > 0 {
        anyhow::bail!("final flush failed for {failures} partition(s)");
    }
    info!("ingest complete");

    Ok(set
        .streams()
        .iter()
        .enumerate()
        .map(|(partition, stream)| PartitionSummary {
            partition,
            prefix: stream.prefix().to_string(),
            stats: stream.stats(),
        })
        .collect())
}

/// Append `line` plus a trailing newline to the partition its key selects.
pub fn route_line(
    set: &StreamSet<FsDeliveryStream>,
    line: &str,
    key_delimiter: Option<char>,
) -> anyhow::Result<usize> {
    let key = key_delimiter
        .and_then(|d| line.split_once(d).map(|(k, _)| k))
        .unwrap_or(line);
    let mut record = Vec::with_capacity(line.len() + 1);
    record.extend_from_slice(line.as_bytes());
    record.push(b'\n');
    let (partition, _) = set.put(Some(key.as_bytes()), &record)?;
    Ok(partition)
}

/// Flush every partition; returns the number that failed.
fn flush_partitions(set: &StreamSet<FsDeliveryStream>) -> usize {
    set.flush_all().iter().filter(|r| r.is_err()).count()
}

fn print_summary(
    summary: &[PartitionSummary],
    dest: &Path,
    format: OutputFormat,
) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(summary)?);
        }
        OutputFormat::Text => {
            println!("{} Delivered to {}", "✓".green().bold(), dest.display().to_string().bold());
            for p in summary {
                println!(
                    "  {} {:<20} {} records, {} bytes, {} flushes{}",
                    format!("#{}", p.partition).yellow(),
                    p.prefix.cyan(),
                    p.stats.records,
                    p.stats.bytes_put,
                    p.stats.flushes,
                    if p.stats.flush_failures > 0 {
                        format!(", {} failed", p.stats.flush_failures).red().to_string()
                    } else {
                        String::new()
                    },
                );
            }
        }
    }
    Ok(())
}

// ---- ls ----

#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct ArtifactEntry {
    pub path: PathBuf,
    pub bytes: u64,
}

/// Every file under `dir`, relative to it, sorted by path.
pub fn collect_artifacts(dir: &Path) -> anyhow::Result<Vec<ArtifactEntry>> {
    let mut entries = Vec::new();
    for entry in walkdir::WalkDir::new(dir) {
        let entry = entry.with_context(|| format!("walking {}", dir.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let bytes = entry.metadata()?.len();
        let path = entry.path().strip_prefix(dir)?.to_path_buf();
        entries.push(ArtifactEntry { path, bytes });
    }
    entries.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(entries)
}

fn cmd_ls(args: LsArgs, format: OutputFormat) -> anyhow::Result<()> {
    let entries = collect_artifacts(&args.dir)?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&entries)?),
        OutputFormat::Text => {
            if entries.is_empty() {
                println!("No artifacts in {}.", args.dir.display());
                return Ok(());
            }
            let total: u64 = entries.iter().map(|e| e.bytes).sum();
            for e in &entries {
                println!("{:>12}  {}", e.bytes, e.path.display());
            }
            println!(
                "{} artifacts, {} bytes",
                entries.len().to_string().bold(),
                total.to_string().bold()
            );
        }
    }
    Ok(())
}

// ---- config ----

fn cmd_config(args: ConfigArgs) -> anyhow::Result<()> {
    let config = resolve_config(&args.stream)?;
    print!("{}", config.to_toml_string()?);
    Ok(())
}
