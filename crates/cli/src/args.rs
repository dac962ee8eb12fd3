//! Command-line surface (§6), grounded on the original's `wr_arguments.py`
//! flag list and the teacher's `derive(clap::Args)` composition pattern.

use std::path::PathBuf;

use clap::{Args, Parser};

/// Restores archived Splunk index buckets from Azure Blob cold storage onto
/// a live indexer cluster.
#[derive(Debug, Parser)]
#[command(name = "bucketeer", version, about)]
pub struct CliArgs {
    /// Archive credentials/endpoint for the Azure Blob connect string.
    #[arg(long, env = "BUCKETEER_CONNECT_STRING")]
    pub connect_string: String,

    /// On-disk root that downloaded buckets are written under.
    #[arg(long, default_value = "./blob_downloads/")]
    pub dest_download_loc_root: PathBuf,

    /// Download parallelism.
    #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u32).range(1..))]
    pub thread_count: u32,

    /// Skip peer directory lookup; run as a single standalone peer.
    #[arg(long, default_value_t = false)]
    pub standalone: bool,

    #[command(flatten)]
    pub cluster: ClusterArgs,

    /// 1 = warn, 2 = info, 3 = debug.
    #[arg(long, default_value_t = 2, value_parser = clap::value_parser!(u8).range(1..=3))]
    pub log_level: u8,

    #[command(flatten)]
    pub filters: FilterArgs,

    /// Run the planner only; do not download.
    #[arg(long, default_value_t = false)]
    pub write_out_full_list_only: bool,

    /// Skip the archive listing; use the existing manifest as the plan.
    #[arg(long, default_value_t = false)]
    pub skip_to_csv_load: bool,

    /// Stop listing each container after N entries (debug aid).
    #[arg(long)]
    pub test_amount: Option<usize>,

    /// Container(s) to list and restore from.
    #[arg(long = "container", required = true)]
    pub containers: Vec<String>,

    /// Base name used for `./csv_lists/<report_name>_<peer_id>.csv`.
    #[arg(long, default_value = "bucketeer_report")]
    pub report_name: String,

    /// Reads additional flags from the given path, one per line, spliced in
    /// before normal argument parsing (the original's `LoadFromFile` action).
    #[arg(long)]
    pub file: Option<PathBuf>,
}

/// Splunk credentials and cluster manager location, needed only when not
/// `--standalone`.
#[derive(Debug, Args)]
pub struct ClusterArgs {
    #[arg(long)]
    pub splunk_home: Option<PathBuf>,
    #[arg(long)]
    pub splunk_username: Option<String>,
    #[arg(long)]
    pub splunk_password: Option<String>,
    #[arg(long)]
    pub cluster_master: Option<String>,
    #[arg(long, default_value_t = 8089)]
    pub cluster_master_port: u16,
}

/// Filter-list arguments (§6, §8 "Filter precedence"), grounded on the
/// original's `isInList`.
#[derive(Debug, Args)]
pub struct FilterArgs {
    #[arg(long)]
    pub container_search_list: Vec<String>,
    #[arg(long, default_value = "substring")]
    pub container_search_list_type: MatchModeArg,
    #[arg(long)]
    pub container_ignore_list: Vec<String>,
    #[arg(long, default_value = "substring")]
    pub container_ignore_list_type: MatchModeArg,

    #[arg(long)]
    pub blob_search_list: Vec<String>,
    #[arg(long, default_value = "substring")]
    pub blob_search_list_type: MatchModeArg,
    #[arg(long)]
    pub blob_ignore_list: Vec<String>,
    #[arg(long, default_value = "substring")]
    pub blob_ignore_list_type: MatchModeArg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum MatchModeArg {
    Exact,
    Substring,
}

impl From<MatchModeArg> for bucketeer_backend::MatchMode {
    fn from(value: MatchModeArg) -> Self {
        match value {
            MatchModeArg::Exact => bucketeer_backend::MatchMode::Exact,
            MatchModeArg::Substring => bucketeer_backend::MatchMode::Substring,
        }
    }
}

/// Expands `--file <path>` into the process's argument list before `clap`
/// parses it, one flag per line, matching the original's `LoadFromFile`
/// argparse action.
pub fn expand_args_from_file(raw_args: Vec<String>) -> anyhow::Result<Vec<String>> {
    let mut expanded = Vec::with_capacity(raw_args.len());
    let mut iter = raw_args.into_iter();
    while let Some(arg) = iter.next() {
        if arg == "--file" {
            let path = iter.next().ok_or_else(|| anyhow::anyhow!("--file requires a path"))?;
            let contents = std::fs::read_to_string(&path)?;
            for line in contents.lines() {
                let line = line.trim();
                if line.is_empty() || line.starts_with('#') {
                    continue;
                }
                expanded.extend(line.split_whitespace().map(str::to_string));
            }
        } else {
            expanded.push(arg);
        }
    }
    Ok(expanded)
}

impl CliArgs {
    #[must_use]
    pub fn log_filter(&self) -> log::LevelFilter {
        match self.log_level {
            1 => log::LevelFilter::Warn,
            3 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Info,
        }
    }
}
