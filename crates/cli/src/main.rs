//! `bucketeer`: restores archived Splunk index buckets from Azure Blob cold
//! storage onto a live indexer cluster (§6).

mod args;
mod logging;
mod orchestrator;

use clap::Parser;

use args::{expand_args_from_file, CliArgs};
use orchestrator::Orchestrator;

fn main() {
    if let Err(err) = run() {
        eprintln!("bucketeer: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let raw_args: Vec<String> = std::env::args().collect();
    let expanded = expand_args_from_file(raw_args)?;
    let args = CliArgs::parse_from(expanded);

    let today = today_tag();
    logging::init(args.log_filter(), &today)?;

    Orchestrator::new(args).run()
}

/// A `YYYY_MM_DD` tag for the rolling log file name.
fn today_tag() -> String {
    chrono::Local::now().format("%Y_%m_%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn today_tag_has_expected_shape() {
        let tag = today_tag();
        assert_eq!(tag.len(), 10);
        assert_eq!(tag.chars().nth(4), Some('_'));
        assert_eq!(tag.chars().nth(7), Some('_'));
    }
}
