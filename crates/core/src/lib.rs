/*!
A library for partitioning and restoring archived Splunk index buckets onto a
live cluster of indexer peers.

# Overview

The central type is [`bucketeer::plan`], which turns a flat archive listing
into one size-balanced, atomicity-preserving download plan per peer — see
[`record`] for the data model it operates on and [`manifest`] for how a plan
and its progress are persisted across runs.

Around the partitioner sit the pieces that execute a plan once it has been
assigned to the local peer: [`pool`] (a bounded-concurrency job executor) and
[`reaper`] (which watches completions and folds them back into the
manifest). [`peer`] supplies the sorted peer-id list the partitioner needs to
agree with every other peer without talking to them directly.

# Crate features

This crate has no optional features; concrete backends (Azure Blob streaming,
the Splunk cluster-manager HTTP client) live in `bucketeer_backend`, which
depends on this crate rather than the other way around.
*/

pub mod bucketeer;
pub mod error;
pub mod manifest;
pub mod peer;
pub mod pool;
pub mod progress;
pub mod reaper;
pub mod record;

pub use crate::bucketeer::{plan, plan_with_timeout, ArchiveEntry, BucketeerState, Clock, PerPeerPlan, SystemClock, BALANCE_TIMEOUT};
pub use crate::error::{BucketeerError, BucketeerResult, ParseFailureKind};
pub use crate::manifest::{CsvManifestStore, DownloadState, ManifestRow, ManifestStore, BASE_COLUMNS};
pub use crate::peer::{PeerDirectory, StandalonePeerDirectory, StaticPeerDirectory};
pub use crate::pool::{CompletedJob, TimingSnapshot, WorkerPool, WorkerPoolConfig};
pub use crate::progress::{BucketeerProgress, HiddenProgress, NoProgress, NoProgressBars, Progress, ProgressBars, ProgressType};
pub use crate::reaper::{DownloadJob, ManifestUpdate, ProgressReaper, SWEEP_INTERVAL};
pub use crate::record::{parse_record, BucketFileRecord, BucketKey, GroupKey};
