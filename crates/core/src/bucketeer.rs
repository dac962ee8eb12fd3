//! The Bucketeer / Partitioner (§4.4): the algorithmic core of this system.
//!
//! Turns a flat list of archive entries into one size-balanced, atomicity-
//! preserving download plan per peer. Grounded on the original's
//! `orgnaizeFullListIntoBucketDicts` / `splitList` / `balanceListOfLists`
//! trio, restructured around the ordered-map + contiguous-chunk idiom the
//! original itself uses, and on this workspace's `commands::restore`-style
//! plan-building structure for how the stages compose.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::error::{BucketeerError, BucketeerResult};
use crate::record::{parse_record, BucketFileRecord, BucketKey, GroupKey};

/// One raw archive entry as handed to the Bucketeer, before parsing.
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    pub archive_key: String,
    pub size_bytes: u64,
    pub container: String,
    pub download_root: String,
}

/// All records sharing one `bucket_key`: the atomic unit moved by the balancer.
#[derive(Debug, Clone)]
struct AtomicUnit {
    bucket_key: BucketKey,
    records: Vec<BucketFileRecord>,
    total_bytes: u64,
}

impl AtomicUnit {
    fn total_bytes(records: &[BucketFileRecord]) -> u64 {
        records.iter().map(|r| r.size_bytes).sum()
    }
}

/// The Bucketeer's internal progress, mirroring §4.4's state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketeerState {
    Init,
    Parsing,
    Grouping,
    Splitting,
    Balancing,
    Emitting,
    Done,
    Failed,
}

/// A monotonic clock, injectable so tests can simulate the balancer's
/// wall-clock cap without actually waiting (Design Notes: "must use a
/// monotonic clock, not wall time").
pub trait Clock: std::fmt::Debug + Send + Sync {
    fn now(&self) -> Instant;
}

/// The real system clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// The 20-minute wall-clock cap on the size-balancing loop (§4.4(e), §5).
pub const BALANCE_TIMEOUT: Duration = Duration::from_secs(20 * 60);

/// Output of one full partitioning run: ordered per-peer plans, indexed the
/// same way as the sorted peer id list handed to [`plan`].
pub type PerPeerPlan = Vec<Vec<BucketFileRecord>>;

/// Runs the full Bucketeer pipeline: parse, group, subgroup, split, balance, emit.
///
/// `already_planned` is consulted once per parsed record and should return
/// `true` if the record's `archive_key` already appears in any peer's
/// manifest (stage (a) dedup); callers typically back this with the
/// [`crate::manifest::ManifestStore`].
pub fn plan(
    entries: &[ArchiveEntry],
    peer_ids: &[String],
    already_planned: impl Fn(&str) -> bool,
    clock: &dyn Clock,
) -> BucketeerResult<PerPeerPlan> {
    plan_with_timeout(entries, peer_ids, already_planned, clock, BALANCE_TIMEOUT)
}

/// As [`plan`], but with an overridable balance timeout (used by tests).
pub fn plan_with_timeout(
    entries: &[ArchiveEntry],
    peer_ids: &[String],
    already_planned: impl Fn(&str) -> bool,
    clock: &dyn Clock,
    balance_timeout: Duration,
) -> BucketeerResult<PerPeerPlan> {
    if entries.is_empty() || peer_ids.is_empty() {
        return Err(BucketeerError::EmptyInput);
    }

    // (a) Parse & Dedup.
    let mut records = Vec::with_capacity(entries.len());
    for entry in entries {
        match parse_record(
            &entry.archive_key,
            entry.size_bytes,
            &entry.container,
            &entry.download_root,
        ) {
            Ok(Some(record)) => {
                if !already_planned(&record.archive_key) {
                    records.push(record);
                }
            }
            Ok(None) => {
                log::debug!("skipping zero-byte non-metadata file {}", entry.archive_key);
            }
            Err(err) => {
                log::warn!("rejecting unparsable archive entry: {err}");
            }
        }
    }

    // (b) Group by group_key, preserving insertion order.
    let groups = group_by_group_key(records);

    // (c) Subgroup by bucket_key within each group, with the tie-break sort.
    let peer_count = peer_ids.len();
    let mut peer_units: Vec<Vec<AtomicUnit>> = vec![Vec::new(); peer_count];
    for (_group_key, group_records) in groups {
        let units = subgroup_by_bucket(group_records);
        let chunks = contiguous_chunks(units, peer_count);
        for (peer_idx, chunk) in chunks.into_iter().enumerate() {
            peer_units[peer_idx].extend(chunk);
        }
    }

    // (e) Size balance.
    let timed_out = balance(&mut peer_units, clock, balance_timeout);
    if timed_out {
        log::warn!("balancer hit its {:?} wall-clock cap; accepting current distribution", balance_timeout);
    }

    // (f) Emit.
    let per_peer_plan = peer_units
        .into_iter()
        .map(|units| units.into_iter().flat_map(|u| u.records).collect())
        .collect();

    Ok(per_peer_plan)
}

/// Groups records by `group_key`, returning groups in first-seen (insertion) order.
fn group_by_group_key(records: Vec<BucketFileRecord>) -> Vec<(GroupKey, Vec<BucketFileRecord>)> {
    let mut order: Vec<GroupKey> = Vec::new();
    let mut index: HashMap<GroupKey, usize> = HashMap::new();
    let mut groups: Vec<(GroupKey, Vec<BucketFileRecord>)> = Vec::new();

    for record in records {
        let key = record.group_key();
        let idx = *index.entry(key.clone()).or_insert_with(|| {
            order.push(key.clone());
            groups.push((key, Vec::new()));
            groups.len() - 1
        });
        groups[idx].1.push(record);
    }
    groups
}

/// Sorts a group's records by `(origin_guid, bucket_key)` then folds them
/// into atomic units in that sorted, first-seen order (§4.4 tie-break rule).
fn subgroup_by_bucket(mut records: Vec<BucketFileRecord>) -> Vec<AtomicUnit> {
    records.sort_by(|a, b| {
        (&a.origin_guid, a.earliest, a.latest, a.bucket_seq)
            .cmp(&(&b.origin_guid, b.earliest, b.latest, b.bucket_seq))
    });

    let mut order: Vec<BucketKey> = Vec::new();
    let mut index: HashMap<BucketKey, usize> = HashMap::new();
    let mut units: Vec<Vec<BucketFileRecord>> = Vec::new();

    for record in records {
        let key = record.bucket_key();
        let idx = *index.entry(key.clone()).or_insert_with(|| {
            order.push(key.clone());
            units.push(Vec::new());
            units.len() - 1
        });
        units[idx].push(record);
    }

    units
        .into_iter()
        .zip(order)
        .map(|(records, bucket_key)| {
            let total_bytes = AtomicUnit::total_bytes(&records);
            AtomicUnit {
                bucket_key,
                records,
                total_bytes,
            }
        })
        .collect()
}

/// Splits `items` into `n` contiguous sublists (§4.4(d)): chunk size is
/// `floor(total/n)`, and the first `total % n` chunks receive one extra item.
fn contiguous_chunks<T>(items: Vec<T>, n: usize) -> Vec<Vec<T>> {
    let total = items.len();
    let base = total / n.max(1);
    let remainder = total % n.max(1);
    let mut out: Vec<Vec<T>> = Vec::with_capacity(n);
    let mut iter = items.into_iter();
    for i in 0..n {
        let size = if i < remainder { base + 1 } else { base };
        out.push(iter.by_ref().take(size).collect());
    }
    out
}

/// Size-balances per-peer atomic-unit lists in place (§4.4(e)).
///
/// Returns `true` if the wall-clock cap was hit before the distribution
/// converged.
fn balance(peer_units: &mut [Vec<AtomicUnit>], clock: &dyn Clock, timeout: Duration) -> bool {
    let peer_count = peer_units.len();
    if peer_count < 2 {
        return false;
    }
    let start = clock.now();
    let margin_pct = (peer_count as f64 / 2.0).min(10.0);
    let margin_fraction = margin_pct / 100.0;

    loop {
        if clock.now().duration_since(start) >= timeout {
            return true;
        }

        let totals: Vec<u64> = peer_units
            .iter()
            .map(|units| units.iter().map(|u| u.total_bytes).sum())
            .collect();
        let total_all: u64 = totals.iter().sum();
        let mean = total_all as f64 / peer_count as f64;
        let margin = mean * margin_fraction;

        let below: Vec<usize> = (0..peer_count)
            .filter(|&i| (totals[i] as f64) < mean - margin)
            .collect();
        if below.is_empty() {
            return false;
        }
        let above: Vec<usize> = (0..peer_count)
            .filter(|&i| (totals[i] as f64) > mean + margin)
            .collect();
        if above.is_empty() {
            // Nothing left to donate; the remaining imbalance is unresolvable
            // with whole atomic units. Accept the current distribution.
            return false;
        }

        let mut moved_any = false;
        for &receiver in &below {
            for &donor in &above {
                loop {
                    if clock.now().duration_since(start) >= timeout {
                        return true;
                    }
                    let receiver_total: u64 = peer_units[receiver].iter().map(|u| u.total_bytes).sum();
                    let donor_total: u64 = peer_units[donor].iter().map(|u| u.total_bytes).sum();
                    if receiver_total as f64 >= mean {
                        break;
                    }
                    if donor_total as f64 <= mean + margin {
                        break;
                    }
                    let Some(candidate_size) = peer_units[donor].last().map(|u| u.total_bytes) else {
                        break;
                    };
                    // Only commit a transfer that actually shrinks the combined
                    // deviation of this pair; a unit too large to place without
                    // overshooting the receiver would just swap which side is
                    // out of balance, bouncing back and forth forever.
                    let deviation_now = (receiver_total as f64 - mean).abs() + (donor_total as f64 - mean).abs();
                    let deviation_after = ((receiver_total + candidate_size) as f64 - mean).abs()
                        + ((donor_total - candidate_size) as f64 - mean).abs();
                    if deviation_after >= deviation_now {
                        break;
                    }
                    let unit = peer_units[donor].pop().expect("just peeked via last()");
                    moved_any = true;
                    peer_units[receiver].push(unit);
                }
            }
        }
        if !moved_any {
            return false;
        }
    }
}
