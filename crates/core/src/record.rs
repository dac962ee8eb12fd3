//! The Bucket Identity Parser and its output type, the Bucket File Record.

use crate::error::{BucketeerError, ParseFailureKind};

/// Extensions that are allowed to be zero bytes without being skipped.
///
/// These are Splunk metadata files that are legitimately empty for some
/// buckets (e.g. an index with no optimized journal segments yet).
const ZERO_SIZE_ALLOWED_SUFFIXES: &[&str] = &[
    ".csv",
    ".result",
    ".tsidx",
    ".bloomfilter",
    ".data",
    "journal.gz",
    ".dat",
];

/// The granularity at which files must be co-located on a single peer.
///
/// `(state_segment, index_segment, db_segment, replicated)`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GroupKey {
    pub state_segment: String,
    pub index_segment: String,
    pub db_segment: String,
    pub replicated: bool,
}

/// Identifies a single logical bucket across all of its files.
///
/// `(earliest, latest, bucket_seq, origin_guid)`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BucketKey {
    pub earliest: i64,
    pub latest: i64,
    pub bucket_seq: i64,
    pub origin_guid: String,
}

/// An immutable value derived from one archive entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketFileRecord {
    pub archive_key: String,
    pub size_bytes: u64,
    pub container: String,
    pub download_root: String,
    pub state_segment: String,
    pub index_segment: String,
    pub db_segment: String,
    pub earliest: i64,
    pub latest: i64,
    pub bucket_seq: i64,
    pub origin_guid: String,
    pub replicated: bool,
    pub standalone: bool,
}

impl BucketFileRecord {
    /// The granularity at which this record must be spread across peers.
    #[must_use]
    pub fn group_key(&self) -> GroupKey {
        GroupKey {
            state_segment: self.state_segment.clone(),
            index_segment: self.index_segment.clone(),
            db_segment: self.db_segment.clone(),
            replicated: self.replicated,
        }
    }

    /// Identifies the logical bucket this record belongs to.
    #[must_use]
    pub fn bucket_key(&self) -> BucketKey {
        BucketKey {
            earliest: self.earliest,
            latest: self.latest,
            bucket_seq: self.bucket_seq,
            origin_guid: self.origin_guid.clone(),
        }
    }
}

/// Returns `true` if a zero-byte file at `archive_key` is still worth keeping.
fn zero_size_allowed(archive_key: &str) -> bool {
    let lower = archive_key.to_ascii_lowercase();
    ZERO_SIZE_ALLOWED_SUFFIXES
        .iter()
        .any(|suffix| lower.ends_with(suffix))
}

/// Parses one archive entry into a [`BucketFileRecord`].
///
/// Returns `Ok(None)` when the entry is a zero-byte file that is not one of
/// the known-empty Splunk metadata extensions; such entries are skipped, not
/// rejected. Returns `Err` when the bucket identity itself could not be
/// parsed (§4.1).
pub fn parse_record(
    archive_key: &str,
    size_bytes: u64,
    container: &str,
    download_root: &str,
) -> Result<Option<BucketFileRecord>, BucketeerError> {
    if size_bytes == 0 && !zero_size_allowed(archive_key) {
        return Ok(None);
    }

    let reject = |kind: ParseFailureKind| BucketeerError::RecordParse {
        archive_key: archive_key.to_string(),
        kind,
    };

    let separator = if archive_key.contains('/') {
        '/'
    } else if archive_key.contains('\\') {
        '\\'
    } else {
        '/'
    };

    let db_at = archive_key.find("db_");
    let rb_at = archive_key.find("rb_");
    let (start, replicated) = match (db_at, rb_at) {
        (Some(d), Some(r)) if r < d => (r, true),
        (Some(d), _) => (d, false),
        (None, Some(r)) => (r, true),
        (None, None) => return Err(reject(ParseFailureKind::NoBucketDirectory)),
    };

    let rest = &archive_key[start..];
    let end = rest.find(['/', '\\']).unwrap_or(rest.len());
    let bucket_dir_name = &rest[..end];

    let segments: Vec<&str> = archive_key[..start].split(['/', '\\']).collect();
    // `segments` excludes the bucket directory name itself; the segment
    // immediately before it (closest to the leaf) is the `db_segment`.
    let segments: Vec<&str> = segments.into_iter().filter(|s| !s.is_empty()).collect();
    let n = segments.len();
    let db_segment = if n >= 1 {
        segments[n - 1].to_string()
    } else {
        separator.to_string()
    };
    let index_segment = if n >= 2 {
        segments[n - 2].to_string()
    } else {
        separator.to_string()
    };
    let state_segment = if n >= 3 {
        segments[n - 3].to_string()
    } else {
        separator.to_string()
    };

    let fields: Vec<&str> = bucket_dir_name.split('_').collect();
    if fields.len() < 4 {
        return Err(reject(ParseFailureKind::TooFewFields));
    }
    let earliest: i64 = fields[1]
        .parse()
        .map_err(|_| reject(ParseFailureKind::BadEarliest))?;
    let latest: i64 = fields[2]
        .parse()
        .map_err(|_| reject(ParseFailureKind::BadLatest))?;
    let bucket_seq: i64 = fields[3]
        .parse()
        .map_err(|_| reject(ParseFailureKind::BadBucketSeq))?;

    let (origin_guid, standalone) = match fields.get(4) {
        Some(guid) if !guid.is_empty() => (guid.to_string(), false),
        _ => ("none".to_string(), true),
    };

    Ok(Some(BucketFileRecord {
        archive_key: archive_key.to_string(),
        size_bytes,
        container: container.to_string(),
        download_root: download_root.to_string(),
        state_segment,
        index_segment,
        db_segment,
        earliest,
        latest,
        bucket_seq,
        origin_guid,
        replicated,
        standalone,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_standalone_cluster_style_bucket() {
        let rec = parse_record(
            "frozendata/foo/frozendb/db_100_200_7/rawdata/journal.gz",
            1000,
            "c1",
            "./d/",
        )
        .unwrap()
        .unwrap();
        assert_eq!(rec.state_segment, "frozendata");
        assert_eq!(rec.index_segment, "foo");
        assert_eq!(rec.db_segment, "frozendb");
        assert_eq!(rec.earliest, 100);
        assert_eq!(rec.latest, 200);
        assert_eq!(rec.bucket_seq, 7);
        assert_eq!(rec.origin_guid, "none");
        assert!(rec.standalone);
        assert!(!rec.replicated);
    }

    #[test]
    fn parses_guid_and_replicated_flag() {
        let rec = parse_record(
            "frozendata/foo/frozendb/rb_1_2_3_GUID-ABC/rawdata/journal.gz",
            42,
            "c1",
            "./d/",
        )
        .unwrap()
        .unwrap();
        assert!(rec.replicated);
        assert!(!rec.standalone);
        assert_eq!(rec.origin_guid, "GUID-ABC");
    }

    #[test]
    fn rejects_missing_bucket_directory() {
        let err = parse_record("foo/bar/baz.txt", 10, "c1", "./d/").unwrap_err();
        assert!(matches!(
            err,
            BucketeerError::RecordParse {
                kind: ParseFailureKind::NoBucketDirectory,
                ..
            }
        ));
    }

    #[test]
    fn zero_byte_metadata_is_kept() {
        let rec = parse_record(
            "frozendata/foo/frozendb/db_1_2_3/optimize.result",
            0,
            "c1",
            "./d/",
        )
        .unwrap();
        assert!(rec.is_some());
    }

    #[test]
    fn zero_byte_non_metadata_is_skipped() {
        let rec = parse_record(
            "frozendata/foo/frozendb/db_1_2_3/somefile.bin",
            0,
            "c1",
            "./d/",
        )
        .unwrap();
        assert!(rec.is_none());
    }

    #[test]
    fn internal_db_shape_falls_back_to_separator() {
        let rec = parse_record("db_1_2_3/rawdata/journal.gz", 5, "c1", "./d/")
            .unwrap()
            .unwrap();
        assert_eq!(rec.state_segment, "/");
        assert_eq!(rec.index_segment, "/");
    }
}
