//! Synthetic archive listings, fake peer directories, and an in-memory blob
//! store: a `RwLock`-guarded map standing in for the real network backend.

use std::collections::BTreeMap;
use std::sync::RwLock;

use bucketeer_core::{ArchiveEntry, BucketeerResult, PeerDirectory};

/// Builds a standalone bucket's worth of archive entries: a `journal.gz`,
/// `rawdata/...`, and the usual small metadata files, all sharing one
/// `db_<earliest>_<latest>_<seq>` bucket directory.
#[must_use]
pub fn standalone_bucket(container: &str, download_root: &str, earliest: i64, latest: i64, bucket_seq: i64) -> Vec<ArchiveEntry> {
    let bucket_dir = format!("db_{earliest}_{latest}_{bucket_seq}");
    let files = [
        ("rawdata/journal.gz", 4096u64),
        ("rawdata/slicesv2.dat", 256),
        ("Hosts.data", 64),
        ("Sources.data", 64),
        ("SourceTypes.data", 64),
        ("bucket_info.csv", 0),
    ];
    files
        .iter()
        .map(|(leaf, size_bytes)| ArchiveEntry {
            archive_key: format!("idx1/{bucket_dir}/{leaf}"),
            size_bytes: *size_bytes,
            container: container.to_string(),
            download_root: download_root.to_string(),
        })
        .collect()
}

/// A [`PeerDirectory`] over a fixed, already-sorted id list, built without
/// [`bucketeer_core::StaticPeerDirectory`]'s validation — useful for tests
/// that want to exercise the error paths that validation would normally
/// prevent.
#[derive(Debug, Clone)]
pub struct FakePeerDirectory {
    local_id: String,
    peer_ids: Vec<String>,
}

impl FakePeerDirectory {
    #[must_use]
    pub fn new(local_id: impl Into<String>, peer_ids: Vec<String>) -> Self {
        Self {
            local_id: local_id.into(),
            peer_ids,
        }
    }
}

impl PeerDirectory for FakePeerDirectory {
    fn local_id(&self) -> &str {
        &self.local_id
    }

    fn peer_ids(&self) -> BucketeerResult<Vec<String>> {
        Ok(self.peer_ids.clone())
    }
}

/// An in-memory stand-in for [`bucketeer_backend::AzureBlobDownloader`]:
/// `container/archive_key` mapped to its bytes, so pipeline tests can run
/// without network access.
#[derive(Debug, Default)]
pub struct FakeBlobStore {
    blobs: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl FakeBlobStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn key(container: &str, archive_key: &str) -> String {
        format!("{container}/{archive_key}")
    }

    pub fn put(&self, container: &str, archive_key: &str, bytes: Vec<u8>) {
        self.blobs
            .write()
            .unwrap()
            .insert(Self::key(container, archive_key), bytes);
    }

    #[must_use]
    pub fn get(&self, container: &str, archive_key: &str) -> Option<Vec<u8>> {
        self.blobs.read().unwrap().get(&Self::key(container, archive_key)).cloned()
    }
}
