//! Blob Downloader (§4.6): streams one archived blob from Azure Blob
//! storage to a local path and verifies its size.
//!
//! Grounded directly on the teacher's `OpenDALBackend` (`opendal`'s `azblob`
//! service, a `BlockingOperator` built once under a shared Tokio runtime,
//! `RetryLayer` for retries) for the Azure access pattern, and on the
//! original's `wr_azure_lib.py::downloadBlobByName` for the concurrency/
//! timeout/size-verification contract and the GUID rewrite hook.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::OnceLock;
use std::time::Duration;

use opendal::layers::{BlockingLayer, ConcurrentLimitLayer, LoggingLayer, RetryLayer};
use opendal::{BlockingOperator, Operator, Scheme};
use tokio::runtime::Runtime;

use crate::error::{BackendError, BackendResult};
use crate::local_dest::LocalDestination;

/// Internal multi-connection concurrency used per download (§4.6).
const DOWNLOAD_CONCURRENCY: usize = 5;
/// Per-object timeout (§4.6, §5).
pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(5000);
const DEFAULT_RETRY: usize = 5;

fn runtime() -> &'static Runtime {
    static RUNTIME: OnceLock<Runtime> = OnceLock::new();
    RUNTIME.get_or_init(|| {
        tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .expect("failed to build the Azure Blob downloader's Tokio runtime")
    })
}

/// One blob as seen in a container listing.
#[derive(Debug, Clone)]
pub struct BlobEntry {
    pub archive_key: String,
    pub size_bytes: u64,
}

/// Arguments to a single blob download.
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub archive_key: String,
    pub expected_size_bytes: u64,
    pub container: String,
    pub download_root: String,
    /// Overrides the on-disk leaf name; used for the GUID rewrite rule.
    pub rename: Option<String>,
    pub bypass_size_compare: bool,
}

/// Outcome of a single blob download (§4.6 step 3).
#[derive(Debug, Clone)]
pub struct DownloadOutcome {
    pub success: bool,
    pub expected_mb: f64,
    pub downloaded_mb: f64,
    pub target_path: PathBuf,
}

/// Streams blobs out of Azure Blob storage via `opendal`'s `azblob` service.
#[derive(Clone, Debug)]
pub struct AzureBlobDownloader {
    operator: BlockingOperator,
}

impl AzureBlobDownloader {
    /// Builds a downloader from a connect string and `opendal` options
    /// (account name/key, endpoint, container, etc. — whatever `azblob`
    /// expects via `Operator::via_map`).
    pub fn new(connect_string: impl AsRef<str>, mut options: HashMap<String, String>) -> BackendResult<Self> {
        options
            .entry("connections".to_string())
            .or_insert_with(|| DOWNLOAD_CONCURRENCY.to_string());

        let scheme = Scheme::from_str(connect_string.as_ref())
            .unwrap_or(Scheme::Azblob);
        let mut operator = Operator::via_map(scheme, options.clone())
            .map_err(BackendError::OperatorInit)?
            .layer(RetryLayer::new().with_max_times(DEFAULT_RETRY).with_jitter());

        if let Some(connections) = options.get("connections").and_then(|c| c.parse::<usize>().ok()) {
            operator = operator.layer(ConcurrentLimitLayer::new(connections));
        }

        let _guard = runtime().enter();
        let operator = operator
            .layer(LoggingLayer::default())
            .layer(BlockingLayer::create().map_err(BackendError::OperatorInit)?)
            .blocking();

        Ok(Self { operator })
    }

    /// Lists the blobs in a container, optionally capped after `test_amount`
    /// entries (`--test_amount`, a debug aid carried over from the original).
    pub fn list_container(
        &self,
        container: &str,
        test_amount: Option<usize>,
    ) -> BackendResult<Vec<BlobEntry>> {
        let prefix = format!("{container}/");
        let entries = self
            .operator
            .list_with(&prefix)
            .recursive(true)
            .metakey(opendal::Metakey::ContentLength)
            .call()
            .map_err(|source| BackendError::ContainerList {
                container: container.to_string(),
                source,
            })?;

        let mut blobs: Vec<BlobEntry> = entries
            .into_iter()
            .filter(|e| e.metadata().is_file())
            .map(|e| BlobEntry {
                archive_key: e.name().trim_start_matches('/').to_string(),
                size_bytes: e.metadata().content_length(),
            })
            .collect();

        if let Some(cap) = test_amount {
            blobs.truncate(cap);
        }
        Ok(blobs)
    }

    /// Downloads one blob (§4.6).
    pub fn download(&self, request: &DownloadRequest) -> BackendResult<DownloadOutcome> {
        let dest = LocalDestination::new(&request.download_root);
        let target_path = dest.target_path(&request.container, &request.archive_key, request.rename.as_deref());

        let source_path = format!("{}/{}", request.container, request.archive_key);
        let bytes = self
            .operator
            .read(&source_path)
            .map_err(|source| BackendError::BlobDownload {
                archive_key: request.archive_key.clone(),
                container: request.container.clone(),
                source,
            })?;

        dest.write(&target_path, &bytes.to_vec())?;

        let actual_bytes = dest.size_of(&target_path).unwrap_or(0);
        let success = request.bypass_size_compare || actual_bytes == request.expected_size_bytes;

        Ok(DownloadOutcome {
            success,
            expected_mb: bytes_to_mb(request.expected_size_bytes),
            downloaded_mb: bytes_to_mb(actual_bytes),
            target_path,
        })
    }
}

fn bytes_to_mb(bytes: u64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0)
}

/// GUID rewrite rule (§4.6): when a standalone record is downloaded by a
/// peer that belongs to a cluster, the leaf bucket directory name
/// `db_<e>_<l>_<seq>` becomes `db_<e>_<l>_<seq>_<local_peer_id>` before the
/// on-disk name is chosen.
///
/// Returns `None` when no rewrite applies (peer is standalone, or the record
/// is not itself standalone).
#[must_use]
pub fn guid_rewrite(
    archive_key: &str,
    earliest: i64,
    latest: i64,
    bucket_seq: i64,
    record_is_standalone: bool,
    local_peer_is_clustered: bool,
    local_peer_id: &str,
) -> Option<String> {
    if !record_is_standalone || !local_peer_is_clustered {
        return None;
    }
    let needle = format!("db_{earliest}_{latest}_{bucket_seq}");
    let replacement = format!("db_{earliest}_{latest}_{bucket_seq}_{local_peer_id}");
    if archive_key.contains(&needle) {
        Some(archive_key.replacen(&needle, &replacement, 1))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guid_rewrite_applies_for_standalone_record_on_clustered_peer() {
        let rewritten = guid_rewrite(
            "state/idx/frozendb/db_100_200_7/rawdata/journal.gz",
            100,
            200,
            7,
            true,
            true,
            "G2",
        )
        .unwrap();
        assert_eq!(
            rewritten,
            "state/idx/frozendb/db_100_200_7_G2/rawdata/journal.gz"
        );
    }

    #[test]
    fn guid_rewrite_is_noop_on_standalone_peer() {
        assert!(guid_rewrite(
            "state/idx/frozendb/db_100_200_7/rawdata/journal.gz",
            100,
            200,
            7,
            true,
            false,
            "G2",
        )
        .is_none());
    }

    #[test]
    fn guid_rewrite_is_noop_for_non_standalone_record() {
        assert!(guid_rewrite(
            "state/idx/frozendb/db_100_200_7_GUID1/rawdata/journal.gz",
            100,
            200,
            7,
            false,
            true,
            "G2",
        )
        .is_none());
    }
}
