//! Error types for the concrete backends: Azure Blob streaming, the Splunk
//! cluster-manager HTTP client, and `.conf` file discovery.

/// The result type used throughout this crate.
pub type BackendResult<T> = Result<T, BackendError>;

/// Errors raised by the concrete collaborators in this crate.
#[derive(thiserror::Error, Debug, displaydoc::Display)]
#[non_exhaustive]
pub enum BackendError {
    /// failed to construct the Azure Blob operator: {0}
    OperatorInit(#[source] opendal::Error),
    /// failed to list container `{container}`: {source}
    ContainerList {
        container: String,
        #[source]
        source: opendal::Error,
    },
    /// failed to download blob `{archive_key}` from container `{container}`: {source}
    BlobDownload {
        archive_key: String,
        container: String,
        #[source]
        source: opendal::Error,
    },
    /// failed to create parent directories for `{path}`: {source}
    TargetDirCreate {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// failed to write downloaded bytes to `{path}`: {source}
    TargetWrite {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// peer directory request to `{url}` failed: {source}
    PeerRequest {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    /// peer directory response from `{url}` was not valid JSON: {source}
    PeerResponseParse {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    /// `{path}` has no `[general]` stanza with a `guid` key
    LocalGuidNotFound { path: String },
    /// no `server.conf` under `{splunk_home}` names a cluster master
    ClusterMasterNotFound { splunk_home: String },
    /// failed to read `{path}`: {source}
    ConfRead {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
