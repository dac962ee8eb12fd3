/*!
Concrete collaborators for `bucketeer_core`: Azure Blob streaming, the
Splunk cluster-manager HTTP client, `.conf` file discovery, and archive
filtering.

Nothing here is required by the partitioner itself — `bucketeer_core` never
depends on this crate, only the other way around — so these pieces can be
swapped out (a different blob store, a mocked cluster manager) without
touching the planning or manifest logic.
*/

pub mod azure;
pub mod error;
pub mod filter;
pub mod local_dest;
pub mod peer_http;
pub mod splunk_conf;

pub use crate::azure::{guid_rewrite, AzureBlobDownloader, BlobEntry, DownloadOutcome, DownloadRequest, DOWNLOAD_TIMEOUT};
pub use crate::error::{BackendError, BackendResult};
pub use crate::filter::{ArchiveFilter, FilterList, MatchMode};
pub use crate::local_dest::LocalDestination;
pub use crate::peer_http::{ClusterMasterClient, SplunkCredentials};
pub use crate::splunk_conf::{find_cluster_master, read_local_guid};
