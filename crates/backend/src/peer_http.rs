//! Peer Directory HTTP client (§4.2): asks a cluster manager for the list of
//! indexer peers so every node in a cluster agrees on the same partitioning
//! without talking to each other directly.
//!
//! Grounded on the original's `wr_splunk_wapi.py::getIDXClusterPeers`: a
//! single HTTPS GET against the cluster manager's
//! `/services/cluster/master/peers` endpoint, `output_mode=json`, whose
//! `entry[].content.peer_name` (or legacy `name`) fields are the peer ids.
//! The result feeds [`bucketeer_core::StaticPeerDirectory::new`]; this module
//! only resolves the list, it does not itself implement `PeerDirectory`.

use std::time::Duration;

use serde::Deserialize;

use crate::error::{BackendError, BackendResult};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct PeersResponse {
    entry: Vec<PeerEntry>,
}

#[derive(Debug, Deserialize)]
struct PeerEntry {
    content: PeerContent,
}

#[derive(Debug, Deserialize)]
struct PeerContent {
    #[serde(alias = "peer_name", alias = "name")]
    label: String,
}

/// Splunk credentials used to authenticate against the cluster manager.
#[derive(Debug, Clone)]
pub struct SplunkCredentials {
    pub username: String,
    pub password: String,
}

/// A thin client for one cluster manager's REST API.
#[derive(Debug, Clone)]
pub struct ClusterMasterClient {
    master_uri: String,
    credentials: Option<SplunkCredentials>,
    client: reqwest::blocking::Client,
}

impl ClusterMasterClient {
    /// `master_uri` is the cluster manager's base URI (`https://host:8089`),
    /// as found by [`crate::splunk_conf::find_cluster_master`].
    pub fn new(master_uri: impl Into<String>, credentials: Option<SplunkCredentials>) -> BackendResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|source| BackendError::PeerRequest {
                url: "<client build>".to_string(),
                source,
            })?;
        Ok(Self {
            master_uri: master_uri.into(),
            credentials,
            client,
        })
    }

    fn peers_url(&self) -> String {
        format!(
            "{}/services/cluster/master/peers?output_mode=json&count=0",
            self.master_uri.trim_end_matches('/')
        )
    }

    /// Fetches the current set of cluster peer identifiers. The caller is
    /// responsible for sorting/deduplicating via
    /// [`bucketeer_core::StaticPeerDirectory::new`].
    pub fn peer_ids(&self) -> BackendResult<Vec<String>> {
        let url = self.peers_url();
        let mut request = self.client.get(&url);
        if let Some(creds) = &self.credentials {
            request = request.basic_auth(&creds.username, Some(&creds.password));
        }
        let response = request.send().map_err(|source| BackendError::PeerRequest {
            url: url.clone(),
            source,
        })?;
        let parsed: PeersResponse = response
            .json()
            .map_err(|source| BackendError::PeerResponseParse { url: url.clone(), source })?;
        Ok(parsed.entry.into_iter().map(|e| e.content.label).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peers_url_appends_expected_path() {
        let client = ClusterMasterClient::new("https://cm.example.com:8089", None).unwrap();
        assert_eq!(
            client.peers_url(),
            "https://cm.example.com:8089/services/cluster/master/peers?output_mode=json&count=0"
        );
    }

    #[test]
    fn peers_url_trims_trailing_slash() {
        let client = ClusterMasterClient::new("https://cm.example.com:8089/", None).unwrap();
        assert!(!client.peers_url().contains("8089//services"));
    }
}
