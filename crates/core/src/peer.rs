//! Peer Directory: the sorted list of cluster peer identifiers.

use crate::error::{BucketeerError, BucketeerResult};

/// Exposes the local peer identifier and the sorted list of all peer identifiers.
///
/// The sort order is the *sole* mechanism by which peers agree on plan
/// assignment (§4.2), so any implementation must be stable and return
/// identical output on every peer given the same cluster state.
pub trait PeerDirectory: std::fmt::Debug + Send + Sync {
    /// The identifier of the peer this process is running on.
    fn local_id(&self) -> &str;

    /// The lexicographically sorted sequence of all cluster peer identifiers.
    fn peer_ids(&self) -> BucketeerResult<Vec<String>>;
}

/// A peer directory for a single, standalone (non-clustered) instance.
///
/// Always returns a single-element sequence equal to `local_id()`.
#[derive(Debug, Clone)]
pub struct StandalonePeerDirectory {
    local_id: String,
}

impl StandalonePeerDirectory {
    #[must_use]
    pub fn new(local_id: impl Into<String>) -> Self {
        Self {
            local_id: local_id.into(),
        }
    }
}

impl PeerDirectory for StandalonePeerDirectory {
    fn local_id(&self) -> &str {
        &self.local_id
    }

    fn peer_ids(&self) -> BucketeerResult<Vec<String>> {
        Ok(vec![self.local_id.clone()])
    }
}

/// A peer directory backed by an already-resolved, fixed set of peer ids.
///
/// Used by the cluster-mode path once the HTTP peer list has been fetched
/// (see `bucketeer_backend::peer_http`), and directly by tests.
#[derive(Debug, Clone)]
pub struct StaticPeerDirectory {
    local_id: String,
    peer_ids: Vec<String>,
}

impl StaticPeerDirectory {
    /// # Errors
    ///
    /// Returns an error if `peer_ids` is empty or does not contain `local_id`.
    pub fn new(local_id: impl Into<String>, mut peer_ids: Vec<String>) -> BucketeerResult<Self> {
        let local_id = local_id.into();
        if peer_ids.is_empty() {
            return Err(BucketeerError::EmptyPeerDirectory);
        }
        peer_ids.sort();
        if !peer_ids.iter().any(|id| id == &local_id) {
            return Err(BucketeerError::LocalPeerNotInDirectory { id: local_id });
        }
        Ok(Self { local_id, peer_ids })
    }
}

impl PeerDirectory for StaticPeerDirectory {
    fn local_id(&self) -> &str {
        &self.local_id
    }

    fn peer_ids(&self) -> BucketeerResult<Vec<String>> {
        Ok(self.peer_ids.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standalone_returns_single_peer() {
        let dir = StandalonePeerDirectory::new("P0");
        assert_eq!(dir.peer_ids().unwrap(), vec!["P0".to_string()]);
        assert_eq!(dir.local_id(), "P0");
    }

    #[test]
    fn static_directory_sorts_peers() {
        let dir = StaticPeerDirectory::new(
            "B",
            vec!["C".to_string(), "A".to_string(), "B".to_string()],
        )
        .unwrap();
        assert_eq!(
            dir.peer_ids().unwrap(),
            vec!["A".to_string(), "B".to_string(), "C".to_string()]
        );
    }

    #[test]
    fn static_directory_rejects_missing_local_id() {
        let err = StaticPeerDirectory::new("Z", vec!["A".to_string()]).unwrap_err();
        assert!(matches!(err, BucketeerError::LocalPeerNotInDirectory { .. }));
    }

    #[test]
    fn static_directory_rejects_empty() {
        let err = StaticPeerDirectory::new("A", vec![]).unwrap_err();
        assert!(matches!(err, BucketeerError::EmptyPeerDirectory));
    }
}
