//! Minimal `.conf` stanza reader for the two local-install facts the
//! partitioner needs: this peer's GUID (`instance.cfg`) and its cluster
//! manager's URI (`server.conf`).
//!
//! Splunk's `.conf` format (`[stanza]` headers, `key = value` lines, `#`/`;`
//! comments) has no crate in this workspace's dependency set, so this one
//! file is hand-rolled rather than pulled from a library — grounded on the
//! original's `wr_splunk_wapi.py`, which reads the same two files the same
//! way (`instance.cfg`'s `[general]/guid`, and `server.conf`'s
//! `[clustering]` stanza for a peer, or `[clustermaster:*]`-style stanzas
//! for a multi-site search head).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{BackendError, BackendResult};

type Stanzas = HashMap<String, HashMap<String, String>>;

fn read_stanzas(path: &Path) -> BackendResult<Stanzas> {
    let contents = std::fs::read_to_string(path).map_err(|source| BackendError::ConfRead {
        path: path.display().to_string(),
        source,
    })?;

    let mut stanzas: Stanzas = HashMap::new();
    let mut current = String::new();
    stanzas.entry(current.clone()).or_default();

    for raw_line in contents.lines() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if line.starts_with('[') && line.ends_with(']') {
            current = line[1..line.len() - 1].to_string();
            stanzas.entry(current.clone()).or_default();
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            stanzas
                .entry(current.clone())
                .or_default()
                .insert(key.trim().to_string(), value.trim().to_string());
        }
    }
    Ok(stanzas)
}

/// Reads the local peer's GUID from `$SPLUNK_HOME/etc/instance.cfg`'s
/// `[general]` stanza.
pub fn read_local_guid(splunk_home: impl AsRef<Path>) -> BackendResult<String> {
    let path = splunk_home.as_ref().join("etc").join("instance.cfg");
    let stanzas = read_stanzas(&path)?;
    stanzas
        .get("general")
        .and_then(|kv| kv.get("guid"))
        .cloned()
        .ok_or_else(|| BackendError::LocalGuidNotFound {
            path: path.display().to_string(),
        })
}

/// Scans `$SPLUNK_HOME/etc/system/local/server.conf` (falling back to
/// `etc/system/default/server.conf`) for the `[clustering]` stanza's
/// `master_uri` (pre-8.3) or `manager_uri` (8.3+) key.
pub fn find_cluster_master(splunk_home: impl AsRef<Path>) -> BackendResult<String> {
    let splunk_home = splunk_home.as_ref();
    let candidates = [
        splunk_home.join("etc").join("system").join("local").join("server.conf"),
        splunk_home.join("etc").join("system").join("default").join("server.conf"),
    ];

    for path in &candidates {
        if !path.exists() {
            continue;
        }
        if let Some(uri) = master_uri_from(path)? {
            return Ok(uri);
        }
    }

    Err(BackendError::ClusterMasterNotFound {
        splunk_home: splunk_home.display().to_string(),
    })
}

fn master_uri_from(path: &PathBuf) -> BackendResult<Option<String>> {
    let stanzas = read_stanzas(path)?;
    Ok(stanzas.get("clustering").and_then(|kv| {
        kv.get("manager_uri")
            .or_else(|| kv.get("master_uri"))
            .cloned()
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, rel: &str, contents: &str) {
        let path = dir.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    #[test]
    fn reads_guid_from_instance_cfg() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "etc/instance.cfg",
            "[general]\nguid = ABCD-1234\nserverName = idx1\n",
        );
        assert_eq!(read_local_guid(dir.path()).unwrap(), "ABCD-1234");
    }

    #[test]
    fn missing_guid_stanza_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "etc/instance.cfg", "[general]\nserverName = idx1\n");
        assert!(read_local_guid(dir.path()).is_err());
    }

    #[test]
    fn finds_manager_uri_over_legacy_master_uri() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "etc/system/local/server.conf",
            "[clustering]\nmode = peer\nmanager_uri = https://cm.example.com:8089\n",
        );
        assert_eq!(
            find_cluster_master(dir.path()).unwrap(),
            "https://cm.example.com:8089"
        );
    }

    #[test]
    fn falls_back_to_default_server_conf() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "etc/system/default/server.conf",
            "[clustering]\nmaster_uri = https://cm2.example.com:8089\n",
        );
        assert_eq!(
            find_cluster_master(dir.path()).unwrap(),
            "https://cm2.example.com:8089"
        );
    }
}
