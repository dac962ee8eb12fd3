//! Concrete end-to-end scenarios (§8), exercised against the public API of
//! `bucketeer_core` the way an operator's run would hit them: build a
//! listing, plan it, persist the plan, then simulate downloads.

use bucketeer_core::{
    plan, ArchiveEntry, CsvManifestStore, DownloadState, ManifestRow, ManifestStore, PeerDirectory,
    SystemClock,
};
use bucketeer_testing::fixtures::{standalone_bucket, FakeBlobStore, FakePeerDirectory};

fn entry(archive_key: &str, size_bytes: u64, container: &str, download_root: &str) -> ArchiveEntry {
    ArchiveEntry {
        archive_key: archive_key.to_string(),
        size_bytes,
        container: container.to_string(),
        download_root: download_root.to_string(),
    }
}

#[test]
fn standalone_two_files_plan_and_download() {
    let entries = vec![
        entry("frozendata/foo/frozendb/db_100_200_7/rawdata/journal.gz", 1000, "c1", "./d/"),
        entry("frozendata/foo/frozendb/db_100_200_7/Hosts.data", 200, "c1", "./d/"),
    ];
    let peer_ids = vec!["P0".to_string()];
    let clock = SystemClock;
    let plans = plan(&entries, &peer_ids, |_| false, &clock).unwrap();

    assert_eq!(plans.len(), 1);
    assert_eq!(plans[0].len(), 2);

    let dir = tempfile::tempdir().unwrap();
    let store = CsvManifestStore::new(dir.path(), "report");
    let rows: Vec<ManifestRow> = plans[0].iter().map(|r| ManifestRow::from_record(r, Vec::new())).collect();
    store.append("P0", &rows).unwrap();

    // Stand in for the Azure Blob Downloader: seed a fake backend with the
    // expected bytes, then "download" by reading back through it rather than
    // writing the target file directly.
    let blob_store = FakeBlobStore::new();
    for record in &plans[0] {
        blob_store.put(&record.container, &record.archive_key, vec![0u8; record.size_bytes as usize]);
    }

    for record in &plans[0] {
        let bytes = blob_store.get(&record.container, &record.archive_key).unwrap();
        let target = dir.path().join(&record.container).join(&record.archive_key);
        std::fs::create_dir_all(target.parent().unwrap()).unwrap();
        std::fs::write(&target, &bytes).unwrap();
        store.mark("P0", &record.archive_key, DownloadState::Success, bytes.len() as f64 / (1024.0 * 1024.0)).unwrap();
    }

    let loaded = store.load("P0").unwrap();
    assert!(loaded.iter().all(|r| r.download_complete == DownloadState::Success));
}

#[test]
fn cluster_of_three_splits_four_buckets_one_per_peer_or_more() {
    const MB: u64 = 1024 * 1024;
    let mut entries = Vec::new();
    for (idx, size_mb) in [100u64, 100, 100, 700].into_iter().enumerate() {
        entries.push(entry(
            &format!("idx1/db_{idx}_{idx}_{idx}/rawdata/journal.gz"),
            size_mb * MB,
            "c1",
            "./d/",
        ));
    }
    let peer_ids = vec!["A".to_string(), "B".to_string(), "C".to_string()];
    let clock = SystemClock;
    let plans = plan(&entries, &peer_ids, |_| false, &clock).unwrap();

    // One 700MB bucket dominates the other three, so exact balance is not
    // achievable by moving whole atomic units; the invariant that must hold
    // is that every byte is accounted for exactly once, no bucket is split
    // across peers, and every peer gets a (possibly empty) plan.
    assert_eq!(plans.len(), 3);
    let total: u64 = plans.iter().flat_map(|p| p.iter()).map(|r| r.size_bytes).sum();
    assert_eq!(total, 1000 * MB);
    let bucket_count: usize = plans.iter().flat_map(|p| p.iter()).map(|r| r.bucket_key()).collect::<std::collections::HashSet<_>>().len();
    assert_eq!(bucket_count, 4);
}

#[test]
fn resume_after_crash_yields_only_unfinished_rows() {
    let dir = tempfile::tempdir().unwrap();
    let store = CsvManifestStore::new(dir.path(), "report");
    let rows: Vec<ManifestRow> = (0..10)
        .map(|i| {
            let record = bucketeer_core::parse_record(
                &format!("idx1/db_1_2_{i}/rawdata/journal.gz"),
                10,
                "c1",
                "./d/",
            )
            .unwrap()
            .unwrap();
            ManifestRow::from_record(&record, Vec::new())
        })
        .collect();
    store.append("A", &rows).unwrap();
    for row in rows.iter().take(4) {
        store.mark("A", &row.file_name, DownloadState::Success, 0.01).unwrap();
    }

    let loaded = store.load("A").unwrap();
    let active: Vec<_> = loaded.iter().filter(|r| r.download_complete != DownloadState::Success).collect();
    assert_eq!(active.len(), 6);
}

#[test]
fn standalone_to_cluster_rewrite_targets_local_peer_suffix() {
    let directory = FakePeerDirectory::new("G2", vec!["G1".to_string(), "G2".to_string()]);
    assert_eq!(directory.local_id(), "G2");
    assert_eq!(directory.peer_ids().unwrap(), vec!["G1".to_string(), "G2".to_string()]);

    let rewritten = bucketeer_backend::guid_rewrite(
        "state/idx1/frozendb/db_100_200_7/rawdata/journal.gz",
        100,
        200,
        7,
        true,
        true,
        directory.local_id(),
    );
    assert_eq!(
        rewritten,
        Some("state/idx1/frozendb/db_100_200_7_G2/rawdata/journal.gz".to_string())
    );
}

#[test]
fn zero_byte_metadata_is_retained_and_downloads_to_an_empty_file() {
    let entries = standalone_bucket("c1", "./d/", 100, 200, 7);
    let zero_byte = entries.iter().find(|e| e.archive_key.ends_with("bucket_info.csv")).unwrap();
    assert_eq!(zero_byte.size_bytes, 0);

    let peer_ids = vec!["P0".to_string()];
    let clock = SystemClock;
    let plans = plan(&entries, &peer_ids, |_| false, &clock).unwrap();
    let record = plans[0].iter().find(|r| r.archive_key.ends_with("bucket_info.csv")).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join(&record.container).join(&record.archive_key);
    std::fs::create_dir_all(target.parent().unwrap()).unwrap();
    std::fs::write(&target, []).unwrap();
    assert_eq!(std::fs::metadata(&target).unwrap().len(), 0);
}

#[test]
fn already_planned_rows_are_excluded_on_the_next_run() {
    let dir = tempfile::tempdir().unwrap();
    let store = CsvManifestStore::new(dir.path(), "report");
    let entries = vec![entry("idx1/db_1_2_3/rawdata/journal.gz", 5, "c1", "./d/")];
    let peer_ids = vec!["P0".to_string()];
    let clock = SystemClock;

    let plans = plan(&entries, &peer_ids, |_| false, &clock).unwrap();
    let rows: Vec<ManifestRow> = plans[0].iter().map(|r| ManifestRow::from_record(r, Vec::new())).collect();
    store.append("P0", &rows).unwrap();

    let already_planned = |archive_key: &str| store.value_exists("P0", "File_Name", archive_key).unwrap_or(false);
    let second_pass = plan(&entries, &peer_ids, already_planned, &clock).unwrap();
    assert!(second_pass[0].is_empty(), "the already-manifested record must not be re-planned");
}

#[test]
fn already_planned_check_must_span_every_peers_manifest() {
    // A record manifested for peer "A" must be excluded from the next plan
    // even though the dedup check is evaluated while planning for peer "B" —
    // checking only the asking peer's own manifest would let the two peers
    // compute different candidate sets from the same listing.
    let dir = tempfile::tempdir().unwrap();
    let store = CsvManifestStore::new(dir.path(), "report");
    let entries = vec![entry("idx1/db_1_2_3/rawdata/journal.gz", 5, "c1", "./d/")];
    let peer_ids = vec!["A".to_string(), "B".to_string()];
    let clock = SystemClock;

    let first_pass = plan(&entries, &peer_ids, |_| false, &clock).unwrap();
    let planned_for_a: Vec<ManifestRow> = first_pass[0].iter().map(|r| ManifestRow::from_record(r, Vec::new())).collect();
    if !planned_for_a.is_empty() {
        store.append("A", &planned_for_a).unwrap();
    }
    let planned_for_b: Vec<ManifestRow> = first_pass[1].iter().map(|r| ManifestRow::from_record(r, Vec::new())).collect();
    if !planned_for_b.is_empty() {
        store.append("B", &planned_for_b).unwrap();
    }

    let already_planned = |archive_key: &str| {
        peer_ids.iter().any(|peer_id| store.value_exists(peer_id, "File_Name", archive_key).unwrap_or(false))
    };
    let second_pass = plan(&entries, &peer_ids, already_planned, &clock).unwrap();
    assert!(second_pass.iter().all(|p| p.is_empty()), "a record already manifested for any peer must not be re-planned for any peer");
}

#[test]
fn fake_peer_directory_plugs_into_plan() {
    let directory = FakePeerDirectory::new("B", vec!["A".to_string(), "B".to_string(), "C".to_string()]);
    let peer_ids = directory.peer_ids().unwrap();
    let entries = vec![entry("idx1/db_1_2_3/rawdata/journal.gz", 10, "c1", "./d/")];
    let clock = SystemClock;
    let plans = plan(&entries, &peer_ids, |_| false, &clock).unwrap();
    assert_eq!(plans.len(), 3);
}
