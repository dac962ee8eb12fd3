//! Manifest Store: per-peer CSV files recording the plan and download progress.
//!
//! The manifest is the source of truth for resume (§3, §4.3). Writes are
//! expected to be serialized per peer by a single-consumer queue
//! (`crate::pool`/the orchestrator); this module itself is not responsible
//! for that serialization, only for the file format and atomic operations on
//! it.

use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use crate::error::{BucketeerError, BucketeerResult};
use crate::record::BucketFileRecord;

/// The fixed column schema, in on-disk order (§4.3).
pub const BASE_COLUMNS: &[&str] = &[
    "File_Name",
    "Expected_File_Size_bytes",
    "Expected_File_Size_MB",
    "Was_Standalone",
    "Bucket_ID",
    "db_Bucket(not_rb)",
    "Download_Complete",
    "Downloaded_File_Size_MB",
];

/// Download state of a single manifest row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadState {
    Pending,
    Success,
    Failed,
}

impl DownloadState {
    fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Success => "SUCCESS",
            Self::Failed => "FAILED",
        }
    }

    fn parse(s: &str) -> Self {
        match s {
            "SUCCESS" => Self::Success,
            "FAILED" => Self::Failed,
            _ => Self::Pending,
        }
    }
}

/// One row of a peer's manifest.
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestRow {
    pub file_name: String,
    pub expected_file_size_bytes: u64,
    pub expected_file_size_mb: f64,
    pub was_standalone: bool,
    pub bucket_id: String,
    pub db_bucket_not_rb: bool,
    pub download_complete: DownloadState,
    pub downloaded_file_size_mb: f64,
    pub additional: Vec<String>,
}

impl ManifestRow {
    /// Builds a fresh `PENDING` row from a parsed record, with optional passthrough columns.
    #[must_use]
    pub fn from_record(record: &BucketFileRecord, additional: Vec<String>) -> Self {
        let key = record.bucket_key();
        Self {
            file_name: record.archive_key.clone(),
            expected_file_size_bytes: record.size_bytes,
            expected_file_size_mb: bytes_to_mb(record.size_bytes),
            was_standalone: record.standalone,
            bucket_id: format!(
                "{}_{}_{}_{}",
                key.earliest, key.latest, key.bucket_seq, key.origin_guid
            ),
            db_bucket_not_rb: !record.replicated,
            download_complete: DownloadState::Pending,
            downloaded_file_size_mb: 0.0,
            additional,
        }
    }

    fn to_csv_fields(&self) -> Vec<String> {
        let mut fields = vec![
            self.file_name.clone(),
            self.expected_file_size_bytes.to_string(),
            format!("{:.6}", self.expected_file_size_mb),
            self.was_standalone.to_string(),
            self.bucket_id.clone(),
            self.db_bucket_not_rb.to_string(),
            self.download_complete.as_str().to_string(),
            format!("{:.6}", self.downloaded_file_size_mb),
        ];
        fields.extend(self.additional.iter().cloned());
        fields
    }

    fn from_csv_record(record: &csv::StringRecord) -> BucketeerResult<Self> {
        let get = |idx: usize, column: &str| -> BucketeerResult<&str> {
            record.get(idx).ok_or_else(|| BucketeerError::ManifestRow {
                file_name: record.get(0).unwrap_or_default().to_string(),
                reason: format!("missing column {column}"),
            })
        };
        let file_name = get(0, "File_Name")?.to_string();
        let expected_file_size_bytes = get(1, "Expected_File_Size_bytes")?
            .parse()
            .map_err(|_| BucketeerError::ManifestRow {
                file_name: file_name.clone(),
                reason: "Expected_File_Size_bytes is not an integer".to_string(),
            })?;
        let expected_file_size_mb = get(2, "Expected_File_Size_MB")?
            .parse()
            .unwrap_or_default();
        let was_standalone = get(3, "Was_Standalone")?.eq_ignore_ascii_case("true");
        let bucket_id = get(4, "Bucket_ID")?.to_string();
        let db_bucket_not_rb = get(5, "db_Bucket(not_rb)")?.eq_ignore_ascii_case("true");
        let download_complete = DownloadState::parse(get(6, "Download_Complete")?);
        let downloaded_file_size_mb = get(7, "Downloaded_File_Size_MB")?
            .parse()
            .unwrap_or_default();
        let additional = record.iter().skip(8).map(str::to_string).collect();

        Ok(Self {
            file_name,
            expected_file_size_bytes,
            expected_file_size_mb,
            was_standalone,
            bucket_id,
            db_bucket_not_rb,
            download_complete,
            downloaded_file_size_mb,
            additional,
        })
    }
}

fn bytes_to_mb(bytes: u64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0)
}

/// Per-peer manifest operations (§4.3).
pub trait ManifestStore: std::fmt::Debug + Send + Sync {
    /// Whether a manifest file already exists for `peer_id`.
    fn exists(&self, peer_id: &str) -> bool;

    /// Loads the ordered rows of a peer's manifest.
    fn load(&self, peer_id: &str) -> BucketeerResult<Vec<ManifestRow>>;

    /// Atomically appends rows. Rejects any row whose `file_name` already
    /// exists in the manifest.
    fn append(&self, peer_id: &str, rows: &[ManifestRow]) -> BucketeerResult<()>;

    /// Idempotently updates the download-state cell for one row.
    fn mark(
        &self,
        peer_id: &str,
        file_name: &str,
        state: DownloadState,
        downloaded_mb: f64,
    ) -> BucketeerResult<()>;

    /// Returns whether any row's `column` equals `value`, used to dedupe
    /// against prior runs (§4.4(a)).
    fn value_exists(&self, peer_id: &str, column: &str, value: &str) -> BucketeerResult<bool>;
}

/// A [`ManifestStore`] backed by `{base_dir}/{report_name}_{peer_id}.csv` files.
///
/// Grounded on the fixed schema in §4.3 and the "CSV-as-database" contract in
/// the Design Notes: append-only writes, random-access cell updates,
/// scan-column-for-value.
#[derive(Debug, Clone)]
pub struct CsvManifestStore {
    base_dir: PathBuf,
    report_name: String,
}

impl CsvManifestStore {
    #[must_use]
    pub fn new(base_dir: impl Into<PathBuf>, report_name: impl Into<String>) -> Self {
        Self {
            base_dir: base_dir.into(),
            report_name: report_name.into(),
        }
    }

    fn path_for(&self, peer_id: &str) -> PathBuf {
        self.base_dir
            .join(format!("{}_{}.csv", self.report_name, peer_id))
    }

    fn write_all(&self, path: &Path, rows: &[ManifestRow]) -> BucketeerResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| BucketeerError::ManifestIo {
                peer_id: path.display().to_string(),
                source,
            })?;
        }
        let tmp_path = path.with_extension("csv.tmp");
        {
            let file = fs::File::create(&tmp_path).map_err(|source| BucketeerError::ManifestIo {
                peer_id: path.display().to_string(),
                source,
            })?;
            let mut writer = csv::Writer::from_writer(file);
            writer
                .write_record(BASE_COLUMNS)
                .map_err(BucketeerError::Csv)?;
            for row in rows {
                writer
                    .write_record(row.to_csv_fields())
                    .map_err(BucketeerError::Csv)?;
            }
            writer.flush().map_err(|source| BucketeerError::ManifestIo {
                peer_id: path.display().to_string(),
                source,
            })?;
        }
        fs::rename(&tmp_path, path).map_err(|source| BucketeerError::ManifestIo {
            peer_id: path.display().to_string(),
            source,
        })
    }
}

impl ManifestStore for CsvManifestStore {
    fn exists(&self, peer_id: &str) -> bool {
        self.path_for(peer_id).is_file()
    }

    fn load(&self, peer_id: &str) -> BucketeerResult<Vec<ManifestRow>> {
        let path = self.path_for(peer_id);
        if !path.is_file() {
            return Ok(Vec::new());
        }
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_path(&path)
            .map_err(BucketeerError::Csv)?;
        let mut rows = Vec::new();
        for result in reader.records() {
            let record = result.map_err(BucketeerError::Csv)?;
            rows.push(ManifestRow::from_csv_record(&record)?);
        }
        Ok(rows)
    }

    fn append(&self, peer_id: &str, new_rows: &[ManifestRow]) -> BucketeerResult<()> {
        let mut rows = self.load(peer_id)?;
        for new_row in new_rows {
            if rows.iter().any(|r| r.file_name == new_row.file_name) {
                return Err(BucketeerError::DuplicateRow {
                    peer_id: peer_id.to_string(),
                    file_name: new_row.file_name.clone(),
                });
            }
        }
        rows.extend(new_rows.iter().cloned());
        self.write_all(&self.path_for(peer_id), &rows)
    }

    fn mark(
        &self,
        peer_id: &str,
        file_name: &str,
        state: DownloadState,
        downloaded_mb: f64,
    ) -> BucketeerResult<()> {
        let mut rows = self.load(peer_id)?;
        let row = rows
            .iter_mut()
            .find(|r| r.file_name == file_name)
            .ok_or_else(|| BucketeerError::ManifestRow {
                file_name: file_name.to_string(),
                reason: "no such row to mark".to_string(),
            })?;
        row.download_complete = state;
        row.downloaded_file_size_mb = downloaded_mb;
        self.write_all(&self.path_for(peer_id), &rows)
    }

    fn value_exists(&self, peer_id: &str, column: &str, value: &str) -> BucketeerResult<bool> {
        let rows = self.load(peer_id)?;
        Ok(rows.iter().any(|r| match column {
            "File_Name" => r.file_name == value,
            "Bucket_ID" => r.bucket_id == value,
            "Download_Complete" => r.download_complete.as_str() == value,
            _ => false,
        }))
    }
}

/// Retries a manifest operation with the bounded backoff policy from §7
/// ("Retry 4x at 100ms; on exhaustion log and surface").
pub fn with_manifest_retry<T>(
    mut op: impl FnMut() -> BucketeerResult<T>,
) -> BucketeerResult<T> {
    const MAX_ATTEMPTS: u32 = 4;
    const DELAY: std::time::Duration = std::time::Duration::from_millis(100);
    let mut attempt = 0;
    loop {
        match op() {
            Ok(value) => return Ok(value),
            Err(err) if attempt < MAX_ATTEMPTS => {
                attempt += 1;
                log::warn!("manifest operation failed (attempt {attempt}/{MAX_ATTEMPTS}): {err}");
                std::thread::sleep(DELAY);
            }
            Err(err) => {
                log::error!("manifest operation exhausted retries: {err}");
                return Err(err);
            }
        }
    }
}
