//! Error types for the partitioning and manifest core.

/// The result type used throughout this crate.
pub type BucketeerResult<T> = Result<T, BucketeerError>;

/// Errors produced while parsing records, partitioning work, or operating on manifests.
#[derive(thiserror::Error, Debug, displaydoc::Display)]
#[non_exhaustive]
pub enum BucketeerError {
    /// failed to parse bucket identity from archive key `{archive_key}`: {kind}
    RecordParse {
        archive_key: String,
        kind: ParseFailureKind,
    },
    /// manifest I/O failed for peer `{peer_id}`: {source}
    ManifestIo {
        peer_id: String,
        #[source]
        source: std::io::Error,
    },
    /// manifest for peer `{peer_id}` is missing the `{column}` column
    ManifestSchema { peer_id: String, column: String },
    /// manifest row for `{file_name}` is malformed: {reason}
    ManifestRow { file_name: String, reason: String },
    /// duplicate `File_Name` row `{file_name}` rejected by append for peer `{peer_id}`
    DuplicateRow { peer_id: String, file_name: String },
    /// peer directory has no peers
    EmptyPeerDirectory,
    /// local peer id `{id}` is not present in the peer directory
    LocalPeerNotInDirectory { id: String },
    /// partitioner received an empty input list
    EmptyInput,
    /// csv error: {0}
    Csv(#[from] csv::Error),
}

/// The specific parse step that rejected a record, per §4.1.
#[derive(thiserror::Error, Debug, displaydoc::Display, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ParseFailureKind {
    /// no `db_` or `rb_` bucket directory name found
    NoBucketDirectory,
    /// bucket directory name has fewer than the required `_`-delimited fields
    TooFewFields,
    /// `earliest` field is not a valid integer
    BadEarliest,
    /// `latest` field is not a valid integer
    BadLatest,
    /// `bucket_seq` field is not a valid integer
    BadBucketSeq,
}
