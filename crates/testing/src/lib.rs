//! Test fixtures shared across the bucketeer workspace.

/// Synthetic archive listings, fake peer directories, and an in-memory blob
/// store for exercising the partitioner and pipeline without real Azure or
/// Splunk cluster-manager access.
pub mod fixtures;

use std::error::Error;
use std::ffi::OsStr;

use tempfile::NamedTempFile;

/// A test result.
pub type TestResult<T> = Result<T, Box<dyn Error>>;

/// Get a temporary file.
///
/// # Errors
///
/// If the temporary file could not be created.
pub fn get_temp_file() -> TestResult<NamedTempFile> {
    Ok(NamedTempFile::new()?)
}

/// Check if the given files differ.
///
/// # Errors
///
/// If the files could not be compared.
pub fn files_differ(
    path_left: impl AsRef<OsStr>,
    path_right: impl AsRef<OsStr>,
) -> TestResult<bool> {
    #[cfg(not(windows))]
    {
        let proc = std::process::Command::new("diff")
            .arg(path_left)
            .arg(path_right)
            .output()?;
        return Ok(!proc.stdout.is_empty());
    }

    #[cfg(windows)]
    {
        let proc = std::process::Command::new("fc.exe")
            .arg("/L")
            .arg(path_left)
            .arg(path_right)
            .output()?;
        let output = String::from_utf8(proc.stdout)?;
        Ok(!output.contains("FC: no differences encountered"))
    }
}
