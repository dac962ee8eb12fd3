//! Logging setup (§6 persisted state layout, SPEC_FULL §A.2): `env_logger`
//! as the concrete subscriber, tee'd to a rolling `./logs/<date>_<name>.log`
//! file that rotates once it exceeds 50 MB.
//!
//! The rolling writer follows the teacher's plain `std::fs`-based file
//! handling (`local_destination.rs`): no log-rotation crate is pulled in for
//! what is, in this workspace, a single always-growing-then-rotating file.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

const ROLL_SIZE_BYTES: u64 = 50 * 1024 * 1024;

/// A `Write` sink that rotates to a fresh `<dir>/<date>_<name>.log` once the
/// current file exceeds [`ROLL_SIZE_BYTES`].
pub struct RollingLogWriter {
    dir: PathBuf,
    name: String,
    inner: Mutex<RollState>,
}

struct RollState {
    file: File,
    path: PathBuf,
    written: u64,
    generation: u32,
}

impl RollingLogWriter {
    pub fn new(dir: impl Into<PathBuf>, name: impl Into<String>, today: &str) -> io::Result<Self> {
        let dir = dir.into();
        let name = name.into();
        fs::create_dir_all(&dir)?;
        let (file, path, written) = open_generation(&dir, &name, today, 0)?;
        Ok(Self {
            dir,
            name,
            inner: Mutex::new(RollState {
                file,
                path,
                written,
                generation: 0,
            }),
        })
    }
}

fn open_generation(dir: &Path, name: &str, today: &str, generation: u32) -> io::Result<(File, PathBuf, u64)> {
    let file_name = if generation == 0 {
        format!("{today}_{name}.log")
    } else {
        format!("{today}_{name}.{generation}.log")
    };
    let path = dir.join(file_name);
    let file = OpenOptions::new().create(true).append(true).open(&path)?;
    let written = file.metadata().map(|m| m.len()).unwrap_or(0);
    Ok((file, path, written))
}

impl Write for RollingLogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.inner.lock().unwrap();
        if state.written >= ROLL_SIZE_BYTES {
            let today = current_date_tag(&state.path);
            state.generation += 1;
            let (file, path, written) = open_generation(&self.dir, &self.name, &today, state.generation)?;
            state.file = file;
            state.path = path;
            state.written = written;
        }
        let n = state.file.write(buf)?;
        state.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.lock().unwrap().file.flush()
    }
}

/// Re-derives the `YYYY_MM_DD` date tag already baked into the current log
/// file's name, so rotation within the same day keeps using it.
fn current_date_tag(path: &Path) -> String {
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("");
    let parts: Vec<&str> = stem.splitn(4, '_').collect();
    if parts.len() >= 3 {
        format!("{}_{}_{}", parts[0], parts[1], parts[2])
    } else {
        "0000_00_00".to_string()
    }
}

/// Initializes `env_logger` at `level`, teeing to both stderr and the
/// rolling file sink under `./logs/`.
pub fn init(level: log::LevelFilter, today: &str) -> io::Result<()> {
    let writer = RollingLogWriter::new("./logs", "bucketeer", today)?;
    let writer = Mutex::new(writer);

    env_logger::Builder::new()
        .filter_level(level)
        .format(move |_buf, record| {
            let line = format!(
                "{} {:<5} {}: {}\n",
                today,
                record.level(),
                record.target(),
                record.args()
            );
            eprint!("{line}");
            let _ = writer.lock().unwrap().write_all(line.as_bytes());
            Ok(())
        })
        .init();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotates_once_roll_size_is_exceeded() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = RollingLogWriter::new(dir.path(), "test", "2026_07_28").unwrap();
        writer.inner.get_mut().unwrap().written = ROLL_SIZE_BYTES;
        writer.write_all(b"hello\n").unwrap();
        assert_eq!(writer.inner.get_mut().unwrap().generation, 1);
        assert!(writer.inner.get_mut().unwrap().path.to_string_lossy().contains(".1.log"));
    }

    #[test]
    fn rotation_preserves_the_original_date_tag() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = RollingLogWriter::new(dir.path(), "test", "2026_07_28").unwrap();
        writer.inner.get_mut().unwrap().written = ROLL_SIZE_BYTES;
        writer.write_all(b"hello\n").unwrap();
        assert!(writer.inner.get_mut().unwrap().path.to_string_lossy().starts_with(dir.path().join("2026_07_28").to_string_lossy().as_ref()));
    }

    #[test]
    fn first_generation_uses_plain_date_name() {
        let dir = tempfile::tempdir().unwrap();
        let writer = RollingLogWriter::new(dir.path(), "test", "2026_07_28").unwrap();
        let state = writer.inner.lock().unwrap();
        assert!(state.path.ends_with("2026_07_28_test.log"));
    }
}
