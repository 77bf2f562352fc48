// src/core/output.rs
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::debug;

use crate::error::{ScrapeResult, ScrapeError};

/// Permission bits of every written output file
#[cfg(unix)]
pub const OUTPUT_MODE: u32 = 0o644;

/// Writes JSON documents so readers only ever see a complete file.
///
/// Every write goes to a temp file next to the destination and is renamed over
/// it once flushed to disk. One lock covers directory creation through the
/// rename, so concurrent writers never race on setup.
#[derive(Default)]
pub struct AtomicWriter {
    lock: Mutex<()>,
}

impl AtomicWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Final path for a logical output name
    pub fn output_path(dir: &Path, name: &str) -> PathBuf {
        dir.join(format!("{}.json", name))
    }

    /// Serialize `payload` as pretty JSON into `<dir>/<name>.json`
    pub fn write_json<T>(&self, dir: &Path, name: &str, payload: &T) -> ScrapeResult<PathBuf>
    where
        T: Serialize + ?Sized,
    {
        validate_name(name)?;

        let _guard = self.lock.lock();

        fs::create_dir_all(dir).map_err(|e| ScrapeError::FileError {
            path: dir.to_path_buf(),
            message: format!("Failed to create directory: {}", e),
        })?;

        let final_path = Self::output_path(dir, name);
        let file_error = |e: std::io::Error| ScrapeError::FileError {
            path: final_path.clone(),
            message: e.to_string(),
        };

        // Dropping the temp file on any early return deletes it.
        let mut temp = tempfile::Builder::new()
            .prefix(&format!(".{}.", name))
            .suffix(".tmp")
            .tempfile_in(dir)
            .map_err(file_error)?;

        {
            let mut out = BufWriter::new(temp.as_file_mut());
            serde_json::to_writer_pretty(&mut out, payload)
                .map_err(|e| ScrapeError::SerializationError(format!("Failed to serialize {}: {}", name, e)))?;
            out.write_all(b"\n").map_err(file_error)?;
            out.flush().map_err(file_error)?;
        }
        // Temp files are created 0600; outputs are meant to be shared.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            temp.as_file()
                .set_permissions(fs::Permissions::from_mode(OUTPUT_MODE))
                .map_err(file_error)?;
        }
        temp.as_file().sync_all().map_err(file_error)?;

        temp.persist(&final_path).map_err(|e| ScrapeError::FileError {
            path: final_path.clone(),
            message: format!("Failed to replace file: {}", e.error),
        })?;

        // The rename is only durable once the directory entry is flushed.
        #[cfg(unix)]
        {
            fs::File::open(dir)
                .and_then(|d| d.sync_all())
                .map_err(|e| ScrapeError::FileError {
                    path: dir.to_path_buf(),
                    message: format!("Failed to sync directory: {}", e),
                })?;
        }

        debug!("Wrote {}", final_path.display());
        Ok(final_path)
    }
}

fn validate_name(name: &str) -> ScrapeResult<()> {
    if name.is_empty()
        || name.starts_with('.')
        || name.contains("..")
        || name.contains(['/', '\\'])
    {
        return Err(ScrapeError::InvalidInput(format!("Invalid output name: {:?}", name)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use serde::ser::Error as _;
    use serde_json::{json, Value};

    use crate::core::model::Manga;

    struct Faulty;

    impl Serialize for Faulty {
        fn serialize<S: serde::Serializer>(&self, _serializer: S) -> Result<S::Ok, S::Error> {
            Err(S::Error::custom("injected failure"))
        }
    }

    fn read_json(path: &Path) -> Value {
        serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
    }

    fn leftover_temp_files(dir: &Path) -> Vec<String> {
        fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().to_string())
            .filter(|name| name.ends_with(".tmp"))
            .collect()
    }

    #[test]
    fn test_write_creates_directory_and_pretty_file() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("nested").join("out");
        let writer = AtomicWriter::new();

        let path = writer.write_json(&dir, "A", &vec![Manga::new("1", "X")]).unwrap();

        assert_eq!(path, dir.join("A.json"));
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("\n  {"), "expected indented output: {}", text);
        assert!(text.ends_with('\n'));
        assert_eq!(read_json(&path), json!([{"id": "1", "title": "X"}]));
        assert!(leftover_temp_files(&dir).is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_output_is_world_readable() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let writer = AtomicWriter::new();

        let path = writer.write_json(dir.path(), "shared", &vec![Manga::new("1", "X")]).unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, OUTPUT_MODE);

        // A rewrite keeps the same mode rather than the temp file's 0600
        fs::set_permissions(&path, fs::Permissions::from_mode(0o600)).unwrap();
        writer.write_json(dir.path(), "shared", &vec![Manga::new("2", "Y")]).unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, OUTPUT_MODE);
    }

    #[cfg(unix)]
    #[test]
    fn test_repeated_writes_sync_directory() {
        let root = tempfile::tempdir().unwrap();
        let writer = AtomicWriter::new();

        // Repeated writes each flush the directory entry without error
        for i in 0..3 {
            let path = writer.write_json(root.path(), "synced", &vec![Manga::new(i.to_string(), "X")]).unwrap();
            assert_eq!(read_json(&path), json!([{"id": i.to_string(), "title": "X"}]));
        }
        assert!(leftover_temp_files(root.path()).is_empty());
    }

    #[test]
    fn test_overwrite_replaces_whole_file() {
        let dir = tempfile::tempdir().unwrap();
        let writer = AtomicWriter::new();

        let many: Vec<Manga> = (0..50).map(|i| Manga::new(i.to_string(), "long title")).collect();
        writer.write_json(dir.path(), "list", &many).unwrap();
        let path = writer.write_json(dir.path(), "list", &vec![Manga::new("only", "one")]).unwrap();

        assert_eq!(read_json(&path), json!([{"id": "only", "title": "one"}]));
    }

    #[test]
    fn test_failed_write_leaves_previous_content() {
        let dir = tempfile::tempdir().unwrap();
        let writer = AtomicWriter::new();

        let path = writer.write_json(dir.path(), "keep", &vec![Manga::new("1", "X")]).unwrap();
        let before = fs::read_to_string(&path).unwrap();

        let result = writer.write_json(dir.path(), "keep", &Faulty);
        assert!(matches!(result, Err(ScrapeError::SerializationError(_))));

        assert_eq!(fs::read_to_string(&path).unwrap(), before);
        assert!(leftover_temp_files(dir.path()).is_empty());
    }

    #[test]
    fn test_failed_first_write_leaves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let writer = AtomicWriter::new();

        assert!(writer.write_json(dir.path(), "absent", &Faulty).is_err());
        assert!(!dir.path().join("absent.json").exists());
        assert!(leftover_temp_files(dir.path()).is_empty());
    }

    #[test]
    fn test_concurrent_writes_to_different_names() {
        let dir = tempfile::tempdir().unwrap();
        let writer = Arc::new(AtomicWriter::new());

        let handles: Vec<_> = ["first", "second"]
            .into_iter()
            .map(|name| {
                let writer = writer.clone();
                let dir = dir.path().to_path_buf();
                std::thread::spawn(move || {
                    let records: Vec<Manga> = (0..2_000)
                        .map(|i| Manga::new(format!("{}-{}", name, i), name))
                        .collect();
                    for _ in 0..5 {
                        writer.write_json(&dir, name, &records).unwrap();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        for name in ["first", "second"] {
            let value = read_json(&dir.path().join(format!("{}.json", name)));
            let records = value.as_array().unwrap();
            assert_eq!(records.len(), 2_000);
            assert_eq!(records[1_999]["id"], json!(format!("{}-1999", name)));
        }
    }

    #[test]
    fn test_rejects_unsafe_names() {
        let dir = tempfile::tempdir().unwrap();
        let writer = AtomicWriter::new();

        for name in ["", ".hidden", "../escape", "a/b", "a\\b"] {
            let result = writer.write_json(dir.path(), name, &json!([]));
            assert!(matches!(result, Err(ScrapeError::InvalidInput(_))), "accepted {:?}", name);
        }
    }

    #[test]
    fn test_unwritable_destination_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, "not a directory").unwrap();

        let writer = AtomicWriter::new();
        let result = writer.write_json(&blocker.join("sub"), "x", &json!([]));
        assert!(matches!(result, Err(ScrapeError::FileError { .. })));
    }
}
