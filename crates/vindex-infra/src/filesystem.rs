//! Data directory layout for vindex.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use vindex_types::error::IndexError;

/// Environment variable that overrides the data directory.
pub const DATA_DIR_ENV: &str = "VINDEX_DATA_DIR";

/// Resolve the data directory from environment or platform defaults.
///
/// Priority:
/// 1. `VINDEX_DATA_DIR` environment variable
/// 2. `~/.vindex`
pub fn resolve_data_dir() -> PathBuf {
    data_dir_from(std::env::var_os(DATA_DIR_ENV), dirs::home_dir())
}

fn data_dir_from(env: Option<OsString>, home: Option<PathBuf>) -> PathBuf {
    if let Some(dir) = env.filter(|d| !d.is_empty()) {
        return PathBuf::from(dir);
    }

    if let Some(home) = home {
        return home.join(".vindex");
    }

    // Last resort: current directory
    PathBuf::from(".vindex")
}

/// Directory holding index snapshots: `{data_dir}/indexes/`.
pub fn indexes_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("indexes")
}

/// Longest accepted index name.
pub const MAX_INDEX_NAME_LEN: usize = 128;

/// Check that `name` can be used as a snapshot file stem.
///
/// Accepts 1 to `MAX_INDEX_NAME_LEN` ASCII letters, digits, `-` and `_`, so
/// a name never leaves the indexes directory.
pub fn validate_index_name(name: &str) -> Result<(), IndexError> {
    let valid = !name.is_empty()
        && name.len() <= MAX_INDEX_NAME_LEN
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
    if valid {
        Ok(())
    } else {
        Err(IndexError::InvalidName(name.to_string()))
    }
}

/// Snapshot file for one index: `{data_dir}/indexes/{name}.json`.
pub fn snapshot_path(data_dir: &Path, index_name: &str) -> PathBuf {
    indexes_dir(data_dir).join(format!("{index_name}.json"))
}

/// Names of the indexes that have a snapshot on disk, sorted.
pub async fn list_snapshots(data_dir: &Path) -> std::io::Result<Vec<String>> {
    let dir = indexes_dir(data_dir);
    let mut entries = match tokio::fs::read_dir(&dir).await {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err),
    };

    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            names.push(stem.to_string());
        }
    }
    names.sort();
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_snapshot_paths() {
        let data_dir = PathBuf::from("/home/user/.vindex");
        assert_eq!(
            snapshot_path(&data_dir, "photos"),
            PathBuf::from("/home/user/.vindex/indexes/photos.json")
        );
    }

    #[test]
    fn test_validate_index_name() {
        for name in ["photos", "my-notes_2", "A"] {
            assert!(validate_index_name(name).is_ok(), "{name}");
        }
        for name in ["", "../outside", "a/b", "a.b", "..", "naïve", "with space"] {
            assert_eq!(
                validate_index_name(name),
                Err(IndexError::InvalidName(name.to_string()))
            );
        }
        assert!(validate_index_name(&"x".repeat(MAX_INDEX_NAME_LEN)).is_ok());
        assert!(validate_index_name(&"x".repeat(MAX_INDEX_NAME_LEN + 1)).is_err());
    }

    #[tokio::test]
    async fn test_list_snapshots() {
        let dir = tempdir().unwrap();
        assert!(list_snapshots(dir.path()).await.unwrap().is_empty());

        let indexes = indexes_dir(dir.path());
        tokio::fs::create_dir_all(&indexes).await.unwrap();
        tokio::fs::write(indexes.join("photos.json"), "{}").await.unwrap();
        tokio::fs::write(indexes.join("notes.json"), "{}").await.unwrap();
        tokio::fs::write(indexes.join("notes.json.tmp"), "{}").await.unwrap();

        assert_eq!(
            list_snapshots(dir.path()).await.unwrap(),
            vec!["notes", "photos"]
        );
    }

    #[test]
    fn test_data_dir_priority() {
        let home = Some(PathBuf::from("/home/user"));
        assert_eq!(
            data_dir_from(Some("/tmp/test-vindex".into()), home.clone()),
            PathBuf::from("/tmp/test-vindex")
        );
        assert_eq!(
            data_dir_from(Some(OsString::new()), home.clone()),
            PathBuf::from("/home/user/.vindex")
        );
        assert_eq!(data_dir_from(None, home), PathBuf::from("/home/user/.vindex"));
        assert_eq!(data_dir_from(None, None), PathBuf::from(".vindex"));
    }
}
