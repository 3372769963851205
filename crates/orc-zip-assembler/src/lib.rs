//! Walk a per-task merge tree into a capped, downloadable zip archive.
//!
//! Caps and skip-lists are the Rust form of
//! `examples/original_source/app/queue.py`'s `ZIP_MAX_FILES`,
//! `ZIP_MAX_BYTES`, `ZIP_MAX_FILE_BYTES`, `ZIP_SKIP_SEGMENTS`,
//! `ZIP_SKIP_SUFFIXES` constants. Walking and archiving follow the
//! teacher's `casparian` crate, which is the one repo in the pack that
//! already depends on `zip`/`walkdir` for exactly this kind of tree
//! snapshot.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use zip::write::FileOptions;

#[derive(Debug, thiserror::Error)]
pub enum ZipAssemblerError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

#[derive(Debug, Clone)]
pub struct ZipCaps {
    pub max_files: usize,
    pub max_bytes: u64,
    pub max_file_bytes: u64,
    pub skip_segments: Vec<String>,
    pub skip_suffixes: Vec<String>,
}

impl Default for ZipCaps {
    fn default() -> Self {
        Self {
            max_files: 400,
            max_bytes: 10 * 1024 * 1024,
            max_file_bytes: 512 * 1024,
            skip_segments: vec![
                ".git".into(),
                "node_modules".into(),
                "target".into(),
                ".duel".into(),
                "__pycache__".into(),
            ],
            skip_suffixes: vec![".class".into(), ".pyc".into(), ".o".into()],
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AssembleResult {
    pub files_written: usize,
    pub bytes_written: u64,
    /// Caps hit, placeholders inserted, rebase actions — surfaced to
    /// the client via `zip-notes.txt`.
    pub notes: Vec<String>,
}

fn is_skipped(rel: &Path, caps: &ZipCaps) -> bool {
    if rel
        .components()
        .any(|c| caps.skip_segments.iter().any(|seg| c.as_os_str() == seg.as_str()))
    {
        return true;
    }
    if let Some(name) = rel.file_name().and_then(|n| n.to_str()) {
        if caps.skip_suffixes.iter().any(|suf| name.ends_with(suf.as_str())) {
            return true;
        }
    }
    false
}

/// Walk `merge_root`, skip-filtered, and write a zip to `zip_path`.
/// Files are included in directory-walk order until `max_files` or
/// `max_bytes` would be exceeded; no file that would straddle the byte
/// cap is partially included — it is dropped whole and noted.
pub fn assemble(
    merge_root: &Path,
    zip_path: &Path,
    caps: &ZipCaps,
) -> Result<AssembleResult, ZipAssemblerError> {
    let file = File::create(zip_path)?;
    let mut writer = zip::ZipWriter::new(file);
    let options: FileOptions<()> =
        FileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    let mut result = AssembleResult::default();
    let mut truncated_files = false;
    let mut truncated_bytes = false;

    for entry in walkdir::WalkDir::new(merge_root)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = match entry.path().strip_prefix(merge_root) {
            Ok(r) => r,
            Err(_) => continue,
        };
        if is_skipped(rel, caps) {
            continue;
        }

        let metadata = entry.metadata()?;
        if metadata.len() > caps.max_file_bytes {
            result
                .notes
                .push(format!("skipped {} (exceeds per-file cap)", rel.display()));
            continue;
        }

        if result.files_written >= caps.max_files {
            truncated_files = true;
            break;
        }
        if result.bytes_written + metadata.len() > caps.max_bytes {
            truncated_bytes = true;
            break;
        }

        let rel_str = rel.to_string_lossy().replace('\\', "/");
        writer.start_file(rel_str, options)?;
        let mut buf = Vec::with_capacity(metadata.len() as usize);
        File::open(entry.path())?.read_to_end(&mut buf)?;
        writer.write_all(&buf)?;

        result.files_written += 1;
        result.bytes_written += metadata.len();
    }

    writer.finish()?;

    if truncated_files {
        result
            .notes
            .push(format!("truncated: file count cap ({}) reached", caps.max_files));
    }
    if truncated_bytes {
        result
            .notes
            .push(format!("truncated: byte cap ({}) reached", caps.max_bytes));
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_file(path: &Path, contents: &[u8]) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn assembles_plain_tree() {
        let dir = tempfile::tempdir().unwrap();
        let merge_root = dir.path().join("merge");
        write_file(&merge_root.join("src/Main.java"), b"class Main {}");
        write_file(&merge_root.join("README.md"), b"hello");

        let zip_path = dir.path().join("out.zip");
        let caps = ZipCaps::default();
        let result = assemble(&merge_root, &zip_path, &caps).unwrap();
        assert_eq!(result.files_written, 2);
        assert!(zip_path.exists());
    }

    #[test]
    fn skips_denylisted_segments_and_suffixes() {
        let dir = tempfile::tempdir().unwrap();
        let merge_root = dir.path().join("merge");
        write_file(&merge_root.join("target/debug/build.o"), b"junk");
        write_file(&merge_root.join("src/Main.class"), b"junk");
        write_file(&merge_root.join("src/Main.java"), b"class Main {}");

        let zip_path = dir.path().join("out.zip");
        let caps = ZipCaps::default();
        let result = assemble(&merge_root, &zip_path, &caps).unwrap();
        assert_eq!(result.files_written, 1);
    }

    #[test]
    fn file_count_cap_truncates_and_notes() {
        let dir = tempfile::tempdir().unwrap();
        let merge_root = dir.path().join("merge");
        for i in 0..5 {
            write_file(&merge_root.join(format!("f{i}.txt")), b"x");
        }
        let zip_path = dir.path().join("out.zip");
        let caps = ZipCaps {
            max_files: 3,
            ..ZipCaps::default()
        };
        let result = assemble(&merge_root, &zip_path, &caps).unwrap();
        assert_eq!(result.files_written, 3);
        assert!(result.notes.iter().any(|n| n.contains("file count cap")));
    }

    #[test]
    fn oversized_single_file_is_dropped_whole() {
        let dir = tempfile::tempdir().unwrap();
        let merge_root = dir.path().join("merge");
        write_file(&merge_root.join("big.bin"), &vec![0u8; 100]);
        let zip_path = dir.path().join("out.zip");
        let caps = ZipCaps {
            max_file_bytes: 10,
            ..ZipCaps::default()
        };
        let result = assemble(&merge_root, &zip_path, &caps).unwrap();
        assert_eq!(result.files_written, 0);
        assert!(result.notes.iter().any(|n| n.contains("big.bin")));
    }
}
