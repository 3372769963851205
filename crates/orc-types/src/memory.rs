//! Workspace memory: per-task summaries retained for later retrieval.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const SUMMARY_MAX_BYTES: usize = 4 * 1024;
pub const FILE_PREVIEW_MAX_ENTRIES: usize = 8;
pub const FILE_PREVIEW_MAX_BYTES: usize = 4 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceMemoryRecord {
    pub id: Uuid,
    #[serde(default)]
    pub task_id: Option<Uuid>,
    pub repo_path: String,
    #[serde(default)]
    pub language: Option<String>,
    pub mode: String,
    pub status: orc_status::Status,
    pub goal: String,
    #[serde(default)]
    pub model: Option<String>,
    pub summary: String,
    #[serde(default)]
    pub artifact_rel: Option<String>,
    #[serde(default)]
    pub zip_rel: Option<String>,
    /// Subset of generated files, trimmed to
    /// [`FILE_PREVIEW_MAX_ENTRIES`] entries of at most
    /// [`FILE_PREVIEW_MAX_BYTES`] bytes each.
    #[serde(default)]
    pub files: serde_json::Value,
    #[serde(default)]
    pub session_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Truncate `summary` to [`SUMMARY_MAX_BYTES`] on a UTF-8 boundary.
pub fn clamp_summary(summary: &str) -> String {
    clamp_utf8(summary, SUMMARY_MAX_BYTES)
}

fn clamp_utf8(s: &str, max_bytes: usize) -> String {
    if s.len() <= max_bytes {
        return s.to_string();
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_string()
}

/// Build the trimmed file-preview JSON stored alongside a memory
/// record: at most [`FILE_PREVIEW_MAX_ENTRIES`] files, each preview
/// clamped to [`FILE_PREVIEW_MAX_BYTES`].
pub fn build_file_preview<'a, I>(files: I) -> serde_json::Value
where
    I: IntoIterator<Item = (&'a str, &'a [u8])>,
{
    let mut out = serde_json::Map::new();
    for (path, bytes) in files.into_iter().take(FILE_PREVIEW_MAX_ENTRIES) {
        let text = String::from_utf8_lossy(bytes);
        out.insert(
            path.to_string(),
            serde_json::Value::String(clamp_utf8(&text, FILE_PREVIEW_MAX_BYTES)),
        );
    }
    serde_json::Value::Object(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_summary_respects_cap() {
        let long = "x".repeat(SUMMARY_MAX_BYTES * 2);
        let clamped = clamp_summary(&long);
        assert_eq!(clamped.len(), SUMMARY_MAX_BYTES);
    }

    #[test]
    fn clamp_summary_is_noop_under_cap() {
        assert_eq!(clamp_summary("short"), "short");
    }

    #[test]
    fn file_preview_caps_entry_count() {
        let files: Vec<(String, Vec<u8>)> = (0..20)
            .map(|i| (format!("f{i}.txt"), b"hi".to_vec()))
            .collect();
        let refs: Vec<(&str, &[u8])> =
            files.iter().map(|(p, b)| (p.as_str(), b.as_slice())).collect();
        let preview = build_file_preview(refs);
        assert_eq!(preview.as_object().unwrap().len(), FILE_PREVIEW_MAX_ENTRIES);
    }
}
