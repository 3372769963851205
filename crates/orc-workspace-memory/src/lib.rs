//! Per-task workspace memory: summaries retained after a task
//! completes, searchable by repo/language/session, plus upload-bundle
//! and bootstrap insertion paths per §4.11.

use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::Utc;
use orc_types::memory::{build_file_preview, clamp_summary, WorkspaceMemoryRecord};
use sqlx::PgPool;
use uuid::Uuid;

pub const UPLOAD_MAX_FILE_BYTES: u64 = 10 * 1024 * 1024;
pub const UPLOAD_MAX_MEMBERS: usize = 200;
pub const UPLOAD_MAX_UNCOMPRESSED_BYTES: u64 = 20 * 1024 * 1024;
pub const SEARCH_MIN_LIMIT: i64 = 1;
pub const SEARCH_MAX_LIMIT: i64 = 25;

#[derive(Debug, thiserror::Error)]
pub enum WorkspaceMemoryError {
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("upload exceeds size cap ({0} bytes)")]
    TooLarge(u64),
    #[error("upload exceeds member cap ({0} members)")]
    TooManyMembers(usize),
}

#[derive(Debug, sqlx::FromRow)]
struct MemoryRow {
    id: Uuid,
    task_id: Option<Uuid>,
    repo_path: String,
    language: Option<String>,
    mode: String,
    status: String,
    goal: String,
    model: Option<String>,
    summary: String,
    artifact_rel: Option<String>,
    zip_rel: Option<String>,
    files_json: Option<serde_json::Value>,
    session_id: Option<String>,
    created_at: chrono::DateTime<Utc>,
}

impl From<MemoryRow> for WorkspaceMemoryRecord {
    fn from(row: MemoryRow) -> Self {
        WorkspaceMemoryRecord {
            id: row.id,
            task_id: row.task_id,
            repo_path: row.repo_path,
            language: row.language,
            mode: row.mode,
            status: row.status.parse().unwrap_or(orc_status::Status::Error),
            goal: row.goal,
            model: row.model,
            summary: row.summary,
            artifact_rel: row.artifact_rel,
            zip_rel: row.zip_rel,
            files: row.files_json.unwrap_or(serde_json::Value::Null),
            session_id: row.session_id,
            created_at: row.created_at,
        }
    }
}

pub struct WorkspaceMemoryStore {
    pool: PgPool,
    uploads_root: PathBuf,
}

impl WorkspaceMemoryStore {
    pub fn new(pool: PgPool, uploads_root: impl Into<PathBuf>) -> Self {
        Self {
            pool,
            uploads_root: uploads_root.into(),
        }
    }

    pub async fn insert(&self, record: &WorkspaceMemoryRecord) -> Result<(), WorkspaceMemoryError> {
        let summary = clamp_summary(&record.summary);
        sqlx::query(
            "INSERT INTO workspace_memories
             (id, task_id, repo_path, language, mode, status, goal, model, summary,
              artifact_rel, zip_rel, files_json, session_id, created_at)
             VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14)",
        )
        .bind(record.id)
        .bind(record.task_id)
        .bind(&record.repo_path)
        .bind(&record.language)
        .bind(&record.mode)
        .bind(record.status.as_str())
        .bind(&record.goal)
        .bind(&record.model)
        .bind(summary)
        .bind(&record.artifact_rel)
        .bind(&record.zip_rel)
        .bind(&record.files)
        .bind(&record.session_id)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Search by repo-path prefix, language, free-text (goal+summary),
    /// and/or session id. `limit` is clamped into `[1, 25]`.
    pub async fn search(
        &self,
        repo_path_prefix: Option<&str>,
        language: Option<&str>,
        text_query: Option<&str>,
        session_id: Option<&str>,
        limit: i64,
    ) -> Result<Vec<WorkspaceMemoryRecord>, WorkspaceMemoryError> {
        let limit = limit.clamp(SEARCH_MIN_LIMIT, SEARCH_MAX_LIMIT);
        let like_repo = repo_path_prefix.map(|p| format!("{p}%"));
        let like_text = text_query.map(|t| format!("%{t}%"));

        let rows = sqlx::query_as::<_, MemoryRow>(
            "SELECT id, task_id, repo_path, language, mode, status, goal, model, summary,
                    artifact_rel, zip_rel, files_json, session_id, created_at
             FROM workspace_memories
             WHERE ($1::text IS NULL OR repo_path LIKE $1)
               AND ($2::text IS NULL OR language = $2)
               AND ($3::text IS NULL OR goal ILIKE $3 OR summary ILIKE $3)
               AND ($4::text IS NULL OR session_id = $4)
             ORDER BY created_at DESC
             LIMIT $5",
        )
        .bind(like_repo)
        .bind(language)
        .bind(like_text)
        .bind(session_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<WorkspaceMemoryRecord>, WorkspaceMemoryError> {
        let row = sqlx::query_as::<_, MemoryRow>(
            "SELECT id, task_id, repo_path, language, mode, status, goal, model, summary,
                    artifact_rel, zip_rel, files_json, session_id, created_at
             FROM workspace_memories WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    /// `upsert_bootstrap_memory`: delete any prior bootstrap memory for
    /// the same artifact (keyed by `artifact_rel`), then insert a new
    /// one in its place.
    pub async fn upsert_bootstrap_memory(
        &self,
        rel_path: &str,
        content: &str,
        language: Option<&str>,
        repo_path: Option<&str>,
        session_id: Option<&str>,
    ) -> Result<Uuid, WorkspaceMemoryError> {
        sqlx::query("DELETE FROM workspace_memories WHERE mode = 'bootstrap' AND artifact_rel = $1")
            .bind(rel_path)
            .execute(&self.pool)
            .await?;

        let record = WorkspaceMemoryRecord {
            id: Uuid::new_v4(),
            task_id: None,
            repo_path: repo_path.unwrap_or_default().to_string(),
            language: language.map(str::to_string),
            mode: "bootstrap".to_string(),
            status: orc_status::Status::Done,
            goal: "bootstrap".to_string(),
            model: None,
            summary: clamp_summary(content),
            artifact_rel: Some(rel_path.to_string()),
            zip_rel: None,
            files: serde_json::Value::Null,
            session_id: session_id.map(str::to_string),
            created_at: Utc::now(),
        };
        self.insert(&record).await?;
        Ok(record.id)
    }

    /// Accept an uploaded zip: validate caps, extract into
    /// `uploads/<session>/<label>/`, and insert one memory row
    /// summarizing the bundle.
    pub async fn ingest_upload(
        &self,
        zip_bytes: &[u8],
        session_id: &str,
        label: &str,
    ) -> Result<Uuid, WorkspaceMemoryError> {
        if zip_bytes.len() as u64 > UPLOAD_MAX_FILE_BYTES {
            return Err(WorkspaceMemoryError::TooLarge(zip_bytes.len() as u64));
        }

        let cursor = std::io::Cursor::new(zip_bytes);
        let mut archive = zip::ZipArchive::new(cursor)?;
        if archive.len() > UPLOAD_MAX_MEMBERS {
            return Err(WorkspaceMemoryError::TooManyMembers(archive.len()));
        }

        let staging_dir = self.uploads_root.join(session_id).join(label);
        std::fs::create_dir_all(&staging_dir)?;

        let mut total_uncompressed: u64 = 0;
        let mut previews: Vec<(String, Vec<u8>)> = Vec::new();

        for i in 0..archive.len() {
            let mut member = archive.by_index(i)?;
            total_uncompressed += member.size();
            if total_uncompressed > UPLOAD_MAX_UNCOMPRESSED_BYTES {
                return Err(WorkspaceMemoryError::TooLarge(total_uncompressed));
            }
            let Some(name) = member.enclosed_name().map(|p| p.to_path_buf()) else {
                continue;
            };
            let dest = safe_join(&staging_dir, &name);
            if member.is_dir() {
                std::fs::create_dir_all(&dest)?;
                continue;
            }
            if let Some(parent) = dest.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let mut buf = Vec::new();
            member.read_to_end(&mut buf)?;
            std::fs::write(&dest, &buf)?;
            previews.push((name.to_string_lossy().to_string(), buf));
        }

        let preview_refs: Vec<(&str, &[u8])> = previews
            .iter()
            .map(|(p, b)| (p.as_str(), b.as_slice()))
            .collect();
        let files_json = build_file_preview(preview_refs);

        let record = WorkspaceMemoryRecord {
            id: Uuid::new_v4(),
            task_id: None,
            repo_path: staging_dir.to_string_lossy().to_string(),
            language: None,
            mode: "upload".to_string(),
            status: orc_status::Status::Done,
            goal: format!("uploaded bundle: {label}"),
            model: None,
            summary: clamp_summary(&format!(
                "upload bundle with {} files ({} bytes uncompressed)",
                previews.len(),
                total_uncompressed
            )),
            artifact_rel: None,
            zip_rel: None,
            files: files_json,
            session_id: Some(session_id.to_string()),
            created_at: Utc::now(),
        };
        self.insert(&record).await?;
        Ok(record.id)
    }
}

/// Join `name` onto `root`, rejecting absolute paths / `..` escapes by
/// construction — mirrors the containment discipline of `orc-fs-sandbox`
/// for the one place this crate writes to disk directly.
fn safe_join(root: &Path, name: &Path) -> PathBuf {
    let mut out = root.to_path_buf();
    for component in name.components() {
        if let std::path::Component::Normal(part) = component {
            out.push(part);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safe_join_strips_traversal() {
        let root = Path::new("/tmp/uploads/s1/bundle");
        let joined = safe_join(root, Path::new("../../etc/passwd"));
        assert_eq!(joined, Path::new("/tmp/uploads/s1/bundle/etc/passwd"));
    }

    #[test]
    fn safe_join_strips_absolute_prefix() {
        let root = Path::new("/tmp/uploads/s1/bundle");
        let joined = safe_join(root, Path::new("/etc/passwd"));
        assert_eq!(joined, Path::new("/tmp/uploads/s1/bundle/etc/passwd"));
    }
}
