//! Build the authoritative "final" payload for a task from whatever
//! sources are available: the DB row, and/or the artifact directory's
//! `result.json`. Per §4.13, a 404 is only correct when neither source
//! yields data.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use orc_task_store::{TaskRow, TaskStore};

#[derive(Debug, thiserror::Error)]
pub enum FinalAssemblerError {
    #[error("database error: {0}")]
    Db(#[from] orc_task_store::TaskStoreError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Serialize)]
pub struct FinalPayload {
    pub id: Uuid,
    pub status: String,
    pub model_used: Option<String>,
    pub latency_ms: Option<i64>,
    pub template_ver: Option<String>,
    pub result: Option<Value>,
    pub zip_url: Option<String>,
    #[serde(default)]
    pub follow_up_steps: Vec<String>,
}

impl From<TaskRow> for FinalPayload {
    fn from(row: TaskRow) -> Self {
        Self {
            id: row.id,
            status: row.status,
            model_used: row.model_used,
            latency_ms: row.latency_ms,
            template_ver: row.template_ver,
            result: None,
            zip_url: None,
            follow_up_steps: Vec::new(),
        }
    }
}

fn artifact_dir(artifacts_root: &Path, task_id: Uuid) -> PathBuf {
    artifacts_root.join(task_id.to_string())
}

/// Overlay `result.json` fields onto `payload` (or build a payload from
/// scratch if `payload` is `None` and no DB row exists).
async fn overlay_result_json(
    artifacts_root: &Path,
    task_id: Uuid,
    mut payload: Option<FinalPayload>,
) -> Option<FinalPayload> {
    let path = artifact_dir(artifacts_root, task_id).join("result.json");
    let Ok(contents) = tokio::fs::read_to_string(&path).await else {
        return payload;
    };
    let Ok(parsed) = serde_json::from_str::<Value>(&contents) else {
        return payload;
    };

    let content = parsed.get("content").cloned();
    let zip_url = parsed
        .get("zip_url")
        .and_then(|v| v.as_str())
        .map(str::to_string);
    let follow_up_steps: Vec<String> = parsed
        .get("follow_up_steps")
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();

    match payload.as_mut() {
        Some(p) => {
            if let Some(c) = content {
                p.result = Some(c);
            }
            if zip_url.is_some() {
                p.zip_url = zip_url;
            }
            if !follow_up_steps.is_empty() {
                p.follow_up_steps = follow_up_steps;
            }
            payload
        }
        None => {
            let status = parsed
                .get("status")
                .and_then(|v| v.as_str())
                .unwrap_or("done")
                .to_string();
            let model_used = parsed
                .get("model")
                .and_then(|v| v.as_str())
                .map(str::to_string);
            Some(FinalPayload {
                id: task_id,
                status,
                model_used,
                latency_ms: None,
                template_ver: None,
                result: content,
                zip_url,
                follow_up_steps,
            })
        }
    }
}

/// Scan the artifact directory for the first non-empty `.md`/`.txt`
/// file, used only when there's no DB row and no `result.json`.
async fn scan_text_fallback(artifacts_root: &Path, task_id: Uuid) -> Option<FinalPayload> {
    let dir = artifact_dir(artifacts_root, task_id);
    let mut entries = tokio::fs::read_dir(&dir).await.ok()?;
    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        let is_text = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e == "md" || e == "txt")
            .unwrap_or(false);
        if !is_text {
            continue;
        }
        if let Ok(contents) = tokio::fs::read_to_string(&path).await {
            if !contents.trim().is_empty() {
                return Some(FinalPayload {
                    id: task_id,
                    status: "done".to_string(),
                    model_used: None,
                    latency_ms: None,
                    template_ver: None,
                    result: Some(Value::String(contents)),
                    zip_url: None,
                    follow_up_steps: Vec::new(),
                });
            }
        }
    }
    None
}

pub struct FinalAssembler {
    artifacts_root: PathBuf,
}

impl FinalAssembler {
    pub fn new(artifacts_root: impl Into<PathBuf>) -> Self {
        Self {
            artifacts_root: artifacts_root.into(),
        }
    }

    /// One assembly attempt: DB row (if store is available) overlaid
    /// with artifact `result.json`, falling back to a scanned text
    /// file when neither a row nor `result.json` exists.
    pub async fn assemble_once(
        &self,
        task_store: Option<&TaskStore>,
        task_id: Uuid,
    ) -> Result<Option<FinalPayload>, FinalAssemblerError> {
        let payload = match task_store {
            Some(store) => store.get(task_id).await?.map(FinalPayload::from),
            None => None,
        };

        let overlaid = overlay_result_json(&self.artifacts_root, task_id, payload).await;
        if overlaid.is_some() {
            return Ok(overlaid);
        }

        Ok(scan_text_fallback(&self.artifacts_root, task_id).await)
    }

    /// Retry [`Self::assemble_once`] until it returns data or
    /// `deadline` elapses, per §4.13's "polling mode ... bounded
    /// deadline".
    pub async fn assemble_with_retry(
        &self,
        task_store: Option<&TaskStore>,
        task_id: Uuid,
        deadline: Duration,
        poll_interval: Duration,
    ) -> Result<Option<FinalPayload>, FinalAssemblerError> {
        let start = tokio::time::Instant::now();
        loop {
            if let Some(payload) = self.assemble_once(task_store, task_id).await? {
                return Ok(Some(payload));
            }
            if start.elapsed() >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(poll_interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn falls_back_to_text_scan_without_row_or_result_json() {
        let dir = tempfile::tempdir().unwrap();
        let task_id = Uuid::new_v4();
        let task_dir = dir.path().join(task_id.to_string());
        tokio::fs::create_dir_all(&task_dir).await.unwrap();
        tokio::fs::write(task_dir.join("result.md"), "# done\nhello")
            .await
            .unwrap();

        let assembler = FinalAssembler::new(dir.path());
        let payload = assembler.assemble_once(None, task_id).await.unwrap();
        assert!(payload.is_some());
        let payload = payload.unwrap();
        assert_eq!(payload.status, "done");
    }

    #[tokio::test]
    async fn returns_none_when_nothing_exists() {
        let dir = tempfile::tempdir().unwrap();
        let assembler = FinalAssembler::new(dir.path());
        let payload = assembler.assemble_once(None, Uuid::new_v4()).await.unwrap();
        assert!(payload.is_none());
    }

    #[tokio::test]
    async fn overlay_promotes_content_to_result() {
        let dir = tempfile::tempdir().unwrap();
        let task_id = Uuid::new_v4();
        let task_dir = dir.path().join(task_id.to_string());
        tokio::fs::create_dir_all(&task_dir).await.unwrap();
        tokio::fs::write(
            task_dir.join("result.json"),
            serde_json::json!({"content": "class Greeter {}", "zip_url": "/zips/x.zip", "status": "done"})
                .to_string(),
        )
        .await
        .unwrap();

        let assembler = FinalAssembler::new(dir.path());
        let payload = assembler.assemble_once(None, task_id).await.unwrap().unwrap();
        assert_eq!(payload.result.unwrap(), Value::String("class Greeter {}".into()));
        assert_eq!(payload.zip_url.as_deref(), Some("/zips/x.zip"));
    }
}
