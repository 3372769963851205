//! Extracting a file map out of raw model output.
//!
//! Grounded in `examples/original_source/app/queue.py`'s
//! `_extract_files_from_content`, `_sanitize_rel_path`, `_sanitize_java`,
//! and the `CODE_BLOCK_RE` / `FILE_LINE_RE` / `FILE_INLINE_RE` regexes.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;

fn fence_rx() -> &'static Regex {
    static RX: OnceLock<Regex> = OnceLock::new();
    RX.get_or_init(|| Regex::new(r"(?m)^```[a-zA-Z0-9_+-]*\s*$").unwrap())
}

/// `File: path/to/File.java` (or `**File:**`, `## File:`, etc.) immediately
/// preceding a fenced code block.
fn file_line_rx() -> &'static Regex {
    static RX: OnceLock<Regex> = OnceLock::new();
    RX.get_or_init(|| {
        Regex::new(r"(?mi)^\s*(?:#{1,6}\s*)?(?:\*\*)?file\s*:\s*(?:\*\*)?\s*`?([^\s`*]+)`?\s*(?:\*\*)?\s*$")
            .unwrap()
    })
}

/// `// File: path/to/File.java` style inline marker inside a code block.
fn file_inline_rx() -> &'static Regex {
    static RX: OnceLock<Regex> = OnceLock::new();
    RX.get_or_init(|| Regex::new(r"(?mi)^\s*(?://|#)\s*file\s*:\s*([^\s]+)\s*$").unwrap())
}

fn code_block_rx() -> &'static Regex {
    static RX: OnceLock<Regex> = OnceLock::new();
    RX.get_or_init(|| Regex::new(r"(?ms)```[a-zA-Z0-9_+-]*\n(.*?)```").unwrap())
}

/// Reject absolute paths and `..` segments; strip a leading `./`.
pub fn sanitize_rel_path(raw: &str) -> Option<String> {
    let mut path = raw.trim().replace('\\', "/");
    if path.is_empty() {
        return None;
    }
    if let Some(stripped) = path.strip_prefix("./") {
        path = stripped.to_string();
    }
    if path.starts_with('/') || path.contains(':') {
        return None;
    }
    if path.split('/').any(|seg| seg == "..") {
        return None;
    }
    if path.split('/').any(|seg| seg.is_empty()) {
        return None;
    }
    Some(path)
}

struct FenceMatch {
    start: usize,
    end: usize,
    body: String,
}

fn fenced_blocks(content: &str) -> Vec<FenceMatch> {
    code_block_rx()
        .captures_iter(content)
        .map(|cap| {
            let whole = cap.get(0).unwrap();
            FenceMatch {
                start: whole.start(),
                end: whole.end(),
                body: cap[1].to_string(),
            }
        })
        .collect()
}

/// Parse `File: ...` markers paired with the fenced block that follows them;
/// fall back to inline `// File:` markers found inside unlabeled blocks.
pub fn extract_files_from_content(content: &str) -> BTreeMap<String, Vec<u8>> {
    let mut files = BTreeMap::new();
    let blocks = fenced_blocks(content);
    let mut claimed = vec![false; blocks.len()];

    for file_match in file_line_rx().captures_iter(content) {
        let marker_end = file_match.get(0).unwrap().end();
        let Some(rel_path) = sanitize_rel_path(&file_match[1]) else {
            continue;
        };
        if let Some((idx, block)) = blocks
            .iter()
            .enumerate()
            .filter(|(i, b)| !claimed[*i] && b.start >= marker_end)
            .min_by_key(|(_, b)| b.start)
        {
            claimed[idx] = true;
            files.insert(rel_path, block.body.clone().into_bytes());
        }
    }

    for (idx, block) in blocks.iter().enumerate() {
        if claimed[idx] {
            continue;
        }
        if let Some(inline) = file_inline_rx().captures(&block.body) {
            if let Some(rel_path) = sanitize_rel_path(&inline[1]) {
                let body = file_inline_rx().replace(&block.body, "").to_string();
                files.insert(rel_path, body.trim_start_matches('\n').as_bytes().to_vec());
            }
        }
    }

    files
}

fn package_line_rx() -> &'static Regex {
    static RX: OnceLock<Regex> = OnceLock::new();
    RX.get_or_init(|| Regex::new(r"(?m)^\s*package\s+[\w.]+\s*;\s*$").unwrap())
}

fn url_line_rx() -> &'static Regex {
    static RX: OnceLock<Regex> = OnceLock::new();
    RX.get_or_init(|| Regex::new(r"(?mi)^\s*(?:https?://|www\.)\S*\s*$").unwrap())
}

fn status_warning_rx() -> &'static Regex {
    static RX: OnceLock<Regex> = OnceLock::new();
    RX.get_or_init(|| Regex::new(r"(?mi)^\s*(?:note|warning|disclaimer)\s*:.*$").unwrap())
}

/// Derive `(package, class)` from a `.java` relative path by locating the
/// `java` root segment, e.g. `src/main/java/com/acme/Foo.java` ->
/// `("com.acme", "Foo")`.
pub fn derive_java_pkg_class(rel_path: &str) -> (String, String) {
    let norm = rel_path.replace('\\', "/");
    let segments: Vec<&str> = norm.split('/').collect();
    let class = segments
        .last()
        .map(|f| f.trim_end_matches(".java"))
        .unwrap_or("Generated")
        .to_string();

    if let Some(java_pos) = segments.iter().position(|s| *s == "java") {
        let pkg_segments = &segments[java_pos + 1..segments.len().saturating_sub(1)];
        if !pkg_segments.is_empty() {
            return (pkg_segments.join("."), class);
        }
    }
    ("com.generated".to_string(), class)
}

/// Strip fence/URL/status-warning lines and rewrite (or insert) the package
/// declaration to match the path-derived package, matching the
/// defensive clean-up the Python worker does before writing `.java` files.
pub fn sanitize_java(code: &str, rel_path: &str) -> String {
    let (package, _class) = derive_java_pkg_class(rel_path);

    let mut cleaned = fence_rx().replace_all(code, "").to_string();
    cleaned = url_line_rx().replace_all(&cleaned, "").to_string();
    cleaned = status_warning_rx().replace_all(&cleaned, "").to_string();

    let package_line = format!("package {package};");
    if package_line_rx().is_match(&cleaned) {
        cleaned = package_line_rx().replace(&cleaned, package_line.as_str()).to_string();
    } else {
        let trimmed = cleaned.trim_start_matches('\n');
        cleaned = format!("{package_line}\n\n{trimmed}");
    }

    let lines: Vec<&str> = cleaned.lines().collect();
    let mut out = Vec::with_capacity(lines.len());
    let mut blank_run = 0;
    for line in lines {
        if line.trim().is_empty() {
            blank_run += 1;
            if blank_run > 2 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push(line);
    }
    out.join("\n") + "\n"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_rel_path_rejects_traversal() {
        assert!(sanitize_rel_path("../etc/passwd").is_none());
        assert!(sanitize_rel_path("/abs/path").is_none());
        assert_eq!(sanitize_rel_path("./src/Foo.java").unwrap(), "src/Foo.java");
    }

    #[test]
    fn extracts_file_marker_pairs() {
        let content = "File: src/main/java/com/acme/Greeter.java\n```java\npublic class Greeter {}\n```\n";
        let files = extract_files_from_content(content);
        assert_eq!(files.len(), 1);
        assert!(files.contains_key("src/main/java/com/acme/Greeter.java"));
        assert!(String::from_utf8_lossy(&files["src/main/java/com/acme/Greeter.java"]).contains("class Greeter"));
    }

    #[test]
    fn extracts_multiple_blocks_in_order() {
        let content = concat!(
            "File: A.java\n```java\nclass A {}\n```\n",
            "some text\n",
            "File: B.java\n```java\nclass B {}\n```\n"
        );
        let files = extract_files_from_content(content);
        assert_eq!(files.len(), 2);
        assert!(files.contains_key("A.java"));
        assert!(files.contains_key("B.java"));
    }

    #[test]
    fn falls_back_to_inline_marker() {
        let content = "```java\n// File: src/Foo.java\nclass Foo {}\n```\n";
        let files = extract_files_from_content(content);
        assert_eq!(files.len(), 1);
        assert!(files.contains_key("src/Foo.java"));
    }

    #[test]
    fn derive_pkg_class_from_java_root() {
        let (pkg, class) = derive_java_pkg_class("src/main/java/com/acme/orders/OrderRepository.java");
        assert_eq!(pkg, "com.acme.orders");
        assert_eq!(class, "OrderRepository");
    }

    #[test]
    fn sanitize_java_inserts_missing_package() {
        let out = sanitize_java("public class Foo {}\n", "src/main/java/com/acme/Foo.java");
        assert!(out.starts_with("package com.acme;"));
        assert!(out.contains("public class Foo"));
    }

    #[test]
    fn sanitize_java_rewrites_mismatched_package() {
        let code = "package wrong.pkg;\n\npublic class Foo {}\n";
        let out = sanitize_java(code, "src/main/java/com/acme/Foo.java");
        assert!(out.starts_with("package com.acme;"));
        assert!(!out.contains("wrong.pkg"));
    }

    #[test]
    fn sanitize_java_strips_noise_lines() {
        let code = "```\npackage com.acme;\n\nhttps://example.com/docs\nNote: generated by assistant\npublic class Foo {}\n```\n";
        let out = sanitize_java(code, "src/main/java/com/acme/Foo.java");
        assert!(!out.contains("https://"));
        assert!(!out.to_lowercase().contains("note:"));
        assert!(!out.contains("```"));
    }
}
