//! Multi-component request detection and placement/coverage.
//!
//! Tables and heuristics are carried over verbatim from
//! `examples/original_source/app/queue.py`'s `COMPONENT_SYNONYMS`,
//! `COMPONENT_PLACEMENT`, `COMPONENT_ANNOTATIONS`, `COMPONENT_CLASS_HINTS`.

use std::collections::BTreeMap;
use std::path::Path;

pub const COMPONENTS: &[&str] = &["repository", "service", "controller", "entity", "dto"];

fn synonyms(component: &str) -> &'static [&'static str] {
    match component {
        "repository" => &["repository", "repositories", "repo interface", "data access object", "dao"],
        "service" => &["service", "services", "application service"],
        "controller" => &["controller", "controllers", "rest controller", "rest controllers", "api controller"],
        "entity" => &["entity", "entities", "domain entity"],
        "dto" => &["dto", "dtos", "data transfer object", "data transfer objects"],
        _ => &[],
    }
}

pub fn placement_folder(component: &str) -> &'static str {
    match component {
        "repository" => "repository",
        "service" => "service",
        "controller" => "controller",
        "entity" => "entity",
        "dto" => "dto",
        _ => component_as_static(component),
    }
}

fn component_as_static(_c: &str) -> &'static str {
    "misc"
}

fn placement_keywords(component: &str) -> &'static [&'static str] {
    match component {
        "repository" => &["repository", "repositories", "repo", "dao"],
        "service" => &["service", "services"],
        "controller" => &["controller", "controllers"],
        "entity" => &["entity", "entities", "model"],
        "dto" => &["dto", "dtos"],
        _ => &[],
    }
}

fn annotations(component: &str) -> &'static [&'static str] {
    match component {
        "repository" => &["@repository", "@jdbcrepository"],
        "service" => &["@service"],
        "controller" => &["@restcontroller", "@controller"],
        "entity" => &["@entity", "@table"],
        "dto" => &["@value", "@data"],
        _ => &[],
    }
}

fn class_hints(component: &str) -> &'static [&'static str] {
    match component {
        "repository" => &["repository", "dao"],
        "service" => &["service"],
        "controller" => &["controller", "resource"],
        "entity" => &["entity", "model"],
        "dto" => &["dto"],
        _ => &[],
    }
}

/// Which of [`COMPONENTS`] the goal text mentions, in table-declared order.
pub fn detect_requested_components(goal: &str) -> Vec<String> {
    let goal_l = goal.to_lowercase();
    COMPONENTS
        .iter()
        .filter(|c| synonyms(c).iter().any(|v| goal_l.contains(v)))
        .map(|c| c.to_string())
        .collect()
}

fn pascal_case(word: &str) -> String {
    let parts: Vec<&str> = word
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|p| !p.is_empty())
        .collect();
    if parts.is_empty() {
        return "Domain".to_string();
    }
    parts
        .iter()
        .map(|p| {
            let mut chars = p.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}

/// Guess a domain entity name from the goal text, used to name generated
/// component classes (e.g. `Order` -> `OrderRepository`).
pub fn infer_domain_entity(goal: &str) -> String {
    let goal_l = goal.to_lowercase();
    for keyword in ["table", "entity", "model", "resource"] {
        if let Some(pos) = goal_l.find(&format!(" {keyword}")) {
            let before = &goal_l[..pos];
            if let Some(word) = before.split_whitespace().last() {
                return pascal_case(word);
            }
        }
    }
    for name in ["user", "customer", "account", "order", "product", "task", "item", "project"] {
        if goal_l.contains(name) {
            return pascal_case(name);
        }
    }
    "Domain".to_string()
}

/// Class name for a component, e.g. `(Order, "repository") -> OrderRepository`.
pub fn component_class_name(base_entity: &str, component: &str) -> String {
    let suffix = match component {
        "repository" => "Repository",
        "service" => "Service",
        "controller" => "Controller",
        "entity" => "",
        "dto" => "Dto",
        other => return format!("{base_entity}{}", pascal_case(other)),
    };
    if suffix.is_empty() {
        base_entity.to_string()
    } else {
        format!("{base_entity}{suffix}")
    }
}

fn file_matches_component(stem: &str, component: &str) -> bool {
    let stem_l = stem.to_lowercase();
    placement_keywords(component).iter().any(|kw| stem_l.contains(kw))
}

/// Decide whether `code`'s type (by `@Annotation` markers, then class-name
/// suffix, then bare keyword) belongs to one of `components`.
pub fn detect_component_from_code(code: &str, components: &[String]) -> Option<String> {
    let code_l = code.to_lowercase();
    for component in components {
        if annotations(component).iter().any(|marker| code_l.contains(marker)) {
            return Some(component.clone());
        }
    }
    let type_name = extract_type_name(code).unwrap_or_default().to_lowercase();
    for component in components {
        if class_hints(component).iter().any(|suf| !suf.is_empty() && type_name.ends_with(suf)) {
            return Some(component.clone());
        }
    }
    for component in components {
        if class_hints(component).iter().any(|kw| !kw.is_empty() && code_l.contains(kw)) {
            return Some(component.clone());
        }
    }
    None
}

fn extract_type_name(code: &str) -> Option<String> {
    let rx = regex::Regex::new(r"\b(?:class|interface|record)\s+([A-Z][A-Za-z0-9_]*)").unwrap();
    rx.captures(code).map(|c| c[1].to_string())
}

/// For each requested component, whether the generated file map already
/// covers it (by folder placement, filename stem, or in-code markers).
pub fn component_coverage(
    files: &BTreeMap<String, Vec<u8>>,
    components: &[String],
) -> (BTreeMap<String, bool>, Vec<String>) {
    let mut coverage: BTreeMap<String, bool> = components.iter().map(|c| (c.clone(), false)).collect();

    for (rel, bytes) in files {
        let rel_norm = rel.replace('\\', "/").to_lowercase();
        let stem = Path::new(rel)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();
        let content = String::from_utf8_lossy(bytes);

        for component in components {
            if coverage.get(component).copied().unwrap_or(false) {
                continue;
            }
            let folder = placement_folder(component).to_lowercase();
            let placed = !folder.is_empty()
                && (rel_norm.contains(&format!("/{folder}/"))
                    || rel_norm.starts_with(&format!("{folder}/"))
                    || rel_norm.ends_with(&format!("/{folder}"))
                    || rel_norm == folder);
            if placed || file_matches_component(&stem, component) {
                coverage.insert(component.clone(), true);
                continue;
            }
            if placement_keywords(component).iter().any(|kw| rel_norm.contains(kw))
                || detect_component_from_code(&content, std::slice::from_ref(component)).is_some()
            {
                coverage.insert(component.clone(), true);
            }
        }
    }

    let missing: Vec<String> = components
        .iter()
        .filter(|c| !coverage.get(*c).copied().unwrap_or(false))
        .cloned()
        .collect();
    (coverage, missing)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_multiple_components_in_order() {
        let comps = detect_requested_components("Generate a repository, service, and controller for orders");
        assert_eq!(comps, vec!["repository", "service", "controller"]);
    }

    #[test]
    fn domain_entity_from_table_phrase() {
        assert_eq!(infer_domain_entity("create an order table"), "Order");
    }

    #[test]
    fn domain_entity_falls_back_to_known_noun() {
        assert_eq!(infer_domain_entity("build a customer flow"), "Customer");
    }

    #[test]
    fn component_class_name_applies_suffix() {
        assert_eq!(component_class_name("Order", "repository"), "OrderRepository");
        assert_eq!(component_class_name("Order", "entity"), "Order");
    }

    #[test]
    fn coverage_detects_by_folder_placement() {
        let mut files = BTreeMap::new();
        files.insert(
            "src/main/java/com/acme/repository/OrderRepository.java".to_string(),
            b"public interface OrderRepository {}".to_vec(),
        );
        let components = vec!["repository".to_string(), "service".to_string()];
        let (coverage, missing) = component_coverage(&files, &components);
        assert!(coverage["repository"]);
        assert_eq!(missing, vec!["service".to_string()]);
    }

    #[test]
    fn coverage_detects_by_annotation() {
        let mut files = BTreeMap::new();
        files.insert(
            "OrderService.java".to_string(),
            b"@Service\npublic class OrderService {}".to_vec(),
        );
        let components = vec!["service".to_string()];
        let (coverage, missing) = component_coverage(&files, &components);
        assert!(coverage["service"]);
        assert!(missing.is_empty());
    }
}
