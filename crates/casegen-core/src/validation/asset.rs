//! Per-content-type asset checks.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use super::{placeholder_violation, word_count, AssetThresholds, ValidationResult, ValidationTarget};
use crate::domain::{AssetContent, ContentType, SlideDeck};
use crate::extract::{strip_fences, Shape};
use crate::parse::StructuralParser;

/// Keys that usually hold the node list of an org chart, checked first.
const ORG_NODE_KEYS: &[&str] = &["nodes", "children", "employees", "members", "reports", "org"];

/// Validate raw generated content for a file of the given type.
pub fn validate_asset(
    content_type: ContentType,
    raw: &str,
    thresholds: &AssetThresholds,
) -> ValidationResult {
    let target = ValidationTarget::Asset(content_type);
    let mut cleaned = clean(content_type, raw);
    let mut violations = Vec::new();

    match interpret_asset(content_type, &cleaned) {
        Ok(content) => {
            if let Some(normalized) = canonical_json(&content) {
                cleaned = normalized;
            }
            violations.extend(check_content(&content, thresholds));
        }
        Err(violation) => violations.push(violation),
    }

    if let Some(v) = placeholder_violation(&cleaned) {
        violations.push(v);
    }

    ValidationResult::new(target, violations, cleaned)
}

fn clean(content_type: ContentType, raw: &str) -> String {
    match content_type {
        // Marp front matter opens with `---`; only an outer code fence is noise.
        ContentType::Presentation | ContentType::Tabular | ContentType::Prose | ContentType::Generic => {
            strip_fences(raw).to_string()
        }
        ContentType::ProfileList | ContentType::MarketDataset | ContentType::OrgChart => {
            raw.trim().to_string()
        }
    }
}

/// Interpret cleaned content as its typed form, or explain why it can't be.
pub fn interpret_asset(content_type: ContentType, cleaned: &str) -> Result<AssetContent, String> {
    match content_type {
        ContentType::Presentation => Ok(AssetContent::Presentation(SlideDeck::parse(cleaned))),
        ContentType::Tabular => Ok(AssetContent::Tabular(
            cleaned
                .lines()
                .filter(|l| !l.trim().is_empty())
                .map(str::to_string)
                .collect(),
        )),
        ContentType::ProfileList => json_array(cleaned, "profiles").map(AssetContent::ProfileList),
        ContentType::MarketDataset => {
            json_array(cleaned, "market data rows").map(AssetContent::MarketDataset)
        }
        ContentType::OrgChart => match parse_json(cleaned, Shape::Either)? {
            Value::Object(map) => Ok(AssetContent::OrgChart(map)),
            other => Err(format!(
                "Org chart must be a JSON object, found {}",
                json_kind(&other)
            )),
        },
        ContentType::Prose => Ok(AssetContent::Prose(cleaned.to_string())),
        ContentType::Generic => Ok(AssetContent::Generic(cleaned.to_string())),
    }
}

fn parse_json(cleaned: &str, shape: Shape) -> Result<Value, String> {
    StructuralParser::default()
        .with_shape(shape)
        .parse(cleaned)
        .map(|ok| ok.value)
        .map_err(|failure| {
            format!(
                "Content is not valid JSON: {} (line {}, column {})",
                failure.detail.message, failure.detail.line, failure.detail.column
            )
        })
}

fn json_array(cleaned: &str, noun: &str) -> Result<Vec<Value>, String> {
    match parse_json(cleaned, Shape::Either)? {
        Value::Array(items) => Ok(items),
        other => Err(format!(
            "Expected a JSON array of {noun}, found {}",
            json_kind(&other)
        )),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Structured content is persisted in normalized form.
fn canonical_json(content: &AssetContent) -> Option<String> {
    let value = match content {
        AssetContent::ProfileList(items) | AssetContent::MarketDataset(items) => {
            Value::Array(items.clone())
        }
        AssetContent::OrgChart(map) => Value::Object(map.clone()),
        _ => return None,
    };
    serde_json::to_string_pretty(&value).ok()
}

fn check_content(content: &AssetContent, t: &AssetThresholds) -> Vec<String> {
    match content {
        AssetContent::Presentation(deck) => check_presentation(deck, t),
        AssetContent::Tabular(lines) => check_table(lines, t),
        AssetContent::ProfileList(items) => check_profiles(items, t),
        AssetContent::MarketDataset(rows) => check_market(rows, t),
        AssetContent::OrgChart(chart) => check_org_chart(chart, t),
        AssetContent::Prose(text) => check_prose(text, t),
        AssetContent::Generic(_) => Vec::new(),
    }
}

fn check_presentation(deck: &SlideDeck, t: &AssetThresholds) -> Vec<String> {
    let mut violations = Vec::new();
    if !deck.has_recognized_front_matter() {
        violations.push(
            "Missing front matter: presentation must open with a '---' delimited block such as 'marp: true'"
                .to_string(),
        );
    }
    let found = deck.slides.len();
    if found < t.min_slides {
        violations.push(format!(
            "Too few slides: found {found}, need at least {}",
            t.min_slides
        ));
    }
    violations
}

fn check_table(lines: &[String], t: &AssetThresholds) -> Vec<String> {
    let found = lines.len();
    if found < t.min_table_lines {
        return vec![format!(
            "Insufficient rows: expected at least {} lines (header + {} data rows), got {found}",
            t.min_table_lines,
            t.min_table_lines.saturating_sub(1)
        )];
    }
    Vec::new()
}

fn check_profiles(items: &[Value], t: &AssetThresholds) -> Vec<String> {
    let found = items.len();
    let mut violations = Vec::new();
    if found < t.min_profiles {
        violations.push(format!(
            "Too few profiles: found {found}, need at least {}",
            t.min_profiles
        ));
    } else if found > t.max_profiles {
        violations.push(format!(
            "Too many profiles: found {found}, need at most {}",
            t.max_profiles
        ));
    }
    let non_objects = items.iter().filter(|p| !p.is_object()).count();
    if non_objects > 0 {
        violations.push(format!(
            "Every profile must be a JSON object; {non_objects} entries are not"
        ));
    }
    violations
}

fn check_market(rows: &[Value], t: &AssetThresholds) -> Vec<String> {
    let found = rows.len();
    if found < t.min_market_rows {
        return vec![format!(
            "Too few market data rows: found {found}, need at least {}",
            t.min_market_rows
        )];
    }
    Vec::new()
}

fn check_org_chart(chart: &serde_json::Map<String, Value>, t: &AssetThresholds) -> Vec<String> {
    let nodes = ORG_NODE_KEYS
        .iter()
        .find_map(|k| chart.get(*k).and_then(Value::as_array))
        .or_else(|| chart.values().find_map(Value::as_array));

    let Some(nodes) = nodes else {
        return vec!["Org chart must contain a nested list of nodes".to_string()];
    };

    let found = count_nodes(nodes);
    if found < t.min_org_nodes {
        return vec![format!(
            "Too few org chart nodes: found {found}, need at least {}",
            t.min_org_nodes
        )];
    }
    Vec::new()
}

/// Count objects in a node list, descending into any array-of-object field.
fn count_nodes(nodes: &[Value]) -> usize {
    nodes
        .iter()
        .filter_map(Value::as_object)
        .map(|node| {
            1 + node
                .values()
                .filter_map(Value::as_array)
                .map(|children| count_nodes(children))
                .sum::<usize>()
        })
        .sum()
}

fn heading_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?m)^ {0,3}#{1,6}\s+\S").expect("valid heading pattern"))
}

fn check_prose(text: &str, t: &AssetThresholds) -> Vec<String> {
    let mut violations = Vec::new();
    let words = word_count(text);
    if words < t.min_prose_words {
        violations.push(format!(
            "Document too short: found {words} words, need at least {}",
            t.min_prose_words
        ));
    }
    let headings = heading_pattern().find_iter(text).count();
    if headings < t.min_prose_headings {
        violations.push(format!(
            "Too few headings: found {headings}, need at least {}",
            t.min_prose_headings
        ));
    }
    violations
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn thresholds() -> AssetThresholds {
        AssetThresholds::default()
    }

    fn deck(slides: usize) -> String {
        let bodies: Vec<String> = (1..=slides).map(|i| format!("# Slide {i}\nPoint")).collect();
        format!("---\nmarp: true\ntheme: default\n---\n{}", bodies.join("\n---\n"))
    }

    fn table(lines: usize) -> String {
        let mut rows = vec!["quarter,revenue,cost".to_string()];
        rows.extend((1..lines).map(|i| format!("Q{i},{},{}", i * 100, i * 60)));
        rows.join("\n")
    }

    fn array_of(n: usize) -> String {
        let items: Vec<Value> = (0..n).map(|i| json!({ "name": format!("Person {i}"), "value": i })).collect();
        serde_json::to_string(&items).unwrap()
    }

    fn prose(words: usize, headings: usize) -> String {
        let mut out = String::new();
        for h in 0..headings {
            out.push_str(&format!("## Section {h}\n\n"));
        }
        out.push_str(&vec!["word"; words.saturating_sub(headings * 2)].join(" "));
        out
    }

    fn org(nodes: usize) -> String {
        // one root with a chain of direct reports
        let reports: Vec<Value> = (1..nodes).map(|i| json!({ "name": format!("N{i}") })).collect();
        json!({ "company": "Acme", "nodes": [{ "name": "CEO", "reports": reports }] }).to_string()
    }

    #[test]
    fn presentation_slide_boundaries() {
        let t = thresholds();
        let below = validate_asset(ContentType::Presentation, &deck(t.min_slides - 1), &t);
        assert!(!below.valid);
        assert!(below.violations[0].contains(&format!(
            "found {}, need at least {}",
            t.min_slides - 1,
            t.min_slides
        )));

        assert!(validate_asset(ContentType::Presentation, &deck(t.min_slides), &t).valid);
        assert!(validate_asset(ContentType::Presentation, &deck(t.min_slides + 1), &t).valid);
    }

    #[test]
    fn presentation_nine_slides_message() {
        let result = validate_asset(ContentType::Presentation, &deck(9), &thresholds());
        assert_eq!(result.violations, vec!["Too few slides: found 9, need at least 12"]);
    }

    #[test]
    fn presentation_requires_front_matter_and_strips_fences() {
        let t = thresholds();
        let bare = deck(12).replacen("---\nmarp: true\ntheme: default\n---\n", "", 1);
        let result = validate_asset(ContentType::Presentation, &bare, &t);
        assert!(result.violations.iter().any(|v| v.starts_with("Missing front matter")));

        let fenced = format!("```markdown\n{}\n```", deck(12));
        let result = validate_asset(ContentType::Presentation, &fenced, &t);
        assert!(result.valid, "{:?}", result.violations);
        assert!(result.cleaned.starts_with("---\nmarp: true"));
    }

    #[test]
    fn table_line_boundaries() {
        let t = thresholds();
        let below = validate_asset(ContentType::Tabular, &table(t.min_table_lines - 1), &t);
        assert!(!below.valid);
        assert!(validate_asset(ContentType::Tabular, &table(t.min_table_lines), &t).valid);
        assert!(validate_asset(ContentType::Tabular, &table(t.min_table_lines + 1), &t).valid);
    }

    #[test]
    fn table_eleven_lines_message() {
        let result = validate_asset(ContentType::Tabular, &table(11), &thresholds());
        assert_eq!(
            result.violations,
            vec!["Insufficient rows: expected at least 17 lines (header + 16 data rows), got 11"]
        );
    }

    #[test]
    fn table_ignores_blank_lines() {
        let t = thresholds();
        let spaced = table(t.min_table_lines).replace('\n', "\n\n");
        assert!(validate_asset(ContentType::Tabular, &spaced, &t).valid);
    }

    #[test]
    fn profile_range() {
        let t = thresholds();
        let result = validate_asset(ContentType::ProfileList, &array_of(t.min_profiles - 1), &t);
        assert!(result.violations[0].starts_with("Too few profiles"));
        assert!(validate_asset(ContentType::ProfileList, &array_of(t.min_profiles), &t).valid);
        assert!(validate_asset(ContentType::ProfileList, &array_of(t.max_profiles), &t).valid);
        let result = validate_asset(ContentType::ProfileList, &array_of(t.max_profiles + 1), &t);
        assert!(result.violations[0].starts_with("Too many profiles"));
    }

    #[test]
    fn profiles_must_be_array() {
        let result = validate_asset(ContentType::ProfileList, r#"{"name": "solo"}"#, &thresholds());
        assert_eq!(
            result.violations,
            vec!["Expected a JSON array of profiles, found object"]
        );
    }

    #[test]
    fn market_rows_boundaries_and_repairable_json() {
        let t = thresholds();
        assert!(!validate_asset(ContentType::MarketDataset, &array_of(t.min_market_rows - 1), &t).valid);
        assert!(validate_asset(ContentType::MarketDataset, &array_of(t.min_market_rows), &t).valid);

        let sloppy = format!("```json\n{},\n]\n```", array_of(t.min_market_rows).trim_end_matches(']'));
        let result = validate_asset(ContentType::MarketDataset, &sloppy, &t);
        assert!(result.valid, "{:?}", result.violations);
        assert!(serde_json::from_str::<Value>(&result.cleaned).unwrap().is_array());
    }

    #[test]
    fn invalid_json_is_a_violation() {
        let result = validate_asset(ContentType::MarketDataset, "not json at all", &thresholds());
        assert!(!result.valid);
        assert!(result.violations[0].starts_with("Content is not valid JSON"));
    }

    #[test]
    fn org_chart_counts_nested_nodes() {
        let t = thresholds();
        assert!(!validate_asset(ContentType::OrgChart, &org(t.min_org_nodes - 1), &t).valid);
        assert!(validate_asset(ContentType::OrgChart, &org(t.min_org_nodes), &t).valid);

        let flat = json!({ "title": "Acme" }).to_string();
        let result = validate_asset(ContentType::OrgChart, &flat, &t);
        assert_eq!(result.violations, vec!["Org chart must contain a nested list of nodes"]);

        let list = validate_asset(ContentType::OrgChart, "[]", &t);
        assert_eq!(list.violations, vec!["Org chart must be a JSON object, found array"]);
    }

    #[test]
    fn prose_word_and_heading_boundaries() {
        let t = thresholds();
        let short = validate_asset(ContentType::Prose, &prose(t.min_prose_words - 1, 5), &t);
        assert_eq!(
            short.violations,
            vec![format!(
                "Document too short: found {} words, need at least 900",
                t.min_prose_words - 1
            )]
        );
        assert!(validate_asset(ContentType::Prose, &prose(t.min_prose_words, 5), &t).valid);
        assert!(validate_asset(ContentType::Prose, &prose(t.min_prose_words + 1, 5), &t).valid);

        let few = validate_asset(ContentType::Prose, &prose(1000, 4), &t);
        assert_eq!(few.violations, vec!["Too few headings: found 4, need at least 5"]);
    }

    #[test]
    fn placeholders_flagged_everywhere() {
        let t = thresholds();
        let text = format!("{}\n[Placeholder: insert CFO quote]", prose(1000, 5));
        let result = validate_asset(ContentType::Prose, &text, &t);
        assert_eq!(result.violations.len(), 1);
        assert!(result.violations[0].contains("placeholder"));

        let generic = validate_asset(ContentType::Generic, "lorem ipsum", &t);
        assert!(!generic.valid);
        assert!(validate_asset(ContentType::Generic, "anything goes", &t).valid);
    }

    #[test]
    fn custom_thresholds_apply() {
        let t = AssetThresholds {
            min_slides: 2,
            ..AssetThresholds::default()
        };
        assert!(validate_asset(ContentType::Presentation, &deck(2), &t).valid);
    }
}
