use std::sync::OnceLock;

use regex::Regex;

use crate::model::EntityKind;
use crate::result::{ErrorCode, ErrorRecord};

const NOT_RUNNING_PHRASES: [&str; 3] = [
    "not running",
    "connection is invalid",
    "application isn't running",
];

struct EntityRule {
    kind: EntityKind,
    code: ErrorCode,
    patterns: Vec<Regex>,
}

// Tracks the host's wording. The first matching rule wins.
fn entity_rules() -> &'static [EntityRule] {
    static RULES: OnceLock<Vec<EntityRule>> = OnceLock::new();
    RULES.get_or_init(|| {
        [
            (EntityKind::Task, ErrorCode::TaskNotFound),
            (EntityKind::Project, ErrorCode::ProjectNotFound),
            (EntityKind::Tag, ErrorCode::TagNotFound),
            (EntityKind::Folder, ErrorCode::FolderNotFound),
            (EntityKind::Perspective, ErrorCode::PerspectiveNotFound),
        ]
        .into_iter()
        .map(|(kind, code)| {
            let name = kind.as_str();
            let patterns = [
                format!(r"can't get (first )?flattened {}\b", name),
                format!(r"\bno {}\b", name),
                format!(r"\b{}\b.*\b(doesn't|does not) exist", name),
            ]
            .iter()
            .map(|pattern| Regex::new(pattern).expect("regex"))
            .collect();
            EntityRule {
                kind,
                code,
                patterns,
            }
        })
        .collect()
    })
}

fn date_rule() -> &'static Regex {
    static RULE: OnceLock<Regex> = OnceLock::new();
    RULE.get_or_init(|| Regex::new(r"can't make .* into type date").expect("regex"))
}

/// Lower-cases and folds typographic apostrophes so `Can’t` matches `can't`.
fn normalize(raw: &str) -> String {
    raw.to_lowercase().replace(['\u{2019}', '\u{2018}'], "'")
}

pub fn classify_code(raw: &str) -> ErrorCode {
    let text = normalize(raw);
    if NOT_RUNNING_PHRASES.iter().any(|phrase| text.contains(phrase)) {
        return ErrorCode::NotRunning;
    }
    for rule in entity_rules() {
        if rule.patterns.iter().any(|pattern| pattern.is_match(&text)) {
            return rule.code;
        }
    }
    if date_rule().is_match(&text) {
        return ErrorCode::InvalidDateFormat;
    }
    ErrorCode::AutomationError
}

fn entity_for(code: ErrorCode) -> Option<EntityKind> {
    entity_rules()
        .iter()
        .find(|rule| rule.code == code)
        .map(|rule| rule.kind)
}

/// Classifies raw failure text. Never fails; unknown text becomes
/// `AUTOMATION_ERROR` with the raw text kept as detail.
pub fn classify(raw: &str) -> ErrorRecord {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return ErrorRecord::new(
            ErrorCode::AutomationError,
            "Automation failed without diagnostic output",
        );
    }
    let code = classify_code(trimmed);
    let message = match code {
        ErrorCode::NotRunning => "The host application is not running".to_string(),
        ErrorCode::InvalidDateFormat => "The host could not interpret a date value".to_string(),
        code if code.is_not_found() => match entity_for(code) {
            Some(kind) => format!("{} not found", capitalize(kind.as_str())),
            None => "Not found".to_string(),
        },
        _ => format!("Automation error: {}", first_line(trimmed)),
    };
    ErrorRecord::new(code, message).with_detail(trimmed)
}

fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or(text)
}
