//! Configuration validation with unknown field detection.
//!
//! `validate_config` inspects the raw JSON before it is deserialized, so a
//! misspelled key (which serde defaults would silently ignore) is reported
//! with a suggestion.

use serde_json::Value;

/// Known top-level config field names.
const KNOWN_TOP_LEVEL: &[&str] = &[
    "agent",
    "compaction",
    "retry",
    "providers",
    "tools",
    "logging",
];

/// Known fields for each section.
const KNOWN_SECTIONS: &[(&str, &[&str])] = &[
    (
        "agent",
        &[
            "model",
            "max_tokens",
            "temperature",
            "max_tool_result_chars",
            "max_conversation_messages",
            "working_directory",
            "streaming",
        ],
    ),
    (
        "compaction",
        &["strategy", "threshold_tokens", "protected_tail_messages"],
    ),
    (
        "retry",
        &[
            "max_retries",
            "base_delay_ms",
            "tool_max_retries",
            "tool_base_delay_ms",
        ],
    ),
    ("providers", &["anthropic"]),
    ("tools", &["brave_api_key"]),
    ("logging", &["level", "format", "file"]),
];

/// A validation diagnostic.
#[derive(Debug)]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    pub path: String,
    pub message: String,
}

#[derive(Debug, PartialEq)]
pub enum DiagnosticLevel {
    Ok,
    Warn,
    Error,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let prefix = match self.level {
            DiagnosticLevel::Ok => "[OK]",
            DiagnosticLevel::Warn => "[WARN]",
            DiagnosticLevel::Error => "[ERROR]",
        };
        if self.path.is_empty() {
            write!(f, "{} {}", prefix, self.message)
        } else {
            write!(f, "{} {}: {}", prefix, self.path, self.message)
        }
    }
}

/// Simple Levenshtein distance for "did you mean?" suggestions.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut matrix = vec![vec![0usize; b.len() + 1]; a.len() + 1];

    for (i, row) in matrix.iter_mut().enumerate() {
        row[0] = i;
    }
    for (j, val) in matrix[0].iter_mut().enumerate() {
        *val = j;
    }

    for (i, ca) in a.iter().enumerate() {
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            matrix[i + 1][j + 1] = (matrix[i][j + 1] + 1)
                .min(matrix[i + 1][j] + 1)
                .min(matrix[i][j] + cost);
        }
    }
    matrix[a.len()][b.len()]
}

/// Suggest the closest known field name (if distance <= 3).
pub fn suggest_field(unknown: &str, known: &[&str]) -> Option<String> {
    known
        .iter()
        .map(|k| (k, levenshtein(unknown, k)))
        .filter(|(_, d)| *d <= 3)
        .min_by_key(|(_, d)| *d)
        .map(|(k, _)| format!("did you mean '{}'?", k))
}

fn unknown_keys(
    obj: &serde_json::Map<String, Value>,
    known: &[&str],
    prefix: &str,
    diagnostics: &mut Vec<Diagnostic>,
) -> bool {
    let mut found = false;
    for key in obj.keys() {
        if known.contains(&key.as_str()) {
            continue;
        }
        found = true;
        let message = match suggest_field(key, known) {
            Some(suggestion) => format!("Unknown field '{}'; {}", key, suggestion),
            None => format!("Unknown field '{}'", key),
        };
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };
        diagnostics.push(Diagnostic {
            level: DiagnosticLevel::Error,
            path,
            message,
        });
    }
    found
}

/// Validate a raw JSON config value against known field names.
pub fn validate_config(raw: &Value) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    let Some(obj) = raw.as_object() else {
        diagnostics.push(Diagnostic {
            level: DiagnosticLevel::Error,
            path: String::new(),
            message: "Config must be a JSON object".to_string(),
        });
        return diagnostics;
    };

    diagnostics.push(Diagnostic {
        level: DiagnosticLevel::Ok,
        path: String::new(),
        message: "Valid JSON".to_string(),
    });

    let mut has_unknown = unknown_keys(obj, KNOWN_TOP_LEVEL, "", &mut diagnostics);
    for (section, known) in KNOWN_SECTIONS {
        if let Some(inner) = obj.get(*section).and_then(|v| v.as_object()) {
            has_unknown |= unknown_keys(inner, known, section, &mut diagnostics);
        }
    }

    if !has_unknown {
        diagnostics.push(Diagnostic {
            level: DiagnosticLevel::Ok,
            path: String::new(),
            message: "All fields recognized".to_string(),
        });
    }

    let inline_key = obj
        .get("providers")
        .and_then(|p| p.get("anthropic"))
        .and_then(|a| a.get("api_key"))
        .and_then(|k| k.as_str())
        .is_some_and(|k| !k.is_empty());
    if inline_key {
        diagnostics.push(Diagnostic {
            level: DiagnosticLevel::Warn,
            path: "providers.anthropic.api_key".to_string(),
            message: "Stored in plain text; consider ANTHROPIC_API_KEY instead".to_string(),
        });
    }

    diagnostics
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein("retry", "retry"), 0);
        assert_eq!(levenshtein("agnet", "agent"), 2);
        assert_eq!(levenshtein("", "abc"), 3);
    }

    #[test]
    fn test_suggest_field() {
        assert_eq!(
            suggest_field("max_token", &["max_tokens", "model"]),
            Some("did you mean 'max_tokens'?".to_string())
        );
        assert_eq!(suggest_field("zzzzzzzz", &["model"]), None);
    }

    #[test]
    fn test_validate_valid_config() {
        let raw = json!({
            "agent": {"model": "m"},
            "compaction": {"strategy": "summarize"},
            "tools": {"brave_api_key": null}
        });
        let diags = validate_config(&raw);
        assert!(diags.iter().all(|d| d.level == DiagnosticLevel::Ok));
    }

    #[test]
    fn test_validate_unknown_fields() {
        let raw = json!({"agnet": {}, "retry": {"max_retrys": 3}});
        let diags = validate_config(&raw);
        let errors: Vec<String> = diags
            .iter()
            .filter(|d| d.level == DiagnosticLevel::Error)
            .map(|d| d.to_string())
            .collect();
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().any(|e| e.contains("did you mean 'agent'?")));
        assert!(errors
            .iter()
            .any(|e| e.starts_with("[ERROR] retry.max_retrys")));
    }

    #[test]
    fn test_validate_not_an_object() {
        let diags = validate_config(&json!([1, 2]));
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].level, DiagnosticLevel::Error);
    }

    #[test]
    fn test_inline_api_key_warns() {
        let raw = json!({"providers": {"anthropic": {"api_key": "sk-1"}}});
        let diags = validate_config(&raw);
        assert!(diags.iter().any(|d| d.level == DiagnosticLevel::Warn));
    }
}
