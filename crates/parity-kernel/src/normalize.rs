//! Trace normalization: strip volatile noise so equivalent behavior compares equal.
//!
//! Passes, each independently toggleable through [`NormalizationConfig`]:
//! 1. timestamps become deltas from the first event (floored at zero)
//! 2. raw actions are lowercased and folded through a fixed synonym table
//! 3. absolute Windows/POSIX paths become workspace-relative, forward-slashed
//! 4. session/request/UUID/ULID-shaped tokens become `<ID>`
//! 5. ISO-8601 timestamps and long digit runs become `<NONDET>`
//!
//! Passes 3-5 apply to every string inside the payload, recursively.
//! Normalization is pure and total.

use crate::scenario::NormalizationConfig;
use crate::trace::TraceEvent;
use regex::{Captures, Regex};
use serde_json::Value;
use std::sync::LazyLock;

pub const ID_TOKEN: &str = "<ID>";
pub const NONDET_TOKEN: &str = "<NONDET>";

const ACTION_ALIASES: &[(&str, &str)] = &[
    ("run", "execute"),
    ("send", "execute"),
    ("create", "execute"),
    ("exec", "execute"),
    ("invoke", "execute"),
    ("start", "execute"),
    ("kill", "terminate"),
    ("close", "terminate"),
    ("stop", "terminate"),
    ("cancel", "terminate"),
    ("get", "read"),
    ("fetch", "read"),
    ("view", "read"),
    ("put", "write"),
    ("save", "write"),
    ("update", "write"),
];

static PREFIXED_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:sess|session|req|request|run|call|msg|conv|trace)[-_][A-Za-z0-9_-]*[0-9][A-Za-z0-9_-]*\b",
    )
    .expect("prefixed id pattern must compile")
});

static UUID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}\b")
        .expect("uuid pattern must compile")
});

static ULID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[0-7][0-9A-HJKMNP-TV-Z]{25}\b").expect("ulid pattern must compile")
});

static ISO_TIMESTAMP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}(?::\d{2}(?:\.\d+)?)?(?:Z|[+-]\d{2}:?\d{2})?",
    )
    .expect("iso timestamp pattern must compile")
});

static LONG_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{6,}\b").expect("long number pattern must compile"));

static ABSOLUTE_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(^|[\s"'=(\[,])((?:[A-Za-z]:[\\/][^\s"'<>|,;)\]]*)|(?:/[^\s"'<>|,;)\]/][^\s"'<>|,;)\]]*))"#)
        .expect("absolute path pattern must compile")
});

/// Options for one normalization call.
#[derive(Debug, Clone, Default)]
pub struct NormalizeOptions {
    pub config: NormalizationConfig,
    /// Workspace root used for path relativization.
    pub workspace_path: Option<String>,
}

impl NormalizeOptions {
    pub fn new(config: NormalizationConfig, workspace_path: Option<String>) -> Self {
        Self {
            config,
            workspace_path,
        }
    }
}

/// Derive normalized events from raw events.
pub fn normalize_events(raw: &[TraceEvent], options: &NormalizeOptions) -> Vec<TraceEvent> {
    let origin = raw.first().map_or(0, |e| e.timestamp_ms);
    raw.iter()
        .map(|event| normalize_event(event, origin, options))
        .collect()
}

fn normalize_event(event: &TraceEvent, origin: u64, options: &NormalizeOptions) -> TraceEvent {
    let config = &options.config;
    let mut out = event.clone();

    if config.timestamps {
        out.timestamp_ms = event.timestamp_ms.saturating_sub(origin);
    }

    let action_source = event.action_raw.as_deref().or(event.action_canonical.as_deref());
    out.action_canonical = action_source.map(|a| canonical_action(a, config.action_aliases));

    out.payload = event
        .payload
        .as_ref()
        .map(|payload| canonicalize_value(payload, options));

    out
}

/// Lowercase and trim an action; fold it through the synonym table when enabled.
pub fn canonical_action(raw: &str, aliases: bool) -> String {
    let lowered = raw.trim().to_ascii_lowercase();
    if !aliases {
        return lowered;
    }
    ACTION_ALIASES
        .iter()
        .find(|(alias, _)| *alias == lowered)
        .map(|(_, canonical)| (*canonical).to_string())
        .unwrap_or(lowered)
}

fn canonicalize_value(value: &Value, options: &NormalizeOptions) -> Value {
    match value {
        Value::String(s) => Value::String(canonicalize_text(s, options)),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| canonicalize_value(item, options))
                .collect(),
        ),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), canonicalize_value(v, options)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Apply the string-level passes (paths, IDs, non-deterministic text).
pub fn canonicalize_text(text: &str, options: &NormalizeOptions) -> String {
    let config = &options.config;
    let mut out = text.to_string();
    if config.paths {
        out = canonicalize_paths_in_text(&out, options.workspace_path.as_deref());
    }
    if config.ids {
        out = mask_ids(&out);
    }
    if config.strip_nondeterministic_text {
        out = strip_nondeterministic(&out);
    }
    out
}

fn canonicalize_paths_in_text(text: &str, workspace: Option<&str>) -> String {
    ABSOLUTE_PATH
        .replace_all(text, |caps: &Captures<'_>| {
            format!("{}{}", &caps[1], canonicalize_path(&caps[2], workspace))
        })
        .into_owned()
}

/// Convert one absolute path to forward-slash, workspace-relative form.
///
/// The workspace prefix match is case-insensitive. Paths outside the
/// workspace come back as the forward-slashed absolute path.
pub fn canonicalize_path(path: &str, workspace: Option<&str>) -> String {
    let normalized = forward_slashes(path);
    let Some(workspace) = workspace else {
        return normalized;
    };
    let root = forward_slashes(workspace);
    let root = root.trim_end_matches('/');
    if root.is_empty() {
        return normalized;
    }

    let lower_path = normalized.to_ascii_lowercase();
    let lower_root = root.to_ascii_lowercase();
    if lower_path == lower_root || lower_path == format!("{lower_root}/") {
        return ".".to_string();
    }
    if lower_path.starts_with(&format!("{lower_root}/")) {
        return normalized[root.len() + 1..].to_string();
    }
    normalized
}

fn forward_slashes(path: &str) -> String {
    let mut out = path.trim().replace('\\', "/");
    while out.contains("//") {
        out = out.replace("//", "/");
    }
    out
}

/// Replace session/request/UUID/ULID-shaped tokens with `<ID>`.
pub fn mask_ids(text: &str) -> String {
    let out = PREFIXED_ID.replace_all(text, ID_TOKEN);
    let out = UUID.replace_all(&out, ID_TOKEN);
    ULID.replace_all(&out, ID_TOKEN).into_owned()
}

/// Replace ISO-8601 timestamps and long digit runs with `<NONDET>`.
pub fn strip_nondeterministic(text: &str) -> String {
    let out = ISO_TIMESTAMP.replace_all(text, NONDET_TOKEN);
    LONG_NUMBER.replace_all(&out, NONDET_TOKEN).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::EventType;
    use serde_json::json;

    fn options(workspace: &str) -> NormalizeOptions {
        NormalizeOptions::new(NormalizationConfig::default(), Some(workspace.to_string()))
    }

    #[test]
    fn windows_and_posix_paths_converge() {
        assert_eq!(
            canonicalize_path(r"C:\repo\src\module.ts", Some(r"C:\repo")),
            "src/module.ts"
        );
        assert_eq!(
            canonicalize_path("/repo/src/module.ts", Some("/repo")),
            "src/module.ts"
        );
        assert_eq!(
            canonicalize_path(r"c:\Repo\src\module.ts", Some(r"C:\repo\")),
            "src/module.ts"
        );
    }

    #[test]
    fn paths_outside_workspace_stay_absolute() {
        assert_eq!(
            canonicalize_path(r"D:\other\file.txt", Some(r"C:\repo")),
            "D:/other/file.txt"
        );
        assert_eq!(
            canonicalize_path("/repository/x", Some("/repo")),
            "/repository/x"
        );
    }

    #[test]
    fn paths_inside_text_are_rewritten() {
        let opts = options("/repo");
        assert_eq!(
            canonicalize_text("opened /repo/src/a.ts and (/tmp/x.log)", &opts),
            "opened src/a.ts and (/tmp/x.log)"
        );
        assert_eq!(
            canonicalize_text("see https://example.com/a/b", &opts),
            "see https://example.com/a/b"
        );
    }

    #[test]
    fn ids_are_masked() {
        assert_eq!(mask_ids("session sess_abc123 ok"), "session <ID> ok");
        assert_eq!(
            mask_ids("req-7f3e9a01-aaaa-4bbb-8ccc-123456789abc"),
            "<ID>"
        );
        assert_eq!(mask_ids("id=550e8400-e29b-41d4-a716-446655440000"), "id=<ID>");
        assert_eq!(mask_ids("01ARZ3NDEKTSV4RRFFQ69G5FAV"), "<ID>");
        assert_eq!(mask_ids("run_build_script"), "run_build_script");
    }

    #[test]
    fn nondeterministic_text_is_stripped() {
        assert_eq!(
            strip_nondeterministic("at 2024-03-01T12:30:45.123Z pid 1234567"),
            "at <NONDET> pid <NONDET>"
        );
        assert_eq!(strip_nondeterministic("exit 127"), "exit 127");
    }

    #[test]
    fn action_aliases() {
        assert_eq!(canonical_action(" Run ", true), "execute");
        assert_eq!(canonical_action("kill", true), "terminate");
        assert_eq!(canonical_action("close", true), "terminate");
        assert_eq!(canonical_action("Run", false), "run");
        assert_eq!(canonical_action("launch_build_script", true), "launch_build_script");
    }

    #[test]
    fn events_normalize_without_mutating_input() {
        let mut first = TraceEvent::new(EventType::ToolCall, "S", 1_000);
        first.action_raw = Some("send".into());
        first.payload = Some(json!({
            "cwd": r"C:\repo\src",
            "nested": [{"session": "sess-99x"}],
            "count": 3
        }));
        let second = TraceEvent::new(EventType::Outcome, "S", 1_250);
        let mut early = TraceEvent::new(EventType::Wait, "S", 900);
        early.payload = None;
        let raw = vec![first, second, early];

        let normalized = normalize_events(&raw, &options(r"C:\repo"));
        assert_eq!(normalized[0].timestamp_ms, 0);
        assert_eq!(normalized[1].timestamp_ms, 250);
        assert_eq!(normalized[2].timestamp_ms, 0);
        assert_eq!(normalized[0].action_canonical.as_deref(), Some("execute"));
        assert_eq!(
            normalized[0].payload,
            Some(json!({"cwd": "src", "nested": [{"session": "<ID>"}], "count": 3}))
        );
        assert_eq!(raw[0].timestamp_ms, 1_000);
        assert_eq!(raw[0].action_canonical, None);
    }

    #[test]
    fn disabled_passes_leave_values_alone() {
        let config = NormalizationConfig {
            timestamps: false,
            action_aliases: false,
            ids: false,
            paths: false,
            strip_nondeterministic_text: false,
        };
        let mut event = TraceEvent::new(EventType::ToolCall, "S", 5_000);
        event.action_raw = Some("Run".into());
        event.payload = Some(json!({"p": "/repo/a sess_1x 2024-01-01T00:00:00Z"}));
        let out = normalize_events(&[event.clone()], &NormalizeOptions::new(config, Some("/repo".into())));
        assert_eq!(out[0].timestamp_ms, 5_000);
        assert_eq!(out[0].action_canonical.as_deref(), Some("run"));
        assert_eq!(out[0].payload, event.payload);
    }
}
