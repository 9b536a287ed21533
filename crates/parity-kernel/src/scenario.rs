//! Scenario suite schema, normalization, and content digests.
//!
//! A raw suite is parsed into a canonical in-memory form. Parsing is pure and
//! fails fast: the first structural problem aborts the whole suite, except for
//! duplicate IDs, which are collected across the entire suite before failing.
//!
//! Every scenario carries a `scenario_digest` computed over its fully
//! normalized form (digest field excluded) using canonical JSON, so parsing
//! the same logical input twice always yields the same digest.

use crate::error::SchemaError;
use crate::stable_json::digest_value;
use crate::trace::Profile;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

/// Drift severity, ordered `low < medium < high`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }
}

/// Closed set of comparator rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckType {
    ToolOrder,
    AuthOutcome,
    Flow,
    SuccessSignature,
}

impl CheckType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ToolOrder => "tool_order",
            Self::AuthOutcome => "auth_outcome",
            Self::Flow => "flow",
            Self::SuccessSignature => "success_signature",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "tool_order" => Some(Self::ToolOrder),
            "auth_outcome" => Some(Self::AuthOutcome),
            "flow" => Some(Self::Flow),
            "success_signature" => Some(Self::SuccessSignature),
            _ => None,
        }
    }
}

/// One declared comparison check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckSpec {
    pub id: String,
    #[serde(rename = "type")]
    pub check_type: CheckType,
    pub severity: Severity,
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strict_order: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl CheckSpec {
    /// Look up a key in `expected`, then in `metadata`.
    pub fn declared(&self, key: &str) -> Option<&Value> {
        self.expected
            .as_ref()
            .and_then(|v| v.get(key))
            .or_else(|| self.metadata.as_ref().and_then(|v| v.get(key)))
    }
}

/// Terminal surface a build-script launch is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalSurface {
    #[default]
    Auto,
    MemoryTerminal,
    MemoryTerminalInteractive,
}

impl TerminalSurface {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::MemoryTerminal => "memory_terminal",
            Self::MemoryTerminalInteractive => "memory_terminal_interactive",
        }
    }

    /// Strict parse: `None` for anything outside the closed set.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "auto" => Some(Self::Auto),
            "memory_terminal" => Some(Self::MemoryTerminal),
            "memory_terminal_interactive" => Some(Self::MemoryTerminalInteractive),
            _ => None,
        }
    }

    /// Lenient parse used by scenario normalization: unknown values become `auto`.
    pub fn parse_or_auto(raw: &str) -> Self {
        Self::parse(raw).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeMode {
    #[default]
    Batch,
    Interactive,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    pub terminal_surface: TerminalSurface,
    pub mode: RuntimeMode,
}

/// A tool invocation step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolStep {
    pub tool: String,
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_outcome: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_hint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<Profile>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScenarioStep {
    User {
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        profile: Option<Profile>,
    },
    Tool(ToolStep),
    Wait {
        duration_ms: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        profile: Option<Profile>,
    },
}

impl ScenarioStep {
    /// Whether this step is emitted when running under `profile`.
    pub fn applies_to(&self, profile: Profile) -> bool {
        let restriction = match self {
            Self::User { profile, .. } | Self::Wait { profile, .. } => *profile,
            Self::Tool(step) => step.profile,
        };
        restriction.is_none_or(|p| p == profile)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expectations {
    pub success_signature: Vec<String>,
    pub checks: Vec<CheckSpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub surface: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
}

impl TagMetadata {
    fn synthesized_tags(&self) -> Vec<String> {
        [
            ("domain", &self.domain),
            ("surface", &self.surface),
            ("risk", &self.risk),
            ("priority", &self.priority),
        ]
        .into_iter()
        .filter_map(|(prefix, value)| value.as_ref().map(|v| format!("{prefix}:{v}")))
        .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stabilization {
    pub fixture_seed: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_budget_ms: Option<u64>,
}

/// Per-scenario drift ceilings; `None` means unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptanceThresholds {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_high: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_medium: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_low: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_total_drifts: Option<u32>,
}

/// Which trace normalization passes run for a scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizationConfig {
    pub timestamps: bool,
    pub action_aliases: bool,
    pub ids: bool,
    pub paths: bool,
    pub strip_nondeterministic_text: bool,
}

impl Default for NormalizationConfig {
    fn default() -> Self {
        Self {
            timestamps: true,
            action_aliases: true,
            ids: true,
            paths: true,
            strip_nondeterministic_text: true,
        }
    }
}

impl NormalizationConfig {
    /// Force the passes that matrix determinism controls make mandatory.
    pub fn with_required_passes(mut self) -> Self {
        self.timestamps = true;
        self.paths = true;
        self.strip_nondeterministic_text = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub scenario_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub steps: Vec<ScenarioStep>,
    pub expectations: Expectations,
    pub tags: Vec<String>,
    pub tag_metadata: TagMetadata,
    pub stabilization: Stabilization,
    pub acceptance_thresholds: AcceptanceThresholds,
    pub normalization: NormalizationConfig,
    pub runtime: RuntimeConfig,
    pub scenario_digest: String,
}

impl Scenario {
    /// Digest over the normalized scenario with the digest field removed.
    pub fn compute_digest(&self) -> String {
        let mut value = serde_json::to_value(self).unwrap_or(Value::Null);
        if let Value::Object(map) = &mut value {
            map.remove("scenario_digest");
        }
        format!("sd1_{}", digest_value(&value))
    }

    /// Recompute the digest after an in-memory override.
    pub fn refresh_digest(&mut self) {
        self.scenario_digest = self.compute_digest();
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        let wanted = tag.trim().to_ascii_lowercase();
        self.tags.iter().any(|t| *t == wanted)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioSuite {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suite_id: Option<String>,
    pub scenarios: Vec<Scenario>,
}

impl ScenarioSuite {
    /// Digest over the ordered scenario digests.
    pub fn suite_digest(&self) -> String {
        suite_digest(&self.scenarios)
    }

    pub fn scenario(&self, id: &str) -> Option<&Scenario> {
        self.scenarios.iter().find(|s| s.scenario_id == id)
    }
}

pub fn suite_digest(scenarios: &[Scenario]) -> String {
    let digests: Vec<Value> = scenarios
        .iter()
        .map(|s| Value::String(s.scenario_digest.clone()))
        .collect();
    format!("ss1_{}", digest_value(&Value::Array(digests)))
}

/// Normalize a raw scenario ID to canonical upper-snake form.
///
/// Returns `None` when the result would not match `^[A-Z][A-Z0-9_]*$`.
pub fn normalize_scenario_id(raw: &str) -> Option<String> {
    let mut out = String::new();
    for ch in raw.trim().chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch.to_ascii_uppercase());
        } else if !out.ends_with('_') {
            out.push('_');
        }
    }
    let out = out.trim_matches('_').to_string();
    let mut chars = out.chars();
    let first = chars.next()?;
    if !first.is_ascii_uppercase() {
        return None;
    }
    if chars.all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_') {
        Some(out)
    } else {
        None
    }
}

/// Parse and validate a raw suite document.
///
/// Accepts `{ "suite_id"?: string, "scenarios": [ ... ] }`.
pub fn parse_suite(raw: &Value) -> Result<ScenarioSuite, SchemaError> {
    let root = raw.as_object().ok_or_else(|| SchemaError::NotAnObject {
        context: "scenario suite".to_string(),
    })?;
    let suite_id = opt_string(root, "suite_id", "scenario suite")?;
    let items = root
        .get("scenarios")
        .and_then(Value::as_array)
        .ok_or_else(|| SchemaError::MissingField {
            context: "scenario suite".to_string(),
            field: "scenarios".to_string(),
        })?;

    let mut scenarios = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        scenarios.push(parse_scenario(item, index)?);
    }

    let mut seen: BTreeMap<&str, usize> = BTreeMap::new();
    for scenario in &scenarios {
        *seen.entry(scenario.scenario_id.as_str()).or_default() += 1;
    }
    let duplicates: Vec<String> = seen
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|(id, _)| id.to_string())
        .collect();
    if !duplicates.is_empty() {
        return Err(SchemaError::DuplicateScenarioIds { ids: duplicates });
    }

    Ok(ScenarioSuite {
        suite_id,
        scenarios,
    })
}

/// Parse and validate a single raw scenario object.
pub fn parse_scenario(raw: &Value, index: usize) -> Result<Scenario, SchemaError> {
    let position = format!("scenarios[{index}]");
    let obj = raw.as_object().ok_or_else(|| SchemaError::NotAnObject {
        context: position.clone(),
    })?;

    let raw_id = obj
        .get("scenario_id")
        .and_then(Value::as_str)
        .ok_or_else(|| SchemaError::MissingField {
            context: position.clone(),
            field: "scenario_id".to_string(),
        })?;
    let scenario_id = normalize_scenario_id(raw_id).ok_or_else(|| SchemaError::InvalidScenarioId {
        raw: raw_id.to_string(),
    })?;
    let ctx = format!("scenario {scenario_id}");

    let stabilization = parse_stabilization(obj.get("stabilization"), &ctx)?;

    let raw_steps = obj
        .get("steps")
        .and_then(Value::as_array)
        .ok_or_else(|| SchemaError::MissingField {
            context: ctx.clone(),
            field: "steps".to_string(),
        })?;
    let mut steps = Vec::with_capacity(raw_steps.len());
    for (step_index, raw_step) in raw_steps.iter().enumerate() {
        steps.push(parse_step(
            raw_step,
            &format!("{ctx} steps[{step_index}]"),
            stabilization.wait_budget_ms,
        )?);
    }

    let expectations_obj = obj
        .get("expectations")
        .and_then(Value::as_object)
        .ok_or_else(|| SchemaError::MissingField {
            context: ctx.clone(),
            field: "expectations".to_string(),
        })?;
    let expectations = parse_expectations(expectations_obj, &scenario_id, &ctx)?;

    let tag_metadata = parse_tag_metadata(obj.get("tag_metadata"), &ctx)?;
    let mut tags: BTreeSet<String> = string_list(obj.get("tags"), &ctx, "tags")?
        .into_iter()
        .map(|t| t.to_ascii_lowercase())
        .collect();
    tags.extend(tag_metadata.synthesized_tags());

    let mut scenario = Scenario {
        scenario_id,
        title: opt_string(obj, "title", &ctx)?,
        steps,
        expectations,
        tags: tags.into_iter().collect(),
        tag_metadata,
        stabilization,
        acceptance_thresholds: parse_thresholds(obj.get("acceptance_thresholds"), &ctx)?,
        normalization: parse_normalization(obj.get("normalization"), &ctx)?,
        runtime: parse_runtime(obj.get("runtime"), &ctx)?,
        scenario_digest: String::new(),
    };
    scenario.refresh_digest();
    Ok(scenario)
}

fn parse_step(raw: &Value, ctx: &str, wait_budget_ms: Option<u64>) -> Result<ScenarioStep, SchemaError> {
    let obj = raw.as_object().ok_or_else(|| SchemaError::NotAnObject {
        context: ctx.to_string(),
    })?;
    let kind = obj
        .get("kind")
        .and_then(Value::as_str)
        .ok_or_else(|| SchemaError::MissingField {
            context: ctx.to_string(),
            field: "kind".to_string(),
        })?;
    let profile = parse_step_profile(obj, ctx)?;

    match kind.trim() {
        "user" => Ok(ScenarioStep::User {
            text: required_string(obj, "text", ctx)?,
            profile,
        }),
        "tool" => Ok(ScenarioStep::Tool(ToolStep {
            tool: required_string(obj, "tool", ctx)?,
            action: required_string(obj, "action", ctx)?,
            args: obj.get("args").filter(|v| !v.is_null()).cloned(),
            auth_outcome: opt_string(obj, "auth_outcome", ctx)?,
            auth_reason: opt_string(obj, "auth_reason", ctx)?,
            tool_hint: opt_string(obj, "tool_hint", ctx)?,
            profile,
        })),
        "wait" => {
            let requested = obj
                .get("duration_ms")
                .and_then(Value::as_u64)
                .ok_or_else(|| SchemaError::MissingField {
                    context: ctx.to_string(),
                    field: "duration_ms".to_string(),
                })?;
            let duration_ms = match wait_budget_ms {
                Some(budget) => requested.min(budget),
                None => requested,
            };
            Ok(ScenarioStep::Wait {
                duration_ms,
                profile,
            })
        }
        other => Err(SchemaError::UnsupportedStepKind {
            context: ctx.to_string(),
            value: other.to_string(),
        }),
    }
}

fn parse_step_profile(obj: &Map<String, Value>, ctx: &str) -> Result<Option<Profile>, SchemaError> {
    let Some(raw) = opt_string(obj, "profile", ctx)? else {
        return Ok(None);
    };
    Profile::parse(&raw)
        .map(Some)
        .ok_or_else(|| SchemaError::InvalidField {
            context: ctx.to_string(),
            field: "profile".to_string(),
            reason: format!("expected `baseline` or `candidate`, got `{raw}`"),
        })
}

fn parse_expectations(
    obj: &Map<String, Value>,
    scenario_id: &str,
    ctx: &str,
) -> Result<Expectations, SchemaError> {
    let success_signature = string_list(obj.get("success_signature"), ctx, "expectations.success_signature")?;
    if success_signature.is_empty() {
        return Err(SchemaError::EmptySuccessSignature {
            scenario_id: scenario_id.to_string(),
        });
    }

    let checks = match obj.get("checks") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => {
            let mut out = Vec::with_capacity(items.len());
            for (idx, item) in items.iter().enumerate() {
                out.push(parse_check(item, idx, &format!("{ctx} checks[{idx}]"))?);
            }
            out
        }
        Some(_) => {
            return Err(SchemaError::InvalidField {
                context: ctx.to_string(),
                field: "expectations.checks".to_string(),
                reason: "must be a list".to_string(),
            });
        }
    };

    Ok(Expectations {
        success_signature,
        checks,
    })
}

fn parse_check(raw: &Value, index: usize, ctx: &str) -> Result<CheckSpec, SchemaError> {
    let obj = raw.as_object().ok_or_else(|| SchemaError::NotAnObject {
        context: ctx.to_string(),
    })?;
    let raw_type = obj
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| SchemaError::MissingField {
            context: ctx.to_string(),
            field: "type".to_string(),
        })?;
    let check_type = CheckType::parse(raw_type).ok_or_else(|| SchemaError::UnsupportedCheckType {
        context: ctx.to_string(),
        value: raw_type.to_string(),
    })?;
    let raw_severity = obj
        .get("severity")
        .and_then(Value::as_str)
        .ok_or_else(|| SchemaError::MissingField {
            context: ctx.to_string(),
            field: "severity".to_string(),
        })?;
    let severity = Severity::parse(raw_severity).ok_or_else(|| SchemaError::UnsupportedSeverity {
        context: ctx.to_string(),
        value: raw_severity.to_string(),
    })?;

    let id = opt_string(obj, "id", ctx)?.unwrap_or_else(|| format!("CHECK_{}", index + 1));

    Ok(CheckSpec {
        id,
        check_type,
        severity,
        required: opt_bool(obj, "required", ctx)?.unwrap_or(true),
        strict_order: opt_bool(obj, "strict_order", ctx)?,
        expected: obj.get("expected").filter(|v| !v.is_null()).cloned(),
        metadata: obj.get("metadata").filter(|v| !v.is_null()).cloned(),
    })
}

fn parse_tag_metadata(raw: Option<&Value>, ctx: &str) -> Result<TagMetadata, SchemaError> {
    let Some(obj) = optional_object(raw, ctx, "tag_metadata")? else {
        return Ok(TagMetadata::default());
    };
    let lower = |v: Option<String>| v.map(|s| s.to_ascii_lowercase());
    Ok(TagMetadata {
        domain: lower(opt_string(obj, "domain", ctx)?),
        surface: lower(opt_string(obj, "surface", ctx)?),
        risk: lower(opt_string(obj, "risk", ctx)?),
        priority: lower(opt_string(obj, "priority", ctx)?),
    })
}

fn parse_stabilization(raw: Option<&Value>, ctx: &str) -> Result<Stabilization, SchemaError> {
    let Some(obj) = optional_object(raw, ctx, "stabilization")? else {
        return Ok(Stabilization::default());
    };
    Ok(Stabilization {
        fixture_seed: opt_u64(obj, "fixture_seed", ctx)?.unwrap_or(0),
        wait_budget_ms: opt_u64(obj, "wait_budget_ms", ctx)?,
    })
}

fn parse_thresholds(raw: Option<&Value>, ctx: &str) -> Result<AcceptanceThresholds, SchemaError> {
    let Some(obj) = optional_object(raw, ctx, "acceptance_thresholds")? else {
        return Ok(AcceptanceThresholds::default());
    };
    Ok(AcceptanceThresholds {
        max_high: opt_u32(obj, "max_high", ctx)?,
        max_medium: opt_u32(obj, "max_medium", ctx)?,
        max_low: opt_u32(obj, "max_low", ctx)?,
        max_total_drifts: opt_u32(obj, "max_total_drifts", ctx)?,
    })
}

fn parse_normalization(raw: Option<&Value>, ctx: &str) -> Result<NormalizationConfig, SchemaError> {
    let defaults = NormalizationConfig::default();
    let Some(obj) = optional_object(raw, ctx, "normalization")? else {
        return Ok(defaults);
    };
    Ok(NormalizationConfig {
        timestamps: opt_bool(obj, "timestamps", ctx)?.unwrap_or(defaults.timestamps),
        action_aliases: opt_bool(obj, "action_aliases", ctx)?.unwrap_or(defaults.action_aliases),
        ids: opt_bool(obj, "ids", ctx)?.unwrap_or(defaults.ids),
        paths: opt_bool(obj, "paths", ctx)?.unwrap_or(defaults.paths),
        strip_nondeterministic_text: opt_bool(obj, "strip_nondeterministic_text", ctx)?
            .unwrap_or(defaults.strip_nondeterministic_text),
    })
}

fn parse_runtime(raw: Option<&Value>, ctx: &str) -> Result<RuntimeConfig, SchemaError> {
    let Some(obj) = optional_object(raw, ctx, "runtime")? else {
        return Ok(RuntimeConfig::default());
    };
    let terminal_surface = obj
        .get("terminal_surface")
        .and_then(Value::as_str)
        .map(TerminalSurface::parse_or_auto)
        .unwrap_or_default();
    let mode = match obj.get("mode").and_then(Value::as_str).map(str::trim) {
        Some(m) if m.eq_ignore_ascii_case("interactive") => RuntimeMode::Interactive,
        _ => RuntimeMode::Batch,
    };
    Ok(RuntimeConfig {
        terminal_surface,
        mode,
    })
}

fn optional_object<'a>(
    raw: Option<&'a Value>,
    ctx: &str,
    field: &str,
) -> Result<Option<&'a Map<String, Value>>, SchemaError> {
    match raw {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(obj)) => Ok(Some(obj)),
        Some(_) => Err(SchemaError::InvalidField {
            context: ctx.to_string(),
            field: field.to_string(),
            reason: "must be an object".to_string(),
        }),
    }
}

fn required_string(obj: &Map<String, Value>, field: &str, ctx: &str) -> Result<String, SchemaError> {
    opt_string(obj, field, ctx)?.ok_or_else(|| SchemaError::MissingField {
        context: ctx.to_string(),
        field: field.to_string(),
    })
}

fn opt_string(obj: &Map<String, Value>, field: &str, ctx: &str) -> Result<Option<String>, SchemaError> {
    match obj.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                Ok(None)
            } else {
                Ok(Some(trimmed.to_string()))
            }
        }
        Some(_) => Err(SchemaError::InvalidField {
            context: ctx.to_string(),
            field: field.to_string(),
            reason: "must be a string".to_string(),
        }),
    }
}

fn opt_bool(obj: &Map<String, Value>, field: &str, ctx: &str) -> Result<Option<bool>, SchemaError> {
    match obj.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(_) => Err(SchemaError::InvalidField {
            context: ctx.to_string(),
            field: field.to_string(),
            reason: "must be a boolean".to_string(),
        }),
    }
}

fn opt_u64(obj: &Map<String, Value>, field: &str, ctx: &str) -> Result<Option<u64>, SchemaError> {
    match obj.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v.as_u64().map(Some).ok_or_else(|| SchemaError::InvalidField {
            context: ctx.to_string(),
            field: field.to_string(),
            reason: "must be a non-negative integer".to_string(),
        }),
    }
}

fn opt_u32(obj: &Map<String, Value>, field: &str, ctx: &str) -> Result<Option<u32>, SchemaError> {
    match opt_u64(obj, field, ctx)? {
        None => Ok(None),
        Some(v) => u32::try_from(v)
            .map(Some)
            .map_err(|_| SchemaError::InvalidField {
                context: ctx.to_string(),
                field: field.to_string(),
                reason: "out of range".to_string(),
            }),
    }
}

fn string_list(raw: Option<&Value>, ctx: &str, field: &str) -> Result<Vec<String>, SchemaError> {
    let items = match raw {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(items)) => items,
        Some(_) => {
            return Err(SchemaError::InvalidField {
                context: ctx.to_string(),
                field: field.to_string(),
                reason: "must be a list of strings".to_string(),
            });
        }
    };
    let mut out = Vec::with_capacity(items.len());
    for (idx, item) in items.iter().enumerate() {
        let text = item.as_str().ok_or_else(|| SchemaError::InvalidField {
            context: ctx.to_string(),
            field: format!("{field}[{idx}]"),
            reason: "must be a string".to_string(),
        })?;
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            out.push(trimmed.to_string());
        }
    }
    Ok(out)
}

/// Scenario selection applied before capture: ID/tag filters, then sharding.
#[derive(Debug, Clone, Default)]
pub struct ScenarioFilter {
    pub scenario_ids: Vec<String>,
    pub tags: Vec<String>,
    pub shard: Option<(usize, usize)>,
}

impl ScenarioFilter {
    /// Select matching scenarios in suite order.
    ///
    /// `shard` is `(index, count)`; a scenario at filtered position `i` is
    /// kept when `i % count == index`.
    pub fn apply(&self, scenarios: &[Scenario]) -> Result<Vec<Scenario>, SchemaError> {
        let wanted_ids: Vec<String> = self
            .scenario_ids
            .iter()
            .map(|raw| {
                normalize_scenario_id(raw).ok_or_else(|| SchemaError::InvalidScenarioId {
                    raw: raw.clone(),
                })
            })
            .collect::<Result<_, _>>()?;

        let filtered: Vec<Scenario> = scenarios
            .iter()
            .filter(|s| wanted_ids.is_empty() || wanted_ids.contains(&s.scenario_id))
            .filter(|s| self.tags.iter().all(|t| s.has_tag(t)))
            .cloned()
            .collect();

        let Some((index, count)) = self.shard else {
            return Ok(filtered);
        };
        if count == 0 || index >= count {
            return Err(SchemaError::InvalidField {
                context: "scenario filter".to_string(),
                field: "shard".to_string(),
                reason: format!("shard index {index} must be below shard count {count}"),
            });
        }
        Ok(filtered
            .into_iter()
            .enumerate()
            .filter(|(i, _)| i % count == index)
            .map(|(_, s)| s)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn minimal(id: &str) -> Value {
        json!({
            "scenario_id": id,
            "steps": [{"kind": "user", "text": "hello"}],
            "expectations": {"success_signature": ["DONE"]}
        })
    }

    #[test]
    fn scenario_id_normalization() {
        assert_eq!(normalize_scenario_id("  login flow-v2 "), Some("LOGIN_FLOW_V2".into()));
        assert_eq!(normalize_scenario_id("already_OK"), Some("ALREADY_OK".into()));
        assert_eq!(normalize_scenario_id("9lives"), None);
        assert_eq!(normalize_scenario_id("   "), None);
        assert_eq!(normalize_scenario_id("--"), None);
    }

    #[test]
    fn defaults_are_applied() {
        let raw = json!({
            "scenario_id": "build basic",
            "steps": [],
            "expectations": {
                "success_signature": ["BUILD_OK"],
                "checks": [{"type": "tool_order", "severity": "high"}]
            },
            "runtime": {"terminal_surface": "teletype"}
        });
        let scenario = parse_scenario(&raw, 0).expect("scenario should parse");
        assert_eq!(scenario.scenario_id, "BUILD_BASIC");
        assert_eq!(scenario.runtime.terminal_surface, TerminalSurface::Auto);
        let check = &scenario.expectations.checks[0];
        assert_eq!(check.id, "CHECK_1");
        assert!(check.required);
        assert_eq!(check.strict_order, None);
    }

    #[test]
    fn tags_union_with_metadata() {
        let mut raw = minimal("tagged");
        raw["tags"] = json!(["Smoke", "smoke"]);
        raw["tag_metadata"] = json!({"domain": "build", "risk": "P0"});
        let scenario = parse_scenario(&raw, 0).expect("scenario should parse");
        assert_eq!(scenario.tags, vec!["domain:build", "risk:p0", "smoke"]);
        assert!(scenario.has_tag("RISK:P0"));
    }

    #[test]
    fn wait_steps_are_clamped_to_budget() {
        let mut raw = minimal("waits");
        raw["steps"] = json!([
            {"kind": "wait", "duration_ms": 5000},
            {"kind": "wait", "duration_ms": 200}
        ]);
        raw["stabilization"] = json!({"fixture_seed": 7, "wait_budget_ms": 1000});
        let scenario = parse_scenario(&raw, 0).expect("scenario should parse");
        let durations: Vec<u64> = scenario
            .steps
            .iter()
            .filter_map(|s| match s {
                ScenarioStep::Wait { duration_ms, .. } => Some(*duration_ms),
                _ => None,
            })
            .collect();
        assert_eq!(durations, vec![1000, 200]);
    }

    #[test]
    fn rejects_unsupported_check_type_and_severity() {
        let mut raw = minimal("bad check");
        raw["expectations"]["checks"] = json!([{"type": "latency", "severity": "high"}]);
        assert!(matches!(
            parse_scenario(&raw, 0),
            Err(SchemaError::UnsupportedCheckType { .. })
        ));

        raw["expectations"]["checks"] = json!([{"type": "flow", "severity": "critical"}]);
        assert!(matches!(
            parse_scenario(&raw, 0),
            Err(SchemaError::UnsupportedSeverity { .. })
        ));
    }

    #[test]
    fn rejects_empty_success_signature() {
        let mut raw = minimal("no signature");
        raw["expectations"]["success_signature"] = json!(["  "]);
        assert!(matches!(
            parse_scenario(&raw, 0),
            Err(SchemaError::EmptySuccessSignature { .. })
        ));
    }

    #[test]
    fn rejects_non_object_suite() {
        assert!(matches!(
            parse_suite(&json!([1, 2])),
            Err(SchemaError::NotAnObject { .. })
        ));
    }

    #[test]
    fn duplicate_ids_are_all_reported() {
        let suite = json!({"scenarios": [
            minimal("alpha"), minimal("ALPHA"), minimal("beta"), minimal("Beta "), minimal("gamma")
        ]});
        match parse_suite(&suite) {
            Err(SchemaError::DuplicateScenarioIds { ids }) => {
                assert_eq!(ids, vec!["ALPHA".to_string(), "BETA".to_string()]);
            }
            other => panic!("expected duplicate error, got {other:?}"),
        }
    }

    #[test]
    fn filter_applies_tags_then_shard() {
        let mut tagged = minimal("one");
        tagged["tags"] = json!(["smoke"]);
        let mut tagged_two = minimal("two");
        tagged_two["tags"] = json!(["smoke"]);
        let mut tagged_three = minimal("three");
        tagged_three["tags"] = json!(["smoke"]);
        let suite = parse_suite(&json!({"scenarios": [tagged, minimal("plain"), tagged_two, tagged_three]}))
            .expect("suite should parse");

        let filter = ScenarioFilter {
            tags: vec!["smoke".into()],
            shard: Some((1, 2)),
            ..ScenarioFilter::default()
        };
        let ids: Vec<String> = filter
            .apply(&suite.scenarios)
            .expect("filter should apply")
            .into_iter()
            .map(|s| s.scenario_id)
            .collect();
        assert_eq!(ids, vec!["TWO"]);

        let bad = ScenarioFilter {
            shard: Some((2, 2)),
            ..ScenarioFilter::default()
        };
        assert!(bad.apply(&suite.scenarios).is_err());
    }
}
