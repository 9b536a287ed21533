//! Deterministic synthetic runner for environments without a live host.
//!
//! Every step expands into a fixed event pattern. Identifiers and clocks are
//! derived from the scenario's fixture seed, so a given scenario, profile, and
//! seed always produce the same raw trace, and the two profiles differ only in
//! noise that normalization erases (session IDs, epoch offset).

use crate::error::RunnerError;
use crate::runner::{RunContext, ScenarioRunner};
use chrono::{DateTime, SecondsFormat, Utc};
use parity_kernel::normalize::canonical_action;
use parity_kernel::scenario::{RuntimeMode, ToolStep};
use parity_kernel::trace::Authorization;
use parity_kernel::{EventType, Profile, Scenario, ScenarioStep, TerminalSurface, TraceEvent};
use serde_json::{Map, Value, json};
use sha2::{Digest, Sha256};
use uuid::{Builder, Uuid};

/// Raw action name of the build-script launch that triggers surface selection.
pub const BUILD_SCRIPT_ACTION: &str = "launch_build_script";

const EPOCH_MS: u64 = 1_700_000_000_000;
const EVENT_SPACING_MS: u64 = 25;

#[derive(Debug, Clone, Copy, Default)]
pub struct SyntheticRunner;

impl SyntheticRunner {
    pub fn new() -> Self {
        Self
    }
}

impl ScenarioRunner for SyntheticRunner {
    fn run_scenario(&self, scenario: &Scenario, ctx: &RunContext) -> Result<Vec<TraceEvent>, RunnerError> {
        let mut trace = TraceBuilder::new(scenario, ctx);
        for (index, step) in scenario.steps.iter().enumerate() {
            if !step.applies_to(ctx.profile) {
                continue;
            }
            match step {
                ScenarioStep::User { text, .. } => {
                    let received_at = trace.iso_now();
                    trace.push(EventType::UserMessage, |e| {
                        e.payload = Some(json!({ "text": text, "received_at": received_at }));
                    });
                }
                ScenarioStep::Wait { duration_ms, .. } => {
                    trace.push(EventType::Wait, |e| {
                        e.payload = Some(json!({ "duration_ms": duration_ms }));
                    });
                    trace.advance(*duration_ms);
                }
                ScenarioStep::Tool(tool) => trace.tool_step(scenario, tool, index),
            }
        }
        for signature in &scenario.expectations.success_signature {
            let completed_at = trace.iso_now();
            trace.push(EventType::Outcome, |e| {
                e.success_signature = Some(signature.clone());
                e.payload = Some(json!({ "completed_at": completed_at }));
            });
        }
        Ok(trace.events)
    }
}

/// Surface a build-script launch is routed to.
///
/// Precedence: explicit runtime surface, then a tool hint naming a concrete
/// surface, then interactive mode, then the batch default.
pub fn select_surface(scenario: &Scenario, tool_hint: Option<&str>) -> (TerminalSurface, &'static str) {
    if scenario.runtime.terminal_surface != TerminalSurface::Auto {
        return (scenario.runtime.terminal_surface, "runtime");
    }
    if let Some(surface) = tool_hint.and_then(TerminalSurface::parse)
        && surface != TerminalSurface::Auto
    {
        return (surface, "tool_hint");
    }
    match scenario.runtime.mode {
        RuntimeMode::Interactive => (TerminalSurface::MemoryTerminalInteractive, "runtime_mode"),
        RuntimeMode::Batch => (TerminalSurface::MemoryTerminal, "default"),
    }
}

/// UUID derived from seed, scenario, profile, and step index.
pub fn derived_session_id(seed: u64, scenario_id: &str, profile: Profile, step_index: usize) -> Uuid {
    let mut hasher = Sha256::new();
    hasher.update(seed.to_be_bytes());
    hasher.update(scenario_id.as_bytes());
    hasher.update(profile.as_str().as_bytes());
    hasher.update((step_index as u64).to_be_bytes());
    let digest = hasher.finalize();
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    Builder::from_random_bytes(bytes).into_uuid()
}

fn profile_offset_ms(profile: Profile) -> u64 {
    match profile {
        Profile::Baseline => 0,
        Profile::Candidate => 7_919,
    }
}

struct TraceBuilder<'a> {
    scenario_id: &'a str,
    ctx: &'a RunContext,
    seed: u64,
    clock_ms: u64,
    events: Vec<TraceEvent>,
}

impl<'a> TraceBuilder<'a> {
    fn new(scenario: &'a Scenario, ctx: &'a RunContext) -> Self {
        let seed = scenario.stabilization.fixture_seed;
        Self {
            scenario_id: &scenario.scenario_id,
            ctx,
            seed,
            clock_ms: EPOCH_MS + (seed % 86_400) * 1_000 + profile_offset_ms(ctx.profile),
            events: Vec::new(),
        }
    }

    fn advance(&mut self, ms: u64) {
        self.clock_ms = self.clock_ms.saturating_add(ms);
    }

    fn iso_now(&self) -> String {
        i64::try_from(self.clock_ms)
            .ok()
            .and_then(DateTime::<Utc>::from_timestamp_millis)
            .map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true))
            .unwrap_or_default()
    }

    fn push(&mut self, event_type: EventType, fill: impl FnOnce(&mut TraceEvent)) {
        let mut event = TraceEvent::new(event_type, self.scenario_id, self.clock_ms);
        fill(&mut event);
        self.events.push(event);
        self.advance(EVENT_SPACING_MS);
    }

    fn tool_step(&mut self, scenario: &Scenario, step: &ToolStep, index: usize) {
        let lowered = step.action.trim().to_ascii_lowercase();
        let arg = |key: &str| step.args.as_ref().and_then(|a| a.get(key)).cloned();

        match lowered.as_str() {
            "handoff" => {
                let to_agent = arg("to_agent").unwrap_or(Value::Null);
                return self.push(EventType::Handoff, |e| {
                    e.tool_name = Some(step.tool.clone());
                    e.payload = Some(json!({ "to_agent": to_agent }));
                });
            }
            "confirm" => return self.push(EventType::Confirmation, |e| e.tool_name = Some(step.tool.clone())),
            "update_plan" => {
                let plan_step = arg("step").unwrap_or(Value::Null);
                return self.push(EventType::PlanStepUpdate, |e| {
                    e.tool_name = Some(step.tool.clone());
                    e.payload = Some(json!({ "step": plan_step }));
                });
            }
            "complete" => return self.push(EventType::Complete, |e| e.tool_name = Some(step.tool.clone())),
            _ => {}
        }

        if canonical_action(&step.action, false) == BUILD_SCRIPT_ACTION {
            let (surface, source) = select_surface(scenario, step.tool_hint.as_deref());
            self.push(EventType::SurfaceSelected, |e| {
                e.tool_name = Some(step.tool.clone());
                e.payload = Some(json!({ "selected_surface": surface.as_str(), "source": source }));
            });
        }

        let outcome = step.auth_outcome.clone().unwrap_or_else(|| "allow".to_string());
        let allowed = outcome.eq_ignore_ascii_case("allow");
        let reason_class = step.auth_reason.clone().unwrap_or_else(|| {
            let class = if allowed { "policy_allow" } else { "policy_deny" };
            class.to_string()
        });
        self.push(EventType::Authorization, |e| {
            e.tool_name = Some(step.tool.clone());
            e.action_raw = Some(step.action.clone());
            e.authorization = Some(Authorization {
                outcome: outcome.clone(),
                reason_class,
            });
        });
        if !allowed {
            return;
        }

        let session_id = derived_session_id(self.seed, self.scenario_id, self.ctx.profile, index);
        let mut payload = Map::new();
        payload.insert("session_id".to_string(), json!(session_id.to_string()));
        if let Some(workspace) = &self.ctx.workspace_path {
            payload.insert("cwd".to_string(), json!(workspace));
        }
        if let Some(args) = &step.args {
            payload.insert("args".to_string(), args.clone());
        }
        self.push(EventType::ToolCall, |e| {
            e.tool_name = Some(step.tool.clone());
            e.action_raw = Some(step.action.clone());
            e.payload = Some(Value::Object(payload));
        });
    }
}
