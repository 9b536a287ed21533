//! Trace events and the per-profile artifacts built from them.
//!
//! Raw events are runner output. Normalized events are derived from raw
//! events by [`crate::normalize`] and never mutated in place.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

pub const ARTIFACT_SCHEMA_VERSION: u32 = 1;

/// Which side of a comparison a capture belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Profile {
    Baseline,
    Candidate,
}

impl Profile {
    pub const ALL: [Profile; 2] = [Profile::Baseline, Profile::Candidate];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Baseline => "baseline",
            Self::Candidate => "candidate",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "baseline" => Some(Self::Baseline),
            "candidate" => Some(Self::Candidate),
            _ => None,
        }
    }

    /// File name of the normalized artifact for this profile.
    pub fn norm_file_name(self) -> String {
        format!("{}.norm.json", self.as_str())
    }

    /// File name of the raw JSONL envelope stream for this profile.
    pub fn raw_file_name(self) -> String {
        format!("{}.raw.jsonl", self.as_str())
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Closed set of trace event kinds.
///
/// Unknown kinds emitted by a live host deserialize as `Other` so that
/// normalization stays total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    UserMessage,
    ToolCall,
    Authorization,
    SurfaceSelected,
    Handoff,
    Confirmation,
    PlanStepUpdate,
    Wait,
    Complete,
    Outcome,
    #[serde(other)]
    Other,
}

impl EventType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UserMessage => "user_message",
            Self::ToolCall => "tool_call",
            Self::Authorization => "authorization",
            Self::SurfaceSelected => "surface_selected",
            Self::Handoff => "handoff",
            Self::Confirmation => "confirmation",
            Self::PlanStepUpdate => "plan_step_update",
            Self::Wait => "wait",
            Self::Complete => "complete",
            Self::Outcome => "outcome",
            Self::Other => "other",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authorization {
    pub outcome: String,
    pub reason_class: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEvent {
    pub event_type: EventType,
    pub timestamp_ms: u64,
    pub scenario_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_raw: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_canonical: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization: Option<Authorization>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success_signature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl TraceEvent {
    pub fn new(event_type: EventType, scenario_id: impl Into<String>, timestamp_ms: u64) -> Self {
        Self {
            event_type,
            timestamp_ms,
            scenario_id: scenario_id.into(),
            tool_name: None,
            action_raw: None,
            action_canonical: None,
            authorization: None,
            success_signature: None,
            payload: None,
        }
    }

    /// String field from the payload object, if present.
    pub fn payload_str(&self, key: &str) -> Option<&str> {
        self.payload.as_ref()?.get(key)?.as_str()
    }
}

/// One scenario captured under one profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioRunArtifact {
    pub scenario_id: String,
    #[serde(default)]
    pub scenario_digest: String,
    pub raw_events: Vec<TraceEvent>,
    pub normalized_events: Vec<TraceEvent>,
    pub success: bool,
}

/// Every scenario captured for one profile under one capture run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileArtifacts {
    pub schema_version: u32,
    pub profile: Profile,
    pub label: String,
    pub run_id: String,
    pub scenarios: Vec<ScenarioRunArtifact>,
}

impl ProfileArtifacts {
    pub fn scenario(&self, scenario_id: &str) -> Option<&ScenarioRunArtifact> {
        self.scenarios.iter().find(|s| s.scenario_id == scenario_id)
    }
}
