//! Drift records and the closed explainability taxonomy.

use crate::scenario::Severity;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Drift taxonomy. Declaration order is the fixed reporting order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriftCategory {
    FlowProtocol,
    AuthorizationPolicy,
    ToolSequence,
    SuccessSignature,
    ArtifactIntegrity,
}

impl DriftCategory {
    pub const TAXONOMY_ORDER: [DriftCategory; 5] = [
        DriftCategory::FlowProtocol,
        DriftCategory::AuthorizationPolicy,
        DriftCategory::ToolSequence,
        DriftCategory::SuccessSignature,
        DriftCategory::ArtifactIntegrity,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::FlowProtocol => "flow_protocol",
            Self::AuthorizationPolicy => "authorization_policy",
            Self::ToolSequence => "tool_sequence",
            Self::SuccessSignature => "success_signature",
            Self::ArtifactIntegrity => "artifact_integrity",
        }
    }
}

/// Group key used for drifts no taxonomy rule could place.
pub const UNCLASSIFIED: &str = "unclassified";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperatorBucket {
    Blocker,
    Actionable,
    Monitor,
}

impl OperatorBucket {
    pub fn from_severity(severity: Severity) -> Self {
        match severity {
            Severity::High => Self::Blocker,
            Severity::Medium => Self::Actionable,
            Severity::Low => Self::Monitor,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Blocker => "blocker",
            Self::Actionable => "actionable",
            Self::Monitor => "monitor",
        }
    }
}

/// Where a drift can be observed, plus a stable identity across retries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriftEvidence {
    pub baseline_event_indexes: Vec<usize>,
    pub candidate_event_indexes: Vec<usize>,
    pub artifact_refs: Vec<String>,
    pub fingerprint: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Drift {
    pub scenario_id: String,
    pub check_id: String,
    pub severity: Severity,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<DriftCategory>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<Confidence>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator_bucket: Option<OperatorBucket>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remediation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence: Option<DriftEvidence>,
}

impl Drift {
    pub fn is_explained(&self) -> bool {
        self.category.is_some()
    }

    pub fn fingerprint(&self) -> Option<&str> {
        self.evidence.as_ref().map(|e| e.fingerprint.as_str())
    }

    /// Category label, or `unclassified`.
    pub fn category_label(&self) -> &'static str {
        self.category.map_or(UNCLASSIFIED, DriftCategory::as_str)
    }
}

/// Drift counts per severity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl SeverityCounts {
    pub fn from_drifts<'a>(drifts: impl IntoIterator<Item = &'a Drift>) -> Self {
        let mut counts = Self::default();
        for drift in drifts {
            counts.add(drift.severity);
        }
        counts
    }

    pub fn add(&mut self, severity: Severity) {
        match severity {
            Severity::High => self.high += 1,
            Severity::Medium => self.medium += 1,
            Severity::Low => self.low += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.high + self.medium + self.low
    }

    pub fn get(&self, severity: Severity) -> usize {
        match severity {
            Severity::High => self.high,
            Severity::Medium => self.medium,
            Severity::Low => self.low,
        }
    }
}
