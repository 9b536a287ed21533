//! # Parity Kernel
//!
//! Deterministic replay-parity semantics for agent tool-calling traces: a
//! baseline and a candidate capture of the same scenario suite are
//! normalized, diffed check by check, and gated.
//!
//! This crate is **host-agnostic**: it never drives an agent. Capturing
//! traces, persisting baselines, and rendering reports live in sibling
//! crates that depend on these types.
//!
//! ## Pipeline
//!
//! ```text
//! ScenarioSuite         ← parse + normalize + digest (scenario)
//!     │
//! TraceEvent[]          ← runner output, then normalize_events (normalize)
//!     │
//! ProfileArtifacts ×2   ← baseline / candidate (trace)
//!     │
//! ComparisonResult      ← rule dispatch + enrichment (comparator, explain)
//!     │
//! GateEvaluation        ← strict / warn / info, flake-aware (gate)
//! ```

pub mod comparator;
pub mod drift;
pub mod error;
pub mod explain;
pub mod gate;
pub mod normalize;
pub mod profile;
pub mod scenario;
pub mod stable_json;
pub mod trace;

pub use comparator::{ComparisonResult, ComparisonSummary, ScenarioComparison, compare};
pub use drift::{Confidence, Drift, DriftCategory, DriftEvidence, OperatorBucket, SeverityCounts};
pub use error::{ProfileError, SchemaError, StableJsonError};
pub use explain::{ExplainabilityGroup, ExplainabilityRollup};
pub use gate::{
    AnnotationLevel, Classification, GateAnnotation, GateEvaluation, GateMode, GateStatus, GateSummary,
    evaluate_replay_gate, evaluate_replay_gate_with_retry,
};
pub use normalize::{NormalizeOptions, normalize_events};
pub use profile::ComparatorProfile;
pub use scenario::{
    CheckSpec, CheckType, NormalizationConfig, Scenario, ScenarioFilter, ScenarioStep,
    ScenarioSuite, Severity, TerminalSurface, parse_suite,
};
pub use trace::{EventType, Profile, ProfileArtifacts, ScenarioRunArtifact, TraceEvent};
