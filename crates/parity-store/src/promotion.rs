//! Guarded golden-baseline promotion.
//!
//! Four gates, checked in order:
//! 1. the artifact must be a baseline profile (error otherwise)
//! 2. without `apply`, the request is a dry run
//! 3. without `approve`, an apply is refused
//! 4. an existing baseline is only replaced with `force`
//!
//! Refusals are returned as values carrying a reason; nothing is written.

use crate::error::{PromotionError, StoreError};
use crate::golden::{
    GOLDEN_METADATA_SCHEMA_VERSION, GoldenLocation, GoldenMetadata, read_golden_baseline,
    scenario_signatures,
};
use chrono::{SecondsFormat, Utc};
use parity_kernel::stable_json::write_stable_json;
use parity_kernel::{Profile, ProfileArtifacts};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PromotionFlags {
    pub apply: bool,
    pub approve: bool,
    pub force: bool,
}

/// Scenario-level difference between the candidate and the stored baseline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromotionDiff {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub changed: Vec<String>,
    pub unchanged: Vec<String>,
}

impl PromotionDiff {
    pub fn compute(existing: Option<&ProfileArtifacts>, candidate: &ProfileArtifacts) -> Self {
        let next = scenario_signatures(candidate);
        let prev = existing.map(scenario_signatures).unwrap_or_default();
        let mut diff = Self::default();
        for (id, signature) in &next {
            match prev.get(id) {
                None => diff.added.push(id.clone()),
                Some(old) if old == signature => diff.unchanged.push(id.clone()),
                Some(_) => diff.changed.push(id.clone()),
            }
        }
        diff.removed = prev.keys().filter(|id| !next.contains_key(*id)).cloned().collect();
        diff
    }

    pub fn has_changes(&self) -> bool {
        !(self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PromotionOutcome {
    Applied { written: Vec<PathBuf> },
    RefusedDryRun,
    RefusedUnapproved,
    RefusedExisting,
}

impl PromotionOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }

    pub fn guard_reason(&self) -> Option<&'static str> {
        match self {
            Self::Applied { .. } => None,
            Self::RefusedDryRun => Some("dry run: pass --apply to write the golden baseline"),
            Self::RefusedUnapproved => {
                Some("promotion not approved: pass --approve together with --apply")
            }
            Self::RefusedExisting => {
                Some("a golden baseline already exists: pass --force to replace it")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromotionReport {
    pub baseline_id: String,
    pub location: GoldenLocation,
    pub existing_baseline: bool,
    pub diff: PromotionDiff,
    pub outcome: PromotionOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guard_reason: Option<String>,
}

impl PromotionReport {
    pub fn applied(&self) -> bool {
        self.outcome.is_applied()
    }
}

/// Run the guarded promotion workflow for `candidate`.
pub fn promote_baseline(
    goldens_root: &Path,
    baseline_id: &str,
    candidate: &ProfileArtifacts,
    flags: PromotionFlags,
) -> Result<PromotionReport, PromotionError> {
    if candidate.profile != Profile::Baseline {
        return Err(PromotionError::NotBaseline {
            profile: candidate.profile,
        });
    }

    let location = GoldenLocation::new(goldens_root, baseline_id);
    let existing = read_golden_baseline(goldens_root, baseline_id)?;
    let diff = PromotionDiff::compute(existing.as_ref().map(|r| &r.artifact), candidate);

    let outcome = if !flags.apply {
        PromotionOutcome::RefusedDryRun
    } else if !flags.approve {
        PromotionOutcome::RefusedUnapproved
    } else if existing.is_some() && !flags.force {
        PromotionOutcome::RefusedExisting
    } else {
        let metadata = GoldenMetadata {
            schema_version: GOLDEN_METADATA_SCHEMA_VERSION,
            baseline_id: location.baseline_id.clone(),
            promoted_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            source_label: candidate.label.clone(),
            source_run_id: candidate.run_id.clone(),
            scenario_count: candidate.scenarios.len(),
            scenario_signatures: scenario_signatures(candidate),
        };
        write_stable_json(&location.baseline_path, candidate).map_err(StoreError::from)?;
        write_stable_json(&location.metadata_path, &metadata).map_err(StoreError::from)?;
        PromotionOutcome::Applied {
            written: vec![location.baseline_path.clone(), location.metadata_path.clone()],
        }
    };

    info!(
        baseline_id = %location.baseline_id,
        applied = outcome.is_applied(),
        added = diff.added.len(),
        removed = diff.removed.len(),
        changed = diff.changed.len(),
        "baseline promotion evaluated"
    );

    Ok(PromotionReport {
        baseline_id: location.baseline_id.clone(),
        guard_reason: outcome.guard_reason().map(str::to_string),
        existing_baseline: existing.is_some(),
        location,
        diff,
        outcome,
    })
}
