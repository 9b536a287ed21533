//! Migration of legacy run directories into the golden store.
//!
//! Legacy runs are enumerated newest first; the newest run holding a baseline
//! artifact is promoted through the same guarded workflow as a fresh capture.

use crate::artifacts::read_profile_artifacts;
use crate::error::PromotionError;
use crate::promotion::{PromotionFlags, PromotionReport, promote_baseline};
use crate::resolver::{ResolveRequest, ResolvedArtifact, list_run_dirs, resolve_artifact};
use parity_kernel::Profile;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyRunSummary {
    pub dir: PathBuf,
    pub has_baseline: bool,
    pub has_candidate: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationReport {
    pub legacy_runs: Vec<LegacyRunSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected: Option<ResolvedArtifact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub promotion: Option<PromotionReport>,
}

pub fn migrate_legacy_runs(
    legacy_runs_root: &Path,
    goldens_root: &Path,
    baseline_id: &str,
    flags: PromotionFlags,
) -> Result<MigrationReport, PromotionError> {
    let runs = list_run_dirs(legacy_runs_root)?;
    let mut legacy_runs = Vec::with_capacity(runs.len());
    for run in &runs {
        let request = ResolveRequest {
            legacy_run_dir: Some(&run.dir),
            ..ResolveRequest::default()
        };
        legacy_runs.push(LegacyRunSummary {
            dir: run.dir.clone(),
            has_baseline: resolve_artifact(Profile::Baseline, &request)?.is_some(),
            has_candidate: resolve_artifact(Profile::Candidate, &request)?.is_some(),
        });
    }

    let selected = resolve_artifact(
        Profile::Baseline,
        &ResolveRequest {
            legacy_runs_root: Some(legacy_runs_root),
            ..ResolveRequest::default()
        },
    )?;

    let promotion = match &selected {
        Some(resolved) => {
            let artifact = read_profile_artifacts(&resolved.path)?;
            Some(promote_baseline(goldens_root, baseline_id, &artifact, flags)?)
        }
        None => None,
    };

    info!(
        root = %legacy_runs_root.display(),
        runs = legacy_runs.len(),
        selected = selected.is_some(),
        "legacy migration evaluated"
    );

    Ok(MigrationReport {
        legacy_runs,
        selected,
        promotion,
    })
}
